//! Persisted user preferences
//!
//! Settings are stored in `{config_dir}/forge/settings.json`. Missing fields
//! take their defaults; a missing or unreadable file yields the defaults.

use anyhow::{Context, Result, bail};
use forge_render::{CameraController, Topology};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Options remembered between runs. Command-line flags override them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Window width in logical pixels
    pub window_width: u32,
    /// Window height in logical pixels
    pub window_height: u32,
    pub topology: Topology,
    /// Camera movement speed, units per second
    pub camera_speed: f32,
    /// Radians of rotation per pixel of mouse motion
    pub mouse_sensitivity: f32,
    /// Shader directory; `None` uses the built-in shaders
    pub shader_dir: Option<PathBuf>,
    /// Reload when files in the shader directory change
    pub watch: bool,
}

impl Default for Settings {
    fn default() -> Self {
        let controller = CameraController::default();
        Self {
            window_width: 1600,
            window_height: 900,
            topology: Topology::Direct,
            camera_speed: controller.speed,
            mouse_sensitivity: controller.sensitivity,
            shader_dir: None,
            watch: false,
        }
    }
}

impl Settings {
    pub fn controller(&self) -> CameraController {
        CameraController::new(self.camera_speed, self.mouse_sensitivity)
    }

    /// Make `shader_dir` absolute, resolving symlinks when it exists
    pub fn resolve_paths(&mut self) -> Result<()> {
        if let Some(dir) = &self.shader_dir {
            let resolved = fs::canonicalize(dir)
                .or_else(|_| std::path::absolute(dir))
                .with_context(|| format!("Failed to resolve {}", dir.display()))?;
            self.shader_dir = Some(resolved);
        }
        Ok(())
    }
}

/// Get the path to the settings file
pub fn settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("forge").join("settings.json"))
}

/// Load settings from the user config directory
pub fn load_settings() -> Settings {
    settings_path().map_or_else(Settings::default, |path| load_settings_from(&path))
}

/// Load settings from `path`, returning defaults if it doesn't exist or is invalid
pub fn load_settings_from(path: &Path) -> Settings {
    let Ok(contents) = fs::read_to_string(path) else {
        return Settings::default();
    };
    match serde_json::from_str(&contents) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!("ignoring invalid settings file {}: {e}", path.display());
            Settings::default()
        }
    }
}

/// Save settings to the user config directory
pub fn save_settings(settings: &Settings) -> Result<PathBuf> {
    let Some(path) = settings_path() else {
        bail!("Could not determine config directory");
    };
    save_settings_to(&path, settings)?;
    Ok(path)
}

/// Save settings to `path`, creating parent directories
pub fn save_settings_to(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create config directory")?;
    }
    let json = serde_json::to_string_pretty(settings).context("Failed to serialize settings")?;
    fs::write(path, json).context("Failed to write settings file")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings_from(&dir.path().join("settings.json"));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_invalid_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(load_settings_from(&path), Settings::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "topology": "compute_blit", "watch": true }"#).unwrap();
        let settings = load_settings_from(&path);
        assert_eq!(settings.topology, Topology::ComputeBlit);
        assert!(settings.watch);
        assert_eq!(settings.window_width, 1600);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = Settings {
            window_width: 800,
            shader_dir: Some(PathBuf::from("shaders")),
            camera_speed: 10.0,
            ..Settings::default()
        };
        save_settings_to(&path, &settings).unwrap();
        assert_eq!(load_settings_from(&path), settings);
        assert_eq!(load_settings_from(&path).controller().speed, 10.0);
    }

    #[test]
    fn test_resolve_paths_makes_shader_dir_absolute() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("shaders")).unwrap();
        let mut settings = Settings {
            shader_dir: Some(dir.path().join("shaders").join("..").join("shaders")),
            ..Settings::default()
        };
        settings.resolve_paths().unwrap();
        assert_eq!(
            settings.shader_dir,
            Some(fs::canonicalize(dir.path().join("shaders")).unwrap())
        );

        let mut missing = Settings {
            shader_dir: Some(PathBuf::from("not-created-yet")),
            ..Settings::default()
        };
        missing.resolve_paths().unwrap();
        let resolved = missing.shader_dir.unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("not-created-yet"));

        let mut embedded = Settings::default();
        embedded.resolve_paths().unwrap();
        assert_eq!(embedded.shader_dir, None);
    }
}
