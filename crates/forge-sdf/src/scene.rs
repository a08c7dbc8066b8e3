//! Scene description
//!
//! A [`Scene`] is the root SDF node plus the single point light and the flat
//! background color. It is what `scene.json` deserializes into.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SceneError};
use crate::eval::{Sdf, evaluate};
use crate::ops::Hit;
use crate::sdf_node::{
    Color, SdfNode, box3, capsule, cylinder, ground_plane, rounded_box, sphere, torus,
};

const DEFAULT_LIGHT: [f32; 3] = [4.0, 6.0, 3.0];
const DEFAULT_BACKGROUND: Color = [0.1, 0.1, 0.15];

fn default_light() -> [f32; 3] {
    DEFAULT_LIGHT
}

fn default_background() -> Color {
    DEFAULT_BACKGROUND
}

/// Root SDF plus lighting environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// Point light position in world space
    #[serde(default = "default_light")]
    pub light: [f32; 3],
    /// Color returned for rays that miss
    #[serde(default = "default_background")]
    pub background: Color,
    pub root: SdfNode,
}

impl Scene {
    pub fn new(root: SdfNode) -> Self {
        Self {
            light: DEFAULT_LIGHT,
            background: DEFAULT_BACKGROUND,
            root,
        }
    }

    pub fn with_light(mut self, x: f32, y: f32, z: f32) -> Self {
        self.light = [x, y, z];
        self
    }

    pub fn with_background(mut self, r: f32, g: f32, b: f32) -> Self {
        self.background = [r, g, b];
        self
    }

    pub fn light_position(&self) -> Vec3 {
        Vec3::from(self.light)
    }

    pub fn background_color(&self) -> Vec3 {
        Vec3::from(self.background)
    }

    /// Built-in scene used when no `scene.json` is supplied.
    ///
    /// Laid out in front of a camera at the origin looking down -Z.
    pub fn demo() -> Self {
        let floor = ground_plane(-1.0).colored(0.55, 0.55, 0.55);

        let blob = sphere(1.0)
            .at(-1.0, 0.0, -6.0)
            .colored(0.9, 0.2, 0.2)
            .smooth_union(
                box3(0.7, 0.7, 0.7)
                    .at(0.3, 0.0, -6.0)
                    .colored(0.2, 0.4, 0.9),
                0.15,
            );

        let carved = rounded_box(0.8, 0.8, 0.8, 0.1)
            .colored(0.3, 0.8, 0.4)
            .subtract(sphere(1.0).colored(0.9, 0.9, 0.2))
            .at(3.0, -0.2, -7.0);

        let ring = torus(0.9, 0.25)
            .at(-3.8, -0.3, -7.5)
            .colored(0.95, 0.7, 0.2);

        let pillar = capsule(0.3, 0.8)
            .colored(0.8, 0.5, 0.9)
            .smooth_intersect(cylinder(0.45, 0.7).colored(0.5, 0.3, 0.8), 0.05)
            .at(0.0, -0.2, -9.0);

        let root = floor.union(blob).union(carved).union(ring).union(pillar);
        Self::new(root)
    }

    /// Parse and validate a JSON scene description
    pub fn from_json(text: &str) -> Result<Self> {
        let scene: Scene = serde_json::from_str(text)?;
        scene.validate()?;
        Ok(scene)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validate light, background and every node
    pub fn validate(&self) -> Result<()> {
        if !self.light.iter().all(|v| v.is_finite()) {
            return Err(SceneError::invalid("light", "light position must be finite"));
        }
        if !self.background.iter().all(|v| v.is_finite()) {
            return Err(SceneError::invalid(
                "background",
                "background color must be finite",
            ));
        }
        self.root.validate()
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::demo()
    }
}

impl Sdf for Scene {
    fn evaluate(&self, p: Vec3) -> Hit {
        evaluate(&self.root, p)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_is_valid() {
        let scene = Scene::demo();
        assert!(scene.validate().is_ok());
        assert!(scene.root.node_count() > 5);
    }

    #[test]
    fn test_json_round_trip_preserves_scene() {
        let scene = Scene::demo().with_light(1.0, 2.0, 3.0);
        let json = scene.to_json_pretty().unwrap();
        let parsed = Scene::from_json(&json).unwrap();
        assert_eq!(parsed, scene);
    }

    #[test]
    fn test_json_defaults_light_and_background() {
        let scene = Scene::from_json(r#"{ "root": { "kind": "sphere", "radius": 1.0 } }"#).unwrap();
        assert_eq!(scene.light, DEFAULT_LIGHT);
        assert_eq!(scene.background, DEFAULT_BACKGROUND);
    }

    #[test]
    fn test_from_json_rejects_invalid_node() {
        let text = r#"{ "root": { "kind": "box", "half_extents": [1.0, 0.0, 1.0] } }"#;
        assert!(matches!(
            Scene::from_json(text),
            Err(SceneError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_from_json_rejects_unknown_kind() {
        let text = r#"{ "root": { "kind": "teapot" } }"#;
        assert!(matches!(Scene::from_json(text), Err(SceneError::Json(_))));
    }

    #[test]
    fn test_camera_at_origin_sees_open_space() {
        // Start position is outside every shape
        assert!(Scene::demo().distance(Vec3::ZERO) > 0.5);
    }
}
