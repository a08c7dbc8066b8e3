//! Forge CLI - Real-time SDF raymarching from the command line

mod settings;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use forge_render::{
    Camera, HEADLESS_FORMAT, Renderer, ShaderLibrary, Topology, WgpuBackend, WindowConfig,
};
use forge_sdf::Scene;
use glam::Vec3;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use crate::settings::{Settings, load_settings, save_settings};

#[derive(Parser)]
#[command(name = "forge")]
#[command(about = "Real-time SDF raymarching with hot-reloadable shaders", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive window
    Run {
        /// Shader directory (uses the built-in shaders if not provided)
        #[arg(short, long)]
        shaders: Option<PathBuf>,

        /// Pipeline topology: direct or compute
        #[arg(short, long)]
        topology: Option<Topology>,

        /// Window width
        #[arg(long)]
        width: Option<u32>,

        /// Window height
        #[arg(long)]
        height: Option<u32>,

        /// Reload automatically when shader files change
        #[arg(short, long)]
        watch: bool,

        /// Remember these options as the new defaults
        #[arg(long)]
        save: bool,
    },

    /// Render one frame on the GPU to an image file (headless)
    Render {
        /// Output image file (.png)
        #[arg(short, long, default_value = "render.png")]
        output: PathBuf,

        /// Shader directory (uses the built-in shaders if not provided)
        #[arg(short, long)]
        shaders: Option<PathBuf>,

        /// Pipeline topology: direct or compute
        #[arg(short, long)]
        topology: Option<Topology>,

        #[command(flatten)]
        view: ViewArgs,
    },

    /// Render one frame on the CPU reference renderer
    Trace {
        /// Output image file (.png)
        #[arg(short, long, default_value = "trace.png")]
        output: PathBuf,

        /// Directory whose scene.json to trace (uses the demo scene if not provided)
        #[arg(short, long)]
        shaders: Option<PathBuf>,

        #[command(flatten)]
        view: ViewArgs,
    },

    /// Compile and link-check both topologies without a GPU
    Check {
        /// Shader directory (uses the built-in shaders if not provided)
        #[arg(short, long)]
        shaders: Option<PathBuf>,
    },

    /// Write the built-in demo scene as JSON
    Scene {
        /// Output file (prints to stdout if not provided)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write the built-in shaders and demo scene into a directory for editing
    Init {
        /// Target directory
        #[arg(default_value = "shaders")]
        dir: PathBuf,

        /// Overwrite an existing scene.json
        #[arg(long)]
        force: bool,
    },
}

/// Image size and camera pose for offline renders
#[derive(Args, Debug, Clone)]
struct ViewArgs {
    /// Image width
    #[arg(long, default_value = "1600")]
    width: u32,

    /// Image height
    #[arg(long, default_value = "900")]
    height: u32,

    /// Camera position as x,y,z
    #[arg(long, default_value = "0,0,0", value_parser = parse_vec3)]
    position: Vec3,

    /// Camera yaw in radians
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    yaw: f32,

    /// Camera pitch in radians
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    pitch: f32,

    /// Elapsed time passed to the shaders, seconds
    #[arg(long, default_value = "0")]
    time: f32,
}

impl ViewArgs {
    fn camera(&self) -> Camera {
        Camera::new(self.position, self.yaw, self.pitch)
    }
}

fn parse_vec3(s: &str) -> Result<Vec3, String> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<f32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid coordinate in '{s}': {e}"))?;
    match parts.as_slice() {
        [x, y, z] => Ok(Vec3::new(*x, *y, *z)),
        _ => Err(format!("expected x,y,z, got '{s}'")),
    }
}

fn library_for(shaders: Option<&Path>) -> ShaderLibrary {
    match shaders {
        Some(dir) => ShaderLibrary::from_dir(dir),
        None => ShaderLibrary::embedded(),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,wgpu_core=warn,wgpu_hal=warn,naga=warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            shaders,
            topology,
            width,
            height,
            watch,
            save,
        } => {
            let mut settings = load_settings();
            apply_run_overrides(&mut settings, shaders, topology, width, height, watch);
            if save {
                settings.resolve_paths()?;
                let path = save_settings(&settings)?;
                println!("Saved settings to {}", path.display());
            }
            run_window(&settings)?;
        }
        Commands::Render {
            output,
            shaders,
            topology,
            view,
        } => {
            let topology = topology.unwrap_or_else(|| load_settings().topology);
            run_render(&output, shaders.as_deref(), topology, &view)?;
        }
        Commands::Trace {
            output,
            shaders,
            view,
        } => {
            run_trace(&output, shaders.as_deref(), &view)?;
        }
        Commands::Check { shaders } => {
            run_check(shaders.as_deref())?;
        }
        Commands::Scene { output } => {
            write_demo_scene(output.as_deref())?;
        }
        Commands::Init { dir, force } => {
            run_init(&dir, force)?;
        }
    }

    Ok(())
}

/// Command-line flags take precedence over stored settings
fn apply_run_overrides(
    settings: &mut Settings,
    shaders: Option<PathBuf>,
    topology: Option<Topology>,
    width: Option<u32>,
    height: Option<u32>,
    watch: bool,
) {
    if shaders.is_some() {
        settings.shader_dir = shaders;
    }
    if let Some(topology) = topology {
        settings.topology = topology;
    }
    if let Some(width) = width {
        settings.window_width = width;
    }
    if let Some(height) = height {
        settings.window_height = height;
    }
    if watch {
        settings.watch = true;
    }
}

fn run_window(settings: &Settings) -> Result<()> {
    let config = WindowConfig {
        width: settings.window_width,
        height: settings.window_height,
        topology: settings.topology,
        shader_dir: settings.shader_dir.clone(),
        watch: settings.watch,
        controller: settings.controller(),
        ..WindowConfig::default()
    };

    println!(
        "Opening {}x{} window ({} topology)...",
        config.width, config.height, config.topology
    );
    println!("{}", forge_render::controls_help());

    forge_render::run(config)
}

fn run_render(
    output: &Path,
    shaders: Option<&Path>,
    topology: Topology,
    view: &ViewArgs,
) -> Result<()> {
    println!(
        "Rendering to {} ({}x{}, {} topology)...",
        output.display(),
        view.width,
        view.height,
        topology
    );

    let (device, queue) = pollster::block_on(forge_render::init_headless())?;
    let backend = WgpuBackend::new(device, queue, HEADLESS_FORMAT);
    let mut renderer = Renderer::create(
        backend,
        library_for(shaders),
        topology,
        view.width,
        view.height,
    )?;

    let img = forge_render::render_to_image(&mut renderer, &view.camera(), view.time)?;
    renderer.destroy();

    img.save(output)
        .with_context(|| format!("Failed to save {}", output.display()))?;
    println!("Saved to: {}", output.display());
    Ok(())
}

fn run_trace(output: &Path, shaders: Option<&Path>, view: &ViewArgs) -> Result<()> {
    let scene = library_for(shaders).load_scene()?;
    println!(
        "Tracing {} nodes to {} ({}x{})...",
        scene.root.node_count(),
        output.display(),
        view.width,
        view.height
    );

    let img = forge_render::render_image(&scene, &view.camera(), view.width, view.height);
    img.save(output)
        .with_context(|| format!("Failed to save {}", output.display()))?;
    println!("Saved to: {}", output.display());
    Ok(())
}

fn run_check(shaders: Option<&Path>) -> Result<()> {
    let library = library_for(shaders);
    let mut failed = false;

    for topology in Topology::ALL {
        match library.build(topology) {
            Ok(_) => println!("{topology}: ok"),
            Err(e) => {
                println!("{topology}: FAILED\n{e}");
                failed = true;
            }
        }
    }

    if failed {
        bail!("shader check failed");
    }
    Ok(())
}

fn write_demo_scene(output: Option<&Path>) -> Result<()> {
    let json = Scene::demo().to_json_pretty()?;
    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote demo scene to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn run_init(dir: &Path, force: bool) -> Result<()> {
    ShaderLibrary::export_embedded(dir)?;

    let scene_path = dir.join(forge_render::shader::SCENE_FILE);
    if force || !scene_path.exists() {
        write_demo_scene(Some(&scene_path))?;
    } else {
        println!("Keeping existing {}", scene_path.display());
    }

    println!("Shaders written to {}", dir.display());
    println!("Run `forge run --shaders {} --watch` to edit them live.", dir.display());
    Ok(())
}
