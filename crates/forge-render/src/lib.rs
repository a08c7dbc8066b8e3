//! Forge Render - WGPU raymarching pipeline manager
//!
//! This crate turns a [`forge_sdf::Scene`] into pixels on the GPU.
//!
//! ## Features
//!
//! - Two pipeline topologies: a fullscreen fragment raymarch
//!   ([`Topology::Direct`]) and a compute kernel writing an image that a
//!   display pass blits to the target ([`Topology::ComputeBlit`])
//! - All-or-nothing shader hot reload: a failed reload leaves the running
//!   programs untouched
//! - Host-side WGSL compile and link checks with `naga`, usable without a GPU
//! - Free-fly camera, headless rendering to images, CPU reference renderer
//!
//! ## Example
//!
//! ```rust,ignore
//! use forge_render::{Renderer, ShaderLibrary, Topology, WgpuBackend, init_headless};
//!
//! let (device, queue) = pollster::block_on(init_headless())?;
//! let backend = WgpuBackend::new(device, queue, forge_render::HEADLESS_FORMAT);
//! let library = ShaderLibrary::embedded();
//! let mut renderer = Renderer::create(backend, library, Topology::Direct, 640, 480)?;
//! let camera = forge_render::Camera::default();
//! let image = forge_render::render_to_image(&mut renderer, &camera, 0.0)?;
//! ```

pub mod backend;
pub mod camera;
mod error;
pub mod renderer;
pub mod shader;
pub mod software;
pub mod topology;
pub mod uniforms;
pub mod watch;
pub mod wgpu_backend;
pub mod window;

// Re-export wgpu for users who need texture formats, etc.
pub use wgpu;
pub use winit;

pub use backend::GpuBackend;
pub use camera::{Camera, CameraBasis, CameraController, MotionInput, PITCH_LIMIT};
pub use error::{RenderError, Result};
pub use renderer::Renderer;
pub use shader::{ProgramKind, ProgramSource, ProgramSources, ShaderLibrary};
pub use software::render_image;
pub use topology::{Topology, WORKGROUP_SIZE, dispatch_size};
pub use uniforms::FrameUniforms;
pub use watch::{ShaderWatcher, WatchEvent};
pub use wgpu_backend::{
    HEADLESS_FORMAT, WgpuBackend, init_headless, init_with_surface, render_to_image,
};
pub use window::{WindowConfig, controls_help, run};
