//! Forge SDF - Scene trees, CPU reference raymarching, and WGSL generation
//!
//! This crate holds everything about the implicit scene that does not need a
//! GPU: the tagged-variant scene tree, its host-side validation, a CPU mirror
//! of the per-pixel raymarch/shadow/shading kernels, and the generator that
//! compiles a scene into the WGSL `scene_sdf` function used by the shaders.
//!
//! ## Key Types
//!
//! - [`SdfNode`] - Primitive and operator tree
//! - [`Scene`] - Root node plus light position and background color
//! - [`Hit`] - Signed distance and material color at a point
//! - [`WgslGenerator`] - Converts [`SdfNode`] trees to WGSL
//!
//! ## Example
//!
//! ```rust
//! use forge_sdf::{Scene, Sdf, sphere};
//! use glam::Vec3;
//!
//! let scene = Scene::new(sphere(1.0).colored(1.0, 0.0, 0.0));
//! let hit = scene.evaluate(Vec3::new(0.0, 0.0, 2.0));
//! assert!((hit.distance - 1.0).abs() < 1e-6);
//! ```

mod error;
mod eval;
pub mod ops;
pub mod primitives;
mod scene;
mod sdf_node;
pub mod trace;
mod wgsl_gen;

pub use error::{Result, SceneError};
pub use eval::{Sdf, evaluate};
pub use ops::Hit;
pub use scene::Scene;
pub use sdf_node::{
    Color, SdfNode, box3, capsule, cylinder, ground_plane, plane, rounded_box, sphere, torus,
};
pub use trace::{SurfaceHit, View};
pub use wgsl_gen::{
    CONSTANTS_MARKER, SCENE_SDF_MARKER, WgslGenerator, generate_constants, inject_scene,
};
