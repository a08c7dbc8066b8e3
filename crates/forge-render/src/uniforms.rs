//! Per-frame uniform block shared by every program

use bytemuck::{Pod, Zeroable};

use crate::camera::Camera;

/// Uniform buffer data sent to the GPU.
///
/// Matches `FrameUniforms` in `common.wgsl`; each `vec3` is padded to 16
/// bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FrameUniforms {
    pub resolution: [f32; 2],
    pub time: f32,
    pub _pad0: f32,
    pub camera_pos: [f32; 3],
    pub _pad1: f32,
    pub forward: [f32; 3],
    pub _pad2: f32,
    pub right: [f32; 3],
    pub _pad3: f32,
    pub up: [f32; 3],
    pub _pad4: f32,
}

impl FrameUniforms {
    pub fn new(camera: &Camera, width: u32, height: u32, time: f32) -> Self {
        let basis = camera.basis();
        Self {
            resolution: [width as f32, height as f32],
            time,
            _pad0: 0.0,
            camera_pos: camera.position.to_array(),
            _pad1: 0.0,
            forward: basis.forward.to_array(),
            _pad2: 0.0,
            right: basis.right.to_array(),
            _pad3: 0.0,
            up: basis.up.to_array(),
            _pad4: 0.0,
        }
    }
}
