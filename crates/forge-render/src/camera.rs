//! Free-fly camera for real-time exploration
//!
//! The camera is a position plus yaw/pitch. The basis is rebuilt every frame
//! from the angles, so there is no accumulated drift.

// Motion input is one flag per movement key
#![allow(clippy::struct_excessive_bools)]

use forge_sdf::View;
use glam::Vec3;

/// Pitch limit in radians, just short of straight up/down
pub const PITCH_LIMIT: f32 = 1.57;

/// Largest frame delta applied to camera motion
pub const MAX_FRAME_DELTA: f32 = 0.1;

/// Free-fly camera state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    /// Rotation about world up, radians
    pub yaw: f32,
    /// Elevation, radians, kept in `[-PITCH_LIMIT, PITCH_LIMIT]`
    pub pitch: f32,
}

/// Orthonormal camera frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraBasis {
    pub forward: Vec3,
    pub right: Vec3,
    pub up: Vec3,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            yaw: 0.0,
            pitch: 0.0,
        }
    }
}

impl Camera {
    pub fn new(position: Vec3, yaw: f32, pitch: f32) -> Self {
        Self {
            position,
            yaw,
            pitch: pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT),
        }
    }

    /// Unit view direction
    pub fn forward(&self) -> Vec3 {
        let (sy, cy) = self.yaw.sin_cos();
        let (sp, cp) = self.pitch.sin_cos();
        Vec3::new(cp * sy, sp, -cp * cy)
    }

    /// Forward, right and up vectors for the current angles
    pub fn basis(&self) -> CameraBasis {
        let forward = self.forward();
        let right = forward.cross(Vec3::Y).normalize();
        let up = right.cross(forward);
        CameraBasis { forward, right, up }
    }

    /// Ray-generation frame for the CPU tracer
    pub fn view(&self) -> View {
        let basis = self.basis();
        View {
            origin: self.position,
            forward: basis.forward,
            right: basis.right,
            up: basis.up,
        }
    }

    /// Horizontal strafe direction, independent of pitch
    fn strafe_right(&self) -> Vec3 {
        let (sy, cy) = self.yaw.sin_cos();
        Vec3::new(cy, 0.0, sy)
    }
}

/// One frame of user input mapped to camera motion
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotionInput {
    pub forward: bool,
    pub back: bool,
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
    /// Relative pointer motion in pixels since the last frame
    pub pointer_dx: f32,
    pub pointer_dy: f32,
}

/// Applies [`MotionInput`] to a [`Camera`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraController {
    /// Movement speed in units per second
    pub speed: f32,
    /// Radians per pixel of pointer motion
    pub sensitivity: f32,
}

impl Default for CameraController {
    fn default() -> Self {
        Self {
            speed: 4.0,
            sensitivity: 0.002,
        }
    }
}

impl CameraController {
    pub fn new(speed: f32, sensitivity: f32) -> Self {
        Self { speed, sensitivity }
    }

    /// Advance the camera by one frame
    pub fn update(&self, camera: &mut Camera, dt: f32, input: &MotionInput) {
        let dt = dt.clamp(0.0, MAX_FRAME_DELTA);

        camera.yaw += input.pointer_dx * self.sensitivity;
        camera.pitch = (camera.pitch - input.pointer_dy * self.sensitivity)
            .clamp(-PITCH_LIMIT, PITCH_LIMIT);

        let forward = camera.forward();
        let right = camera.strafe_right();

        let mut motion = Vec3::ZERO;
        if input.forward {
            motion += forward;
        }
        if input.back {
            motion -= forward;
        }
        if input.right {
            motion += right;
        }
        if input.left {
            motion -= right;
        }
        if input.up {
            motion += Vec3::Y;
        }
        if input.down {
            motion -= Vec3::Y;
        }

        let len = motion.length();
        if len > 1e-4 {
            camera.position += motion * (self.speed * dt / len);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_orthonormal(basis: &CameraBasis) {
        assert_relative_eq!(basis.forward.length(), 1.0, epsilon = 1e-5);
        assert_relative_eq!(basis.right.length(), 1.0, epsilon = 1e-5);
        assert_relative_eq!(basis.up.length(), 1.0, epsilon = 1e-5);
        assert_relative_eq!(basis.forward.dot(basis.right), 0.0, epsilon = 1e-5);
        assert_relative_eq!(basis.forward.dot(basis.up), 0.0, epsilon = 1e-5);
        assert_relative_eq!(basis.right.dot(basis.up), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_default_looks_down_negative_z() {
        let basis = Camera::default().basis();
        assert_relative_eq!(basis.forward.z, -1.0);
        assert_relative_eq!(basis.right.x, 1.0);
        assert_relative_eq!(basis.up.y, 1.0);
    }

    #[test]
    fn test_basis_orthonormal() {
        for yaw in [-3.0_f32, -1.0, 0.0, 0.7, 2.5, 10.0] {
            for pitch in [-1.57_f32, -0.8, 0.0, 0.3, 1.2, 1.57] {
                assert_orthonormal(&Camera::new(Vec3::ZERO, yaw, pitch).basis());
            }
        }
    }

    #[test]
    fn test_pitch_stays_clamped() {
        let controller = CameraController::default();
        let mut camera = Camera::default();
        let up = MotionInput {
            pointer_dy: -5000.0,
            ..Default::default()
        };
        for _ in 0..10 {
            controller.update(&mut camera, 0.016, &up);
            assert!(camera.pitch <= PITCH_LIMIT);
        }
        assert_relative_eq!(camera.pitch, PITCH_LIMIT);

        let down = MotionInput {
            pointer_dy: 100_000.0,
            ..Default::default()
        };
        controller.update(&mut camera, 0.016, &down);
        assert_relative_eq!(camera.pitch, -PITCH_LIMIT);
    }

    #[test]
    fn test_yaw_follows_pointer() {
        let controller = CameraController::default();
        let mut camera = Camera::default();
        let input = MotionInput {
            pointer_dx: 100.0,
            ..Default::default()
        };
        controller.update(&mut camera, 0.016, &input);
        assert_relative_eq!(camera.yaw, 0.2, epsilon = 1e-6);
    }

    #[test]
    fn test_forward_moves_speed_times_dt() {
        let controller = CameraController::default();
        let mut camera = Camera::default();
        let input = MotionInput {
            forward: true,
            ..Default::default()
        };
        controller.update(&mut camera, 0.05, &input);
        assert_relative_eq!(camera.position.z, -0.2, epsilon = 1e-6);
    }

    #[test]
    fn test_diagonal_motion_is_normalized() {
        let controller = CameraController::default();
        let mut camera = Camera::default();
        let input = MotionInput {
            forward: true,
            right: true,
            up: true,
            ..Default::default()
        };
        controller.update(&mut camera, 0.1, &input);
        assert_relative_eq!(camera.position.length(), 0.4, epsilon = 1e-5);
    }

    #[test]
    fn test_opposite_keys_cancel() {
        let controller = CameraController::default();
        let mut camera = Camera::default();
        let input = MotionInput {
            left: true,
            right: true,
            ..Default::default()
        };
        controller.update(&mut camera, 0.1, &input);
        assert_eq!(camera.position, Vec3::ZERO);
    }

    #[test]
    fn test_large_dt_is_clamped() {
        let controller = CameraController::default();
        let mut camera = Camera::default();
        let input = MotionInput {
            right: true,
            ..Default::default()
        };
        controller.update(&mut camera, 5.0, &input);
        assert_relative_eq!(camera.position.x, 0.4, epsilon = 1e-6);
    }

    #[test]
    fn test_strafe_ignores_pitch() {
        let controller = CameraController::default();
        let mut camera = Camera::new(Vec3::ZERO, 0.0, 1.2);
        let input = MotionInput {
            right: true,
            ..Default::default()
        };
        controller.update(&mut camera, 0.1, &input);
        assert_relative_eq!(camera.position.y, 0.0);
    }
}
