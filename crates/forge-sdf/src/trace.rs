//! Sphere tracing, soft shadows and shading on the CPU
//!
//! These are the reference versions of `march`, `soft_shadow`, `calc_normal`
//! and `shade` in `common.wgsl`. The march constants below are also injected
//! into the generated WGSL so both sides step identically.

use glam::{Vec2, Vec3};

use crate::eval::Sdf;
use crate::scene::Scene;

/// Maximum sphere-tracing iterations per primary ray
pub const MAX_STEPS: u32 = 128;
/// A sample closer than this counts as a surface hit
pub const HIT_THRESHOLD: f32 = 0.001;
/// Rays that travel further than this are misses
pub const MAX_DISTANCE: f32 = 100.0;
/// Offset for central-difference normals
pub const NORMAL_EPSILON: f32 = 0.0001;
/// Maximum iterations per shadow ray
pub const SHADOW_STEPS: u32 = 64;
/// Penumbra sharpness factor
pub const SHADOW_SOFTNESS: f32 = 32.0;
/// Shadow ray origin offset along the normal
pub const SHADOW_BIAS: f32 = 0.001;

/// Result of a successful march
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceHit {
    pub position: Vec3,
    pub normal: Vec3,
    pub color: Vec3,
    /// Distance traveled along the ray
    pub distance: f32,
    pub steps: u32,
}

/// Camera origin and orthonormal basis used to build primary rays
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct View {
    pub origin: Vec3,
    pub forward: Vec3,
    pub right: Vec3,
    pub up: Vec3,
}

/// Sphere-trace from `origin` along the unit vector `direction`
pub fn march<S: Sdf + ?Sized>(scene: &S, origin: Vec3, direction: Vec3) -> Option<SurfaceHit> {
    let mut t: f32 = 0.0;
    for step in 0..MAX_STEPS {
        let p = origin + direction * t;
        let hit = scene.evaluate(p);
        if hit.distance < HIT_THRESHOLD {
            return Some(SurfaceHit {
                position: p,
                normal: estimate_normal(scene, p),
                color: hit.color,
                distance: t,
                steps: step + 1,
            });
        }
        t += hit.distance;
        if t > MAX_DISTANCE {
            return None;
        }
    }
    None
}

/// Central-difference gradient, normalized
pub fn estimate_normal<S: Sdf + ?Sized>(scene: &S, p: Vec3) -> Vec3 {
    let ex = Vec3::new(NORMAL_EPSILON, 0.0, 0.0);
    let ey = Vec3::new(0.0, NORMAL_EPSILON, 0.0);
    let ez = Vec3::new(0.0, 0.0, NORMAL_EPSILON);
    Vec3::new(
        scene.distance(p + ex) - scene.distance(p - ex),
        scene.distance(p + ey) - scene.distance(p - ey),
        scene.distance(p + ez) - scene.distance(p - ez),
    )
    .normalize_or_zero()
}

/// Soft-shadow visibility in [0, 1] along a ray of length `max_distance`
pub fn shadow<S: Sdf + ?Sized>(
    scene: &S,
    origin: Vec3,
    direction: Vec3,
    max_distance: f32,
) -> f32 {
    let mut res: f32 = 1.0;
    let mut t: f32 = 0.0;
    for _ in 0..SHADOW_STEPS {
        let d = scene.distance(origin + direction * t);
        if d < HIT_THRESHOLD {
            return 0.0;
        }
        res = res.min(SHADOW_SOFTNESS * d / t.max(HIT_THRESHOLD));
        t += d;
        if t >= max_distance {
            break;
        }
    }
    res.clamp(0.0, 1.0)
}

/// Lambert term from the point light, attenuated by the soft shadow
pub fn shade<S: Sdf + ?Sized>(
    scene: &S,
    position: Vec3,
    normal: Vec3,
    color: Vec3,
    light: Vec3,
) -> Vec3 {
    let to_light = light - position;
    let light_dir = to_light.normalize_or_zero();
    let intensity = light_dir.dot(normal).max(0.0);
    let visibility = shadow(
        scene,
        position + normal * SHADOW_BIAS,
        light_dir,
        to_light.length() - SHADOW_BIAS,
    );
    color * intensity * visibility
}

/// World-space direction through `pixel` (pixel-center coordinates, row 0 at
/// the top) for an image of size `resolution`
pub fn primary_ray(view: &View, pixel: Vec2, resolution: Vec2) -> Vec3 {
    let uv = Vec2::new(
        (2.0 * pixel.x - resolution.x) / resolution.y,
        (resolution.y - 2.0 * pixel.y) / resolution.y,
    );
    (view.forward + uv.x * view.right + uv.y * view.up).normalize()
}

/// Full per-pixel pipeline: primary ray, march, shade or background
pub fn render_pixel(scene: &Scene, view: &View, pixel: Vec2, resolution: Vec2) -> Vec3 {
    let direction = primary_ray(view, pixel, resolution);
    match march(scene, view.origin, direction) {
        Some(hit) => shade(scene, hit.position, hit.normal, hit.color, scene.light_position()),
        None => scene.background_color(),
    }
}
