//! Primitive distance functions
//!
//! Each function takes the query point already in the primitive's local
//! frame (center subtracted) and returns the signed distance. The WGSL
//! library in `common.wgsl` mirrors these one to one.

use glam::{Vec2, Vec3};

/// Signed distance to a sphere at the origin
#[inline]
pub fn sd_sphere(p: Vec3, radius: f32) -> f32 {
    p.length() - radius
}

/// Signed distance to an axis-aligned box with half extents `b`
#[inline]
pub fn sd_box(p: Vec3, b: Vec3) -> f32 {
    let q = p.abs() - b;
    q.max(Vec3::ZERO).length() + q.x.max(q.y.max(q.z)).min(0.0)
}

/// Box whose outer half extents are `b`, edges rounded by `r`
#[inline]
pub fn sd_rounded_box(p: Vec3, b: Vec3, r: f32) -> f32 {
    sd_box(p, b - Vec3::splat(r)) - r
}

/// Torus lying in the XZ plane
#[inline]
pub fn sd_torus(p: Vec3, major_radius: f32, minor_radius: f32) -> f32 {
    let q = Vec2::new(Vec2::new(p.x, p.z).length() - major_radius, p.y);
    q.length() - minor_radius
}

/// Capsule along Y whose segment spans `[-half_height, half_height]`
#[inline]
pub fn sd_capsule(p: Vec3, radius: f32, half_height: f32) -> f32 {
    let y = p.y.clamp(-half_height, half_height);
    Vec3::new(p.x, p.y - y, p.z).length() - radius
}

/// Capped cylinder along Y
#[inline]
pub fn sd_cylinder(p: Vec3, radius: f32, half_height: f32) -> f32 {
    let d = Vec2::new(Vec2::new(p.x, p.z).length(), p.y).abs() - Vec2::new(radius, half_height);
    d.x.max(d.y).min(0.0) + d.max(Vec2::ZERO).length()
}

/// Plane with unit `normal`
#[inline]
pub fn sd_plane(p: Vec3, normal: Vec3, offset: f32) -> f32 {
    p.dot(normal) + offset
}
