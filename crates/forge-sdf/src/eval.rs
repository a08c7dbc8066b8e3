//! CPU evaluation of SDF trees
//!
//! Mirrors the generated WGSL `scene_sdf` exactly so that the CPU tracer and
//! the GPU kernels agree on every distance and color.

use glam::Vec3;

use crate::ops::{self, Hit};
use crate::primitives::{
    sd_box, sd_capsule, sd_cylinder, sd_plane, sd_rounded_box, sd_sphere, sd_torus,
};
use crate::sdf_node::SdfNode;

/// Anything that can be sampled as a colored distance field
pub trait Sdf {
    /// Signed distance and material color at `p`
    fn evaluate(&self, p: Vec3) -> Hit;

    /// Signed distance only
    fn distance(&self, p: Vec3) -> f32 {
        self.evaluate(p).distance
    }
}

impl Sdf for SdfNode {
    fn evaluate(&self, p: Vec3) -> Hit {
        evaluate(self, p)
    }
}

/// Evaluate a node at point `p`
pub fn evaluate(node: &SdfNode, p: Vec3) -> Hit {
    match node {
        SdfNode::Sphere {
            radius,
            center,
            color,
        } => Hit::new(
            sd_sphere(p - Vec3::from(*center), *radius),
            Vec3::from(*color),
        ),
        SdfNode::Box {
            half_extents,
            center,
            color,
        } => Hit::new(
            sd_box(p - Vec3::from(*center), Vec3::from(*half_extents)),
            Vec3::from(*color),
        ),
        SdfNode::RoundedBox {
            half_extents,
            radius,
            center,
            color,
        } => Hit::new(
            sd_rounded_box(p - Vec3::from(*center), Vec3::from(*half_extents), *radius),
            Vec3::from(*color),
        ),
        SdfNode::Torus {
            major_radius,
            minor_radius,
            center,
            color,
        } => Hit::new(
            sd_torus(p - Vec3::from(*center), *major_radius, *minor_radius),
            Vec3::from(*color),
        ),
        SdfNode::Capsule {
            radius,
            half_height,
            center,
            color,
        } => Hit::new(
            sd_capsule(p - Vec3::from(*center), *radius, *half_height),
            Vec3::from(*color),
        ),
        SdfNode::Cylinder {
            radius,
            half_height,
            center,
            color,
        } => Hit::new(
            sd_cylinder(p - Vec3::from(*center), *radius, *half_height),
            Vec3::from(*color),
        ),
        SdfNode::Plane {
            normal,
            offset,
            color,
        } => Hit::new(
            sd_plane(p, Vec3::from(*normal).normalize_or_zero(), *offset),
            Vec3::from(*color),
        ),

        SdfNode::Union { a, b } => ops::union(evaluate(a, p), evaluate(b, p)),
        SdfNode::Subtraction { a, b } => ops::subtraction(evaluate(a, p), evaluate(b, p)),
        SdfNode::Intersection { a, b } => ops::intersection(evaluate(a, p), evaluate(b, p)),
        SdfNode::Xor { a, b } => ops::xor(evaluate(a, p), evaluate(b, p)),

        SdfNode::SmoothUnion { a, b, k } => ops::smooth_union(evaluate(a, p), evaluate(b, p), *k),
        SdfNode::SmoothSubtraction { a, b, k } => {
            ops::smooth_subtraction(evaluate(a, p), evaluate(b, p), *k)
        }
        SdfNode::SmoothIntersection { a, b, k } => {
            ops::smooth_intersection(evaluate(a, p), evaluate(b, p), *k)
        }
    }
}
