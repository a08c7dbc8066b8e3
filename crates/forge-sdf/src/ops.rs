//! Combining two hits
//!
//! Every operator works on a pair of [`Hit`]s so that the material color
//! travels with the distance. The smooth variants use the quadratic
//! smooth-min with blend radius `k`; subtraction and intersection are built
//! from smooth union by negating distances.

use glam::Vec3;

/// Signed distance and material color at a sample point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub distance: f32,
    pub color: Vec3,
}

impl Hit {
    pub fn new(distance: f32, color: Vec3) -> Self {
        Self { distance, color }
    }

    fn negated(self) -> Self {
        Self {
            distance: -self.distance,
            color: self.color,
        }
    }
}

/// The closer operand; ties keep `a`
#[inline]
pub fn union(a: Hit, b: Hit) -> Hit {
    if b.distance < a.distance { b } else { a }
}

/// `a` minus `b`, keeping `a`'s color
#[inline]
pub fn subtraction(a: Hit, b: Hit) -> Hit {
    Hit::new(a.distance.max(-b.distance), a.color)
}

/// Overlap of `a` and `b`, keeping `b`'s color
#[inline]
pub fn intersection(a: Hit, b: Hit) -> Hit {
    Hit::new(a.distance.max(b.distance), b.color)
}

/// Symmetric difference; color from the closer operand
#[inline]
pub fn xor(a: Hit, b: Hit) -> Hit {
    let lo = a.distance.min(b.distance);
    let hi = a.distance.max(b.distance);
    Hit::new(lo.max(-hi), union(a, b).color)
}

/// Quadratic smooth-min of the two distances with blended color
#[inline]
pub fn smooth_union(a: Hit, b: Hit, k: f32) -> Hit {
    let k4 = 4.0 * k;
    let h = (k4 - (a.distance - b.distance).abs()).max(0.0);
    let distance = a.distance.min(b.distance) - h * h / (16.0 * k);
    let t = (0.5 + 0.5 * (b.distance - a.distance) / k4).clamp(0.0, 1.0);
    Hit::new(distance, b.color.lerp(a.color, t))
}

/// `-smooth_union(-a, -b)`
#[inline]
pub fn smooth_intersection(a: Hit, b: Hit, k: f32) -> Hit {
    smooth_union(a.negated(), b.negated(), k).negated()
}

/// `-smooth_union(-a, b)`
#[inline]
pub fn smooth_subtraction(a: Hit, b: Hit, k: f32) -> Hit {
    smooth_union(a.negated(), b, k).negated()
}
