//! SDF scene tree
//!
//! A scene is a tree whose leaves are primitives (each with a center offset
//! and a material color) and whose inner nodes are boolean or smooth-blend
//! operators. The tree is plain data: it is validated on the host, evaluated
//! on the CPU by [`crate::evaluate`], and compiled to WGSL by
//! [`crate::WgslGenerator`].

use serde::{Deserialize, Serialize};

use crate::error::{Result, SceneError};

/// Linear RGB material color, nominally in [0, 1]
pub type Color = [f32; 3];

const DEFAULT_COLOR: Color = [0.8, 0.8, 0.8];

fn default_color() -> Color {
    DEFAULT_COLOR
}

/// A node in the SDF scene tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SdfNode {
    // ========================================================================
    // Primitives
    // ========================================================================
    /// Sphere centered at `center`
    Sphere {
        radius: f32,
        #[serde(default)]
        center: [f32; 3],
        #[serde(default = "default_color")]
        color: Color,
    },

    /// Axis-aligned box with half extents
    Box {
        half_extents: [f32; 3],
        #[serde(default)]
        center: [f32; 3],
        #[serde(default = "default_color")]
        color: Color,
    },

    /// Box with edges rounded by `radius`
    RoundedBox {
        half_extents: [f32; 3],
        radius: f32,
        #[serde(default)]
        center: [f32; 3],
        #[serde(default = "default_color")]
        color: Color,
    },

    /// Torus in the XZ plane
    Torus {
        major_radius: f32,
        minor_radius: f32,
        #[serde(default)]
        center: [f32; 3],
        #[serde(default = "default_color")]
        color: Color,
    },

    /// Capsule along the Y axis
    Capsule {
        radius: f32,
        half_height: f32,
        #[serde(default)]
        center: [f32; 3],
        #[serde(default = "default_color")]
        color: Color,
    },

    /// Capped cylinder along the Y axis
    Cylinder {
        radius: f32,
        half_height: f32,
        #[serde(default)]
        center: [f32; 3],
        #[serde(default = "default_color")]
        color: Color,
    },

    /// Infinite plane `dot(p, normal) + offset = 0`
    Plane {
        normal: [f32; 3],
        offset: f32,
        #[serde(default = "default_color")]
        color: Color,
    },

    // ========================================================================
    // Boolean operations
    // ========================================================================
    /// Closest of `a` and `b`
    Union { a: Box<SdfNode>, b: Box<SdfNode> },

    /// `a` with `b` carved out
    Subtraction { a: Box<SdfNode>, b: Box<SdfNode> },

    /// Region inside both `a` and `b`
    Intersection { a: Box<SdfNode>, b: Box<SdfNode> },

    /// Region inside exactly one of `a` and `b`
    Xor { a: Box<SdfNode>, b: Box<SdfNode> },

    // ========================================================================
    // Smooth blends
    // ========================================================================
    SmoothUnion {
        a: Box<SdfNode>,
        b: Box<SdfNode>,
        k: f32,
    },
    SmoothSubtraction {
        a: Box<SdfNode>,
        b: Box<SdfNode>,
        k: f32,
    },
    SmoothIntersection {
        a: Box<SdfNode>,
        b: Box<SdfNode>,
        k: f32,
    },
}

// ============================================================================
// Constructors
// ============================================================================

/// Sphere of `radius` at the origin
pub fn sphere(radius: f32) -> SdfNode {
    SdfNode::Sphere {
        radius,
        center: [0.0; 3],
        color: DEFAULT_COLOR,
    }
}

/// Box with the given half extents at the origin
pub fn box3(half_x: f32, half_y: f32, half_z: f32) -> SdfNode {
    SdfNode::Box {
        half_extents: [half_x, half_y, half_z],
        center: [0.0; 3],
        color: DEFAULT_COLOR,
    }
}

pub fn rounded_box(half_x: f32, half_y: f32, half_z: f32, radius: f32) -> SdfNode {
    SdfNode::RoundedBox {
        half_extents: [half_x, half_y, half_z],
        radius,
        center: [0.0; 3],
        color: DEFAULT_COLOR,
    }
}

pub fn torus(major_radius: f32, minor_radius: f32) -> SdfNode {
    SdfNode::Torus {
        major_radius,
        minor_radius,
        center: [0.0; 3],
        color: DEFAULT_COLOR,
    }
}

pub fn capsule(radius: f32, half_height: f32) -> SdfNode {
    SdfNode::Capsule {
        radius,
        half_height,
        center: [0.0; 3],
        color: DEFAULT_COLOR,
    }
}

pub fn cylinder(radius: f32, half_height: f32) -> SdfNode {
    SdfNode::Cylinder {
        radius,
        half_height,
        center: [0.0; 3],
        color: DEFAULT_COLOR,
    }
}

/// Plane through the origin with the given normal
pub fn plane(normal: [f32; 3]) -> SdfNode {
    SdfNode::Plane {
        normal,
        offset: 0.0,
        color: DEFAULT_COLOR,
    }
}

/// Horizontal floor at height `y`
pub fn ground_plane(y: f32) -> SdfNode {
    SdfNode::Plane {
        normal: [0.0, 1.0, 0.0],
        offset: -y,
        color: DEFAULT_COLOR,
    }
}

impl SdfNode {
    // ------------------------------------------------------------------------
    // Combinators
    // ------------------------------------------------------------------------

    pub fn union(self, other: SdfNode) -> SdfNode {
        SdfNode::Union {
            a: Box::new(self),
            b: Box::new(other),
        }
    }

    pub fn subtract(self, other: SdfNode) -> SdfNode {
        SdfNode::Subtraction {
            a: Box::new(self),
            b: Box::new(other),
        }
    }

    pub fn intersect(self, other: SdfNode) -> SdfNode {
        SdfNode::Intersection {
            a: Box::new(self),
            b: Box::new(other),
        }
    }

    pub fn xor(self, other: SdfNode) -> SdfNode {
        SdfNode::Xor {
            a: Box::new(self),
            b: Box::new(other),
        }
    }

    pub fn smooth_union(self, other: SdfNode, k: f32) -> SdfNode {
        SdfNode::SmoothUnion {
            a: Box::new(self),
            b: Box::new(other),
            k,
        }
    }

    pub fn smooth_subtract(self, other: SdfNode, k: f32) -> SdfNode {
        SdfNode::SmoothSubtraction {
            a: Box::new(self),
            b: Box::new(other),
            k,
        }
    }

    pub fn smooth_intersect(self, other: SdfNode, k: f32) -> SdfNode {
        SdfNode::SmoothIntersection {
            a: Box::new(self),
            b: Box::new(other),
            k,
        }
    }

    // ------------------------------------------------------------------------
    // Placement and material
    // ------------------------------------------------------------------------

    /// Translate the node by `(x, y, z)`.
    ///
    /// Primitives shift their center (planes shift their offset); operators
    /// translate both operands.
    pub fn at(self, x: f32, y: f32, z: f32) -> SdfNode {
        self.translated([x, y, z])
    }

    fn translated(self, t: [f32; 3]) -> SdfNode {
        let add = |c: [f32; 3]| [c[0] + t[0], c[1] + t[1], c[2] + t[2]];
        match self {
            SdfNode::Sphere {
                radius,
                center,
                color,
            } => SdfNode::Sphere {
                radius,
                center: add(center),
                color,
            },
            SdfNode::Box {
                half_extents,
                center,
                color,
            } => SdfNode::Box {
                half_extents,
                center: add(center),
                color,
            },
            SdfNode::RoundedBox {
                half_extents,
                radius,
                center,
                color,
            } => SdfNode::RoundedBox {
                half_extents,
                radius,
                center: add(center),
                color,
            },
            SdfNode::Torus {
                major_radius,
                minor_radius,
                center,
                color,
            } => SdfNode::Torus {
                major_radius,
                minor_radius,
                center: add(center),
                color,
            },
            SdfNode::Capsule {
                radius,
                half_height,
                center,
                color,
            } => SdfNode::Capsule {
                radius,
                half_height,
                center: add(center),
                color,
            },
            SdfNode::Cylinder {
                radius,
                half_height,
                center,
                color,
            } => SdfNode::Cylinder {
                radius,
                half_height,
                center: add(center),
                color,
            },
            SdfNode::Plane {
                normal,
                offset,
                color,
            } => {
                // d(p - t) = dot(p, n) + offset - dot(t, n), with n normalized
                let len = (normal[0] * normal[0] + normal[1] * normal[1] + normal[2] * normal[2])
                    .sqrt();
                let shift = if len > 0.0 {
                    (t[0] * normal[0] + t[1] * normal[1] + t[2] * normal[2]) / len
                } else {
                    0.0
                };
                SdfNode::Plane {
                    normal,
                    offset: offset - shift,
                    color,
                }
            }
            SdfNode::Union { a, b } => SdfNode::Union {
                a: Box::new(a.translated(t)),
                b: Box::new(b.translated(t)),
            },
            SdfNode::Subtraction { a, b } => SdfNode::Subtraction {
                a: Box::new(a.translated(t)),
                b: Box::new(b.translated(t)),
            },
            SdfNode::Intersection { a, b } => SdfNode::Intersection {
                a: Box::new(a.translated(t)),
                b: Box::new(b.translated(t)),
            },
            SdfNode::Xor { a, b } => SdfNode::Xor {
                a: Box::new(a.translated(t)),
                b: Box::new(b.translated(t)),
            },
            SdfNode::SmoothUnion { a, b, k } => SdfNode::SmoothUnion {
                a: Box::new(a.translated(t)),
                b: Box::new(b.translated(t)),
                k,
            },
            SdfNode::SmoothSubtraction { a, b, k } => SdfNode::SmoothSubtraction {
                a: Box::new(a.translated(t)),
                b: Box::new(b.translated(t)),
                k,
            },
            SdfNode::SmoothIntersection { a, b, k } => SdfNode::SmoothIntersection {
                a: Box::new(a.translated(t)),
                b: Box::new(b.translated(t)),
                k,
            },
        }
    }

    /// Set the material color of every primitive under this node
    pub fn colored(mut self, r: f32, g: f32, b: f32) -> SdfNode {
        self.paint([r, g, b]);
        self
    }

    fn paint(&mut self, rgb: Color) {
        if let Some((a, b)) = self.children_mut() {
            a.paint(rgb);
            b.paint(rgb);
            return;
        }
        match self {
            SdfNode::Sphere { color, .. }
            | SdfNode::Box { color, .. }
            | SdfNode::RoundedBox { color, .. }
            | SdfNode::Torus { color, .. }
            | SdfNode::Capsule { color, .. }
            | SdfNode::Cylinder { color, .. }
            | SdfNode::Plane { color, .. } => *color = rgb,
            _ => {}
        }
    }

    // ------------------------------------------------------------------------
    // Structure
    // ------------------------------------------------------------------------

    /// Operands of an operator node, `None` for primitives
    pub fn children(&self) -> Option<(&SdfNode, &SdfNode)> {
        match self {
            SdfNode::Union { a, b }
            | SdfNode::Subtraction { a, b }
            | SdfNode::Intersection { a, b }
            | SdfNode::Xor { a, b }
            | SdfNode::SmoothUnion { a, b, .. }
            | SdfNode::SmoothSubtraction { a, b, .. }
            | SdfNode::SmoothIntersection { a, b, .. } => Some((&**a, &**b)),
            _ => None,
        }
    }

    fn children_mut(&mut self) -> Option<(&mut SdfNode, &mut SdfNode)> {
        match self {
            SdfNode::Union { a, b }
            | SdfNode::Subtraction { a, b }
            | SdfNode::Intersection { a, b }
            | SdfNode::Xor { a, b }
            | SdfNode::SmoothUnion { a, b, .. }
            | SdfNode::SmoothSubtraction { a, b, .. }
            | SdfNode::SmoothIntersection { a, b, .. } => Some((&mut **a, &mut **b)),
            _ => None,
        }
    }

    /// Total number of nodes in the tree
    pub fn node_count(&self) -> usize {
        match self.children() {
            Some((a, b)) => 1 + a.node_count() + b.node_count(),
            None => 1,
        }
    }

    /// Snake-case name used in the JSON `kind` tag and error paths
    pub fn kind_name(&self) -> &'static str {
        match self {
            SdfNode::Sphere { .. } => "sphere",
            SdfNode::Box { .. } => "box",
            SdfNode::RoundedBox { .. } => "rounded_box",
            SdfNode::Torus { .. } => "torus",
            SdfNode::Capsule { .. } => "capsule",
            SdfNode::Cylinder { .. } => "cylinder",
            SdfNode::Plane { .. } => "plane",
            SdfNode::Union { .. } => "union",
            SdfNode::Subtraction { .. } => "subtraction",
            SdfNode::Intersection { .. } => "intersection",
            SdfNode::Xor { .. } => "xor",
            SdfNode::SmoothUnion { .. } => "smooth_union",
            SdfNode::SmoothSubtraction { .. } => "smooth_subtraction",
            SdfNode::SmoothIntersection { .. } => "smooth_intersection",
        }
    }

    // ------------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------------

    /// Check every parameter in the tree.
    ///
    /// Errors carry a dotted path such as `root.b.a` naming the node.
    pub fn validate(&self) -> Result<()> {
        self.validate_at("root")
    }

    fn validate_at(&self, path: &str) -> Result<()> {
        match self {
            SdfNode::Sphere {
                radius,
                center,
                color,
            } => {
                positive(path, "radius", *radius)?;
                finite3(path, "center", center)?;
                check_color(path, color)
            }
            SdfNode::Box {
                half_extents,
                center,
                color,
            } => {
                positive3(path, "half_extents", half_extents)?;
                finite3(path, "center", center)?;
                check_color(path, color)
            }
            SdfNode::RoundedBox {
                half_extents,
                radius,
                center,
                color,
            } => {
                positive3(path, "half_extents", half_extents)?;
                positive(path, "radius", *radius)?;
                let smallest = half_extents.iter().copied().fold(f32::INFINITY, f32::min);
                if *radius > smallest {
                    return Err(SceneError::invalid(
                        path,
                        format!("radius {radius} exceeds smallest half extent {smallest}"),
                    ));
                }
                finite3(path, "center", center)?;
                check_color(path, color)
            }
            SdfNode::Torus {
                major_radius,
                minor_radius,
                center,
                color,
            } => {
                positive(path, "major_radius", *major_radius)?;
                positive(path, "minor_radius", *minor_radius)?;
                finite3(path, "center", center)?;
                check_color(path, color)
            }
            SdfNode::Capsule {
                radius,
                half_height,
                center,
                color,
            }
            | SdfNode::Cylinder {
                radius,
                half_height,
                center,
                color,
            } => {
                positive(path, "radius", *radius)?;
                positive(path, "half_height", *half_height)?;
                finite3(path, "center", center)?;
                check_color(path, color)
            }
            SdfNode::Plane {
                normal,
                offset,
                color,
            } => {
                finite3(path, "normal", normal)?;
                let len_sq = normal[0] * normal[0] + normal[1] * normal[1] + normal[2] * normal[2];
                if len_sq <= f32::EPSILON {
                    return Err(SceneError::invalid(path, "plane normal must be non-zero"));
                }
                if !offset.is_finite() {
                    return Err(SceneError::invalid(path, "offset must be finite"));
                }
                check_color(path, color)
            }
            SdfNode::Union { a, b }
            | SdfNode::Subtraction { a, b }
            | SdfNode::Intersection { a, b }
            | SdfNode::Xor { a, b } => {
                a.validate_at(&format!("{path}.a"))?;
                b.validate_at(&format!("{path}.b"))
            }
            SdfNode::SmoothUnion { a, b, k }
            | SdfNode::SmoothSubtraction { a, b, k }
            | SdfNode::SmoothIntersection { a, b, k } => {
                positive(path, "k", *k)?;
                a.validate_at(&format!("{path}.a"))?;
                b.validate_at(&format!("{path}.b"))
            }
        }
    }
}

fn positive(path: &str, name: &str, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SceneError::invalid(
            path,
            format!("{name} must be positive and finite, got {value}"),
        ))
    }
}

fn positive3(path: &str, name: &str, values: &[f32; 3]) -> Result<()> {
    values.iter().try_for_each(|v| positive(path, name, *v))
}

fn finite3(path: &str, name: &str, values: &[f32; 3]) -> Result<()> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(SceneError::invalid(
            path,
            format!("{name} must be finite, got {values:?}"),
        ))
    }
}

fn check_color(path: &str, color: &Color) -> Result<()> {
    finite3(path, "color", color)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_center_and_color() {
        let node = sphere(1.5).at(1.0, 2.0, 3.0).colored(1.0, 0.0, 0.0);
        assert_eq!(
            node,
            SdfNode::Sphere {
                radius: 1.5,
                center: [1.0, 2.0, 3.0],
                color: [1.0, 0.0, 0.0],
            }
        );
    }

    #[test]
    fn test_at_translates_operator_leaves() {
        let node = sphere(1.0).union(box3(1.0, 1.0, 1.0)).at(0.0, 1.0, 0.0);
        let (a, b) = node.children().unwrap();
        assert!(matches!(a, SdfNode::Sphere { center, .. } if *center == [0.0, 1.0, 0.0]));
        assert!(matches!(b, SdfNode::Box { center, .. } if *center == [0.0, 1.0, 0.0]));
    }

    #[test]
    fn test_at_shifts_plane_offset() {
        let floor = ground_plane(0.0).at(0.0, -2.0, 0.0);
        assert!(matches!(floor, SdfNode::Plane { offset, .. } if (offset - 2.0).abs() < 1e-6));
    }

    #[test]
    fn test_node_count() {
        let node = sphere(1.0)
            .smooth_union(box3(1.0, 1.0, 1.0), 0.2)
            .subtract(torus(1.0, 0.25));
        assert_eq!(node.node_count(), 5);
        assert!(node.children().is_some());
    }

    #[test]
    fn test_validate_reports_path() {
        let node = sphere(1.0).union(sphere(1.0).subtract(capsule(-1.0, 1.0)));
        let err = node.validate().unwrap_err();
        match err {
            SceneError::InvalidParameter { path, message } => {
                assert_eq!(path, "root.b.b");
                assert!(message.contains("radius"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_validate_rejects_bad_blend_radius() {
        let node = sphere(1.0).smooth_union(sphere(0.5), 0.0);
        assert!(node.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_oversized_rounding() {
        assert!(rounded_box(0.5, 0.5, 0.5, 0.5).validate().is_ok());
        let err = rounded_box(1.0, 0.2, 1.0, 0.3).validate().unwrap_err();
        assert!(matches!(err, SceneError::InvalidParameter { ref path, .. } if path == "root"));
    }

    #[test]
    fn test_validate_rejects_zero_plane_normal() {
        assert!(plane([0.0, 0.0, 0.0]).validate().is_err());
        assert!(plane([0.0, 2.0, 0.0]).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_nan_color() {
        let node = sphere(1.0).colored(f32::NAN, 0.0, 0.0);
        assert!(node.validate().is_err());
    }

    #[test]
    fn test_json_tagging() {
        let node = sphere(1.0).union(ground_plane(-1.0));
        let json = serde_json::to_string(&node).unwrap();
        assert!(json.contains("\"kind\":\"union\""));
        assert!(json.contains("\"kind\":\"sphere\""));
        let back: SdfNode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn test_json_defaults() {
        let node: SdfNode = serde_json::from_str(r#"{"kind":"sphere","radius":2.0}"#).unwrap();
        assert_eq!(
            node,
            SdfNode::Sphere {
                radius: 2.0,
                center: [0.0; 3],
                color: DEFAULT_COLOR,
            }
        );
    }
}
