//! SDF to WGSL code generator
//!
//! Compiles an [`SdfNode`] tree into a straight-line WGSL `scene_sdf`
//! function returning `SdfHit`, and splices it (plus the scene and march
//! constants) into the shared shader library.

// String writing is infallible, so .unwrap() is safe here
#![allow(clippy::unwrap_used)]
#![allow(clippy::too_many_lines)]

use std::fmt::Write;

use crate::scene::Scene;
use crate::sdf_node::SdfNode;
use crate::trace::{
    HIT_THRESHOLD, MAX_DISTANCE, MAX_STEPS, NORMAL_EPSILON, SHADOW_BIAS, SHADOW_SOFTNESS,
    SHADOW_STEPS,
};

/// Line in the shader library that is replaced by [`generate_constants`]
pub const CONSTANTS_MARKER: &str = "// SCENE_CONSTANTS_PLACEHOLDER";

/// Line preceding the stub `scene_sdf` that generated code replaces
pub const SCENE_SDF_MARKER: &str = "// SCENE_SDF_PLACEHOLDER";

/// Generate WGSL code for an SDF tree
pub struct WgslGenerator {
    var_counter: usize,
}

impl WgslGenerator {
    pub fn new() -> Self {
        Self { var_counter: 0 }
    }

    fn next_var(&mut self) -> String {
        let var = format!("h{}", self.var_counter);
        self.var_counter += 1;
        var
    }

    /// Generate the complete `scene_sdf` function
    pub fn generate(&mut self, node: &SdfNode) -> String {
        self.var_counter = 0;
        let mut code = String::new();

        writeln!(code, "fn scene_sdf(p: vec3<f32>) -> SdfHit {{").unwrap();

        let result = self.generate_node(node, &mut code);

        writeln!(code, "    return {};", result).unwrap();
        writeln!(code, "}}").unwrap();

        code
    }

    /// Emit one node, returning the variable holding its `SdfHit`
    fn generate_node(&mut self, node: &SdfNode, code: &mut String) -> String {
        match node {
            SdfNode::Sphere {
                radius,
                center,
                color,
            } => {
                let var = self.next_var();
                writeln!(
                    code,
                    "    let {} = SdfHit(sd_sphere(p - {}, {}), {});",
                    var,
                    vec3(center),
                    float(*radius),
                    vec3(color)
                )
                .unwrap();
                var
            }
            SdfNode::Box {
                half_extents,
                center,
                color,
            } => {
                let var = self.next_var();
                writeln!(
                    code,
                    "    let {} = SdfHit(sd_box(p - {}, {}), {});",
                    var,
                    vec3(center),
                    vec3(half_extents),
                    vec3(color)
                )
                .unwrap();
                var
            }
            SdfNode::RoundedBox {
                half_extents,
                radius,
                center,
                color,
            } => {
                let var = self.next_var();
                writeln!(
                    code,
                    "    let {} = SdfHit(sd_rounded_box(p - {}, {}, {}), {});",
                    var,
                    vec3(center),
                    vec3(half_extents),
                    float(*radius),
                    vec3(color)
                )
                .unwrap();
                var
            }
            SdfNode::Torus {
                major_radius,
                minor_radius,
                center,
                color,
            } => {
                let var = self.next_var();
                writeln!(
                    code,
                    "    let {} = SdfHit(sd_torus(p - {}, {}, {}), {});",
                    var,
                    vec3(center),
                    float(*major_radius),
                    float(*minor_radius),
                    vec3(color)
                )
                .unwrap();
                var
            }
            SdfNode::Capsule {
                radius,
                half_height,
                center,
                color,
            } => {
                let var = self.next_var();
                writeln!(
                    code,
                    "    let {} = SdfHit(sd_capsule(p - {}, {}, {}), {});",
                    var,
                    vec3(center),
                    float(*radius),
                    float(*half_height),
                    vec3(color)
                )
                .unwrap();
                var
            }
            SdfNode::Cylinder {
                radius,
                half_height,
                center,
                color,
            } => {
                let var = self.next_var();
                writeln!(
                    code,
                    "    let {} = SdfHit(sd_cylinder(p - {}, {}, {}), {});",
                    var,
                    vec3(center),
                    float(*radius),
                    float(*half_height),
                    vec3(color)
                )
                .unwrap();
                var
            }
            SdfNode::Plane {
                normal,
                offset,
                color,
            } => {
                let n = glam::Vec3::from(*normal).normalize_or_zero().to_array();
                let var = self.next_var();
                writeln!(
                    code,
                    "    let {} = SdfHit(sd_plane(p, {}, {}), {});",
                    var,
                    vec3(&n),
                    float(*offset),
                    vec3(color)
                )
                .unwrap();
                var
            }

            SdfNode::Union { a, b } => self.binary("op_union", a, b, code),
            SdfNode::Subtraction { a, b } => self.binary("op_subtraction", a, b, code),
            SdfNode::Intersection { a, b } => self.binary("op_intersection", a, b, code),
            SdfNode::Xor { a, b } => self.binary("op_xor", a, b, code),

            SdfNode::SmoothUnion { a, b, k } => self.smooth("op_smooth_union", a, b, *k, code),
            SdfNode::SmoothSubtraction { a, b, k } => {
                self.smooth("op_smooth_subtraction", a, b, *k, code)
            }
            SdfNode::SmoothIntersection { a, b, k } => {
                self.smooth("op_smooth_intersection", a, b, *k, code)
            }
        }
    }

    fn binary(&mut self, func: &str, a: &SdfNode, b: &SdfNode, code: &mut String) -> String {
        let ha = self.generate_node(a, code);
        let hb = self.generate_node(b, code);
        let var = self.next_var();
        writeln!(code, "    let {} = {}({}, {});", var, func, ha, hb).unwrap();
        var
    }

    fn smooth(
        &mut self,
        func: &str,
        a: &SdfNode,
        b: &SdfNode,
        k: f32,
        code: &mut String,
    ) -> String {
        let ha = self.generate_node(a, code);
        let hb = self.generate_node(b, code);
        let var = self.next_var();
        writeln!(code, "    let {} = {}({}, {}, {});", var, func, ha, hb, float(k)).unwrap();
        var
    }
}

impl Default for WgslGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Shortest WGSL literal that reads back as exactly `v`
fn float(v: f32) -> String {
    let text = format!("{v:?}");
    if text.contains(['.', 'e', 'E']) {
        text
    } else {
        format!("{text}.0")
    }
}

fn vec3(v: &[f32; 3]) -> String {
    format!("vec3<f32>({}, {}, {})", float(v[0]), float(v[1]), float(v[2]))
}

/// WGSL `const` declarations for the scene environment and march settings
pub fn generate_constants(scene: &Scene) -> String {
    let mut code = String::new();
    writeln!(code, "const LIGHT_POSITION: vec3<f32> = {};", vec3(&scene.light)).unwrap();
    writeln!(
        code,
        "const BACKGROUND_COLOR: vec3<f32> = {};",
        vec3(&scene.background)
    )
    .unwrap();
    writeln!(code, "const MAX_STEPS: i32 = {};", MAX_STEPS).unwrap();
    writeln!(code, "const HIT_THRESHOLD: f32 = {};", float(HIT_THRESHOLD)).unwrap();
    writeln!(code, "const MAX_DISTANCE: f32 = {};", float(MAX_DISTANCE)).unwrap();
    writeln!(code, "const NORMAL_EPSILON: f32 = {};", float(NORMAL_EPSILON)).unwrap();
    writeln!(code, "const SHADOW_STEPS: i32 = {};", SHADOW_STEPS).unwrap();
    writeln!(code, "const SHADOW_SOFTNESS: f32 = {};", float(SHADOW_SOFTNESS)).unwrap();
    writeln!(code, "const SHADOW_BIAS: f32 = {};", float(SHADOW_BIAS)).unwrap();
    code
}

/// Replace the stub `scene_sdf` that follows [`SCENE_SDF_MARKER`]
fn inject_scene_sdf(base_shader: &str, scene_sdf_code: &str) -> String {
    if let Some(start) = base_shader.find(SCENE_SDF_MARKER) {
        if let Some(func_offset) = base_shader[start..].find("fn scene_sdf") {
            let func_start = start + func_offset;
            // Count braces to find the end of the stub
            let mut depth = 0;
            let mut found_open = false;
            let mut func_end = None;

            for (i, c) in base_shader[func_start..].char_indices() {
                if c == '{' {
                    depth += 1;
                    found_open = true;
                } else if c == '}' {
                    depth -= 1;
                    if found_open && depth == 0 {
                        func_end = Some(func_start + i + 1);
                        break;
                    }
                }
            }

            if let Some(end) = func_end {
                let mut result = String::with_capacity(base_shader.len() + scene_sdf_code.len());
                result.push_str(&base_shader[..start]);
                result.push_str(scene_sdf_code);
                result.push_str(&base_shader[end..]);
                return result;
            }
        }
    }

    // No marker: append and let the compiler report any duplicate definition
    format!("{}\n{}", base_shader, scene_sdf_code)
}

fn inject_constants(shader: &str, constants: &str) -> String {
    if let Some(pos) = shader.find(CONSTANTS_MARKER) {
        let mut result = String::with_capacity(shader.len() + constants.len());
        result.push_str(&shader[..pos]);
        result.push_str(constants);
        result.push_str(&shader[pos + CONSTANTS_MARKER.len()..]);
        result
    } else {
        format!("{}\n{}", constants, shader)
    }
}

/// Splice the scene into a shader library source.
///
/// The constants replace [`CONSTANTS_MARKER`] and the generated
/// `scene_sdf` replaces the stub after [`SCENE_SDF_MARKER`].
pub fn inject_scene(base_shader: &str, scene: &Scene) -> String {
    let scene_sdf = WgslGenerator::new().generate(&scene.root);
    let with_constants = inject_constants(base_shader, &generate_constants(scene));
    inject_scene_sdf(&with_constants, &scene_sdf)
}
