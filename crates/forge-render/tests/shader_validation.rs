// Tests are allowed to use expect/unwrap for cleaner error messages
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

//! Generated scenes must produce WGSL that naga parses and validates for
//! both topologies.

use forge_render::shader::{self, ProgramKind};
use forge_render::{ProgramSources, RenderError, ShaderLibrary, Topology};
use forge_sdf::{
    Scene, SdfNode, box3, capsule, cylinder, ground_plane, plane, rounded_box, sphere, torus,
};

fn every_primitive() -> Vec<SdfNode> {
    vec![
        sphere(1.0),
        box3(0.5, 0.6, 0.7),
        rounded_box(0.5, 0.5, 0.5, 0.1),
        torus(1.0, 0.25),
        capsule(0.3, 0.8),
        cylinder(0.4, 1.0),
        plane([0.0, 1.0, 1.0]),
        ground_plane(-1.0),
    ]
}

fn every_operator(a: SdfNode, b: SdfNode) -> Vec<SdfNode> {
    vec![
        a.clone().union(b.clone()),
        a.clone().subtract(b.clone()),
        a.clone().intersect(b.clone()),
        a.clone().xor(b.clone()),
        a.clone().smooth_union(b.clone(), 0.3),
        a.clone().smooth_subtract(b.clone(), 0.2),
        a.smooth_intersect(b, 0.1),
    ]
}

fn assert_builds(scene: Scene) {
    let library = ShaderLibrary::embedded().with_scene(scene);
    for topology in Topology::ALL {
        if let Err(e) = library.build(topology) {
            panic!("{topology} failed to build: {e}");
        }
    }
}

#[test]
fn every_primitive_validates() {
    for node in every_primitive() {
        let kind = node.kind_name();
        let scene = Scene::new(node.at(0.5, -0.25, -3.0).colored(0.2, 0.4, 0.6));
        let library = ShaderLibrary::embedded().with_scene(scene);
        assert!(
            library.build(Topology::Direct).is_ok(),
            "{kind} did not validate"
        );
    }
}

#[test]
fn every_operator_validates() {
    for node in every_operator(sphere(1.0), box3(0.75, 0.75, 0.75).at(0.5, 0.0, 0.0)) {
        assert_builds(Scene::new(node));
    }
}

#[test]
fn deeply_nested_tree_validates() {
    let mut tree = sphere(0.5);
    for (i, primitive) in every_primitive().into_iter().enumerate() {
        let shifted = primitive.at(i as f32 * 0.5, 0.0, -4.0);
        tree = match i % 4 {
            0 => tree.union(shifted),
            1 => tree.smooth_union(shifted, 0.25),
            2 => tree.subtract(shifted),
            _ => tree.xor(shifted),
        };
    }
    assert!(tree.node_count() > 16);
    assert_builds(Scene::new(tree));
}

#[test]
fn demo_scene_validates() {
    assert_builds(Scene::demo());
}

#[test]
fn compute_program_keeps_required_workgroup_size() {
    let ProgramSources::ComputeBlit { compute, display } = ShaderLibrary::embedded()
        .build(Topology::ComputeBlit)
        .unwrap()
    else {
        panic!("expected compute program set");
    };
    assert_eq!(compute.kind, ProgramKind::Compute);
    assert_eq!(display.kind, ProgramKind::Display);

    let module = shader::compile("compute", &compute.wgsl).unwrap();
    let entry = module
        .entry_points
        .iter()
        .find(|ep| ep.name == shader::COMPUTE_ENTRY)
        .unwrap();
    assert_eq!(entry.workgroup_size, [8, 8, 1]);
}

#[test]
fn link_rejects_program_without_entry_points() {
    let wgsl = "fn helper() -> f32 { return 1.0; }";
    let module = shader::compile("helper", wgsl).unwrap();
    for kind in [ProgramKind::Raymarch, ProgramKind::Compute, ProgramKind::Display] {
        assert!(matches!(
            shader::link(kind, &module, wgsl),
            Err(RenderError::Link { .. })
        ));
    }
}

#[test]
fn validation_error_is_link_error() {
    // Parses, but both globals claim the same binding
    let wgsl = r"
        @group(0) @binding(0) var<uniform> a: vec4<f32>;
        @group(0) @binding(0) var<uniform> b: vec4<f32>;
        @fragment fn fs_main() -> @location(0) vec4<f32> { return a + b; }
    ";
    let module = shader::compile("bad", wgsl).unwrap();
    assert!(matches!(
        shader::link(ProgramKind::Raymarch, &module, wgsl),
        Err(RenderError::Link { .. })
    ));
}

#[test]
fn check_all_on_exported_directory() {
    let dir = tempfile::tempdir().unwrap();
    ShaderLibrary::export_embedded(dir.path()).unwrap();
    let library = ShaderLibrary::from_dir(dir.path());
    library.check_all().unwrap();
    assert_eq!(library.directory(), Some(dir.path()));
}
