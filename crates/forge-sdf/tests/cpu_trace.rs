//! End-to-end checks of the CPU reference pipeline

// Tests are allowed to use expect/unwrap for cleaner error messages
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use approx::assert_relative_eq;
use forge_sdf::trace::{self, HIT_THRESHOLD};
use forge_sdf::{Scene, Sdf, View, ground_plane, sphere};
use glam::{Vec2, Vec3};

fn looking_down_neg_z(origin: Vec3) -> View {
    View {
        origin,
        forward: Vec3::NEG_Z,
        right: Vec3::X,
        up: Vec3::Y,
    }
}

#[test]
fn red_sphere_center_pixel_is_lambert_red() {
    let scene = Scene::new(sphere(1.0).colored(1.0, 0.0, 0.0)).with_light(2.0, 3.0, 5.0);
    let view = looking_down_neg_z(Vec3::new(0.0, 0.0, 5.0));
    let res = Vec2::new(64.0, 64.0);

    let dir = trace::primary_ray(&view, res * 0.5, res);
    let hit = trace::march(&scene, view.origin, dir).expect("center ray hits the sphere");
    assert_relative_eq!(hit.position.z, 1.0, epsilon = HIT_THRESHOLD);
    assert_relative_eq!(hit.normal.z, 1.0, epsilon = 1e-4);

    let lambert = 4.0 / 29.0_f32.sqrt();
    let color = trace::render_pixel(&scene, &view, res * 0.5, res);
    assert_relative_eq!(color.x, lambert, epsilon = 1e-4);
    assert_relative_eq!(color.y, 0.0);
    assert_relative_eq!(color.z, 0.0);
}

#[test]
fn floor_under_sphere_is_shadowed() {
    let scene = Scene::new(
        ground_plane(-1.0)
            .colored(1.0, 1.0, 1.0)
            .union(sphere(0.5).at(0.0, 0.0, 0.0)),
    )
    .with_light(0.0, 8.0, 0.0);

    // March stops just in front of the surface
    let below = Vec3::new(0.0, -0.9995, 0.0);
    let open = Vec3::new(6.0, -0.9995, 0.0);
    let shaded = trace::shade(&scene, below, Vec3::Y, Vec3::ONE, scene.light_position());
    let lit = trace::shade(&scene, open, Vec3::Y, Vec3::ONE, scene.light_position());
    assert_relative_eq!(shaded.x, 0.0);
    assert!(lit.x > 0.5);
}

#[test]
fn evaluator_agrees_with_trait_object() {
    let scene = Scene::demo();
    let field: &dyn Sdf = &scene;
    let p = Vec3::new(0.3, -0.2, -4.0);
    assert_eq!(field.evaluate(p), scene.root.evaluate(p));
}
