//! CPU reference renderer
//!
//! Runs the same per-pixel pipeline as the shaders through `forge_sdf::trace`,
//! one rayon task per row. Used by `forge trace` and to cross-check GPU
//! output without a device.

use forge_sdf::{Scene, trace};
use glam::{Vec2, Vec3};
use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::camera::Camera;

/// Quantize a linear color the way an `rgba8unorm` store does
pub fn to_rgba8(color: Vec3) -> Rgba<u8> {
    let c = color.clamp(Vec3::ZERO, Vec3::ONE) * 255.0;
    Rgba([c.x.round() as u8, c.y.round() as u8, c.z.round() as u8, 255])
}

/// Render `scene` from `camera` into a `width` x `height` image
pub fn render_image(scene: &Scene, camera: &Camera, width: u32, height: u32) -> RgbaImage {
    let mut img = RgbaImage::new(width, height);
    if width == 0 || height == 0 {
        return img;
    }

    let view = camera.view();
    let resolution = Vec2::new(width as f32, height as f32);
    let row_bytes = width as usize * 4;

    let buffer: &mut [u8] = &mut img;
    buffer
        .par_chunks_mut(row_bytes)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, pixel) in row.chunks_exact_mut(4).enumerate() {
                let center = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let color = trace::render_pixel(scene, &view, center, resolution);
                pixel.copy_from_slice(&to_rgba8(color).0);
            }
        });

    tracing::debug!(width, height, "software render complete");
    img
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_sdf::sphere;

    #[test]
    fn test_quantization_clamps() {
        assert_eq!(to_rgba8(Vec3::new(-1.0, 0.5, 2.0)), Rgba([0, 128, 255, 255]));
    }

    #[test]
    fn test_empty_image() {
        let img = render_image(&Scene::demo(), &Camera::default(), 0, 10);
        assert_eq!(img.dimensions(), (0, 10));
    }

    #[test]
    fn test_corners_show_background() {
        let scene = Scene::new(sphere(1.0).at(0.0, 0.0, -5.0).colored(1.0, 0.0, 0.0));
        let img = render_image(&scene, &Camera::default(), 32, 24);
        let background = to_rgba8(scene.background_color());
        assert_eq!(*img.get_pixel(0, 0), background);
        assert_eq!(*img.get_pixel(31, 23), background);

        // Center pixel sees the red sphere
        let center = img.get_pixel(16, 12);
        assert!(center.0[0] > 0);
        assert_eq!(center.0[1], 0);
        assert_eq!(center.0[2], 0);
    }

    #[test]
    fn test_image_is_not_mirrored_vertically() {
        // Sphere above the view axis lands in the top half
        let scene = Scene::new(sphere(0.5).at(0.0, 1.0, -5.0).colored(1.0, 1.0, 1.0))
            .with_light(0.0, 5.0, 5.0);
        let img = render_image(&scene, &Camera::default(), 40, 40);
        let background = to_rgba8(scene.background_color());
        let top = (0..20).any(|y| *img.get_pixel(20, y) != background);
        let bottom = (20..40).any(|y| *img.get_pixel(20, y) != background);
        assert!(top);
        assert!(!bottom);
    }
}
