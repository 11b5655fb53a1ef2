//! Geometric transforms: rotation, resizing and tiling.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};

use super::blend::blend_onto;

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Rotate counter-clockwise by `degrees`, growing the canvas so nothing is
/// cropped. An angle of exactly 0 returns the input untouched.
pub fn rotate(image: RgbaImage, degrees: f32) -> RgbaImage {
    if degrees == 0.0 {
        return image;
    }

    let (w, h) = image.dimensions();
    let radians = degrees.to_radians();
    let (sin, cos) = (radians.sin().abs(), radians.cos().abs());
    let fit = |v: f32| ((v - 1e-3).ceil() as u32).max(1);
    let new_w = fit(w as f32 * cos + h as f32 * sin);
    let new_h = fit(w as f32 * sin + h as f32 * cos);

    // Work on a canvas large enough for both orientations, then crop.
    let work_w = new_w.max(w);
    let work_h = new_h.max(h);
    let mut canvas = RgbaImage::from_pixel(work_w, work_h, TRANSPARENT);
    imageops::replace(
        &mut canvas,
        &image,
        i64::from((work_w - w) / 2),
        i64::from((work_h - h) / 2),
    );

    // imageproc rotates clockwise for positive theta. Bilinear never
    // overshoots, so alpha stays within the source's range.
    let rotated = rotate_about_center(&canvas, -radians, Interpolation::Bilinear, TRANSPARENT);
    if (work_w, work_h) == (new_w, new_h) {
        return rotated;
    }
    imageops::crop_imm(
        &rotated,
        (work_w - new_w) / 2,
        (work_h - new_h) / 2,
        new_w,
        new_h,
    )
    .to_image()
}

/// Lanczos resize.
///
/// With `keep_aspect` and both bounds, fits inside the box; with one bound the
/// other follows the aspect ratio. Without `keep_aspect` a missing bound keeps
/// the original size on that axis.
pub fn resize(
    image: RgbaImage,
    width: Option<u32>,
    height: Option<u32>,
    keep_aspect: bool,
) -> RgbaImage {
    let (orig_w, orig_h) = image.dimensions();
    let (new_w, new_h) = match (width, height, keep_aspect) {
        (None, None, _) => return image,
        (Some(w), Some(h), true) => {
            let ratio = (w as f64 / orig_w as f64).min(h as f64 / orig_h as f64);
            (
                (orig_w as f64 * ratio) as u32,
                (orig_h as f64 * ratio) as u32,
            )
        }
        (Some(w), None, true) => (w, (orig_h as f64 * w as f64 / orig_w as f64) as u32),
        (None, Some(h), true) => ((orig_w as f64 * h as f64 / orig_h as f64) as u32, h),
        (w, h, false) => (w.unwrap_or(orig_w), h.unwrap_or(orig_h)),
    };
    let (new_w, new_h) = (new_w.max(1), new_h.max(1));

    if (new_w, new_h) == (orig_w, orig_h) {
        return image;
    }
    imageops::resize(&image, new_w, new_h, FilterType::Lanczos3)
}

/// Full-canvas transparent layer with `overlay` repeated on a staggered grid.
///
/// Rows start `spacing` pixels from the top; each step is the overlay size
/// plus `spacing`. Even rows start `spacing` pixels from the left edge. Odd
/// rows shift by half a horizontal step and then extend left while the copy
/// still starts on the canvas, so they may begin closer to the left edge
/// than `spacing`. This keeps the pattern covering the left side of the
/// canvas.
pub fn tile(overlay: &RgbaImage, target: (u32, u32), spacing: u32) -> RgbaImage {
    let (tw, th) = (i64::from(target.0), i64::from(target.1));
    let mut layer = RgbaImage::from_pixel(target.0, target.1, TRANSPARENT);

    let spacing = i64::from(spacing);
    let step_x = (i64::from(overlay.width()) + spacing).max(1);
    let step_y = (i64::from(overlay.height()) + spacing).max(1);

    let mut y = spacing;
    let mut row = 0u32;
    while y < th {
        let mut x = spacing;
        if row % 2 == 1 {
            x += step_x / 2;
            while x - step_x >= 0 {
                x -= step_x;
            }
        }
        while x < tw {
            blend_onto(&mut layer, overlay, x, y);
            x += step_x;
        }
        y += step_y;
        row += 1;
    }
    layer
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opaque(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([200, 10, 10, 255]))
    }

    #[test]
    fn test_rotate_zero_is_noop() {
        let img = opaque(30, 10);
        assert_eq!(rotate(img.clone(), 0.0), img);
    }

    #[test]
    fn test_rotate_90_swaps_dimensions() {
        let out = rotate(opaque(40, 10), 90.0);
        assert_eq!(out.dimensions(), (10, 40));
    }

    #[test]
    fn test_rotate_45_expands_canvas() {
        let out = rotate(opaque(40, 40), 45.0);
        assert!(out.width() >= 56 && out.width() <= 58);
        assert_eq!(out.width(), out.height());
        // Corners of the expanded canvas stay transparent.
        assert_eq!(out.get_pixel(0, 0)[3], 0);
        // Center keeps the content.
        assert!(out.get_pixel(out.width() / 2, out.height() / 2)[3] >= 250);
    }

    #[test]
    fn test_rotate_keeps_alpha_cap() {
        // Hard-edged stripes at a partial alpha, like rendered glyphs.
        let img = RgbaImage::from_fn(60, 40, |x, _| {
            if (x / 3) % 2 == 0 {
                Rgba([255, 255, 255, 204])
            } else {
                TRANSPARENT
            }
        });
        for angle in [15.0, 33.0, 45.0, -70.0] {
            let out = rotate(img.clone(), angle);
            let max = out.pixels().map(|p| p[3]).max().unwrap();
            assert!(max <= 204, "alpha {max} exceeds the source at {angle} degrees");
        }
    }

    #[test]
    fn test_resize_width_keeps_aspect() {
        let out = resize(opaque(800, 600), Some(400), None, true);
        assert_eq!(out.dimensions(), (400, 300));
    }

    #[test]
    fn test_resize_fits_box() {
        let out = resize(opaque(800, 600), Some(400), Some(400), true);
        assert_eq!(out.dimensions(), (400, 300));
    }

    #[test]
    fn test_resize_height_only() {
        let out = resize(opaque(800, 600), None, Some(150), true);
        assert_eq!(out.dimensions(), (200, 150));
    }

    #[test]
    fn test_resize_without_aspect() {
        let out = resize(opaque(800, 600), Some(100), None, false);
        assert_eq!(out.dimensions(), (100, 600));
    }

    #[test]
    fn test_resize_noop_without_bounds() {
        let img = opaque(8, 6);
        assert_eq!(resize(img.clone(), None, None, true), img);
    }

    #[test]
    fn test_tile_staggered_grid() {
        let overlay = opaque(50, 50);
        let layer = tile(&overlay, (300, 300), 100);
        assert_eq!(layer.dimensions(), (300, 300));

        // Row 0 starts at the spacing offset. Row 1 is shifted by half a step
        // and backfilled to x = 25, inside the left spacing band.
        let origins = [(100, 100), (250, 100), (25, 250), (175, 250)];
        for (x, y) in origins {
            assert_eq!(layer.get_pixel(x, y)[3], 255, "missing tile at ({x}, {y})");
        }
        assert_eq!(layer.get_pixel(0, 0)[3], 0);
        assert_eq!(layer.get_pixel(99, 99)[3], 0);
        assert_eq!(layer.get_pixel(24, 260)[3], 0);
        assert_eq!(layer.get_pixel(25, 260)[3], 255);
        // Gap between copies on the first row.
        assert_eq!(layer.get_pixel(200, 120)[3], 0);

        let covered = layer.pixels().filter(|p| p[3] == 255).count();
        assert!(covered >= 4 * 50 * 50);
    }

    #[test]
    fn test_tile_larger_than_target_is_empty() {
        let layer = tile(&opaque(10, 10), (50, 50), 60);
        assert!(layer.pixels().all(|p| p[3] == 0));
    }
}
