//! Alpha handling: opacity, "over" blending, compositing and grayscale.

use image::{Rgba, RgbaImage};

/// Porter-Duff "over" of `top` onto `bottom` (straight alpha).
pub fn blend_over(bottom: Rgba<u8>, top: Rgba<u8>) -> Rgba<u8> {
    let top_alpha = f32::from(top[3]) / 255.0;
    if top_alpha <= 0.0 {
        return bottom;
    }
    let bottom_alpha = f32::from(bottom[3]) / 255.0;
    let out_alpha = top_alpha + bottom_alpha * (1.0 - top_alpha);

    if out_alpha < 0.001 {
        return Rgba([0, 0, 0, 0]);
    }

    let channel = |t: u8, b: u8| -> u8 {
        let t = f32::from(t) / 255.0;
        let b = f32::from(b) / 255.0;
        let result = (t * top_alpha + b * bottom_alpha * (1.0 - top_alpha)) / out_alpha;
        (result * 255.0).round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        channel(top[0], bottom[0]),
        channel(top[1], bottom[1]),
        channel(top[2], bottom[2]),
        (out_alpha * 255.0).round() as u8,
    ])
}

/// Blend `overlay` onto `canvas` in place with its top-left at `(x, y)`.
/// Parts outside the canvas are clipped.
pub fn blend_onto(canvas: &mut RgbaImage, overlay: &RgbaImage, x: i64, y: i64) {
    let x_start = x.max(0);
    let y_start = y.max(0);
    let x_end = (x + i64::from(overlay.width())).min(i64::from(canvas.width()));
    let y_end = (y + i64::from(overlay.height())).min(i64::from(canvas.height()));

    for ty in y_start..y_end {
        for tx in x_start..x_end {
            let src = *overlay.get_pixel((tx - x) as u32, (ty - y) as u32);
            if src[3] == 0 {
                continue;
            }
            let dst = canvas.get_pixel_mut(tx as u32, ty as u32);
            *dst = blend_over(*dst, src);
        }
    }
}

/// Copy of `base` with `overlay` blended at `position`. `base` is untouched.
pub fn composite(base: &RgbaImage, overlay: &RgbaImage, position: (i64, i64)) -> RgbaImage {
    let mut result = base.clone();
    blend_onto(&mut result, overlay, position.0, position.1);
    result
}

/// Multiply the alpha channel by `opacity`, truncating.
pub fn apply_opacity(image: RgbaImage, opacity: f32) -> RgbaImage {
    if opacity >= 1.0 {
        return image;
    }
    let opacity = opacity.max(0.0);
    let mut image = image;
    for pixel in image.pixels_mut() {
        pixel[3] = (f32::from(pixel[3]) * opacity) as u8;
    }
    image
}

/// Desaturate color channels (ITU-R 601 luma), keeping alpha exactly.
pub fn grayscale(image: &RgbaImage) -> RgbaImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        let luma = ((u32::from(r) * 299 + u32::from(g) * 587 + u32::from(b) * 114 + 500) / 1000)
            as u8;
        *pixel = Rgba([luma, luma, luma, a]);
    }
    out
}
