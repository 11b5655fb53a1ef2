//! Text watermarks.

use image::RgbaImage;

use super::{custom_coords, placeholder, Placement, Watermark};
use crate::engine::{rotate, WatermarkEngine};
use crate::error::PipelineResult;
use crate::exif::ExifFields;
use crate::types::TextWatermarkConfig;

/// Smallest font size used when scaling with the image.
pub const MIN_SCALED_FONT_SIZE: u32 = 12;

/// Base padding around the text block, before shadow and outline allowance.
const BASE_PADDING: u32 = 20;

/// Renders a [`TextWatermarkConfig`] into an overlay.
#[derive(Debug, Clone)]
pub struct TextWatermark {
    config: TextWatermarkConfig,
}

impl TextWatermark {
    pub fn new(config: TextWatermarkConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TextWatermarkConfig {
        &self.config
    }

    /// Font size for a target: scaled from the shorter side, or the fixed size.
    pub fn font_size_for(&self, target: (u32, u32)) -> u32 {
        if self.config.scale_with_image {
            let shorter = target.0.min(target.1) as f32;
            ((shorter * self.config.scale_factor) as u32).max(MIN_SCALED_FONT_SIZE)
        } else {
            self.config.font_size
        }
    }

    /// Transparent border around the text so shadow and outline fit.
    pub fn padding(&self) -> u32 {
        let mut padding = BASE_PADDING;
        if self.config.shadow {
            padding += 2 * self.config.shadow_offset;
        }
        if self.config.outline {
            padding += 2 * self.config.outline_width;
        }
        padding
    }

    /// Watermark text with placeholders filled in when EXIF use is enabled.
    pub fn resolve_text(&self, exif: &ExifFields) -> String {
        if self.config.use_exif {
            placeholder::substitute(&self.config.text, exif)
        } else {
            self.config.text.clone()
        }
    }

    /// Build the overlay: shadow, then outline, then the text, then rotation.
    pub fn render(&self, engine: &WatermarkEngine, target: (u32, u32), exif: &ExifFields) -> RgbaImage {
        let cfg = &self.config;
        let text = self.resolve_text(exif);
        let font = engine.resolve_font(&cfg.font_family, self.font_size_for(target));

        let (text_w, text_h) = font.measure(&text);
        let padding = self.padding();
        let mut canvas = RgbaImage::new(text_w + 2 * padding, text_h + 2 * padding);

        let alpha = (cfg.opacity.clamp(0.0, 1.0) * 255.0) as u8;
        let origin = padding as i32;

        if cfg.shadow {
            let offset = cfg.shadow_offset as i32;
            let shadow_alpha = (f32::from(alpha) * 0.5) as u8;
            font.draw(
                &mut canvas,
                origin + offset,
                origin + offset,
                &text,
                cfg.shadow_color.with_alpha(shadow_alpha),
            );
        }

        if cfg.outline {
            let width = cfg.outline_width as i32;
            let color = cfg.outline_color.with_alpha(alpha);
            for dx in -width..=width {
                for dy in -width..=width {
                    if (dx, dy) != (0, 0) {
                        font.draw(&mut canvas, origin + dx, origin + dy, &text, color);
                    }
                }
            }
        }

        font.draw(&mut canvas, origin, origin, &text, cfg.font_color.with_alpha(alpha));

        rotate(canvas, cfg.rotation)
    }
}

impl Watermark for TextWatermark {
    fn kind(&self) -> &'static str {
        "text"
    }

    fn overlay(
        &self,
        engine: &WatermarkEngine,
        target_size: (u32, u32),
        exif: &ExifFields,
    ) -> PipelineResult<RgbaImage> {
        Ok(self.render(engine, target_size, exif))
    }

    fn placement(&self) -> Placement {
        Placement {
            position: self.config.position,
            margin: self.config.margin,
            custom: custom_coords(self.config.custom_x, self.config.custom_y),
            tile_spacing: self.config.tile_spacing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::engine::FontCache;
    use crate::types::{Rgb, WatermarkPosition};
    use image::Rgba;
    use std::sync::Arc;

    fn engine() -> WatermarkEngine {
        WatermarkEngine::with_fonts(&Config::default(), Arc::new(FontCache::builtin()))
    }

    fn max_alpha(img: &RgbaImage) -> u8 {
        img.pixels().map(|p| p[3]).max().unwrap_or(0)
    }

    #[test]
    fn test_font_size_scales_with_shorter_side() {
        let wm = TextWatermark::new(TextWatermarkConfig::new("x"));
        assert_eq!(wm.font_size_for((1000, 500)), 40);
        assert_eq!(wm.font_size_for((100, 100)), MIN_SCALED_FONT_SIZE);

        let fixed = TextWatermark::new(TextWatermarkConfig {
            scale_with_image: false,
            font_size: 30,
            ..TextWatermarkConfig::new("x")
        });
        assert_eq!(fixed.font_size_for((4000, 3000)), 30);
    }

    #[test]
    fn test_padding_accounts_for_effects() {
        let wm = TextWatermark::new(TextWatermarkConfig {
            shadow: true,
            shadow_offset: 3,
            outline: true,
            outline_width: 2,
            ..TextWatermarkConfig::new("x")
        });
        assert_eq!(wm.padding(), 20 + 6 + 4);
    }

    #[test]
    fn test_overlay_size_and_alpha_cap() {
        let engine = engine();
        let wm = TextWatermark::new(TextWatermarkConfig {
            scale_with_image: false,
            font_size: 16,
            opacity: 0.5,
            ..TextWatermarkConfig::new("Hi")
        });
        let font = engine.resolve_font("arial", 16);
        let (tw, th) = font.measure("Hi");

        let overlay = wm.render(&engine, (800, 600), &ExifFields::default());
        assert_eq!(overlay.dimensions(), (tw + 40, th + 40));
        assert_eq!(max_alpha(&overlay), 127);
    }

    #[test]
    fn test_shadow_is_drawn_at_half_alpha() {
        let engine = engine();
        let wm = TextWatermark::new(TextWatermarkConfig {
            scale_with_image: false,
            font_size: 16,
            opacity: 1.0,
            font_color: Rgb::WHITE,
            shadow: true,
            shadow_offset: 4,
            shadow_color: Rgb::BLACK,
            ..TextWatermarkConfig::new("I")
        });
        let overlay = wm.render(&engine, (800, 600), &ExifFields::default());
        let shadow_only = overlay
            .pixels()
            .filter(|p| p[0] == 0 && p[3] > 0)
            .map(|p| p[3])
            .max();
        assert_eq!(shadow_only, Some(127));
        assert!(overlay.pixels().any(|p| *p == Rgba([255, 255, 255, 255])));
    }

    #[test]
    fn test_placeholders_only_with_use_exif() {
        let exif = ExifFields {
            camera_model: Some("X100V".into()),
            ..ExifFields::default()
        };
        let plain = TextWatermark::new(TextWatermarkConfig::new("{camera}"));
        assert_eq!(plain.resolve_text(&exif), "{camera}");

        let templated = TextWatermark::new(TextWatermarkConfig {
            use_exif: true,
            ..TextWatermarkConfig::new("Shot on {camera}")
        });
        assert_eq!(templated.resolve_text(&exif), "Shot on X100V");
    }

    #[test]
    fn test_rotation_swaps_dimensions() {
        let engine = engine();
        let config = TextWatermarkConfig {
            scale_with_image: false,
            font_size: 16,
            ..TextWatermarkConfig::new("wide text")
        };
        let flat = TextWatermark::new(config.clone()).render(&engine, (800, 600), &ExifFields::default());
        let upright = TextWatermark::new(TextWatermarkConfig { rotation: 90.0, ..config })
            .render(&engine, (800, 600), &ExifFields::default());
        assert_eq!(upright.dimensions(), (flat.height(), flat.width()));
    }

    #[test]
    fn test_apply_places_bottom_right() {
        let engine = engine();
        let wm = TextWatermark::new(TextWatermarkConfig {
            scale_with_image: false,
            font_size: 16,
            opacity: 1.0,
            margin: 0,
            ..TextWatermarkConfig::new("X")
        });
        let base = RgbaImage::from_pixel(400, 300, Rgba([0, 0, 0, 255]));
        let out = wm.apply(&engine, &base, &ExifFields::default()).unwrap();
        assert_eq!(out.dimensions(), base.dimensions());

        // Only the bottom-right quadrant is touched.
        let touched: Vec<_> = out
            .enumerate_pixels()
            .filter(|(_, _, p)| p[0] > 0)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert!(!touched.is_empty());
        assert!(touched.iter().all(|&(x, y)| x >= 200 && y >= 150));
    }

    #[test]
    fn test_tile_covers_canvas() {
        let engine = engine();
        let wm = TextWatermark::new(TextWatermarkConfig {
            scale_with_image: false,
            font_size: 16,
            opacity: 1.0,
            position: WatermarkPosition::Tile,
            tile_spacing: 20,
            ..TextWatermarkConfig::new("T")
        });
        let base = RgbaImage::from_pixel(400, 400, Rgba([0, 0, 0, 255]));
        let out = wm.apply(&engine, &base, &ExifFields::default()).unwrap();
        let in_quadrant = |x0: u32, y0: u32| {
            out.enumerate_pixels()
                .any(|(x, y, p)| p[0] > 0 && x >= x0 && x < x0 + 200 && y >= y0 && y < y0 + 200)
        };
        assert!(in_quadrant(0, 0));
        assert!(in_quadrant(200, 200));
    }
}
