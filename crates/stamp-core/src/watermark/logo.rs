//! Logo (image) watermarks.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{imageops, Rgba, RgbaImage};
use std::path::Path;
use std::sync::OnceLock;

use super::{custom_coords, Placement, Watermark};
use crate::engine::{apply_opacity, grayscale, resize, rotate, ImageSource, WatermarkEngine};
use crate::error::{PipelineError, PipelineResult};
use crate::exif::ExifFields;
use crate::types::{ImageWatermarkConfig, Rgb};

/// Renders an [`ImageWatermarkConfig`] into an overlay.
///
/// The source logo is decoded once and reused for every target.
#[derive(Debug)]
pub struct LogoWatermark {
    config: ImageWatermarkConfig,
    logo: OnceLock<RgbaImage>,
}

impl LogoWatermark {
    pub fn new(config: ImageWatermarkConfig) -> Self {
        Self {
            config,
            logo: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &ImageWatermarkConfig {
        &self.config
    }

    /// Decode the configured logo. Inline base64 wins over a path.
    pub fn load(&self, engine: &WatermarkEngine) -> PipelineResult<RgbaImage> {
        if let Some(data) = self.config.logo_base64.as_deref() {
            let bytes = decode_base64(data)?;
            return engine.load(ImageSource::Bytes(&bytes));
        }
        if let Some(path) = self.config.logo_path.as_deref() {
            return engine.load(ImageSource::Path(Path::new(path)));
        }
        Err(PipelineError::Configuration(
            "image watermark needs logo_path or logo_base64".to_string(),
        ))
    }

    fn source(&self, engine: &WatermarkEngine) -> PipelineResult<&RgbaImage> {
        if let Some(logo) = self.logo.get() {
            return Ok(logo);
        }
        let logo = self.load(engine)?;
        Ok(self.logo.get_or_init(|| logo))
    }

    /// Scale to `scale` of the target's shorter side, then grayscale,
    /// opacity and rotation.
    pub fn prepare(&self, logo: &RgbaImage, target: (u32, u32)) -> RgbaImage {
        let cfg = &self.config;
        let shorter = target.0.min(target.1) as f32;
        let width = ((shorter * cfg.scale) as u32).max(1);
        let height = if cfg.maintain_aspect_ratio && logo.height() > 0 {
            let aspect = logo.width() as f64 / logo.height() as f64;
            ((width as f64 / aspect) as u32).max(1)
        } else {
            width
        };

        let mut prepared = resize(logo.clone(), Some(width), Some(height), false);
        if cfg.grayscale {
            prepared = grayscale(&prepared);
        }
        prepared = apply_opacity(prepared, cfg.opacity);
        rotate(prepared, cfg.rotation)
    }

    /// Render `text` as a standalone logo.
    pub fn logo_from_text(
        engine: &WatermarkEngine,
        text: &str,
        font_size: u32,
        color: Rgb,
        background: Option<Rgba<u8>>,
        padding: u32,
    ) -> RgbaImage {
        let font = engine.resolve_font("arial", font_size);
        let (w, h) = font.measure(text);
        let fill = background.unwrap_or(Rgba([0, 0, 0, 0]));
        let mut logo = RgbaImage::from_pixel(w + 2 * padding, h + 2 * padding, fill);
        font.draw(&mut logo, padding as i32, padding as i32, text, color.with_alpha(255));
        logo
    }

    /// Surround `logo` with a solid border `width` pixels wide.
    pub fn add_border(logo: &RgbaImage, width: u32, color: Rgba<u8>) -> RgbaImage {
        let mut framed = RgbaImage::from_pixel(logo.width() + 2 * width, logo.height() + 2 * width, color);
        imageops::overlay(&mut framed, logo, i64::from(width), i64::from(width));
        framed
    }
}

impl Watermark for LogoWatermark {
    fn kind(&self) -> &'static str {
        "logo"
    }

    fn overlay(
        &self,
        engine: &WatermarkEngine,
        target_size: (u32, u32),
        _exif: &ExifFields,
    ) -> PipelineResult<RgbaImage> {
        let logo = self.source(engine)?;
        Ok(self.prepare(logo, target_size))
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

/// Decode inline logo data, dropping any `data:...;base64,` prefix.
pub fn decode_base64(data: &str) -> PipelineResult<Vec<u8>> {
    let payload = match data.split_once(',') {
        Some((_, rest)) => rest,
        None => data,
    };
    STANDARD
        .decode(payload.trim())
        .map_err(|e| PipelineError::Configuration(format!("invalid logo base64 data: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::engine::FontCache;
    use image::ImageFormat;
    use std::io::Cursor;
    use std::sync::Arc;

    fn engine() -> WatermarkEngine {
        WatermarkEngine::with_fonts(&Config::default(), Arc::new(FontCache::builtin()))
    }

    fn logo_png(width: u32, height: u32) -> Vec<u8> {
        let logo = RgbaImage::from_pixel(width, height, Rgba([200, 40, 40, 255]));
        let mut bytes = Vec::new();
        logo.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
        bytes
    }

    fn inline(width: u32, height: u32) -> ImageWatermarkConfig {
        ImageWatermarkConfig {
            logo_base64: Some(format!("data:image/png;base64,{}", STANDARD.encode(logo_png(width, height)))),
            ..ImageWatermarkConfig::default()
        }
    }

    #[test]
    fn test_decode_base64_strips_data_url() {
        let plain = STANDARD.encode(b"abc");
        assert_eq!(decode_base64(&plain).unwrap(), b"abc");
        assert_eq!(decode_base64(&format!("data:image/png;base64,{plain}")).unwrap(), b"abc");
        assert!(matches!(
            decode_base64("data:image/png;base64,!!!"),
            Err(PipelineError::Configuration(_))
        ));
    }

    #[test]
    fn test_load_requires_a_source() {
        let wm = LogoWatermark::new(ImageWatermarkConfig::default());
        assert!(matches!(wm.load(&engine()), Err(PipelineError::Configuration(_))));
    }

    #[test]
    fn test_load_missing_path() {
        let wm = LogoWatermark::new(ImageWatermarkConfig::from_path("/nonexistent/logo.png"));
        assert!(matches!(wm.load(&engine()), Err(PipelineError::FileNotFound(_))));
    }

    #[test]
    fn test_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logo.png");
        std::fs::write(&path, logo_png(8, 4)).unwrap();
        let wm = LogoWatermark::new(ImageWatermarkConfig::from_path(path.to_string_lossy()));
        assert_eq!(wm.load(&engine()).unwrap().dimensions(), (8, 4));
    }

    #[test]
    fn test_prepare_keeps_aspect() {
        let wm = LogoWatermark::new(ImageWatermarkConfig {
            scale: 0.1,
            opacity: 1.0,
            ..inline(200, 100)
        });
        let logo = wm.load(&engine()).unwrap();
        assert_eq!(wm.prepare(&logo, (2000, 1000)).dimensions(), (100, 50));
    }

    #[test]
    fn test_prepare_square_without_aspect() {
        let wm = LogoWatermark::new(ImageWatermarkConfig {
            scale: 0.1,
            maintain_aspect_ratio: false,
            ..inline(200, 100)
        });
        let logo = wm.load(&engine()).unwrap();
        assert_eq!(wm.prepare(&logo, (2000, 1000)).dimensions(), (100, 100));
    }

    #[test]
    fn test_prepare_grayscale_and_opacity() {
        let wm = LogoWatermark::new(ImageWatermarkConfig {
            scale: 0.5,
            opacity: 0.5,
            grayscale: true,
            ..inline(10, 10)
        });
        let logo = wm.load(&engine()).unwrap();
        let prepared = wm.prepare(&logo, (20, 20));
        let p = prepared.get_pixel(5, 5);
        assert_eq!(p[0], p[1]);
        assert_eq!(p[1], p[2]);
        assert_eq!(p[3], 127);
    }

    #[test]
    fn test_overlay_caches_source() {
        let engine = engine();
        let wm = LogoWatermark::new(inline(10, 10));
        let first = wm.overlay(&engine, (100, 100), &ExifFields::default()).unwrap();
        assert!(wm.logo.get().is_some());
        let second = wm.overlay(&engine, (100, 100), &ExifFields::default()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_logo_from_text_and_border() {
        let engine = engine();
        let font = engine.resolve_font("arial", 16);
        let (w, h) = font.measure("LOGO");

        let logo = LogoWatermark::logo_from_text(&engine, "LOGO", 16, Rgb::WHITE, Some(Rgba([0, 0, 255, 255])), 10);
        assert_eq!(logo.dimensions(), (w + 20, h + 20));
        assert_eq!(*logo.get_pixel(0, 0), Rgba([0, 0, 255, 255]));
        assert!(logo.pixels().any(|p| *p == Rgba([255, 255, 255, 255])));

        let framed = LogoWatermark::add_border(&logo, 3, Rgba([255, 0, 0, 255]));
        assert_eq!(framed.dimensions(), (w + 26, h + 26));
        assert_eq!(*framed.get_pixel(0, 0), Rgba([255, 0, 0, 255]));
        assert_eq!(*framed.get_pixel(3, 3), Rgba([0, 0, 255, 255]));
    }
}
