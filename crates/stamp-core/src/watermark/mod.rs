//! Watermark builders.
//!
//! Each watermark kind renders a transparent overlay sized for a given
//! target; placement and compositing are shared through the [`Watermark`]
//! trait so the batch orchestrator can apply a mixed list in order.

pub mod logo;
pub mod placeholder;
pub mod text;

pub use logo::LogoWatermark;
pub use text::TextWatermark;

use image::RgbaImage;

use crate::engine::{blend_onto, compute_position, tile, WatermarkEngine};
use crate::error::PipelineResult;
use crate::exif::ExifFields;
use crate::types::{BatchProcessConfig, WatermarkPosition};

/// Where and how an overlay is laid onto the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub position: WatermarkPosition,
    pub margin: u32,
    pub custom: Option<(i32, i32)>,
    pub tile_spacing: u32,
}

/// A watermark that can be applied to images.
pub trait Watermark: Send + Sync {
    /// Short label for logs.
    fn kind(&self) -> &'static str;

    /// Render the transparent overlay for a target of `target_size`.
    fn overlay(
        &self,
        engine: &WatermarkEngine,
        target_size: (u32, u32),
        exif: &ExifFields,
    ) -> PipelineResult<RgbaImage>;

    fn placement(&self) -> Placement;

    /// Render and blend onto `canvas` in place.
    fn apply_to(
        &self,
        engine: &WatermarkEngine,
        canvas: &mut RgbaImage,
        exif: &ExifFields,
    ) -> PipelineResult<()> {
        let target = canvas.dimensions();
        let overlay = self.overlay(engine, target, exif)?;
        let placement = self.placement();

        if placement.position == WatermarkPosition::Tile {
            let layer = tile(&overlay, target, placement.tile_spacing);
            blend_onto(canvas, &layer, 0, 0);
        } else {
            let (x, y) = compute_position(
                target,
                overlay.dimensions(),
                placement.position,
                placement.margin,
                placement.custom,
            );
            blend_onto(canvas, &overlay, x, y);
        }
        Ok(())
    }

    /// Watermarked copy of `base`.
    fn apply(
        &self,
        engine: &WatermarkEngine,
        base: &RgbaImage,
        exif: &ExifFields,
    ) -> PipelineResult<RgbaImage> {
        let mut canvas = base.clone();
        self.apply_to(engine, &mut canvas, exif)?;
        Ok(canvas)
    }
}

/// Watermarks for a batch, text first and then logos, each in list order.
pub fn build_watermarks(config: &BatchProcessConfig) -> Vec<Box<dyn Watermark>> {
    let texts = config
        .text_watermarks
        .iter()
        .cloned()
        .map(|c| Box::new(TextWatermark::new(c)) as Box<dyn Watermark>);
    let logos = config
        .image_watermarks
        .iter()
        .cloned()
        .map(|c| Box::new(LogoWatermark::new(c)) as Box<dyn Watermark>);
    texts.chain(logos).collect()
}

fn custom_coords(x: Option<i32>, y: Option<i32>) -> Option<(i32, i32)> {
    x.zip(y)
}
