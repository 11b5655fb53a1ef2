//! Compositing engine.
//!
//! - **io**: load images into RGBA buffers and encode them back to disk
//! - **font**: font resolution with a shared (family, size) cache
//! - **position**: anchor and custom placement
//! - **blend**: opacity, alpha compositing and grayscale
//! - **transform**: rotation, resizing and tiling
//!
//! Apart from the font cache, everything here is stateless. The engine is
//! shared by reference across worker tasks.

pub mod blend;
pub mod font;
pub mod io;
pub mod position;
pub mod transform;

pub use blend::{apply_opacity, blend_onto, blend_over, composite, grayscale};
pub use font::{FontCache, FontHandle};
pub use io::{flatten_on_white, ImageSource};
pub use position::compute_position;
pub use transform::{resize, rotate, tile};

use std::sync::Arc;

use crate::config::{Config, LimitsConfig};

/// Loads, saves and renders images for watermarking.
#[derive(Debug, Clone)]
pub struct WatermarkEngine {
    fonts: Arc<FontCache>,
    limits: LimitsConfig,
    supported_formats: Vec<String>,
}

impl WatermarkEngine {
    /// Engine using the configured limits, input formats and font directories.
    pub fn new(config: &Config) -> Self {
        Self::with_fonts(config, Arc::new(FontCache::new(config.font_dirs())))
    }

    /// Engine sharing an existing font cache.
    pub fn with_fonts(config: &Config, fonts: Arc<FontCache>) -> Self {
        Self {
            fonts,
            limits: config.limits.clone(),
            supported_formats: config.processing.supported_formats.clone(),
        }
    }

    /// The shared font cache.
    pub fn fonts(&self) -> &Arc<FontCache> {
        &self.fonts
    }

    /// Cached font lookup. Always returns a usable font.
    pub fn resolve_font(&self, family: &str, size: u32) -> FontHandle {
        self.fonts.resolve(family, size)
    }

    pub fn limits(&self) -> &LimitsConfig {
        &self.limits
    }
}

impl Default for WatermarkEngine {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}
