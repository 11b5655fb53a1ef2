//! Watermark and output flags shared by `stamp apply` and `stamp profile new`.

use clap::Args;
use std::path::PathBuf;

use stamp_core::{
    BatchProcessConfig, ImageWatermarkConfig, OutputFormat, ResizeConfig, Rgb, TextWatermarkConfig,
    WatermarkPosition,
};

#[derive(Args, Debug, Clone, Default)]
pub struct WatermarkArgs {
    /// Text watermark (repeatable)
    #[arg(short, long = "text", value_name = "TEXT")]
    pub text: Vec<String>,

    /// Add "© <year> <NAME>" with a drop shadow
    #[arg(long, value_name = "NAME")]
    pub copyright: Option<String>,

    /// Logo image watermark (repeatable)
    #[arg(short, long = "logo", value_name = "PATH")]
    pub logo: Vec<PathBuf>,

    /// Anchor: top-left, top-center, ..., center, ..., bottom-right
    #[arg(short, long, value_parser = parse_position)]
    pub position: Option<WatermarkPosition>,

    /// Repeat watermarks across the whole image
    #[arg(long, conflicts_with = "position")]
    pub tile: bool,

    /// Watermark opacity, 0.0 to 1.0
    #[arg(long)]
    pub opacity: Option<f32>,

    /// Distance from the anchored edges in pixels
    #[arg(long)]
    pub margin: Option<u32>,

    /// Counter-clockwise rotation in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub rotation: Option<f32>,

    /// Font family for text watermarks
    #[arg(long)]
    pub font: Option<String>,

    /// Fixed font size in pixels (disables scaling with the image)
    #[arg(long)]
    pub font_size: Option<u32>,

    /// Text color as "#rrggbb" or "r,g,b"
    #[arg(long, value_parser = parse_rgb)]
    pub color: Option<Rgb>,

    /// Drop shadow behind text
    #[arg(long)]
    pub shadow: bool,

    /// Outline around text
    #[arg(long)]
    pub outline: bool,

    /// Fill {camera}, {date}, ... placeholders in text from EXIF
    #[arg(long)]
    pub exif_text: bool,

    /// Logo width as a fraction of the image's shorter side
    #[arg(long)]
    pub logo_scale: Option<f32>,

    /// Render logos in grayscale
    #[arg(long)]
    pub grayscale: bool,

    /// Output format: jpeg, png or webp
    #[arg(short, long, value_parser = parse_format)]
    pub format: Option<OutputFormat>,

    /// JPEG quality / PNG compression effort, 1-100
    #[arg(short, long)]
    pub quality: Option<u8>,

    /// Resize output to this width
    #[arg(long)]
    pub width: Option<u32>,

    /// Resize output to this height
    #[arg(long)]
    pub height: Option<u32>,

    /// Ignore the aspect ratio when resizing
    #[arg(long)]
    pub stretch: bool,

    /// Output file name prefix
    #[arg(long)]
    pub prefix: Option<String>,

    /// Output file name suffix
    #[arg(long)]
    pub suffix: Option<String>,

    /// Do not copy EXIF metadata into outputs
    #[arg(long)]
    pub strip_exif: bool,
}

impl WatermarkArgs {
    /// Whether any watermark was requested on the command line.
    pub fn has_watermarks(&self) -> bool {
        !self.text.is_empty() || self.copyright.is_some() || !self.logo.is_empty()
    }

    fn position(&self) -> Option<WatermarkPosition> {
        if self.tile {
            Some(WatermarkPosition::Tile)
        } else {
            self.position
        }
    }

    fn style_text(&self, mut config: TextWatermarkConfig) -> TextWatermarkConfig {
        if let Some(position) = self.position() {
            config.position = position;
        }
        if let Some(opacity) = self.opacity {
            config.opacity = opacity;
        }
        if let Some(margin) = self.margin {
            config.margin = margin;
        }
        if let Some(rotation) = self.rotation {
            config.rotation = rotation;
        }
        if let Some(font) = &self.font {
            config.font_family = font.clone();
        }
        if let Some(size) = self.font_size {
            config.font_size = size;
            config.scale_with_image = false;
        }
        if let Some(color) = self.color {
            config.font_color = color;
        }
        config.shadow |= self.shadow;
        config.outline |= self.outline;
        config.use_exif |= self.exif_text;
        config
    }

    fn style_logo(&self, mut config: ImageWatermarkConfig) -> ImageWatermarkConfig {
        if let Some(position) = self.position() {
            config.position = position;
        }
        if let Some(opacity) = self.opacity {
            config.opacity = opacity;
        }
        if let Some(margin) = self.margin {
            config.margin = margin;
        }
        if let Some(rotation) = self.rotation {
            config.rotation = rotation;
        }
        if let Some(scale) = self.logo_scale {
            config.scale = scale;
        }
        config.grayscale |= self.grayscale;
        config
    }

    /// Append requested watermarks to `base` and override its output settings.
    pub fn merge_into(&self, mut base: BatchProcessConfig) -> BatchProcessConfig {
        if let Some(name) = &self.copyright {
            base.text_watermarks
                .push(self.style_text(TextWatermarkConfig::copyright(name, None)));
        }
        for text in &self.text {
            base.text_watermarks
                .push(self.style_text(TextWatermarkConfig::new(text.clone())));
        }
        for logo in &self.logo {
            base.image_watermarks.push(
                self.style_logo(ImageWatermarkConfig::from_path(logo.to_string_lossy())),
            );
        }

        if let Some(format) = self.format {
            base.output_format = format;
        }
        if let Some(quality) = self.quality {
            base.output_quality = quality;
        }
        if self.width.is_some() || self.height.is_some() {
            base.resize = Some(ResizeConfig {
                width: self.width,
                height: self.height,
                maintain_aspect_ratio: !self.stretch,
            });
        }
        if let Some(prefix) = &self.prefix {
            base.prefix = prefix.clone();
        }
        if let Some(suffix) = &self.suffix {
            base.suffix = suffix.clone();
        }
        if self.strip_exif {
            base.preserve_exif = false;
        }
        base
    }
}

fn parse_position(s: &str) -> Result<WatermarkPosition, String> {
    let wanted = s.trim().to_lowercase().replace('_', "-");
    WatermarkPosition::ALL
        .iter()
        .copied()
        .find(|p| p.as_str() == wanted && *p != WatermarkPosition::Custom)
        .ok_or_else(|| {
            let names: Vec<&str> = WatermarkPosition::ALL
                .iter()
                .filter(|p| **p != WatermarkPosition::Custom)
                .map(|p| p.as_str())
                .collect();
            format!("unknown position '{s}' (expected one of: {})", names.join(", "))
        })
}

fn parse_rgb(s: &str) -> Result<Rgb, String> {
    s.parse()
}

fn parse_format(s: &str) -> Result<OutputFormat, String> {
    OutputFormat::parse(s).ok_or_else(|| format!("unknown format '{s}' (expected jpeg, png or webp)"))
}
