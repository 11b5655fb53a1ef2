//! Core data types for the Stamp watermarking pipeline.
//!
//! Watermark and batch configurations are plain serde structs so they can be
//! persisted in profiles. Each carries a `validate` method that is run before
//! a batch starts, so malformed values never surface mid-run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Where a watermark lands on the target image.
///
/// Serialized as kebab-case names (`"top-left"`, `"bottom-right"`, `"tile"`).
/// Unknown names deserialize to `BottomRight`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WatermarkPosition {
    TopLeft,
    TopCenter,
    TopRight,
    MiddleLeft,
    Center,
    MiddleRight,
    BottomLeft,
    BottomCenter,
    #[default]
    BottomRight,
    /// Explicit pixel coordinates from `custom_x` / `custom_y`
    Custom,
    /// Repeat the watermark across the whole canvas
    Tile,
}

impl WatermarkPosition {
    /// All positions, in display order.
    pub const ALL: [WatermarkPosition; 11] = [
        Self::TopLeft,
        Self::TopCenter,
        Self::TopRight,
        Self::MiddleLeft,
        Self::Center,
        Self::MiddleRight,
        Self::BottomLeft,
        Self::BottomCenter,
        Self::BottomRight,
        Self::Custom,
        Self::Tile,
    ];

    /// Fractional (x, y) anchor in {0, 0.5, 1}², or `None` for custom/tile.
    pub fn anchor(self) -> Option<(f32, f32)> {
        match self {
            Self::TopLeft => Some((0.0, 0.0)),
            Self::TopCenter => Some((0.5, 0.0)),
            Self::TopRight => Some((1.0, 0.0)),
            Self::MiddleLeft => Some((0.0, 0.5)),
            Self::Center => Some((0.5, 0.5)),
            Self::MiddleRight => Some((1.0, 0.5)),
            Self::BottomLeft => Some((0.0, 1.0)),
            Self::BottomCenter => Some((0.5, 1.0)),
            Self::BottomRight => Some((1.0, 1.0)),
            Self::Custom | Self::Tile => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TopLeft => "top-left",
            Self::TopCenter => "top-center",
            Self::TopRight => "top-right",
            Self::MiddleLeft => "middle-left",
            Self::Center => "center",
            Self::MiddleRight => "middle-right",
            Self::BottomLeft => "bottom-left",
            Self::BottomCenter => "bottom-center",
            Self::BottomRight => "bottom-right",
            Self::Custom => "custom",
            Self::Tile => "tile",
        }
    }

    /// Parse a position name, falling back to bottom-right for unknown names.
    pub fn parse_lenient(name: &str) -> Self {
        let normalized = name.trim().to_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == normalized)
            .unwrap_or_default()
    }
}

impl fmt::Display for WatermarkPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WatermarkPosition {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse_lenient(s))
    }
}

impl From<String> for WatermarkPosition {
    fn from(s: String) -> Self {
        Self::parse_lenient(&s)
    }
}

impl From<WatermarkPosition> for String {
    fn from(p: WatermarkPosition) -> Self {
        p.as_str().to_string()
    }
}

/// An RGB color, serialized as a `[r, g, b]` array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const WHITE: Rgb = Rgb(255, 255, 255);
    pub const BLACK: Rgb = Rgb(0, 0, 0);

    /// Color with the given alpha, as an image pixel.
    pub fn with_alpha(self, alpha: u8) -> image::Rgba<u8> {
        image::Rgba([self.0, self.1, self.2, alpha])
    }
}

impl FromStr for Rgb {
    type Err = String;

    /// Accepts `#rrggbb`, `rrggbb` or `r,g,b`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.contains(',') {
            let parts: Vec<&str> = s.split(',').map(str::trim).collect();
            if parts.len() != 3 {
                return Err(format!("expected r,g,b but got '{s}'"));
            }
            let channel = |p: &str| {
                p.parse::<u8>()
                    .map_err(|_| format!("color channel '{p}' must be 0-255"))
            };
            return Ok(Rgb(channel(parts[0])?, channel(parts[1])?, channel(parts[2])?));
        }

        let hex = s.trim_start_matches('#');
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("expected #rrggbb but got '{s}'"));
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|e| e.to_string());
        Ok(Rgb(channel(0)?, channel(2)?, channel(4)?))
    }
}

/// Output image format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
    Webp,
}

impl OutputFormat {
    /// File extension including the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => ".jpg",
            Self::Png => ".png",
            Self::Webp => ".webp",
        }
    }

    /// Parse format from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "jpeg" | "jpg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::Webp),
            _ => None,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Jpeg => "JPEG",
            Self::Png => "PNG",
            Self::Webp => "WEBP",
        })
    }
}

/// Text watermark settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextWatermarkConfig {
    /// Watermark text, may contain `{placeholders}` when `use_exif` is set
    pub text: String,
    pub font_family: String,
    /// Fixed font size in pixels, used when `scale_with_image` is off
    pub font_size: u32,
    pub font_color: Rgb,
    pub opacity: f32,
    pub position: WatermarkPosition,
    pub custom_x: Option<i32>,
    pub custom_y: Option<i32>,
    /// Counter-clockwise rotation in degrees
    pub rotation: f32,
    pub margin: u32,
    pub shadow: bool,
    pub shadow_color: Rgb,
    pub shadow_offset: u32,
    pub outline: bool,
    pub outline_color: Rgb,
    pub outline_width: u32,
    pub tile_spacing: u32,
    pub use_exif: bool,
    pub scale_with_image: bool,
    /// Font size as a fraction of the target's shorter side
    pub scale_factor: f32,
}

impl Default for TextWatermarkConfig {
    fn default() -> Self {
        Self {
            text: String::new(),
            font_family: "arial".to_string(),
            font_size: 36,
            font_color: Rgb::WHITE,
            opacity: 0.5,
            position: WatermarkPosition::BottomRight,
            custom_x: None,
            custom_y: None,
            rotation: 0.0,
            margin: 20,
            shadow: false,
            shadow_color: Rgb::BLACK,
            shadow_offset: 2,
            outline: false,
            outline_color: Rgb::BLACK,
            outline_width: 1,
            tile_spacing: 100,
            use_exif: false,
            scale_with_image: true,
            scale_factor: 0.08,
        }
    }
}

impl TextWatermarkConfig {
    /// A text watermark with default styling.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// "© {year} {name}" with a drop shadow. Year defaults to the current year.
    pub fn copyright(name: &str, year: Option<i32>) -> Self {
        use chrono::Datelike;

        let year = year.unwrap_or_else(|| chrono::Local::now().year());
        Self {
            text: format!("\u{a9} {year} {name}"),
            font_size: 24,
            font_color: Rgb::WHITE,
            opacity: 0.7,
            shadow: true,
            shadow_color: Rgb::BLACK,
            shadow_offset: 2,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let len = self.text.chars().count();
        if !(1..=500).contains(&len) {
            return Err(invalid("text watermark text must be 1-500 characters"));
        }
        check_range("text watermark font_size", self.font_size, 8, 500)?;
        check_unit("text watermark opacity", self.opacity)?;
        check_rotation("text watermark rotation", self.rotation)?;
        check_range("text watermark margin", self.margin, 0, 500)?;
        check_range("text watermark shadow_offset", self.shadow_offset, 0, 20)?;
        check_range("text watermark outline_width", self.outline_width, 1, 10)?;
        check_range("text watermark tile_spacing", self.tile_spacing, 10, 500)?;
        if !(0.01..=0.5).contains(&self.scale_factor) {
            return Err(invalid(
                "text watermark scale_factor must be between 0.01 and 0.5",
            ));
        }
        check_custom(self.position, self.custom_x, self.custom_y, "text")?;
        Ok(())
    }
}

/// Logo watermark settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageWatermarkConfig {
    /// Path to the logo file
    pub logo_path: Option<String>,
    /// Inline logo, plain base64 or a `data:` URL
    pub logo_base64: Option<String>,
    pub opacity: f32,
    pub position: WatermarkPosition,
    pub custom_x: Option<i32>,
    pub custom_y: Option<i32>,
    pub rotation: f32,
    pub margin: u32,
    /// Logo width as a fraction of the target's shorter side
    pub scale: f32,
    pub maintain_aspect_ratio: bool,
    pub tile_spacing: u32,
    pub grayscale: bool,
}

impl Default for ImageWatermarkConfig {
    fn default() -> Self {
        Self {
            logo_path: None,
            logo_base64: None,
            opacity: 0.5,
            position: WatermarkPosition::BottomRight,
            custom_x: None,
            custom_y: None,
            rotation: 0.0,
            margin: 20,
            scale: 0.15,
            maintain_aspect_ratio: true,
            tile_spacing: 150,
            grayscale: false,
        }
    }
}

impl ImageWatermarkConfig {
    /// A logo watermark read from a file, with default styling.
    pub fn from_path(path: impl Into<String>) -> Self {
        Self {
            logo_path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match (&self.logo_path, &self.logo_base64) {
            (Some(_), Some(_)) => {
                return Err(invalid(
                    "image watermark must set only one of logo_path or logo_base64",
                ))
            }
            (None, None) => {
                return Err(invalid(
                    "image watermark requires logo_path or logo_base64",
                ))
            }
            _ => {}
        }
        check_unit("image watermark opacity", self.opacity)?;
        check_rotation("image watermark rotation", self.rotation)?;
        check_range("image watermark margin", self.margin, 0, 500)?;
        if !(0.01..=1.0).contains(&self.scale) {
            return Err(invalid("image watermark scale must be between 0.01 and 1.0"));
        }
        check_range("image watermark tile_spacing", self.tile_spacing, 20, 500)?;
        check_custom(self.position, self.custom_x, self.custom_y, "image")?;
        Ok(())
    }
}

/// Target size for the output image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResizeConfig {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub maintain_aspect_ratio: bool,
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            maintain_aspect_ratio: true,
        }
    }
}

/// Everything applied to each file in one batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchProcessConfig {
    /// Applied first, in list order
    pub text_watermarks: Vec<TextWatermarkConfig>,
    /// Applied after all text watermarks, in list order
    pub image_watermarks: Vec<ImageWatermarkConfig>,
    pub output_format: OutputFormat,
    /// 1-100; JPEG quality, or compression effort for PNG
    pub output_quality: u8,
    pub resize: Option<ResizeConfig>,
    pub prefix: String,
    pub suffix: String,
    pub preserve_exif: bool,
}

impl Default for BatchProcessConfig {
    fn default() -> Self {
        Self {
            text_watermarks: Vec::new(),
            image_watermarks: Vec::new(),
            output_format: OutputFormat::Jpeg,
            output_quality: 90,
            resize: None,
            prefix: String::new(),
            suffix: "_watermarked".to_string(),
            preserve_exif: true,
        }
    }
}

impl BatchProcessConfig {
    /// Number of configured watermarks of either kind.
    pub fn watermark_count(&self) -> usize {
        self.text_watermarks.len() + self.image_watermarks.len()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for text in &self.text_watermarks {
            text.validate()?;
        }
        for logo in &self.image_watermarks {
            logo.validate()?;
        }
        check_range("output_quality", u32::from(self.output_quality), 1, 100)?;
        if let Some(resize) = &self.resize {
            if let Some(w) = resize.width {
                check_range("resize width", w, 1, 10000)?;
            }
            if let Some(h) = resize.height {
                check_range("resize height", h, 1, 10000)?;
            }
        }
        if self.prefix.chars().count() > 50 {
            return Err(invalid("prefix must be at most 50 characters"));
        }
        if self.suffix.chars().count() > 50 {
            return Err(invalid("suffix must be at most 50 characters"));
        }
        Ok(())
    }
}

/// Outcome of watermarking a single file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResult {
    /// Input file name
    pub input_file: String,

    /// Output file name, when the file was written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,

    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub processing_time_ms: f64,

    /// (width, height) of the decoded input
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_size: Option<(u32, u32)>,

    /// (width, height) of the written output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_size: Option<(u32, u32)>,
}

impl ProcessingResult {
    pub fn failed(input_file: impl Into<String>, error: impl fmt::Display, elapsed_ms: f64) -> Self {
        Self {
            input_file: input_file.into(),
            output_file: None,
            success: false,
            error: Some(error.to_string()),
            processing_time_ms: elapsed_ms,
            original_size: None,
            output_size: None,
        }
    }
}

/// How a batch run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchOutcome {
    #[default]
    Completed,
    Cancelled,
}

/// Aggregate outcome of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchProcessingResult {
    /// Files dispatched (after extension filtering)
    pub total_files: usize,
    pub successful: usize,
    pub failed: usize,
    pub total_time_ms: f64,
    /// Per-file results in completion order
    pub results: Vec<ProcessingResult>,
    pub outcome: BatchOutcome,
}

impl BatchProcessingResult {
    /// Empty result for a run over `total_files` inputs.
    pub fn new(total_files: usize) -> Self {
        Self {
            total_files,
            ..Self::default()
        }
    }

    /// Record one completed file.
    pub fn push(&mut self, result: ProcessingResult) {
        if result.success {
            self.successful += 1;
        } else {
            self.failed += 1;
        }
        self.results.push(result);
    }

    /// Failed results only.
    pub fn failures(&self) -> impl Iterator<Item = &ProcessingResult> {
        self.results.iter().filter(|r| !r.success)
    }
}

fn invalid(msg: &str) -> ConfigError {
    ConfigError::ValidationError(msg.to_string())
}

fn check_range(name: &str, value: u32, min: u32, max: u32) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::ValidationError(format!(
            "{name} must be between {min} and {max} (got {value})"
        )));
    }
    Ok(())
}

fn check_unit(name: &str, value: f32) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::ValidationError(format!(
            "{name} must be between 0.0 and 1.0 (got {value})"
        )));
    }
    Ok(())
}

fn check_rotation(name: &str, value: f32) -> Result<(), ConfigError> {
    if !(-360.0..=360.0).contains(&value) {
        return Err(ConfigError::ValidationError(format!(
            "{name} must be between -360 and 360 (got {value})"
        )));
    }
    Ok(())
}

fn check_custom(
    position: WatermarkPosition,
    x: Option<i32>,
    y: Option<i32>,
    kind: &str,
) -> Result<(), ConfigError> {
    if position == WatermarkPosition::Custom && (x.is_none() || y.is_none()) {
        return Err(ConfigError::ValidationError(format!(
            "{kind} watermark with custom position requires custom_x and custom_y"
        )));
    }
    Ok(())
}
