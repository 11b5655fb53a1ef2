//! Image loading and saving.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::{ExtendedColorType, GenericImageView, ImageEncoder, RgbImage, RgbaImage};
use img_parts::{Bytes, ImageEXIF};
use std::io::Cursor;
use std::path::{Path, PathBuf};

use super::WatermarkEngine;
use crate::error::{PipelineError, PipelineResult};
use crate::types::OutputFormat;

/// Where an image comes from.
#[derive(Debug, Clone, Copy)]
pub enum ImageSource<'a> {
    /// A file on disk; the extension must be a supported input format
    Path(&'a Path),
    /// Encoded image bytes; the format is sniffed from the content
    Bytes(&'a [u8]),
}

impl<'a> From<&'a Path> for ImageSource<'a> {
    fn from(path: &'a Path) -> Self {
        Self::Path(path)
    }
}

impl<'a> From<&'a [u8]> for ImageSource<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Self::Bytes(bytes)
    }
}

const MEMORY_SOURCE: &str = "<memory>";

impl WatermarkEngine {
    /// Decode an image into an RGBA buffer.
    pub fn load(&self, source: ImageSource<'_>) -> PipelineResult<RgbaImage> {
        match source {
            ImageSource::Path(path) => {
                if !path.exists() {
                    return Err(PipelineError::FileNotFound(path.to_path_buf()));
                }
                if !self.is_supported(path) {
                    return Err(PipelineError::UnsupportedFormat {
                        path: path.to_path_buf(),
                        format: extension_of(path),
                    });
                }
                let bytes = std::fs::read(path).map_err(|e| PipelineError::io(path, e))?;
                self.decode(&bytes, path)
            }
            ImageSource::Bytes(bytes) => self.decode(bytes, Path::new(MEMORY_SOURCE)),
        }
    }

    /// Decode already-read bytes; `path` is only used for error context.
    pub fn decode(&self, bytes: &[u8], path: &Path) -> PipelineResult<RgbaImage> {
        let reader = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| PipelineError::Decode {
                path: path.to_path_buf(),
                message: format!("Cannot detect image format: {}", e),
            })?;
        if reader.format().is_none() {
            return Err(PipelineError::UnsupportedFormat {
                path: path.to_path_buf(),
                format: extension_of(path),
            });
        }
        let image = reader.decode().map_err(|e| PipelineError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let (width, height) = image.dimensions();
        let max_dim = self.limits.max_image_dimension;
        if width > max_dim || height > max_dim {
            return Err(PipelineError::ImageTooLarge {
                path: path.to_path_buf(),
                width,
                height,
                max_dim,
            });
        }
        Ok(image.to_rgba8())
    }

    /// Encode `image` to `path`, creating parent directories.
    ///
    /// JPEG output is flattened onto white. `quality` is the JPEG quality, or
    /// maps to PNG compression effort; WebP is always lossless. `exif` is
    /// embedded verbatim for JPEG and PNG.
    pub fn save(
        &self,
        image: &RgbaImage,
        path: &Path,
        format: OutputFormat,
        quality: u8,
        exif: Option<&[u8]>,
    ) -> PipelineResult<PathBuf> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
        }

        let mut encoded = encode(image, format, quality).map_err(|e| PipelineError::Encode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        if let Some(exif) = exif.filter(|e| !e.is_empty()) {
            match embed_exif(encoded.clone(), format, exif) {
                Ok(Some(with_exif)) => encoded = with_exif,
                Ok(None) => {
                    tracing::trace!(path = %path.display(), "Format does not carry EXIF, skipping");
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), "Could not embed EXIF: {e}");
                }
            }
        }

        std::fs::write(path, &encoded).map_err(|e| PipelineError::io(path, e))?;
        Ok(path.to_path_buf())
    }

    fn is_supported(&self, path: &Path) -> bool {
        let ext = extension_of(path);
        self.supported_formats
            .iter()
            .any(|fmt| fmt.trim_start_matches('.').eq_ignore_ascii_case(&ext))
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_else(|| "unknown".to_string())
}

fn encode(image: &RgbaImage, format: OutputFormat, quality: u8) -> image::ImageResult<Vec<u8>> {
    let (width, height) = image.dimensions();
    let mut buffer = Vec::new();
    match format {
        OutputFormat::Jpeg => {
            let rgb = flatten_on_white(image);
            JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100)).write_image(
                rgb.as_raw(),
                width,
                height,
                ExtendedColorType::Rgb8,
            )?;
        }
        OutputFormat::Png => {
            PngEncoder::new_with_quality(&mut buffer, png_compression(quality), FilterType::Adaptive)
                .write_image(image.as_raw(), width, height, ExtendedColorType::Rgba8)?;
        }
        OutputFormat::Webp => {
            WebPEncoder::new_lossless(&mut buffer).write_image(
                image.as_raw(),
                width,
                height,
                ExtendedColorType::Rgba8,
            )?;
        }
    }
    Ok(buffer)
}

/// zlib-style level `9 - quality / 12`, bucketed into the encoder's presets.
fn png_compression(quality: u8) -> CompressionType {
    let level = 9u8.saturating_sub(quality.min(100) / 12);
    match level {
        0..=3 => CompressionType::Fast,
        4..=6 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}

/// Composite onto opaque white using alpha as the mask.
pub fn flatten_on_white(image: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b, a] = image.get_pixel(x, y).0;
        let alpha = u32::from(a);
        let mix = |c: u8| ((u32::from(c) * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        image::Rgb([mix(r), mix(g), mix(b)])
    })
}

/// Re-wrap an encoded file with an EXIF payload. `None` when the format has
/// no EXIF container support here.
fn embed_exif(
    encoded: Vec<u8>,
    format: OutputFormat,
    exif: &[u8],
) -> Result<Option<Vec<u8>>, img_parts::Error> {
    let exif = Some(Bytes::copy_from_slice(exif));
    match format {
        OutputFormat::Jpeg => {
            let mut jpeg = img_parts::jpeg::Jpeg::from_bytes(Bytes::from(encoded))?;
            jpeg.set_exif(exif);
            Ok(Some(jpeg.encoder().bytes().to_vec()))
        }
        OutputFormat::Png => {
            let mut png = img_parts::png::Png::from_bytes(Bytes::from(encoded))?;
            png.set_exif(exif);
            Ok(Some(png.encoder().bytes().to_vec()))
        }
        OutputFormat::Webp => Ok(None),
    }
}
