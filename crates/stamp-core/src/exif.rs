//! EXIF metadata extraction.
//!
//! Extraction is lenient: basic image properties are always returned, and any
//! tag that is missing or malformed is skipped or kept in its string form.

use exif::{Field, In, Reader, Tag, Value};
use image::ImageDecoder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;

use crate::engine::ImageSource;
use crate::error::{PipelineError, PipelineResult};

/// Separator used by the one-line summaries.
pub const SUMMARY_SEPARATOR: &str = " | ";

/// Template used when none is given to [`ExifFields::render_template`].
pub const DEFAULT_TEMPLATE: &str = "{camera} | {aperture} {shutter} {iso} {focal_length}";

/// Placeholder names understood in watermark text.
pub const PLACEHOLDERS: &[&str] = &[
    "date",
    "time",
    "datetime",
    "camera",
    "make",
    "lens",
    "aperture",
    "shutter",
    "iso",
    "focal_length",
    "copyright",
    "artist",
    "filename",
    "width",
    "height",
];

/// An unsigned EXIF rational (numerator / denominator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExifRational {
    pub num: u32,
    pub denom: u32,
}

impl ExifRational {
    pub fn new(num: u32, denom: u32) -> Self {
        Self { num, denom }
    }

    /// Value as a float, `None` for a zero denominator.
    pub fn to_f64(self) -> Option<f64> {
        (self.denom != 0).then(|| f64::from(self.num) / f64::from(self.denom))
    }

    /// `f/2.8`
    pub fn as_aperture(self) -> String {
        match self.to_f64() {
            Some(v) => format!("f/{v:.1}"),
            None => format!("f/{self}"),
        }
    }

    /// `1/250s` or `13/10s`
    pub fn as_shutter(self) -> String {
        format!("{self}s")
    }

    /// `50mm`
    pub fn as_focal_length(self) -> String {
        match self.to_f64() {
            Some(v) => format!("{v:.0}mm"),
            None => format!("{self}mm"),
        }
    }
}

impl std::fmt::Display for ExifRational {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.num, self.denom)
    }
}

impl From<exif::Rational> for ExifRational {
    fn from(r: exif::Rational) -> Self {
        Self::new(r.num, r.denom)
    }
}

/// Friendly metadata for one image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExifFields {
    /// File name, empty for in-memory sources
    pub filename: String,
    pub width: u32,
    pub height: u32,
    /// Container format ("JPEG", "PNG", ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Pixel layout ("RGB", "RGBA", "L", ...)
    pub mode: String,

    /// Raw capture timestamp, `YYYY:MM:DD HH:MM:SS`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datetime: Option<String>,
    /// `YYYY-MM-DD`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera_make: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lens_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aperture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shutter_speed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iso: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focal_length: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orientation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub software: Option<String>,

    /// Every tag by name, when requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<BTreeMap<String, String>>,
}

impl ExifFields {
    /// Value for a watermark placeholder name.
    ///
    /// Known names always resolve (to an empty string when the field is
    /// absent); unknown names return `None`.
    pub fn placeholder(&self, name: &str) -> Option<String> {
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        let value = match name {
            "date" => opt(&self.date),
            "time" => opt(&self.time),
            "datetime" => opt(&self.datetime),
            "camera" => opt(&self.camera_model),
            "make" => opt(&self.camera_make),
            "lens" => opt(&self.lens_model),
            "aperture" => opt(&self.aperture),
            "shutter" => opt(&self.shutter_speed),
            "iso" => opt(&self.iso),
            "focal_length" => opt(&self.focal_length),
            "copyright" => opt(&self.copyright),
            "artist" => opt(&self.artist),
            "filename" => self.filename.clone(),
            "width" => self.width.to_string(),
            "height" => self.height.to_string(),
            _ => return None,
        };
        Some(value)
    }

    /// "Make Model | Lens", or "Unknown Camera".
    pub fn camera_info(&self) -> String {
        let mut parts = Vec::new();
        match (non_empty(&self.camera_make), non_empty(&self.camera_model)) {
            (Some(make), Some(model)) => {
                if model.to_lowercase().contains(&make.to_lowercase()) {
                    parts.push(model.to_string());
                } else {
                    parts.push(format!("{make} {model}"));
                }
            }
            (None, Some(model)) => parts.push(model.to_string()),
            _ => {}
        }
        if let Some(lens) = non_empty(&self.lens_model) {
            parts.push(lens.to_string());
        }

        if parts.is_empty() {
            "Unknown Camera".to_string()
        } else {
            parts.join(SUMMARY_SEPARATOR)
        }
    }

    /// "aperture | shutter | ISO | focal length", empty when none are known.
    pub fn exposure_info(&self) -> String {
        [
            &self.aperture,
            &self.shutter_speed,
            &self.iso,
            &self.focal_length,
        ]
        .into_iter()
        .filter_map(non_empty)
        .collect::<Vec<_>>()
        .join(SUMMARY_SEPARATOR)
    }

    /// Fill a template's placeholders and tidy the leftover separators.
    pub fn render_template(&self, template: &str) -> String {
        let filled = crate::watermark::placeholder::substitute(template, self);
        let collapsed = filled.split_whitespace().collect::<Vec<_>>().join(" ");
        collapsed
            .replace("| |", "|")
            .trim_matches(|c: char| c == ' ' || c == '|')
            .to_string()
    }
}

fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().filter(|s| !s.is_empty())
}

/// Reads metadata from image files or bytes.
pub struct ExifExtractor;

impl ExifExtractor {
    /// Extract friendly fields, and every tag as a string map when
    /// `include_raw` is set.
    ///
    /// Fails only when the source cannot be read or is not an image.
    pub fn extract(source: ImageSource<'_>, include_raw: bool) -> PipelineResult<ExifFields> {
        match source {
            ImageSource::Path(path) => {
                if !path.exists() {
                    return Err(PipelineError::FileNotFound(path.to_path_buf()));
                }
                let bytes = std::fs::read(path).map_err(|e| PipelineError::io(path, e))?;
                let mut fields = Self::extract_bytes(&bytes, path, include_raw)?;
                fields.filename = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                Ok(fields)
            }
            ImageSource::Bytes(bytes) => {
                Self::extract_bytes(bytes, Path::new("<memory>"), include_raw)
            }
        }
    }

    fn extract_bytes(bytes: &[u8], path: &Path, include_raw: bool) -> PipelineResult<ExifFields> {
        let decode_err = |e: image::ImageError| PipelineError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        };
        let reader = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| PipelineError::Decode {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        let format = reader.format();
        let decoder = reader.into_decoder().map_err(decode_err)?;
        let (width, height) = decoder.dimensions();

        let mut fields = ExifFields {
            width,
            height,
            format: format.map(format_name),
            mode: mode_name(decoder.color_type()).to_string(),
            ..ExifFields::default()
        };

        let exif = match Reader::new().read_from_container(&mut Cursor::new(bytes)) {
            Ok(exif) => exif,
            Err(e) => {
                tracing::trace!(path = %path.display(), "No EXIF data: {e}");
                return Ok(fields);
            }
        };

        fields.datetime = get_string(&exif, Tag::DateTimeOriginal)
            .or_else(|| get_string(&exif, Tag::DateTime));
        if let Some(datetime) = &fields.datetime {
            let (date, time) = datetime.split_once(' ').unwrap_or((datetime.as_str(), ""));
            fields.date = Some(date.replace(':', "-"));
            fields.time = Some(time.to_string());
        }
        fields.camera_make = get_string(&exif, Tag::Make);
        fields.camera_model = get_string(&exif, Tag::Model);
        fields.lens_model = get_string(&exif, Tag::LensModel);
        fields.copyright = get_string(&exif, Tag::Copyright);
        fields.artist = get_string(&exif, Tag::Artist);
        fields.software = get_string(&exif, Tag::Software);
        fields.orientation = exif
            .get_field(Tag::Orientation, In::PRIMARY)
            .map(|f| match first_uint(&f.value) {
                Some(v) => v.to_string(),
                None => display(f),
            });
        fields.aperture = exif
            .get_field(Tag::FNumber, In::PRIMARY)
            .map(|f| match first_rational(&f.value) {
                Some(r) => r.as_aperture(),
                None => format!("f/{}", display(f)),
            });
        fields.shutter_speed = exif
            .get_field(Tag::ExposureTime, In::PRIMARY)
            .map(|f| match first_rational(&f.value) {
                Some(r) => r.as_shutter(),
                None => format!("{}s", display(f)),
            });
        fields.focal_length = exif
            .get_field(Tag::FocalLength, In::PRIMARY)
            .map(|f| match first_rational(&f.value) {
                Some(r) => r.as_focal_length(),
                None => format!("{}mm", display(f)),
            });
        fields.iso = exif
            .get_field(Tag::PhotographicSensitivity, In::PRIMARY)
            .map(|f| match first_uint(&f.value) {
                Some(v) => format!("ISO {v}"),
                None => format!("ISO {}", display(f)),
            });

        if include_raw {
            let mut raw = BTreeMap::new();
            for field in exif.fields() {
                raw.entry(field.tag.to_string())
                    .or_insert_with(|| display(field));
            }
            fields.raw = Some(raw);
        }

        Ok(fields)
    }

    /// The container's EXIF payload, for re-embedding into the output.
    pub fn raw_exif(bytes: &[u8]) -> Option<Vec<u8>> {
        use img_parts::{Bytes, DynImage, ImageEXIF};

        let image = DynImage::from_bytes(Bytes::copy_from_slice(bytes)).ok()??;
        image.exif().map(|exif| exif.to_vec())
    }
}

fn get_string(exif: &exif::Exif, tag: Tag) -> Option<String> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    let text = match &field.value {
        Value::Ascii(parts) => parts
            .iter()
            .map(|p| String::from_utf8_lossy(p).into_owned())
            .collect::<Vec<_>>()
            .join(" "),
        _ => display(field),
    };
    let text = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    (!text.is_empty()).then(|| text.to_string())
}

fn display(field: &Field) -> String {
    field.display_value().to_string().trim_matches('"').to_string()
}

fn first_rational(value: &Value) -> Option<ExifRational> {
    match value {
        Value::Rational(v) => v.first().map(|&r| r.into()),
        _ => None,
    }
}

fn first_uint(value: &Value) -> Option<u32> {
    match value {
        Value::Short(v) => v.first().map(|&x| u32::from(x)),
        Value::Long(v) => v.first().copied(),
        Value::Byte(v) => v.first().map(|&x| u32::from(x)),
        _ => None,
    }
}

fn format_name(format: image::ImageFormat) -> String {
    format
        .extensions_str()
        .first()
        .map(|ext| match *ext {
            "jpg" => "JPEG".to_string(),
            "tif" => "TIFF".to_string(),
            other => other.to_uppercase(),
        })
        .unwrap_or_else(|| format!("{format:?}").to_uppercase())
}

fn mode_name(color: image::ColorType) -> &'static str {
    use image::ColorType;
    match color {
        ColorType::L8 | ColorType::L16 => "L",
        ColorType::La8 | ColorType::La16 => "LA",
        ColorType::Rgb8 | ColorType::Rgb16 | ColorType::Rgb32F => "RGB",
        _ => "RGBA",
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};

    fn png_bytes() -> Vec<u8> {
        let img = RgbImage::from_pixel(40, 30, Rgb([10, 20, 30]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn sample_fields() -> ExifFields {
        ExifFields {
            filename: "beach.jpg".into(),
            width: 4000,
            height: 3000,
            camera_make: Some("Canon".into()),
            camera_model: Some("Canon EOS R5".into()),
            lens_model: Some("RF 24-70mm F2.8".into()),
            aperture: Some("f/2.8".into()),
            shutter_speed: Some("1/250s".into()),
            iso: Some("ISO 400".into()),
            focal_length: Some("50mm".into()),
            ..ExifFields::default()
        }
    }

    #[test]
    fn test_rational_formatting() {
        assert_eq!(ExifRational::new(28, 10).as_aperture(), "f/2.8");
        assert_eq!(ExifRational::new(1, 250).as_shutter(), "1/250s");
        assert_eq!(ExifRational::new(13, 10).as_shutter(), "13/10s");
        assert_eq!(ExifRational::new(500, 10).as_focal_length(), "50mm");
    }

    #[test]
    fn test_rational_zero_denominator_falls_back() {
        let r = ExifRational::new(5, 0);
        assert_eq!(r.to_f64(), None);
        assert_eq!(r.as_aperture(), "f/5/0");
        assert_eq!(r.as_focal_length(), "5/0mm");
    }

    #[test]
    fn test_extract_without_exif_returns_basic_fields() {
        let bytes = png_bytes();
        let fields = ExifExtractor::extract(ImageSource::Bytes(&bytes), true).unwrap();
        assert_eq!((fields.width, fields.height), (40, 30));
        assert_eq!(fields.format.as_deref(), Some("PNG"));
        assert_eq!(fields.mode, "RGB");
        assert!(fields.datetime.is_none());
        assert!(fields.raw.is_none());
        assert!(fields.filename.is_empty());
    }

    #[test]
    fn test_extract_from_path_sets_filename() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png");
        std::fs::write(&path, png_bytes()).unwrap();

        let fields = ExifExtractor::extract(ImageSource::Path(&path), false).unwrap();
        assert_eq!(fields.filename, "photo.png");
    }

    #[test]
    fn test_extract_missing_file() {
        let err =
            ExifExtractor::extract(ImageSource::Path(Path::new("/nonexistent/x.jpg")), false)
                .unwrap_err();
        assert!(matches!(err, PipelineError::FileNotFound(_)));
    }

    #[test]
    fn test_extract_camera_fields() {
        let bytes = fixtures::camera_jpeg();
        let fields = ExifExtractor::extract(ImageSource::Bytes(&bytes), true).unwrap();
        assert_eq!((fields.width, fields.height), (40, 30));
        assert_eq!(fields.format.as_deref(), Some("JPEG"));
        assert_eq!(fields.camera_make.as_deref(), Some("Canon"));
        assert_eq!(fields.datetime.as_deref(), Some("2024:06:01 12:34:56"));
        assert_eq!(fields.date.as_deref(), Some("2024-06-01"));
        assert_eq!(fields.time.as_deref(), Some("12:34:56"));
        assert_eq!(fields.aperture.as_deref(), Some("f/2.8"));
        assert_eq!(fields.shutter_speed.as_deref(), Some("1/250s"));
        assert_eq!(fields.iso.as_deref(), Some("ISO 400"));
        assert_eq!(fields.focal_length.as_deref(), Some("50mm"));
        assert_eq!(fields.exposure_info(), "f/2.8 | 1/250s | ISO 400 | 50mm");
        assert!(fields.raw.as_ref().is_some_and(|raw| raw.contains_key("Make")));
    }

    #[test]
    fn test_raw_exif_present() {
        let raw = ExifExtractor::raw_exif(&fixtures::camera_jpeg()).unwrap();
        assert_eq!(raw, fixtures::camera_exif());
    }

    #[test]
    fn test_raw_exif_absent() {
        assert!(ExifExtractor::raw_exif(&png_bytes()).is_none());
        assert!(ExifExtractor::raw_exif(b"junk").is_none());
    }

    #[test]
    fn test_camera_info_dedups_make() {
        let fields = sample_fields();
        assert_eq!(fields.camera_info(), "Canon EOS R5 | RF 24-70mm F2.8");

        let fields = ExifFields {
            camera_make: Some("SONY".into()),
            camera_model: Some("ILCE-7M3".into()),
            ..ExifFields::default()
        };
        assert_eq!(fields.camera_info(), "SONY ILCE-7M3");
        assert_eq!(ExifFields::default().camera_info(), "Unknown Camera");
    }

    #[test]
    fn test_exposure_info() {
        assert_eq!(
            sample_fields().exposure_info(),
            "f/2.8 | 1/250s | ISO 400 | 50mm"
        );
        assert_eq!(ExifFields::default().exposure_info(), "");
    }

    #[test]
    fn test_render_default_template() {
        assert_eq!(
            sample_fields().render_template(DEFAULT_TEMPLATE),
            "Canon EOS R5 | f/2.8 1/250s ISO 400 50mm"
        );
    }

    #[test]
    fn test_render_template_tidies_empty_fields() {
        let fields = ExifFields {
            aperture: Some("f/4.0".into()),
            ..ExifFields::default()
        };
        assert_eq!(fields.render_template(DEFAULT_TEMPLATE), "f/4.0");
        assert_eq!(ExifFields::default().render_template("{camera} | | {iso}"), "");
    }

    #[test]
    fn test_placeholder_lookup() {
        let fields = sample_fields();
        assert_eq!(fields.placeholder("camera").as_deref(), Some("Canon EOS R5"));
        assert_eq!(fields.placeholder("width").as_deref(), Some("4000"));
        assert_eq!(fields.placeholder("copyright").as_deref(), Some(""));
        assert_eq!(fields.placeholder("gps"), None);
        for name in PLACEHOLDERS {
            assert!(fields.placeholder(name).is_some(), "{name} should resolve");
        }
    }
}
