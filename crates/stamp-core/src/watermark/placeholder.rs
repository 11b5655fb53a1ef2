//! `{placeholder}` substitution in watermark text.

use regex::{Captures, Regex};
use std::sync::OnceLock;

use crate::exif::ExifFields;

static PLACEHOLDER_PATTERN: OnceLock<Regex> = OnceLock::new();

fn pattern() -> &'static Regex {
    // Constant pattern, covered by the tests below.
    PLACEHOLDER_PATTERN.get_or_init(|| Regex::new(r"\{([a-z_]+)\}").expect("valid placeholder regex"))
}

/// Replace known placeholders with their field value, or an empty string
/// when the image lacks that field. Unknown `{tokens}` are left as written.
pub fn substitute(text: &str, fields: &ExifFields) -> String {
    pattern()
        .replace_all(text, |caps: &Captures| {
            fields
                .placeholder(&caps[1])
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> ExifFields {
        ExifFields {
            filename: "IMG_0001.jpg".into(),
            width: 6000,
            height: 4000,
            date: Some("2024-06-01".into()),
            camera_model: Some("X100V".into()),
            iso: Some("ISO 160".into()),
            ..ExifFields::default()
        }
    }

    #[test]
    fn test_known_placeholders_are_replaced() {
        let out = substitute("{camera} on {date}, {iso} ({width}x{height})", &fields());
        assert_eq!(out, "X100V on 2024-06-01, ISO 160 (6000x4000)");
    }

    #[test]
    fn test_missing_fields_become_empty() {
        let out = substitute("[{lens}] by {artist}", &fields());
        assert_eq!(out, "[] by ");
    }

    #[test]
    fn test_unknown_tokens_are_untouched() {
        let out = substitute("{filename} {unknown} {CAMERA} {", &fields());
        assert_eq!(out, "IMG_0001.jpg {unknown} {CAMERA} {");
    }

    #[test]
    fn test_substitution_is_per_call() {
        let mut other = fields();
        other.camera_model = Some("Z8".into());
        assert_eq!(substitute("{camera}", &fields()), "X100V");
        assert_eq!(substitute("{camera}", &other), "Z8");
    }
}
