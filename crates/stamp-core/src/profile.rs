//! Named, persisted watermark profiles.
//!
//! A profile is a [`BatchProcessConfig`] with a name, an optional description
//! and timestamps, stored as pretty-printed JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};
use crate::types::BatchProcessConfig;

const MAX_NAME_LEN: usize = 100;
const MAX_DESCRIPTION_LEN: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatermarkProfile {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub config: BatchProcessConfig,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl WatermarkProfile {
    /// New profile stamped with the current time.
    pub fn new(name: impl Into<String>, config: BatchProcessConfig) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            description: None,
            config,
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Mark as modified now.
    pub fn touch(&mut self) {
        let now = Utc::now();
        self.created_at.get_or_insert(now);
        self.updated_at = Some(now);
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let name_len = self.name.chars().count();
        if !(1..=MAX_NAME_LEN).contains(&name_len) {
            return Err(ConfigError::ValidationError(format!(
                "profile name must be 1-{MAX_NAME_LEN} characters"
            )));
        }
        if let Some(description) = &self.description {
            if description.chars().count() > MAX_DESCRIPTION_LEN {
                return Err(ConfigError::ValidationError(format!(
                    "profile description must be at most {MAX_DESCRIPTION_LEN} characters"
                )));
            }
        }
        self.config.validate()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and validate.
    pub fn from_json(json: &str) -> Result<Self> {
        let profile: Self = serde_json::from_str(json)?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Validate and write, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        tracing::debug!("Saved profile {:?} to {:?}", self.name, path);
        Ok(())
    }

    /// File name used inside a profile directory: lowercase, with anything
    /// other than ASCII letters and digits collapsed to `-`.
    pub fn file_name(&self) -> String {
        let mut slug = String::with_capacity(self.name.len());
        for c in self.name.chars() {
            if c.is_ascii_alphanumeric() {
                slug.push(c.to_ascii_lowercase());
            } else if !slug.ends_with('-') {
                slug.push('-');
            }
        }
        let slug = slug.trim_matches('-');
        if slug.is_empty() {
            "profile.json".to_string()
        } else {
            format!("{slug}.json")
        }
    }

    pub fn path_in(&self, dir: &Path) -> PathBuf {
        dir.join(self.file_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StampError;
    use crate::types::TextWatermarkConfig;

    fn sample() -> WatermarkProfile {
        let config = BatchProcessConfig {
            text_watermarks: vec![TextWatermarkConfig::copyright("Jane Doe", Some(2024))],
            ..BatchProcessConfig::default()
        };
        WatermarkProfile::new("Client Proofs", config).with_description("Low-opacity corner mark")
    }

    #[test]
    fn test_json_roundtrip() {
        let profile = sample();
        let json = profile.to_json().unwrap();
        assert!(json.contains("\"name\": \"Client Proofs\""));
        assert!(json.contains("bottom-right"));
        assert_eq!(WatermarkProfile::from_json(&json).unwrap(), profile);
    }

    #[test]
    fn test_from_json_validates() {
        let mut profile = sample();
        profile.name = String::new();
        let json = serde_json::to_string(&profile).unwrap();
        assert!(matches!(
            WatermarkProfile::from_json(&json),
            Err(StampError::Config(ConfigError::ValidationError(_)))
        ));

        let mut profile = sample();
        profile.config.text_watermarks[0].opacity = 2.0;
        let json = serde_json::to_string(&profile).unwrap();
        assert!(WatermarkProfile::from_json(&json).is_err());
    }

    #[test]
    fn test_description_limit() {
        let profile = sample().with_description("x".repeat(501));
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_timestamps_are_optional() {
        let json = r#"{"name": "bare", "config": {}}"#;
        let profile = WatermarkProfile::from_json(json).unwrap();
        assert!(profile.created_at.is_none());
        assert_eq!(profile.config, BatchProcessConfig::default());
    }

    #[test]
    fn test_touch_updates_timestamp() {
        let mut profile = sample();
        let created = profile.created_at;
        profile.updated_at = None;
        profile.touch();
        assert_eq!(profile.created_at, created);
        assert!(profile.updated_at.is_some());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let profile = sample();
        let path = profile.path_in(&dir.path().join("profiles"));
        assert!(path.ends_with("client-proofs.json"));

        profile.save(&path).unwrap();
        assert_eq!(WatermarkProfile::load(&path).unwrap(), profile);
    }
}
