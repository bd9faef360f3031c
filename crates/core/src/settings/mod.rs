//! Operator settings (singleton row).

mod sqlite;

pub use sqlite::SqliteSettingsStore;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::language;
use crate::storage::StorageError;

/// Effective operator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Preferred subtitle languages, best first. Never empty.
    pub language_priority: Vec<String>,
    /// Persisted for the UI; downloads never replace existing files.
    #[serde(default)]
    pub auto_replace_existing: bool,
    /// Directory downloaded subtitles are written to.
    pub subtitle_output_path: String,
}

impl Settings {
    /// Default settings for a fresh database.
    pub fn with_output_path(subtitle_output_path: &str) -> Self {
        Self {
            language_priority: language::default_priority(),
            auto_replace_existing: false,
            subtitle_output_path: subtitle_output_path.to_string(),
        }
    }

    /// Trim and lower-case the priority entries, dropping blanks, then
    /// check the invariants.
    pub fn normalized(mut self) -> Result<Self, SettingsError> {
        self.language_priority = self
            .language_priority
            .iter()
            .map(|entry| entry.trim().to_lowercase())
            .filter(|entry| !entry.is_empty())
            .collect();
        self.subtitle_output_path = self.subtitle_output_path.trim().to_string();

        if self.language_priority.is_empty() {
            return Err(SettingsError::Validation(
                "language_priority cannot be empty".to_string(),
            ));
        }
        if self.subtitle_output_path.is_empty() {
            return Err(SettingsError::Validation(
                "subtitle_output_path cannot be empty".to_string(),
            ));
        }
        Ok(self)
    }
}

/// Errors that can occur when reading or updating settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Invalid settings: {0}")]
    Validation(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Trait for settings storage.
pub trait SettingsStore: Send + Sync {
    /// Create the settings row with defaults if it does not exist yet and
    /// return the effective settings.
    fn ensure_defaults(&self, subtitle_output_path: &str) -> Result<Settings, SettingsError>;

    /// Read the current settings.
    fn get(&self) -> Result<Settings, SettingsError>;

    /// Validate and replace the settings.
    fn update(&self, settings: Settings) -> Result<Settings, SettingsError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_priority() {
        let settings = Settings::with_output_path("/subs");
        assert_eq!(
            settings.language_priority,
            vec!["bilingual", "zh-cn", "zh-tw"]
        );
        assert!(!settings.auto_replace_existing);
    }

    #[test]
    fn test_normalized_cleans_entries() {
        let settings = Settings {
            language_priority: vec![" ZH-CN ".to_string(), "".to_string(), "en".to_string()],
            auto_replace_existing: true,
            subtitle_output_path: " /subs ".to_string(),
        }
        .normalized()
        .unwrap();

        assert_eq!(settings.language_priority, vec!["zh-cn", "en"]);
        assert_eq!(settings.subtitle_output_path, "/subs");
    }

    #[test]
    fn test_normalized_rejects_empty_priority() {
        let result = Settings {
            language_priority: vec!["  ".to_string()],
            auto_replace_existing: false,
            subtitle_output_path: "/subs".to_string(),
        }
        .normalized();
        assert!(matches!(result, Err(SettingsError::Validation(_))));
    }

    #[test]
    fn test_normalized_rejects_empty_output_path() {
        let result = Settings {
            language_priority: vec!["en".to_string()],
            auto_replace_existing: false,
            subtitle_output_path: "".to_string(),
        }
        .normalized();
        assert!(matches!(result, Err(SettingsError::Validation(_))));
    }
}
