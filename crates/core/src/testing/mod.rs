//! Testing utilities and mock implementations.
//!
//! This module provides a mock subtitle provider and fixtures so the search
//! pipeline can be exercised without reaching real catalogs.
//!
//! # Example
//!
//! ```rust,ignore
//! use subscout_core::testing::{MockProvider, fixtures};
//!
//! let registry = ProviderRegistry::new()
//!     .with(Arc::new(MockProvider::new("assrt").with_results(vec![
//!         fixtures::candidate("assrt", "1", "简体", 2.0),
//!     ])));
//! ```

mod mock_provider;

pub use mock_provider::{MockProvider, RecordedSearch};

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::Utc;

    use crate::candidate::SubtitleCandidate;
    use crate::language::{default_priority, normalize_language};
    use crate::media::{MediaItem, MediaType, ScannedMedia};
    use crate::provider::{SubtitleQuery, DEFAULT_RESULT_LIMIT};

    /// Create a candidate whose language is derived from `language_label`
    /// and whose score is its relevance alone.
    pub fn candidate(
        provider: &str,
        candidate_id: &str,
        language_label: &str,
        relevance: f64,
    ) -> SubtitleCandidate {
        let (language, language_label) = normalize_language(language_label);
        SubtitleCandidate {
            media_id: 0,
            provider: provider.to_string(),
            candidate_id: candidate_id.to_string(),
            title: format!("{} subtitle {}", provider, candidate_id),
            release_name: format!("Release.{}", candidate_id),
            language,
            language_label,
            score: relevance,
            relevance,
            details: String::new(),
            raw_payload: "{}".to_string(),
            expires_at: None,
            created_at: Utc::now(),
        }
    }

    /// Create a persisted-looking movie item.
    pub fn media_item(id: i64, title: &str) -> MediaItem {
        MediaItem {
            id,
            media_type: MediaType::Movie,
            title: title.to_string(),
            year: Some(2010),
            season: None,
            episode: None,
            file_path: format!("/media/{}.2010.mkv", title.replace(' ', ".")),
            file_hash: None,
            has_subtitle: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// Create a scanned movie record for `file_path`.
    pub fn scanned_movie(title: &str, file_path: &str) -> ScannedMedia {
        ScannedMedia {
            media_type: MediaType::Movie,
            title: title.to_string(),
            year: None,
            season: None,
            episode: None,
            file_path: file_path.to_string(),
            file_hash: None,
            has_subtitle: false,
        }
    }

    /// Create a movie query with the default language priority.
    pub fn query(media_id: i64, title: &str) -> SubtitleQuery {
        SubtitleQuery {
            media_id,
            title: title.to_string(),
            media_type: MediaType::Movie,
            year: None,
            season: None,
            episode: None,
            file_path: String::new(),
            limit: DEFAULT_RESULT_LIMIT,
            language_priority: default_priority(),
        }
    }
}
