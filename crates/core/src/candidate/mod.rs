//! Subtitle candidates offered by providers for a media item.
//!
//! Candidates are ephemeral: every search replaces the whole set for the
//! media item, so the stored set always reflects the latest search.

mod sqlite;

pub use sqlite::SqliteCandidateStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::StorageError;

/// One provider's offer of a subtitle for a media item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleCandidate {
    pub media_id: i64,
    /// Provider that produced the candidate.
    pub provider: String,
    /// Provider-native id used for downloads.
    pub candidate_id: String,
    pub title: String,
    /// Release name or file name hint.
    pub release_name: String,
    /// Canonical language code (see [`crate::language`]).
    pub language: String,
    /// Language text as the provider reported it.
    pub language_label: String,
    /// Ranking score: language priority plus `relevance`.
    pub score: f64,
    /// Provider-specific part of the score (votes, downloads, trust).
    pub relevance: f64,
    pub details: String,
    /// Snapshot of the provider's JSON for this result.
    pub raw_payload: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Trait for candidate storage.
pub trait CandidateStore: Send + Sync {
    /// Atomically replace every stored candidate of `media_id` with
    /// `candidates`. On error the previous set is left untouched.
    fn replace_for_media(
        &self,
        media_id: i64,
        candidates: &[SubtitleCandidate],
    ) -> Result<(), StorageError>;

    /// Stored candidates of a media item, best score first.
    fn list_for_media(
        &self,
        media_id: i64,
        limit: i64,
    ) -> Result<Vec<SubtitleCandidate>, StorageError>;

    /// Look up one stored candidate.
    fn get(
        &self,
        media_id: i64,
        provider: &str,
        candidate_id: &str,
    ) -> Result<Option<SubtitleCandidate>, StorageError>;
}
