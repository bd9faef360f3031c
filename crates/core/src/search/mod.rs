//! Multi-provider subtitle search.
//!
//! The `SearchOrchestrator` fans a query out to every credentialed provider,
//! ranks the merged results by the operator's language priority and
//! replaces the stored candidate set of the media item. It also downloads a
//! chosen candidate next to the configured subtitle output path.

mod config;
mod download;
mod orchestrator;

pub use config::SearchConfig;
pub use download::subtitle_file_name;
pub use orchestrator::SearchOrchestrator;

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use crate::candidate::SubtitleCandidate;
use crate::credential::CredentialError;
use crate::provider::ProviderError;
use crate::storage::StorageError;

/// Result of one search call.
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub media_id: i64,
    /// Ranked candidates, as persisted.
    pub candidates: Vec<SubtitleCandidate>,
    /// Provider name to error message, for providers that failed.
    pub errors: BTreeMap<String, String>,
    /// Providers a search task was started for, in registration order.
    pub providers_run: Vec<String>,
}

/// Result of a subtitle download.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadOutcome {
    pub media_id: i64,
    pub provider: String,
    pub candidate_id: String,
    /// Path the subtitle was written to.
    pub path: String,
    pub bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Errors that can occur during search or download.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Subtitle already exists: {0}")]
    AlreadyExists(String),

    #[error("Credential for {provider} is unreadable: {source}")]
    Credential {
        provider: String,
        #[source]
        source: CredentialError,
    },

    #[error("Provider {provider} failed: {source}")]
    Provider {
        provider: String,
        #[source]
        source: ProviderError,
    },

    #[error("Provider {provider} timed out after {secs}s")]
    Timeout { provider: String, secs: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
