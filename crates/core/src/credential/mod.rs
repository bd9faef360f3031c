//! Per-provider credential storage.
//!
//! Secrets are persisted as opaque blobs (see [`vault`] for the encoding)
//! and only decoded inside a search or download call.

mod sqlite;
pub mod vault;

pub use sqlite::SqliteCredentialStore;
pub use vault::{parse_credential, seal_fields, Credential, CredentialError};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::storage::StorageError;

/// A stored credential row, without the secret itself.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialSummary {
    pub provider: String,
    /// Whether a non-empty blob is stored.
    pub configured: bool,
    pub updated_at: DateTime<Utc>,
}

/// Trait for credential blob storage.
pub trait CredentialStore: Send + Sync {
    /// Create an empty row for every provider that does not have one yet.
    fn ensure_providers(&self, providers: &[&str]) -> Result<(), StorageError>;

    /// Get the stored blob for a provider (`None` if the provider is unknown).
    fn get_blob(&self, provider: &str) -> Result<Option<String>, StorageError>;

    /// Replace the stored blob for a provider.
    fn save_blob(&self, provider: &str, blob: &str) -> Result<(), StorageError>;

    /// Summaries of every stored row, ordered by provider name.
    fn list(&self) -> Result<Vec<CredentialSummary>, StorageError>;
}
