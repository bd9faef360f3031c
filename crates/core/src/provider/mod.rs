//! Subtitle catalog providers.
//!
//! This module provides a `SubtitleProvider` trait for searching (and
//! optionally downloading) subtitles from remote catalogs, plus the
//! built-in ASSRT and OpenSubtitles.com clients.

mod assrt;
mod opensubtitles;
mod rate_limiter;
mod registry;
mod types;

pub use assrt::{AssrtProvider, ASSRT};
pub use opensubtitles::{OpenSubtitlesProvider, DEFAULT_USER_AGENT, OPENSUBTITLES};
pub use rate_limiter::RateLimiterPool;
pub use registry::ProviderRegistry;
pub use types::*;

use std::path::Path;

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::value::RawValue;
use thiserror::Error;

use crate::candidate::SubtitleCandidate;
use crate::credential::Credential;

/// Maximum number of bytes of an error body kept in error messages.
const ERROR_BODY_LIMIT: usize = 2048;

/// Errors that can occur when talking to a subtitle provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Missing credential field: {0}")]
    MissingCredential(String),

    #[error("Empty search query")]
    EmptyQuery,

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Decode(String),

    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Not supported: {0}")]
    Unsupported(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// A remote subtitle catalog.
///
/// Implementations receive a freshly decoded credential on every call and
/// must not keep it.
#[async_trait]
pub trait SubtitleProvider: Send + Sync {
    /// Stable identifier used as the credential key and in results.
    fn name(&self) -> &str;

    /// Human-readable name.
    fn display_name(&self) -> &str;

    /// Operator-facing remark about quotas or access.
    fn note(&self) -> Option<&str> {
        None
    }

    fn supports_download(&self) -> bool {
        false
    }

    /// Whether a stored blob that is not a JSON object may be read as a
    /// bare API token.
    fn accepts_raw_token(&self) -> bool {
        false
    }

    /// Search the catalog. Returns at most `query.limit` candidates.
    async fn search(
        &self,
        credential: &Credential,
        query: &SubtitleQuery,
    ) -> Result<Vec<SubtitleCandidate>, ProviderError>;

    /// Fetch the subtitle file behind a candidate.
    async fn download(
        &self,
        _credential: &Credential,
        _candidate: &SubtitleCandidate,
    ) -> Result<DownloadedSubtitle, ProviderError> {
        Err(ProviderError::Unsupported(format!(
            "{} does not support downloads",
            self.name()
        )))
    }
}

/// Map non-success responses to `ProviderError`.
pub(crate) async fn ensure_success(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_ms = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(|secs| secs * 1000)
            .unwrap_or(0);
        return Err(ProviderError::RateLimited { retry_after_ms });
    }

    let body = response.text().await.unwrap_or_default();
    let message = truncate(body.trim(), ERROR_BODY_LIMIT);
    if status == StatusCode::NOT_FOUND {
        return Err(ProviderError::NotFound(message));
    }
    Err(ProviderError::Api {
        status: status.as_u16(),
        message,
    })
}

/// Download a file body.
pub(crate) async fn fetch_bytes(
    client: &reqwest::Client,
    url: &str,
) -> Result<Vec<u8>, ProviderError> {
    let response = ensure_success(client.get(url).send().await?).await?;
    Ok(response.bytes().await?.to_vec())
}

/// First trimmed non-empty value.
pub(crate) fn first_non_empty<'a>(values: &[&'a str]) -> Option<&'a str> {
    values.iter().map(|v| v.trim()).find(|v| !v.is_empty())
}

/// Strip any directory components from a provider-suggested file name.
pub(crate) fn base_name(filename: &str) -> Option<String> {
    let normalized = filename.trim().replace('\\', "/");
    Path::new(&normalized)
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .filter(|name| !name.is_empty())
}

/// A decoded provider record together with the exact JSON it came from.
#[derive(Debug)]
pub(crate) struct WithRaw<T> {
    pub item: T,
    pub raw: String,
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for WithRaw<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Box::<RawValue>::deserialize(deserializer)?;
        let item = serde_json::from_str(raw.get()).map_err(de::Error::custom)?;
        Ok(Self {
            item,
            raw: raw.get().to_string(),
        })
    }
}

fn truncate(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}
