//! Mock subtitle provider for testing.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::candidate::SubtitleCandidate;
use crate::credential::Credential;
use crate::provider::{DownloadedSubtitle, ProviderError, SubtitleProvider, SubtitleQuery};

/// A recorded search for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedSearch {
    /// The query that was searched.
    pub query: SubtitleQuery,
    /// Field names of the credential the search received.
    pub credential_keys: Vec<String>,
    /// When the search was made.
    pub timestamp: Instant,
}

/// Mock implementation of the SubtitleProvider trait.
///
/// Provides controllable behavior for testing:
/// - Return configurable candidates
/// - Track search queries for assertions
/// - Simulate failures and slow catalogs
///
/// # Example
///
/// ```rust,ignore
/// use subscout_core::testing::{MockProvider, fixtures};
///
/// let provider = MockProvider::new("assrt")
///     .with_results(vec![fixtures::candidate("assrt", "1", "简体", 2.0)])
///     .with_delay(Duration::from_millis(50));
///
/// let candidates = provider.search(&credential, &query).await?;
/// assert_eq!(provider.search_count().await, 1);
/// ```
pub struct MockProvider {
    name: String,
    display_name: String,
    accepts_raw_token: bool,
    /// Simulated catalog latency.
    delay: Option<Duration>,
    /// Configured candidates to return.
    results: Arc<RwLock<Vec<SubtitleCandidate>>>,
    /// Recorded searches.
    searches: Arc<RwLock<Vec<RecordedSearch>>>,
    /// If set, every search fails with an API error carrying this message.
    failure: Arc<RwLock<Option<String>>>,
    /// If set, the next search fails with this error.
    next_error: Arc<RwLock<Option<ProviderError>>>,
    /// File returned by downloads; `None` means downloads are unsupported.
    download: Arc<RwLock<Option<DownloadedSubtitle>>>,
    downloads: Arc<RwLock<Vec<String>>>,
}

impl std::fmt::Debug for MockProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockProvider")
            .field("name", &self.name)
            .field("delay", &self.delay)
            .field("results", &"<results>")
            .field("searches", &"<searches>")
            .field("failure", &"<failure>")
            .finish()
    }
}

impl MockProvider {
    /// Create a new mock provider with no results.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            display_name: name.to_uppercase(),
            accepts_raw_token: false,
            delay: None,
            results: Arc::new(RwLock::new(Vec::new())),
            searches: Arc::new(RwLock::new(Vec::new())),
            failure: Arc::new(RwLock::new(None)),
            next_error: Arc::new(RwLock::new(None)),
            download: Arc::new(RwLock::new(None)),
            downloads: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn with_display_name(mut self, display_name: &str) -> Self {
        self.display_name = display_name.to_string();
        self
    }

    /// Candidates returned by every search.
    pub fn with_results(mut self, results: Vec<SubtitleCandidate>) -> Self {
        self.results = Arc::new(RwLock::new(results));
        self
    }

    /// Sleep this long before answering a search.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail every search with an API error.
    pub fn with_failure(mut self, message: &str) -> Self {
        self.failure = Arc::new(RwLock::new(Some(message.to_string())));
        self
    }

    /// Serve this file for downloads.
    pub fn with_download(mut self, filename: &str, bytes: &[u8]) -> Self {
        self.download = Arc::new(RwLock::new(Some(DownloadedSubtitle {
            filename: filename.to_string(),
            bytes: bytes.to_vec(),
            note: None,
        })));
        self
    }

    pub fn with_raw_token(mut self, accepts: bool) -> Self {
        self.accepts_raw_token = accepts;
        self
    }

    /// Set the candidates to return for subsequent searches.
    pub async fn set_results(&self, results: Vec<SubtitleCandidate>) {
        *self.results.write().await = results;
    }

    /// Configure the next search to fail with the given error.
    pub async fn set_next_error(&self, error: ProviderError) {
        *self.next_error.write().await = Some(error);
    }

    /// Get recorded searches.
    pub async fn recorded_searches(&self) -> Vec<RecordedSearch> {
        self.searches.read().await.clone()
    }

    /// Get the number of searches performed.
    pub async fn search_count(&self) -> usize {
        self.searches.read().await.len()
    }

    /// Candidate ids passed to `download`.
    pub async fn recorded_downloads(&self) -> Vec<String> {
        self.downloads.read().await.clone()
    }
}

#[async_trait]
impl SubtitleProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn supports_download(&self) -> bool {
        // try_read only fails while a writer holds the lock.
        self.download
            .try_read()
            .map(|download| download.is_some())
            .unwrap_or(false)
    }

    fn accepts_raw_token(&self) -> bool {
        self.accepts_raw_token
    }

    async fn search(
        &self,
        credential: &Credential,
        query: &SubtitleQuery,
    ) -> Result<Vec<SubtitleCandidate>, ProviderError> {
        self.searches.write().await.push(RecordedSearch {
            query: query.clone(),
            credential_keys: credential.keys().into_iter().map(str::to_string).collect(),
            timestamp: Instant::now(),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }
        if let Some(message) = self.failure.read().await.clone() {
            return Err(ProviderError::Api {
                status: 500,
                message,
            });
        }

        let candidates = self
            .results
            .read()
            .await
            .iter()
            .take(query.limit)
            .cloned()
            .map(|mut candidate| {
                candidate.media_id = query.media_id;
                candidate.provider = self.name.clone();
                candidate
            })
            .collect();
        Ok(candidates)
    }

    async fn download(
        &self,
        _credential: &Credential,
        candidate: &SubtitleCandidate,
    ) -> Result<DownloadedSubtitle, ProviderError> {
        self.downloads
            .write()
            .await
            .push(candidate.candidate_id.clone());

        self.download.read().await.clone().ok_or_else(|| {
            ProviderError::Unsupported(format!("{} does not support downloads", self.name))
        })
    }
}
