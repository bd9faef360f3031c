//! Search orchestrator: bounded fan-out over registered providers.

use std::collections::{BTreeMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::download::{subtitle_file_name, write_new_file};
use super::{DownloadOutcome, SearchConfig, SearchError, SearchOutcome};
use crate::candidate::{CandidateStore, SubtitleCandidate};
use crate::credential::{parse_credential, Credential, CredentialStore};
use crate::language::score_by_language;
use crate::media::{MediaItem, MediaStore};
use crate::metrics;
use crate::provider::{
    ProviderError, ProviderRegistry, ProviderStatus, SubtitleProvider, SubtitleQuery,
};
use crate::settings::Settings;

/// Outcome of one provider task.
enum TaskResult {
    Found(Vec<SubtitleCandidate>),
    Failed(String),
    TimedOut,
}

/// Drives searches and downloads across the provider registry.
pub struct SearchOrchestrator {
    config: SearchConfig,
    registry: ProviderRegistry,
    credential_store: Arc<dyn CredentialStore>,
    candidate_store: Arc<dyn CandidateStore>,
    media_store: Arc<dyn MediaStore>,
    app_secret: String,
}

impl SearchOrchestrator {
    /// Create a new orchestrator.
    pub fn new(
        config: SearchConfig,
        registry: ProviderRegistry,
        credential_store: Arc<dyn CredentialStore>,
        candidate_store: Arc<dyn CandidateStore>,
        media_store: Arc<dyn MediaStore>,
        app_secret: &str,
    ) -> Self {
        Self {
            config,
            registry,
            credential_store,
            candidate_store,
            media_store,
            app_secret: app_secret.to_string(),
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Capabilities and configuration state of every registered provider.
    pub fn provider_statuses(&self) -> Result<Vec<ProviderStatus>, SearchError> {
        let mut statuses = Vec::with_capacity(self.registry.len());
        for provider in self.registry.iter() {
            let configured = self
                .credential_store
                .get_blob(provider.name())?
                .map(|blob| !blob.trim().is_empty())
                .unwrap_or(false);
            statuses.push(ProviderStatus {
                name: provider.name().to_string(),
                display_name: provider.display_name().to_string(),
                configured,
                supports_search: true,
                supports_download: provider.supports_download(),
                note: provider.note().map(str::to_string),
            });
        }
        Ok(statuses)
    }

    /// Search every credentialed provider for subtitles of `media` and
    /// replace its stored candidates with the ranked union of the results.
    ///
    /// Per-provider failures are reported in the outcome; the call itself
    /// only fails on validation or storage errors.
    pub async fn search(
        &self,
        media: &MediaItem,
        settings: &Settings,
        cancel: &CancellationToken,
    ) -> Result<SearchOutcome, SearchError> {
        if media.title.trim().is_empty() {
            return Err(SearchError::Validation(format!(
                "media {} has an empty title",
                media.id
            )));
        }

        metrics::SEARCHES_TOTAL.inc();
        let started = Instant::now();
        let query = SubtitleQuery::from_media(media, settings, self.config.result_limit);
        let provider_timeout = self.config.provider_timeout();
        let timeout_secs = self.config.provider_timeout_secs;

        let mut errors = BTreeMap::new();
        let mut providers_run = Vec::new();
        let mut tasks = JoinSet::new();

        for (index, provider) in self.registry.iter().enumerate() {
            let name = provider.name().to_string();
            let credential = match self.load_credential(provider.as_ref()) {
                Ok(credential) => credential,
                Err(e) => {
                    warn!("Skipping provider {}: {}", name, e);
                    metrics::PROVIDER_SEARCHES
                        .with_label_values(&[&name, "error"])
                        .inc();
                    errors.insert(name, e.to_string());
                    continue;
                }
            };
            if credential.is_empty() {
                debug!("Provider {} has no credential, skipping", name);
                metrics::PROVIDER_SEARCHES
                    .with_label_values(&[&name, "skipped"])
                    .inc();
                continue;
            }

            providers_run.push(name.clone());
            let provider = Arc::clone(provider);
            let query = query.clone();
            tasks.spawn(async move {
                let request_started = Instant::now();
                let search = AssertUnwindSafe(tokio::time::timeout(
                    provider_timeout,
                    provider.search(&credential, &query),
                ))
                .catch_unwind();

                let result = match search.await {
                    Ok(Ok(Ok(candidates))) => TaskResult::Found(candidates),
                    Ok(Ok(Err(e))) => TaskResult::Failed(e.to_string()),
                    Ok(Err(_elapsed)) => TaskResult::TimedOut,
                    Err(_panic) => TaskResult::Failed("provider task panicked".to_string()),
                };
                metrics::PROVIDER_SEARCH_DURATION
                    .with_label_values(&[&name])
                    .observe(request_started.elapsed().as_secs_f64());
                (index, name, result)
            });
        }

        let mut collected: Vec<(usize, Vec<SubtitleCandidate>)> = Vec::new();
        let deadline = tokio::time::sleep(self.config.overall_timeout());
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!("Search for media {} cancelled, abandoning {} providers", media.id, tasks.len());
                    tasks.abort_all();
                    break;
                }
                _ = &mut deadline => {
                    warn!("Search for media {} hit the overall deadline, abandoning {} providers", media.id, tasks.len());
                    tasks.abort_all();
                    break;
                }
                joined = tasks.join_next() => {
                    let Some(joined) = joined else { break };
                    let (index, name, result) = match joined {
                        Ok(output) => output,
                        // Panics are caught inside the task; this is an abort.
                        Err(e) => {
                            debug!("Provider task ended without output: {}", e);
                            continue;
                        }
                    };

                    match result {
                        TaskResult::Found(candidates) => {
                            debug!("Provider {} returned {} candidates", name, candidates.len());
                            metrics::PROVIDER_SEARCHES.with_label_values(&[&name, "success"]).inc();
                            collected.push((index, candidates));
                        }
                        TaskResult::Failed(message) => {
                            warn!("Provider {} search failed: {}", name, message);
                            metrics::PROVIDER_SEARCHES.with_label_values(&[&name, "error"]).inc();
                            errors.insert(name, message);
                        }
                        TaskResult::TimedOut => {
                            warn!("Provider {} timed out after {}s", name, timeout_secs);
                            metrics::PROVIDER_SEARCHES.with_label_values(&[&name, "timeout"]).inc();
                            errors.insert(name, format!("timed out after {}s", timeout_secs));
                        }
                    }
                }
            }
        }

        let candidates = rank(media.id, collected, &settings.language_priority);
        self.candidate_store
            .replace_for_media(media.id, &candidates)?;

        metrics::CANDIDATES_FOUND
            .with_label_values(&[])
            .observe(candidates.len() as f64);
        info!(
            "Search for media {} finished in {}ms: {} candidates from {} providers, {} errors",
            media.id,
            started.elapsed().as_millis(),
            candidates.len(),
            providers_run.len(),
            errors.len()
        );

        Ok(SearchOutcome {
            media_id: media.id,
            candidates,
            errors,
            providers_run,
        })
    }

    /// Download a stored candidate and write it next to the subtitle output
    /// path as `<video stem>.<language>.<ext>`.
    ///
    /// Existing files are never replaced.
    pub async fn download(
        &self,
        media_id: i64,
        provider_name: &str,
        candidate_id: &str,
        settings: &Settings,
    ) -> Result<DownloadOutcome, SearchError> {
        let media = self
            .media_store
            .get(media_id)?
            .ok_or_else(|| SearchError::NotFound(format!("media {}", media_id)))?;
        let provider = self
            .registry
            .get(provider_name)
            .ok_or_else(|| SearchError::NotFound(format!("provider {}", provider_name)))?;
        if !provider.supports_download() {
            return Err(SearchError::Provider {
                provider: provider_name.to_string(),
                source: ProviderError::Unsupported(format!(
                    "{} does not support downloads",
                    provider_name
                )),
            });
        }
        let candidate = self
            .candidate_store
            .get(media_id, provider_name, candidate_id)?
            .ok_or_else(|| {
                SearchError::NotFound(format!(
                    "candidate {} from {} for media {}",
                    candidate_id, provider_name, media_id
                ))
            })?;

        let credential = self.load_credential(provider.as_ref())?;
        if credential.is_empty() {
            return Err(SearchError::Provider {
                provider: provider_name.to_string(),
                source: ProviderError::MissingCredential(provider_name.to_string()),
            });
        }

        info!(
            "Downloading subtitle {} from {} for media {}",
            candidate_id, provider_name, media_id
        );

        let downloaded = match tokio::time::timeout(
            self.config.provider_timeout(),
            provider.download(&credential, &candidate),
        )
        .await
        {
            Ok(Ok(downloaded)) => downloaded,
            Ok(Err(source)) => {
                metrics::DOWNLOADS_TOTAL
                    .with_label_values(&[provider_name, "failed"])
                    .inc();
                return Err(SearchError::Provider {
                    provider: provider_name.to_string(),
                    source,
                });
            }
            Err(_) => {
                metrics::DOWNLOADS_TOTAL
                    .with_label_values(&[provider_name, "failed"])
                    .inc();
                return Err(SearchError::Timeout {
                    provider: provider_name.to_string(),
                    secs: self.config.provider_timeout_secs,
                });
            }
        };

        let file_name =
            subtitle_file_name(&media.file_path, &candidate.language, &downloaded.filename);
        let path = Path::new(&settings.subtitle_output_path).join(file_name);

        if let Err(e) = write_new_file(&path, &downloaded.bytes).await {
            let result = if matches!(e, SearchError::AlreadyExists(_)) {
                "exists"
            } else {
                "failed"
            };
            metrics::DOWNLOADS_TOTAL
                .with_label_values(&[provider_name, result])
                .inc();
            return Err(e);
        }

        self.media_store.mark_has_subtitle(media.id)?;
        metrics::DOWNLOADS_TOTAL
            .with_label_values(&[provider_name, "success"])
            .inc();
        info!(
            "Saved subtitle for media {} to {}",
            media.id,
            path.display()
        );

        Ok(DownloadOutcome {
            media_id: media.id,
            provider: provider_name.to_string(),
            candidate_id: candidate.candidate_id,
            path: path.to_string_lossy().to_string(),
            bytes: downloaded.bytes.len(),
            note: downloaded.note,
        })
    }

    /// Load and decode the stored credential of a provider.
    fn load_credential(&self, provider: &dyn SubtitleProvider) -> Result<Credential, SearchError> {
        let blob = self
            .credential_store
            .get_blob(provider.name())?
            .unwrap_or_default();
        parse_credential(&blob, &self.app_secret, provider.accepts_raw_token()).map_err(|source| {
            SearchError::Credential {
                provider: provider.name().to_string(),
                source,
            }
        })
    }
}

/// Merge provider results in registration order, re-score them against the
/// language priority and sort by descending score.
///
/// The sort is stable, so equal scores keep registration order. Repeated
/// `(provider, candidate_id)` pairs keep only their best-ranked entry.
fn rank(
    media_id: i64,
    mut collected: Vec<(usize, Vec<SubtitleCandidate>)>,
    priority: &[String],
) -> Vec<SubtitleCandidate> {
    collected.sort_by_key(|(index, _)| *index);

    let mut candidates: Vec<SubtitleCandidate> = collected
        .into_iter()
        .flat_map(|(_, candidates)| candidates)
        .map(|mut candidate| {
            candidate.media_id = media_id;
            candidate.score = score_by_language(priority, &candidate.language) + candidate.relevance;
            candidate
        })
        .collect();
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut seen = HashSet::new();
    candidates.retain(|c| seen.insert((c.provider.clone(), c.candidate_id.clone())));
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::SqliteCandidateStore;
    use crate::credential::{vault, SqliteCredentialStore};
    use crate::media::SqliteMediaStore;
    use crate::testing::{fixtures, MockProvider};
    use std::time::Duration;

    struct Harness {
        orchestrator: SearchOrchestrator,
        candidates: Arc<SqliteCandidateStore>,
        credentials: Arc<SqliteCredentialStore>,
        media: Arc<SqliteMediaStore>,
    }

    fn harness(providers: Vec<Arc<MockProvider>>, config: SearchConfig) -> Harness {
        let credentials = Arc::new(SqliteCredentialStore::in_memory().unwrap());
        let candidates = Arc::new(SqliteCandidateStore::in_memory().unwrap());
        let media = Arc::new(SqliteMediaStore::in_memory().unwrap());

        let mut registry = ProviderRegistry::new();
        for provider in providers {
            credentials
                .save_blob(
                    provider.name(),
                    &vault::encrypt(br#"{"token":"t"}"#, "").unwrap(),
                )
                .unwrap();
            registry.register(provider);
        }

        Harness {
            orchestrator: SearchOrchestrator::new(
                config,
                registry,
                credentials.clone(),
                candidates.clone(),
                media.clone(),
                "",
            ),
            candidates,
            credentials,
            media,
        }
    }

    fn settings() -> Settings {
        Settings::with_output_path("/subs")
    }

    #[tokio::test]
    async fn test_search_ranks_by_language_then_relevance() {
        let assrt = Arc::new(MockProvider::new("assrt").with_results(vec![
            fixtures::candidate("assrt", "en-1", "English", 5.0),
            fixtures::candidate("assrt", "chs-1", "简体", 1.0),
        ]));
        let opensubs = Arc::new(MockProvider::new("opensubtitles").with_results(vec![
            fixtures::candidate("opensubtitles", "bi-1", "中英双语", 0.5),
        ]));
        let h = harness(vec![assrt, opensubs], SearchConfig::default());

        let outcome = h
            .orchestrator
            .search(&fixtures::media_item(1, "Movie"), &settings(), &CancellationToken::new())
            .await
            .unwrap();

        let ids: Vec<_> = outcome.candidates.iter().map(|c| c.candidate_id.as_str()).collect();
        assert_eq!(ids, vec!["bi-1", "chs-1", "en-1"]);
        assert_eq!(outcome.candidates[0].score, 30.5);
        assert_eq!(outcome.candidates[2].score, 8.0);
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.providers_run, vec!["assrt", "opensubtitles"]);

        let stored = h.candidates.list_for_media(1, 100).unwrap();
        assert_eq!(stored.len(), 3);
        assert!(stored.iter().all(|c| c.media_id == 1));
    }

    #[tokio::test]
    async fn test_equal_scores_keep_registration_order() {
        let first = Arc::new(
            MockProvider::new("first")
                .with_results(vec![fixtures::candidate("first", "a", "简体", 0.0)])
                .with_delay(Duration::from_millis(50)),
        );
        let second = Arc::new(
            MockProvider::new("second")
                .with_results(vec![fixtures::candidate("second", "b", "简体", 0.0)]),
        );
        let h = harness(vec![first, second], SearchConfig::default());

        let outcome = h
            .orchestrator
            .search(&fixtures::media_item(1, "Movie"), &settings(), &CancellationToken::new())
            .await
            .unwrap();

        // "second" finishes first but "first" was registered first.
        let providers: Vec<_> = outcome.candidates.iter().map(|c| c.provider.as_str()).collect();
        assert_eq!(providers, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_empty_title_fails_before_any_provider() {
        let provider = Arc::new(MockProvider::new("assrt"));
        let h = harness(vec![provider.clone()], SearchConfig::default());
        h.candidates
            .replace_for_media(1, &[fixtures::candidate("assrt", "old", "简体", 0.0)])
            .unwrap();

        let result = h
            .orchestrator
            .search(&fixtures::media_item(1, "   "), &settings(), &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(SearchError::Validation(_))));
        assert_eq!(provider.search_count().await, 0);
        assert_eq!(h.candidates.list_for_media(1, 100).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_provider_without_credential_is_skipped() {
        let configured = Arc::new(
            MockProvider::new("configured")
                .with_results(vec![fixtures::candidate("configured", "1", "简体", 0.0)]),
        );
        let h = harness(vec![configured], SearchConfig::default());
        let unconfigured = Arc::new(MockProvider::new("unconfigured"));

        let mut registry = h.orchestrator.registry().clone();
        registry.register(unconfigured.clone());
        let orchestrator = SearchOrchestrator::new(
            SearchConfig::default(),
            registry,
            h.credentials.clone(),
            h.candidates.clone(),
            h.media.clone(),
            "",
        );

        let outcome = orchestrator
            .search(&fixtures::media_item(1, "Movie"), &settings(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.providers_run, vec!["configured"]);
        assert!(outcome.errors.is_empty());
        assert_eq!(unconfigured.search_count().await, 0);
    }

    #[tokio::test]
    async fn test_unreadable_credential_is_reported() {
        let provider = Arc::new(MockProvider::new("strict"));
        let h = harness(vec![provider.clone()], SearchConfig::default());
        h.credentials.save_blob("strict", "not-json").unwrap();

        let outcome = h
            .orchestrator
            .search(&fixtures::media_item(1, "Movie"), &settings(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(outcome.errors.contains_key("strict"));
        assert!(outcome.providers_run.is_empty());
        assert_eq!(provider.search_count().await, 0);
    }

    #[tokio::test]
    async fn test_provider_error_recorded_others_persisted() {
        let ok = Arc::new(
            MockProvider::new("ok").with_results(vec![fixtures::candidate("ok", "1", "简体", 0.0)]),
        );
        let failing = Arc::new(MockProvider::new("failing").with_failure("quota exceeded"));
        let h = harness(vec![ok, failing], SearchConfig::default());

        let outcome = h
            .orchestrator
            .search(&fixtures::media_item(1, "Movie"), &settings(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.candidates.len(), 1);
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors["failing"].contains("quota exceeded"));
    }

    #[tokio::test]
    async fn test_cancelled_search_abandons_running_providers() {
        let slow = Arc::new(
            MockProvider::new("slow")
                .with_results(vec![fixtures::candidate("slow", "1", "简体", 0.0)])
                .with_delay(Duration::from_secs(30)),
        );
        let h = harness(vec![slow], SearchConfig::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = h
            .orchestrator
            .search(&fixtures::media_item(1, "Movie"), &settings(), &cancel)
            .await
            .unwrap();

        assert!(outcome.candidates.is_empty());
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.providers_run, vec!["slow"]);
    }

    #[tokio::test]
    async fn test_overall_deadline_abandons_without_error_entry() {
        let slow = Arc::new(MockProvider::new("slow").with_delay(Duration::from_secs(30)));
        let config = SearchConfig {
            provider_timeout_secs: 20,
            overall_timeout_secs: 1,
            result_limit: 20,
        };
        let h = harness(vec![slow], config);

        let outcome = h
            .orchestrator
            .search(&fixtures::media_item(1, "Movie"), &settings(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(outcome.candidates.is_empty());
        assert!(outcome.errors.is_empty());
    }

    #[tokio::test]
    async fn test_provider_statuses() {
        let provider = Arc::new(MockProvider::new("mock").with_download("a.srt", b"1"));
        let h = harness(vec![provider], SearchConfig::default());
        let unconfigured = Arc::new(MockProvider::new("bare"));
        h.credentials.ensure_providers(&["bare"]).unwrap();

        let mut registry = h.orchestrator.registry().clone();
        registry.register(unconfigured);
        let orchestrator = SearchOrchestrator::new(
            SearchConfig::default(),
            registry,
            h.credentials.clone(),
            h.candidates.clone(),
            h.media.clone(),
            "",
        );

        let statuses = orchestrator.provider_statuses().unwrap();
        assert_eq!(statuses.len(), 2);
        assert!(statuses[0].configured);
        assert!(statuses[0].supports_download);
        assert!(!statuses[1].configured);
        assert!(!statuses[1].supports_download);
    }

    #[test]
    fn test_rank_deduplicates_provider_ids() {
        let collected = vec![(
            0,
            vec![
                fixtures::candidate("p", "dup", "简体", 2.0),
                fixtures::candidate("p", "dup", "简体", 1.0),
            ],
        )];
        let ranked = rank(1, collected, &["zh-cn".to_string()]);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].score, 12.0);
    }

    #[test]
    fn test_rank_is_stable_when_rescored() {
        let collected = vec![
            (1, vec![fixtures::candidate("b", "1", "English", 0.0)]),
            (0, vec![fixtures::candidate("a", "1", "English", 0.0)]),
        ];
        let priority = vec!["zh-cn".to_string()];
        let once = rank(1, collected, &priority);
        let twice = rank(1, vec![(0, once.clone())], &priority);

        let order = |c: &[SubtitleCandidate]| -> Vec<String> {
            c.iter().map(|c| c.provider.clone()).collect()
        };
        assert_eq!(order(&once), vec!["a", "b"]);
        assert_eq!(order(&once), order(&twice));
    }
}
