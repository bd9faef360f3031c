use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use subscout_core::provider::{ASSRT, OPENSUBTITLES};
use subscout_core::{
    seal_fields, CandidateStore, Config, CredentialStore, Job, JobStore, JobUpdateCallback,
    MediaStore, ProviderRegistry, SanitizedConfig, ScanJobRunner, SearchOrchestrator,
    SettingsStore, SqliteCandidateStore, SqliteCredentialStore, SqliteJobStore, SqliteMediaStore,
    SqliteSettingsStore,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::api::WsBroadcaster;

/// Shared application state
pub struct AppState {
    config: Config,
    media_store: Arc<dyn MediaStore>,
    settings_store: Arc<dyn SettingsStore>,
    credential_store: Arc<dyn CredentialStore>,
    candidate_store: Arc<dyn CandidateStore>,
    job_store: Arc<dyn JobStore>,
    orchestrator: SearchOrchestrator,
    scan_runner: Arc<ScanJobRunner>,
    ws_broadcaster: WsBroadcaster,
    /// Cancelled on shutdown; searches run under child tokens.
    shutdown: CancellationToken,
}

impl AppState {
    /// Open every store on the configured database, make sure the
    /// registered providers have credential rows and settings exist, and
    /// wire the orchestrator and scan runner.
    pub fn open(
        config: Config,
        registry: ProviderRegistry,
        ws_broadcaster: WsBroadcaster,
    ) -> Result<Self> {
        let db_path = &config.database.path;

        let media_store: Arc<dyn MediaStore> = Arc::new(
            SqliteMediaStore::new(db_path).context("Failed to create media store")?,
        );
        let settings_store: Arc<dyn SettingsStore> = Arc::new(
            SqliteSettingsStore::new(db_path).context("Failed to create settings store")?,
        );
        let credential_store: Arc<dyn CredentialStore> = Arc::new(
            SqliteCredentialStore::new(db_path).context("Failed to create credential store")?,
        );
        let candidate_store: Arc<dyn CandidateStore> = Arc::new(
            SqliteCandidateStore::new(db_path).context("Failed to create candidate store")?,
        );
        let job_store: Arc<dyn JobStore> = Arc::new(
            SqliteJobStore::new(db_path).context("Failed to create job store")?,
        );

        credential_store
            .ensure_providers(&registry.names())
            .context("Failed to create provider credential rows")?;
        settings_store
            .ensure_defaults(&config.library.subtitle_output_path)
            .context("Failed to initialize settings")?;

        let orchestrator = SearchOrchestrator::new(
            config.search.clone(),
            registry,
            Arc::clone(&credential_store),
            Arc::clone(&candidate_store),
            Arc::clone(&media_store),
            &config.security.app_secret,
        );

        let broadcaster = ws_broadcaster.clone();
        let on_update: JobUpdateCallback = Arc::new(move |job: &Job| {
            broadcaster.job_updated(job);
        });
        let scan_runner = Arc::new(
            ScanJobRunner::new(
                Arc::clone(&job_store),
                Arc::clone(&media_store),
                config.library.media_paths.clone(),
                Duration::from_secs(config.scan.timeout_secs),
            )
            .with_update_callback(on_update),
        );

        Ok(Self {
            config,
            media_store,
            settings_store,
            credential_store,
            candidate_store,
            job_store,
            orchestrator,
            scan_runner,
            ws_broadcaster,
            shutdown: CancellationToken::new(),
        })
    }

    /// Store the provider credentials given in the configuration.
    /// Returns the providers that were seeded.
    pub fn seed_credentials(&self) -> Result<Vec<&'static str>> {
        let mut seeded = Vec::new();
        for (provider, fields) in configured_credentials(&self.config) {
            if fields.is_empty() || self.orchestrator.registry().get(provider).is_none() {
                continue;
            }
            let blob = seal_fields(&fields, &self.config.security.app_secret)
                .with_context(|| format!("Failed to seal configured {} credential", provider))?;
            self.credential_store
                .save_blob(provider, &blob)
                .with_context(|| format!("Failed to store configured {} credential", provider))?;
            info!("Seeded {} credential from configuration", provider);
            seeded.push(provider);
        }
        Ok(seeded)
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn media_store(&self) -> &dyn MediaStore {
        self.media_store.as_ref()
    }

    pub fn settings_store(&self) -> &dyn SettingsStore {
        self.settings_store.as_ref()
    }

    pub fn credential_store(&self) -> &dyn CredentialStore {
        self.credential_store.as_ref()
    }

    pub fn candidate_store(&self) -> &dyn CandidateStore {
        self.candidate_store.as_ref()
    }

    pub fn job_store(&self) -> &dyn JobStore {
        self.job_store.as_ref()
    }

    pub fn orchestrator(&self) -> &SearchOrchestrator {
        &self.orchestrator
    }

    pub fn scan_runner(&self) -> &Arc<ScanJobRunner> {
        &self.scan_runner
    }

    pub fn ws_broadcaster(&self) -> &WsBroadcaster {
        &self.ws_broadcaster
    }

    pub fn app_secret(&self) -> &str {
        &self.config.security.app_secret
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }
}

/// Non-blank credential fields per provider, as given in the config.
/// A provider whose required field is blank gets no fields at all.
fn configured_credentials(config: &Config) -> Vec<(&'static str, HashMap<String, String>)> {
    let assrt = &config.providers.assrt;
    let os = &config.providers.opensubtitles;

    vec![
        (ASSRT, present_fields("token", &[("token", &assrt.token)])),
        (
            OPENSUBTITLES,
            present_fields(
                "api_key",
                &[
                    ("api_key", &os.api_key),
                    ("username", &os.username),
                    ("password", &os.password),
                    ("user_agent", &os.user_agent),
                ],
            ),
        ),
    ]
}

fn present_fields(required: &str, fields: &[(&str, &Option<String>)]) -> HashMap<String, String> {
    let present: HashMap<String, String> = fields
        .iter()
        .filter_map(|(key, value)| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| (key.to_string(), v.to_string()))
        })
        .collect();

    if present.contains_key(required) {
        present
    } else {
        HashMap::new()
    }
}
