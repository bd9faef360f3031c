pub mod candidate;
pub mod config;
pub mod credential;
pub mod job;
pub mod language;
pub mod media;
pub mod metrics;
pub mod provider;
pub mod search;
pub mod settings;
pub mod storage;
pub mod testing;

pub use candidate::{CandidateStore, SqliteCandidateStore, SubtitleCandidate};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use credential::{
    parse_credential, seal_fields, Credential, CredentialError, CredentialStore,
    CredentialSummary, SqliteCredentialStore,
};
pub use job::{Job, JobStatus, JobStore, JobUpdateCallback, ScanJobRunner, SqliteJobStore};
pub use language::{normalize_language, score_by_language};
pub use media::{
    parse_filename, FilesystemScanner, MediaFilter, MediaItem, MediaStore, MediaType,
    ParsedFilename, ScanError, ScanResult, ScannedMedia, SqliteMediaStore, UpsertSummary,
};
pub use provider::{
    AssrtProvider, DownloadedSubtitle, OpenSubtitlesProvider, ProviderError, ProviderRegistry,
    ProviderStatus, SubtitleProvider, SubtitleQuery,
};
pub use search::{
    DownloadOutcome, SearchConfig, SearchError, SearchOrchestrator, SearchOutcome,
};
pub use settings::{Settings, SettingsError, SettingsStore, SqliteSettingsStore};
pub use storage::StorageError;
