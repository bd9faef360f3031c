use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use crate::search::SearchConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub library: LibraryConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("subscout.db")
}

/// Media library configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LibraryConfig {
    /// Roots walked by library scans.
    #[serde(default = "default_media_paths")]
    pub media_paths: Vec<String>,
    /// Initial subtitle output path, used when settings are first created.
    #[serde(default = "default_subtitle_output_path")]
    pub subtitle_output_path: String,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            media_paths: default_media_paths(),
            subtitle_output_path: default_subtitle_output_path(),
        }
    }
}

fn default_media_paths() -> Vec<String> {
    vec!["/media".to_string()]
}

fn default_subtitle_output_path() -> String {
    "subtitles".to_string()
}

/// Secret material
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SecurityConfig {
    /// Key material for credential encryption. Empty stores credentials as
    /// `plain:` blobs.
    #[serde(default)]
    pub app_secret: String,
}

/// Background scan configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScanConfig {
    #[serde(default = "default_scan_timeout")]
    pub timeout_secs: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_scan_timeout(),
        }
    }
}

fn default_scan_timeout() -> u64 {
    30
}

/// Per-provider configuration. Credentials given here are seeded into the
/// credential store at startup.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub assrt: AssrtConfig,
    #[serde(default)]
    pub opensubtitles: OpenSubtitlesConfig,
}

/// ASSRT provider configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssrtConfig {
    #[serde(default)]
    pub token: Option<String>,
    /// Requests per minute allowed per API token.
    #[serde(default = "default_rate_limit_rpm")]
    pub rate_limit_rpm: u32,
}

impl Default for AssrtConfig {
    fn default() -> Self {
        Self {
            token: None,
            rate_limit_rpm: default_rate_limit_rpm(),
        }
    }
}

fn default_rate_limit_rpm() -> u32 {
    20
}

/// OpenSubtitles provider configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OpenSubtitlesConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Overrides the User-Agent sent to the API.
    #[serde(default)]
    pub user_agent: Option<String>,
}

fn is_set(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub library: LibraryConfig,
    pub app_secret_configured: bool,
    pub search: SearchConfig,
    pub scan: ScanConfig,
    pub providers: SanitizedProvidersConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedProvidersConfig {
    pub assrt: SanitizedAssrtConfig,
    pub opensubtitles: SanitizedOpenSubtitlesConfig,
}

/// Sanitized ASSRT config (token hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAssrtConfig {
    pub token_configured: bool,
    pub rate_limit_rpm: u32,
}

/// Sanitized OpenSubtitles config (key and password hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedOpenSubtitlesConfig {
    pub api_key_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub password_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        let os = &config.providers.opensubtitles;
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            library: config.library.clone(),
            app_secret_configured: !config.security.app_secret.is_empty(),
            search: config.search.clone(),
            scan: config.scan.clone(),
            providers: SanitizedProvidersConfig {
                assrt: SanitizedAssrtConfig {
                    token_configured: is_set(&config.providers.assrt.token),
                    rate_limit_rpm: config.providers.assrt.rate_limit_rpm,
                },
                opensubtitles: SanitizedOpenSubtitlesConfig {
                    api_key_configured: is_set(&os.api_key),
                    username: os.username.clone(),
                    password_configured: is_set(&os.password),
                    user_agent: os.user_agent.clone(),
                },
            },
        }
    }
}
