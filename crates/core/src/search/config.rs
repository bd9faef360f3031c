//! Search configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the search orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Upper bound for a single provider's search or download (seconds).
    #[serde(default = "default_provider_timeout")]
    pub provider_timeout_secs: u64,

    /// Upper bound for a whole search across all providers (seconds).
    /// Providers still running at the deadline are abandoned.
    #[serde(default = "default_overall_timeout")]
    pub overall_timeout_secs: u64,

    /// Maximum candidates requested from each provider.
    #[serde(default = "default_result_limit")]
    pub result_limit: usize,
}

fn default_provider_timeout() -> u64 {
    25
}

fn default_overall_timeout() -> u64 {
    60
}

fn default_result_limit() -> usize {
    20
}

impl SearchConfig {
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub fn overall_timeout(&self) -> Duration {
        Duration::from_secs(self.overall_timeout_secs)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider_timeout_secs: default_provider_timeout(),
            overall_timeout_secs: default_overall_timeout(),
            result_limit: default_result_limit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SearchConfig::default();
        assert_eq!(config.provider_timeout(), Duration::from_secs(25));
        assert_eq!(config.overall_timeout(), Duration::from_secs(60));
        assert_eq!(config.result_limit, 20);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: SearchConfig = toml::from_str("provider_timeout_secs = 5").unwrap();
        assert_eq!(config.provider_timeout_secs, 5);
        assert_eq!(config.overall_timeout_secs, 60);
    }
}
