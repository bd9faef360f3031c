use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Search and scan timeouts are not 0
/// - Search result limit is not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.search.provider_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "search.provider_timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.search.overall_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "search.overall_timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.search.result_limit == 0 {
        return Err(ConfigError::ValidationError(
            "search.result_limit cannot be 0".to_string(),
        ));
    }

    if config.scan.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "scan.timeout_secs cannot be 0".to_string(),
        ));
    }

    Ok(())
}
