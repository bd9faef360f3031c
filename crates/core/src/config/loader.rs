use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;
use tracing::info;

use super::{types::Config, ConfigError};

/// Config file used when `SUBSCOUT_CONFIG` is not set.
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Prefix of environment overrides, e.g. `SUBSCOUT_SERVER__PORT=9000`.
pub const ENV_PREFIX: &str = "SUBSCOUT_";

/// Load configuration from file with environment variable overrides.
///
/// A missing file is not an error: every section has defaults, so the
/// environment alone can configure the service.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if path.exists() {
        info!("Loading configuration from {}", path.display());
    } else if path.as_os_str().is_empty() {
        return Err(ConfigError::FileNotFound(String::new()));
    } else {
        info!(
            "Configuration file {} not found, using defaults",
            path.display()
        );
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[server]
port = 9000

[library]
media_paths = ["/srv/media"]
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.library.media_paths, vec!["/srv/media".to_string()]);
    }

    #[test]
    fn test_load_config_from_str_wrong_type() {
        let toml = r#"
[server]
port = "not a port"
"#;
        let result = load_config_from_str(toml);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_config_empty_path() {
        let result = load_config(Path::new(""));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_config_missing_file_uses_defaults() {
        let config = load_config(Path::new("/nonexistent/subscout.toml")).unwrap();
        assert_eq!(config.database.path.to_str().unwrap(), "subscout.db");
        assert_eq!(config.search.result_limit, 20);
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[server]
host = "127.0.0.1"
port = 3000

[providers.assrt]
token = "abc"
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host.to_string(), "127.0.0.1");
        assert_eq!(config.providers.assrt.token.as_deref(), Some("abc"));
    }
}
