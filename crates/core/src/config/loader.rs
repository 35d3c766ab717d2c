use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Load configuration from file with environment variable overrides.
///
/// Nested keys are separated by a double underscore, e.g.
/// `MIGRATOR_SOURCE__PASSWORD` overrides `source.password`.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("MIGRATOR_").split("__"))
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
[target]
api_url = "http://localhost/api"
key_identity = "id"
key_credential = "cred"
user_domain = "example.org"
timeout_secs = 5
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.target.timeout_secs, 5);
    }

    #[test]
    fn test_load_config_from_str_missing_target() {
        let toml = r#"
[migration]
exports_dir = "out"
"#;
        let result = load_config_from_str(toml);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[target]
api_url = "http://127.0.0.1:8080/api"
key_identity = "id"
key_credential = "cred"
user_domain = "example.org"

[migration]
exports_dir = "channels"
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.target.api_url, "http://127.0.0.1:8080/api");
        assert_eq!(config.migration.exports_dir.to_str().unwrap(), "channels");
    }
}
