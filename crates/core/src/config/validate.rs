use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Target API URL is an http(s) URL and both API keys are set
/// - User domain is a bare domain
/// - Source gateway and username are set when a source section exists
/// - Export retries allow at least one attempt
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let target = &config.target;

    if !is_http_url(&target.api_url) {
        return Err(ConfigError::ValidationError(format!(
            "target.api_url must be an http(s) URL, got '{}'",
            target.api_url
        )));
    }

    if target.key_identity.is_empty() || target.key_credential.is_empty() {
        return Err(ConfigError::ValidationError(
            "target.key_identity and target.key_credential must be set".to_string(),
        ));
    }

    if target.user_domain.is_empty() || target.user_domain.contains('@') {
        return Err(ConfigError::ValidationError(format!(
            "target.user_domain must be a bare domain, got '{}'",
            target.user_domain
        )));
    }

    if let Some(source) = &config.source {
        if !is_http_url(&source.sso_gateway) {
            return Err(ConfigError::ValidationError(format!(
                "source.sso_gateway must be an http(s) URL, got '{}'",
                source.sso_gateway
            )));
        }
        if source.username.is_empty() {
            return Err(ConfigError::ValidationError(
                "source.username cannot be empty".to_string(),
            ));
        }
        if source.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "source.retry.max_attempts cannot be 0".to_string(),
            ));
        }
    }

    Ok(())
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}
