use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::exporter::RetryConfig;
use crate::orchestrator::FailurePolicy;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub target: TargetConfig,
    /// Source platform access. Only required by commands that export.
    #[serde(default)]
    pub source: Option<SourceConfig>,
    #[serde(default)]
    pub migration: MigrationConfig,
}

/// Target platform (Omeka S) configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TargetConfig {
    /// REST API base URL (e.g., "https://omeka.example.org/api")
    pub api_url: String,
    /// API key identity, sent as `key_identity` on every request
    pub key_identity: String,
    /// API key credential, sent as `key_credential` on every request
    pub key_credential: String,
    /// Domain appended to editor usernames to derive their email
    pub user_domain: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_target_timeout")]
    pub timeout_secs: u32,
    /// Owner of every created site
    #[serde(default = "default_site_owner")]
    pub site_owner_id: u64,
    #[serde(default = "default_site_theme")]
    pub site_theme: String,
    /// Global role given to created editor users
    #[serde(default = "default_editor_role")]
    pub editor_role: String,
    /// Role granted to the editor on its channel site
    #[serde(default = "default_site_role")]
    pub site_role: String,
    /// Server-side directory the export files are preloaded into
    #[serde(default = "default_preload_path")]
    pub preload_path: String,
    /// Reader parameter that receives the target site id
    #[serde(default = "default_site_param_key")]
    pub site_param_key: String,
    /// Reader parameter that receives the minimum post date
    #[serde(default = "default_min_date_param_key")]
    pub min_date_param_key: String,
}

fn default_target_timeout() -> u32 {
    30
}

fn default_site_owner() -> u64 {
    1
}

fn default_site_theme() -> String {
    "freedom".to_string()
}

fn default_editor_role() -> String {
    "editor".to_string()
}

fn default_site_role() -> String {
    "viewer".to_string()
}

fn default_preload_path() -> String {
    "/var/www/html/omeka-s/files/preload".to_string()
}

fn default_site_param_key() -> String {
    "SiteId".to_string()
}

fn default_min_date_param_key() -> String {
    "MinPostDate".to_string()
}

/// Source platform (WordPress behind CAS) configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    /// CAS gateway base, without the trailing `/cas/login`
    pub sso_gateway: String,
    pub username: String,
    /// Usually supplied through `MIGRATOR_SOURCE__PASSWORD`
    #[serde(default)]
    pub password: String,
    /// Export endpoint relative to the channel URL
    #[serde(default = "default_export_path")]
    pub export_path: String,
    /// Request timeout in seconds (default: 120)
    #[serde(default = "default_source_timeout")]
    pub timeout_secs: u32,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_export_path() -> String {
    "wp-admin/export.php".to_string()
}

fn default_source_timeout() -> u32 {
    120
}

/// Run-wide migration settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MigrationConfig {
    /// Directory export artifacts are written to
    #[serde(default = "default_exports_dir")]
    pub exports_dir: PathBuf,
    /// Importer template document (JSON with an `importers` array)
    #[serde(default)]
    pub importers_file: Option<PathBuf>,
    /// Save bulk imports as queued tasks instead of running them immediately
    #[serde(default = "default_as_task")]
    pub as_task: bool,
    /// Channel report ledger
    #[serde(default)]
    pub report_file: Option<PathBuf>,
    /// Only migrate content from this date on
    #[serde(default)]
    pub from_date: Option<NaiveDate>,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    /// Last-resort source of importer labels for the report
    #[serde(default = "default_fallback_importers_file")]
    pub fallback_importers_file: PathBuf,
}

fn default_exports_dir() -> PathBuf {
    PathBuf::from("exports")
}

fn default_as_task() -> bool {
    true
}

fn default_fallback_importers_file() -> PathBuf {
    PathBuf::from("migration_config.json")
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            exports_dir: default_exports_dir(),
            importers_file: None,
            as_task: default_as_task(),
            report_file: None,
            from_date: None,
            failure_policy: FailurePolicy::default(),
            fallback_importers_file: default_fallback_importers_file(),
        }
    }
}

/// Sanitized config for logging (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub target: SanitizedTargetConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SanitizedSourceConfig>,
    pub migration: MigrationConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedTargetConfig {
    pub api_url: String,
    pub api_key_configured: bool,
    pub user_domain: String,
    pub timeout_secs: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedSourceConfig {
    pub sso_gateway: String,
    pub username: String,
    pub password_configured: bool,
    pub export_path: String,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            target: SanitizedTargetConfig {
                api_url: config.target.api_url.clone(),
                api_key_configured: !config.target.key_identity.is_empty()
                    && !config.target.key_credential.is_empty(),
                user_domain: config.target.user_domain.clone(),
                timeout_secs: config.target.timeout_secs,
            },
            source: config.source.as_ref().map(|s| SanitizedSourceConfig {
                sso_gateway: s.sso_gateway.clone(),
                username: s.username.clone(),
                password_configured: !s.password.is_empty(),
                export_path: s.export_path.clone(),
            }),
            migration: config.migration.clone(),
        }
    }
}
