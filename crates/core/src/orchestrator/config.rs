//! Orchestrator configuration.

use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::Config;

/// What a run does when a channel hits a platform or report error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the run and return the error.
    #[default]
    Abort,
    /// Record the channel as failed and move on to the next one.
    Continue,
}

/// Settings of one migration run.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// Domain appended to editor usernames.
    pub user_domain: String,
    /// Role granted to each editor on its channel site.
    pub site_role: String,
    /// Where export artifacts are written.
    pub exports_dir: PathBuf,
    /// Only content from this date on is migrated.
    /// The export is windowed by its month, the import by the exact day.
    pub from_date: Option<NaiveDate>,
    pub failure_policy: FailurePolicy,
}

impl OrchestratorConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            user_domain: config.target.user_domain.clone(),
            site_role: config.target.site_role.clone(),
            exports_dir: config.migration.exports_dir.clone(),
            from_date: config.migration.from_date,
            failure_policy: config.migration.failure_policy,
        }
    }
}
