//! Source export client.
//!
//! Downloads a channel's WXR export through an authenticated session.
//! Export failures never surface as errors: they produce an
//! [`ExportArtifact`] with `success == false` and a placeholder file.

mod retry;
mod wordpress;

pub use retry::{get_with_retry, RetryConfig, RETRY_STATUSES};
pub use wordpress::{artifact_file_name, export_url, WordPressExporter, PLACEHOLDER_PREFIX};

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use serde::Serialize;

/// Result of one export attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportArtifact {
    pub path: PathBuf,
    /// Whether `path` holds a real export rather than a placeholder.
    pub success: bool,
}

/// Month-granularity date window applied to attachment exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportWindow {
    year: i32,
    month: u32,
}

impl ExportWindow {
    /// Window covering the month of `date`; the day is dropped.
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// `YYYY-MM`, as expected by the export endpoint.
    pub fn month_param(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

/// Something that can produce a channel's export artifact.
#[async_trait]
pub trait ChannelExporter: Send + Sync {
    /// Export `channel_url` into `output_dir`. Never fails: problems are
    /// reported through the artifact.
    async fn export_channel(
        &self,
        channel_url: &str,
        output_dir: &Path,
        window: Option<ExportWindow>,
    ) -> ExportArtifact;
}
