//! Types for the migration orchestrator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::channel::Channel;
use crate::exporter::ExportArtifact;
use crate::platform::{ImportJob, Importer, PlatformError, Site, User};
use crate::report::ReportError;

/// Message recorded for channels whose export failed.
pub const EXPORT_FAILED: &str = "Export failed";

/// Errors that stop a channel's migration.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("channel '{slug}': platform error: {source}")]
    Platform {
        slug: String,
        #[source]
        source: PlatformError,
    },

    #[error("channel '{slug}': report error: {source}")]
    Report {
        slug: String,
        #[source]
        source: ReportError,
    },
}

impl MigrationError {
    pub fn slug(&self) -> &str {
        match self {
            MigrationError::Platform { slug, .. } | MigrationError::Report { slug, .. } => slug,
        }
    }
}

/// Final status of a channel that went through the whole pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MigrationStatus {
    Success,
    Error { message: String },
}

impl MigrationStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, MigrationStatus::Success)
    }
}

/// Everything one channel's migration produced.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationResult {
    pub channel: Channel,
    pub site: Site,
    pub user: User,
    pub artifact: ExportArtifact,
    pub jobs: Vec<ImportJob>,
    #[serde(flatten)]
    pub status: MigrationStatus,
    /// Importers shared by the run, used to label jobs.
    #[serde(skip)]
    pub importers: Vec<Importer>,
}

/// A channel that did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedChannel {
    pub slug: String,
    pub error: String,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Channels migrated with a successful export.
    pub succeeded: usize,
    /// Channels provisioned whose export failed.
    pub export_failed: usize,
    /// Channels stopped by an error.
    pub failed: Vec<FailedChannel>,
    pub results: Vec<MigrationResult>,
}

impl RunSummary {
    pub fn record(&mut self, result: MigrationResult) {
        if result.status.is_success() {
            self.succeeded += 1;
        } else {
            self.export_failed += 1;
        }
        self.results.push(result);
    }

    pub fn record_failure(&mut self, error: &MigrationError) {
        self.failed.push(FailedChannel {
            slug: error.slug().to_string(),
            error: error.to_string(),
        });
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.export_failed + self.failed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_value(MigrationStatus::Success).unwrap(),
            json!({"status": "success"})
        );
        assert_eq!(
            serde_json::to_value(MigrationStatus::Error {
                message: EXPORT_FAILED.to_string()
            })
            .unwrap(),
            json!({"status": "error", "message": "Export failed"})
        );
    }

    #[test]
    fn test_migration_error_keeps_slug() {
        let error = MigrationError::Platform {
            slug: "radio".to_string(),
            source: PlatformError::Http {
                status: 500,
                body: "down".to_string(),
            },
        };
        assert_eq!(error.slug(), "radio");
        assert_eq!(
            error.to_string(),
            "channel 'radio': platform error: HTTP 500: down"
        );

        let mut summary = RunSummary::default();
        summary.record_failure(&error);
        assert_eq!(summary.total(), 1);
        assert_eq!(summary.failed[0].slug, "radio");
    }
}
