use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::channel::Channel;
use crate::orchestrator::{MigrationResult, MigrationStatus};
use crate::platform::{ImportJob, Importer, ResourceId};

use super::counts::StructuralCounts;
use super::ReportError;

/// One import job as listed in a channel report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub importer: String,
    pub id: ResourceId,
}

/// Ledger entry for one migrated channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelReport {
    pub name: String,
    pub url: String,
    pub slug: String,
    pub editor: String,
    pub site_id: ResourceId,
    pub user_id: ResourceId,
    pub user_login: String,
    #[serde(flatten)]
    pub status: MigrationStatus,
    pub tasks_created: Vec<TaskSummary>,
    #[serde(flatten)]
    pub counts: StructuralCounts,
}

/// Append-only JSON array of channel reports.
///
/// Every append reads the whole file and writes it back. One writer at a
/// time is assumed.
#[derive(Debug, Clone)]
pub struct ReportLedger {
    path: PathBuf,
    fallback_importers_file: PathBuf,
}

impl ReportLedger {
    /// Open the ledger at `path`, creating it with `[]` when missing.
    ///
    /// `fallback_importers_file` is the last place importer labels are
    /// looked up when a job does not carry one.
    pub fn open(
        path: impl Into<PathBuf>,
        fallback_importers_file: impl Into<PathBuf>,
    ) -> Result<Self, ReportError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        if !path.exists() {
            std::fs::write(&path, "[]")?;
        }

        Ok(Self {
            path,
            fallback_importers_file: fallback_importers_file.into(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Build the report for `result` and append it.
    pub fn add_channel_report(
        &self,
        channel: &Channel,
        result: &MigrationResult,
    ) -> Result<ChannelReport, ReportError> {
        let report = ChannelReport {
            name: channel.name.clone(),
            url: channel.url.clone(),
            slug: channel.slug.clone(),
            editor: channel.editor.clone(),
            site_id: result.site.id,
            user_id: result.user.id,
            user_login: result.user.name.clone(),
            status: result.status.clone(),
            tasks_created: result
                .jobs
                .iter()
                .map(|job| TaskSummary {
                    importer: self.importer_label(job, &result.importers),
                    id: job.id,
                })
                .collect(),
            counts: StructuralCounts::from_file(&result.artifact.path),
        };

        let mut entries = self.entries();
        entries.push(serde_json::to_value(&report)?);
        std::fs::write(&self.path, serde_json::to_string_pretty(&entries)?)?;

        info!(
            "Added report for channel {} to {}",
            channel.name,
            self.path.display()
        );
        Ok(report)
    }

    /// Current entries; unreadable or malformed content counts as empty.
    pub fn entries(&self) -> Vec<Value> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Cannot read report {}: {}", self.path.display(), e);
                return Vec::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    "Report {} is not a JSON array ({}), starting over",
                    self.path.display(),
                    e
                );
                Vec::new()
            }
        }
    }

    fn importer_label(&self, job: &ImportJob, importers: &[Importer]) -> String {
        if let Some(label) = job.embedded_importer_label() {
            return label.to_string();
        }

        if let Some(label) = job.comment.as_deref().and_then(label_from_comment) {
            return label;
        }

        if let Some(id) = job.importer_id() {
            if let Some(importer) = importers.iter().find(|i| i.id == id) {
                return importer.label.clone();
            }
            if let Some(label) = self.fallback_label(id) {
                return label;
            }
        }

        format!("Importer {}", job.id)
    }

    fn fallback_label(&self, importer_id: ResourceId) -> Option<String> {
        let raw = std::fs::read_to_string(&self.fallback_importers_file).ok()?;
        let document: Value = serde_json::from_str(&raw).ok()?;
        document
            .get("importers")?
            .as_array()?
            .iter()
            .find(|entry| entry.get("o:id").and_then(Value::as_u64) == Some(importer_id))
            .and_then(|entry| entry.get("o:label"))
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

/// Text after `Importer:` up to the next comma, if not blank.
fn label_from_comment(comment: &str) -> Option<String> {
    let (_, rest) = comment.split_once("Importer:")?;
    let label = rest.split(',').next().unwrap_or_default().trim();
    (!label.is_empty()).then(|| label.to_string())
}
