//! Migration orchestrator implementation.
//!
//! Channels are migrated one at a time, each through the same fixed
//! sequence: site, user, permission, export, import jobs. Steps already
//! done for a channel are never undone when a later step fails.

use std::sync::Arc;

use tracing::{error, info, info_span, warn, Instrument};

use crate::channel::Channel;
use crate::config::apply_task_mode;
use crate::exporter::{ChannelExporter, ExportWindow};
use crate::platform::{NewImportJob, Importer, ImporterTemplate, PlatformError, TargetPlatform};
use crate::report::ReportLedger;

use super::config::{FailurePolicy, OrchestratorConfig};
use super::types::{MigrationError, MigrationResult, MigrationStatus, RunSummary, EXPORT_FAILED};

/// The migration orchestrator.
pub struct MigrationOrchestrator {
    config: OrchestratorConfig,
    platform: TargetPlatform,
    exporter: Arc<dyn ChannelExporter>,
    importers: Vec<Importer>,
}

impl MigrationOrchestrator {
    /// Create a new orchestrator with no importers provisioned.
    pub fn new(
        config: OrchestratorConfig,
        platform: TargetPlatform,
        exporter: Arc<dyn ChannelExporter>,
    ) -> Self {
        Self {
            config,
            platform,
            exporter,
            importers: Vec::new(),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn platform(&self) -> &TargetPlatform {
        &self.platform
    }

    /// Importers shared by every channel of the run.
    pub fn importers(&self) -> &[Importer] {
        &self.importers
    }

    /// Ensure every template exists on the platform.
    ///
    /// Sets the task mode on each template first. Replaces the importers
    /// of any previous call.
    pub async fn provision_importers(
        &mut self,
        mut templates: Vec<ImporterTemplate>,
        as_task: bool,
    ) -> Result<&[Importer], PlatformError> {
        apply_task_mode(&mut templates, as_task);

        let mut importers = Vec::with_capacity(templates.len());
        for template in &templates {
            importers.push(self.platform.ensure_importer(template).await?);
        }

        info!("{} importers ready", importers.len());
        self.importers = importers;
        Ok(&self.importers)
    }

    /// Run the whole pipeline for one channel.
    ///
    /// A failed export is not an error: the result carries an error status
    /// and no import jobs.
    pub async fn migrate_channel(
        &self,
        channel: &Channel,
    ) -> Result<MigrationResult, MigrationError> {
        let span = info_span!("channel", slug = %channel.slug);
        self.migrate_channel_inner(channel)
            .instrument(span)
            .await
            .map_err(|source| MigrationError::Platform {
                slug: channel.slug.clone(),
                source,
            })
    }

    async fn migrate_channel_inner(
        &self,
        channel: &Channel,
    ) -> Result<MigrationResult, PlatformError> {
        info!("Migrating channel '{}' from {}", channel.name, channel.url);

        let site = self
            .platform
            .create_or_get_site(&channel.name, &channel.slug)
            .await?;
        let user = self
            .platform
            .create_or_get_user(&channel.editor, &self.config.user_domain)
            .await?;
        self.platform
            .grant_site_permission(site.id, user.id, &self.config.site_role)
            .await?;

        let window = self.config.from_date.map(ExportWindow::from_date);
        let artifact = self
            .exporter
            .export_channel(&channel.url, &self.config.exports_dir, window)
            .await;

        let mut jobs = Vec::new();
        let status = if artifact.success {
            if self.importers.is_empty() {
                warn!("No importers provisioned, no import jobs created");
            }
            for importer in &self.importers {
                let new_job = NewImportJob {
                    importer_id: importer.id,
                    artifact_path: artifact.path.clone(),
                    channel_name: channel.name.clone(),
                    owner_id: Some(user.id),
                    site_id: Some(site.id),
                    min_post_date: self.config.from_date,
                };
                jobs.push(self.platform.create_import_job(&new_job).await?);
            }
            info!("Channel migrated with {} import jobs", jobs.len());
            MigrationStatus::Success
        } else {
            warn!("Export failed, skipping import jobs");
            MigrationStatus::Error {
                message: EXPORT_FAILED.to_string(),
            }
        };

        Ok(MigrationResult {
            channel: channel.clone(),
            site,
            user,
            artifact,
            jobs,
            status,
            importers: self.importers.clone(),
        })
    }

    /// Migrate `channels` in order, appending each result to `ledger`.
    ///
    /// With [`FailurePolicy::Abort`] the first error ends the run and is
    /// returned. With [`FailurePolicy::Continue`] it is recorded in the
    /// summary and the next channel starts.
    pub async fn run(
        &self,
        channels: &[Channel],
        ledger: Option<&ReportLedger>,
    ) -> Result<RunSummary, MigrationError> {
        info!(
            "Starting migration of {} channels ({:?} on error)",
            channels.len(),
            self.config.failure_policy
        );
        let mut summary = RunSummary::default();

        for (index, channel) in channels.iter().enumerate() {
            info!(
                "Processing channel {}/{}: {}",
                index + 1,
                channels.len(),
                channel.name
            );

            match self.process_channel(channel, ledger).await {
                Ok(result) => summary.record(result),
                Err(e) => match self.config.failure_policy {
                    FailurePolicy::Abort => {
                        error!("Aborting run: {}", e);
                        return Err(e);
                    }
                    FailurePolicy::Continue => {
                        error!("Channel failed, continuing: {}", e);
                        summary.record_failure(&e);
                    }
                },
            }
        }

        info!(
            "Migration finished: {} succeeded, {} export failures, {} failed",
            summary.succeeded,
            summary.export_failed,
            summary.failed.len()
        );
        Ok(summary)
    }

    async fn process_channel(
        &self,
        channel: &Channel,
        ledger: Option<&ReportLedger>,
    ) -> Result<MigrationResult, MigrationError> {
        let result = self.migrate_channel(channel).await?;

        if let Some(ledger) = ledger {
            ledger
                .add_channel_report(channel, &result)
                .map_err(|source| MigrationError::Report {
                    slug: channel.slug.clone(),
                    source,
                })?;
        }

        Ok(result)
    }
}
