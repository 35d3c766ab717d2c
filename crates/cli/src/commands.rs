//! Subcommand implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use channel_migrator_core::config::SourceConfig;
use channel_migrator_core::exporter::ExportArtifact;
use channel_migrator_core::orchestrator::FailedChannel;
use channel_migrator_core::{
    load_channels, load_config, load_importer_templates, validate_config, Channel,
    ChannelExporter, Config, ExportWindow, FailurePolicy, MigrationOrchestrator, MigrationStatus,
    OmekaApi, OrchestratorConfig, PlatformSettings, ReportLedger, RunSummary, SanitizedConfig,
    StructuralCounts, TargetPlatform, WordPressExporter,
};

use crate::cli::{CountArgs, ExportArgs, MigrateArgs, RestrictEditorsArgs};

fn load(path: &Path) -> Result<Config> {
    info!("Loading configuration from {:?}", path);
    let config =
        load_config(path).with_context(|| format!("Failed to load config from {:?}", path))?;
    validate_config(&config).context("Configuration validation failed")?;

    let sanitized = serde_json::to_string(&SanitizedConfig::from(&config)).unwrap_or_default();
    info!("Configuration loaded: {}", sanitized);
    Ok(config)
}

fn require_source(config: &Config) -> Result<&SourceConfig> {
    config
        .source
        .as_ref()
        .context("A [source] section is required to export channels")
}

fn target_platform(config: &Config) -> Result<TargetPlatform> {
    let api = OmekaApi::new(&config.target).context("Failed to create API client")?;
    Ok(TargetPlatform::new(
        Arc::new(api),
        PlatformSettings::from(&config.target),
    ))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn migrate(config_path: &Path, args: MigrateArgs) -> Result<()> {
    let mut config = load(config_path)?;
    if args.from_date.is_some() {
        config.migration.from_date = args.from_date;
    }
    if args.report.is_some() {
        config.migration.report_file = args.report;
    }
    if args.continue_on_error {
        config.migration.failure_policy = FailurePolicy::Continue;
    }
    if args.execute_now {
        config.migration.as_task = false;
    }
    let source = require_source(&config)?;

    let channels = load_channels(&args.channels)
        .with_context(|| format!("Failed to read channels from {:?}", args.channels))?;

    let templates = match &config.migration.importers_file {
        Some(path) => load_importer_templates(path)
            .with_context(|| format!("Failed to load importer templates from {:?}", path))?,
        None => {
            warn!("No importers_file configured, no import jobs will be created");
            Vec::new()
        }
    };

    let exporter = Arc::new(WordPressExporter::from_config(source));
    let mut orchestrator = MigrationOrchestrator::new(
        OrchestratorConfig::from_config(&config),
        target_platform(&config)?,
        exporter,
    );
    orchestrator
        .provision_importers(templates, config.migration.as_task)
        .await
        .context("Failed to provision importers")?;

    let ledger = config
        .migration
        .report_file
        .as_ref()
        .map(|path| ReportLedger::open(path, &config.migration.fallback_importers_file))
        .transpose()
        .context("Failed to open report file")?;

    let summary = orchestrator.run(&channels, ledger.as_ref()).await?;
    print_json(&summary_view(&summary))?;

    if !summary.failed.is_empty() {
        bail!(
            "{} of {} channels failed",
            summary.failed.len(),
            summary.total()
        );
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct ChannelSummary<'a> {
    slug: &'a str,
    #[serde(flatten)]
    status: &'a MigrationStatus,
    site_id: u64,
    user_id: u64,
    export: &'a Path,
    jobs: Vec<u64>,
}

#[derive(Debug, Serialize)]
struct RunView<'a> {
    succeeded: usize,
    export_failed: usize,
    failed: &'a [FailedChannel],
    channels: Vec<ChannelSummary<'a>>,
}

fn summary_view(summary: &RunSummary) -> RunView<'_> {
    RunView {
        succeeded: summary.succeeded,
        export_failed: summary.export_failed,
        failed: &summary.failed,
        channels: summary
            .results
            .iter()
            .map(|r| ChannelSummary {
                slug: &r.channel.slug,
                status: &r.status,
                site_id: r.site.id,
                user_id: r.user.id,
                export: &r.artifact.path,
                jobs: r.jobs.iter().map(|j| j.id).collect(),
            })
            .collect(),
    }
}

/// Channels between 1-based positions `start` and `stop`, both inclusive.
pub fn select_range(
    channels: Vec<Channel>,
    start: Option<usize>,
    stop: Option<usize>,
) -> Vec<Channel> {
    channels
        .into_iter()
        .enumerate()
        .filter(|(index, _)| {
            let position = index + 1;
            start.map_or(true, |s| position >= s) && stop.map_or(true, |s| position <= s)
        })
        .map(|(_, channel)| channel)
        .collect()
}

#[derive(Debug, Serialize)]
struct ExportOutcome {
    slug: String,
    #[serde(flatten)]
    artifact: ExportArtifact,
    size_bytes: u64,
    elapsed_secs: f64,
}

pub async fn export(config_path: &Path, args: ExportArgs) -> Result<()> {
    let config = load(config_path)?;
    let source = require_source(&config)?;

    let channels = load_channels(&args.channels)
        .with_context(|| format!("Failed to read channels from {:?}", args.channels))?;
    let channels = select_range(channels, args.start, args.stop);
    let output_dir = args
        .output_dir
        .unwrap_or_else(|| config.migration.exports_dir.clone());
    let window = args.from_date.map(ExportWindow::from_date);

    let exporter = WordPressExporter::from_config(source);
    let total = channels.len();
    let mut outcomes = Vec::with_capacity(total);

    for (index, channel) in channels.iter().enumerate() {
        info!("[{}/{}] Exporting {} ({})", index + 1, total, channel.name, channel.url);
        let started = Instant::now();
        let artifact = exporter
            .export_channel(&channel.url, &output_dir, window)
            .await;
        let size_bytes = std::fs::metadata(&artifact.path)
            .map(|m| m.len())
            .unwrap_or(0);

        outcomes.push(ExportOutcome {
            slug: channel.slug.clone(),
            artifact,
            size_bytes,
            elapsed_secs: started.elapsed().as_secs_f64(),
        });
    }

    let failed = outcomes.iter().filter(|o| !o.artifact.success).count();
    info!("Exported {} channels, {} failed", total - failed, failed);
    print_json(&outcomes)
}

#[derive(Debug, Serialize)]
pub struct FileCounts {
    pub file: PathBuf,
    #[serde(flatten)]
    pub counts: StructuralCounts,
}

pub fn count_files(files: &[PathBuf]) -> Vec<FileCounts> {
    files
        .iter()
        .map(|file| FileCounts {
            file: file.clone(),
            counts: StructuralCounts::from_file(file),
        })
        .collect()
}

pub fn count(args: CountArgs) -> Result<()> {
    print_json(&count_files(&args.files))
}

pub async fn restrict_editors(config_path: &Path, args: RestrictEditorsArgs) -> Result<()> {
    let config = load(config_path)?;
    let platform = target_platform(&config)?;

    if args.dry_run {
        info!("Dry run: no user will be modified");
    }
    let report = platform
        .restrict_editor_users(args.dry_run)
        .await
        .context("Failed to list users")?;
    info!(
        "{} editors processed, {} updated, {} errors",
        report.users.len(),
        report.updated,
        report.errors
    );

    if let Some(path) = &args.results {
        std::fs::write(path, serde_json::to_string_pretty(&report)?)
            .with_context(|| format!("Failed to write results to {:?}", path))?;
        info!("Results written to {:?}", path);
    }

    print_json(&report)
}
