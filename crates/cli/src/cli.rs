use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

/// Migrate WordPress channels into Omeka S sites.
///
/// Each channel gets a site, an editor account with access to it, and one
/// bulk import job per configured importer fed with the channel's export.
#[derive(Parser, Debug)]
#[command(name = "channel-migrator", version, about)]
pub struct CliArgs {
    /// Path to the TOML configuration file
    #[arg(long, global = true, env = "MIGRATOR_CONFIG", default_value = "config.toml")]
    pub config: PathBuf,

    /// Log filter, e.g. "debug" or "channel_migrator_core=trace" (overrides RUST_LOG)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Provision sites and users, export channels and queue import jobs
    Migrate(MigrateArgs),

    /// Only download channel exports
    Export(ExportArgs),

    /// Count item sets, items and media in export files
    Count(CountArgs),

    /// Confine every editor account to its granted sites and own assets
    RestrictEditors(RestrictEditorsArgs),
}

#[derive(clap::Args, Debug)]
pub struct MigrateArgs {
    /// Channel list (CSV with name,url,slug,editor columns)
    #[arg(long)]
    pub channels: PathBuf,

    /// Only migrate content from this date on (YYYY-MM-DD)
    #[arg(long)]
    pub from_date: Option<NaiveDate>,

    /// Append channel reports to this JSON file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Record failing channels and keep going instead of stopping
    #[arg(long)]
    pub continue_on_error: bool,

    /// Run imports immediately instead of saving them as queued tasks
    #[arg(long)]
    pub execute_now: bool,
}

#[derive(clap::Args, Debug)]
pub struct ExportArgs {
    /// Channel list (CSV with name,url,slug,editor columns)
    #[arg(long)]
    pub channels: PathBuf,

    /// First channel to export, by 1-based position in the list
    #[arg(long)]
    pub start: Option<usize>,

    /// Last channel to export, by 1-based position in the list
    #[arg(long)]
    pub stop: Option<usize>,

    /// Where to write exports (default: migration.exports_dir)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Only export attachments from this month on (YYYY-MM-DD, day ignored)
    #[arg(long)]
    pub from_date: Option<NaiveDate>,
}

#[derive(clap::Args, Debug)]
pub struct CountArgs {
    /// Export files to scan
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct RestrictEditorsArgs {
    /// List the accounts that would change without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Write the per-user results to this JSON file
    #[arg(long)]
    pub results: Option<PathBuf>,
}
