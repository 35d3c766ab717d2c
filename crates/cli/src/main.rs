mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::{CliArgs, Command};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging(args.log_level.as_deref(), args.log_json);

    if let Err(e) = run(args).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(level: Option<&str>, json: bool) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            json.then(|| {
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
            }),
        )
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

async fn run(args: CliArgs) -> Result<()> {
    match args.command {
        Command::Migrate(m) => commands::migrate(&args.config, m).await,
        Command::Export(e) => commands::export(&args.config, e).await,
        Command::Count(c) => commands::count(c),
        Command::RestrictEditors(r) => commands::restrict_editors(&args.config, r).await,
    }
}
