//! Migration orchestrator.
//!
//! Provisions the shared importers once, then drives each channel through
//! provisioning, export and import-job creation, strictly in sequence.

mod config;
mod runner;
mod types;

pub use config::{FailurePolicy, OrchestratorConfig};
pub use runner::MigrationOrchestrator;
pub use types::{
    FailedChannel, MigrationError, MigrationResult, MigrationStatus, RunSummary, EXPORT_FAILED,
};
