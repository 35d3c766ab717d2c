//! Migration reporting: structural counts of export artifacts and the
//! per-channel JSON ledger.

mod counts;
mod ledger;

pub use counts::StructuralCounts;
pub use ledger::{ChannelReport, ReportLedger, TaskSummary};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
