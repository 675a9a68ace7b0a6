//! Run report and its renderers
//!
//! The orchestrator produces one [`Report`]; `text` and `json` turn it into the
//! bytes written to stdout.

pub mod json;
pub mod text;

use crate::config::Termination;
use crate::distribution::Partition;
use crate::stats::{CombinedSummary, ResultRecord, TargetSummary};
use crate::worker::UnitExit;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Everything known about a finished run
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub host: String,
    pub started_at: DateTime<Utc>,
    pub elapsed_secs: f64,
    pub engine: String,
    pub clock: String,
    pub block_size: u64,
    pub target_size: u64,
    pub blocks_per_worker: u64,
    /// Workers per target as requested
    pub requested_workers: usize,
    /// Workers per target actually run
    pub workers: usize,
    pub termination: Termination,
    pub targets: Vec<TargetSummary>,
    pub combined: CombinedSummary,
    pub units: Vec<UnitReport>,
    /// Reasons the numbers may under-count or mislead
    pub caveats: Vec<String>,
}

/// Outcome and raw counters of one unit
#[derive(Debug, Clone, Serialize)]
pub struct UnitReport {
    pub target_index: usize,
    pub worker_index: usize,
    pub partition: Partition,
    pub exit: UnitExit,
    pub record: ResultRecord,
}

impl Report {
    /// Units that did not finish cleanly
    pub fn failed_units(&self) -> impl Iterator<Item = &UnitReport> {
        self.units.iter().filter(|u| !u.exit.is_clean())
    }
}
