//! Run-level error taxonomy
//!
//! Internal helpers use `anyhow` with context strings. Anything that crosses the
//! run boundary (validation, orchestration, a unit's loop) is classified into one
//! of the variants below so callers can tell a bad configuration from a failed
//! device from corrupted data.

use std::path::PathBuf;
use thiserror::Error;

/// Boxed source error carried by I/O and resource failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by a benchmark run
#[derive(Debug, Error)]
pub enum BenchError {
    /// Invalid configuration, detected before any unit starts
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A resource needed to start the run could not be obtained
    #[error("resource exhaustion: {context}")]
    ResourceExhaustion {
        context: String,
        #[source]
        source: BoxError,
    },

    /// A single block read or write failed inside one unit
    #[error("I/O failure on target {target_index} worker {worker_index} block {block}")]
    Io {
        target_index: usize,
        worker_index: usize,
        block: u64,
        #[source]
        source: BoxError,
    },

    /// The unit could not prepare itself (open the target, allocate its buffer)
    #[error("unit setup failed for {}", path.display())]
    UnitSetup {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    /// Verification read back bytes that differ from what was written
    #[error(
        "data corruption detected on target {target_index} worker {worker_index}: \
         block {block}, byte offset {offset}"
    )]
    DataCorruption {
        target_index: usize,
        worker_index: usize,
        block: u64,
        offset: usize,
    },
}

impl BenchError {
    /// Shorthand for a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        BenchError::Configuration(message.into())
    }

    /// Shorthand for a resource exhaustion error
    pub fn resource(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        BenchError::ResourceExhaustion {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Data corruption must never be downgraded or retried
    pub fn is_fatal(&self) -> bool {
        matches!(self, BenchError::DataCorruption { .. })
    }
}
