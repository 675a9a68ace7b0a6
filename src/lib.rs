//! iob - raw block device and file I/O benchmark
//!
//! Splits each target's addressable range between workers and drives every
//! (target, worker) pair as its own process. Units time whole passes of
//! single-block writes (or reads), optionally read back and compare what they
//! wrote, and report through a shared anonymous mapping that the orchestrator
//! reduces into per-target and combined latency and bandwidth.
//!
//! # Architecture
//!
//! - **Engines**: positioned (`psync`) and seek-then-transfer (`sync`)
//! - **Targets**: block devices, character devices and regular files
//! - **Addressing**: sequential, or uniform random from a per-unit generator
//! - **Termination**: a fixed number of passes or a wall-clock budget

pub mod config;
pub mod coordinator;
pub mod distribution;
pub mod engine;
pub mod error;
pub mod output;
pub mod stats;
pub mod target;
pub mod util;
pub mod worker;

pub use config::BenchConfig;
pub use coordinator::Orchestrator;
pub use engine::IOEngine;
pub use error::BenchError;

/// Result type used by internal helpers
pub type Result<T> = anyhow::Result<T>;
