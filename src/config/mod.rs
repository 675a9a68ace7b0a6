//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.

pub mod cli;
pub mod cli_convert;
pub mod toml;
pub mod validator;

use crate::distribution::AccessPattern;
use crate::engine::DEFAULT_ENGINE;
use crate::target::OpenFlags;
use crate::util::buffer::DEFAULT_PATTERN;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Most units (target x worker pairs) a single run may start
pub const MAX_UNITS: usize = 2048;

/// Most workers allowed against one target
pub const MAX_WORKERS_PER_TARGET: usize = 256;

pub const GIB: u64 = 1024 * 1024 * 1024;

/// Addressable bytes per target when no size is given
pub const DEFAULT_TARGET_SIZE: u64 = 10 * GIB;

/// Complete benchmark configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Storage targets (block devices, character devices or regular files)
    pub targets: Vec<PathBuf>,
    /// Workers per target
    pub workers: usize,
    /// Bytes per I/O
    pub block_size: u64,
    /// Addressable bytes per target
    pub target_size: u64,
    /// Data written when `fill` is `Pattern`
    pub pattern: String,
    pub fill: FillMode,
    /// Re-read and compare every block after each write pass
    pub verify: bool,
    /// Random block addresses instead of sequential
    pub random: bool,
    /// Engine name (`psync` or `sync`)
    pub engine: String,
    /// Time budget; when set, iterations are unbounded
    pub seconds: Option<u64>,
    /// Iteration budget
    pub iterations: u64,
    /// Open targets with O_DIRECT
    pub direct: bool,
    /// Open targets with O_SYNC
    pub sync: bool,
    pub workload: Workload,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            workers: 1,
            block_size: 4096,
            target_size: DEFAULT_TARGET_SIZE,
            pattern: DEFAULT_PATTERN.to_string(),
            fill: FillMode::Pattern,
            verify: false,
            random: false,
            engine: DEFAULT_ENGINE.to_string(),
            seconds: None,
            iterations: 1,
            direct: false,
            sync: false,
            workload: Workload::Write,
        }
    }
}

impl BenchConfig {
    /// How the run ends: a time budget wins over an iteration count
    pub fn termination(&self) -> Termination {
        match self.seconds {
            Some(seconds) => Termination::Seconds(seconds),
            None => Termination::Iterations(self.iterations),
        }
    }

    pub fn access_pattern(&self) -> AccessPattern {
        if self.random {
            AccessPattern::Random
        } else {
            AccessPattern::Sequential
        }
    }

    pub fn open_flags(&self) -> OpenFlags {
        OpenFlags {
            direct: self.direct,
            sync: self.sync,
        }
    }

    /// Whole blocks addressable on each target
    pub fn total_blocks(&self) -> u64 {
        if self.block_size == 0 {
            0
        } else {
            self.target_size / self.block_size
        }
    }

    /// Blocks each worker owns; the remainder of an uneven split is never touched
    pub fn blocks_per_worker(&self) -> u64 {
        if self.workers == 0 {
            0
        } else {
            self.total_blocks() / self.workers as u64
        }
    }
}

/// What goes into the write buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillMode {
    /// Repeat the configured pattern once before the first pass
    #[default]
    Pattern,
    /// Fresh pseudo-random bytes before every pass
    Random,
}

/// Which timed phase a unit runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Workload {
    /// Timed writes, optionally followed by verification
    #[default]
    Write,
    /// Timed reads only
    Read,
}

impl fmt::Display for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Workload::Write => write!(f, "write"),
            Workload::Read => write!(f, "read"),
        }
    }
}

/// Termination policy for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Termination {
    /// Each unit stops after this many passes
    Iterations(u64),
    /// Units loop until cancelled this many seconds after start
    Seconds(u64),
}

impl Termination {
    /// Pass budget handed to each unit; `None` means unbounded
    pub fn iteration_budget(&self) -> Option<u64> {
        match self {
            Termination::Iterations(n) => Some(*n),
            Termination::Seconds(_) => None,
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Iterations(n) => write!(f, "{} iteration(s)", n),
            Termination::Seconds(s) => write!(f, "{} second(s)", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BenchConfig::default();
        assert_eq!(config.workers, 1);
        assert_eq!(config.block_size, 4096);
        assert_eq!(config.target_size, 10 * GIB);
        assert_eq!(config.pattern, "[Hello, World!]");
        assert_eq!(config.engine, "psync");
        assert_eq!(config.termination(), Termination::Iterations(1));
    }

    #[test]
    fn test_time_budget_overrides_iterations() {
        let config = BenchConfig {
            seconds: Some(5),
            iterations: 10,
            ..Default::default()
        };
        let termination = config.termination();
        assert_eq!(termination, Termination::Seconds(5));
        assert_eq!(termination.iteration_budget(), None);
    }

    #[test]
    fn test_blocks_per_worker_drops_remainder() {
        let config = BenchConfig {
            block_size: 4096,
            target_size: 4096 * 10,
            workers: 3,
            ..Default::default()
        };
        assert_eq!(config.total_blocks(), 10);
        assert_eq!(config.blocks_per_worker(), 3);
    }
}
