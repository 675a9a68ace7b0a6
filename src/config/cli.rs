//! CLI argument parsing using clap

use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;

/// Report format written to stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary
    #[default]
    Text,
    /// Pretty-printed JSON report
    Json,
}

/// iob - raw block device and file I/O benchmark
#[derive(Parser, Debug, Default)]
#[command(name = "iob")]
#[command(version, about, long_about = None, disable_version_flag = true)]
pub struct Cli {
    /// Print version
    #[arg(long, action = ArgAction::Version)]
    pub version: Option<bool>,

    /// Block devices, character devices or regular files to benchmark
    #[arg(value_name = "PATHS")]
    pub paths: Vec<PathBuf>,

    // === Workload Options ===
    /// Data pattern written to every block
    #[arg(short = 'p', long)]
    pub pattern: Option<String>,

    /// Number of workers per target
    #[arg(short = 'n', long)]
    pub workers: Option<usize>,

    /// Number of write (or read) passes over each partition
    #[arg(short = 'i', long)]
    pub iterations: Option<u64>,

    /// Run for this many seconds instead of a fixed number of iterations
    #[arg(short = 's', long)]
    pub seconds: Option<u64>,

    /// Verify every block after each write pass
    #[arg(short = 'V', long)]
    pub verify: bool,

    /// Block size for IO operations (e.g., 4k, 1M, 64k)
    #[arg(short = 'b', long)]
    pub block_size: Option<String>,

    /// Use random block addresses instead of sequential
    #[arg(short = 'R', long)]
    pub random: bool,

    /// Refill the buffer with random bytes before every pass
    #[arg(long)]
    pub random_fill: bool,

    /// Time reads instead of writes
    #[arg(long)]
    pub read: bool,

    // === IO Engine Options ===
    /// IO engine to use (psync, sync)
    #[arg(short = 'E', long)]
    pub engine: Option<String>,

    /// Addressable size per target; a bare number is GiB (e.g., 10, 512M, 2T)
    #[arg(short = 'S', long)]
    pub size: Option<String>,

    /// Use direct IO (O_DIRECT) - bypasses page cache for real storage testing
    #[arg(long)]
    pub direct: bool,

    /// Use synchronous IO (O_SYNC)
    #[arg(long)]
    pub sync: bool,

    // === Configuration File ===
    /// TOML configuration file
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    // === Output Options ===
    /// Report format
    #[arg(long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Dry run - validate configuration and print the plan without executing
    #[arg(long)]
    pub dry_run: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    pub verbose: u8,
}
