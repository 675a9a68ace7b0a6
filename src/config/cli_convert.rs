//! CLI to BenchConfig conversion utilities

use crate::config::cli::Cli;
use crate::config::toml::{merge_cli_with_config, parse_toml_file};
use crate::config::{BenchConfig, GIB};
use anyhow::{Context, Result};

/// Parse a size string (e.g., "1G", "100M", "4k") to bytes
pub fn parse_size(s: &str) -> Result<u64> {
    let s = s.trim().to_lowercase();

    let (num_str, multiplier) = if s.ends_with('k') || s.ends_with("kb") {
        (s.trim_end_matches("kb").trim_end_matches('k'), 1024u64)
    } else if s.ends_with('m') || s.ends_with("mb") {
        (s.trim_end_matches("mb").trim_end_matches('m'), 1024 * 1024)
    } else if s.ends_with('g') || s.ends_with("gb") {
        (s.trim_end_matches("gb").trim_end_matches('g'), GIB)
    } else if s.ends_with('t') || s.ends_with("tb") {
        (s.trim_end_matches("tb").trim_end_matches('t'), GIB * 1024)
    } else {
        (s.as_str(), 1)
    };

    let num: u64 = num_str
        .parse()
        .with_context(|| format!("Invalid size format: {}", s))?;

    num.checked_mul(multiplier)
        .with_context(|| format!("Size out of range: {}", s))
}

/// Parse a per-target size; a bare number counts GiB
pub fn parse_target_size(s: &str) -> Result<u64> {
    let trimmed = s.trim();
    if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        let gib: u64 = trimmed
            .parse()
            .with_context(|| format!("Invalid size format: {}", trimmed))?;
        return gib
            .checked_mul(GIB)
            .with_context(|| format!("Size out of range: {} GiB", gib));
    }
    parse_size(trimmed)
}

/// Build the run configuration from parsed arguments
///
/// Starts from the TOML file when `--config` is given, otherwise from defaults,
/// then applies every option given on the command line.
pub fn cli_to_config(cli: &Cli) -> Result<BenchConfig> {
    let base = match &cli.config {
        Some(path) => parse_toml_file(path)?,
        None => BenchConfig::default(),
    };
    merge_cli_with_config(cli, base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FillMode, Termination, Workload};
    use std::path::PathBuf;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("4k").unwrap(), 4096);
        assert_eq!(parse_size("4KB").unwrap(), 4096);
        assert_eq!(parse_size("1M").unwrap(), 1024 * 1024);
        assert_eq!(parse_size("1G").unwrap(), GIB);
        assert_eq!(parse_size("1024").unwrap(), 1024);
        assert!(parse_size("abc").is_err());
        assert!(parse_size("99999999999T").is_err());
    }

    #[test]
    fn test_parse_target_size_bare_number_is_gib() {
        assert_eq!(parse_target_size("10").unwrap(), 10 * GIB);
        assert_eq!(parse_target_size("512M").unwrap(), 512 * 1024 * 1024);
    }

    #[test]
    fn test_cli_to_config_defaults() {
        let cli = Cli {
            paths: vec![PathBuf::from("/dev/null")],
            ..Default::default()
        };
        let config = cli_to_config(&cli).unwrap();
        assert_eq!(config.targets, vec![PathBuf::from("/dev/null")]);
        assert_eq!(config.workers, 1);
        assert_eq!(config.termination(), Termination::Iterations(1));
        assert_eq!(config.fill, FillMode::Pattern);
        assert_eq!(config.workload, Workload::Write);
    }

    #[test]
    fn test_cli_to_config_overrides() {
        let cli = Cli {
            paths: vec![PathBuf::from("a"), PathBuf::from("b")],
            workers: Some(8),
            block_size: Some("64k".to_string()),
            size: Some("1".to_string()),
            seconds: Some(3),
            random_fill: true,
            read: true,
            ..Default::default()
        };
        let config = cli_to_config(&cli).unwrap();
        assert_eq!(config.targets.len(), 2);
        assert_eq!(config.workers, 8);
        assert_eq!(config.block_size, 65536);
        assert_eq!(config.target_size, GIB);
        assert_eq!(config.termination(), Termination::Seconds(3));
        assert_eq!(config.fill, FillMode::Random);
        assert_eq!(config.workload, Workload::Read);
    }
}
