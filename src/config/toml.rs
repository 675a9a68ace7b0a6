//! TOML configuration file parsing
//!
//! Every key is optional; missing keys take the same defaults as the CLI.
//!
//! ```toml
//! targets = ["/dev/sdb", "/dev/sdc"]
//! workers = 4
//! block_size = 65536
//! target_size = 4294967296
//! verify = true
//! seconds = 60
//! ```

use super::cli::Cli;
use super::cli_convert::{parse_size, parse_target_size};
use super::{BenchConfig, FillMode, Workload};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<BenchConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<BenchConfig> {
    let config: BenchConfig =
        ::toml::from_str(contents).context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Merge CLI arguments with a loaded configuration (CLI takes precedence)
///
/// Positional paths, when present, replace the file's target list. Flags can
/// only switch options on; an option a file enables stays enabled.
pub fn merge_cli_with_config(cli: &Cli, mut config: BenchConfig) -> Result<BenchConfig> {
    if !cli.paths.is_empty() {
        config.targets = cli.paths.clone();
    }

    if let Some(pattern) = &cli.pattern {
        config.pattern = pattern.clone();
    }
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    if let Some(iterations) = cli.iterations {
        config.iterations = iterations;
    }
    if let Some(seconds) = cli.seconds {
        config.seconds = Some(seconds);
    }
    if let Some(block_size) = &cli.block_size {
        config.block_size = parse_size(block_size)?;
    }
    if let Some(size) = &cli.size {
        config.target_size = parse_target_size(size)?;
    }
    if let Some(engine) = &cli.engine {
        config.engine = engine.clone();
    }

    config.verify |= cli.verify;
    config.random |= cli.random;
    config.direct |= cli.direct;
    config.sync |= cli.sync;
    if cli.random_fill {
        config.fill = FillMode::Random;
    }
    if cli.read {
        config.workload = Workload::Read;
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Termination;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_parse_full_toml() {
        let config = parse_toml_string(
            r#"
            targets = ["/dev/sdb", "/dev/sdc"]
            workers = 4
            block_size = 65536
            target_size = 1073741824
            pattern = "abc"
            fill = "random"
            verify = true
            random = true
            engine = "sync"
            seconds = 60
            direct = true
            workload = "write"
            "#,
        )
        .unwrap();

        assert_eq!(config.targets.len(), 2);
        assert_eq!(config.workers, 4);
        assert_eq!(config.block_size, 65536);
        assert_eq!(config.fill, FillMode::Random);
        assert!(config.verify && config.random && config.direct);
        assert!(!config.sync);
        assert_eq!(config.termination(), Termination::Seconds(60));
    }

    #[test]
    fn test_missing_keys_take_defaults() {
        let config = parse_toml_string("targets = [\"/dev/null\"]").unwrap();
        assert_eq!(
            config,
            BenchConfig {
                targets: vec![PathBuf::from("/dev/null")],
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_unknown_fill_mode_rejected() {
        assert!(parse_toml_string("fill = \"zeros\"").is_err());
    }

    #[test]
    fn test_parse_toml_file_and_merge() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("iob.toml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "targets = [\"/from/file\"]\nworkers = 2\nverify = true").unwrap();

        let loaded = parse_toml_file(&path).unwrap();
        let cli = Cli {
            paths: vec![PathBuf::from("/from/cli")],
            workers: Some(6),
            ..Default::default()
        };
        let merged = merge_cli_with_config(&cli, loaded).unwrap();

        assert_eq!(merged.targets, vec![PathBuf::from("/from/cli")]);
        assert_eq!(merged.workers, 6);
        assert!(merged.verify);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = parse_toml_file(Path::new("/nonexistent/iob.toml")).unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/iob.toml"));
    }
}
