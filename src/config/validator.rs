//! Configuration validation
//!
//! Everything here runs before any unit is started. Every rejection is a
//! `BenchError::Configuration`; exceeding the unit ceiling is not an error and
//! only shrinks the worker count.

use super::{BenchConfig, FillMode, Workload, MAX_UNITS, MAX_WORKERS_PER_TARGET};
use crate::engine::EngineKind;
use crate::error::BenchError;
use crate::target::{validate_target, TargetKind};
use crate::util::buffer::DIRECT_IO_ALIGNMENT;
use tracing::warn;

type Result<T> = std::result::Result<T, BenchError>;

/// A configuration that passed validation, with the worker count it will run with
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    /// Configuration with `workers` set to the effective count
    pub config: BenchConfig,
    /// Workers per target as requested
    pub requested_workers: usize,
    pub engine: EngineKind,
    /// Type of each target, in target order
    pub target_kinds: Vec<TargetKind>,
    /// Conditions that limit how far the results can be trusted
    pub caveats: Vec<String>,
}

/// Validate complete configuration
pub fn validate_config(config: BenchConfig) -> Result<ValidatedConfig> {
    validate_settings(&config)?;
    let engine = EngineKind::from_name(&config.engine)?;
    let target_kinds = config
        .targets
        .iter()
        .map(|path| validate_target(path))
        .collect::<Result<Vec<_>>>()?;

    let requested_workers = config.workers;
    let (workers, caveat) = apply_unit_ceiling(config.targets.len(), requested_workers);
    let mut caveats = Vec::new();
    if let Some(caveat) = caveat {
        warn!("{}", caveat);
        caveats.push(caveat);
    }

    let config = BenchConfig { workers, ..config };
    validate_partitions(&config)?;

    Ok(ValidatedConfig {
        config,
        requested_workers,
        engine,
        target_kinds,
        caveats,
    })
}

/// Checks that need no filesystem access
pub fn validate_settings(config: &BenchConfig) -> Result<()> {
    if config.targets.is_empty() {
        return Err(BenchError::config("at least one target is required"));
    }
    if config.targets.len() > MAX_UNITS {
        return Err(BenchError::config(format!(
            "at most {} targets are supported, got {}",
            MAX_UNITS,
            config.targets.len()
        )));
    }

    if config.workers == 0 {
        return Err(BenchError::config("workers must be at least 1"));
    }
    if config.workers > MAX_WORKERS_PER_TARGET {
        return Err(BenchError::config(format!(
            "workers must be at most {} per target, got {}",
            MAX_WORKERS_PER_TARGET, config.workers
        )));
    }

    validate_block_size(config.block_size, config.direct)?;

    match config.seconds {
        Some(0) => return Err(BenchError::config("time budget must be at least 1 second")),
        Some(_) => {}
        None if config.iterations == 0 => {
            return Err(BenchError::config(
                "either a time budget or a non-zero iteration count is required",
            ))
        }
        None => {}
    }

    if config.verify && config.workload == Workload::Read {
        return Err(BenchError::config(
            "verification requires the write workload",
        ));
    }

    if config.fill == FillMode::Pattern && config.pattern.is_empty() {
        return Err(BenchError::config("data pattern must not be empty"));
    }

    Ok(())
}

/// Block size rules; direct I/O needs a power of two no smaller than a page
pub fn validate_block_size(block_size: u64, direct: bool) -> Result<()> {
    if block_size == 0 {
        return Err(BenchError::config("block size must be greater than 0"));
    }
    if usize::try_from(block_size).is_err() {
        return Err(BenchError::config(format!(
            "block size {} is too large",
            block_size
        )));
    }

    if direct && (!block_size.is_power_of_two() || block_size < DIRECT_IO_ALIGNMENT as u64) {
        return Err(BenchError::config(format!(
            "direct I/O requires a power-of-two block size of at least {}, got {}",
            DIRECT_IO_ALIGNMENT, block_size
        )));
    }

    Ok(())
}

/// Every worker must own at least one block
pub fn validate_partitions(config: &BenchConfig) -> Result<()> {
    if config.blocks_per_worker() == 0 {
        return Err(BenchError::config(format!(
            "target size {} holds {} block(s) of {} bytes, fewer than {} worker(s)",
            config.target_size,
            config.total_blocks(),
            config.block_size,
            config.workers
        )));
    }
    Ok(())
}

/// Shrink workers per target so `targets * workers` fits in [`MAX_UNITS`]
///
/// Returns the effective worker count and, if it had to shrink, a caveat
/// describing the reduction. `targets` must not exceed [`MAX_UNITS`];
/// [`validate_settings`] rejects larger target lists.
pub fn apply_unit_ceiling(targets: usize, workers: usize) -> (usize, Option<String>) {
    if targets == 0 || targets.saturating_mul(workers) <= MAX_UNITS {
        return (workers, None);
    }

    let effective = (MAX_UNITS / targets).max(1);
    let caveat = format!(
        "{} targets x {} workers exceeds the {} unit limit; running {} worker(s) per target",
        targets, workers, MAX_UNITS, effective
    );
    (effective, Some(caveat))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn base() -> BenchConfig {
        BenchConfig {
            targets: vec![PathBuf::from("/dev/null")],
            ..Default::default()
        }
    }

    fn expect_config_error(config: BenchConfig, needle: &str) {
        match validate_settings(&config) {
            Err(BenchError::Configuration(msg)) => {
                assert!(msg.contains(needle), "'{}' does not mention '{}'", msg, needle)
            }
            other => panic!("expected configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_defaults_pass() {
        assert!(validate_settings(&base()).is_ok());
    }

    #[test]
    fn test_no_targets() {
        expect_config_error(BenchConfig::default(), "target");
    }

    #[test]
    fn test_zero_workers() {
        expect_config_error(BenchConfig { workers: 0, ..base() }, "at least 1");
    }

    #[test]
    fn test_too_many_workers_per_target() {
        expect_config_error(BenchConfig { workers: 257, ..base() }, "at most 256");
    }

    #[test]
    fn test_direct_block_size_rules() {
        assert!(validate_block_size(4096, true).is_ok());
        assert!(validate_block_size(1 << 20, true).is_ok());
        assert!(validate_block_size(512, true).is_err());
        assert!(validate_block_size(6144, true).is_err());
        assert!(validate_block_size(6144, false).is_ok());
        assert!(validate_block_size(0, false).is_err());
    }

    #[test]
    fn test_budget_required() {
        expect_config_error(BenchConfig { iterations: 0, ..base() }, "time budget");
        expect_config_error(
            BenchConfig {
                seconds: Some(0),
                ..base()
            },
            "at least 1 second",
        );
        let timed = BenchConfig {
            seconds: Some(2),
            iterations: 0,
            ..base()
        };
        assert!(validate_settings(&timed).is_ok());
    }

    #[test]
    fn test_verify_needs_write_workload() {
        expect_config_error(
            BenchConfig {
                verify: true,
                workload: Workload::Read,
                ..base()
            },
            "write workload",
        );
    }

    #[test]
    fn test_empty_pattern() {
        expect_config_error(
            BenchConfig {
                pattern: String::new(),
                ..base()
            },
            "pattern",
        );
        let random_fill = BenchConfig {
            pattern: String::new(),
            fill: FillMode::Random,
            ..base()
        };
        assert!(validate_settings(&random_fill).is_ok());
    }

    #[test]
    fn test_unit_ceiling() {
        assert_eq!(apply_unit_ceiling(8, 256), (256, None));

        let (workers, caveat) = apply_unit_ceiling(16, 256);
        assert_eq!(workers, 128);
        assert!(caveat.unwrap().contains("2048"));

        let (workers, _) = apply_unit_ceiling(MAX_UNITS, 4);
        assert_eq!(workers, 1);
        assert!(MAX_UNITS * workers <= MAX_UNITS);
    }

    #[test]
    fn test_too_many_targets() {
        let targets = vec![PathBuf::from("/dev/null"); MAX_UNITS + 1];
        expect_config_error(BenchConfig { targets, ..base() }, "at most 2048 targets");

        let targets = vec![PathBuf::from("/dev/null"); MAX_UNITS];
        assert!(validate_settings(&BenchConfig { targets, ..base() }).is_ok());
    }

    #[test]
    fn test_empty_partition_rejected() {
        let config = BenchConfig {
            target_size: 4096 * 3,
            workers: 4,
            ..base()
        };
        assert!(matches!(
            validate_partitions(&config),
            Err(BenchError::Configuration(_))
        ));
    }

    #[test]
    fn test_validate_config_end_to_end() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("t.dat");
        std::fs::write(&path, b"").unwrap();

        let validated = validate_config(BenchConfig {
            targets: vec![path],
            workers: 2,
            target_size: 1 << 20,
            engine: "sync".to_string(),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(validated.engine, EngineKind::Sync);
        assert_eq!(validated.target_kinds, vec![TargetKind::RegularFile]);
        assert_eq!(validated.requested_workers, 2);
        assert!(validated.caveats.is_empty());
    }

    #[test]
    fn test_validate_config_rejects_directory_and_engine() {
        let temp_dir = TempDir::new().unwrap();
        assert!(validate_config(BenchConfig {
            targets: vec![temp_dir.path().to_path_buf()],
            ..Default::default()
        })
        .is_err());

        assert!(matches!(
            validate_config(BenchConfig {
                engine: "io_uring".to_string(),
                ..base()
            }),
            Err(BenchError::Configuration(_))
        ));
    }
}
