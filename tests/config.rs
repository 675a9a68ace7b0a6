//! Command line and TOML configuration handling

use clap::Parser;
use iob::config::cli::Cli;
use iob::config::cli_convert::cli_to_config;
use iob::config::validator::validate_config;
use iob::config::{BenchConfig, FillMode, Termination, GIB, MAX_UNITS};
use iob::coordinator::Orchestrator;
use iob::error::BenchError;
use std::io::Write;
use std::path::PathBuf;
use tempfile::{NamedTempFile, TempDir};

#[test]
fn test_cli_flags_to_config() {
    let cli = Cli::try_parse_from([
        "iob", "-n", "16", "-b", "64k", "-S", "512M", "-s", "5", "-R", "--random-fill", "--sync",
        "/dev/null",
    ])
    .unwrap();
    let config = cli_to_config(&cli).unwrap();

    assert_eq!(config.workers, 16);
    assert_eq!(config.block_size, 64 * 1024);
    assert_eq!(config.target_size, 512 * 1024 * 1024);
    assert_eq!(config.termination(), Termination::Seconds(5));
    assert!(config.random && config.sync);
    assert_eq!(config.fill, FillMode::Random);
}

#[test]
fn test_toml_file_with_cli_overrides() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
targets = ["/dev/sdb", "/dev/sdc"]
workers = 4
block_size = 8192
target_size = {}
verify = true
engine = "sync"
"#,
        2 * GIB
    )
    .unwrap();

    let path = file.path().to_str().unwrap();
    let cli = Cli::try_parse_from(["iob", "-c", path, "-n", "8", "/tmp/scratch.dat"]).unwrap();
    let config = cli_to_config(&cli).unwrap();

    assert_eq!(config.targets, vec![PathBuf::from("/tmp/scratch.dat")]);
    assert_eq!(config.workers, 8);
    assert_eq!(config.block_size, 8192);
    assert_eq!(config.target_size, 2 * GIB);
    assert!(config.verify);
    assert_eq!(config.engine, "sync");
    assert_eq!(config.termination(), Termination::Iterations(1));
}

#[test]
fn test_bad_toml_is_rejected() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "workers = \"many\"").unwrap();

    let path = file.path().to_str().unwrap();
    let cli = Cli::try_parse_from(["iob", "--config", path]).unwrap();
    assert!(cli_to_config(&cli).is_err());
}

#[test]
fn test_unit_ceiling_reduces_workers() {
    let dir = TempDir::new().unwrap();
    let targets: Vec<PathBuf> = (0..16)
        .map(|i| {
            let path = dir.path().join(format!("t{}", i));
            std::fs::write(&path, b"").unwrap();
            path
        })
        .collect();

    let cli = Cli {
        paths: targets,
        workers: Some(200),
        block_size: Some("512".to_string()),
        size: Some("1M".to_string()),
        ..Default::default()
    };
    let config = cli_to_config(&cli).unwrap();
    let validated = validate_config(config.clone()).unwrap();

    assert_eq!(validated.requested_workers, 200);
    assert_eq!(validated.config.workers, MAX_UNITS / 16);
    assert_eq!(validated.caveats.len(), 1);

    let plan = Orchestrator::new(config).unwrap().plan();
    assert_eq!(plan.units.len(), MAX_UNITS);
    assert!(plan.units.iter().all(|u| u.slot < MAX_UNITS));
}

#[test]
fn test_more_targets_than_units_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("shared.dat");
    std::fs::write(&path, b"").unwrap();

    let config = BenchConfig {
        targets: vec![path; MAX_UNITS + 100],
        block_size: 512,
        target_size: 512 * 4,
        ..Default::default()
    };
    assert!(matches!(
        Orchestrator::new(config).err(),
        Some(BenchError::Configuration(_))
    ));
}

#[test]
fn test_direct_io_block_size_rule() {
    let cli = Cli::try_parse_from(["iob", "--direct", "-b", "1000", "/dev/null"]).unwrap();
    let err = validate_config(cli_to_config(&cli).unwrap()).unwrap_err();
    assert!(err.to_string().contains("power-of-two"));
}
