//! Storage targets
//!
//! A target is a path to a block device, a character device, or a regular file.
//! Targets are type-checked once before any unit starts; each unit then opens its
//! own handle so nothing about an open file is shared between units.
//!
//! # Example
//!
//! ```no_run
//! use iob::target::{open_target, validate_target, OpenFlags, TargetKind};
//! use std::path::Path;
//!
//! let path = Path::new("/dev/nvme0n1");
//! assert_eq!(validate_target(path)?, TargetKind::BlockDevice);
//!
//! let file = open_target(path, OpenFlags { direct: true, sync: false })?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use crate::error::BenchError;
use crate::Result;
use anyhow::Context;
use serde::Serialize;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::os::unix::fs::{FileTypeExt, OpenOptionsExt};
use std::path::Path;

/// Kinds of storage object a benchmark may run against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    BlockDevice,
    CharDevice,
    RegularFile,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::BlockDevice => write!(f, "block device"),
            TargetKind::CharDevice => write!(f, "character device"),
            TargetKind::RegularFile => write!(f, "regular file"),
        }
    }
}

/// Check that `path` names a permitted storage object
///
/// Symlinks are followed, so `/dev/disk/by-id/...` works.
///
/// # Errors
///
/// A missing path, or one that is a directory, socket or FIFO, is a
/// configuration error.
pub fn validate_target(path: &Path) -> std::result::Result<TargetKind, BenchError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| BenchError::config(format!("cannot stat {}: {}", path.display(), e)))?;

    let file_type = metadata.file_type();
    if file_type.is_block_device() {
        Ok(TargetKind::BlockDevice)
    } else if file_type.is_char_device() {
        Ok(TargetKind::CharDevice)
    } else if file_type.is_file() {
        Ok(TargetKind::RegularFile)
    } else {
        Err(BenchError::config(format!(
            "{} is not a block device, character device or regular file",
            path.display()
        )))
    }
}

/// Flags applied when a unit opens its target
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenFlags {
    /// Use direct IO (O_DIRECT) - bypass page cache
    pub direct: bool,

    /// Use synchronous IO (O_SYNC) - writes are synchronous
    pub sync: bool,
}

impl OpenFlags {
    fn custom_flags(&self) -> i32 {
        let mut flags = 0;
        if self.direct {
            flags |= libc::O_DIRECT;
        }
        if self.sync {
            flags |= libc::O_SYNC;
        }
        flags
    }
}

/// Open a target read-write with the given flags
///
/// The target is never created or truncated; it must already pass
/// [`validate_target`].
pub fn open_target(path: &Path, flags: OpenFlags) -> Result<File> {
    let mut options = OpenOptions::new();
    options.read(true).write(true);

    let custom = flags.custom_flags();
    if custom != 0 {
        options.custom_flags(custom);
    }

    options
        .open(path)
        .with_context(|| format!("Failed to open target: {}", path.display()))
}
