//! Block I/O engine abstraction
//!
//! An engine moves exactly one block between a buffer and an open target. The
//! variants differ only in the syscall family they use; their observable effect
//! on the target is byte-for-byte identical.
//!
//! # Engine Types
//!
//! - **psync**: positioned `pread`/`pwrite`, never touches the file cursor (default)
//! - **sync**: `lseek` followed by `read`/`write` on the shared cursor
//! - **mock**: in-memory block store with fault injection, for tests
//!
//! Every engine retries a call interrupted by a signal and keeps going after a
//! short transfer. A call that transfers nothing is a hard failure for that block.
//!
//! # Example
//!
//! ```no_run
//! use iob::engine::{create_engine, IOEngine};
//! use std::os::unix::io::AsRawFd;
//!
//! let file = std::fs::OpenOptions::new()
//!     .read(true)
//!     .write(true)
//!     .open("/tmp/iob.dat")?;
//! let mut engine = create_engine("psync")?;
//!
//! let block = vec![0xA5u8; 4096];
//! engine.write_block(file.as_raw_fd(), &block, 3, 4096)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use crate::error::BenchError;
use crate::Result;
use anyhow::{bail, Context};
use std::fmt;
use std::os::unix::io::RawFd;

pub mod mock;
pub mod psync;
pub mod sync;

/// Names accepted by [`create_engine`]
pub const ENGINE_NAMES: &[&str] = &["psync", "sync"];

/// Engine used when none is named
pub const DEFAULT_ENGINE: &str = "psync";

/// Single-block I/O against an open target
///
/// Engines are `Send` so one can be built in the orchestrator and moved into a
/// unit; each unit owns its engine outright.
pub trait IOEngine: Send {
    /// Short name used in logs and the report
    fn name(&self) -> &'static str;

    /// Read `block_size` bytes at byte offset `block * block_size` into `buf`
    ///
    /// # Errors
    ///
    /// Fails if `buf` is shorter than `block_size`, the offset overflows, or the
    /// transfer cannot be completed.
    fn read_block(&mut self, fd: RawFd, buf: &mut [u8], block: u64, block_size: u64) -> Result<()>;

    /// Write the first `block_size` bytes of `buf` at byte offset `block * block_size`
    ///
    /// # Errors
    ///
    /// Same conditions as [`IOEngine::read_block`].
    fn write_block(&mut self, fd: RawFd, buf: &[u8], block: u64, block_size: u64) -> Result<()>;

    /// What this engine supports
    fn capabilities(&self) -> EngineCapabilities;
}

/// Engine feature description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineCapabilities {
    /// Reads and writes leave the file cursor alone, so a handle may be shared
    pub positioned_io: bool,
}

/// Engines selectable by name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    Psync,
    Sync,
}

impl EngineKind {
    /// Resolve an engine name
    ///
    /// # Errors
    ///
    /// Unknown names are a configuration error.
    pub fn from_name(name: &str) -> std::result::Result<Self, BenchError> {
        match name.to_ascii_lowercase().as_str() {
            "psync" => Ok(EngineKind::Psync),
            "sync" => Ok(EngineKind::Sync),
            other => Err(BenchError::config(format!(
                "unknown engine '{}' (available: {})",
                other,
                ENGINE_NAMES.join(", ")
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EngineKind::Psync => "psync",
            EngineKind::Sync => "sync",
        }
    }

    /// Build a fresh engine instance
    pub fn create(&self) -> Box<dyn IOEngine> {
        match self {
            EngineKind::Psync => Box::new(psync::PsyncEngine::new()),
            EngineKind::Sync => Box::new(sync::SyncEngine::new()),
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Build an engine from its name
pub fn create_engine(name: &str) -> std::result::Result<Box<dyn IOEngine>, BenchError> {
    Ok(EngineKind::from_name(name)?.create())
}

/// Byte offset and length of one block transfer
///
/// Checks the buffer is large enough and the offset fits in `off_t`.
pub(crate) fn block_extent(buf_len: usize, block: u64, block_size: u64) -> Result<(i64, usize)> {
    let length = usize::try_from(block_size).context("block size does not fit in usize")?;
    if buf_len < length {
        bail!(
            "buffer of {} bytes is smaller than block size {}",
            buf_len,
            block_size
        );
    }

    let offset = block
        .checked_mul(block_size)
        .and_then(|o| i64::try_from(o).ok())
        .with_context(|| format!("offset of block {} overflows", block))?;

    Ok((offset, length))
}

/// Drive a syscall until `length` bytes have moved
///
/// `step(done)` issues one call for the remaining bytes, `done` bytes in, and
/// returns the raw syscall result. `EINTR` is retried; zero progress is an error.
pub(crate) fn transfer_all<F>(op: &str, fd: RawFd, offset: i64, length: usize, mut step: F) -> Result<()>
where
    F: FnMut(usize) -> isize,
{
    let mut done = 0usize;

    while done < length {
        let result = step(done);

        if result < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err).context(format!(
                "{} failed: fd={}, offset={}, length={}",
                op,
                fd,
                offset + done as i64,
                length - done
            ));
        }

        if result == 0 {
            bail!(
                "{} made no progress: fd={}, offset={}, {} of {} bytes transferred",
                op,
                fd,
                offset + done as i64,
                done,
                length
            );
        }

        done += result as usize;
    }

    Ok(())
}
