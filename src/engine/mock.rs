//! Mock engine for testing
//!
//! Keeps blocks in memory instead of touching the file descriptor, and can be
//! told to misbehave: fail the n-th write, or flip a byte in every block it
//! reads back. All operations are logged.
//!
//! # Example
//!
//! ```
//! use iob::engine::mock::{MockEngine, MockOp};
//! use iob::engine::IOEngine;
//!
//! let mut engine = MockEngine::new();
//! engine.write_block(-1, &[7u8; 512], 4, 512).unwrap();
//!
//! let mut back = [0u8; 512];
//! engine.read_block(-1, &mut back, 4, 512).unwrap();
//! assert_eq!(back, [7u8; 512]);
//! assert_eq!(engine.operations(), vec![MockOp::Write(4), MockOp::Read(4)]);
//! ```

use super::{block_extent, EngineCapabilities, IOEngine};
use crate::Result;
use anyhow::bail;
use std::collections::HashMap;
use std::os::unix::io::RawFd;
use std::sync::{Arc, Mutex, MutexGuard};

/// One logged engine call, by block index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockOp {
    Read(u64),
    Write(u64),
}

/// In-memory engine with fault injection
///
/// Clones share the operation log, so a test can keep one clone and hand the
/// other to a worker.
#[derive(Debug, Clone, Default)]
pub struct MockEngine {
    blocks: HashMap<u64, Vec<u8>>,
    writes_seen: u64,
    fail_write_at: Option<u64>,
    corrupt_read_at: Option<usize>,
    log: Arc<Mutex<Vec<MockOp>>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the `n`-th write (1-based) and every write after it
    pub fn fail_write_at(mut self, n: u64) -> Self {
        self.fail_write_at = Some(n);
        self
    }

    /// Flip the byte at `offset` in every block returned by a read
    pub fn corrupt_reads_at(mut self, offset: usize) -> Self {
        self.corrupt_read_at = Some(offset);
        self
    }

    /// Snapshot of the calls made so far, in order
    pub fn operations(&self) -> Vec<MockOp> {
        self.lock_log().clone()
    }

    pub fn write_count(&self) -> usize {
        self.lock_log()
            .iter()
            .filter(|op| matches!(op, MockOp::Write(_)))
            .count()
    }

    pub fn read_count(&self) -> usize {
        self.lock_log()
            .iter()
            .filter(|op| matches!(op, MockOp::Read(_)))
            .count()
    }

    fn lock_log(&self) -> MutexGuard<'_, Vec<MockOp>> {
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl IOEngine for MockEngine {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn read_block(&mut self, _fd: RawFd, buf: &mut [u8], block: u64, block_size: u64) -> Result<()> {
        let (_, length) = block_extent(buf.len(), block, block_size)?;
        self.lock_log().push(MockOp::Read(block));

        let dest = &mut buf[..length];
        match self.blocks.get(&block) {
            Some(stored) => dest.copy_from_slice(&stored[..length.min(stored.len())]),
            None => dest.fill(0),
        }

        if let Some(offset) = self.corrupt_read_at {
            if offset < length {
                dest[offset] ^= 0xFF;
            }
        }
        Ok(())
    }

    fn write_block(&mut self, _fd: RawFd, buf: &[u8], block: u64, block_size: u64) -> Result<()> {
        let (_, length) = block_extent(buf.len(), block, block_size)?;
        self.writes_seen += 1;
        if let Some(n) = self.fail_write_at {
            if self.writes_seen >= n {
                bail!("injected write failure at block {} (write #{})", block, self.writes_seen);
            }
        }

        self.lock_log().push(MockOp::Write(block));
        self.blocks.insert(block, buf[..length].to_vec());
        Ok(())
    }

    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            positioned_io: true,
        }
    }
}
