//! Seek-and-stream synchronous engine
//!
//! Positions the shared file cursor with `lseek` and then issues plain
//! `read`/`write`. Each unit opens its own handle, so the cursor is private to
//! the unit in practice.

use super::{block_extent, transfer_all, EngineCapabilities, IOEngine};
use crate::Result;
use anyhow::Context;
use std::os::unix::io::RawFd;

/// Engine backed by `lseek` + `read`/`write`
#[derive(Debug, Default)]
pub struct SyncEngine;

impl SyncEngine {
    pub fn new() -> Self {
        Self
    }

    fn seek(fd: RawFd, offset: i64) -> Result<()> {
        // SAFETY: lseek only inspects the descriptor.
        let result = unsafe { libc::lseek(fd, offset as libc::off_t, libc::SEEK_SET) };
        if result < 0 {
            return Err(std::io::Error::last_os_error())
                .context(format!("lseek failed: fd={}, offset={}", fd, offset));
        }
        Ok(())
    }
}

impl IOEngine for SyncEngine {
    fn name(&self) -> &'static str {
        "sync"
    }

    fn read_block(&mut self, fd: RawFd, buf: &mut [u8], block: u64, block_size: u64) -> Result<()> {
        let (offset, length) = block_extent(buf.len(), block, block_size)?;
        Self::seek(fd, offset)?;
        let base = buf.as_mut_ptr();

        // The cursor advances with every byte read, and an interrupted call
        // moves nothing, so one seek up front covers every retry.
        transfer_all("read", fd, offset, length, |done| {
            // SAFETY: done < length <= buf.len(), so the range stays inside buf.
            unsafe { libc::read(fd, base.add(done) as *mut libc::c_void, length - done) }
        })
    }

    fn write_block(&mut self, fd: RawFd, buf: &[u8], block: u64, block_size: u64) -> Result<()> {
        let (offset, length) = block_extent(buf.len(), block, block_size)?;
        Self::seek(fd, offset)?;
        let base = buf.as_ptr();

        transfer_all("write", fd, offset, length, |done| {
            // SAFETY: done < length <= buf.len(), so the range stays inside buf.
            unsafe { libc::write(fd, base.add(done) as *const libc::c_void, length - done) }
        })
    }

    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            positioned_io: false,
        }
    }
}
