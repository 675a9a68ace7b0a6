//! Positioned synchronous engine
//!
//! Uses `pread`/`pwrite`, so the file cursor is never moved and a handle could
//! be shared between units without interference. This is the default engine.

use super::{block_extent, transfer_all, EngineCapabilities, IOEngine};
use crate::Result;
use std::os::unix::io::RawFd;

/// Engine backed by `pread`/`pwrite`
#[derive(Debug, Default)]
pub struct PsyncEngine;

impl PsyncEngine {
    pub fn new() -> Self {
        Self
    }
}

impl IOEngine for PsyncEngine {
    fn name(&self) -> &'static str {
        "psync"
    }

    #[inline]
    fn read_block(&mut self, fd: RawFd, buf: &mut [u8], block: u64, block_size: u64) -> Result<()> {
        let (offset, length) = block_extent(buf.len(), block, block_size)?;
        let base = buf.as_mut_ptr();

        transfer_all("pread", fd, offset, length, |done| {
            // SAFETY: done < length <= buf.len(), so the range stays inside buf.
            unsafe {
                libc::pread(
                    fd,
                    base.add(done) as *mut libc::c_void,
                    length - done,
                    offset + done as i64,
                )
            }
        })
    }

    #[inline]
    fn write_block(&mut self, fd: RawFd, buf: &[u8], block: u64, block_size: u64) -> Result<()> {
        let (offset, length) = block_extent(buf.len(), block, block_size)?;
        let base = buf.as_ptr();

        transfer_all("pwrite", fd, offset, length, |done| {
            // SAFETY: done < length <= buf.len(), so the range stays inside buf.
            unsafe {
                libc::pwrite(
                    fd,
                    base.add(done) as *const libc::c_void,
                    length - done,
                    offset + done as i64,
                )
            }
        })
    }

    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            positioned_io: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use std::os::unix::io::AsRawFd;
    use tempfile::TempDir;

    #[test]
    fn test_psync_write_then_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("psync.dat");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .unwrap();
        let fd = file.as_raw_fd();

        let mut engine = PsyncEngine::new();
        let data: Vec<u8> = (0..512u32).map(|i| (i % 251) as u8).collect();
        engine.write_block(fd, &data, 2, 512).unwrap();

        let mut back = vec![0u8; 512];
        engine.read_block(fd, &mut back, 2, 512).unwrap();
        assert_eq!(back, data);

        // Block 2 of 512 bytes ends at byte 1536
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 1536);
    }

    #[test]
    fn test_psync_read_past_end_fails() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("short.dat");
        std::fs::write(&path, vec![1u8; 100]).unwrap();
        let file = std::fs::File::open(&path).unwrap();

        let mut engine = PsyncEngine::new();
        let mut buf = vec![0u8; 4096];
        let err = engine
            .read_block(file.as_raw_fd(), &mut buf, 0, 4096)
            .unwrap_err();
        assert!(err.to_string().contains("no progress"));
    }

    #[test]
    fn test_psync_bad_fd_fails() {
        let mut engine = PsyncEngine::new();
        let buf = vec![0u8; 512];
        assert!(engine.write_block(-1, &buf, 0, 512).is_err());
    }
}
