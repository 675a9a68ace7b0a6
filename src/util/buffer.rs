//! Aligned IO buffers and fill helpers
//!
//! Units write the same buffer to every address of a pass, so the buffer content
//! is what the verify phase compares against. O_DIRECT needs the buffer address
//! aligned to the logical block size, which is why this is not a plain `Vec<u8>`.

use crate::Result;
use rand::RngCore;
use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;

/// Alignment used for direct (uncached) IO
pub const DIRECT_IO_ALIGNMENT: usize = 4096;

/// Alignment used for buffered IO
pub const BUFFERED_IO_ALIGNMENT: usize = 512;

/// Default data pattern written when no pattern is configured
pub const DEFAULT_PATTERN: &str = "[Hello, World!]";

/// Memory-aligned buffer suitable for O_DIRECT operations
pub struct AlignedBuffer {
    ptr: NonNull<u8>,
    size: usize,
    alignment: usize,
    layout: Layout,
}

impl AlignedBuffer {
    /// Allocate a zeroed buffer of `size` bytes aligned to `alignment`
    ///
    /// # Errors
    ///
    /// Fails if `alignment` is not a power of two, `size` is zero, or the
    /// allocator returns null.
    pub fn new(size: usize, alignment: usize) -> Result<Self> {
        if !alignment.is_power_of_two() {
            anyhow::bail!("Alignment must be a power of 2, got {}", alignment);
        }
        if size == 0 {
            anyhow::bail!("Buffer size must be greater than 0");
        }

        let layout = Layout::from_size_align(size, alignment)
            .map_err(|e| anyhow::anyhow!("Invalid buffer layout {}/{}: {}", size, alignment, e))?;

        // SAFETY: layout has non-zero size (checked above).
        let raw = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(raw)
            .ok_or_else(|| anyhow::anyhow!("Failed to allocate {} byte aligned buffer", size))?;

        Ok(AlignedBuffer {
            ptr,
            size,
            alignment,
            layout,
        })
    }

    /// Allocate a buffer aligned for the requested IO mode
    pub fn for_io(size: usize, direct: bool) -> Result<Self> {
        let alignment = if direct {
            DIRECT_IO_ALIGNMENT
        } else {
            BUFFERED_IO_ALIGNMENT
        };
        Self::new(size, alignment)
    }

    #[inline(always)]
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: ptr is valid for size bytes for the lifetime of self.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.size) }
    }

    #[inline(always)]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: ptr is valid for size bytes and uniquely borrowed through &mut self.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.size) }
    }

    #[inline(always)]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline(always)]
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// Verify that the buffer is properly aligned
    #[inline(always)]
    pub fn is_aligned(&self) -> bool {
        (self.ptr.as_ptr() as usize) % self.alignment == 0
    }

    /// Fill the whole buffer by repeating `pattern`
    pub fn fill_pattern(&mut self, pattern: &[u8]) {
        fill_pattern(self.as_mut_slice(), pattern);
    }

    /// Overwrite the whole buffer with bytes from `rng`
    pub fn fill_random<R: RngCore>(&mut self, rng: &mut R) {
        rng.fill_bytes(self.as_mut_slice());
    }
}

impl Drop for AlignedBuffer {
    fn drop(&mut self) {
        // SAFETY: ptr was allocated with exactly this layout.
        unsafe {
            dealloc(self.ptr.as_ptr(), self.layout);
        }
    }
}

// AlignedBuffer is Send because it owns its memory
unsafe impl Send for AlignedBuffer {}

/// Repeat `pattern` across `buf`, truncating the last repetition to fit
///
/// An empty pattern leaves the buffer untouched.
pub fn fill_pattern(buf: &mut [u8], pattern: &[u8]) {
    if pattern.is_empty() {
        return;
    }
    for chunk in buf.chunks_mut(pattern.len()) {
        chunk.copy_from_slice(&pattern[..chunk.len()]);
    }
}
