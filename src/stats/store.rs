//! Cross-process result store
//!
//! One anonymous shared mapping holds a fixed array of [`ResultRecord`]s, one
//! slot per (target, worker) unit. The mapping is created and zeroed before any
//! unit is forked, so every unit inherits it and no attach step exists. Each unit
//! only ever writes its own slot; the orchestrator reads the array after every
//! unit has stopped. Disjoint ownership is what makes the store lock-free.
//!
//! # Example
//!
//! ```
//! use iob::stats::store::ResultStore;
//!
//! let store = ResultStore::new(4)?;
//! let slot = store.slot(ResultStore::slot_index(0, 1, 2)).unwrap();
//! slot.init(0, 1);
//! slot.add_writes(1_500, 3);
//!
//! let record = store.snapshot(1).unwrap();
//! assert_eq!(record.writes, 3);
//! # Ok::<(), iob::error::BenchError>(())
//! ```

use crate::error::BenchError;
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;
use std::ptr::{self, NonNull};

/// Accumulated counters for one unit
///
/// Fixed layout so the bytes mean the same thing in every process sharing the
/// mapping.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResultRecord {
    pub target_index: u64,
    pub worker_index: u64,
    /// Sum of timed write pass durations, nanoseconds
    pub write_latency_ns: u64,
    /// Sum of timed read pass durations, nanoseconds
    pub read_latency_ns: u64,
    pub writes: u64,
    pub reads: u64,
    /// Passes that finished completely
    pub iterations: u64,
    /// Set to 1 when verification found a mismatch
    pub corrupted: u64,
    /// Block and byte offset of the first mismatch, valid when `corrupted` is set
    pub corrupt_block: u64,
    pub corrupt_offset: u64,
}

/// Shared, slot-indexed array of [`ResultRecord`]s
pub struct ResultStore {
    base: NonNull<ResultRecord>,
    capacity: usize,
    len_bytes: usize,
}

// SAFETY: the mapping lives until drop and every mutation goes through a slot
// owned by exactly one unit.
unsafe impl Send for ResultStore {}

impl ResultStore {
    /// Map and zero a store with room for `capacity` units
    ///
    /// # Errors
    ///
    /// A failed mapping is a resource exhaustion error.
    pub fn new(capacity: usize) -> Result<Self, BenchError> {
        if capacity == 0 {
            return Err(BenchError::config("result store needs at least one slot"));
        }
        let len_bytes = capacity
            .checked_mul(std::mem::size_of::<ResultRecord>())
            .ok_or_else(|| BenchError::config("result store size overflows"))?;

        // SAFETY: anonymous mapping with no address hint; checked below.
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len_bytes,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(BenchError::resource(
                format!("cannot map {} byte shared result region", len_bytes),
                std::io::Error::last_os_error(),
            ));
        }

        let base = NonNull::new(ptr as *mut ResultRecord).ok_or_else(|| {
            BenchError::resource(
                "shared result region mapped at null",
                std::io::Error::other("null mapping"),
            )
        })?;

        // SAFETY: the mapping is len_bytes long and writable.
        unsafe { ptr::write_bytes(base.as_ptr() as *mut u8, 0, len_bytes) };

        Ok(Self {
            base,
            capacity,
            len_bytes,
        })
    }

    /// Slot of worker `worker` on target `target` when each target has `workers`
    pub fn slot_index(target: usize, worker: usize, workers: usize) -> usize {
        target * workers + worker
    }

    /// Writer handle for one slot
    ///
    /// Handing the same index to two units breaks the ownership rule; the
    /// orchestrator derives indices from distinct (target, worker) pairs.
    pub fn slot(&self, index: usize) -> Option<ResultSlot<'_>> {
        if index >= self.capacity {
            return None;
        }
        // SAFETY: index is in bounds of the mapping.
        let ptr = unsafe { NonNull::new_unchecked(self.base.as_ptr().add(index)) };
        Some(ResultSlot {
            ptr,
            _store: PhantomData,
        })
    }

    /// Copy of one record
    pub fn snapshot(&self, index: usize) -> Option<ResultRecord> {
        self.slot(index).map(|slot| slot.read())
    }

    /// Copies of the first `count` records
    pub fn snapshot_all(&self, count: usize) -> Vec<ResultRecord> {
        (0..count.min(self.capacity))
            .filter_map(|i| self.snapshot(i))
            .collect()
    }
}

impl Drop for ResultStore {
    fn drop(&mut self) {
        // SAFETY: base/len_bytes describe the mapping created in new().
        unsafe {
            libc::munmap(self.base.as_ptr() as *mut libc::c_void, self.len_bytes);
        }
    }
}

impl fmt::Debug for ResultStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultStore")
            .field("capacity", &self.capacity)
            .field("len_bytes", &self.len_bytes)
            .finish()
    }
}

/// Writer for a single record in a [`ResultStore`]
///
/// Updates are volatile so every counter lands in the shared mapping as it
/// changes; a unit killed mid-run leaves whatever it had recorded.
#[derive(Debug)]
pub struct ResultSlot<'a> {
    ptr: NonNull<ResultRecord>,
    _store: PhantomData<&'a ResultStore>,
}

impl ResultSlot<'_> {
    /// Stamp the owner and clear the counters
    pub fn init(&self, target_index: usize, worker_index: usize) {
        self.write(ResultRecord {
            target_index: target_index as u64,
            worker_index: worker_index as u64,
            ..Default::default()
        });
    }

    /// Add one timed write interval and the writes it covered
    pub fn add_writes(&self, latency_ns: u64, count: u64) {
        let mut record = self.read();
        record.write_latency_ns = record.write_latency_ns.saturating_add(latency_ns);
        record.writes = record.writes.saturating_add(count);
        self.write(record);
    }

    /// Add one timed read interval and the reads it covered
    pub fn add_reads(&self, latency_ns: u64, count: u64) {
        let mut record = self.read();
        record.read_latency_ns = record.read_latency_ns.saturating_add(latency_ns);
        record.reads = record.reads.saturating_add(count);
        self.write(record);
    }

    pub fn finish_iteration(&self) {
        let mut record = self.read();
        record.iterations += 1;
        self.write(record);
    }

    /// Note where verification failed, for the orchestrator to report
    pub fn record_corruption(&self, block: u64, offset: usize) {
        let mut record = self.read();
        record.corrupted = 1;
        record.corrupt_block = block;
        record.corrupt_offset = offset as u64;
        self.write(record);
    }

    pub fn read(&self) -> ResultRecord {
        // SAFETY: ptr points at a live, aligned record inside the mapping.
        unsafe { ptr::read_volatile(self.ptr.as_ptr()) }
    }

    fn write(&self, record: ResultRecord) {
        // SAFETY: as in read(); only this unit writes this record.
        unsafe { ptr::write_volatile(self.ptr.as_ptr(), record) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_starts_zeroed() {
        let store = ResultStore::new(16).unwrap();
        assert!(store
            .snapshot_all(16)
            .iter()
            .all(|r| *r == ResultRecord::default()));
    }

    #[test]
    fn test_slot_bounds() {
        let store = ResultStore::new(2).unwrap();
        assert!(store.slot(1).is_some());
        assert!(store.slot(2).is_none());
        assert_eq!(store.snapshot_all(10).len(), 2);
    }

    #[test]
    fn test_slot_index_layout() {
        assert_eq!(ResultStore::slot_index(0, 0, 4), 0);
        assert_eq!(ResultStore::slot_index(1, 0, 4), 4);
        assert_eq!(ResultStore::slot_index(2, 3, 4), 11);
    }

    #[test]
    fn test_slots_are_disjoint() {
        let store = ResultStore::new(4).unwrap();
        let a = store.slot(1).unwrap();
        let b = store.slot(2).unwrap();
        a.init(0, 1);
        b.init(0, 2);
        a.add_writes(100, 1);
        a.add_writes(50, 2);
        b.add_reads(70, 7);
        a.finish_iteration();
        b.record_corruption(12, 34);

        let ra = store.snapshot(1).unwrap();
        let rb = store.snapshot(2).unwrap();
        assert_eq!((ra.write_latency_ns, ra.writes, ra.iterations), (150, 3, 1));
        assert_eq!((ra.reads, ra.read_latency_ns), (0, 0));
        assert_eq!((rb.read_latency_ns, rb.reads, rb.worker_index), (70, 7, 2));
        assert_eq!((rb.corrupted, rb.corrupt_block, rb.corrupt_offset), (1, 12, 34));
        assert_eq!(ra.corrupted, 0);
        assert_eq!(store.snapshot(0).unwrap(), ResultRecord::default());
    }

    #[test]
    fn test_child_writes_are_visible() {
        let store = ResultStore::new(1).unwrap();

        // SAFETY: the child only touches the shared mapping and exits.
        let pid = unsafe { libc::fork() };
        assert!(pid >= 0);
        if pid == 0 {
            let slot = store.slot(0).unwrap();
            slot.init(3, 4);
            slot.add_writes(999, 9);
            unsafe { libc::_exit(0) };
        }

        let mut status = 0;
        // SAFETY: waiting on our own child.
        let reaped = unsafe { libc::waitpid(pid, &mut status, 0) };
        assert_eq!(reaped, pid);

        let record = store.snapshot(0).unwrap();
        assert_eq!(record.target_index, 3);
        assert_eq!(record.writes, 9);
        assert_eq!(record.write_latency_ns, 999);
    }
}
