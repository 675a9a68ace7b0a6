//! Per-unit benchmark loop
//!
//! A worker owns one partition of one target. It runs inside its own execution
//! unit and reports only through its slot in the result store.
//!
//! # Lifecycle
//!
//! 1. **Init**: allocate the aligned write buffer and a read-back buffer
//! 2. **Open**: open a private handle on the target
//! 3. **Generate**: pre-compute every block address for a pass
//! 4. **Loop**: fill, timed write pass, optional verification, check budget
//!
//! A failed write ends the unit after the partial pass has been recorded. A
//! verification mismatch ends it with [`BenchError::DataCorruption`], which the
//! unit turns into [`EXIT_DATA_CORRUPTION`].
//!
//! # Example
//!
//! ```no_run
//! use iob::worker::{run_unit, WorkerParams};
//! use iob::engine::psync::PsyncEngine;
//! use iob::stats::store::ResultStore;
//! # fn params() -> WorkerParams { unimplemented!() }
//!
//! let store = ResultStore::new(1)?;
//! let slot = store.slot(0).unwrap();
//! let summary = run_unit(params(), Box::new(PsyncEngine::new()), &slot)?;
//! println!("{} writes", summary.writes);
//! # Ok::<(), iob::error::BenchError>(())
//! ```

use crate::config::{FillMode, Workload};
use crate::distribution::{generate_addresses, AccessPattern, Partition};
use crate::engine::IOEngine;
use crate::error::BenchError;
use crate::stats::store::ResultSlot;
use crate::target::{open_target, OpenFlags};
use crate::util::buffer::AlignedBuffer;
use crate::util::time::HrClock;
use crate::util::verification::{compare_block, VerificationResult};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::Serialize;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::PathBuf;
use tracing::{debug, error};

/// Read-back comparisons per iteration
pub const VERIFY_PASSES: usize = 2;

pub const EXIT_COMPLETED: i32 = 0;
pub const EXIT_IO_FAILURE: i32 = 1;
pub const EXIT_SETUP_FAILURE: i32 = 2;
/// Exit status of a unit (and of the whole program) when verification fails
pub const EXIT_DATA_CORRUPTION: i32 = 3;

type Result<T> = std::result::Result<T, BenchError>;

/// Everything a unit needs to run, fixed before it starts
#[derive(Debug, Clone)]
pub struct WorkerParams {
    pub target_index: usize,
    pub worker_index: usize,
    pub path: PathBuf,
    pub partition: Partition,
    pub block_size: u64,
    pub access: AccessPattern,
    pub fill: FillMode,
    /// Bytes repeated across the buffer for `FillMode::Pattern`
    pub data_pattern: Vec<u8>,
    pub verify: bool,
    pub workload: Workload,
    /// Passes to run; `None` runs until the unit is cancelled
    pub iterations: Option<u64>,
    pub open_flags: OpenFlags,
    pub clock: HrClock,
}

/// What a unit accomplished before returning
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    pub iterations: u64,
    pub writes: u64,
    pub reads: u64,
    pub write_latency_ns: u64,
    pub read_latency_ns: u64,
}

/// One unit's benchmark state
pub struct Worker {
    params: WorkerParams,
    engine: Box<dyn IOEngine>,
    buffer: AlignedBuffer,
    read_buffer: AlignedBuffer,
    addresses: Vec<u64>,
    rng: Xoshiro256PlusPlus,
    summary: WorkerSummary,
}

impl Worker {
    /// Allocate buffers and generate the pass addresses
    pub fn new(params: WorkerParams, engine: Box<dyn IOEngine>) -> Result<Self> {
        let setup_error = |source: anyhow::Error| BenchError::UnitSetup {
            path: params.path.clone(),
            source: source.into(),
        };

        let size = usize::try_from(params.block_size)
            .map_err(|e| setup_error(anyhow::Error::new(e)))?;
        let mut buffer =
            AlignedBuffer::for_io(size, params.open_flags.direct).map_err(setup_error)?;
        let read_buffer =
            AlignedBuffer::for_io(size, params.open_flags.direct).map_err(setup_error)?;

        if params.fill == FillMode::Pattern {
            buffer.fill_pattern(&params.data_pattern);
        }

        let addresses = generate_addresses(params.partition, params.access);
        let seed = ((params.target_index as u64) << 32) | params.worker_index as u64;

        Ok(Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
            params,
            engine,
            buffer,
            read_buffer,
            addresses,
            summary: WorkerSummary::default(),
        })
    }

    /// Addresses one pass visits, in order
    pub fn addresses(&self) -> &[u64] {
        &self.addresses
    }

    /// Run passes against `fd` until the budget is spent
    ///
    /// With no iteration budget this only returns on error.
    pub fn run(&mut self, fd: RawFd, slot: &ResultSlot<'_>) -> Result<WorkerSummary> {
        slot.init(self.params.target_index, self.params.worker_index);
        let mut remaining = self.params.iterations;

        loop {
            if remaining == Some(0) {
                break;
            }

            match self.params.workload {
                Workload::Write => {
                    if self.params.fill == FillMode::Random {
                        self.buffer.fill_random(&mut self.rng);
                    }
                    self.write_pass(fd, slot)?;
                    if self.params.verify {
                        if let Err(err) = self.verify_pass(fd) {
                            if let BenchError::DataCorruption { block, offset, .. } = &err {
                                slot.record_corruption(*block, *offset);
                            }
                            return Err(err);
                        }
                    }
                }
                Workload::Read => self.read_pass(fd, slot)?,
            }

            slot.finish_iteration();
            self.summary.iterations += 1;
            remaining = remaining.map(|n| n - 1);
        }

        Ok(self.summary)
    }

    fn write_pass(&mut self, fd: RawFd, slot: &ResultSlot<'_>) -> Result<()> {
        let clock = self.params.clock;
        let block_size = self.params.block_size;
        let start = clock
            .now_ns()
            .map_err(|e| self.io_error(self.first_block(), e))?;

        for (done, &block) in self.addresses.iter().enumerate() {
            if let Err(source) =
                self.engine
                    .write_block(fd, self.buffer.as_slice(), block, block_size)
            {
                // Without a closing reading the partial pass cannot be timed
                if let Ok(elapsed) = clock.elapsed_ns(start) {
                    slot.add_writes(elapsed, done as u64);
                    self.summary.write_latency_ns += elapsed;
                    self.summary.writes += done as u64;
                }
                return Err(self.io_error(block, source));
            }
        }

        let elapsed = clock
            .elapsed_ns(start)
            .map_err(|e| self.io_error(self.last_block(), e))?;
        let count = self.addresses.len() as u64;
        slot.add_writes(elapsed, count);
        self.summary.write_latency_ns += elapsed;
        self.summary.writes += count;
        Ok(())
    }

    fn read_pass(&mut self, fd: RawFd, slot: &ResultSlot<'_>) -> Result<()> {
        let clock = self.params.clock;
        let block_size = self.params.block_size;
        let start = clock
            .now_ns()
            .map_err(|e| self.io_error(self.first_block(), e))?;

        for (done, &block) in self.addresses.iter().enumerate() {
            if let Err(source) =
                self.engine
                    .read_block(fd, self.read_buffer.as_mut_slice(), block, block_size)
            {
                // Without a closing reading the partial pass cannot be timed
                if let Ok(elapsed) = clock.elapsed_ns(start) {
                    slot.add_reads(elapsed, done as u64);
                    self.summary.read_latency_ns += elapsed;
                    self.summary.reads += done as u64;
                }
                return Err(self.io_error(block, source));
            }
        }

        let elapsed = clock
            .elapsed_ns(start)
            .map_err(|e| self.io_error(self.last_block(), e))?;
        let count = self.addresses.len() as u64;
        slot.add_reads(elapsed, count);
        self.summary.read_latency_ns += elapsed;
        self.summary.reads += count;
        Ok(())
    }

    /// Re-read every address and compare against the write buffer, twice
    fn verify_pass(&mut self, fd: RawFd) -> Result<()> {
        let block_size = self.params.block_size;

        for pass in 0..VERIFY_PASSES {
            for &block in &self.addresses {
                if let Err(source) =
                    self.engine
                        .read_block(fd, self.read_buffer.as_mut_slice(), block, block_size)
                {
                    return Err(self.io_error(block, source));
                }

                if let VerificationResult::Failure {
                    offset,
                    expected,
                    actual,
                } = compare_block(self.buffer.as_slice(), self.read_buffer.as_slice())
                {
                    error!(
                        target_index = self.params.target_index,
                        worker_index = self.params.worker_index,
                        block,
                        offset,
                        expected,
                        actual,
                        pass,
                        "data corruption detected"
                    );
                    return Err(BenchError::DataCorruption {
                        target_index: self.params.target_index,
                        worker_index: self.params.worker_index,
                        block,
                        offset,
                    });
                }
            }
        }

        Ok(())
    }

    fn first_block(&self) -> u64 {
        self.addresses
            .first()
            .copied()
            .unwrap_or(self.params.partition.start_block)
    }

    fn last_block(&self) -> u64 {
        self.addresses
            .last()
            .copied()
            .unwrap_or(self.params.partition.end_block)
    }

    fn io_error(&self, block: u64, source: anyhow::Error) -> BenchError {
        BenchError::Io {
            target_index: self.params.target_index,
            worker_index: self.params.worker_index,
            block,
            source: source.into(),
        }
    }
}

/// Open the target and run a worker to completion
pub fn run_unit(
    params: WorkerParams,
    engine: Box<dyn IOEngine>,
    slot: &ResultSlot<'_>,
) -> Result<WorkerSummary> {
    let mut worker = Worker::new(params, engine)?;

    let file = open_target(&worker.params.path, worker.params.open_flags).map_err(|source| {
        BenchError::UnitSetup {
            path: worker.params.path.clone(),
            source: source.into(),
        }
    })?;

    debug!(
        target_index = worker.params.target_index,
        worker_index = worker.params.worker_index,
        partition = %worker.params.partition,
        engine = worker.engine.name(),
        "unit started"
    );

    worker.run(file.as_raw_fd(), slot)
}

/// Exit status a unit reports for the outcome of its run
pub fn exit_code(result: &Result<WorkerSummary>) -> i32 {
    match result {
        Ok(_) => EXIT_COMPLETED,
        Err(BenchError::DataCorruption { .. }) => EXIT_DATA_CORRUPTION,
        Err(BenchError::Io { .. }) => EXIT_IO_FAILURE,
        Err(_) => EXIT_SETUP_FAILURE,
    }
}

/// How a unit ended, as seen by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitExit {
    Completed,
    IoFailure,
    SetupFailure,
    DataCorruption,
    /// Killed by the orchestrator at the deadline or after corruption elsewhere
    Cancelled,
    /// Killed by a signal the orchestrator did not send
    Crashed(i32),
    /// Exited with a status no unit produces
    Unknown(i32),
}

impl UnitExit {
    /// Classify a `waitpid` status
    pub fn from_wait_status(status: i32, cancelled: bool) -> Self {
        if libc::WIFEXITED(status) {
            match libc::WEXITSTATUS(status) {
                EXIT_COMPLETED => UnitExit::Completed,
                EXIT_IO_FAILURE => UnitExit::IoFailure,
                EXIT_SETUP_FAILURE => UnitExit::SetupFailure,
                EXIT_DATA_CORRUPTION => UnitExit::DataCorruption,
                other => UnitExit::Unknown(other),
            }
        } else if libc::WIFSIGNALED(status) {
            let signal = libc::WTERMSIG(status);
            if cancelled && signal == libc::SIGKILL {
                UnitExit::Cancelled
            } else {
                UnitExit::Crashed(signal)
            }
        } else {
            UnitExit::Unknown(status)
        }
    }

    /// Whether the unit's counters cover everything it was asked to do
    pub fn is_clean(&self) -> bool {
        matches!(self, UnitExit::Completed | UnitExit::Cancelled)
    }
}
