//! Run orchestration
//!
//! The orchestrator is the only component that sees the whole run. It
//!
//! 1. validates the configuration and picks the clock
//! 2. splits every target's block range into per-worker partitions
//! 3. maps and zeroes the shared result store
//! 4. forks one unit per (target, worker) pair
//! 5. waits for the units, killing them at the deadline of a time-bounded run
//! 6. reduces the store into the report
//!
//! Units are reaped one pid at a time with `WNOHANG`, so the orchestrator never
//! collects a child it did not start.
//!
//! # Example
//!
//! ```no_run
//! use iob::config::BenchConfig;
//! use iob::coordinator::Orchestrator;
//!
//! let config = BenchConfig {
//!     targets: vec!["/dev/sdb".into()],
//!     workers: 4,
//!     seconds: Some(10),
//!     ..Default::default()
//! };
//! let report = Orchestrator::new(config)?.run()?;
//! println!("{}", iob::output::text::render(&report));
//! # Ok::<(), iob::error::BenchError>(())
//! ```

use crate::config::validator::{validate_config, ValidatedConfig};
use crate::config::{BenchConfig, Termination, MAX_UNITS};
use crate::distribution::Partition;
use crate::engine::IOEngine;
use crate::error::BenchError;
use crate::output::{Report, UnitReport};
use crate::stats::{ResultStore, StatisticsAggregator};
use crate::target::TargetKind;
use crate::util::time::HrClock;
use crate::worker::{exit_code, run_unit, UnitExit, WorkerParams, EXIT_SETUP_FAILURE};
use chrono::Utc;
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

type Result<T> = std::result::Result<T, BenchError>;

/// Builds a fresh engine inside each unit
pub type EngineFactory = Arc<dyn Fn() -> Box<dyn IOEngine> + Send + Sync>;

/// Interval between reap polls
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Split `total_blocks` evenly between `workers`
///
/// Worker `i` gets `[i * p, i * p + p - 1]` with `p = total_blocks / workers`;
/// blocks past `workers * p` are never touched.
pub fn partition(total_blocks: u64, workers: usize) -> Vec<Partition> {
    if workers == 0 {
        return Vec::new();
    }
    let per_worker = total_blocks / workers as u64;
    if per_worker == 0 {
        return Vec::new();
    }

    (0..workers as u64)
        .map(|i| {
            let start = i * per_worker;
            Partition::new(start, start + per_worker - 1)
        })
        .collect()
}

/// One unit as planned before the fork
#[derive(Debug, Clone, Serialize)]
pub struct UnitPlan {
    pub target_index: usize,
    pub worker_index: usize,
    pub path: PathBuf,
    pub partition: Partition,
    /// Result store slot the unit owns
    pub slot: usize,
}

/// Everything decided before any unit starts
#[derive(Debug, Clone, Serialize)]
pub struct RunPlan {
    pub engine: String,
    pub clock: String,
    pub clock_resolution_ns: i64,
    pub block_size: u64,
    pub target_size: u64,
    pub total_blocks: u64,
    pub blocks_per_worker: u64,
    pub requested_workers: usize,
    pub workers: usize,
    pub termination: Termination,
    pub targets: Vec<(PathBuf, TargetKind)>,
    pub units: Vec<UnitPlan>,
    pub caveats: Vec<String>,
}

/// Running unit tracked by the orchestrator
#[derive(Debug)]
struct UnitHandle {
    plan: UnitPlan,
    pid: libc::pid_t,
    exit: Option<UnitExit>,
    killed: bool,
}

impl UnitHandle {
    fn is_running(&self) -> bool {
        self.exit.is_none()
    }

    /// Non-blocking reap; records the exit when the unit has stopped
    fn poll(&mut self) {
        if self.is_running() {
            self.wait(libc::WNOHANG);
        }
    }

    /// Blocking reap
    fn reap(&mut self) {
        while self.is_running() {
            self.wait(0);
        }
    }

    fn wait(&mut self, flags: libc::c_int) {
        let mut status = 0;
        // SAFETY: waiting on a pid this orchestrator forked.
        let result = unsafe { libc::waitpid(self.pid, &mut status, flags) };

        if result == self.pid {
            let exit = UnitExit::from_wait_status(status, self.killed);
            debug!(
                pid = self.pid,
                target_index = self.plan.target_index,
                worker_index = self.plan.worker_index,
                ?exit,
                "unit reaped"
            );
            self.exit = Some(exit);
        } else if result < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() != std::io::ErrorKind::Interrupted {
                warn!(pid = self.pid, "waitpid failed: {}", err);
                self.exit = Some(UnitExit::Unknown(-1));
            }
        }
    }

    fn kill(&mut self) {
        if self.is_running() {
            // SAFETY: signalling a pid this orchestrator forked and has not reaped.
            unsafe { libc::kill(self.pid, libc::SIGKILL) };
            self.killed = true;
        }
    }
}

/// Drives one benchmark run
pub struct Orchestrator {
    validated: ValidatedConfig,
    clock: HrClock,
    engine_name: String,
    engine_factory: EngineFactory,
}

impl Orchestrator {
    /// Validate `config` and prepare a run
    ///
    /// # Errors
    ///
    /// Any configuration problem, including the lack of a usable clock.
    pub fn new(config: BenchConfig) -> Result<Self> {
        let validated = validate_config(config)?;
        let clock = HrClock::select()?;
        let kind = validated.engine;

        Ok(Self {
            engine_name: kind.name().to_string(),
            engine_factory: Arc::new(move || kind.create()),
            validated,
            clock,
        })
    }

    /// Replace the engine each unit builds
    pub fn with_engine_factory(mut self, name: impl Into<String>, factory: EngineFactory) -> Self {
        self.engine_name = name.into();
        self.engine_factory = factory;
        self
    }

    /// The configuration the run will use, workers already capped
    pub fn config(&self) -> &BenchConfig {
        &self.validated.config
    }

    pub fn clock(&self) -> HrClock {
        self.clock
    }

    /// Lay out every unit without starting anything
    pub fn plan(&self) -> RunPlan {
        let config = &self.validated.config;
        let partitions = partition(config.total_blocks(), config.workers);

        let mut units = Vec::with_capacity(config.targets.len() * partitions.len());
        for (target_index, path) in config.targets.iter().enumerate() {
            for (worker_index, part) in partitions.iter().enumerate() {
                units.push(UnitPlan {
                    target_index,
                    worker_index,
                    path: path.clone(),
                    partition: *part,
                    slot: ResultStore::slot_index(target_index, worker_index, config.workers),
                });
            }
        }

        let mut caveats = self.validated.caveats.clone();
        let cpus = num_cpus::get();
        if units.len() > cpus {
            caveats.push(format!(
                "{} units on {} CPUs; latency includes scheduling delay",
                units.len(),
                cpus
            ));
        }

        RunPlan {
            engine: self.engine_name.clone(),
            clock: self.clock.name().to_string(),
            clock_resolution_ns: self.clock.resolution_ns(),
            block_size: config.block_size,
            target_size: config.target_size,
            total_blocks: config.total_blocks(),
            blocks_per_worker: config.blocks_per_worker(),
            requested_workers: self.validated.requested_workers,
            workers: config.workers,
            termination: config.termination(),
            targets: config
                .targets
                .iter()
                .cloned()
                .zip(self.validated.target_kinds.iter().copied())
                .collect(),
            units,
            caveats,
        }
    }

    /// Run every unit and reduce their results
    ///
    /// # Errors
    ///
    /// - `ResourceExhaustion` if the store cannot be mapped or a unit cannot be
    ///   forked; units already started are killed first
    /// - `DataCorruption` if any unit's verification failed; every other unit is
    ///   killed immediately
    ///
    /// A unit that fails on I/O does not fail the run; it shows up as a caveat.
    pub fn run(&self) -> Result<Report> {
        let plan = self.plan();
        let config = &self.validated.config;

        info!(
            target_size = config.target_size,
            block_size = config.block_size,
            total_blocks = plan.total_blocks,
            blocks_per_worker = plan.blocks_per_worker,
            units = plan.units.len(),
            engine = %plan.engine,
            clock = %plan.clock,
            "starting run"
        );
        for caveat in &plan.caveats[self.validated.caveats.len()..] {
            warn!("{}", caveat);
        }

        let store = ResultStore::new(MAX_UNITS)?;
        let started_at = Utc::now();
        let start = Instant::now();

        let mut handles = Vec::with_capacity(plan.units.len());
        for unit in &plan.units {
            match self.spawn_unit(unit, &store) {
                Ok(pid) => {
                    debug!(pid, slot = unit.slot, "unit spawned");
                    handles.push(UnitHandle {
                        plan: unit.clone(),
                        pid,
                        exit: None,
                        killed: false,
                    });
                }
                Err(err) => {
                    error!("{}", err);
                    cancel_all(&mut handles);
                    return Err(err);
                }
            }
        }

        let deadline = match plan.termination {
            Termination::Seconds(secs) => Some(start + Duration::from_secs(secs)),
            Termination::Iterations(_) => None,
        };
        let corrupted = wait_for_units(&mut handles, deadline);
        let elapsed = start.elapsed();

        if let Some(index) = corrupted {
            let unit = &handles[index].plan;
            let record = store.snapshot(unit.slot).unwrap_or_default();
            let err = BenchError::DataCorruption {
                target_index: unit.target_index,
                worker_index: unit.worker_index,
                block: record.corrupt_block,
                offset: record.corrupt_offset as usize,
            };
            error!("{}", err);
            return Err(err);
        }

        Ok(self.build_report(&plan, &handles, &store, started_at, elapsed))
    }

    fn spawn_unit(&self, unit: &UnitPlan, store: &ResultStore) -> Result<libc::pid_t> {
        let config = &self.validated.config;
        let params = WorkerParams {
            target_index: unit.target_index,
            worker_index: unit.worker_index,
            path: unit.path.clone(),
            partition: unit.partition,
            block_size: config.block_size,
            access: config.access_pattern(),
            fill: config.fill,
            data_pattern: config.pattern.as_bytes().to_vec(),
            verify: config.verify,
            workload: config.workload,
            iterations: config.termination().iteration_budget(),
            open_flags: config.open_flags(),
            clock: self.clock,
        };

        // SAFETY: the child only runs the unit and leaves through _exit, so it
        // never returns into the caller or runs the parent's destructors.
        let pid = unsafe { libc::fork() };
        if pid < 0 {
            return Err(BenchError::resource(
                format!(
                    "cannot start unit for target {} worker {}",
                    unit.target_index, unit.worker_index
                ),
                std::io::Error::last_os_error(),
            ));
        }

        if pid == 0 {
            let factory = Arc::clone(&self.engine_factory);
            let code = panic::catch_unwind(AssertUnwindSafe(|| {
                let Some(slot) = store.slot(unit.slot) else {
                    return EXIT_SETUP_FAILURE;
                };
                let result = run_unit(params, factory(), &slot);
                if let Err(err) = &result {
                    error!("{}", err);
                }
                exit_code(&result)
            }))
            .unwrap_or(EXIT_SETUP_FAILURE);

            // SAFETY: terminate the child without unwinding or flushing
            // buffers inherited from the parent.
            unsafe { libc::_exit(code) };
        }

        Ok(pid)
    }

    fn build_report(
        &self,
        plan: &RunPlan,
        handles: &[UnitHandle],
        store: &ResultStore,
        started_at: chrono::DateTime<Utc>,
        elapsed: Duration,
    ) -> Report {
        let config = &self.validated.config;
        let devices = config
            .targets
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        let mut aggregator = StatisticsAggregator::new(config.block_size, config.workers, devices);

        let mut caveats = plan.caveats.clone();
        let mut units = Vec::with_capacity(handles.len());
        let mut cancelled = 0;

        for handle in handles {
            let mut record = store.snapshot(handle.plan.slot).unwrap_or_default();
            // A unit that died before stamping its slot still belongs to its target
            record.target_index = handle.plan.target_index as u64;
            record.worker_index = handle.plan.worker_index as u64;
            aggregator.add_record(record);

            let exit = handle.exit.unwrap_or(UnitExit::Unknown(-1));
            match exit {
                UnitExit::Completed => {}
                UnitExit::Cancelled => cancelled += 1,
                other => caveats.push(format!(
                    "unit for target {} worker {} ended as {:?}; its counts are partial",
                    handle.plan.target_index, handle.plan.worker_index, other
                )),
            }

            units.push(UnitReport {
                target_index: handle.plan.target_index,
                worker_index: handle.plan.worker_index,
                partition: handle.plan.partition,
                exit,
                record,
            });
        }

        if cancelled > 0 {
            caveats.push(format!(
                "{} unit(s) cancelled at the deadline; passes in flight were not recorded",
                cancelled
            ));
        }

        let targets = aggregator.target_summaries();
        let combined = StatisticsAggregator::combine(&targets);

        Report {
            host: hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok())
                .unwrap_or_else(|| "unknown".to_string()),
            started_at,
            elapsed_secs: elapsed.as_secs_f64(),
            engine: plan.engine.clone(),
            clock: plan.clock.clone(),
            block_size: plan.block_size,
            target_size: plan.target_size,
            blocks_per_worker: plan.blocks_per_worker,
            requested_workers: plan.requested_workers,
            workers: plan.workers,
            termination: plan.termination,
            targets,
            combined,
            units,
            caveats,
        }
    }
}

/// Kill and reap every unit still running
fn cancel_all(handles: &mut [UnitHandle]) {
    for handle in handles.iter_mut() {
        handle.kill();
    }
    for handle in handles.iter_mut() {
        handle.reap();
    }
}

/// Poll units until all have stopped, the deadline passes, or one reports
/// corruption
///
/// Returns the index of the first unit that exited with corruption, if any.
fn wait_for_units(handles: &mut [UnitHandle], deadline: Option<Instant>) -> Option<usize> {
    loop {
        for handle in handles.iter_mut() {
            handle.poll();
        }

        if let Some(index) = handles
            .iter()
            .position(|h| h.exit == Some(UnitExit::DataCorruption))
        {
            cancel_all(handles);
            return Some(index);
        }

        if handles.iter().all(|h| !h.is_running()) {
            return None;
        }

        let now = Instant::now();
        let sleep = match deadline {
            Some(deadline) if now >= deadline => {
                let running = handles.iter().filter(|h| h.is_running()).count();
                info!(running, "deadline reached, cancelling units");
                cancel_all(handles);
                return handles
                    .iter()
                    .position(|h| h.exit == Some(UnitExit::DataCorruption));
            }
            Some(deadline) => POLL_INTERVAL.min(deadline - now),
            None => POLL_INTERVAL,
        };
        std::thread::sleep(sleep);
    }
}
