//! High-resolution timing utilities
//!
//! Latency is measured by bracketing whole write/read passes with
//! `clock_gettime` readings. The clock is chosen once at startup: the monotonic
//! clock with the finest reported resolution wins.

use crate::error::BenchError;
use anyhow::Context;
use std::time::Duration;

pub const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Clocks considered for latency measurement, in preference order on ties
const CANDIDATE_CLOCKS: &[(libc::clockid_t, &str)] = &[
    (libc::CLOCK_MONOTONIC_RAW, "CLOCK_MONOTONIC_RAW"),
    (libc::CLOCK_MONOTONIC, "CLOCK_MONOTONIC"),
];

/// Coarsest resolution accepted for latency measurement
const MAX_RESOLUTION_NS: i64 = 1_000;

/// A selected high-resolution clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HrClock {
    id: libc::clockid_t,
    name: &'static str,
    resolution_ns: i64,
}

impl HrClock {
    /// Pick the finest-resolution monotonic clock available
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no candidate clock resolves finer than
    /// one microsecond.
    pub fn select() -> Result<Self, BenchError> {
        let mut best: Option<HrClock> = None;

        for &(id, name) in CANDIDATE_CLOCKS {
            let mut res = libc::timespec {
                tv_sec: 0,
                tv_nsec: 0,
            };
            // SAFETY: res is a valid out-pointer.
            if unsafe { libc::clock_getres(id, &mut res) } < 0 {
                continue;
            }
            if res.tv_sec != 0 {
                continue;
            }
            let resolution_ns = res.tv_nsec as i64;
            if resolution_ns >= MAX_RESOLUTION_NS {
                continue;
            }
            if best.map_or(true, |b| resolution_ns < b.resolution_ns) {
                best = Some(HrClock {
                    id,
                    name,
                    resolution_ns,
                });
            }
        }

        best.ok_or_else(|| BenchError::config("no high resolution clock available"))
    }

    /// Current reading in nanoseconds
    #[inline(always)]
    pub fn now_ns(&self) -> crate::Result<u64> {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        // SAFETY: ts is a valid out-pointer.
        if unsafe { libc::clock_gettime(self.id, &mut ts) } < 0 {
            return Err(std::io::Error::last_os_error())
                .with_context(|| format!("cannot read {}", self.name));
        }
        Ok((ts.tv_sec as u64) * NANOS_PER_SEC + (ts.tv_nsec as u64))
    }

    /// Nanoseconds elapsed since an earlier `now_ns()` reading
    #[inline(always)]
    pub fn elapsed_ns(&self, start_ns: u64) -> crate::Result<u64> {
        Ok(self.now_ns()?.saturating_sub(start_ns))
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn resolution_ns(&self) -> i64 {
        self.resolution_ns
    }

    /// A clock id the kernel rejects, for exercising failed readings
    #[cfg(test)]
    pub(crate) fn unreadable() -> Self {
        Self {
            id: 1000,
            name: "CLOCK_INVALID",
            resolution_ns: 1,
        }
    }
}

/// Format a duration in human-readable form
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use iob::util::time::format_duration;
///
/// assert_eq!(format_duration(Duration::from_nanos(500)), "500ns");
/// assert_eq!(format_duration(Duration::from_nanos(1500)), "1.50us");
/// assert_eq!(format_duration(Duration::from_micros(2500)), "2.50ms");
/// assert_eq!(format_duration(Duration::from_secs(5)), "5.00s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    format_latency_ns(duration.as_nanos() as f64)
}

/// Format a latency given in (possibly fractional) nanoseconds
pub fn format_latency_ns(nanos: f64) -> String {
    if nanos < 1_000.0 {
        format!("{:.0}ns", nanos)
    } else if nanos < 1_000_000.0 {
        format!("{:.2}us", nanos / 1_000.0)
    } else if nanos < 1_000_000_000.0 {
        format!("{:.2}ms", nanos / 1_000_000.0)
    } else {
        format!("{:.2}s", nanos / 1_000_000_000.0)
    }
}

/// Format a bandwidth given in MiB/s, switching to GiB/s for large values
///
/// # Examples
///
/// ```
/// use iob::util::time::format_bandwidth_mib;
///
/// assert_eq!(format_bandwidth_mib(512.0), "512.00 MB/s");
/// assert_eq!(format_bandwidth_mib(2560.0), "2.50 GB/s");
/// ```
pub fn format_bandwidth_mib(mib_per_sec: f64) -> String {
    if mib_per_sec >= 1024.0 {
        format!("{:.2} GB/s", mib_per_sec / 1024.0)
    } else {
        format!("{:.2} MB/s", mib_per_sec)
    }
}
