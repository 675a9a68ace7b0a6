//! Statistics aggregation
//!
//! Reduces the per-unit records in the result store into one summary per
//! target and a combined summary across targets.
//!
//! # Reduction
//!
//! - **Average latency**: total pass time over total operations on the target,
//!   zero when nothing completed
//! - **Bandwidth**: `block_size / avg_latency` scaled to seconds, times the
//!   worker count, in MiB/s
//! - **Min/max latency**: per-unit average write latency, over units that
//!   completed at least one write
//! - **Combined**: bandwidths add, min of mins, max of maxes, mean of the
//!   per-target averages that recorded anything
//!
//! # Example
//!
//! ```
//! use iob::stats::aggregator::StatisticsAggregator;
//! use iob::stats::store::ResultRecord;
//!
//! let mut aggregator = StatisticsAggregator::new(4096, 1, vec!["/dev/sdb".into()]);
//! aggregator.add_record(ResultRecord {
//!     write_latency_ns: 1_000_000,
//!     writes: 100,
//!     ..Default::default()
//! });
//!
//! let summary = &aggregator.target_summaries()[0];
//! assert_eq!(summary.avg_write_latency_ns, 10_000.0);
//! ```

use crate::stats::store::ResultRecord;
use crate::util::time::NANOS_PER_SEC;
use serde::Serialize;

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// Reduced statistics for one target
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetSummary {
    pub device: String,
    pub avg_write_latency_ns: f64,
    pub avg_read_latency_ns: f64,
    pub write_bandwidth_mib_s: f64,
    pub read_bandwidth_mib_s: f64,
    pub min_write_latency_ns: f64,
    pub max_write_latency_ns: f64,
    pub writes: u64,
    pub reads: u64,
}

/// Reduced statistics across every target
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CombinedSummary {
    pub write_bandwidth_mib_s: f64,
    pub read_bandwidth_mib_s: f64,
    pub min_write_latency_ns: f64,
    pub max_write_latency_ns: f64,
    pub avg_write_latency_ns: f64,
    pub avg_read_latency_ns: f64,
}

/// Mean time per operation; zero when there were no operations
pub fn average_latency_ns(total_latency_ns: u64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        total_latency_ns as f64 / count as f64
    }
}

/// Throughput of `workers` units each moving one block per `avg_latency_ns`
pub fn bandwidth_mib_s(block_size: u64, avg_latency_ns: f64, workers: usize) -> f64 {
    if avg_latency_ns <= 0.0 {
        return 0.0;
    }
    let per_worker = block_size as f64 / avg_latency_ns * NANOS_PER_SEC as f64;
    per_worker * workers as f64 / BYTES_PER_MIB
}

/// Collects unit records and reduces them
#[derive(Debug)]
pub struct StatisticsAggregator {
    block_size: u64,
    workers: usize,
    devices: Vec<String>,
    /// Records grouped by target index
    records: Vec<Vec<ResultRecord>>,
}

impl StatisticsAggregator {
    /// Aggregator for `devices.len()` targets with `workers` units each
    pub fn new(block_size: u64, workers: usize, devices: Vec<String>) -> Self {
        let records = vec![Vec::new(); devices.len()];
        Self {
            block_size,
            workers,
            devices,
            records,
        }
    }

    /// Add one unit's record; records for unknown targets are ignored
    pub fn add_record(&mut self, record: ResultRecord) {
        if let Some(bucket) = self.records.get_mut(record.target_index as usize) {
            bucket.push(record);
        }
    }

    pub fn num_records(&self) -> usize {
        self.records.iter().map(Vec::len).sum()
    }

    /// One summary per target, in target order
    pub fn target_summaries(&self) -> Vec<TargetSummary> {
        self.devices
            .iter()
            .zip(&self.records)
            .map(|(device, records)| self.summarize(device, records))
            .collect()
    }

    /// Cross-target reduction of `targets`
    pub fn combine(targets: &[TargetSummary]) -> CombinedSummary {
        let with_writes: Vec<&TargetSummary> = targets.iter().filter(|t| t.writes > 0).collect();
        let with_reads: Vec<&TargetSummary> = targets.iter().filter(|t| t.reads > 0).collect();

        let mean = |values: Vec<f64>| {
            if values.is_empty() {
                0.0
            } else {
                values.iter().sum::<f64>() / values.len() as f64
            }
        };

        CombinedSummary {
            write_bandwidth_mib_s: targets.iter().map(|t| t.write_bandwidth_mib_s).sum(),
            read_bandwidth_mib_s: targets.iter().map(|t| t.read_bandwidth_mib_s).sum(),
            min_write_latency_ns: with_writes
                .iter()
                .map(|t| t.min_write_latency_ns)
                .reduce(f64::min)
                .unwrap_or(0.0),
            max_write_latency_ns: with_writes
                .iter()
                .map(|t| t.max_write_latency_ns)
                .reduce(f64::max)
                .unwrap_or(0.0),
            avg_write_latency_ns: mean(with_writes.iter().map(|t| t.avg_write_latency_ns).collect()),
            avg_read_latency_ns: mean(with_reads.iter().map(|t| t.avg_read_latency_ns).collect()),
        }
    }

    fn summarize(&self, device: &str, records: &[ResultRecord]) -> TargetSummary {
        let write_latency: u64 = records.iter().map(|r| r.write_latency_ns).sum();
        let read_latency: u64 = records.iter().map(|r| r.read_latency_ns).sum();
        let writes: u64 = records.iter().map(|r| r.writes).sum();
        let reads: u64 = records.iter().map(|r| r.reads).sum();

        let avg_write = average_latency_ns(write_latency, writes);
        let avg_read = average_latency_ns(read_latency, reads);

        let per_unit: Vec<f64> = records
            .iter()
            .filter(|r| r.writes > 0)
            .map(|r| average_latency_ns(r.write_latency_ns, r.writes))
            .collect();

        TargetSummary {
            device: device.to_string(),
            avg_write_latency_ns: avg_write,
            avg_read_latency_ns: avg_read,
            write_bandwidth_mib_s: bandwidth_mib_s(self.block_size, avg_write, self.workers),
            read_bandwidth_mib_s: bandwidth_mib_s(self.block_size, avg_read, self.workers),
            min_write_latency_ns: per_unit.iter().copied().reduce(f64::min).unwrap_or(0.0),
            max_write_latency_ns: per_unit.iter().copied().reduce(f64::max).unwrap_or(0.0),
            writes,
            reads,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(target: u64, worker: u64, latency: u64, writes: u64) -> ResultRecord {
        ResultRecord {
            target_index: target,
            worker_index: worker,
            write_latency_ns: latency,
            writes,
            ..Default::default()
        }
    }

    #[test]
    fn test_zero_writes_average_is_zero() {
        assert_eq!(average_latency_ns(12345, 0), 0.0);
        assert_eq!(bandwidth_mib_s(4096, 0.0, 4), 0.0);
    }

    #[test]
    fn test_bandwidth_formula() {
        // L = 8ms over N = 1000 writes of 4 KiB by W = 2 workers
        let avg = average_latency_ns(8_000_000, 1000);
        assert_eq!(avg, 8000.0);
        let expected = (4096.0 / 8000.0) * 1e9 * 2.0 / (1024.0 * 1024.0);
        assert!((bandwidth_mib_s(4096, avg, 2) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_target_summary() {
        let mut aggregator = StatisticsAggregator::new(4096, 2, vec!["a".into()]);
        aggregator.add_record(record(0, 0, 1_000, 10));
        aggregator.add_record(record(0, 1, 3_000, 10));

        let summary = &aggregator.target_summaries()[0];
        assert_eq!(summary.writes, 20);
        assert_eq!(summary.avg_write_latency_ns, 200.0);
        assert_eq!(summary.min_write_latency_ns, 100.0);
        assert_eq!(summary.max_write_latency_ns, 300.0);
        assert_eq!(summary.avg_read_latency_ns, 0.0);
        assert_eq!(summary.read_bandwidth_mib_s, 0.0);
        assert!(summary.write_bandwidth_mib_s > 0.0);
    }

    #[test]
    fn test_min_max_is_per_block_across_passes() {
        // Two units over 10-block partitions; the second ran three passes
        let mut aggregator = StatisticsAggregator::new(4096, 2, vec!["/dev/sdb".to_string()]);
        aggregator.add_record(record(0, 0, 2_000, 10));
        aggregator.add_record(record(0, 1, 6_000, 30));

        let summary = &aggregator.target_summaries()[0];
        assert_eq!(summary.min_write_latency_ns, 200.0);
        assert_eq!(summary.max_write_latency_ns, 200.0);
    }

    #[test]
    fn test_failed_unit_excluded_from_min() {
        let mut aggregator = StatisticsAggregator::new(512, 2, vec!["a".into()]);
        aggregator.add_record(record(0, 0, 500, 5));
        aggregator.add_record(record(0, 1, 0, 0));

        let summary = &aggregator.target_summaries()[0];
        assert_eq!(summary.min_write_latency_ns, 100.0);
        assert_eq!(summary.max_write_latency_ns, 100.0);
    }

    #[test]
    fn test_records_grouped_by_target() {
        let mut aggregator = StatisticsAggregator::new(4096, 1, vec!["a".into(), "b".into()]);
        aggregator.add_record(record(1, 0, 900, 3));
        aggregator.add_record(record(0, 0, 100, 1));
        aggregator.add_record(record(7, 0, 100, 1));

        assert_eq!(aggregator.num_records(), 2);
        let summaries = aggregator.target_summaries();
        assert_eq!(summaries[0].device, "a");
        assert_eq!(summaries[0].avg_write_latency_ns, 100.0);
        assert_eq!(summaries[1].avg_write_latency_ns, 300.0);
    }

    #[test]
    fn test_combine() {
        let mut aggregator = StatisticsAggregator::new(4096, 1, vec!["a".into(), "b".into(), "c".into()]);
        aggregator.add_record(record(0, 0, 1_000, 10));
        aggregator.add_record(record(1, 0, 4_000, 10));

        let summaries = aggregator.target_summaries();
        let combined = StatisticsAggregator::combine(&summaries);

        let bw_sum = summaries[0].write_bandwidth_mib_s + summaries[1].write_bandwidth_mib_s;
        assert!((combined.write_bandwidth_mib_s - bw_sum).abs() < 1e-9);
        assert_eq!(combined.min_write_latency_ns, 100.0);
        assert_eq!(combined.max_write_latency_ns, 400.0);
        // Target "c" recorded nothing and does not drag the mean down
        assert_eq!(combined.avg_write_latency_ns, 250.0);
        assert_eq!(combined.avg_read_latency_ns, 0.0);
    }

    #[test]
    fn test_combine_empty() {
        assert_eq!(StatisticsAggregator::combine(&[]), CombinedSummary::default());
    }
}
