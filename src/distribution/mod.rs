//! Block address generation
//!
//! A unit touches the blocks of its partition either in order or drawn uniformly
//! (with replacement) from the partition. The whole address list for a pass is
//! produced before the timed loop starts so generation cost never lands inside a
//! latency measurement.
//!
//! # Example
//!
//! ```
//! use iob::distribution::{generate_addresses, AccessPattern, Partition};
//!
//! let partition = Partition::new(5, 9);
//! let blocks = generate_addresses(partition, AccessPattern::Sequential);
//! assert_eq!(blocks, vec![5, 6, 7, 8, 9]);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Contiguous, inclusive block range owned by one (target, worker) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub start_block: u64,
    pub end_block: u64,
}

impl Partition {
    pub fn new(start_block: u64, end_block: u64) -> Self {
        Self {
            start_block,
            end_block,
        }
    }

    /// Number of blocks in the partition (0 when `end < start`)
    pub fn blocks(&self) -> u64 {
        if self.end_block < self.start_block {
            0
        } else {
            self.end_block - self.start_block + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks() == 0
    }

    pub fn contains(&self, block: u64) -> bool {
        block >= self.start_block && block <= self.end_block
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start_block, self.end_block)
    }
}

/// Order in which a unit visits its partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessPattern {
    #[default]
    Sequential,
    Random,
}

impl fmt::Display for AccessPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessPattern::Sequential => write!(f, "sequential"),
            AccessPattern::Random => write!(f, "random"),
        }
    }
}

/// Source of block indices within a fixed partition
///
/// Each unit owns its distribution outright; nothing here is shared or global.
pub trait Distribution: Send {
    /// Next block index; always inside the partition the distribution was built for
    fn next_block(&mut self) -> u64;
}

/// Build the distribution for a partition and access pattern
pub fn create_distribution(partition: Partition, pattern: AccessPattern) -> Box<dyn Distribution> {
    match pattern {
        AccessPattern::Sequential => Box::new(sequential::SequentialDistribution::new(partition)),
        AccessPattern::Random => Box::new(uniform::RandomRangeState::new(
            partition.start_block,
            partition.end_block,
        )),
    }
}

/// Produce exactly `partition.blocks()` addresses from `dist`
pub fn generate_with(partition: Partition, dist: &mut dyn Distribution) -> Vec<u64> {
    let count = partition.blocks() as usize;
    let mut blocks = Vec::with_capacity(count);
    for _ in 0..count {
        blocks.push(dist.next_block());
    }
    blocks
}

/// Pre-compute one pass worth of addresses for a partition
pub fn generate_addresses(partition: Partition, pattern: AccessPattern) -> Vec<u64> {
    let mut dist = create_distribution(partition, pattern);
    generate_with(partition, dist.as_mut())
}

pub mod sequential;
pub mod uniform;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_blocks() {
        assert_eq!(Partition::new(0, 9).blocks(), 10);
        assert_eq!(Partition::new(5, 5).blocks(), 1);
        assert!(Partition::new(6, 5).is_empty());
    }

    #[test]
    fn test_sequential_partition_5_to_9() {
        let blocks = generate_addresses(Partition::new(5, 9), AccessPattern::Sequential);
        assert_eq!(blocks, vec![5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_sequential_generation_is_idempotent() {
        let partition = Partition::new(100, 163);
        let first = generate_addresses(partition, AccessPattern::Sequential);
        let second = generate_addresses(partition, AccessPattern::Sequential);
        assert_eq!(first, second);
    }

    #[test]
    fn test_random_generation_count_and_range() {
        let partition = Partition::new(1000, 1999);
        let blocks = generate_addresses(partition, AccessPattern::Random);
        assert_eq!(blocks.len(), 1000);
        assert!(blocks.iter().all(|&b| partition.contains(b)));
    }

    #[test]
    fn test_empty_partition_generates_nothing() {
        let blocks = generate_addresses(Partition::new(10, 9), AccessPattern::Random);
        assert!(blocks.is_empty());
    }
}
