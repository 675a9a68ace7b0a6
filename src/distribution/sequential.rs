//! Sequential block generation
//!
//! Yields `start, start + 1, ..., end`. Callers draw exactly one pass,
//! `partition.blocks()` values.

use super::{Distribution, Partition};

/// Sequential block generator over one partition
#[derive(Debug)]
pub struct SequentialDistribution {
    partition: Partition,
    /// Offset of the next block from `partition.start_block`
    next: u64,
}

impl SequentialDistribution {
    pub fn new(partition: Partition) -> Self {
        Self { partition, next: 0 }
    }
}

impl Distribution for SequentialDistribution {
    fn next_block(&mut self) -> u64 {
        let block = self.partition.start_block + self.next;
        self.next += 1;
        block
    }
}
