//! Result collection and reduction
//!
//! Units record their counters into the shared [`store::ResultStore`]; once every
//! unit has stopped the orchestrator reduces the store with
//! [`aggregator::StatisticsAggregator`].

pub mod aggregator;
pub mod store;

pub use aggregator::{CombinedSummary, StatisticsAggregator, TargetSummary};
pub use store::{ResultRecord, ResultSlot, ResultStore};
