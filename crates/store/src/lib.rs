#![warn(clippy::unwrap_used)]

//! Partitioned metrics sink. Each metric series is one partition that is
//! always replaced as a whole.

pub mod memory;
pub mod redis_store;

pub use memory::MemoryMetricsStore;
pub use redis_store::RedisMetricsStore;

use async_trait::async_trait;
use growth_core::{GrowthResult, MetricRow, MetricSeries, SeriesName};

#[async_trait]
pub trait MetricsStore: Send + Sync {
    /// Replace the partition for `series` with `rows`. On error the previous
    /// contents stay in place.
    async fn write_partition(&self, series: SeriesName, rows: Vec<MetricRow>) -> GrowthResult<()>;

    /// Current contents of the partition, or an empty series if it was never
    /// written.
    async fn read_partition(&self, series: SeriesName) -> GrowthResult<MetricSeries>;
}
