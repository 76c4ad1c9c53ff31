//! In-process metrics store backed by DashMap.
//! A write swaps one `Arc` per partition, so readers only ever observe a
//! complete series.

use crate::MetricsStore;
use async_trait::async_trait;
use dashmap::DashMap;
use growth_core::{GrowthResult, MetricRow, MetricSeries, SeriesName};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default)]
pub struct MemoryMetricsStore {
    partitions: DashMap<SeriesName, Arc<MetricSeries>>,
}

impl MemoryMetricsStore {
    pub fn new() -> Self {
        Self {
            partitions: DashMap::with_capacity(SeriesName::ALL.len()),
        }
    }

    /// Names of partitions that have been written, in series order.
    pub fn partitions(&self) -> Vec<SeriesName> {
        let mut names: Vec<_> = self.partitions.iter().map(|p| *p.key()).collect();
        names.sort();
        names
    }

    pub fn snapshot(&self, series: SeriesName) -> Option<Arc<MetricSeries>> {
        self.partitions.get(&series).map(|p| Arc::clone(p.value()))
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }
}

#[async_trait]
impl MetricsStore for MemoryMetricsStore {
    async fn write_partition(&self, series: SeriesName, rows: Vec<MetricRow>) -> GrowthResult<()> {
        let count = rows.len();
        self.partitions
            .insert(series, Arc::new(MetricSeries { name: series, rows }));
        metrics::counter!("growth.store.writes", "backend" => "memory").increment(1);
        debug!(series = %series, rows = count, "Partition replaced");
        Ok(())
    }

    async fn read_partition(&self, series: SeriesName) -> GrowthResult<MetricSeries> {
        Ok(self
            .snapshot(series)
            .map(|p| p.as_ref().clone())
            .unwrap_or_else(|| MetricSeries::empty(series)))
    }
}
