//! Metric pipeline: scan both datasets, compute the three series
//! independently and publish each one into its own store partition.

use crate::engagement::EngagementMetric;
use crate::index::UserIndex;
use crate::metric::{GrowthMetric, MetricInput};
use crate::registration::RegistrationMetric;
use crate::retention::RetentionMetric;
use crate::shard;
use crate::source::{ActivityLog, UserRegistry};
use growth_core::config::MetricsConfig;
use growth_core::{
    ActivityRecord, GrowthError, GrowthResult, MetricSeries, SeriesName, UserRecord,
};
use growth_store::MetricsStore;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Outcome of one run: a series for every metric that completed and the
/// reason for every metric that did not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GrowthReport {
    pub series: BTreeMap<SeriesName, MetricSeries>,
    pub failures: BTreeMap<SeriesName, String>,
}

impl GrowthReport {
    pub fn get(&self, name: SeriesName) -> Option<&MetricSeries> {
        self.series.get(&name)
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, name: SeriesName, result: GrowthResult<MetricSeries>) {
        match result {
            Ok(series) => {
                self.series.insert(name, series);
            }
            Err(e) => {
                self.failures.insert(name, e.to_string());
            }
        }
    }
}

/// Per-partition result of a publish.
#[derive(Debug, Clone, Default, Serialize)]
pub struct JobSummary {
    pub written: Vec<SeriesName>,
    pub failed: BTreeMap<SeriesName, String>,
}

impl JobSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct MetricsPipeline {
    metrics: Vec<Arc<dyn GrowthMetric>>,
    shards: usize,
}

impl MetricsPipeline {
    pub fn new(config: &MetricsConfig) -> Self {
        Self {
            metrics: vec![
                Arc::new(RegistrationMetric),
                Arc::new(RetentionMetric::new(config.retention_min_days)),
                Arc::new(EngagementMetric::new(config.engagement_min_visits)),
            ],
            shards: config.shards.max(1),
        }
    }

    /// Compute every metric from already scanned datasets. A failed activity
    /// scan only fails the metrics that join against activity.
    pub fn compute_from(
        &self,
        users: &GrowthResult<Vec<UserRecord>>,
        activity: &GrowthResult<Vec<ActivityRecord>>,
    ) -> GrowthReport {
        let mut report = GrowthReport::default();
        for metric in &self.metrics {
            report.record(metric.series(), self.compute_one(metric.as_ref(), users, activity));
        }
        report
    }

    /// Scan both datasets once and compute all three series.
    pub fn compute_all(&self, registry: &dyn UserRegistry, log: &dyn ActivityLog) -> GrowthReport {
        let users = registry.scan_users();
        let activity = log.scan_activity();
        log_scan("users", &users);
        log_scan("activity", &activity);
        self.compute_from(&users, &activity)
    }

    fn compute_one(
        &self,
        metric: &dyn GrowthMetric,
        users: &GrowthResult<Vec<UserRecord>>,
        activity: &GrowthResult<Vec<ActivityRecord>>,
    ) -> GrowthResult<MetricSeries> {
        let users = users.as_ref().map_err(|e| upstream_failure("users", e))?;
        let activity: &[ActivityRecord] = if metric.needs_activity() {
            activity
                .as_ref()
                .map_err(|e| upstream_failure("activity", e))?
        } else {
            &[]
        };

        let series = if self.shards > 1 {
            let shards = shard::partition(users, activity, self.shards);
            if metric.needs_activity() {
                report_orphans(shard::count_orphans(&shards));
            }
            shard::compute_sharded(metric, &shards)
        } else {
            let index = UserIndex::build(users);
            if metric.needs_activity() {
                report_orphans(index.count_orphans(activity));
            }
            metric.compute(&MetricInput::new(&index, activity))
        };

        debug!(series = %series.name, months = series.rows.len(), "Metric computed");
        Ok(series)
    }

    /// Compute each metric on the blocking pool and write its partition as
    /// soon as it is ready. One metric failing, or one write failing, does
    /// not stop the others.
    pub async fn run(
        self: Arc<Self>,
        users: GrowthResult<Vec<UserRecord>>,
        activity: GrowthResult<Vec<ActivityRecord>>,
        store: Arc<dyn MetricsStore>,
    ) -> JobSummary {
        log_scan("users", &users);
        log_scan("activity", &activity);
        let users = Arc::new(users);
        let activity = Arc::new(activity);

        let mut handles = Vec::with_capacity(self.metrics.len());
        for metric in self.metrics.clone() {
            let pipeline = self.clone();
            let users = users.clone();
            let activity = activity.clone();
            let store = store.clone();
            let name = metric.series();
            handles.push((
                name,
                tokio::spawn(async move {
                    let series = tokio::task::spawn_blocking(move || {
                        pipeline.compute_one(metric.as_ref(), &users, &activity)
                    })
                    .await
                    .map_err(|e| GrowthError::Internal(e.into()))??;
                    store.write_partition(series.name, series.rows).await
                }),
            ));
        }

        let mut summary = JobSummary::default();
        for (name, handle) in handles {
            let result = handle
                .await
                .map_err(|e| GrowthError::Internal(e.into()))
                .and_then(|r| r);
            match result {
                Ok(()) => {
                    info!(series = %name, "Partition published");
                    summary.written.push(name);
                }
                Err(e) => {
                    error!(series = %name, error = %e, "Metric not published");
                    summary.failed.insert(name, e.to_string());
                }
            }
        }
        summary
    }
}

impl Default for MetricsPipeline {
    fn default() -> Self {
        Self::new(&MetricsConfig::default())
    }
}

/// Compute all three series with default thresholds.
pub fn compute_all_metrics(registry: &dyn UserRegistry, log: &dyn ActivityLog) -> GrowthReport {
    MetricsPipeline::default().compute_all(registry, log)
}

/// Write every computed series of a report into the store. Series that failed
/// to compute are left untouched in the store.
pub async fn publish(report: &GrowthReport, store: &dyn MetricsStore) -> JobSummary {
    let mut summary = JobSummary::default();
    for (name, failure) in &report.failures {
        summary.failed.insert(*name, failure.clone());
    }
    for (name, series) in &report.series {
        match store.write_partition(*name, series.rows.clone()).await {
            Ok(()) => summary.written.push(*name),
            Err(e) => {
                error!(series = %name, error = %e, "Partition write failed");
                summary.failed.insert(*name, e.to_string());
            }
        }
    }
    summary
}

/// Failure of a metric whose input dataset could not be scanned. A scan that
/// already reported the source as unavailable is passed on as is.
fn upstream_failure(dataset: &str, e: &GrowthError) -> GrowthError {
    match e {
        GrowthError::SourceUnavailable {
            source_name,
            reason,
        } => GrowthError::source_unavailable(source_name.clone(), reason),
        other => GrowthError::source_unavailable(dataset, other),
    }
}

fn report_orphans(orphans: u64) {
    if orphans > 0 {
        metrics::counter!("growth.activity.orphaned").increment(orphans);
        debug!(orphans, "Activity rows without a registry entry skipped");
    }
}

fn log_scan<T>(dataset: &str, result: &GrowthResult<Vec<T>>) {
    match result {
        Ok(rows) => info!(dataset, rows = rows.len(), "Dataset scanned"),
        Err(e) => warn!(dataset, error = %e, "Dataset unavailable"),
    }
}
