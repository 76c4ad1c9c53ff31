//! Common shape of a growth metric computation.

use crate::index::UserIndex;
use crate::monthly::MonthlyUsers;
use growth_core::{ActivityRecord, MetricSeries, SeriesName};

/// Immutable inputs a metric reads from.
#[derive(Debug, Clone, Copy)]
pub struct MetricInput<'a> {
    pub users: &'a UserIndex,
    pub activity: &'a [ActivityRecord],
}

impl<'a> MetricInput<'a> {
    pub fn new(users: &'a UserIndex, activity: &'a [ActivityRecord]) -> Self {
        Self { users, activity }
    }
}

/// A pure computation from registry and activity snapshots to the set of
/// qualifying users per month.
pub trait GrowthMetric: Send + Sync {
    fn series(&self) -> SeriesName;

    /// Whether the metric joins against the activity log.
    fn needs_activity(&self) -> bool {
        true
    }

    fn collect(&self, input: &MetricInput<'_>) -> MonthlyUsers;

    fn compute(&self, input: &MetricInput<'_>) -> MetricSeries {
        self.collect(input).into_series(self.series())
    }
}
