//! Month to distinct-user-set accumulator shared by all metrics.

use growth_core::{MetricSeries, MonthLabel, SeriesName};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonthlyUsers {
    months: BTreeMap<MonthLabel, HashSet<String>>,
}

impl MonthlyUsers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the user was already counted for that month.
    pub fn insert(&mut self, month: MonthLabel, user: &str) -> bool {
        let users = self.months.entry(month).or_default();
        if users.contains(user) {
            return false;
        }
        users.insert(user.to_string())
    }

    /// Set union per month. Adding per-shard counts instead would double
    /// count users present in more than one part.
    pub fn merge(&mut self, other: MonthlyUsers) {
        for (month, users) in other.months {
            self.months.entry(month).or_default().extend(users);
        }
    }

    pub fn distinct_users(&self, month: &MonthLabel) -> u64 {
        self.months.get(month).map_or(0, |users| users.len() as u64)
    }

    pub fn is_empty(&self) -> bool {
        self.months.values().all(HashSet::is_empty)
    }

    pub fn into_series(self, name: SeriesName) -> MetricSeries {
        let counts = self
            .months
            .into_iter()
            .map(|(month, users)| (month, users.len() as u64))
            .collect();
        MetricSeries::from_monthly_counts(name, counts)
    }
}
