//! Long-term users: registered users seen active at least `min_days`
//! calendar days after registering, counted per month of that activity.

use crate::metric::{GrowthMetric, MetricInput};
use crate::monthly::MonthlyUsers;
use growth_core::bucket;
use growth_core::SeriesName;

pub const DEFAULT_RETENTION_MIN_DAYS: i64 = 28;

#[derive(Debug, Clone, Copy)]
pub struct RetentionMetric {
    min_days: i64,
}

impl RetentionMetric {
    pub fn new(min_days: i64) -> Self {
        Self { min_days }
    }

}

impl Default for RetentionMetric {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION_MIN_DAYS)
    }
}

impl GrowthMetric for RetentionMetric {
    fn series(&self) -> SeriesName {
        SeriesName::LongTermUsers
    }

    fn collect(&self, input: &MetricInput<'_>) -> MonthlyUsers {
        // Each (user, month) pair lands in one set entry no matter how many
        // qualifying days the user has in that month.
        let mut monthly = MonthlyUsers::new();
        for (user, row) in input.users.join_registered(input.activity) {
            let Some(joined_at) = &user.joined_at else {
                continue;
            };
            if bucket::days_since(joined_at, row.date) >= self.min_days {
                monthly.insert(bucket::month_of_date(row.date), &user.user);
            }
        }
        monthly
    }
}
