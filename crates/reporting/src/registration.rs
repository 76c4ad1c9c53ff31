//! Registrations: distinct registered users per month of joining. Users
//! without a valid join timestamp are skipped.

use crate::metric::{GrowthMetric, MetricInput};
use crate::monthly::MonthlyUsers;
use growth_core::bucket;
use growth_core::SeriesName;

#[derive(Debug, Clone, Copy, Default)]
pub struct RegistrationMetric;

impl GrowthMetric for RegistrationMetric {
    fn series(&self) -> SeriesName {
        SeriesName::Registrations
    }

    fn needs_activity(&self) -> bool {
        false
    }

    fn collect(&self, input: &MetricInput<'_>) -> MonthlyUsers {
        let mut monthly = MonthlyUsers::new();
        for record in input.users.records().filter(|r| r.registered) {
            if let Some(joined_at) = &record.joined_at {
                monthly.insert(bucket::month_of_datetime(joined_at), &record.user);
            }
        }
        monthly
    }
}
