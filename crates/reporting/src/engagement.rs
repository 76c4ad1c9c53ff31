//! Highly engaged users: registered users with at least `min_visits`
//! activity rows within a single month.

use crate::metric::{GrowthMetric, MetricInput};
use crate::monthly::MonthlyUsers;
use growth_core::bucket;
use growth_core::{MonthLabel, SeriesName};
use std::collections::HashMap;

pub const DEFAULT_ENGAGEMENT_MIN_VISITS: u64 = 4;

#[derive(Debug, Clone, Copy)]
pub struct EngagementMetric {
    min_visits: u64,
}

impl EngagementMetric {
    pub fn new(min_visits: u64) -> Self {
        Self { min_visits }
    }

}

impl Default for EngagementMetric {
    fn default() -> Self {
        Self::new(DEFAULT_ENGAGEMENT_MIN_VISITS)
    }
}

impl GrowthMetric for EngagementMetric {
    fn series(&self) -> SeriesName {
        SeriesName::HighlyEngagedUsers
    }

    fn collect(&self, input: &MetricInput<'_>) -> MonthlyUsers {
        // Repeated rows for the same day are separate visits.
        let mut visits: HashMap<(&str, MonthLabel), u64> = HashMap::new();
        for (user, row) in input.users.join_registered(input.activity) {
            *visits
                .entry((user.user.as_str(), bucket::month_of_date(row.date)))
                .or_insert(0) += 1;
        }

        let mut monthly = MonthlyUsers::new();
        for ((user, month), count) in visits {
            if count >= self.min_visits {
                monthly.insert(month, user);
            }
        }
        monthly
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::UserIndex;
    use chrono::{NaiveDate, TimeZone, Utc};
    use growth_core::{ActivityRecord, UserRecord};

    fn registered(id: &str) -> UserRecord {
        UserRecord {
            user: id.into(),
            joined_at: Some(Utc.with_ymd_and_hms(2012, 7, 1, 0, 0, 0).unwrap()),
            registered: true,
        }
    }

    fn visits(id: &str, month: u32, days: &[u32]) -> Vec<ActivityRecord> {
        days.iter()
            .map(|d| ActivityRecord {
                user: id.into(),
                date: NaiveDate::from_ymd_opt(2012, month, *d).unwrap(),
            })
            .collect()
    }

    #[test]
    fn test_four_visits_qualify_three_do_not() {
        let records = vec![registered("four"), registered("three")];
        let index = UserIndex::build(&records);
        let mut activity = visits("four", 8, &[1, 2, 3, 4]);
        activity.extend(visits("three", 8, &[1, 2, 3]));
        let series = EngagementMetric::default().compute(&MetricInput::new(&index, &activity));
        assert_eq!(series.pairs(), vec![("2012-08".to_string(), 1)]);
    }

    #[test]
    fn test_duplicate_day_rows_count_toward_threshold() {
        let records = vec![registered("u1")];
        let index = UserIndex::build(&records);
        let activity = visits("u1", 8, &[5, 5, 5, 5]);
        let series = EngagementMetric::default().compute(&MetricInput::new(&index, &activity));
        assert_eq!(series.pairs(), vec![("2012-08".to_string(), 1)]);
    }

    #[test]
    fn test_threshold_is_per_month() {
        let records = vec![registered("u1")];
        let index = UserIndex::build(&records);
        let mut activity = visits("u1", 1, &[10, 11]);
        activity.extend(visits("u1", 2, &[1, 2, 3]));
        let series = EngagementMetric::default().compute(&MetricInput::new(&index, &activity));
        assert!(series.is_empty());
    }

    #[test]
    fn test_missing_joined_at_still_engaged() {
        let mut user = registered("u1");
        user.joined_at = None;
        let records = vec![user];
        let index = UserIndex::build(&records);
        let activity = visits("u1", 8, &[5, 6, 7, 8]);
        let series = EngagementMetric::default().compute(&MetricInput::new(&index, &activity));
        assert_eq!(series.pairs(), vec![("2012-08".to_string(), 1)]);
    }

    #[test]
    fn test_unregistered_heavy_user_excluded() {
        let mut user = registered("u2");
        user.registered = false;
        let records = vec![user];
        let index = UserIndex::build(&records);
        let activity = visits("u2", 8, &[1, 2, 3, 4, 5, 6, 7, 8]);
        let series = EngagementMetric::default().compute(&MetricInput::new(&index, &activity));
        assert!(series.is_empty());
    }
}
