//! User-sharded execution. Inputs are split by a stable hash of the user id
//! so every row for a user lands in the same shard; partial month sets are
//! merged by union.

use crate::index::UserIndex;
use crate::metric::{GrowthMetric, MetricInput};
use crate::monthly::MonthlyUsers;
use growth_core::{ActivityRecord, MetricSeries, UserRecord};
use std::num::NonZeroUsize;
use std::thread;
use tracing::debug;

/// FNV-1a over the identifier bytes.
pub fn shard_of(user: &str, shards: usize) -> usize {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let hash = user
        .bytes()
        .fold(OFFSET, |h, b| (h ^ u64::from(b)).wrapping_mul(PRIME));
    (hash % shards.max(1) as u64) as usize
}

/// Per-shard inputs: registry records and activity rows for one slice of users.
#[derive(Debug, Default)]
pub struct Shard {
    pub index: UserIndex,
    pub activity: Vec<ActivityRecord>,
}

pub fn partition(users: &[UserRecord], activity: &[ActivityRecord], shards: usize) -> Vec<Shard> {
    let shards = shards.max(1);
    let mut user_parts: Vec<Vec<&UserRecord>> = vec![Vec::new(); shards];
    for record in users {
        user_parts[shard_of(&record.user, shards)].push(record);
    }
    let mut activity_parts: Vec<Vec<ActivityRecord>> = vec![Vec::new(); shards];
    for row in activity {
        activity_parts[shard_of(&row.user, shards)].push(row.clone());
    }

    user_parts
        .into_iter()
        .zip(activity_parts)
        .map(|(users, activity)| Shard {
            index: UserIndex::build(users),
            activity,
        })
        .collect()
}

/// Activity rows across all shards whose user has no registry entry.
pub fn count_orphans(shards: &[Shard]) -> u64 {
    shards
        .iter()
        .map(|shard| shard.index.count_orphans(&shard.activity))
        .sum()
}

/// Threads used for `shard_count` shards: never more than the machine's
/// available parallelism.
pub fn worker_count(shard_count: usize) -> usize {
    let cpus = thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1);
    shard_count.min(cpus).max(1)
}

/// Run `metric` over every shard and union the results. Shards are split into
/// contiguous runs, one per worker thread.
pub fn compute_sharded(metric: &dyn GrowthMetric, shards: &[Shard]) -> MetricSeries {
    let workers = worker_count(shards.len());
    let per_worker = shards.len().div_ceil(workers).max(1);
    let partials: Vec<MonthlyUsers> = thread::scope(|scope| {
        let handles: Vec<_> = shards
            .chunks(per_worker)
            .map(|chunk| {
                scope.spawn(move || {
                    let mut monthly = MonthlyUsers::new();
                    for shard in chunk {
                        monthly.merge(metric.collect(&MetricInput::new(&shard.index, &shard.activity)));
                    }
                    monthly
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
            .collect()
    });

    let mut merged = MonthlyUsers::new();
    for partial in partials {
        merged.merge(partial);
    }
    debug!(series = %metric.series(), shards = shards.len(), workers, "Merged shard results");
    merged.into_series(metric.series())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engagement::EngagementMetric;
    use crate::registration::RegistrationMetric;
    use crate::retention::RetentionMetric;
    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    fn fixture() -> (Vec<UserRecord>, Vec<ActivityRecord>) {
        let base = Utc.with_ymd_and_hms(2012, 1, 1, 0, 0, 0).unwrap();
        let day0 = NaiveDate::from_ymd_opt(2012, 1, 1).unwrap();
        let mut users = Vec::new();
        let mut activity = Vec::new();
        for i in 0..60i64 {
            let user = format!("user-{i}");
            users.push(UserRecord {
                user: user.clone(),
                joined_at: (i % 11 != 5).then(|| base + Duration::days(i * 3)),
                registered: i % 7 != 0,
            });
            for v in 0..(i % 9) {
                activity.push(ActivityRecord {
                    user: user.clone(),
                    date: day0 + Duration::days(i * 3 + v * 5),
                });
            }
        }
        activity.push(ActivityRecord {
            user: "ghost".into(),
            date: day0,
        });
        (users, activity)
    }

    #[test]
    fn test_shard_of_is_stable_and_bounded() {
        assert_eq!(shard_of("u1", 8), shard_of("u1", 8));
        assert!(shard_of("anything", 5) < 5);
        assert_eq!(shard_of("u1", 0), 0);
    }

    #[test]
    fn test_worker_count_is_bounded() {
        let cpus = thread::available_parallelism().map(NonZeroUsize::get).unwrap_or(1);
        assert_eq!(worker_count(0), 1);
        assert_eq!(worker_count(1), 1);
        assert!(worker_count(100_000) <= cpus);
    }

    #[test]
    fn test_orphans_counted_across_shards() {
        let (users, activity) = fixture();
        let unsharded = UserIndex::build(&users).count_orphans(&activity);
        assert_eq!(unsharded, 1);
        for shards in [1, 4, 16] {
            assert_eq!(count_orphans(&partition(&users, &activity, shards)), unsharded);
        }
    }

    #[test]
    fn test_sharded_matches_unsharded() {
        let (users, activity) = fixture();
        let index = UserIndex::build(&users);
        let input = MetricInput::new(&index, &activity);
        let metrics: Vec<Box<dyn GrowthMetric>> = vec![
            Box::new(RegistrationMetric),
            Box::new(RetentionMetric::default()),
            Box::new(EngagementMetric::default()),
        ];

        for shards in [1, 2, 3, 8, 500] {
            let parts = partition(&users, &activity, shards);
            assert_eq!(parts.len(), shards);
            for metric in &metrics {
                assert_eq!(
                    compute_sharded(metric.as_ref(), &parts),
                    metric.compute(&input),
                    "{} with {shards} shards",
                    metric.series()
                );
            }
        }
    }
}
