//! Hash index from user identifier to the canonical registry record.

use growth_core::{ActivityRecord, UserRecord};
use std::collections::HashMap;

/// One record per user. When the registry holds duplicates, a registered
/// record beats an unregistered one, then a valid `joined_at` beats a missing
/// one, then the earliest `joined_at` wins.
#[derive(Debug, Clone, Default)]
pub struct UserIndex {
    users: HashMap<String, UserRecord>,
}

impl UserIndex {
    pub fn build<'a>(records: impl IntoIterator<Item = &'a UserRecord>) -> Self {
        let mut users: HashMap<String, UserRecord> = HashMap::new();
        for record in records {
            match users.get_mut(&record.user) {
                Some(current) => {
                    if Self::preferred(record, current) {
                        *current = record.clone();
                    }
                }
                None => {
                    users.insert(record.user.clone(), record.clone());
                }
            }
        }
        Self { users }
    }

    fn preferred(candidate: &UserRecord, current: &UserRecord) -> bool {
        match (candidate.registered, current.registered) {
            (true, false) => true,
            (false, true) => false,
            _ => match (candidate.joined_at, current.joined_at) {
                (Some(candidate), Some(current)) => candidate < current,
                (Some(_), None) => true,
                _ => false,
            },
        }
    }

    pub fn get(&self, user: &str) -> Option<&UserRecord> {
        self.users.get(user)
    }

    /// The record for `user` if it exists and is registered.
    pub fn registered(&self, user: &str) -> Option<&UserRecord> {
        self.users.get(user).filter(|record| record.registered)
    }

    pub fn records(&self) -> impl Iterator<Item = &UserRecord> {
        self.users.values()
    }

    /// Activity rows whose user is absent from the registry.
    pub fn count_orphans(&self, activity: &[ActivityRecord]) -> u64 {
        activity
            .iter()
            .filter(|row| !self.users.contains_key(&row.user))
            .count() as u64
    }

    /// Inner join of activity against registered users.
    pub fn join_registered<'a>(
        &'a self,
        activity: &'a [ActivityRecord],
    ) -> impl Iterator<Item = (&'a UserRecord, &'a ActivityRecord)> + 'a {
        activity
            .iter()
            .filter_map(move |row| self.registered(&row.user).map(|user| (user, row)))
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn user(id: &str, day: u32, registered: bool) -> UserRecord {
        UserRecord {
            user: id.into(),
            joined_at: Some(Utc.with_ymd_and_hms(2012, 7, day, 0, 0, 0).unwrap()),
            registered,
        }
    }

    #[test]
    fn test_duplicates_resolve_to_one_record() {
        let records = vec![
            user("u1", 20, false),
            user("u1", 15, true),
            user("u1", 10, true),
            user("u2", 1, false),
        ];
        let index = UserIndex::build(&records);
        assert_eq!(index.len(), 2);
        assert_eq!(index.get("u1").unwrap(), &records[2]);
        assert!(index.registered("u2").is_none());
        assert!(index.get("u2").is_some());
    }

    #[test]
    fn test_valid_joined_at_preferred_over_missing() {
        let mut unknown = user("u1", 1, true);
        unknown.joined_at = None;
        let records = vec![unknown, user("u1", 20, true)];
        let index = UserIndex::build(&records);
        assert_eq!(index.get("u1").unwrap(), &records[1]);
    }

    #[test]
    fn test_join_skips_orphans_and_unregistered() {
        let records = vec![user("u1", 1, true), user("u2", 1, false)];
        let index = UserIndex::build(&records);
        let date = NaiveDate::from_ymd_opt(2012, 8, 1).unwrap();
        let activity: Vec<ActivityRecord> = ["u1", "u2", "ghost", "u1"]
            .iter()
            .map(|id| ActivityRecord {
                user: id.to_string(),
                date,
            })
            .collect();

        assert_eq!(index.join_registered(&activity).count(), 2);
        assert_eq!(index.count_orphans(&activity), 1);
    }
}
