//! Read-only views over the user registry and the activity log.
//!
//! Adapters validate raw upstream rows on the way in. Invalid rows are
//! logged and counted; they never fail the scan. An activity row with a bad
//! date is dropped. A registry row with a bad join timestamp is kept without
//! one, so only the metrics that read the join time skip it.

use growth_core::{
    ActivityRecord, GrowthError, GrowthResult, RawActivityRecord, RawUserRecord, UserRecord,
};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Bulk scan over per-user registration facts.
pub trait UserRegistry: Send + Sync {
    fn scan_users(&self) -> GrowthResult<Vec<UserRecord>>;
}

/// Bulk scan over per-user-per-day activity facts.
pub trait ActivityLog: Send + Sync {
    fn scan_activity(&self) -> GrowthResult<Vec<ActivityRecord>>;
}

/// In-memory registry snapshot.
#[derive(Debug, Clone, Default)]
pub struct UserSnapshot {
    users: Vec<UserRecord>,
}

impl UserSnapshot {
    pub fn new(users: Vec<UserRecord>) -> Self {
        Self { users }
    }

    pub fn from_raw(raw: impl IntoIterator<Item = RawUserRecord>) -> Self {
        Self::new(validate_users(raw))
    }

    pub fn into_records(self) -> Vec<UserRecord> {
        self.users
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl UserRegistry for UserSnapshot {
    fn scan_users(&self) -> GrowthResult<Vec<UserRecord>> {
        Ok(self.users.clone())
    }
}

/// In-memory activity snapshot.
#[derive(Debug, Clone, Default)]
pub struct ActivitySnapshot {
    activity: Vec<ActivityRecord>,
}

impl ActivitySnapshot {
    pub fn new(activity: Vec<ActivityRecord>) -> Self {
        Self { activity }
    }

    pub fn from_raw(raw: impl IntoIterator<Item = RawActivityRecord>) -> Self {
        Self::new(validate_all(raw, RawActivityRecord::validate, "activity"))
    }

    pub fn into_records(self) -> Vec<ActivityRecord> {
        self.activity
    }

    pub fn len(&self) -> usize {
        self.activity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.activity.is_empty()
    }
}

impl ActivityLog for ActivitySnapshot {
    fn scan_activity(&self) -> GrowthResult<Vec<ActivityRecord>> {
        Ok(self.activity.clone())
    }
}

/// Registry stored as newline-delimited JSON `RawUserRecord`s.
#[derive(Debug, Clone)]
pub struct JsonLinesRegistry {
    path: PathBuf,
}

impl JsonLinesRegistry {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl UserRegistry for JsonLinesRegistry {
    fn scan_users(&self) -> GrowthResult<Vec<UserRecord>> {
        let raw: Vec<RawUserRecord> = read_json_lines(&self.path, "users")?;
        Ok(validate_users(raw))
    }
}

/// Activity log stored as newline-delimited JSON `RawActivityRecord`s.
#[derive(Debug, Clone)]
pub struct JsonLinesActivityLog {
    path: PathBuf,
}

impl JsonLinesActivityLog {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ActivityLog for JsonLinesActivityLog {
    fn scan_activity(&self) -> GrowthResult<Vec<ActivityRecord>> {
        let raw: Vec<RawActivityRecord> = read_json_lines(&self.path, "activity")?;
        Ok(validate_all(raw, RawActivityRecord::validate, "activity"))
    }
}

/// Validate raw rows, dropping (and counting) the ones that fail.
pub fn validate_all<R, T>(
    raw: impl IntoIterator<Item = R>,
    validate: impl Fn(R) -> GrowthResult<T>,
    dataset: &'static str,
) -> Vec<T> {
    let mut rejected = 0u64;
    let valid: Vec<T> = raw
        .into_iter()
        .filter_map(|row| match validate(row) {
            Ok(record) => Some(record),
            Err(e) => {
                rejected += 1;
                warn!(dataset, error = %e, "Rejected invalid record");
                None
            }
        })
        .collect();

    count_rejected(dataset, rejected);
    debug!(dataset, valid = valid.len(), rejected, "Validated records");
    valid
}

/// Validate registry rows. Every user is kept; rows whose join timestamp is
/// rejected keep `joined_at = None`.
pub fn validate_users(raw: impl IntoIterator<Item = RawUserRecord>) -> Vec<UserRecord> {
    let mut rejected = 0u64;
    let users: Vec<UserRecord> = raw
        .into_iter()
        .map(|row| {
            let (record, error) = row.validate();
            if let Some(e) = error {
                rejected += 1;
                warn!(dataset = "users", error = %e, "Rejected invalid joined_at");
            }
            record
        })
        .collect();

    count_rejected("users", rejected);
    debug!(dataset = "users", valid = users.len() as u64 - rejected, rejected, "Validated records");
    users
}

fn count_rejected(dataset: &'static str, rejected: u64) {
    if rejected > 0 {
        metrics::counter!("growth.records.rejected", "dataset" => dataset).increment(rejected);
    }
}

/// Read a JSON Lines file. A missing or unreadable file makes the whole
/// dataset unavailable; a single malformed line is only a rejected record.
fn read_json_lines<T: DeserializeOwned>(path: &Path, dataset: &'static str) -> GrowthResult<Vec<T>> {
    let source_name = format!("{dataset} ({})", path.display());
    let file =
        File::open(path).map_err(|e| GrowthError::source_unavailable(source_name.clone(), e))?;

    let mut rows = Vec::new();
    let mut malformed = 0u64;
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| GrowthError::source_unavailable(source_name.clone(), e))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(&line) {
            Ok(row) => rows.push(row),
            Err(e) => {
                malformed += 1;
                warn!(dataset, line = line_no + 1, error = %e, "Skipping malformed line");
            }
        }
    }

    count_rejected(dataset, malformed);
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use growth_core::RawTimestamp;
    use std::io::Write;

    #[test]
    fn test_snapshot_from_raw_keeps_users_with_bad_joined_at() {
        let snapshot = UserSnapshot::from_raw(vec![
            RawUserRecord {
                user: "u1".into(),
                joined_at: Some(RawTimestamp::Seconds(1_341_100_800.0)),
                registered: true,
            },
            RawUserRecord {
                user: "u2".into(),
                joined_at: None,
                registered: true,
            },
            RawUserRecord {
                user: "u3".into(),
                joined_at: Some(RawTimestamp::Seconds(-10.0)),
                registered: true,
            },
        ]);
        let users = snapshot.scan_users().unwrap();
        assert_eq!(users.len(), 3);
        assert!(users[0].joined_at.is_some());
        assert!(users[1].joined_at.is_none());
        assert!(users[2].joined_at.is_none());
    }

    #[test]
    fn test_json_lines_registry() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"user":"u1","joined_at":1341100800,"registered":true}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, "not json at all").unwrap();
        writeln!(file, r#"{{"user":"u2","joined_at":"oops","registered":true}}"#).unwrap();
        writeln!(file, r#"{{"user":"u3","joined_at":1341100800.5}}"#).unwrap();

        let users = JsonLinesRegistry::new(file.path()).scan_users().unwrap();
        let ids: Vec<_> = users.iter().map(|u| u.user.as_str()).collect();
        assert_eq!(ids, vec!["u1", "u2", "u3"]);
        assert!(users[1].joined_at.is_none());
        assert!(!users[2].registered);
    }

    #[test]
    fn test_json_lines_activity() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"user":"u1","date":"2012-08-05"}}"#).unwrap();
        writeln!(file, r#"{{"user":"u1","date":"2012-08-05"}}"#).unwrap();
        writeln!(file, r#"{{"user":"u1"}}"#).unwrap();
        writeln!(file, r#"{{"user":"u1","date":"08/05/2012"}}"#).unwrap();

        let activity = JsonLinesActivityLog::new(file.path()).scan_activity().unwrap();
        assert_eq!(activity.len(), 2);
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let log = JsonLinesActivityLog::new("/nonexistent/activity.jsonl");
        assert!(matches!(
            log.scan_activity(),
            Err(GrowthError::SourceUnavailable { .. })
        ));
    }
}
