//! ClickHouse-backed registry and activity scans.
//! Rows are read in bulk and validated into in-memory snapshots so the metric
//! computations never touch the database.

use clickhouse::Row;
use growth_core::config::ClickHouseConfig;
use growth_core::{GrowthError, GrowthResult, RawActivityRecord, RawTimestamp, RawUserRecord};
use growth_reporting::{ActivitySnapshot, UserSnapshot};
use serde::Deserialize;
use std::time::Instant;
use tracing::{debug, info};

#[derive(Debug, Row, Deserialize)]
struct UserRow {
    user: String,
    joined_at: Option<f64>,
    registered: u8,
}

#[derive(Debug, Row, Deserialize)]
struct ActivityRow {
    user: String,
    date: Option<String>,
}

pub struct ClickHouseSource {
    client: clickhouse::Client,
    users_table: String,
    activity_table: String,
}

impl ClickHouseSource {
    pub fn new(config: &ClickHouseConfig) -> GrowthResult<Self> {
        for table in [&config.users_table, &config.activity_table] {
            if !is_identifier(table) {
                return Err(GrowthError::Config(format!(
                    "invalid ClickHouse table name '{table}'"
                )));
            }
        }

        let client = clickhouse::Client::default()
            .with_url(&config.url)
            .with_database(&config.database);

        info!(url = %config.url, database = %config.database, "ClickHouse source configured");

        Ok(Self {
            client,
            users_table: config.users_table.clone(),
            activity_table: config.activity_table.clone(),
        })
    }

    /// Create the source tables if they don't exist.
    pub async fn ensure_schema(&self) -> GrowthResult<()> {
        let users = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                user String,
                joined_at Nullable(Float64),
                registered UInt8
            ) ENGINE = MergeTree()
            ORDER BY user",
            self.users_table
        );
        let activity = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                user String,
                date Nullable(Date)
            ) ENGINE = MergeTree()
            ORDER BY user",
            self.activity_table
        );

        for ddl in [users, activity] {
            self.client
                .query(&ddl)
                .execute()
                .await
                .map_err(|e| GrowthError::source_unavailable("clickhouse", e))?;
        }
        info!("ClickHouse schema verified");
        Ok(())
    }

    /// Scan the users table. Invalid rows are dropped during validation.
    pub async fn load_users(&self) -> GrowthResult<UserSnapshot> {
        let started = Instant::now();
        let sql = format!(
            "SELECT user, toNullable(toFloat64(joined_at)) AS joined_at, \
             toUInt8(registered) AS registered FROM {}",
            self.users_table
        );
        let rows = self
            .client
            .query(&sql)
            .fetch_all::<UserRow>()
            .await
            .map_err(|e| GrowthError::source_unavailable(self.users_table.clone(), e))?;

        debug!(
            table = %self.users_table,
            rows = rows.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Users scanned"
        );
        metrics::counter!("growth.source.rows", "table" => self.users_table.clone())
            .increment(rows.len() as u64);

        Ok(UserSnapshot::from_raw(rows.into_iter().map(|row| {
            RawUserRecord {
                user: row.user,
                joined_at: row.joined_at.map(RawTimestamp::Seconds),
                registered: row.registered != 0,
            }
        })))
    }

    /// Scan the activity table; dates travel as `YYYY-MM-DD` text.
    pub async fn load_activity(&self) -> GrowthResult<ActivitySnapshot> {
        let started = Instant::now();
        let sql = format!(
            "SELECT user, toNullable(toString(date)) AS date FROM {}",
            self.activity_table
        );
        let rows = self
            .client
            .query(&sql)
            .fetch_all::<ActivityRow>()
            .await
            .map_err(|e| GrowthError::source_unavailable(self.activity_table.clone(), e))?;

        debug!(
            table = %self.activity_table,
            rows = rows.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Activity scanned"
        );
        metrics::counter!("growth.source.rows", "table" => self.activity_table.clone())
            .increment(rows.len() as u64);

        Ok(ActivitySnapshot::from_raw(rows.into_iter().map(|row| {
            RawActivityRecord {
                user: row.user,
                date: row.date,
            }
        })))
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`, optionally qualified as `db.table`.
fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use growth_reporting::{ActivityLog, UserRegistry};

    #[test]
    fn test_identifier_check() {
        assert!(is_identifier("users"));
        assert!(is_identifier("growth.user_activity"));
        assert!(!is_identifier("users; DROP TABLE x"));
        assert!(!is_identifier("1users"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn test_rejects_bad_table_name() {
        let config = ClickHouseConfig {
            users_table: "users--".into(),
            ..ClickHouseConfig::default()
        };
        assert!(matches!(
            ClickHouseSource::new(&config),
            Err(GrowthError::Config(_))
        ));
    }

    #[tokio::test]
    #[ignore = "requires a running ClickHouse at localhost:8123"]
    async fn test_scan_tables() {
        let source = ClickHouseSource::new(&ClickHouseConfig::default()).unwrap();
        source.ensure_schema().await.unwrap();
        let users = source.load_users().await.unwrap();
        let activity = source.load_activity().await.unwrap();
        assert_eq!(users.scan_users().unwrap().len(), users.len());
        assert_eq!(activity.scan_activity().unwrap().len(), activity.len());
    }
}
