//! Redis-backed metrics store.
//! Each partition is a single string key holding the JSON-encoded series, so
//! one `SET` replaces it atomically and a failed `SET` leaves the old value.

use crate::MetricsStore;
use async_trait::async_trait;
use growth_core::{GrowthError, GrowthResult, MetricRow, MetricSeries, SeriesName};
use redis::AsyncCommands;
use tracing::{debug, info, warn};

pub struct RedisMetricsStore {
    client: redis::Client,
    key_prefix: String,
}

impl RedisMetricsStore {
    /// Connect and verify the server answers.
    pub async fn new(url: &str, key_prefix: &str) -> anyhow::Result<Self> {
        info!(url = %url, "Connecting to Redis metrics store");

        let client = redis::Client::open(url)?;

        let mut conn = client.get_multiplexed_async_connection().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!(response = %pong, "Redis connection established");

        Ok(Self {
            client,
            key_prefix: key_prefix.to_string(),
        })
    }

    pub fn partition_key(&self, series: SeriesName) -> String {
        partition_key(&self.key_prefix, series)
    }

    async fn connection(
        &self,
    ) -> redis::RedisResult<redis::aio::MultiplexedConnection> {
        self.client.get_multiplexed_async_connection().await
    }
}

/// `{prefix}:{series}`, e.g. `growth:long term users`.
pub fn partition_key(prefix: &str, series: SeriesName) -> String {
    format!("{prefix}:{series}")
}

#[async_trait]
impl MetricsStore for RedisMetricsStore {
    async fn write_partition(&self, series: SeriesName, rows: Vec<MetricRow>) -> GrowthResult<()> {
        let key = self.partition_key(series);
        let count = rows.len();
        let json = serde_json::to_string(&MetricSeries { name: series, rows })?;

        let result = async {
            let mut conn = self.connection().await?;
            conn.set::<_, _, ()>(&key, &json).await
        }
        .await;

        match result {
            Ok(()) => {
                metrics::counter!("growth.store.writes", "backend" => "redis").increment(1);
                debug!(key = %key, rows = count, "Partition replaced");
                Ok(())
            }
            Err(e) => {
                metrics::counter!("growth.store.write_errors", "backend" => "redis").increment(1);
                warn!(key = %key, error = %e, "Partition write failed");
                Err(GrowthError::StoreWrite {
                    partition: series.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn read_partition(&self, series: SeriesName) -> GrowthResult<MetricSeries> {
        let key = self.partition_key(series);
        let read_error = |e: redis::RedisError| GrowthError::StoreRead {
            partition: series.to_string(),
            reason: e.to_string(),
        };

        let mut conn = self.connection().await.map_err(read_error)?;
        let data: Option<String> = conn.get(&key).await.map_err(read_error)?;

        match data {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => {
                debug!(key = %key, "Partition never written");
                Ok(MetricSeries::empty(series))
            }
        }
    }
}
