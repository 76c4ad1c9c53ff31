use serde::Deserialize;

/// Root application configuration. Loaded from an optional TOML file and
/// environment variables with the prefix `GROWTH_METRICS__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_job_name")]
    pub job_name: String,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub clickhouse: ClickHouseConfig,
}

/// Thresholds and execution strategy for the metric computations.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Minimum calendar days between registration and activity for a
    /// long-term user. Inclusive.
    #[serde(default = "default_retention_min_days")]
    pub retention_min_days: i64,
    /// Minimum activity rows in one month for a highly engaged user.
    /// Inclusive.
    #[serde(default = "default_engagement_min_visits")]
    pub engagement_min_visits: u64,
    /// Number of user shards to compute on; 1 disables sharding.
    #[serde(default = "default_shards")]
    pub shards: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputSource {
    Files,
    ClickHouse,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    #[serde(default = "default_input_source")]
    pub source: InputSource,
    #[serde(default = "default_users_path")]
    pub users_path: String,
    #[serde(default = "default_activity_path")]
    pub activity_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Redis,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_backend")]
    pub backend: StoreBackend,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClickHouseConfig {
    #[serde(default = "default_clickhouse_url")]
    pub url: String,
    #[serde(default = "default_clickhouse_db")]
    pub database: String,
    #[serde(default = "default_users_table")]
    pub users_table: String,
    #[serde(default = "default_activity_table")]
    pub activity_table: String,
}

// Default functions
fn default_job_name() -> String {
    "growth-metrics".to_string()
}
fn default_retention_min_days() -> i64 {
    28
}
fn default_engagement_min_visits() -> u64 {
    4
}
fn default_shards() -> usize {
    1
}
fn default_input_source() -> InputSource {
    InputSource::Files
}
fn default_users_path() -> String {
    "data/users.jsonl".to_string()
}
fn default_activity_path() -> String {
    "data/activity.jsonl".to_string()
}
fn default_store_backend() -> StoreBackend {
    StoreBackend::Memory
}
fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}
fn default_key_prefix() -> String {
    "growth".to_string()
}
fn default_clickhouse_url() -> String {
    "http://localhost:8123".to_string()
}
fn default_clickhouse_db() -> String {
    "growth".to_string()
}
fn default_users_table() -> String {
    "users".to_string()
}
fn default_activity_table() -> String {
    "user_activity".to_string()
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            retention_min_days: default_retention_min_days(),
            engagement_min_visits: default_engagement_min_visits(),
            shards: default_shards(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            source: default_input_source(),
            users_path: default_users_path(),
            activity_path: default_activity_path(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            redis_url: default_redis_url(),
            key_prefix: default_key_prefix(),
        }
    }
}

impl Default for ClickHouseConfig {
    fn default() -> Self {
        Self {
            url: default_clickhouse_url(),
            database: default_clickhouse_db(),
            users_table: default_users_table(),
            activity_table: default_activity_table(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            job_name: default_job_name(),
            metrics: MetricsConfig::default(),
            input: InputConfig::default(),
            store: StoreConfig::default(),
            clickhouse: ClickHouseConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from an optional config file and environment
    /// variables. Environment values win over the file.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let file = path.unwrap_or("growth-metrics");
        let builder = config::Config::builder()
            .add_source(config::File::with_name(file).required(path.is_some()))
            .add_source(
                config::Environment::with_prefix("GROWTH_METRICS")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.metrics.retention_min_days, 28);
        assert_eq!(config.metrics.engagement_min_visits, 4);
        assert_eq!(config.metrics.shards, 1);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.input.source, InputSource::Files);
    }

    #[test]
    fn test_partial_deserialize_fills_defaults() {
        let config: AppConfig = serde_json::from_str(
            r#"{"metrics": {"shards": 8}, "store": {"backend": "redis"}}"#,
        )
        .unwrap();
        assert_eq!(config.metrics.shards, 8);
        assert_eq!(config.metrics.retention_min_days, 28);
        assert_eq!(config.store.backend, StoreBackend::Redis);
        assert_eq!(config.store.key_prefix, "growth");
        assert_eq!(config.job_name, "growth-metrics");
    }
}
