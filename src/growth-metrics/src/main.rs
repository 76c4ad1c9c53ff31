//! Growth Metrics: monthly registrations, long-term users and highly
//! engaged users.
//!
//! Batch entry point: loads the registry and activity snapshots, computes
//! the three series and replaces their partitions in the metrics store.

use clap::{Parser, ValueEnum};
use growth_analytics::ClickHouseSource;
use growth_core::config::{AppConfig, InputSource, StoreBackend};
use growth_core::{ActivityRecord, GrowthResult, SeriesName, UserRecord};
use growth_reporting::{
    ActivityLog, JsonLinesActivityLog, JsonLinesRegistry, MetricsPipeline, UserRegistry,
};
use growth_store::{MemoryMetricsStore, MetricsStore, RedisMetricsStore};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SourceArg {
    Files,
    Clickhouse,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StoreArg {
    Memory,
    Redis,
}

#[derive(Parser, Debug)]
#[command(name = "growth-metrics")]
#[command(about = "Compute monthly growth metrics from user registry and activity snapshots")]
#[command(version)]
struct Cli {
    /// Config file (TOML); defaults to ./growth-metrics.toml when present
    #[arg(long, short)]
    config: Option<String>,

    /// Where to read the datasets from (overrides config)
    #[arg(long, value_enum)]
    source: Option<SourceArg>,

    /// User registry JSON Lines file (overrides config)
    #[arg(long, env = "GROWTH_METRICS__INPUT__USERS_PATH")]
    users: Option<String>,

    /// Activity log JSON Lines file (overrides config)
    #[arg(long, env = "GROWTH_METRICS__INPUT__ACTIVITY_PATH")]
    activity: Option<String>,

    /// Metrics store backend (overrides config)
    #[arg(long, value_enum)]
    store: Option<StoreArg>,

    /// Number of user shards (overrides config)
    #[arg(long, env = "GROWTH_METRICS__METRICS__SHARDS")]
    shards: Option<usize>,

    /// Print the stored series as JSON once the run completes
    #[arg(long, default_value_t = false)]
    print: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "growth_metrics=info,growth_reporting=info".into()),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(source) = cli.source {
        config.input.source = match source {
            SourceArg::Files => InputSource::Files,
            SourceArg::Clickhouse => InputSource::ClickHouse,
        };
    }
    if let Some(users) = cli.users {
        config.input.users_path = users;
    }
    if let Some(activity) = cli.activity {
        config.input.activity_path = activity;
    }
    if let Some(store) = cli.store {
        config.store.backend = match store {
            StoreArg::Memory => StoreBackend::Memory,
            StoreArg::Redis => StoreBackend::Redis,
        };
    }
    if let Some(shards) = cli.shards {
        config.metrics.shards = shards;
    }

    let run_id = Uuid::new_v4();
    info!(
        run_id = %run_id,
        job = %config.job_name,
        source = ?config.input.source,
        store = ?config.store.backend,
        shards = config.metrics.shards,
        retention_min_days = config.metrics.retention_min_days,
        engagement_min_visits = config.metrics.engagement_min_visits,
        "Configuration loaded"
    );

    let (users, activity) = load_datasets(&config).await;

    let store: Arc<dyn MetricsStore> = match config.store.backend {
        StoreBackend::Memory => Arc::new(MemoryMetricsStore::new()),
        StoreBackend::Redis => Arc::new(
            RedisMetricsStore::new(&config.store.redis_url, &config.store.key_prefix).await?,
        ),
    };

    let pipeline = Arc::new(MetricsPipeline::new(&config.metrics));
    let summary = pipeline.run(users, activity, store.clone()).await;

    if cli.print {
        let mut out = serde_json::Map::new();
        for name in SeriesName::ALL {
            let series = store.read_partition(name).await?;
            out.insert(name.to_string(), serde_json::to_value(&series.rows)?);
        }
        println!("{}", serde_json::to_string_pretty(&out)?);
    }

    if !summary.is_success() {
        anyhow::bail!(
            "run {run_id}: {} of {} series failed: {:?}",
            summary.failed.len(),
            SeriesName::ALL.len(),
            summary.failed
        );
    }

    info!(run_id = %run_id, written = summary.written.len(), "Growth metrics published");
    Ok(())
}

/// Scan both datasets. Each side fails on its own so the registry can still
/// feed registrations when the activity log is unavailable.
async fn load_datasets(
    config: &AppConfig,
) -> (GrowthResult<Vec<UserRecord>>, GrowthResult<Vec<ActivityRecord>>) {
    match config.input.source {
        InputSource::Files => {
            let registry = JsonLinesRegistry::new(&config.input.users_path);
            let log = JsonLinesActivityLog::new(&config.input.activity_path);
            let users = tokio::task::spawn_blocking(move || registry.scan_users());
            let activity = tokio::task::spawn_blocking(move || log.scan_activity());
            (flatten(users.await), flatten(activity.await))
        }
        InputSource::ClickHouse => match ClickHouseSource::new(&config.clickhouse) {
            Ok(source) => {
                let (users, activity) = tokio::join!(source.load_users(), source.load_activity());
                (
                    users.map(|s| s.into_records()),
                    activity.map(|s| s.into_records()),
                )
            }
            Err(e) => {
                let reason = e.to_string();
                (
                    Err(e),
                    Err(growth_core::GrowthError::Config(reason)),
                )
            }
        },
    }
}

fn flatten<T>(joined: Result<GrowthResult<T>, tokio::task::JoinError>) -> GrowthResult<T> {
    joined.map_err(|e| growth_core::GrowthError::Internal(e.into()))?
}
