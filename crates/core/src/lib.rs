pub mod bucket;
pub mod config;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use error::{GrowthError, GrowthResult};
pub use types::{
    ActivityRecord, MetricRow, MetricSeries, MonthLabel, RawActivityRecord, RawTimestamp,
    RawUserRecord, SeriesName, UserRecord,
};
