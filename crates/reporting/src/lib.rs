//! Growth reporting: monthly registrations, long-term users and highly
//! engaged users computed from a user registry and an activity log.

pub mod engagement;
pub mod index;
pub mod metric;
pub mod monthly;
pub mod pipeline;
pub mod registration;
pub mod retention;
pub mod shard;
pub mod source;

pub use engagement::EngagementMetric;
pub use index::UserIndex;
pub use metric::{GrowthMetric, MetricInput};
pub use monthly::MonthlyUsers;
pub use pipeline::{compute_all_metrics, publish, GrowthReport, JobSummary, MetricsPipeline};
pub use registration::RegistrationMetric;
pub use retention::RetentionMetric;
pub use source::{
    ActivityLog, ActivitySnapshot, JsonLinesActivityLog, JsonLinesRegistry, UserRegistry,
    UserSnapshot,
};
