//! ClickHouse input adapters for the growth metrics job.

pub mod source;

pub use source::ClickHouseSource;
