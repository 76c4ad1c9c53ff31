//! Time bucketing: raw timestamps and dates to UTC month labels.

use crate::types::MonthLabel;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use thiserror::Error;

/// 9999-12-31T23:59:59Z
pub const MAX_TIMESTAMP_SECS: i64 = 253_402_300_799;

const MIN_YEAR: i32 = 1970;
const MAX_YEAR: i32 = 9999;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BucketError {
    #[error("timestamp is not a finite number")]
    NotFinite,

    #[error("timestamp {0} is before the epoch")]
    Negative(i64),

    #[error("timestamp {0} is past year 9999")]
    OutOfRange(i64),

    #[error("date {0} is outside years 1970..=9999")]
    DateOutOfRange(NaiveDate),
}

/// Seconds since the epoch, fractional part truncated, as a UTC instant.
pub fn timestamp_from_secs(secs: f64) -> Result<DateTime<Utc>, BucketError> {
    if !secs.is_finite() {
        return Err(BucketError::NotFinite);
    }
    if secs < 0.0 {
        return Err(BucketError::Negative(secs.trunc() as i64));
    }
    let whole = secs.trunc();
    if whole > MAX_TIMESTAMP_SECS as f64 {
        return Err(BucketError::OutOfRange(whole as i64));
    }
    let whole = whole as i64;
    DateTime::from_timestamp(whole, 0).ok_or(BucketError::OutOfRange(whole))
}

pub fn month_of_timestamp(secs: f64) -> Result<MonthLabel, BucketError> {
    timestamp_from_secs(secs).map(|ts| month_of_datetime(&ts))
}

pub fn month_of_datetime(ts: &DateTime<Utc>) -> MonthLabel {
    month_of_date(ts.date_naive())
}

pub fn month_of_date(date: NaiveDate) -> MonthLabel {
    MonthLabel::from(date)
}

/// Rejects calendar dates outside the supported year range.
pub fn check_date(date: NaiveDate) -> Result<NaiveDate, BucketError> {
    if (MIN_YEAR..=MAX_YEAR).contains(&date.year()) {
        Ok(date)
    } else {
        Err(BucketError::DateOutOfRange(date))
    }
}

/// Whole calendar days from the UTC registration day to `date`. Negative
/// when the activity predates registration.
pub fn days_since(joined_at: &DateTime<Utc>, date: NaiveDate) -> i64 {
    (date - joined_at.date_naive()).num_days()
}
