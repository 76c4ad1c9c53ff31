use crate::bucket;
use crate::error::{GrowthError, GrowthResult};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Calendar month in UTC, rendered as `YYYY-MM`.
///
/// Ordering is chronological, which matches the lexicographic order of the
/// rendered label for the supported year range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthLabel {
    year: i32,
    month: u32,
}

impl MonthLabel {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) {
            Some(Self { year, month })
        } else {
            None
        }
    }

}

impl From<NaiveDate> for MonthLabel {
    fn from(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl fmt::Display for MonthLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .split_once('-')
            .ok_or_else(|| format!("month label '{s}' is not of the form YYYY-MM"))?;
        if year.len() != 4 || month.len() != 2 {
            return Err(format!("month label '{s}' is not of the form YYYY-MM"));
        }
        let year: i32 = year
            .parse()
            .map_err(|_| format!("month label '{s}' has a non-numeric year"))?;
        let month: u32 = month
            .parse()
            .map_err(|_| format!("month label '{s}' has a non-numeric month"))?;
        Self::new(year, month).ok_or_else(|| format!("month label '{s}' has month out of range"))
    }
}

impl TryFrom<String> for MonthLabel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MonthLabel> for String {
    fn from(label: MonthLabel) -> Self {
        label.to_string()
    }
}

/// Name of a metric series; doubles as the partition key in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SeriesName {
    #[serde(rename = "registrations")]
    Registrations,
    #[serde(rename = "long term users")]
    LongTermUsers,
    #[serde(rename = "highly engaged users")]
    HighlyEngagedUsers,
}

impl SeriesName {
    pub const ALL: [SeriesName; 3] = [
        SeriesName::Registrations,
        SeriesName::LongTermUsers,
        SeriesName::HighlyEngagedUsers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registrations => "registrations",
            Self::LongTermUsers => "long term users",
            Self::HighlyEngagedUsers => "highly engaged users",
        }
    }
}

impl fmt::Display for SeriesName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeriesName {
    type Err = GrowthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| GrowthError::Config(format!("unknown series name '{s}'")))
    }
}

/// One row of a metric series: distinct users counted for a month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricRow {
    pub month: MonthLabel,
    pub total: u64,
}

/// Ordered time series of monthly distinct-user counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSeries {
    pub name: SeriesName,
    pub rows: Vec<MetricRow>,
}

impl MetricSeries {
    pub fn empty(name: SeriesName) -> Self {
        Self {
            name,
            rows: Vec::new(),
        }
    }

    /// Build a series from per-month counts. Months with a zero count are
    /// dropped so that only months with qualifying users appear.
    pub fn from_monthly_counts(name: SeriesName, counts: BTreeMap<MonthLabel, u64>) -> Self {
        let rows = counts
            .into_iter()
            .filter(|(_, total)| *total > 0)
            .map(|(month, total)| MetricRow { month, total })
            .collect();
        Self { name, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows as `(YYYY-MM, total)` pairs.
    pub fn pairs(&self) -> Vec<(String, u64)> {
        self.rows
            .iter()
            .map(|row| (row.month.to_string(), row.total))
            .collect()
    }
}

/// Validated registry entry. `joined_at` is `None` when the upstream join
/// timestamp was missing or invalid; such users still count wherever the
/// join time is not read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user: String,
    pub joined_at: Option<DateTime<Utc>>,
    pub registered: bool,
}

/// Validated activity entry: one visit by a user on a calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub user: String,
    pub date: NaiveDate,
}

/// Join timestamp as it arrives from upstream: a number of seconds, or text
/// that should hold one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Seconds(f64),
    Text(String),
}

/// Registry row before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawUserRecord {
    pub user: String,
    #[serde(default)]
    pub joined_at: Option<RawTimestamp>,
    #[serde(default)]
    pub registered: bool,
}

impl RawUserRecord {
    /// Validate into a registry entry. A bad join timestamp does not drop the
    /// user: the entry keeps `joined_at = None` and the error is returned
    /// with it so the caller can report the rejected field.
    pub fn validate(self) -> (UserRecord, Option<GrowthError>) {
        let (joined_at, error) = match self.parse_joined_at() {
            Ok(ts) => (Some(ts), None),
            Err(e) => (None, Some(e)),
        };
        let record = UserRecord {
            user: self.user,
            joined_at,
            registered: self.registered,
        };
        (record, error)
    }

    fn parse_joined_at(&self) -> GrowthResult<DateTime<Utc>> {
        let secs = match &self.joined_at {
            None => return Err(GrowthError::invalid_record(&self.user, "missing joined_at")),
            Some(RawTimestamp::Seconds(secs)) => *secs,
            Some(RawTimestamp::Text(text)) => text.trim().parse::<f64>().map_err(|_| {
                GrowthError::invalid_record(&self.user, format!("unparseable joined_at '{text}'"))
            })?,
        };
        bucket::timestamp_from_secs(secs)
            .map_err(|e| GrowthError::invalid_record(&self.user, e.to_string()))
    }
}

/// Activity row before validation. `date` is expected as `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawActivityRecord {
    pub user: String,
    #[serde(default)]
    pub date: Option<String>,
}

impl RawActivityRecord {
    pub fn validate(self) -> GrowthResult<ActivityRecord> {
        let Some(text) = self.date.as_deref() else {
            return Err(GrowthError::invalid_record(self.user, "missing date"));
        };
        let date = NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").map_err(|_| {
            GrowthError::invalid_record(&self.user, format!("unparseable date '{text}'"))
        })?;
        let date = bucket::check_date(date)
            .map_err(|e| GrowthError::invalid_record(&self.user, e.to_string()))?;
        Ok(ActivityRecord {
            user: self.user,
            date,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_label_roundtrip_and_order() {
        let july: MonthLabel = "2012-07".parse().unwrap();
        let august = MonthLabel::new(2012, 8).unwrap();
        assert_eq!(july.to_string(), "2012-07");
        assert!(july < august);
        assert!(MonthLabel::new(2011, 12).unwrap() < july);
        assert!("2012-13".parse::<MonthLabel>().is_err());
        assert!("2012-7".parse::<MonthLabel>().is_err());

        let json = serde_json::to_string(&august).unwrap();
        assert_eq!(json, "\"2012-08\"");
    }

    #[test]
    fn test_series_name_strings() {
        assert_eq!(
            serde_json::to_string(&SeriesName::LongTermUsers).unwrap(),
            "\"long term users\""
        );
        assert_eq!(
            "highly engaged users".parse::<SeriesName>().unwrap(),
            SeriesName::HighlyEngagedUsers
        );
        assert!("visitors".parse::<SeriesName>().is_err());
    }

    #[test]
    fn test_series_drops_zero_months() {
        let mut counts = BTreeMap::new();
        counts.insert(MonthLabel::new(2012, 8).unwrap(), 2);
        counts.insert(MonthLabel::new(2012, 7).unwrap(), 0);
        let series = MetricSeries::from_monthly_counts(SeriesName::Registrations, counts);
        assert_eq!(series.pairs(), vec![("2012-08".to_string(), 2)]);
    }

    #[test]
    fn test_user_validation() {
        let ok: RawUserRecord =
            serde_json::from_str(r#"{"user":"u1","joined_at":1341100800.9,"registered":true}"#)
                .unwrap();
        let (rec, error) = ok.validate();
        assert!(error.is_none());
        assert_eq!(rec.joined_at.unwrap().timestamp(), 1_341_100_800);

        let text: RawUserRecord =
            serde_json::from_str(r#"{"user":"u1","joined_at":"1341100800"}"#).unwrap();
        let (rec, error) = text.validate();
        assert!(error.is_none());
        assert!(!rec.registered);
    }

    #[test]
    fn test_bad_joined_at_keeps_user() {
        let missing: RawUserRecord =
            serde_json::from_str(r#"{"user":"u2","registered":true}"#).unwrap();
        let (rec, error) = missing.validate();
        assert!(matches!(error, Some(GrowthError::InvalidRecord { .. })));
        assert_eq!(rec.user, "u2");
        assert!(rec.registered);
        assert!(rec.joined_at.is_none());

        for joined_at in [
            RawTimestamp::Seconds(-5.0),
            RawTimestamp::Seconds(f64::NAN),
            RawTimestamp::Text("yesterday".into()),
        ] {
            let raw = RawUserRecord {
                user: "u3".into(),
                joined_at: Some(joined_at),
                registered: true,
            };
            let (rec, error) = raw.validate();
            assert!(error.is_some());
            assert!(rec.joined_at.is_none());
        }
    }

    #[test]
    fn test_activity_validation() {
        let ok = RawActivityRecord {
            user: "u1".into(),
            date: Some("2012-08-05".into()),
        };
        assert_eq!(
            ok.validate().unwrap().date,
            NaiveDate::from_ymd_opt(2012, 8, 5).unwrap()
        );

        let missing = RawActivityRecord {
            user: "u1".into(),
            date: None,
        };
        assert!(missing.validate().is_err());

        let bad = RawActivityRecord {
            user: "u1".into(),
            date: Some("2012-02-30".into()),
        };
        assert!(bad.validate().is_err());
    }
}
