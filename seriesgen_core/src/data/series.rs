use std::{collections::BTreeSet, fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::SeriesError;

/// A unique ID that refers to a stored series.
#[derive(Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Copy, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeriesId(pub i64);

impl fmt::Display for SeriesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// How often the series repeats, before `interval` is applied.
#[derive(Debug, PartialEq, Eq, Hash, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl FromStr for Frequency {
    type Err = SeriesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DAILY" => Ok(Frequency::Daily),
            "WEEKLY" => Ok(Frequency::Weekly),
            "MONTHLY" => Ok(Frequency::Monthly),
            "YEARLY" => Ok(Frequency::Yearly),
            _ => Err(SeriesError::InvalidFrequency { found: Some(s.to_owned()) }),
        }
    }
}

/// Descriptive fields of a series (subject, participants, location, ...).
/// The generator never looks inside; every occurrence gets a copy.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// The stored template of a repeating meeting.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesDefinition {
    pub id: SeriesId,
    /// Wall-clock start of the first meeting, in the target zone. This is both
    /// the anchor of the recurrence and the start of the duration template.
    pub local_start_time: Option<NaiveDateTime>,
    /// Wall-clock end of the first meeting.
    pub local_end_time: Option<NaiveDateTime>,
    pub frequency: Option<Frequency>,
    /// Every Nth period. Values below 1 are treated as 1.
    pub interval: i64,
    pub weekdays: Vec<Weekday>,
    /// Day of the month for MONTHLY series, 1 to 31.
    pub month_day: Option<u32>,
    /// Picks the nth of the matching weekdays within each period; negative
    /// values count from the end, so -1 is "last". Ignored without `weekdays`.
    pub weekday_ordinal: Option<i32>,
    /// Months (1 to 12) that a YEARLY series is restricted to.
    pub months: Vec<u32>,
    /// Local calendar dates on which an otherwise matching occurrence is
    /// suppressed.
    pub exceptions: BTreeSet<NaiveDate>,
    /// No occurrences start at or after this instant.
    pub series_end_time: Option<DateTime<Utc>>,
    pub payload: Payload,
}

impl Default for SeriesDefinition {
    fn default() -> Self {
        SeriesDefinition {
            id: SeriesId::default(),
            local_start_time: None,
            local_end_time: None,
            frequency: None,
            interval: 1,
            weekdays: Vec::new(),
            month_day: None,
            weekday_ordinal: None,
            months: Vec::new(),
            exceptions: BTreeSet::new(),
            series_end_time: None,
            payload: Payload::new(),
        }
    }
}
