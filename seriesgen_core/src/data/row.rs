use std::collections::BTreeSet;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{
    series::{Frequency, Payload, SeriesDefinition, SeriesId},
    time::TargetZone,
};
use crate::error::SeriesError;

const NAIVE_FORMATS: [&str; 4] =
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"];
const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%.f%:z"];

/// A series as it is stored: a database row or JSON object whose rule fields
/// are loosely typed text. Every field that is not part of the rule ends up
/// in the payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesRow {
    pub id: i64,
    pub meeting_series_start_time: Option<String>,
    pub meeting_series_end_time: Option<String>,
    pub meeting_series_frequency: Option<String>,
    pub meeting_series_interval: Option<i64>,
    /// Comma-separated two-letter weekdays, e.g. "MO,WE,FR".
    pub meeting_series_weekdays: Option<String>,
    pub meeting_series_monthday: Option<i64>,
    pub meeting_series_weekday_nth: Option<i64>,
    /// Comma-separated month numbers, e.g. "1,3,6".
    pub meeting_series_months: Option<String>,
    /// Comma-separated ISO 8601 dates or date-times.
    pub meeting_series_exceptions: Option<String>,
    /// Start of the first meeting; together with `end_date` it defines the
    /// length of every occurrence.
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(flatten)]
    pub payload: Payload,
}

/// A stored timestamp. Stored series times are UTC unless the text carries
/// an offset of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stamp {
    WithOffset(DateTime<FixedOffset>),
    Naive(NaiveDateTime),
}

impl Stamp {
    fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Some(Stamp::WithOffset(dt));
        }
        if let Some(dt) =
            OFFSET_FORMATS.iter().find_map(|fmt| DateTime::parse_from_str(value, fmt).ok())
        {
            return Some(Stamp::WithOffset(dt));
        }
        NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
            .map(Stamp::Naive)
    }

    fn instant(self) -> DateTime<Utc> {
        match self {
            Stamp::WithOffset(dt) => dt.with_timezone(&Utc),
            Stamp::Naive(naive) => naive.and_utc(),
        }
    }

    fn wall_clock(self, zone: &TargetZone) -> NaiveDateTime {
        zone.to_local(self.instant()).naive_local()
    }
}

fn stamp_field(field: &'static str, value: Option<&str>) -> Result<Option<Stamp>, SeriesError> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    Stamp::parse(value)
        .map(Some)
        .ok_or_else(|| SeriesError::InvalidTimestamp { field, value: value.to_owned() })
}

impl SeriesRow {
    /// Converts the stored text into a typed definition. Timestamps are
    /// instants (UTC when written without an offset); the anchor is the
    /// start time translated to `zone`'s wall clock. Unknown weekday and
    /// month tokens and unparseable exception dates are skipped with a
    /// warning; an unknown frequency or an unparseable timestamp is an error.
    pub fn into_definition(self, zone: &TargetZone) -> Result<SeriesDefinition, SeriesError> {
        let id = SeriesId(self.id);

        let local_start_time = stamp_field(
            "meeting_series_start_time",
            self.meeting_series_start_time.as_deref(),
        )?
        .map(|stamp| stamp.wall_clock(zone));
        let series_end_time =
            stamp_field("meeting_series_end_time", self.meeting_series_end_time.as_deref())?
                .map(Stamp::instant);

        let frequency = match self.meeting_series_frequency.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(text) => Some(text.parse::<Frequency>()?),
        };

        // the first meeting may have been stored in a different form than the
        // series anchor, so only its length is taken over
        let first_start = stamp_field("start_date", self.start_date.as_deref())?;
        let first_end = stamp_field("end_date", self.end_date.as_deref())?;
        let local_end_time = match (local_start_time, first_start, first_end) {
            (Some(anchor), Some(start), Some(end)) => {
                Some(anchor + (end.instant() - start.instant()))
            }
            _ => None,
        };

        Ok(SeriesDefinition {
            id,
            local_start_time,
            local_end_time,
            frequency,
            interval: self.meeting_series_interval.unwrap_or(1),
            weekdays: self.meeting_series_weekdays.as_deref().map(parse_weekdays).unwrap_or_default(),
            month_day: self.meeting_series_monthday.and_then(|day| u32::try_from(day).ok()),
            weekday_ordinal: self.meeting_series_weekday_nth.and_then(|nth| i32::try_from(nth).ok()),
            months: self.meeting_series_months.as_deref().map(parse_months).unwrap_or_default(),
            exceptions: self
                .meeting_series_exceptions
                .as_deref()
                .map(parse_exceptions)
                .unwrap_or_default(),
            series_end_time,
            payload: self.payload,
        })
    }
}

/// Parses "MO,WE,FR" (case-insensitive; full English names are accepted too)
/// into weekdays, dropping duplicates and unknown tokens.
pub fn parse_weekdays(text: &str) -> Vec<Weekday> {
    let mut weekdays = Vec::new();
    for token in text.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let weekday = match token.to_ascii_uppercase().as_str() {
            "MO" => Some(Weekday::Mon),
            "TU" => Some(Weekday::Tue),
            "WE" => Some(Weekday::Wed),
            "TH" => Some(Weekday::Thu),
            "FR" => Some(Weekday::Fri),
            "SA" => Some(Weekday::Sat),
            "SU" => Some(Weekday::Sun),
            _ => token.parse::<Weekday>().ok(),
        };
        match weekday {
            Some(weekday) if !weekdays.contains(&weekday) => weekdays.push(weekday),
            Some(_) => {}
            None => warn!(token, "ignoring unknown weekday"),
        }
    }
    weekdays
}

/// Parses "1,3,6" into month numbers, dropping anything outside 1 to 12.
pub fn parse_months(text: &str) -> Vec<u32> {
    let mut months = Vec::new();
    for token in text.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match token.parse::<u32>() {
            Ok(month) if (1..=12).contains(&month) => {
                if !months.contains(&month) {
                    months.push(month);
                }
            }
            _ => warn!(token, "ignoring invalid month"),
        }
    }
    months
}

/// Parses comma-separated ISO 8601 dates. A date-time contributes the
/// calendar date it is written in. Unparseable entries are skipped.
pub fn parse_exceptions(text: &str) -> BTreeSet<NaiveDate> {
    text.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .filter_map(|token| {
            let date = NaiveDate::parse_from_str(token, "%Y-%m-%d").ok().or_else(|| {
                Stamp::parse(token).map(|stamp| match stamp {
                    Stamp::WithOffset(dt) => dt.date_naive(),
                    Stamp::Naive(naive) => naive.date(),
                })
            });
            if date.is_none() {
                warn!(token, "ignoring unparseable exception date");
            }
            date
        })
        .collect()
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn weekday_tokens() {
        assert_eq!(parse_weekdays("MO, we,Fr"), vec![Weekday::Mon, Weekday::Wed, Weekday::Fri]);
        assert_eq!(parse_weekdays("tuesday,TU,XX,"), vec![Weekday::Tue]);
        assert!(parse_weekdays("").is_empty());
    }

    #[test]
    fn month_tokens() {
        assert_eq!(parse_months("1, 3,6,13,0,x,3"), vec![1, 3, 6]);
    }

    #[test]
    fn exception_tokens() {
        assert_eq!(
            parse_exceptions("2025-04-02, 2025-04-09T09:30:00, not-a-date, 2025-05-01T00:00:00+02:00"),
            BTreeSet::from([date(2025, 4, 2), date(2025, 4, 9), date(2025, 5, 1)])
        );
        assert!(parse_exceptions("  ").is_empty());
    }

    #[test]
    fn row_to_definition() {
        let row: SeriesRow = serde_json::from_value(json!({
            "id": 7,
            "subject": "Jour fixe",
            "location": "Room 4",
            "meeting_series_start_time": "2025-03-28T08:30:00Z",
            "meeting_series_end_time": "2025-04-11T00:00:00Z",
            "meeting_series_frequency": "weekly",
            "meeting_series_interval": null,
            "meeting_series_weekdays": "MO,WE,FR",
            "meeting_series_monthday": 15,
            "meeting_series_weekday_nth": -1,
            "meeting_series_months": "3, 9,3",
            "meeting_series_exceptions": "2025-04-02",
            "start_date": "2025-03-28T08:30:00Z",
            "end_date": "2025-03-28T09:00:00Z"
        }))
        .unwrap();

        let series = row.into_definition(&TargetZone::default()).unwrap();
        let anchor = date(2025, 3, 28).and_hms_opt(9, 30, 0).unwrap();
        assert_eq!(series.id, SeriesId(7));
        assert_eq!(series.local_start_time, Some(anchor));
        assert_eq!(series.local_end_time, Some(date(2025, 3, 28).and_hms_opt(10, 0, 0).unwrap()));
        assert_eq!(series.frequency, Some(Frequency::Weekly));
        assert_eq!(series.interval, 1);
        assert_eq!(series.weekdays, vec![Weekday::Mon, Weekday::Wed, Weekday::Fri]);
        assert_eq!(series.month_day, Some(15));
        assert_eq!(series.weekday_ordinal, Some(-1));
        assert_eq!(series.months, vec![3, 9]);
        assert_eq!(series.exceptions, BTreeSet::from([date(2025, 4, 2)]));
        assert_eq!(
            series.series_end_time,
            Some(DateTime::parse_from_rfc3339("2025-04-11T00:00:00Z").unwrap().with_timezone(&Utc))
        );
        assert_eq!(series.payload.len(), 2);
        assert_eq!(series.payload["subject"], json!("Jour fixe"));
        assert!(!series.payload.contains_key("id"));
    }

    #[test]
    fn timestamps_without_offset_are_utc() {
        let row = SeriesRow {
            meeting_series_start_time: Some("2025-07-01T09:30:00".to_owned()),
            meeting_series_end_time: Some("2025-08-01T00:00:00".to_owned()),
            meeting_series_frequency: Some("DAILY".to_owned()),
            ..Default::default()
        };
        let series = row.clone().into_definition(&TargetZone::default()).unwrap();
        // Berlin summer time
        assert_eq!(series.local_start_time, Some(date(2025, 7, 1).and_hms_opt(11, 30, 0).unwrap()));
        assert_eq!(
            series.series_end_time,
            Some(DateTime::parse_from_rfc3339("2025-08-01T00:00:00Z").unwrap().with_timezone(&Utc))
        );
        assert_eq!(series.local_end_time, None);

        let winter = SeriesRow {
            meeting_series_start_time: Some("2025-03-28 08:30:00".to_owned()),
            start_date: Some("2025-03-28T08:30:00".to_owned()),
            end_date: Some("2025-03-28 09:15:00+00:00".to_owned()),
            ..row
        };
        let series = winter.into_definition(&TargetZone::default()).unwrap();
        assert_eq!(series.local_start_time, Some(date(2025, 3, 28).and_hms_opt(9, 30, 0).unwrap()));
        assert_eq!(series.local_end_time, Some(date(2025, 3, 28).and_hms_opt(10, 15, 0).unwrap()));
    }

    #[test]
    fn bad_fields_are_reported() {
        let row = SeriesRow {
            meeting_series_start_time: Some("2025-07-01T09:30:00".to_owned()),
            meeting_series_frequency: Some("fortnightly".to_owned()),
            ..Default::default()
        };
        assert_eq!(
            row.into_definition(&TargetZone::default()),
            Err(SeriesError::InvalidFrequency { found: Some("fortnightly".to_owned()) })
        );

        let row = SeriesRow {
            meeting_series_start_time: Some("next tuesday".to_owned()),
            ..Default::default()
        };
        assert_eq!(
            row.into_definition(&TargetZone::default()),
            Err(SeriesError::InvalidTimestamp {
                field: "meeting_series_start_time",
                value: "next tuesday".to_owned(),
            })
        );
    }
}
