use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::series::{Payload, SeriesDefinition, SeriesId};

/// Length given to occurrences of a series whose first meeting has no usable
/// end time.
pub const FALLBACK_DURATION: Duration = Duration::minutes(30);

/// One concrete meeting derived from a series. Occurrences have no identity
/// of their own beyond `(series_id, start_utc)`; they are always regenerated
/// from the series rather than edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Occurrence {
    /// The series this occurrence was derived from.
    pub series_id: SeriesId,
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
    /// Copy of the series' descriptive fields.
    #[serde(flatten)]
    pub payload: Payload,
}

impl Occurrence {
    pub fn duration(&self) -> Duration {
        self.end_utc - self.start_utc
    }
}

/// Returns the length of the series' first meeting, which every occurrence
/// reuses. Falls back to `fallback` if there is no end time or if the end is
/// before the start.
pub fn template_duration(series: &SeriesDefinition, fallback: Duration) -> Duration {
    match (series.local_start_time, series.local_end_time) {
        (Some(start), Some(end)) if end >= start => end - start,
        (Some(start), Some(end)) => {
            warn!(series = %series.id, %start, %end, "series ends before it starts, using fallback");
            fallback
        }
        _ => fallback,
    }
}
