use std::collections::BTreeSet;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::debug;

use crate::data::{
    occurrence::{template_duration, Occurrence},
    series::SeriesDefinition,
};

/// Turns zone-corrected candidate starts into occurrences of `series`.
///
/// A candidate is dropped if its date *in the target zone* is one of
/// `exceptions`; comparing UTC dates would be off by one day for meetings
/// close to midnight. Every occurrence ends `template_duration` after its
/// start instant, so a meeting that spans a DST transition keeps its real
/// length.
pub fn materialize(
    series: &SeriesDefinition,
    candidates: impl IntoIterator<Item = DateTime<Tz>>,
    exceptions: &BTreeSet<NaiveDate>,
    fallback_duration: Duration,
) -> Vec<Occurrence> {
    let duration = template_duration(series, fallback_duration);
    candidates
        .into_iter()
        .filter(|start| {
            let excepted = exceptions.contains(&start.date_naive());
            if excepted {
                debug!(series = %series.id, date = %start.date_naive(), "skipping exception date");
            }
            !excepted
        })
        .map(|start| {
            let start_utc = start.with_timezone(&Utc);
            Occurrence {
                series_id: series.id,
                start_utc,
                end_utc: start_utc + duration,
                payload: series.payload.clone(),
            }
        })
        .collect()
}
