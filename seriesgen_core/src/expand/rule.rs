use chrono::{
    DateTime, Datelike as _, Duration, Month, NaiveDate, NaiveDateTime, TimeZone as _, Utc, Weekday,
};
use chrono_tz::Tz;
use rrule::{NWeekday, RRule, RRuleSet};
use tracing::{debug, warn};

use crate::{
    data::series::{Frequency, SeriesDefinition, SeriesId},
    error::SeriesError,
};

/// How far past the anchor a series is expanded when neither the series nor
/// the caller bound it.
pub const DEFAULT_HORIZON: Duration = Duration::days(365);

// the largest UTC offset in use (Pacific/Kiritimati); an instant can't be on
// a later wall-clock time than this in any zone
const MAX_UTC_OFFSET: Duration = Duration::hours(14);

const ALL_WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// The last wall-clock time the recurrence engine can enumerate. Later
/// horizons are clamped to it.
pub fn engine_limit() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(9999, 12, 31)
        .and_then(|date| date.and_hms_opt(23, 59, 59))
        .unwrap_or(NaiveDateTime::MAX)
}

/// The exclusive upper bound on occurrence start times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Horizon {
    /// No occurrence starts at or after this instant.
    Instant(DateTime<Utc>),
    /// No occurrence starts at or after this wall-clock time. Used for the
    /// default horizon, which is measured from the (wall-clock) anchor.
    WallClock(NaiveDateTime),
}

impl Horizon {
    /// Picks the tighter of the series' own end and the caller's horizon,
    /// falling back to `default_span` after the anchor.
    fn resolve(
        series_end: Option<DateTime<Utc>>,
        horizon_end: Option<DateTime<Utc>>,
        anchor: NaiveDateTime,
        default_span: Duration,
    ) -> Self {
        match (series_end, horizon_end) {
            (Some(series_end), Some(horizon_end)) => Horizon::Instant(series_end.min(horizon_end)),
            (Some(end), None) | (None, Some(end)) => Horizon::Instant(end),
            (None, None) => Horizon::WallClock(
                anchor.checked_add_signed(default_span).unwrap_or(NaiveDateTime::MAX),
            ),
        }
    }

    /// Clamps the bound to `engine_limit()`. Returns `None` if it already
    /// lies within.
    fn clamp_to_engine(&self) -> Option<Self> {
        let limit = engine_limit();
        match *self {
            Horizon::Instant(instant) if instant.naive_utc() > limit => {
                Some(Horizon::Instant(limit.and_utc()))
            }
            Horizon::WallClock(wall_clock) if wall_clock > limit => Some(Horizon::WallClock(limit)),
            _ => None,
        }
    }

    /// Returns a wall-clock time after which no admissible candidate can lie,
    /// whatever the zone. For instant bounds this is pessimistic; the exact
    /// check is `admits`.
    pub fn local_limit(&self) -> NaiveDateTime {
        match *self {
            Horizon::Instant(instant) => instant
                .naive_utc()
                .checked_add_signed(MAX_UTC_OFFSET)
                .unwrap_or(NaiveDateTime::MAX),
            Horizon::WallClock(limit) => limit,
        }
    }

    /// Returns whether an occurrence starting at `start` lies before the
    /// bound.
    pub fn admits(&self, start: &DateTime<Tz>) -> bool {
        match *self {
            Horizon::Instant(instant) => start.with_timezone(&Utc) < instant,
            Horizon::WallClock(limit) => start.naive_local() < limit,
        }
    }
}

impl From<Frequency> for rrule::Frequency {
    fn from(frequency: Frequency) -> Self {
        match frequency {
            Frequency::Daily => rrule::Frequency::Daily,
            Frequency::Weekly => rrule::Frequency::Weekly,
            Frequency::Monthly => rrule::Frequency::Monthly,
            Frequency::Yearly => rrule::Frequency::Yearly,
        }
    }
}

/// The recurrence of a series, ready to enumerate.
///
/// Candidates are wall-clock date-times in the series' own zone, not
/// instants: the recurrence engine runs on "floating" times (UTC is used as a
/// zone without transitions), and each candidate is attached to the real zone
/// only afterwards, date by date.
#[derive(Debug, Clone)]
pub struct RecurrencePattern {
    frequency: Frequency,
    interval: u16,
    anchor: NaiveDateTime,
    horizon: Horizon,
    weekdays: Vec<Weekday>,
    month_day: Option<i8>,
    set_position: Option<i32>,
    months: Vec<Month>,
    // `None` if the horizon lies before the anchor, i.e. there are no
    // candidates at all
    rrule_set: Option<RRuleSet>,
}

impl RecurrencePattern {
    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn interval(&self) -> u16 {
        self.interval
    }

    pub fn anchor(&self) -> NaiveDateTime {
        self.anchor
    }

    pub fn horizon(&self) -> Horizon {
        self.horizon
    }

    pub fn weekdays(&self) -> &[Weekday] {
        &self.weekdays
    }

    pub fn month_day(&self) -> Option<i8> {
        self.month_day
    }

    /// The position within each period's matching weekdays, if the series is
    /// restricted to e.g. "the last Friday".
    pub fn set_position(&self) -> Option<i32> {
        self.set_position
    }

    pub fn months(&self) -> &[Month] {
        &self.months
    }

    /// Lazily enumerates the wall-clock candidates in ascending order, from
    /// the anchor up to `self.horizon().local_limit()` inclusive.
    pub fn candidates(&self) -> impl Iterator<Item = NaiveDateTime> + '_ {
        self.rrule_set
            .iter()
            .flatten()
            .map(|dt| dt.naive_utc())
            .filter(move |candidate| self.on_weekly_month_day(candidate))
    }

    // the engine takes no day of month on weekly rules, so weekly series
    // with one are enumerated day by day and filtered here
    fn filters_weekly_month_day(&self) -> bool {
        self.frequency == Frequency::Weekly && self.month_day.is_some()
    }

    fn on_weekly_month_day(&self, candidate: &NaiveDateTime) -> bool {
        if !self.filters_weekly_month_day() {
            return true;
        }
        // a week holds each day of the month at most once, so only the first
        // or last position of a week's matches can select anything
        let day_matches = self
            .month_day
            .and_then(|day| u32::try_from(day).ok())
            .map_or(false, |day| candidate.day() == day);
        day_matches && matches!(self.set_position, None | Some(1) | Some(-1))
    }
}

/// Builds the recurrence of `series`, bounded by `horizon_end` and the series'
/// own end. Without either, the series is expanded for `DEFAULT_HORIZON`
/// after its anchor.
pub fn build_rule(
    series: &SeriesDefinition,
    horizon_end: Option<DateTime<Utc>>,
) -> Result<RecurrencePattern, SeriesError> {
    build_rule_with_default(series, horizon_end, DEFAULT_HORIZON)
}

/// Same as `build_rule`, with a custom span for unbounded series.
pub fn build_rule_with_default(
    series: &SeriesDefinition,
    horizon_end: Option<DateTime<Utc>>,
    default_span: Duration,
) -> Result<RecurrencePattern, SeriesError> {
    let frequency = series.frequency.ok_or(SeriesError::InvalidFrequency { found: None })?;
    let anchor = series.local_start_time.ok_or(SeriesError::MissingAnchor)?;

    let id = series.id;
    let interval = sanitize_interval(id, series.interval);
    let weekdays = dedup(series.weekdays.iter().copied());
    let month_day = sanitize_month_day(id, series.month_day);
    let set_position = sanitize_ordinal(id, series.weekday_ordinal, !weekdays.is_empty());
    let months = sanitize_months(id, &series.months);

    let mut horizon = Horizon::resolve(series.series_end_time, horizon_end, anchor, default_span);
    if let Some(clamped) = horizon.clamp_to_engine() {
        warn!(series = %id, ?horizon, ?clamped, "horizon past the last enumerable year, clamping");
        horizon = clamped;
    }
    debug!(series = %id, ?frequency, interval, %anchor, ?horizon, "built recurrence");

    let mut pattern = RecurrencePattern {
        frequency,
        interval,
        anchor,
        horizon,
        weekdays,
        month_day,
        set_position,
        months,
        rrule_set: None,
    };
    if horizon.local_limit() >= anchor {
        pattern.rrule_set = Some(pattern.to_rrule_set()?);
    }
    Ok(pattern)
}

impl RecurrencePattern {
    fn to_rrule_set(&self) -> Result<RRuleSet, SeriesError> {
        // wall-clock values are fed through UTC so that the engine itself
        // never applies an offset
        let dt_start = rrule::Tz::UTC.from_utc_datetime(&self.anchor);
        let until = self.horizon.local_limit().min(engine_limit());
        let until = rrule::Tz::UTC.from_utc_datetime(&until);
        let weekly_month_day = self.filters_weekly_month_day();

        let mut rrule = RRule::new(self.frequency.into()).interval(self.interval).until(until);
        let weekdays = match self.weekdays.as_slice() {
            [] if weekly_month_day => ALL_WEEKDAYS.as_slice(),
            weekdays => weekdays,
        };
        if !weekdays.is_empty() {
            rrule = rrule.by_weekday(weekdays.iter().map(|&day| NWeekday::Every(day)).collect());
        }
        // for weekly series with a day of month, day and position are applied
        // by `candidates`
        if !weekly_month_day {
            if let Some(day) = self.month_day {
                rrule = rrule.by_month_day(vec![day]);
            }
            if let Some(position) = self.set_position {
                rrule = rrule.by_set_pos(vec![position]);
            }
        }
        if !self.months.is_empty() {
            rrule = rrule.by_month(&self.months);
        }

        let rrule =
            rrule.validate(dt_start).map_err(|err| SeriesError::InvalidRule(err.to_string()))?;
        Ok(RRuleSet::new(dt_start).rrule(rrule))
    }
}

fn dedup<T: PartialEq>(items: impl Iterator<Item = T>) -> Vec<T> {
    let mut unique = Vec::new();
    for item in items {
        if !unique.contains(&item) {
            unique.push(item);
        }
    }
    unique
}

fn sanitize_interval(id: SeriesId, interval: i64) -> u16 {
    if interval < 1 {
        debug!(series = %id, interval, "treating non-positive interval as 1");
        return 1;
    }
    u16::try_from(interval).unwrap_or_else(|_| {
        warn!(series = %id, interval, "interval too large, clamping");
        u16::MAX
    })
}

fn sanitize_month_day(id: SeriesId, month_day: Option<u32>) -> Option<i8> {
    let day = month_day?;
    match i8::try_from(day) {
        Ok(day) if (1..=31).contains(&day) => Some(day),
        _ => {
            warn!(series = %id, day, "ignoring invalid day of month");
            None
        }
    }
}

fn sanitize_ordinal(id: SeriesId, ordinal: Option<i32>, has_weekdays: bool) -> Option<i32> {
    let ordinal = ordinal?;
    if ordinal == 0 || !(-5..=5).contains(&ordinal) {
        warn!(series = %id, ordinal, "ignoring invalid weekday ordinal");
        return None;
    }
    if !has_weekdays {
        // kept permissive: an ordinal without weekdays has no effect
        debug!(series = %id, ordinal, "ignoring weekday ordinal without weekdays");
        return None;
    }
    Some(ordinal)
}

fn sanitize_months(id: SeriesId, months: &[u32]) -> Vec<Month> {
    dedup(months.iter().filter_map(|&month| {
        let parsed = u8::try_from(month).ok().and_then(|m| Month::try_from(m).ok());
        if parsed.is_none() {
            warn!(series = %id, month, "ignoring invalid month");
        }
        parsed
    }))
}
