use std::{fmt, str::FromStr};

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, Offset as _, TimeZone as _, Utc};
use chrono_tz::{OffsetComponents as _, Tz};
use tracing::debug;

use crate::error::ConfigurationError;

pub const DEFAULT_TIMEZONE: &str = "Europe/Berlin";

/// The IANA timezone in which the wall-clock fields of a series are
/// interpreted.
///
/// Wall-clock values are resolved against the zone separately for every date,
/// so each occurrence gets the offset (standard or daylight) that is in effect
/// on its own date, not the one in effect on the anchor date. Local times that
/// do not map to exactly one instant are resolved with a fixed policy:
///
/// - an ambiguous time (the repeated hour when clocks go back) resolves to
///   the standard-time instant, which is the later one;
/// - a nonexistent time (the skipped hour when clocks go forward) is shifted
///   forward by the length of the gap, so 02:30 becomes 03:30 for a one-hour
///   gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetZone(Tz);

impl TargetZone {
    pub fn new(tz: Tz) -> Self {
        TargetZone(tz)
    }

    /// Looks up an IANA identifier such as `Europe/Berlin`.
    pub fn parse(id: &str) -> Result<Self, ConfigurationError> {
        id.trim()
            .parse::<Tz>()
            .map(TargetZone)
            .map_err(|_| ConfigurationError::UnknownTimezone(id.to_owned()))
    }

    pub fn tz(&self) -> Tz {
        self.0
    }

    pub fn id(&self) -> &'static str {
        self.0.name()
    }

    /// Attaches this zone to the wall-clock value, using the offset in effect
    /// on that date. Never fails; see the type docs for how ambiguous and
    /// nonexistent times are resolved.
    pub fn localize(&self, local: NaiveDateTime) -> DateTime<Tz> {
        match self.0.from_local_datetime(&local) {
            LocalResult::Single(dt) => dt,
            LocalResult::Ambiguous(first, second) => {
                let chosen = prefer_standard(first, second);
                debug!(%local, zone = self.id(), resolved = %chosen, "ambiguous local time");
                chosen
            }
            LocalResult::None => {
                let shifted = self.skip_gap(local);
                debug!(%local, zone = self.id(), resolved = %shifted, "nonexistent local time");
                shifted
            }
        }
    }

    /// Converts a wall-clock value in this zone to an absolute instant.
    pub fn to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        self.localize(local).with_timezone(&Utc)
    }

    /// Converts an absolute instant to this zone's wall clock.
    pub fn to_local(&self, instant: DateTime<Utc>) -> DateTime<Tz> {
        instant.with_timezone(&self.0)
    }

    fn skip_gap(&self, local: NaiveDateTime) -> DateTime<Tz> {
        // interpreting the wall clock with the offset from before the gap
        // lands exactly as far past the transition as `local` is past the
        // start of the gap
        let day_before = local.checked_sub_signed(Duration::days(1)).unwrap_or(local);
        let before = self.0.offset_from_utc_datetime(&day_before).fix();
        let instant = local
            .checked_sub_signed(Duration::seconds(i64::from(before.local_minus_utc())))
            .unwrap_or(local);
        self.0.from_utc_datetime(&instant)
    }
}

fn prefer_standard(first: DateTime<Tz>, second: DateTime<Tz>) -> DateTime<Tz> {
    let is_standard = |dt: &DateTime<Tz>| dt.offset().dst_offset() == Duration::zero();
    match (is_standard(&first), is_standard(&second)) {
        (true, false) => first,
        (false, true) => second,
        // zones that change their base offset rather than observing DST;
        // fall back to the earlier instant
        _ => first.min(second),
    }
}

impl Default for TargetZone {
    fn default() -> Self {
        TargetZone(chrono_tz::Europe::Berlin)
    }
}

impl FromStr for TargetZone {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TargetZone::parse(s)
    }
}

impl fmt::Display for TargetZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Converts a wall-clock value to UTC in the zone named by `timezone_id`.
/// Fails only if the identifier is unknown.
pub fn to_utc(local: NaiveDateTime, timezone_id: &str) -> Result<DateTime<Utc>, ConfigurationError> {
    Ok(TargetZone::parse(timezone_id)?.to_utc(local))
}
