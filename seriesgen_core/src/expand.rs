pub mod materialize;
pub mod rule;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::{
    data::{
        occurrence::{Occurrence, FALLBACK_DURATION},
        series::{SeriesDefinition, SeriesId},
        time::TargetZone,
    },
    error::{ConfigurationError, GenerateError, SeriesError},
    settings::GeneratorConfig,
};
use materialize::materialize;
use rule::{build_rule_with_default, DEFAULT_HORIZON};

/// Expands series into occurrences for one target zone.
///
/// Generation is a pure function of the series, the zone, and the horizon:
/// there is no shared mutable state, so a `Generator` can be used from any
/// number of threads at once, and generating twice gives identical results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generator {
    zone: TargetZone,
    default_horizon: Duration,
    fallback_duration: Duration,
}

/// The result of expanding many series at once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    /// Occurrences of all series that could be expanded, grouped by series
    /// in input order.
    pub occurrences: Vec<Occurrence>,
    /// Series that contributed nothing, with the reason.
    pub failures: Vec<(SeriesId, SeriesError)>,
}

impl Generator {
    pub fn new(zone: TargetZone) -> Self {
        Generator { zone, default_horizon: DEFAULT_HORIZON, fallback_duration: FALLBACK_DURATION }
    }

    pub fn from_config(config: &GeneratorConfig) -> Result<Self, ConfigurationError> {
        Ok(Generator {
            zone: config.target_zone()?,
            default_horizon: config.default_horizon(),
            fallback_duration: config.fallback_duration(),
        })
    }

    pub fn zone(&self) -> TargetZone {
        self.zone
    }

    /// Expands `series` into its occurrences, in ascending order of start.
    ///
    /// No occurrence starts at or after `horizon_end` or the series' own end.
    /// A series that can't be expanded yields an error and no occurrences at
    /// all, never a partial list.
    pub fn generate(
        &self,
        series: &SeriesDefinition,
        horizon_end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Occurrence>, SeriesError> {
        let pattern = build_rule_with_default(series, horizon_end, self.default_horizon)?;
        let horizon = pattern.horizon();

        // each wall-clock candidate gets the offset of its own date; the
        // candidates are ascending, so the first one past the horizon ends
        // the expansion
        let starts = pattern
            .candidates()
            .map(|local| self.zone.localize(local))
            .take_while(|start| horizon.admits(start));
        let occurrences = materialize(series, starts, &series.exceptions, self.fallback_duration);

        info!(
            series = %series.id,
            zone = self.zone.id(),
            count = occurrences.len(),
            "generated occurrences"
        );
        Ok(occurrences)
    }

    /// Expands every series in `series`. A series that can't be expanded is
    /// logged and reported in `BatchOutcome::failures`; the others are not
    /// affected.
    pub fn generate_all<'a>(
        &self,
        series: impl IntoIterator<Item = &'a SeriesDefinition>,
        horizon_end: Option<DateTime<Utc>>,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for series in series {
            match self.generate(series, horizon_end) {
                Ok(occurrences) => outcome.occurrences.extend(occurrences),
                Err(err) => {
                    warn!(series = %series.id, %err, "skipping series");
                    outcome.failures.push((series.id, err));
                }
            }
        }
        outcome
    }
}

/// Expands `series` in the zone named by `timezone_id`. An unknown zone fails
/// the whole call before anything is generated.
pub fn generate_occurrences(
    series: &SeriesDefinition,
    timezone_id: &str,
    horizon_end: Option<DateTime<Utc>>,
) -> Result<Vec<Occurrence>, GenerateError> {
    let zone = TargetZone::parse(timezone_id)?;
    Ok(Generator::new(zone).generate(series, horizon_end)?)
}
