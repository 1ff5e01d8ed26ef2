use chrono::Duration;
use config::{builder::DefaultState, Config, ConfigBuilder, Environment, File};
use serde::Deserialize;

use crate::{data::time::TargetZone, error::ConfigurationError};

/// Process-level settings of the generator.
///
/// Loaded from an optional `seriesgen.toml` in the working directory and from
/// the environment (`TIMEZONE`, `HORIZON_DAYS`, `FALLBACK_DURATION_MINUTES`),
/// environment variables taking precedence. A change of `timezone` means
/// every previously generated occurrence has to be regenerated.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GeneratorConfig {
    /// IANA identifier of the zone that series wall-clock times are in.
    pub timezone: String,
    /// How many days past its anchor an unbounded series is expanded.
    pub horizon_days: i64,
    /// Length of occurrences whose series has no usable end time.
    pub fallback_duration_minutes: i64,
}

impl GeneratorConfig {
    pub fn load() -> Result<Self, ConfigurationError> {
        Self::build(
            Config::builder()
                .add_source(File::with_name("seriesgen").required(false))
                .add_source(Environment::default().ignore_empty(true).try_parsing(true)),
        )
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigurationError> {
        let defaults = GeneratorConfig::default();
        Ok(builder
            .set_default("timezone", defaults.timezone)?
            .set_default("horizon_days", defaults.horizon_days)?
            .set_default("fallback_duration_minutes", defaults.fallback_duration_minutes)?
            .build()?
            .try_deserialize()?)
    }

    pub fn target_zone(&self) -> Result<TargetZone, ConfigurationError> {
        TargetZone::parse(&self.timezone)
    }

    pub fn default_horizon(&self) -> Duration {
        Duration::days(self.horizon_days.max(1))
    }

    pub fn fallback_duration(&self) -> Duration {
        Duration::minutes(self.fallback_duration_minutes.max(0))
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            timezone: crate::data::time::DEFAULT_TIMEZONE.to_owned(),
            horizon_days: 365,
            fallback_duration_minutes: 30,
        }
    }
}
