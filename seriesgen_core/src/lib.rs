//! Expands stored recurring-meeting series into concrete occurrences.
//!
//! A series is enumerated on its own wall clock and every candidate is only
//! then attached to the target timezone, date by date, so occurrences keep
//! their local start time across daylight saving transitions.

pub mod data;
pub mod error;
pub mod expand;
pub mod settings;

pub use data::{
    occurrence::Occurrence,
    row::SeriesRow,
    series::{Frequency, Payload, SeriesDefinition, SeriesId},
    time::{to_utc, TargetZone},
};
pub use error::{ConfigurationError, GenerateError, SeriesError};
pub use expand::{
    generate_occurrences,
    materialize::materialize,
    rule::{build_rule, Horizon, RecurrencePattern},
    BatchOutcome, Generator,
};
pub use settings::GeneratorConfig;
