use thiserror::Error;

/// Reasons a single series cannot be expanded. These are detected before any
/// candidate is enumerated, so a series either expands completely or not at
/// all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeriesError {
    #[error("series has no usable frequency (found {found:?})")]
    InvalidFrequency { found: Option<String> },
    #[error("series has no local start time to anchor the recurrence")]
    MissingAnchor,
    #[error("recurrence rule was rejected: {0}")]
    InvalidRule(String),
    #[error("could not parse `{field}` timestamp {value:?}")]
    InvalidTimestamp { field: &'static str, value: String },
}

/// Problems with the process-level setup of the generator. Unlike
/// `SeriesError`, these are fatal for every series, since continuing would
/// produce timestamps in the wrong zone.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("unknown IANA timezone identifier {0:?}")]
    UnknownTimezone(String),
    #[error("failed to load generator configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// Error type for generating occurrences from a raw timezone identifier.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Series(#[from] SeriesError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}
