use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors raised by the numeric core (irradiance, PV model, parameter search).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    #[error("timeline is empty")]
    EmptyTimeline,

    #[error("timeline is not strictly increasing at index {index}")]
    UnorderedTimeline { index: usize },

    #[error("series has {actual} samples but the timeline has {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("no weather record for {timestamp}")]
    MissingWeather { timestamp: DateTime<Utc> },

    #[error("weather record at {timestamp} carries neither direct nor diffuse irradiance")]
    IncompleteWeather { timestamp: DateTime<Utc> },

    #[error("no ambient temperature for {timestamp}")]
    MissingTemperature { timestamp: DateTime<Utc> },

    #[error("parameter `{0}` is required by the temperature-corrected model")]
    MissingParameter(&'static str),

    #[error("PV system has no ambient temperature source")]
    NoTemperatureSource,

    #[error("invalid resample interval: {0} minutes")]
    InvalidInterval(u32),
}

/// Errors raised by the service shell: configuration, datasets, downloads.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unable to perform file operation: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP reqwest error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Weather archive answered with status {0}")]
    HttpStatus(u16),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid dataset: {0}")]
    Dataset(String),

    #[error("Fit failed: {0}")]
    Fit(#[from] FitError),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
