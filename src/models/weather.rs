use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::FitError;

const KELVIN_OFFSET: f64 = 273.15;

/// One timestamp of gridded weather, already converted to rates.
///
/// Irradiance in W/m², temperature in °C. `ghi` is always present; at least
/// one of `dni` / `dhi` is needed to complete the three components.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub ghi: f64,
    pub dni: Option<f64>,
    pub dhi: Option<f64>,
    pub temperature: Option<f64>,
}

/// How radiation columns of a weather export are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RadiationEncoding {
    /// Energy accumulated over `interval_seconds` (J/m²), e.g. ERA5 `ssrd` / `fdir`.
    Accumulated { interval_seconds: f64 },
    /// Instantaneous or interval-mean power (W/m²).
    Rate,
}

impl RadiationEncoding {
    /// Power-equivalent rate of a raw radiation value.
    pub fn to_rate(&self, value: f64) -> f64 {
        match self {
            RadiationEncoding::Accumulated { interval_seconds } => value / interval_seconds,
            RadiationEncoding::Rate => value,
        }
    }
}

pub fn kelvin_to_celsius(k: f64) -> f64 {
    k - KELVIN_OFFSET
}

/// Weather observations of a single grid cell keyed by timestamp.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeatherTable {
    records: BTreeMap<DateTime<Utc>, WeatherRecord>,
}

impl WeatherTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, timestamp: DateTime<Utc>, record: WeatherRecord) {
        self.records.insert(timestamp, record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Record at `timestamp`; absent timestamps are a hard error.
    pub fn get(&self, timestamp: &DateTime<Utc>) -> Result<&WeatherRecord, FitError> {
        self.records
            .get(timestamp)
            .ok_or(FitError::MissingWeather { timestamp: *timestamp })
    }

    pub fn temperature_at(&self, timestamp: &DateTime<Utc>) -> Result<f64, FitError> {
        self.get(timestamp)?
            .temperature
            .ok_or(FitError::MissingTemperature { timestamp: *timestamp })
    }

    pub fn span(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let first = self.records.keys().next()?;
        let last = self.records.keys().next_back()?;
        Some((*first, *last))
    }
}

impl FromIterator<(DateTime<Utc>, WeatherRecord)> for WeatherTable {
    fn from_iter<I: IntoIterator<Item = (DateTime<Utc>, WeatherRecord)>>(iter: I) -> Self {
        Self { records: iter.into_iter().collect() }
    }
}
