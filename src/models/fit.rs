use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One point of the search space. Immutable; every candidate owns a copy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ParameterSet {
    /// Panel tilt from horizontal (deg, 0..=90)
    pub surface_tilt: f64,
    /// Panel azimuth, clockwise from north (deg, 0..360)
    pub surface_azimuth: f64,
    /// Scaling from plane-of-array irradiance to power (≥ 0)
    pub efficiency_size: f64,
    /// Relative power change per °C below the baseline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_coefficient: Option<f64>,
    /// Ambient temperature (°C) at which the temperature factor is 1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_baseline: Option<f64>,
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0)
    }
}

impl ParameterSet {
    pub fn new(surface_tilt: f64, surface_azimuth: f64, efficiency_size: f64) -> Self {
        Self { surface_tilt, surface_azimuth, efficiency_size, temp_coefficient: None, temp_baseline: None }
    }

    pub fn with_mounting(self, surface_tilt: f64, surface_azimuth: f64) -> Self {
        Self { surface_tilt, surface_azimuth, ..self }
    }

    pub fn with_efficiency_size(self, efficiency_size: f64) -> Self {
        Self { efficiency_size, ..self }
    }

    pub fn with_temp_coefficient(self, temp_coefficient: f64) -> Self {
        Self { temp_coefficient: Some(temp_coefficient), ..self }
    }

    pub fn with_temp_baseline(self, temp_baseline: f64) -> Self {
        Self { temp_baseline: Some(temp_baseline), ..self }
    }
}

/// Outcome of evaluating one grid point.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateResult {
    pub params: ParameterSet,
    pub simulated: Vec<f64>,
    pub error: f64,
    pub valid: bool,
}

/// All candidates of a search in generation order plus the selected best.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub candidates: Vec<CandidateResult>,
    pub best: Option<CandidateResult>,
}

impl SearchOutcome {
    pub fn valid_count(&self) -> usize {
        self.candidates.iter().filter(|c| c.valid).count()
    }
}
