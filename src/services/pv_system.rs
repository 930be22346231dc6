use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::FitError;
use crate::models::fit::ParameterSet;
use crate::models::series::Timeline;
use crate::models::weather::WeatherTable;
use crate::services::irradiance::{Irradiance, IrradianceFrame, IrradianceModel};
use crate::services::solar_position::SolarPosition;

const DEG: f64 = std::f64::consts::PI / 180.0;
/// Ground reflectance used for the reflected component.
const ALBEDO: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PoaIrradiance {
    pub global: f64,
    pub direct: f64,
    pub sky_diffuse: f64,
    pub ground_diffuse: f64,
}

/// Isotropic-sky transposition of horizontal irradiance onto a tilted plane.
pub fn total_irradiance(
    surface_tilt: f64,
    surface_azimuth: f64,
    sun: &SolarPosition,
    irr: &Irradiance,
) -> PoaIrradiance {
    let tilt = surface_tilt * DEG;
    let zenith = sun.apparent_zenith * DEG;

    // Angle of incidence between the sun and the panel normal
    let cos_aoi = zenith.cos() * tilt.cos()
        + zenith.sin() * tilt.sin() * ((sun.azimuth - surface_azimuth) * DEG).cos();

    let direct = (irr.dni * cos_aoi).max(0.0);
    let sky_diffuse = irr.dhi * (1.0 + tilt.cos()) / 2.0;
    let ground_diffuse = irr.ghi * ALBEDO * (1.0 - tilt.cos()) / 2.0;

    PoaIrradiance { global: direct + sky_diffuse + ground_diffuse, direct, sky_diffuse, ground_diffuse }
}

/// How ambient temperature modulates output.
#[derive(Debug, Clone)]
pub enum ThermalModel {
    None,
    /// `1 + temp_coefficient × (temp_baseline − ambient)` with ambient from weather.
    Ambient { weather: Arc<WeatherTable> },
}

/// An irradiance source plus an optional temperature response.
///
/// Holds no mounting parameters: those travel as a `ParameterSet` into
/// every simulation call.
#[derive(Debug, Clone)]
pub struct PvSystem {
    pub irradiance: IrradianceModel,
    pub thermal: ThermalModel,
}

impl PvSystem {
    pub fn new(irradiance: IrradianceModel) -> Self {
        Self { irradiance, thermal: ThermalModel::None }
    }

    pub fn with_ambient_temperature(self, weather: Arc<WeatherTable>) -> Self {
        Self { thermal: ThermalModel::Ambient { weather }, ..self }
    }

    pub fn label(&self) -> String {
        match self.thermal {
            ThermalModel::None => self.irradiance.label().to_string(),
            ThermalModel::Ambient { .. } => format!("{}+temperature", self.irradiance.label()),
        }
    }

    pub fn ambient_temperature_at(&self, timestamp: &DateTime<Utc>) -> Result<f64, FitError> {
        match &self.thermal {
            ThermalModel::None => Err(FitError::NoTemperatureSource),
            ThermalModel::Ambient { weather } => weather.temperature_at(timestamp),
        }
    }

    /// Ambient temperature (°C) per timestamp.
    pub fn ambient_temperature(&self, timeline: &Timeline) -> Result<Vec<f64>, FitError> {
        timeline.iter().map(|t| self.ambient_temperature_at(t)).collect()
    }

    /// Computes everything that does not depend on the parameter set.
    pub fn prepare(&self, timeline: &Timeline) -> Result<PreparedSystem, FitError> {
        let frame = self.irradiance.simulate_irradiance(timeline)?;
        let ambient = match self.thermal {
            ThermalModel::None => None,
            ThermalModel::Ambient { .. } => Some(self.ambient_temperature(timeline)?),
        };
        Ok(PreparedSystem { frame, ambient })
    }

    /// Predicted power for `params` over `timeline`.
    pub fn simulate_pv_power(&self, params: &ParameterSet, timeline: &Timeline) -> Result<Vec<f64>, FitError> {
        self.prepare(timeline)?.simulate(params)
    }
}

/// A `PvSystem` evaluated on one timeline, ready for many parameter sets.
#[derive(Debug, Clone)]
pub struct PreparedSystem {
    frame: IrradianceFrame,
    ambient: Option<Vec<f64>>,
}

impl PreparedSystem {
    pub fn len(&self) -> usize {
        self.frame.irradiance.len()
    }

    pub fn simulate(&self, params: &ParameterSet) -> Result<Vec<f64>, FitError> {
        let base = self
            .frame
            .solar_position
            .iter()
            .zip(&self.frame.irradiance)
            .map(|(sun, irr)| {
                total_irradiance(params.surface_tilt, params.surface_azimuth, sun, irr).global
                    * params.efficiency_size
            });

        match &self.ambient {
            None => Ok(base.collect()),
            Some(ambient) => {
                let coefficient = params.temp_coefficient.ok_or(FitError::MissingParameter("temp_coefficient"))?;
                let baseline = params.temp_baseline.ok_or(FitError::MissingParameter("temp_baseline"))?;
                Ok(base
                    .zip(ambient)
                    .map(|(p, t)| p * (1.0 + coefficient * (baseline - t)))
                    .collect())
            }
        }
    }
}
