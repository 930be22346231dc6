//! Irradiance models: clear-sky estimate or gridded weather lookup.
//!
//! Both return solar geometry and the three horizontal components
//! (GHI / DNI / DHI, W/m²) aligned to the requested timeline.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::FitError;
use crate::models::series::Timeline;
use crate::models::weather::{WeatherRecord, WeatherTable};
use crate::services::solar_position::{fractional_year, solar_position, Location, SolarPosition};

// ─── Physical constants ──────────────────────────────────────
const SC: f64 = 1361.0; // Solar constant W/m²
const DEG: f64 = std::f64::consts::PI / 180.0;
/// cos(zenith) below which DNI is forced to zero when derived from GHI/DHI.
const MIN_COS_ZENITH: f64 = 0.0065;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Irradiance {
    pub ghi: f64,
    pub dni: f64,
    pub dhi: f64,
}

/// Solar positions and irradiance, both aligned to one timeline.
#[derive(Debug, Clone)]
pub struct IrradianceFrame {
    pub solar_position: Vec<SolarPosition>,
    pub irradiance: Vec<Irradiance>,
}

#[derive(Debug, Clone)]
pub enum IrradianceModel {
    /// Analytic cloudless-sky estimate; depends only on time and location.
    ClearSky { location: Location },
    /// Observed radiation from a single weather grid cell.
    Gridded { location: Location, weather: Arc<WeatherTable> },
}

impl IrradianceModel {
    pub fn clear_sky(latitude: f64, longitude: f64) -> Self {
        IrradianceModel::ClearSky { location: Location::new(latitude, longitude) }
    }

    pub fn gridded(latitude: f64, longitude: f64, weather: Arc<WeatherTable>) -> Self {
        IrradianceModel::Gridded { location: Location::new(latitude, longitude), weather }
    }

    pub fn location(&self) -> &Location {
        match self {
            IrradianceModel::ClearSky { location } => location,
            IrradianceModel::Gridded { location, .. } => location,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            IrradianceModel::ClearSky { .. } => "clear_sky",
            IrradianceModel::Gridded { .. } => "gridded_weather",
        }
    }

    /// Geometry and irradiance for every timestamp of `timeline`.
    ///
    /// The gridded variant fails with `MissingWeather` on the first
    /// timestamp the weather table does not cover.
    pub fn simulate_irradiance(&self, timeline: &Timeline) -> Result<IrradianceFrame, FitError> {
        let location = self.location();
        let solar_position: Vec<SolarPosition> =
            timeline.iter().map(|t| solar_position(location, *t)).collect();

        let irradiance = match self {
            IrradianceModel::ClearSky { .. } => timeline
                .iter()
                .zip(&solar_position)
                .map(|(t, sp)| clear_sky(*t, sp))
                .collect(),
            IrradianceModel::Gridded { weather, .. } => timeline
                .iter()
                .zip(&solar_position)
                .map(|(t, sp)| complete_irradiance(t, weather.get(t)?, sp.apparent_zenith))
                .collect::<Result<Vec<_>, _>>()?,
        };

        Ok(IrradianceFrame { solar_position, irradiance })
    }
}

// ─── Clear-sky model (Bird & Hulstrom simplified) ────────────
fn clear_sky(utc: DateTime<Utc>, sp: &SolarPosition) -> Irradiance {
    let alpha_deg = sp.apparent_elevation;
    if alpha_deg <= 0.1 {
        return Irradiance::default();
    }
    let sin_alpha = (alpha_deg * DEG).sin();

    // Extraterrestrial irradiance (eccentricity correction)
    let b = fractional_year(utc);
    let e0 = SC * (1.00011
        + 0.034221 * b.cos()
        + 0.00128 * b.sin()
        + 0.000719 * (2.0 * b).cos()
        + 0.000077 * (2.0 * b).sin());

    // Air mass – Kasten & Young (1989)
    let am = (1.0 / (sin_alpha + 0.50572 * (alpha_deg + 6.07995_f64).powf(-1.6364))).max(1.0);

    // Rayleigh
    let tr = (-0.0903 * am.powf(0.84) * (1.0 + am - am.powf(1.01))).exp();
    // Ozone (standard column 0.3 atm-cm)
    let to = 1.0 - 0.0013 * am;
    // Aerosol (Linke turbidity 3.0 – typical continental)
    let tk = 3.0_f64;
    let ta = (-0.09 * tk.powf(0.978) * am.powf(0.9455)).exp();
    // Water vapour (precipitable water 1.5 cm)
    let tw = 1.0 - 0.0075 * am.powf(0.65);

    let total_t = tr * to * ta * tw;
    let dni = 0.9762 * e0 * total_t;
    let dhi = (0.79 * e0 * sin_alpha * (1.0 - total_t) * (0.5 * (1.0 - tr) + back_scatter(ta))
        / (1.0 - am + am.powf(1.02)))
    .max(0.0);
    let ghi = (dni * sin_alpha + dhi).max(0.0);

    Irradiance { ghi, dni, dhi }
}

#[inline]
fn back_scatter(ta: f64) -> f64 {
    // Approximated from Bird (1981) Table 2
    0.5 * (0.92 - ta.ln().abs() / 10.0).clamp(0.2, 0.5)
}

// ─── Component completion ────────────────────────────────────
/// Fills the missing component from `GHI = DNI·cos(z) + DHI`.
pub fn complete_irradiance(
    timestamp: &DateTime<Utc>,
    record: &WeatherRecord,
    zenith_deg: f64,
) -> Result<Irradiance, FitError> {
    let ghi = record.ghi;
    let cos_z = (zenith_deg * DEG).cos();
    match (record.dni, record.dhi) {
        (Some(dni), Some(dhi)) => Ok(Irradiance { ghi, dni, dhi }),
        (Some(dni), None) => Ok(Irradiance { ghi, dni, dhi: (ghi - dni * cos_z).max(0.0) }),
        (None, Some(dhi)) => {
            let dni = if cos_z > MIN_COS_ZENITH { ((ghi - dhi) / cos_z).max(0.0) } else { 0.0 };
            Ok(Irradiance { ghi, dni, dhi })
        }
        (None, None) => Err(FitError::IncompleteWeather { timestamp: *timestamp }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};

    fn june_day() -> Timeline {
        let start = Utc.with_ymd_and_hms(2025, 6, 21, 0, 0, 0).unwrap();
        Timeline::regular(start, TimeDelta::hours(1), 24).unwrap()
    }

    #[test]
    fn test_clear_sky_noon_and_night() {
        let model = IrradianceModel::clear_sky(45.07, 7.69);
        let frame = model.simulate_irradiance(&june_day()).unwrap();
        assert_eq!(frame.irradiance.len(), 24);
        let noon = frame.irradiance[11];
        assert!(noon.ghi > 700.0 && noon.ghi < 1100.0, "GHI at noon {:.0}", noon.ghi);
        assert!(noon.dni > noon.dhi, "Beam should dominate on a clear day");
        assert_eq!(frame.irradiance[0], Irradiance::default(), "No light at midnight");
    }

    #[test]
    fn test_clear_sky_is_deterministic() {
        let model = IrradianceModel::clear_sky(50.85, 4.35);
        let a = model.simulate_irradiance(&june_day()).unwrap();
        let b = model.simulate_irradiance(&june_day()).unwrap();
        assert_eq!(a.irradiance, b.irradiance);
    }

    #[test]
    fn test_completion_closes_identity() {
        let t = Utc.with_ymd_and_hms(2025, 6, 21, 12, 0, 0).unwrap();
        let zenith = 30.0;
        let cos_z = (zenith * DEG).cos();

        let from_dni = WeatherRecord { ghi: 800.0, dni: Some(700.0), ..Default::default() };
        let i = complete_irradiance(&t, &from_dni, zenith).unwrap();
        assert!((i.dni * cos_z + i.dhi - i.ghi).abs() < 1e-9);

        let from_dhi = WeatherRecord { ghi: 800.0, dhi: Some(150.0), ..Default::default() };
        let i = complete_irradiance(&t, &from_dhi, zenith).unwrap();
        assert!((i.dni * cos_z + i.dhi - i.ghi).abs() < 1e-9);

        let none = WeatherRecord { ghi: 800.0, ..Default::default() };
        assert_eq!(complete_irradiance(&t, &none, zenith), Err(FitError::IncompleteWeather { timestamp: t }));
    }

    #[test]
    fn test_completion_clips_negative_diffuse() {
        let t = Utc.with_ymd_and_hms(2025, 6, 21, 12, 0, 0).unwrap();
        // Beam alone exceeds the global reading at this zenith
        let rec = WeatherRecord { ghi: 100.0, dni: Some(800.0), ..Default::default() };
        let i = complete_irradiance(&t, &rec, 30.0).unwrap();
        assert_eq!(i.dhi, 0.0, "DHI must not go negative, got {}", i.dhi);
        assert_eq!(i.dni, 800.0);
        assert_eq!(i.ghi, 100.0);
    }

    #[test]
    fn test_dni_zero_at_horizon() {
        let t = Utc.with_ymd_and_hms(2025, 6, 21, 4, 0, 0).unwrap();
        let rec = WeatherRecord { ghi: 5.0, dhi: Some(4.0), ..Default::default() };
        assert_eq!(complete_irradiance(&t, &rec, 90.0).unwrap().dni, 0.0);
    }

    #[test]
    fn test_gridded_missing_timestamp_propagates() {
        let timeline = june_day();
        let mut table = WeatherTable::new();
        for t in timeline.iter().take(12) {
            table.insert(*t, WeatherRecord { ghi: 100.0, dni: Some(50.0), ..Default::default() });
        }
        let model = IrradianceModel::gridded(45.07, 7.69, Arc::new(table));
        let err = model.simulate_irradiance(&timeline).unwrap_err();
        assert_eq!(err, FitError::MissingWeather { timestamp: timeline.as_slice()[12] });
    }
}
