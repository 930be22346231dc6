//! ============================================================
//!  Solar geometry
//!
//!   1. Fractional year  – day of year + UTC hour
//!   2. Declination / equation of time (Spencer 1971)
//!   3. True solar time → hour angle
//!   4. Zenith, elevation, azimuth (N = 0°, clockwise)
//!   5. Apparent angles with atmospheric refraction (Bennett 1982)
//! ============================================================

use chrono::{DateTime, Datelike, Timelike, Utc};
use std::f64::consts::PI;

const DEG: f64 = PI / 180.0;

/// Site coordinates in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// Sun position for one timestamp, all angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolarPosition {
    pub zenith: f64,
    pub apparent_zenith: f64,
    pub elevation: f64,
    pub apparent_elevation: f64,
    pub azimuth: f64,
}

/// Fractional year angle (rad) used by the Spencer series.
pub(crate) fn fractional_year(utc: DateTime<Utc>) -> f64 {
    let doy = utc.ordinal() as f64;
    2.0 * PI * (doy - 1.0 + (utc_hour(utc) - 12.0) / 24.0) / 365.0
}

fn utc_hour(utc: DateTime<Utc>) -> f64 {
    utc.hour() as f64 + utc.minute() as f64 / 60.0 + utc.second() as f64 / 3600.0
}

pub fn solar_position(location: &Location, utc: DateTime<Utc>) -> SolarPosition {
    let b = fractional_year(utc);

    // Declination (rad)
    let decl = 0.006918
        - 0.399912 * b.cos()
        + 0.070257 * b.sin()
        - 0.006758 * (2.0 * b).cos()
        + 0.000907 * (2.0 * b).sin()
        - 0.002697 * (3.0 * b).cos()
        + 0.00148 * (3.0 * b).sin();

    // Equation of time (minutes)
    let eot_min = 229.18
        * (0.000075
            + 0.001868 * b.cos()
            - 0.032077 * b.sin()
            - 0.014615 * (2.0 * b).cos()
            - 0.04089 * (2.0 * b).sin());

    // True solar time from UTC and longitude, no time-zone guesswork
    let tst_h = utc_hour(utc) + location.longitude / 15.0 + eot_min / 60.0;
    let omega_deg = 15.0 * (tst_h - 12.0);
    let omega_deg = (omega_deg + 180.0).rem_euclid(360.0) - 180.0;
    let omega = omega_deg * DEG;

    let lat = location.latitude * DEG;
    let cos_zenith = (lat.sin() * decl.sin() + lat.cos() * decl.cos() * omega.cos()).clamp(-1.0, 1.0);
    let zenith_rad = cos_zenith.acos();
    let zenith = zenith_rad / DEG;
    let elevation = 90.0 - zenith;

    let denom = zenith_rad.sin() * lat.cos();
    let cos_az = if denom.abs() > 1e-9 {
        (decl.sin() - cos_zenith * lat.sin()) / denom
    } else {
        0.0
    };
    let az_abs = cos_az.clamp(-1.0, 1.0).acos() / DEG;
    let azimuth = if omega_deg > 0.0 { 360.0 - az_abs } else { az_abs };

    let apparent_elevation = elevation + refraction(elevation);

    SolarPosition {
        zenith,
        apparent_zenith: 90.0 - apparent_elevation,
        elevation,
        apparent_elevation,
        azimuth: azimuth.rem_euclid(360.0),
    }
}

/// Refraction correction (deg) for a true elevation (deg).
#[inline]
fn refraction(elevation: f64) -> f64 {
    if elevation <= -1.0 {
        return 0.0;
    }
    let arcmin = 1.02 / ((elevation + 10.3 / (elevation + 5.11)) * DEG).tan();
    arcmin / 60.0
}
