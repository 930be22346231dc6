use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::weather::RadiationEncoding;
use crate::services::fitting::SearchSettings;

fn default_cache_dir() -> PathBuf { PathBuf::from("cache") }

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub fit: FitConfig,
    /// Directory for downloaded weather answers
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    pub sites: Vec<SiteConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Served as fallback for paths outside `/api` and `/scalar`
    #[serde(default)]
    pub static_dir: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct FitConfig {
    #[serde(flatten)]
    pub search: SearchSettings,
    /// Mean-resample profiles to this many minutes before fitting
    #[serde(default)]
    pub resample_minutes: Option<u32>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SiteConfig {
    pub id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Smart-meter CSV (kW)
    pub profile_path: PathBuf,
    /// Meter id to select when the CSV holds several profiles
    #[serde(default)]
    pub profile_id: Option<String>,
    #[serde(default)]
    pub weather: Option<WeatherSourceConfig>,
    #[serde(default)]
    pub use_temperature_optimization: bool,
}

/// Where the gridded weather of a site comes from.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum WeatherSourceConfig {
    Csv {
        path: PathBuf,
        radiation: RadiationEncoding,
    },
    /// Hourly archive download for the profile's date span
    OpenMeteo {},
}

impl Config {
    pub fn load(path: &str) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        let invalid = |msg: String| Err(AppError::Config(msg));

        if self.sites.is_empty() {
            return invalid("no sites configured".into());
        }
        let mut seen = HashSet::new();
        for site in &self.sites {
            if !seen.insert(site.id.as_str()) {
                return invalid(format!("duplicate site id `{}`", site.id));
            }
            if !(-90.0..=90.0).contains(&site.latitude) || !(-180.0..=180.0).contains(&site.longitude) {
                return invalid(format!(
                    "site `{}`: coordinates ({}, {}) out of range",
                    site.id, site.latitude, site.longitude
                ));
            }
            if let Some(WeatherSourceConfig::Csv {
                radiation: RadiationEncoding::Accumulated { interval_seconds },
                ..
            }) = &site.weather
            {
                if !(*interval_seconds > 0.0) {
                    return invalid(format!(
                        "site `{}`: accumulation interval_seconds must be positive, got {}",
                        site.id, interval_seconds
                    ));
                }
            }
        }

        let s = &self.fit.search;
        if s.scaling_steps == 0 || s.azimuth_steps == 0 || s.tilt_steps == 0 {
            return invalid("grid step counts must be positive".into());
        }
        if !(s.temp_coefficient_step > 0.0) {
            return invalid(format!("temp_coefficient_step must be positive, got {}", s.temp_coefficient_step));
        }
        for (name, value) in [("lower_tolerance", s.lower_tolerance), ("upper_tolerance", s.upper_tolerance)] {
            if !(0.0..=1.0).contains(&value) {
                return invalid(format!("{} must lie in [0, 1], got {}", name, value));
            }
        }
        if self.fit.resample_minutes == Some(0) {
            return invalid("resample_minutes must be positive".into());
        }
        Ok(())
    }

    pub fn site(&self, id: &str) -> Option<&SiteConfig> {
        self.sites.iter().find(|s| s.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "server": { "port": 8080 },
        "fit": { "scaling_headroom": 2.5, "resample_minutes": 60 },
        "sites": [
            {
                "id": "brussels-01",
                "name": "Brussels rooftop",
                "latitude": 50.85,
                "longitude": 4.35,
                "profile_path": "data/profile.csv",
                "weather": {
                    "source": "csv",
                    "path": "data/era5.csv",
                    "radiation": { "kind": "accumulated", "interval_seconds": 3600 }
                },
                "use_temperature_optimization": true
            },
            {
                "id": "turin-01",
                "name": "Turin",
                "latitude": 45.07,
                "longitude": 7.69,
                "profile_path": "data/turin.csv",
                "weather": { "source": "open_meteo" }
            }
        ]
    }"#;

    fn sample() -> Config {
        serde_json::from_str(SAMPLE).unwrap()
    }

    #[test]
    fn test_defaults_and_overrides() {
        let config = sample();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache_dir, PathBuf::from("cache"));
        assert_eq!(config.fit.search.scaling_headroom, 2.5);
        assert_eq!(config.fit.search.scaling_steps, 5, "Unset fields keep their defaults");
        assert_eq!(config.fit.search.lower_tolerance, 0.1);
        assert_eq!(config.fit.resample_minutes, Some(60));
        assert_eq!(
            config.sites[0].weather,
            Some(WeatherSourceConfig::Csv {
                path: PathBuf::from("data/era5.csv"),
                radiation: RadiationEncoding::Accumulated { interval_seconds: 3600.0 },
            })
        );
        assert_eq!(config.sites[1].weather, Some(WeatherSourceConfig::OpenMeteo {}));
        assert!(!config.sites[1].use_temperature_optimization);
        assert_eq!(config.site("turin-01").map(|s| s.latitude), Some(45.07));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = sample();
        config.sites[1].id = "brussels-01".into();
        assert!(matches!(config.validate(), Err(AppError::Config(_))), "Duplicate ids");

        let mut config = sample();
        config.sites[0].latitude = 91.0;
        assert!(config.validate().is_err(), "Latitude out of range");

        let mut config = sample();
        config.fit.search.tilt_steps = 0;
        assert!(config.validate().is_err(), "Zero tilt steps");

        let mut config = sample();
        config.fit.search.upper_tolerance = 1.5;
        assert!(config.validate().is_err(), "Tolerance above 1");

        let mut config = sample();
        config.sites.clear();
        assert!(config.validate().is_err(), "No sites");

        for interval_seconds in [0.0, -3600.0] {
            let mut config = sample();
            config.sites[0].weather = Some(WeatherSourceConfig::Csv {
                path: PathBuf::from("data/era5.csv"),
                radiation: RadiationEncoding::Accumulated { interval_seconds },
            });
            assert!(
                matches!(config.validate(), Err(AppError::Config(_))),
                "Accumulation interval {} must be rejected",
                interval_seconds
            );
        }
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, SAMPLE).unwrap();
        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.sites.len(), 2);
        assert!(matches!(Config::load("does-not-exist.json"), Err(AppError::Io(_))));
    }
}
