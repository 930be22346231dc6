use std::path::Path;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::AppError;
use crate::models::weather::{WeatherRecord, WeatherTable};
use crate::services::cache::{read_cache, store_cache};

const ARCHIVE_URL: &str = "https://archive-api.open-meteo.com/v1/archive";
const CACHE_PREFIX: &str = "open-meteo";
const HOURLY_FIELDS: &str = "shortwave_radiation,direct_normal_irradiance,diffuse_radiation,temperature_2m";

/// Raw archive answer, cached as-is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArchiveResponse {
    pub latitude: f64,
    pub longitude: f64,
    pub hourly: ArchiveHourly,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArchiveHourly {
    pub time: Vec<String>,
    pub shortwave_radiation: Vec<Option<f64>>,
    #[serde(default)]
    pub direct_normal_irradiance: Vec<Option<f64>>,
    #[serde(default)]
    pub diffuse_radiation: Vec<Option<f64>>,
    #[serde(default)]
    pub temperature_2m: Vec<Option<f64>>,
}

/// Client for the Open-Meteo historical weather archive
#[derive(Debug, Clone)]
pub struct WeatherClient {
    client: Client,
    base_url: String,
}

impl WeatherClient {
    pub fn new() -> Result<Self, AppError> {
        Self::with_base_url(ARCHIVE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { client, base_url: base_url.to_string() })
    }

    /// Hourly radiation and temperature for one location and date range
    ///
    /// # Arguments
    ///
    /// * 'latitude', 'longitude' - site coordinates
    /// * 'start', 'end' - inclusive UTC date range
    /// * 'cache_dir' - directory to store/fetch existing responses to/from
    pub async fn fetch_archive(
        &self,
        latitude: f64,
        longitude: f64,
        start: NaiveDate,
        end: NaiveDate,
        cache_dir: &Path,
    ) -> Result<WeatherTable, AppError> {
        let name = format!("{:.4}_{:.4}-{}-{}", latitude, longitude, start, end);

        let response = if let Some(cached) = read_cache::<ArchiveResponse>(cache_dir, CACHE_PREFIX, &name).await? {
            cached
        } else {
            info!("Downloading archive weather for ({:.4}, {:.4}) {} → {}", latitude, longitude, start, end);
            let req = self.client.get(&self.base_url)
                .query(&[
                    ("latitude", latitude.to_string()),
                    ("longitude", longitude.to_string()),
                    ("start_date", start.to_string()),
                    ("end_date", end.to_string()),
                    ("hourly", HOURLY_FIELDS.to_string()),
                    ("timezone", "GMT".to_string()),
                ])
                .send().await?;

            let status = req.status();
            if !status.is_success() {
                return Err(AppError::HttpStatus(status.as_u16()));
            }

            let response: ArchiveResponse = req.json().await?;
            store_cache(cache_dir, CACHE_PREFIX, &name, &response).await?;
            response
        };

        archive_to_table(&response)
    }
}

/// Converts the columnar archive answer into a weather table.
///
/// Hours without shortwave radiation are dropped; other nulls become
/// missing components.
pub fn archive_to_table(response: &ArchiveResponse) -> Result<WeatherTable, AppError> {
    let hourly = &response.hourly;
    let column = |values: &[Option<f64>], i: usize| values.get(i).copied().flatten();

    let mut table = WeatherTable::new();
    let mut dropped = 0usize;
    for (i, raw) in hourly.time.iter().enumerate() {
        let timestamp = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
            .map_err(|e| AppError::Dataset(format!("archive time `{}`: {}", raw, e)))?
            .and_utc();
        let Some(ghi) = column(&hourly.shortwave_radiation, i) else {
            dropped += 1;
            continue;
        };
        table.insert(timestamp, WeatherRecord {
            ghi,
            dni: column(&hourly.direct_normal_irradiance, i),
            dhi: column(&hourly.diffuse_radiation, i),
            temperature: column(&hourly.temperature_2m, i),
        });
    }
    if dropped > 0 {
        warn!("Archive answer has {} hours without shortwave radiation", dropped);
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample() -> ArchiveResponse {
        serde_json::from_str(
            r#"{
                "latitude": 50.85, "longitude": 4.35, "generationtime_ms": 0.2,
                "hourly": {
                    "time": ["2024-06-01T11:00", "2024-06-01T12:00", "2024-06-01T13:00"],
                    "shortwave_radiation": [610.0, 655.0, null],
                    "direct_normal_irradiance": [520.0, null, 500.0],
                    "diffuse_radiation": [180.0, 190.0, 170.0],
                    "temperature_2m": [18.5, 19.2, 19.8]
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_archive_to_table() {
        let table = archive_to_table(&sample()).unwrap();
        assert_eq!(table.len(), 2, "Hour without GHI should be dropped");
        let noon = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let rec = table.get(&noon).unwrap();
        assert_eq!(rec.ghi, 655.0);
        assert_eq!(rec.dni, None);
        assert_eq!(rec.dhi, Some(190.0));
        assert_eq!(table.temperature_at(&noon).unwrap(), 19.2);
    }

    #[test]
    fn test_bad_time_is_rejected() {
        let mut response = sample();
        response.hourly.time[0] = "noon".to_string();
        assert!(matches!(archive_to_table(&response), Err(AppError::Dataset(_))));
    }

    #[tokio::test]
    async fn test_cached_answer_skips_download() {
        let dir = tempfile::tempdir().unwrap();
        let start = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        store_cache(dir.path(), CACHE_PREFIX, "50.8500_4.3500-2024-06-01-2024-06-01", &sample())
            .await
            .unwrap();

        // Unroutable base URL: any network access would fail the test
        let client = WeatherClient::with_base_url("http://127.0.0.1:9/archive").unwrap();
        let table = client.fetch_archive(50.85, 4.35, start, start, dir.path()).await.unwrap();
        assert_eq!(table.len(), 2);
    }
}
