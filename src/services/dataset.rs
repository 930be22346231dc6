use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::AppError;
use crate::models::profile::MeasuredProfile;
use crate::models::series::Timeline;
use crate::models::weather::{kelvin_to_celsius, RadiationEncoding, WeatherRecord, WeatherTable};

const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Parses RFC 3339 or a naive timestamp interpreted as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, AppError> {
    let raw = raw.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Ok(t.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
        .map(|n| n.and_utc())
        .ok_or_else(|| AppError::Dataset(format!("unparseable timestamp `{}`", raw)))
}

// ─── Smart-meter profiles ────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ProfileRow {
    timestamp: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    load: Option<f64>,
    #[serde(default)]
    feedin: Option<f64>,
    #[serde(default)]
    production: Option<f64>,
}

/// Loads one smart-meter profile (kW) from CSV.
///
/// Expected header: `timestamp,id,load,feedin,production`; only
/// `timestamp` and `feedin` are required. When `profile_id` is given, rows
/// of other meters are skipped. Empty cells become NaN.
pub fn load_profile_csv(path: &Path, profile_id: Option<&str>) -> Result<MeasuredProfile, AppError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
    let headers = reader.headers()?.clone();
    if !headers.iter().any(|h| h == "feedin") {
        return Err(AppError::Dataset(format!("{}: missing `feedin` column", path.display())));
    }
    let has_production = headers.iter().any(|h| h == "production");
    let has_load = headers.iter().any(|h| h == "load");

    let mut rows: Vec<(DateTime<Utc>, ProfileRow)> = Vec::new();
    for record in reader.deserialize::<ProfileRow>() {
        let row = record?;
        if let (Some(wanted), Some(id)) = (profile_id, row.id.as_deref()) {
            if wanted != id {
                continue;
            }
        }
        rows.push((parse_timestamp(&row.timestamp)?, row));
    }
    if rows.is_empty() {
        return Err(AppError::Dataset(format!("{}: no rows for profile {:?}", path.display(), profile_id)));
    }
    rows.sort_by_key(|(t, _)| *t);
    if let Some(w) = rows.windows(2).find(|w| w[0].0 == w[1].0) {
        return Err(AppError::Dataset(format!("{}: duplicate timestamp {}", path.display(), w[0].0)));
    }

    let nan = |v: Option<f64>| v.unwrap_or(f64::NAN);
    let timeline = Timeline::from_vec(rows.iter().map(|(t, _)| *t).collect())?;
    let feedin = rows.iter().map(|(_, r)| nan(r.feedin)).collect();
    let mut profile = MeasuredProfile::new(timeline, feedin)?;
    if has_production {
        profile = profile.with_production(rows.iter().map(|(_, r)| nan(r.production)).collect())?;
    }
    if has_load {
        profile = profile.with_load(rows.iter().map(|(_, r)| nan(r.load)).collect())?;
    }

    info!(
        "Loaded profile {} from {}: {} samples, {} → {}",
        profile_id.unwrap_or("-"),
        path.display(),
        profile.len(),
        profile.timeline.first(),
        profile.timeline.last()
    );
    Ok(profile)
}

// ─── Weather exports ─────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct WeatherRow {
    timestamp: String,
    // ERA5 names
    #[serde(default)]
    ssrd: Option<f64>,
    #[serde(default)]
    fdir: Option<f64>,
    #[serde(default)]
    t2m: Option<f64>,
    // Plain names
    #[serde(default)]
    ghi: Option<f64>,
    #[serde(default)]
    dni: Option<f64>,
    #[serde(default)]
    dhi: Option<f64>,
    #[serde(default)]
    direct_horizontal: Option<f64>,
    #[serde(default)]
    temperature: Option<f64>,
}

impl WeatherRow {
    fn into_record(self, encoding: &RadiationEncoding) -> Option<WeatherRecord> {
        match encoding {
            RadiationEncoding::Accumulated { .. } => Some(WeatherRecord {
                ghi: encoding.to_rate(self.ssrd?),
                dni: self.fdir.map(|v| encoding.to_rate(v)),
                dhi: None,
                temperature: self.t2m.map(kelvin_to_celsius),
            }),
            RadiationEncoding::Rate => {
                let ghi = self.ghi?;
                let dhi = self.dhi.or_else(|| self.direct_horizontal.map(|b| ghi - b));
                Some(WeatherRecord { ghi, dni: self.dni, dhi, temperature: self.temperature })
            }
        }
    }
}

/// Loads a single-cell weather export.
///
/// Accumulated exports use ERA5 column names (`ssrd`, `fdir` in J/m²,
/// `t2m` in K); rate exports use `ghi`, `dni`, `dhi` or
/// `direct_horizontal` (W/m²) and `temperature` (°C). Rows without global
/// radiation are skipped and later surface as missing weather.
pub fn load_weather_csv(path: &Path, encoding: &RadiationEncoding) -> Result<WeatherTable, AppError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
    let mut table = WeatherTable::new();
    let mut skipped = 0usize;
    for record in reader.deserialize::<WeatherRow>() {
        let row = record?;
        let timestamp = parse_timestamp(&row.timestamp)?;
        match row.into_record(encoding) {
            Some(rec) => table.insert(timestamp, rec),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        debug!("{}: skipped {} rows without global radiation", path.display(), skipped);
    }
    info!("Loaded weather from {}: {} records", path.display(), table.len());
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-06-01T12:00:00Z").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-06-01T14:00:00+02:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-06-01 12:00:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-06-01 12:00").unwrap(), expected);
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_load_profile_filters_and_sorts() {
        let file = write_csv(
            "timestamp,id,load,feedin,production\n\
             2024-06-01 01:00:00,A,0.3,0.0,\n\
             2024-06-01 00:00:00,A,0.2,0.0,0.0\n\
             2024-06-01 00:00:00,B,9.9,9.9,9.9\n\
             2024-06-01 02:00:00,A,0.1,1.5,2.0\n",
        );
        let p = load_profile_csv(file.path(), Some("A")).unwrap();
        assert_eq!(p.len(), 3);
        assert_eq!(p.timeline.first(), Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
        assert_eq!(p.feedin, vec![0.0, 0.0, 1.5]);
        let production = p.production.unwrap();
        assert!(production[1].is_nan());
        assert_eq!(production[2], 2.0);
        assert_eq!(p.load.unwrap()[0], 0.2);
    }

    #[test]
    fn test_load_profile_rejects_duplicates_and_missing_column() {
        let dup = write_csv("timestamp,feedin\n2024-06-01 00:00:00,1\n2024-06-01 00:00:00,2\n");
        assert!(matches!(load_profile_csv(dup.path(), None), Err(AppError::Dataset(_))));

        let no_feedin = write_csv("timestamp,load\n2024-06-01 00:00:00,1\n");
        assert!(matches!(load_profile_csv(no_feedin.path(), None), Err(AppError::Dataset(_))));
    }

    #[test]
    fn test_load_era5_weather() {
        let file = write_csv(
            "timestamp,ssrd,fdir,t2m\n\
             2024-06-01T12:00:00Z,2880000,1800000,293.15\n\
             2024-06-01T13:00:00Z,,,290.0\n",
        );
        let enc = RadiationEncoding::Accumulated { interval_seconds: 3600.0 };
        let table = load_weather_csv(file.path(), &enc).unwrap();
        assert_eq!(table.len(), 1);
        let t = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let rec = table.get(&t).unwrap();
        assert_eq!(rec.ghi, 800.0);
        assert_eq!(rec.dni, Some(500.0));
        assert!((rec.temperature.unwrap() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_load_rate_weather_with_direct_horizontal() {
        let file = write_csv("timestamp,ghi,direct_horizontal,temperature\n2024-06-01 12:00:00,700,550,21.5\n");
        let table = load_weather_csv(file.path(), &RadiationEncoding::Rate).unwrap();
        let rec = table.get(&Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()).unwrap();
        assert_eq!(rec.dhi, Some(150.0));
        assert_eq!(rec.dni, None);
        assert_eq!(rec.temperature, Some(21.5));
    }
}
