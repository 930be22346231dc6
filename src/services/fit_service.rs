use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::{FitConfig, SiteConfig, WeatherSourceConfig};
use crate::error::{AppError, FitError};
use crate::models::fit::ParameterSet;
use crate::models::profile::MeasuredProfile;
use crate::models::report::{SearchSummary, SiteFitReport, SiteStatus};
use crate::models::weather::WeatherTable;
use crate::services::dataset::{load_profile_csv, load_weather_csv};
use crate::services::fitting::{
    compare_models, fit_pv_parameters_main, fit_pv_parameters_temperature, select_temperature_baseline,
    SearchSettings,
};
use crate::services::irradiance::IrradianceModel;
use crate::services::pv_system::PvSystem;
use crate::services::weather_service::WeatherClient;
use crate::shared_state::AppState;

/// Runs both searches and the model comparison for one site.
///
/// `profile` must already be in W. Without weather only Search A runs.
pub fn fit_site(
    site: &SiteConfig,
    settings: &SearchSettings,
    profile: &MeasuredProfile,
    weather: Option<Arc<WeatherTable>>,
) -> Result<SiteFitReport, FitError> {
    let started_at = Utc::now();
    let run_id = Uuid::new_v4();
    info!("[FIT] Site: {} | run {} | {} samples", site.id, run_id, profile.len());

    let clear_sky = PvSystem::new(IrradianceModel::clear_sky(site.latitude, site.longitude));
    let main = fit_pv_parameters_main(&clear_sky, profile, &ParameterSet::default(), settings)?;

    let mut comparison = Vec::new();
    let mut temperature = None;
    let mut temperature_baseline = None;

    if let Some(best) = &main.best {
        if let Some(weather) = &weather {
            let gridded = PvSystem::new(IrradianceModel::gridded(site.latitude, site.longitude, weather.clone()));
            comparison = compare_models(&[clear_sky.clone(), gridded], &best.params, profile)?;
        }

        if site.use_temperature_optimization {
            match &weather {
                Some(weather) => {
                    let thermal = clear_sky.clone().with_ambient_temperature(weather.clone());
                    let baseline = select_temperature_baseline(&thermal, profile, &best.simulated)?;
                    let base = best.params.with_temp_baseline(baseline.temperature_c);
                    let outcome = fit_pv_parameters_temperature(&thermal, profile, &base, settings)?;
                    temperature = Some(SearchSummary::from_outcome(&outcome));
                    temperature_baseline = Some(baseline);
                }
                None => warn!("[FIT] Site: {} | temperature optimisation needs weather data, skipped", site.id),
            }
        }
    } else {
        warn!("[FIT] Site: {} | no valid candidate, later stages skipped", site.id);
    }

    Ok(SiteFitReport {
        site_id: site.id.clone(),
        run_id,
        started_at,
        finished_at: Utc::now(),
        timeline: profile.timeline.as_slice().to_vec(),
        feedin: profile.feedin.clone(),
        main: SearchSummary::from_outcome(&main),
        temperature,
        temperature_baseline,
        comparison,
    })
}

/// Loads the datasets of a site and fits it on the blocking pool.
pub async fn run_site_fit(
    site: &SiteConfig,
    fit: &FitConfig,
    cache_dir: &Path,
    client: &WeatherClient,
) -> Result<SiteFitReport, AppError> {
    let path = site.profile_path.clone();
    let profile_id = site.profile_id.clone();
    let resample = fit.resample_minutes;
    let profile = tokio::task::spawn_blocking(move || -> Result<MeasuredProfile, AppError> {
        let profile = load_profile_csv(&path, profile_id.as_deref())?.to_watts();
        match resample {
            Some(minutes) => Ok(profile.resample(minutes)?),
            None => Ok(profile),
        }
    })
    .await??;

    let weather = match &site.weather {
        None => None,
        Some(WeatherSourceConfig::Csv { path, radiation }) => {
            let path = path.clone();
            let radiation = *radiation;
            let table = tokio::task::spawn_blocking(move || load_weather_csv(&path, &radiation)).await??;
            Some(Arc::new(table))
        }
        Some(WeatherSourceConfig::OpenMeteo {}) => {
            let start = profile.timeline.first().date_naive();
            let end = profile.timeline.last().date_naive();
            let table = client.fetch_archive(site.latitude, site.longitude, start, end, cache_dir).await?;
            Some(Arc::new(table))
        }
    };

    if let Some(weather) = &weather {
        match weather.span() {
            Some((first, last)) => info!(
                "[FIT] Site: {} | weather {} records, {} → {}",
                site.id, weather.len(), first, last
            ),
            None => warn!("[FIT] Site: {} | weather source returned no records", site.id),
        }
    }

    let site = site.clone();
    let settings = fit.search;
    let report = tokio::task::spawn_blocking(move || fit_site(&site, &settings, &profile, weather)).await??;
    Ok(report)
}

/// Fits `site` in the background, publishing progress into `state`.
///
/// The site is marked `Running` before this returns. When a fit is already
/// in flight nothing is spawned and its start time is returned as `Err`.
pub fn spawn_site_fit(state: AppState, site: SiteConfig) -> Result<(), DateTime<Utc>> {
    state.try_start(&site.id)?;
    tokio::spawn(async move {
        let result = run_site_fit(&site, &state.config.fit, &state.config.cache_dir, &state.client).await;
        match result {
            Ok(report) => {
                info!("[FIT] Site: {} | done in {} ms", site.id, (report.finished_at - report.started_at).num_milliseconds());
                state.set_status(&site.id, SiteStatus::Done(Arc::new(report)));
            }
            Err(e) => {
                error!("[FIT] Site: {} | failed: {}", site.id, e);
                state.set_status(&site.id, SiteStatus::Failed { message: e.to_string(), at: Utc::now() });
            }
        }
    });
    Ok(())
}
