//! ============================================================
//!  PV parameter search
//!
//!   Search A – efficiency × azimuth × tilt grid (5 × 7 × 7)
//!   Search B – temperature coefficient sweep (0.003 … 0.007)
//!
//!  Each grid point is simulated, scored by RMSE against measured
//!  feed-in and checked against the validity predicate. The best
//!  result is the lowest-error valid candidate, first one on ties.
//! ============================================================

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::FitError;
use crate::models::fit::{CandidateResult, ParameterSet, SearchOutcome};
use crate::models::profile::MeasuredProfile;
use crate::models::report::{BaselinePoint, ModelComparison};
use crate::models::series::{calendar_daily_max, daily_max, series_max, series_mean};
use crate::services::pv_system::{PreparedSystem, PvSystem};

/// Tolerance of `arange` against floating-point drift in the step count.
const RANGE_EPSILON: f64 = 1e-9;

fn default_tolerance() -> f64 { 0.1 }
fn default_scaling_steps() -> usize { 5 }
fn default_angle_steps() -> usize { 7 }
fn default_scaling_headroom() -> f64 { 3.0 }
fn default_temp_start() -> f64 { 0.003 }
fn default_temp_stop() -> f64 { 0.007 }
fn default_temp_step() -> f64 { 0.0001 }

/// Grid definition and validity tolerances shared by both searches.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SearchSettings {
    #[serde(default = "default_tolerance")]
    pub lower_tolerance: f64,
    #[serde(default = "default_tolerance")]
    pub upper_tolerance: f64,
    #[serde(default = "default_scaling_steps")]
    pub scaling_steps: usize,
    #[serde(default = "default_angle_steps")]
    pub azimuth_steps: usize,
    #[serde(default = "default_angle_steps")]
    pub tilt_steps: usize,
    /// Upper scaling bound as a multiple of measured peak / unscaled peak
    #[serde(default = "default_scaling_headroom")]
    pub scaling_headroom: f64,
    #[serde(default = "default_temp_start")]
    pub temp_coefficient_start: f64,
    #[serde(default = "default_temp_stop")]
    pub temp_coefficient_stop: f64,
    #[serde(default = "default_temp_step")]
    pub temp_coefficient_step: f64,
    /// Evaluate candidates on the rayon pool
    #[serde(default)]
    pub parallel: bool,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            lower_tolerance: default_tolerance(),
            upper_tolerance: default_tolerance(),
            scaling_steps: default_scaling_steps(),
            azimuth_steps: default_angle_steps(),
            tilt_steps: default_angle_steps(),
            scaling_headroom: default_scaling_headroom(),
            temp_coefficient_start: default_temp_start(),
            temp_coefficient_stop: default_temp_stop(),
            temp_coefficient_step: default_temp_step(),
            parallel: false,
        }
    }
}

// ─── Grid helpers ────────────────────────────────────────────

/// `n` evenly spaced values from `start` to `stop`, both included.
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n).map(|i| if i == n - 1 { stop } else { start + step * i as f64 }).collect()
        }
    }
}

/// Values `start + i·step` below `stop`.
pub fn arange(start: f64, stop: f64, step: f64) -> Vec<f64> {
    if step <= 0.0 || stop <= start || !step.is_finite() {
        return Vec::new();
    }
    let n = ((stop - start) / step - RANGE_EPSILON).ceil().max(0.0) as usize;
    (0..n).map(|i| start + step * i as f64).collect()
}

// ─── Scoring ─────────────────────────────────────────────────

/// Root-mean-square error over samples with a measured value.
///
/// NaN measurements are skipped; with nothing left the result is NaN.
pub fn rmse(measured: &[f64], simulated: &[f64]) -> f64 {
    let (sum, n) = measured
        .iter()
        .zip(simulated)
        .filter(|(m, _)| !m.is_nan())
        .fold((0.0, 0usize), |(s, n), (m, p)| (s + (m - p).powi(2), n + 1));
    if n == 0 { f64::NAN } else { (sum / n as f64).sqrt() }
}

/// True when every timestamp is either negligible relative to its daily
/// peak or within `upper` of the measured value.
///
/// Timestamps without a measurement are not checked. A non-finite
/// simulated sample rejects the candidate. On a day whose simulated peak
/// is zero the lower branch never holds and the upper branch reduces to
/// `simulated > measured`.
pub fn is_valid(simulated: &[f64], measured: &[f64], daily_max: &[f64], lower: f64, upper: f64) -> bool {
    simulated
        .iter()
        .zip(measured)
        .zip(daily_max)
        .all(|((&sim, &meas), &dmax)| {
            if !sim.is_finite() {
                return false;
            }
            if meas.is_nan() {
                return true;
            }
            sim < lower * dmax || sim + upper * dmax > meas
        })
}

/// Lowest-error valid candidate; the first one wins ties.
pub fn select_best(candidates: &[CandidateResult]) -> Option<CandidateResult> {
    let mut best: Option<&CandidateResult> = None;
    for c in candidates.iter().filter(|c| c.valid && !c.error.is_nan()) {
        match best {
            Some(b) if b.error <= c.error => {}
            _ => best = Some(c),
        }
    }
    best.cloned()
}

fn evaluate(
    prepared: &PreparedSystem,
    params: ParameterSet,
    profile: &MeasuredProfile,
    settings: &SearchSettings,
) -> Result<CandidateResult, FitError> {
    let simulated = prepared.simulate(&params)?;
    let error = rmse(&profile.feedin, &simulated);
    let dmax = daily_max(&profile.timeline, &simulated);
    let valid = !error.is_nan()
        && is_valid(&simulated, &profile.feedin, &dmax, settings.lower_tolerance, settings.upper_tolerance);

    debug!(
        "eval: k={:.4} azimuth={}° tilt={}° coef={:?} simulated_mean={:.2}W error={:.2}W valid={}",
        params.efficiency_size,
        params.surface_azimuth,
        params.surface_tilt,
        params.temp_coefficient,
        series_mean(&simulated),
        error,
        valid
    );

    Ok(CandidateResult { params, simulated, error, valid })
}

fn evaluate_grid(
    prepared: &PreparedSystem,
    grid: Vec<ParameterSet>,
    profile: &MeasuredProfile,
    settings: &SearchSettings,
) -> Result<SearchOutcome, FitError> {
    debug!("evaluating {} candidates over {} samples", grid.len(), prepared.len());
    // Collect keeps generation order in both paths, so ties resolve identically.
    let candidates: Vec<CandidateResult> = if settings.parallel {
        grid.into_par_iter()
            .map(|p| evaluate(prepared, p, profile, settings))
            .collect::<Result<_, _>>()?
    } else {
        grid.into_iter()
            .map(|p| evaluate(prepared, p, profile, settings))
            .collect::<Result<_, _>>()?
    };
    let best = select_best(&candidates);
    Ok(SearchOutcome { candidates, best })
}

// ─── Search A ────────────────────────────────────────────────

/// Grid search over efficiency size, azimuth and tilt.
///
/// `base` supplies the unscaled reference used to size the efficiency
/// axis and any parameters the grid does not vary.
pub fn fit_pv_parameters_main(
    system: &PvSystem,
    profile: &MeasuredProfile,
    base: &ParameterSet,
    settings: &SearchSettings,
) -> Result<SearchOutcome, FitError> {
    let prepared = system.prepare(&profile.timeline)?;

    let unscaled_peak = series_max(&prepared.simulate(base)?);
    let measured_peak = series_max(&profile.feedin);
    let mut efficiency_range = measured_peak / unscaled_peak * settings.scaling_headroom;
    if !efficiency_range.is_finite() || efficiency_range < 0.0 {
        warn!(
            "Degenerate efficiency range (measured peak {:.2}, unscaled peak {:.2}); collapsing to 0",
            measured_peak, unscaled_peak
        );
        efficiency_range = 0.0;
    }

    let mut grid = Vec::with_capacity(settings.scaling_steps * settings.azimuth_steps * settings.tilt_steps);
    for efficiency_size in linspace(0.0, efficiency_range, settings.scaling_steps) {
        for surface_azimuth in linspace(0.0, 360.0, settings.azimuth_steps) {
            for surface_tilt in linspace(0.0, 90.0, settings.tilt_steps) {
                grid.push(base.with_mounting(surface_tilt, surface_azimuth).with_efficiency_size(efficiency_size));
            }
        }
    }

    let outcome = evaluate_grid(&prepared, grid, profile, settings)?;
    match &outcome.best {
        Some(best) => info!(
            "result_main: k={:.4} azimuth={}° tilt={}° error={:.2}W ({} of {} valid)",
            best.params.efficiency_size,
            best.params.surface_azimuth,
            best.params.surface_tilt,
            best.error,
            outcome.valid_count(),
            outcome.candidates.len()
        ),
        None => info!("result_main: none ({} candidates)", outcome.candidates.len()),
    }
    Ok(outcome)
}

// ─── Search B ────────────────────────────────────────────────

/// Sweep of the temperature coefficient with everything else from `base`.
pub fn fit_pv_parameters_temperature(
    system: &PvSystem,
    profile: &MeasuredProfile,
    base: &ParameterSet,
    settings: &SearchSettings,
) -> Result<SearchOutcome, FitError> {
    let prepared = system.prepare(&profile.timeline)?;

    let grid: Vec<ParameterSet> = arange(
        settings.temp_coefficient_start,
        settings.temp_coefficient_stop,
        settings.temp_coefficient_step,
    )
    .into_iter()
    .map(|c| base.with_temp_coefficient(c))
    .collect();

    let outcome = evaluate_grid(&prepared, grid, profile, settings)?;
    match &outcome.best {
        Some(best) => info!(
            "result_temp: baseline={:.2}°C coefficient={:.4} error={:.2}W ({} of {} valid)",
            best.params.temp_baseline.unwrap_or(f64::NAN),
            best.params.temp_coefficient.unwrap_or(f64::NAN),
            best.error,
            outcome.valid_count(),
            outcome.candidates.len()
        ),
        None => info!("result_temp: none ({} candidates)", outcome.candidates.len()),
    }
    Ok(outcome)
}

// ─── Temperature baseline ────────────────────────────────────

/// Picks the timestamp where the simulated calendar-day peak is closest to
/// the measured feed-in and returns its ambient temperature.
pub fn select_temperature_baseline(
    system: &PvSystem,
    profile: &MeasuredProfile,
    simulated: &[f64],
) -> Result<BaselinePoint, FitError> {
    profile.timeline.check_aligned(simulated)?;
    let dmax = calendar_daily_max(&profile.timeline, simulated);

    let mut closest: Option<(usize, f64)> = None;
    for (i, (d, m)) in dmax.iter().zip(&profile.feedin).enumerate() {
        let gap = (d - m).abs();
        if gap.is_nan() {
            continue;
        }
        if closest.is_none_or(|(_, g)| gap < g) {
            closest = Some((i, gap));
        }
    }
    let (index, _) = closest.ok_or(FitError::EmptyTimeline)?;

    let timestamp: DateTime<Utc> = profile.timeline.as_slice()[index];
    let temperature_c = system.ambient_temperature_at(&timestamp)?;
    info!("temperature baseline: {:.2}°C at {}", temperature_c, timestamp);
    Ok(BaselinePoint { timestamp, temperature_c })
}

// ─── Model comparison ────────────────────────────────────────

/// RMSE of each system against measured production (feed-in if absent).
pub fn compare_models(
    systems: &[PvSystem],
    params: &ParameterSet,
    profile: &MeasuredProfile,
) -> Result<Vec<ModelComparison>, FitError> {
    let target = profile.production_or_feedin();
    systems
        .iter()
        .map(|system| {
            let simulated = system.simulate_pv_power(params, &profile.timeline)?;
            let error = rmse(target, &simulated);
            info!("compare: model={} error={:.2}W", system.label(), error);
            Ok(ModelComparison { model: system.label(), error })
        })
        .collect()
}
