use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::fit::{CandidateResult, ParameterSet, SearchOutcome};

// ─── Fit report ──────────────────────────────────────────────────────────────

/// Everything one fit run produced for a site.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SiteFitReport {
    pub site_id: String,
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Timestamps of the measured profile (after resampling)
    pub timeline: Vec<DateTime<Utc>>,
    /// Measured feed-in power (W)
    pub feedin: Vec<f64>,
    pub main: SearchSummary,
    pub temperature: Option<SearchSummary>,
    pub temperature_baseline: Option<BaselinePoint>,
    pub comparison: Vec<ModelComparison>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SearchSummary {
    pub candidate_count: usize,
    pub valid_count: usize,
    pub candidates: Vec<CandidateSummary>,
    pub best: Option<BestResult>,
}

impl SearchSummary {
    pub fn from_outcome(outcome: &SearchOutcome) -> Self {
        Self {
            candidate_count: outcome.candidates.len(),
            valid_count: outcome.valid_count(),
            candidates: outcome.candidates.iter().map(CandidateSummary::from).collect(),
            best: outcome.best.as_ref().map(BestResult::from),
        }
    }
}

/// Candidate without its simulated series.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CandidateSummary {
    pub params: ParameterSet,
    /// RMSE against measured feed-in (W); null when undefined
    pub error: f64,
    pub valid: bool,
}

impl From<&CandidateResult> for CandidateSummary {
    fn from(c: &CandidateResult) -> Self {
        Self { params: c.params, error: c.error, valid: c.valid }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BestResult {
    pub params: ParameterSet,
    pub simulated: Vec<f64>,
    pub error: f64,
    pub valid: bool,
}

impl From<&CandidateResult> for BestResult {
    fn from(c: &CandidateResult) -> Self {
        Self { params: c.params, simulated: c.simulated.clone(), error: c.error, valid: c.valid }
    }
}

/// Timestamp whose ambient temperature became the temperature baseline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct BaselinePoint {
    pub timestamp: DateTime<Utc>,
    pub temperature_c: f64,
}

/// Error of one irradiance model with the fitted parameters.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ModelComparison {
    pub model: String,
    pub error: f64,
}

// ─── Site status ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum SiteStatus {
    Pending,
    Running { since: DateTime<Utc> },
    Done(Arc<SiteFitReport>),
    Failed { message: String, at: DateTime<Utc> },
}

impl SiteStatus {
    pub fn label(&self) -> &'static str {
        match self {
            SiteStatus::Pending => "PENDING",
            SiteStatus::Running { .. } => "RUNNING",
            SiteStatus::Done(_) => "DONE",
            SiteStatus::Failed { .. } => "FAILED",
        }
    }

    pub fn report(&self) -> Option<&Arc<SiteFitReport>> {
        match self {
            SiteStatus::Done(report) => Some(report),
            _ => None,
        }
    }
}

// ─── REST API response types ──────────────────────────────────────────────────

#[derive(Debug, Serialize, ToSchema)]
pub struct SiteSummary {
    pub id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SiteFitView {
    pub site_id: String,
    pub status: String,
    pub message: Option<String>,
    pub run_id: Option<Uuid>,
    pub finished_at: Option<DateTime<Utc>>,
    pub main_best: Option<CandidateSummary>,
    pub main_candidates: usize,
    pub main_valid: usize,
    pub temperature_best: Option<CandidateSummary>,
    pub temperature_baseline: Option<BaselinePoint>,
    pub comparison: Vec<ModelComparison>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SeriesView {
    pub site_id: String,
    pub timestamps: Vec<DateTime<Utc>>,
    pub feedin_measured: Vec<f64>,
    pub simulated_main: Option<Vec<f64>>,
    pub simulated_temperature: Option<Vec<f64>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub sites_total: usize,
    pub sites_done: usize,
    pub sites_failed: usize,
}
