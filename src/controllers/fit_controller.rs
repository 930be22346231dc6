use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::config::Config;
use crate::models::report::{
    CandidateSummary, HealthStatus, SeriesView, SiteFitView, SiteStatus, SiteSummary,
};
use crate::services::fit_service::spawn_site_fit;
use crate::shared_state::AppState;

fn not_found(what: &str) -> axum::response::Response {
    (StatusCode::NOT_FOUND, Json(serde_json::json!({"error": format!("{} not found", what)}))).into_response()
}

fn conflict(message: String) -> axum::response::Response {
    (StatusCode::CONFLICT, Json(serde_json::json!({"error": message}))).into_response()
}

/// GET /api/sites
/// List all configured sites
///
/// Returns every site from the configuration with the state of its latest fit.
#[utoipa::path(
    get,
    path = "/api/sites",
    responses(
        (status = 200, description = "Configured sites", body = Vec<SiteSummary>)
    )
)]
pub async fn list_sites(State(config): State<Arc<Config>>, State(state): State<AppState>) -> impl IntoResponse {
    let statuses = state.all();
    let sites: Vec<SiteSummary> = config
        .sites
        .iter()
        .map(|s| SiteSummary {
            id: s.id.clone(),
            name: s.name.clone(),
            latitude: s.latitude,
            longitude: s.longitude,
            status: statuses.get(&s.id).map_or("PENDING", |st| st.label()).to_string(),
        })
        .collect();
    Json(sites).into_response()
}

/// GET /api/sites/{id}/fit
/// Fit status and best parameters of a site
#[utoipa::path(
    get,
    path = "/api/sites/{id}/fit",
    params(
        ("id" = String, Path, description = "Unique Site ID")
    ),
    responses(
        (status = 200, description = "Latest fit of the site", body = SiteFitView),
        (status = 404, description = "Site not found")
    )
)]
pub async fn get_site_fit(Path(id): Path<String>, State(state): State<AppState>) -> impl IntoResponse {
    let Some(status) = state.get_status(&id) else {
        return not_found("Site");
    };

    let mut view = SiteFitView {
        site_id: id,
        status: status.label().to_string(),
        message: None,
        run_id: None,
        finished_at: None,
        main_best: None,
        main_candidates: 0,
        main_valid: 0,
        temperature_best: None,
        temperature_baseline: None,
        comparison: Vec::new(),
    };
    match &status {
        SiteStatus::Done(report) => {
            view.run_id = Some(report.run_id);
            view.finished_at = Some(report.finished_at);
            view.main_best = report.main.best.as_ref().map(|b| CandidateSummary { params: b.params, error: b.error, valid: b.valid });
            view.main_candidates = report.main.candidate_count;
            view.main_valid = report.main.valid_count;
            view.temperature_best = report
                .temperature
                .as_ref()
                .and_then(|t| t.best.as_ref())
                .map(|b| CandidateSummary { params: b.params, error: b.error, valid: b.valid });
            view.temperature_baseline = report.temperature_baseline;
            view.comparison = report.comparison.clone();
        }
        SiteStatus::Failed { message, at } => {
            view.message = Some(message.clone());
            view.finished_at = Some(*at);
        }
        SiteStatus::Pending | SiteStatus::Running { .. } => {}
    }
    (StatusCode::OK, Json(view)).into_response()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SearchKind {
    #[default]
    Main,
    Temperature,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CandidateQuery {
    /// Which search to list (default `main`)
    pub search: Option<SearchKind>,
    /// Only return candidates passing the validity check
    pub valid_only: Option<bool>,
}

/// GET /api/sites/{id}/candidates
/// All evaluated candidates of a search, in generation order
#[utoipa::path(
    get,
    path = "/api/sites/{id}/candidates",
    params(
        ("id" = String, Path, description = "Unique Site ID"),
        CandidateQuery
    ),
    responses(
        (status = 200, description = "Candidates with error and validity", body = Vec<CandidateSummary>),
        (status = 404, description = "Site or search not found"),
        (status = 409, description = "Site has no finished fit")
    )
)]
pub async fn get_candidates(
    Path(id): Path<String>,
    Query(query): Query<CandidateQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let Some(status) = state.get_status(&id) else {
        return not_found("Site");
    };
    let Some(report) = status.report() else {
        return conflict(format!("Site {} is {}", id, status.label()));
    };

    let summary = match query.search.unwrap_or_default() {
        SearchKind::Main => &report.main,
        SearchKind::Temperature => match &report.temperature {
            Some(t) => t,
            None => return not_found("Temperature search"),
        },
    };
    let valid_only = query.valid_only.unwrap_or(false);
    let candidates: Vec<&CandidateSummary> =
        summary.candidates.iter().filter(|c| !valid_only || c.valid).collect();
    Json(candidates).into_response()
}

/// GET /api/sites/{id}/series
/// Measured feed-in next to the best simulated series
#[utoipa::path(
    get,
    path = "/api/sites/{id}/series",
    params(
        ("id" = String, Path, description = "Unique Site ID")
    ),
    responses(
        (status = 200, description = "Aligned time series (W)", body = SeriesView),
        (status = 404, description = "Site not found"),
        (status = 409, description = "Site has no finished fit")
    )
)]
pub async fn get_series(Path(id): Path<String>, State(state): State<AppState>) -> impl IntoResponse {
    let Some(status) = state.get_status(&id) else {
        return not_found("Site");
    };
    let Some(report) = status.report() else {
        return conflict(format!("Site {} is {}", id, status.label()));
    };

    let view = SeriesView {
        site_id: id,
        timestamps: report.timeline.clone(),
        feedin_measured: report.feedin.clone(),
        simulated_main: report.main.best.as_ref().map(|b| b.simulated.clone()),
        simulated_temperature: report
            .temperature
            .as_ref()
            .and_then(|t| t.best.as_ref())
            .map(|b| b.simulated.clone()),
    };
    Json(view).into_response()
}

/// POST /api/sites/{id}/refit
/// Re-run the fit of a site in the background
#[utoipa::path(
    post,
    path = "/api/sites/{id}/refit",
    params(
        ("id" = String, Path, description = "Unique Site ID")
    ),
    responses(
        (status = 202, description = "Fit scheduled"),
        (status = 404, description = "Site not found"),
        (status = 409, description = "A fit is already running")
    )
)]
pub async fn refit_site(Path(id): Path<String>, State(state): State<AppState>) -> impl IntoResponse {
    let Some(site) = state.config.site(&id).cloned() else {
        return not_found("Site");
    };
    if let Err(since) = spawn_site_fit(state, site) {
        return conflict(format!("Site {} is already running since {}", id, since));
    }
    (StatusCode::ACCEPTED, Json(serde_json::json!({"site_id": id, "status": "scheduled"}))).into_response()
}

/// GET /api/health
/// Service liveness and fit counters
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service health", body = HealthStatus)
    )
)]
pub async fn get_health(State(state): State<AppState>) -> impl IntoResponse {
    let all = state.all();
    let count = |label: &str| all.values().filter(|s| s.label() == label).count();
    Json(HealthStatus {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started.elapsed().as_secs(),
        sites_total: all.len(),
        sites_done: count("DONE"),
        sites_failed: count("FAILED"),
    })
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fit::ParameterSet;
    use crate::models::report::{SearchSummary, SiteFitReport};
    use crate::services::weather_service::WeatherClient;
    use axum::body::to_bytes;
    use chrono::Utc;
    use uuid::Uuid;

    fn state() -> AppState {
        let config: Config = serde_json::from_str(
            r#"{
                "server": { "port": 0 },
                "sites": [ { "id": "a", "name": "A", "latitude": 50.0, "longitude": 4.0, "profile_path": "a.csv" } ]
            }"#,
        )
        .unwrap();
        AppState::new(Arc::new(config), WeatherClient::new().unwrap())
    }

    fn done_report() -> SiteFitReport {
        let candidate = |valid: bool, error: f64| CandidateSummary { params: ParameterSet::new(30.0, 180.0, 1.0), error, valid };
        SiteFitReport {
            site_id: "a".into(),
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            timeline: vec![Utc::now()],
            feedin: vec![1.0],
            main: SearchSummary {
                candidate_count: 2,
                valid_count: 1,
                candidates: vec![candidate(false, 1.0), candidate(true, 2.0)],
                best: None,
            },
            temperature: None,
            temperature_baseline: None,
            comparison: Vec::new(),
        }
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_site_is_404() {
        let response = get_site_fit(Path("nope".into()), State(state())).await.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_candidates_require_finished_fit() {
        let state = state();
        let query = || Query(CandidateQuery { search: None, valid_only: None });
        let response = get_candidates(Path("a".into()), query(), State(state.clone())).await.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        state.set_status("a", SiteStatus::Done(Arc::new(done_report())));
        let response = get_candidates(Path("a".into()), query(), State(state.clone())).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await.as_array().map(|a| a.len()), Some(2));

        let valid = Query(CandidateQuery { search: Some(SearchKind::Main), valid_only: Some(true) });
        let response = get_candidates(Path("a".into()), valid, State(state.clone())).await.into_response();
        assert_eq!(body_json(response).await.as_array().map(|a| a.len()), Some(1));

        let temp = Query(CandidateQuery { search: Some(SearchKind::Temperature), valid_only: None });
        let response = get_candidates(Path("a".into()), temp, State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "No temperature search was run");
    }

    #[tokio::test]
    async fn test_refit_rejects_second_request_while_running() {
        let state = state();
        let first = refit_site(Path("a".into()), State(state.clone())).await.into_response();
        assert_eq!(first.status(), StatusCode::ACCEPTED);
        assert_eq!(state.get_status("a").map(|s| s.label()), Some("RUNNING"), "Claimed before the task runs");

        let second = refit_site(Path("a".into()), State(state.clone())).await.into_response();
        assert_eq!(second.status(), StatusCode::CONFLICT);

        let response = refit_site(Path("nope".into()), State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health_counts_sites() {
        let state = state();
        state.set_status("a", SiteStatus::Done(Arc::new(done_report())));
        let body = body_json(get_health(State(state)).await.into_response()).await;
        assert_eq!(body["sites_total"], 1);
        assert_eq!(body["sites_done"], 1);
        assert_eq!(body["sites_failed"], 0);
    }
}
