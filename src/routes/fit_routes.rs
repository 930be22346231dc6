use axum::{routing::{get, post}, Router};
use crate::controllers::fit_controller::{
    // Sites & fits
    list_sites, get_site_fit, get_candidates, get_series, refit_site,
    // Service
    get_health,
};
use crate::shared_state::SharedState;

/// Build the `/api/*` sub-router.
/// Handlers extract `State<AppState>` and/or `State<Arc<Config>>` via
/// `FromRef<SharedState>`, so a single `.with_state(shared)` covers both.
pub fn api_routes(shared: SharedState) -> Router {
    Router::new()
        .route("/sites",                   get(list_sites))
        .route("/sites/{id}/fit",          get(get_site_fit))
        .route("/sites/{id}/candidates",   get(get_candidates))
        .route("/sites/{id}/series",       get(get_series))
        .route("/sites/{id}/refit",        post(refit_site))
        .route("/health",                  get(get_health))
        .with_state(shared)
}
