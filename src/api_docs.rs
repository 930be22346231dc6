use utoipa::OpenApi;
use crate::controllers::fit_controller;
use crate::models::{fit, report, weather};

#[derive(OpenApi)]
#[openapi(
    paths(
        fit_controller::list_sites,
        fit_controller::get_site_fit,
        fit_controller::get_candidates,
        fit_controller::get_series,
        fit_controller::refit_site,
        fit_controller::get_health
    ),
    components(
        schemas(
            fit::ParameterSet,
            report::SiteSummary,
            report::SiteFitView,
            report::CandidateSummary,
            report::BaselinePoint,
            report::ModelComparison,
            report::SeriesView,
            report::HealthStatus,
            fit_controller::SearchKind,
            weather::RadiationEncoding
        )
    ),
    tags(
        (name = "pv-fit", description = "PV parameter estimation API")
    )
)]
pub struct ApiDoc;
