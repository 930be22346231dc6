mod routes;
mod controllers;
mod services;
mod models;
mod api_docs;
mod shared_state;
mod config;
mod error;

use std::net::SocketAddr;
use std::sync::Arc;
use axum::{Router, routing::get, response::Html};
use crate::routes::fit_routes::api_routes;
use utoipa::OpenApi;
use utoipa_scalar::Scalar;
use crate::api_docs::ApiDoc;
use crate::shared_state::{AppState, SharedState};
use crate::config::Config;
use crate::services::fit_service::spawn_site_fit;
use crate::services::weather_service::WeatherClient;

use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // Initialize tracing (respects RUST_LOG env var)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // 1. Load configuration
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.json".to_string());
    let config = match Config::load(&config_path) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            error!("Failed to load {}: {}", config_path, e);
            return;
        }
    };
    info!("Configuration loaded: {} sites", config.sites.len());

    // 2. Initialize shared state
    let client = match WeatherClient::new() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to build weather client: {}", e);
            return;
        }
    };
    let state = AppState::new(config.clone(), client);

    // 3. Fit every site in the background
    for site in &config.sites {
        if let Err(since) = spawn_site_fit(state.clone(), site.clone()) {
            warn!("[FIT] Site: {} | already running since {}", site.id, since);
        }
    }

    // 4. Start Axum HTTP server
    let shared = SharedState { app: state };
    let mut app = Router::new()
        .nest("/api", api_routes(shared))
        .route("/scalar", get(|| async {
            Html(Scalar::new(ApiDoc::openapi()).to_html())
        }));
    if let Some(dir) = &config.server.static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }
    let app = app
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("API Server listening on http://{}", addr);
    info!("Scalar UI: http://{}/scalar", addr);

    if let Err(e) = axum_server::bind(addr)
        .serve(app.into_make_service())
        .await
    {
        error!("HTTP server error: {}", e);
    }
}
