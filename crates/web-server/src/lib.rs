//! # Observatory Web Server Crate
//!
//! This crate serves the interactive dashboard: one HTML page and the JSON
//! endpoints it reads.
//!
//! ## Architectural Principles
//!
//! - **Read Only:** Handlers only read the store; every table is produced by the
//!   pipeline commands.
//! - **Filter-Scoped Aggregation:** The only computation done here is summing and
//!   reshaping the rows of the selected years (`aggregate`).
//!
//! ## Public API
//!
//! - `run_server`: Connects to the store and serves until the process stops.
//! - `app`: Builds the router over an existing repository.
//! - `AppError`: The error type turned into JSON error responses.

use axum::{routing::get, Router};
use configuration::Config;
use database::DbRepository;
use std::sync::Arc;
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

// Declare the modules that constitute this crate.
pub mod aggregate;
pub mod error;
pub mod handlers;

pub use error::AppError;

/// The shared application state that all handlers can access.
#[derive(Clone)]
pub struct AppState {
    pub repo: DbRepository,
}

/// Builds the dashboard router.
pub fn app(repo: DbRepository) -> Router {
    let app_state = Arc::new(AppState { repo });
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods(Any)
        .allow_headers(AllowHeaders::any());

    Router::new()
        .route("/", get(handlers::index))
        .route("/api/health", get(|| async { "OK" }))
        .route("/api/bounds", get(handlers::get_bounds))
        .route("/api/metrics", get(handlers::get_metrics))
        .route("/api/series", get(handlers::get_series))
        .route("/api/seasonality", get(handlers::get_seasonality))
        .route("/api/detail", get(handlers::get_detail))
        .route("/api/categories", get(handlers::get_categories))
        .route("/api/insights", get(handlers::get_insights))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// The main function to configure and run the web server.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let addr = config.server.socket_addr()?;

    let pool = database::connect(&config.store.database).await?;
    database::run_migrations(&pool).await?;
    let repo = DbRepository::new(pool);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Dashboard listening on http://{}", addr);
    axum::serve(listener, app(repo)).await?;

    Ok(())
}
