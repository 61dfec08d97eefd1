//! An air quality dashboard.
//!
//! Reads a [PurpleAir](https://www2.purpleair.com/) sensor, serves
//! EPA-corrected AQI and history over HTTP, and polls that API to keep a
//! dashboard up to date.
//!
//! # Running
//! - `aqi-server` needs `PURPLEAIR_API_KEY` (or `--fake` for demo data).
//! - `dashboard` points at a running server with `--url`.
//!
use std::{path::Path, sync::Arc, time::Duration};

pub mod aqi;
pub mod api;
pub mod atmosphere;
pub mod config;
pub mod context;
pub mod dashboard;
pub mod history;
pub mod jokes;
pub mod models;
pub mod stats;

use atmosphere::AirQualitySource;
use axum::Router;
use context::Context;
use tokio::net::TcpListener;
use tower_http::{
    services::{ServeDir, ServeFile},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;

/// Upper bound on handling one request, upstream fetch included.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(45);

/// Set up logging: `RUST_LOG` if set, `info` otherwise.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// The full application: the API plus static files.
pub fn app(source: Arc<dyn AirQualitySource>, static_dir: &Path) -> Router {
    api::router(source)
        .route_service("/", ServeFile::new(static_dir.join("index.html")))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
}

/// Serve until the context is cancelled.
pub async fn serve(listener: TcpListener, app: Router, ctx: Context) -> std::io::Result<()> {
    tracing::info!(
        "http server listening on {}",
        listener
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".into())
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { ctx.cancelled().await })
        .await
}
