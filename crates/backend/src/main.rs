mod config;
mod detector;
mod error;
mod routes;
mod storage;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use axum::http::HeaderValue;
use axum::{extract::State, response::Html, routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use config::Config;
use detector::Detector;
use routes::AppState;
use storage::Storage;

/// Build a cache-controlled static file router.
///
/// Separated so tests can exercise the caching layer with arbitrary directories.
fn cached_static_router(dir: &Path, cache_header: &'static str) -> Router {
    let layer = SetResponseHeaderLayer::overriding(
        axum::http::header::CACHE_CONTROL,
        HeaderValue::from_static(cache_header),
    );
    Router::new()
        .fallback_service(ServeDir::new(dir))
        .layer(layer)
}

const CACHE_1DAY: &str = "public, max-age=86400, must-revalidate";
const CACHE_IMMUTABLE: &str = "public, max-age=31536000, immutable";

/// Build the full application router.
fn build_app(state: AppState) -> Router {
    // Static file routers are stateless, merge them before adding app state
    let static_files = Router::new()
        .nest(
            "/api/image",
            cached_static_router(&state.config.upload_dir, CACHE_1DAY),
        )
        .nest(
            "/assets",
            cached_static_router(&state.config.dist_dir.join("assets"), CACHE_IMMUTABLE),
        );

    Router::new()
        .route("/", get(serve_index))
        .merge(routes::api_router())
        .with_state(state)
        .merge(static_files)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn serve_index(State(state): State<AppState>) -> Html<String> {
    // Serve the built frontend, fall back to a simple message
    match tokio::fs::read_to_string(state.config.dist_dir.join("index.html")).await {
        Ok(html) => Html(html),
        Err(_) => Html(
            r#"<!DOCTYPE html>
<html>
<head><title>PhotoMOA</title></head>
<body>
<h1>PhotoMOA</h1>
<p>Frontend not built yet. The API is available under <code>/api</code>.</p>
</body>
</html>"#
                .to_string(),
        ),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::from_env().context("Invalid configuration")?;
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    std::fs::create_dir_all(&config.upload_dir).context("Failed to create upload directory")?;

    let storage = Storage::open(&config.db_path).map_err(anyhow::Error::msg)?;
    let detector = Detector::from_url(config.detector_url.clone());
    if matches!(detector, Detector::Disabled) {
        tracing::warn!("DETECTOR_URL not set, uploads will start with no detected shots");
    }

    let port = config.port;
    let state = AppState {
        storage,
        config: Arc::new(config),
        detector: Arc::new(detector),
    };
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    tracing::info!("Server running at http://localhost:{}", port);

    axum::serve(listener, app).await?;
    Ok(())
}
