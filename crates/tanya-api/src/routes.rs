//! Router setup with all API routes and middleware.
//!
//! Configures the axum Router with CORS, tracing, compression, static chart
//! serving, and all endpoint handlers.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use tanya_core::config::{resolve_path, TanyaConfig};
use tanya_core::error::TanyaError;

use crate::handlers;
use crate::rate_limit::RateLimiter;
use crate::state::AppState;

/// Origins allowed by CORS: the server's own address plus configured extras.
fn allowed_origins(config: &TanyaConfig) -> Vec<HeaderValue> {
    let port = config.server.port;
    let mut origins = vec![
        format!("http://{}:{}", config.server.host, port),
        format!("http://localhost:{}", port),
    ];
    origins.extend(config.server.allowed_origins.iter().cloned());
    origins.dedup();

    origins
        .into_iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect()
}

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins(&config)))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    // Routes that do NOT require authentication.
    let mut public_routes = Router::new().route("/health", get(handlers::health));

    let public_url = config.chart.public_url.trim_end_matches('/');
    if public_url.starts_with('/') {
        let chart_dir = resolve_path(&config.chart.output_dir);
        public_routes = public_routes.nest_service(public_url, ServeDir::new(chart_dir));
    } else {
        tracing::warn!(
            public_url = %config.chart.public_url,
            "chart.public_url is not a local path; chart images will not be served"
        );
    }

    let limiter = RateLimiter::new(config.server.rate_limit_per_sec);

    // Everything under /api requires a bearer token and is rate limited per user.
    let protected_routes = Router::new()
        .route(
            "/api/conversations",
            get(handlers::list_conversations).post(handlers::start_conversation),
        )
        .route("/api/conversations/{id}", get(handlers::show_conversation))
        .route("/api/conversations/{id}/ask", post(handlers::ask))
        .route("/api/models", get(handlers::list_models))
        .layer(axum::middleware::from_fn(
            crate::rate_limit::rate_limit_middleware,
        ))
        .layer(axum::Extension(limiter))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::auth::require_auth,
        ));

    public_routes
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1MB global limit
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on the configured address and serve until Ctrl-C.
pub async fn start_server(config: &TanyaConfig, state: AppState) -> Result<(), TanyaError> {
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| TanyaError::Api(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!(addr = %addr, "API server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| TanyaError::Api(format!("Server error: {}", e)))?;

    tracing::info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
