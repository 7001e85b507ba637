//! Headless Auth Gateway
//!
//! Single-binary Rust service that:
//! 1. Receives the authorization code redirect from the headless frontend
//! 2. Exchanges it (or the refresh-token cookie) at the WordPress backend
//! 3. Keeps the refresh token in an HttpOnly cookie
//! 4. Hands the short-lived access token back to the browser

mod auth;
mod config;
mod metrics;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use headless_auth::HeadlessConfig;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

/// Shared application state accessible from all handlers
#[derive(Clone)]
pub struct AppState {
    pub headless: Arc<HeadlessConfig>,
    pub http: reqwest::Client,
    pub prometheus: PrometheusHandle,
}

/// Build the axum router with all routes and shared state.
pub fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/api/auth/wpe-headless", get(auth::authorize_handler))
        .route("/api/auth/logout", post(auth::logout_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting headless-auth-gateway");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus = metrics::install_recorder();

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    let headless = config.headless();
    info!(
        listen_addr = %config.server.listen_addr,
        backend_url = headless.backend_url(),
        client_secret_configured = headless.client_secret().is_some(),
        "configuration loaded"
    );
    if headless.client_secret().is_none() {
        warn!(
            "no client secret configured; token exchanges will fail until {} is set",
            crate::config::SECRET_ENV_VAR
        );
    }

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.server.timeout_secs))
        .build()
        .context("failed to build HTTP client")?;

    let state = AppState {
        headless: Arc::new(headless),
        http,
        prometheus,
    };
    let app = build_router(state, config.server.max_connections);

    let listen_addr = config.server.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting requests");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shutdown complete");
    Ok(())
}

/// Health endpoint: 200 when exchanges can succeed, 503 when the client
/// secret is missing.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let secret_configured = state.headless.client_secret().is_some();
    let (status_code, status) = if secret_configured {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status_code,
        axum::Json(serde_json::json!({
            "status": status,
            "backend_url": state.headless.backend_url(),
            "client_secret_configured": secret_configured,
        })),
    )
}

/// Prometheus metrics endpoint in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
