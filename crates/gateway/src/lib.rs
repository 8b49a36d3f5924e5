//! Operational HTTP surface for chatrelay.
//!
//! Serves the Prometheus scrape endpoint and a JSON health probe. The bot
//! itself never receives traffic here; chat updates arrive by long polling.
//!
//! Built on Axum.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use chatrelay_core::HistoryStore;
use chatrelay_memory::ActivationRegistry;
use chatrelay_telemetry::PrometheusHandle;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

/// Shared state for the gateway handlers.
pub struct GatewayState {
    pub metrics: PrometheusHandle,
    pub activation: Arc<ActivationRegistry>,
    pub history: Arc<dyn HistoryStore>,
    started_at: DateTime<Utc>,
    started: Instant,
}

impl GatewayState {
    pub fn new(
        metrics: PrometheusHandle,
        activation: Arc<ActivationRegistry>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            metrics,
            activation,
            history,
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }
}

type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until `shutdown` resolves.
pub async fn start(
    addr: &str,
    state: SharedState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Metrics gateway listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

// --- Handlers ---

async fn metrics_handler(State(state): State<SharedState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    started_at: String,
    uptime_secs: u64,
    active_chats: usize,
    tracked_users: usize,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        started_at: state.started_at.to_rfc3339(),
        uptime_secs: state.started.elapsed().as_secs(),
        active_chats: state.activation.len(),
        tracked_users: state.history.user_count(),
    })
}
