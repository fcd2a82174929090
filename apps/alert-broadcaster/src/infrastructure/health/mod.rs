//! Health Check and Metrics Endpoint
//!
//! HTTP endpoint for health checks, broadcast status reporting, and
//! Prometheus metrics. Used by container orchestrators, load balancers,
//! and monitoring systems.
//!
//! # Endpoints
//!
//! - `GET /health` - Returns JSON health status
//! - `GET /healthz` - Kubernetes liveness probe (simple OK)
//! - `GET /readyz` - Kubernetes readiness probe (checks the tick loop)
//! - `GET /metrics` - Prometheus metrics in text format

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::services::{BroadcastScheduler, ConnectionManager};
use crate::domain::schedule::TierClock;
use crate::infrastructure::metrics::get_metrics_handle;

/// A tick loop older than this is considered stalled.
const STALE_TICK_SECS: i64 = 10;

// =============================================================================
// Health Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status: "healthy", "degraded", or "unhealthy".
    pub status: HealthStatus,
    /// Broadcaster version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Broadcast tick loop status.
    pub scheduler: SchedulerStatus,
    /// Active client count.
    pub clients: ClientStatus,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All systems operational.
    Healthy,
    /// Some systems degraded but functional.
    Degraded,
    /// Critical systems unavailable.
    Unhealthy,
}

/// Broadcast tick loop status.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    /// Wall-clock time of the most recent tick.
    pub last_tick_at: Option<DateTime<Utc>>,
    /// Whether the tick loop has fired recently.
    pub ticking: bool,
    /// Pending alert count per tier.
    pub queue_depths: Vec<QueueDepth>,
}

/// Pending alert count for one tier.
#[derive(Debug, Clone, Serialize)]
pub struct QueueDepth {
    /// Tier name.
    pub tier: String,
    /// Alerts waiting for the next boundary.
    pub pending: usize,
    /// Minute-of-hour of the next boundary, absent for immediate tiers.
    pub next_boundary_minute: Option<u32>,
}

/// Active client information.
#[derive(Debug, Clone, Serialize)]
pub struct ClientStatus {
    /// Total active WebSocket clients.
    pub total: usize,
}

// =============================================================================
// Health Server State
// =============================================================================

/// Shared state for the health server.
pub struct HealthServerState {
    version: String,
    started_at: Instant,
    scheduler: Arc<BroadcastScheduler>,
    connections: Arc<ConnectionManager>,
}

impl HealthServerState {
    /// Create new health server state.
    #[must_use]
    pub fn new(
        version: String,
        scheduler: Arc<BroadcastScheduler>,
        connections: Arc<ConnectionManager>,
    ) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            scheduler,
            connections,
        }
    }
}

// =============================================================================
// Health Server
// =============================================================================

/// Health check HTTP server.
pub struct HealthServer {
    port: u16,
    state: Arc<HealthServerState>,
    cancel: CancellationToken,
}

impl HealthServer {
    /// Create a new health server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<HealthServerState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the health server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HealthServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), HealthServerError> {
        let app = Router::new()
            .route("/health", get(health_handler))
            .route("/healthz", get(liveness_handler))
            .route("/readyz", get(readiness_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| HealthServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "Health server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| HealthServerError::ServerFailed(e.to_string()))?;

        tracing::info!("Health server stopped");
        Ok(())
    }
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn health_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    let response = build_health_response(&state, Utc::now());
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    let response = build_health_response(&state, Utc::now());

    // Ready once the tick loop has fired and has not stalled
    if response.scheduler.ticking {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            let body = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
        },
    )
}

fn build_health_response(state: &HealthServerState, now: DateTime<Utc>) -> HealthResponse {
    let stats = state.scheduler.stats();
    let ticking = is_ticking(stats.last_tick_at, now);

    let queue_depths = stats
        .queue_depths
        .iter()
        .map(|(tier, pending)| QueueDepth {
            tier: tier.as_str().to_string(),
            pending: *pending,
            next_boundary_minute: TierClock::next_boundary_minute(*tier, now),
        })
        .collect();

    HealthResponse {
        status: if ticking {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        },
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: now,
        scheduler: SchedulerStatus {
            last_tick_at: stats.last_tick_at,
            ticking,
            queue_depths,
        },
        clients: ClientStatus {
            total: state.connections.connection_count(),
        },
    }
}

fn is_ticking(last_tick_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    last_tick_at.is_some_and(|t| now - t < Duration::seconds(STALE_TICK_SECS))
}

// =============================================================================
// Errors
// =============================================================================

/// Health server errors.
#[derive(Debug, thiserror::Error)]
pub enum HealthServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================
