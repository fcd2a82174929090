//! VolSpike Alert Broadcaster Binary
//!
//! Starts the tier-synchronized alert broadcast service.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin alert-broadcaster
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `VOLSPIKE_INGEST_API_KEY`: Shared key the monitoring jobs present
//! - `VOLSPIKE_JWT_SECRET`: HS256 secret for client JWT validation
//!
//! ## Optional
//! - `VOLSPIKE_HTTP_PORT`: WebSocket/ingestion port (default: 8080)
//! - `VOLSPIKE_HEALTH_PORT`: Health check HTTP port (default: 8082)
//! - `VOLSPIKE_TICK_INTERVAL_MS`: Scheduler tick period (default: 1000)
//! - `VOLSPIKE_ELITE_QUEUE_CAP` / `VOLSPIKE_PRO_QUEUE_CAP` /
//!   `VOLSPIKE_FREE_QUEUE_CAP`: Per-tier pending-batch caps (default: 256)
//! - `VOLSPIKE_OUTBOUND_CAPACITY`: Per-connection channel size (default: 64)
//! - `VOLSPIKE_HISTORY_CAPACITY`: Reconnect catch-up window (default: 50)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: true)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4318>)
//! - `OTEL_SERVICE_NAME`: Service name (default: volspike-alert-broadcaster)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;

use alert_broadcaster::infrastructure::telemetry;
use alert_broadcaster::{
    AlertHistory, AlertQueue, ApiServer, ApiServerState, BroadcastScheduler, BroadcasterConfig,
    ConnectionManager, HealthServer, HealthServerState, JwtTierResolver, RingHistory, RoomRegistry,
    init_metrics,
};
use chrono::Utc;
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_dotenv();

    // Initialize telemetry (OpenTelemetry + tracing)
    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting VolSpike Alert Broadcaster");

    // Initialize Prometheus metrics
    let _metrics_handle = init_metrics();

    let config = BroadcasterConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    // Wire the broadcast core
    let queue_settings = config.queue.clone();
    let queue = Arc::new(AlertQueue::new(move |tier| queue_settings.cap_for(tier)));
    let registry = Arc::new(RoomRegistry::new());
    let history: Arc<dyn AlertHistory> =
        Arc::new(RingHistory::new(config.delivery.history_capacity));
    let connections = Arc::new(ConnectionManager::new(
        Arc::clone(&registry),
        Arc::clone(&history),
        config.delivery.outbound_capacity,
    ));
    let scheduler = Arc::new(BroadcastScheduler::new(
        Arc::clone(&queue),
        Arc::clone(&registry),
        Arc::clone(&connections),
        Arc::clone(&history),
        config.scheduler.tick_interval,
        Utc::now(),
    ));

    let resolver = Arc::new(JwtTierResolver::new(config.secrets.jwt_secret()));

    // Initialize API server (ingestion + WebSocket)
    let api_state = Arc::new(ApiServerState::new(
        config.secrets.ingest_api_key().to_string(),
        Arc::clone(&queue),
        resolver,
        Arc::clone(&connections),
    ));
    let api_server = ApiServer::new(config.server.http_port, api_state, shutdown_token.clone());

    // Initialize health server
    let health_state = Arc::new(HealthServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        Arc::clone(&scheduler),
        Arc::clone(&connections),
    ));
    let health_server = HealthServer::new(
        config.server.health_port,
        health_state,
        shutdown_token.clone(),
    );

    // Spawn the broadcast scheduler tick loop
    let scheduler_shutdown = shutdown_token.clone();
    tokio::spawn(async move {
        scheduler.run(scheduler_shutdown).await;
    });

    // Spawn health server
    tokio::spawn(async move {
        if let Err(e) = health_server.run().await {
            tracing::error!(error = %e, "Health server error");
        }
    });

    // Spawn API server
    tokio::spawn(async move {
        if let Err(e) = api_server.run().await {
            tracing::error!(error = %e, "API server error");
        }
    });

    tracing::info!("Alert broadcaster ready");

    await_shutdown(shutdown_token).await;

    tracing::info!("Alert broadcaster stopped");
    Ok(())
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &BroadcasterConfig) {
    tracing::info!(
        http_port = config.server.http_port,
        health_port = config.server.health_port,
        tick_interval_ms = config.scheduler.tick_interval.as_millis() as u64,
        elite_cap = config.queue.elite_cap,
        pro_cap = config.queue.pro_cap,
        free_cap = config.queue.free_cap,
        outbound_capacity = config.delivery.outbound_capacity,
        history_capacity = config.delivery.history_capacity,
        "Configuration loaded"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();
    tracing::info!("Graceful shutdown started");
}
