//! HTTP Ingestion and WebSocket Transport
//!
//! The broadcaster's public surface: the monitoring jobs POST alerts in,
//! dashboard clients connect over WebSocket and receive tier-cadenced
//! batches out.
//!
//! # Endpoints
//!
//! - `POST /api/volume-alerts/ingest` - volume spike alerts (`X-API-Key`)
//! - `POST /api/open-interest-alerts/ingest` - OI cross alerts (`X-API-Key`)
//! - `GET /ws?token=<jwt>` - client WebSocket upgrade
//!
//! Ingestion payload field names match what the producing jobs emit, so
//! the scripts need no adapter layer. Client authentication happens
//! before the upgrade completes; a refused token never creates a
//! connection.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::application::ports::TierResolver;
use crate::application::services::{ConnectionGrant, ConnectionManager, OutboundMessage};
use crate::domain::alert::{Alert, AlertKind, Direction};
use crate::domain::queue::AlertQueue;
use crate::infrastructure::metrics::{
    record_alert_ingested, record_ingest_rejected, set_connections,
};

// =============================================================================
// Ingestion Payloads
// =============================================================================

/// Volume spike alert as posted by the hourly volume scanner.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeAlertPayload {
    /// Instrument symbol.
    pub symbol: String,
    /// Quote volume of the current hourly candle.
    pub current_volume: Decimal,
    /// Quote volume of the previous closed hourly candle.
    pub previous_volume: Decimal,
    /// `currentVolume / previousVolume`.
    pub volume_ratio: Decimal,
    /// Last price at scan time.
    pub price: Decimal,
    /// Funding rate at scan time, when the scanner had one.
    #[serde(default)]
    pub funding_rate: Option<Decimal>,
    /// Producer candle direction string (`bullish` / `bearish`).
    #[serde(default)]
    pub candle_direction: Option<String>,
    /// Whether this is a follow-up to an alert earlier in the hour.
    #[serde(default)]
    pub is_update: bool,
    /// Producer alert type label.
    #[serde(default = "default_alert_type")]
    pub alert_type: String,
    /// Producer-rendered message; synthesized when absent.
    #[serde(default)]
    pub message: Option<String>,
}

fn default_alert_type() -> String {
    "INITIAL".to_string()
}

/// Open-interest cross alert as posted by the OI poller.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenInterestAlertPayload {
    /// Instrument symbol.
    pub symbol: String,
    /// Baseline open interest.
    pub baseline: Decimal,
    /// Current open interest.
    pub current: Decimal,
    /// Percent change from baseline (signed).
    pub pct_change: Decimal,
    /// Absolute change from baseline.
    pub abs_change: Decimal,
    /// Producing job identifier, logged only.
    #[serde(default)]
    pub source: Option<String>,
    /// Producer-rendered message; synthesized when absent.
    #[serde(default)]
    pub message: Option<String>,
}

/// Ingestion acknowledgment.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestAck {
    /// Server-assigned alert id.
    pub id: Uuid,
}

// =============================================================================
// WebSocket Wire Messages
// =============================================================================

/// Messages a connected client may send.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Join a symbol room.
    #[serde(rename_all = "camelCase")]
    Subscribe {
        /// Symbol to follow.
        symbol: String,
    },
    /// Leave a symbol room.
    #[serde(rename_all = "camelCase")]
    Unsubscribe {
        /// Symbol to stop following.
        symbol: String,
    },
}

/// Wire form of an outbound message.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum ServerFrame<'a> {
    /// Handshake acknowledgment.
    #[serde(rename_all = "camelCase")]
    Connected {
        tier: &'a str,
        cadence: &'a str,
    },
    /// Recent-history catch-up.
    #[serde(rename_all = "camelCase")]
    Snapshot {
        alerts: &'a [Alert],
    },
    /// A boundary batch.
    #[serde(rename_all = "camelCase")]
    Batch {
        tier: &'a str,
        alerts: &'a [Alert],
        delivered_at: chrono::DateTime<Utc>,
    },
}

fn wire_frame(message: &OutboundMessage) -> Result<String, serde_json::Error> {
    let frame = match message {
        OutboundMessage::Connected { tier, cadence } => ServerFrame::Connected {
            tier: tier.as_str(),
            cadence,
        },
        OutboundMessage::Snapshot { alerts } => ServerFrame::Snapshot { alerts },
        OutboundMessage::Batch(batch) => ServerFrame::Batch {
            tier: batch.tier.as_str(),
            alerts: &batch.alerts,
            delivered_at: batch.delivered_at,
        },
    };
    serde_json::to_string(&frame)
}

// =============================================================================
// API Server State
// =============================================================================

/// Shared state for the ingestion and WebSocket routes.
pub struct ApiServerState {
    ingest_api_key: String,
    queue: Arc<AlertQueue>,
    resolver: Arc<dyn TierResolver>,
    connections: Arc<ConnectionManager>,
}

impl ApiServerState {
    /// Create new API server state.
    #[must_use]
    pub fn new(
        ingest_api_key: String,
        queue: Arc<AlertQueue>,
        resolver: Arc<dyn TierResolver>,
        connections: Arc<ConnectionManager>,
    ) -> Self {
        Self {
            ingest_api_key,
            queue,
            resolver,
            connections,
        }
    }
}

// =============================================================================
// API Server
// =============================================================================

/// Public HTTP/WebSocket server.
pub struct ApiServer {
    port: u16,
    state: Arc<ApiServerState>,
    cancel: CancellationToken,
}

impl ApiServer {
    /// Create a new API server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<ApiServerState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the API server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `ApiServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), ApiServerError> {
        let app = Router::new()
            .route("/api/volume-alerts/ingest", post(ingest_volume_handler))
            .route(
                "/api/open-interest-alerts/ingest",
                post(ingest_open_interest_handler),
            )
            .route("/ws", get(ws_handler))
            .with_state(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ApiServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| ApiServerError::ServerFailed(e.to_string()))?;

        tracing::info!("API server stopped");
        Ok(())
    }
}

// =============================================================================
// Ingestion Handlers
// =============================================================================

fn check_api_key(state: &ApiServerState, headers: &HeaderMap) -> Result<(), Response> {
    let presented = headers.get("x-api-key").and_then(|v| v.to_str().ok());
    if presented == Some(state.ingest_api_key.as_str()) {
        Ok(())
    } else {
        record_ingest_rejected("bad_key");
        tracing::warn!("Ingestion request rejected: bad or missing API key");
        Err((StatusCode::UNAUTHORIZED, "invalid API key").into_response())
    }
}

async fn ingest_volume_handler(
    State(state): State<Arc<ApiServerState>>,
    headers: HeaderMap,
    Json(payload): Json<VolumeAlertPayload>,
) -> Response {
    if let Err(rejected) = check_api_key(&state, &headers) {
        return rejected;
    }

    let direction = Direction::from_candle(payload.candle_direction.as_deref().unwrap_or(""));
    let message = payload.message.unwrap_or_else(|| {
        format!(
            "{} volume {}x previous hour at {}",
            payload.symbol, payload.volume_ratio, payload.price
        )
    });

    let alert = Alert::new(
        payload.symbol,
        AlertKind::VolumeSpike {
            current_volume: payload.current_volume,
            previous_volume: payload.previous_volume,
            volume_ratio: payload.volume_ratio,
            price: payload.price,
            funding_rate: payload.funding_rate,
            is_update: payload.is_update,
            alert_type: payload.alert_type,
        },
        direction,
        message,
        Utc::now(),
    );

    accept_alert(&state, alert)
}

async fn ingest_open_interest_handler(
    State(state): State<Arc<ApiServerState>>,
    headers: HeaderMap,
    Json(payload): Json<OpenInterestAlertPayload>,
) -> Response {
    if let Err(rejected) = check_api_key(&state, &headers) {
        return rejected;
    }

    let direction = if payload.pct_change.is_sign_negative() {
        Direction::Down
    } else {
        Direction::Up
    };
    let message = payload.message.unwrap_or_else(|| {
        format!(
            "{} open interest {}% from baseline",
            payload.symbol, payload.pct_change
        )
    });

    if let Some(source) = &payload.source {
        tracing::debug!(source = %source, symbol = %payload.symbol, "OI alert source");
    }

    let alert = Alert::new(
        payload.symbol,
        AlertKind::OpenInterestCross {
            baseline: payload.baseline,
            current: payload.current,
            pct_change: payload.pct_change,
            abs_change: payload.abs_change,
        },
        direction,
        message,
        Utc::now(),
    );

    accept_alert(&state, alert)
}

fn accept_alert(state: &ApiServerState, alert: Alert) -> Response {
    let id = alert.id;
    record_alert_ingested(alert.kind.label());
    tracing::info!(
        alert_id = %id,
        symbol = %alert.symbol,
        kind = alert.kind.label(),
        "Alert ingested"
    );
    state.queue.enqueue_all(&alert);

    (StatusCode::ACCEPTED, Json(IngestAck { id })).into_response()
}

// =============================================================================
// WebSocket Handler
// =============================================================================

/// Query parameters for the WebSocket upgrade.
#[derive(Debug, Deserialize)]
pub struct WsParams {
    /// Client credential (HS256 JWT).
    token: String,
}

async fn ws_handler(
    State(state): State<Arc<ApiServerState>>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Response {
    // Resolve the credential before completing the upgrade; a refused
    // handshake never touches the registry.
    let client = match state.resolver.resolve(&params.token).await {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!(error = %e, "WebSocket handshake refused");
            return (StatusCode::UNAUTHORIZED, e.to_string()).into_response();
        }
    };

    ws.on_upgrade(move |socket| client_session(state, socket, client))
}

async fn client_session(
    state: Arc<ApiServerState>,
    socket: WebSocket,
    client: crate::application::ports::ResolvedClient,
) {
    let grant = state.connections.connect(&client);
    set_connections(state.connections.connection_count() as f64);

    pump_session(&state, socket, grant).await;
}

async fn pump_session(state: &Arc<ApiServerState>, socket: WebSocket, mut grant: ConnectionGrant) {
    let connection_id = grant.connection_id;
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            outbound = grant.outbound.recv() => {
                let Some(message) = outbound else {
                    // Manager dropped the sender (forced disconnect).
                    break;
                };
                let frame = match wire_frame(&message) {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::error!(connection_id, error = %e, "Failed to serialize frame");
                        continue;
                    }
                };
                if sink.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        handle_client_message(state, connection_id, text.as_str());
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // ping/pong/binary ignored
                    Some(Err(e)) => {
                        tracing::debug!(connection_id, error = %e, "WebSocket read error");
                        break;
                    }
                }
            }
        }
    }

    state.connections.disconnect(connection_id);
    set_connections(state.connections.connection_count() as f64);
}

fn handle_client_message(state: &Arc<ApiServerState>, connection_id: u64, text: &str) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Subscribe { symbol }) => {
            tracing::debug!(connection_id, symbol = %symbol, "Symbol subscribe");
            state.connections.subscribe_symbol(connection_id, &symbol);
        }
        Ok(ClientMessage::Unsubscribe { symbol }) => {
            tracing::debug!(connection_id, symbol = %symbol, "Symbol unsubscribe");
            state.connections.unsubscribe_symbol(connection_id, &symbol);
        }
        Err(e) => {
            tracing::debug!(connection_id, error = %e, "Unparseable client message");
        }
    }
}

// =============================================================================
// Errors
// =============================================================================

/// API server errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiServerError {
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

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use std::sync::Arc;

    use super::*;
    use crate::domain::alert::AlertBatch;
    use crate::domain::tier::Tier;

    #[test]
    fn volume_payload_accepts_producer_field_names() {
        let json = r#"{
            "symbol": "BTCUSDT",
            "currentVolume": "9000000",
            "previousVolume": "3000000",
            "volumeRatio": "3.0",
            "price": "64250.5",
            "fundingRate": "0.0001",
            "candleDirection": "bearish",
            "isUpdate": true,
            "alertType": "UPDATE"
        }"#;
        let payload: VolumeAlertPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.symbol, "BTCUSDT");
        assert!(payload.is_update);
        assert_eq!(payload.alert_type, "UPDATE");
        assert_eq!(payload.candle_direction.as_deref(), Some("bearish"));
    }

    #[test]
    fn volume_payload_defaults_optional_fields() {
        let json = r#"{
            "symbol": "ETHUSDT",
            "currentVolume": "100",
            "previousVolume": "50",
            "volumeRatio": "2.0",
            "price": "3000"
        }"#;
        let payload: VolumeAlertPayload = serde_json::from_str(json).unwrap();
        assert!(!payload.is_update);
        assert_eq!(payload.alert_type, "INITIAL");
        assert!(payload.funding_rate.is_none());
    }

    #[test]
    fn open_interest_payload_parses() {
        let json = r#"{
            "symbol": "SOLUSDT",
            "baseline": "1000000",
            "current": "750000",
            "pctChange": "-25.0",
            "absChange": "250000",
            "source": "oi-poller"
        }"#;
        let payload: OpenInterestAlertPayload = serde_json::from_str(json).unwrap();
        assert!(payload.pct_change.is_sign_negative());
        assert_eq!(payload.source.as_deref(), Some("oi-poller"));
    }

    #[test]
    fn client_message_wire_form() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"subscribe","symbol":"BTCUSDT"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Subscribe { symbol } if symbol == "BTCUSDT"));

        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"unsubscribe","symbol":"BTCUSDT"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Unsubscribe { .. }));
    }

    #[test]
    fn connected_frame_wire_form() {
        let frame = wire_frame(&OutboundMessage::Connected {
            tier: Tier::Pro,
            cadence: "every 5 minutes".to_string(),
        })
        .unwrap();
        let json: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(json["type"], "connected");
        assert_eq!(json["tier"], "pro");
        assert_eq!(json["cadence"], "every 5 minutes");
    }

    #[test]
    fn batch_frame_carries_alerts() {
        let alert = Alert::new(
            "BTCUSDT",
            AlertKind::OpenInterestCross {
                baseline: Decimal::from_str("100").unwrap(),
                current: Decimal::from_str("125").unwrap(),
                pct_change: Decimal::from_str("25").unwrap(),
                abs_change: Decimal::from_str("25").unwrap(),
            },
            Direction::Up,
            "OI rising",
            Utc::now(),
        );
        let batch = Arc::new(AlertBatch {
            tier: Tier::Elite,
            alerts: vec![alert],
            delivered_at: Utc::now(),
        });

        let frame = wire_frame(&OutboundMessage::Batch(batch)).unwrap();
        let json: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(json["type"], "batch");
        assert_eq!(json["tier"], "elite");
        assert_eq!(json["alerts"].as_array().unwrap().len(), 1);
        assert_eq!(json["alerts"][0]["symbol"], "BTCUSDT");
    }

    #[test]
    fn snapshot_frame_wire_form() {
        let frame = wire_frame(&OutboundMessage::Snapshot { alerts: vec![] }).unwrap();
        let json: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(json["type"], "snapshot");
        assert!(json["alerts"].as_array().unwrap().is_empty());
    }
}
