//! Alert Types
//!
//! Immutable market alert records as produced by the external monitoring
//! jobs (volume spike scanner, open-interest poller). An alert is created
//! once at ingestion, tagged with a server-assigned id and timestamp,
//! buffered per tier, and discarded after delivery apart from a bounded
//! recent-history window used for reconnect catch-up.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::tier::Tier;

// =============================================================================
// Alert
// =============================================================================

/// Candle or open-interest movement direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Bullish candle / open interest rising.
    Up,
    /// Bearish candle / open interest falling.
    Down,
}

impl Direction {
    /// Map the producer's candle direction string (`bullish`/`bearish`).
    #[must_use]
    pub fn from_candle(s: &str) -> Self {
        if s.eq_ignore_ascii_case("bearish") {
            Self::Down
        } else {
            Self::Up
        }
    }
}

/// Kind-specific alert payload.
///
/// Field names follow the ingestion payloads emitted by the monitoring
/// scripts so the wire form matches what dashboards already consume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AlertKind {
    /// Hourly volume spike on a perpetual contract.
    #[serde(rename_all = "camelCase")]
    VolumeSpike {
        /// Quote volume of the current (possibly open) hourly candle.
        current_volume: Decimal,
        /// Quote volume of the previous closed hourly candle.
        previous_volume: Decimal,
        /// `current_volume / previous_volume`.
        volume_ratio: Decimal,
        /// Last price at scan time.
        price: Decimal,
        /// Funding rate at scan time, when available.
        funding_rate: Option<Decimal>,
        /// Whether this is a follow-up (UPDATE / HALF-UPDATE) to an
        /// alert fired earlier in the same hour.
        is_update: bool,
        /// Producer alert type label (e.g. "INITIAL", "UPDATE").
        alert_type: String,
    },
    /// Open interest crossing its baseline by a significant margin.
    #[serde(rename_all = "camelCase")]
    OpenInterestCross {
        /// Baseline open interest the poller compares against.
        baseline: Decimal,
        /// Current open interest.
        current: Decimal,
        /// Percent change from baseline.
        pct_change: Decimal,
        /// Absolute change from baseline.
        abs_change: Decimal,
    },
}

impl AlertKind {
    /// Short label used in logs and metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::VolumeSpike { .. } => "volume_spike",
            Self::OpenInterestCross { .. } => "open_interest_cross",
        }
    }
}

/// An immutable alert event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    /// Unique alert id, assigned at ingestion.
    pub id: Uuid,
    /// Instrument symbol (e.g. `BTCUSDT`).
    pub symbol: String,
    /// Kind-specific payload.
    #[serde(flatten)]
    pub kind: AlertKind,
    /// Movement direction.
    pub direction: Direction,
    /// Producer-rendered human-readable message.
    pub message: String,
    /// Server-assigned creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Alert {
    /// Create a new alert with a fresh id and the given creation time.
    #[must_use]
    pub fn new(
        symbol: impl Into<String>,
        kind: AlertKind,
        direction: Direction,
        message: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol: symbol.into(),
            kind,
            direction,
            message: message.into(),
            created_at,
        }
    }
}

// =============================================================================
// Alert Batch
// =============================================================================

/// A drained batch of alerts delivered to every member of a tier room
/// as a single message.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertBatch {
    /// Tier this batch was drained for.
    pub tier: Tier,
    /// Alerts in arrival order.
    pub alerts: Vec<Alert>,
    /// Delivery timestamp (the boundary tick).
    pub delivered_at: DateTime<Utc>,
}

// =============================================================================
// Tests
// =============================================================================
