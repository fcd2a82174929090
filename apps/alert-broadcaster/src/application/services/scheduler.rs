//! Broadcast Scheduler
//!
//! The control loop tying the tier clock, alert queue, and room registry
//! together. A single periodic tick drives logically independent per-tier
//! flushes: on each tick, every tier that crossed a boundary has its
//! pending batch drained and pushed, as one message, to every member of
//! its tier room (plus the symbol rooms referenced by the batch).
//!
//! Deliveries are non-blocking channel handoffs; a slow or dead client
//! affects only its own connection and can never delay another tier's
//! boundary detection. The scheduler owns its clock state explicitly -
//! no ambient global timers - so tests drive [`BroadcastScheduler::tick`]
//! with a fake "now".

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::application::ports::AlertHistory;
use crate::application::services::connections::{
    ConnectionManager, DeliveryError, OutboundMessage,
};
use crate::domain::alert::AlertBatch;
use crate::domain::queue::AlertQueue;
use crate::domain::room::{RoomId, RoomRegistry};
use crate::domain::schedule::TierClock;
use crate::domain::tier::Tier;
use crate::infrastructure::metrics;

// =============================================================================
// Scheduler
// =============================================================================

/// Orchestrates boundary detection, draining, and fan-out.
pub struct BroadcastScheduler {
    clock: Mutex<TierClock>,
    queue: Arc<AlertQueue>,
    registry: Arc<RoomRegistry>,
    connections: Arc<ConnectionManager>,
    history: Arc<dyn AlertHistory>,
    tick_interval: Duration,
    last_tick_at: RwLock<Option<DateTime<Utc>>>,
}

impl BroadcastScheduler {
    /// Create a scheduler seeded at `now`.
    #[must_use]
    pub fn new(
        queue: Arc<AlertQueue>,
        registry: Arc<RoomRegistry>,
        connections: Arc<ConnectionManager>,
        history: Arc<dyn AlertHistory>,
        tick_interval: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            clock: Mutex::new(TierClock::new(now)),
            queue,
            registry,
            connections,
            history,
            tick_interval,
            last_tick_at: RwLock::new(None),
        }
    }

    /// Run the tick loop until cancelled.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!(
            tick_interval_ms = self.tick_interval.as_millis() as u64,
            "Broadcast scheduler started"
        );

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = interval.tick() => self.tick(Utc::now()),
            }
        }

        tracing::info!("Broadcast scheduler stopped");
    }

    /// One scheduling step at wall-clock time `now`.
    ///
    /// Exposed so tests can drive boundaries deterministically.
    pub fn tick(&self, now: DateTime<Utc>) {
        *self.last_tick_at.write() = Some(now);
        for tier in Tier::all() {
            let crossed = self.clock.lock().should_broadcast(*tier, now);
            if crossed {
                self.flush_tier(*tier, now);
            }
        }
    }

    /// Drain one tier and deliver the batch to every resolved recipient.
    fn flush_tier(&self, tier: Tier, now: DateTime<Utc>) {
        let drained = self.queue.drain(tier);

        if drained.dropped > 0 {
            metrics::record_alerts_dropped(tier, drained.dropped);
            tracing::warn!(
                tier = tier.as_str(),
                dropped = drained.dropped,
                "Pending batch overflowed; oldest alerts dropped"
            );
        }

        // An empty drain still completes the boundary; there is just
        // nothing to send.
        if drained.alerts.is_empty() {
            return;
        }

        self.history.append(tier, &drained.alerts);

        // Tier-room membership is the primary delivery path; unioning in
        // the referenced symbol rooms is a correctness safety net for
        // clients subscribed to an instrument outside their tier room.
        let mut recipients: HashSet<_> = self.registry.members_of(&RoomId::Tier(tier));
        for alert in &drained.alerts {
            recipients.extend(self.registry.members_of(&RoomId::Symbol(alert.symbol.clone())));
        }

        let alert_count = drained.alerts.len();
        let batch = Arc::new(AlertBatch {
            tier,
            alerts: drained.alerts,
            delivered_at: now,
        });

        let mut delivered = 0usize;
        let mut lagged = 0usize;
        let mut closed = 0usize;
        for connection_id in recipients {
            match self
                .connections
                .deliver(connection_id, OutboundMessage::Batch(Arc::clone(&batch)))
            {
                Ok(()) => delivered += 1,
                Err(DeliveryError::Lagged(id)) => {
                    lagged += 1;
                    metrics::record_delivery_failure(tier, "lagged");
                    tracing::warn!(
                        connection_id = id,
                        tier = tier.as_str(),
                        "Outbound buffer full; batch dropped for this connection"
                    );
                }
                Err(DeliveryError::Closed(id) | DeliveryError::Unknown(id)) => {
                    closed += 1;
                    metrics::record_delivery_failure(tier, "closed");
                    // Fail fast and release room memberships; no retry.
                    self.connections.disconnect(id);
                }
            }
        }

        metrics::record_batch_delivered(tier, alert_count as u64, delivered as u64);
        tracing::info!(
            tier = tier.as_str(),
            alerts = alert_count,
            delivered,
            lagged,
            closed,
            "Batch delivered"
        );
    }

    /// Scheduler statistics for the health endpoint.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            last_tick_at: *self.last_tick_at.read(),
            queue_depths: Tier::all()
                .iter()
                .map(|tier| (*tier, self.queue.depth(*tier)))
                .collect(),
        }
    }
}

/// Scheduler statistics.
#[derive(Debug, Clone)]
pub struct SchedulerStats {
    /// Wall-clock time of the most recent tick.
    pub last_tick_at: Option<DateTime<Utc>>,
    /// Pending alert count per tier.
    pub queue_depths: Vec<(Tier, usize)>,
}

// =============================================================================
// Tests
// =============================================================================
