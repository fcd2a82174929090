//! Alert Queue
//!
//! Per-tier pending batches accumulating alerts between broadcast
//! boundaries. Enqueues never block and are safe against a concurrent
//! drain of the same tier: the per-tier lock makes each drain atomic, so
//! an enqueue racing a drain lands in the batch for the next boundary.
//!
//! Memory is bounded: once a tier's pending batch reaches its configured
//! cap, the oldest alerts are evicted first. Evictions are surfaced in
//! the drain result so the scheduler can log and count them; they are
//! never delivered to clients as alerts.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use crate::domain::alert::Alert;
use crate::domain::tier::Tier;

// =============================================================================
// Drained Batch
// =============================================================================

/// Result of an atomic drain.
#[derive(Debug, Default)]
pub struct DrainedBatch {
    /// Pending alerts in arrival order.
    pub alerts: Vec<Alert>,
    /// Alerts evicted by the cap since the previous drain.
    pub dropped: u64,
}

impl DrainedBatch {
    /// Check whether the drain produced neither alerts nor drops.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty() && self.dropped == 0
    }
}

// =============================================================================
// Alert Queue
// =============================================================================

#[derive(Debug, Default)]
struct PendingBatch {
    buf: VecDeque<Alert>,
    dropped: u64,
}

/// Per-tier alert accumulator with atomic drains.
#[derive(Debug)]
pub struct AlertQueue {
    batches: HashMap<Tier, Mutex<PendingBatch>>,
    cap: HashMap<Tier, usize>,
}

impl AlertQueue {
    /// Create a queue with the given per-tier pending-batch caps.
    #[must_use]
    pub fn new(caps: impl Fn(Tier) -> usize) -> Self {
        let mut batches = HashMap::new();
        let mut cap = HashMap::new();
        for tier in Tier::all() {
            batches.insert(*tier, Mutex::new(PendingBatch::default()));
            cap.insert(*tier, caps(*tier));
        }
        Self { batches, cap }
    }

    /// Append an alert to a tier's pending batch.
    ///
    /// If the batch is at its cap, the oldest pending alert is evicted
    /// and counted toward the next drain's drop count.
    pub fn enqueue(&self, tier: Tier, alert: Alert) {
        let mut batch = self.batch(tier).lock();
        batch.buf.push_back(alert);

        let cap = self.cap_for(tier);
        while batch.buf.len() > cap {
            batch.buf.pop_front();
            batch.dropped += 1;
        }
    }

    /// Append an alert to every tier's pending batch.
    ///
    /// Ingestion enqueues each event for all tiers simultaneously; tiers
    /// differ only in delivery cadence.
    pub fn enqueue_all(&self, alert: &Alert) {
        for tier in Tier::all() {
            self.enqueue(*tier, alert.clone());
        }
    }

    /// Atomically remove and return everything pending for a tier.
    ///
    /// Returns an empty batch (not an error) when nothing is pending.
    /// The drop count is reset by the drain.
    pub fn drain(&self, tier: Tier) -> DrainedBatch {
        let mut batch = self.batch(tier).lock();
        DrainedBatch {
            alerts: std::mem::take(&mut batch.buf).into(),
            dropped: std::mem::take(&mut batch.dropped),
        }
    }

    /// Number of alerts currently pending for a tier.
    #[must_use]
    pub fn depth(&self, tier: Tier) -> usize {
        self.batch(tier).lock().buf.len()
    }

    fn batch(&self, tier: Tier) -> &Mutex<PendingBatch> {
        // Every tier is inserted at construction.
        self.batches
            .get(&tier)
            .unwrap_or_else(|| unreachable!("queue initialized for all tiers"))
    }

    fn cap_for(&self, tier: Tier) -> usize {
        self.cap.get(&tier).copied().unwrap_or(usize::MAX)
    }
}

// =============================================================================
// Tests
// =============================================================================
