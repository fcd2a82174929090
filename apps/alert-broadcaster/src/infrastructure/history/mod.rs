//! Recent-Alert History Ring
//!
//! Fixed-capacity per-tier buffer of recently delivered alerts, served
//! to clients on (re)connect so a brief disconnect does not open a gap.
//! Independent of the live alert queue: the scheduler appends each
//! drained batch after delivery, and the oldest entries fall off as new
//! ones arrive.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use crate::application::ports::AlertHistory;
use crate::domain::alert::Alert;
use crate::domain::tier::Tier;

// =============================================================================
// Ring History
// =============================================================================

/// In-memory bounded history, one ring per tier.
#[derive(Debug)]
pub struct RingHistory {
    rings: HashMap<Tier, Mutex<VecDeque<Alert>>>,
    capacity: usize,
}

impl RingHistory {
    /// Create rings with the given per-tier capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let mut rings = HashMap::new();
        for tier in Tier::all() {
            rings.insert(*tier, Mutex::new(VecDeque::with_capacity(capacity)));
        }
        Self { rings, capacity }
    }

    fn ring(&self, tier: Tier) -> &Mutex<VecDeque<Alert>> {
        // Every tier is inserted at construction.
        self.rings
            .get(&tier)
            .unwrap_or_else(|| unreachable!("history initialized for all tiers"))
    }
}

impl AlertHistory for RingHistory {
    fn append(&self, tier: Tier, alerts: &[Alert]) {
        // A zero-capacity ring retains nothing.
        if self.capacity == 0 {
            return;
        }
        let mut ring = self.ring(tier).lock();
        for alert in alerts {
            while ring.len() >= self.capacity {
                ring.pop_front();
            }
            ring.push_back(alert.clone());
        }
    }

    fn recent(&self, tier: Tier) -> Vec<Alert> {
        self.ring(tier).lock().iter().cloned().collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
