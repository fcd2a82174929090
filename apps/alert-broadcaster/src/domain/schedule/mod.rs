//! Tier Clock
//!
//! Deterministic boundary detection: given the current wall-clock time,
//! decides whether a tier has crossed a broadcast boundary since the last
//! check. The scheduler ticks far more often than the coarser tiers'
//! granularity, so the clock must fire exactly once per boundary window,
//! never once per tick that lands inside the window.
//!
//! # Algorithm
//!
//! Each tier's boundary window is identified by
//! `floor(epoch_minutes / granularity)`. The clock remembers the last
//! window it fired for and fires only when the window index changes.
//! This also collapses downtime: if the process stops ticking across N
//! boundaries, the index jump produces a single catch-up fire rather
//! than a storm of N.

use std::collections::HashMap;

use chrono::{DateTime, Timelike, Utc};

use crate::domain::tier::Tier;

// =============================================================================
// Tier Clock
// =============================================================================

/// Stateful per-tier boundary detector.
///
/// Not internally synchronized: the broadcast scheduler owns one instance
/// and consults it from its single tick loop.
#[derive(Debug)]
pub struct TierClock {
    /// Last fired boundary window index per tier.
    last_fired: HashMap<Tier, i64>,
}

impl TierClock {
    /// Create a clock seeded at `now`.
    ///
    /// Seeding records the current window for every batched tier so a
    /// process start in the middle of a window does not fire immediately;
    /// the first fire happens at the next boundary.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        let mut last_fired = HashMap::new();
        for tier in Tier::all() {
            if let Some(granularity) = tier.boundary_minutes() {
                last_fired.insert(*tier, window_index(now, granularity));
            }
        }
        Self { last_fired }
    }

    /// Report whether `tier` has crossed a broadcast boundary at `now`.
    ///
    /// Fires at most once per boundary window and records the fire, so a
    /// second call within the same window returns `false`.
    pub fn should_broadcast(&mut self, tier: Tier, now: DateTime<Utc>) -> bool {
        let Some(granularity) = tier.boundary_minutes() else {
            // Immediate tiers treat every tick as a boundary.
            return true;
        };

        let window = window_index(now, granularity);
        match self.last_fired.get(&tier) {
            Some(last) if *last == window => false,
            _ => {
                self.last_fired.insert(tier, window);
                true
            }
        }
    }

    /// Minute-of-hour of the next boundary for a batched tier, if any.
    ///
    /// Surfaced through the health endpoint for operator visibility.
    #[must_use]
    pub fn next_boundary_minute(tier: Tier, now: DateTime<Utc>) -> Option<u32> {
        let granularity = tier.boundary_minutes()?;
        let minute = now.minute();
        Some((minute - minute % granularity + granularity) % 60)
    }
}

/// Boundary window index for a granularity in minutes.
fn window_index(now: DateTime<Utc>, granularity: u32) -> i64 {
    let epoch_minutes = now.timestamp().div_euclid(60);
    epoch_minutes.div_euclid(i64::from(granularity))
}

// =============================================================================
// Tests
// =============================================================================
