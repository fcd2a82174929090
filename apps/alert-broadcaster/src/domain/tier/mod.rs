//! Subscription Tiers
//!
//! The closed set of subscription levels and their delivery cadences.
//! A tier determines how often batched alerts are pushed to its members:
//! Elite receives alerts on every scheduler tick, Pro on 5-minute
//! wall-clock boundaries, Free on 15-minute boundaries.
//!
//! Tier is resolved once at connect time and is immutable for the
//! lifetime of a connection; plan changes take effect on reconnect.

use serde::{Deserialize, Serialize};

// =============================================================================
// Tier
// =============================================================================

/// Subscription tier determining alert delivery cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Top tier - alerts delivered on every scheduler tick.
    Elite,
    /// Middle tier - alerts batched to 5-minute boundaries.
    Pro,
    /// Bottom tier - alerts batched to 15-minute boundaries.
    Free,
}

impl Tier {
    /// All tiers, in descending order of cadence.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Elite, Self::Pro, Self::Free]
    }

    /// Parse a tier from a case-insensitive string, if recognized.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "elite" => Some(Self::Elite),
            "pro" => Some(Self::Pro),
            "free" => Some(Self::Free),
            _ => None,
        }
    }

    /// Get the tier name used in room identifiers and wire messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Elite => "elite",
            Self::Pro => "pro",
            Self::Free => "free",
        }
    }

    /// Get the delivery cadence for this tier.
    #[must_use]
    pub const fn cadence(self) -> Cadence {
        match self {
            Self::Elite => Cadence::Immediate,
            Self::Pro => Cadence::EveryMinutes(5),
            Self::Free => Cadence::EveryMinutes(15),
        }
    }

    /// Boundary granularity in minutes, or `None` for immediate delivery.
    #[must_use]
    pub const fn boundary_minutes(self) -> Option<u32> {
        match self.cadence() {
            Cadence::Immediate => None,
            Cadence::EveryMinutes(m) => Some(m),
        }
    }
}

// =============================================================================
// Cadence
// =============================================================================

/// Delivery cadence for a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Delivered on every scheduler tick (no batching).
    Immediate,
    /// Batched to wall-clock boundaries at multiples of this many minutes.
    EveryMinutes(u32),
}

impl Cadence {
    /// Human-readable description sent in the connect acknowledgment so
    /// clients can self-report expected delivery timing.
    #[must_use]
    pub fn description(self) -> String {
        match self {
            Self::Immediate => "real-time".to_string(),
            Self::EveryMinutes(m) => format!("every {m} minutes"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
