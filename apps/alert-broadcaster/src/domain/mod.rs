//! Domain layer - Core broadcast types with no transport dependencies.

/// Alert records and batches.
pub mod alert;

/// Per-tier pending batches with atomic drains.
pub mod queue;

/// Room membership tracking.
pub mod room;

/// Wall-clock boundary detection.
pub mod schedule;

/// Subscription tiers and cadences.
pub mod tier;
