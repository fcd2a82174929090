//! Application Services
//!
//! Use-case orchestration: connection lifecycle and the broadcast
//! scheduler tick loop.

/// Connection lifecycle manager and outbound channels.
pub mod connections;

/// Boundary-driven broadcast scheduler.
pub mod scheduler;

pub use connections::{
    ConnectionGrant, ConnectionManager, DeliveryError, OutboundMessage,
};
pub use scheduler::{BroadcastScheduler, SchedulerStats};
