#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! VolSpike Alert Broadcaster - Tier-Synchronized Alert Fan-Out
//!
//! A WebSocket broadcast service that receives market alerts from the
//! monitoring jobs (volume spike scanner, open-interest poller) and
//! delivers them to dashboard clients on a cadence determined by each
//! client's subscription tier: Elite in real time, Pro on 5-minute
//! wall-clock boundaries, Free on 15-minute boundaries.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core broadcast logic and data types
//!   - `tier`: Subscription tiers and their cadences
//!   - `alert`: Alert records and delivery batches
//!   - `schedule`: Wall-clock boundary detection
//!   - `queue`: Per-tier pending batches with atomic drains
//!   - `room`: Room membership tracking
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Interfaces for credential resolution and alert history
//!   - `services`: Connection lifecycle, broadcast scheduler
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `http`: Ingestion routes and the WebSocket transport
//!   - `auth`: JWT credential resolution
//!   - `history`: Bounded recent-alert ring
//!   - `config`: Configuration and dependency injection
//!   - `health`: Health check HTTP endpoint
//!
//! # Data Flow
//!
//! ```text
//! volume scanner ──┐
//!                  │   ┌─────────────┐     ┌─────────────┐──► Elite (1 s)
//!                  ├──►│ Alert Queue │────►│  Broadcast  │──► Pro   (5 m)
//! OI poller ───────┘   │  (per tier) │     │  Scheduler  │──► Free  (15 m)
//!                      └─────────────┘     └─────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core broadcast types with no transport dependencies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::alert::{Alert, AlertBatch, AlertKind, Direction};
pub use domain::queue::{AlertQueue, DrainedBatch};
pub use domain::room::{ConnectionId, RoomId, RoomRegistry};
pub use domain::schedule::TierClock;
pub use domain::tier::{Cadence, Tier};

// Application services
pub use application::ports::{AlertHistory, AuthError, ResolvedClient, TierResolver};
pub use application::services::{
    BroadcastScheduler, ConnectionGrant, ConnectionManager, DeliveryError, OutboundMessage,
    SchedulerStats,
};

// Infrastructure config
pub use infrastructure::config::{
    BroadcasterConfig, ConfigError, DeliverySettings, QueueSettings, SchedulerSettings, Secrets,
    ServerSettings,
};

// Adapters (for integration tests)
pub use infrastructure::auth::JwtTierResolver;
pub use infrastructure::history::RingHistory;
pub use infrastructure::http::{ApiServer, ApiServerError, ApiServerState};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
