//! Broadcaster Configuration Settings
//!
//! Configuration types for the alert broadcaster, loaded from
//! environment variables. Cap values and the catch-up-history window are
//! operational tuning parameters, not algorithmic constants, so they are
//! all overridable here.

use std::time::Duration;

use crate::domain::tier::Tier;

// =============================================================================
// Secrets
// =============================================================================

/// Shared secrets for ingestion and client credential validation.
#[derive(Clone)]
pub struct Secrets {
    ingest_api_key: String,
    jwt_secret: String,
}

impl Secrets {
    /// Create new secrets.
    #[must_use]
    pub const fn new(ingest_api_key: String, jwt_secret: String) -> Self {
        Self {
            ingest_api_key,
            jwt_secret,
        }
    }

    /// Shared key the monitoring jobs present in `X-API-Key`.
    #[must_use]
    pub fn ingest_api_key(&self) -> &str {
        &self.ingest_api_key
    }

    /// HS256 secret for client JWT validation.
    #[must_use]
    pub fn jwt_secret(&self) -> &str {
        &self.jwt_secret
    }
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("ingest_api_key", &"[REDACTED]")
            .field("jwt_secret", &"[REDACTED]")
            .finish()
    }
}

// =============================================================================
// Settings Groups
// =============================================================================

/// Server port settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// HTTP port serving the WebSocket endpoint and ingestion routes.
    pub http_port: u16,
    /// Health check HTTP port.
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            http_port: 8080,
            health_port: 8082,
        }
    }
}

/// Broadcast scheduler settings.
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Scheduling tick period. Must stay well under the finest batched
    /// tier granularity.
    pub tick_interval: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
        }
    }
}

/// Per-tier pending-batch caps.
#[derive(Debug, Clone)]
pub struct QueueSettings {
    /// Cap for the Elite pending batch.
    pub elite_cap: usize,
    /// Cap for the Pro pending batch.
    pub pro_cap: usize,
    /// Cap for the Free pending batch.
    pub free_cap: usize,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            elite_cap: 256,
            pro_cap: 256,
            free_cap: 256,
        }
    }
}

impl QueueSettings {
    /// Cap for a tier's pending batch.
    #[must_use]
    pub const fn cap_for(&self, tier: Tier) -> usize {
        match tier {
            Tier::Elite => self.elite_cap,
            Tier::Pro => self.pro_cap,
            Tier::Free => self.free_cap,
        }
    }
}

/// Delivery and catch-up settings.
#[derive(Debug, Clone)]
pub struct DeliverySettings {
    /// Per-connection outbound channel capacity.
    pub outbound_capacity: usize,
    /// Per-tier recent-history window size for reconnect catch-up.
    pub history_capacity: usize,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            outbound_capacity: 64,
            history_capacity: 50,
        }
    }
}

// =============================================================================
// Broadcaster Config
// =============================================================================

/// Complete broadcaster configuration.
#[derive(Debug, Clone)]
pub struct BroadcasterConfig {
    /// Shared secrets.
    pub secrets: Secrets,
    /// Server port settings.
    pub server: ServerSettings,
    /// Scheduler settings.
    pub scheduler: SchedulerSettings,
    /// Queue cap settings.
    pub queue: QueueSettings,
    /// Delivery and catch-up settings.
    pub delivery: DeliverySettings,
}

impl BroadcasterConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or
    /// empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        let ingest_api_key = require_env("VOLSPIKE_INGEST_API_KEY")?;
        let jwt_secret = require_env("VOLSPIKE_JWT_SECRET")?;

        let server = ServerSettings {
            http_port: parse_env_u16("VOLSPIKE_HTTP_PORT", ServerSettings::default().http_port),
            health_port: parse_env_u16(
                "VOLSPIKE_HEALTH_PORT",
                ServerSettings::default().health_port,
            ),
        };

        let scheduler = SchedulerSettings {
            tick_interval: parse_env_duration_millis(
                "VOLSPIKE_TICK_INTERVAL_MS",
                SchedulerSettings::default().tick_interval,
            ),
        };

        let queue = QueueSettings {
            elite_cap: parse_env_usize(
                "VOLSPIKE_ELITE_QUEUE_CAP",
                QueueSettings::default().elite_cap,
            ),
            pro_cap: parse_env_usize("VOLSPIKE_PRO_QUEUE_CAP", QueueSettings::default().pro_cap),
            free_cap: parse_env_usize(
                "VOLSPIKE_FREE_QUEUE_CAP",
                QueueSettings::default().free_cap,
            ),
        };

        let delivery = DeliverySettings {
            outbound_capacity: parse_env_usize(
                "VOLSPIKE_OUTBOUND_CAPACITY",
                DeliverySettings::default().outbound_capacity,
            ),
            history_capacity: parse_env_usize(
                "VOLSPIKE_HISTORY_CAPACITY",
                DeliverySettings::default().history_capacity,
            ),
        };

        Ok(Self {
            secrets: Secrets::new(ingest_api_key, jwt_secret),
            server,
            scheduler,
            queue,
            delivery,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
}

fn require_env(key: &str) -> Result<String, ConfigError> {
    let value =
        std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))?;
    if value.is_empty() {
        return Err(ConfigError::EmptyValue(key.to_string()));
    }
    Ok(value)
}

fn parse_env_u16(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}
