//! Port Interfaces
//!
//! Contracts to the external collaborators the broadcast subsystem
//! consumes, following the hexagonal layout of the rest of the service.
//!
//! ## Driven Ports (Outbound)
//!
//! - [`TierResolver`]: given an opaque client credential, resolve the
//!   authenticated identity and its subscription tier.
//! - [`AlertHistory`]: bounded recent-alert buffer used for reconnect
//!   catch-up snapshots.

use async_trait::async_trait;

use crate::domain::alert::Alert;
use crate::domain::tier::Tier;

// =============================================================================
// Tier Resolution
// =============================================================================

/// Authentication failure at connect time.
///
/// The connection is refused before any room join; the server does not
/// retry.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Credential was malformed or failed validation.
    #[error("invalid credential: {0}")]
    InvalidCredential(String),
    /// Credential was valid but carried no recognized tier.
    #[error("unknown tier: {0}")]
    UnknownTier(String),
}

/// The outcome of resolving a client credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedClient {
    /// Opaque authenticated identity (user id).
    pub identity: String,
    /// Subscription tier, fixed for the connection's lifetime.
    pub tier: Tier,
    /// Elevated role, if any (joins the matching role room).
    pub role: Option<String>,
}

/// Resolves an opaque per-connection credential to an identity and tier.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TierResolver: Send + Sync {
    /// Resolve `credential`, or refuse the handshake.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when the credential is invalid or carries no
    /// recognized tier.
    async fn resolve(&self, credential: &str) -> Result<ResolvedClient, AuthError>;
}

// =============================================================================
// Alert History
// =============================================================================

/// Bounded recent-history buffer for reconnect catch-up.
///
/// A fixed-capacity ring independent of the live alert queue: the
/// scheduler appends each drained batch, and the connection manager
/// reads the window back when a client connects.
pub trait AlertHistory: Send + Sync {
    /// Append delivered alerts for a tier, evicting the oldest entries
    /// past capacity.
    fn append(&self, tier: Tier, alerts: &[Alert]);

    /// The retained window for a tier, oldest first.
    fn recent(&self, tier: Tier) -> Vec<Alert>;
}

// =============================================================================
// Tests
// =============================================================================
