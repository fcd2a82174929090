//! Connection Lifecycle Manager
//!
//! Connect/disconnect bookkeeping, independent of alert content. Each
//! live connection owns a bounded outbound channel; the scheduler pushes
//! batch messages onto these channels rather than writing to transports
//! directly, so a stalled client can never block the tick loop.
//!
//! Room memberships are a resource acquired at connect and released on
//! every disconnect path; `disconnect` is the single release point the
//! transport adapter must call on all of its exit paths.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::application::ports::{AlertHistory, ResolvedClient};
use crate::domain::alert::{Alert, AlertBatch};
use crate::domain::room::{ConnectionId, RoomId, RoomRegistry};
use crate::domain::tier::Tier;

// =============================================================================
// Outbound Messages
// =============================================================================

/// Message pushed onto a connection's outbound channel.
///
/// The transport adapter serializes these to the wire; delivery logic
/// has no dependency on the transport library's object model.
#[derive(Debug, Clone)]
pub enum OutboundMessage {
    /// Handshake acknowledgment with the resolved tier and its cadence,
    /// so the client can self-report expected delivery timing.
    Connected {
        /// Resolved subscription tier.
        tier: Tier,
        /// Human-readable cadence description.
        cadence: String,
    },
    /// Recent-history catch-up snapshot sent once after the ack.
    Snapshot {
        /// Retained alerts for the connection's tier, oldest first.
        alerts: Vec<Alert>,
    },
    /// A boundary delivery: the full drained batch as one message.
    Batch(Arc<AlertBatch>),
}

// =============================================================================
// Errors
// =============================================================================

/// Failure to hand a message to a connection's outbound channel.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The connection's outbound buffer is full (slow client). The
    /// message is dropped for this connection only; the client recovers
    /// via the reconnect snapshot.
    #[error("outbound buffer full for connection {0}")]
    Lagged(ConnectionId),
    /// The transport has gone away; the connection must be cleaned up.
    #[error("connection {0} closed")]
    Closed(ConnectionId),
    /// No such connection (already cleaned up).
    #[error("unknown connection {0}")]
    Unknown(ConnectionId),
}

// =============================================================================
// Connection Manager
// =============================================================================

#[derive(Debug)]
struct ConnectionHandle {
    identity: String,
    tier: Tier,
    sender: mpsc::Sender<OutboundMessage>,
}

/// A successfully established connection, handed to the transport.
pub struct ConnectionGrant {
    /// Server-assigned connection id.
    pub connection_id: ConnectionId,
    /// Tier resolved at connect time, immutable for this connection.
    pub tier: Tier,
    /// Receiving end of the outbound channel; the transport pumps this
    /// until it closes.
    pub outbound: mpsc::Receiver<OutboundMessage>,
}

/// Tracks live connections and their outbound channels.
pub struct ConnectionManager {
    registry: Arc<RoomRegistry>,
    history: Arc<dyn AlertHistory>,
    connections: RwLock<HashMap<ConnectionId, ConnectionHandle>>,
    next_id: AtomicU64,
    outbound_capacity: usize,
}

impl ConnectionManager {
    /// Create a manager delivering through channels of the given
    /// capacity.
    #[must_use]
    pub fn new(
        registry: Arc<RoomRegistry>,
        history: Arc<dyn AlertHistory>,
        outbound_capacity: usize,
    ) -> Self {
        Self {
            registry,
            history,
            connections: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            // The ack and snapshot are queued before the transport polls.
            outbound_capacity: outbound_capacity.max(8),
        }
    }

    /// Register an authenticated client.
    ///
    /// Joins the tier and user rooms (plus a role room for elevated
    /// clients), queues the `Connected` ack and the recent-history
    /// snapshot, and returns the grant the transport pumps from.
    /// Authentication itself happens before this call; a refused
    /// handshake never reaches the registry.
    pub fn connect(&self, client: &ResolvedClient) -> ConnectionGrant {
        let connection_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, outbound) = mpsc::channel(self.outbound_capacity);

        self.connections.write().insert(
            connection_id,
            ConnectionHandle {
                identity: client.identity.clone(),
                tier: client.tier,
                sender: sender.clone(),
            },
        );

        self.registry.join(connection_id, RoomId::Tier(client.tier));
        self.registry
            .join(connection_id, RoomId::User(client.identity.clone()));
        if let Some(role) = &client.role {
            self.registry.join(connection_id, RoomId::Role(role.clone()));
        }

        // The channel is fresh and the capacity floor guarantees room for
        // the handshake pair; a failure here means that floor was broken.
        if let Err(e) = sender.try_send(OutboundMessage::Connected {
            tier: client.tier,
            cadence: client.tier.cadence().description(),
        }) {
            tracing::error!(connection_id, error = %e, "Failed to queue connect ack");
        }
        let snapshot = self.history.recent(client.tier);
        if !snapshot.is_empty()
            && let Err(e) = sender.try_send(OutboundMessage::Snapshot { alerts: snapshot })
        {
            tracing::error!(connection_id, error = %e, "Failed to queue history snapshot");
        }

        tracing::info!(
            connection_id,
            identity = %client.identity,
            tier = client.tier.as_str(),
            "Client connected"
        );

        ConnectionGrant {
            connection_id,
            tier: client.tier,
            outbound,
        }
    }

    /// Tear down a connection and release every room membership.
    ///
    /// Idempotent; safe to call from any disconnect path (network drop,
    /// explicit close, delivery failure).
    pub fn disconnect(&self, connection_id: ConnectionId) {
        let removed = self.connections.write().remove(&connection_id);
        self.registry.remove_connection(connection_id);
        if let Some(handle) = removed {
            tracing::info!(
                connection_id,
                identity = %handle.identity,
                tier = handle.tier.as_str(),
                "Client disconnected"
            );
        }
    }

    /// Join the connection to a symbol room.
    pub fn subscribe_symbol(&self, connection_id: ConnectionId, symbol: &str) {
        if self.connections.read().contains_key(&connection_id) {
            self.registry
                .join(connection_id, RoomId::Symbol(symbol.to_string()));
        }
    }

    /// Leave a symbol room.
    pub fn unsubscribe_symbol(&self, connection_id: ConnectionId, symbol: &str) {
        self.registry
            .leave(connection_id, &RoomId::Symbol(symbol.to_string()));
    }

    /// Hand a message to a connection's outbound channel without
    /// blocking.
    ///
    /// # Errors
    ///
    /// [`DeliveryError::Lagged`] when the bounded buffer is full and
    /// [`DeliveryError::Closed`] when the transport has gone away; the
    /// caller cleans up closed connections.
    pub fn deliver(
        &self,
        connection_id: ConnectionId,
        message: OutboundMessage,
    ) -> Result<(), DeliveryError> {
        let sender = {
            let connections = self.connections.read();
            let Some(handle) = connections.get(&connection_id) else {
                return Err(DeliveryError::Unknown(connection_id));
            };
            handle.sender.clone()
        };

        sender.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Lagged(connection_id),
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed(connection_id),
        })
    }

    /// Number of live connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.read().len()
    }

    /// Tier of a live connection, if present.
    #[must_use]
    pub fn tier_of(&self, connection_id: ConnectionId) -> Option<Tier> {
        self.connections.read().get(&connection_id).map(|h| h.tier)
    }
}

// =============================================================================
// Tests
// =============================================================================
