//! Room Registry
//!
//! Tracks which connections belong to which broadcast rooms. A room is a
//! pure set of connection ids and owns no delivery state; the broadcast
//! scheduler takes a membership snapshot per drain and delivers to
//! exactly that snapshot.
//!
//! # Design
//!
//! The registry keeps a forward map (room -> members) and a reverse map
//! (connection -> rooms) behind one `RwLock`, so `remove_connection` can
//! release every membership in O(rooms joined) without scanning. Join
//! and leave are idempotent; callers never touch the underlying sets
//! directly.

use std::collections::{HashMap, HashSet};
use std::fmt;

use parking_lot::RwLock;

use crate::domain::tier::Tier;

// =============================================================================
// Types
// =============================================================================

/// Unique identifier for a live client connection, server-assigned.
pub type ConnectionId = u64;

/// A named broadcast target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RoomId {
    /// All connections of one tier.
    Tier(Tier),
    /// Connections explicitly subscribed to an instrument.
    Symbol(String),
    /// One per authenticated identity, for targeted delivery.
    User(String),
    /// Elevated-privilege broadcast (e.g. internal admin alerting).
    Role(String),
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tier(tier) => write!(f, "tier-{}", tier.as_str()),
            Self::Symbol(symbol) => write!(f, "symbol-{symbol}"),
            Self::User(user) => write!(f, "user-{user}"),
            Self::Role(role) => write!(f, "role-{role}"),
        }
    }
}

// =============================================================================
// Room Registry
// =============================================================================

#[derive(Debug, Default)]
struct RegistryState {
    /// Room -> members.
    rooms: HashMap<RoomId, HashSet<ConnectionId>>,
    /// Connection -> rooms joined (for O(1) cleanup on disconnect).
    memberships: HashMap<ConnectionId, HashSet<RoomId>>,
}

/// Thread-safe room membership tracker.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    state: RwLock<RegistryState>,
}

impl RoomRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a room. Joining twice is a no-op.
    pub fn join(&self, connection: ConnectionId, room: RoomId) {
        let mut state = self.state.write();
        state
            .rooms
            .entry(room.clone())
            .or_default()
            .insert(connection);
        state.memberships.entry(connection).or_default().insert(room);
    }

    /// Remove a connection from a room. Leaving a room not joined is a
    /// no-op.
    pub fn leave(&self, connection: ConnectionId, room: &RoomId) {
        let mut state = self.state.write();
        if let Some(members) = state.rooms.get_mut(room) {
            members.remove(&connection);
            if members.is_empty() {
                state.rooms.remove(room);
            }
        }
        if let Some(rooms) = state.memberships.get_mut(&connection) {
            rooms.remove(room);
            if rooms.is_empty() {
                state.memberships.remove(&connection);
            }
        }
    }

    /// Snapshot of a room's members.
    ///
    /// The snapshot is consistent at a point in time; concurrent joins
    /// and leaves do not mutate it. A connection joining mid-delivery is
    /// not retroactively included in an in-flight batch.
    #[must_use]
    pub fn members_of(&self, room: &RoomId) -> HashSet<ConnectionId> {
        self.state
            .read()
            .rooms
            .get(room)
            .cloned()
            .unwrap_or_default()
    }

    /// Snapshot of the rooms a connection has joined.
    #[must_use]
    pub fn rooms_of(&self, connection: ConnectionId) -> HashSet<RoomId> {
        self.state
            .read()
            .memberships
            .get(&connection)
            .cloned()
            .unwrap_or_default()
    }

    /// Remove a connection from every room it was in.
    ///
    /// Called exactly once per connection on disconnect; afterwards no
    /// stale membership survives the closed connection.
    pub fn remove_connection(&self, connection: ConnectionId) {
        let mut state = self.state.write();
        let Some(rooms) = state.memberships.remove(&connection) else {
            return;
        };
        for room in rooms {
            if let Some(members) = state.rooms.get_mut(&room) {
                members.remove(&connection);
                if members.is_empty() {
                    state.rooms.remove(&room);
                }
            }
        }
    }

    /// Registry statistics for the health endpoint.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        let state = self.state.read();
        RegistryStats {
            room_count: state.rooms.len(),
            connection_count: state.memberships.len(),
        }
    }
}

/// Registry statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegistryStats {
    /// Number of non-empty rooms.
    pub room_count: usize,
    /// Number of connections with at least one membership.
    pub connection_count: usize,
}

// =============================================================================
// Tests
// =============================================================================
