//! Room Membership Integration Tests
//!
//! Tests room registry bookkeeping through the connection manager:
//! connect-time joins, symbol subscriptions, and cleanup on every
//! disconnect path.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use tokio::time::timeout;

use alert_broadcaster::{
    Alert, AlertHistory, AlertKind, AlertQueue, BroadcastScheduler, ConnectionManager, Direction,
    OutboundMessage, ResolvedClient, RingHistory, RoomId, RoomRegistry, Tier,
};

fn at(hour: u32, min: u32, sec: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, hour, min, sec).unwrap()
}

fn client(tier: Tier, identity: &str) -> ResolvedClient {
    ResolvedClient {
        identity: identity.to_string(),
        tier,
        role: None,
    }
}

fn make_alert(symbol: &str) -> Alert {
    Alert::new(
        symbol,
        AlertKind::OpenInterestCross {
            baseline: Decimal::from(1_000_000),
            current: Decimal::from(1_250_000),
            pct_change: Decimal::from(25),
            abs_change: Decimal::from(250_000),
        },
        Direction::Up,
        format!("{symbol} open interest rising"),
        Utc::now(),
    )
}

fn manager() -> (Arc<RoomRegistry>, Arc<ConnectionManager>) {
    let registry = Arc::new(RoomRegistry::new());
    let history: Arc<dyn AlertHistory> = Arc::new(RingHistory::new(50));
    let connections = Arc::new(ConnectionManager::new(Arc::clone(&registry), history, 64));
    (registry, connections)
}

// =============================================================================
// Connect-Time Joins
// =============================================================================

#[tokio::test]
async fn connect_joins_tier_and_user_rooms() {
    let (registry, connections) = manager();
    let grant = connections.connect(&client(Tier::Pro, "u-42"));

    let tier_members = registry.members_of(&RoomId::Tier(Tier::Pro));
    assert!(tier_members.contains(&grant.connection_id));

    let user_members = registry.members_of(&RoomId::User("u-42".to_string()));
    assert!(user_members.contains(&grant.connection_id));
}

#[tokio::test]
async fn elevated_client_joins_role_room() {
    let (registry, connections) = manager();
    let mut admin = client(Tier::Elite, "u-admin");
    admin.role = Some("admin".to_string());

    let grant = connections.connect(&admin);
    let role_members = registry.members_of(&RoomId::Role("admin".to_string()));
    assert!(role_members.contains(&grant.connection_id));
}

#[tokio::test]
async fn two_devices_same_user_share_the_user_room() {
    let (registry, connections) = manager();
    let a = connections.connect(&client(Tier::Free, "u-1"));
    let b = connections.connect(&client(Tier::Free, "u-1"));

    let members = registry.members_of(&RoomId::User("u-1".to_string()));
    assert_eq!(members.len(), 2);
    assert!(members.contains(&a.connection_id));
    assert!(members.contains(&b.connection_id));
}

// =============================================================================
// Symbol Subscriptions
// =============================================================================

#[tokio::test]
async fn symbol_subscription_is_idempotent() {
    let (registry, connections) = manager();
    let grant = connections.connect(&client(Tier::Elite, "u-1"));

    connections.subscribe_symbol(grant.connection_id, "BTCUSDT");
    connections.subscribe_symbol(grant.connection_id, "BTCUSDT");

    let members = registry.members_of(&RoomId::Symbol("BTCUSDT".to_string()));
    assert_eq!(members.len(), 1);

    connections.unsubscribe_symbol(grant.connection_id, "BTCUSDT");
    assert!(registry.members_of(&RoomId::Symbol("BTCUSDT".to_string())).is_empty());
}

#[tokio::test]
async fn symbol_room_members_receive_referencing_batches() {
    let (registry, connections) = manager();
    let queue = Arc::new(AlertQueue::new(|_| 256));
    let history: Arc<dyn AlertHistory> = Arc::new(RingHistory::new(50));
    let scheduler = BroadcastScheduler::new(
        Arc::clone(&queue),
        Arc::clone(&registry),
        Arc::clone(&connections),
        history,
        Duration::from_secs(1),
        at(10, 0, 0),
    );

    // A pro client subscribed to BTCUSDT; the batch references it, so it
    // is delivered at the Elite boundary through the symbol room too.
    let mut grant = connections.connect(&client(Tier::Pro, "u-1"));
    connections.subscribe_symbol(grant.connection_id, "BTCUSDT");

    // drain handshake ack
    let _ = timeout(Duration::from_millis(100), grant.outbound.recv())
        .await
        .unwrap();

    queue.enqueue(Tier::Elite, make_alert("BTCUSDT"));
    scheduler.tick(at(10, 0, 1));

    let message = timeout(Duration::from_millis(100), grant.outbound.recv())
        .await
        .unwrap()
        .unwrap();
    let OutboundMessage::Batch(batch) = message else {
        panic!("expected batch, got {message:?}");
    };
    assert_eq!(batch.alerts[0].symbol, "BTCUSDT");
}

// =============================================================================
// Disconnect Cleanup
// =============================================================================

#[tokio::test]
async fn disconnect_releases_every_membership() {
    let (registry, connections) = manager();
    let grant = connections.connect(&client(Tier::Pro, "u-1"));
    connections.subscribe_symbol(grant.connection_id, "BTCUSDT");
    connections.subscribe_symbol(grant.connection_id, "ETHUSDT");

    connections.disconnect(grant.connection_id);

    assert_eq!(registry.stats().room_count, 0);
    assert!(registry.members_of(&RoomId::Tier(Tier::Pro)).is_empty());
    assert!(registry.members_of(&RoomId::Symbol("BTCUSDT".to_string())).is_empty());
    assert_eq!(connections.connection_count(), 0);
}

#[tokio::test]
async fn disconnect_is_idempotent() {
    let (registry, connections) = manager();
    let grant = connections.connect(&client(Tier::Free, "u-1"));

    connections.disconnect(grant.connection_id);
    connections.disconnect(grant.connection_id);

    assert_eq!(registry.stats().room_count, 0);
    assert_eq!(connections.connection_count(), 0);
}

#[tokio::test]
async fn disconnect_leaves_other_connections_untouched() {
    let (registry, connections) = manager();
    let a = connections.connect(&client(Tier::Pro, "u-1"));
    let b = connections.connect(&client(Tier::Pro, "u-2"));

    connections.disconnect(a.connection_id);

    let members = registry.members_of(&RoomId::Tier(Tier::Pro));
    assert_eq!(members.len(), 1);
    assert!(members.contains(&b.connection_id));
}
