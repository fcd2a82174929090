//! Broadcast Scheduling Integration Tests
//!
//! Drives the full broadcast core (queue, clock, rooms, connections,
//! scheduler) through deterministic ticks and asserts on what clients
//! actually receive.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tokio::time::timeout;

use alert_broadcaster::{
    Alert, AlertHistory, AlertKind, AlertQueue, BroadcastScheduler, ConnectionGrant,
    ConnectionManager, Direction, OutboundMessage, ResolvedClient, RingHistory, RoomRegistry, Tier,
};

const RECV_TIMEOUT: Duration = Duration::from_millis(100);

struct Harness {
    queue: Arc<AlertQueue>,
    connections: Arc<ConnectionManager>,
    scheduler: Arc<BroadcastScheduler>,
}

fn at(hour: u32, min: u32, sec: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, hour, min, sec).unwrap()
}

fn harness(start: DateTime<Utc>) -> Harness {
    let queue = Arc::new(AlertQueue::new(|_| 256));
    let registry = Arc::new(RoomRegistry::new());
    let history: Arc<dyn AlertHistory> = Arc::new(RingHistory::new(50));
    let connections = Arc::new(ConnectionManager::new(Arc::clone(&registry), Arc::clone(&history), 64));
    let scheduler = Arc::new(BroadcastScheduler::new(
        Arc::clone(&queue),
        registry,
        Arc::clone(&connections),
        history,
        Duration::from_secs(1),
        start,
    ));
    Harness {
        queue,
        connections,
        scheduler,
    }
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
        AlertKind::VolumeSpike {
            current_volume: Decimal::from(9_000_000),
            previous_volume: Decimal::from(3_000_000),
            volume_ratio: Decimal::from(3),
            price: Decimal::from(64_000),
            funding_rate: None,
            is_update: false,
            alert_type: "INITIAL".to_string(),
        },
        Direction::Up,
        format!("{symbol} volume spike"),
        Utc::now(),
    )
}

/// Drain the handshake messages (ack + optional snapshot) off a fresh
/// connection, returning any snapshot alerts.
async fn consume_handshake(outbound: &mut mpsc::Receiver<OutboundMessage>) -> Vec<Alert> {
    let ack = timeout(RECV_TIMEOUT, outbound.recv()).await.unwrap().unwrap();
    assert!(matches!(ack, OutboundMessage::Connected { .. }));

    match timeout(Duration::from_millis(20), outbound.recv()).await {
        Ok(Some(OutboundMessage::Snapshot { alerts })) => alerts,
        Ok(Some(other)) => panic!("unexpected message after ack: {other:?}"),
        _ => Vec::new(),
    }
}

async fn recv_batch(outbound: &mut mpsc::Receiver<OutboundMessage>) -> Arc<alert_broadcaster::AlertBatch> {
    match timeout(RECV_TIMEOUT, outbound.recv()).await.unwrap().unwrap() {
        OutboundMessage::Batch(batch) => batch,
        other => panic!("expected batch, got {other:?}"),
    }
}

fn assert_silent(outbound: &mut mpsc::Receiver<OutboundMessage>) {
    assert!(outbound.try_recv().is_err());
}

// =============================================================================
// Elite Real-Time Delivery
// =============================================================================

#[tokio::test]
async fn elite_client_receives_alert_on_next_tick() {
    let h = harness(at(10, 2, 30));
    let ConnectionGrant { mut outbound, .. } = h.connections.connect(&client(Tier::Elite, "u-1"));
    consume_handshake(&mut outbound).await;

    let alert = make_alert("BTCUSDT");
    h.queue.enqueue_all(&alert);
    h.scheduler.tick(at(10, 2, 31));

    let batch = recv_batch(&mut outbound).await;
    assert_eq!(batch.tier, Tier::Elite);
    assert_eq!(batch.alerts, vec![alert]);
}

#[tokio::test]
async fn elite_gets_one_batch_per_tick_not_per_alert() {
    let h = harness(at(10, 0, 0));
    let ConnectionGrant { mut outbound, .. } = h.connections.connect(&client(Tier::Elite, "u-1"));
    consume_handshake(&mut outbound).await;

    h.queue.enqueue_all(&make_alert("BTCUSDT"));
    h.queue.enqueue_all(&make_alert("ETHUSDT"));
    h.scheduler.tick(at(10, 0, 1));

    let batch = recv_batch(&mut outbound).await;
    assert_eq!(batch.alerts.len(), 2);
    assert_silent(&mut outbound);
}

// =============================================================================
// Pro / Free Boundary Batching
// =============================================================================

#[tokio::test]
async fn pro_client_waits_for_five_minute_boundary() {
    let h = harness(at(10, 2, 0));
    let ConnectionGrant { mut outbound, .. } = h.connections.connect(&client(Tier::Pro, "u-1"));
    consume_handshake(&mut outbound).await;

    let first = make_alert("BTCUSDT");
    let second = make_alert("ETHUSDT");
    h.queue.enqueue_all(&first);
    h.scheduler.tick(at(10, 3, 0));
    h.queue.enqueue_all(&second);
    h.scheduler.tick(at(10, 4, 0));

    // Still inside the 10:00-10:05 window.
    assert_silent(&mut outbound);

    h.scheduler.tick(at(10, 5, 0));

    let batch = recv_batch(&mut outbound).await;
    assert_eq!(batch.tier, Tier::Pro);
    assert_eq!(batch.alerts, vec![first, second]);
    assert_silent(&mut outbound);
}

#[tokio::test]
async fn free_client_waits_for_fifteen_minute_boundary() {
    let h = harness(at(9, 50, 0));
    let ConnectionGrant { mut outbound, .. } = h.connections.connect(&client(Tier::Free, "u-1"));
    consume_handshake(&mut outbound).await;

    h.queue.enqueue_all(&make_alert("BTCUSDT"));
    h.scheduler.tick(at(9, 55, 0)); // a 5-minute boundary, not 15
    assert_silent(&mut outbound);

    h.scheduler.tick(at(10, 0, 0));
    let batch = recv_batch(&mut outbound).await;
    assert_eq!(batch.tier, Tier::Free);
    assert_eq!(batch.alerts.len(), 1);
}

#[tokio::test]
async fn boundary_without_pending_alerts_sends_nothing() {
    let h = harness(at(10, 2, 0));
    let ConnectionGrant { mut outbound, .. } = h.connections.connect(&client(Tier::Pro, "u-1"));
    consume_handshake(&mut outbound).await;

    h.scheduler.tick(at(10, 5, 0));
    assert_silent(&mut outbound);
}

#[tokio::test]
async fn tiers_receive_independently() {
    let h = harness(at(10, 2, 0));
    let elite = h.connections.connect(&client(Tier::Elite, "u-elite"));
    let pro = h.connections.connect(&client(Tier::Pro, "u-pro"));
    let mut elite_rx = elite.outbound;
    let mut pro_rx = pro.outbound;
    consume_handshake(&mut elite_rx).await;
    consume_handshake(&mut pro_rx).await;

    h.queue.enqueue_all(&make_alert("BTCUSDT"));
    h.scheduler.tick(at(10, 2, 1));

    // Elite delivered immediately; Pro still waiting.
    assert_eq!(recv_batch(&mut elite_rx).await.tier, Tier::Elite);
    assert_silent(&mut pro_rx);

    h.scheduler.tick(at(10, 5, 0));
    assert_eq!(recv_batch(&mut pro_rx).await.tier, Tier::Pro);
}

// =============================================================================
// Cap Eviction
// =============================================================================

#[tokio::test]
async fn overflowing_batch_keeps_newest_alerts() {
    let cap = 10;
    let queue = Arc::new(AlertQueue::new(move |_| cap));
    let registry = Arc::new(RoomRegistry::new());
    let history: Arc<dyn AlertHistory> = Arc::new(RingHistory::new(50));
    let connections = Arc::new(ConnectionManager::new(Arc::clone(&registry), Arc::clone(&history), 64));
    let scheduler = BroadcastScheduler::new(
        Arc::clone(&queue),
        registry,
        Arc::clone(&connections),
        history,
        Duration::from_secs(1),
        at(10, 2, 0),
    );

    let ConnectionGrant { mut outbound, .. } = connections.connect(&client(Tier::Pro, "u-1"));
    consume_handshake(&mut outbound).await;

    let alerts: Vec<_> = (0..cap + 5).map(|i| make_alert(&format!("SYM{i}"))).collect();
    for alert in &alerts {
        queue.enqueue(Tier::Pro, alert.clone());
    }
    scheduler.tick(at(10, 5, 0));

    let batch = recv_batch(&mut outbound).await;
    assert_eq!(batch.alerts.len(), cap);
    assert_eq!(batch.alerts, alerts[5..]);
}

// =============================================================================
// Reconnect Catch-Up
// =============================================================================

#[tokio::test]
async fn reconnecting_client_sees_delivered_history_without_gaps() {
    let h = harness(at(10, 0, 0));

    // First session: alert X delivered while connected.
    let first = h.connections.connect(&client(Tier::Elite, "u-1"));
    let mut first_rx = first.outbound;
    consume_handshake(&mut first_rx).await;

    let x = make_alert("BTCUSDT");
    h.queue.enqueue_all(&x);
    h.scheduler.tick(at(10, 0, 1));
    recv_batch(&mut first_rx).await;

    h.connections.disconnect(first.connection_id);

    // Alert Y delivered while nobody from this user is connected.
    let y = make_alert("ETHUSDT");
    h.queue.enqueue_all(&y);
    h.scheduler.tick(at(10, 0, 2));

    // Second session: Y arrives in the snapshot, not lost.
    let second = h.connections.connect(&client(Tier::Elite, "u-1"));
    let mut second_rx = second.outbound;
    let snapshot = consume_handshake(&mut second_rx).await;
    assert!(snapshot.contains(&x));
    assert!(snapshot.contains(&y));

    // Live delivery resumes, without duplicating Y.
    let z = make_alert("SOLUSDT");
    h.queue.enqueue_all(&z);
    h.scheduler.tick(at(10, 0, 3));
    let batch = recv_batch(&mut second_rx).await;
    assert_eq!(batch.alerts, vec![z]);
}

// =============================================================================
// Dead Connection Cleanup
// =============================================================================

#[tokio::test]
async fn closed_connection_is_removed_on_delivery() {
    let h = harness(at(10, 0, 0));
    let grant = h.connections.connect(&client(Tier::Elite, "u-1"));
    drop(grant.outbound); // transport gone

    h.queue.enqueue_all(&make_alert("BTCUSDT"));
    h.scheduler.tick(at(10, 0, 1));

    assert_eq!(h.connections.connection_count(), 0);
}
