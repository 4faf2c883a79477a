//! Integration tests for the public scoring API.
//!
//! These tests drive the `Scoreboard` handle end-to-end: overlay events go
//! in through the async hooks, scores come out, and the background tick
//! performs decay and promise expiry under a paused test clock.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use meshscore::{
    Blake3MessageId, ConnectionManager, GossipMessage, MessageId, MessageIdFn, PeerId,
    PeerScoreParams, PeerScoreThresholds, RejectReason, Scoreboard, TopicScoreParams,
    ERR_INVALID_SIGNATURE,
};

const TOPIC: &str = "integration-topic";

// =============================================================================
// Helper Functions
// =============================================================================

/// Connection manager backed by a shared table so tests can assign and
/// reassign peer addresses.
#[derive(Default)]
struct TestConnections {
    ips: Mutex<HashMap<PeerId, Vec<IpAddr>>>,
}

impl TestConnections {
    fn set(&self, peer: PeerId, ips: &[&str]) {
        let parsed = ips.iter().map(|ip| ip.parse().unwrap()).collect();
        self.ips.lock().unwrap().insert(peer, parsed);
    }
}

impl ConnectionManager for TestConnections {
    fn peer_ips(&self, peer: &PeerId) -> Vec<IpAddr> {
        self.ips.lock().unwrap().get(peer).cloned().unwrap_or_default()
    }
}

fn peer(n: u8) -> PeerId {
    PeerId::from_bytes([n; 32])
}

fn message(from: PeerId, data: &[u8]) -> GossipMessage {
    GossipMessage::new(from, vec![TOPIC.to_string()], data.to_vec())
}

fn scored_params() -> PeerScoreParams {
    let mut params = PeerScoreParams::default();
    params
        .topics
        .insert(TOPIC.to_string(), TopicScoreParams::default());
    params
}

fn spawn_board(params: PeerScoreParams) -> (Scoreboard, Arc<TestConnections>) {
    let conns = Arc::new(TestConnections::default());
    let board = Scoreboard::spawn(
        params,
        PeerScoreThresholds::default(),
        conns.clone(),
        Arc::new(Blake3MessageId),
    )
    .expect("spawn failed");
    (board, conns)
}

// =============================================================================
// Test: delivery credit and duplicate accounting
// =============================================================================

/// A peer that delivers fresh messages earns positive score; a peer that
/// only ever echoes duplicates earns none.
#[tokio::test(start_paused = true)]
async fn first_deliverer_outscores_echoer() {
    let (board, _) = spawn_board(scored_params());
    let (fresh, echo) = (peer(1), peer(2));

    board.add_peer(fresh).await.unwrap();
    board.add_peer(echo).await.unwrap();

    for i in 0..10u8 {
        let msg = message(fresh, &[i]);
        board.validate_message(&msg).await.unwrap();
        board.deliver_message(&msg).await.unwrap();

        let mut dup = msg.clone();
        dup.received_from = echo;
        board.duplicate_message(&dup).await.unwrap();
    }

    let fresh_score = board.score(&fresh).await;
    let echo_score = board.score(&echo).await;
    assert!(fresh_score > 0.0, "first deliverer must earn credit");
    assert_eq!(echo_score, 0.0, "echoer outside the mesh earns nothing");
    assert!(fresh_score > echo_score);
}

// =============================================================================
// Test: invalid messages poison the forwarders
// =============================================================================

/// Rejection penalizes the deliverer and every earlier forwarder, and the
/// penalty grows quadratically.
#[tokio::test(start_paused = true)]
async fn rejections_penalize_quadratically() {
    let (board, _) = spawn_board(scored_params());
    let bad = peer(3);
    board.add_peer(bad).await.unwrap();

    let msg = message(bad, b"junk-1");
    board.validate_message(&msg).await.unwrap();
    board
        .reject_message(&msg, RejectReason::ValidatorReject)
        .await
        .unwrap();
    let after_one = board.score(&bad).await;
    assert!(after_one < 0.0);

    let msg = message(bad, b"junk-2");
    board.validate_message(&msg).await.unwrap();
    board
        .reject_message(&msg, RejectReason::ValidatorReject)
        .await
        .unwrap();
    let after_two = board.score(&bad).await;

    // Squared counter: the second strike costs three times the first.
    assert!((after_two - 4.0 * after_one).abs() < 1e-9);
}

/// Signature failures map from their wire codes and are attributed to the
/// forwarding peer.
#[tokio::test(start_paused = true)]
async fn signature_failure_codes_are_attributed() {
    let (board, _) = spawn_board(scored_params());
    let forger = peer(4);
    board.add_peer(forger).await.unwrap();

    let reason = RejectReason::from_code(ERR_INVALID_SIGNATURE);
    assert_eq!(reason, RejectReason::InvalidSignature);

    let msg = message(forger, b"forged");
    board.reject_message(&msg, reason).await.unwrap();

    assert!(board.score(&forger).await < 0.0);
}

// =============================================================================
// Test: background decay
// =============================================================================

/// With no further traffic the delivery credit decays tick by tick and
/// eventually snaps to zero.
#[tokio::test(start_paused = true)]
async fn idle_scores_decay_to_zero() {
    let mut params = scored_params();
    let topic = params.topics.get_mut(TOPIC).unwrap();
    topic.first_message_deliveries_decay = 0.1;
    topic.time_in_mesh_weight = 0.0;
    let (board, _) = spawn_board(params);
    let a = peer(5);

    board.add_peer(a).await.unwrap();
    let msg = message(a, b"one-shot");
    board.validate_message(&msg).await.unwrap();
    board.deliver_message(&msg).await.unwrap();

    let initial = board.score(&a).await;
    assert!(initial > 0.0);

    // Three ticks at 0.1 decay put the counter below decay_to_zero (0.01).
    tokio::time::advance(Duration::from_secs(3)).await;
    assert_eq!(board.score(&a).await, 0.0);
}

// =============================================================================
// Test: broken gossip promises
// =============================================================================

/// Advertising a message and never delivering it costs score after the
/// follow-up window; delivering on time costs nothing.
#[tokio::test(start_paused = true)]
async fn unkept_promises_cost_score() {
    let (board, _) = spawn_board(scored_params());
    let (keeper, breaker) = (peer(6), peer(7));

    board.add_peer(keeper).await.unwrap();
    board.add_peer(breaker).await.unwrap();

    let kept_msg = message(keeper, b"kept");
    let kept_id = Blake3MessageId.message_id(&kept_msg).await.unwrap();
    board.add_promise(keeper, vec![kept_id]).await.unwrap();

    board
        .add_promise(breaker, vec![MessageId::new(vec![0xDE, 0xAD])])
        .await
        .unwrap();

    // The keeper delivers within the window.
    board.validate_message(&kept_msg).await.unwrap();
    board.deliver_message(&kept_msg).await.unwrap();

    tokio::time::advance(Duration::from_secs(6)).await;

    assert!(board.score(&breaker).await < 0.0, "broken promise must cost");
    assert!(board.score(&keeper).await >= 0.0, "kept promise must not");
}

// =============================================================================
// Test: IP colocation through the connection manager
// =============================================================================

/// Peers sharing one address get penalized once the tick refreshes IPs.
#[tokio::test(start_paused = true)]
async fn colocated_peers_get_penalized() {
    let (board, conns) = spawn_board(scored_params());
    let (lone, twin_a, twin_b) = (peer(8), peer(9), peer(10));

    conns.set(lone, &["198.51.100.1"]);
    conns.set(twin_a, &["203.0.113.7"]);
    conns.set(twin_b, &["203.0.113.7"]);

    for p in [lone, twin_a, twin_b] {
        board.add_peer(p).await.unwrap();
    }

    assert_eq!(board.score(&lone).await, 0.0);
    assert!(board.score(&twin_a).await < 0.0);
    assert!(board.score(&twin_b).await < 0.0);

    // One twin moves away; the next tick clears both penalties.
    conns.set(twin_b, &["192.0.2.9"]);
    tokio::time::advance(Duration::from_millis(1100)).await;

    assert_eq!(board.score(&twin_a).await, 0.0);
    assert_eq!(board.score(&twin_b).await, 0.0);
}

// =============================================================================
// Test: retention across reconnects
// =============================================================================

/// A negative score survives a disconnect-reconnect bounce.
#[tokio::test(start_paused = true)]
async fn misbehavior_survives_reconnect() {
    let (board, _) = spawn_board(scored_params());
    let bouncer = peer(11);
    board.add_peer(bouncer).await.unwrap();

    let msg = message(bouncer, b"spam");
    board.validate_message(&msg).await.unwrap();
    board
        .reject_message(&msg, RejectReason::ValidatorReject)
        .await
        .unwrap();
    let dirty = board.score(&bouncer).await;
    assert!(dirty < 0.0);

    board.remove_peer(bouncer).await.unwrap();
    board.add_peer(bouncer).await.unwrap();

    assert_eq!(board.score(&bouncer).await, dirty);
}

// =============================================================================
// Test: threshold helpers and shutdown
// =============================================================================

#[tokio::test(start_paused = true)]
async fn graylisting_and_shutdown() {
    let (board, _) = spawn_board(scored_params());
    let rogue = peer(12);
    board.add_peer(rogue).await.unwrap();

    // Default behaviour weight is -10: a penalty of 4 scores -160.
    board.add_penalty(rogue, 4.0).await.unwrap();
    assert!(board.below_gossip_threshold(&rogue).await);
    assert!(board.below_publish_threshold(&rogue).await);
    assert!(board.graylisted(&rogue).await);
    assert_eq!(board.tracked_peers().await, 1);

    board.quit().await;

    // All state cleared; further hooks report the actor closed.
    assert_eq!(board.tracked_peers().await, 0);
    assert_eq!(board.score(&rogue).await, 0.0);
    assert!(board.add_peer(rogue).await.is_err());
}

/// Handles are cheap clones of one another and see the same actor.
#[tokio::test(start_paused = true)]
async fn cloned_handles_share_state() {
    let (board, _) = spawn_board(scored_params());
    let other = board.clone();
    let a = peer(13);

    board.add_peer(a).await.unwrap();
    other.add_penalty(a, 1.0).await.unwrap();

    assert!(board.score(&a).await < 0.0);
    assert_eq!(board.score(&a).await, other.score(&a).await);
}
