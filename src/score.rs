//! # Peer Score Engine
//!
//! Per-peer scoring state and the score function itself, per the GossipSub
//! v1.1 scoring model. Each known peer carries per-topic counters that are
//! fed by delivery events, mesh membership changes, and connectivity
//! telemetry, then combined under the weighted formula:
//!
//! | Component | Signal | Scope |
//! |-----------|--------|-------|
//! | P1 | Time in mesh | per topic |
//! | P2 | First message deliveries | per topic |
//! | P3 | Mesh delivery deficit (squared) | per topic |
//! | P3b | Sticky mesh failure penalty | per topic |
//! | P4 | Invalid message deliveries (squared) | per topic |
//! | P5 | Application-specific score | per peer |
//! | P6 | IP colocation excess (squared) | per peer |
//! | P7 | Behavioural penalty excess (squared) | per peer |
//!
//! ## Retention
//!
//! A peer that disconnects with a non-positive score keeps its stats for
//! `retain_score`, so misbehavior cannot be shed by reconnecting. A peer
//! that disconnects with a positive score is dropped immediately; positive
//! history must not be bankable either.
//!
//! ## Decay
//!
//! All counters age multiplicatively on each refresh pass and snap to zero
//! below `decay_to_zero`. Retained (disconnected) peers do not decay;
//! their penalties are frozen until the retention window ends.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace};

use crate::deliveries::{DeliveryRecords, DeliveryStatus};
use crate::messages::{GossipMessage, MessageId, PeerId, RejectReason};
use crate::params::{ParamsError, PeerScoreParams};
use crate::protocols::ConnectionManager;

// ============================================================================
// Per-Peer State
// ============================================================================

/// Counters for one (peer, topic) pair. Created lazily on the first event
/// that references a scored topic; unscored topics never allocate stats.
#[derive(Debug, Default, Clone)]
struct TopicStats {
    /// Whether the peer is currently in our mesh for this topic.
    in_mesh: bool,
    /// When the peer was last grafted; meaningful only while `in_mesh`.
    graft_time: Option<Instant>,
    /// Time in mesh as of the last refresh pass (drives P1).
    mesh_time: Duration,
    /// P2 counter, capped on increment.
    first_message_deliveries: f64,
    /// P3 counter, capped on increment.
    mesh_message_deliveries: f64,
    /// Gate for the P3 deficit penalty; flips on once the peer has been in
    /// the mesh longer than the activation window.
    mesh_message_deliveries_active: bool,
    /// P3b accumulator.
    mesh_failure_penalty: f64,
    /// P4 counter.
    invalid_message_deliveries: f64,
}

/// All scoring state for one peer.
#[derive(Debug, Default)]
struct PeerStats {
    /// Whether the peer is currently connected.
    connected: bool,
    /// When retained (disconnected) state may be dropped; `None` while
    /// connected.
    expire: Option<Instant>,
    /// Per-topic counters, keyed by topic name.
    topics: HashMap<String, TopicStats>,
    /// Current remote IPs, mirrored in the engine's colocation index.
    ips: Vec<IpAddr>,
    /// P7 accumulator.
    behaviour_penalty: f64,
}

// ============================================================================
// Engine
// ============================================================================

/// The peer-score engine: a synchronous state machine fed by overlay
/// events, queried with [`PeerScore::score`].
///
/// All methods are non-blocking; the engine is designed to live behind a
/// single logical owner (see the scoreboard actor) that serializes calls.
pub struct PeerScore {
    params: PeerScoreParams,
    /// Stats for every tracked peer, connected or retained.
    peer_stats: HashMap<PeerId, PeerStats>,
    /// Colocation index: ip → peers currently known at that ip.
    /// Kept exactly consistent with `PeerStats::ips`; no empty buckets.
    peer_ips: HashMap<IpAddr, HashSet<PeerId>>,
    /// Recent per-message delivery state.
    deliveries: DeliveryRecords,
    conn_mgr: Arc<dyn ConnectionManager>,
}

impl PeerScore {
    /// Build an engine from validated parameters.
    pub fn new(
        params: PeerScoreParams,
        conn_mgr: Arc<dyn ConnectionManager>,
    ) -> Result<Self, ParamsError> {
        params.validate()?;
        Ok(Self {
            params,
            peer_stats: HashMap::new(),
            peer_ips: HashMap::new(),
            deliveries: DeliveryRecords::new(),
            conn_mgr,
        })
    }

    /// Number of peers currently tracked (connected or retained).
    pub fn tracked_peers(&self) -> usize {
        self.peer_stats.len()
    }

    // ========================================================================
    // Score Computation
    // ========================================================================

    /// Compute the current score for `peer`. Unknown peers score 0.
    ///
    /// Pure read: no counters move. The summed per-topic contributions are
    /// clamped to `topic_score_cap` (when positive) before the peer-level
    /// components are added.
    pub fn score(&self, peer: &PeerId) -> f64 {
        let Some(stats) = self.peer_stats.get(peer) else {
            return 0.0;
        };

        let mut topic_contribution = 0.0;
        for (topic, tstats) in &stats.topics {
            let Some(tp) = self.params.topics.get(topic) else {
                continue;
            };

            let mut topic_score = 0.0;

            // P1: time in mesh
            if tstats.in_mesh {
                let mut p1 =
                    tstats.mesh_time.as_secs_f64() / tp.time_in_mesh_quantum.as_secs_f64();
                if p1 > tp.time_in_mesh_cap {
                    p1 = tp.time_in_mesh_cap;
                }
                topic_score += p1 * tp.time_in_mesh_weight;
            }

            // P2: first message deliveries (counter capped on increment)
            topic_score += tstats.first_message_deliveries * tp.first_message_deliveries_weight;

            // P3: mesh delivery deficit, squared, only once activated
            if tstats.mesh_message_deliveries_active
                && tstats.mesh_message_deliveries < tp.mesh_message_deliveries_threshold
            {
                let deficit =
                    tp.mesh_message_deliveries_threshold - tstats.mesh_message_deliveries;
                topic_score += deficit * deficit * tp.mesh_message_deliveries_weight;
            }

            // P3b: sticky mesh failure penalty
            topic_score += tstats.mesh_failure_penalty * tp.mesh_failure_penalty_weight;

            // P4: invalid messages, squared
            topic_score += tstats.invalid_message_deliveries
                * tstats.invalid_message_deliveries
                * tp.invalid_message_deliveries_weight;

            topic_contribution += tp.topic_weight * topic_score;
        }

        if self.params.topic_score_cap > 0.0 && topic_contribution > self.params.topic_score_cap {
            topic_contribution = self.params.topic_score_cap;
        }
        let mut score = topic_contribution;

        // P5: application-specific score
        score += (self.params.app_specific_score)(peer) * self.params.app_specific_weight;

        // P6: IP colocation; every peer sharing the address is penalized
        if self.params.ip_colocation_factor_weight != 0.0 {
            for ip in &stats.ips {
                if self.params.ip_colocation_factor_whitelist.contains(ip) {
                    continue;
                }
                let peers_on_ip = self.peer_ips.get(ip).map_or(0, HashSet::len);
                if peers_on_ip > self.params.ip_colocation_factor_threshold {
                    let excess =
                        (peers_on_ip - self.params.ip_colocation_factor_threshold) as f64;
                    score += excess * excess * self.params.ip_colocation_factor_weight;
                }
            }
        }

        // P7: behavioural penalty above the threshold, squared
        if self.params.behaviour_penalty_weight != 0.0 {
            let excess = stats.behaviour_penalty - self.params.behaviour_penalty_threshold;
            if excess > 0.0 {
                score += excess * excess * self.params.behaviour_penalty_weight;
            }
        }

        score
    }

    // ========================================================================
    // Connectivity Hooks
    // ========================================================================

    /// A peer connected. Reconnection within the retention window revives
    /// the retained stats; a misbehaver cannot shed a negative score by
    /// bouncing.
    pub fn add_peer(&mut self, peer: PeerId) {
        let stats = self.peer_stats.entry(peer).or_default();
        stats.connected = true;
        stats.expire = None;

        let ips = self.conn_mgr.peer_ips(&peer);
        self.set_ips(&peer, ips);
    }

    /// A peer disconnected.
    ///
    /// Positive score: dropped immediately, so goodwill cannot be banked
    /// and spent after a reconnect. Otherwise the stats are retained for
    /// `retain_score` with first-delivery credit zeroed and any pending
    /// mesh-delivery deficit converted into the sticky failure penalty.
    pub fn remove_peer(&mut self, peer: &PeerId) {
        if !self.peer_stats.contains_key(peer) {
            return;
        }

        if self.score(peer) > 0.0 {
            if let Some(stats) = self.peer_stats.get(peer) {
                let ips = stats.ips.clone();
                self.remove_ips(peer, &ips);
            }
            self.peer_stats.remove(peer);
            trace!(peer = %peer.short(), "dropped positive-score peer on disconnect");
            return;
        }

        let Some(stats) = self.peer_stats.get_mut(peer) else {
            return;
        };
        for (topic, tstats) in stats.topics.iter_mut() {
            tstats.first_message_deliveries = 0.0;

            if let Some(tp) = self.params.topics.get(topic) {
                if tstats.in_mesh
                    && tstats.mesh_message_deliveries_active
                    && tstats.mesh_message_deliveries < tp.mesh_message_deliveries_threshold
                {
                    let deficit =
                        tp.mesh_message_deliveries_threshold - tstats.mesh_message_deliveries;
                    tstats.mesh_failure_penalty += deficit * deficit;
                }
            }
            tstats.in_mesh = false;
            tstats.mesh_message_deliveries_active = false;
        }
        stats.connected = false;
        stats.expire = Some(Instant::now() + self.params.retain_score);
        trace!(peer = %peer.short(), "retaining peer score after disconnect");
    }

    // ========================================================================
    // Mesh Membership Hooks
    // ========================================================================

    /// The peer was grafted into our mesh for `topic`.
    pub fn graft(&mut self, peer: &PeerId, topic: &str) {
        if !self.params.topics.contains_key(topic) {
            return;
        }
        let Some(stats) = self.peer_stats.get_mut(peer) else {
            return;
        };
        let tstats = stats.topics.entry(topic.to_string()).or_default();
        tstats.in_mesh = true;
        tstats.graft_time = Some(Instant::now());
        tstats.mesh_time = Duration::ZERO;
        tstats.mesh_message_deliveries_active = false;
    }

    /// The peer was pruned from our mesh for `topic`. An unmet delivery
    /// threshold at prune time becomes a sticky failure penalty.
    pub fn prune(&mut self, peer: &PeerId, topic: &str) {
        let Some(tp) = self.params.topics.get(topic) else {
            return;
        };
        let Some(stats) = self.peer_stats.get_mut(peer) else {
            return;
        };
        let tstats = stats.topics.entry(topic.to_string()).or_default();

        if tstats.mesh_message_deliveries_active
            && tstats.mesh_message_deliveries < tp.mesh_message_deliveries_threshold
        {
            let deficit = tp.mesh_message_deliveries_threshold - tstats.mesh_message_deliveries;
            tstats.mesh_failure_penalty += deficit * deficit;
        }
        tstats.mesh_message_deliveries_active = false;
        tstats.in_mesh = false;
    }

    // ========================================================================
    // Message Delivery Hooks
    // ========================================================================

    /// A message entered validation. Opens its delivery record so later
    /// duplicates are attributed correctly; no counters move yet.
    pub fn validate_message(&mut self, msg_id: &MessageId) {
        self.deliveries.ensure_record(msg_id);
    }

    /// A message passed validation. Credits the first deliverer, then every
    /// peer that forwarded a copy while validation was still pending.
    pub fn deliver_message(&mut self, msg: &GossipMessage, msg_id: &MessageId) {
        self.mark_first_message_delivery(&msg.received_from, &msg.topics);

        let record = self.deliveries.ensure_record(msg_id);
        if record.status != DeliveryStatus::Unknown {
            debug!(
                msg_id = %msg_id.short(),
                status = ?record.status,
                "unexpected delivery for message with known status"
            );
            return;
        }
        record.status = DeliveryStatus::Valid;
        record.validated = Some(Instant::now());

        // Forwarders that beat validation get mesh credit with no window
        // check; they were by definition not late.
        let early_forwarders: Vec<PeerId> = record.peers.iter().copied().collect();
        for peer in early_forwarders {
            if peer != msg.received_from {
                self.mark_duplicate_message_delivery(&peer, &msg.topics, None);
            }
        }
    }

    /// A message failed validation.
    ///
    /// Signature failures penalize the forwarder without touching the
    /// delivery record: the id of an unsigned or forged message cannot be
    /// trusted to key shared state. Ignored messages close the record with
    /// nobody penalized. Everything else penalizes the forwarder and every
    /// earlier forwarder on record.
    pub fn reject_message(&mut self, msg: &GossipMessage, msg_id: &MessageId, reason: RejectReason) {
        if reason.is_signature_failure() {
            self.mark_invalid_message_delivery(&msg.received_from, &msg.topics);
            return;
        }

        let record = self.deliveries.ensure_record(msg_id);
        if record.status != DeliveryStatus::Unknown {
            debug!(
                msg_id = %msg_id.short(),
                status = ?record.status,
                "unexpected rejection for message with known status"
            );
            return;
        }

        if reason == RejectReason::ValidatorIgnore {
            record.status = DeliveryStatus::Ignored;
            return;
        }

        record.status = DeliveryStatus::Invalid;
        let early_forwarders: Vec<PeerId> = record.peers.iter().copied().collect();

        self.mark_invalid_message_delivery(&msg.received_from, &msg.topics);
        for peer in early_forwarders {
            self.mark_invalid_message_delivery(&peer, &msg.topics);
        }
    }

    /// A duplicate copy of a known message arrived.
    pub fn duplicate_message(&mut self, msg: &GossipMessage, msg_id: &MessageId) {
        let from = msg.received_from;

        let record = self.deliveries.ensure_record(msg_id);
        if record.peers.contains(&from) {
            // Only the first duplicate per peer counts.
            return;
        }

        match record.status {
            DeliveryStatus::Unknown => {
                // Validation pending; remember the forwarder so the
                // terminal state can credit or penalize them.
                record.peers.insert(from);
            }
            DeliveryStatus::Valid => {
                record.peers.insert(from);
                let validated = record.validated;
                self.mark_duplicate_message_delivery(&from, &msg.topics, validated);
            }
            DeliveryStatus::Invalid => {
                // Not added to the record; the invalidation cascade already
                // ran and this peer is penalized directly.
                self.mark_invalid_message_delivery(&from, &msg.topics);
            }
            DeliveryStatus::Ignored => {}
        }
    }

    /// Accumulate a behavioural penalty (P7) for `peer`.
    pub fn add_penalty(&mut self, peer: &PeerId, penalty: f64) {
        let Some(stats) = self.peer_stats.get_mut(peer) else {
            return;
        };
        stats.behaviour_penalty += penalty;
        trace!(
            peer = %peer.short(),
            penalty,
            total = stats.behaviour_penalty,
            "behaviour penalty added"
        );
    }

    // ========================================================================
    // Periodic Maintenance
    // ========================================================================

    /// Age all counters, activate mesh-delivery penalties whose grace
    /// period ended, and drop retained peers whose retention expired.
    pub fn refresh_scores(&mut self) {
        let now = Instant::now();
        let mut expired: Vec<PeerId> = Vec::new();

        for (peer, stats) in self.peer_stats.iter_mut() {
            if !stats.connected {
                // Retained peers do not decay; penalties must survive a
                // disconnect-reconnect cycle intact.
                if stats.expire.is_some_and(|expire| now > expire) {
                    expired.push(*peer);
                }
                continue;
            }

            for (topic, tstats) in stats.topics.iter_mut() {
                let Some(tp) = self.params.topics.get(topic) else {
                    continue;
                };

                tstats.first_message_deliveries *= tp.first_message_deliveries_decay;
                if tstats.first_message_deliveries < self.params.decay_to_zero {
                    tstats.first_message_deliveries = 0.0;
                }

                tstats.mesh_message_deliveries *= tp.mesh_message_deliveries_decay;
                if tstats.mesh_message_deliveries < self.params.decay_to_zero {
                    tstats.mesh_message_deliveries = 0.0;
                }

                tstats.mesh_failure_penalty *= tp.mesh_failure_penalty_decay;
                if tstats.mesh_failure_penalty < self.params.decay_to_zero {
                    tstats.mesh_failure_penalty = 0.0;
                }

                tstats.invalid_message_deliveries *= tp.invalid_message_deliveries_decay;
                if tstats.invalid_message_deliveries < self.params.decay_to_zero {
                    tstats.invalid_message_deliveries = 0.0;
                }

                if tstats.in_mesh {
                    if let Some(graft_time) = tstats.graft_time {
                        tstats.mesh_time = now - graft_time;
                        if tstats.mesh_time > tp.mesh_message_deliveries_activation {
                            tstats.mesh_message_deliveries_active = true;
                        }
                    }
                }
            }

            stats.behaviour_penalty *= self.params.behaviour_penalty_decay;
            if stats.behaviour_penalty < self.params.decay_to_zero {
                stats.behaviour_penalty = 0.0;
            }
        }

        for peer in expired {
            if let Some(stats) = self.peer_stats.get(&peer) {
                let ips = stats.ips.clone();
                self.remove_ips(&peer, &ips);
            }
            self.peer_stats.remove(&peer);
            debug!(peer = %peer.short(), "retention expired, dropping peer score");
        }
    }

    /// Re-resolve every tracked peer's IPs through the connection manager
    /// and reconcile the colocation index.
    pub fn update_ips(&mut self) {
        let peers: Vec<PeerId> = self.peer_stats.keys().copied().collect();
        for peer in peers {
            let ips = self.conn_mgr.peer_ips(&peer);
            self.set_ips(&peer, ips);
        }
    }

    /// Expire old delivery records.
    pub fn gc_deliveries(&mut self) {
        self.deliveries.gc();
    }

    /// Drop all state (peers, colocation index, delivery records).
    pub fn clear(&mut self) {
        self.peer_stats.clear();
        self.peer_ips.clear();
        self.deliveries.clear();
    }

    // ========================================================================
    // Counter Updates
    // ========================================================================

    fn mark_first_message_delivery(&mut self, peer: &PeerId, topics: &[String]) {
        let Some(stats) = self.peer_stats.get_mut(peer) else {
            return;
        };
        for topic in topics {
            let Some(tp) = self.params.topics.get(topic) else {
                continue;
            };
            let tstats = stats.topics.entry(topic.clone()).or_default();

            tstats.first_message_deliveries =
                (tstats.first_message_deliveries + 1.0).min(tp.first_message_deliveries_cap);

            if tstats.in_mesh {
                tstats.mesh_message_deliveries =
                    (tstats.mesh_message_deliveries + 1.0).min(tp.mesh_message_deliveries_cap);
            }
        }
    }

    /// Credit a duplicate toward mesh deliveries. `validated` is when the
    /// message reached `Valid`; `None` means the duplicate arrived before
    /// validation finished, which is never late.
    fn mark_duplicate_message_delivery(
        &mut self,
        peer: &PeerId,
        topics: &[String],
        validated: Option<Instant>,
    ) {
        let Some(stats) = self.peer_stats.get_mut(peer) else {
            return;
        };
        for topic in topics {
            let Some(tp) = self.params.topics.get(topic) else {
                continue;
            };
            let tstats = stats.topics.entry(topic.clone()).or_default();
            if !tstats.in_mesh {
                continue;
            }

            if let Some(validated_at) = validated {
                // Past the grace window, a duplicate earns no mesh credit.
                if Instant::now() > validated_at + tp.mesh_message_deliveries_window {
                    continue;
                }
            }

            tstats.mesh_message_deliveries =
                (tstats.mesh_message_deliveries + 1.0).min(tp.mesh_message_deliveries_cap);
        }
    }

    fn mark_invalid_message_delivery(&mut self, peer: &PeerId, topics: &[String]) {
        let Some(stats) = self.peer_stats.get_mut(peer) else {
            return;
        };
        for topic in topics {
            if !self.params.topics.contains_key(topic) {
                continue;
            }
            let tstats = stats.topics.entry(topic.clone()).or_default();
            tstats.invalid_message_deliveries += 1.0;
        }
    }

    // ========================================================================
    // IP Index Maintenance
    // ========================================================================

    /// Replace a peer's IP set, keeping the colocation index exact.
    fn set_ips(&mut self, peer: &PeerId, new_ips: Vec<IpAddr>) {
        let Some(stats) = self.peer_stats.get_mut(peer) else {
            return;
        };

        for old_ip in &stats.ips {
            if !new_ips.contains(old_ip) {
                if let Some(bucket) = self.peer_ips.get_mut(old_ip) {
                    bucket.remove(peer);
                    if bucket.is_empty() {
                        self.peer_ips.remove(old_ip);
                    }
                }
            }
        }

        for ip in &new_ips {
            self.peer_ips.entry(*ip).or_default().insert(*peer);
        }

        stats.ips = new_ips;
    }

    fn remove_ips(&mut self, peer: &PeerId, ips: &[IpAddr]) {
        for ip in ips {
            if let Some(bucket) = self.peer_ips.get_mut(ip) {
                bucket.remove(peer);
                if bucket.is_empty() {
                    self.peer_ips.remove(ip);
                }
            }
        }
    }
}
