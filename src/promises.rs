//! # Gossip Promise Tracking
//!
//! When a peer advertises a message (IHAVE) and we ask for it (IWANT), the
//! peer has implicitly promised to deliver the payload. This module tracks
//! those promises and reports the ones that expire unfulfilled so the
//! scoring engine can assess a behavioural penalty.
//!
//! ## Sampling
//!
//! Only one message id is tracked per IWANT, chosen uniformly at random
//! from the requested batch. This keeps memory proportional to the number
//! of IWANTs rather than the number of advertised ids while still catching
//! peers that systematically break promises.

use std::collections::HashMap;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::Instant;
use tracing::trace;

use crate::messages::{MessageId, PeerId, RejectReason};

/// How long a peer has to deliver a message it advertised before the
/// promise counts as broken.
pub const DEFAULT_IWANT_FOLLOWUP_TIME: Duration = Duration::from_secs(3);

/// Maximum message ids with outstanding promises.
/// SECURITY: Bounds the tracker against IHAVE floods; promises past the
/// cap are simply not tracked.
pub const MAX_TRACKED_PROMISES: usize = 10_000;

/// Tracks which peers owe us which messages, and by when.
pub struct GossipPromises {
    /// msgId → (peer → delivery deadline).
    promises: HashMap<MessageId, HashMap<PeerId, Instant>>,
    followup_time: Duration,
    rng: StdRng,
}

impl Default for GossipPromises {
    fn default() -> Self {
        Self::new()
    }
}

impl GossipPromises {
    pub fn new() -> Self {
        Self::with_followup_time(DEFAULT_IWANT_FOLLOWUP_TIME)
    }

    pub fn with_followup_time(followup_time: Duration) -> Self {
        Self {
            promises: HashMap::new(),
            followup_time,
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic RNG for reproducible tests.
    pub fn with_seed(followup_time: Duration, seed: u64) -> Self {
        Self {
            promises: HashMap::new(),
            followup_time,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Record a promise from `peer` covering `msg_ids`.
    ///
    /// One id is sampled uniformly from the batch; if the peer already has
    /// a promise outstanding for that id, the earlier deadline stands. A
    /// peer must not be able to push its deadline back by re-advertising.
    pub fn add_promise(&mut self, peer: PeerId, msg_ids: &[MessageId]) {
        if msg_ids.is_empty() {
            return;
        }
        let idx = self.rng.gen_range(0..msg_ids.len());
        let msg_id = &msg_ids[idx];

        if !self.promises.contains_key(msg_id) && self.promises.len() >= MAX_TRACKED_PROMISES {
            trace!(
                peer = %peer.short(),
                "promise tracker full, not tracking"
            );
            return;
        }

        let deadline = Instant::now() + self.followup_time;
        self.promises
            .entry(msg_id.clone())
            .or_default()
            .entry(peer)
            .or_insert(deadline);
    }

    /// Sweep expired promises, returning how many each peer broke.
    ///
    /// Each broken promise is counted exactly once and then forgotten.
    pub fn get_broken_promises(&mut self) -> HashMap<PeerId, usize> {
        let now = Instant::now();
        let mut broken: HashMap<PeerId, usize> = HashMap::new();

        self.promises.retain(|msg_id, peers| {
            peers.retain(|peer, deadline| {
                if *deadline < now {
                    *broken.entry(*peer).or_insert(0) += 1;
                    trace!(
                        peer = %peer.short(),
                        msg_id = %msg_id.short(),
                        "broken gossip promise"
                    );
                    false
                } else {
                    true
                }
            });
            !peers.is_empty()
        });

        broken
    }

    /// The message arrived; every outstanding promise for it is fulfilled.
    pub fn message_delivered(&mut self, msg_id: &MessageId) {
        self.promises.remove(msg_id);
    }

    /// The message was rejected.
    ///
    /// Signature-level failures do NOT relieve promises: the forwarded
    /// bytes were not the promised message, so the promise is still open
    /// until the real payload shows up or the deadline passes.
    pub fn reject_message(&mut self, msg_id: &MessageId, reason: RejectReason) {
        if reason.is_signature_failure() {
            return;
        }
        self.promises.remove(msg_id);
    }

    /// Outstanding promises made by `peer` across all messages.
    pub fn peer_promise_count(&self, peer: &PeerId) -> usize {
        self.promises
            .values()
            .filter(|peers| peers.contains_key(peer))
            .count()
    }

    /// Whether any peer still owes us this message.
    pub fn contains(&self, msg_id: &MessageId) -> bool {
        self.promises.contains_key(msg_id)
    }

    pub fn clear(&mut self) {
        self.promises.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(n: u8) -> PeerId {
        PeerId::from_bytes([n; 32])
    }

    fn msg_id(n: u8) -> MessageId {
        MessageId::new(vec![n; 4])
    }

    fn tracker() -> GossipPromises {
        GossipPromises::with_seed(DEFAULT_IWANT_FOLLOWUP_TIME, 42)
    }

    #[tokio::test(start_paused = true)]
    async fn single_id_promise_is_tracked() {
        let mut promises = tracker();
        let ids = vec![msg_id(1)];
        promises.add_promise(peer(1), &ids);

        assert!(promises.contains(&ids[0]));
        assert_eq!(promises.peer_promise_count(&peer(1)), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn one_id_sampled_per_batch() {
        let mut promises = tracker();
        let ids: Vec<MessageId> = (0..10).map(msg_id).collect();
        promises.add_promise(peer(1), &ids);

        let tracked = ids.iter().filter(|id| promises.contains(id)).count();
        assert_eq!(tracked, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_batch_is_ignored() {
        let mut promises = tracker();
        promises.add_promise(peer(1), &[]);
        assert_eq!(promises.peer_promise_count(&peer(1)), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_promise_counts_once() {
        let mut promises = tracker();
        let ids = vec![msg_id(1)];
        promises.add_promise(peer(1), &ids);

        // Not yet expired.
        let broken = promises.get_broken_promises();
        assert!(broken.is_empty());

        tokio::time::advance(DEFAULT_IWANT_FOLLOWUP_TIME + Duration::from_millis(10)).await;
        let broken = promises.get_broken_promises();
        assert_eq!(broken.get(&peer(1)), Some(&1));

        // Counted exactly once; a second sweep finds nothing.
        let broken = promises.get_broken_promises();
        assert!(broken.is_empty());
        assert!(!promises.contains(&ids[0]));
    }

    #[tokio::test(start_paused = true)]
    async fn delivery_fulfills_all_peers_promises() {
        let mut promises = tracker();
        let ids = vec![msg_id(1)];
        promises.add_promise(peer(1), &ids);
        promises.add_promise(peer(2), &ids);

        promises.message_delivered(&ids[0]);

        tokio::time::advance(DEFAULT_IWANT_FOLLOWUP_TIME * 2).await;
        assert!(promises.get_broken_promises().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn generic_rejection_clears_promises() {
        let mut promises = tracker();
        let ids = vec![msg_id(1)];
        promises.add_promise(peer(1), &ids);

        promises.reject_message(&ids[0], RejectReason::ValidatorReject);
        assert!(!promises.contains(&ids[0]));
    }

    #[tokio::test(start_paused = true)]
    async fn signature_rejection_keeps_promises_open() {
        let mut promises = tracker();
        let ids = vec![msg_id(1)];
        promises.add_promise(peer(1), &ids);

        promises.reject_message(&ids[0], RejectReason::InvalidSignature);
        assert!(promises.contains(&ids[0]));

        // The promise still expires and counts as broken.
        tokio::time::advance(DEFAULT_IWANT_FOLLOWUP_TIME + Duration::from_millis(10)).await;
        let broken = promises.get_broken_promises();
        assert_eq!(broken.get(&peer(1)), Some(&1));
    }

    #[tokio::test(start_paused = true)]
    async fn readvertising_does_not_extend_deadline() {
        let mut promises = tracker();
        let ids = vec![msg_id(1)];
        promises.add_promise(peer(1), &ids);

        tokio::time::advance(DEFAULT_IWANT_FOLLOWUP_TIME - Duration::from_millis(100)).await;
        // Re-advertise just before the deadline; must not reset it.
        promises.add_promise(peer(1), &ids);

        tokio::time::advance(Duration::from_millis(200)).await;
        let broken = promises.get_broken_promises();
        assert_eq!(broken.get(&peer(1)), Some(&1));
    }

    #[tokio::test(start_paused = true)]
    async fn clear_drops_everything() {
        let mut promises = tracker();
        promises.add_promise(peer(1), &[msg_id(1)]);
        promises.add_promise(peer(2), &[msg_id(2)]);
        promises.clear();

        tokio::time::advance(DEFAULT_IWANT_FOLLOWUP_TIME * 2).await;
        assert!(promises.get_broken_promises().is_empty());
    }
}
