//! # Scoreboard Handle and Actor
//!
//! The public face of the scoring engine. Follows the Handle/Actor pattern:
//! a cheap-to-clone [`Scoreboard`] handle sends commands over a channel to a
//! private actor that owns all mutable state ([`PeerScore`] plus
//! [`GossipPromises`]) and processes them sequentially: no locks, and no
//! two hooks ever interleave their mutations.
//!
//! ## Message Ids
//!
//! Hooks that carry a message compute its id through the configured
//! [`MessageIdFn`] *before* the command is sent. The possibly-async id
//! computation therefore never blocks the actor, and an id failure
//! surfaces to the caller with no state touched.
//!
//! ## Periodic Tick
//!
//! Every `decay_interval` the actor harvests broken gossip promises into
//! behavioural penalties, refreshes (decays) all scores, re-resolves peer
//! IPs, and expires old delivery records.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::messages::{GossipMessage, MessageId, PeerId, RejectReason};
use crate::params::{PeerScoreParams, PeerScoreThresholds};
use crate::promises::GossipPromises;
use crate::protocols::{ConnectionManager, MessageIdFn};
use crate::score::PeerScore;

/// Commands sent from the handle to the actor.
enum Command {
    AddPeer(PeerId),
    RemovePeer(PeerId),
    Graft(PeerId, String),
    Prune(PeerId, String),
    AddPenalty(PeerId, f64),
    ValidateMessage(MessageId),
    DeliverMessage(GossipMessage, MessageId),
    RejectMessage(GossipMessage, MessageId, RejectReason),
    DuplicateMessage(GossipMessage, MessageId),
    AddPromise(PeerId, Vec<MessageId>),
    Score(PeerId, oneshot::Sender<f64>),
    TrackedPeers(oneshot::Sender<usize>),
    Quit(oneshot::Sender<()>),
}

// ============================================================================
// Scoreboard Handle (public API - cheap to clone)
// ============================================================================

/// Handle to a running scoring actor.
#[derive(Clone)]
pub struct Scoreboard {
    cmd_tx: mpsc::Sender<Command>,
    msg_id_fn: Arc<dyn MessageIdFn>,
    thresholds: Arc<PeerScoreThresholds>,
}

impl Scoreboard {
    /// Validate the configuration and spawn the scoring actor.
    ///
    /// The actor runs until [`Scoreboard::quit`] or until every handle is
    /// dropped.
    pub fn spawn(
        params: PeerScoreParams,
        thresholds: PeerScoreThresholds,
        conn_mgr: Arc<dyn ConnectionManager>,
        msg_id_fn: Arc<dyn MessageIdFn>,
    ) -> anyhow::Result<Self> {
        thresholds.validate()?;
        let decay_interval = params.decay_interval;
        let score = PeerScore::new(params, conn_mgr)?;

        let (cmd_tx, cmd_rx) = mpsc::channel(1024);
        let actor = ScoreboardActor {
            score,
            promises: GossipPromises::new(),
        };
        tokio::spawn(actor.run(cmd_rx, decay_interval));

        Ok(Self {
            cmd_tx,
            msg_id_fn,
            thresholds: Arc::new(thresholds),
        })
    }

    /// A peer connected.
    pub async fn add_peer(&self, peer: PeerId) -> anyhow::Result<()> {
        self.send(Command::AddPeer(peer)).await
    }

    /// A peer disconnected.
    pub async fn remove_peer(&self, peer: PeerId) -> anyhow::Result<()> {
        self.send(Command::RemovePeer(peer)).await
    }

    /// The peer joined our mesh on `topic`.
    pub async fn graft(&self, peer: PeerId, topic: &str) -> anyhow::Result<()> {
        self.send(Command::Graft(peer, topic.to_string())).await
    }

    /// The peer left our mesh on `topic`.
    pub async fn prune(&self, peer: PeerId, topic: &str) -> anyhow::Result<()> {
        self.send(Command::Prune(peer, topic.to_string())).await
    }

    /// Accumulate a behavioural penalty for `peer`.
    pub async fn add_penalty(&self, peer: PeerId, penalty: f64) -> anyhow::Result<()> {
        self.send(Command::AddPenalty(peer, penalty)).await
    }

    /// A message entered validation.
    pub async fn validate_message(&self, msg: &GossipMessage) -> anyhow::Result<()> {
        let msg_id = self.msg_id_fn.message_id(msg).await?;
        self.send(Command::ValidateMessage(msg_id)).await
    }

    /// A message passed validation.
    pub async fn deliver_message(&self, msg: &GossipMessage) -> anyhow::Result<()> {
        let msg_id = self.msg_id_fn.message_id(msg).await?;
        self.send(Command::DeliverMessage(msg.clone(), msg_id)).await
    }

    /// A message failed validation.
    pub async fn reject_message(
        &self,
        msg: &GossipMessage,
        reason: RejectReason,
    ) -> anyhow::Result<()> {
        let msg_id = self.msg_id_fn.message_id(msg).await?;
        self.send(Command::RejectMessage(msg.clone(), msg_id, reason))
            .await
    }

    /// A duplicate copy of a known message arrived.
    pub async fn duplicate_message(&self, msg: &GossipMessage) -> anyhow::Result<()> {
        let msg_id = self.msg_id_fn.message_id(msg).await?;
        self.send(Command::DuplicateMessage(msg.clone(), msg_id))
            .await
    }

    /// The peer advertised `msg_ids` and we asked for one; it now owes us
    /// a delivery.
    pub async fn add_promise(&self, peer: PeerId, msg_ids: Vec<MessageId>) -> anyhow::Result<()> {
        self.send(Command::AddPromise(peer, msg_ids)).await
    }

    /// The peer's current score. Unknown peers (and a stopped actor)
    /// score 0.
    pub async fn score(&self, peer: &PeerId) -> f64 {
        let (tx, rx) = oneshot::channel();
        if self.cmd_tx.send(Command::Score(*peer, tx)).await.is_err() {
            return 0.0;
        }
        rx.await.unwrap_or_default()
    }

    /// Number of peers currently tracked (connected or retained).
    pub async fn tracked_peers(&self) -> usize {
        let (tx, rx) = oneshot::channel();
        if self.cmd_tx.send(Command::TrackedPeers(tx)).await.is_err() {
            return 0;
        }
        rx.await.unwrap_or_default()
    }

    /// Whether the peer is below the gossip threshold.
    pub async fn below_gossip_threshold(&self, peer: &PeerId) -> bool {
        self.score(peer).await < self.thresholds.gossip_threshold
    }

    /// Whether the peer is below the publish threshold.
    pub async fn below_publish_threshold(&self, peer: &PeerId) -> bool {
        self.score(peer).await < self.thresholds.publish_threshold
    }

    /// Whether the peer is graylisted (ignored entirely).
    pub async fn graylisted(&self, peer: &PeerId) -> bool {
        self.score(peer).await < self.thresholds.graylist_threshold
    }

    /// Stop the actor, dropping all scoring state. Completes once the
    /// actor has acknowledged and cleared.
    pub async fn quit(&self) {
        let (tx, rx) = oneshot::channel();
        if self.cmd_tx.send(Command::Quit(tx)).await.is_ok() {
            let _ = rx.await;
        }
    }

    async fn send(&self, cmd: Command) -> anyhow::Result<()> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| anyhow::anyhow!("scoreboard actor closed"))
    }
}

// ============================================================================
// Scoreboard Actor (owns state)
// ============================================================================

struct ScoreboardActor {
    score: PeerScore,
    promises: GossipPromises,
}

impl ScoreboardActor {
    async fn run(mut self, mut cmd_rx: mpsc::Receiver<Command>, decay_interval: std::time::Duration) {
        let mut tick = tokio::time::interval(decay_interval);
        // At most one decay per interval; missed ticks are not compensated.
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The immediate first tick is a no-op refresh; skip it.
        tick.tick().await;

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(Command::AddPeer(peer)) => self.score.add_peer(peer),
                        Some(Command::RemovePeer(peer)) => self.score.remove_peer(&peer),
                        Some(Command::Graft(peer, topic)) => self.score.graft(&peer, &topic),
                        Some(Command::Prune(peer, topic)) => self.score.prune(&peer, &topic),
                        Some(Command::AddPenalty(peer, penalty)) => {
                            self.score.add_penalty(&peer, penalty)
                        }
                        Some(Command::ValidateMessage(msg_id)) => {
                            self.score.validate_message(&msg_id)
                        }
                        Some(Command::DeliverMessage(msg, msg_id)) => {
                            self.score.deliver_message(&msg, &msg_id);
                            self.promises.message_delivered(&msg_id);
                        }
                        Some(Command::RejectMessage(msg, msg_id, reason)) => {
                            self.score.reject_message(&msg, &msg_id, reason);
                            self.promises.reject_message(&msg_id, reason);
                        }
                        Some(Command::DuplicateMessage(msg, msg_id)) => {
                            self.score.duplicate_message(&msg, &msg_id)
                        }
                        Some(Command::AddPromise(peer, msg_ids)) => {
                            self.promises.add_promise(peer, &msg_ids)
                        }
                        Some(Command::Score(peer, reply)) => {
                            let _ = reply.send(self.score.score(&peer));
                        }
                        Some(Command::TrackedPeers(reply)) => {
                            let _ = reply.send(self.score.tracked_peers());
                        }
                        Some(Command::Quit(reply)) => {
                            self.score.clear();
                            self.promises.clear();
                            let _ = reply.send(());
                            debug!("scoreboard actor quitting");
                            break;
                        }
                        None => {
                            debug!("scoreboard handle dropped, actor quitting");
                            break;
                        }
                    }
                }
                _ = tick.tick() => {
                    self.on_tick();
                }
            }
        }
    }

    /// Periodic maintenance: broken promises become behavioural penalties,
    /// then scores decay, IPs refresh, and old delivery records expire.
    fn on_tick(&mut self) {
        for (peer, broken) in self.promises.get_broken_promises() {
            self.score.add_penalty(&peer, broken as f64);
        }
        self.score.refresh_scores();
        self.score.update_ips();
        self.score.gc_deliveries();
    }
}
