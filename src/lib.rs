//! # Meshscore - Peer Scoring for Gossip Meshes
//!
//! Meshscore is the peer-scoring core of a gossip-style publish/subscribe
//! overlay, implementing the GossipSub v1.1 scoring model:
//!
//! - **Per-topic counters**: time in mesh, first deliveries, mesh delivery
//!   deficits, invalid deliveries, with caps and multiplicative decay
//! - **Peer-level components**: application score, IP colocation penalty,
//!   behavioural penalty
//! - **Promise tracking**: peers that advertise messages (IHAVE) and never
//!   deliver them accrue behavioural penalties
//! - **Retention**: a peer cannot shed a negative score by reconnecting,
//!   nor bank a positive one
//!
//! ## Architecture
//!
//! The engine follows the **Actor Pattern**: [`Scoreboard`] is a cheap-to-
//! clone handle whose commands are processed sequentially by a private
//! actor owning all mutable state. A periodic tick drives decay, IP
//! refresh, and promise expiry. The synchronous core, [`PeerScore`], is
//! also exported for single-owner embeddings that drive maintenance
//! themselves.
//!
//! Scoring feeds overlay decisions but never makes them: consumers read
//! [`Scoreboard::score`] (or the threshold helpers) and decide who to
//! graft, prune, or disconnect.
//!
//! ## Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `scoreboard` | Public handle + actor with the periodic tick |
//! | `score` | Synchronous scoring engine and per-peer stats |
//! | `params` | Validated weights, caps, decays, thresholds |
//! | `deliveries` | Per-message delivery records with FIFO expiry |
//! | `promises` | IWANT promise tracking and broken-promise counts |
//! | `messages` | Peer/message identifiers and rejection codes |
//! | `protocols` | Capability traits for id computation and connectivity |

mod deliveries;
mod messages;
mod params;
mod promises;
mod protocols;
mod score;
mod scoreboard;

pub use deliveries::{
    DeliveryRecord, DeliveryRecords, DeliveryStatus, DELIVERY_RECORDS_TTL, MAX_DELIVERY_RECORDS,
};
pub use messages::{
    GossipMessage, MessageId, PeerId, RejectReason, ERR_INVALID_SIGNATURE, ERR_MISSING_SIGNATURE,
    ERR_TOPIC_VALIDATOR_IGNORE, ERR_TOPIC_VALIDATOR_REJECT,
};
pub use params::{
    score_parameter_decay, score_parameter_decay_with_base, AppSpecificScoreFn, ParamsError,
    PeerScoreParams, PeerScoreThresholds, TopicScoreParams, DEFAULT_DECAY_INTERVAL,
    DEFAULT_DECAY_TO_ZERO, DEFAULT_GOSSIP_THRESHOLD, DEFAULT_GRAYLIST_THRESHOLD,
    DEFAULT_PUBLISH_THRESHOLD, DEFAULT_RETAIN_SCORE,
};
pub use promises::{GossipPromises, DEFAULT_IWANT_FOLLOWUP_TIME, MAX_TRACKED_PROMISES};
pub use protocols::{Blake3MessageId, ConnectionManager, MessageIdFn};
pub use score::PeerScore;
pub use scoreboard::Scoreboard;
