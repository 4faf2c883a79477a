//! Capability trait definitions for the scoring engine's collaborators.
//!
//! The engine depends on two narrow capabilities supplied by the host
//! application rather than on concrete networking types:
//!
//! | Capability | Trait | Purpose |
//! |-----------|-------|---------|
//! | Connectivity | [`ConnectionManager`] | Enumerate a peer's current remote IPs |
//! | Identity | [`MessageIdFn`] | Derive the canonical id of a message |
//!
//! ## Design
//!
//! Traits are defined here separately from implementations so the engine
//! depends only on behavior, never on a transport. The id function is async
//! because applications may hash large payloads off-thread; the engine
//! always computes the id *before* entering its critical section.

use anyhow::Result;
use async_trait::async_trait;
use std::net::IpAddr;

use crate::messages::{GossipMessage, MessageId, PeerId};

/// Read-only view of a peer's current connectivity.
///
/// Consulted when a peer connects and on each periodic IP refresh. A peer
/// with no live connections yields an empty list; lookup failures are
/// expected to degrade to an empty list rather than error.
pub trait ConnectionManager: Send + Sync {
    /// The remote IP addresses of all live connections to `peer`.
    fn peer_ips(&self, peer: &PeerId) -> Vec<IpAddr>;
}

/// Computes the canonical identifier of a message.
///
/// Determinism is required: the same message must always map to the same
/// id. The engine compares ids only for equality.
#[async_trait]
pub trait MessageIdFn: Send + Sync {
    /// Derive the id for `msg`. Errors surface to the caller of the
    /// ingest hook that needed the id; no engine state changes on failure.
    async fn message_id(&self, msg: &GossipMessage) -> Result<MessageId>;
}

/// Default id function: `blake3(received_from || topics || data)`.
///
/// Suitable when the application has no notion of publisher-assigned ids.
/// Applications with signed envelopes will usually hash the signed fields
/// instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct Blake3MessageId;

#[async_trait]
impl MessageIdFn for Blake3MessageId {
    async fn message_id(&self, msg: &GossipMessage) -> Result<MessageId> {
        let mut hasher = blake3::Hasher::new();
        hasher.update(msg.received_from.as_bytes());
        for topic in &msg.topics {
            hasher.update(topic.as_bytes());
        }
        hasher.update(&msg.data);
        Ok(MessageId::from(*hasher.finalize().as_bytes()))
    }
}
