//! # Core Message and Peer Types
//!
//! This module defines the value types the scoring engine operates on:
//! peer identifiers, message identifiers, the incoming-message view, and
//! the rejection reason codes shared with the validation pipeline.
//!
//! ## Identifiers
//!
//! | Type | Representation | Notes |
//! |------|----------------|-------|
//! | `PeerId` | 32 raw bytes | Copyable map key, hex-abbreviated in logs |
//! | `MessageId` | owned byte string | Produced by a caller-supplied id function |
//!
//! The engine never interprets a `MessageId` beyond equality and hashing;
//! whatever the id function returns is used verbatim.

use std::fmt;

// ============================================================================
// Peer Identifier
// ============================================================================

/// A peer identifier: 32 opaque bytes (typically an Ed25519 public key).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerId([u8; 32]);

impl PeerId {
    #[inline]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Abbreviated hex form (first 8 bytes) for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self.short())
    }
}

impl From<[u8; 32]> for PeerId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

// ============================================================================
// Message Identifier
// ============================================================================

/// A message identifier: opaque bytes compared only for equality.
///
/// Owned rather than fixed-width because the id function is supplied by the
/// application and may return digests of any length.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct MessageId(Vec<u8>);

impl MessageId {
    #[inline]
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Abbreviated hex form (up to 8 bytes) for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..self.0.len().min(8)])
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId({})", self.short())
    }
}

impl From<Vec<u8>> for MessageId {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<[u8; 32]> for MessageId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes.to_vec())
    }
}

// ============================================================================
// Incoming Message View
// ============================================================================

/// The scoring engine's view of a received pub/sub message.
///
/// The payload is opaque: the engine only feeds it to the message-id
/// function. Topics drive the per-topic counter updates.
#[derive(Clone, Debug)]
pub struct GossipMessage {
    /// The peer that forwarded this message to us (not necessarily the
    /// original publisher).
    pub received_from: PeerId,
    /// Topics this message was published to.
    pub topics: Vec<String>,
    /// Raw payload, untouched except by the id function.
    pub data: Vec<u8>,
}

impl GossipMessage {
    pub fn new(received_from: PeerId, topics: Vec<String>, data: Vec<u8>) -> Self {
        Self {
            received_from,
            topics,
            data,
        }
    }
}

// ============================================================================
// Rejection Reason Codes
// ============================================================================

/// Wire code for a message rejected due to a missing signature.
pub const ERR_MISSING_SIGNATURE: &str = "ERR_MISSING_SIGNATURE";

/// Wire code for a message rejected due to an invalid signature.
pub const ERR_INVALID_SIGNATURE: &str = "ERR_INVALID_SIGNATURE";

/// Wire code for a message the topic validator chose to ignore.
pub const ERR_TOPIC_VALIDATOR_IGNORE: &str = "ERR_TOPIC_VALIDATOR_IGNORE";

/// Wire code for a message the topic validator actively rejected.
pub const ERR_TOPIC_VALIDATOR_REJECT: &str = "ERR_TOPIC_VALIDATOR_REJECT";

/// Why the validation pipeline rejected a message.
///
/// Signature failures are attributed to the forwarding peer but do not
/// touch the delivery record: a message with a bad signature has no
/// trustworthy id, so nothing keyed by that id may change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    /// The message carried no signature.
    MissingSignature,
    /// The message signature failed verification.
    InvalidSignature,
    /// A topic validator chose to ignore the message (not peer-attributable).
    ValidatorIgnore,
    /// A topic validator actively rejected the message.
    ValidatorReject,
    /// Any other rejection; treated like a validator rejection for scoring.
    Other,
}

impl RejectReason {
    /// Map a wire code to a reason. Unknown codes are generic rejections.
    pub fn from_code(code: &str) -> Self {
        match code {
            ERR_MISSING_SIGNATURE => RejectReason::MissingSignature,
            ERR_INVALID_SIGNATURE => RejectReason::InvalidSignature,
            ERR_TOPIC_VALIDATOR_IGNORE => RejectReason::ValidatorIgnore,
            ERR_TOPIC_VALIDATOR_REJECT => RejectReason::ValidatorReject,
            _ => RejectReason::Other,
        }
    }

    /// The wire code for this reason.
    pub fn as_code(&self) -> &'static str {
        match self {
            RejectReason::MissingSignature => ERR_MISSING_SIGNATURE,
            RejectReason::InvalidSignature => ERR_INVALID_SIGNATURE,
            RejectReason::ValidatorIgnore => ERR_TOPIC_VALIDATOR_IGNORE,
            RejectReason::ValidatorReject | RejectReason::Other => ERR_TOPIC_VALIDATOR_REJECT,
        }
    }

    /// True for signature-level failures, which are peer-attributable but
    /// must not mutate state keyed by the (untrusted) message id.
    pub fn is_signature_failure(&self) -> bool {
        matches!(
            self,
            RejectReason::MissingSignature | RejectReason::InvalidSignature
        )
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_code())
    }
}
