//! # Message Delivery Records
//!
//! Short-lived per-message bookkeeping that backs duplicate crediting and
//! the invalidation cascade. Each recently-seen message id owns one record
//! holding its validation status, when it was first seen, when it was
//! validated, and which peers have forwarded it so far.
//!
//! ## Structure
//!
//! Records live in a hash map keyed by message id, paired with a FIFO queue
//! in first-seen order so expiry is O(1) per record: the queue front is
//! always the oldest record. Records are only ever removed from the front
//! (expiry, capacity eviction) or wholesale (`clear`), so the queue stays
//! monotone in first-seen time.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use crate::messages::{MessageId, PeerId};

/// How long a delivery record is retained after the message is first seen.
/// Matches the dedup horizon of the message cache layer above.
pub const DELIVERY_RECORDS_TTL: Duration = Duration::from_secs(120);

/// Maximum resident delivery records.
/// SECURITY: Bounds memory even if the GC cadence falls behind a message
/// flood; the oldest record is evicted first.
pub const MAX_DELIVERY_RECORDS: usize = 10_000;

/// Validation outcome recorded for a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DeliveryStatus {
    /// Validation has not completed yet.
    #[default]
    Unknown,
    /// The message passed validation.
    Valid,
    /// The message failed validation.
    Invalid,
    /// A validator chose to ignore the message; nobody is penalized.
    Ignored,
}

/// Per-message delivery state.
#[derive(Debug)]
pub struct DeliveryRecord {
    /// Current validation status.
    pub status: DeliveryStatus,
    /// When the first copy of this message arrived.
    pub first_seen: Instant,
    /// When the message reached `Valid`; `None` until then.
    pub validated: Option<Instant>,
    /// When this record becomes eligible for GC.
    pub expire: Instant,
    /// Peers that forwarded this message before a terminal status was set.
    pub peers: HashSet<PeerId>,
}

/// Bounded store of recent delivery records with FIFO expiry.
#[derive(Debug, Default)]
pub struct DeliveryRecords {
    records: HashMap<MessageId, DeliveryRecord>,
    /// Message ids in first-seen order; front is the oldest resident record.
    queue: VecDeque<MessageId>,
}

impl DeliveryRecords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of resident records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Fetch the record for `msg_id`, creating a fresh `Unknown` record on
    /// first sight.
    pub fn ensure_record(&mut self, msg_id: &MessageId) -> &mut DeliveryRecord {
        if !self.records.contains_key(msg_id) {
            if self.records.len() >= MAX_DELIVERY_RECORDS {
                self.evict_oldest();
            }
            let now = Instant::now();
            self.records.insert(
                msg_id.clone(),
                DeliveryRecord {
                    status: DeliveryStatus::Unknown,
                    first_seen: now,
                    validated: None,
                    expire: now + DELIVERY_RECORDS_TTL,
                    peers: HashSet::new(),
                },
            );
            self.queue.push_back(msg_id.clone());
        }
        self.records
            .get_mut(msg_id)
            .expect("record inserted above")
    }

    /// Read-only lookup without creating a record.
    pub fn get(&self, msg_id: &MessageId) -> Option<&DeliveryRecord> {
        self.records.get(msg_id)
    }

    /// Drop all records whose TTL has elapsed.
    ///
    /// The queue is monotone in first-seen (and therefore expiry) order, so
    /// this stops at the first live record.
    pub fn gc(&mut self) {
        let now = Instant::now();
        let mut dropped = 0usize;
        while let Some(front) = self.queue.front() {
            match self.records.get(front) {
                Some(record) if record.expire <= now => {
                    self.records.remove(front);
                    self.queue.pop_front();
                    dropped += 1;
                }
                _ => break,
            }
        }
        if dropped > 0 {
            trace!(dropped, resident = self.records.len(), "delivery record gc");
        }
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.records.clear();
        self.queue.clear();
    }

    fn evict_oldest(&mut self) {
        if let Some(oldest) = self.queue.pop_front() {
            self.records.remove(&oldest);
            trace!(msg_id = %oldest.short(), "delivery record store full, evicting oldest");
        }
    }
}
