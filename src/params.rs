//! # Peer-Scoring Parameters
//!
//! Validated configuration for the scoring engine: global weights, per-topic
//! weights, decay behavior, caps, and the threshold set consumers compare
//! scores against.
//!
//! ## Score Components
//!
//! | Component | Counter | Weight sign |
//! |-----------|---------|-------------|
//! | P1 | Time in mesh | ≥ 0 |
//! | P2 | First message deliveries | ≥ 0 |
//! | P3 | Mesh delivery deficit | ≤ 0 |
//! | P3b | Mesh failure penalty | ≤ 0 |
//! | P4 | Invalid message deliveries | ≤ 0 |
//! | P5 | Application-specific score | any |
//! | P6 | IP colocation factor | ≤ 0 |
//! | P7 | Behavioural penalty | ≤ 0 |
//!
//! Validation is atomic per family: a disabled component (weight 0) does not
//! need its decay/cap fields populated, so configurations that zero out an
//! entire family remain valid.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::messages::PeerId;

// ============================================================================
// Default Values
// ============================================================================

/// Default score threshold for graylisting (don't accept messages from).
pub const DEFAULT_GRAYLIST_THRESHOLD: f64 = -100.0;

/// Default score threshold for publishing (don't publish to).
pub const DEFAULT_PUBLISH_THRESHOLD: f64 = -50.0;

/// Default score threshold for gossip (don't gossip to).
pub const DEFAULT_GOSSIP_THRESHOLD: f64 = -25.0;

/// Default score threshold above which PRUNE peer-exchange records are
/// accepted without further vetting.
pub const DEFAULT_ACCEPT_PX_THRESHOLD: f64 = 10.0;

/// Default median-score threshold that triggers opportunistic grafting.
pub const DEFAULT_OPPORTUNISTIC_GRAFT_THRESHOLD: f64 = 1.0;

/// Default interval between score decay applications.
pub const DEFAULT_DECAY_INTERVAL: Duration = Duration::from_secs(1);

/// Default threshold below which decayed counters snap to exactly zero.
pub const DEFAULT_DECAY_TO_ZERO: f64 = 0.01;

/// Default retention window for a disconnected peer's score.
/// SECURITY: Long enough that a misbehaving peer cannot shed a negative
/// score with a quick reconnect cycle.
pub const DEFAULT_RETAIN_SCORE: Duration = Duration::from_secs(3600);

/// Default P1 weight (time in mesh).
pub const DEFAULT_TIME_IN_MESH_WEIGHT: f64 = 1.0;

/// Default time-in-mesh quantum for P1 scoring.
pub const DEFAULT_TIME_IN_MESH_QUANTUM: Duration = Duration::from_millis(100);

/// Default cap for the P1 contribution.
pub const DEFAULT_TIME_IN_MESH_CAP: f64 = 3600.0;

/// Default P2 weight (first message deliveries).
pub const DEFAULT_FIRST_MESSAGE_DELIVERIES_WEIGHT: f64 = 1.0;

/// Default cap for first message deliveries (P2).
pub const DEFAULT_FIRST_MESSAGE_DELIVERIES_CAP: f64 = 100.0;

/// Default cap for mesh message deliveries (P3).
pub const DEFAULT_MESH_MESSAGE_DELIVERIES_CAP: f64 = 100.0;

/// Default grace window during which late duplicates still earn mesh credit.
pub const DEFAULT_MESH_MESSAGE_DELIVERIES_WINDOW: Duration = Duration::from_millis(10);

/// Default time in mesh before the P3 delivery-rate penalty activates.
pub const DEFAULT_MESH_MESSAGE_DELIVERIES_ACTIVATION: Duration = Duration::from_secs(60);

/// Default P4 weight (invalid messages).
pub const DEFAULT_INVALID_MESSAGE_DELIVERIES_WEIGHT: f64 = -100.0;

/// Default P5 weight (application-specific score).
pub const DEFAULT_APP_SPECIFIC_WEIGHT: f64 = 1.0;

/// Default P6 weight (IP colocation factor).
/// SECURITY: Negative weight penalizes peers sharing a remote address.
pub const DEFAULT_IP_COLOCATION_FACTOR_WEIGHT: f64 = -10.0;

/// Number of peers on the same IP before the P6 penalty applies.
pub const DEFAULT_IP_COLOCATION_FACTOR_THRESHOLD: usize = 1;

/// Default P7 weight (behavioural penalty).
pub const DEFAULT_BEHAVIOUR_PENALTY_WEIGHT: f64 = -10.0;

/// Default decay for the behavioural penalty counter.
pub const DEFAULT_BEHAVIOUR_PENALTY_DECAY: f64 = 0.99;

/// Default per-tick decay for counters that default to enabled.
const DEFAULT_COUNTER_DECAY: f64 = 0.5;

// ============================================================================
// Decay Helper
// ============================================================================

/// Compute a per-tick decay factor that erodes a counter to
/// [`DEFAULT_DECAY_TO_ZERO`] over roughly `decay` wall time, assuming ticks
/// every [`DEFAULT_DECAY_INTERVAL`].
pub fn score_parameter_decay(decay: Duration) -> f64 {
    score_parameter_decay_with_base(decay, DEFAULT_DECAY_INTERVAL, DEFAULT_DECAY_TO_ZERO)
}

/// [`score_parameter_decay`] with an explicit tick interval and zero point.
pub fn score_parameter_decay_with_base(
    decay: Duration,
    decay_interval: Duration,
    decay_to_zero: f64,
) -> f64 {
    let ticks = decay.as_secs_f64() / decay_interval.as_secs_f64();
    decay_to_zero.powf(1.0 / ticks)
}

// ============================================================================
// Validation Errors
// ============================================================================

/// A parameter bound violation detected at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamsError {
    /// A global parameter violates its bound.
    Global {
        field: &'static str,
        constraint: &'static str,
    },
    /// A per-topic parameter violates its bound.
    Topic {
        topic: String,
        field: &'static str,
        constraint: &'static str,
    },
}

impl fmt::Display for ParamsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamsError::Global { field, constraint } => {
                write!(f, "invalid parameter `{}`: {}", field, constraint)
            }
            ParamsError::Topic {
                topic,
                field,
                constraint,
            } => {
                write!(
                    f,
                    "invalid parameter `{}` for topic `{}`: {}",
                    field, topic, constraint
                )
            }
        }
    }
}

impl std::error::Error for ParamsError {}

// ============================================================================
// Per-Topic Parameters
// ============================================================================

/// Scoring parameters for a single topic.
///
/// A topic only contributes to a peer's score if an entry for it exists in
/// [`PeerScoreParams::topics`]; per-peer counters are never even allocated
/// for unscored topics.
#[derive(Clone, Debug)]
pub struct TopicScoreParams {
    /// Weight of this topic in the overall peer score.
    pub topic_weight: f64,

    // P1: Time in mesh
    /// Weight for the time-in-mesh component.
    pub time_in_mesh_weight: f64,
    /// Quantum for time-in-mesh calculation.
    pub time_in_mesh_quantum: Duration,
    /// Cap for the time-in-mesh contribution.
    pub time_in_mesh_cap: f64,

    // P2: First message deliveries
    /// Weight for the first-message-deliveries component.
    pub first_message_deliveries_weight: f64,
    /// Per-tick decay factor for the first-deliveries counter.
    pub first_message_deliveries_decay: f64,
    /// Cap on the first-deliveries counter.
    pub first_message_deliveries_cap: f64,

    // P3: Mesh message delivery rate
    /// Weight for the mesh delivery deficit (0 disables the component).
    pub mesh_message_deliveries_weight: f64,
    /// Per-tick decay factor for the mesh-deliveries counter.
    pub mesh_message_deliveries_decay: f64,
    /// Cap on the mesh-deliveries counter.
    pub mesh_message_deliveries_cap: f64,
    /// Delivery count below which the deficit penalty applies.
    pub mesh_message_deliveries_threshold: f64,
    /// Grace window after validation during which late duplicates still
    /// count toward mesh credit.
    pub mesh_message_deliveries_window: Duration,
    /// Time in mesh before the deficit penalty activates.
    pub mesh_message_deliveries_activation: Duration,

    // P3b: Mesh failure penalty
    /// Weight for the sticky mesh-failure penalty (0 disables).
    pub mesh_failure_penalty_weight: f64,
    /// Per-tick decay factor for the mesh-failure penalty.
    pub mesh_failure_penalty_decay: f64,

    // P4: Invalid messages
    /// Weight for invalid message deliveries (should be negative).
    pub invalid_message_deliveries_weight: f64,
    /// Per-tick decay factor for the invalid-deliveries counter.
    pub invalid_message_deliveries_decay: f64,
}

impl Default for TopicScoreParams {
    fn default() -> Self {
        Self {
            topic_weight: 1.0,

            // P1: Time in mesh (simple, always on)
            time_in_mesh_weight: DEFAULT_TIME_IN_MESH_WEIGHT,
            time_in_mesh_quantum: DEFAULT_TIME_IN_MESH_QUANTUM,
            time_in_mesh_cap: DEFAULT_TIME_IN_MESH_CAP,

            // P2: First message deliveries (simple, always on)
            first_message_deliveries_weight: DEFAULT_FIRST_MESSAGE_DELIVERIES_WEIGHT,
            first_message_deliveries_decay: DEFAULT_COUNTER_DECAY,
            first_message_deliveries_cap: DEFAULT_FIRST_MESSAGE_DELIVERIES_CAP,

            // P3: Mesh delivery rate (disabled by default)
            mesh_message_deliveries_weight: 0.0,
            mesh_message_deliveries_decay: DEFAULT_COUNTER_DECAY,
            mesh_message_deliveries_cap: DEFAULT_MESH_MESSAGE_DELIVERIES_CAP,
            mesh_message_deliveries_threshold: 1.0,
            mesh_message_deliveries_window: DEFAULT_MESH_MESSAGE_DELIVERIES_WINDOW,
            mesh_message_deliveries_activation: DEFAULT_MESH_MESSAGE_DELIVERIES_ACTIVATION,

            // P3b: Mesh failure penalty (disabled by default)
            mesh_failure_penalty_weight: 0.0,
            mesh_failure_penalty_decay: DEFAULT_COUNTER_DECAY,

            // P4: Invalid messages (always on, negative weight)
            invalid_message_deliveries_weight: DEFAULT_INVALID_MESSAGE_DELIVERIES_WEIGHT,
            invalid_message_deliveries_decay: DEFAULT_COUNTER_DECAY,
        }
    }
}

impl TopicScoreParams {
    /// Check every bound for this topic's parameters.
    ///
    /// Families whose weight is 0 are disabled and skip their decay/cap
    /// checks, so zeroed-out configurations remain valid.
    pub fn validate(&self, topic: &str) -> Result<(), ParamsError> {
        let err = |field: &'static str, constraint: &'static str| {
            Err(ParamsError::Topic {
                topic: topic.to_string(),
                field,
                constraint,
            })
        };

        if !(self.topic_weight >= 0.0) {
            return err("topic_weight", "must be >= 0");
        }

        // P1
        if self.time_in_mesh_quantum.is_zero() {
            return err("time_in_mesh_quantum", "must be a positive duration");
        }
        if !(self.time_in_mesh_weight >= 0.0) {
            return err("time_in_mesh_weight", "must be >= 0 (0 disables)");
        }
        if self.time_in_mesh_weight != 0.0 && !(self.time_in_mesh_cap > 0.0) {
            return err("time_in_mesh_cap", "must be > 0");
        }

        // P2
        if !(self.first_message_deliveries_weight >= 0.0) {
            return err(
                "first_message_deliveries_weight",
                "must be >= 0 (0 disables)",
            );
        }
        if self.first_message_deliveries_weight != 0.0 {
            if !in_open_unit_interval(self.first_message_deliveries_decay) {
                return err("first_message_deliveries_decay", "must be in (0, 1)");
            }
            if !(self.first_message_deliveries_cap > 0.0) {
                return err("first_message_deliveries_cap", "must be > 0");
            }
        }

        // P3
        if !(self.mesh_message_deliveries_weight <= 0.0) {
            return err(
                "mesh_message_deliveries_weight",
                "must be <= 0 (0 disables)",
            );
        }
        if self.mesh_message_deliveries_weight != 0.0 {
            if !in_open_unit_interval(self.mesh_message_deliveries_decay) {
                return err("mesh_message_deliveries_decay", "must be in (0, 1)");
            }
            if !(self.mesh_message_deliveries_cap > 0.0) {
                return err("mesh_message_deliveries_cap", "must be > 0");
            }
            if !(self.mesh_message_deliveries_threshold > 0.0) {
                return err("mesh_message_deliveries_threshold", "must be > 0");
            }
            if self.mesh_message_deliveries_activation < Duration::from_secs(1) {
                return err("mesh_message_deliveries_activation", "must be >= 1s");
            }
        }

        // P3b
        if !(self.mesh_failure_penalty_weight <= 0.0) {
            return err("mesh_failure_penalty_weight", "must be <= 0 (0 disables)");
        }
        if self.mesh_failure_penalty_weight != 0.0
            && !in_open_unit_interval(self.mesh_failure_penalty_decay)
        {
            return err("mesh_failure_penalty_decay", "must be in (0, 1)");
        }

        // P4
        if !(self.invalid_message_deliveries_weight <= 0.0) {
            return err(
                "invalid_message_deliveries_weight",
                "must be <= 0 (0 disables)",
            );
        }
        if self.invalid_message_deliveries_weight != 0.0
            && !in_open_unit_interval(self.invalid_message_deliveries_decay)
        {
            return err("invalid_message_deliveries_decay", "must be in (0, 1)");
        }

        Ok(())
    }
}

// ============================================================================
// Global Parameters
// ============================================================================

/// Application-defined per-peer score callback (the P5 input).
pub type AppSpecificScoreFn = Arc<dyn Fn(&PeerId) -> f64 + Send + Sync>;

/// Global scoring parameters.
///
/// Holds the per-topic parameter table plus the peer-level components:
/// application score (P5), IP colocation (P6), and behavioural penalty (P7),
/// along with decay cadence and disconnect retention.
#[derive(Clone)]
pub struct PeerScoreParams {
    /// Per-topic scoring parameters. Topics without an entry are not scored.
    pub topics: HashMap<String, TopicScoreParams>,

    /// Upper clamp on the summed positive topic contributions (0 disables).
    pub topic_score_cap: f64,

    /// P5: application-specific score callback.
    pub app_specific_score: AppSpecificScoreFn,
    /// Weight applied to the application-specific score.
    pub app_specific_weight: f64,

    /// P6: weight applied to the squared IP colocation excess (≤ 0).
    pub ip_colocation_factor_weight: f64,
    /// Number of peers allowed on one IP before the penalty applies (≥ 1).
    pub ip_colocation_factor_threshold: usize,
    /// IPs exempt from colocation scoring (e.g. trusted infrastructure).
    pub ip_colocation_factor_whitelist: HashSet<IpAddr>,

    /// P7: weight applied to the squared behavioural-penalty excess (≤ 0).
    pub behaviour_penalty_weight: f64,
    /// Penalty level below which no P7 score applies (≥ 0).
    pub behaviour_penalty_threshold: f64,
    /// Per-tick decay factor for the behavioural penalty.
    pub behaviour_penalty_decay: f64,

    /// Interval between decay/refresh passes.
    pub decay_interval: Duration,
    /// Counter magnitude below which a decayed value snaps to zero.
    pub decay_to_zero: f64,
    /// How long a disconnected peer's score is retained.
    pub retain_score: Duration,
}

impl Default for PeerScoreParams {
    fn default() -> Self {
        Self {
            topics: HashMap::new(),
            topic_score_cap: 0.0,
            app_specific_score: Arc::new(|_| 0.0),
            app_specific_weight: DEFAULT_APP_SPECIFIC_WEIGHT,
            ip_colocation_factor_weight: DEFAULT_IP_COLOCATION_FACTOR_WEIGHT,
            ip_colocation_factor_threshold: DEFAULT_IP_COLOCATION_FACTOR_THRESHOLD,
            ip_colocation_factor_whitelist: HashSet::new(),
            behaviour_penalty_weight: DEFAULT_BEHAVIOUR_PENALTY_WEIGHT,
            behaviour_penalty_threshold: 0.0,
            behaviour_penalty_decay: DEFAULT_BEHAVIOUR_PENALTY_DECAY,
            decay_interval: DEFAULT_DECAY_INTERVAL,
            decay_to_zero: DEFAULT_DECAY_TO_ZERO,
            retain_score: DEFAULT_RETAIN_SCORE,
        }
    }
}

impl fmt::Debug for PeerScoreParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerScoreParams")
            .field("topics", &self.topics)
            .field("topic_score_cap", &self.topic_score_cap)
            .field("app_specific_weight", &self.app_specific_weight)
            .field(
                "ip_colocation_factor_weight",
                &self.ip_colocation_factor_weight,
            )
            .field(
                "ip_colocation_factor_threshold",
                &self.ip_colocation_factor_threshold,
            )
            .field("behaviour_penalty_weight", &self.behaviour_penalty_weight)
            .field(
                "behaviour_penalty_threshold",
                &self.behaviour_penalty_threshold,
            )
            .field("behaviour_penalty_decay", &self.behaviour_penalty_decay)
            .field("decay_interval", &self.decay_interval)
            .field("decay_to_zero", &self.decay_to_zero)
            .field("retain_score", &self.retain_score)
            .finish_non_exhaustive()
    }
}

impl PeerScoreParams {
    /// Check every global and per-topic bound.
    pub fn validate(&self) -> Result<(), ParamsError> {
        let err = |field: &'static str, constraint: &'static str| {
            Err(ParamsError::Global { field, constraint })
        };

        for (topic, params) in &self.topics {
            params.validate(topic)?;
        }

        if !(self.topic_score_cap >= 0.0) {
            return err("topic_score_cap", "must be >= 0 (0 disables)");
        }

        if !(self.ip_colocation_factor_weight <= 0.0) {
            return err("ip_colocation_factor_weight", "must be <= 0 (0 disables)");
        }
        if self.ip_colocation_factor_weight != 0.0 && self.ip_colocation_factor_threshold < 1 {
            return err("ip_colocation_factor_threshold", "must be >= 1");
        }

        if !(self.behaviour_penalty_weight <= 0.0) {
            return err("behaviour_penalty_weight", "must be <= 0 (0 disables)");
        }
        if self.behaviour_penalty_weight != 0.0 {
            if !in_open_unit_interval(self.behaviour_penalty_decay) {
                return err("behaviour_penalty_decay", "must be in (0, 1)");
            }
            if !(self.behaviour_penalty_threshold >= 0.0) {
                return err("behaviour_penalty_threshold", "must be >= 0");
            }
        }

        if self.decay_interval < Duration::from_secs(1) {
            return err("decay_interval", "must be >= 1s");
        }
        if !in_open_unit_interval(self.decay_to_zero) {
            return err("decay_to_zero", "must be in (0, 1)");
        }

        Ok(())
    }
}

// ============================================================================
// Score Thresholds
// ============================================================================

/// Score cut-offs consumers compare engine output against.
///
/// The engine itself never acts on these; they travel alongside the
/// parameters so one validated bundle configures both producer and
/// consumers of scores.
#[derive(Clone, Debug)]
pub struct PeerScoreThresholds {
    /// Below this, no gossip is emitted to or accepted from the peer.
    pub gossip_threshold: f64,
    /// Below this, self-published messages are not sent to the peer.
    pub publish_threshold: f64,
    /// Below this, the peer is ignored entirely.
    pub graylist_threshold: f64,
    /// Above this, peer-exchange records from the peer are trusted.
    pub accept_px_threshold: f64,
    /// Median mesh score below which opportunistic grafting kicks in.
    pub opportunistic_graft_threshold: f64,
}

impl Default for PeerScoreThresholds {
    fn default() -> Self {
        Self {
            gossip_threshold: DEFAULT_GOSSIP_THRESHOLD,
            publish_threshold: DEFAULT_PUBLISH_THRESHOLD,
            graylist_threshold: DEFAULT_GRAYLIST_THRESHOLD,
            accept_px_threshold: DEFAULT_ACCEPT_PX_THRESHOLD,
            opportunistic_graft_threshold: DEFAULT_OPPORTUNISTIC_GRAFT_THRESHOLD,
        }
    }
}

impl PeerScoreThresholds {
    /// Check threshold ordering: graylist ≤ publish ≤ gossip ≤ 0.
    pub fn validate(&self) -> Result<(), ParamsError> {
        let err = |field: &'static str, constraint: &'static str| {
            Err(ParamsError::Global { field, constraint })
        };

        if !(self.gossip_threshold <= 0.0) {
            return err("gossip_threshold", "must be <= 0");
        }
        if !(self.publish_threshold <= 0.0) || self.publish_threshold > self.gossip_threshold {
            return err("publish_threshold", "must be <= gossip_threshold");
        }
        if !(self.graylist_threshold <= 0.0) || self.graylist_threshold > self.publish_threshold {
            return err("graylist_threshold", "must be <= publish_threshold");
        }
        if !(self.accept_px_threshold >= 0.0) {
            return err("accept_px_threshold", "must be >= 0");
        }
        if !(self.opportunistic_graft_threshold >= 0.0) {
            return err("opportunistic_graft_threshold", "must be >= 0");
        }

        Ok(())
    }
}

/// Strictly inside (0, 1). Rejects NaN by construction.
fn in_open_unit_interval(x: f64) -> bool {
    x > 0.0 && x < 1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params_validate() {
        let params = PeerScoreParams::default();
        assert!(params.validate().is_ok());

        let thresholds = PeerScoreThresholds::default();
        assert!(thresholds.validate().is_ok());
    }

    #[test]
    fn default_topic_params_validate() {
        let topic = TopicScoreParams::default();
        assert!(topic.validate("t").is_ok());
    }

    #[test]
    fn zeroed_families_are_valid() {
        // A topic that only scores first deliveries; everything else off.
        let topic = TopicScoreParams {
            mesh_message_deliveries_weight: 0.0,
            mesh_message_deliveries_decay: 0.0,
            mesh_message_deliveries_cap: 0.0,
            mesh_message_deliveries_threshold: 0.0,
            mesh_failure_penalty_weight: 0.0,
            mesh_failure_penalty_decay: 0.0,
            invalid_message_deliveries_weight: 0.0,
            invalid_message_deliveries_decay: 0.0,
            ..Default::default()
        };
        assert!(topic.validate("t").is_ok());
    }

    #[test]
    fn positive_mesh_deliveries_weight_rejected() {
        let topic = TopicScoreParams {
            mesh_message_deliveries_weight: 1.0,
            ..Default::default()
        };
        let result = topic.validate("blocks");
        match result {
            Err(ParamsError::Topic { topic, field, .. }) => {
                assert_eq!(topic, "blocks");
                assert_eq!(field, "mesh_message_deliveries_weight");
            }
            other => panic!("expected topic error, got {:?}", other),
        }
    }

    #[test]
    fn decay_out_of_range_rejected() {
        for bad in [0.0, 1.0, 1.5, -0.1, f64::NAN] {
            let topic = TopicScoreParams {
                first_message_deliveries_decay: bad,
                ..Default::default()
            };
            assert!(topic.validate("t").is_err(), "decay {} should fail", bad);
        }
    }

    #[test]
    fn short_activation_rejected_when_enabled() {
        let topic = TopicScoreParams {
            mesh_message_deliveries_weight: -1.0,
            mesh_message_deliveries_activation: Duration::from_millis(500),
            ..Default::default()
        };
        assert!(topic.validate("t").is_err());

        // Same activation passes when the family is disabled.
        let disabled = TopicScoreParams {
            mesh_message_deliveries_weight: 0.0,
            mesh_message_deliveries_activation: Duration::from_millis(500),
            ..Default::default()
        };
        assert!(disabled.validate("t").is_ok());
    }

    #[test]
    fn global_bounds_enforced() {
        let params = PeerScoreParams {
            ip_colocation_factor_weight: 1.0,
            ..Default::default()
        };
        assert!(params.validate().is_err());

        let params = PeerScoreParams {
            ip_colocation_factor_threshold: 0,
            ..Default::default()
        };
        assert!(params.validate().is_err());

        let params = PeerScoreParams {
            behaviour_penalty_decay: 1.0,
            ..Default::default()
        };
        assert!(params.validate().is_err());

        let params = PeerScoreParams {
            decay_interval: Duration::from_millis(100),
            ..Default::default()
        };
        assert!(params.validate().is_err());

        let params = PeerScoreParams {
            decay_to_zero: 0.0,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn topic_errors_carry_topic_name() {
        let mut params = PeerScoreParams::default();
        params.topics.insert(
            "bad-topic".to_string(),
            TopicScoreParams {
                topic_weight: -1.0,
                ..Default::default()
            },
        );
        match params.validate() {
            Err(ParamsError::Topic { topic, .. }) => assert_eq!(topic, "bad-topic"),
            other => panic!("expected topic error, got {:?}", other),
        }
    }

    #[test]
    fn threshold_ordering_enforced() {
        let thresholds = PeerScoreThresholds {
            gossip_threshold: -10.0,
            publish_threshold: -5.0, // above gossip: invalid
            ..Default::default()
        };
        assert!(thresholds.validate().is_err());

        let thresholds = PeerScoreThresholds {
            graylist_threshold: -40.0, // above publish: invalid
            publish_threshold: -50.0,
            ..Default::default()
        };
        assert!(thresholds.validate().is_err());
    }

    #[test]
    fn decay_helper_reaches_zero_point() {
        // Over `horizon` at one tick per second, the counter must land on
        // the zero point: decay^ticks == decay_to_zero.
        let horizon = Duration::from_secs(600);
        let factor = score_parameter_decay(horizon);
        assert!(factor > 0.0 && factor < 1.0);

        let ticks = horizon.as_secs_f64() / DEFAULT_DECAY_INTERVAL.as_secs_f64();
        let remaining = factor.powf(ticks);
        assert!((remaining - DEFAULT_DECAY_TO_ZERO).abs() < 1e-9);
    }

    #[test]
    fn params_error_display_names_field() {
        let err = ParamsError::Topic {
            topic: "blocks".to_string(),
            field: "topic_weight",
            constraint: "must be >= 0",
        };
        let text = err.to_string();
        assert!(text.contains("blocks"));
        assert!(text.contains("topic_weight"));
    }
}
