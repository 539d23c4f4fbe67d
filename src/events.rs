//! Structured weaving events
//!
//! The weaver never formats log lines. It emits [`WeaveEvent`]s to an
//! [`EventSink`]; the default [`TracingSink`] forwards them to `tracing`
//! with structured fields, [`RecordingSink`] keeps them for inspection.
//!
//! `emit()` must never fail and never panic: a sink that cannot record an
//! event drops it.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::advice::AdviceKind;
use crate::weaver::CallState;

/// One engine event, scoped to a call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaveEvent {
    pub timestamp: DateTime<Utc>,
    pub call_id: Uuid,
    pub payload: EventPayload,
}

impl WeaveEvent {
    pub fn new(call_id: Uuid, payload: EventPayload) -> Self {
        Self {
            timestamp: Utc::now(),
            call_id,
            payload,
        }
    }
}

/// Final disposition of a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Returned,
    Raised,
}

/// Event payload variants.
///
/// Tagged enum for clean JSON serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// Advice resolved and partitioned for a call
    ChainBuilt {
        /// Short signature, e.g. `PaymentService.processPayment(..)`
        signature: String,
        advice_count: usize,
    },

    AdviceInvoked { advice: String, kind: AdviceKind },

    /// The real operation is about to run
    TargetInvoked,

    /// An Around advice returned without proceeding
    ShortCircuited { advice: String },

    StateChanged { state: CallState },

    UsageViolation { advice: String, error: String },

    Finalized {
        outcome: OutcomeKind,
        /// Wall time from chain start to finalization, microseconds
        duration_us: u64,
    },
}

impl EventPayload {
    /// Event type as a string (matches the serde tag)
    pub fn event_type_str(&self) -> &'static str {
        match self {
            EventPayload::ChainBuilt { .. } => "chain_built",
            EventPayload::AdviceInvoked { .. } => "advice_invoked",
            EventPayload::TargetInvoked => "target_invoked",
            EventPayload::ShortCircuited { .. } => "short_circuited",
            EventPayload::StateChanged { .. } => "state_changed",
            EventPayload::UsageViolation { .. } => "usage_violation",
            EventPayload::Finalized { .. } => "finalized",
        }
    }
}

// ============================================================================
// Sinks
// ============================================================================

/// Destination for weaving events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &WeaveEvent);
}

/// Forwards events to `tracing` (the default sink)
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &WeaveEvent) {
        match &event.payload {
            EventPayload::ChainBuilt {
                signature,
                advice_count,
            } => debug!(call_id = %event.call_id, signature = %signature, advice_count, "chain built"),
            EventPayload::AdviceInvoked { advice, kind } => {
                trace!(call_id = %event.call_id, advice = %advice, kind = %kind, "advice invoked")
            }
            EventPayload::TargetInvoked => trace!(call_id = %event.call_id, "target invoked"),
            EventPayload::ShortCircuited { advice } => {
                debug!(call_id = %event.call_id, advice = %advice, "around advice short-circuited the call")
            }
            EventPayload::StateChanged { state } => {
                trace!(call_id = %event.call_id, state = ?state, "call state changed")
            }
            EventPayload::UsageViolation { advice, error } => {
                warn!(call_id = %event.call_id, advice = %advice, error = %error, "advice usage violation")
            }
            EventPayload::Finalized {
                outcome,
                duration_us,
            } => debug!(call_id = %event.call_id, outcome = ?outcome, duration_us, "call finalized"),
        }
    }
}

/// Collects events in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<WeaveEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    // Poison is ignored: the log is append-only
    fn lock(&self) -> MutexGuard<'_, Vec<WeaveEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn events(&self) -> Vec<WeaveEvent> {
        self.lock().clone()
    }

    /// Events for one call, in emission order
    pub fn events_for(&self, call_id: Uuid) -> Vec<WeaveEvent> {
        self.lock()
            .iter()
            .filter(|e| e.call_id == call_id)
            .cloned()
            .collect()
    }

    pub fn payloads(&self) -> Vec<EventPayload> {
        self.lock().iter().map(|e| e.payload.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &WeaveEvent) {
        self.lock().push(event.clone());
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &WeaveEvent) {}
}

// =============================================================================
// Tests
// =============================================================================
