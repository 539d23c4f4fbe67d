//! Per-call invocation context
//!
//! Created when a call enters a non-empty chain, dropped when it is
//! finalized. Owned exclusively by that call: interior mutability here is
//! single-threaded (`Cell` / `RefCell`), never shared across threads.

use std::cell::{Cell, RefCell};
use std::sync::Arc;
use std::time::Instant;

use pointcut_core::CallSiteDescriptor;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AdviceUsageError, Value};
use crate::events::{EventPayload, EventSink, WeaveEvent};

/// Lifecycle of one woven call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    /// Chain composed, nothing run yet
    Built,
    /// Target invoked
    Proceeding,
    Returned,
    Raised,
    /// After-family done; context about to be dropped
    Finalized,
}

pub struct InvocationContext<'d> {
    call_id: Uuid,
    descriptor: &'d CallSiteDescriptor,
    arguments: RefCell<Vec<Value>>,
    state: Cell<CallState>,
    violation: RefCell<Option<AdviceUsageError>>,
    started: Instant,
    sink: Arc<dyn EventSink>,
}

impl<'d> InvocationContext<'d> {
    pub(crate) fn new(
        descriptor: &'d CallSiteDescriptor,
        arguments: Vec<Value>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            call_id: Uuid::new_v4(),
            descriptor,
            arguments: RefCell::new(arguments),
            state: Cell::new(CallState::Built),
            violation: RefCell::new(None),
            started: Instant::now(),
            sink,
        }
    }

    pub fn call_id(&self) -> Uuid {
        self.call_id
    }

    pub fn descriptor(&self) -> &'d CallSiteDescriptor {
        self.descriptor
    }

    /// Live argument values (replaced by `proceed_with`, updated by the target)
    pub fn arguments(&self) -> Vec<Value> {
        self.arguments.borrow().clone()
    }

    pub fn argument(&self, index: usize) -> Option<Value> {
        self.arguments.borrow().get(index).cloned()
    }

    pub fn state(&self) -> CallState {
        self.state.get()
    }

    pub(crate) fn replace_arguments(&self, arguments: Vec<Value>) {
        *self.arguments.borrow_mut() = arguments;
    }

    pub(crate) fn take_arguments(&self) -> Vec<Value> {
        self.arguments.take()
    }

    pub(crate) fn set_state(&self, state: CallState) {
        if self.state.replace(state) != state {
            self.emit(EventPayload::StateChanged { state });
        }
    }

    /// Record an Around contract violation; the first one wins
    pub(crate) fn record_violation(&self, advice: &str, error: &AdviceUsageError) {
        self.emit(EventPayload::UsageViolation {
            advice: advice.to_string(),
            error: error.to_string(),
        });
        let mut slot = self.violation.borrow_mut();
        if slot.is_none() {
            *slot = Some(error.clone());
        }
    }

    pub(crate) fn take_violation(&self) -> Option<AdviceUsageError> {
        self.violation.borrow_mut().take()
    }

    pub(crate) fn elapsed_us(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_micros()).unwrap_or(u64::MAX)
    }

    pub(crate) fn emit(&self, payload: EventPayload) {
        self.sink.emit(&WeaveEvent::new(self.call_id, payload));
    }
}
