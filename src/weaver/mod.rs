//! Weaver / executor
//!
//! [`Weaver::intercept`] is the single boundary a host calls: it resolves
//! the advice for a call site, composes the chain, and runs it around the
//! real operation.
//!
//! ## Composition
//!
//! ```text
//! around[0] -> around[1] -> ... -> [ before*, target ]
//! <- outcome flows back out through every around layer
//! after* (always), then after_returning* (Ok) | after_throwing* (Err)
//! ```
//!
//! - A failing `before` skips the target; its error becomes the outcome.
//! - An Around layer that never proceeds short-circuits everything inside it.
//! - After-family advice observe the outcome produced by the outermost
//!   Around layer. A failing `after` replaces the outcome (the remaining
//!   `after` advice still run); returning/throwing advice stop at the first
//!   failure.
//! - Calling `proceed` twice poisons the call: its final outcome is the
//!   usage error, whatever the offending advice returned.
//!
//! Calls with no matching advice bypass all of this and invoke the target
//! directly.

mod context;
mod join_point;

pub use context::{CallState, InvocationContext};
pub use join_point::{JoinPoint, ProceedingJoinPoint};

use std::fmt;
use std::sync::Arc;

use pointcut_core::CallSiteDescriptor;
use tracing::trace;

use crate::advice::{AdviceDescriptor, AroundAdvice};
use crate::chain::{AdviceChain, Bound};
use crate::error::{Outcome, Value, WeaveError};
use crate::events::{EventPayload, EventSink, OutcomeKind, TracingSink};
use crate::registry::Registry;

/// Runs calls through the advice chains of a frozen [`Registry`]
#[derive(Clone)]
pub struct Weaver {
    registry: Arc<Registry>,
    sink: Arc<dyn EventSink>,
}

impl Weaver {
    /// Weaver emitting events to `tracing`
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            sink: Arc::new(TracingSink),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Composed chain for a call site as `kind:name` entries
    pub fn describe(&self, descriptor: &CallSiteDescriptor) -> Vec<String> {
        AdviceChain::build(self.registry.resolve(descriptor)).describe()
    }

    /// Run `proceed` (the real operation) through the matching advice.
    ///
    /// `proceed` receives the live arguments: the descriptor's, unless an
    /// Around advice replaced them via `proceed_with`.
    pub fn intercept<F>(&self, descriptor: &CallSiteDescriptor, proceed: F) -> Outcome
    where
        F: FnOnce(Vec<Value>) -> Outcome,
    {
        let mut arguments = descriptor.arguments().to_vec();
        self.intercept_mut(descriptor, &mut arguments, |live| proceed(live.clone()))
    }

    /// Like [`intercept`](Self::intercept), for targets that update their
    /// arguments in place.
    ///
    /// The call starts from `arguments` (normally the descriptor's). The
    /// target works on the live arguments directly, so after-family advice
    /// see its changes, and on return `arguments` holds the final live
    /// values, including any `proceed_with` replacement.
    pub fn intercept_mut<F>(
        &self,
        descriptor: &CallSiteDescriptor,
        arguments: &mut Vec<Value>,
        proceed: F,
    ) -> Outcome
    where
        F: FnOnce(&mut Vec<Value>) -> Outcome,
    {
        let matched = self.registry.resolve(descriptor);
        if matched.is_empty() {
            trace!(
                signature = %descriptor.short_signature(),
                "no advice matched, invoking target directly"
            );
            return proceed(arguments);
        }

        let chain = AdviceChain::build(matched);
        let ctx = InvocationContext::new(
            descriptor,
            std::mem::take(arguments),
            Arc::clone(&self.sink),
        );
        ctx.emit(EventPayload::ChainBuilt {
            signature: descriptor.short_signature(),
            advice_count: chain.len(),
        });

        let outcome = Execution {
            chain: &chain,
            ctx: &ctx,
        }
        .run(proceed);
        *arguments = ctx.take_arguments();
        outcome
    }
}

impl fmt::Debug for Weaver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Weaver")
            .field("advices", &self.registry.len())
            .finish()
    }
}

// ============================================================================
// Execution
// ============================================================================

struct Execution<'x> {
    chain: &'x AdviceChain<'x>,
    ctx: &'x InvocationContext<'x>,
}

impl<'x> Execution<'x> {
    fn run<'b, F>(&'b self, proceed: F) -> Outcome
    where
        F: FnOnce(&mut Vec<Value>) -> Outcome + 'b,
    {
        // Build the layers inside-out: the core first, then each Around
        // wrapping what is already there.
        let mut next: Box<dyn FnOnce() -> Outcome + 'b> =
            Box::new(move || self.run_core(proceed));
        for layer in self.chain.around.iter().rev() {
            let inner = next;
            next = Box::new(move || self.run_around(layer, inner));
        }

        let mut outcome = next();
        if let Some(violation) = self.ctx.take_violation() {
            outcome = Err(WeaveError::Usage(violation));
        }
        self.ctx.set_state(state_for(&outcome));

        let outcome = self.run_after_family(outcome);
        self.ctx.set_state(state_for(&outcome));
        self.finalize(&outcome);
        outcome
    }

    /// Innermost layer: before advice, then the target
    fn run_core<F>(&self, proceed: F) -> Outcome
    where
        F: FnOnce(&mut Vec<Value>) -> Outcome,
    {
        let jp = JoinPoint::new(self.ctx);
        for bound in &self.chain.before {
            self.invoked(bound.descriptor);
            bound.handler.before(&jp)?;
        }

        self.ctx.set_state(CallState::Proceeding);
        self.ctx.emit(EventPayload::TargetInvoked);
        let mut arguments = self.ctx.take_arguments();
        let outcome = proceed(&mut arguments);
        self.ctx.replace_arguments(arguments);
        self.ctx.set_state(state_for(&outcome));
        outcome
    }

    fn run_around<'b>(
        &'b self,
        layer: &'b Bound<'x, dyn AroundAdvice>,
        inner: Box<dyn FnOnce() -> Outcome + 'b>,
    ) -> Outcome {
        self.invoked(layer.descriptor);
        let mut pjp = ProceedingJoinPoint::new(self.ctx, layer.name(), inner);
        let outcome = layer.handler.around(&mut pjp);
        if !pjp.has_proceeded() {
            self.ctx.emit(EventPayload::ShortCircuited {
                advice: layer.name().to_string(),
            });
        }
        outcome
    }

    fn run_after_family(&self, mut outcome: Outcome) -> Outcome {
        let jp = JoinPoint::new(self.ctx);

        for bound in &self.chain.after {
            self.invoked(bound.descriptor);
            if let Err(e) = bound.handler.after(&jp) {
                outcome = Err(e);
            }
        }

        match &outcome {
            Ok(value) => {
                for bound in &self.chain.after_returning {
                    self.invoked(bound.descriptor);
                    bound.handler.after_returning(&jp, value)?;
                }
            }
            Err(error) => {
                for bound in &self.chain.after_throwing {
                    self.invoked(bound.descriptor);
                    bound.handler.after_throwing(&jp, error)?;
                }
            }
        }
        outcome
    }

    fn finalize(&self, outcome: &Outcome) {
        let kind = match outcome {
            Ok(_) => OutcomeKind::Returned,
            Err(_) => OutcomeKind::Raised,
        };
        self.ctx.set_state(CallState::Finalized);
        self.ctx.emit(EventPayload::Finalized {
            outcome: kind,
            duration_us: self.ctx.elapsed_us(),
        });
    }

    fn invoked(&self, descriptor: &AdviceDescriptor) {
        self.ctx.emit(EventPayload::AdviceInvoked {
            advice: descriptor.name.clone(),
            kind: descriptor.kind(),
        });
    }
}

fn state_for(outcome: &Outcome) -> CallState {
    match outcome {
        Ok(_) => CallState::Returned,
        Err(_) => CallState::Raised,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingSink;
    use crate::registry::RegistryBuilder;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn descriptor() -> CallSiteDescriptor {
        CallSiteDescriptor::builder("com.x.Service", "charge")
            .param("int")
            .arg(json!(5))
            .build()
    }

    #[test]
    fn test_fast_path_emits_nothing() {
        let registry = RegistryBuilder::new().build().unwrap();
        let sink = Arc::new(RecordingSink::new());
        let weaver = Weaver::new(Arc::new(registry)).with_sink(sink.clone());

        let outcome = weaver.intercept(&descriptor(), |args| Ok(json!(args[0].as_i64())));
        assert_eq!(outcome, Ok(json!(5)));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_state_sequence_on_success() {
        let mut builder = RegistryBuilder::new();
        builder.before("b", "within(*)", |_| Ok(())).unwrap();
        let sink = Arc::new(RecordingSink::new());
        let weaver = Weaver::new(Arc::new(builder.build().unwrap())).with_sink(sink.clone());

        weaver.intercept(&descriptor(), |_| Ok(json!("ok"))).unwrap();

        let states: Vec<CallState> = sink
            .payloads()
            .into_iter()
            .filter_map(|p| match p {
                EventPayload::StateChanged { state } => Some(state),
                _ => None,
            })
            .collect();
        assert_eq!(
            states,
            vec![CallState::Proceeding, CallState::Returned, CallState::Finalized]
        );
    }

    #[test]
    fn test_state_sequence_when_short_circuited() {
        let mut builder = RegistryBuilder::new();
        builder.around("cache", "within(*)", |_| Ok(json!("cached"))).unwrap();
        let sink = Arc::new(RecordingSink::new());
        let weaver = Weaver::new(Arc::new(builder.build().unwrap())).with_sink(sink.clone());

        weaver.intercept(&descriptor(), |_| Ok(json!("live"))).unwrap();

        let payloads = sink.payloads();
        assert!(payloads.contains(&EventPayload::ShortCircuited {
            advice: "cache".into()
        }));
        assert!(!payloads.contains(&EventPayload::TargetInvoked));
        assert!(matches!(
            payloads.last(),
            Some(EventPayload::Finalized {
                outcome: OutcomeKind::Returned,
                ..
            })
        ));
    }

    #[test]
    fn test_call_ids_are_unique_per_call() {
        let mut builder = RegistryBuilder::new();
        builder.before("b", "within(*)", |_| Ok(())).unwrap();
        let sink = Arc::new(RecordingSink::new());
        let weaver = Weaver::new(Arc::new(builder.build().unwrap())).with_sink(sink.clone());

        weaver.intercept(&descriptor(), |_| Ok(json!(1))).unwrap();
        weaver.intercept(&descriptor(), |_| Ok(json!(2))).unwrap();

        let mut ids: Vec<_> = sink.events().iter().map(|e| e.call_id).collect();
        ids.dedup();
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn test_in_place_target_updates_are_visible() {
        let seen = Arc::new(std::sync::Mutex::new(None));
        let mut builder = RegistryBuilder::new();
        let slot = seen.clone();
        builder
            .after("inspect", "within(*)", move |jp| {
                *slot.lock().unwrap() = jp.argument(0);
                Ok(())
            })
            .unwrap();
        let weaver = Weaver::new(Arc::new(builder.build().unwrap()));

        let mut arguments = vec![json!({"done": false})];
        let outcome = weaver.intercept_mut(&descriptor(), &mut arguments, |live| {
            live[0]["done"] = json!(true);
            Ok(json!("ok"))
        });

        assert_eq!(outcome, Ok(json!("ok")));
        assert_eq!(*seen.lock().unwrap(), Some(json!({"done": true})));
        assert_eq!(arguments, vec![json!({"done": true})]);
    }

    #[test]
    fn test_in_place_fast_path_updates_caller() {
        let weaver = Weaver::new(Arc::new(RegistryBuilder::new().build().unwrap()));
        let mut arguments = vec![json!(1)];
        weaver
            .intercept_mut(&descriptor(), &mut arguments, |live| {
                live.push(json!(2));
                Ok(json!(null))
            })
            .unwrap();
        assert_eq!(arguments, vec![json!(1), json!(2)]);
    }

    #[test]
    fn test_describe() {
        let mut builder = RegistryBuilder::new();
        builder.before("log", "within(com.x.*)", |_| Ok(())).unwrap();
        builder.around("tx", "within(com.x.*)", |pjp| pjp.proceed()).unwrap();
        let weaver = Weaver::new(Arc::new(builder.build().unwrap()));

        assert_eq!(weaver.describe(&descriptor()), vec!["around:tx", "before:log"]);
    }
}
