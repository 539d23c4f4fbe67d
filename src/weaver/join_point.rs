//! Join point views handed to advice bodies

use std::fmt;
use std::ops::Deref;

use pointcut_core::CallSiteDescriptor;
use uuid::Uuid;

use super::context::{CallState, InvocationContext};
use crate::error::{AdviceUsageError, Outcome, Value, WeaveError};

/// Read-only view of the call for non-around advice
#[derive(Clone, Copy)]
pub struct JoinPoint<'a> {
    ctx: &'a InvocationContext<'a>,
}

impl<'a> JoinPoint<'a> {
    pub(crate) fn new(ctx: &'a InvocationContext<'a>) -> Self {
        Self { ctx }
    }

    pub fn call_id(&self) -> Uuid {
        self.ctx.call_id()
    }

    pub fn descriptor(&self) -> &'a CallSiteDescriptor {
        self.ctx.descriptor()
    }

    /// Short signature, e.g. `PaymentService.processPayment(..)`
    pub fn signature(&self) -> String {
        self.ctx.descriptor().short_signature()
    }

    pub fn arguments(&self) -> Vec<Value> {
        self.ctx.arguments()
    }

    pub fn argument(&self, index: usize) -> Option<Value> {
        self.ctx.argument(index)
    }

    pub fn state(&self) -> CallState {
        self.ctx.state()
    }
}

impl fmt::Debug for JoinPoint<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinPoint")
            .field("call_id", &self.call_id())
            .field("signature", &self.signature())
            .field("state", &self.state())
            .finish()
    }
}

/// View for Around advice: a join point plus the one-shot `proceed`
pub struct ProceedingJoinPoint<'a> {
    jp: JoinPoint<'a>,
    advice: &'a str,
    next: Option<Box<dyn FnOnce() -> Outcome + 'a>>,
}

impl<'a> ProceedingJoinPoint<'a> {
    pub(crate) fn new(
        ctx: &'a InvocationContext<'a>,
        advice: &'a str,
        next: Box<dyn FnOnce() -> Outcome + 'a>,
    ) -> Self {
        Self {
            jp: JoinPoint::new(ctx),
            advice,
            next: Some(next),
        }
    }

    /// Run the rest of the chain with the current arguments.
    ///
    /// At most once per advice invocation. A second call returns
    /// [`AdviceUsageError::ProceedCalledTwice`] and poisons the call's final
    /// outcome with it.
    pub fn proceed(&mut self) -> Outcome {
        match self.next.take() {
            Some(next) => next(),
            None => Err(self.violation()),
        }
    }

    /// Replace the arguments seen by inner layers and the target, then proceed
    pub fn proceed_with(&mut self, arguments: Vec<Value>) -> Outcome {
        if self.next.is_none() {
            return Err(self.violation());
        }
        self.jp.ctx.replace_arguments(arguments);
        self.proceed()
    }

    pub fn has_proceeded(&self) -> bool {
        self.next.is_none()
    }

    /// Name of the advice holding this join point
    pub fn advice_name(&self) -> &'a str {
        self.advice
    }

    pub fn join_point(&self) -> JoinPoint<'a> {
        self.jp
    }

    fn violation(&self) -> WeaveError {
        let error = AdviceUsageError::ProceedCalledTwice {
            advice: self.advice.to_string(),
        };
        self.jp.ctx.record_violation(self.advice, &error);
        WeaveError::Usage(error)
    }
}

impl<'a> Deref for ProceedingJoinPoint<'a> {
    type Target = JoinPoint<'a>;

    fn deref(&self) -> &Self::Target {
        &self.jp
    }
}

impl fmt::Debug for ProceedingJoinPoint<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProceedingJoinPoint")
            .field("advice", &self.advice)
            .field("join_point", &self.jp)
            .field("proceeded", &self.has_proceeded())
            .finish()
    }
}
