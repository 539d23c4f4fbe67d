//! Advice model
//!
//! An advice is a handler plus the kind that fixes its control-flow
//! contract. Handlers plug in through one trait per kind; closures of the
//! right shape implement those traits directly.

use std::fmt;
use std::sync::Arc;

use pointcut_core::PointcutExpr;
use serde::{Deserialize, Serialize};

use crate::error::{Outcome, Value, WeaveError};
use crate::weaver::{JoinPoint, ProceedingJoinPoint};

/// Explicit order used when an advice declares none (sorts last)
pub const DEFAULT_ORDER: i32 = i32::MAX;

/// Advice kind, declared in precedence-group order
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AdviceKind {
    Around,
    Before,
    After,
    AfterReturning,
    AfterThrowing,
}

impl AdviceKind {
    pub const ALL: [AdviceKind; 5] = [
        AdviceKind::Around,
        AdviceKind::Before,
        AdviceKind::After,
        AdviceKind::AfterReturning,
        AdviceKind::AfterThrowing,
    ];

    /// Ordering group: Around, Before, After, AfterReturning, AfterThrowing
    pub fn precedence_group(self) -> u8 {
        match self {
            AdviceKind::Around => 0,
            AdviceKind::Before => 1,
            AdviceKind::After => 2,
            AdviceKind::AfterReturning => 3,
            AdviceKind::AfterThrowing => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AdviceKind::Around => "around",
            AdviceKind::Before => "before",
            AdviceKind::After => "after",
            AdviceKind::AfterReturning => "after_returning",
            AdviceKind::AfterThrowing => "after_throwing",
        }
    }
}

impl fmt::Display for AdviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Handler traits
// ============================================================================

/// Runs before the target; a failure skips the target
pub trait BeforeAdvice: Send + Sync {
    fn before(&self, jp: &JoinPoint<'_>) -> Result<(), WeaveError>;
}

/// Runs once the call has an outcome, whatever it is
pub trait AfterAdvice: Send + Sync {
    fn after(&self, jp: &JoinPoint<'_>) -> Result<(), WeaveError>;
}

/// Observes a successful result (read-only)
pub trait AfterReturningAdvice: Send + Sync {
    fn after_returning(&self, jp: &JoinPoint<'_>, result: &Value) -> Result<(), WeaveError>;
}

/// Observes a failure (read-only, cannot suppress it)
pub trait AfterThrowingAdvice: Send + Sync {
    fn after_throwing(&self, jp: &JoinPoint<'_>, error: &WeaveError) -> Result<(), WeaveError>;
}

/// Wraps the rest of the chain; decides whether and how to proceed
pub trait AroundAdvice: Send + Sync {
    fn around(&self, pjp: &mut ProceedingJoinPoint<'_>) -> Outcome;
}

impl<F> BeforeAdvice for F
where
    F: Fn(&JoinPoint<'_>) -> Result<(), WeaveError> + Send + Sync,
{
    fn before(&self, jp: &JoinPoint<'_>) -> Result<(), WeaveError> {
        self(jp)
    }
}

impl<F> AfterAdvice for F
where
    F: Fn(&JoinPoint<'_>) -> Result<(), WeaveError> + Send + Sync,
{
    fn after(&self, jp: &JoinPoint<'_>) -> Result<(), WeaveError> {
        self(jp)
    }
}

impl<F> AfterReturningAdvice for F
where
    F: Fn(&JoinPoint<'_>, &Value) -> Result<(), WeaveError> + Send + Sync,
{
    fn after_returning(&self, jp: &JoinPoint<'_>, result: &Value) -> Result<(), WeaveError> {
        self(jp, result)
    }
}

impl<F> AfterThrowingAdvice for F
where
    F: Fn(&JoinPoint<'_>, &WeaveError) -> Result<(), WeaveError> + Send + Sync,
{
    fn after_throwing(&self, jp: &JoinPoint<'_>, error: &WeaveError) -> Result<(), WeaveError> {
        self(jp, error)
    }
}

impl<F> AroundAdvice for F
where
    F: Fn(&mut ProceedingJoinPoint<'_>) -> Outcome + Send + Sync,
{
    fn around(&self, pjp: &mut ProceedingJoinPoint<'_>) -> Outcome {
        self(pjp)
    }
}

// ============================================================================
// Advice
// ============================================================================

/// A handler tagged with its kind
#[derive(Clone)]
pub enum Advice {
    Before(Arc<dyn BeforeAdvice>),
    After(Arc<dyn AfterAdvice>),
    AfterReturning(Arc<dyn AfterReturningAdvice>),
    AfterThrowing(Arc<dyn AfterThrowingAdvice>),
    Around(Arc<dyn AroundAdvice>),
}

impl Advice {
    pub fn before<F>(f: F) -> Self
    where
        F: Fn(&JoinPoint<'_>) -> Result<(), WeaveError> + Send + Sync + 'static,
    {
        Advice::Before(Arc::new(f))
    }

    pub fn after<F>(f: F) -> Self
    where
        F: Fn(&JoinPoint<'_>) -> Result<(), WeaveError> + Send + Sync + 'static,
    {
        Advice::After(Arc::new(f))
    }

    pub fn after_returning<F>(f: F) -> Self
    where
        F: Fn(&JoinPoint<'_>, &Value) -> Result<(), WeaveError> + Send + Sync + 'static,
    {
        Advice::AfterReturning(Arc::new(f))
    }

    pub fn after_throwing<F>(f: F) -> Self
    where
        F: Fn(&JoinPoint<'_>, &WeaveError) -> Result<(), WeaveError> + Send + Sync + 'static,
    {
        Advice::AfterThrowing(Arc::new(f))
    }

    pub fn around<F>(f: F) -> Self
    where
        F: Fn(&mut ProceedingJoinPoint<'_>) -> Outcome + Send + Sync + 'static,
    {
        Advice::Around(Arc::new(f))
    }

    pub fn kind(&self) -> AdviceKind {
        match self {
            Advice::Before(_) => AdviceKind::Before,
            Advice::After(_) => AdviceKind::After,
            Advice::AfterReturning(_) => AdviceKind::AfterReturning,
            Advice::AfterThrowing(_) => AdviceKind::AfterThrowing,
            Advice::Around(_) => AdviceKind::Around,
        }
    }
}

impl fmt::Debug for Advice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Advice::{:?}", self.kind())
    }
}

/// Stable id assigned at registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AdviceId(pub u64);

impl fmt::Display for AdviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "advice#{}", self.0)
    }
}

/// A registered advice: handler, pointcut, and ordering keys
#[derive(Debug, Clone)]
pub struct AdviceDescriptor {
    pub id: AdviceId,
    pub name: String,
    pub pointcut: PointcutExpr,
    /// Pointcut source text as registered
    pub expression: String,
    /// Explicit precedence, lower runs first / outermost
    pub order: i32,
    /// Registration sequence number (tie-breaker)
    pub declaration_order: u64,
    pub advice: Advice,
}

impl AdviceDescriptor {
    pub fn kind(&self) -> AdviceKind {
        self.advice.kind()
    }

    /// Sort key: (kind group, explicit order, declaration order)
    pub fn ordering_key(&self) -> (u8, i32, u64) {
        (
            self.kind().precedence_group(),
            self.order,
            self.declaration_order,
        )
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_order_matches_precedence_group() {
        let mut kinds = AdviceKind::ALL.to_vec();
        kinds.reverse();
        kinds.sort();
        assert_eq!(kinds, AdviceKind::ALL.to_vec());
        for pair in AdviceKind::ALL.windows(2) {
            assert!(pair[0].precedence_group() < pair[1].precedence_group());
        }
    }

    #[test]
    fn test_kind_serde_is_snake_case() {
        let kind: AdviceKind = serde_json::from_str("\"after_returning\"").unwrap();
        assert_eq!(kind, AdviceKind::AfterReturning);
        assert_eq!(
            serde_json::to_string(&AdviceKind::AfterThrowing).unwrap(),
            "\"after_throwing\""
        );
    }

    #[test]
    fn test_advice_kind_from_variant() {
        assert_eq!(Advice::before(|_| Ok(())).kind(), AdviceKind::Before);
        assert_eq!(Advice::after(|_| Ok(())).kind(), AdviceKind::After);
        assert_eq!(
            Advice::after_returning(|_, _| Ok(())).kind(),
            AdviceKind::AfterReturning
        );
        assert_eq!(
            Advice::after_throwing(|_, _| Ok(())).kind(),
            AdviceKind::AfterThrowing
        );
        assert_eq!(Advice::around(|pjp| pjp.proceed()).kind(), AdviceKind::Around);
    }
}
