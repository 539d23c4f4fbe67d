//! Advice registry
//!
//! Two phases:
//! - [`RegistryBuilder`] collects named pointcuts and advice at startup.
//!   Pointcuts are parsed here, once; forward references between named
//!   pointcuts are allowed until [`RegistryBuilder::build`].
//! - [`Registry`] is the frozen result: validated, pre-sorted, immutable,
//!   shared as `Arc<Registry>` and read without locks.
//!
//! Resolution order is total: (kind group, explicit order, declaration
//! order), with groups Around, Before, After, AfterReturning, AfterThrowing.

use std::collections::HashMap;

use pointcut_core::{
    matches, parse_pointcut, validate_named_pointcuts, CallSiteDescriptor, NamedPointcuts,
    PointcutExpr,
};
use tracing::{debug, error, info};

use crate::advice::{Advice, AdviceDescriptor, AdviceId, AdviceKind, DEFAULT_ORDER};
use crate::error::{Outcome, RegistrationError, Value, WeaveError};
use crate::weaver::{JoinPoint, ProceedingJoinPoint};

// ============================================================================
// Builder
// ============================================================================

/// Mutable registration phase
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    named: HashMap<String, PointcutExpr>,
    advices: Vec<AdviceDescriptor>,
    next_declaration: u64,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a named pointcut usable as `id()` in other expressions
    pub fn define_named_pointcut(
        &mut self,
        id: impl Into<String>,
        expression: &str,
    ) -> Result<(), RegistrationError> {
        let id = id.into();
        if self.named.contains_key(&id) {
            return Err(RegistrationError::DuplicateNamedPointcut(id));
        }
        let expr = parse_pointcut(expression).map_err(|source| RegistrationError::Syntax {
            context: format!("named pointcut '{}'", id),
            source,
        })?;
        debug!(pointcut = %id, expression, "defined named pointcut");
        self.named.insert(id, expr);
        Ok(())
    }

    /// Register an advice under a generated name (`<kind>#<n>`)
    pub fn register(
        &mut self,
        advice: Advice,
        expression: &str,
        order: Option<i32>,
    ) -> Result<AdviceId, RegistrationError> {
        let name = format!("{}#{}", advice.kind(), self.next_declaration);
        self.register_named(name, advice, expression, order)
    }

    /// Register an advice. `order` defaults to [`DEFAULT_ORDER`].
    pub fn register_named(
        &mut self,
        name: impl Into<String>,
        advice: Advice,
        expression: &str,
        order: Option<i32>,
    ) -> Result<AdviceId, RegistrationError> {
        let name = name.into();
        let pointcut = parse_pointcut(expression).map_err(|source| RegistrationError::Syntax {
            context: format!("advice '{}'", name),
            source,
        })?;

        let declaration_order = self.next_declaration;
        self.next_declaration += 1;
        let id = AdviceId(declaration_order);

        debug!(
            advice = %name,
            kind = %advice.kind(),
            expression,
            order = ?order,
            "registered advice"
        );

        self.advices.push(AdviceDescriptor {
            id,
            name,
            pointcut,
            expression: expression.to_string(),
            order: order.unwrap_or(DEFAULT_ORDER),
            declaration_order,
            advice,
        });
        Ok(id)
    }

    pub fn before<F>(
        &mut self,
        name: impl Into<String>,
        expression: &str,
        handler: F,
    ) -> Result<AdviceId, RegistrationError>
    where
        F: Fn(&JoinPoint<'_>) -> Result<(), WeaveError> + Send + Sync + 'static,
    {
        self.register_named(name, Advice::before(handler), expression, None)
    }

    pub fn after<F>(
        &mut self,
        name: impl Into<String>,
        expression: &str,
        handler: F,
    ) -> Result<AdviceId, RegistrationError>
    where
        F: Fn(&JoinPoint<'_>) -> Result<(), WeaveError> + Send + Sync + 'static,
    {
        self.register_named(name, Advice::after(handler), expression, None)
    }

    pub fn after_returning<F>(
        &mut self,
        name: impl Into<String>,
        expression: &str,
        handler: F,
    ) -> Result<AdviceId, RegistrationError>
    where
        F: Fn(&JoinPoint<'_>, &Value) -> Result<(), WeaveError> + Send + Sync + 'static,
    {
        self.register_named(name, Advice::after_returning(handler), expression, None)
    }

    pub fn after_throwing<F>(
        &mut self,
        name: impl Into<String>,
        expression: &str,
        handler: F,
    ) -> Result<AdviceId, RegistrationError>
    where
        F: Fn(&JoinPoint<'_>, &WeaveError) -> Result<(), WeaveError> + Send + Sync + 'static,
    {
        self.register_named(name, Advice::after_throwing(handler), expression, None)
    }

    pub fn around<F>(
        &mut self,
        name: impl Into<String>,
        expression: &str,
        handler: F,
    ) -> Result<AdviceId, RegistrationError>
    where
        F: Fn(&mut ProceedingJoinPoint<'_>) -> Outcome + Send + Sync + 'static,
    {
        self.register_named(name, Advice::around(handler), expression, None)
    }

    /// Validate references and freeze.
    ///
    /// Fails with the first unresolved or cyclic reference; every problem
    /// found is logged.
    pub fn build(self) -> Result<Registry, RegistrationError> {
        let labels: Vec<String> = self
            .advices
            .iter()
            .map(|a| format!("advice '{}'", a.name))
            .collect();
        let roots = labels
            .iter()
            .zip(&self.advices)
            .map(|(label, a)| (label.as_str(), &a.pointcut));

        if let Err(errors) = validate_named_pointcuts(&self.named, roots) {
            for e in &errors {
                error!(error = %e, "pointcut reference validation failed");
            }
            if let Some(first) = errors.into_iter().next() {
                return Err(first.into());
            }
        }

        let mut advices = self.advices;
        advices.sort_by_key(AdviceDescriptor::ordering_key);

        info!(
            advices = advices.len(),
            named_pointcuts = self.named.len(),
            "advice registry built"
        );

        Ok(Registry {
            named: self.named,
            advices,
        })
    }
}

// ============================================================================
// Frozen registry
// ============================================================================

/// Frozen, validated advice registry
#[derive(Debug)]
pub struct Registry {
    named: HashMap<String, PointcutExpr>,
    /// Sorted by [`AdviceDescriptor::ordering_key`]
    advices: Vec<AdviceDescriptor>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// All advice whose pointcut matches, in execution order
    pub fn resolve(&self, descriptor: &CallSiteDescriptor) -> Vec<&AdviceDescriptor> {
        self.advices
            .iter()
            .filter(|a| matches(&a.pointcut, descriptor, self))
            .collect()
    }

    /// Evaluate an arbitrary expression with this registry's named pointcuts
    pub fn matches(&self, expr: &PointcutExpr, descriptor: &CallSiteDescriptor) -> bool {
        matches(expr, descriptor, self)
    }

    pub fn get(&self, id: AdviceId) -> Option<&AdviceDescriptor> {
        self.advices.iter().find(|a| a.id == id)
    }

    pub fn named_pointcut(&self, id: &str) -> Option<&PointcutExpr> {
        self.named.get(id)
    }

    pub fn len(&self) -> usize {
        self.advices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.advices.is_empty()
    }

    /// Registered advice in execution order
    pub fn iter(&self) -> impl Iterator<Item = &AdviceDescriptor> {
        self.advices.iter()
    }

    /// Registered advice of one kind, in execution order
    pub fn of_kind(&self, kind: AdviceKind) -> impl Iterator<Item = &AdviceDescriptor> {
        self.advices.iter().filter(move |a| a.kind() == kind)
    }
}

impl NamedPointcuts for Registry {
    fn lookup(&self, id: &str) -> Option<&PointcutExpr> {
        self.named.get(id)
    }
}

// =============================================================================
// Tests
// =============================================================================
