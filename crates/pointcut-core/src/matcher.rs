//! Pointcut matcher
//!
//! Pure structural evaluation of a [`PointcutExpr`] against a
//! [`CallSiteDescriptor`]. "No match" is simply `false`; there is no I/O and
//! no per-call failure mode for well-formed, validated expressions.
//!
//! Named pointcut references are resolved through a [`NamedPointcuts`]
//! scope. A reference that escaped registration-time validation is a
//! configuration fault: [`try_matches`] reports it, [`matches`] logs it and
//! treats the reference as non-matching.

use std::collections::HashMap;

use thiserror::Error;
use tracing::error;

use crate::ast::{ExecutionPattern, PointcutExpr};
use crate::descriptor::CallSiteDescriptor;
use crate::pattern::type_name_matches;

/// Lookup of named pointcuts for `Ref` resolution
pub trait NamedPointcuts {
    fn lookup(&self, id: &str) -> Option<&PointcutExpr>;
}

impl NamedPointcuts for HashMap<String, PointcutExpr> {
    fn lookup(&self, id: &str) -> Option<&PointcutExpr> {
        self.get(id)
    }
}

/// Empty scope - every `Ref` is unresolved
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNamedPointcuts;

impl NamedPointcuts for NoNamedPointcuts {
    fn lookup(&self, _id: &str) -> Option<&PointcutExpr> {
        None
    }
}

/// Configuration fault detected while evaluating a reference
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error("unresolved pointcut reference '{0}'")]
    Unresolved(String),

    #[error("cyclic pointcut reference: {}", .0.join(" -> "))]
    Cyclic(Vec<String>),
}

/// Evaluate `expr` against `descriptor`
pub fn matches<S>(expr: &PointcutExpr, descriptor: &CallSiteDescriptor, scope: &S) -> bool
where
    S: NamedPointcuts + ?Sized,
{
    match try_matches(expr, descriptor, scope) {
        Ok(matched) => matched,
        Err(e) => {
            error!(
                error = %e,
                call_site = %descriptor.long_signature(),
                "pointcut configuration fault; treating as no match"
            );
            false
        }
    }
}

/// Evaluate `expr`, surfacing unresolved or cyclic references
pub fn try_matches<S>(
    expr: &PointcutExpr,
    descriptor: &CallSiteDescriptor,
    scope: &S,
) -> Result<bool, MatchError>
where
    S: NamedPointcuts + ?Sized,
{
    Evaluation {
        scope,
        descriptor,
        active: Vec::new(),
    }
    .eval(expr)
}

struct Evaluation<'a, S: ?Sized> {
    scope: &'a S,
    descriptor: &'a CallSiteDescriptor,
    /// Named pointcuts currently being expanded (cycle guard)
    active: Vec<&'a str>,
}

impl<'a, S> Evaluation<'a, S>
where
    S: NamedPointcuts + ?Sized,
{
    fn eval(&mut self, expr: &'a PointcutExpr) -> Result<bool, MatchError> {
        let d = self.descriptor;
        Ok(match expr {
            PointcutExpr::Execution(exec) => execution_matches(exec, d),
            PointcutExpr::Within(tp) => tp.matches(d.declaring_type_name()),
            PointcutExpr::AnnotatedMethod(id) => d
                .method_annotations()
                .iter()
                .any(|a| type_name_matches(id, a)),
            PointcutExpr::AnnotatedType(id) => d
                .type_annotations()
                .iter()
                .any(|a| type_name_matches(id, a)),
            PointcutExpr::TargetType(name) => {
                type_name_matches(name, d.target_runtime_type_name())
                    || d.target_supertypes()
                        .iter()
                        .any(|s| type_name_matches(name, s))
            }
            PointcutExpr::ThisType(name) => d
                .proxied_interface_names()
                .iter()
                .any(|i| type_name_matches(name, i)),
            PointcutExpr::Args(params) => params.matches(d.parameter_types()),
            PointcutExpr::And(l, r) => self.eval(l)? && self.eval(r)?,
            PointcutExpr::Or(l, r) => self.eval(l)? || self.eval(r)?,
            PointcutExpr::Not(inner) => !self.eval(inner)?,
            PointcutExpr::Ref(id) => return self.eval_reference(id),
        })
    }

    fn eval_reference(&mut self, id: &'a str) -> Result<bool, MatchError> {
        if let Some(pos) = self.active.iter().position(|a| *a == id) {
            let mut path: Vec<String> = self.active[pos..].iter().map(|s| s.to_string()).collect();
            path.push(id.to_string());
            return Err(MatchError::Cyclic(path));
        }

        let scope = self.scope;
        let target = scope
            .lookup(id)
            .ok_or_else(|| MatchError::Unresolved(id.to_string()))?;

        self.active.push(id);
        let result = self.eval(target);
        self.active.pop();
        result
    }
}

fn execution_matches(exec: &ExecutionPattern, d: &CallSiteDescriptor) -> bool {
    exec.declaring_type.matches(d.declaring_type_name())
        && exec.method.matches(d.method_name())
        && exec.params.matches(d.parameter_types())
        && exec.return_type.matches(d.return_type_name())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_pointcut;
    use pretty_assertions::assert_eq;

    fn charge_on(type_name: &str) -> CallSiteDescriptor {
        CallSiteDescriptor::builder(type_name, "charge")
            .param("com.x.PaymentRequest")
            .returns("String")
            .build()
    }

    fn check(expr: &str, d: &CallSiteDescriptor) -> bool {
        matches(&parse_pointcut(expr).unwrap(), d, &NoNamedPointcuts)
    }

    #[test]
    fn test_execution_selects_declaring_type() {
        let expr = "execution(* com.x.Service.*(..))";
        assert!(check(expr, &charge_on("com.x.Service")));
        assert!(!check(expr, &charge_on("com.x.Other")));
    }

    #[test]
    fn test_execution_method_params_and_return() {
        let d = charge_on("com.x.Service");
        assert!(check("execution(String com.x.Service.charge(PaymentRequest))", &d));
        assert!(check("execution(* *.char*(*))", &d));
        assert!(!check("execution(* com.x.Service.charge())", &d));
        assert!(!check("execution(void com.x.Service.charge(..))", &d));
        assert!(!check("execution(* com.x.Service.refund(..))", &d));
    }

    #[test]
    fn test_within_is_type_granular() {
        let d = charge_on("com.x.billing.Service");
        assert!(check("within(com.x..*)", &d));
        assert!(check("within(com.x.billing.*)", &d));
        assert!(!check("within(com.x.*)", &d));
    }

    #[test]
    fn test_annotation_membership() {
        let d = CallSiteDescriptor::builder("com.x.Service", "charge")
            .method_annotation("com.x.annotation.PaymentCheck")
            .type_annotation("org.stereotype.Service")
            .build();

        assert!(check("@annotation(PaymentCheck)", &d));
        assert!(check("@annotation(com.x.annotation.PaymentCheck)", &d));
        assert!(!check("@annotation(Audited)", &d));
        assert!(check("@within(org.stereotype.Service)", &d));
        assert!(!check("@within(PaymentCheck)", &d));
    }

    #[test]
    fn test_target_exact_or_subtype() {
        let d = CallSiteDescriptor::builder("com.x.Service", "charge")
            .target("com.x.CardService")
            .supertype("com.x.Service")
            .supertype("com.x.Base")
            .build();

        assert!(check("target(com.x.CardService)", &d));
        assert!(check("target(com.x.Base)", &d));
        assert!(!check("target(com.x.Other)", &d));
    }

    #[test]
    fn test_this_membership() {
        let d = CallSiteDescriptor::builder("com.x.CardService", "charge")
            .proxied_interface("com.x.Charging")
            .build();
        assert!(check("this(com.x.Charging)", &d));
        assert!(!check("this(com.x.CardService)", &d));
    }

    #[test]
    fn test_args_uses_declared_types_only() {
        let d = CallSiteDescriptor::builder("com.x.Service", "charge")
            .param("com.x.PaymentRequest")
            .param("int")
            .arg(serde_json::json!("not a request"))
            .arg(serde_json::json!(42))
            .build();

        assert!(check("args(PaymentRequest, int)", &d));
        assert!(check("args(PaymentRequest, ..)", &d));
        assert!(check("args(.., int)", &d));
        assert!(!check("args(PaymentRequest)", &d));
        assert!(!check("args(String, int)", &d));
    }

    #[test]
    fn test_named_reference_resolution() {
        let mut scope = HashMap::new();
        scope.insert(
            "serviceLayer".to_string(),
            parse_pointcut("within(com.x.Service)").unwrap(),
        );

        let expr = parse_pointcut("serviceLayer() && execution(* *.charge(..))").unwrap();
        assert!(matches(&expr, &charge_on("com.x.Service"), &scope));
        assert!(!matches(&expr, &charge_on("com.x.Other"), &scope));
    }

    #[test]
    fn test_unresolved_reference_is_reported() {
        let expr = parse_pointcut("missing()").unwrap();
        let d = charge_on("com.x.Service");
        assert_eq!(
            try_matches(&expr, &d, &NoNamedPointcuts),
            Err(MatchError::Unresolved("missing".into()))
        );
        assert!(!matches(&expr, &d, &NoNamedPointcuts));
    }

    #[test]
    fn test_cyclic_reference_is_reported_not_looped() {
        let mut scope = HashMap::new();
        scope.insert("a".to_string(), parse_pointcut("b()").unwrap());
        scope.insert("b".to_string(), parse_pointcut("a()").unwrap());

        let result = try_matches(&PointcutExpr::reference("a"), &charge_on("X"), &scope);
        assert_eq!(
            result,
            Err(MatchError::Cyclic(vec!["a".into(), "b".into(), "a".into()]))
        );
    }

    #[test]
    fn test_short_circuit_skips_unresolved_right_operand() {
        let expr = parse_pointcut("within(com.y.*) && missing()").unwrap();
        assert_eq!(
            try_matches(&expr, &charge_on("com.x.Service"), &NoNamedPointcuts),
            Ok(false)
        );
    }
}
