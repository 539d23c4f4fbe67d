//! Pointcut AST
//!
//! Immutable expression tree produced by the parser. Leaves are the
//! designators (`execution`, `within`, `@within`, `@annotation`, `target`,
//! `this`, `args`) plus `Ref` to a named pointcut; inner nodes are the
//! boolean combinators.
//!
//! Expressions carry no behavior of their own - evaluation lives in
//! [`crate::matcher`] - and render back to pointcut syntax via `Display`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::pattern::{NamePattern, ParamPattern, TypePattern};

/// `execution(<ret> <type>.<method>(<params>))`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionPattern {
    pub return_type: TypePattern,
    pub declaring_type: TypePattern,
    pub method: NamePattern,
    pub params: ParamPattern,
}

impl fmt::Display for ExecutionPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.return_type)?;
        if !self.declaring_type.is_any() {
            let declaring = self.declaring_type.to_string();
            // `com.x..charge` keeps its `..` joint; everything else joins with '.'
            if declaring.ends_with("..") {
                write!(f, "{}", declaring)?;
            } else {
                write!(f, "{}.", declaring)?;
            }
        }
        write!(f, "{}{}", self.method, self.params)
    }
}

/// A parsed pointcut expression
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PointcutExpr {
    Execution(ExecutionPattern),
    Within(TypePattern),
    /// `@annotation(id)` - annotation present on the method
    AnnotatedMethod(String),
    /// `@within(id)` - annotation present on the declaring type
    AnnotatedType(String),
    TargetType(String),
    ThisType(String),
    Args(ParamPattern),
    And(Box<PointcutExpr>, Box<PointcutExpr>),
    Or(Box<PointcutExpr>, Box<PointcutExpr>),
    Not(Box<PointcutExpr>),
    /// Reference to a named pointcut
    Ref(String),
}

impl PointcutExpr {
    pub fn and(self, other: PointcutExpr) -> PointcutExpr {
        PointcutExpr::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: PointcutExpr) -> PointcutExpr {
        PointcutExpr::Or(Box::new(self), Box::new(other))
    }

    pub fn negate(self) -> PointcutExpr {
        PointcutExpr::Not(Box::new(self))
    }

    pub fn reference(id: impl Into<String>) -> PointcutExpr {
        PointcutExpr::Ref(id.into())
    }

    /// Named pointcut ids referenced anywhere in this expression (in order, with repeats)
    pub fn references(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            PointcutExpr::Ref(id) => out.push(id),
            PointcutExpr::And(l, r) | PointcutExpr::Or(l, r) => {
                l.collect_references(out);
                r.collect_references(out);
            }
            PointcutExpr::Not(inner) => inner.collect_references(out),
            _ => {}
        }
    }

    /// Binding strength used when rendering (higher binds tighter)
    fn precedence(&self) -> u8 {
        match self {
            PointcutExpr::Or(..) => 1,
            PointcutExpr::And(..) => 2,
            PointcutExpr::Not(..) => 3,
            _ => 4,
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, min: u8) -> fmt::Result {
        if self.precedence() < min {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

impl fmt::Display for PointcutExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointcutExpr::Execution(exec) => write!(f, "execution({})", exec),
            PointcutExpr::Within(tp) => write!(f, "within({})", tp),
            PointcutExpr::AnnotatedMethod(id) => write!(f, "@annotation({})", id),
            PointcutExpr::AnnotatedType(id) => write!(f, "@within({})", id),
            PointcutExpr::TargetType(name) => write!(f, "target({})", name),
            PointcutExpr::ThisType(name) => write!(f, "this({})", name),
            PointcutExpr::Args(params) => write!(f, "args{}", params),
            PointcutExpr::And(l, r) => {
                l.fmt_operand(f, 2)?;
                f.write_str(" && ")?;
                r.fmt_operand(f, 3)
            }
            PointcutExpr::Or(l, r) => {
                l.fmt_operand(f, 1)?;
                f.write_str(" || ")?;
                r.fmt_operand(f, 2)
            }
            PointcutExpr::Not(inner) => {
                f.write_str("!")?;
                inner.fmt_operand(f, 3)
            }
            PointcutExpr::Ref(id) => write!(f, "{}()", id),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_references_in_order() {
        let expr = PointcutExpr::reference("a")
            .and(PointcutExpr::AnnotatedMethod("X".into()))
            .or(PointcutExpr::reference("b").negate());
        assert_eq!(expr.references(), vec!["a", "b"]);
    }

    #[test]
    fn test_display_parenthesizes_by_precedence() {
        let a = PointcutExpr::AnnotatedMethod("A".into());
        let b = PointcutExpr::AnnotatedType("B".into());
        let c = PointcutExpr::reference("c");

        let expr = a.clone().or(b.clone()).and(c.clone());
        assert_eq!(expr.to_string(), "(@annotation(A) || @within(B)) && c()");

        let expr = a.clone().and(b.clone()).or(c.clone());
        assert_eq!(expr.to_string(), "@annotation(A) && @within(B) || c()");

        let expr = a.and(b).negate();
        assert_eq!(expr.to_string(), "!(@annotation(A) && @within(B))");
    }

    #[test]
    fn test_execution_display() {
        let exec = ExecutionPattern {
            return_type: TypePattern::any(),
            declaring_type: TypePattern::parse("com.x.Service").unwrap(),
            method: NamePattern::new("*"),
            params: ParamPattern::any(),
        };
        assert_eq!(
            PointcutExpr::Execution(exec).to_string(),
            "execution(* com.x.Service.*(..))"
        );
    }
}
