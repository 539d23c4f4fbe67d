//! Named pointcut reference validation
//!
//! Registration-time check that every `Ref` in the named-pointcut table and
//! in the advice pointcuts resolves, and that no named pointcut reaches
//! itself through references. Forward references are fine; the check runs
//! once the whole table is known.

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use crate::ast::PointcutExpr;

/// Reference problem found during validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    #[error("unresolved pointcut reference '{id}' (from {referenced_from})")]
    Unresolved { id: String, referenced_from: String },

    #[error("cyclic pointcut reference: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// Validate the named-pointcut table plus any number of root expressions.
///
/// `roots` pairs a label (used in error messages, e.g. an advice name) with
/// its expression. All errors are collected, in a deterministic order.
pub fn validate_named_pointcuts<'a, I>(
    named: &HashMap<String, PointcutExpr>,
    roots: I,
) -> Result<(), Vec<ReferenceError>>
where
    I: IntoIterator<Item = (&'a str, &'a PointcutExpr)>,
{
    let sorted: BTreeMap<&str, &PointcutExpr> =
        named.iter().map(|(k, v)| (k.as_str(), v)).collect();

    let mut errors = Vec::new();

    // Unresolved references inside named pointcuts
    for (id, expr) in &sorted {
        for reference in expr.references() {
            if !sorted.contains_key(reference) {
                errors.push(ReferenceError::Unresolved {
                    id: reference.to_string(),
                    referenced_from: format!("named pointcut '{}'", id),
                });
            }
        }
    }

    // Unresolved references from roots
    for (label, expr) in roots {
        for reference in expr.references() {
            if !sorted.contains_key(reference) {
                errors.push(ReferenceError::Unresolved {
                    id: reference.to_string(),
                    referenced_from: label.to_string(),
                });
            }
        }
    }

    // Cycles among named pointcuts
    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut stack: Vec<&str> = Vec::new();
    for &id in sorted.keys() {
        visit(id, &sorted, &mut marks, &mut stack, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn visit<'a>(
    id: &'a str,
    named: &BTreeMap<&'a str, &'a PointcutExpr>,
    marks: &mut HashMap<&'a str, Mark>,
    stack: &mut Vec<&'a str>,
    errors: &mut Vec<ReferenceError>,
) {
    match marks.get(id) {
        Some(Mark::Done) => return,
        Some(Mark::InProgress) => {
            let start = stack.iter().position(|s| *s == id).unwrap_or(0);
            let mut path: Vec<String> = stack[start..].iter().map(|s| s.to_string()).collect();
            path.push(id.to_string());
            errors.push(ReferenceError::Cycle { path });
            return;
        }
        None => {}
    }

    let Some(&expr) = named.get(id) else {
        // Reported as unresolved already
        return;
    };

    marks.insert(id, Mark::InProgress);
    stack.push(id);
    for reference in expr.references() {
        visit(reference, named, marks, stack, errors);
    }
    stack.pop();
    marks.insert(id, Mark::Done);
}

// =============================================================================
// Tests
// =============================================================================
