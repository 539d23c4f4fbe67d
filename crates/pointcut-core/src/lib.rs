//! pointcut-core: Pointcut language, call-site model, and matcher
//!
//! This crate contains the pure predicate logic with NO runtime dependencies:
//! - Call-site descriptors (plain metadata about one call)
//! - Type, name, and parameter patterns (`*` and `..` wildcards)
//! - Pointcut AST (`PointcutExpr`)
//! - Nom-based pointcut expression parser
//! - Structural matcher over descriptors
//! - Named-pointcut reference validation (unresolved + cyclic references)
//!
//! Advice, ordering, and chain execution live in the `aspect-weaver` crate.

pub mod ast;
pub mod descriptor;
pub mod matcher;
pub mod parser;
pub mod pattern;
pub mod validator;

// Re-export commonly used types
pub use ast::{ExecutionPattern, PointcutExpr};
pub use descriptor::{CallSiteDescriptor, CallSiteDescriptorBuilder};
pub use matcher::{matches, try_matches, MatchError, NamedPointcuts, NoNamedPointcuts};
pub use parser::{parse_pointcut, parse_type_pattern, PointcutParseError, MAX_NESTING};
pub use pattern::{NamePattern, ParamPattern, Segment, TypePattern};
pub use validator::{validate_named_pointcuts, ReferenceError};
