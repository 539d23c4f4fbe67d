//! Error types for the weaving engine
//!
//! Two families:
//! - Registration errors ([`RegistrationError`]) are fatal at startup and
//!   never surface at call time.
//! - Call errors ([`WeaveError`]) travel inside an [`Outcome`] through every
//!   layer of a woven call; nothing unwinds.

use pointcut_core::{PointcutParseError, ReferenceError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::advice::AdviceKind;

/// Opaque argument / return value
pub type Value = serde_json::Value;

/// Result of running a target or any layer around it
pub type Outcome = Result<Value, WeaveError>;

/// Failure raised by a target operation or an advice body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{kind}: {message}")]
pub struct Fault {
    /// Failure category, e.g. `IllegalArgument`
    pub kind: String,
    pub message: String,
}

impl Fault {
    pub const CANCELLED: &'static str = "Cancelled";

    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Cancellation raised by the target; propagates like any other fault
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(Self::CANCELLED, message)
    }

    pub fn is_kind(&self, kind: &str) -> bool {
        self.kind == kind
    }
}

/// Contract violation by an Around advice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum AdviceUsageError {
    #[error("advice '{advice}' called proceed more than once")]
    ProceedCalledTwice { advice: String },
}

/// Error carried by a woven call's [`Outcome`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum WeaveError {
    #[error(transparent)]
    Target(#[from] Fault),

    #[error(transparent)]
    Usage(#[from] AdviceUsageError),
}

impl WeaveError {
    /// Shorthand for `WeaveError::Target(Fault::new(kind, message))`
    pub fn fault(kind: impl Into<String>, message: impl Into<String>) -> Self {
        WeaveError::Target(Fault::new(kind, message))
    }

    pub fn is_usage(&self) -> bool {
        matches!(self, WeaveError::Usage(_))
    }

    pub fn as_fault(&self) -> Option<&Fault> {
        match self {
            WeaveError::Target(fault) => Some(fault),
            WeaveError::Usage(_) => None,
        }
    }

    /// Check the fault kind (usage errors never match)
    pub fn is_kind(&self, kind: &str) -> bool {
        self.as_fault().map(|f| f.is_kind(kind)).unwrap_or(false)
    }
}

/// Startup-time registration failure
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistrationError {
    #[error("invalid pointcut for {context}: {source}")]
    Syntax {
        context: String,
        #[source]
        source: PointcutParseError,
    },

    #[error("named pointcut '{0}' is already defined")]
    DuplicateNamedPointcut(String),

    #[error("unresolved pointcut reference '{id}' (from {referenced_from})")]
    UnresolvedReference { id: String, referenced_from: String },

    #[error("cyclic pointcut reference: {}", path.join(" -> "))]
    CyclicReference { path: Vec<String> },

    #[error("unknown advice handler '{0}'")]
    UnknownHandler(String),

    #[error("handler '{handler}' is {actual} advice, configured as {expected}")]
    KindMismatch {
        handler: String,
        expected: AdviceKind,
        actual: AdviceKind,
    },
}

impl From<ReferenceError> for RegistrationError {
    fn from(error: ReferenceError) -> Self {
        match error {
            ReferenceError::Unresolved { id, referenced_from } => {
                RegistrationError::UnresolvedReference { id, referenced_from }
            }
            ReferenceError::Cycle { path } => RegistrationError::CyclicReference { path },
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
