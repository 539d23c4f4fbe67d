//! aspect-weaver: declarative cross-cutting interception
//!
//! Register advice against pointcut expressions once at startup, then route
//! calls through [`Weaver::intercept`]:
//!
//! ```ignore
//! let mut builder = RegistryBuilder::new();
//! builder.define_named_pointcut("paymentValidation", "@annotation(PaymentCheck)")?;
//! builder.before("validate", "paymentValidation()", |jp| {
//!     tracing::info!(signature = %jp.signature(), "validating");
//!     Ok(())
//! })?;
//! let weaver = Weaver::new(Arc::new(builder.build()?));
//!
//! let descriptor = CallSiteDescriptor::builder("payments.PaymentService", "processPayment")
//!     .method_annotation("PaymentCheck")
//!     .build();
//! let outcome = weaver.intercept(&descriptor, |_args| Ok(json!("done")));
//! ```
//!
//! Pointcut parsing and matching live in the `pointcut-core` crate and are
//! re-exported here.

pub mod advice;
pub mod chain;
pub mod config;
pub mod error;
pub mod events;
pub mod payment;
pub mod registry;
pub mod weaver;

pub use pointcut_core::{
    parse_pointcut, CallSiteDescriptor, CallSiteDescriptorBuilder, PointcutExpr,
    PointcutParseError,
};

pub use advice::{Advice, AdviceDescriptor, AdviceId, AdviceKind, DEFAULT_ORDER};
pub use chain::AdviceChain;
pub use config::{AspectConfig, ConfigLoader, HandlerCatalog};
pub use error::{AdviceUsageError, Fault, Outcome, RegistrationError, Value, WeaveError};
pub use events::{EventPayload, EventSink, NullSink, RecordingSink, TracingSink, WeaveEvent};
pub use registry::{Registry, RegistryBuilder};
pub use weaver::{CallState, JoinPoint, ProceedingJoinPoint, Weaver};
