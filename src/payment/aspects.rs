//! Demo aspects: logging, transaction, payment validation
//!
//! Each handler logs through `tracing` and appends a line to an
//! [`AuditTrail`] so callers can see what ran, and in which order.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use tracing::{error, info, warn};

use super::decode_request;
use crate::advice::Advice;
use crate::config::HandlerCatalog;
use crate::weaver::JoinPoint;

/// Handler names as referenced from configuration
pub mod handlers {
    pub const LOGGING_ENTRY: &str = "logging.entry";
    pub const LOGGING_EXIT: &str = "logging.exit";
    pub const TRANSACTION: &str = "transaction.manage";
    pub const PAYMENT_BEFORE: &str = "payment.before";
    pub const PAYMENT_AFTER: &str = "payment.after";
    pub const PAYMENT_AFTER_RETURNING: &str = "payment.after_returning";
    pub const PAYMENT_AFTER_THROWING: &str = "payment.after_throwing";
    pub const PAYMENT_AROUND: &str = "payment.around";
}

/// Shared, append-only record of aspect activity
#[derive(Debug, Clone, Default)]
pub struct AuditTrail {
    entries: Arc<Mutex<Vec<String>>>,
}

impl AuditTrail {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.lock().clone()
    }

    /// Index of the first entry starting with `prefix`
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.lock().iter().position(|e| e.starts_with(prefix))
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

/// `isPaymentValid` / `isPaymentDone` of the first argument, if it is a request
fn request_flags(jp: &JoinPoint<'_>) -> Option<(bool, bool)> {
    decode_request(&jp.arguments())
        .ok()
        .map(|r| (r.payment_valid, r.payment_done))
}

// ============================================================================
// Logging aspect
// ============================================================================

pub fn logging_entry(trail: &AuditTrail) -> Advice {
    let trail = trail.clone();
    Advice::before(move |jp| {
        info!("Entering: {}", jp.signature());
        trail.record(format!("logging: entering {}", jp.signature()));
        Ok(())
    })
}

pub fn logging_exit(trail: &AuditTrail) -> Advice {
    let trail = trail.clone();
    Advice::after(move |jp| {
        info!("Exiting: {}", jp.signature());
        trail.record(format!("logging: exiting {}", jp.signature()));
        Ok(())
    })
}

// ============================================================================
// Transaction aspect
// ============================================================================

/// Around advice: start, then commit on success or roll back and rethrow
pub fn transaction(trail: &AuditTrail) -> Advice {
    let trail = trail.clone();
    Advice::around(move |pjp| {
        let signature = pjp.signature();
        info!("Transaction start: {}", signature);
        info!(
            "Entering: {}.{}() with arguments: {:?}",
            pjp.descriptor().target_runtime_type_name(),
            pjp.descriptor().method_name(),
            pjp.arguments()
        );
        trail.record(format!("transaction: start {}", signature));

        match pjp.proceed() {
            Ok(value) => {
                info!("Transaction commit: {}", signature);
                trail.record(format!("transaction: commit {}", signature));
                Ok(value)
            }
            Err(e) => {
                error!("Transaction rollback: {}", e);
                trail.record(format!("transaction: rollback {}", e));
                Err(e)
            }
        }
    })
}

// ============================================================================
// Payment validation aspect
// ============================================================================

pub fn validation_before(trail: &AuditTrail) -> Advice {
    let trail = trail.clone();
    Advice::before(move |jp| {
        let (valid, done) = request_flags(jp).unwrap_or_default();
        info!(
            "[Custom - Before] {} - isPaymentValid:{} - isPaymentDone:{}",
            jp.signature(),
            valid,
            done
        );
        trail.record(format!("payment.before: valid={} done={}", valid, done));
        Ok(())
    })
}

pub fn validation_after(trail: &AuditTrail) -> Advice {
    let trail = trail.clone();
    Advice::after(move |jp| {
        let done = request_flags(jp).map(|(_, done)| done).unwrap_or_default();
        info!("[Custom - After] {} - isPaymentDone:{}", jp.signature(), done);
        trail.record(format!("payment.after: {} done={}", jp.signature(), done));
        Ok(())
    })
}

pub fn validation_after_returning(trail: &AuditTrail) -> Advice {
    let trail = trail.clone();
    Advice::after_returning(move |jp, result| {
        info!("[Custom - AfterReturning] {} returned: {}", jp.signature(), result);
        let shown = result.as_str().map(str::to_owned).unwrap_or_else(|| result.to_string());
        trail.record(format!("payment.after_returning: {}", shown));
        Ok(())
    })
}

pub fn validation_after_throwing(trail: &AuditTrail) -> Advice {
    let trail = trail.clone();
    Advice::after_throwing(move |jp, e| {
        error!("[Custom - AfterThrowing] {} threw: {}", jp.signature(), e);
        trail.record(format!("payment.after_throwing: {}", e));
        Ok(())
    })
}

/// Around advice timing the rest of the chain
pub fn validation_around(trail: &AuditTrail) -> Advice {
    let trail = trail.clone();
    Advice::around(move |pjp| {
        let start = Instant::now();
        let signature = pjp.signature();
        let done = request_flags(&pjp.join_point())
            .map(|(_, done)| done.to_string())
            .unwrap_or_else(|| "N/A".to_string());

        info!("[Custom - Around] Entering {} - isPaymentDone:{}", signature, done);
        trail.record(format!("payment.around: entering {}", signature));

        let outcome = pjp.proceed();
        match &outcome {
            Ok(_) => {
                info!("[Custom - Around] Exiting {}", signature);
                trail.record(format!("payment.around: exiting {}", signature));
            }
            Err(_) => {
                warn!("[Custom - Around] Exception in {}", signature);
                trail.record(format!("payment.around: exception in {}", signature));
            }
        }

        info!(
            "[Custom - Around] {} executed in {} us",
            signature,
            start.elapsed().as_micros()
        );
        outcome
    })
}

/// Every demo handler under its configuration name
pub fn default_catalog(trail: &AuditTrail) -> HandlerCatalog {
    HandlerCatalog::new()
        .with(handlers::LOGGING_ENTRY, logging_entry(trail))
        .with(handlers::LOGGING_EXIT, logging_exit(trail))
        .with(handlers::TRANSACTION, transaction(trail))
        .with(handlers::PAYMENT_BEFORE, validation_before(trail))
        .with(handlers::PAYMENT_AFTER, validation_after(trail))
        .with(handlers::PAYMENT_AFTER_RETURNING, validation_after_returning(trail))
        .with(handlers::PAYMENT_AFTER_THROWING, validation_after_throwing(trail))
        .with(handlers::PAYMENT_AROUND, validation_around(trail))
}
