//! Payment demo
//!
//! A small service woven with three aspects (logging, transaction, payment
//! validation), used by the `aspect_demo` binary and the end-to-end tests.
//! The service is ordinary code; [`WovenPaymentService`] is the manual
//! "proxy" that describes each call and routes it through the weaver.

pub mod aspects;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use pointcut_core::CallSiteDescriptor;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{AspectConfig, ConfigLoader};
use crate::error::{Fault, Value, WeaveError};
use crate::weaver::Weaver;

pub use aspects::{default_catalog, AuditTrail};

pub const SERVICE_TYPE: &str = "payments.service.PaymentService";
pub const REQUEST_TYPE: &str = "payments.dto.PaymentRequest";
pub const PAYMENT_CHECK: &str = "payments.annotation.PaymentCheck";
pub const SERVICE_STEREOTYPE: &str = "org.stereotype.Service";

pub const PAYMENT_PROCESSED: &str = "Payment processed successfully";
pub const ILLEGAL_ARGUMENT: &str = "IllegalArgument";

/// Aspect configuration shipped with the crate
pub const BUNDLED_CONFIG: &str = include_str!("../../config/aspects.yaml");

/// Parse [`BUNDLED_CONFIG`]
pub fn bundled_config() -> anyhow::Result<AspectConfig> {
    ConfigLoader::parse_str(BUNDLED_CONFIG)
}

fn default_currency() -> String {
    "EUR".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub payment_valid: bool,
    #[serde(default)]
    pub payment_done: bool,
    /// Minor units
    #[serde(default)]
    pub amount: u64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl PaymentRequest {
    pub fn new(payment_valid: bool, amount: u64) -> Self {
        Self {
            payment_valid,
            payment_done: false,
            amount,
            currency: default_currency(),
        }
    }
}

/// The undecorated business service
#[derive(Debug, Default)]
pub struct PaymentService {
    processed: AtomicU64,
}

impl PaymentService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process_payment(&self, request: &mut PaymentRequest) -> Result<String, Fault> {
        if !request.payment_valid {
            return Err(Fault::new(ILLEGAL_ARGUMENT, "Payment is not valid"));
        }
        request.payment_done = true;
        self.processed.fetch_add(1, Ordering::Relaxed);
        info!(amount = request.amount, currency = %request.currency, "payment processed");
        Ok(PAYMENT_PROCESSED.to_string())
    }

    /// Number of payments the target actually processed
    pub fn processed_count(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }
}

/// [`PaymentService`] with every call routed through a [`Weaver`]
#[derive(Debug, Clone)]
pub struct WovenPaymentService {
    weaver: Weaver,
    service: Arc<PaymentService>,
}

impl WovenPaymentService {
    pub fn new(weaver: Weaver, service: Arc<PaymentService>) -> Self {
        Self { weaver, service }
    }

    pub fn service(&self) -> &Arc<PaymentService> {
        &self.service
    }

    /// Call-site metadata for `processPayment(request)`
    pub fn describe_call(request: &PaymentRequest) -> Result<CallSiteDescriptor, WeaveError> {
        Ok(CallSiteDescriptor::builder(SERVICE_TYPE, "processPayment")
            .param(REQUEST_TYPE)
            .returns("String")
            .method_annotation(PAYMENT_CHECK)
            .type_annotation(SERVICE_STEREOTYPE)
            .arg(encode_request(request)?)
            .build())
    }

    /// Process `request` through the weaver.
    ///
    /// The service updates the request in place (`paymentDone`); after-family
    /// advice see the updated request and so does the caller.
    pub fn process_payment(&self, request: &mut PaymentRequest) -> Result<Value, WeaveError> {
        let descriptor = Self::describe_call(request)?;
        let mut arguments = descriptor.arguments().to_vec();

        let outcome = self.weaver.intercept_mut(&descriptor, &mut arguments, |live| {
            let mut current = decode_request(live)?;
            let result = self.service.process_payment(&mut current);
            if let Some(first) = live.first_mut() {
                *first = encode_request(&current)?;
            }
            Ok(Value::String(result?))
        });

        if let Ok(updated) = decode_request(&arguments) {
            *request = updated;
        }
        outcome
    }
}

fn encode_request(request: &PaymentRequest) -> Result<Value, Fault> {
    serde_json::to_value(request).map_err(|e| Fault::new(ILLEGAL_ARGUMENT, e.to_string()))
}

/// First argument as a [`PaymentRequest`]
pub fn decode_request(args: &[Value]) -> Result<PaymentRequest, Fault> {
    let first = args
        .first()
        .cloned()
        .ok_or_else(|| Fault::new(ILLEGAL_ARGUMENT, "missing payment request argument"))?;
    serde_json::from_value(first).map_err(|e| Fault::new(ILLEGAL_ARGUMENT, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryBuilder;
    use serde_json::json;

    #[test]
    fn test_service_rejects_invalid_payment() {
        let service = PaymentService::new();
        let mut request = PaymentRequest::new(false, 100);
        let err = service.process_payment(&mut request).unwrap_err();
        assert_eq!(err, Fault::new(ILLEGAL_ARGUMENT, "Payment is not valid"));
        assert!(!request.payment_done);
        assert_eq!(service.processed_count(), 0);
    }

    #[test]
    fn test_service_marks_payment_done() {
        let service = PaymentService::new();
        let mut request = PaymentRequest::new(true, 100);
        assert_eq!(service.process_payment(&mut request).unwrap(), PAYMENT_PROCESSED);
        assert!(request.payment_done);
    }

    #[test]
    fn test_request_json_shape() {
        let request: PaymentRequest =
            serde_json::from_value(json!({"paymentValid": true, "amount": 250})).unwrap();
        assert_eq!(request, PaymentRequest::new(true, 250));
    }

    #[test]
    fn test_describe_call_carries_annotations() {
        let d = WovenPaymentService::describe_call(&PaymentRequest::new(true, 1)).unwrap();
        assert_eq!(d.short_signature(), "PaymentService.processPayment(..)");
        assert!(d.method_annotations().contains(PAYMENT_CHECK));
        assert!(d.type_annotations().contains(SERVICE_STEREOTYPE));
        assert_eq!(d.arguments()[0]["paymentValid"], true);
    }

    #[test]
    fn test_unwoven_call_goes_straight_to_target() {
        let registry = RegistryBuilder::new().build().unwrap();
        let woven = WovenPaymentService::new(
            Weaver::new(Arc::new(registry)),
            Arc::new(PaymentService::new()),
        );
        let mut request = PaymentRequest::new(true, 5);
        assert_eq!(woven.process_payment(&mut request), Ok(json!(PAYMENT_PROCESSED)));
        assert_eq!(woven.service().processed_count(), 1);
        assert!(request.payment_done);
    }

    #[test]
    fn test_bundled_config_parses() {
        let config = bundled_config().unwrap();
        assert_eq!(config.aspects.len(), 3);
        assert!(config.pointcuts.contains_key("paymentValidation"));
    }
}
