//! End-to-end payment scenarios

use std::sync::{Arc, Mutex};

use aspect_weaver::config;
use aspect_weaver::payment::{
    self, default_catalog, AuditTrail, PaymentRequest, PaymentService, WovenPaymentService,
    PAYMENT_PROCESSED,
};
use aspect_weaver::{CallSiteDescriptor, Registry, RegistryBuilder, WeaveError, Weaver};
use pretty_assertions::assert_eq;
use serde_json::json;

fn service_registry(trail: &AuditTrail) -> Registry {
    let config = payment::bundled_config().unwrap();
    let mut builder = RegistryBuilder::new();
    config::apply(&config, &default_catalog(trail), &mut builder).unwrap();
    builder.build().unwrap()
}

fn woven(trail: &AuditTrail) -> WovenPaymentService {
    let weaver = Weaver::new(Arc::new(service_registry(trail)));
    WovenPaymentService::new(weaver, Arc::new(PaymentService::new()))
}

type Events = Arc<Mutex<Vec<String>>>;

fn record(events: &Events, entry: impl Into<String>) {
    events.lock().unwrap().push(entry.into());
}

/// Registry for the annotated-method scenarios: Before, an Around that
/// appends `-wrapped`, AfterReturning and AfterThrowing, all on
/// `@annotation(PaymentCheck)`.
fn scenario_registry(events: &Events) -> RegistryBuilder {
    let mut builder = RegistryBuilder::new();
    builder
        .define_named_pointcut("paymentValidation", "@annotation(PaymentCheck)")
        .unwrap();

    let log = events.clone();
    builder
        .before("before", "paymentValidation()", move |_| {
            record(&log, "before");
            Ok(())
        })
        .unwrap();

    let log = events.clone();
    builder
        .around("wrap", "paymentValidation()", move |pjp| {
            record(&log, format!("around entering {}", pjp.signature()));
            match pjp.proceed() {
                Ok(value) => {
                    record(&log, format!("around received {}", value));
                    Ok(json!(format!("{}-wrapped", value.as_str().unwrap_or_default())))
                }
                Err(e) => {
                    record(&log, format!("around saw {}", e));
                    Err(e)
                }
            }
        })
        .unwrap();

    let log = events.clone();
    builder
        .after_returning("returning", "paymentValidation()", move |_, value| {
            record(&log, format!("returning {}", value));
            Ok(())
        })
        .unwrap();

    let log = events.clone();
    builder
        .after_throwing("throwing", "paymentValidation()", move |_, e| {
            let kind = e.as_fault().map(|f| f.kind.clone()).unwrap_or_default();
            record(&log, format!("throwing {}", kind));
            Ok(())
        })
        .unwrap();

    builder
}

// Before runs inside every Around layer, right before the real call.
#[test]
fn annotated_call_is_wrapped_and_observed() {
    let events: Events = Arc::default();
    let weaver = Weaver::new(Arc::new(scenario_registry(&events).build().unwrap()));
    let descriptor = WovenPaymentService::describe_call(&PaymentRequest::new(true, 10)).unwrap();

    let outcome = weaver.intercept(&descriptor, |_| {
        record(&events, "target");
        Ok(json!("ok"))
    });

    assert_eq!(outcome, Ok(json!("ok-wrapped")));
    assert_eq!(
        *events.lock().unwrap(),
        vec![
            "around entering PaymentService.processPayment(..)".to_string(),
            "before".to_string(),
            "target".to_string(),
            "around received \"ok\"".to_string(),
            "returning \"ok-wrapped\"".to_string(),
        ]
    );
}

#[test]
fn annotated_call_failure_is_rethrown_and_observed() {
    let events: Events = Arc::default();
    let weaver = Weaver::new(Arc::new(scenario_registry(&events).build().unwrap()));
    let descriptor = WovenPaymentService::describe_call(&PaymentRequest::new(false, 10)).unwrap();

    let outcome = weaver.intercept(&descriptor, |_| {
        record(&events, "target");
        Err(WeaveError::fault("IllegalArgument", "Payment is not valid"))
    });

    assert!(outcome.unwrap_err().is_kind("IllegalArgument"));
    assert_eq!(
        *events.lock().unwrap(),
        vec![
            "around entering PaymentService.processPayment(..)".to_string(),
            "before".to_string(),
            "target".to_string(),
            "around saw IllegalArgument: Payment is not valid".to_string(),
            "throwing IllegalArgument".to_string(),
        ]
    );
}

#[test]
fn valid_payment_runs_every_aspect_in_order() {
    let trail = AuditTrail::new();
    let service = woven(&trail);

    let mut request = PaymentRequest::new(true, 1500);
    let outcome = service.process_payment(&mut request);
    assert_eq!(outcome, Ok(json!(PAYMENT_PROCESSED)));
    assert_eq!(service.service().processed_count(), 1);
    assert!(request.payment_done);

    let signature = "PaymentService.processPayment(..)";
    assert_eq!(
        trail.entries(),
        vec![
            format!("transaction: start {}", signature),
            format!("payment.around: entering {}", signature),
            "payment.before: valid=true done=false".to_string(),
            format!("logging: entering {}", signature),
            format!("payment.around: exiting {}", signature),
            format!("transaction: commit {}", signature),
            format!("payment.after: {} done=true", signature),
            format!("logging: exiting {}", signature),
            format!("payment.after_returning: {}", PAYMENT_PROCESSED),
        ]
    );
}

#[test]
fn invalid_payment_rolls_back_and_reports() {
    let trail = AuditTrail::new();
    let service = woven(&trail);

    let mut request = PaymentRequest::new(false, 1500);
    let err = service.process_payment(&mut request).unwrap_err();
    assert!(err.is_kind(payment::ILLEGAL_ARGUMENT));
    assert_eq!(service.service().processed_count(), 0);
    assert!(!request.payment_done);
    assert!(trail
        .entries()
        .contains(&"payment.after: PaymentService.processPayment(..) done=false".to_string()));

    let rollback = trail
        .position("transaction: rollback IllegalArgument: Payment is not valid")
        .expect("rollback recorded");
    let thrown = trail
        .position("payment.after_throwing: IllegalArgument: Payment is not valid")
        .expect("after_throwing recorded");
    assert!(rollback < thrown);
    assert!(trail.position("transaction: commit").is_none());
    assert!(trail.position("payment.after_returning").is_none());
    assert!(trail.position("payment.around: exception in").is_some());
}

#[test]
fn after_advice_sees_the_request_updated_by_the_service() {
    let seen: Arc<Mutex<Option<bool>>> = Arc::default();
    let mut builder = RegistryBuilder::new();
    let slot = seen.clone();
    builder
        .after("inspect", "@annotation(PaymentCheck)", move |jp| {
            let request = payment::decode_request(&jp.arguments())?;
            *slot.lock().unwrap() = Some(request.payment_done);
            Ok(())
        })
        .unwrap();
    let service = WovenPaymentService::new(
        Weaver::new(Arc::new(builder.build().unwrap())),
        Arc::new(PaymentService::new()),
    );

    let mut request = PaymentRequest::new(true, 42);
    assert_eq!(service.process_payment(&mut request), Ok(json!(PAYMENT_PROCESSED)));
    assert_eq!(*seen.lock().unwrap(), Some(true));
    assert!(request.payment_done);
}

#[test]
fn unannotated_service_method_gets_only_layer_aspects() {
    let registry = service_registry(&AuditTrail::new());

    // Same service, no @PaymentCheck: logging and transaction only
    let descriptor = CallSiteDescriptor::builder(payment::SERVICE_TYPE, "refund")
        .type_annotation(payment::SERVICE_STEREOTYPE)
        .build();
    let names: Vec<String> = registry
        .resolve(&descriptor)
        .iter()
        .map(|a| a.name.clone())
        .collect();
    assert_eq!(
        names,
        vec![
            "transaction/transaction.manage",
            "logging/logging.entry",
            "logging/logging.exit",
        ]
    );
}
