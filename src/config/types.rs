//! Aspect configuration types
//!
//! YAML shape:
//!
//! ```yaml
//! pointcuts:
//!   paymentValidation: "@annotation(PaymentCheck)"
//! aspects:
//!   - name: payment-validation
//!     order: 10
//!     advice:
//!       - kind: before
//!         pointcut: "paymentValidation()"
//!         handler: payment.before
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::advice::AdviceKind;

/// Root of an aspect configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AspectConfig {
    /// Named pointcuts, id -> expression
    #[serde(default)]
    pub pointcuts: BTreeMap<String, String>,

    #[serde(default)]
    pub aspects: Vec<AspectDef>,
}

impl AspectConfig {
    pub fn advice_count(&self) -> usize {
        self.aspects.iter().map(|a| a.advice.len()).sum()
    }
}

/// A named group of advice sharing a default order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AspectDef {
    pub name: String,

    /// Default order for this aspect's advice
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,

    #[serde(default)]
    pub advice: Vec<AdviceDef>,
}

/// One advice binding: kind + pointcut + catalog handler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdviceDef {
    pub kind: AdviceKind,
    pub pointcut: String,
    pub handler: String,

    /// Overrides the aspect's order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
}

impl AdviceDef {
    pub fn effective_order(&self, aspect: &AspectDef) -> Option<i32> {
        self.order.or(aspect.order)
    }
}
