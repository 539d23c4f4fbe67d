//! Call-site descriptor
//!
//! Immutable metadata about one call, populated by whatever mechanism the
//! host uses to intercept it (manual wrapping, generated code). The matcher
//! depends only on this plain data, never on reflection.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

use crate::pattern::simple_name;

/// Metadata about one intercepted call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSiteDescriptor {
    declaring_type_name: String,
    method_name: String,
    parameter_types: Vec<String>,
    return_type_name: String,
    method_annotations: BTreeSet<String>,
    type_annotations: BTreeSet<String>,
    target_runtime_type_name: String,
    target_supertypes: Vec<String>,
    proxied_interface_names: BTreeSet<String>,
    arguments: Vec<Value>,
}

impl CallSiteDescriptor {
    /// Start describing a call to `method_name` declared on `declaring_type_name`
    pub fn builder(
        declaring_type_name: impl Into<String>,
        method_name: impl Into<String>,
    ) -> CallSiteDescriptorBuilder {
        CallSiteDescriptorBuilder::new(declaring_type_name, method_name)
    }

    pub fn declaring_type_name(&self) -> &str {
        &self.declaring_type_name
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    pub fn parameter_types(&self) -> &[String] {
        &self.parameter_types
    }

    pub fn return_type_name(&self) -> &str {
        &self.return_type_name
    }

    pub fn method_annotations(&self) -> &BTreeSet<String> {
        &self.method_annotations
    }

    pub fn type_annotations(&self) -> &BTreeSet<String> {
        &self.type_annotations
    }

    /// Concrete type of the receiver (defaults to the declaring type)
    pub fn target_runtime_type_name(&self) -> &str {
        &self.target_runtime_type_name
    }

    /// Supertypes of the receiver, consulted by `target(...)` subtype matches
    pub fn target_supertypes(&self) -> &[String] {
        &self.target_supertypes
    }

    pub fn proxied_interface_names(&self) -> &BTreeSet<String> {
        &self.proxied_interface_names
    }

    /// Argument values - opaque to matching
    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    /// Short form used in events and log lines: `PaymentService.processPayment(..)`
    pub fn short_signature(&self) -> String {
        let args = if self.parameter_types.is_empty() {
            ""
        } else {
            ".."
        };
        format!(
            "{}.{}({})",
            simple_name(&self.declaring_type_name),
            self.method_name,
            args
        )
    }

    /// Long form: `payments.PaymentService.processPayment(payments.PaymentRequest)`
    pub fn long_signature(&self) -> String {
        format!(
            "{}.{}({})",
            self.declaring_type_name,
            self.method_name,
            self.parameter_types.join(", ")
        )
    }
}

/// Builder for [`CallSiteDescriptor`]
#[derive(Debug, Clone)]
pub struct CallSiteDescriptorBuilder {
    inner: CallSiteDescriptor,
    target_set: bool,
}

impl CallSiteDescriptorBuilder {
    pub fn new(declaring_type_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            inner: CallSiteDescriptor {
                declaring_type_name: declaring_type_name.into(),
                method_name: method_name.into(),
                parameter_types: Vec::new(),
                return_type_name: "void".to_string(),
                method_annotations: BTreeSet::new(),
                type_annotations: BTreeSet::new(),
                target_runtime_type_name: String::new(),
                target_supertypes: Vec::new(),
                proxied_interface_names: BTreeSet::new(),
                arguments: Vec::new(),
            },
            target_set: false,
        }
    }

    /// Append a declared parameter type
    pub fn param(mut self, type_name: impl Into<String>) -> Self {
        self.inner.parameter_types.push(type_name.into());
        self
    }

    pub fn returns(mut self, type_name: impl Into<String>) -> Self {
        self.inner.return_type_name = type_name.into();
        self
    }

    pub fn method_annotation(mut self, id: impl Into<String>) -> Self {
        self.inner.method_annotations.insert(id.into());
        self
    }

    pub fn type_annotation(mut self, id: impl Into<String>) -> Self {
        self.inner.type_annotations.insert(id.into());
        self
    }

    pub fn target(mut self, runtime_type_name: impl Into<String>) -> Self {
        self.inner.target_runtime_type_name = runtime_type_name.into();
        self.target_set = true;
        self
    }

    pub fn supertype(mut self, type_name: impl Into<String>) -> Self {
        self.inner.target_supertypes.push(type_name.into());
        self
    }

    pub fn proxied_interface(mut self, type_name: impl Into<String>) -> Self {
        self.inner.proxied_interface_names.insert(type_name.into());
        self
    }

    /// Append a live argument value
    pub fn arg(mut self, value: Value) -> Self {
        self.inner.arguments.push(value);
        self
    }

    pub fn args(mut self, values: impl IntoIterator<Item = Value>) -> Self {
        self.inner.arguments.extend(values);
        self
    }

    pub fn build(mut self) -> CallSiteDescriptor {
        if !self.target_set {
            self.inner.target_runtime_type_name = self.inner.declaring_type_name.clone();
        }
        self.inner
    }
}

// =============================================================================
// Tests
// =============================================================================
