//! Handler catalog
//!
//! Configuration refers to advice bodies by name; the catalog maps those
//! names to the [`Advice`] values the host compiled in.

use std::collections::BTreeMap;

use crate::advice::{Advice, AdviceKind};
use crate::error::RegistrationError;

#[derive(Debug, Clone, Default)]
pub struct HandlerCatalog {
    handlers: BTreeMap<String, Advice>,
}

impl HandlerCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a handler
    pub fn insert(&mut self, name: impl Into<String>, advice: Advice) {
        self.handlers.insert(name.into(), advice);
    }

    pub fn with(mut self, name: impl Into<String>, advice: Advice) -> Self {
        self.insert(name, advice);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Advice> {
        self.handlers.get(name)
    }

    /// Look up `name` and check it has the configured kind
    pub fn resolve(&self, name: &str, kind: AdviceKind) -> Result<Advice, RegistrationError> {
        let advice = self
            .get(name)
            .ok_or_else(|| RegistrationError::UnknownHandler(name.to_string()))?;
        if advice.kind() != kind {
            return Err(RegistrationError::KindMismatch {
                handler: name.to_string(),
                expected: kind,
                actual: advice.kind(),
            });
        }
        Ok(advice.clone())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_checks_kind() {
        let catalog = HandlerCatalog::new()
            .with("log.entry", Advice::before(|_| Ok(())))
            .with("tx", Advice::around(|pjp| pjp.proceed()));

        assert_eq!(
            catalog.resolve("log.entry", AdviceKind::Before).unwrap().kind(),
            AdviceKind::Before
        );
        assert_eq!(
            catalog.resolve("tx", AdviceKind::Before).unwrap_err(),
            RegistrationError::KindMismatch {
                handler: "tx".into(),
                expected: AdviceKind::Before,
                actual: AdviceKind::Around,
            }
        );
        assert_eq!(
            catalog.resolve("nope", AdviceKind::After).unwrap_err(),
            RegistrationError::UnknownHandler("nope".into())
        );
        assert_eq!(catalog.names().collect::<Vec<_>>(), vec!["log.entry", "tx"]);
    }
}
