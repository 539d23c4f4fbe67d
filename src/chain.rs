//! Chain builder
//!
//! Partitions resolved advice into one ordered list per kind, with each
//! handler already downcast to its trait. The weaver composes the lists:
//!
//! ```text
//! around[0] ( around[1] ( ... ( before*, target ) ... ) )
//!     then after*, then after_returning* | after_throwing*
//! ```

use crate::advice::{
    Advice, AdviceDescriptor, AdviceKind, AfterAdvice, AfterReturningAdvice, AfterThrowingAdvice,
    AroundAdvice, BeforeAdvice,
};

/// A resolved advice together with its typed handler
pub struct Bound<'r, H: ?Sized> {
    pub descriptor: &'r AdviceDescriptor,
    pub handler: &'r H,
}

impl<'r, H: ?Sized> Bound<'r, H> {
    pub fn name(&self) -> &'r str {
        &self.descriptor.name
    }
}

/// Per-call advice chain, each list in resolved order
#[derive(Default)]
pub struct AdviceChain<'r> {
    pub around: Vec<Bound<'r, dyn AroundAdvice>>,
    pub before: Vec<Bound<'r, dyn BeforeAdvice>>,
    pub after: Vec<Bound<'r, dyn AfterAdvice>>,
    pub after_returning: Vec<Bound<'r, dyn AfterReturningAdvice>>,
    pub after_throwing: Vec<Bound<'r, dyn AfterThrowingAdvice>>,
}

impl<'r> AdviceChain<'r> {
    /// Partition `matched` (already in resolved order) by kind
    pub fn build<I>(matched: I) -> Self
    where
        I: IntoIterator<Item = &'r AdviceDescriptor>,
    {
        let mut chain = AdviceChain::default();
        for descriptor in matched {
            match &descriptor.advice {
                Advice::Around(h) => chain.around.push(Bound {
                    descriptor,
                    handler: h.as_ref(),
                }),
                Advice::Before(h) => chain.before.push(Bound {
                    descriptor,
                    handler: h.as_ref(),
                }),
                Advice::After(h) => chain.after.push(Bound {
                    descriptor,
                    handler: h.as_ref(),
                }),
                Advice::AfterReturning(h) => chain.after_returning.push(Bound {
                    descriptor,
                    handler: h.as_ref(),
                }),
                Advice::AfterThrowing(h) => chain.after_throwing.push(Bound {
                    descriptor,
                    handler: h.as_ref(),
                }),
            }
        }
        chain
    }

    pub fn len(&self) -> usize {
        self.around.len()
            + self.before.len()
            + self.after.len()
            + self.after_returning.len()
            + self.after_throwing.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `kind:name` entries in composition order, for diagnostics
    pub fn describe(&self) -> Vec<String> {
        fn entries<H: ?Sized>(kind: AdviceKind, list: &[Bound<'_, H>]) -> Vec<String> {
            list.iter().map(|b| format!("{}:{}", kind, b.name())).collect()
        }

        let mut out = entries(AdviceKind::Around, &self.around);
        out.extend(entries(AdviceKind::Before, &self.before));
        out.extend(entries(AdviceKind::After, &self.after));
        out.extend(entries(AdviceKind::AfterReturning, &self.after_returning));
        out.extend(entries(AdviceKind::AfterThrowing, &self.after_throwing));
        out
    }
}

// =============================================================================
// Tests
// =============================================================================
