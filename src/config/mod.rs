//! Declarative aspect configuration
//!
//! Binds catalog handlers to pointcuts from YAML, so the set of aspects
//! woven into a host can change without recompiling the advice bodies.

mod catalog;
mod loader;
mod types;

pub use catalog::HandlerCatalog;
pub use loader::{ConfigLoader, CONFIG_ENV, DEFAULT_CONFIG_PATH};
pub use types::{AdviceDef, AspectConfig, AspectDef};

use tracing::debug;

use crate::error::RegistrationError;
use crate::registry::RegistryBuilder;

/// Register everything `config` declares into `builder`.
///
/// Named pointcuts go first, then each aspect's advice in file order, so
/// declaration order (the final ordering tie-breaker) follows the file.
/// Advice are named `<aspect>/<handler>`.
pub fn apply(
    config: &AspectConfig,
    catalog: &HandlerCatalog,
    builder: &mut RegistryBuilder,
) -> Result<(), RegistrationError> {
    for (id, expression) in &config.pointcuts {
        builder.define_named_pointcut(id.as_str(), expression)?;
    }

    for aspect in &config.aspects {
        for def in &aspect.advice {
            let advice = catalog.resolve(&def.handler, def.kind)?;
            let name = format!("{}/{}", aspect.name, def.handler);
            builder.register_named(name, advice, &def.pointcut, def.effective_order(aspect))?;
        }
        debug!(aspect = %aspect.name, advice = aspect.advice.len(), "applied aspect");
    }

    Ok(())
}
