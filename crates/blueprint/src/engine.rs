//! Engine facade
//!
//! [`Engine`] ties a [`Resolver`] to an operator registry and is the normal
//! entry point: build one, optionally register custom operators, then call
//! [`Engine::evaluate`] as often as needed. The free [`evaluate`] function
//! runs against a lazily created shared engine with the standard catalog.

use std::sync::Arc;

use once_cell::sync::Lazy;
use serde_json::Value;
use tracing::trace;

use crate::error::EvalResult;
use crate::operators::{Operator, OperatorRegistry};
use crate::resolve::Resolver;

/// Evaluates blueprints against source records.
///
/// The registry is fixed once the engine is in use; evaluation itself needs
/// only `&self`, so one engine can serve many threads.
pub struct Engine {
    resolver: Resolver,
}

impl Engine {
    /// Engine with the standard operator catalog
    pub fn new() -> Self {
        Self::with_registry(Arc::new(OperatorRegistry::new()))
    }

    /// Engine over a prepared registry, for custom or trimmed catalogs
    pub fn with_registry(registry: Arc<OperatorRegistry>) -> Self {
        Self {
            resolver: Resolver::new(registry),
        }
    }

    /// Register an additional operator.
    ///
    /// # Panics
    ///
    /// Panics if the registry is still shared elsewhere; register operators
    /// before handing out clones of the registry `Arc`.
    pub fn register_operator(&mut self, name: impl Into<String>, operator: Operator) {
        self.resolver.register_operator(name, operator);
    }

    pub fn registry(&self) -> &OperatorRegistry {
        self.resolver.registry()
    }

    /// The underlying resolver, for direct operator calls and partial
    /// resolution
    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Evaluate a blueprint against a source record.
    ///
    /// The result has the blueprint's shape with every path reference and
    /// operator expression replaced by its value. Failed expressions become
    /// null; the only error this returns is the recursion limit on
    /// pathologically nested input.
    pub fn evaluate(&self, source: &Value, blueprint: &Value) -> EvalResult<Value> {
        trace!("evaluating blueprint");
        self.resolver.resolve_args(source, blueprint, None)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

static SHARED_ENGINE: Lazy<Engine> = Lazy::new(Engine::new);

/// Evaluate with a shared default engine.
///
/// Convenient for one-off calls; build an [`Engine`] to register custom
/// operators.
pub fn evaluate(source: &Value, blueprint: &Value) -> EvalResult<Value> {
    SHARED_ENGINE.evaluate(source, blueprint)
}
