//! Expression resolution
//!
//! Three mutually recursive entry points share the work of turning a
//! blueprint fragment into a result value:
//!
//! - [`Resolver::resolve_value`] handles literals, path references, and
//!   plain containers. It deliberately does not recognize operator
//!   expressions.
//! - [`Resolver::resolve_args`] is the superset used for operator arguments
//!   and whole blueprints: containers are searched recursively and operator
//!   expressions are dispatched.
//! - [`Resolver::resolve_expression`] evaluates one operator expression.
//!   Every failure inside it, from unknown operators to operator errors,
//!   is logged and flattened to null, which is what makes top-level
//!   evaluation total.
//!
//! Operators receive a [`Scope`] tying the resolver, the source record, the
//! execution context, and the current depth together; lazy operators
//! re-enter resolution through it. Recursion is bounded by
//! [`MAX_RECURSION_DEPTH`] so pathologically nested input fails with a typed
//! error instead of exhausting the stack.

#[cfg(feature = "regex")]
use std::collections::HashMap;
use std::sync::Arc;

#[cfg(feature = "regex")]
use parking_lot::Mutex;
#[cfg(feature = "regex")]
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::context::{ExecutionContext, augment};
use crate::error::{EvalError, EvalResult};
use crate::operators::{Operator, OperatorRegistry};
use crate::path::resolve_path;

/// Maximum nesting depth for blueprint resolution.
///
/// Blueprints are finite trees and every recursive step descends into a
/// structural child, so this bounds stack use rather than guaranteeing
/// termination.
pub const MAX_RECURSION_DEPTH: usize = 256;

#[cfg(feature = "regex")]
const MAX_REGEX_PATTERN_LEN: usize = 1000;
#[cfg(feature = "regex")]
const MAX_REGEX_CACHE_SIZE: usize = 100;

fn check_depth(depth: usize) -> EvalResult<()> {
    if depth > MAX_RECURSION_DEPTH {
        return Err(EvalError::recursion_limit(MAX_RECURSION_DEPTH));
    }
    Ok(())
}

/// Resolves blueprint fragments against a source record.
///
/// Holds the operator registry and the shared regex cache; all per-call
/// state lives on the stack, so one resolver serves any number of
/// concurrent evaluations.
pub struct Resolver {
    registry: Arc<OperatorRegistry>,
    #[cfg(feature = "regex")]
    regex_cache: Mutex<HashMap<String, Regex>>,
}

impl Resolver {
    pub fn new(registry: Arc<OperatorRegistry>) -> Self {
        Self {
            registry,
            #[cfg(feature = "regex")]
            regex_cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &OperatorRegistry {
        &self.registry
    }

    /// Register an additional operator.
    ///
    /// # Panics
    ///
    /// Panics if the registry `Arc` has been cloned out and is still held
    /// elsewhere; register operators before sharing it.
    pub fn register_operator(&mut self, name: impl Into<String>, operator: Operator) {
        let registry = Arc::get_mut(&mut self.registry)
            .expect("operator registration requires exclusive access to the registry");
        registry.register(name, operator);
    }

    /// Resolve literals, path references, and plain containers.
    ///
    /// Operator expressions are not recognized here; a single-key operator
    /// object is copied through like any other object.
    pub fn resolve_value(
        &self,
        source: &Value,
        fragment: &Value,
        ctx: Option<&ExecutionContext>,
    ) -> EvalResult<Value> {
        self.resolve_value_at(source, fragment, ctx, 0)
    }

    /// Resolve a fragment, dispatching any operator expressions found in it.
    ///
    /// This is the entry point the engine uses for whole blueprints.
    pub fn resolve_args(
        &self,
        source: &Value,
        fragment: &Value,
        ctx: Option<&ExecutionContext>,
    ) -> EvalResult<Value> {
        self.resolve_args_at(source, fragment, ctx, 0)
    }

    /// Like [`resolve_args`](Self::resolve_args) but operator expressions
    /// pass through verbatim while paths and literals still resolve.
    pub fn resolve_args_shallow(
        &self,
        source: &Value,
        fragment: &Value,
        ctx: Option<&ExecutionContext>,
    ) -> EvalResult<Value> {
        self.resolve_shallow_at(source, fragment, ctx, 0)
    }

    /// Evaluate one operator expression, flattening every failure to null.
    pub fn resolve_expression(
        &self,
        source: &Value,
        expression: &Value,
        ctx: Option<&ExecutionContext>,
    ) -> EvalResult<Value> {
        self.resolve_expression_at(source, expression, ctx, 0)
    }

    /// Invoke a registered operator directly, without the error-to-null
    /// flattening of [`resolve_expression`](Self::resolve_expression).
    ///
    /// This is the surface where typed operator errors are observable.
    pub fn call_operator(
        &self,
        source: &Value,
        name: &str,
        payload: &Value,
        ctx: Option<&ExecutionContext>,
    ) -> EvalResult<Value> {
        let Some(operator) = self.registry.get(name) else {
            return Err(EvalError::unknown_operator(name));
        };
        self.dispatch_at(source, name, operator, payload, ctx, 0)
    }

    fn resolve_value_at(
        &self,
        source: &Value,
        fragment: &Value,
        ctx: Option<&ExecutionContext>,
        depth: usize,
    ) -> EvalResult<Value> {
        check_depth(depth)?;
        match fragment {
            Value::String(text) => Ok(self.lookup_string(source, text, ctx)),
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.resolve_value_at(source, item, ctx, depth + 1)?);
                }
                Ok(Value::Array(out))
            }
            Value::Object(fields) => {
                let mut out = Map::new();
                for (key, value) in fields {
                    out.insert(key.clone(), self.resolve_value_at(source, value, ctx, depth + 1)?);
                }
                Ok(Value::Object(out))
            }
            other => Ok(other.clone()),
        }
    }

    fn resolve_args_at(
        &self,
        source: &Value,
        fragment: &Value,
        ctx: Option<&ExecutionContext>,
        depth: usize,
    ) -> EvalResult<Value> {
        check_depth(depth)?;
        match fragment {
            Value::Object(fields) => {
                if self.expression_key(fields).is_some() {
                    return self.resolve_expression_at(source, fragment, ctx, depth + 1);
                }
                let mut out = Map::new();
                for (key, value) in fields {
                    out.insert(key.clone(), self.resolve_args_at(source, value, ctx, depth + 1)?);
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.resolve_args_at(source, item, ctx, depth + 1)?);
                }
                Ok(Value::Array(out))
            }
            other => self.resolve_value_at(source, other, ctx, depth),
        }
    }

    fn resolve_shallow_at(
        &self,
        source: &Value,
        fragment: &Value,
        ctx: Option<&ExecutionContext>,
        depth: usize,
    ) -> EvalResult<Value> {
        check_depth(depth)?;
        match fragment {
            Value::Object(fields) => {
                if self.expression_key(fields).is_some() {
                    return Ok(fragment.clone());
                }
                let mut out = Map::new();
                for (key, value) in fields {
                    out.insert(
                        key.clone(),
                        self.resolve_shallow_at(source, value, ctx, depth + 1)?,
                    );
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.resolve_shallow_at(source, item, ctx, depth + 1)?);
                }
                Ok(Value::Array(out))
            }
            other => self.resolve_value_at(source, other, ctx, depth),
        }
    }

    fn resolve_expression_at(
        &self,
        source: &Value,
        expression: &Value,
        ctx: Option<&ExecutionContext>,
        depth: usize,
    ) -> EvalResult<Value> {
        match self.eval_expression_at(source, expression, ctx, depth) {
            Ok(value) => Ok(value),
            Err(err) => {
                debug!(error = %err, "expression failed, yielding null");
                Ok(Value::Null)
            }
        }
    }

    fn eval_expression_at(
        &self,
        source: &Value,
        expression: &Value,
        ctx: Option<&ExecutionContext>,
        depth: usize,
    ) -> EvalResult<Value> {
        check_depth(depth)?;
        let fields = match expression {
            Value::Object(fields) => fields,
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.resolve_args_at(source, item, ctx, depth + 1)?);
                }
                return Ok(Value::Array(out));
            }
            other => return Ok(other.clone()),
        };

        let mut entries = fields.iter();
        let Some((name, payload)) = entries.next() else {
            return Err(EvalError::malformed("expression object is empty"));
        };
        if entries.next().is_some() {
            return Err(EvalError::malformed(
                "expression objects must have exactly one operator key",
            ));
        }
        let Some(operator) = self.registry.get(name) else {
            return Err(EvalError::unknown_operator(name));
        };
        self.dispatch_at(source, name, operator, payload, ctx, depth)
    }

    fn dispatch_at(
        &self,
        source: &Value,
        name: &str,
        operator: Operator,
        payload: &Value,
        ctx: Option<&ExecutionContext>,
        depth: usize,
    ) -> EvalResult<Value> {
        trace!(operator = name, depth, "dispatching operator");
        let scope = Scope {
            resolver: self,
            source,
            ctx,
            depth,
        };
        match operator {
            Operator::Eager(func) => {
                let resolved = self.resolve_args_at(source, payload, ctx, depth + 1)?;
                func(&scope, &resolved)
            }
            Operator::Lazy(func) => func(&scope, payload),
        }
    }

    fn lookup_string(&self, source: &Value, text: &str, ctx: Option<&ExecutionContext>) -> Value {
        if self.is_path_reference(text) {
            let record = augment(source, ctx);
            resolve_path(&record, text).unwrap_or(Value::Null)
        } else {
            Value::String(text.to_string())
        }
    }

    /// A `$`-prefixed string is a path unless it names a registered operator
    fn is_path_reference(&self, text: &str) -> bool {
        text.starts_with('$') && !self.registry.has(text)
    }

    fn expression_key<'f>(&self, fields: &'f Map<String, Value>) -> Option<&'f str> {
        if fields.len() != 1 {
            return None;
        }
        let key = fields.keys().next()?;
        self.registry.has(key).then_some(key.as_str())
    }

    /// Compile a pattern through the bounded cache.
    ///
    /// `Regex` handles are cheap to clone, so hits hand out clones of the
    /// cached compilation. Eviction is arbitrary; the cache only bounds
    /// memory.
    #[cfg(feature = "regex")]
    pub(crate) fn compile_regex(&self, pattern: &str) -> EvalResult<Regex> {
        if pattern.len() > MAX_REGEX_PATTERN_LEN {
            return Err(EvalError::regex(format!(
                "pattern exceeds maximum length of {MAX_REGEX_PATTERN_LEN} characters"
            )));
        }
        let mut cache = self.regex_cache.lock();
        if let Some(regex) = cache.get(pattern) {
            return Ok(regex.clone());
        }
        let regex = Regex::new(pattern)?;
        if cache.len() >= MAX_REGEX_CACHE_SIZE {
            if let Some(evicted) = cache.keys().next().cloned() {
                cache.remove(&evicted);
            }
        }
        cache.insert(pattern.to_string(), regex.clone());
        Ok(regex)
    }

    #[cfg(all(test, feature = "regex"))]
    fn regex_cache_len(&self) -> usize {
        self.regex_cache.lock().len()
    }
}

/// What an operator sees when it runs: the resolver, the source record, the
/// execution context it was dispatched under, and the current depth.
///
/// Lazy operators resolve their payload fragments through [`Scope::resolve`]
/// (caller's record and context) or [`Scope::resolve_in`] (a different
/// record or a per-element context).
pub struct Scope<'a> {
    resolver: &'a Resolver,
    source: &'a Value,
    ctx: Option<&'a ExecutionContext>,
    depth: usize,
}

impl<'a> Scope<'a> {
    /// The source record the current evaluation runs against
    pub fn source(&self) -> &'a Value {
        self.source
    }

    /// The execution context this operator was dispatched under
    pub fn context(&self) -> Option<&'a ExecutionContext> {
        self.ctx
    }

    /// Resolve a fragment with the caller's record and context
    pub fn resolve(&self, fragment: &Value) -> EvalResult<Value> {
        self.resolver
            .resolve_args_at(self.source, fragment, self.ctx, self.depth + 1)
    }

    /// Resolve a fragment against a different record and context
    pub fn resolve_in(
        &self,
        source: &Value,
        fragment: &Value,
        ctx: Option<&ExecutionContext>,
    ) -> EvalResult<Value> {
        self.resolver
            .resolve_args_at(source, fragment, ctx, self.depth + 1)
    }

    #[cfg(feature = "regex")]
    pub fn compile_regex(&self, pattern: &str) -> EvalResult<Regex> {
        self.resolver.compile_regex(pattern)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn resolver() -> Resolver {
        Resolver::new(Arc::new(OperatorRegistry::new()))
    }

    fn nested_array(depth: usize) -> Value {
        (0..depth).fold(json!(1), |inner, _| json!([inner]))
    }

    #[test]
    fn test_resolve_value_literals() {
        let r = resolver();
        let source = json!({});
        for literal in [json!(null), json!(true), json!(42), json!(2.5), json!("plain")] {
            assert_eq!(r.resolve_value(&source, &literal, None).unwrap(), literal);
        }
    }

    #[test]
    fn test_resolve_value_paths() {
        let r = resolver();
        let source = json!({"user": {"name": "Ada"}, "tags": ["a", "b"]});
        assert_eq!(
            r.resolve_value(&source, &json!("$user.name"), None).unwrap(),
            json!("Ada")
        );
        assert_eq!(
            r.resolve_value(&source, &json!("$tags.1"), None).unwrap(),
            json!("b")
        );
        assert_eq!(
            r.resolve_value(&source, &json!("$missing.deep"), None).unwrap(),
            json!(null)
        );
    }

    #[test]
    fn test_resolve_value_does_not_evaluate_expressions() {
        let r = resolver();
        let fragment = json!({"$add": [1, 2]});
        assert_eq!(
            r.resolve_value(&json!({}), &fragment, None).unwrap(),
            fragment
        );
    }

    #[test]
    fn test_operator_name_is_not_a_path() {
        let r = resolver();
        let source = json!({"eq": {"x": 5}, "$add": "shadowed"});
        // "$eq" names an operator, so it stays a literal string
        assert_eq!(r.resolve_value(&source, &json!("$eq"), None).unwrap(), json!("$eq"));
        // "$eq.x" is not a registered name, so it is a path into field "eq"
        assert_eq!(r.resolve_value(&source, &json!("$eq.x"), None).unwrap(), json!(5));
    }

    #[test]
    fn test_resolve_args_evaluates_expressions() {
        let r = resolver();
        let source = json!({"a": 10});
        assert_eq!(
            r.resolve_args(&source, &json!({"$add": ["$a", 5]}), None).unwrap(),
            json!(15)
        );
        let blueprint = json!({"out": {"$multiply": [2, 3]}, "copy": "$a"});
        assert_eq!(
            r.resolve_args(&source, &blueprint, None).unwrap(),
            json!({"out": 6, "copy": 10})
        );
    }

    #[test]
    fn test_resolve_args_resolves_paths_inside_arrays() {
        let r = resolver();
        let source = json!({"a": 1});
        assert_eq!(
            r.resolve_args(&source, &json!(["$a", "$missing", 2]), None).unwrap(),
            json!([1, null, 2])
        );
    }

    #[test]
    fn test_unregistered_single_key_object_is_preserved() {
        let r = resolver();
        let source = json!({"a": 1});
        let fragment = json!({"$customOp": "$a"});
        assert_eq!(
            r.resolve_args(&source, &fragment, None).unwrap(),
            json!({"$customOp": 1})
        );
    }

    #[test]
    fn test_resolve_args_shallow_keeps_expressions_verbatim() {
        let r = resolver();
        let source = json!({"a": 1});
        let fragment = json!({
            "copied": "$a",
            "kept": {"$add": ["$a", 1]}
        });
        assert_eq!(
            r.resolve_args_shallow(&source, &fragment, None).unwrap(),
            json!({"copied": 1, "kept": {"$add": ["$a", 1]}})
        );
    }

    #[test]
    fn test_resolve_expression_flattens_failures_to_null() {
        let r = resolver();
        let source = json!({});
        for expression in [
            json!({"$nope": 1}),
            json!({"$add": 1, "$multiply": 2}),
            json!({"$divide": [1, 0]}),
            json!({"$add": ["a", "b"]}),
        ] {
            assert_eq!(r.resolve_expression(&source, &expression, None).unwrap(), json!(null));
        }
    }

    #[test]
    fn test_resolve_expression_maps_top_level_arrays() {
        let r = resolver();
        let source = json!({"a": 1});
        assert_eq!(
            r.resolve_expression(&source, &json!(["$a", {"$add": [1, 1]}]), None).unwrap(),
            json!([1, 2])
        );
    }

    #[test]
    fn test_failed_subexpression_becomes_null_in_result() {
        let r = resolver();
        let blueprint = json!({"good": {"$add": [1, 2]}, "bad": {"$divide": [1, 0]}});
        assert_eq!(
            r.resolve_args(&json!({}), &blueprint, None).unwrap(),
            json!({"good": 3, "bad": null})
        );
    }

    #[test]
    fn test_call_operator_surfaces_typed_errors() {
        let r = resolver();
        let source = json!({});
        assert_eq!(
            r.call_operator(&source, "$nope", &json!(null), None).unwrap_err(),
            EvalError::unknown_operator("$nope")
        );
        assert_eq!(
            r.call_operator(&source, "$divide", &json!([1, 0]), None).unwrap_err(),
            EvalError::DivisionByZero
        );
    }

    #[test]
    fn test_depth_guard_on_literal_nesting() {
        let r = resolver();
        let deep = nested_array(MAX_RECURSION_DEPTH + 10);
        assert_eq!(
            r.resolve_args(&json!({}), &deep, None).unwrap_err(),
            EvalError::recursion_limit(MAX_RECURSION_DEPTH)
        );
        assert_eq!(
            r.resolve_value(&json!({}), &deep, None).unwrap_err(),
            EvalError::recursion_limit(MAX_RECURSION_DEPTH)
        );
    }

    #[test]
    fn test_depth_guard_inside_expressions_degrades_to_null() {
        let r = resolver();
        let deep = (0..MAX_RECURSION_DEPTH + 10).fold(json!(true), |inner, _| json!({"$not": inner}));
        // the innermost overflow flattens at its expression boundary
        let result = r.resolve_args(&json!({}), &deep, None).unwrap();
        assert!(result.is_boolean());
    }

    #[test]
    fn test_context_reaches_path_lookups() {
        let r = resolver();
        let source = json!({"base": 10});
        let ctx = ExecutionContext::element(json!({"price": 3}), 2);
        assert_eq!(
            r.resolve_args(&source, &json!(["$current.price", "$index", "$base"]), Some(&ctx))
                .unwrap(),
            json!([3, 2, 10])
        );
    }

    static TICKS: AtomicUsize = AtomicUsize::new(0);

    fn tick(_scope: &Scope<'_>, _payload: &Value) -> EvalResult<Value> {
        TICKS.fetch_add(1, Ordering::SeqCst);
        Ok(Value::Bool(true))
    }

    #[test]
    fn test_short_circuit_never_dispatches_skipped_operand() {
        let mut r = resolver();
        r.register_operator("$tick", Operator::Lazy(tick));
        let before = TICKS.load(Ordering::SeqCst);
        let result = r
            .resolve_args(&json!({}), &json!({"$or": [true, {"$tick": null}]}), None)
            .unwrap();
        assert_eq!(result, json!(true));
        assert_eq!(TICKS.load(Ordering::SeqCst), before);
    }

    #[test]
    #[should_panic(expected = "exclusive access")]
    fn test_register_after_sharing_panics() {
        let registry = Arc::new(OperatorRegistry::new());
        let mut r = Resolver::new(Arc::clone(&registry));
        r.register_operator("$tick", Operator::Lazy(tick));
    }

    #[cfg(feature = "regex")]
    #[test]
    fn test_regex_cache_hits_and_bound() {
        let r = resolver();
        assert!(r.compile_regex(r"\d+").is_ok());
        assert!(r.compile_regex(r"\d+").is_ok());
        assert_eq!(r.regex_cache_len(), 1);

        for i in 0..(MAX_REGEX_CACHE_SIZE + 20) {
            r.compile_regex(&format!("pattern-{i}")).unwrap();
        }
        assert!(r.regex_cache_len() <= MAX_REGEX_CACHE_SIZE);
    }

    #[cfg(feature = "regex")]
    #[test]
    fn test_regex_pattern_length_cap() {
        let r = resolver();
        let oversized = "a".repeat(MAX_REGEX_PATTERN_LEN + 1);
        assert_eq!(
            r.compile_regex(&oversized).unwrap_err().code(),
            "BLUEPRINT:REGEX"
        );
    }
}
