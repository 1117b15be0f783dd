//! Array operators
//!
//! The transforms `$map`, `$filter` and `$reduce` are lazy: they resolve
//! their `input` with the caller's context, then resolve the per-element
//! fragment once per element with a child context carrying `current`,
//! `index` and (for `$reduce`) `accumulated`. The child context is layered
//! over the caller's, so an inner transform shadows `current` while fields
//! the child does not define stay visible.
//!
//! Any failure inside a transform resolves the optional `fallback` field
//! instead of propagating; without a fallback the typed error surfaces to
//! the caller.
//!
//! The remaining operators are eager element helpers.

use std::cmp::Ordering;

use serde_json::{Map, Value};
use tracing::debug;

use super::{
    Operator, OperatorRegistry, args_as_array, check_min_arg_count, get_array_arg, get_index_arg,
    object_payload, require_field,
};
use crate::context::{ExecutionContext, augment};
use crate::error::{EvalError, EvalResult};
use crate::resolve::Scope;
use crate::value_utils::{compare_values, is_truthy};

pub(crate) fn register(registry: &mut OperatorRegistry) {
    registry.register("$map", Operator::Lazy(map));
    registry.register("$filter", Operator::Lazy(filter));
    registry.register("$reduce", Operator::Lazy(reduce));
    registry.register("$first", Operator::Eager(first));
    registry.register("$last", Operator::Eager(last));
    registry.register("$reverse", Operator::Eager(reverse));
    registry.register("$flatten", Operator::Eager(flatten));
    registry.register("$slice", Operator::Eager(slice));
    registry.register("$sort", Operator::Eager(sort));
}

fn with_fallback(
    scope: &Scope<'_>,
    operator: &str,
    fields: &Map<String, Value>,
    run: impl FnOnce() -> EvalResult<Value>,
) -> EvalResult<Value> {
    match run() {
        Ok(value) => Ok(value),
        Err(err) => match fields.get("fallback") {
            Some(fragment) => {
                debug!(operator, error = %err, "transform failed, resolving fallback");
                scope.resolve(fragment)
            }
            None => Err(err),
        },
    }
}

fn input_array(
    scope: &Scope<'_>,
    operator: &str,
    fields: &Map<String, Value>,
) -> EvalResult<Vec<Value>> {
    let fragment = require_field(operator, fields, "input")?;
    match scope.resolve(fragment)? {
        Value::Array(items) => Ok(items),
        _ => Err(EvalError::array_input_required(operator)),
    }
}

/// Transform each element: `{"input": …, "expression": …, "fallback": …?}`.
///
/// The expression sees the element as `$current` and its position as
/// `$index`.
pub fn map(scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    let fields = object_payload("$map", payload)?;
    with_fallback(scope, "$map", fields, || {
        let items = input_array(scope, "$map", fields)?;
        let expression = require_field("$map", fields, "expression")?;
        let working = augment(scope.source(), scope.context());
        let mut out = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            let ctx = ExecutionContext::element(item, index);
            out.push(scope.resolve_in(&working, expression, Some(&ctx))?);
        }
        Ok(Value::Array(out))
    })
}

/// Keep elements whose condition is truthy:
/// `{"input": …, "condition": …, "fallback": …?}`
pub fn filter(scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    let fields = object_payload("$filter", payload)?;
    with_fallback(scope, "$filter", fields, || {
        let items = input_array(scope, "$filter", fields)?;
        let condition = require_field("$filter", fields, "condition")?;
        let working = augment(scope.source(), scope.context());
        let mut out = Vec::new();
        for (index, item) in items.into_iter().enumerate() {
            let ctx = ExecutionContext::element(item.clone(), index);
            let verdict = scope.resolve_in(&working, condition, Some(&ctx))?;
            if is_truthy(&verdict) {
                out.push(item);
            }
        }
        Ok(Value::Array(out))
    })
}

/// Fold the input into one value:
/// `{"input": …, "expression": …, "initialValue": …, "fallback": …?}`.
///
/// The expression sees `$current`, `$index` and the running `$accumulated`.
/// An empty input returns the resolved `initialValue` unchanged, whatever
/// it is.
pub fn reduce(scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    let fields = object_payload("$reduce", payload)?;
    with_fallback(scope, "$reduce", fields, || {
        let items = input_array(scope, "$reduce", fields)?;
        let expression = require_field("$reduce", fields, "expression")?;
        let initial = require_field("$reduce", fields, "initialValue")?;
        let working = augment(scope.source(), scope.context());
        let mut accumulated = scope.resolve(initial)?;
        for (index, item) in items.into_iter().enumerate() {
            let ctx = ExecutionContext::fold(item, accumulated, index);
            accumulated = scope.resolve_in(&working, expression, Some(&ctx))?;
        }
        Ok(accumulated)
    })
}

/// First element of an array, or null when it is empty
pub fn first(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    let items = args_as_array("$first", payload)?;
    Ok(items.first().cloned().unwrap_or(Value::Null))
}

/// Last element of an array, or null when it is empty
pub fn last(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    let items = args_as_array("$last", payload)?;
    Ok(items.last().cloned().unwrap_or(Value::Null))
}

/// The array in reverse order
pub fn reverse(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    let items = args_as_array("$reverse", payload)?;
    Ok(Value::Array(items.iter().rev().cloned().collect()))
}

/// Flatten nested arrays by one level
pub fn flatten(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    let items = args_as_array("$flatten", payload)?;
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Array(inner) => out.extend(inner.iter().cloned()),
            other => out.push(other.clone()),
        }
    }
    Ok(Value::Array(out))
}

/// Slice of an array: `[array, start, end?]`, indices clamped to the length
pub fn slice(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    let args = args_as_array("$slice", payload)?;
    check_min_arg_count("$slice", args, 2)?;
    let items = get_array_arg("$slice", args, 0, "array")?;
    let start = get_index_arg("$slice", args, 1, "start")?.min(items.len());
    let end = if args.len() >= 3 {
        get_index_arg("$slice", args, 2, "end")?.min(items.len())
    } else {
        items.len()
    };
    if start >= end {
        return Ok(Value::Array(Vec::new()));
    }
    Ok(Value::Array(items[start..end].to_vec()))
}

/// Sort an array of numbers or an array of strings, ascending
pub fn sort(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    let items = args_as_array("$sort", payload)?;
    let comparable = items.len() < 2
        || items.iter().all(Value::is_number)
        || items.iter().all(Value::is_string);
    if !comparable {
        return Err(EvalError::type_mismatch(
            "an array of numbers or an array of strings",
            "mixed array",
        ));
    }
    let mut sorted = items.to_vec();
    sorted.sort_by(|a, b| compare_values(a, b).unwrap_or(Ordering::Equal));
    Ok(Value::Array(sorted))
}
