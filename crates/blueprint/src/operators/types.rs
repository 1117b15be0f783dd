//! Type-predicate operators
//!
//! Each takes its payload directly and never fails; `$type` names the JSON
//! type the same way error messages do.

use serde_json::Value;

use super::{Operator, OperatorRegistry};
use crate::error::EvalResult;
use crate::resolve::Scope;
use crate::value_utils::value_type_name;

pub(crate) fn register(registry: &mut OperatorRegistry) {
    registry.register("$isNull", Operator::Eager(is_null));
    registry.register("$isNumber", Operator::Eager(is_number));
    registry.register("$isInteger", Operator::Eager(is_integer));
    registry.register("$isString", Operator::Eager(is_string));
    registry.register("$isBoolean", Operator::Eager(is_boolean));
    registry.register("$isArray", Operator::Eager(is_array));
    registry.register("$isObject", Operator::Eager(is_object));
    registry.register("$type", Operator::Eager(type_of));
}

pub fn is_null(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    Ok(Value::Bool(payload.is_null()))
}

pub fn is_number(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    Ok(Value::Bool(payload.is_number()))
}

/// True for numbers stored with an integer representation.
///
/// Arithmetic results with no fractional part normalize to integers, so
/// `{"$isInteger": {"$divide": [10, 2]}}` is true.
pub fn is_integer(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    Ok(Value::Bool(payload.is_i64() || payload.is_u64()))
}

pub fn is_string(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    Ok(Value::Bool(payload.is_string()))
}

pub fn is_boolean(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    Ok(Value::Bool(payload.is_boolean()))
}

pub fn is_array(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    Ok(Value::Bool(payload.is_array()))
}

pub fn is_object(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    Ok(Value::Bool(payload.is_object()))
}

/// The JSON type name of the payload
pub fn type_of(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    Ok(Value::String(value_type_name(payload).to_string()))
}
