//! Comparison operators
//!
//! `$eq`/`$ne` use deep structural equality with numeric coercion (`1` equals
//! `1.0`). The ordering operators compare numbers by value and strings
//! lexicographically; mixing types is an error.

use std::cmp::Ordering;

use serde_json::Value;

use super::{Operator, OperatorRegistry, args_as_array, check_arg_count};
use crate::error::{EvalError, EvalResult};
use crate::resolve::Scope;
use crate::value_utils::{compare_values, value_type_name, values_equal};

pub(crate) fn register(registry: &mut OperatorRegistry) {
    registry.register("$eq", Operator::Eager(eq));
    registry.register("$ne", Operator::Eager(ne));
    registry.register("$gt", Operator::Eager(gt));
    registry.register("$gte", Operator::Eager(gte));
    registry.register("$lt", Operator::Eager(lt));
    registry.register("$lte", Operator::Eager(lte));
}

fn pair<'a>(operator: &str, payload: &'a Value) -> EvalResult<(&'a Value, &'a Value)> {
    let args = args_as_array(operator, payload)?;
    check_arg_count(operator, args, 2)?;
    Ok((&args[0], &args[1]))
}

fn ordering(operator: &str, payload: &Value) -> EvalResult<Ordering> {
    let (a, b) = pair(operator, payload)?;
    compare_values(a, b).ok_or_else(|| {
        EvalError::type_mismatch(
            "two numbers or two strings",
            format!("{} and {}", value_type_name(a), value_type_name(b)),
        )
    })
}

/// Deep equality of the two arguments
pub fn eq(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    let (a, b) = pair("$eq", payload)?;
    Ok(Value::Bool(values_equal(a, b)))
}

/// Negated deep equality
pub fn ne(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    let (a, b) = pair("$ne", payload)?;
    Ok(Value::Bool(!values_equal(a, b)))
}

/// Strictly greater than
pub fn gt(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    Ok(Value::Bool(ordering("$gt", payload)? == Ordering::Greater))
}

/// Greater than or equal
pub fn gte(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    Ok(Value::Bool(matches!(
        ordering("$gte", payload)?,
        Ordering::Greater | Ordering::Equal
    )))
}

/// Strictly less than
pub fn lt(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    Ok(Value::Bool(ordering("$lt", payload)? == Ordering::Less))
}

/// Less than or equal
pub fn lte(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    Ok(Value::Bool(matches!(
        ordering("$lte", payload)?,
        Ordering::Less | Ordering::Equal
    )))
}
