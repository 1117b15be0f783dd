//! Boolean combinators and the conditional
//!
//! `$and`, `$or` and `$if` are lazy: operands are resolved left to right and
//! resolution stops as soon as the outcome is determined, so an error in an
//! unreached operand never surfaces. A reached operand that fails resolves
//! to null, which is falsy. Truthiness follows the engine-wide coercion
//! (empty strings, arrays and objects are falsy).

use serde_json::Value;

use super::{Operator, OperatorRegistry, check_min_arg_count, require_field};
use crate::error::{EvalError, EvalResult};
use crate::resolve::Scope;
use crate::value_utils::is_truthy;

pub(crate) fn register(registry: &mut OperatorRegistry) {
    registry.register("$and", Operator::Lazy(and));
    registry.register("$or", Operator::Lazy(or));
    registry.register("$not", Operator::Eager(not));
    registry.register("$if", Operator::Lazy(if_else));
}

/// True when every operand is truthy; an empty list is true
pub fn and(scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    combine(scope, "$and", payload, false)
}

/// True when any operand is truthy; an empty list is false
pub fn or(scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    combine(scope, "$or", payload, true)
}

/// Resolve operands until one decides the outcome.
///
/// `stop_on` is the truthiness that short-circuits: truthy for `$or`, falsy
/// for `$and`. A payload that is not an array literal is resolved first, so
/// `{"$and": "$checks"}` works on an array pulled from the record.
fn combine(scope: &Scope<'_>, operator: &str, payload: &Value, stop_on: bool) -> EvalResult<Value> {
    match payload {
        Value::Array(fragments) => {
            for fragment in fragments {
                let value = scope.resolve(fragment)?;
                if is_truthy(&value) == stop_on {
                    return Ok(Value::Bool(stop_on));
                }
            }
            Ok(Value::Bool(!stop_on))
        }
        other => {
            let resolved = scope.resolve(other)?;
            let items = resolved
                .as_array()
                .ok_or_else(|| EvalError::array_input_required(operator))?;
            let outcome = if stop_on {
                items.iter().any(is_truthy)
            } else {
                items.iter().all(is_truthy)
            };
            Ok(Value::Bool(outcome))
        }
    }
}

/// Negated truthiness of the payload
pub fn not(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    Ok(Value::Bool(!is_truthy(payload)))
}

/// Conditional: `{"if": …, "then": …, "else": …}` or `[condition, then, else]`.
///
/// Only the taken branch is resolved; a missing `else` yields null.
pub fn if_else(scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    let (condition, then, otherwise) = match payload {
        Value::Object(fields) => (
            require_field("$if", fields, "if")?,
            require_field("$if", fields, "then")?,
            fields.get("else"),
        ),
        Value::Array(args) => {
            check_min_arg_count("$if", args, 2)?;
            if args.len() > 3 {
                return Err(EvalError::invalid_argument(
                    "$if",
                    "expected [condition, then, else]",
                ));
            }
            (&args[0], &args[1], args.get(2))
        }
        _ => {
            return Err(EvalError::malformed(
                "$if expects {if, then, else} or [condition, then, else]",
            ));
        }
    };

    let condition = scope.resolve(condition)?;
    if is_truthy(&condition) {
        scope.resolve(then)
    } else {
        otherwise.map_or(Ok(Value::Null), |fragment| scope.resolve(fragment))
    }
}
