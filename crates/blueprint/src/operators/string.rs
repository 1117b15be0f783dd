//! String operators
//!
//! All of these are eager. Multi-argument forms take an array payload, unary
//! ones (`$upper`, `$lower`, `$trim`) take the string directly. Coercion to
//! string is limited to scalars; nulls and containers are type errors rather
//! than silently serialized.

use serde_json::Value;

use super::{
    Operator, OperatorRegistry, args_as_array, check_arg_count, check_min_arg_count,
    get_array_arg, get_index_arg, get_string_arg,
};
use crate::error::{EvalError, EvalResult};
use crate::resolve::Scope;
use crate::value_utils::{value_type_name, values_equal};

pub(crate) fn register(registry: &mut OperatorRegistry) {
    registry.register("$concat", Operator::Eager(concat));
    registry.register("$upper", Operator::Eager(upper));
    registry.register("$lower", Operator::Eager(lower));
    registry.register("$trim", Operator::Eager(trim));
    registry.register("$split", Operator::Eager(split));
    registry.register("$join", Operator::Eager(join));
    registry.register("$replace", Operator::Eager(replace));
    registry.register("$substring", Operator::Eager(substring));
    registry.register("$startsWith", Operator::Eager(starts_with));
    registry.register("$endsWith", Operator::Eager(ends_with));
    registry.register("$contains", Operator::Eager(contains));
    registry.register("$length", Operator::Eager(length));
}

fn scalar_to_string(value: &Value) -> EvalResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(EvalError::type_mismatch(
            "string, number, or boolean",
            value_type_name(other),
        )),
    }
}

fn payload_str(payload: &Value) -> EvalResult<&str> {
    payload
        .as_str()
        .ok_or_else(|| EvalError::type_mismatch("string", value_type_name(payload)))
}

/// Concatenate scalar arguments into one string
pub fn concat(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    let args = args_as_array("$concat", payload)?;
    let mut out = String::new();
    for item in args {
        out.push_str(&scalar_to_string(item)?);
    }
    Ok(Value::String(out))
}

/// Uppercase the payload string
pub fn upper(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    Ok(Value::String(payload_str(payload)?.to_uppercase()))
}

/// Lowercase the payload string
pub fn lower(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    Ok(Value::String(payload_str(payload)?.to_lowercase()))
}

/// Trim leading and trailing whitespace
pub fn trim(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    Ok(Value::String(payload_str(payload)?.trim().to_string()))
}

/// Split a string on a separator (`["a,b", ","]` is `["a", "b"]`).
///
/// An empty separator splits into individual characters.
pub fn split(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    let args = args_as_array("$split", payload)?;
    check_arg_count("$split", args, 2)?;
    let text = get_string_arg("$split", args, 0, "string")?;
    let separator = get_string_arg("$split", args, 1, "separator")?;
    let parts: Vec<Value> = if separator.is_empty() {
        text.chars().map(|c| Value::String(c.to_string())).collect()
    } else {
        text.split(separator)
            .map(|part| Value::String(part.to_string()))
            .collect()
    };
    Ok(Value::Array(parts))
}

/// Join an array of scalars with a separator
pub fn join(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    let args = args_as_array("$join", payload)?;
    check_arg_count("$join", args, 2)?;
    let items = get_array_arg("$join", args, 0, "array")?;
    let separator = get_string_arg("$join", args, 1, "separator")?;
    let mut parts = Vec::with_capacity(items.len());
    for item in items {
        parts.push(scalar_to_string(item)?);
    }
    Ok(Value::String(parts.join(separator)))
}

/// Replace every occurrence of a substring (`[string, from, to]`)
pub fn replace(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    let args = args_as_array("$replace", payload)?;
    check_arg_count("$replace", args, 3)?;
    let text = get_string_arg("$replace", args, 0, "string")?;
    let from = get_string_arg("$replace", args, 1, "from")?;
    let to = get_string_arg("$replace", args, 2, "to")?;
    Ok(Value::String(text.replace(from, to)))
}

/// Character-indexed substring: `[string, start, end?]`.
///
/// Indices count characters, not bytes, and are clamped to the string's
/// length; `end` defaults to the end of the string.
pub fn substring(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    let args = args_as_array("$substring", payload)?;
    check_min_arg_count("$substring", args, 2)?;
    let text = get_string_arg("$substring", args, 0, "string")?;
    let start = get_index_arg("$substring", args, 1, "start")?;
    let chars: Vec<char> = text.chars().collect();
    let end = if args.len() >= 3 {
        get_index_arg("$substring", args, 2, "end")?.min(chars.len())
    } else {
        chars.len()
    };
    let start = start.min(chars.len());
    if start >= end {
        return Ok(Value::String(String::new()));
    }
    Ok(Value::String(chars[start..end].iter().collect()))
}

/// Whether the string starts with the given prefix
pub fn starts_with(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    let args = args_as_array("$startsWith", payload)?;
    check_arg_count("$startsWith", args, 2)?;
    let text = get_string_arg("$startsWith", args, 0, "string")?;
    let prefix = get_string_arg("$startsWith", args, 1, "prefix")?;
    Ok(Value::Bool(text.starts_with(prefix)))
}

/// Whether the string ends with the given suffix
pub fn ends_with(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    let args = args_as_array("$endsWith", payload)?;
    check_arg_count("$endsWith", args, 2)?;
    let text = get_string_arg("$endsWith", args, 0, "string")?;
    let suffix = get_string_arg("$endsWith", args, 1, "suffix")?;
    Ok(Value::Bool(text.ends_with(suffix)))
}

/// Substring test for strings, membership test for arrays.
///
/// `["hello", "ell"]` is true; `[[1, 2, 3], 2]` is true (deep equality).
pub fn contains(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    let args = args_as_array("$contains", payload)?;
    check_arg_count("$contains", args, 2)?;
    match &args[0] {
        Value::String(haystack) => {
            let needle = get_string_arg("$contains", args, 1, "needle")?;
            Ok(Value::Bool(haystack.contains(needle)))
        }
        Value::Array(items) => Ok(Value::Bool(
            items.iter().any(|item| values_equal(item, &args[1])),
        )),
        other => Err(EvalError::type_mismatch(
            "string or array",
            value_type_name(other),
        )),
    }
}

/// Length of a string (in characters), array, or object
pub fn length(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    let len = match payload {
        Value::String(s) => s.chars().count(),
        Value::Array(items) => items.len(),
        Value::Object(fields) => fields.len(),
        other => {
            return Err(EvalError::type_mismatch(
                "string, array, or object",
                value_type_name(other),
            ));
        }
    };
    Ok(Value::Number(len.into()))
}
