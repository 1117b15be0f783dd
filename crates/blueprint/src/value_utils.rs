//! Utility functions for working with serde_json::Value

use std::cmp::Ordering;

use serde_json::{Number, Value};

/// Get the type name of a Value for error messages
pub fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Extract f64 from Number, trying both f64 and i64 representations
#[inline]
pub fn number_as_f64(num: &Number) -> Option<f64> {
    num.as_f64().or_else(|| num.as_i64().map(|i| i as f64))
}

/// Check if a value is truthy (not null, false, 0, empty string, or empty
/// container)
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i != 0
            } else if let Some(f) = n.as_f64() {
                f != 0.0 && !f.is_nan()
            } else {
                true // u64 values beyond i64 range
            }
        }
        Value::String(s) => !s.is_empty(),
        Value::Array(arr) => !arr.is_empty(),
        Value::Object(obj) => !obj.is_empty(),
    }
}

/// Deep structural equality with numeric coercion.
///
/// Unlike `Value`'s derived `PartialEq`, integers and floats holding the
/// same quantity compare equal (`1 == 1.0`), recursively through arrays and
/// objects.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| values_equal(l, r))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(key, l)| y.get(key).is_some_and(|r| values_equal(l, r)))
        }
        _ => a == b,
    }
}

fn numbers_equal(x: &Number, y: &Number) -> bool {
    if let (Some(l), Some(r)) = (x.as_i64(), y.as_i64()) {
        return l == r;
    }
    match (number_as_f64(x), number_as_f64(y)) {
        (Some(l), Some(r)) => l == r,
        _ => false,
    }
}

/// Order two values when they are comparable.
///
/// Numbers compare by numeric value, strings lexicographically. Everything
/// else (including mixed number/string pairs) is incomparable and yields
/// `None`.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let l = number_as_f64(x)?;
            let r = number_as_f64(y)?;
            l.partial_cmp(&r)
        }
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Convert a computed float into a Value, collapsing integral results back
/// to integers (`49.0` becomes `49`, matching how the quantities would
/// serialize from a dynamically typed producer). Non-finite floats yield
/// `None`.
pub fn float_to_value(f: f64) -> Option<Value> {
    if !f.is_finite() {
        return None;
    }
    // 2^53: beyond this, f64 cannot represent every integer exactly.
    const EXACT_INT_RANGE: f64 = 9_007_199_254_740_992.0;
    if f.fract() == 0.0 && f.abs() <= EXACT_INT_RANGE {
        return Some(Value::Number(Number::from(f as i64)));
    }
    Number::from_f64(f).map(Value::Number)
}
