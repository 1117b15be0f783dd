//! Arithmetic and aggregation operators
//!
//! Binary and variadic operators take their arguments as an array payload
//! (`{"$subtract": [10, 4]}`), unary ones take the value directly
//! (`{"$abs": -5}`). Integer arguments stay in integer arithmetic while the
//! math is exact; overflow and float operands switch to f64, and integral
//! float results collapse back to integers.
//!
//! `$sum` and `$avg` are lazy: their payload may carry a `fallback` that is
//! resolved and returned when the input is not an array of numbers.

use serde_json::{Number, Value};
use tracing::debug;

use super::{
    Operator, OperatorRegistry, args_as_array, check_arg_count, check_min_arg_count, get_int_arg,
    get_number_arg,
};
use crate::error::{EvalError, EvalResult};
use crate::resolve::Scope;
use crate::value_utils::{float_to_value, number_as_f64, value_type_name};

pub(crate) fn register(registry: &mut OperatorRegistry) {
    registry.register("$add", Operator::Eager(add));
    registry.register("$subtract", Operator::Eager(subtract));
    registry.register("$multiply", Operator::Eager(multiply));
    registry.register("$divide", Operator::Eager(divide));
    registry.register("$mod", Operator::Eager(modulo));
    registry.register("$pow", Operator::Eager(pow));
    registry.register("$abs", Operator::Eager(abs));
    registry.register("$round", Operator::Eager(round));
    registry.register("$floor", Operator::Eager(floor));
    registry.register("$ceil", Operator::Eager(ceil));
    registry.register("$sqrt", Operator::Eager(sqrt));
    registry.register("$min", Operator::Eager(min));
    registry.register("$max", Operator::Eager(max));
    registry.register("$sum", Operator::Lazy(sum));
    registry.register("$avg", Operator::Lazy(avg));
}

fn expect_number<'a>(value: &'a Value) -> EvalResult<&'a Number> {
    match value {
        Value::Number(n) => Ok(n),
        other => Err(EvalError::type_mismatch("number", value_type_name(other))),
    }
}

fn payload_f64(payload: &Value) -> EvalResult<f64> {
    let n = expect_number(payload)?;
    number_as_f64(n).ok_or_else(|| EvalError::type_mismatch("number", "out-of-range number"))
}

fn finite(operator: &str, value: f64) -> EvalResult<Value> {
    float_to_value(value)
        .ok_or_else(|| EvalError::invalid_argument(operator, "result is not a finite number"))
}

fn int_pair(a: &Value, b: &Value) -> Option<(i64, i64)> {
    Some((a.as_i64()?, b.as_i64()?))
}

/// Sum an argument list, keeping integer arithmetic while it stays exact
pub(crate) fn sum_values(operator: &str, items: &[Value]) -> EvalResult<Value> {
    let mut int_sum: Option<i64> = Some(0);
    let mut float_sum = 0.0_f64;
    for item in items {
        let n = expect_number(item)?;
        let f = number_as_f64(n)
            .ok_or_else(|| EvalError::invalid_argument(operator, "number out of range"))?;
        float_sum += f;
        int_sum = match (int_sum, n.as_i64()) {
            (Some(acc), Some(i)) => acc.checked_add(i),
            _ => None,
        };
    }
    match int_sum {
        Some(total) => Ok(Value::Number(total.into())),
        None => finite(operator, float_sum),
    }
}

/// Add all arguments (`{"$add": [1, 2, 3]}` is `6`); an empty list is `0`
pub fn add(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    let args = args_as_array("$add", payload)?;
    sum_values("$add", args)
}

/// Subtract the second argument from the first
pub fn subtract(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    let args = args_as_array("$subtract", payload)?;
    check_arg_count("$subtract", args, 2)?;
    if let Some((a, b)) = int_pair(&args[0], &args[1]) {
        if let Some(result) = a.checked_sub(b) {
            return Ok(Value::Number(result.into()));
        }
    }
    let a = get_number_arg("$subtract", args, 0, "a")?;
    let b = get_number_arg("$subtract", args, 1, "b")?;
    finite("$subtract", a - b)
}

/// Multiply all arguments; an empty list is `1`
pub fn multiply(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    let args = args_as_array("$multiply", payload)?;
    let mut int_product: Option<i64> = Some(1);
    let mut float_product = 1.0_f64;
    for item in args {
        let n = expect_number(item)?;
        let f = number_as_f64(n)
            .ok_or_else(|| EvalError::invalid_argument("$multiply", "number out of range"))?;
        float_product *= f;
        int_product = match (int_product, n.as_i64()) {
            (Some(acc), Some(i)) => acc.checked_mul(i),
            _ => None,
        };
    }
    match int_product {
        Some(product) => Ok(Value::Number(product.into())),
        None => finite("$multiply", float_product),
    }
}

/// Divide the first argument by the second.
///
/// Integer division is kept when it is exact (`10 / 2` is `5`); everything
/// else goes through f64 (`1 / 3` is `0.333…`). Dividing by zero is an
/// error.
pub fn divide(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    let args = args_as_array("$divide", payload)?;
    check_arg_count("$divide", args, 2)?;
    if let Some((a, b)) = int_pair(&args[0], &args[1]) {
        if b == 0 {
            return Err(EvalError::DivisionByZero);
        }
        if a % b == 0 {
            return Ok(Value::Number((a / b).into()));
        }
    }
    let a = get_number_arg("$divide", args, 0, "a")?;
    let b = get_number_arg("$divide", args, 1, "b")?;
    if b == 0.0 {
        return Err(EvalError::DivisionByZero);
    }
    finite("$divide", a / b)
}

/// Remainder of dividing the first argument by the second
pub fn modulo(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    let args = args_as_array("$mod", payload)?;
    check_arg_count("$mod", args, 2)?;
    if let Some((a, b)) = int_pair(&args[0], &args[1]) {
        if b == 0 {
            return Err(EvalError::DivisionByZero);
        }
        return Ok(Value::Number((a % b).into()));
    }
    let a = get_number_arg("$mod", args, 0, "a")?;
    let b = get_number_arg("$mod", args, 1, "b")?;
    if b == 0.0 {
        return Err(EvalError::DivisionByZero);
    }
    finite("$mod", a % b)
}

/// Raise the first argument to the power of the second
pub fn pow(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    let args = args_as_array("$pow", payload)?;
    check_arg_count("$pow", args, 2)?;
    if let Some((base, exp)) = int_pair(&args[0], &args[1]) {
        if let Ok(exp) = u32::try_from(exp) {
            if let Some(result) = base.checked_pow(exp) {
                return Ok(Value::Number(result.into()));
            }
        }
    }
    let base = get_number_arg("$pow", args, 0, "base")?;
    let exp = get_number_arg("$pow", args, 1, "exponent")?;
    finite("$pow", base.powf(exp))
}

/// Absolute value
pub fn abs(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    let num = payload_f64(payload)?;
    finite("$abs", num.abs())
}

/// Round to a number of decimal places (default 0).
///
/// Accepts a bare number or `[value, digits]`.
pub fn round(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    let (num, digits) = match payload {
        Value::Array(args) => {
            check_min_arg_count("$round", args, 1)?;
            let num = get_number_arg("$round", args, 0, "value")?;
            let digits = if args.len() >= 2 {
                get_int_arg("$round", args, 1, "digits")?
            } else {
                0
            };
            (num, digits)
        }
        other => (payload_f64(other)?, 0),
    };
    if !(0..=12).contains(&digits) {
        return Err(EvalError::invalid_argument(
            "$round",
            "digits must be between 0 and 12",
        ));
    }
    let multiplier = 10_f64.powi(digits as i32);
    finite("$round", (num * multiplier).round() / multiplier)
}

/// Round down to the nearest integer
pub fn floor(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    let num = payload_f64(payload)?;
    finite("$floor", num.floor())
}

/// Round up to the nearest integer
pub fn ceil(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    let num = payload_f64(payload)?;
    finite("$ceil", num.ceil())
}

/// Square root; negative input is an error
pub fn sqrt(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    let num = payload_f64(payload)?;
    if num < 0.0 {
        return Err(EvalError::invalid_argument(
            "$sqrt",
            "cannot take the square root of a negative number",
        ));
    }
    finite("$sqrt", num.sqrt())
}

/// Smallest of the arguments, preserving its original representation
pub fn min(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    extreme("$min", payload, |candidate, best| candidate < best)
}

/// Largest of the arguments, preserving its original representation
pub fn max(_scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    extreme("$max", payload, |candidate, best| candidate > best)
}

fn extreme(operator: &str, payload: &Value, replace: fn(f64, f64) -> bool) -> EvalResult<Value> {
    let args = args_as_array(operator, payload)?;
    check_min_arg_count(operator, args, 1)?;
    let mut best_index = 0;
    let mut best = payload_f64(&args[0])?;
    for (index, item) in args.iter().enumerate().skip(1) {
        let candidate = payload_f64(item)?;
        if replace(candidate, best) {
            best = candidate;
            best_index = index;
        }
    }
    Ok(args[best_index].clone())
}

/// Sum an array of numbers, with optional fallback.
///
/// Payload is either a fragment resolving to an array, or
/// `{"values": …, "fallback": …}` where the fallback is resolved only when
/// the input is not a summable array.
pub fn sum(scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    lazy_aggregate(scope, "$sum", payload, sum_values)
}

/// Average an array of numbers, with optional fallback
pub fn avg(scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    lazy_aggregate(scope, "$avg", payload, avg_values)
}

fn avg_values(operator: &str, items: &[Value]) -> EvalResult<Value> {
    if items.is_empty() {
        return Err(EvalError::invalid_argument(
            operator,
            "cannot average an empty array",
        ));
    }
    let mut total = 0.0_f64;
    for item in items {
        let n = expect_number(item)?;
        total += number_as_f64(n)
            .ok_or_else(|| EvalError::invalid_argument(operator, "number out of range"))?;
    }
    finite(operator, total / items.len() as f64)
}

fn lazy_aggregate(
    scope: &Scope<'_>,
    operator: &str,
    payload: &Value,
    compute: fn(&str, &[Value]) -> EvalResult<Value>,
) -> EvalResult<Value> {
    let (fragment, fallback) = match payload {
        Value::Object(fields) => match fields.get("values") {
            Some(values) => (values, fields.get("fallback")),
            None => (payload, None),
        },
        _ => (payload, None),
    };

    let outcome = scope.resolve(fragment).and_then(|resolved| {
        let items = resolved
            .as_array()
            .ok_or_else(|| EvalError::array_input_required(operator))?;
        compute(operator, items)
    });

    match outcome {
        Ok(value) => Ok(value),
        Err(err) => match fallback {
            Some(fragment) => {
                debug!(operator, error = %err, "aggregation failed, resolving fallback");
                scope.resolve(fragment)
            }
            None => Err(err),
        },
    }
}
