//! Operator registry and the standard operator catalog
//!
//! Operators are plain functions keyed by their `$`-prefixed name. The
//! registry is built once with the full standard catalog and is immutable
//! afterwards; the engine shares it behind an `Arc`.
//!
//! Each entry declares how its payload arrives:
//!
//! - [`Operator::Eager`] operators receive their payload fully resolved —
//!   paths looked up, nested expressions already computed. Most of the
//!   catalog works this way.
//! - [`Operator::Lazy`] operators receive the payload verbatim and drive
//!   resolution themselves through the [`Scope`]. Short-circuiting logic
//!   (`$and`, `$or`, `$if`), the array transforms, and operators carrying a
//!   `fallback` field need this to control *whether* and *in which context*
//!   their arguments are resolved.

pub mod array;
pub mod compare;
#[cfg(feature = "datetime")]
pub mod datetime;
pub mod logic;
pub mod math;
#[cfg(feature = "regex")]
pub mod regex;
pub mod string;
pub mod types;

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::error::{EvalError, EvalResult};
use crate::resolve::Scope;
use crate::value_utils::value_type_name;

/// Type alias for an operator function
pub type OperatorFn = fn(&Scope<'_>, &Value) -> EvalResult<Value>;

/// A registered operator together with its payload convention
#[derive(Debug, Clone, Copy)]
pub enum Operator {
    /// Payload is resolved before the operator runs
    Eager(OperatorFn),
    /// Payload is passed verbatim; the operator resolves what it needs
    Lazy(OperatorFn),
}

/// Registry of all evaluatable operators
#[derive(Debug)]
pub struct OperatorRegistry {
    entries: HashMap<String, Operator>,
}

impl OperatorRegistry {
    /// Create a registry with the full standard catalog
    pub fn new() -> Self {
        let mut registry = Self::empty();

        math::register(&mut registry);
        compare::register(&mut registry);
        logic::register(&mut registry);
        string::register(&mut registry);
        types::register(&mut registry);
        array::register(&mut registry);
        #[cfg(feature = "regex")]
        regex::register(&mut registry);
        #[cfg(feature = "datetime")]
        datetime::register(&mut registry);

        registry
    }

    /// Create a registry with no operators
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register an operator under a `$`-prefixed name.
    ///
    /// # Panics
    ///
    /// Panics when the name does not start with `$` or is the bare `$`;
    /// anything else would collide with path-reference syntax.
    pub fn register(&mut self, name: impl Into<String>, operator: Operator) {
        let name = name.into();
        assert!(
            name.starts_with('$') && name.len() > 1,
            "operator names must start with '$'"
        );
        self.entries.insert(name, operator);
    }

    /// Check if an operator exists
    pub fn has(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Look up an operator by name
    pub fn get(&self, name: &str) -> Option<Operator> {
        self.entries.get(name).copied()
    }

    /// Get all registered operator names
    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// Argument helpers shared by the operator modules. Eager operators taking
// more than one argument receive them as an array payload.

/// Interpret an eager payload as an argument list
pub(crate) fn args_as_array<'a>(operator: &str, payload: &'a Value) -> EvalResult<&'a [Value]> {
    payload.as_array().map(Vec::as_slice).ok_or_else(|| {
        EvalError::invalid_argument(
            operator,
            format!("expects an array of arguments, got {}", value_type_name(payload)),
        )
    })
}

/// Helper to check argument count
pub(crate) fn check_arg_count(operator: &str, args: &[Value], expected: usize) -> EvalResult<()> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(EvalError::invalid_argument(
            operator,
            format!("expected {} arguments, got {}", expected, args.len()),
        ))
    }
}

/// Helper to check minimum argument count
pub(crate) fn check_min_arg_count(operator: &str, args: &[Value], min: usize) -> EvalResult<()> {
    if args.len() >= min {
        Ok(())
    } else {
        Err(EvalError::invalid_argument(
            operator,
            format!("expected at least {} arguments, got {}", min, args.len()),
        ))
    }
}

/// Helper to get a string argument with a better error message
pub(crate) fn get_string_arg<'a>(
    operator: &str,
    args: &'a [Value],
    index: usize,
    arg_name: &str,
) -> EvalResult<&'a str> {
    args.get(index)
        .ok_or_else(|| {
            EvalError::invalid_argument(
                operator,
                format!("missing argument '{arg_name}' at position {index}"),
            )
        })?
        .as_str()
        .ok_or_else(|| {
            EvalError::invalid_argument(
                operator,
                format!(
                    "argument '{}' must be a string, got {}",
                    arg_name,
                    value_type_name(&args[index])
                ),
            )
        })
}

/// Helper to get an integer argument with a better error message
pub(crate) fn get_int_arg(
    operator: &str,
    args: &[Value],
    index: usize,
    arg_name: &str,
) -> EvalResult<i64> {
    let value = args.get(index).ok_or_else(|| {
        EvalError::invalid_argument(
            operator,
            format!("missing argument '{arg_name}' at position {index}"),
        )
    })?;

    value.as_i64().ok_or_else(|| {
        EvalError::invalid_argument(
            operator,
            format!(
                "argument '{}' must be an integer, got {}",
                arg_name,
                value_type_name(value)
            ),
        )
    })
}

/// Helper to get a non-negative index argument
pub(crate) fn get_index_arg(
    operator: &str,
    args: &[Value],
    index: usize,
    arg_name: &str,
) -> EvalResult<usize> {
    let raw = get_int_arg(operator, args, index, arg_name)?;
    usize::try_from(raw).map_err(|_| {
        EvalError::invalid_argument(operator, format!("'{arg_name}' must be non-negative"))
    })
}

/// Helper to get a number argument (int or float) with a better error message
pub(crate) fn get_number_arg(
    operator: &str,
    args: &[Value],
    index: usize,
    arg_name: &str,
) -> EvalResult<f64> {
    let value = args.get(index).ok_or_else(|| {
        EvalError::invalid_argument(
            operator,
            format!("missing argument '{arg_name}' at position {index}"),
        )
    })?;

    match value {
        Value::Number(n) => crate::value_utils::number_as_f64(n).ok_or_else(|| {
            EvalError::invalid_argument(operator, format!("argument '{arg_name}' is out of range"))
        }),
        other => Err(EvalError::invalid_argument(
            operator,
            format!(
                "argument '{}' must be a number, got {}",
                arg_name,
                value_type_name(other)
            ),
        )),
    }
}

/// Helper to get an array argument with a better error message
pub(crate) fn get_array_arg<'a>(
    operator: &str,
    args: &'a [Value],
    index: usize,
    arg_name: &str,
) -> EvalResult<&'a [Value]> {
    args.get(index)
        .ok_or_else(|| {
            EvalError::invalid_argument(
                operator,
                format!("missing argument '{arg_name}' at position {index}"),
            )
        })?
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| {
            EvalError::invalid_argument(
                operator,
                format!(
                    "argument '{}' must be an array, got {}",
                    arg_name,
                    value_type_name(&args[index])
                ),
            )
        })
}

/// Interpret a lazy payload as a named-field object
pub(crate) fn object_payload<'a>(
    operator: &str,
    payload: &'a Value,
) -> EvalResult<&'a Map<String, Value>> {
    payload.as_object().ok_or_else(|| {
        EvalError::invalid_argument(
            operator,
            format!("expects an object payload, got {}", value_type_name(payload)),
        )
    })
}

/// Fetch a required field from a lazy object payload
pub(crate) fn require_field<'a>(
    operator: &str,
    fields: &'a Map<String, Value>,
    name: &str,
) -> EvalResult<&'a Value> {
    fields
        .get(name)
        .ok_or_else(|| EvalError::missing_parameter(operator, name))
}
