//! Per-iteration execution state for array transforms
//!
//! When `$map`, `$filter`, or `$reduce` walk an array, each step runs its
//! inner expression against the caller's source record plus the iteration
//! state: the element under the cursor, its position, and (for folds) the
//! accumulator. [`augment`] layers that state onto the record as ordinary
//! fields, so inner expressions address it with plain path references
//! (`$current`, `$index`, `$accumulated`) and no other part of the resolver
//! has to know transforms exist.

use std::borrow::Cow;

use serde_json::{Map, Value};

/// Iteration state threaded through array-transform operators.
///
/// Fields are `Option` so that *defined* falsy values survive: a `current`
/// of `null`, `0`, or `false` is still layered onto the record, while `None`
/// means the field is absent entirely (e.g. `accumulated` outside `$reduce`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionContext {
    /// Element under the iteration cursor
    pub current: Option<Value>,
    /// Zero-based position of the cursor
    pub index: Option<usize>,
    /// Fold accumulator (`$reduce` only)
    pub accumulated: Option<Value>,
}

impl ExecutionContext {
    /// Create an empty context with no iteration state
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for one `$map`/`$filter` step
    pub fn element(current: Value, index: usize) -> Self {
        Self {
            current: Some(current),
            index: Some(index),
            accumulated: None,
        }
    }

    /// Context for one `$reduce` step
    pub fn fold(current: Value, accumulated: Value, index: usize) -> Self {
        Self {
            current: Some(current),
            index: Some(index),
            accumulated: Some(accumulated),
        }
    }

    /// Set the current element
    pub fn with_current(mut self, current: Value) -> Self {
        self.current = Some(current);
        self
    }

    /// Set the cursor position
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    /// Set the accumulator
    pub fn with_accumulated(mut self, accumulated: Value) -> Self {
        self.accumulated = Some(accumulated);
        self
    }

    /// True when no iteration state is defined
    pub fn is_empty(&self) -> bool {
        self.current.is_none() && self.index.is_none() && self.accumulated.is_none()
    }
}

/// Layer iteration state onto a record as addressable fields.
///
/// With no context (or an empty one) the record is returned borrowed and
/// untouched. Otherwise the result is a copy of the record carrying up to
/// three extra fields, `current`, `accumulated`, and `index`, one per
/// defined context field. A non-object record cannot hold extra fields, so
/// the augmented record is then a fresh object holding only the iteration
/// state.
pub fn augment<'a>(record: &'a Value, ctx: Option<&ExecutionContext>) -> Cow<'a, Value> {
    let Some(ctx) = ctx else {
        return Cow::Borrowed(record);
    };
    if ctx.is_empty() {
        return Cow::Borrowed(record);
    }

    let mut fields = match record {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    if let Some(current) = &ctx.current {
        fields.insert("current".to_string(), current.clone());
    }
    if let Some(accumulated) = &ctx.accumulated {
        fields.insert("accumulated".to_string(), accumulated.clone());
    }
    if let Some(index) = ctx.index {
        fields.insert("index".to_string(), Value::from(index));
    }
    Cow::Owned(Value::Object(fields))
}
