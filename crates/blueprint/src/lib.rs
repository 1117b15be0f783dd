//! Declarative JSON blueprint evaluation.
//!
//! A **blueprint** is a JSON tree mixing literal values, `$`-prefixed path
//! references, and single-key operator expressions. Evaluating it against a
//! **source record** produces a result with the blueprint's shape, where
//! every reference and expression has been replaced by its computed value.
//!
//! ```
//! use remold_blueprint::evaluate;
//! use serde_json::json;
//!
//! let source = json!({
//!     "customer": {"name": "Ada"},
//!     "items": [
//!         {"price": 10.0, "quantity": 2},
//!         {"price": 5.0, "quantity": 1}
//!     ]
//! });
//! let blueprint = json!({
//!     "greeting": {"$concat": ["Hello, ", "$customer.name", "!"]},
//!     "total": {
//!         "$sum": {
//!             "$map": {
//!                 "input": "$items",
//!                 "expression": {"$multiply": ["$current.price", "$current.quantity"]}
//!             }
//!         }
//!     }
//! });
//!
//! let result = evaluate(&source, &blueprint)?;
//! assert_eq!(result, json!({"greeting": "Hello, Ada!", "total": 25}));
//! # Ok::<(), remold_blueprint::EvalError>(())
//! ```
//!
//! # Evaluation model
//!
//! - Strings starting with `$` are dot-separated paths into the source
//!   record (`"$customer.name"`, `"$items.0.price"`), unless they name a
//!   registered operator. Missing paths resolve to null, never an error.
//! - A single-key object whose key is a registered operator is an
//!   expression; its result replaces the object. A failed expression
//!   becomes null instead of aborting the evaluation, so the result always
//!   keeps the blueprint's shape.
//! - The transforms `$map`, `$filter` and `$reduce` resolve a fragment per
//!   element with `$current`, `$index` and (for `$reduce`) `$accumulated`
//!   available as ordinary paths.
//!
//! The full operator catalog lives in [`operators`]; custom operators are
//! registered through [`Engine::register_operator`].
//!
//! # Cargo features
//!
//! - `regex` (default): `$regexMatch`, `$regexExtract`, `$regexReplace`
//!   with a bounded pattern cache
//! - `datetime` (default): `$now`, `$dateParse`, `$dateFormat`, date
//!   arithmetic and business-day calendar math

pub mod context;
pub mod engine;
pub mod error;
pub mod operators;
pub mod path;
pub mod resolve;
pub mod value_utils;

pub use context::{ExecutionContext, augment};
pub use engine::{Engine, evaluate};
pub use error::{EvalError, EvalResult};
pub use operators::{Operator, OperatorFn, OperatorRegistry};
pub use path::resolve_path;
pub use resolve::{MAX_RECURSION_DEPTH, Resolver, Scope};

/// Common imports for working with blueprints
pub mod prelude {
    pub use crate::context::ExecutionContext;
    pub use crate::engine::{Engine, evaluate};
    pub use crate::error::{EvalError, EvalResult};
    pub use crate::operators::{Operator, OperatorFn, OperatorRegistry};
    pub use crate::resolve::{Resolver, Scope};
}
