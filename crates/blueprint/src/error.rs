//! Error types for blueprint evaluation
//!
//! All fallible operations in this crate return [`EvalResult`]. The error
//! enum distinguishes structural problems (unknown operator, malformed
//! expression) from operator-level failures (bad arguments, type mismatches,
//! exceeded limits) so callers can react to each category.

use thiserror::Error;

/// Result type for blueprint evaluation
pub type EvalResult<T> = Result<T, EvalError>;

/// Errors that can occur during blueprint evaluation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EvalError {
    /// Expression references an operator that is not registered
    #[error("unknown operator: {name}")]
    UnknownOperator {
        /// The operator name that failed to resolve
        name: String,
    },

    /// Expression object does not follow the single-operator-key shape
    #[error("malformed expression: {message}")]
    MalformedExpression {
        /// What was wrong with the expression
        message: String,
    },

    /// Operator received an argument it cannot work with
    #[error("invalid argument for {operator}: {message}")]
    InvalidArgument {
        /// Operator that rejected the argument
        operator: String,
        /// Details about the problem
        message: String,
    },

    /// Value had a different type than the operation expected
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Expected type name
        expected: String,
        /// Actual type name
        actual: String,
    },

    /// Transform operator was given a non-array input
    #[error("{operator} requires an array input")]
    ArrayInputRequired {
        /// Operator that required the array
        operator: String,
    },

    /// Operator payload is missing one of its required fields
    #[error("{operator} is missing required parameter '{parameter}'")]
    MissingParameter {
        /// Operator whose payload was incomplete
        operator: String,
        /// Name of the missing field
        parameter: String,
    },

    /// Division or modulo by zero
    #[error("division by zero")]
    DivisionByZero,

    /// Blueprint nesting exceeded the recursion limit
    #[error("maximum recursion depth exceeded ({max})")]
    RecursionLimit {
        /// The configured depth limit
        max: usize,
    },

    /// Bounded loop inside an operator ran past its iteration cap
    #[error("{operator} exceeded the iteration limit of {limit}")]
    IterationLimit {
        /// Operator whose loop was capped
        operator: String,
        /// The configured cap
        limit: usize,
    },

    /// Regex compilation or matching error
    #[cfg(feature = "regex")]
    #[error("regex error: {message}")]
    Regex {
        /// Details from the regex engine or the pattern guard
        message: String,
    },

    /// Date/time value could not be parsed or represented
    #[cfg(feature = "datetime")]
    #[error("invalid date: {message}")]
    InvalidDate {
        /// Details about the parse or range failure
        message: String,
    },
}

impl EvalError {
    /// Create an unknown-operator error
    pub fn unknown_operator(name: impl Into<String>) -> Self {
        Self::UnknownOperator { name: name.into() }
    }

    /// Create a malformed-expression error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedExpression {
            message: message.into(),
        }
    }

    /// Create an invalid-argument error
    pub fn invalid_argument(operator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            operator: operator.into(),
            message: message.into(),
        }
    }

    /// Create a type-mismatch error
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create an array-input-required error
    pub fn array_input_required(operator: impl Into<String>) -> Self {
        Self::ArrayInputRequired {
            operator: operator.into(),
        }
    }

    /// Create a missing-parameter error
    pub fn missing_parameter(operator: impl Into<String>, parameter: impl Into<String>) -> Self {
        Self::MissingParameter {
            operator: operator.into(),
            parameter: parameter.into(),
        }
    }

    /// Create a recursion-limit error
    pub fn recursion_limit(max: usize) -> Self {
        Self::RecursionLimit { max }
    }

    /// Create an iteration-limit error
    pub fn iteration_limit(operator: impl Into<String>, limit: usize) -> Self {
        Self::IterationLimit {
            operator: operator.into(),
            limit,
        }
    }

    /// Create a regex error
    #[cfg(feature = "regex")]
    pub fn regex(message: impl Into<String>) -> Self {
        Self::Regex {
            message: message.into(),
        }
    }

    /// Create an invalid-date error
    #[cfg(feature = "datetime")]
    pub fn invalid_date(message: impl Into<String>) -> Self {
        Self::InvalidDate {
            message: message.into(),
        }
    }

    /// Stable error code for logging and categorization
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownOperator { .. } => "BLUEPRINT:UNKNOWN_OPERATOR",
            Self::MalformedExpression { .. } => "BLUEPRINT:MALFORMED_EXPRESSION",
            Self::InvalidArgument { .. } => "BLUEPRINT:INVALID_ARGUMENT",
            Self::TypeMismatch { .. } => "BLUEPRINT:TYPE_MISMATCH",
            Self::ArrayInputRequired { .. } => "BLUEPRINT:ARRAY_INPUT_REQUIRED",
            Self::MissingParameter { .. } => "BLUEPRINT:MISSING_PARAMETER",
            Self::DivisionByZero => "BLUEPRINT:DIVISION_BY_ZERO",
            Self::RecursionLimit { .. } => "BLUEPRINT:RECURSION_LIMIT",
            Self::IterationLimit { .. } => "BLUEPRINT:ITERATION_LIMIT",
            #[cfg(feature = "regex")]
            Self::Regex { .. } => "BLUEPRINT:REGEX",
            #[cfg(feature = "datetime")]
            Self::InvalidDate { .. } => "BLUEPRINT:INVALID_DATE",
        }
    }
}

#[cfg(feature = "regex")]
impl From<regex::Error> for EvalError {
    fn from(err: regex::Error) -> Self {
        Self::regex(err.to_string())
    }
}

#[cfg(feature = "datetime")]
impl From<chrono::format::ParseError> for EvalError {
    fn from(err: chrono::format::ParseError) -> Self {
        Self::invalid_date(err.to_string())
    }
}
