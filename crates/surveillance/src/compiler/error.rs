//! Compile-time and evaluation-time error types for filter predicates.

use crate::schema::{Field, Operator};

/// A filter tree that cannot be turned into a predicate.
///
/// `path` is a JSON-path-like location inside the profile, e.g.
/// `filter_tree.and[1].field`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("{path}: group must contain at least one condition")]
    EmptyGroup { path: String },

    #[error("{path}: unknown field '{field}'")]
    UnknownField {
        path: String,
        field: String,
        suggestion: Option<String>,
    },

    #[error("{path}: unknown operator '{operator}'")]
    UnknownOperator {
        path: String,
        operator: String,
        suggestion: Option<String>,
    },

    #[error("{path}: operator '{operator}' requires a non-empty list value")]
    ExpectedList { path: String, operator: Operator },

    #[error("{path}: operator '{operator}' requires a single value, got a list")]
    ExpectedScalar { path: String, operator: Operator },

    #[error("{path}: {reason}")]
    InvalidValue { path: String, reason: String },
}

impl CompileError {
    pub fn path(&self) -> &str {
        match self {
            CompileError::EmptyGroup { path }
            | CompileError::UnknownField { path, .. }
            | CompileError::UnknownOperator { path, .. }
            | CompileError::ExpectedList { path, .. }
            | CompileError::ExpectedScalar { path, .. }
            | CompileError::InvalidValue { path, .. } => path,
        }
    }

    /// "Did you mean …?" hint for misspelled names.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            CompileError::UnknownField { suggestion, .. }
            | CompileError::UnknownOperator { suggestion, .. } => suggestion.as_deref(),
            _ => None,
        }
    }
}

/// A runtime fault while applying one predicate to one killmail.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationError {
    #[error("field '{field}' holding {found} cannot be compared with '{operator}'")]
    TypeMismatch {
        field: Field,
        operator: Operator,
        found: String,
    },

    #[error("predicate panicked: {0}")]
    Panicked(String),
}
