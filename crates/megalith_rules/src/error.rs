//! # Rule Error Types

use megalith_core::ParamError;
use thiserror::Error;

/// Errors raised by rule evaluation and the predicate catalog.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    /// No entity declares this feature id.
    #[error("unknown feature '{0}'")]
    UnknownFeature(String),

    /// The catalog has no predicate with this name.
    #[error("unknown predicate '{0}'")]
    UnknownPredicate(String),

    /// Arguments did not match the predicate's schema.
    #[error(transparent)]
    Param(#[from] ParamError),
}

/// Result type for rule operations.
pub type RuleResult<T> = Result<T, RuleError>;
