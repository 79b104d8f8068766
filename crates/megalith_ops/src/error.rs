//! # Operation Error Types
//!
//! Construction errors surface to the caller before anything is submitted;
//! validation errors become per-operation rejections in the scheduler.

use megalith_core::{EcsError, ParamError};
use thiserror::Error;

/// Errors raised while constructing, validating or committing operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    /// Parameters reference unknown entities or describe an impossible
    /// transition. Raised at construction time.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// A precondition does not hold against the current World.
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// The catalog has no operation with this name.
    #[error("unknown operation kind '{0}'")]
    UnknownKind(String),

    /// Arguments did not match the operation's schema.
    #[error(transparent)]
    Param(#[from] ParamError),

    /// A commit hit a registry error even though validation passed.
    #[error("commit after successful validation failed: {0}")]
    CommitFailed(#[from] EcsError),
}

impl OperationError {
    /// Shorthand for [`OperationError::InvalidOperation`].
    #[must_use]
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidOperation(reason.into())
    }

    /// Shorthand for [`OperationError::ValidationFailed`].
    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::ValidationFailed(reason.into())
    }
}

/// Result type for operations.
pub type OpResult<T> = Result<T, OperationError>;
