//! # Scheduler Error Types
//!
//! Per-operation rejections are not errors; they are reported in
//! [`crate::OperationResult`]. Everything here aborts the batch.

use megalith_ops::OperationError;
use thiserror::Error;

use crate::state::OpState;

/// Errors that abort a scheduled batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// An operation was asked to move along an edge the state machine lacks.
    #[error("illegal transition for operation {index}: {from:?} -> {to:?}")]
    IllegalTransition {
        /// Submission index.
        index: usize,
        /// Current state.
        from: OpState,
        /// Requested state.
        to: OpState,
    },

    /// A commit failed although validation passed. The World may be
    /// partially mutated and must be rebuilt.
    #[error("operation {index} failed to commit: {source}")]
    CommitFailed {
        /// Submission index.
        index: usize,
        /// The underlying failure.
        source: OperationError,
    },

    /// A worker thread died before reporting a result.
    #[error("worker pool lost a validation result")]
    WorkerLost,

    /// Invalid scheduler configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;
