//! # Engine Error Types
//!
//! Wraps the per-crate errors. Scheduler failures and the fatal history
//! errors poison the engine; everything else leaves it usable.

use megalith_history::HistoryError;
use megalith_ops::OperationError;
use megalith_rules::RuleError;
use megalith_scheduler::SchedulerError;
use thiserror::Error;

/// Errors surfaced by [`crate::Engine`].
#[derive(Error, Debug)]
pub enum EngineError {
    /// A previous fatal error stopped the engine.
    #[error("engine refuses work after a fatal error: {0}")]
    Poisoned(String),

    /// A configuration value is out of range or unparsable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    ConfigIo {
        /// The file.
        path: String,
        /// The underlying failure.
        #[source]
        source: std::io::Error,
    },

    /// Operation construction failed.
    #[error(transparent)]
    Operation(#[from] OperationError),

    /// The scheduler hit an internal failure.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// The operation log failed.
    #[error(transparent)]
    History(#[from] HistoryError),

    /// Feature evaluation failed.
    #[error(transparent)]
    Rule(#[from] RuleError),
}

impl EngineError {
    /// Whether this error poisons the engine.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        match self {
            Self::Scheduler(_) | Self::Poisoned(_) => true,
            Self::History(err) => err.is_fatal(),
            _ => false,
        }
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
