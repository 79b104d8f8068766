//! # History Error Types
//!
//! `NonDeterministicBatch` and `HistoryCorruption` are fatal: the engine
//! stops accepting batches until it is rebuilt from the log.

use megalith_core::{DecodeError, Digest};
use thiserror::Error;

/// Errors raised by the operation log and object stores.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    /// No commit with this id exists.
    #[error("unknown commit {0}")]
    UnknownCommit(Digest),

    /// No branch with this name exists.
    #[error("unknown branch '{0}'")]
    UnknownBranch(String),

    /// A branch with this name already exists.
    #[error("branch '{0}' already exists")]
    BranchExists(String),

    /// Branch names are non-empty and contain no `/`, whitespace or `..`.
    #[error("invalid branch name '{0}'")]
    InvalidBranchName(String),

    /// HEAD is at the genesis commit.
    #[error("nothing to undo")]
    NothingToUndo,

    /// No commit to step forward to.
    #[error("nothing to redo")]
    NothingToRedo,

    /// Detached HEAD has several children; redo cannot choose.
    #[error("redo from {commit} is ambiguous: {children} children")]
    AmbiguousRedo {
        /// The current commit.
        commit: Digest,
        /// Number of known children.
        children: usize,
    },

    /// Re-executing a batch serially produced a different World.
    #[error("non-deterministic batch: expected world {expected}, serial replay gave {actual}")]
    NonDeterministicBatch {
        /// Digest of the World the scheduler produced.
        expected: Digest,
        /// Digest of the serial re-execution.
        actual: Digest,
    },

    /// Stored history does not reproduce its recorded digests.
    #[error("history corruption at commit {commit}: {reason}")]
    HistoryCorruption {
        /// The offending commit.
        commit: Digest,
        /// What did not match.
        reason: String,
    },

    /// An object could not be decoded.
    #[error("malformed object: {0}")]
    Decode(#[from] DecodeError),

    /// Filesystem failure in a disk store.
    #[error("object store I/O failed: {0}")]
    Io(String),
}

impl HistoryError {
    /// Whether the engine must stop accepting batches.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::NonDeterministicBatch { .. } | Self::HistoryCorruption { .. }
        )
    }

    pub(crate) fn corruption(commit: Digest, reason: impl Into<String>) -> Self {
        Self::HistoryCorruption {
            commit,
            reason: reason.into(),
        }
    }
}

/// Result type for history operations.
pub type HistoryResult<T> = Result<T, HistoryError>;
