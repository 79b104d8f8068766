//! # Operation Lifecycle
//!
//! ```text
//! Pending ──► Validating ──► Validated ──► Committed
//!    │             │
//!    └─────────────┴──────► Rejected
//! ```
//!
//! `Committed` and `Rejected` are terminal.

use std::fmt;

use crate::error::{SchedulerError, SchedulerResult};

/// Where a scheduled operation is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpState {
    /// Submitted, not yet looked at.
    Pending,
    /// Preconditions are being checked.
    Validating,
    /// Preconditions hold; waiting for its commit slot.
    Validated,
    /// Applied to the World.
    Committed,
    /// Dropped; see [`Rejection`].
    Rejected,
}

impl OpState {
    /// Whether the state machine has an edge `self -> to`.
    #[must_use]
    pub const fn can_transition(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::Validating | Self::Rejected)
                | (Self::Validating, Self::Validated | Self::Rejected)
                | (Self::Validated, Self::Committed)
        )
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::Rejected)
    }
}

/// Why an operation was dropped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// A precondition did not hold.
    ValidationFailed(String),
    /// The batch was cancelled before the operation's group ran.
    Cancelled,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationFailed(reason) => write!(f, "validation failed: {reason}"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Final outcome of one submitted operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OperationResult {
    /// Applied to the World.
    Committed,
    /// Dropped without touching the World.
    Rejected(Rejection),
}

impl OperationResult {
    /// Whether the operation was applied.
    #[inline]
    #[must_use]
    pub const fn is_committed(&self) -> bool {
        matches!(self, Self::Committed)
    }

    /// The rejection, if any.
    #[must_use]
    pub const fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Committed => None,
            Self::Rejected(rejection) => Some(rejection),
        }
    }
}

/// Tracks the state of every operation in a batch.
#[derive(Debug)]
pub(crate) struct Tracker {
    states: Vec<OpState>,
    rejections: Vec<Option<Rejection>>,
}

impl Tracker {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            states: vec![OpState::Pending; len],
            rejections: vec![None; len],
        }
    }

    pub(crate) fn state(&self, index: usize) -> OpState {
        self.states[index]
    }

    pub(crate) fn advance(&mut self, index: usize, to: OpState) -> SchedulerResult<()> {
        let from = self.states[index];
        if !from.can_transition(to) {
            return Err(SchedulerError::IllegalTransition { index, from, to });
        }
        self.states[index] = to;
        Ok(())
    }

    pub(crate) fn reject(&mut self, index: usize, rejection: Rejection) -> SchedulerResult<()> {
        self.advance(index, OpState::Rejected)?;
        self.rejections[index] = Some(rejection);
        Ok(())
    }

    /// Rejects every operation still pending.
    pub(crate) fn cancel_pending(&mut self) -> SchedulerResult<usize> {
        let pending: Vec<usize> = (0..self.states.len())
            .filter(|&i| self.states[i] == OpState::Pending)
            .collect();
        for &index in &pending {
            self.reject(index, Rejection::Cancelled)?;
        }
        Ok(pending.len())
    }

    /// Converts terminal states into results.
    pub(crate) fn finish(self) -> SchedulerResult<Vec<OperationResult>> {
        self.states
            .into_iter()
            .zip(self.rejections)
            .enumerate()
            .map(|(index, (state, rejection))| match (state, rejection) {
                (OpState::Committed, _) => Ok(OperationResult::Committed),
                (OpState::Rejected, Some(rejection)) => Ok(OperationResult::Rejected(rejection)),
                (from, _) => Err(SchedulerError::IllegalTransition {
                    index,
                    from,
                    to: OpState::Committed,
                }),
            })
            .collect()
    }
}
