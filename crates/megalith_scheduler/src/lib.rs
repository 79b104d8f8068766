//! # MEGALITH Scheduler
//!
//! Predicts which operations of a batch are independent and validates them
//! in parallel, while committing strictly in submission order.
//!
//! ## Architecture
//!
//! ```text
//! batch ──► analyzer::partition ──► [group 0] [group 1] ... [group n]
//!                                        │
//!                 ┌──────────────────────┼──────────────────────┐
//!                 ▼                      ▼                      ▼
//!            validate (worker)     validate (worker)     validate (worker)
//!                 └──────────────────────┼──────────────────────┘
//!                                        ▼
//!                          commit, one by one, submission order
//! ```

#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod analyzer;
pub mod error;
pub mod pool;
pub mod scheduler;
pub mod state;

pub use analyzer::{partition, ConflictGraph};
pub use error::{SchedulerError, SchedulerResult};
pub use pool::WorkerPool;
pub use scheduler::{CancelToken, Scheduler, SchedulerConfig, DEFAULT_MAX_BATCH_SIZE};
pub use state::{OpState, OperationResult, Rejection};
