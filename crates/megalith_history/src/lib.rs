//! # MEGALITH History
//!
//! A content-addressed, append-only log of executed batches.
//!
//! ## Model
//!
//! ```text
//! genesis ── c1 ── c2 ── c3        (main)
//!              \
//!               c2' ── c3'         (experiment)
//! ```
//!
//! Each commit names its parent, the committed operations and the digest of
//! the resulting World. HEAD is either attached to a branch or detached at a
//! commit. Any World can be rebuilt by replaying commits from genesis (or a
//! cached snapshot), and every replay is checked against the recorded digest.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use megalith_core::World;
//! use megalith_history::{MemoryStore, OperationLog};
//! use megalith_ops::BatchBuilder;
//!
//! let mut log = OperationLog::open(Arc::new(MemoryStore::new()), 16).unwrap();
//! let mut world = World::new();
//! let before = world.clone();
//!
//! let mut batch = BatchBuilder::new(&world);
//! batch.create_entity();
//! let ops = batch.build();
//! for op in &ops {
//!     op.apply(&mut world).unwrap();
//! }
//! log.record(&before, ops, &world, true).unwrap();
//!
//! log.undo(&mut world).unwrap();
//! assert_eq!(world, before);
//! ```

#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod commit;
pub mod error;
pub mod log;
pub mod object;
pub mod store;

pub use commit::Commit;
pub use error::{HistoryError, HistoryResult};
pub use log::{is_valid_branch_name, OperationLog, DEFAULT_BRANCH, DEFAULT_SNAPSHOT_INTERVAL};
pub use object::ObjectKind;
pub use store::{DiskStore, Head, MemoryStore, ObjectStore};
