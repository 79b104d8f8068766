//! # MEGALITH Ops
//!
//! Every World mutation is an [`Operation`]: an immutable forward effect, its
//! mechanically derived inverse, and the set of resources it reads and
//! writes.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐   plan    ┌─────────────┐  validate  ┌──────────┐
//! │ OperationCatalog │ ────────► │ BatchBuilder│ ─────────► │ Operation│
//! │  (by name)       │           │ scratch World│  commit   │ + inverse│
//! └──────────────────┘           └─────────────┘            └──────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use megalith_core::{Position, World};
//! use megalith_ops::BatchBuilder;
//!
//! let mut world = World::new();
//! let mut batch = BatchBuilder::new(&world);
//! let id = batch.create_entity();
//! batch.attach(id, Position::new(3.0, 4.0)).unwrap();
//!
//! let before = world.clone();
//! let ops = batch.build();
//! for op in &ops {
//!     op.apply(&mut world).unwrap();
//! }
//! for op in ops.iter().rev() {
//!     op.inverse().apply(&mut world).unwrap();
//! }
//! assert_eq!(world, before);
//! ```

#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod access;
pub mod builder;
pub mod catalog;
pub mod effect;
pub mod error;
pub mod operation;

pub use access::{Access, Resource};
pub use builder::BatchBuilder;
pub use catalog::{OperationCatalog, OperationInfo};
pub use effect::Effect;
pub use error::{OpResult, OperationError};
pub use operation::{Body, OpKind, Operation};
