//! # MEGALITH Core
//!
//! The data substrate of the engine: an Entity Component System whose state
//! can be hashed bit-for-bit.
//!
//! ## Architecture Rules
//!
//! 1. **Entities are ids** - a 32-bit index plus a 32-bit generation
//! 2. **Components are tagged data** - one [`ComponentKind`] per record type,
//!    stored densely per kind
//! 3. **Deterministic order** - every iteration walks entity indices upwards
//! 4. **One encoding** - digests, commit hashes and persisted records all use
//!    [`encoding`]
//!
//! ## Example
//!
//! ```rust
//! use megalith_core::{Position, World};
//!
//! let mut world = World::new();
//! let a = world.create();
//! world.attach(a, Position::new(0.0, 0.0).into()).unwrap();
//! assert_eq!(world.get::<Position>(a), Some(&Position::new(0.0, 0.0)));
//! ```

#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod digest;
pub mod ecs;
pub mod encoding;
pub mod error;
pub mod param;
pub mod rule;

pub use digest::Digest;
pub use ecs::{
    Component, ComponentKind, ComponentMask, ComponentStorage, ComponentStore, ComponentValue, EntityId,
    EntitySlot, Feature, FeatureStatus, Mode, Name, Orientation, Parent, Position, Query, Rect,
    RuleSet, Tab, TabType, Territory, Tool, World,
};
pub use encoding::{Decode, Decoder, Encode, Encoder};
pub use error::{DecodeError, EcsError, EcsResult, ParamError};
pub use param::{Args, ParamKind, ParamSpec, ParamValue};
pub use rule::{Predicate, RuleExpr};
