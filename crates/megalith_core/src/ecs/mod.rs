//! # Entity Component System
//!
//! A deterministic ECS whose state hashes bit-for-bit.
//!
//! ## Design Philosophy
//!
//! - Components are stored in dense per-kind arrays
//! - Entity IDs are indices with generation counters
//! - Every iteration order is derived from entity indices, never from
//!   insertion history

mod component;
mod entity;
mod query;
mod storage;
mod world;

pub use component::{
    Component, ComponentKind, ComponentMask, ComponentValue, Feature, FeatureStatus, Mode, Name,
    Orientation, Parent, Position, Rect, RuleSet, Tab, TabType, Territory, Tool,
};
pub use entity::{EntityId, EntitySlot};
pub use query::Query;
pub use storage::{ComponentStorage, ComponentStore};
pub use world::World;
