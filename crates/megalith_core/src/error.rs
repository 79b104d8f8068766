//! # ECS Error Types
//!
//! All errors that can occur while mutating or decoding a World.

use thiserror::Error;

use crate::ecs::{ComponentKind, EntityId};
use crate::param::ParamKind;

/// Errors raised by the Entity Registry and Component Store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// The entity was never created, was destroyed, or the id is stale.
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),

    /// Attempted to attach a kind the entity already carries.
    #[error("entity {entity} already has a {kind} component")]
    ComponentExists {
        /// The target entity.
        entity: EntityId,
        /// The duplicated kind.
        kind: ComponentKind,
    },

    /// Attempted to read, replace or detach a kind the entity does not carry.
    #[error("entity {entity} has no {kind} component")]
    ComponentMissing {
        /// The target entity.
        entity: EntityId,
        /// The missing kind.
        kind: ComponentKind,
    },

    /// The id cannot be created or restored in the slot it names.
    #[error("slot for entity {0} is not available")]
    SlotUnavailable(EntityId),

    /// An entity can only be discarded once it carries no components.
    #[error("entity {0} still has components attached")]
    HasComponents(EntityId),
}

/// Result type for ECS operations.
pub type EcsResult<T> = Result<T, EcsError>;

/// Errors raised while decoding canonical bytes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The input ended before a value was complete.
    #[error("unexpected end of input: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof {
        /// Bytes the decoder asked for.
        needed: usize,
        /// Bytes left in the input.
        remaining: usize,
    },

    /// A tag byte did not name any known variant.
    #[error("invalid {what} tag: {tag}")]
    InvalidTag {
        /// What was being decoded.
        what: &'static str,
        /// The offending tag.
        tag: u32,
    },

    /// A string field was not valid UTF-8.
    #[error("invalid utf-8 in string field")]
    InvalidUtf8,

    /// Bytes remained after the top-level value was decoded.
    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),
}

/// Errors raised while checking scripting arguments against a schema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParamError {
    /// A declared parameter was not supplied.
    #[error("missing parameter '{0}'")]
    Missing(String),

    /// A supplied parameter is not in the schema.
    #[error("unexpected parameter '{0}'")]
    Unexpected(String),

    /// A parameter has the wrong type.
    #[error("parameter '{name}' expects {expected}, got {found}")]
    WrongType {
        /// Parameter name.
        name: String,
        /// Declared type.
        expected: ParamKind,
        /// Supplied type.
        found: ParamKind,
    },
}
