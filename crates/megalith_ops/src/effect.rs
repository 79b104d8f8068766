//! # Effects
//!
//! An [`Effect`] is one primitive World mutation together with the state it
//! expects to find. Every effect has an exact inverse, and the state an
//! effect overwrites is captured inside it, so validating an effect also
//! proves its inverse will restore the right data.

use std::fmt;

use megalith_core::{
    ComponentKind, ComponentMask, ComponentValue, Decode, DecodeError, Decoder, Digest, EcsResult,
    Encode, Encoder, EntityId, World,
};

use crate::access::{Access, Resource};
use crate::error::{OpResult, OperationError};

/// One primitive World mutation.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    /// Create exactly `entity`.
    Create {
        /// The planned id.
        entity: EntityId,
    },
    /// Un-create an empty entity (inverse of `Create`).
    Discard {
        /// The entity to remove.
        entity: EntityId,
    },
    /// Destroy an entity whose components are exactly `captured`.
    Destroy {
        /// The entity to destroy.
        entity: EntityId,
        /// Its components, in kind order.
        captured: Vec<ComponentValue>,
    },
    /// Revive a destroyed entity (inverse of `Destroy`).
    Restore {
        /// The id to revive.
        entity: EntityId,
        /// Components to reattach.
        components: Vec<ComponentValue>,
    },
    /// Attach a component the entity does not have.
    Attach {
        /// The target entity.
        entity: EntityId,
        /// The new component.
        value: ComponentValue,
    },
    /// Detach a component currently equal to `captured`.
    Detach {
        /// The target entity.
        entity: EntityId,
        /// The value being removed.
        captured: ComponentValue,
    },
    /// Swap `from` for `to`.
    Replace {
        /// The target entity.
        entity: EntityId,
        /// The value expected now.
        from: ComponentValue,
        /// The value afterwards.
        to: ComponentValue,
    },
    /// Apply `writes` to a World whose digest is `basis`, producing a World
    /// whose digest is `result`.
    Refresh {
        /// Digest the writes were planned against.
        basis: Digest,
        /// Digest after the writes.
        result: Digest,
        /// Independent component writes on distinct entities.
        writes: Vec<Effect>,
    },
}

/// Canonical equality: float fields compare by their encoded bits.
fn same(a: &ComponentValue, b: &ComponentValue) -> bool {
    a.to_canonical_bytes() == b.to_canonical_bytes()
}

fn same_all(a: &[ComponentValue], b: &[ComponentValue]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| same(x, y))
}

fn require_alive(world: &World, entity: EntityId) -> OpResult<()> {
    if world.is_alive(entity) {
        Ok(())
    } else {
        Err(OperationError::failed(format!("entity {entity} does not exist")))
    }
}

fn require_well_formed(value: &ComponentValue) -> OpResult<()> {
    value.check_well_formed().map_err(OperationError::ValidationFailed)
}

impl Effect {
    /// The entity this effect mutates. `Refresh` has none.
    #[must_use]
    pub const fn entity(&self) -> Option<EntityId> {
        match self {
            Self::Create { entity }
            | Self::Discard { entity }
            | Self::Destroy { entity, .. }
            | Self::Restore { entity, .. }
            | Self::Attach { entity, .. }
            | Self::Detach { entity, .. }
            | Self::Replace { entity, .. } => Some(*entity),
            Self::Refresh { .. } => None,
        }
    }

    /// The exact inverse.
    #[must_use]
    pub fn inverse(&self) -> Self {
        match self {
            Self::Create { entity } => Self::Discard { entity: *entity },
            Self::Discard { entity } => Self::Create { entity: *entity },
            Self::Destroy { entity, captured } => Self::Restore {
                entity: *entity,
                components: captured.clone(),
            },
            Self::Restore { entity, components } => Self::Destroy {
                entity: *entity,
                captured: components.clone(),
            },
            Self::Attach { entity, value } => Self::Detach {
                entity: *entity,
                captured: value.clone(),
            },
            Self::Detach { entity, captured } => Self::Attach {
                entity: *entity,
                value: captured.clone(),
            },
            Self::Replace { entity, from, to } => Self::Replace {
                entity: *entity,
                from: to.clone(),
                to: from.clone(),
            },
            Self::Refresh {
                basis,
                result,
                writes,
            } => Self::Refresh {
                basis: *result,
                result: *basis,
                writes: writes.iter().rev().map(Self::inverse).collect(),
            },
        }
    }

    /// Declared footprint.
    #[must_use]
    pub fn access(&self) -> Access {
        let mut access = Access::new();
        match self {
            Self::Create { entity } | Self::Discard { entity } => {
                access
                    .write(Resource::Allocator)
                    .write(Resource::slot(*entity));
            }
            Self::Destroy {
                entity,
                captured: components,
            }
            | Self::Restore { entity, components } => {
                access.write(Resource::slot(*entity));
                for value in components {
                    access
                        .write(Resource::component(*entity, value.kind()))
                        .write(Resource::Kind(value.kind()));
                }
            }
            Self::Attach {
                entity,
                value: component,
            }
            | Self::Detach {
                entity,
                captured: component,
            } => {
                access
                    .read(Resource::slot(*entity))
                    .write(Resource::component(*entity, component.kind()))
                    .write(Resource::Kind(component.kind()));
            }
            Self::Replace { entity, to, .. } => {
                access
                    .read(Resource::slot(*entity))
                    .write(Resource::component(*entity, to.kind()));
            }
            Self::Refresh { writes, .. } => {
                access = Access::whole_world();
                for write in writes {
                    access.merge(&write.access());
                }
            }
        }
        access
    }

    /// Checks every precondition against `world` without mutating it.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::ValidationFailed`] naming the first
    /// precondition that does not hold.
    pub fn validate(&self, world: &World) -> OpResult<()> {
        match self {
            Self::Create { entity } => {
                if world.can_create_at(*entity) {
                    Ok(())
                } else {
                    Err(OperationError::failed(format!(
                        "slot for {entity} is not available"
                    )))
                }
            }
            Self::Discard { entity } => {
                if world.can_discard(*entity) {
                    Ok(())
                } else {
                    Err(OperationError::failed(format!(
                        "{entity} cannot be discarded"
                    )))
                }
            }
            Self::Destroy { entity, captured } => {
                require_alive(world, *entity)?;
                let current = world
                    .components_of(*entity)
                    .map_err(|err| OperationError::failed(err.to_string()))?;
                if same_all(&current, captured) {
                    Ok(())
                } else {
                    Err(OperationError::failed(format!(
                        "components of {entity} changed since the operation was built"
                    )))
                }
            }
            Self::Restore { entity, components } => {
                if !world.can_restore(*entity) {
                    return Err(OperationError::failed(format!(
                        "{entity} cannot be restored"
                    )));
                }
                let mut seen = ComponentMask::EMPTY;
                for value in components {
                    if seen.contains(value.kind()) {
                        return Err(OperationError::failed(format!(
                            "duplicate {} component for {entity}",
                            value.kind()
                        )));
                    }
                    seen.insert(value.kind());
                    require_well_formed(value)?;
                }
                Ok(())
            }
            Self::Attach { entity, value } => {
                require_alive(world, *entity)?;
                if world.has(*entity, value.kind()) {
                    return Err(OperationError::failed(format!(
                        "{entity} already has a {} component",
                        value.kind()
                    )));
                }
                require_well_formed(value)
            }
            Self::Detach { entity, captured } => {
                require_alive(world, *entity)?;
                Self::expect_current(world, *entity, captured)
            }
            Self::Replace { entity, from, to } => {
                if from.kind() != to.kind() {
                    return Err(OperationError::failed(format!(
                        "cannot replace {} with {}",
                        from.kind(),
                        to.kind()
                    )));
                }
                require_alive(world, *entity)?;
                Self::expect_current(world, *entity, from)?;
                require_well_formed(to)
            }
            Self::Refresh { basis, writes, .. } => {
                if world.digest() != *basis {
                    return Err(OperationError::failed(
                        "world changed since the refresh was planned",
                    ));
                }
                writes.iter().try_for_each(|write| write.validate(world))
            }
        }
    }

    fn expect_current(world: &World, entity: EntityId, expected: &ComponentValue) -> OpResult<()> {
        match world.get_value(entity, expected.kind()) {
            Some(current) if same(&current, expected) => Ok(()),
            Some(_) => Err(OperationError::failed(format!(
                "{} of {entity} changed since the operation was built",
                expected.kind()
            ))),
            None => Err(OperationError::failed(format!(
                "{entity} has no {} component",
                expected.kind()
            ))),
        }
    }

    /// Mutates `world`. Only fails if [`Effect::validate`] was skipped or
    /// returned an error.
    ///
    /// # Errors
    ///
    /// Propagates the registry error that validation should have caught.
    pub fn apply(&self, world: &mut World) -> EcsResult<()> {
        match self {
            Self::Create { entity } => world.create_at(*entity),
            Self::Discard { entity } => world.discard(*entity),
            Self::Destroy { entity, .. } => world.destroy(*entity).map(drop),
            Self::Restore { entity, components } => world.restore(*entity, components.clone()),
            Self::Attach { entity, value } => world.attach(*entity, value.clone()),
            Self::Detach { entity, captured } => world.detach(*entity, captured.kind()).map(drop),
            Self::Replace { entity, to, .. } => world.replace(*entity, to.clone()).map(drop),
            Self::Refresh { writes, .. } => writes.iter().try_for_each(|write| write.apply(world)),
        }
    }

    /// Kinds of component this effect writes.
    #[must_use]
    pub fn kinds(&self) -> Vec<ComponentKind> {
        match self {
            Self::Create { .. } | Self::Discard { .. } => Vec::new(),
            Self::Destroy { captured: c, .. } | Self::Restore { components: c, .. } => {
                c.iter().map(ComponentValue::kind).collect()
            }
            Self::Attach { value: v, .. } | Self::Detach { captured: v, .. } => vec![v.kind()],
            Self::Replace { to, .. } => vec![to.kind()],
            Self::Refresh { writes, .. } => writes.iter().flat_map(Self::kinds).collect(),
        }
    }

    const fn tag(&self) -> u8 {
        match self {
            Self::Create { .. } => 0,
            Self::Discard { .. } => 1,
            Self::Destroy { .. } => 2,
            Self::Restore { .. } => 3,
            Self::Attach { .. } => 4,
            Self::Detach { .. } => 5,
            Self::Replace { .. } => 6,
            Self::Refresh { .. } => 7,
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create { entity } => write!(f, "create {entity}"),
            Self::Discard { entity } => write!(f, "discard {entity}"),
            Self::Destroy { entity, .. } => write!(f, "destroy {entity}"),
            Self::Restore { entity, .. } => write!(f, "restore {entity}"),
            Self::Attach { entity, value } => write!(f, "attach {} to {entity}", value.kind()),
            Self::Detach { entity, captured } => {
                write!(f, "detach {} from {entity}", captured.kind())
            }
            Self::Replace { entity, to, .. } => write!(f, "replace {} of {entity}", to.kind()),
            Self::Refresh { writes, .. } => write!(f, "refresh {} feature states", writes.len()),
        }
    }
}

impl Encode for Effect {
    fn encode(&self, enc: &mut Encoder) {
        enc.put_u8(self.tag());
        match self {
            Self::Create { entity } | Self::Discard { entity } => entity.encode(enc),
            Self::Destroy {
                entity,
                captured: components,
            }
            | Self::Restore { entity, components } => {
                entity.encode(enc);
                enc.put_seq(components);
            }
            Self::Attach {
                entity,
                value: component,
            }
            | Self::Detach {
                entity,
                captured: component,
            } => {
                entity.encode(enc);
                component.encode(enc);
            }
            Self::Replace { entity, from, to } => {
                entity.encode(enc);
                from.encode(enc);
                to.encode(enc);
            }
            Self::Refresh {
                basis,
                result,
                writes,
            } => {
                basis.encode(enc);
                result.encode(enc);
                enc.put_seq(writes);
            }
        }
    }
}

impl Decode for Effect {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        Ok(match dec.u8()? {
            0 => Self::Create {
                entity: EntityId::decode(dec)?,
            },
            1 => Self::Discard {
                entity: EntityId::decode(dec)?,
            },
            2 => Self::Destroy {
                entity: EntityId::decode(dec)?,
                captured: dec.seq()?,
            },
            3 => Self::Restore {
                entity: EntityId::decode(dec)?,
                components: dec.seq()?,
            },
            4 => Self::Attach {
                entity: EntityId::decode(dec)?,
                value: ComponentValue::decode(dec)?,
            },
            5 => Self::Detach {
                entity: EntityId::decode(dec)?,
                captured: ComponentValue::decode(dec)?,
            },
            6 => Self::Replace {
                entity: EntityId::decode(dec)?,
                from: ComponentValue::decode(dec)?,
                to: ComponentValue::decode(dec)?,
            },
            7 => Self::Refresh {
                basis: Digest::decode(dec)?,
                result: Digest::decode(dec)?,
                writes: dec.seq()?,
            },
            tag => {
                return Err(DecodeError::InvalidTag {
                    what: "effect",
                    tag: u32::from(tag),
                })
            }
        })
    }
}
