//! # Operations
//!
//! An [`Operation`] is the unit of versioning: an immutable description of
//! one World transition plus its inverse and its access footprint.
//!
//! ## Two-phase contract
//!
//! 1. [`Operation::validate`] - pure, checks every precondition
//! 2. [`Operation::commit`] - mutates, cannot fail once validation passed
//!
//! Composite operations carry sub-operations instead of an effect. The
//! scheduler analyzes and runs those children like a nested batch; the
//! serial [`Operation::apply`] runs them in order and rolls back on failure.

use std::fmt;

use megalith_core::{Decode, DecodeError, Decoder, Encode, Encoder, EntityId, ParamValue, World};

use crate::access::Access;
use crate::effect::Effect;
use crate::error::{OpResult, OperationError};

// ============================================================================
// KINDS
// ============================================================================

/// Every built-in operation kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
    /// Create one entity.
    CreateEntity,
    /// Destroy an entity and all its components.
    DestroyEntity,
    /// Attach a component.
    AttachComponent,
    /// Detach a component.
    DetachComponent,
    /// Replace a component.
    ReplaceComponent,
    /// Set an entity's position.
    MoveEntity,
    /// Set the application interaction mode.
    SetMode,
    /// Re-evaluate every feature and store the verdicts.
    RefreshFeatureStates,
    /// Move many entities by the same offset (composite).
    TranslateEntities,
}

impl OpKind {
    /// Every kind, in tag order.
    pub const ALL: [Self; 9] = [
        Self::CreateEntity,
        Self::DestroyEntity,
        Self::AttachComponent,
        Self::DetachComponent,
        Self::ReplaceComponent,
        Self::MoveEntity,
        Self::SetMode,
        Self::RefreshFeatureStates,
        Self::TranslateEntities,
    ];

    /// Scripting name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::CreateEntity => "create_entity",
            Self::DestroyEntity => "destroy_entity",
            Self::AttachComponent => "attach_component",
            Self::DetachComponent => "detach_component",
            Self::ReplaceComponent => "replace_component",
            Self::MoveEntity => "move_entity",
            Self::SetMode => "set_mode",
            Self::RefreshFeatureStates => "refresh_feature_states",
            Self::TranslateEntities => "translate_entities",
        }
    }

    /// Looks a kind up by [`OpKind::name`].
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Encode for OpKind {
    fn encode(&self, enc: &mut Encoder) {
        enc.put_u8(*self as u8);
    }
}

impl Decode for OpKind {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        let tag = dec.u8()?;
        Self::ALL
            .get(tag as usize)
            .copied()
            .ok_or(DecodeError::InvalidTag {
                what: "operation kind",
                tag: u32::from(tag),
            })
    }
}

// ============================================================================
// OPERATION
// ============================================================================

/// What an operation does when committed.
#[derive(Clone, Debug, PartialEq)]
pub enum Body {
    /// One effect and its inverse.
    Primitive {
        /// Applied on commit.
        forward: Effect,
        /// Restores the pre-commit World.
        inverse: Effect,
    },
    /// Sub-operations, committed atomically.
    Composite(Vec<Operation>),
}

/// An immutable, invertible World transition.
#[derive(Clone, Debug, PartialEq)]
pub struct Operation {
    kind: OpKind,
    inverted: bool,
    targets: Vec<EntityId>,
    params: Vec<(String, ParamValue)>,
    body: Body,
    access: Access,
}

impl Operation {
    /// Builds a primitive operation; the inverse and footprint are derived
    /// from `forward`.
    #[must_use]
    pub fn primitive(
        kind: OpKind,
        targets: Vec<EntityId>,
        params: Vec<(String, ParamValue)>,
        forward: Effect,
    ) -> Self {
        let inverse = forward.inverse();
        let access = forward.access();
        Self {
            kind,
            inverted: false,
            targets,
            params,
            body: Body::Primitive { forward, inverse },
            access,
        }
    }

    /// Builds a composite; its footprint is the union of the children's.
    #[must_use]
    pub fn composite(
        kind: OpKind,
        targets: Vec<EntityId>,
        params: Vec<(String, ParamValue)>,
        children: Vec<Self>,
    ) -> Self {
        let access = Self::union_access(&children);
        Self {
            kind,
            inverted: false,
            targets,
            params,
            body: Body::Composite(children),
            access,
        }
    }

    fn union_access(children: &[Self]) -> Access {
        let mut access = Access::new();
        for child in children {
            access.merge(&child.access);
        }
        access
    }

    /// The operation kind.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> OpKind {
        self.kind
    }

    /// Whether this is the inverse of a submitted operation.
    #[inline]
    #[must_use]
    pub const fn is_inverted(&self) -> bool {
        self.inverted
    }

    /// Entities named by the caller.
    #[must_use]
    pub fn targets(&self) -> &[EntityId] {
        &self.targets
    }

    /// Parameters as supplied to the catalog.
    #[must_use]
    pub fn params(&self) -> &[(String, ParamValue)] {
        &self.params
    }

    /// The body.
    #[must_use]
    pub const fn body(&self) -> &Body {
        &self.body
    }

    /// Read/write footprint.
    #[must_use]
    pub const fn access(&self) -> &Access {
        &self.access
    }

    /// Sub-operations of a composite; empty for primitives.
    #[must_use]
    pub fn children(&self) -> &[Self] {
        match &self.body {
            Body::Composite(children) => children,
            Body::Primitive { .. } => &[],
        }
    }

    /// Whether this operation is decomposable.
    #[must_use]
    pub const fn is_composite(&self) -> bool {
        matches!(self.body, Body::Composite(_))
    }

    /// The operation that undoes this one.
    #[must_use]
    pub fn inverse(&self) -> Self {
        let body = match &self.body {
            Body::Primitive { forward, inverse } => Body::Primitive {
                forward: inverse.clone(),
                inverse: forward.clone(),
            },
            Body::Composite(children) => {
                Body::Composite(children.iter().rev().map(Self::inverse).collect())
            }
        };
        Self {
            kind: self.kind,
            inverted: !self.inverted,
            targets: self.targets.clone(),
            params: self.params.clone(),
            body,
            access: self.access.clone(),
        }
    }

    // =========================================================================
    // Two-phase execution
    // =========================================================================

    /// Checks preconditions against `world`. Pure.
    ///
    /// Composites are checked by running their children on a scratch copy.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::ValidationFailed`] with the failing reason.
    pub fn validate(&self, world: &World) -> OpResult<()> {
        match &self.body {
            Body::Primitive { forward, .. } => forward.validate(world),
            Body::Composite(children) => {
                let mut scratch = world.clone();
                for (index, child) in children.iter().enumerate() {
                    child
                        .apply(&mut scratch)
                        .map_err(|err| Self::child_failed(index, child, &err))?;
                }
                Ok(())
            }
        }
    }

    /// Mutates `world`. Call only after [`Operation::validate`] succeeded
    /// against the same World state.
    ///
    /// # Errors
    ///
    /// [`OperationError::CommitFailed`] means validation was skipped or is
    /// out of date; callers treat it as an engine bug.
    pub fn commit(&self, world: &mut World) -> OpResult<()> {
        match &self.body {
            Body::Primitive { forward, .. } => Ok(forward.apply(world)?),
            Body::Composite(children) => {
                children.iter().try_for_each(|child| child.commit(world))
            }
        }
    }

    /// Validates then commits, serially. A composite is atomic: if a child
    /// is rejected, the children already committed are undone in reverse
    /// order and `world` is left untouched.
    ///
    /// # Errors
    ///
    /// Returns the validation error of the first rejected (sub-)operation.
    pub fn apply(&self, world: &mut World) -> OpResult<()> {
        match &self.body {
            Body::Primitive { forward, .. } => {
                forward.validate(world)?;
                Ok(forward.apply(world)?)
            }
            Body::Composite(children) => {
                for (index, child) in children.iter().enumerate() {
                    if let Err(err) = child.apply(world) {
                        for done in children[..index].iter().rev() {
                            done.inverse().commit(world)?;
                        }
                        return Err(Self::child_failed(index, child, &err));
                    }
                }
                Ok(())
            }
        }
    }

    /// Error for a rejected sub-operation.
    #[must_use]
    pub fn child_failed(index: usize, child: &Self, err: &OperationError) -> OperationError {
        let reason = match err {
            OperationError::ValidationFailed(reason) => reason.clone(),
            other => other.to_string(),
        };
        OperationError::failed(format!("sub-operation {index} ({child}) rejected: {reason}"))
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.inverted {
            f.write_str("undo ")?;
        }
        write!(f, "{}(", self.kind)?;
        for (i, target) in self.targets.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{target}")?;
        }
        f.write_str(")")
    }
}

// ============================================================================
// ENCODING
// ============================================================================

impl Encode for Operation {
    /// ```text
    /// [1: kind][1: inverted][targets][4: param count]([name][value])*
    /// [1: body tag] primitive: [forward][inverse] | composite: [children]
    /// ```
    fn encode(&self, enc: &mut Encoder) {
        self.kind.encode(enc);
        enc.put_bool(self.inverted);
        enc.put_seq(&self.targets);
        enc.put_len(self.params.len());
        for (name, value) in &self.params {
            enc.put_str(name);
            value.encode(enc);
        }
        match &self.body {
            Body::Primitive { forward, inverse } => {
                enc.put_u8(0);
                forward.encode(enc);
                inverse.encode(enc);
            }
            Body::Composite(children) => {
                enc.put_u8(1);
                enc.put_seq(children);
            }
        }
    }
}

impl Decode for Operation {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        let kind = OpKind::decode(dec)?;
        let inverted = dec.bool()?;
        let targets = dec.seq()?;
        let count = dec.len()?;
        let mut params = Vec::with_capacity(count.min(dec.remaining()));
        for _ in 0..count {
            let name = dec.string()?;
            params.push((name, ParamValue::decode(dec)?));
        }
        let (body, access) = match dec.u8()? {
            0 => {
                let forward = Effect::decode(dec)?;
                let inverse = Effect::decode(dec)?;
                let access = forward.access();
                (Body::Primitive { forward, inverse }, access)
            }
            1 => {
                let children: Vec<Self> = dec.seq()?;
                let access = Self::union_access(&children);
                (Body::Composite(children), access)
            }
            tag => {
                return Err(DecodeError::InvalidTag {
                    what: "operation body",
                    tag: u32::from(tag),
                })
            }
        };
        Ok(Self {
            kind,
            inverted,
            targets,
            params,
            body,
            access,
        })
    }
}
