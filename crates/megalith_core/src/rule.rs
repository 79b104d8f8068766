//! # Rule Expressions
//!
//! The data half of a RuleSet: a tree of named predicates joined by AND, OR
//! and NOT. Evaluation lives in `megalith_rules`; this module only defines the
//! shape so rule trees can be stored as components and hashed with the World.

use std::fmt;

use crate::ecs::{ComponentKind, EntityId, Mode};
use crate::encoding::{Decode, Decoder, Encode, Encoder};
use crate::error::DecodeError;

/// A leaf test over World state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Predicate {
    /// Always true.
    Always,
    /// Always false, with a fixed explanation.
    Never {
        /// Shown as the disable reason.
        reason: String,
    },
    /// At least `min` live entities carry `kind`.
    CountAtLeast {
        /// Kind to count.
        kind: ComponentKind,
        /// Inclusive lower bound.
        min: u32,
    },
    /// `entity` is alive and carries `kind`.
    HasComponent {
        /// Entity to inspect.
        entity: EntityId,
        /// Required kind.
        kind: ComponentKind,
    },
    /// `entity` is alive.
    EntityAlive {
        /// Entity to inspect.
        entity: EntityId,
    },
    /// The application [`Mode`] singleton equals `mode`.
    ModeIs {
        /// Expected mode.
        mode: Mode,
    },
    /// Another feature is currently enabled.
    FeatureEnabled {
        /// Feature id.
        feature: String,
    },
}

impl Predicate {
    /// Scripting name of this predicate.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Always => "always",
            Self::Never { .. } => "never",
            Self::CountAtLeast { .. } => "count_at_least",
            Self::HasComponent { .. } => "has_component",
            Self::EntityAlive { .. } => "entity_alive",
            Self::ModeIs { .. } => "mode_is",
            Self::FeatureEnabled { .. } => "feature_enabled",
        }
    }

    const fn tag(&self) -> u8 {
        match self {
            Self::Always => 0,
            Self::Never { .. } => 1,
            Self::CountAtLeast { .. } => 2,
            Self::HasComponent { .. } => 3,
            Self::EntityAlive { .. } => 4,
            Self::ModeIs { .. } => 5,
            Self::FeatureEnabled { .. } => 6,
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => f.write_str("always"),
            Self::Never { reason } => write!(f, "never({reason})"),
            Self::CountAtLeast { kind, min } => write!(f, "count({kind}) >= {min}"),
            Self::HasComponent { entity, kind } => write!(f, "{entity} has {kind}"),
            Self::EntityAlive { entity } => write!(f, "{entity} alive"),
            Self::ModeIs { mode } => write!(f, "mode == {}", mode.name()),
            Self::FeatureEnabled { feature } => write!(f, "feature '{feature}' enabled"),
        }
    }
}

/// A predicate tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RuleExpr {
    /// Leaf.
    Predicate(Predicate),
    /// True when every child is true. Empty is true.
    All(Vec<RuleExpr>),
    /// True when any child is true. Empty is false.
    Any(Vec<RuleExpr>),
    /// Negation.
    Not(Box<RuleExpr>),
}

impl RuleExpr {
    /// `Predicate::Always`.
    #[must_use]
    pub const fn always() -> Self {
        Self::Predicate(Predicate::Always)
    }

    /// `Predicate::Never`.
    #[must_use]
    pub fn never(reason: impl Into<String>) -> Self {
        Self::Predicate(Predicate::Never {
            reason: reason.into(),
        })
    }

    /// `Predicate::CountAtLeast`.
    #[must_use]
    pub const fn count_at_least(kind: ComponentKind, min: u32) -> Self {
        Self::Predicate(Predicate::CountAtLeast { kind, min })
    }

    /// `Predicate::ModeIs`.
    #[must_use]
    pub const fn mode_is(mode: Mode) -> Self {
        Self::Predicate(Predicate::ModeIs { mode })
    }

    /// `Predicate::FeatureEnabled`.
    #[must_use]
    pub fn feature_enabled(feature: impl Into<String>) -> Self {
        Self::Predicate(Predicate::FeatureEnabled {
            feature: feature.into(),
        })
    }

    /// Logical NOT.
    #[must_use]
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Entities named by any leaf.
    #[must_use]
    pub fn referenced_entities(&self) -> Vec<EntityId> {
        let mut out = Vec::new();
        self.visit(&mut |pred| match pred {
            Predicate::HasComponent { entity, .. } | Predicate::EntityAlive { entity } => {
                out.push(*entity);
            }
            _ => {}
        });
        out
    }

    /// Calls `f` on every leaf, depth first.
    pub fn visit(&self, f: &mut impl FnMut(&Predicate)) {
        match self {
            Self::Predicate(pred) => f(pred),
            Self::All(children) | Self::Any(children) => {
                for child in children {
                    child.visit(f);
                }
            }
            Self::Not(inner) => inner.visit(f),
        }
    }
}

impl From<Predicate> for RuleExpr {
    fn from(pred: Predicate) -> Self {
        Self::Predicate(pred)
    }
}

impl fmt::Display for RuleExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, children: &[RuleExpr], sep: &str) -> fmt::Result {
            f.write_str("(")?;
            for (i, child) in children.iter().enumerate() {
                if i > 0 {
                    f.write_str(sep)?;
                }
                write!(f, "{child}")?;
            }
            f.write_str(")")
        }
        match self {
            Self::Predicate(pred) => write!(f, "{pred}"),
            Self::All(children) => join(f, children, " AND "),
            Self::Any(children) => join(f, children, " OR "),
            Self::Not(inner) => write!(f, "NOT {inner}"),
        }
    }
}

// ============================================================================
// ENCODING
// ============================================================================

impl Encode for Predicate {
    fn encode(&self, enc: &mut Encoder) {
        enc.put_u8(self.tag());
        match self {
            Self::Always => {}
            Self::Never { reason } => enc.put_str(reason),
            Self::CountAtLeast { kind, min } => {
                kind.encode(enc);
                enc.put_u32(*min);
            }
            Self::HasComponent { entity, kind } => {
                entity.encode(enc);
                kind.encode(enc);
            }
            Self::EntityAlive { entity } => entity.encode(enc),
            Self::ModeIs { mode } => mode.encode(enc),
            Self::FeatureEnabled { feature } => enc.put_str(feature),
        }
    }
}

impl Decode for Predicate {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        Ok(match dec.u8()? {
            0 => Self::Always,
            1 => Self::Never {
                reason: dec.string()?,
            },
            2 => Self::CountAtLeast {
                kind: ComponentKind::decode(dec)?,
                min: dec.u32()?,
            },
            3 => Self::HasComponent {
                entity: EntityId::decode(dec)?,
                kind: ComponentKind::decode(dec)?,
            },
            4 => Self::EntityAlive {
                entity: EntityId::decode(dec)?,
            },
            5 => Self::ModeIs {
                mode: Mode::decode(dec)?,
            },
            6 => Self::FeatureEnabled {
                feature: dec.string()?,
            },
            tag => {
                return Err(DecodeError::InvalidTag {
                    what: "predicate",
                    tag: u32::from(tag),
                })
            }
        })
    }
}

impl Encode for RuleExpr {
    fn encode(&self, enc: &mut Encoder) {
        match self {
            Self::Predicate(pred) => {
                enc.put_u8(0);
                pred.encode(enc);
            }
            Self::All(children) => {
                enc.put_u8(1);
                enc.put_seq(children);
            }
            Self::Any(children) => {
                enc.put_u8(2);
                enc.put_seq(children);
            }
            Self::Not(inner) => {
                enc.put_u8(3);
                inner.encode(enc);
            }
        }
    }
}

impl Decode for RuleExpr {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        Ok(match dec.u8()? {
            0 => Self::Predicate(Predicate::decode(dec)?),
            1 => Self::All(dec.seq()?),
            2 => Self::Any(dec.seq()?),
            3 => Self::Not(Box::new(Self::decode(dec)?)),
            tag => {
                return Err(DecodeError::InvalidTag {
                    what: "rule expression",
                    tag: u32::from(tag),
                })
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_roundtrip() {
        let expr = RuleExpr::All(vec![
            RuleExpr::count_at_least(ComponentKind::Tool, 2),
            RuleExpr::mode_is(Mode::Natural).negate(),
            RuleExpr::Any(vec![
                RuleExpr::feature_enabled("tabs.move"),
                Predicate::EntityAlive {
                    entity: EntityId::new(1, 2),
                }
                .into(),
            ]),
        ]);
        let bytes = expr.to_canonical_bytes();
        assert_eq!(RuleExpr::from_canonical_bytes(&bytes).unwrap(), expr);
    }

    #[test]
    fn test_referenced_entities() {
        let e = EntityId::new(4, 0);
        let expr = RuleExpr::Not(Box::new(
            Predicate::HasComponent {
                entity: e,
                kind: ComponentKind::Tab,
            }
            .into(),
        ));
        assert_eq!(expr.referenced_entities(), vec![e]);
    }

    #[test]
    fn test_display() {
        let expr = RuleExpr::All(vec![
            RuleExpr::count_at_least(ComponentKind::Tool, 2),
            RuleExpr::always(),
        ]);
        assert_eq!(expr.to_string(), "(count(Tool) >= 2 AND always)");
    }
}
