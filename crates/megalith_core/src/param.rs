//! # Typed Parameters
//!
//! The scripting layer invokes operations and predicates by name with a list
//! of `(name, value)` pairs. This module defines the value types, their
//! declared schema, and a lookup helper that turns type mismatches into
//! [`ParamError`]s.

use std::fmt;

use crate::ecs::{ComponentKind, ComponentValue, EntityId, Mode};
use crate::encoding::{Decode, Decoder, Encode, Encoder};
use crate::error::{DecodeError, ParamError};
use crate::rule::RuleExpr;

/// Declared type of a parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// One entity id.
    Entity,
    /// A list of entity ids.
    Entities,
    /// A component kind.
    Kind,
    /// A full component record.
    Component,
    /// A float.
    Float,
    /// An unsigned integer.
    UInt,
    /// A string.
    Text,
    /// An interaction mode.
    Mode,
    /// A rule expression.
    Rule,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Entity => "entity",
            Self::Entities => "entities",
            Self::Kind => "kind",
            Self::Component => "component",
            Self::Float => "float",
            Self::UInt => "uint",
            Self::Text => "text",
            Self::Mode => "mode",
            Self::Rule => "rule",
        };
        f.write_str(name)
    }
}

/// A parameter value.
#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    /// See [`ParamKind::Entity`].
    Entity(EntityId),
    /// See [`ParamKind::Entities`].
    Entities(Vec<EntityId>),
    /// See [`ParamKind::Kind`].
    Kind(ComponentKind),
    /// See [`ParamKind::Component`].
    Component(ComponentValue),
    /// See [`ParamKind::Float`].
    Float(f64),
    /// See [`ParamKind::UInt`].
    UInt(u32),
    /// See [`ParamKind::Text`].
    Text(String),
    /// See [`ParamKind::Mode`].
    Mode(Mode),
    /// See [`ParamKind::Rule`].
    Rule(RuleExpr),
}

impl ParamValue {
    /// The declared type this value satisfies.
    #[must_use]
    pub const fn kind(&self) -> ParamKind {
        match self {
            Self::Entity(_) => ParamKind::Entity,
            Self::Entities(_) => ParamKind::Entities,
            Self::Kind(_) => ParamKind::Kind,
            Self::Component(_) => ParamKind::Component,
            Self::Float(_) => ParamKind::Float,
            Self::UInt(_) => ParamKind::UInt,
            Self::Text(_) => ParamKind::Text,
            Self::Mode(_) => ParamKind::Mode,
            Self::Rule(_) => ParamKind::Rule,
        }
    }
}

/// One entry of a callable's parameter schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParamSpec {
    /// Parameter name.
    pub name: &'static str,
    /// Expected type.
    pub kind: ParamKind,
}

impl ParamSpec {
    /// Shorthand constructor for static schema tables.
    #[must_use]
    pub const fn new(name: &'static str, kind: ParamKind) -> Self {
        Self { name, kind }
    }
}

/// Borrowed argument list checked against a schema.
#[derive(Clone, Copy, Debug)]
pub struct Args<'a> {
    values: &'a [(String, ParamValue)],
}

impl<'a> Args<'a> {
    /// Checks `values` against `schema`: every declared name present with the
    /// right type, no undeclared names.
    ///
    /// # Errors
    ///
    /// Returns the first [`ParamError`] found.
    pub fn check(values: &'a [(String, ParamValue)], schema: &[ParamSpec]) -> Result<Self, ParamError> {
        for (name, _) in values {
            if !schema.iter().any(|spec| spec.name == name) {
                return Err(ParamError::Unexpected(name.clone()));
            }
        }
        for spec in schema {
            let value = values
                .iter()
                .find(|(name, _)| name == spec.name)
                .map(|(_, value)| value)
                .ok_or_else(|| ParamError::Missing(spec.name.to_string()))?;
            if value.kind() != spec.kind {
                return Err(ParamError::WrongType {
                    name: spec.name.to_string(),
                    expected: spec.kind,
                    found: value.kind(),
                });
            }
        }
        Ok(Self { values })
    }

    fn get(&self, name: &str) -> Result<&'a ParamValue, ParamError> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value)
            .ok_or_else(|| ParamError::Missing(name.to_string()))
    }

    fn mismatch(name: &str, expected: ParamKind, found: &ParamValue) -> ParamError {
        ParamError::WrongType {
            name: name.to_string(),
            expected,
            found: found.kind(),
        }
    }

    /// Reads an entity parameter.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError`] if missing or of another type.
    pub fn entity(&self, name: &str) -> Result<EntityId, ParamError> {
        match self.get(name)? {
            ParamValue::Entity(id) => Ok(*id),
            other => Err(Self::mismatch(name, ParamKind::Entity, other)),
        }
    }

    /// Reads an entity list parameter.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError`] if missing or of another type.
    pub fn entities(&self, name: &str) -> Result<&'a [EntityId], ParamError> {
        match self.get(name)? {
            ParamValue::Entities(ids) => Ok(ids),
            other => Err(Self::mismatch(name, ParamKind::Entities, other)),
        }
    }

    /// Reads a component kind parameter.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError`] if missing or of another type.
    pub fn kind(&self, name: &str) -> Result<ComponentKind, ParamError> {
        match self.get(name)? {
            ParamValue::Kind(kind) => Ok(*kind),
            other => Err(Self::mismatch(name, ParamKind::Kind, other)),
        }
    }

    /// Reads a component parameter.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError`] if missing or of another type.
    pub fn component(&self, name: &str) -> Result<&'a ComponentValue, ParamError> {
        match self.get(name)? {
            ParamValue::Component(value) => Ok(value),
            other => Err(Self::mismatch(name, ParamKind::Component, other)),
        }
    }

    /// Reads a float parameter.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError`] if missing or of another type.
    pub fn float(&self, name: &str) -> Result<f64, ParamError> {
        match self.get(name)? {
            ParamValue::Float(v) => Ok(*v),
            other => Err(Self::mismatch(name, ParamKind::Float, other)),
        }
    }

    /// Reads an unsigned integer parameter.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError`] if missing or of another type.
    pub fn uint(&self, name: &str) -> Result<u32, ParamError> {
        match self.get(name)? {
            ParamValue::UInt(v) => Ok(*v),
            other => Err(Self::mismatch(name, ParamKind::UInt, other)),
        }
    }

    /// Reads a text parameter.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError`] if missing or of another type.
    pub fn text(&self, name: &str) -> Result<&'a str, ParamError> {
        match self.get(name)? {
            ParamValue::Text(v) => Ok(v),
            other => Err(Self::mismatch(name, ParamKind::Text, other)),
        }
    }

    /// Reads a mode parameter.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError`] if missing or of another type.
    pub fn mode(&self, name: &str) -> Result<Mode, ParamError> {
        match self.get(name)? {
            ParamValue::Mode(v) => Ok(*v),
            other => Err(Self::mismatch(name, ParamKind::Mode, other)),
        }
    }

    /// Reads a rule expression parameter.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError`] if missing or of another type.
    pub fn rule(&self, name: &str) -> Result<&'a RuleExpr, ParamError> {
        match self.get(name)? {
            ParamValue::Rule(v) => Ok(v),
            other => Err(Self::mismatch(name, ParamKind::Rule, other)),
        }
    }
}

/// Builds an owned argument list: `args![("entity", ParamValue::Entity(e))]`.
#[macro_export]
macro_rules! args {
    ($(($name:expr, $value:expr)),* $(,)?) => {
        vec![$((::std::string::String::from($name), $value)),*]
    };
}

impl Encode for ParamValue {
    fn encode(&self, enc: &mut Encoder) {
        enc.put_u8(self.kind() as u8);
        match self {
            Self::Entity(id) => id.encode(enc),
            Self::Entities(ids) => enc.put_seq(ids),
            Self::Kind(kind) => kind.encode(enc),
            Self::Component(value) => value.encode(enc),
            Self::Float(v) => enc.put_f64(*v),
            Self::UInt(v) => enc.put_u32(*v),
            Self::Text(v) => enc.put_str(v),
            Self::Mode(v) => v.encode(enc),
            Self::Rule(v) => v.encode(enc),
        }
    }
}

impl Decode for ParamValue {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        Ok(match dec.u8()? {
            0 => Self::Entity(EntityId::decode(dec)?),
            1 => Self::Entities(dec.seq()?),
            2 => Self::Kind(ComponentKind::decode(dec)?),
            3 => Self::Component(ComponentValue::decode(dec)?),
            4 => Self::Float(dec.f64()?),
            5 => Self::UInt(dec.u32()?),
            6 => Self::Text(dec.string()?),
            7 => Self::Mode(Mode::decode(dec)?),
            8 => Self::Rule(RuleExpr::decode(dec)?),
            tag => {
                return Err(DecodeError::InvalidTag {
                    what: "parameter",
                    tag: u32::from(tag),
                })
            }
        })
    }
}
