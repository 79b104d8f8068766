//! # Component System
//!
//! Components are pure data containers with no behavior. Every record type is
//! one variant of the tagged union [`ComponentValue`]; there is no type
//! hierarchy. UI-facing descriptors (features, rule sets, interaction mode)
//! are components like any other, so they are versioned with the rest of the
//! World.

use std::fmt;

use super::entity::EntityId;
use super::storage::{ComponentStorage, ComponentStore};
use crate::encoding::{Decode, Decoder, Encode, Encoder};
use crate::error::DecodeError;
use crate::rule::RuleExpr;

// ============================================================================
// KINDS
// ============================================================================

/// Discriminant of every component type the engine stores.
///
/// The numeric value is the canonical tag; it never changes once assigned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ComponentKind {
    /// 2D placement.
    Position = 0,
    /// Human-readable label.
    Name = 1,
    /// Marks the entity as a tool.
    Tool = 2,
    /// A screen region holding tabs.
    Territory = 3,
    /// A tab inside a territory.
    Tab = 4,
    /// Link to a parent entity.
    Parent = 5,
    /// Application interaction mode.
    Mode = 6,
    /// UI feature descriptor.
    Feature = 7,
    /// Named predicate gating features.
    RuleSet = 8,
    /// Materialized verdict for a feature.
    FeatureStatus = 9,
}

impl ComponentKind {
    /// Every kind, in tag order.
    pub const ALL: [Self; 10] = [
        Self::Position,
        Self::Name,
        Self::Tool,
        Self::Territory,
        Self::Tab,
        Self::Parent,
        Self::Mode,
        Self::Feature,
        Self::RuleSet,
        Self::FeatureStatus,
    ];

    /// The canonical tag.
    #[inline]
    #[must_use]
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Looks a kind up by tag.
    #[must_use]
    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.get(tag as usize).copied()
    }

    /// Stable name used by the scripting layer.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Position => "Position",
            Self::Name => "Name",
            Self::Tool => "Tool",
            Self::Territory => "Territory",
            Self::Tab => "Tab",
            Self::Parent => "Parent",
            Self::Mode => "Mode",
            Self::Feature => "Feature",
            Self::RuleSet => "RuleSet",
            Self::FeatureStatus => "FeatureStatus",
        }
    }

    /// Looks a kind up by [`ComponentKind::name`].
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Encode for ComponentKind {
    fn encode(&self, enc: &mut Encoder) {
        enc.put_u8(self.tag());
    }
}

impl Decode for ComponentKind {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        let tag = dec.u8()?;
        Self::from_tag(tag).ok_or(DecodeError::InvalidTag {
            what: "component kind",
            tag: u32::from(tag),
        })
    }
}

/// Set of component kinds as a bitmask.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ComponentMask(u16);

impl ComponentMask {
    /// No kinds.
    pub const EMPTY: Self = Self(0);

    /// Builds a mask from a list of kinds.
    #[must_use]
    pub fn of(kinds: &[ComponentKind]) -> Self {
        let mut mask = Self::EMPTY;
        for &kind in kinds {
            mask.insert(kind);
        }
        mask
    }

    /// Checks membership.
    #[inline]
    #[must_use]
    pub const fn contains(self, kind: ComponentKind) -> bool {
        (self.0 & (1 << kind.tag())) != 0
    }

    /// Checks that every kind in `other` is present.
    #[inline]
    #[must_use]
    pub const fn contains_all(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Adds a kind.
    #[inline]
    pub fn insert(&mut self, kind: ComponentKind) {
        self.0 |= 1 << kind.tag();
    }

    /// Removes a kind.
    #[inline]
    pub fn remove(&mut self, kind: ComponentKind) {
        self.0 &= !(1 << kind.tag());
    }

    /// Whether no kind is present.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterates the present kinds in tag order.
    pub fn iter(self) -> impl Iterator<Item = ComponentKind> {
        ComponentKind::ALL
            .into_iter()
            .filter(move |kind| self.contains(*kind))
    }
}

// ============================================================================
// COMPONENT TRAIT
// ============================================================================

/// Marker trait for typed component access.
///
/// Each implementor owns one dense storage inside [`ComponentStore`].
pub trait Component:
    Clone + PartialEq + fmt::Debug + Send + Sync + Into<ComponentValue> + 'static
{
    /// The kind this type is stored under.
    const KIND: ComponentKind;

    /// This type's storage.
    fn storage(store: &ComponentStore) -> &ComponentStorage<Self>;

    /// This type's storage, mutably.
    fn storage_mut(store: &mut ComponentStore) -> &mut ComponentStorage<Self>;

    /// Unwraps the matching variant.
    fn from_value(value: ComponentValue) -> Option<Self>;
}

macro_rules! impl_component {
    ($ty:ident, $field:ident) => {
        impl Component for $ty {
            const KIND: ComponentKind = ComponentKind::$ty;

            #[inline]
            fn storage(store: &ComponentStore) -> &ComponentStorage<Self> {
                &store.$field
            }

            #[inline]
            fn storage_mut(store: &mut ComponentStore) -> &mut ComponentStorage<Self> {
                &mut store.$field
            }

            fn from_value(value: ComponentValue) -> Option<Self> {
                match value {
                    ComponentValue::$ty(inner) => Some(inner),
                    _ => None,
                }
            }
        }

        impl From<$ty> for ComponentValue {
            fn from(value: $ty) -> Self {
                ComponentValue::$ty(value)
            }
        }
    };
}

// ============================================================================
// RECORD TYPES
// ============================================================================

/// Position component.
///
/// A 2D placement in document space.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Position {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
}

impl Position {
    /// Creates a new position.
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Both coordinates are finite.
    #[inline]
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Returns this position moved by `(dx, dy)`.
    #[inline]
    #[must_use]
    pub fn translated(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Human-readable label.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Name(pub String);

/// Tool marker with its display label.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tool {
    /// Label shown in tool pickers.
    pub label: String,
}

impl Tool {
    /// Creates a tool with a label.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

/// Axis-aligned rectangle given by its corners.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    /// Left edge.
    pub min_x: f64,
    /// Bottom edge.
    pub min_y: f64,
    /// Right edge.
    pub max_x: f64,
    /// Top edge.
    pub max_y: f64,
}

impl Rect {
    /// Creates a rectangle from two corners.
    #[must_use]
    pub const fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Horizontal extent.
    #[must_use]
    pub fn width(self) -> f64 {
        self.max_x - self.min_x
    }

    /// Vertical extent.
    #[must_use]
    pub fn height(self) -> f64 {
        self.max_y - self.min_y
    }

    /// Finite and not inverted.
    #[must_use]
    pub fn is_valid(self) -> bool {
        [self.min_x, self.min_y, self.max_x, self.max_y]
            .iter()
            .all(|v| v.is_finite())
            && self.width() >= 0.0
            && self.height() >= 0.0
    }
}

/// Layout direction of a territory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Orientation {
    /// Tabs stack top to bottom.
    #[default]
    Vertical,
    /// Tabs stack left to right.
    Horizontal,
}

/// A screen region that hosts tabs.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Territory {
    /// Occupied region.
    pub rect: Rect,
    /// Tab layout direction.
    pub orientation: Orientation,
}

/// What a tab shows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TabType {
    /// File browser.
    #[default]
    FileSystem,
    /// Developer scratch area.
    DevBox,
    /// ECS inspector.
    Ecs,
    /// Glossary.
    Glossary,
    /// Document viewport.
    SiteView,
}

impl TabType {
    const ALL: [Self; 5] = [
        Self::FileSystem,
        Self::DevBox,
        Self::Ecs,
        Self::Glossary,
        Self::SiteView,
    ];
}

/// A tab living inside a territory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tab {
    /// Title.
    pub name: String,
    /// Single-glyph icon.
    pub icon: char,
    /// Content type.
    pub tab_type: TabType,
    /// Whether this is the territory's visible tab.
    pub active: bool,
}

impl Tab {
    /// The stock title and icon for a tab type.
    #[must_use]
    pub fn of_type(tab_type: TabType) -> Self {
        let (name, icon) = match tab_type {
            TabType::FileSystem => ("File", '📁'),
            TabType::DevBox => ("Dev Box", '🛠'),
            TabType::Ecs => ("ECS", '🍱'),
            TabType::Glossary => ("Glossary", '📖'),
            TabType::SiteView => ("Site View", '👁'),
        };
        Self {
            name: name.to_string(),
            icon,
            tab_type,
            active: false,
        }
    }
}

/// Link from a child entity (a tab) to its parent (a territory).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Parent(pub EntityId);

/// Application-wide interaction mode.
///
/// Stored on a single entity; rule sets use it to disable features that make
/// no sense mid-gesture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Mode {
    /// No territories exist yet.
    #[default]
    Empty,
    /// Normal operation.
    Natural,
    /// A tab move is underway.
    MovingTabs,
    /// A territory is being dragged.
    DraggingTerritories,
    /// A territory is being resized.
    ResizingTerritories,
    /// A saved layout is loading.
    LoadingLayouts,
}

impl Mode {
    /// Every mode, in tag order.
    pub const ALL: [Self; 6] = [
        Self::Empty,
        Self::Natural,
        Self::MovingTabs,
        Self::DraggingTerritories,
        Self::ResizingTerritories,
        Self::LoadingLayouts,
    ];

    /// Stable name used by the scripting layer.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Empty => "Empty",
            Self::Natural => "Natural",
            Self::MovingTabs => "MovingTabs",
            Self::DraggingTerritories => "DraggingTerritories",
            Self::ResizingTerritories => "ResizingTerritories",
            Self::LoadingLayouts => "LoadingLayouts",
        }
    }

    /// Looks a mode up by [`Mode::name`].
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|mode| mode.name() == name)
    }
}

impl Encode for Mode {
    fn encode(&self, enc: &mut Encoder) {
        enc.put_u8(*self as u8);
    }
}

impl Decode for Mode {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        let tag = dec.u8()?;
        Self::ALL
            .get(tag as usize)
            .copied()
            .ok_or(DecodeError::InvalidTag {
                what: "mode",
                tag: u32::from(tag),
            })
    }
}

/// A UI feature whose availability is governed by a rule set entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Feature {
    /// Stable feature id, e.g. `"territory.split"`.
    pub id: String,
    /// Entity carrying the governing [`RuleSet`].
    pub rule: EntityId,
}

/// A named predicate over World state.
#[derive(Clone, Debug, PartialEq)]
pub struct RuleSet {
    /// Rule set name, used in verdict reasons.
    pub name: String,
    /// The predicate tree.
    pub expr: RuleExpr,
    /// Help page reference surfaced with every verdict.
    pub help_ref: String,
}

/// Last materialized verdict for a feature.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FeatureStatus {
    /// Whether the feature was enabled.
    pub enabled: bool,
    /// Why it was disabled (empty when enabled).
    pub reason: String,
}

impl_component!(Position, positions);
impl_component!(Name, names);
impl_component!(Tool, tools);
impl_component!(Territory, territories);
impl_component!(Tab, tabs);
impl_component!(Parent, parents);
impl_component!(Mode, modes);
impl_component!(Feature, features);
impl_component!(RuleSet, rule_sets);
impl_component!(FeatureStatus, feature_statuses);

// ============================================================================
// TAGGED UNION
// ============================================================================

/// Any component, tagged by kind.
#[derive(Clone, Debug, PartialEq)]
pub enum ComponentValue {
    /// See [`Position`].
    Position(Position),
    /// See [`Name`].
    Name(Name),
    /// See [`Tool`].
    Tool(Tool),
    /// See [`Territory`].
    Territory(Territory),
    /// See [`Tab`].
    Tab(Tab),
    /// See [`Parent`].
    Parent(Parent),
    /// See [`Mode`].
    Mode(Mode),
    /// See [`Feature`].
    Feature(Feature),
    /// See [`RuleSet`].
    RuleSet(RuleSet),
    /// See [`FeatureStatus`].
    FeatureStatus(FeatureStatus),
}

impl ComponentValue {
    /// The kind of the wrapped record.
    #[must_use]
    pub const fn kind(&self) -> ComponentKind {
        match self {
            Self::Position(_) => ComponentKind::Position,
            Self::Name(_) => ComponentKind::Name,
            Self::Tool(_) => ComponentKind::Tool,
            Self::Territory(_) => ComponentKind::Territory,
            Self::Tab(_) => ComponentKind::Tab,
            Self::Parent(_) => ComponentKind::Parent,
            Self::Mode(_) => ComponentKind::Mode,
            Self::Feature(_) => ComponentKind::Feature,
            Self::RuleSet(_) => ComponentKind::RuleSet,
            Self::FeatureStatus(_) => ComponentKind::FeatureStatus,
        }
    }

    /// Entities this record points at.
    #[must_use]
    pub fn referenced_entities(&self) -> Vec<EntityId> {
        match self {
            Self::Parent(Parent(target)) => vec![*target],
            Self::Feature(feature) => vec![feature.rule],
            Self::RuleSet(rule_set) => rule_set.expr.referenced_entities(),
            _ => Vec::new(),
        }
    }

    /// Rejects records no operation may store: non-finite coordinates,
    /// inverted rectangles, empty identifiers.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason.
    pub fn check_well_formed(&self) -> Result<(), String> {
        match self {
            Self::Position(pos) if !pos.is_finite() => {
                Err(format!("position ({}, {}) is not finite", pos.x, pos.y))
            }
            Self::Territory(territory) if !territory.rect.is_valid() => {
                Err("territory rectangle is inverted or not finite".to_string())
            }
            Self::Feature(feature) if feature.id.is_empty() => {
                Err("feature id must not be empty".to_string())
            }
            Self::RuleSet(rule_set) if rule_set.name.is_empty() => {
                Err("rule set name must not be empty".to_string())
            }
            _ => Ok(()),
        }
    }
}

fn encode_rect(rect: Rect, enc: &mut Encoder) {
    enc.put_f64(rect.min_x);
    enc.put_f64(rect.min_y);
    enc.put_f64(rect.max_x);
    enc.put_f64(rect.max_y);
}

fn decode_rect(dec: &mut Decoder<'_>) -> Result<Rect, DecodeError> {
    Ok(Rect::new(dec.f64()?, dec.f64()?, dec.f64()?, dec.f64()?))
}

impl Encode for ComponentValue {
    fn encode(&self, enc: &mut Encoder) {
        enc.put_u8(self.kind().tag());
        match self {
            Self::Position(pos) => {
                enc.put_f64(pos.x);
                enc.put_f64(pos.y);
            }
            Self::Name(Name(name)) => enc.put_str(name),
            Self::Tool(tool) => enc.put_str(&tool.label),
            Self::Territory(territory) => {
                encode_rect(territory.rect, enc);
                enc.put_u8(match territory.orientation {
                    Orientation::Vertical => 0,
                    Orientation::Horizontal => 1,
                });
            }
            Self::Tab(tab) => {
                enc.put_str(&tab.name);
                enc.put_char(tab.icon);
                enc.put_u8(tab.tab_type as u8);
                enc.put_bool(tab.active);
            }
            Self::Parent(Parent(target)) => target.encode(enc),
            Self::Mode(mode) => mode.encode(enc),
            Self::Feature(feature) => {
                enc.put_str(&feature.id);
                feature.rule.encode(enc);
            }
            Self::RuleSet(rule_set) => {
                enc.put_str(&rule_set.name);
                rule_set.expr.encode(enc);
                enc.put_str(&rule_set.help_ref);
            }
            Self::FeatureStatus(status) => {
                enc.put_bool(status.enabled);
                enc.put_str(&status.reason);
            }
        }
    }
}

impl Decode for ComponentValue {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        let kind = ComponentKind::decode(dec)?;
        Ok(match kind {
            ComponentKind::Position => Self::Position(Position::new(dec.f64()?, dec.f64()?)),
            ComponentKind::Name => Self::Name(Name(dec.string()?)),
            ComponentKind::Tool => Self::Tool(Tool {
                label: dec.string()?,
            }),
            ComponentKind::Territory => {
                let rect = decode_rect(dec)?;
                let orientation = match dec.u8()? {
                    0 => Orientation::Vertical,
                    1 => Orientation::Horizontal,
                    tag => {
                        return Err(DecodeError::InvalidTag {
                            what: "orientation",
                            tag: u32::from(tag),
                        })
                    }
                };
                Self::Territory(Territory { rect, orientation })
            }
            ComponentKind::Tab => {
                let name = dec.string()?;
                let icon = dec.char()?;
                let tag = dec.u8()?;
                let tab_type =
                    TabType::ALL
                        .get(tag as usize)
                        .copied()
                        .ok_or(DecodeError::InvalidTag {
                            what: "tab type",
                            tag: u32::from(tag),
                        })?;
                let active = dec.bool()?;
                Self::Tab(Tab {
                    name,
                    icon,
                    tab_type,
                    active,
                })
            }
            ComponentKind::Parent => Self::Parent(Parent(EntityId::decode(dec)?)),
            ComponentKind::Mode => Self::Mode(Mode::decode(dec)?),
            ComponentKind::Feature => Self::Feature(Feature {
                id: dec.string()?,
                rule: EntityId::decode(dec)?,
            }),
            ComponentKind::RuleSet => Self::RuleSet(RuleSet {
                name: dec.string()?,
                expr: RuleExpr::decode(dec)?,
                help_ref: dec.string()?,
            }),
            ComponentKind::FeatureStatus => Self::FeatureStatus(FeatureStatus {
                enabled: dec.bool()?,
                reason: dec.string()?,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags_are_dense() {
        for (i, kind) in ComponentKind::ALL.iter().enumerate() {
            assert_eq!(kind.tag() as usize, i);
            assert_eq!(ComponentKind::from_name(kind.name()), Some(*kind));
        }
    }

    #[test]
    fn test_mask_iteration_order() {
        let mask = ComponentMask::of(&[ComponentKind::Tab, ComponentKind::Position]);
        let kinds: Vec<_> = mask.iter().collect();
        assert_eq!(kinds, vec![ComponentKind::Position, ComponentKind::Tab]);
        assert!(mask.contains_all(ComponentMask::of(&[ComponentKind::Tab])));
        assert!(!mask.contains_all(ComponentMask::of(&[ComponentKind::Tool])));
    }

    #[test]
    fn test_value_roundtrip_for_every_kind() {
        let values = vec![
            ComponentValue::from(Position::new(1.5, -2.0)),
            Name("root".into()).into(),
            Tool::new("pencil").into(),
            Territory {
                rect: Rect::new(0.0, 0.0, 100.0, 50.0),
                orientation: Orientation::Horizontal,
            }
            .into(),
            Tab::of_type(TabType::Glossary).into(),
            Parent(EntityId::new(3, 1)).into(),
            Mode::MovingTabs.into(),
            Feature {
                id: "territory.split".into(),
                rule: EntityId::new(4, 0),
            }
            .into(),
            RuleSet {
                name: "needs-two-tools".into(),
                expr: RuleExpr::always(),
                help_ref: "help/tools".into(),
            }
            .into(),
            FeatureStatus {
                enabled: false,
                reason: "mode".into(),
            }
            .into(),
        ];
        for value in values {
            let bytes = value.to_canonical_bytes();
            assert_eq!(ComponentValue::from_canonical_bytes(&bytes).unwrap(), value);
        }
    }

    #[test]
    fn test_well_formed_checks() {
        assert!(ComponentValue::from(Position::new(f64::NAN, 0.0))
            .check_well_formed()
            .is_err());
        assert!(ComponentValue::from(Territory {
            rect: Rect::new(10.0, 0.0, 0.0, 10.0),
            orientation: Orientation::Vertical,
        })
        .check_well_formed()
        .is_err());
        assert!(ComponentValue::from(Position::new(1.0, 2.0))
            .check_well_formed()
            .is_ok());
    }

    #[test]
    fn test_tab_defaults() {
        let tab = Tab::of_type(TabType::Ecs);
        assert_eq!(tab.name, "ECS");
        assert!(!tab.active);
    }
}
