//! # Entity Management
//!
//! An entity is nothing but an id: a slot index plus the generation of the
//! slot when the id was issued. A destroyed entity's slot is reused with the
//! generation bumped, so an old id can never reach the new occupant.

use std::fmt;

use super::component::{ComponentKind, ComponentMask};
use crate::encoding::{Decode, Decoder, Encode, Encoder};
use crate::error::DecodeError;

/// Packed entity id: slot index in the low word, generation in the high word.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// Packs a slot index and generation.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | (index as u64))
    }

    /// Slot index.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    /// Generation of the slot when this id was issued.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Returns the packed 64-bit representation.
    #[inline]
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        self.0
    }

    /// Rebuilds an id from [`EntityId::to_bits`].
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Never issued by a World.
    pub const NULL: Self = Self(u64::MAX);

    /// Whether this is [`EntityId::NULL`].
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u64::MAX
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("e(null)")
        } else {
            write!(f, "e{}v{}", self.index(), self.generation())
        }
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl Encode for EntityId {
    fn encode(&self, enc: &mut Encoder) {
        enc.put_u64(self.0);
    }
}

impl Decode for EntityId {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        Ok(Self(dec.u64()?))
    }
}

/// One row of the registry's slot table.
///
/// A dead slot keeps the generation of the id it last held, so the next id
/// issued from it is `generation + 1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntitySlot {
    /// The id currently (or last) held by this slot.
    pub id: EntityId,
    /// Bitmask of attached component kinds.
    pub component_mask: ComponentMask,
    /// Whether this slot is currently alive.
    pub alive: bool,
}

impl EntitySlot {
    /// Creates a live slot with no components.
    #[inline]
    #[must_use]
    pub const fn new(id: EntityId) -> Self {
        Self {
            id,
            component_mask: ComponentMask::EMPTY,
            alive: true,
        }
    }

    /// Checks if this slot carries a component kind.
    #[inline]
    #[must_use]
    pub const fn has_component(self, kind: ComponentKind) -> bool {
        self.component_mask.contains(kind)
    }

    /// The id that would be issued if this slot were reused.
    #[inline]
    #[must_use]
    pub const fn next_id(self) -> EntityId {
        EntityId::new(self.id.index(), self.id.generation().wrapping_add(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_and_generation_unpack() {
        let id = EntityId::new(41, 9);
        assert_eq!(id.index(), 41);
        assert_eq!(id.generation(), 9);
        assert_eq!(EntityId::from_bits(id.to_bits()), id);
    }

    #[test]
    fn test_slot_component_mask() {
        let mut slot = EntitySlot::new(EntityId::new(0, 0));
        assert!(!slot.has_component(ComponentKind::Tool));

        slot.component_mask.insert(ComponentKind::Tool);
        assert!(slot.has_component(ComponentKind::Tool));

        slot.component_mask.remove(ComponentKind::Tool);
        assert!(!slot.has_component(ComponentKind::Tool));
    }

    #[test]
    fn test_next_id_bumps_generation() {
        let slot = EntitySlot::new(EntityId::new(7, 3));
        assert_eq!(slot.next_id(), EntityId::new(7, 4));
    }

    #[test]
    fn test_display() {
        assert_eq!(EntityId::new(2, 1).to_string(), "e2v1");
        assert_eq!(EntityId::NULL.to_string(), "e(null)");
    }
}
