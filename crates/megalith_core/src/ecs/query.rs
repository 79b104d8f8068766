//! # Queries
//!
//! Lazy, finite, restartable iteration over entities matching a kind set.

use super::component::ComponentMask;
use super::entity::{EntityId, EntitySlot};

/// Iterator over live entities whose mask contains a required set of kinds.
///
/// Walks the slot table in ascending index order. Cloning a query (or calling
/// [`Query::restart`]) starts the walk again from the first slot.
#[derive(Clone, Debug)]
pub struct Query<'w> {
    slots: &'w [EntitySlot],
    required: ComponentMask,
    cursor: usize,
}

impl<'w> Query<'w> {
    pub(crate) const fn new(slots: &'w [EntitySlot], required: ComponentMask) -> Self {
        Self {
            slots,
            required,
            cursor: 0,
        }
    }

    /// The kinds every yielded entity carries.
    #[inline]
    #[must_use]
    pub const fn required(&self) -> ComponentMask {
        self.required
    }

    /// Rewinds to the first slot.
    pub fn restart(&mut self) {
        self.cursor = 0;
    }
}

impl Iterator for Query<'_> {
    type Item = EntityId;

    fn next(&mut self) -> Option<EntityId> {
        while let Some(slot) = self.slots.get(self.cursor) {
            self.cursor += 1;
            if slot.alive && slot.component_mask.contains_all(self.required) {
                return Some(slot.id);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.slots.len().saturating_sub(self.cursor)))
    }
}

impl std::iter::FusedIterator for Query<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::component::ComponentKind;

    #[test]
    fn test_restart() {
        let mut slot = EntitySlot::new(EntityId::new(0, 0));
        slot.component_mask.insert(ComponentKind::Name);
        let slots = [slot, EntitySlot::new(EntityId::new(1, 0))];

        let mut query = Query::new(&slots, ComponentMask::of(&[ComponentKind::Name]));
        assert_eq!(query.next(), Some(EntityId::new(0, 0)));
        assert_eq!(query.next(), None);
        query.restart();
        assert_eq!(query.next(), Some(EntityId::new(0, 0)));
    }

    #[test]
    fn test_dead_slots_skipped() {
        let mut dead = EntitySlot::new(EntityId::new(0, 0));
        dead.alive = false;
        let slots = [dead, EntitySlot::new(EntityId::new(1, 0))];
        let query = Query::new(&slots, ComponentMask::EMPTY);
        assert_eq!(query.collect::<Vec<_>>(), vec![EntityId::new(1, 0)]);
    }
}
