//! # ECS World
//!
//! The central container for all entities and components.
//!
//! A World is a plain value: cloning it yields an independent snapshot, and two
//! Worlds are equal exactly when their canonical encodings are equal. The
//! digest is computed lazily and cached until the next mutation.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use super::component::{Component, ComponentKind, ComponentMask, ComponentValue, Feature};
use super::entity::{EntityId, EntitySlot};
use super::query::Query;
use super::storage::ComponentStore;
use crate::digest::Digest;
use crate::encoding::{Decode, Decoder, Encode, Encoder};
use crate::error::{DecodeError, EcsError, EcsResult};

/// Leading bytes of every canonical World encoding.
const WORLD_MAGIC: &[u8; 4] = b"MWLD";

/// The ECS World - container for all engine state.
///
/// # Example
///
/// ```rust
/// use megalith_core::{ComponentKind, Tool, World};
///
/// let mut world = World::new();
/// let pen = world.create();
/// world.attach(pen, Tool::new("pen").into()).unwrap();
/// assert_eq!(world.count_with(ComponentKind::Tool), 1);
/// ```
#[derive(Clone, Debug, Default)]
pub struct World {
    /// Entity slot table, indexed by [`EntityId::index`].
    slots: Vec<EntitySlot>,
    /// Dead slot indices; derived from `slots`, never hashed.
    free: BTreeSet<u32>,
    /// Number of currently alive entities.
    alive_count: usize,

    // =========================================================================
    // Component Storages
    // =========================================================================
    store: ComponentStore,

    /// Cached digest, cleared by every mutation.
    digest: OnceLock<Digest>,
}

impl World {
    /// Creates an empty world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn touch(&mut self) {
        self.digest.take();
    }

    /// Returns the number of currently alive entities.
    #[inline]
    #[must_use]
    pub const fn alive_count(&self) -> usize {
        self.alive_count
    }

    /// Length of the slot table (alive and dead).
    #[inline]
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Read access to all component storages.
    #[inline]
    #[must_use]
    pub const fn store(&self) -> &ComponentStore {
        &self.store
    }

    #[inline]
    fn slot(&self, id: EntityId) -> Option<&EntitySlot> {
        if id.is_null() {
            return None;
        }
        self.slots.get(id.index() as usize)
    }

    fn live_slot_mut(&mut self, id: EntityId) -> EcsResult<&mut EntitySlot> {
        match self.slots.get_mut(id.index() as usize) {
            Some(slot) if !id.is_null() && slot.alive && slot.id == id => Ok(slot),
            _ => Err(EcsError::UnknownEntity(id)),
        }
    }

    /// Checks if an entity is alive.
    ///
    /// # Arguments
    ///
    /// * `id` - The entity ID to check
    #[inline]
    #[must_use]
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.slot(id).is_some_and(|slot| slot.alive && slot.id == id)
    }

    /// Component mask of a live entity.
    #[must_use]
    pub fn mask_of(&self, id: EntityId) -> Option<ComponentMask> {
        self.slot(id)
            .filter(|slot| slot.alive && slot.id == id)
            .map(|slot| slot.component_mask)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// The id the next [`World::create`] will return.
    ///
    /// The lowest dead index is reused at the next generation; otherwise a new
    /// slot is appended at generation 0.
    #[must_use]
    pub fn next_entity_id(&self) -> EntityId {
        match self.free.first() {
            Some(&index) => self.slots[index as usize].next_id(),
            #[allow(clippy::cast_possible_truncation)]
            None => EntityId::new(self.slots.len() as u32, 0),
        }
    }

    /// Creates a new entity with no components.
    pub fn create(&mut self) -> EntityId {
        let id = self.next_entity_id();
        self.occupy(id);
        id
    }

    /// Whether [`World::create_at`] would accept `id`.
    #[must_use]
    pub fn can_create_at(&self, id: EntityId) -> bool {
        if id.is_null() {
            return false;
        }
        let idx = id.index() as usize;
        match self.slots.get(idx) {
            Some(slot) => !slot.alive && slot.next_id() == id,
            None => idx == self.slots.len() && id.generation() == 0,
        }
    }

    /// Creates an entity with exactly the given id.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::SlotUnavailable`] unless the slot is dead and `id`
    /// carries its next generation, or `id` appends a fresh slot at generation 0.
    pub fn create_at(&mut self, id: EntityId) -> EcsResult<()> {
        if !self.can_create_at(id) {
            return Err(EcsError::SlotUnavailable(id));
        }
        self.occupy(id);
        Ok(())
    }

    fn occupy(&mut self, id: EntityId) {
        let idx = id.index() as usize;
        if idx == self.slots.len() {
            self.slots.push(EntitySlot::new(id));
        } else {
            self.slots[idx] = EntitySlot::new(id);
            self.free.remove(&id.index());
        }
        self.alive_count += 1;
        self.touch();
    }

    /// Whether [`World::discard`] would accept `id`.
    #[must_use]
    pub fn can_discard(&self, id: EntityId) -> bool {
        match self.slot(id) {
            Some(slot) if slot.alive && slot.id == id && slot.component_mask.is_empty() => {
                id.generation() > 0 || id.index() as usize + 1 == self.slots.len()
            }
            _ => false,
        }
    }

    /// Un-creates an empty entity, returning its slot to the exact state it
    /// had before the matching [`World::create_at`].
    ///
    /// # Errors
    ///
    /// - [`EcsError::UnknownEntity`] if `id` is not alive
    /// - [`EcsError::HasComponents`] if it still carries components
    /// - [`EcsError::SlotUnavailable`] if a later slot was appended after it
    pub fn discard(&mut self, id: EntityId) -> EcsResult<()> {
        let slot = self.live_slot_mut(id)?;
        if !slot.component_mask.is_empty() {
            return Err(EcsError::HasComponents(id));
        }
        if id.generation() == 0 {
            if id.index() as usize + 1 != self.slots.len() {
                return Err(EcsError::SlotUnavailable(id));
            }
            self.slots.pop();
        } else {
            slot.alive = false;
            slot.id = EntityId::new(id.index(), id.generation() - 1);
            self.free.insert(id.index());
        }
        self.alive_count -= 1;
        self.touch();
        Ok(())
    }

    /// Destroys an entity, detaching all its components in one step.
    ///
    /// # Returns
    ///
    /// The removed components in kind order.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownEntity`] if `id` is absent, stale or already
    /// destroyed.
    pub fn destroy(&mut self, id: EntityId) -> EcsResult<Vec<ComponentValue>> {
        let slot = self.live_slot_mut(id)?;
        let mask = slot.component_mask;
        slot.alive = false;
        slot.component_mask = ComponentMask::EMPTY;

        let removed = mask
            .iter()
            .filter_map(|kind| self.store.remove_value(id, kind))
            .collect();
        self.free.insert(id.index());
        self.alive_count -= 1;
        self.touch();
        Ok(removed)
    }

    /// Whether [`World::restore`] would accept `id`.
    #[must_use]
    pub fn can_restore(&self, id: EntityId) -> bool {
        self.slot(id).is_some_and(|slot| !slot.alive && slot.id == id)
    }

    /// Revives a destroyed entity under its original id.
    ///
    /// # Errors
    ///
    /// - [`EcsError::SlotUnavailable`] unless the slot is dead and last held `id`
    /// - [`EcsError::ComponentExists`] if `components` repeats a kind
    pub fn restore(&mut self, id: EntityId, components: Vec<ComponentValue>) -> EcsResult<()> {
        if !self.can_restore(id) {
            return Err(EcsError::SlotUnavailable(id));
        }
        let mut mask = ComponentMask::EMPTY;
        for value in &components {
            if mask.contains(value.kind()) {
                return Err(EcsError::ComponentExists {
                    entity: id,
                    kind: value.kind(),
                });
            }
            mask.insert(value.kind());
        }

        let idx = id.index() as usize;
        self.slots[idx] = EntitySlot {
            id,
            component_mask: mask,
            alive: true,
        };
        for value in components {
            self.store.insert_value(id, value);
        }
        self.free.remove(&id.index());
        self.alive_count += 1;
        self.touch();
        Ok(())
    }

    // =========================================================================
    // Components
    // =========================================================================

    /// Attaches a component the entity does not have yet.
    ///
    /// # Errors
    ///
    /// - [`EcsError::UnknownEntity`] if `id` is not alive
    /// - [`EcsError::ComponentExists`] if the kind is already attached
    pub fn attach(&mut self, id: EntityId, value: ComponentValue) -> EcsResult<()> {
        let kind = value.kind();
        let slot = self.live_slot_mut(id)?;
        if slot.component_mask.contains(kind) {
            return Err(EcsError::ComponentExists { entity: id, kind });
        }
        slot.component_mask.insert(kind);
        self.store.insert_value(id, value);
        self.touch();
        Ok(())
    }

    /// Replaces a component the entity already has.
    ///
    /// # Returns
    ///
    /// The previous value.
    ///
    /// # Errors
    ///
    /// - [`EcsError::UnknownEntity`] if `id` is not alive
    /// - [`EcsError::ComponentMissing`] if the kind is not attached
    pub fn replace(&mut self, id: EntityId, value: ComponentValue) -> EcsResult<ComponentValue> {
        let kind = value.kind();
        let slot = self.live_slot_mut(id)?;
        if !slot.component_mask.contains(kind) {
            return Err(EcsError::ComponentMissing { entity: id, kind });
        }
        let previous = self
            .store
            .insert_value(id, value)
            .ok_or(EcsError::ComponentMissing { entity: id, kind })?;
        self.touch();
        Ok(previous)
    }

    /// Detaches a component.
    ///
    /// # Returns
    ///
    /// The removed value.
    ///
    /// # Errors
    ///
    /// - [`EcsError::UnknownEntity`] if `id` is not alive
    /// - [`EcsError::ComponentMissing`] if the kind is not attached
    pub fn detach(&mut self, id: EntityId, kind: ComponentKind) -> EcsResult<ComponentValue> {
        let slot = self.live_slot_mut(id)?;
        if !slot.component_mask.contains(kind) {
            return Err(EcsError::ComponentMissing { entity: id, kind });
        }
        slot.component_mask.remove(kind);
        let removed = self
            .store
            .remove_value(id, kind)
            .ok_or(EcsError::ComponentMissing { entity: id, kind })?;
        self.touch();
        Ok(removed)
    }

    /// Typed component access.
    #[inline]
    #[must_use]
    pub fn get<C: Component>(&self, id: EntityId) -> Option<&C> {
        C::storage(&self.store).get(id)
    }

    /// Clones a component as a [`ComponentValue`].
    #[must_use]
    pub fn get_value(&self, id: EntityId, kind: ComponentKind) -> Option<ComponentValue> {
        self.store.get_value(id, kind)
    }

    /// Whether a live entity carries `kind`.
    #[inline]
    #[must_use]
    pub fn has(&self, id: EntityId, kind: ComponentKind) -> bool {
        self.mask_of(id).is_some_and(|mask| mask.contains(kind))
    }

    /// All components of a live entity, in kind order.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownEntity`] if `id` is not alive.
    pub fn components_of(&self, id: EntityId) -> EcsResult<Vec<ComponentValue>> {
        let mask = self.mask_of(id).ok_or(EcsError::UnknownEntity(id))?;
        Ok(mask
            .iter()
            .filter_map(|kind| self.store.get_value(id, kind))
            .collect())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Lazily yields live entities carrying every kind in `kinds`, in
    /// ascending index order. An empty list matches every live entity.
    #[must_use]
    pub fn query(&self, kinds: &[ComponentKind]) -> Query<'_> {
        Query::new(&self.slots, ComponentMask::of(kinds))
    }

    /// All live entities in index order.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.slots.iter().filter(|slot| slot.alive).map(|slot| slot.id)
    }

    /// Number of live entities carrying `kind`.
    #[inline]
    #[must_use]
    pub fn count_with(&self, kind: ComponentKind) -> usize {
        self.store.len_of(kind)
    }

    /// The lowest-index entity carrying `C`.
    #[must_use]
    pub fn singleton<C: Component>(&self) -> Option<(EntityId, &C)> {
        let id = self.query(&[C::KIND]).next()?;
        self.get::<C>(id).map(|component| (id, component))
    }

    /// Finds a feature descriptor by its string id.
    ///
    /// If several entities declare the same feature id, the lowest index wins.
    #[must_use]
    pub fn find_feature(&self, feature_id: &str) -> Option<(EntityId, &Feature)> {
        self.query(&[ComponentKind::Feature])
            .filter_map(|id| self.get::<Feature>(id).map(|feature| (id, feature)))
            .find(|(_, feature)| feature.id == feature_id)
    }

    // =========================================================================
    // Hashing
    // =========================================================================

    /// SHA-256 of the canonical encoding. Cached until the next mutation.
    pub fn digest(&self) -> Digest {
        *self
            .digest
            .get_or_init(|| Digest::of(&self.to_canonical_bytes()))
    }
}

impl PartialEq for World {
    fn eq(&self, other: &Self) -> bool {
        self.slots == other.slots && self.to_canonical_bytes() == other.to_canonical_bytes()
    }
}

impl Eq for World {}

impl Encode for World {
    /// ```text
    /// "MWLD" [4: slot count]
    /// per slot: [8: id bits][1: alive]
    ///           if alive: [4: component count][components in kind order]
    /// ```
    fn encode(&self, enc: &mut Encoder) {
        enc.put_raw(WORLD_MAGIC);
        enc.put_len(self.slots.len());
        for slot in &self.slots {
            slot.id.encode(enc);
            enc.put_bool(slot.alive);
            if slot.alive {
                let values: Vec<ComponentValue> = slot
                    .component_mask
                    .iter()
                    .filter_map(|kind| self.store.get_value(slot.id, kind))
                    .collect();
                enc.put_seq(&values);
            }
        }
    }
}

impl Decode for World {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        if dec.take(WORLD_MAGIC.len())? != WORLD_MAGIC {
            return Err(DecodeError::InvalidTag {
                what: "world header",
                tag: 0,
            });
        }
        let mut world = Self::new();
        let count = dec.len()?;
        for index in 0..count {
            let id = EntityId::decode(dec)?;
            if u32::try_from(index).ok() != Some(id.index()) {
                return Err(DecodeError::InvalidTag {
                    what: "slot index",
                    tag: id.index(),
                });
            }
            let alive = dec.bool()?;
            if alive {
                let values: Vec<ComponentValue> = dec.seq()?;
                world.slots.push(EntitySlot {
                    id,
                    component_mask: ComponentMask::EMPTY,
                    alive: false,
                });
                world
                    .restore(id, values)
                    .map_err(|_| DecodeError::InvalidTag {
                        what: "slot components",
                        tag: id.index(),
                    })?;
            } else {
                world.slots.push(EntitySlot {
                    id,
                    component_mask: ComponentMask::EMPTY,
                    alive: false,
                });
                world.free.insert(id.index());
            }
        }
        Ok(world)
    }
}
