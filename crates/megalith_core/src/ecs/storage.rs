//! # Component Storage
//!
//! Dense per-kind component storage.
//!
//! Each kind lives in a sparse set:
//! - Components sit contiguously in a dense array
//! - A sparse index table maps entity index to dense position
//! - Removal is O(1) via swap-remove
//!
//! Dense order depends on insertion history, so nothing that feeds a digest
//! may iterate the dense array directly; the World always walks entities in
//! index order instead.

use super::component::{
    Component, ComponentKind, ComponentValue, Feature, FeatureStatus, Mode, Name, Parent,
    Position, RuleSet, Tab, Territory, Tool,
};
use super::entity::EntityId;

/// Storage for a single component type.
///
/// # Type Parameters
///
/// * `C` - The component type to store
#[derive(Clone, Debug)]
pub struct ComponentStorage<C: Component> {
    /// The dense array of components.
    dense: Vec<C>,
    /// Owner of each dense element.
    owners: Vec<EntityId>,
    /// Entity index to dense position.
    sparse: Vec<Option<u32>>,
}

impl<C: Component> Default for ComponentStorage<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Component> ComponentStorage<C> {
    /// Creates empty storage.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            dense: Vec::new(),
            owners: Vec::new(),
            sparse: Vec::new(),
        }
    }

    /// Number of stored components.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.dense.len()
    }

    /// Whether the storage is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    #[inline]
    fn position(&self, entity: EntityId) -> Option<usize> {
        let pos = (*self.sparse.get(entity.index() as usize)?)? as usize;
        (self.owners[pos] == entity).then_some(pos)
    }

    /// Gets a component by entity.
    ///
    /// # Arguments
    ///
    /// * `entity` - The owning entity (generation must match)
    #[inline]
    #[must_use]
    pub fn get(&self, entity: EntityId) -> Option<&C> {
        self.position(entity).map(|pos| &self.dense[pos])
    }

    /// Whether `entity` owns a component here.
    #[inline]
    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.position(entity).is_some()
    }

    /// Inserts or overwrites the component of `entity`.
    ///
    /// # Returns
    ///
    /// The previous value, if any.
    pub fn insert(&mut self, entity: EntityId, component: C) -> Option<C> {
        if let Some(pos) = self.position(entity) {
            return Some(std::mem::replace(&mut self.dense[pos], component));
        }
        let idx = entity.index() as usize;
        if self.sparse.len() <= idx {
            self.sparse.resize(idx + 1, None);
        }
        #[allow(clippy::cast_possible_truncation)]
        let pos = self.dense.len() as u32;
        self.sparse[idx] = Some(pos);
        self.dense.push(component);
        self.owners.push(entity);
        None
    }

    /// Removes the component of `entity`.
    ///
    /// # Returns
    ///
    /// The removed value, or `None` if `entity` had none.
    pub fn remove(&mut self, entity: EntityId) -> Option<C> {
        let pos = self.position(entity)?;
        self.sparse[entity.index() as usize] = None;
        let removed = self.dense.swap_remove(pos);
        self.owners.swap_remove(pos);
        if let Some(moved) = self.owners.get(pos) {
            self.sparse[moved.index() as usize] = u32::try_from(pos).ok();
        }
        Some(removed)
    }

    /// Iterates `(owner, component)` pairs in dense order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &C)> {
        self.owners.iter().copied().zip(self.dense.iter())
    }
}

// ============================================================================
// STORE
// ============================================================================

/// One [`ComponentStorage`] per kind.
///
/// Typed access goes through [`Component::storage`]; dynamic access through
/// [`ComponentValue`] goes through the `*_value` methods.
#[derive(Clone, Debug, Default)]
pub struct ComponentStore {
    pub(crate) positions: ComponentStorage<Position>,
    pub(crate) names: ComponentStorage<Name>,
    pub(crate) tools: ComponentStorage<Tool>,
    pub(crate) territories: ComponentStorage<Territory>,
    pub(crate) tabs: ComponentStorage<Tab>,
    pub(crate) parents: ComponentStorage<Parent>,
    pub(crate) modes: ComponentStorage<Mode>,
    pub(crate) features: ComponentStorage<Feature>,
    pub(crate) rule_sets: ComponentStorage<RuleSet>,
    pub(crate) feature_statuses: ComponentStorage<FeatureStatus>,
}

impl ComponentStore {
    /// Typed storage for `C`.
    #[inline]
    #[must_use]
    pub fn storage<C: Component>(&self) -> &ComponentStorage<C> {
        C::storage(self)
    }

    /// Typed storage for `C`, mutably.
    #[inline]
    pub fn storage_mut<C: Component>(&mut self) -> &mut ComponentStorage<C> {
        C::storage_mut(self)
    }

    /// Clones the component of `kind` owned by `entity`.
    #[must_use]
    pub fn get_value(&self, entity: EntityId, kind: ComponentKind) -> Option<ComponentValue> {
        fn get<C: Component>(store: &ComponentStore, entity: EntityId) -> Option<ComponentValue> {
            C::storage(store).get(entity).cloned().map(Into::into)
        }
        match kind {
            ComponentKind::Position => get::<Position>(self, entity),
            ComponentKind::Name => get::<Name>(self, entity),
            ComponentKind::Tool => get::<Tool>(self, entity),
            ComponentKind::Territory => get::<Territory>(self, entity),
            ComponentKind::Tab => get::<Tab>(self, entity),
            ComponentKind::Parent => get::<Parent>(self, entity),
            ComponentKind::Mode => get::<Mode>(self, entity),
            ComponentKind::Feature => get::<Feature>(self, entity),
            ComponentKind::RuleSet => get::<RuleSet>(self, entity),
            ComponentKind::FeatureStatus => get::<FeatureStatus>(self, entity),
        }
    }

    /// Stores `value` for `entity`, returning the previous value of the same kind.
    pub fn insert_value(
        &mut self,
        entity: EntityId,
        value: ComponentValue,
    ) -> Option<ComponentValue> {
        fn put<C: Component>(
            store: &mut ComponentStore,
            entity: EntityId,
            value: C,
        ) -> Option<ComponentValue> {
            C::storage_mut(store).insert(entity, value).map(Into::into)
        }
        match value {
            ComponentValue::Position(v) => put(self, entity, v),
            ComponentValue::Name(v) => put(self, entity, v),
            ComponentValue::Tool(v) => put(self, entity, v),
            ComponentValue::Territory(v) => put(self, entity, v),
            ComponentValue::Tab(v) => put(self, entity, v),
            ComponentValue::Parent(v) => put(self, entity, v),
            ComponentValue::Mode(v) => put(self, entity, v),
            ComponentValue::Feature(v) => put(self, entity, v),
            ComponentValue::RuleSet(v) => put(self, entity, v),
            ComponentValue::FeatureStatus(v) => put(self, entity, v),
        }
    }

    /// Removes the component of `kind` owned by `entity`.
    pub fn remove_value(&mut self, entity: EntityId, kind: ComponentKind) -> Option<ComponentValue> {
        fn take<C: Component>(
            store: &mut ComponentStore,
            entity: EntityId,
        ) -> Option<ComponentValue> {
            C::storage_mut(store).remove(entity).map(Into::into)
        }
        match kind {
            ComponentKind::Position => take::<Position>(self, entity),
            ComponentKind::Name => take::<Name>(self, entity),
            ComponentKind::Tool => take::<Tool>(self, entity),
            ComponentKind::Territory => take::<Territory>(self, entity),
            ComponentKind::Tab => take::<Tab>(self, entity),
            ComponentKind::Parent => take::<Parent>(self, entity),
            ComponentKind::Mode => take::<Mode>(self, entity),
            ComponentKind::Feature => take::<Feature>(self, entity),
            ComponentKind::RuleSet => take::<RuleSet>(self, entity),
            ComponentKind::FeatureStatus => take::<FeatureStatus>(self, entity),
        }
    }

    /// Number of components of `kind`.
    #[must_use]
    pub fn len_of(&self, kind: ComponentKind) -> usize {
        match kind {
            ComponentKind::Position => self.positions.len(),
            ComponentKind::Name => self.names.len(),
            ComponentKind::Tool => self.tools.len(),
            ComponentKind::Territory => self.territories.len(),
            ComponentKind::Tab => self.tabs.len(),
            ComponentKind::Parent => self.parents.len(),
            ComponentKind::Mode => self.modes.len(),
            ComponentKind::Feature => self.features.len(),
            ComponentKind::RuleSet => self.rule_sets.len(),
            ComponentKind::FeatureStatus => self.feature_statuses.len(),
        }
    }
}
