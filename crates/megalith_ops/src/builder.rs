//! # Batch Builder
//!
//! Constructs operations against a private scratch copy of the World, so
//! that later operations in a batch can refer to entities created by
//! earlier ones. Each operation is applied to the scratch World as soon as
//! it is pushed; an operation that would be rejected there is still pushed
//! (the scheduler reports it) but leaves the scratch World unchanged.
//!
//! Construction fails with [`OperationError::InvalidOperation`] when an
//! operation references an entity that is not alive in the scratch World,
//! or when its inverse cannot be derived (detaching a missing component).

use megalith_core::{
    ComponentKind, ComponentValue, EntityId, FeatureStatus, Mode, ParamValue, Position, World,
};
use megalith_rules::evaluate_all;
use tracing::{debug, trace};

use crate::effect::Effect;
use crate::error::{OpResult, OperationError};
use crate::operation::{OpKind, Operation};

/// Plans a batch of operations.
///
/// # Example
///
/// ```rust
/// use megalith_core::{Position, World};
/// use megalith_ops::BatchBuilder;
///
/// let world = World::new();
/// let mut batch = BatchBuilder::new(&world);
/// let id = batch.create_entity();
/// batch.attach(id, Position::new(1.0, 2.0)).unwrap();
/// assert_eq!(batch.build().len(), 2);
/// ```
#[derive(Debug)]
pub struct BatchBuilder {
    scratch: World,
    ops: Vec<Operation>,
}

impl BatchBuilder {
    /// Starts a batch planned against `world`.
    #[must_use]
    pub fn new(world: &World) -> Self {
        Self {
            scratch: world.clone(),
            ops: Vec::new(),
        }
    }

    /// The World as it will look if every pushed operation commits.
    #[must_use]
    pub const fn world(&self) -> &World {
        &self.scratch
    }

    /// Number of planned operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether nothing has been planned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Finishes the batch.
    #[must_use]
    pub fn build(self) -> Vec<Operation> {
        self.ops
    }

    /// Appends an already-built operation (used for replay).
    pub fn push(&mut self, op: Operation) {
        if let Err(err) = op.apply(&mut self.scratch) {
            debug!(op = %op, error = %err, "planned operation will be rejected");
        }
        trace!(op = %op, "planned");
        self.ops.push(op);
    }

    fn require_alive(&self, entity: EntityId) -> OpResult<()> {
        if self.scratch.is_alive(entity) {
            Ok(())
        } else {
            Err(OperationError::invalid(format!("unknown entity {entity}")))
        }
    }

    fn require_references(&self, value: &ComponentValue) -> OpResult<()> {
        value
            .referenced_entities()
            .into_iter()
            .try_for_each(|id| self.require_alive(id))
    }

    fn require_current(&self, entity: EntityId, kind: ComponentKind) -> OpResult<ComponentValue> {
        self.scratch
            .get_value(entity, kind)
            .ok_or_else(|| OperationError::invalid(format!("{entity} has no {kind} component")))
    }

    // =========================================================================
    // Entity lifecycle
    // =========================================================================

    /// Plans the creation of one entity and returns the id it will get.
    pub fn create_entity(&mut self) -> EntityId {
        let entity = self.scratch.next_entity_id();
        self.push(Operation::primitive(
            OpKind::CreateEntity,
            vec![entity],
            Vec::new(),
            Effect::Create { entity },
        ));
        entity
    }

    /// Plans the destruction of `entity`, capturing its components.
    ///
    /// # Errors
    ///
    /// [`OperationError::InvalidOperation`] if `entity` is not alive.
    pub fn destroy_entity(&mut self, entity: EntityId) -> OpResult<()> {
        self.require_alive(entity)?;
        let captured = self
            .scratch
            .components_of(entity)
            .map_err(|err| OperationError::invalid(err.to_string()))?;
        self.push(Operation::primitive(
            OpKind::DestroyEntity,
            vec![entity],
            vec![("entity".into(), ParamValue::Entity(entity))],
            Effect::Destroy { entity, captured },
        ));
        Ok(())
    }

    // =========================================================================
    // Components
    // =========================================================================

    /// Plans attaching `value` to `entity`.
    ///
    /// # Errors
    ///
    /// [`OperationError::InvalidOperation`] if `entity` or an entity the
    /// component refers to is not alive.
    pub fn attach(&mut self, entity: EntityId, value: impl Into<ComponentValue>) -> OpResult<()> {
        let value = value.into();
        self.require_alive(entity)?;
        self.require_references(&value)?;
        self.push(Operation::primitive(
            OpKind::AttachComponent,
            vec![entity],
            vec![
                ("entity".into(), ParamValue::Entity(entity)),
                ("component".into(), ParamValue::Component(value.clone())),
            ],
            Effect::Attach { entity, value },
        ));
        Ok(())
    }

    /// Plans detaching the `kind` component of `entity`.
    ///
    /// # Errors
    ///
    /// [`OperationError::InvalidOperation`] if `entity` is not alive or has
    /// no such component.
    pub fn detach(&mut self, entity: EntityId, kind: ComponentKind) -> OpResult<()> {
        self.require_alive(entity)?;
        let captured = self.require_current(entity, kind)?;
        self.push(Operation::primitive(
            OpKind::DetachComponent,
            vec![entity],
            vec![
                ("entity".into(), ParamValue::Entity(entity)),
                ("kind".into(), ParamValue::Kind(kind)),
            ],
            Effect::Detach { entity, captured },
        ));
        Ok(())
    }

    /// Plans replacing a component of `entity` with `value`.
    ///
    /// # Errors
    ///
    /// [`OperationError::InvalidOperation`] if `entity` is not alive, has no
    /// component of that kind, or `value` refers to a dead entity.
    pub fn replace(&mut self, entity: EntityId, value: impl Into<ComponentValue>) -> OpResult<()> {
        let value = value.into();
        self.require_alive(entity)?;
        self.require_references(&value)?;
        let from = self.require_current(entity, value.kind())?;
        self.push(Operation::primitive(
            OpKind::ReplaceComponent,
            vec![entity],
            vec![
                ("entity".into(), ParamValue::Entity(entity)),
                ("component".into(), ParamValue::Component(value.clone())),
            ],
            Effect::Replace {
                entity,
                from,
                to: value,
            },
        ));
        Ok(())
    }

    fn move_op(&self, entity: EntityId, to: Position) -> OpResult<Operation> {
        self.require_alive(entity)?;
        let from = self.require_current(entity, ComponentKind::Position)?;
        Ok(Operation::primitive(
            OpKind::MoveEntity,
            vec![entity],
            vec![
                ("entity".into(), ParamValue::Entity(entity)),
                ("x".into(), ParamValue::Float(to.x)),
                ("y".into(), ParamValue::Float(to.y)),
            ],
            Effect::Replace {
                entity,
                from,
                to: to.into(),
            },
        ))
    }

    /// Plans moving `entity` to `to`. A non-finite position is accepted here
    /// and rejected at validation.
    ///
    /// # Errors
    ///
    /// [`OperationError::InvalidOperation`] if `entity` is not alive or has
    /// no position.
    pub fn move_entity(&mut self, entity: EntityId, to: Position) -> OpResult<()> {
        let op = self.move_op(entity, to)?;
        self.push(op);
        Ok(())
    }

    /// Moves every entity in `entities` by `(dx, dy)` as one atomic
    /// composite.
    ///
    /// # Errors
    ///
    /// [`OperationError::InvalidOperation`] if the list is empty, repeats an
    /// entity, or names an entity that is dead or has no position.
    pub fn translate_entities(&mut self, entities: &[EntityId], dx: f64, dy: f64) -> OpResult<()> {
        if entities.is_empty() {
            return Err(OperationError::invalid("nothing to translate"));
        }
        let mut children = Vec::with_capacity(entities.len());
        for (i, &entity) in entities.iter().enumerate() {
            if entities[..i].contains(&entity) {
                return Err(OperationError::invalid(format!(
                    "{entity} is listed twice"
                )));
            }
            self.require_alive(entity)?;
            let from = self
                .scratch
                .get::<Position>(entity)
                .copied()
                .ok_or_else(|| OperationError::invalid(format!("{entity} has no Position component")))?;
            children.push(self.move_op(entity, from.translated(dx, dy))?);
        }
        self.push(Operation::composite(
            OpKind::TranslateEntities,
            entities.to_vec(),
            vec![
                ("entities".into(), ParamValue::Entities(entities.to_vec())),
                ("dx".into(), ParamValue::Float(dx)),
                ("dy".into(), ParamValue::Float(dy)),
            ],
            children,
        ));
        Ok(())
    }

    /// Plans setting the interaction mode.
    ///
    /// # Errors
    ///
    /// [`OperationError::InvalidOperation`] if no entity carries a
    /// [`Mode`].
    pub fn set_mode(&mut self, mode: Mode) -> OpResult<()> {
        let (entity, current) = self
            .scratch
            .singleton::<Mode>()
            .map(|(id, current)| (id, *current))
            .ok_or_else(|| OperationError::invalid("no entity carries a Mode component"))?;
        self.push(Operation::primitive(
            OpKind::SetMode,
            vec![entity],
            vec![("mode".into(), ParamValue::Mode(mode))],
            Effect::Replace {
                entity,
                from: current.into(),
                to: mode.into(),
            },
        ));
        Ok(())
    }

    // =========================================================================
    // Rules
    // =========================================================================

    /// Plans re-evaluating every feature and storing the verdicts as
    /// [`FeatureStatus`] components.
    ///
    /// The operation is tied to the exact World it was planned against and
    /// is rejected if anything changed before it runs.
    pub fn refresh_feature_states(&mut self) {
        let basis = self.scratch.digest();
        let mut writes = Vec::new();
        for (entity, verdict) in evaluate_all(&self.scratch) {
            let status = verdict.to_status();
            match self.scratch.get::<FeatureStatus>(entity) {
                Some(current) if *current == status => {}
                Some(current) => writes.push(Effect::Replace {
                    entity,
                    from: current.clone().into(),
                    to: status.into(),
                }),
                None => writes.push(Effect::Attach {
                    entity,
                    value: status.into(),
                }),
            }
        }

        let mut after = self.scratch.clone();
        for write in &writes {
            if let Err(err) = write.apply(&mut after) {
                debug!(error = %err, "refresh write does not apply to the scratch world");
            }
        }
        let result = after.digest();
        debug!(
            basis = %basis.short(),
            result = %result.short(),
            writes = writes.len(),
            "planned feature refresh"
        );
        self.push(Operation::primitive(
            OpKind::RefreshFeatureStates,
            Vec::new(),
            Vec::new(),
            Effect::Refresh {
                basis,
                result,
                writes,
            },
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use megalith_core::{Feature, RuleExpr, RuleSet, Tool};

    #[test]
    fn test_planned_ids_follow_allocation() {
        let world = World::new();
        let mut batch = BatchBuilder::new(&world);
        let a = batch.create_entity();
        let b = batch.create_entity();
        assert_eq!(a, EntityId::new(0, 0));
        assert_eq!(b, EntityId::new(1, 0));
        batch.destroy_entity(a).unwrap();
        assert_eq!(batch.create_entity(), EntityId::new(0, 1));
        assert!(world.slot_count() == 0);
    }

    #[test]
    fn test_unknown_entity_is_invalid() {
        let world = World::new();
        let mut batch = BatchBuilder::new(&world);
        let ghost = EntityId::new(5, 0);
        assert!(matches!(
            batch.attach(ghost, Tool::new("t")),
            Err(OperationError::InvalidOperation(_))
        ));
        assert!(matches!(
            batch.destroy_entity(ghost),
            Err(OperationError::InvalidOperation(_))
        ));
        assert!(batch.is_empty());
    }

    #[test]
    fn test_detach_missing_is_invalid() {
        let world = World::new();
        let mut batch = BatchBuilder::new(&world);
        let id = batch.create_entity();
        assert!(batch.detach(id, ComponentKind::Tool).is_err());
        assert!(batch.move_entity(id, Position::new(1.0, 1.0)).is_err());
    }

    #[test]
    fn test_attach_dangling_parent_is_invalid() {
        let world = World::new();
        let mut batch = BatchBuilder::new(&world);
        let id = batch.create_entity();
        let dangling = megalith_core::Parent(EntityId::new(9, 0));
        assert!(batch.attach(id, dangling).is_err());
    }

    #[test]
    fn test_set_mode_needs_singleton() {
        let mut world = World::new();
        let mut batch = BatchBuilder::new(&world);
        assert!(batch.set_mode(Mode::Natural).is_err());

        let m = world.create();
        world.attach(m, Mode::Empty.into()).unwrap();
        let mut batch = BatchBuilder::new(&world);
        batch.set_mode(Mode::Natural).unwrap();
        assert_eq!(batch.world().get::<Mode>(m), Some(&Mode::Natural));
    }

    #[test]
    fn test_translate_is_composite() {
        let world = World::new();
        let mut batch = BatchBuilder::new(&world);
        let a = batch.create_entity();
        let b = batch.create_entity();
        batch.attach(a, Position::new(0.0, 0.0)).unwrap();
        batch.attach(b, Position::new(1.0, 1.0)).unwrap();
        batch.translate_entities(&[a, b], 1.0, -1.0).unwrap();
        assert!(batch.translate_entities(&[a, a], 1.0, 1.0).is_err());

        assert_eq!(batch.world().get::<Position>(b), Some(&Position::new(2.0, 0.0)));
        let ops = batch.build();
        let last = ops.last().unwrap();
        assert!(last.is_composite());
        assert_eq!(last.children().len(), 2);
    }

    #[test]
    fn test_refresh_writes_statuses() {
        let mut world = World::new();
        let rule = world.create();
        world
            .attach(
                rule,
                RuleSet {
                    name: "needs-tool".into(),
                    expr: RuleExpr::count_at_least(ComponentKind::Tool, 1),
                    help_ref: String::new(),
                }
                .into(),
            )
            .unwrap();
        let feature = world.create();
        world
            .attach(
                feature,
                Feature {
                    id: "compare".into(),
                    rule,
                }
                .into(),
            )
            .unwrap();

        let mut batch = BatchBuilder::new(&world);
        batch.refresh_feature_states();
        let ops = batch.build();

        let mut committed = world.clone();
        ops[0].apply(&mut committed).unwrap();
        let status = committed.get::<FeatureStatus>(feature).unwrap();
        assert!(!status.enabled);
        assert!(status.reason.starts_with("needs-tool"));

        // Any change to the World invalidates the planned refresh.
        let t = world.create();
        world.attach(t, Tool::new("t").into()).unwrap();
        assert!(ops[0].validate(&world).is_err());
    }
}
