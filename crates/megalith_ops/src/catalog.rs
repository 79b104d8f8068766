//! # Operation Catalog
//!
//! Every built-in operation kind with its parameter schema, invokable by
//! name. The parameters recorded on a built [`crate::Operation`] are exactly
//! the arguments given here, so a logged operation can be re-invoked.

use megalith_core::{Args, EntityId, ParamKind, ParamSpec, ParamValue, Position};
use tracing::debug;

use crate::builder::BatchBuilder;
use crate::error::{OpResult, OperationError};
use crate::operation::OpKind;

/// Describes one named operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OperationInfo {
    /// The kind built.
    pub kind: OpKind,
    /// One-line description.
    pub summary: &'static str,
    /// Parameter schema.
    pub params: &'static [ParamSpec],
}

impl OperationInfo {
    /// Scripting name.
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.kind.name()
    }
}

const ENTITY: ParamSpec = ParamSpec::new("entity", ParamKind::Entity);

const OPERATIONS: &[OperationInfo] = &[
    OperationInfo {
        kind: OpKind::CreateEntity,
        summary: "Create an empty entity; returns its id",
        params: &[],
    },
    OperationInfo {
        kind: OpKind::DestroyEntity,
        summary: "Destroy `entity` and all its components",
        params: &[ENTITY],
    },
    OperationInfo {
        kind: OpKind::AttachComponent,
        summary: "Attach `component` to `entity`",
        params: &[ENTITY, ParamSpec::new("component", ParamKind::Component)],
    },
    OperationInfo {
        kind: OpKind::DetachComponent,
        summary: "Detach the `kind` component of `entity`",
        params: &[ENTITY, ParamSpec::new("kind", ParamKind::Kind)],
    },
    OperationInfo {
        kind: OpKind::ReplaceComponent,
        summary: "Replace a component of `entity` with `component`",
        params: &[ENTITY, ParamSpec::new("component", ParamKind::Component)],
    },
    OperationInfo {
        kind: OpKind::MoveEntity,
        summary: "Set the position of `entity` to (`x`, `y`)",
        params: &[
            ENTITY,
            ParamSpec::new("x", ParamKind::Float),
            ParamSpec::new("y", ParamKind::Float),
        ],
    },
    OperationInfo {
        kind: OpKind::SetMode,
        summary: "Set the interaction mode",
        params: &[ParamSpec::new("mode", ParamKind::Mode)],
    },
    OperationInfo {
        kind: OpKind::RefreshFeatureStates,
        summary: "Re-evaluate every feature and store the verdicts",
        params: &[],
    },
    OperationInfo {
        kind: OpKind::TranslateEntities,
        summary: "Move every entity in `entities` by (`dx`, `dy`), atomically",
        params: &[
            ParamSpec::new("entities", ParamKind::Entities),
            ParamSpec::new("dx", ParamKind::Float),
            ParamSpec::new("dy", ParamKind::Float),
        ],
    },
];

/// Name-indexed access to the built-in operations.
#[derive(Clone, Copy, Debug, Default)]
pub struct OperationCatalog;

impl OperationCatalog {
    /// All operations, in kind order.
    #[must_use]
    pub fn list(&self) -> &'static [OperationInfo] {
        OPERATIONS
    }

    /// Looks an operation up by name.
    #[must_use]
    pub fn info(&self, name: &str) -> Option<&'static OperationInfo> {
        OPERATIONS.iter().find(|info| info.name() == name)
    }

    /// Plans the named operation into `batch`.
    ///
    /// # Arguments
    ///
    /// * `batch` - The batch receiving the operation
    /// * `name` - An [`OpKind::name`]
    /// * `values` - Arguments matching the operation's schema
    ///
    /// # Returns
    ///
    /// The planned id for `create_entity`, `None` otherwise.
    ///
    /// # Errors
    ///
    /// - [`OperationError::UnknownKind`] for an unknown name
    /// - [`OperationError::Param`] if the arguments do not match the schema
    /// - [`OperationError::InvalidOperation`] from the builder
    pub fn invoke(
        &self,
        batch: &mut BatchBuilder,
        name: &str,
        values: &[(String, ParamValue)],
    ) -> OpResult<Option<EntityId>> {
        let info = self
            .info(name)
            .ok_or_else(|| OperationError::UnknownKind(name.to_string()))?;
        let args = Args::check(values, info.params)?;
        debug!(operation = name, "invoking by name");

        match info.kind {
            OpKind::CreateEntity => return Ok(Some(batch.create_entity())),
            OpKind::DestroyEntity => batch.destroy_entity(args.entity("entity")?)?,
            OpKind::AttachComponent => {
                batch.attach(args.entity("entity")?, args.component("component")?.clone())?;
            }
            OpKind::DetachComponent => batch.detach(args.entity("entity")?, args.kind("kind")?)?,
            OpKind::ReplaceComponent => {
                batch.replace(args.entity("entity")?, args.component("component")?.clone())?;
            }
            OpKind::MoveEntity => batch.move_entity(
                args.entity("entity")?,
                Position::new(args.float("x")?, args.float("y")?),
            )?,
            OpKind::SetMode => batch.set_mode(args.mode("mode")?)?,
            OpKind::RefreshFeatureStates => batch.refresh_feature_states(),
            OpKind::TranslateEntities => batch.translate_entities(
                args.entities("entities")?,
                args.float("dx")?,
                args.float("dy")?,
            )?,
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use megalith_core::{args, ComponentValue, ParamError, Tool, World};

    #[test]
    fn test_every_kind_is_listed_once() {
        let catalog = OperationCatalog;
        assert_eq!(catalog.list().len(), OpKind::ALL.len());
        for kind in OpKind::ALL {
            assert_eq!(catalog.info(kind.name()).map(|info| info.kind), Some(kind));
        }
    }

    #[test]
    fn test_invoke_by_name() {
        let world = World::new();
        let mut batch = BatchBuilder::new(&world);
        let catalog = OperationCatalog;

        let id = catalog
            .invoke(&mut batch, "create_entity", &[])
            .unwrap()
            .unwrap();
        catalog
            .invoke(
                &mut batch,
                "attach_component",
                &args![
                    ("entity", ParamValue::Entity(id)),
                    ("component", ParamValue::Component(ComponentValue::Tool(Tool::new("t")))),
                ],
            )
            .unwrap();

        assert!(batch.world().has(id, megalith_core::ComponentKind::Tool));
        let ops = batch.build();
        assert_eq!(ops[1].kind(), OpKind::AttachComponent);
        assert_eq!(ops[1].params().len(), 2);
    }

    #[test]
    fn test_unknown_and_mistyped() {
        let world = World::new();
        let mut batch = BatchBuilder::new(&world);
        let catalog = OperationCatalog;
        assert_eq!(
            catalog.invoke(&mut batch, "teleport", &[]),
            Err(OperationError::UnknownKind("teleport".into()))
        );
        assert!(matches!(
            catalog.invoke(
                &mut batch,
                "destroy_entity",
                &args![("entity", ParamValue::Float(1.0))]
            ),
            Err(OperationError::Param(ParamError::WrongType { .. }))
        ));
    }

    #[test]
    fn test_recorded_params_replay() {
        let mut world = World::new();
        let id = world.create();
        world.attach(id, Position::new(0.0, 0.0).into()).unwrap();

        let mut batch = BatchBuilder::new(&world);
        batch.move_entity(id, Position::new(4.0, 5.0)).unwrap();
        let original = batch.build();

        let mut replay = BatchBuilder::new(&world);
        OperationCatalog
            .invoke(&mut replay, original[0].kind().name(), original[0].params())
            .unwrap();
        assert_eq!(replay.build(), original);
    }
}
