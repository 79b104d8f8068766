//! # Predicate Catalog
//!
//! Every predicate a RuleSet can use, enumerable and constructible by name
//! so the scripting layer never needs private knowledge of the rule types.

use megalith_core::{Args, ParamKind, ParamSpec, ParamValue, Predicate};

use crate::error::{RuleError, RuleResult};

/// Describes one named predicate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PredicateInfo {
    /// Scripting name, identical to [`Predicate::name`].
    pub name: &'static str,
    /// One-line description.
    pub summary: &'static str,
    /// Parameter schema.
    pub params: &'static [ParamSpec],
}

const PREDICATES: &[PredicateInfo] = &[
    PredicateInfo {
        name: "always",
        summary: "Always holds",
        params: &[],
    },
    PredicateInfo {
        name: "never",
        summary: "Never holds; `reason` explains why",
        params: &[ParamSpec::new("reason", ParamKind::Text)],
    },
    PredicateInfo {
        name: "count_at_least",
        summary: "At least `min` live entities carry `kind`",
        params: &[
            ParamSpec::new("kind", ParamKind::Kind),
            ParamSpec::new("min", ParamKind::UInt),
        ],
    },
    PredicateInfo {
        name: "has_component",
        summary: "`entity` is alive and carries `kind`",
        params: &[
            ParamSpec::new("entity", ParamKind::Entity),
            ParamSpec::new("kind", ParamKind::Kind),
        ],
    },
    PredicateInfo {
        name: "entity_alive",
        summary: "`entity` is alive",
        params: &[ParamSpec::new("entity", ParamKind::Entity)],
    },
    PredicateInfo {
        name: "mode_is",
        summary: "The interaction mode equals `mode`",
        params: &[ParamSpec::new("mode", ParamKind::Mode)],
    },
    PredicateInfo {
        name: "feature_enabled",
        summary: "Another feature is enabled",
        params: &[ParamSpec::new("feature", ParamKind::Text)],
    },
];

/// Name-indexed access to the built-in predicates.
#[derive(Clone, Copy, Debug, Default)]
pub struct PredicateCatalog;

impl PredicateCatalog {
    /// All predicates, in a stable order.
    #[must_use]
    pub fn list(&self) -> &'static [PredicateInfo] {
        PREDICATES
    }

    /// Looks a predicate up by name.
    #[must_use]
    pub fn info(&self, name: &str) -> Option<&'static PredicateInfo> {
        PREDICATES.iter().find(|info| info.name == name)
    }

    /// Builds a predicate from its name and arguments.
    ///
    /// # Errors
    ///
    /// - [`RuleError::UnknownPredicate`] for an unknown name
    /// - [`RuleError::Param`] if the arguments do not match the schema
    pub fn build(&self, name: &str, values: &[(String, ParamValue)]) -> RuleResult<Predicate> {
        let info = self
            .info(name)
            .ok_or_else(|| RuleError::UnknownPredicate(name.to_string()))?;
        let args = Args::check(values, info.params)?;
        Ok(match info.name {
            "always" => Predicate::Always,
            "never" => Predicate::Never {
                reason: args.text("reason")?.to_string(),
            },
            "count_at_least" => Predicate::CountAtLeast {
                kind: args.kind("kind")?,
                min: args.uint("min")?,
            },
            "has_component" => Predicate::HasComponent {
                entity: args.entity("entity")?,
                kind: args.kind("kind")?,
            },
            "entity_alive" => Predicate::EntityAlive {
                entity: args.entity("entity")?,
            },
            "mode_is" => Predicate::ModeIs {
                mode: args.mode("mode")?,
            },
            "feature_enabled" => Predicate::FeatureEnabled {
                feature: args.text("feature")?.to_string(),
            },
            other => return Err(RuleError::UnknownPredicate(other.to_string())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use megalith_core::{args, ComponentKind, ParamError};

    #[test]
    fn test_names_match_predicates() {
        let catalog = PredicateCatalog;
        let built = catalog.build("always", &[]).unwrap();
        assert_eq!(built.name(), "always");
        for info in catalog.list() {
            assert!(catalog.info(info.name).is_some());
        }
    }

    #[test]
    fn test_build_with_params() {
        let predicate = PredicateCatalog
            .build(
                "count_at_least",
                &args![
                    ("kind", ParamValue::Kind(ComponentKind::Tool)),
                    ("min", ParamValue::UInt(2)),
                ],
            )
            .unwrap();
        assert_eq!(
            predicate,
            Predicate::CountAtLeast {
                kind: ComponentKind::Tool,
                min: 2
            }
        );
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            PredicateCatalog.build("sometimes", &[]),
            Err(RuleError::UnknownPredicate("sometimes".into()))
        );
        assert_eq!(
            PredicateCatalog.build("entity_alive", &[]),
            Err(RuleError::Param(ParamError::Missing("entity".into())))
        );
    }
}
