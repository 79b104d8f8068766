//! # RuleSet Evaluation
//!
//! A pure function from World state to a feature verdict.
//!
//! ## Semantics
//!
//! - `All` holds when every child holds (empty: holds); the first failing
//!   child explains the failure
//! - `Any` holds when one child holds (empty: fails); every failing child is
//!   listed in the explanation
//! - `Not` inverts its child
//! - `FeatureEnabled` evaluates another feature; a feature that reaches itself
//!   is disabled as a cyclic rule

use megalith_core::{
    ComponentKind, EntityId, Feature, FeatureStatus, Mode, Predicate, RuleExpr, RuleSet, World,
};

use crate::error::{RuleError, RuleResult};

/// Fallback reason used if a rule produced no explanation text.
const UNEXPLAINED: &str = "disabled by rule";

/// The answer to "may the user use this feature right now?".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verdict {
    /// Whether the feature is enabled.
    pub enabled: bool,
    /// Why it is disabled. Empty when enabled, never empty when disabled.
    pub reason: String,
    /// Help page reference from the governing rule set.
    pub help_ref: String,
}

impl Verdict {
    /// An enabled verdict.
    #[must_use]
    pub fn enabled(help_ref: impl Into<String>) -> Self {
        Self {
            enabled: true,
            reason: String::new(),
            help_ref: help_ref.into(),
        }
    }

    /// A disabled verdict. An empty `reason` is replaced with a generic one.
    #[must_use]
    pub fn disabled(reason: impl Into<String>, help_ref: impl Into<String>) -> Self {
        let mut reason = reason.into();
        if reason.trim().is_empty() {
            reason = UNEXPLAINED.to_string();
        }
        Self {
            enabled: false,
            reason,
            help_ref: help_ref.into(),
        }
    }

    /// The component form stored by `RefreshFeatureStates`.
    #[must_use]
    pub fn to_status(&self) -> FeatureStatus {
        FeatureStatus {
            enabled: self.enabled,
            reason: self.reason.clone(),
        }
    }
}

/// Evaluates a feature against `world` without caching.
///
/// # Errors
///
/// Returns [`RuleError::UnknownFeature`] if no entity declares `feature_id`.
pub fn evaluate(world: &World, feature_id: &str) -> RuleResult<Verdict> {
    let (_, feature) = world
        .find_feature(feature_id)
        .ok_or_else(|| RuleError::UnknownFeature(feature_id.to_string()))?;
    Ok(Context::new(world).feature(feature))
}

/// Evaluates every declared feature, in entity index order.
pub fn evaluate_all(world: &World) -> Vec<(EntityId, Verdict)> {
    world
        .query(&[ComponentKind::Feature])
        .filter_map(|id| {
            world
                .get::<Feature>(id)
                .map(|feature| (id, Context::new(world).feature(feature)))
        })
        .collect()
}

/// Result of one sub-expression.
struct Outcome {
    holds: bool,
    detail: String,
}

impl Outcome {
    fn new(holds: bool, detail: String) -> Self {
        Self { holds, detail }
    }
}

struct Context<'w> {
    world: &'w World,
    /// Features currently being evaluated, outermost first.
    stack: Vec<String>,
}

impl<'w> Context<'w> {
    const fn new(world: &'w World) -> Self {
        Self {
            world,
            stack: Vec::new(),
        }
    }

    fn feature(&mut self, feature: &Feature) -> Verdict {
        let Some(rule_set) = self.world.get::<RuleSet>(feature.rule) else {
            return Verdict::disabled(
                format!("rule set {} for '{}' is missing", feature.rule, feature.id),
                "",
            );
        };

        self.stack.push(feature.id.clone());
        let outcome = self.expr(&rule_set.expr);
        self.stack.pop();

        if outcome.holds {
            Verdict::enabled(rule_set.help_ref.clone())
        } else {
            Verdict::disabled(
                format!("{}: {}", rule_set.name, outcome.detail),
                rule_set.help_ref.clone(),
            )
        }
    }

    fn expr(&mut self, expr: &RuleExpr) -> Outcome {
        match expr {
            RuleExpr::Predicate(pred) => self.predicate(pred),
            RuleExpr::All(children) => {
                for child in children {
                    let outcome = self.expr(child);
                    if !outcome.holds {
                        return outcome;
                    }
                }
                Outcome::new(true, format!("all {} conditions hold", children.len()))
            }
            RuleExpr::Any(children) => {
                let mut failures = Vec::with_capacity(children.len());
                for child in children {
                    let outcome = self.expr(child);
                    if outcome.holds {
                        return outcome;
                    }
                    failures.push(outcome.detail);
                }
                if failures.is_empty() {
                    Outcome::new(false, "no alternative holds".to_string())
                } else {
                    Outcome::new(false, failures.join("; "))
                }
            }
            RuleExpr::Not(inner) => {
                let outcome = self.expr(inner);
                if outcome.holds {
                    Outcome::new(false, format!("not expected: {}", outcome.detail))
                } else {
                    Outcome::new(true, outcome.detail)
                }
            }
        }
    }

    fn predicate(&mut self, pred: &Predicate) -> Outcome {
        let world = self.world;
        match pred {
            Predicate::Always => Outcome::new(true, "always".to_string()),
            Predicate::Never { reason } => Outcome::new(false, reason.clone()),
            Predicate::CountAtLeast { kind, min } => {
                let count = world.count_with(*kind);
                Outcome::new(
                    count >= *min as usize,
                    format!("{count} {kind} entities, need at least {min}"),
                )
            }
            Predicate::HasComponent { entity, kind } => {
                if !world.is_alive(*entity) {
                    Outcome::new(false, format!("entity {entity} does not exist"))
                } else if world.has(*entity, *kind) {
                    Outcome::new(true, format!("{entity} has {kind}"))
                } else {
                    Outcome::new(false, format!("{entity} has no {kind}"))
                }
            }
            Predicate::EntityAlive { entity } => {
                let alive = world.is_alive(*entity);
                let detail = if alive {
                    format!("entity {entity} exists")
                } else {
                    format!("entity {entity} does not exist")
                };
                Outcome::new(alive, detail)
            }
            Predicate::ModeIs { mode } => match world.singleton::<Mode>() {
                Some((_, current)) => Outcome::new(
                    current == mode,
                    format!("mode is {} (expected {})", current.name(), mode.name()),
                ),
                None => Outcome::new(false, "no interaction mode is set".to_string()),
            },
            Predicate::FeatureEnabled { feature } => self.nested_feature(feature),
        }
    }

    fn nested_feature(&mut self, feature_id: &str) -> Outcome {
        if self.stack.iter().any(|id| id == feature_id) {
            let mut path = self.stack.clone();
            path.push(feature_id.to_string());
            return Outcome::new(false, format!("cyclic rule: {}", path.join(" -> ")));
        }
        let Some((_, feature)) = self.world.find_feature(feature_id) else {
            return Outcome::new(false, format!("unknown feature '{feature_id}'"));
        };
        let verdict = self.feature(feature);
        if verdict.enabled {
            Outcome::new(true, format!("feature '{feature_id}' is enabled"))
        } else {
            Outcome::new(
                false,
                format!("feature '{feature_id}' is disabled ({})", verdict.reason),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use megalith_core::Tool;

    fn declare(world: &mut World, id: &str, expr: RuleExpr) -> EntityId {
        let rule = world.create();
        world
            .attach(
                rule,
                RuleSet {
                    name: format!("{id}-rule"),
                    expr,
                    help_ref: format!("help/{id}"),
                }
                .into(),
            )
            .unwrap();
        let feature = world.create();
        world
            .attach(
                feature,
                Feature {
                    id: id.to_string(),
                    rule,
                }
                .into(),
            )
            .unwrap();
        feature
    }

    #[test]
    fn test_unknown_feature() {
        let world = World::new();
        assert_eq!(
            evaluate(&world, "nope"),
            Err(RuleError::UnknownFeature("nope".into()))
        );
    }

    #[test]
    fn test_count_at_least_flips() {
        let mut world = World::new();
        declare(
            &mut world,
            "tools.compare",
            RuleExpr::count_at_least(ComponentKind::Tool, 2),
        );
        let a = world.create();
        world.attach(a, Tool::new("a").into()).unwrap();

        let verdict = evaluate(&world, "tools.compare").unwrap();
        assert!(!verdict.enabled);
        assert!(verdict.reason.contains("1 Tool entities"));
        assert_eq!(verdict.help_ref, "help/tools.compare");

        let b = world.create();
        world.attach(b, Tool::new("b").into()).unwrap();
        let verdict = evaluate(&world, "tools.compare").unwrap();
        assert!(verdict.enabled);
        assert!(verdict.reason.is_empty());
    }

    #[test]
    fn test_combinators() {
        let mut world = World::new();
        let m = world.create();
        world.attach(m, Mode::DraggingTerritories.into()).unwrap();
        declare(
            &mut world,
            "split",
            RuleExpr::All(vec![
                RuleExpr::always(),
                RuleExpr::mode_is(Mode::DraggingTerritories).negate(),
            ]),
        );
        declare(
            &mut world,
            "either",
            RuleExpr::Any(vec![
                RuleExpr::never("first"),
                RuleExpr::mode_is(Mode::DraggingTerritories),
            ]),
        );

        let split = evaluate(&world, "split").unwrap();
        assert!(!split.enabled);
        assert!(split.reason.starts_with("split-rule: not expected"));
        assert!(evaluate(&world, "either").unwrap().enabled);
    }

    #[test]
    fn test_empty_any_and_never_have_reasons() {
        let mut world = World::new();
        declare(&mut world, "any", RuleExpr::Any(vec![]));
        declare(&mut world, "never", RuleExpr::never(""));
        for id in ["any", "never"] {
            let verdict = evaluate(&world, id).unwrap();
            assert!(!verdict.enabled);
            assert!(!verdict.reason.trim().is_empty());
        }
    }

    #[test]
    fn test_cycle_is_disabled_with_reason() {
        let mut world = World::new();
        declare(&mut world, "a", RuleExpr::feature_enabled("b"));
        declare(&mut world, "b", RuleExpr::feature_enabled("a"));
        let verdict = evaluate(&world, "a").unwrap();
        assert!(!verdict.enabled);
        assert!(verdict.reason.contains("cyclic rule: a -> b -> a"));
    }

    #[test]
    fn test_missing_rule_set() {
        let mut world = World::new();
        let feature = world.create();
        world
            .attach(
                feature,
                Feature {
                    id: "orphan".into(),
                    rule: EntityId::new(99, 0),
                }
                .into(),
            )
            .unwrap();
        let verdict = evaluate(&world, "orphan").unwrap();
        assert!(!verdict.enabled);
        assert!(verdict.reason.contains("missing"));
    }

    #[test]
    fn test_evaluate_all_in_index_order() {
        let mut world = World::new();
        let first = declare(&mut world, "first", RuleExpr::always());
        let second = declare(&mut world, "second", RuleExpr::never("off"));
        let all = evaluate_all(&world);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].0, first);
        assert_eq!(all[1].0, second);
        assert!(!all[1].1.enabled);
    }
}
