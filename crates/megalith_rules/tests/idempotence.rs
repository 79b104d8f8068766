//! Repeated evaluation of the same (feature, World) pair is stable and never
//! mutates the World.

use megalith_core::{ComponentKind, Feature, RuleExpr, RuleSet, Tool, World};
use megalith_rules::Evaluator;
use proptest::prelude::*;

fn world_with_tools(tools: usize, min: u32) -> World {
    let mut world = World::new();
    let rule = world.create();
    world
        .attach(
            rule,
            RuleSet {
                name: "enough-tools".into(),
                expr: RuleExpr::count_at_least(ComponentKind::Tool, min),
                help_ref: "help/tools".into(),
            }
            .into(),
        )
        .unwrap();
    let feature = world.create();
    world
        .attach(
            feature,
            Feature {
                id: "tools.compare".into(),
                rule,
            }
            .into(),
        )
        .unwrap();
    for i in 0..tools {
        let id = world.create();
        world.attach(id, Tool::new(format!("t{i}")).into()).unwrap();
    }
    world
}

proptest! {
    #[test]
    fn evaluation_is_idempotent(tools in 0usize..6, min in 0u32..6, polls in 1usize..5) {
        let world = world_with_tools(tools, min);
        let digest = world.digest();
        let evaluator = Evaluator::new(4);

        let first = evaluator.evaluate(&world, "tools.compare").unwrap();
        for _ in 0..polls {
            prop_assert_eq!(&evaluator.evaluate(&world, "tools.compare").unwrap(), &first);
        }
        prop_assert_eq!(world.digest(), digest);
        prop_assert_eq!(first.enabled, tools >= min as usize);
        prop_assert!(first.enabled || !first.reason.is_empty());
    }
}

#[test]
fn cached_and_uncached_agree() {
    let world = world_with_tools(1, 2);
    let cached = Evaluator::new(8).evaluate(&world, "tools.compare").unwrap();
    let direct = megalith_rules::evaluate(&world, "tools.compare").unwrap();
    assert_eq!(cached, direct);
}
