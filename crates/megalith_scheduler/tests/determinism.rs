//! The scheduler's result equals submission-order serial execution, and
//! does not depend on the number of worker threads.

use std::sync::Arc;

use megalith_core::{ComponentKind, EntityId, Position, Tool, World};
use megalith_ops::{BatchBuilder, Operation};
use megalith_scheduler::{
    CancelToken, OperationResult, Rejection, Scheduler, SchedulerConfig,
};
use parking_lot::RwLock;
use proptest::prelude::*;

fn seeded_world(n: u32) -> (World, Vec<EntityId>) {
    let mut world = World::new();
    let ids = (0..n)
        .map(|i| {
            let id = world.create();
            world
                .attach(id, Position::new(f64::from(i), 0.0).into())
                .unwrap();
            id
        })
        .collect();
    (world, ids)
}

/// Builds a mixed batch; some operations go stale on purpose.
fn mixed_batch(world: &World, ids: &[EntityId], actions: &[(u8, usize, f64)]) -> Vec<Operation> {
    let mut batch = BatchBuilder::new(world);
    let mut stale = Vec::new();
    for &(choice, pick, x) in actions {
        let id = ids[pick % ids.len()];
        let _ = match choice {
            0 => batch.move_entity(id, Position::new(x, -x)),
            1 => batch.attach(id, Tool::new("t")),
            2 => batch.detach(id, ComponentKind::Tool),
            3 => batch.translate_entities(&[id, ids[(pick + 1) % ids.len()]], x, 1.0),
            4 => {
                // Planned against the original World, so later moves make it stale.
                let mut side = BatchBuilder::new(world);
                let _ = side.move_entity(id, Position::new(x, x));
                stale.extend(side.build());
                Ok(())
            }
            _ => {
                batch.create_entity();
                Ok(())
            }
        };
    }
    let mut ops = batch.build();
    ops.extend(stale);
    ops
}

fn serial(world: &World, ops: &[Operation]) -> (World, Vec<bool>) {
    let mut world = world.clone();
    let committed = ops.iter().map(|op| op.apply(&mut world).is_ok()).collect();
    (world, committed)
}

fn scheduled(world: &World, ops: &[Operation], threads: usize) -> (World, Vec<OperationResult>) {
    let scheduler = Scheduler::new(SchedulerConfig {
        worker_threads: threads,
        max_batch_size: 16,
    })
    .unwrap();
    let live = Arc::new(RwLock::new(world.clone()));
    let results = scheduler
        .run(&live, ops.to_vec(), &CancelToken::new())
        .unwrap();
    let world = live.read().clone();
    (world, results)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn matches_serial_for_any_worker_count(
        actions in prop::collection::vec((0u8..6, 0usize..6, -20.0f64..20.0), 1..40)
    ) {
        let (world, ids) = seeded_world(6);
        let ops = mixed_batch(&world, &ids, &actions);
        let (expected, committed) = serial(&world, &ops);

        for threads in [1, 2, 4] {
            let (actual, results) = scheduled(&world, &ops, threads);
            prop_assert_eq!(actual.digest(), expected.digest());
            let flags: Vec<bool> = results.iter().map(OperationResult::is_committed).collect();
            prop_assert_eq!(&flags, &committed);
        }
    }
}

#[test]
fn independent_pair_commutes() {
    let (world, ids) = seeded_world(2);
    let mut batch = BatchBuilder::new(&world);
    batch.move_entity(ids[0], Position::new(3.0, 3.0)).unwrap();
    batch.attach(ids[1], Tool::new("t")).unwrap();
    let ops = batch.build();
    assert!(!ops[0].access().conflicts_with(ops[1].access()));

    let (forward, _) = scheduled(&world, &ops, 2);
    let reversed: Vec<Operation> = ops.iter().rev().cloned().collect();
    let (backward, _) = scheduled(&world, &reversed, 2);
    assert_eq!(forward.digest(), backward.digest());
}

#[test]
fn one_invalid_among_four_valid() {
    let (world, ids) = seeded_world(5);
    let mut batch = BatchBuilder::new(&world);
    for (i, &id) in ids.iter().enumerate() {
        let to = if i == 3 {
            Position::new(f64::INFINITY, 0.0)
        } else {
            Position::new(1.0, 1.0)
        };
        batch.move_entity(id, to).unwrap();
    }
    let (_, results) = scheduled(&world, &batch.build(), 4);
    let rejected: Vec<_> = results
        .iter()
        .enumerate()
        .filter_map(|(i, r)| r.rejection().map(|rej| (i, rej.clone())))
        .collect();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].0, 3);
    assert!(matches!(rejected[0].1, Rejection::ValidationFailed(_)));
}
