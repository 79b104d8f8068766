//! End-to-end behavior of the engine.

use megalith::{ChangeCause, Engine, EngineConfig, EngineEvent};
use megalith_core::{ComponentKind, Digest, EntityId, Feature, Position, RuleExpr, RuleSet, Tool};
use megalith_history::{Head, HistoryError};
use megalith_ops::Operation;
use megalith_scheduler::{CancelToken, OperationResult, Rejection};
use proptest::prelude::*;

fn config(workers: usize) -> EngineConfig {
    EngineConfig {
        worker_threads: workers,
        verify_determinism: true,
        snapshot_interval: 4,
        ..EngineConfig::default()
    }
}

fn engine(workers: usize) -> Engine {
    Engine::open(config(workers)).unwrap()
}

fn all_committed(results: &[OperationResult]) -> bool {
    results.iter().all(OperationResult::is_committed)
}

/// `[Create A, Attach(A, {0,0}), Create B, Attach(B, {1,1}), Move(A, {5,5})]`
fn scenario(engine: &Engine) -> (EntityId, EntityId, Vec<Operation>) {
    let mut batch = engine.batch();
    let a = batch.create_entity();
    batch.attach(a, Position::new(0.0, 0.0)).unwrap();
    let b = batch.create_entity();
    batch.attach(b, Position::new(1.0, 1.0)).unwrap();
    batch.move_entity(a, Position::new(5.0, 5.0)).unwrap();
    (a, b, batch.build())
}

#[test]
fn move_scenario_is_reproducible() {
    let mut digests = Vec::new();
    let mut commits = Vec::new();
    for workers in [1, 2, 4] {
        let mut engine = engine(workers);
        let (a, b, ops) = scenario(&engine);
        assert!(all_committed(&engine.submit(ops).unwrap()));

        let world = engine.world();
        assert_eq!(world.get::<Position>(a), Some(&Position::new(5.0, 5.0)));
        assert_eq!(world.get::<Position>(b), Some(&Position::new(1.0, 1.0)));
        drop(world);

        digests.push(engine.digest());
        commits.push(engine.head_commit().unwrap());
    }
    assert!(digests.windows(2).all(|w| w[0] == w[1]));
    assert!(commits.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn one_invalid_among_four_valid() {
    let mut engine = engine(4);
    let mut setup = engine.batch();
    let ids: Vec<EntityId> = (0..4).map(|_| setup.create_entity()).collect();
    engine.submit(setup.build()).unwrap();

    let mut batch = engine.batch();
    for (i, &id) in ids.iter().enumerate() {
        batch.attach(id, Tool::new(format!("tool-{i}"))).unwrap();
    }
    let mut ops = batch.build();

    // Planned against a World where the target is already gone.
    let mut stale = engine.batch();
    stale.destroy_entity(ids[3]).unwrap();
    let doomed = stale.build();
    engine.submit(doomed).unwrap();
    ops.insert(0, {
        let mut b = engine.batch();
        b.create_entity();
        b.build().remove(0)
    });

    let results = engine.submit(ops).unwrap();
    let rejected: Vec<&OperationResult> = results.iter().filter(|r| !r.is_committed()).collect();
    assert_eq!(results.len(), 5);
    assert_eq!(rejected.len(), 1);
    assert!(matches!(
        rejected[0],
        OperationResult::Rejected(Rejection::ValidationFailed(_))
    ));
    assert!(!results[4].is_committed());
}

#[test]
fn feature_flips_in_the_tick_the_second_tool_commits() {
    let mut engine = engine(2);
    let mut batch = engine.batch();
    let rule = batch.create_entity();
    batch
        .attach(
            rule,
            RuleSet {
                name: "two-tools".into(),
                expr: RuleExpr::count_at_least(ComponentKind::Tool, 2),
                help_ref: "help/compare".into(),
            },
        )
        .unwrap();
    let feature = batch.create_entity();
    batch
        .attach(feature, Feature { id: "compare".into(), rule })
        .unwrap();
    let first_tool = batch.create_entity();
    batch.attach(first_tool, Tool::new("pen")).unwrap();
    engine.submit(batch.build()).unwrap();

    let verdict = engine.query_feature_state("compare").unwrap();
    assert!(!verdict.enabled);
    assert!(!verdict.reason.is_empty());
    assert_eq!(verdict.help_ref, "help/compare");

    let mut batch = engine.batch();
    let second = batch.create_entity();
    batch.attach(second, Tool::new("brush")).unwrap();
    engine.submit(batch.build()).unwrap();
    assert!(engine.query_feature_state("compare").unwrap().enabled);

    engine.undo().unwrap();
    assert!(!engine.query_feature_state("compare").unwrap().enabled);
    assert_eq!(engine.feature_states().len(), 1);
    assert!(engine.query_feature_state("missing").is_err());
}

#[test]
fn repeated_queries_hit_the_cache() {
    let mut engine = engine(1);
    let (_, _, ops) = scenario(&engine);
    engine.submit(ops).unwrap();
    let mut batch = engine.batch();
    let rule = batch.create_entity();
    batch
        .attach(
            rule,
            RuleSet {
                name: "always".into(),
                expr: RuleExpr::always(),
                help_ref: String::new(),
            },
        )
        .unwrap();
    let feature = batch.create_entity();
    batch.attach(feature, Feature { id: "f".into(), rule }).unwrap();
    engine.submit(batch.build()).unwrap();

    let first = engine.query_feature_state("f").unwrap();
    let second = engine.query_feature_state("f").unwrap();
    assert_eq!(first, second);
    assert_eq!(engine.rule_cache_stats().hits, 1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn undo_redo_round_trips_at_any_depth(batches in 1usize..6, depth in 0usize..6) {
        let depth = depth.min(batches);
        let mut engine = engine(2);
        let mut digests = vec![engine.digest()];
        for i in 0..batches {
            let mut batch = engine.batch();
            let e = batch.create_entity();
            batch.attach(e, Position::new(f64::from(u32::try_from(i).unwrap()), 0.0)).unwrap();
            engine.submit(batch.build()).unwrap();
            digests.push(engine.digest());
        }
        for _ in 0..depth {
            engine.undo().unwrap();
        }
        prop_assert_eq!(engine.digest(), digests[batches - depth]);
        for _ in 0..depth {
            engine.redo().unwrap();
        }
        prop_assert_eq!(engine.digest(), digests[batches]);
    }
}

#[test]
fn undo_at_genesis_is_an_error_not_a_poison() {
    let mut engine = engine(1);
    let err = engine.undo().unwrap_err();
    assert!(matches!(
        err,
        megalith::EngineError::History(HistoryError::NothingToUndo)
    ));
    assert!(engine.poisoned().is_none());
}

#[test]
fn subscribers_see_every_world_change() {
    let mut engine = engine(2);
    let events = engine.subscribe();
    let (_, _, ops) = scenario(&engine);
    engine.submit(ops).unwrap();
    let commit = engine.head_commit().unwrap();
    let after_submit = engine.digest();
    let parent = engine.undo().unwrap();

    assert_eq!(
        events.drain(),
        vec![
            EngineEvent::WorldChanged {
                commit,
                world: after_submit,
                cause: ChangeCause::Submit,
            },
            EngineEvent::WorldChanged {
                commit: parent,
                world: engine.digest(),
                cause: ChangeCause::Undo,
            },
        ]
    );
}

#[test]
fn cancelled_batch_commits_nothing() {
    let mut engine = engine(2);
    let genesis = engine.head_commit().unwrap();
    let (_, _, ops) = scenario(&engine);
    let cancel = CancelToken::new();
    cancel.cancel();
    let results = engine.submit_cancellable(ops, &cancel).unwrap();
    assert!(results
        .iter()
        .all(|r| *r == OperationResult::Rejected(Rejection::Cancelled)));
    assert_eq!(engine.head_commit().unwrap(), genesis);
}

#[test]
fn branch_checkout_and_replay() {
    let mut engine = engine(2);
    let (a, _, ops) = scenario(&engine);
    engine.submit(ops).unwrap();
    let base = engine.head_commit().unwrap();

    let mut batch = engine.batch();
    batch.attach(a, Tool::new("main-tool")).unwrap();
    engine.submit(batch.build()).unwrap();
    let main_change = engine.head_commit().unwrap();
    let main_digest = engine.digest();

    engine.branch(base, "side").unwrap();
    engine.checkout_branch("side").unwrap();
    assert_eq!(engine.head(), &Head::Branch("side".into()));
    assert!(!engine.world().has(a, ComponentKind::Tool));

    // Carry main's change over by replaying it.
    let results = engine.replay(main_change).unwrap();
    assert!(all_committed(&results));
    assert_eq!(engine.digest(), main_digest);
    assert_ne!(engine.head_commit().unwrap(), main_change);

    engine.checkout(base).unwrap();
    assert_eq!(engine.head(), &Head::Detached(base));
    let branches: Vec<String> = engine.branches().unwrap().into_iter().map(|(n, _)| n).collect();
    assert_eq!(branches, vec!["main".to_string(), "side".to_string()]);
}

#[test]
fn disk_history_reopens_at_the_same_world() {
    let dir = tempfile::tempdir().unwrap();
    let config = EngineConfig {
        history_dir: Some(dir.path().to_path_buf()),
        ..config(2)
    };

    let (digest, head) = {
        let mut engine = Engine::open(config.clone()).unwrap();
        let (_, _, ops) = scenario(&engine);
        engine.submit(ops).unwrap();
        let digest = engine.digest();
        (digest, engine.close().unwrap())
    };

    let engine = Engine::open(config).unwrap();
    assert_eq!(engine.head_commit().unwrap(), head);
    assert_eq!(engine.digest(), digest);
    assert_ne!(digest, Digest::ZERO);
}

#[test]
fn failed_history_write_rolls_the_world_back_to_head() {
    let dir = tempfile::tempdir().unwrap();
    let config = EngineConfig {
        history_dir: Some(dir.path().to_path_buf()),
        ..config(2)
    };
    let mut engine = Engine::open(config).unwrap();
    let genesis = engine.head_commit().unwrap();
    let genesis_world = engine.digest();

    // Objects can no longer be written once their directory is a file.
    let objects = dir.path().join("objects");
    let parked = dir.path().join("objects.parked");
    std::fs::rename(&objects, &parked).unwrap();
    std::fs::write(&objects, b"not a directory").unwrap();

    let mut batch = engine.batch();
    let e = batch.create_entity();
    batch.attach(e, Position::new(3.0, 4.0)).unwrap();
    let err = engine.submit(batch.build()).unwrap_err();
    assert!(matches!(
        err,
        megalith::EngineError::History(HistoryError::Io(_))
    ));
    assert!(engine.poisoned().is_none());
    assert_eq!(engine.head_commit().unwrap(), genesis);
    assert_eq!(engine.digest(), genesis_world);
    assert!(!engine.world().is_alive(e));

    std::fs::remove_file(&objects).unwrap();
    std::fs::rename(&parked, &objects).unwrap();

    let mut batch = engine.batch();
    let e = batch.create_entity();
    batch.attach(e, Position::new(3.0, 4.0)).unwrap();
    assert!(all_committed(&engine.submit(batch.build()).unwrap()));
    let head = engine.head_commit().unwrap();
    assert_ne!(head, genesis);
    assert_eq!(engine.commit(head).unwrap().world(), engine.digest());
}

#[test]
fn uncommitted_batches_leave_the_world_at_head() {
    let mut engine = engine(2);
    let (a, _, ops) = scenario(&engine);
    engine.submit(ops).unwrap();

    let mut planned = engine.batch();
    planned.destroy_entity(a).unwrap();
    let destroy = planned.build();
    assert!(all_committed(&engine.submit(destroy.clone()).unwrap()));
    let head = engine.head_commit().unwrap();

    // The same destroy again: its target is already gone.
    let results = engine.submit(destroy).unwrap();
    assert!(!all_committed(&results));
    assert_eq!(engine.head_commit().unwrap(), head);
    assert_eq!(engine.commit(head).unwrap().world(), engine.digest());

    let cancel = CancelToken::new();
    cancel.cancel();
    let mut batch = engine.batch();
    let e = batch.create_entity();
    batch.attach(e, Tool::new("late")).unwrap();
    engine.submit_cancellable(batch.build(), &cancel).unwrap();
    assert_eq!(engine.head_commit().unwrap(), head);
    assert_eq!(engine.commit(head).unwrap().world(), engine.digest());
}
