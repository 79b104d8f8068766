//! Integration tests for the operation log over both stores.

use std::fs;
use std::sync::Arc;

use megalith_core::{Digest, Mode, Position, Tool, World};
use megalith_history::{DiskStore, Head, HistoryError, MemoryStore, ObjectStore, OperationLog};
use megalith_ops::BatchBuilder;
use proptest::prelude::*;

/// Applies a planned batch serially and records it.
fn record(log: &mut OperationLog, world: &mut World, plan: impl FnOnce(&mut BatchBuilder)) -> Digest {
    let before = world.clone();
    let mut batch = BatchBuilder::new(world);
    plan(&mut batch);
    let ops = batch.build();
    for op in &ops {
        op.apply(world).unwrap();
    }
    log.record(&before, ops, world, true).unwrap()
}

fn add_tool(log: &mut OperationLog, world: &mut World, name: &str) -> Digest {
    record(log, world, |b| {
        let e = b.create_entity();
        b.attach(e, Tool::new(name)).unwrap();
        b.attach(e, Position::new(1.0, 2.0)).unwrap();
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn undo_then_redo_restores_every_depth(commits in 1usize..8, depth in 0usize..8) {
        let depth = depth.min(commits);
        let mut log = OperationLog::open(Arc::new(MemoryStore::new()), 3).unwrap();
        let mut world = World::new();
        let mut digests = vec![world.digest()];
        for i in 0..commits {
            add_tool(&mut log, &mut world, &format!("tool-{i}"));
            digests.push(world.digest());
        }
        let tip = log.head_commit().unwrap();

        for _ in 0..depth {
            log.undo(&mut world).unwrap();
        }
        prop_assert_eq!(world.digest(), digests[commits - depth]);

        for _ in 0..depth {
            log.redo(&mut world).unwrap();
        }
        prop_assert_eq!(world.digest(), digests[commits]);
        prop_assert_eq!(log.head_commit().unwrap(), tip);
    }
}

#[test]
fn identical_batches_give_identical_commit_ids() {
    let mut a = OperationLog::open(Arc::new(MemoryStore::new()), 8).unwrap();
    let mut b = OperationLog::open(Arc::new(MemoryStore::new()), 8).unwrap();
    let (mut wa, mut wb) = (World::new(), World::new());
    assert_eq!(add_tool(&mut a, &mut wa, "pen"), add_tool(&mut b, &mut wb, "pen"));
    assert_ne!(add_tool(&mut a, &mut wa, "x"), add_tool(&mut b, &mut wb, "y"));
}

#[test]
fn branches_diverge_independently() {
    let mut log = OperationLog::open(Arc::new(MemoryStore::new()), 0).unwrap();
    let mut world = World::new();
    let base = record(&mut log, &mut world, |b| {
        let e = b.create_entity();
        b.attach(e, Mode::Empty).unwrap();
    });
    let base_world = world.clone();
    let main_tip = add_tool(&mut log, &mut world, "main-only");

    log.branch(base, "side").unwrap();
    let mut side = log.checkout_branch("side").unwrap();
    assert_eq!(side, base_world);
    record(&mut log, &mut side, |b| b.set_mode(Mode::Natural).unwrap());
    assert_eq!(log.head(), &Head::Branch("side".into()));

    let back = log.checkout_branch("main").unwrap();
    assert_eq!(back, world);
    assert_eq!(log.head_commit().unwrap(), main_tip);
    assert_eq!(log.ancestry(main_tip).unwrap().len(), 3);
}

#[test]
fn detached_redo_follows_unique_child() {
    let mut log = OperationLog::open(Arc::new(MemoryStore::new()), 0).unwrap();
    let mut world = World::new();
    let first = add_tool(&mut log, &mut world, "a");
    let second = add_tool(&mut log, &mut world, "b");

    let mut detached = log.checkout(first).unwrap();
    assert_eq!(log.head(), &Head::Detached(first));
    assert_eq!(log.redo(&mut detached).unwrap(), second);
    assert_eq!(detached, world);
    assert!(matches!(log.redo(&mut detached), Err(HistoryError::NothingToRedo)));
}

#[test]
fn disk_history_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let (tip, world) = {
        let store = Arc::new(DiskStore::open(dir.path()).unwrap());
        let mut log = OperationLog::open(store, 2).unwrap();
        let mut world = World::new();
        for name in ["a", "b", "c"] {
            add_tool(&mut log, &mut world, name);
        }
        (log.head_commit().unwrap(), world)
    };

    let store = Arc::new(DiskStore::open(dir.path()).unwrap());
    let mut log = OperationLog::open(store, 2).unwrap();
    assert_eq!(log.head(), &Head::Branch("main".into()));
    assert_eq!(log.head_commit().unwrap(), tip);
    assert_eq!(log.world_at(tip).unwrap(), world);
}

#[test]
fn damaged_object_is_reported_as_corruption() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(DiskStore::open(dir.path()).unwrap());
    let mut log = OperationLog::open(Arc::clone(&store) as Arc<dyn ObjectStore>, 0).unwrap();
    let mut world = World::new();
    let id = add_tool(&mut log, &mut world, "a");

    let hex = id.to_hex();
    let path = dir.path().join("objects").join(&hex[..2]).join(&hex[2..]);
    let mut bytes = fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    fs::write(&path, bytes).unwrap();

    let mut reopened = OperationLog::open(store, 0);
    let err = match reopened.as_mut() {
        Ok(log) => log.world_at(id).unwrap_err(),
        Err(err) => err.clone(),
    };
    assert!(matches!(err, HistoryError::HistoryCorruption { commit, .. } if commit == id));
    assert!(err.is_fatal());
}

#[test]
fn reopened_checkout_starts_from_the_stored_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let (snapshotted, tip, world) = {
        let store = Arc::new(DiskStore::open(dir.path()).unwrap());
        let mut log = OperationLog::open(store, 2).unwrap();
        let mut world = World::new();
        add_tool(&mut log, &mut world, "a");
        let snapshotted = add_tool(&mut log, &mut world, "b");
        let tip = add_tool(&mut log, &mut world, "c");
        (snapshotted, tip, world)
    };

    let store = Arc::new(DiskStore::open(dir.path()).unwrap());
    let snapshot = store.snapshot(&snapshotted).unwrap().unwrap();
    assert!(dir.path().join("snapshots").join(snapshotted.to_hex()).is_file());
    let mut log = OperationLog::open(Arc::clone(&store) as Arc<dyn ObjectStore>, 2).unwrap();
    assert_eq!(log.world_at(tip).unwrap(), world);

    // Damage the snapshot: a fresh session must read it, and notice.
    let hex = snapshot.to_hex();
    let path = dir.path().join("objects").join(&hex[..2]).join(&hex[2..]);
    let mut bytes = fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    fs::write(&path, bytes).unwrap();

    let mut log = OperationLog::open(store, 2).unwrap();
    let err = log.world_at(tip).unwrap_err();
    assert!(matches!(err, HistoryError::HistoryCorruption { commit, .. } if commit == snapshot));
}

#[test]
fn checkout_branch_stays_inside_the_branch_namespace() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(DiskStore::open(dir.path()).unwrap());
    let mut log = OperationLog::open(store, 0).unwrap();
    assert_eq!(
        log.checkout_branch("../HEAD"),
        Err(HistoryError::InvalidBranchName("../HEAD".into()))
    );
    assert_eq!(log.head(), &Head::Branch("main".into()));
}

#[test]
fn redo_stack_does_not_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = Arc::new(DiskStore::open(dir.path()).unwrap());
        let mut log = OperationLog::open(store, 0).unwrap();
        let mut world = World::new();
        add_tool(&mut log, &mut world, "a");
        log.undo(&mut world).unwrap();
    }

    let store = Arc::new(DiskStore::open(dir.path()).unwrap());
    let mut log = OperationLog::open(store, 0).unwrap();
    assert_eq!(log.head_commit().unwrap(), log.genesis());
    let mut world = World::new();
    assert_eq!(log.redo(&mut world), Err(HistoryError::NothingToRedo));
    assert_eq!(world, World::new());
}
