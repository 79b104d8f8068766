//! # Taskpool Scheduler
//!
//! Executes a batch group by group:
//!
//! 1. The [`crate::analyzer`] partitions the batch into independent groups
//! 2. Within a group, `validate` runs in parallel on the worker pool against
//!    a read guard of the World
//! 3. Validated operations `commit` one at a time in submission order
//!
//! The resulting World equals strict submission-order serial execution, for
//! any number of workers.
//!
//! Composite operations are scheduled like nested batches when their commit
//! slot comes up. A composite is atomic: if a child is rejected, the children
//! already committed are undone in reverse commit order.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::unbounded;
use megalith_core::World;
use megalith_ops::{Operation, OperationError};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::analyzer::partition;
use crate::error::{SchedulerError, SchedulerResult};
use crate::pool::WorkerPool;
use crate::state::{OpState, OperationResult, Rejection, Tracker};

/// Default cap on operations analyzed together.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 4096;

/// Scheduler settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Validation threads.
    pub worker_threads: usize,
    /// Larger batches are split into consecutive sub-batches of this size.
    pub max_batch_size: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_threads: thread::available_parallelism().map_or(1, NonZeroUsize::get),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }
}

/// Cooperative cancellation, observed between groups.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A token that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Groups already running finish.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// State of one (possibly nested) batch run.
struct Run {
    tracker: Tracker,
    /// Indices in the order they committed.
    committed: Vec<usize>,
}

/// Dependency-aware batch executor.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use megalith_core::{Position, World};
/// use megalith_ops::BatchBuilder;
/// use megalith_scheduler::{CancelToken, Scheduler, SchedulerConfig};
/// use parking_lot::RwLock;
///
/// let world = Arc::new(RwLock::new(World::new()));
/// let mut batch = BatchBuilder::new(&world.read());
/// let id = batch.create_entity();
/// batch.attach(id, Position::new(1.0, 1.0)).unwrap();
///
/// let scheduler = Scheduler::new(SchedulerConfig::default()).unwrap();
/// let results = scheduler.run(&world, batch.build(), &CancelToken::new()).unwrap();
/// assert!(results.iter().all(|r| r.is_committed()));
/// ```
#[derive(Debug)]
pub struct Scheduler {
    pool: WorkerPool,
    max_batch_size: usize,
}

impl Scheduler {
    /// Starts the worker pool.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::InvalidConfig`] for zero threads or a zero batch
    /// size.
    pub fn new(config: SchedulerConfig) -> SchedulerResult<Self> {
        if config.max_batch_size == 0 {
            return Err(SchedulerError::InvalidConfig(
                "max_batch_size must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            pool: WorkerPool::new(config.worker_threads)?,
            max_batch_size: config.max_batch_size,
        })
    }

    /// Number of validation threads.
    #[must_use]
    pub fn worker_threads(&self) -> usize {
        self.pool.threads()
    }

    /// Sub-batch size.
    #[must_use]
    pub const fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    /// Executes `ops` against `world`.
    ///
    /// # Arguments
    ///
    /// * `world` - The live World; only this call's commit step writes to it
    /// * `ops` - The batch, in submission order
    /// * `cancel` - Checked before every group
    ///
    /// # Returns
    ///
    /// One result per operation, in submission order.
    ///
    /// # Errors
    ///
    /// Fatal conditions only: [`SchedulerError::CommitFailed`],
    /// [`SchedulerError::WorkerLost`], [`SchedulerError::IllegalTransition`].
    pub fn run(
        &self,
        world: &Arc<RwLock<World>>,
        ops: Vec<Operation>,
        cancel: &CancelToken,
    ) -> SchedulerResult<Vec<OperationResult>> {
        let total = ops.len();
        let run = self.run_ops(world, &Arc::new(ops), Some(cancel))?;
        let results = run.tracker.finish()?;
        let committed = results.iter().filter(|r| r.is_committed()).count();
        info!(
            total,
            committed,
            rejected = total - committed,
            "batch executed"
        );
        Ok(results)
    }

    fn run_ops(
        &self,
        world: &Arc<RwLock<World>>,
        ops: &Arc<Vec<Operation>>,
        cancel: Option<&CancelToken>,
    ) -> SchedulerResult<Run> {
        let mut run = Run {
            tracker: Tracker::new(ops.len()),
            committed: Vec::new(),
        };
        for start in (0..ops.len()).step_by(self.max_batch_size) {
            let end = (start + self.max_batch_size).min(ops.len());
            let groups = partition(&ops[start..end]);
            debug!(start, end, groups = groups.len(), "sub-batch analyzed");

            for group in groups {
                if cancel.is_some_and(CancelToken::is_cancelled) {
                    let cancelled = run.tracker.cancel_pending()?;
                    warn!(cancelled, "batch cancelled between groups");
                    return Ok(run);
                }
                let group: Vec<usize> = group.into_iter().map(|i| i + start).collect();
                self.run_group(world, ops, &group, &mut run)?;
            }
        }
        Ok(run)
    }

    fn run_group(
        &self,
        world: &Arc<RwLock<World>>,
        ops: &Arc<Vec<Operation>>,
        group: &[usize],
        run: &mut Run,
    ) -> SchedulerResult<()> {
        for &index in group {
            run.tracker.advance(index, OpState::Validating)?;
        }

        // Phase 1: parallel validation of primitives.
        let primitives: Vec<usize> = group
            .iter()
            .copied()
            .filter(|&i| !ops[i].is_composite())
            .collect();
        for (index, verdict) in self.validate_all(world, ops, &primitives)? {
            match verdict {
                Ok(()) => run.tracker.advance(index, OpState::Validated)?,
                Err(err) => {
                    debug!(index, op = %ops[index], error = %err, "operation rejected");
                    run.tracker
                        .reject(index, Rejection::ValidationFailed(reason_of(&err)))?;
                }
            }
        }

        // Phase 2: sequential commit in submission order.
        for &index in group {
            let op = &ops[index];
            if op.is_composite() {
                match self.run_composite(world, op)? {
                    Ok(()) => run.tracker.advance(index, OpState::Validated)?,
                    Err(reason) => {
                        debug!(index, op = %op, reason = %reason, "composite rejected");
                        run.tracker.reject(index, Rejection::ValidationFailed(reason))?;
                        continue;
                    }
                }
            } else if run.tracker.state(index) != OpState::Validated {
                continue;
            } else {
                op.commit(&mut world.write())
                    .map_err(|source| SchedulerError::CommitFailed { index, source })?;
            }
            run.tracker.advance(index, OpState::Committed)?;
            run.committed.push(index);
        }
        Ok(())
    }

    /// Validates `indices` against the current World, in parallel when more
    /// than one. Results come back sorted by index.
    fn validate_all(
        &self,
        world: &Arc<RwLock<World>>,
        ops: &Arc<Vec<Operation>>,
        indices: &[usize],
    ) -> SchedulerResult<Vec<(usize, Result<(), OperationError>)>> {
        if indices.len() <= 1 {
            let guard = world.read();
            return Ok(indices.iter().map(|&i| (i, ops[i].validate(&guard))).collect());
        }

        let (tx, rx) = unbounded();
        for &index in indices {
            let world = Arc::clone(world);
            let ops = Arc::clone(ops);
            let tx = tx.clone();
            self.pool.execute(move || {
                let verdict = ops[index].validate(&world.read());
                let _ = tx.send((index, verdict));
            })?;
        }
        drop(tx);

        let mut verdicts: Vec<_> = rx.iter().collect();
        if verdicts.len() != indices.len() {
            return Err(SchedulerError::WorkerLost);
        }
        verdicts.sort_unstable_by_key(|(index, _)| *index);
        Ok(verdicts)
    }

    /// Runs a composite's children as a nested batch. On rejection the
    /// committed children are rolled back and the reason is returned.
    fn run_composite(
        &self,
        world: &Arc<RwLock<World>>,
        op: &Operation,
    ) -> SchedulerResult<Result<(), String>> {
        let children = Arc::new(op.children().to_vec());
        let run = self.run_ops(world, &children, None)?;
        let results = run.tracker.finish()?;

        let Some((index, rejection)) = results
            .iter()
            .enumerate()
            .find_map(|(i, result)| result.rejection().map(|rejection| (i, rejection)))
        else {
            return Ok(Ok(()));
        };

        let mut guard = world.write();
        for &done in run.committed.iter().rev() {
            children[done]
                .inverse()
                .commit(&mut guard)
                .map_err(|source| SchedulerError::CommitFailed {
                    index: done,
                    source,
                })?;
        }
        let cause = match rejection {
            Rejection::ValidationFailed(reason) => OperationError::failed(reason.clone()),
            Rejection::Cancelled => OperationError::failed("cancelled"),
        };
        Ok(Err(reason_of(&Operation::child_failed(
            index,
            &children[index],
            &cause,
        ))))
    }
}

fn reason_of(err: &OperationError) -> String {
    match err {
        OperationError::ValidationFailed(reason) => reason.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use megalith_core::{EntityId, Position};
    use megalith_ops::BatchBuilder;

    fn scheduler(threads: usize) -> Scheduler {
        Scheduler::new(SchedulerConfig {
            worker_threads: threads,
            max_batch_size: 64,
        })
        .unwrap()
    }

    fn positioned(n: u32) -> (Arc<RwLock<World>>, Vec<EntityId>) {
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
        (Arc::new(RwLock::new(world)), ids)
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let config = SchedulerConfig {
            worker_threads: 1,
            max_batch_size: 0,
        };
        assert!(Scheduler::new(config).is_err());
    }

    #[test]
    fn test_empty_batch() {
        let (world, _) = positioned(0);
        let results = scheduler(2).run(&world, Vec::new(), &CancelToken::new());
        assert_eq!(results.unwrap(), Vec::new());
    }

    #[test]
    fn test_rejection_drops_only_that_operation() {
        let (world, ids) = positioned(5);
        let mut batch = BatchBuilder::new(&world.read());
        for (i, &id) in ids.iter().enumerate() {
            let x = if i == 2 { f64::NAN } else { 10.0 };
            batch.move_entity(id, Position::new(x, 0.0)).unwrap();
        }

        let results = scheduler(4)
            .run(&world, batch.build(), &CancelToken::new())
            .unwrap();
        assert_eq!(results.iter().filter(|r| r.is_committed()).count(), 4);
        assert!(matches!(
            results[2],
            OperationResult::Rejected(Rejection::ValidationFailed(_))
        ));
        assert_eq!(
            world.read().get::<Position>(ids[2]),
            Some(&Position::new(2.0, 0.0))
        );
    }

    #[test]
    fn test_cancelled_before_start() {
        let (world, ids) = positioned(2);
        let before = world.read().digest();
        let mut batch = BatchBuilder::new(&world.read());
        batch.move_entity(ids[0], Position::new(5.0, 5.0)).unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();
        let results = scheduler(2).run(&world, batch.build(), &cancel).unwrap();
        assert_eq!(results, vec![OperationResult::Rejected(Rejection::Cancelled)]);
        assert_eq!(world.read().digest(), before);
    }

    #[test]
    fn test_composite_rolls_back_on_child_failure() {
        let (world, ids) = positioned(3);
        let mut batch = BatchBuilder::new(&world.read());
        batch.translate_entities(&ids, 1.0, 1.0).unwrap();
        let translate = batch.build();

        // Move the last entity first so the translate's capture is stale.
        let mut first = BatchBuilder::new(&world.read());
        first.move_entity(ids[2], Position::new(7.0, 7.0)).unwrap();
        let mut ops = first.build();
        ops.extend(translate);

        let results = scheduler(2).run(&world, ops, &CancelToken::new()).unwrap();
        assert!(results[0].is_committed());
        let Some(Rejection::ValidationFailed(reason)) = results[1].rejection() else {
            panic!("composite should be rejected");
        };
        assert!(reason.contains("sub-operation 2"));

        let world = world.read();
        assert_eq!(world.get::<Position>(ids[0]), Some(&Position::new(0.0, 0.0)));
        assert_eq!(world.get::<Position>(ids[1]), Some(&Position::new(1.0, 0.0)));
        assert_eq!(world.get::<Position>(ids[2]), Some(&Position::new(7.0, 7.0)));
    }

    #[test]
    fn test_sub_batching_matches_single_batch() {
        let (small, ids) = positioned(10);
        let large = Arc::new(RwLock::new(small.read().clone()));
        let mut batch = BatchBuilder::new(&small.read());
        for (i, &id) in ids.iter().enumerate().cycle().take(30) {
            let x = f64::from(u32::try_from(i).unwrap());
            batch.move_entity(id, Position::new(x, x)).unwrap();
        }
        let ops = batch.build();

        let chunked = Scheduler::new(SchedulerConfig {
            worker_threads: 3,
            max_batch_size: 4,
        })
        .unwrap();
        let a = chunked.run(&small, ops.clone(), &CancelToken::new()).unwrap();
        let b = scheduler(3).run(&large, ops, &CancelToken::new()).unwrap();
        assert_eq!(a, b);
        assert_eq!(small.read().digest(), large.read().digest());
    }
}
