//! # Engine
//!
//! Wires the pieces together and owns the live World.
//!
//! ## Submit path
//!
//! ```text
//! submit(batch)
//!   ├─ scheduler: partition → parallel validate → ordered commit
//!   ├─ log: record committed ops + World digest (optional serial re-check)
//!   └─ events: WorldChanged { commit, world }
//! ```
//!
//! A batch in which nothing commits leaves no trace in the history.

use std::sync::Arc;

use megalith_core::{Digest, EntityId, ParamValue, World};
use megalith_history::{Commit, DiskStore, Head, MemoryStore, ObjectStore, OperationLog};
use megalith_ops::{BatchBuilder, Operation, OperationCatalog};
use megalith_rules::{evaluate_all, CacheStats, Evaluator, PredicateCatalog, Verdict};
use megalith_scheduler::{CancelToken, OperationResult, Scheduler};
use parking_lot::{RwLock, RwLockReadGuard};
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::events::{ChangeCause, EngineEvent, EventBus, EventReceiver};

/// A deterministic ECS operation engine with versioned history.
pub struct Engine {
    config: EngineConfig,
    /// Written only by the scheduler's commit step and by history moves.
    world: Arc<RwLock<World>>,
    scheduler: Scheduler,
    log: OperationLog,
    evaluator: Evaluator,
    events: EventBus,
    /// Set by the first fatal error.
    poison: Option<String>,
}

impl Engine {
    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Opens an engine, replaying the World at HEAD from its history.
    ///
    /// History lives in `config.history_dir` when set, in memory otherwise.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidConfig`], or any failure loading and verifying
    /// the history.
    pub fn open(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let store: Arc<dyn ObjectStore> = match &config.history_dir {
            Some(dir) => Arc::new(DiskStore::open(dir)?),
            None => Arc::new(MemoryStore::new()),
        };
        Self::with_store(config, store)
    }

    /// Opens an engine over an explicit object store.
    ///
    /// # Errors
    ///
    /// As [`Engine::open`].
    pub fn with_store(config: EngineConfig, store: Arc<dyn ObjectStore>) -> EngineResult<Self> {
        config.validate()?;
        let mut log = OperationLog::open(store, config.snapshot_interval)?;
        let head = log.head_commit()?;
        let world = log.world_at(head)?;
        let scheduler = Scheduler::new(config.scheduler())?;

        info!(
            head = %log.head(),
            commit = %head.short(),
            entities = world.alive_count(),
            workers = scheduler.worker_threads(),
            "engine opened"
        );
        Ok(Self {
            evaluator: Evaluator::new(config.rule_cache_capacity),
            events: EventBus::new(config.event_capacity),
            world: Arc::new(RwLock::new(world)),
            scheduler,
            log,
            config,
            poison: None,
        })
    }

    /// Shuts the engine down, joining the worker threads.
    ///
    /// Stores write through, so nothing is buffered.
    ///
    /// # Returns
    ///
    /// The commit HEAD points at, for reopening.
    ///
    /// # Errors
    ///
    /// If HEAD cannot be resolved.
    pub fn close(self) -> EngineResult<Digest> {
        let head = self.log.head_commit()?;
        info!(commit = %head.short(), "engine closed");
        Ok(head)
    }

    /// Rebuilds the live World from HEAD and clears a previous fatal error.
    ///
    /// # Errors
    ///
    /// If the history itself cannot be replayed; the engine stays poisoned.
    pub fn rebuild(&mut self) -> EngineResult<Digest> {
        let head = self.log.head_commit()?;
        let world = self.log.world_at(head).map_err(|e| self.fail(e.into()))?;
        *self.world.write() = world;
        self.evaluator.clear();
        self.poison = None;
        info!(commit = %head.short(), "engine rebuilt from history");
        Ok(head)
    }

    fn ensure_live(&self) -> EngineResult<()> {
        match &self.poison {
            Some(reason) => Err(EngineError::Poisoned(reason.clone())),
            None => Ok(()),
        }
    }

    /// Records `err` as the poison reason if it is fatal.
    fn fail(&mut self, err: EngineError) -> EngineError {
        if err.is_fatal() && self.poison.is_none() {
            error!(error = %err, "fatal engine error, refusing further work");
            self.poison = Some(err.to_string());
        }
        err
    }

    fn publish(&self, commit: Digest, cause: ChangeCause) {
        let world = self.world.read().digest();
        self.events.publish(&EngineEvent::WorldChanged {
            commit,
            world,
            cause,
        });
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// The active settings.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Read access to the live World. Hold the guard briefly: submissions
    /// wait for it.
    #[must_use]
    pub fn world(&self) -> RwLockReadGuard<'_, World> {
        self.world.read()
    }

    /// Digest of the live World.
    #[must_use]
    pub fn digest(&self) -> Digest {
        self.world.read().digest()
    }

    /// The reason the engine stopped, if it did.
    #[must_use]
    pub fn poisoned(&self) -> Option<&str> {
        self.poison.as_deref()
    }

    /// Starts a batch planned against the live World.
    #[must_use]
    pub fn batch(&self) -> BatchBuilder {
        BatchBuilder::new(&self.world.read())
    }

    /// Evaluates a feature against the live World.
    ///
    /// # Errors
    ///
    /// [`EngineError::Rule`] if no entity declares `feature_id`.
    pub fn query_feature_state(&self, feature_id: &str) -> EngineResult<Verdict> {
        Ok(self.evaluator.evaluate(&self.world.read(), feature_id)?)
    }

    /// Evaluates every declared feature, in entity order.
    #[must_use]
    pub fn feature_states(&self) -> Vec<(EntityId, Verdict)> {
        evaluate_all(&self.world.read())
    }

    /// Verdict cache counters.
    #[must_use]
    pub fn rule_cache_stats(&self) -> CacheStats {
        self.evaluator.stats()
    }

    /// A new subscription to [`EngineEvent`]s.
    #[must_use]
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    /// Operations invokable by name.
    #[must_use]
    pub const fn operations(&self) -> OperationCatalog {
        OperationCatalog
    }

    /// Predicates buildable by name.
    #[must_use]
    pub const fn predicates(&self) -> PredicateCatalog {
        PredicateCatalog
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Executes a batch and records what committed.
    ///
    /// # Returns
    ///
    /// One result per operation, in submission order.
    ///
    /// # Errors
    ///
    /// Only fatal conditions; rejected operations are reported in the
    /// results. See [`Engine::submit_cancellable`].
    pub fn submit(&mut self, ops: Vec<Operation>) -> EngineResult<Vec<OperationResult>> {
        self.submit_cancellable(ops, &CancelToken::new())
    }

    /// Executes a batch that `cancel` may stop between dependency groups.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Poisoned`] after an earlier fatal error
    /// - [`EngineError::Scheduler`] on internal scheduler failure
    /// - [`EngineError::History`] with `NonDeterministicBatch` when
    ///   `verify_determinism` catches a divergence
    /// - [`EngineError::History`] when the commit cannot be stored; the
    ///   batch is rolled back and the live World stays at HEAD
    pub fn submit_cancellable(
        &mut self,
        ops: Vec<Operation>,
        cancel: &CancelToken,
    ) -> EngineResult<Vec<OperationResult>> {
        self.ensure_live()?;
        if ops.is_empty() {
            return Ok(Vec::new());
        }

        let before = self.world.read().clone();
        let results = self
            .scheduler
            .run(&self.world, ops.clone(), cancel)
            .map_err(|e| self.fail(e.into()))?;

        let committed: Vec<Operation> = ops
            .into_iter()
            .zip(&results)
            .filter(|(_, result)| result.is_committed())
            .map(|(op, _)| op)
            .collect();
        if committed.is_empty() {
            debug!(submitted = results.len(), "nothing committed, no history entry");
            return Ok(results);
        }

        let after = self.world.read().clone();
        let commit = match self
            .log
            .record(&before, committed, &after, self.config.verify_determinism)
        {
            Ok(commit) => commit,
            Err(err) => {
                // HEAD did not move, so the live World must not either.
                warn!(error = %err, "batch not recorded, rolling back");
                *self.world.write() = before;
                return Err(self.fail(err.into()));
            }
        };
        self.publish(commit, ChangeCause::Submit);
        Ok(results)
    }

    /// Plans one operation by name and submits it alone.
    ///
    /// # Returns
    ///
    /// The planned id for `create_entity`, and the operation's result.
    ///
    /// # Errors
    ///
    /// [`EngineError::Operation`] for an unknown name or bad arguments,
    /// otherwise as [`Engine::submit`].
    pub fn invoke(
        &mut self,
        name: &str,
        values: &[(String, ParamValue)],
    ) -> EngineResult<(Option<EntityId>, OperationResult)> {
        self.ensure_live()?;
        let mut batch = self.batch();
        let created = self.operations().invoke(&mut batch, name, values)?;
        let mut results = self.submit(batch.build())?;
        let result = results.pop().ok_or_else(|| {
            EngineError::Operation(megalith_ops::OperationError::InvalidOperation(format!(
                "{name} planned no operation"
            )))
        })?;
        Ok((created, result))
    }

    /// Resubmits the forward operations of `commit` against the live World.
    ///
    /// This is how work moves between branches: operations whose captured
    /// state no longer matches are rejected, the rest commit as a new batch.
    ///
    /// # Errors
    ///
    /// [`EngineError::History`] if `commit` is unknown, otherwise as
    /// [`Engine::submit`].
    pub fn replay(&mut self, commit: Digest) -> EngineResult<Vec<OperationResult>> {
        self.ensure_live()?;
        let ops = self.log.commit(commit)?.ops().to_vec();
        info!(commit = %commit.short(), ops = ops.len(), "replaying commit");
        self.submit(ops)
    }

    // =========================================================================
    // History
    // =========================================================================

    /// Where HEAD points.
    #[must_use]
    pub const fn head(&self) -> &Head {
        self.log.head()
    }

    /// The commit HEAD resolves to.
    ///
    /// # Errors
    ///
    /// If HEAD names a missing branch.
    pub fn head_commit(&self) -> EngineResult<Digest> {
        Ok(self.log.head_commit()?)
    }

    /// Loads a commit.
    ///
    /// # Errors
    ///
    /// [`EngineError::History`] if unknown.
    pub fn commit(&mut self, id: Digest) -> EngineResult<Commit> {
        Ok(self.log.commit(id)?)
    }

    /// Every branch with its tip.
    ///
    /// # Errors
    ///
    /// Store read failures.
    pub fn branches(&self) -> EngineResult<Vec<(String, Digest)>> {
        Ok(self.log.branches()?)
    }

    /// Steps back one commit.
    ///
    /// # Returns
    ///
    /// The new HEAD commit.
    ///
    /// # Errors
    ///
    /// `NothingToUndo` at genesis; `HistoryCorruption` (fatal) if the
    /// inverses do not reproduce the parent World.
    pub fn undo(&mut self) -> EngineResult<Digest> {
        self.ensure_live()?;
        let moved = self.log.undo(&mut self.world.write());
        let commit = moved.map_err(|e| self.fail(e.into()))?;
        self.publish(commit, ChangeCause::Undo);
        Ok(commit)
    }

    /// Steps forward one commit.
    ///
    /// # Errors
    ///
    /// `NothingToRedo`, `AmbiguousRedo` on a detached HEAD with several
    /// children, or `HistoryCorruption` (fatal).
    pub fn redo(&mut self) -> EngineResult<Digest> {
        self.ensure_live()?;
        let moved = self.log.redo(&mut self.world.write());
        let commit = moved.map_err(|e| self.fail(e.into()))?;
        self.publish(commit, ChangeCause::Redo);
        Ok(commit)
    }

    /// Detaches HEAD at `commit` and loads its World.
    ///
    /// # Errors
    ///
    /// `UnknownCommit`, or `HistoryCorruption` (fatal) naming the first
    /// commit that does not replay to its digest.
    pub fn checkout(&mut self, commit: Digest) -> EngineResult<()> {
        self.ensure_live()?;
        let world = self.log.checkout(commit).map_err(|e| self.fail(e.into()))?;
        *self.world.write() = world;
        self.publish(commit, ChangeCause::Checkout);
        Ok(())
    }

    /// Attaches HEAD to branch `name` and loads its tip's World.
    ///
    /// # Errors
    ///
    /// `UnknownBranch`, or as [`Engine::checkout`].
    pub fn checkout_branch(&mut self, name: &str) -> EngineResult<()> {
        self.ensure_live()?;
        let world = self
            .log
            .checkout_branch(name)
            .map_err(|e| self.fail(e.into()))?;
        *self.world.write() = world;
        let tip = self.log.head_commit()?;
        self.publish(tip, ChangeCause::Checkout);
        Ok(())
    }

    /// Creates branch `name` at `commit` without moving HEAD.
    ///
    /// # Errors
    ///
    /// `InvalidBranchName`, `BranchExists`, `UnknownCommit`.
    pub fn branch(&mut self, commit: Digest, name: &str) -> EngineResult<()> {
        Ok(self.log.branch(commit, name)?)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("head", self.log.head())
            .field("workers", &self.scheduler.worker_threads())
            .field("poisoned", &self.poison)
            .finish_non_exhaustive()
    }
}
