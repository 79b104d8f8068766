//! # Operation Log
//!
//! The single source of truth. Every executed batch becomes a [`Commit`];
//! the live World is only a cache that any commit can rebuild.
//!
//! ## Navigation
//!
//! - `record` appends a commit after HEAD and moves HEAD (and its branch)
//! - `undo` applies the inverses of HEAD's batch and steps to the parent
//! - `redo` re-applies the commit that was undone (attached HEAD) or the
//!   unique child (detached HEAD)
//! - `checkout` rebuilds the World at any commit from the nearest
//!   snapshot, verifying every recorded digest on the way
//!
//! Every `snapshot_interval`-th commit stores its World as a snapshot
//! object, so a reopened history does not replay from genesis. Redo stacks
//! are not stored: they belong to the session that did the undoing.
//!
//! Merges are not supported. Work from another branch is carried over by
//! replaying its operations as a new batch.

use std::collections::HashMap;
use std::sync::Arc;

use megalith_core::{Decode, Digest, Encode, World};
use megalith_ops::Operation;
use tracing::{debug, info, warn};

use crate::commit::Commit;
use crate::error::{HistoryError, HistoryResult};
use crate::object::ObjectKind;
use crate::store::{Head, ObjectStore};

/// Branch created for a fresh history.
pub const DEFAULT_BRANCH: &str = "main";

/// Default number of commits between cached snapshots.
pub const DEFAULT_SNAPSHOT_INTERVAL: u64 = 64;

/// Versioned history over an [`ObjectStore`].
#[derive(Debug)]
pub struct OperationLog {
    store: Arc<dyn ObjectStore>,
    head: Head,
    genesis: Digest,
    /// Commits loaded so far.
    commits: HashMap<Digest, Commit>,
    /// Known children of each commit, in recording order.
    children: HashMap<Digest, Vec<Digest>>,
    /// Undone commits per branch, most recent last. In memory only.
    redo: HashMap<String, Vec<Digest>>,
    /// Snapshots loaded or taken this session.
    snapshots: HashMap<Digest, World>,
    snapshot_interval: u64,
}

/// Valid branch names: non-empty, no `/`, no whitespace, no `..`, not `HEAD`.
#[must_use]
pub fn is_valid_branch_name(name: &str) -> bool {
    !name.is_empty()
        && name != "HEAD"
        && !name.contains("..")
        && !name.ends_with(".tmp")
        && !name.chars().any(|c| c == '/' || c == '\\' || c.is_whitespace() || c.is_control())
}

impl OperationLog {
    /// Opens the history in `store`, initializing a fresh store with the
    /// genesis commit and branch [`DEFAULT_BRANCH`].
    ///
    /// # Arguments
    ///
    /// * `store` - Where commits and references live
    /// * `snapshot_interval` - Cache a World every this many commits (0 keeps
    ///   only genesis)
    ///
    /// # Errors
    ///
    /// Store failures, or [`HistoryError::HistoryCorruption`] if a stored
    /// reference points at a missing or malformed commit.
    pub fn open(store: Arc<dyn ObjectStore>, snapshot_interval: u64) -> HistoryResult<Self> {
        let genesis = Commit::genesis();
        let genesis_id = store.put(ObjectKind::Commit, &genesis.to_canonical_bytes())?;

        let head = if let Some(head) = store.head()? {
            head
        } else {
            store.set_ref(DEFAULT_BRANCH, genesis_id)?;
            let head = Head::Branch(DEFAULT_BRANCH.to_string());
            store.set_head(&head)?;
            head
        };

        let mut snapshots = HashMap::new();
        snapshots.insert(genesis_id, World::new());
        let mut log = Self {
            store,
            head,
            genesis: genesis_id,
            commits: HashMap::from([(genesis_id, genesis)]),
            children: HashMap::new(),
            redo: HashMap::new(),
            snapshots,
            snapshot_interval,
        };

        let mut tips: Vec<Digest> = log.store.refs()?.into_iter().map(|(_, id)| id).collect();
        if let Head::Detached(id) = &log.head {
            tips.push(*id);
        }
        for tip in tips {
            log.index_ancestry(tip)?;
        }
        let head_id = log.head_commit()?;
        info!(head = %log.head, commit = %head_id.short(), "operation log opened");
        Ok(log)
    }

    /// Loads `tip` and its ancestors into the child index, stopping at the
    /// first parent link that is already known.
    fn index_ancestry(&mut self, tip: Digest) -> HistoryResult<()> {
        let mut cursor = Some(tip);
        while let Some(id) = cursor {
            let Some(parent) = self.load(id)?.parent() else {
                break;
            };
            let siblings = self.children.entry(parent).or_default();
            if siblings.contains(&id) {
                break;
            }
            siblings.push(id);
            cursor = Some(parent);
        }
        Ok(())
    }

    /// Loads a commit, caching it.
    fn load(&mut self, id: Digest) -> HistoryResult<&Commit> {
        if !self.commits.contains_key(&id) {
            let commit = self.fetch(id)?;
            self.commits.insert(id, commit);
        }
        self.commits.get(&id).ok_or(HistoryError::UnknownCommit(id))
    }

    fn fetch(&self, id: Digest) -> HistoryResult<Commit> {
        match self.store.get(&id)? {
            Some((ObjectKind::Commit, payload)) => Commit::from_canonical_bytes(&payload)
                .map_err(|e| HistoryError::corruption(id, e.to_string())),
            Some((kind, _)) => Err(HistoryError::corruption(
                id,
                format!("expected a commit, found a {kind}"),
            )),
            None => Err(HistoryError::UnknownCommit(id)),
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Where HEAD points.
    #[must_use]
    pub const fn head(&self) -> &Head {
        &self.head
    }

    /// The id of the root commit.
    #[must_use]
    pub const fn genesis(&self) -> Digest {
        self.genesis
    }

    /// The commit HEAD resolves to.
    ///
    /// # Errors
    ///
    /// [`HistoryError::UnknownBranch`] if HEAD names a missing branch.
    pub fn head_commit(&self) -> HistoryResult<Digest> {
        match &self.head {
            Head::Detached(id) => Ok(*id),
            Head::Branch(name) => self
                .store
                .get_ref(name)?
                .ok_or_else(|| HistoryError::UnknownBranch(name.clone())),
        }
    }

    /// Loads a commit by id.
    ///
    /// # Errors
    ///
    /// [`HistoryError::UnknownCommit`] if absent.
    pub fn commit(&mut self, id: Digest) -> HistoryResult<Commit> {
        self.load(id).cloned()
    }

    /// Every branch with its tip, sorted by name.
    ///
    /// # Errors
    ///
    /// Store read failures.
    pub fn branches(&self) -> HistoryResult<Vec<(String, Digest)>> {
        self.store.refs()
    }

    /// Commit ids from `id` back to genesis, newest first.
    ///
    /// # Errors
    ///
    /// [`HistoryError::UnknownCommit`] if the chain is broken.
    pub fn ancestry(&mut self, id: Digest) -> HistoryResult<Vec<Digest>> {
        let mut chain = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            chain.push(current);
            cursor = self.load(current)?.parent();
        }
        Ok(chain)
    }

    /// Known children of `id`.
    #[must_use]
    pub fn children(&self, id: &Digest) -> &[Digest] {
        self.children.get(id).map_or(&[], Vec::as_slice)
    }

    /// Number of snapshots held in memory (genesis included).
    #[must_use]
    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    #[inline]
    const fn on_interval(&self, height: u64) -> bool {
        self.snapshot_interval > 0 && height % self.snapshot_interval == 0
    }

    /// Caches `world` as the World of commit `id` and stores it.
    fn keep_snapshot(&mut self, id: Digest, world: &World) -> HistoryResult<()> {
        if self.store.snapshot(&id)?.is_none() {
            let object = self
                .store
                .put(ObjectKind::Snapshot, &world.to_canonical_bytes())?;
            self.store.set_snapshot(id, object)?;
            debug!(commit = %id.short(), snapshot = %object.short(), "snapshot stored");
        }
        self.snapshots.insert(id, world.clone());
        Ok(())
    }

    /// Loads the stored snapshot of commit `id`, if there is one.
    fn load_snapshot(&mut self, id: Digest) -> HistoryResult<Option<World>> {
        let Some(object) = self.store.snapshot(&id)? else {
            return Ok(None);
        };
        let world = match self.store.get(&object)? {
            Some((ObjectKind::Snapshot, payload)) => World::from_canonical_bytes(&payload)
                .map_err(|e| HistoryError::corruption(id, format!("snapshot: {e}")))?,
            Some((kind, _)) => {
                return Err(HistoryError::corruption(
                    id,
                    format!("snapshot index names a {kind}"),
                ))
            }
            None => return Err(HistoryError::corruption(id, "snapshot object is missing")),
        };
        if world.digest() != self.load(id)?.world() {
            return Err(HistoryError::corruption(
                id,
                "snapshot does not match the recorded world",
            ));
        }
        self.snapshots.insert(id, world.clone());
        Ok(Some(world))
    }

    // =========================================================================
    // Recording
    // =========================================================================

    /// Records an executed batch as a child of HEAD.
    ///
    /// # Arguments
    ///
    /// * `before` - The World the batch ran against; must match HEAD
    /// * `ops` - The committed operations, in submission order
    /// * `after` - The World the scheduler produced
    /// * `verify` - Re-execute `ops` serially from `before` and compare
    ///
    /// # Errors
    ///
    /// - [`HistoryError::HistoryCorruption`] if `before` is not HEAD's World
    /// - [`HistoryError::NonDeterministicBatch`] if verification diverges
    pub fn record(
        &mut self,
        before: &World,
        ops: Vec<Operation>,
        after: &World,
        verify: bool,
    ) -> HistoryResult<Digest> {
        let parent_id = self.head_commit()?;
        let parent = self.load(parent_id)?;
        let (parent_world, parent_height) = (parent.world(), parent.height());
        if before.digest() != parent_world {
            return Err(HistoryError::corruption(
                parent_id,
                "live world does not match HEAD",
            ));
        }

        if verify {
            let mut serial = before.clone();
            let replayed = ops.iter().try_for_each(|op| op.apply(&mut serial));
            let actual = serial.digest();
            if replayed.is_err() || actual != after.digest() {
                warn!(expected = %after.digest().short(), actual = %actual.short(), "determinism check failed");
                return Err(HistoryError::NonDeterministicBatch {
                    expected: after.digest(),
                    actual,
                });
            }
        }

        let commit = Commit::child(parent_id, parent_height, after.digest(), ops);
        let id = self
            .store
            .put(ObjectKind::Commit, &commit.to_canonical_bytes())?;
        let height = commit.height();
        let op_count = commit.ops().len();
        self.commits.insert(id, commit);
        let siblings = self.children.entry(parent_id).or_default();
        if !siblings.contains(&id) {
            siblings.push(id);
        }
        if self.on_interval(height) {
            self.keep_snapshot(id, after)?;
        }

        self.move_head(id)?;
        if let Head::Branch(name) = &self.head {
            self.redo.remove(name);
        }
        debug!(commit = %id.short(), height, ops = op_count, "commit recorded");
        Ok(id)
    }

    /// Moves HEAD (and its branch, if attached) to `id`.
    fn move_head(&mut self, id: Digest) -> HistoryResult<()> {
        match &self.head {
            Head::Branch(name) => self.store.set_ref(name, id),
            Head::Detached(_) => {
                self.head = Head::Detached(id);
                self.store.set_head(&self.head)
            }
        }
    }

    // =========================================================================
    // Undo / redo
    // =========================================================================

    /// Steps HEAD back one commit, unwinding `world` with inverse operations.
    ///
    /// `world` is left untouched on error.
    ///
    /// # Errors
    ///
    /// - [`HistoryError::NothingToUndo`] at genesis
    /// - [`HistoryError::HistoryCorruption`] if `world` is not HEAD's World
    ///   or the inverses do not reproduce the parent's digest
    pub fn undo(&mut self, world: &mut World) -> HistoryResult<Digest> {
        let id = self.head_commit()?;
        let commit = self.load(id)?.clone();
        let parent_id = commit.parent().ok_or(HistoryError::NothingToUndo)?;
        let parent_world = self.load(parent_id)?.world();
        if world.digest() != commit.world() {
            return Err(HistoryError::corruption(id, "live world does not match HEAD"));
        }

        let mut scratch = world.clone();
        commit
            .unwind(&mut scratch)
            .map_err(|(index, reason)| {
                HistoryError::corruption(id, format!("inverse of operation {index} failed: {reason}"))
            })?;
        if scratch.digest() != parent_world {
            return Err(HistoryError::corruption(
                id,
                "inverse batch does not reproduce the parent world",
            ));
        }

        self.move_head(parent_id)?;
        if let Head::Branch(name) = &self.head {
            self.redo.entry(name.clone()).or_default().push(id);
        }
        *world = scratch;
        debug!(from = %id.short(), to = %parent_id.short(), "undo");
        Ok(parent_id)
    }

    /// Steps HEAD forward one commit, re-applying its batch to `world`.
    ///
    /// On an attached HEAD the target is the last commit undone on that
    /// branch in this session. Redo stacks are not persisted, so a reopened
    /// history has nothing to redo until it undoes again; a detached HEAD
    /// still follows its unique child.
    ///
    /// `world` is left untouched on error.
    ///
    /// # Errors
    ///
    /// - [`HistoryError::NothingToRedo`] if there is no forward commit
    /// - [`HistoryError::AmbiguousRedo`] on a detached HEAD with several
    ///   children
    /// - [`HistoryError::HistoryCorruption`] if replay diverges
    pub fn redo(&mut self, world: &mut World) -> HistoryResult<Digest> {
        let current = self.head_commit()?;
        let target = match &self.head {
            Head::Branch(name) => *self
                .redo
                .get(name)
                .and_then(|stack| stack.last())
                .ok_or(HistoryError::NothingToRedo)?,
            Head::Detached(_) => match self.children(&current) {
                [] => return Err(HistoryError::NothingToRedo),
                [only] => *only,
                many => {
                    return Err(HistoryError::AmbiguousRedo {
                        commit: current,
                        children: many.len(),
                    })
                }
            },
        };

        let commit = self.load(target)?.clone();
        if commit.parent() != Some(current) {
            return Err(HistoryError::NothingToRedo);
        }
        let mut scratch = world.clone();
        Self::replay_verified(target, &commit, &mut scratch)?;

        self.move_head(target)?;
        if let Head::Branch(name) = &self.head {
            if let Some(stack) = self.redo.get_mut(name) {
                stack.pop();
            }
        }
        *world = scratch;
        debug!(to = %target.short(), "redo");
        Ok(target)
    }

    fn replay_verified(id: Digest, commit: &Commit, world: &mut World) -> HistoryResult<()> {
        commit.replay(world).map_err(|(index, reason)| {
            HistoryError::corruption(id, format!("operation {index} does not replay: {reason}"))
        })?;
        if world.digest() == commit.world() {
            Ok(())
        } else {
            Err(HistoryError::corruption(
                id,
                format!(
                    "replay produced world {}, recorded {}",
                    world.digest().short(),
                    commit.world().short()
                ),
            ))
        }
    }

    // =========================================================================
    // Checkout and branches
    // =========================================================================

    /// Rebuilds the World at `id` without moving HEAD.
    ///
    /// # Errors
    ///
    /// [`HistoryError::UnknownCommit`], or
    /// [`HistoryError::HistoryCorruption`] naming the first commit whose
    /// replay does not reproduce its digest.
    pub fn world_at(&mut self, id: Digest) -> HistoryResult<World> {
        let mut pending = Vec::new();
        let mut cursor = id;
        let mut world = loop {
            if let Some(snapshot) = self.snapshots.get(&cursor) {
                break snapshot.clone();
            }
            let (height, parent) = {
                let commit = self.load(cursor)?;
                (commit.height(), commit.parent())
            };
            if self.on_interval(height) {
                if let Some(snapshot) = self.load_snapshot(cursor)? {
                    break snapshot;
                }
            }
            pending.push(cursor);
            cursor = parent
                .ok_or_else(|| HistoryError::corruption(cursor, "chain does not reach genesis"))?;
        };

        debug!(target = %id.short(), replayed = pending.len(), "rebuilding world");
        for commit_id in pending.into_iter().rev() {
            let commit = self.load(commit_id)?.clone();
            Self::replay_verified(commit_id, &commit, &mut world)?;
            if self.on_interval(commit.height()) {
                self.keep_snapshot(commit_id, &world)?;
            }
        }
        Ok(world)
    }

    /// Detaches HEAD at `id` and returns its World.
    ///
    /// # Errors
    ///
    /// See [`OperationLog::world_at`].
    pub fn checkout(&mut self, id: Digest) -> HistoryResult<World> {
        let world = self.world_at(id)?;
        self.index_ancestry(id)?;
        self.head = Head::Detached(id);
        self.store.set_head(&self.head)?;
        info!(commit = %id.short(), "checked out");
        Ok(world)
    }

    /// Attaches HEAD to branch `name` and returns its tip's World.
    ///
    /// # Errors
    ///
    /// [`HistoryError::InvalidBranchName`], [`HistoryError::UnknownBranch`],
    /// or see [`OperationLog::world_at`].
    pub fn checkout_branch(&mut self, name: &str) -> HistoryResult<World> {
        if !is_valid_branch_name(name) {
            return Err(HistoryError::InvalidBranchName(name.to_string()));
        }
        let tip = self
            .store
            .get_ref(name)?
            .ok_or_else(|| HistoryError::UnknownBranch(name.to_string()))?;
        let world = self.world_at(tip)?;
        self.index_ancestry(tip)?;
        self.head = Head::Branch(name.to_string());
        self.store.set_head(&self.head)?;
        info!(branch = name, commit = %tip.short(), "checked out branch");
        Ok(world)
    }

    /// Creates branch `name` at `id`. Neither HEAD nor any commit changes.
    ///
    /// # Errors
    ///
    /// [`HistoryError::InvalidBranchName`], [`HistoryError::BranchExists`],
    /// [`HistoryError::UnknownCommit`].
    pub fn branch(&mut self, id: Digest, name: &str) -> HistoryResult<()> {
        if !is_valid_branch_name(name) {
            return Err(HistoryError::InvalidBranchName(name.to_string()));
        }
        if self.store.get_ref(name)?.is_some() {
            return Err(HistoryError::BranchExists(name.to_string()));
        }
        self.load(id)?;
        self.store.set_ref(name, id)?;
        info!(branch = name, commit = %id.short(), "branch created");
        Ok(())
    }
}
