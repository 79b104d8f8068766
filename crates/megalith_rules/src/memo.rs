//! # Memoized Evaluator
//!
//! UI layers poll feature state every frame. Since evaluation is a pure
//! function of `(feature id, World)`, verdicts are cached per
//! `(feature id, World digest)` and reused until the World changes.
//!
//! The cache is bounded; when full, the oldest entry is evicted first.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use megalith_core::{Digest, World};
use parking_lot::Mutex;
use tracing::trace;

use crate::error::RuleResult;
use crate::evaluator::{evaluate, Verdict};

/// Default number of cached verdicts.
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

type Key = (String, Digest);

#[derive(Debug)]
struct MemoTable {
    capacity: usize,
    entries: HashMap<Key, Verdict>,
    /// Insertion order for eviction.
    order: VecDeque<Key>,
}

impl MemoTable {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity.min(DEFAULT_CACHE_CAPACITY)),
            order: VecDeque::new(),
        }
    }

    fn insert(&mut self, key: Key, verdict: Verdict) {
        if self.capacity == 0 || self.entries.contains_key(&key) {
            return;
        }
        while self.entries.len() >= self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, verdict);
    }
}

/// Cache counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that ran the evaluator.
    pub misses: u64,
    /// Entries currently cached.
    pub entries: usize,
}

/// Thread-safe memoizing front end to [`evaluate`].
///
/// # Example
///
/// ```rust
/// use megalith_rules::Evaluator;
/// use megalith_core::World;
///
/// let evaluator = Evaluator::new(16);
/// assert!(evaluator.evaluate(&World::new(), "missing").is_err());
/// ```
#[derive(Debug)]
pub struct Evaluator {
    table: Mutex<MemoTable>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl Evaluator {
    /// Creates an evaluator caching at most `capacity` verdicts.
    /// A capacity of zero disables caching.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            table: Mutex::new(MemoTable::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Evaluates `feature_id` against `world`, reusing a cached verdict for
    /// the same World digest.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RuleError::UnknownFeature`] if no entity declares the
    /// feature. Errors are not cached.
    pub fn evaluate(&self, world: &World, feature_id: &str) -> RuleResult<Verdict> {
        let key = (feature_id.to_string(), world.digest());
        if let Some(verdict) = self.table.lock().entries.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(verdict.clone());
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let verdict = evaluate(world, feature_id)?;
        trace!(
            feature = feature_id,
            world = %key.1.short(),
            enabled = verdict.enabled,
            "rule evaluated"
        );
        self.table.lock().insert(key, verdict.clone());
        Ok(verdict)
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.table.lock().entries.len(),
        }
    }

    /// Drops every cached verdict.
    pub fn clear(&self) {
        let mut table = self.table.lock();
        table.entries.clear();
        table.order.clear();
    }
}
