//! # Engine Configuration
//!
//! Loaded once at startup, usually from a TOML file:
//!
//! ```toml
//! worker_threads = 8
//! rule_cache_capacity = 1024
//! max_batch_size = 4096
//! snapshot_interval = 64
//! verify_determinism = false
//! history_dir = "/var/lib/megalith"
//! event_capacity = 256
//! log_filter = "megalith=debug,info"
//! ```
//!
//! Missing keys take their [`Default`] value; unknown keys are rejected.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::{fs, thread};

use megalith_history::DEFAULT_SNAPSHOT_INTERVAL;
use megalith_rules::DEFAULT_CACHE_CAPACITY;
use megalith_scheduler::{SchedulerConfig, DEFAULT_MAX_BATCH_SIZE};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Engine settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Validation worker threads.
    pub worker_threads: usize,
    /// Memoized feature verdicts kept before eviction.
    pub rule_cache_capacity: usize,
    /// Larger batches are scheduled as consecutive sub-batches.
    pub max_batch_size: usize,
    /// Cache a World snapshot every this many commits (0 = genesis only).
    pub snapshot_interval: u64,
    /// Re-execute every batch serially and compare digests.
    pub verify_determinism: bool,
    /// Loose-object history directory; `None` keeps history in memory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_dir: Option<PathBuf>,
    /// Buffered events per subscriber before new events are dropped.
    pub event_capacity: usize,
    /// `tracing-subscriber` filter used by [`crate::logging::init`].
    pub log_filter: String,
}

fn hardware_threads() -> usize {
    thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_threads: hardware_threads(),
            rule_cache_capacity: DEFAULT_CACHE_CAPACITY,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            snapshot_interval: DEFAULT_SNAPSHOT_INTERVAL,
            verify_determinism: cfg!(debug_assertions),
            history_dir: None,
            event_capacity: 256,
            log_filter: "info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Settings for long-running sessions with large documents.
    ///
    /// Bigger caches, sparser logging, and no serial re-execution: release
    /// builds rely on the scheduler's ordering guarantees.
    #[must_use]
    pub fn production() -> Self {
        Self {
            worker_threads: hardware_threads(),
            rule_cache_capacity: 16_384,
            max_batch_size: 16_384,
            snapshot_interval: 256,
            verify_determinism: false,
            history_dir: None,
            event_capacity: 4096,
            log_filter: "warn,megalith=info".to_string(),
        }
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidConfig`] on syntax errors, unknown keys or
    /// out-of-range values.
    pub fn from_toml_str(text: &str) -> EngineResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| EngineError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// [`EngineError::ConfigIo`] if the file cannot be read, otherwise as
    /// [`EngineConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| EngineError::ConfigIo {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Renders the settings as TOML.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidConfig`] if a value has no TOML form.
    pub fn to_toml_string(&self) -> EngineResult<String> {
        toml::to_string(self).map_err(|e| EngineError::InvalidConfig(e.to_string()))
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> EngineResult<()> {
        let positive = [
            ("worker_threads", self.worker_threads),
            ("rule_cache_capacity", self.rule_cache_capacity),
            ("max_batch_size", self.max_batch_size),
            ("event_capacity", self.event_capacity),
        ];
        if let Some((field, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(EngineError::InvalidConfig(format!(
                "{field} must be at least 1"
            )));
        }
        if self.log_filter.trim().is_empty() {
            return Err(EngineError::InvalidConfig(
                "log_filter must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// The scheduler part of these settings.
    #[must_use]
    pub const fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            worker_threads: self.worker_threads,
            max_batch_size: self.max_batch_size,
        }
    }
}
