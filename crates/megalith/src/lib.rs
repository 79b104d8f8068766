//! # MEGALITH
//!
//! A deterministic ECS operation engine with versioned history.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                            Engine                             │
//! │                                                               │
//! │  BatchBuilder ──► Scheduler ──► live World ──► OperationLog   │
//! │  (megalith_ops)   (analyze,      (RwLock)      (commits,      │
//! │                    validate,                    branches,     │
//! │                    commit)                      undo/redo)    │
//! │                                     │                         │
//! │                                     ▼                         │
//! │                      Evaluator ◄── WorldChanged events        │
//! │                      (megalith_rules)                         │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use megalith::{Engine, EngineConfig};
//! use megalith_core::{Position, Tool};
//!
//! let mut engine = Engine::open(EngineConfig::default()).unwrap();
//! let mut batch = engine.batch();
//! let pen = batch.create_entity();
//! batch.attach(pen, Tool::new("pen")).unwrap();
//! batch.attach(pen, Position::new(0.0, 0.0)).unwrap();
//! let results = engine.submit(batch.build()).unwrap();
//! assert!(results.iter().all(|r| r.is_committed()));
//!
//! engine.undo().unwrap();
//! assert_eq!(engine.world().alive_count(), 0);
//! ```

#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod logging;

pub use megalith_core as core;
pub use megalith_history as history;
pub use megalith_ops as ops;
pub use megalith_rules as rules;
pub use megalith_scheduler as scheduler;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{EngineError, EngineResult};
pub use events::{ChangeCause, EngineEvent, EventBus, EventReceiver};
