//! # MEGALITH Rules
//!
//! Decides whether a UI feature is available, and says why not.
//!
//! A feature is an entity with a [`megalith_core::Feature`] component that
//! points at an entity carrying a [`megalith_core::RuleSet`]. Evaluation reads
//! the World and nothing else, so verdicts are memoized per World digest.
//!
//! ## Example
//!
//! ```rust
//! use megalith_core::{ComponentKind, Feature, RuleExpr, RuleSet, World};
//! use megalith_rules::Evaluator;
//!
//! let mut world = World::new();
//! let rule = world.create();
//! world.attach(rule, RuleSet {
//!     name: "needs-tools".into(),
//!     expr: RuleExpr::count_at_least(ComponentKind::Tool, 2),
//!     help_ref: "help/tools".into(),
//! }.into()).unwrap();
//! let feature = world.create();
//! world.attach(feature, Feature { id: "compare".into(), rule }.into()).unwrap();
//!
//! let verdict = Evaluator::default().evaluate(&world, "compare").unwrap();
//! assert!(!verdict.enabled);
//! assert!(!verdict.reason.is_empty());
//! ```

#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod catalog;
pub mod error;
pub mod evaluator;
pub mod memo;

pub use catalog::{PredicateCatalog, PredicateInfo};
pub use error::{RuleError, RuleResult};
pub use evaluator::{evaluate, evaluate_all, Verdict};
pub use memo::{CacheStats, Evaluator, DEFAULT_CACHE_CAPACITY};
