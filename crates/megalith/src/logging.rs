//! # Logging Setup
//!
//! The engine crates only emit `tracing` events. Applications that want them
//! printed can install the stock formatter here.

use tracing_subscriber::EnvFilter;

use crate::error::{EngineError, EngineResult};

/// Installs a global `fmt` subscriber.
///
/// `RUST_LOG` wins over `filter` when set.
///
/// # Returns
///
/// `false` if another global subscriber was already installed.
///
/// # Errors
///
/// [`EngineError::InvalidConfig`] if `filter` is not a valid directive list.
pub fn init(filter: &str) -> EngineResult<bool> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(from_env) => from_env,
        Err(_) => EnvFilter::try_new(filter)
            .map_err(|e| EngineError::InvalidConfig(format!("log filter '{filter}': {e}")))?,
    };
    Ok(tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_names(true)
        .try_init()
        .is_ok())
}
