//! Logging setup.
//!
//! `RUST_LOG` wins when set (`RUST_LOG=bozor_ledger=trace`); otherwise the
//! configured `[logging] level` directive applies.

use tracing_subscriber::EnvFilter;

use crate::error::{ConfigError, ConfigResult};

/// Installs the global `tracing` subscriber.
///
/// Fails if the directive does not parse or a subscriber is already set.
pub fn init(default_directive: &str) -> ConfigResult<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directive)
            .map_err(|e| ConfigError::Logging(format!("{}: {}", default_directive, e)))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| ConfigError::Logging(e.to_string()))
}
