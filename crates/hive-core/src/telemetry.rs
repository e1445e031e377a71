//! Logging setup
//!
//! The library only emits `tracing` events. Applications embedding it call
//! [`init`] once at startup to get formatted output on stderr.

use tracing_subscriber::EnvFilter;

use crate::config::RuntimeConfig;
use crate::error::{Error, Result};

/// Install a global `fmt` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_directive` (for example
/// `"info"` or `"hive_core=debug"`) is used. Calling this twice is an error.
pub fn init(default_directive: &str) -> Result<()> {
    let filter = build_filter(default_directive)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| Error::Configuration(format!("Failed to install tracing subscriber: {}", e)))
}

/// [`init`] with the directive from runtime configuration
pub fn init_from_config(config: &RuntimeConfig) -> Result<()> {
    init(&config.log)
}

fn build_filter(default_directive: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(default_directive).map_err(|e| {
        Error::Configuration(format!("Invalid log directive '{}': {}", default_directive, e))
    })
}
