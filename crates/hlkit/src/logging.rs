//! `tracing` subscriber setup

use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::error::{Result, RuntimeError};

pub const DEFAULT_FILTER: &str = "info";

/// Filter from the config, else `RUST_LOG`, else [`DEFAULT_FILTER`].
pub fn filter(config: &Config) -> Result<EnvFilter> {
    match &config.log_filter {
        Some(directive) => EnvFilter::try_new(directive).map_err(|e| RuntimeError::Logging(e.to_string())),
        None => Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))),
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(config: &Config) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(filter(config)?)
        .with_target(false)
        .try_init()
        .map_err(|e| RuntimeError::Logging(e.to_string()))
}

/// [`init`], ignoring an already installed subscriber.
pub fn try_init(config: &Config) -> bool {
    init(config).is_ok()
}
