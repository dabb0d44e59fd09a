//! Runtime configuration
//!
//! Defaults, overlaid by a TOML document, overlaid by `HLKIT_*`
//! environment variables.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const ENV_LOG: &str = "HLKIT_LOG";
pub const ENV_RESOURCES_DIR: &str = "HLKIT_RESOURCES_DIR";
pub const ENV_RESOURCE_CACHE: &str = "HLKIT_RESOURCE_CACHE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `tracing` filter directive; `RUST_LOG` applies when unset
    pub log_filter: Option<String>,
    /// Root directory for `resources://` URIs
    pub resources_dir: Option<PathBuf>,
    /// Keep loaded resource bytes per URI
    pub resource_cache: bool,
    /// Register `tabs`, `light-box-dialog` and `hyperlink`
    pub builtin_behaviors: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: None,
            resources_dir: None,
            resource_cache: true,
            builtin_behaviors: true,
        }
    }
}

impl Config {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn with_env(self) -> Self {
        self.overlay(|key| std::env::var(key).ok())
    }

    /// Apply `HLKIT_*` values from `lookup`.
    pub fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(filter) = lookup(ENV_LOG).filter(|f| !f.is_empty()) {
            self.log_filter = Some(filter);
        }
        if let Some(dir) = lookup(ENV_RESOURCES_DIR).filter(|d| !d.is_empty()) {
            self.resources_dir = Some(PathBuf::from(dir));
        }
        if let Some(cache) = lookup(ENV_RESOURCE_CACHE) {
            self.resource_cache = parse_switch(&cache);
        }
        self
    }
}

fn parse_switch(value: &str) -> bool {
    !matches!(value.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.resource_cache);
        assert!(config.builtin_behaviors);
        assert_eq!(config.log_filter, None);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml("log_filter = \"hlkit=debug\"\nresources_dir = \"ui\"").unwrap();
        assert_eq!(config.log_filter.as_deref(), Some("hlkit=debug"));
        assert_eq!(config.resources_dir, Some(PathBuf::from("ui")));
        assert!(config.resource_cache);
    }

    #[test]
    fn test_bad_toml() {
        assert!(Config::from_toml("resource_cache = \"sometimes\"").is_err());
    }

    #[test]
    fn test_env_overlay() {
        let env: HashMap<&str, &str> = [(ENV_LOG, "warn"), (ENV_RESOURCE_CACHE, "off"), (ENV_RESOURCES_DIR, "")]
            .into_iter()
            .collect();
        let config = Config::default().overlay(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.log_filter.as_deref(), Some("warn"));
        assert!(!config.resource_cache);
        assert_eq!(config.resources_dir, None);
    }

    #[test]
    fn test_switch_values() {
        assert!(!parse_switch("0"));
        assert!(!parse_switch(" False "));
        assert!(parse_switch("1"));
        assert!(parse_switch("yes"));
    }
}
