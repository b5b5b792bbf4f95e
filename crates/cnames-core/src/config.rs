//! Configuration types for the registry tooling
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::registry::DEFAULT_DOMAIN;

/// Main robot configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RobotConfig {
    /// Registry settings
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Probe settings
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Cache store configuration
    #[serde(default)]
    pub cache: CacheConfig,
}

impl RobotConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.registry.validate()?;
        self.probe.validate()?;
        self.cache.validate()?;
        Ok(())
    }
}

/// Registry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// The registry's own domain
    ///
    /// Stripped from keys, appended to subdomains when probing and used as
    /// the boundary for the external-redirect check.
    #[serde(default = "default_domain")]
    pub domain: String,
}

impl RegistryConfig {
    /// Validate the registry configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.domain.is_empty() {
            return Err(crate::Error::config("Registry domain cannot be empty"));
        }
        if self.domain.starts_with('.') || self.domain.ends_with('.') {
            return Err(crate::Error::config(format!(
                "Registry domain '{}' must not start or end with '.'",
                self.domain
            )));
        }
        if self.domain.contains(|c: char| c.is_whitespace() || c == '/') {
            return Err(crate::Error::config(format!(
                "Registry domain '{}' is not a host name",
                self.domain
            )));
        }
        Ok(())
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            domain: default_domain(),
        }
    }
}

/// Probe settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Per-request timeout (in seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Only probe the first `limit` entries (in key order)
    ///
    /// A development aid for quick runs against a large registry.
    #[serde(default)]
    pub limit: Option<usize>,

    /// Fail responses whose content type is not a web page
    #[serde(default = "default_enabled")]
    pub check_content_type: bool,

    /// Fail pages that meta-refresh off the domain
    #[serde(default = "default_enabled")]
    pub check_meta_refresh: bool,

    /// Body substrings that mark a hosting platform's "not set up" page
    #[serde(default)]
    pub placeholder_markers: Vec<String>,

    /// Name the probe checkpoint is stored under
    #[serde(default = "default_cache_name")]
    pub cache_name: String,

    /// Capacity of the probe event channel
    ///
    /// When full, new events are dropped (with a debug log). Probing itself
    /// never blocks on a slow consumer.
    ///
    /// Default: 1000 events
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl ProbeConfig {
    /// Per-request timeout as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validate the probe configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.timeout_secs == 0 {
            return Err(crate::Error::config("Probe timeout must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        crate::traits::validate_cache_name(&self.cache_name)
            .map_err(|e| crate::Error::config(e.to_string()))?;
        if self.placeholder_markers.iter().any(|m| m.trim().is_empty()) {
            return Err(crate::Error::config("Placeholder markers cannot be blank"));
        }
        Ok(())
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            limit: None,
            check_content_type: default_enabled(),
            check_meta_refresh: default_enabled(),
            placeholder_markers: Vec::new(),
            cache_name: default_cache_name(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

/// Cache store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CacheConfig {
    /// File-based cache store
    File {
        /// Directory holding one JSON file per cache name
        #[serde(default = "default_cache_dir")]
        dir: String,
    },

    /// In-memory cache store (not persistent)
    Memory,
}

impl CacheConfig {
    /// Validate the cache configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            CacheConfig::File { dir } => {
                if dir.is_empty() {
                    return Err(crate::Error::config("Cache directory cannot be empty"));
                }
                Ok(())
            }
            CacheConfig::Memory => Ok(()),
        }
    }

    /// Get the store type name
    pub fn type_name(&self) -> &str {
        match self {
            CacheConfig::File { .. } => "file",
            CacheConfig::Memory => "memory",
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig::File {
            dir: default_cache_dir(),
        }
    }
}

fn default_domain() -> String {
    DEFAULT_DOMAIN.to_string()
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_enabled() -> bool {
    true
}

fn default_cache_name() -> String {
    crate::cache::PROBE_RESULTS.name().to_string()
}

fn default_cache_dir() -> String {
    "cache".to_string()
}

fn default_event_channel_capacity() -> usize {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RobotConfig::new();
        assert_eq!(config.registry.domain, "js.org");
        assert_eq!(config.probe.timeout(), Duration::from_secs(5));
        assert!(config.probe.check_content_type);
        assert!(config.probe.check_meta_refresh);
        assert!(config.probe.placeholder_markers.is_empty());
        assert_eq!(config.probe.cache_name, "validate_cnames");
        assert!(matches!(config.cache, CacheConfig::File { ref dir } if dir == "cache"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_partial() {
        let json = r#"{
            "registry": { "domain": "is-a.dev" },
            "probe": { "limit": 10 },
            "cache": { "type": "memory" }
        }"#;
        let config: RobotConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.registry.domain, "is-a.dev");
        assert_eq!(config.probe.limit, Some(10));
        assert_eq!(config.probe.timeout_secs, 5);
        assert_eq!(config.cache.type_name(), "memory");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = RobotConfig::new();
        config.probe.timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = RobotConfig::new();
        config.registry.domain = ".js.org".to_string();
        assert!(config.validate().is_err());

        let mut config = RobotConfig::new();
        config.probe.cache_name = "../x".to_string();
        assert!(config.validate().is_err());

        let config = CacheConfig::File { dir: String::new() };
        assert!(config.validate().is_err());
    }
}
