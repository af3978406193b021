//! Configuration structures for the fsw file watcher.
//!
//! - [`WatchConfig`] - per-watch settings (recursion, filters, buffering)
//! - [`Config`] - root configuration, loadable from JSON
//!
//! All configuration types implement [`Default`] and deserialize with
//! `#[serde(default)]`, so partial files are accepted.

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::filters::NotifyFilters;

/// Configuration for a single watch.
///
/// # Examples
///
/// ```
/// use fsw_core::{NotifyFilters, WatchConfig};
///
/// let config = WatchConfig::default();
/// assert!(config.recursive);
/// assert_eq!(config.channel_capacity, 100);
/// assert!(config.notify_filters.contains(NotifyFilters::FILE_NAME));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Whether to report changes in subdirectories.
    pub recursive: bool,

    /// Which kinds of change to report.
    pub notify_filters: NotifyFilters,

    /// Capacity of the channel between the event pump and the consumer.
    ///
    /// Notifications arriving while the channel is full are dropped so the
    /// shared pump never blocks.
    pub channel_capacity: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            notify_filters: NotifyFilters::default(),
            channel_capacity: 100,
        }
    }
}

impl WatchConfig {
    /// Validates option values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] for a zero channel capacity or an
    /// empty filter set.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel_capacity == 0 {
            return Err(ConfigError::invalid_option(
                "channel_capacity",
                "must be greater than zero",
            ));
        }
        if self.notify_filters.is_empty() {
            return Err(ConfigError::invalid_option(
                "notify_filters",
                "at least one filter must be set",
            ));
        }
        Ok(())
    }
}

/// Root configuration for the fsw tool.
///
/// # Examples
///
/// ```
/// use fsw_core::Config;
///
/// let config = Config::from_json_str(r#"{"watch": {"recursive": false}}"#).unwrap();
/// assert!(!config.watch.recursive);
/// assert_eq!(config.watch.channel_capacity, 100);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Watch configuration.
    pub watch: WatchConfig,
}

impl Config {
    /// Parses and validates a configuration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.watch.validate()?;
        Ok(config)
    }

    /// Reads, parses, and validates a JSON configuration file.
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }
}
