//! Sink configuration types
//!
//! A sink is one append orchestrator instance: it owns its own redirection
//! state and writes through one named connection. Sinks are named so a single
//! process can feed several clusters, or keep separate redirection budgets
//! for separate datasets.

use serde::Deserialize;
use std::collections::HashMap;

use crate::connections::DEFAULT_CONNECTION;

/// Default cap on redirections per destination
pub const DEFAULT_MAX_WRITE_ERRORS: u32 = 100;

/// Container for all sink configurations
///
/// # Example
///
/// ```toml
/// [sinks.events]
/// connection = "default"
///
/// [sinks.audit]
/// connection = "secure_cluster"
/// log_data_on_error = true
/// max_write_errors = 10
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SinksConfig {
    /// Named sink instances
    #[serde(flatten)]
    sinks: HashMap<String, HdfsSinkConfig>,
}

impl SinksConfig {
    /// Get a sink by name
    pub fn get(&self, name: &str) -> Option<&HdfsSinkConfig> {
        self.sinks.get(name)
    }

    /// Check if a sink exists
    pub fn contains(&self, name: &str) -> bool {
        self.sinks.contains_key(name)
    }

    /// Iterate over all sinks
    pub fn iter(&self) -> impl Iterator<Item = (&String, &HdfsSinkConfig)> {
        self.sinks.iter()
    }

    /// Get the number of configured sinks
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Check if no sinks are configured
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Get all sink names
    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.sinks.keys()
    }
}

/// Append orchestrator settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HdfsSinkConfig {
    /// Whether this sink is enabled
    /// Default: true
    pub enabled: bool,

    /// Name of the connection to write through
    /// Default: "default"
    pub connection: String,

    /// Embed the payload batch in append failure messages
    /// Default: false
    pub log_data_on_error: bool,

    /// Redirections allowed per destination before it is declared failing
    /// Default: 100
    pub max_write_errors: u32,

    /// Upper bound on destinations written concurrently within one batch
    /// Default: unbounded
    pub max_concurrent_destinations: Option<usize>,
}

impl Default for HdfsSinkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            connection: DEFAULT_CONNECTION.into(),
            log_data_on_error: false,
            max_write_errors: DEFAULT_MAX_WRITE_ERRORS,
            max_concurrent_destinations: None,
        }
    }
}
