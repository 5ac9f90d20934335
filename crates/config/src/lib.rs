//! Scribe Configuration
//!
//! TOML-based configuration loading with sensible defaults.
//! A single empty sink table is a complete config: it writes through the
//! built-in `default` WebHDFS connection with default limits.
//!
//! # Parsing
//!
//! ```
//! use scribe_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str("[sinks.events]").unwrap();
//! assert!(config.sinks.contains("events"));
//! ```
//!
//! # Example Config
//!
//! ```toml
//! [log]
//! level = "info"
//!
//! [connections.default]
//! type = "webhdfs"
//! url = "http://namenode:9870"
//! user = "etl"
//!
//! [sinks.events]
//! connection = "default"
//! max_write_errors = 100
//! ```

mod connections;
mod error;
mod logging;
mod sinks;
mod validation;

use std::fs;
use std::path::Path;
use std::str::FromStr;

pub use connections::{
    ConnectionConfig, ConnectionsConfig, DEFAULT_CONNECTION, DEFAULT_WEBHDFS_URL,
    LocalConnectionConfig, WebHdfsConnectionConfig,
};
pub use error::{ConfigError, Result};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use sinks::{DEFAULT_MAX_WRITE_ERRORS, HdfsSinkConfig, SinksConfig};

use serde::Deserialize;

/// Main configuration structure
///
/// All sections are optional with sensible defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub log: LogConfig,

    /// Named storage endpoints
    pub connections: ConnectionsConfig,

    /// Named append orchestrators
    pub sinks: SinksConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, contains invalid TOML, or fails validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string
    ///
    /// Prefer using the `FromStr` trait implementation.
    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }

    /// Get list of enabled sink names, sorted
    pub fn enabled_sinks(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .sinks
            .iter()
            .filter(|(_, sink)| sink.enabled)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Resolve the connection a sink writes through
    pub fn sink_connection(&self, sink_name: &str) -> Option<ConnectionConfig> {
        let sink = self.sinks.get(sink_name)?;
        self.connections.resolve(&sink.connection)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
