//! Storage connection configuration
//!
//! Connections are named storage endpoints. Sinks refer to them by name, so
//! several sinks can share one cluster or write to different ones.
//!
//! A connection called `default` always exists: when it is not declared,
//! it resolves to a WebHDFS namenode on `http://localhost:9870`.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Name of the connection used when a sink does not pick one
pub const DEFAULT_CONNECTION: &str = "default";

/// Namenode HTTP address used by the built-in `default` connection
pub const DEFAULT_WEBHDFS_URL: &str = "http://localhost:9870";

/// Container for all named connections
///
/// # Example
///
/// ```toml
/// [connections.default]
/// type = "webhdfs"
/// url = "http://namenode.internal:9870"
/// user = "etl"
///
/// [connections.scratch]
/// type = "local"
/// root = "/var/lib/scribe"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConnectionsConfig {
    #[serde(flatten)]
    connections: HashMap<String, ConnectionConfig>,
}

impl ConnectionsConfig {
    /// Get a declared connection by name
    pub fn get(&self, name: &str) -> Option<&ConnectionConfig> {
        self.connections.get(name)
    }

    /// Resolve a connection name, falling back to the built-in default
    pub fn resolve(&self, name: &str) -> Option<ConnectionConfig> {
        match self.connections.get(name) {
            Some(conn) => Some(conn.clone()),
            None if name == DEFAULT_CONNECTION => Some(ConnectionConfig::default()),
            None => None,
        }
    }

    /// Check if a name resolves to a connection (declared or built in)
    pub fn contains(&self, name: &str) -> bool {
        name == DEFAULT_CONNECTION || self.connections.contains_key(name)
    }

    /// Iterate over declared connections
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ConnectionConfig)> {
        self.connections.iter()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

/// Configuration for one storage endpoint
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConnectionConfig {
    /// Hadoop-compatible filesystem reached over the WebHDFS REST API
    #[serde(rename = "webhdfs")]
    WebHdfs(WebHdfsConnectionConfig),

    /// Directory on the local filesystem
    Local(LocalConnectionConfig),

    /// In-process store, lost on exit (tests, dry runs)
    Memory,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::WebHdfs(WebHdfsConnectionConfig::default())
    }
}

impl ConnectionConfig {
    /// Get the connection type name
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::WebHdfs(_) => "webhdfs",
            Self::Local(_) => "local",
            Self::Memory => "memory",
        }
    }
}

/// WebHDFS endpoint
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WebHdfsConnectionConfig {
    /// Namenode HTTP address, e.g. `http://namenode:9870`
    pub url: String,

    /// Value passed as `user.name` (simple authentication)
    pub user: Option<String>,

    /// Per-request timeout
    /// Default: 30s
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for WebHdfsConnectionConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_WEBHDFS_URL.into(),
            user: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Local directory endpoint
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LocalConnectionConfig {
    /// Directory that destination paths are resolved against
    pub root: PathBuf,
}
