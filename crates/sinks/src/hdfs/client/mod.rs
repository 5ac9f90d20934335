//! Storage client capability
//!
//! The orchestrator only needs four filesystem primitives: status, recursive
//! directory creation, empty file creation and append. They are expressed as
//! the [`StorageClient`] trait so the same orchestration code runs against a
//! real cluster (WebHDFS), a local directory, or the in-memory store used by
//! tests.
//!
//! Failures carry a typed [`StorageErrorKind`]. The orchestrator decides on
//! redirection from `kind` alone; backends that only receive error text map
//! it to a kind at the edge with [`is_corrupt_replica_signature`].

mod local;
mod memory;
mod webhdfs;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use scribe_config::ConnectionConfig;

pub use local::LocalClient;
pub use memory::{AppendRecord, MemoryClient};
pub use webhdfs::WebHdfsClient;

/// Text fragments that identify a corrupted or relocated replica block
///
/// These come from Hadoop's Java exceptions as surfaced in WebHDFS
/// `RemoteException` bodies. The list is backend-specific: a message that
/// merely quotes one of them is classified the same way.
pub const CORRUPT_REPLICA_SIGNATURES: &[&str] = &[
    "ReplicaNotFoundException",
    "Failed to replace a bad datanode",
    "BlockMissingException",
    "Cannot obtain block length",
];

/// Check whether backend error text carries the corrupted-block signature
pub fn is_corrupt_replica_signature(text: &str) -> bool {
    CORRUPT_REPLICA_SIGNATURES
        .iter()
        .any(|signature| text.contains(signature))
}

/// Kind of object found at a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Directory,
}

/// Result of a successful status lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStatus {
    pub kind: FileKind,
    /// Length in bytes (0 for directories)
    pub length: u64,
}

impl FileStatus {
    pub fn file(length: u64) -> Self {
        Self {
            kind: FileKind::File,
            length,
        }
    }

    pub fn directory() -> Self {
        Self {
            kind: FileKind::Directory,
            length: 0,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }
}

/// Failure classes a storage backend can report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorKind {
    NotFound,
    AlreadyExists,
    PermissionDenied,
    /// The replica backing the file is unreadable or was relocated
    CorruptReplica,
    /// Transport failure (connect, timeout, malformed response)
    Connection,
    Other,
}

impl StorageErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::AlreadyExists => "already_exists",
            Self::PermissionDenied => "permission_denied",
            Self::CorruptReplica => "corrupt_replica",
            Self::Connection => "connection",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for StorageErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by a storage backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct StorageError {
    pub kind: StorageErrorKind,
    pub message: String,
}

impl StorageError {
    pub fn new(kind: StorageErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::NotFound, message)
    }

    pub fn corrupt_replica(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::CorruptReplica, message)
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::Connection, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::Other, message)
    }

    /// Whether this failure should trigger a destination redirection
    pub fn is_corrupt_replica(&self) -> bool {
        self.kind == StorageErrorKind::CorruptReplica
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        let kind = match err.kind() {
            ErrorKind::NotFound => StorageErrorKind::NotFound,
            ErrorKind::AlreadyExists => StorageErrorKind::AlreadyExists,
            ErrorKind::PermissionDenied => StorageErrorKind::PermissionDenied,
            _ => StorageErrorKind::Other,
        };
        Self::new(kind, err.to_string())
    }
}

/// Filesystem primitives consumed by the append orchestrator
///
/// Paths are destination names as given in records (`/`-separated, usually
/// absolute). Implementations must be safe to call concurrently for
/// different paths; the orchestrator never issues two appends to the same
/// path at once.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Look up a path, `Ok(None)` when it does not exist
    async fn status(&self, path: &str) -> Result<Option<FileStatus>, StorageError>;

    /// Create a directory and all missing ancestors
    async fn create_dirs(&self, path: &str) -> Result<(), StorageError>;

    /// Create an empty file, failing if it already exists
    async fn create_file(&self, path: &str) -> Result<(), StorageError>;

    /// Append bytes to an existing file
    async fn append(&self, path: &str, data: Bytes) -> Result<(), StorageError>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}

/// Open a client for a configured connection
///
/// # Errors
///
/// Returns a `Connection` error if the backend cannot be initialized
/// (for example, the HTTP client fails to build).
pub fn connect(config: &ConnectionConfig) -> Result<Arc<dyn StorageClient>, StorageError> {
    let client: Arc<dyn StorageClient> = match config {
        ConnectionConfig::WebHdfs(web) => Arc::new(WebHdfsClient::new(web)?),
        ConnectionConfig::Local(local) => Arc::new(LocalClient::new(&local.root)),
        ConnectionConfig::Memory => Arc::new(MemoryClient::new()),
    };

    tracing::debug!(backend = client.name(), "storage client connected");
    Ok(client)
}

/// Parent directory of a `/`-separated path, if it has a non-root one
pub fn parent_dir(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches('/');
    let idx = trimmed.rfind('/')?;
    let parent = &trimmed[..idx];
    if parent.is_empty() { None } else { Some(parent) }
}
