//! Local directory backend
//!
//! Destination paths are resolved under a root directory, so `/a/b.log`
//! lands in `<root>/a/b.log`. Parent traversal (`..`) is rejected.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::{FileStatus, StorageClient, StorageError, StorageErrorKind};

/// [`StorageClient`] backed by `tokio::fs`
#[derive(Debug, Clone)]
pub struct LocalClient {
    root: PathBuf,
}

impl LocalClient {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a destination path onto the root directory
    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path.trim_start_matches('/'));
        let mut resolved = self.root.clone();

        for component in relative.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(StorageError::new(
                        StorageErrorKind::PermissionDenied,
                        format!("path {path} escapes the storage root"),
                    ));
                }
            }
        }

        Ok(resolved)
    }
}

#[async_trait]
impl StorageClient for LocalClient {
    async fn status(&self, path: &str) -> Result<Option<FileStatus>, StorageError> {
        let resolved = self.resolve(path)?;
        match fs::metadata(&resolved).await {
            Ok(meta) if meta.is_dir() => Ok(Some(FileStatus::directory())),
            Ok(meta) => Ok(Some(FileStatus::file(meta.len()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_dirs(&self, path: &str) -> Result<(), StorageError> {
        let resolved = self.resolve(path)?;
        fs::create_dir_all(&resolved).await?;
        Ok(())
    }

    async fn create_file(&self, path: &str) -> Result<(), StorageError> {
        let resolved = self.resolve(path)?;
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&resolved)
            .await?;
        Ok(())
    }

    async fn append(&self, path: &str, data: Bytes) -> Result<(), StorageError> {
        let resolved = self.resolve(path)?;
        let mut file = OpenOptions::new().append(true).open(&resolved).await?;
        file.write_all(&data).await?;
        file.flush().await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
#[path = "local_test.rs"]
mod local_test;
