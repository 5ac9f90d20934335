//! In-memory storage backend
//!
//! Keeps files and directories in a map. Besides serving as a dry-run
//! connection (`type = "memory"`), it records every append in order and the
//! peak number of concurrent appends, and lets callers queue failures for a
//! path. Tests use it to observe ordering and concurrency directly instead of
//! mocking the orchestrator.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use super::{FileStatus, StorageClient, StorageError, StorageErrorKind, parent_dir};

/// One append as observed by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendRecord {
    pub path: String,
    pub data: Bytes,
}

#[derive(Debug, Default)]
struct State {
    files: HashMap<String, Vec<u8>>,
    dirs: HashSet<String>,
    append_failures: HashMap<String, VecDeque<StorageError>>,
    create_failures: HashMap<String, VecDeque<StorageError>>,
    journal: Vec<AppendRecord>,
    in_flight: HashMap<String, usize>,
    peak_in_flight_per_path: HashMap<String, usize>,
    in_flight_total: usize,
    peak_in_flight_total: usize,
}

/// In-memory [`StorageClient`]
///
/// Cloning shares the underlying store.
#[derive(Debug, Clone, Default)]
pub struct MemoryClient {
    state: Arc<Mutex<State>>,
    append_delay: Option<Duration>,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every append for `delay` before applying it
    #[must_use]
    pub fn with_append_delay(mut self, delay: Duration) -> Self {
        self.append_delay = Some(delay);
        self
    }

    /// Create an existing file with the given contents (and its parents)
    pub fn insert_file(&self, path: &str, contents: impl Into<Vec<u8>>) {
        let mut state = self.state.lock();
        if let Some(parent) = parent_dir(path) {
            insert_dirs(&mut state.dirs, parent);
        }
        state.files.insert(path.to_string(), contents.into());
    }

    /// Make the next append to `path` fail with `error`
    ///
    /// Failures queue up: each append consumes one.
    pub fn fail_next_append(&self, path: &str, error: StorageError) {
        self.state
            .lock()
            .append_failures
            .entry(path.to_string())
            .or_default()
            .push_back(error);
    }

    /// Make the next directory or file creation at `path` fail with `error`
    pub fn fail_next_create(&self, path: &str, error: StorageError) {
        self.state
            .lock()
            .create_failures
            .entry(path.to_string())
            .or_default()
            .push_back(error);
    }

    /// Current contents of a file
    pub fn contents(&self, path: &str) -> Option<Vec<u8>> {
        self.state.lock().files.get(path).cloned()
    }

    /// Whether a file exists at `path`
    pub fn file_exists(&self, path: &str) -> bool {
        self.state.lock().files.contains_key(path)
    }

    /// Whether a directory exists at `path`
    pub fn dir_exists(&self, path: &str) -> bool {
        self.state.lock().dirs.contains(path)
    }

    /// All successful appends, in the order they were applied
    pub fn appends(&self) -> Vec<AppendRecord> {
        self.state.lock().journal.clone()
    }

    /// Successful appends to one path, in order
    pub fn appends_to(&self, path: &str) -> Vec<Bytes> {
        self.state
            .lock()
            .journal
            .iter()
            .filter(|r| r.path == path)
            .map(|r| r.data.clone())
            .collect()
    }

    /// Highest number of appends ever in flight for one path
    pub fn peak_concurrent_appends(&self, path: &str) -> usize {
        self.state
            .lock()
            .peak_in_flight_per_path
            .get(path)
            .copied()
            .unwrap_or(0)
    }

    /// Highest number of appends ever in flight across all paths
    pub fn peak_concurrent_appends_total(&self) -> usize {
        self.state.lock().peak_in_flight_total
    }

    fn take_create_failure(&self, path: &str) -> Option<StorageError> {
        self.state
            .lock()
            .create_failures
            .get_mut(path)
            .and_then(VecDeque::pop_front)
    }
}

/// Registers an append as in flight until dropped
struct InFlight<'a> {
    state: &'a Mutex<State>,
    path: &'a str,
}

impl<'a> InFlight<'a> {
    fn enter(state: &'a Mutex<State>, path: &'a str) -> Self {
        let mut s = state.lock();
        let current = {
            let count = s.in_flight.entry(path.to_string()).or_default();
            *count += 1;
            *count
        };
        let peak = s.peak_in_flight_per_path.entry(path.to_string()).or_default();
        *peak = (*peak).max(current);
        s.in_flight_total += 1;
        s.peak_in_flight_total = s.peak_in_flight_total.max(s.in_flight_total);
        Self { state, path }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut s = self.state.lock();
        if let Some(count) = s.in_flight.get_mut(self.path) {
            *count = count.saturating_sub(1);
        }
        s.in_flight_total = s.in_flight_total.saturating_sub(1);
    }
}

fn insert_dirs(dirs: &mut HashSet<String>, path: &str) {
    let mut current = Some(path);
    while let Some(dir) = current {
        if !dirs.insert(dir.to_string()) {
            break;
        }
        current = parent_dir(dir);
    }
}

#[async_trait]
impl StorageClient for MemoryClient {
    async fn status(&self, path: &str) -> Result<Option<FileStatus>, StorageError> {
        let state = self.state.lock();
        if let Some(contents) = state.files.get(path) {
            return Ok(Some(FileStatus::file(contents.len() as u64)));
        }
        if state.dirs.contains(path) {
            return Ok(Some(FileStatus::directory()));
        }
        Ok(None)
    }

    async fn create_dirs(&self, path: &str) -> Result<(), StorageError> {
        if let Some(err) = self.take_create_failure(path) {
            return Err(err);
        }

        let mut state = self.state.lock();
        if state.files.contains_key(path) {
            return Err(StorageError::new(
                StorageErrorKind::AlreadyExists,
                format!("{path} exists and is a file"),
            ));
        }
        insert_dirs(&mut state.dirs, path);
        Ok(())
    }

    async fn create_file(&self, path: &str) -> Result<(), StorageError> {
        if let Some(err) = self.take_create_failure(path) {
            return Err(err);
        }

        let mut state = self.state.lock();
        if let Some(parent) = parent_dir(path)
            && !state.dirs.contains(parent)
        {
            return Err(StorageError::not_found(format!(
                "parent directory {parent} does not exist"
            )));
        }
        if state.files.contains_key(path) || state.dirs.contains(path) {
            return Err(StorageError::new(
                StorageErrorKind::AlreadyExists,
                format!("{path} already exists"),
            ));
        }
        state.files.insert(path.to_string(), Vec::new());
        Ok(())
    }

    async fn append(&self, path: &str, data: Bytes) -> Result<(), StorageError> {
        let _in_flight = InFlight::enter(&self.state, path);

        if let Some(delay) = self.append_delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        if let Some(err) = state
            .append_failures
            .get_mut(path)
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }

        let Some(file) = state.files.get_mut(path) else {
            return Err(StorageError::not_found(format!("file {path} does not exist")));
        };
        file.extend_from_slice(&data);
        state.journal.push(AppendRecord {
            path: path.to_string(),
            data,
        });
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod memory_test;
