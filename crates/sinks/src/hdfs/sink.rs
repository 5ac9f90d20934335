//! HDFS append sink implementation
//!
//! A batch is grouped by effective destination and every destination runs as
//! its own task:
//!
//! ```text
//! records ─drop empty─> lookup ─group─┬─> [ensure_exists → append, append, ...]  /a.log
//!                                     ├─> [ensure_exists → append, ...]          /b.log.0
//!                                     └─> ...
//!                                           join: first error fails the batch
//! ```
//!
//! Within a destination appends are issued one at a time and in record order.
//! Destinations do not wait for each other. When one fails the others are
//! left to finish; only the first error is reported.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use scribe_config::HdfsSinkConfig;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::util::{RateLimitedLogger, render_payloads};

use super::client::{StorageClient, StorageError, StorageErrorKind, parent_dir};
use super::error::{AppendError, AppendErrorKind};
use super::metrics::{HdfsAppendMetrics, HdfsAppendSinkMetricsHandle, MetricsSnapshot};
use super::resolver::DestinationResolver;

/// Default sink name used in logs and metrics
pub const DEFAULT_SINK_NAME: &str = "hdfs";

// =============================================================================
// Records
// =============================================================================

/// One payload bound for a destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Declared destination path
    pub destination: String,
    pub data: Bytes,
}

impl Record {
    pub fn new(destination: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            destination: destination.into(),
            data: data.into(),
        }
    }
}

/// What a successful batch wrote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Distinct effective destinations
    pub destinations: usize,
    /// Payloads appended
    pub records: usize,
    pub bytes: u64,
    /// Empty payloads skipped
    pub dropped: usize,
}

// =============================================================================
// Config
// =============================================================================

/// Runtime settings for [`HdfsAppendSink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HdfsAppendConfig {
    /// Embed the payload batch in append failures
    pub log_data_on_error: bool,

    /// Redirections allowed per destination
    pub max_write_errors: u32,

    /// Cap on destinations written at once (unbounded when `None`)
    pub max_concurrent_destinations: Option<usize>,
}

impl Default for HdfsAppendConfig {
    fn default() -> Self {
        Self {
            log_data_on_error: false,
            max_write_errors: scribe_config::DEFAULT_MAX_WRITE_ERRORS,
            max_concurrent_destinations: None,
        }
    }
}

impl HdfsAppendConfig {
    pub fn with_log_data_on_error(mut self, enabled: bool) -> Self {
        self.log_data_on_error = enabled;
        self
    }

    pub fn with_max_write_errors(mut self, max: u32) -> Self {
        self.max_write_errors = max;
        self
    }

    pub fn with_max_concurrent_destinations(mut self, max: usize) -> Self {
        self.max_concurrent_destinations = Some(max);
        self
    }
}

impl From<&HdfsSinkConfig> for HdfsAppendConfig {
    fn from(config: &HdfsSinkConfig) -> Self {
        Self {
            log_data_on_error: config.log_data_on_error,
            max_write_errors: config.max_write_errors,
            max_concurrent_destinations: config.max_concurrent_destinations,
        }
    }
}

// =============================================================================
// Sink
// =============================================================================

struct Inner {
    name: String,
    client: Arc<dyn StorageClient>,
    config: HdfsAppendConfig,
    resolver: DestinationResolver,
    metrics: Arc<HdfsAppendMetrics>,
    error_logger: RateLimitedLogger,
    limiter: Option<Semaphore>,
}

/// Appends record batches to files, redirecting around corrupt replicas
///
/// Cloning is cheap and clones share redirection state and metrics, so one
/// sink can serve overlapping batches.
#[derive(Clone)]
pub struct HdfsAppendSink {
    inner: Arc<Inner>,
}

impl fmt::Debug for HdfsAppendSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HdfsAppendSink")
            .field("name", &self.inner.name)
            .field("backend", &self.inner.client.name())
            .field("config", &self.inner.config)
            .finish()
    }
}

impl HdfsAppendSink {
    /// Create a sink with the default name
    pub fn new(client: Arc<dyn StorageClient>, config: HdfsAppendConfig) -> Self {
        Self::with_name(client, config, DEFAULT_SINK_NAME)
    }

    /// Create a sink with a custom name for logs and metrics
    pub fn with_name(
        client: Arc<dyn StorageClient>,
        config: HdfsAppendConfig,
        name: impl Into<String>,
    ) -> Self {
        let limiter = config
            .max_concurrent_destinations
            .filter(|&max| max > 0)
            .map(Semaphore::new);
        let resolver = DestinationResolver::new(config.max_write_errors);

        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                client,
                config,
                resolver,
                metrics: Arc::new(HdfsAppendMetrics::new()),
                error_logger: RateLimitedLogger::default_interval(),
                limiter,
            }),
        }
    }

    /// Create a sink from its `[sinks.<name>]` table
    pub fn from_config(
        name: impl Into<String>,
        config: &HdfsSinkConfig,
        client: Arc<dyn StorageClient>,
    ) -> Self {
        Self::with_name(client, HdfsAppendConfig::from(config), name)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn config(&self) -> &HdfsAppendConfig {
        &self.inner.config
    }

    /// Redirection state shared by every clone of this sink
    pub fn resolver(&self) -> &DestinationResolver {
        &self.inner.resolver
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Get a metrics handle for reporting
    pub fn metrics_handle(&self) -> HdfsAppendSinkMetricsHandle {
        HdfsAppendSinkMetricsHandle::new(self.inner.name.clone(), Arc::clone(&self.inner.metrics))
    }

    /// Make sure `destination` exists, creating parents and an empty file
    ///
    /// # Errors
    ///
    /// Returns `CreateFailed` if the status check or any creation step fails.
    /// Creation failures never cause a redirection.
    pub async fn ensure_exists(&self, destination: &str) -> Result<(), AppendError> {
        let client = &self.inner.client;

        match client.status(destination).await {
            Ok(Some(_)) => return Ok(()),
            Ok(None) => {}
            Err(source) => return Err(self.create_failed(destination, source)),
        }

        if let Some(parent) = parent_dir(destination) {
            client
                .create_dirs(parent)
                .await
                .map_err(|source| self.create_failed(destination, source))?;
        }

        match client.create_file(destination).await {
            Ok(()) => {
                tracing::debug!(sink = %self.inner.name, destination, "created destination");
                Ok(())
            }
            // Another writer created it between our status check and now
            Err(source) if source.kind == StorageErrorKind::AlreadyExists => Ok(()),
            Err(source) => Err(self.create_failed(destination, source)),
        }
    }

    /// Append payloads to `destination` one at a time, in order
    ///
    /// Stops at the first failure; later payloads are not attempted.
    ///
    /// # Errors
    ///
    /// - `CorruptReplica` when the backend reports a corrupt replica. The
    ///   redirection is recorded, so the next lookup of the original name
    ///   returns `redirected_to`.
    /// - `RedirectLimitExceeded` when that redirection spends the budget.
    /// - `AppendFailed` for anything else.
    pub async fn append_sequence(
        &self,
        destination: &str,
        payloads: &[Bytes],
    ) -> Result<(), AppendError> {
        let inner = &self.inner;

        for payload in payloads {
            let source = match inner.client.append(destination, payload.clone()).await {
                Ok(()) => {
                    inner.metrics.record_append(payload.len() as u64);
                    continue;
                }
                Err(source) => source,
            };

            if source.is_corrupt_replica() {
                inner.metrics.record_error(AppendErrorKind::CorruptReplica);
                let redirected_to = match inner.resolver.record_error(destination) {
                    Ok(name) => name,
                    Err(limit) => {
                        inner.metrics.record_error(limit.kind());
                        tracing::error!(
                            sink = %inner.name,
                            destination,
                            error = %limit,
                            "destination exhausted its redirections"
                        );
                        return Err(limit);
                    }
                };
                return Err(AppendError::CorruptReplica {
                    destination: destination.to_string(),
                    redirected_to,
                    source,
                });
            }

            inner.metrics.record_error(AppendErrorKind::AppendFailed);
            let data = if inner.config.log_data_on_error {
                inner
                    .error_logger
                    .error_with_data(destination, "append failed", &source, payload);
                Some(render_payloads(payloads))
            } else {
                inner.error_logger.error(destination, "append failed", &source);
                None
            };

            return Err(AppendError::AppendFailed {
                destination: destination.to_string(),
                source,
                data,
            });
        }

        Ok(())
    }

    /// Write a batch of records
    ///
    /// Empty payloads are dropped. Every other record is routed through the
    /// resolver, grouped by effective destination (keeping record order), and
    /// each destination is created if needed and appended to concurrently
    /// with the others.
    ///
    /// Retrying after an error means calling this again with the same
    /// records; redirections recorded by the failed attempt apply.
    ///
    /// # Errors
    ///
    /// Returns the first error observed. A destination over its redirect
    /// limit fails the batch before anything is written.
    pub async fn process_batch(&self, records: Vec<Record>) -> Result<BatchSummary, AppendError> {
        let inner = &self.inner;
        inner.metrics.record_batch_received();

        let total = records.len();
        let records: Vec<Record> = records.into_iter().filter(|r| !r.data.is_empty()).collect();
        let dropped = total - records.len();
        if dropped > 0 {
            inner.metrics.record_dropped(dropped as u64);
            tracing::debug!(sink = %inner.name, dropped, "dropped empty records");
        }

        let groups = self.group_by_destination(records)?;

        let mut summary = BatchSummary {
            destinations: groups.len(),
            dropped,
            ..Default::default()
        };
        for (_, payloads) in &groups {
            summary.records += payloads.len();
            summary.bytes += payloads.iter().map(|p| p.len() as u64).sum::<u64>();
        }

        let mut tasks = JoinSet::new();
        let mut task_destinations = HashMap::with_capacity(groups.len());
        for (destination, payloads) in groups {
            let sink = self.clone();
            let name = destination.clone();
            let handle = tasks.spawn(async move { sink.write_destination(&name, &payloads).await });
            task_destinations.insert(handle.id(), destination);
        }

        let mut first_error = None;
        while let Some(joined) = tasks.join_next_with_id().await {
            let result = match joined {
                Ok((_, result)) => result,
                Err(join_error) => {
                    let destination = task_destinations
                        .get(&join_error.id())
                        .cloned()
                        .unwrap_or_default();
                    inner.metrics.record_error(AppendErrorKind::TaskFailed);
                    Err(AppendError::TaskFailed {
                        destination,
                        message: join_error.to_string(),
                    })
                }
            };

            if let Err(err) = result
                && first_error.is_none()
            {
                first_error = Some(err);
            }
        }

        if let Some(err) = first_error {
            tracing::warn!(
                sink = %inner.name,
                destination = err.destination(),
                kind = %err.kind(),
                retryable = err.is_retryable(),
                "batch failed"
            );
            return Err(err);
        }

        inner.metrics.record_batch_written();
        tracing::debug!(
            sink = %inner.name,
            destinations = summary.destinations,
            records = summary.records,
            bytes = summary.bytes,
            "batch written"
        );
        Ok(summary)
    }

    /// Resolve and group payloads, destinations in first-seen order
    fn group_by_destination(
        &self,
        records: Vec<Record>,
    ) -> Result<Vec<(String, Vec<Bytes>)>, AppendError> {
        let mut groups: Vec<(String, Vec<Bytes>)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for record in records {
            let effective = match self.inner.resolver.lookup(&record.destination) {
                Ok(effective) => effective,
                Err(err) => {
                    self.inner.metrics.record_error(err.kind());
                    return Err(err);
                }
            };

            match index.get(&effective) {
                Some(&i) => groups[i].1.push(record.data),
                None => {
                    index.insert(effective.clone(), groups.len());
                    groups.push((effective, vec![record.data]));
                }
            }
        }

        Ok(groups)
    }

    /// One destination's pipeline: create if missing, then append in order
    async fn write_destination(
        &self,
        destination: &str,
        payloads: &[Bytes],
    ) -> Result<(), AppendError> {
        let _permit = match &self.inner.limiter {
            Some(limiter) => {
                Some(
                    limiter
                        .acquire()
                        .await
                        .map_err(|e| AppendError::TaskFailed {
                            destination: destination.to_string(),
                            message: e.to_string(),
                        })?,
                )
            }
            None => None,
        };

        self.ensure_exists(destination).await?;
        self.append_sequence(destination, payloads).await
    }

    fn create_failed(&self, destination: &str, source: StorageError) -> AppendError {
        self.inner.metrics.record_error(AppendErrorKind::CreateFailed);
        self.inner
            .error_logger
            .error(destination, "failed to create destination", &source);
        AppendError::CreateFailed {
            destination: destination.to_string(),
            source,
        }
    }
}

#[cfg(test)]
#[path = "sink_test.rs"]
mod sink_test;
