//! HDFS append sink metrics
//!
//! Atomic counters for tracking sink throughput and failures.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::error::AppendErrorKind;

// =============================================================================
// Metrics
// =============================================================================

/// Metrics for the HDFS append sink
#[derive(Debug, Default)]
pub struct HdfsAppendMetrics {
    /// Batches submitted to `process_batch`
    pub batches_received: AtomicU64,

    /// Batches where every destination succeeded
    pub batches_written: AtomicU64,

    /// Payloads appended
    pub records_written: AtomicU64,

    /// Payload bytes appended
    pub bytes_written: AtomicU64,

    /// Empty payloads dropped before grouping
    pub records_dropped: AtomicU64,

    /// Directory or file creation failures
    pub create_errors: AtomicU64,

    /// Append failures other than corrupt replicas
    pub append_errors: AtomicU64,

    /// Corrupt replica failures (each one is a redirection)
    pub corrupt_replicas: AtomicU64,

    /// Destinations refused because their redirection budget is spent
    pub redirect_limit_hits: AtomicU64,
}

impl HdfsAppendMetrics {
    pub const fn new() -> Self {
        Self {
            batches_received: AtomicU64::new(0),
            batches_written: AtomicU64::new(0),
            records_written: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            records_dropped: AtomicU64::new(0),
            create_errors: AtomicU64::new(0),
            append_errors: AtomicU64::new(0),
            corrupt_replicas: AtomicU64::new(0),
            redirect_limit_hits: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_batch_received(&self) {
        self.batches_received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_batch_written(&self) {
        self.batches_written.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one successful append
    #[inline]
    pub fn record_append(&self, bytes: u64) {
        self.records_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_dropped(&self, count: u64) {
        self.records_dropped.fetch_add(count, Ordering::Relaxed);
    }

    /// Count a failure under its kind
    pub fn record_error(&self, kind: AppendErrorKind) {
        let counter = match kind {
            AppendErrorKind::CreateFailed => &self.create_errors,
            AppendErrorKind::CorruptReplica => &self.corrupt_replicas,
            AppendErrorKind::AppendFailed | AppendErrorKind::TaskFailed => &self.append_errors,
            AppendErrorKind::RedirectLimitExceeded => &self.redirect_limit_hits,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            batches_received: self.batches_received.load(Ordering::Relaxed),
            batches_written: self.batches_written.load(Ordering::Relaxed),
            records_written: self.records_written.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            records_dropped: self.records_dropped.load(Ordering::Relaxed),
            create_errors: self.create_errors.load(Ordering::Relaxed),
            append_errors: self.append_errors.load(Ordering::Relaxed),
            corrupt_replicas: self.corrupt_replicas.load(Ordering::Relaxed),
            redirect_limit_hits: self.redirect_limit_hits.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub batches_received: u64,
    pub batches_written: u64,
    pub records_written: u64,
    pub bytes_written: u64,
    pub records_dropped: u64,
    pub create_errors: u64,
    pub append_errors: u64,
    pub corrupt_replicas: u64,
    pub redirect_limit_hits: u64,
}

impl MetricsSnapshot {
    /// Failures of any kind
    pub fn total_errors(&self) -> u64 {
        self.create_errors + self.append_errors + self.corrupt_replicas + self.redirect_limit_hits
    }
}

// =============================================================================
// Metrics Handle
// =============================================================================

/// Handle for reading sink metrics from outside the sink
///
/// Holds an Arc to the counters, so it stays valid after the sink is dropped.
#[derive(Debug, Clone)]
pub struct HdfsAppendSinkMetricsHandle {
    name: String,
    metrics: Arc<HdfsAppendMetrics>,
}

impl HdfsAppendSinkMetricsHandle {
    pub(crate) fn new(name: String, metrics: Arc<HdfsAppendMetrics>) -> Self {
        Self { name, metrics }
    }

    /// Sink instance name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
