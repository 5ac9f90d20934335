//! Scribe - Sinks
//!
//! Write path for the scribe append orchestrator.
//!
//! # Architecture
//!
//! ```text
//! [Scheduler] --Vec<Record>--> [HdfsAppendSink] --> [DestinationResolver]
//!                                     |
//!                                     +--> per-destination task --> [StorageClient]
//! ```
//!
//! # Storage backends
//!
//! | Backend | Purpose |
//! |---------|---------|
//! | `webhdfs` | Hadoop-compatible cluster over REST |
//! | `local` | Directory on local disk |
//! | `memory` | In-process store (tests, dry runs) |

/// HDFS append sink - redirection-aware batch appends
pub mod hdfs;

/// Shared utilities (payload rendering, rate-limited logging)
pub mod util;

pub use hdfs::client::{StorageClient, StorageError, StorageErrorKind, connect};
pub use hdfs::{
    AppendError, AppendErrorKind, BatchSummary, HdfsAppendConfig, HdfsAppendSink,
    HdfsAppendSinkMetricsHandle, MetricsSnapshot, Record,
};
