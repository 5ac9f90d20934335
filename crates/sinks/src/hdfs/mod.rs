//! HDFS append sink
//!
//! Appends record payloads to files in a distributed filesystem and survives
//! corrupted or relocated replica blocks by redirecting a destination to a
//! fresh file (`report.log` → `report.log.0` → `report.log.1` ...).
//!
//! # Pieces
//!
//! | Module | Role |
//! |--------|------|
//! | [`client`] | Storage primitives (`StorageClient`) and backends |
//! | [`resolver`] | Declared → effective destination, redirect budget |
//! | [`sink`] | Batch grouping, per-destination pipelines, error classification |
//!
//! # Retries
//!
//! The sink never retries on its own. A caller that gets a retryable error
//! re-submits the same batch; redirections recorded by the failed attempt
//! route it to the new file.
//!
//! # Example
//!
//! ```ignore
//! use scribe_sinks::hdfs::{HdfsAppendConfig, HdfsAppendSink, Record, client};
//!
//! let client = client::connect(&connection_config)?;
//! let sink = HdfsAppendSink::new(client, HdfsAppendConfig::default());
//!
//! let batch = vec![Record::new("/logs/app.log", "line\n")];
//! match sink.process_batch(batch.clone()).await {
//!     Err(e) if e.is_retryable() => sink.process_batch(batch).await?,
//!     other => other?,
//! };
//! ```

pub mod client;
mod error;
mod metrics;
pub mod resolver;
mod sink;

pub use error::{AppendError, AppendErrorKind};
pub use metrics::{HdfsAppendMetrics, HdfsAppendSinkMetricsHandle, MetricsSnapshot};
pub use resolver::{DestinationResolver, Redirection};
pub use sink::{BatchSummary, DEFAULT_SINK_NAME, HdfsAppendConfig, HdfsAppendSink, Record};
