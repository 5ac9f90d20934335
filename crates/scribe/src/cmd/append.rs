//! Append command - write JSON-line records through a sink
//!
//! Each input line is one record:
//!
//! ```json
//! {"destination": "/logs/app/2024-01-01.log", "data": "line of text\n"}
//! {"destination": "/logs/app/frames.bin", "data": [0, 159, 146, 150]}
//! ```
//!
//! `data` is either a string, written as UTF-8, or an array of byte values
//! for binary payloads.
//!
//! Records are grouped into batches and each batch goes to the sink. This
//! command is the scheduler: on a retryable failure it re-submits the same
//! batch, so a corrupt-replica redirection recorded by the failed attempt
//! takes effect on the next one.
//!
//! # Usage
//!
//! ```bash
//! scribe append records.jsonl
//! cat records.jsonl | scribe append --sink events --batch-size 500
//! scribe append --max-attempts 10 --retry-interval 5s records.jsonl
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::Args;
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use scribe_config::Config;
use scribe_sinks::{BatchSummary, HdfsAppendSink, Record, connect};

/// Default records per batch
const DEFAULT_BATCH_SIZE: usize = 1000;

/// Append command arguments
#[derive(Args, Debug)]
pub struct AppendArgs {
    /// JSON-lines input file (stdin when omitted)
    pub input: Option<PathBuf>,

    /// Sink to write through (required when several are enabled)
    #[arg(short, long)]
    pub sink: Option<String>,

    /// Records per batch
    #[arg(
        short,
        long,
        default_value_t = DEFAULT_BATCH_SIZE,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub batch_size: usize,

    /// Attempts per batch, including the first
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_attempts: u32,

    /// Pause between attempts (e.g. 500ms, 2s)
    #[arg(long, default_value = "1s", value_parser = parse_duration)]
    pub retry_interval: Duration,
}

/// One input line
#[derive(Debug, Deserialize)]
struct InputRecord {
    destination: String,
    #[serde(default)]
    data: InputData,
}

/// Record payload: text or raw bytes
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InputData {
    Text(String),
    Binary(Vec<u8>),
}

impl Default for InputData {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl From<InputData> for Bytes {
    fn from(data: InputData) -> Self {
        match data {
            InputData::Text(text) => Bytes::from(text),
            InputData::Binary(bytes) => Bytes::from(bytes),
        }
    }
}

/// Retry policy for one batch
#[derive(Debug, Clone, Copy)]
struct RetryPolicy {
    max_attempts: u32,
    interval: Duration,
}

/// Totals over a whole run
#[derive(Debug, Default, PartialEq, Eq)]
struct AppendTotals {
    batches: usize,
    records: usize,
    bytes: u64,
    dropped: usize,
    retries: u32,
}

impl AppendTotals {
    fn add(&mut self, summary: &BatchSummary, retries: u32) {
        self.batches += 1;
        self.records += summary.records;
        self.bytes += summary.bytes;
        self.dropped += summary.dropped;
        self.retries += retries;
    }
}

/// Run the append command
pub async fn run(args: AppendArgs, config: &Config) -> Result<()> {
    let sink_name = select_sink(config, args.sink.as_deref())?;
    let sink_config = config
        .sinks
        .get(&sink_name)
        .with_context(|| format!("sink '{sink_name}' not found"))?;
    let connection = config
        .sink_connection(&sink_name)
        .with_context(|| format!("sink '{sink_name}' has no usable connection"))?;

    let client = connect(&connection)
        .with_context(|| format!("failed to connect sink '{sink_name}'"))?;
    let sink = HdfsAppendSink::from_config(&sink_name, sink_config, client);

    info!(
        sink = %sink_name,
        connection = %sink_config.connection,
        backend = connection.type_name(),
        max_write_errors = sink_config.max_write_errors,
        "scribe append starting"
    );

    let policy = RetryPolicy {
        max_attempts: args.max_attempts,
        interval: args.retry_interval,
    };

    let result = match &args.input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?;
            append_all(&sink, BufReader::new(file), args.batch_size, policy).await
        }
        None => append_all(&sink, BufReader::new(tokio::io::stdin()), args.batch_size, policy).await,
    };

    let metrics = sink.metrics();
    info!(
        sink = %sink_name,
        batches_received = metrics.batches_received,
        batches_written = metrics.batches_written,
        records_written = metrics.records_written,
        bytes_written = metrics.bytes_written,
        records_dropped = metrics.records_dropped,
        corrupt_replicas = metrics.corrupt_replicas,
        errors = metrics.total_errors(),
        "sink metrics"
    );
    for redirection in sink.resolver().redirections() {
        info!(
            destination = %redirection.original,
            redirected_to = %redirection.effective(),
            "active redirection"
        );
    }

    let totals = result?;
    println!(
        "Appended {} records ({} bytes) in {} batches ({} empty dropped, {} retries)",
        totals.records, totals.bytes, totals.batches, totals.dropped, totals.retries
    );
    Ok(())
}

/// Pick the sink to write through
fn select_sink(config: &Config, requested: Option<&str>) -> Result<String> {
    let enabled = config.enabled_sinks();

    match requested {
        Some(name) => {
            if !enabled.iter().any(|s| s == name) {
                anyhow::bail!(
                    "sink '{}' is not configured or disabled (enabled: {})",
                    name,
                    enabled.join(", ")
                );
            }
            Ok(name.to_string())
        }
        None => match enabled.as_slice() {
            [only] => Ok(only.clone()),
            [] => anyhow::bail!("no sinks enabled"),
            _ => anyhow::bail!(
                "several sinks enabled ({}); pick one with --sink",
                enabled.join(", ")
            ),
        },
    }
}

/// Read every record, batch, and submit with retry
async fn append_all<R>(
    sink: &HdfsAppendSink,
    reader: R,
    batch_size: usize,
    policy: RetryPolicy,
) -> Result<AppendTotals>
where
    R: AsyncBufRead + Unpin,
{
    let mut totals = AppendTotals::default();
    let mut batch = Vec::with_capacity(batch_size);
    let mut lines = reader.lines();
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await.context("failed to read input")? {
        line_no += 1;
        let Some(record) =
            parse_record(&line).with_context(|| format!("line {line_no}: invalid record"))?
        else {
            continue;
        };

        batch.push(record);
        if batch.len() >= batch_size {
            let full = std::mem::replace(&mut batch, Vec::with_capacity(batch_size));
            let (summary, retries) = submit_with_retry(sink, full, policy).await?;
            totals.add(&summary, retries);
        }
    }

    if !batch.is_empty() {
        let (summary, retries) = submit_with_retry(sink, batch, policy).await?;
        totals.add(&summary, retries);
    }

    Ok(totals)
}

/// Parse one input line, `None` for blank lines
fn parse_record(line: &str) -> Result<Option<Record>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let input: InputRecord = serde_json::from_str(line)?;
    if input.destination.is_empty() {
        anyhow::bail!("destination is empty");
    }
    Ok(Some(Record::new(input.destination, Bytes::from(input.data))))
}

/// Submit a batch, re-submitting the identical batch on retryable errors
///
/// Returns the summary and the number of retries it took.
async fn submit_with_retry(
    sink: &HdfsAppendSink,
    batch: Vec<Record>,
    policy: RetryPolicy,
) -> Result<(BatchSummary, u32)> {
    let mut attempt = 1;

    loop {
        match sink.process_batch(batch.clone()).await {
            Ok(summary) => return Ok((summary, attempt - 1)),
            Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                warn!(
                    destination = e.destination(),
                    kind = %e.kind(),
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    "batch failed, retrying"
                );
                attempt += 1;
                tokio::time::sleep(policy.interval).await;
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("batch of {} records failed after {attempt} attempt(s)", batch.len())
                });
            }
        }
    }
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(s).map_err(|e| e.to_string())
}
