//! Check command - validate config and probe storage connections
//!
//! # Usage
//!
//! ```bash
//! scribe --config scribe.toml check
//! scribe check --path /data/incoming
//! ```

use anyhow::Result;
use clap::Args;

use scribe_config::Config;
use scribe_sinks::{StorageClient, connect};

/// Check command arguments
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Path to probe on every connection
    #[arg(long, default_value = "/")]
    pub path: String,
}

/// Outcome of probing one sink
#[derive(Debug, PartialEq, Eq)]
struct ProbeResult {
    sink: String,
    backend: &'static str,
    outcome: Result<String, String>,
}

/// Run the check command
pub async fn run(args: CheckArgs, config: &Config) -> Result<()> {
    let sinks = config.enabled_sinks();
    println!("Config OK: {} sink(s) enabled", sinks.len());
    println!();

    let mut failures = 0;
    for name in &sinks {
        let result = probe_sink(config, name, &args.path).await;
        match &result.outcome {
            Ok(detail) => println!("  {:<16} {:<8} ok     {}", result.sink, result.backend, detail),
            Err(error) => {
                failures += 1;
                println!("  {:<16} {:<8} FAILED {}", result.sink, result.backend, error);
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} of {} sink(s) failed the connection check", sinks.len());
    }
    Ok(())
}

async fn probe_sink(config: &Config, name: &str, path: &str) -> ProbeResult {
    let Some(connection) = config.sink_connection(name) else {
        return ProbeResult {
            sink: name.to_string(),
            backend: "-",
            outcome: Err("no usable connection".to_string()),
        };
    };

    let backend = connection.type_name();
    let outcome = match connect(&connection) {
        Ok(client) => probe(client.as_ref(), path).await,
        Err(e) => Err(e.to_string()),
    };

    tracing::debug!(sink = name, backend, ok = outcome.is_ok(), "connection probed");
    ProbeResult {
        sink: name.to_string(),
        backend,
        outcome,
    }
}

async fn probe(client: &dyn StorageClient, path: &str) -> Result<String, String> {
    match client.status(path).await {
        Ok(Some(status)) if status.is_dir() => Ok(format!("{path} is a directory")),
        Ok(Some(status)) => Ok(format!("{path} is a file ({} bytes)", status.length)),
        Ok(None) => Ok(format!("{path} does not exist yet")),
        Err(e) => Err(e.to_string()),
    }
}
