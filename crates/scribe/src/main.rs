//! Scribe - append records to HDFS, redirecting around corrupt replicas
//!
//! # Usage
//!
//! ```bash
//! # Append JSON lines from stdin through the only configured sink
//! scribe --config scribe.toml append < records.jsonl
//!
//! # Pick a sink, smaller batches, more retries
//! scribe append --sink events --batch-size 100 --max-attempts 10 records.jsonl
//!
//! # Validate config and probe every connection
//! scribe --config scribe.toml check
//! ```

mod cmd;

use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scribe_config::{Config, LogFormat};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Config used when `--config` is not given: one sink on the built-in
/// WebHDFS connection
const DEFAULT_CONFIG: &str = "[sinks.hdfs]";

/// Scribe - append records to HDFS with corrupted-replica redirection
#[derive(Parser, Debug)]
#[command(name = "scribe")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (error if specified but not found)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error). Overrides config file.
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Append JSON-line records from a file or stdin
    Append(cmd::append::AppendArgs),

    /// Validate config and probe storage connections
    Check(cmd::check::CheckArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    let log_level = resolve_log_level(cli.log_level.as_deref(), &config);
    init_logging(&log_level, config.log.format)?;

    match cli.command {
        Command::Append(args) => cmd::append::run(args, &config).await,
        Command::Check(args) => cmd::check::run(args, &config).await,
    }
}

/// Load the config file, or the built-in default when none is given
fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("config file not found: {}", path.display());
            }
            Config::from_file(path)
                .with_context(|| format!("failed to load config from {}", path.display()))
        }
        None => Config::from_str(DEFAULT_CONFIG).context("invalid built-in config"),
    }
}

/// Resolve log level: CLI flag > config file > default "info"
fn resolve_log_level(cli_level: Option<&str>, config: &Config) -> String {
    match cli_level {
        Some(level) => level.to_string(),
        None => config.log.level.as_str().to_string(),
    }
}

/// Initialize the tracing subscriber for logging
///
/// Logs go to stderr; stdout carries command output.
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    match format {
        LogFormat::Console => tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .with(filter)
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .with(filter)
            .init(),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_config::LogLevel;

    #[test]
    fn test_cli_parses_append() {
        let cli = Cli::try_parse_from([
            "scribe",
            "--config",
            "scribe.toml",
            "append",
            "--sink",
            "events",
            "records.jsonl",
        ])
        .unwrap();

        assert_eq!(cli.config.as_deref(), Some(Path::new("scribe.toml")));
        match cli.command {
            Command::Append(args) => {
                assert_eq!(args.sink.as_deref(), Some("events"));
                assert_eq!(args.input.as_deref(), Some(Path::new("records.jsonl")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["scribe", "check", "--log-level", "debug"]).unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(matches!(cli.command, Command::Check(_)));
    }

    #[test]
    fn test_default_config() {
        let config = load_config(None).unwrap();
        assert_eq!(config.enabled_sinks(), vec!["hdfs"]);
    }

    #[test]
    fn test_missing_config_file() {
        let err = load_config(Some(Path::new("/nonexistent/scribe.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn test_resolve_log_level() {
        let mut config = Config::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(resolve_log_level(None, &config), "info");

        config.log.level = LogLevel::Warn;
        assert_eq!(resolve_log_level(None, &config), "warn");
        assert_eq!(resolve_log_level(Some("trace"), &config), "trace");
    }
}
