//! Configuration validation
//!
//! Validates config consistency:
//! - At least one sink is enabled
//! - Every enabled sink references a declared or built-in connection
//! - Redirection and fan-out limits are positive
//! - Connections carry the fields their type needs

use crate::Config;
use crate::connections::ConnectionConfig;
use crate::error::{ConfigError, Result};

/// Validate the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_connections(config)?;
    validate_sinks(config)?;
    Ok(())
}

/// Validate connection configurations
fn validate_connections(config: &Config) -> Result<()> {
    for (name, conn) in config.connections.iter() {
        match conn {
            ConnectionConfig::WebHdfs(web) => {
                if web.url.is_empty() {
                    return Err(ConfigError::missing_field("connection", name, "url"));
                }
                if !web.url.starts_with("http://") && !web.url.starts_with("https://") {
                    return Err(ConfigError::invalid_value(
                        "connection",
                        name,
                        "url",
                        format!("expected http:// or https:// address, got '{}'", web.url),
                    ));
                }
                if web.timeout.is_zero() {
                    return Err(ConfigError::invalid_value(
                        "connection",
                        name,
                        "timeout",
                        "must be greater than zero",
                    ));
                }
            }
            ConnectionConfig::Local(local) => {
                if local.root.as_os_str().is_empty() {
                    return Err(ConfigError::missing_field("connection", name, "root"));
                }
            }
            ConnectionConfig::Memory => {}
        }
    }

    Ok(())
}

/// Validate sink configurations
fn validate_sinks(config: &Config) -> Result<()> {
    let mut enabled = 0usize;

    for (name, sink) in config.sinks.iter() {
        if !sink.enabled {
            continue;
        }
        enabled += 1;

        if !config.connections.contains(&sink.connection) {
            return Err(ConfigError::unknown_connection(name, &sink.connection));
        }

        if sink.max_write_errors == 0 {
            return Err(ConfigError::invalid_value(
                "sink",
                name,
                "max_write_errors",
                "must be greater than zero",
            ));
        }

        if sink.max_concurrent_destinations == Some(0) {
            return Err(ConfigError::invalid_value(
                "sink",
                name,
                "max_concurrent_destinations",
                "must be greater than zero when set",
            ));
        }
    }

    if enabled == 0 {
        return Err(ConfigError::NoSinksEnabled);
    }

    Ok(())
}
