//! Configuration error types

use std::io;
use thiserror::Error;

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur when loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("failed to read config file '{path}': {source}")]
    IoError {
        /// Path to the file
        path: String,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// A sink references a connection that is neither declared nor built in
    #[error("sink '{sink}' references unknown connection '{connection}'")]
    UnknownConnection {
        /// Name of the sink holding the reference
        sink: String,
        /// Name of the missing connection
        connection: String,
    },

    /// Validation error - required field missing
    #[error("{component} '{name}' is missing required field '{field}'")]
    MissingField {
        /// Component type (e.g., "sink", "connection")
        component: &'static str,
        /// Name of the component
        name: String,
        /// Missing field name
        field: &'static str,
    },

    /// Validation error - invalid value
    #[error("{component} '{name}' has invalid {field}: {message}")]
    InvalidValue {
        /// Component type
        component: &'static str,
        /// Name of the component
        name: String,
        /// Field name
        field: &'static str,
        /// Error message
        message: String,
    },

    /// No sinks enabled
    #[error("no sinks are enabled - at least one sink must be enabled")]
    NoSinksEnabled,
}

impl ConfigError {
    /// Create an UnknownConnection error
    pub fn unknown_connection(sink: impl Into<String>, connection: impl Into<String>) -> Self {
        Self::UnknownConnection {
            sink: sink.into(),
            connection: connection.into(),
        }
    }

    /// Create a MissingField error
    pub fn missing_field(
        component: &'static str,
        name: impl Into<String>,
        field: &'static str,
    ) -> Self {
        Self::MissingField {
            component,
            name: name.into(),
            field,
        }
    }

    /// Create an InvalidValue error
    pub fn invalid_value(
        component: &'static str,
        name: impl Into<String>,
        field: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            component,
            name: name.into(),
            field,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_connection_error() {
        let err = ConfigError::unknown_connection("hdfs", "prod_cluster");
        assert!(err.to_string().contains("hdfs"));
        assert!(err.to_string().contains("prod_cluster"));
        assert!(err.to_string().contains("unknown connection"));
    }

    #[test]
    fn test_missing_field_error() {
        let err = ConfigError::missing_field("connection", "scratch", "root");
        assert!(err.to_string().contains("connection"));
        assert!(err.to_string().contains("scratch"));
        assert!(err.to_string().contains("root"));
    }

    #[test]
    fn test_invalid_value_error() {
        let err = ConfigError::invalid_value("sink", "hdfs", "max_write_errors", "must be > 0");
        assert!(err.to_string().contains("hdfs"));
        assert!(err.to_string().contains("max_write_errors"));
        assert!(err.to_string().contains("must be > 0"));
    }

    #[test]
    fn test_no_sinks_enabled() {
        let err = ConfigError::NoSinksEnabled;
        assert!(err.to_string().contains("no sinks"));
    }
}
