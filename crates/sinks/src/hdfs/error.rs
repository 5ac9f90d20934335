//! Append orchestrator errors
//!
//! Every variant names the destination it happened on. A batch reports only
//! the first failing destination; sibling outcomes are not aggregated.

use super::client::StorageError;

/// Errors from the HDFS append sink
#[derive(Debug, thiserror::Error)]
pub enum AppendError {
    /// Parent directory or empty file could not be created
    #[error("failed to create {destination}: {source}")]
    CreateFailed {
        destination: String,
        #[source]
        source: StorageError,
    },

    /// Append hit a corrupted or relocated replica; retries go to `redirected_to`
    #[error("corrupt replica on {destination}, redirected to {redirected_to}: {source}")]
    CorruptReplica {
        destination: String,
        redirected_to: String,
        #[source]
        source: StorageError,
    },

    /// Any other append failure
    ///
    /// `data` holds the rendered payload batch when `log_data_on_error` is on.
    #[error("failed to append to {destination}: {source}{}", render_data(.data))]
    AppendFailed {
        destination: String,
        #[source]
        source: StorageError,
        data: Option<String>,
    },

    /// The destination used up its redirection budget
    #[error("destination {destination} exceeded redirect limit ({generation} >= {max})")]
    RedirectLimitExceeded {
        destination: String,
        generation: u32,
        max: u32,
    },

    /// A destination pipeline panicked or was aborted
    #[error("append task for {destination} failed: {message}")]
    TaskFailed {
        destination: String,
        message: String,
    },
}

fn render_data(data: &Option<String>) -> String {
    match data {
        Some(data) => format!(" (data: {data})"),
        None => String::new(),
    }
}

/// Discriminant of [`AppendError`], for metrics and matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppendErrorKind {
    CreateFailed,
    CorruptReplica,
    AppendFailed,
    RedirectLimitExceeded,
    TaskFailed,
}

impl AppendErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateFailed => "create_failed",
            Self::CorruptReplica => "corrupt_replica",
            Self::AppendFailed => "append_failed",
            Self::RedirectLimitExceeded => "redirect_limit_exceeded",
            Self::TaskFailed => "task_failed",
        }
    }
}

impl std::fmt::Display for AppendErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AppendError {
    pub fn kind(&self) -> AppendErrorKind {
        match self {
            Self::CreateFailed { .. } => AppendErrorKind::CreateFailed,
            Self::CorruptReplica { .. } => AppendErrorKind::CorruptReplica,
            Self::AppendFailed { .. } => AppendErrorKind::AppendFailed,
            Self::RedirectLimitExceeded { .. } => AppendErrorKind::RedirectLimitExceeded,
            Self::TaskFailed { .. } => AppendErrorKind::TaskFailed,
        }
    }

    /// Destination the failure happened on
    pub fn destination(&self) -> &str {
        match self {
            Self::CreateFailed { destination, .. }
            | Self::CorruptReplica { destination, .. }
            | Self::AppendFailed { destination, .. }
            | Self::RedirectLimitExceeded { destination, .. }
            | Self::TaskFailed { destination, .. } => destination,
        }
    }

    /// Whether re-submitting the same batch can succeed
    ///
    /// Only an exhausted redirection budget is permanent; it needs an
    /// operator to clear the destination.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::RedirectLimitExceeded { .. })
    }
}
