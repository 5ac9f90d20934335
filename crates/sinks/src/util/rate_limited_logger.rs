//! Rate-limited error logging
//!
//! A destination that keeps failing is retried by the scheduler in a loop,
//! and every attempt fails the same way. This logger emits at most one line
//! per interval and reports how many errors were suppressed since the last
//! line.
//!
//! # Example
//!
//! ```ignore
//! use scribe_sinks::util::RateLimitedLogger;
//! use std::time::Duration;
//!
//! let logger = RateLimitedLogger::new(Duration::from_secs(10));
//!
//! // Logs once, counts the other 999
//! for _ in 0..1000 {
//!     logger.error("/logs/a.log", "append failed", &err);
//! }
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::payload::escape_payload;

/// Default interval between log lines (10 seconds)
pub const DEFAULT_LOG_INTERVAL: Duration = Duration::from_secs(10);

/// Maximum payload bytes attached to a log line
pub const MAX_DATA_LOG_LENGTH: usize = 256;

/// Interval state for one destination
#[derive(Debug, Default)]
struct DestinationWindow {
    last_log_time: Option<Instant>,

    /// Errors since the last emitted line
    error_count: u64,
}

/// Logger that emits at most one error line per interval and destination
///
/// A failing destination never silences another one. The total counter is
/// shared.
#[derive(Debug)]
pub struct RateLimitedLogger {
    min_interval: Duration,
    windows: Mutex<HashMap<String, DestinationWindow>>,
    total_errors: AtomicU64,
}

impl RateLimitedLogger {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            windows: Mutex::new(HashMap::new()),
            total_errors: AtomicU64::new(0),
        }
    }

    /// Create a logger with the default interval (10 seconds)
    pub fn default_interval() -> Self {
        Self::new(DEFAULT_LOG_INTERVAL)
    }

    /// Record an error on a destination and log it if its interval elapsed
    ///
    /// Returns true if a line was emitted.
    pub fn error(&self, destination: &str, message: &str, error: &dyn std::fmt::Display) -> bool {
        let Some((suppressed, total)) = self.tick(destination) else {
            return false;
        };

        tracing::error!(
            destination = %destination,
            error = %error,
            suppressed_count = suppressed,
            total_errors = total,
            "{message}"
        );
        true
    }

    /// Like [`error`](Self::error), attaching the payload
    ///
    /// The payload is escaped and cut to [`MAX_DATA_LOG_LENGTH`] bytes.
    pub fn error_with_data(
        &self,
        destination: &str,
        message: &str,
        error: &dyn std::fmt::Display,
        data: &[u8],
    ) -> bool {
        let Some((suppressed, total)) = self.tick(destination) else {
            return false;
        };

        let data = truncate_for_log(data);
        tracing::error!(
            destination = %destination,
            error = %error,
            data = %data,
            suppressed_count = suppressed,
            total_errors = total,
            "{message}"
        );
        true
    }

    /// Count one error; `Some((suppressed, total))` when it should be logged
    fn tick(&self, destination: &str) -> Option<(u64, u64)> {
        let total = self.total_errors.fetch_add(1, Ordering::Relaxed) + 1;

        let mut windows = self.windows.lock();
        let window = windows.entry(destination.to_string()).or_default();
        window.error_count += 1;

        let now = Instant::now();
        if let Some(last) = window.last_log_time
            && now.duration_since(last) < self.min_interval
        {
            return None;
        }

        window.last_log_time = Some(now);
        let count = std::mem::take(&mut window.error_count);
        Some((count.saturating_sub(1), total))
    }

    /// Errors recorded on a destination since its last emitted line
    pub fn pending_error_count(&self, destination: &str) -> u64 {
        self.windows
            .lock()
            .get(destination)
            .map_or(0, |window| window.error_count)
    }

    pub fn total_error_count(&self) -> u64 {
        self.total_errors.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.total_errors.store(0, Ordering::Relaxed);
        self.windows.lock().clear();
    }
}

impl Default for RateLimitedLogger {
    fn default() -> Self {
        Self::default_interval()
    }
}

/// Escape a payload for a log line, cutting it to [`MAX_DATA_LOG_LENGTH`]
///
/// Text is cut on a character boundary so it stays text.
fn truncate_for_log(data: &[u8]) -> String {
    if data.len() <= MAX_DATA_LOG_LENGTH {
        return escape_payload(data);
    }

    let mut cut = MAX_DATA_LOG_LENGTH;
    if std::str::from_utf8(data).is_ok() {
        while cut > 0 && is_utf8_continuation(data[cut]) {
            cut -= 1;
        }
    }

    format!(
        "{}... (truncated from {} bytes)",
        escape_payload(&data[..cut]),
        data.len()
    )
}

fn is_utf8_continuation(byte: u8) -> bool {
    byte & 0b1100_0000 == 0b1000_0000
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_rate_limited_logger_new() {
        let logger = RateLimitedLogger::new(Duration::from_secs(5));
        assert_eq!(logger.pending_error_count("/a.log"), 0);
        assert_eq!(logger.total_error_count(), 0);
    }

    #[test]
    fn test_rate_limited_logger_default() {
        let logger = RateLimitedLogger::default();
        assert_eq!(logger.min_interval, DEFAULT_LOG_INTERVAL);
    }

    #[test]
    fn test_first_error_always_logs() {
        let logger = RateLimitedLogger::new(Duration::from_secs(10));
        let error = io::Error::other("replica gone");

        assert!(logger.error("/a.log", "append failed", &error));
        assert_eq!(logger.total_error_count(), 1);
        assert_eq!(logger.pending_error_count("/a.log"), 0);
    }

    #[test]
    fn test_rapid_errors_suppressed() {
        let logger = RateLimitedLogger::new(Duration::from_secs(10));
        let error = io::Error::other("replica gone");

        assert!(logger.error("/a.log", "append failed", &error));
        for _ in 0..10 {
            assert!(!logger.error("/a.log", "append failed", &error));
        }

        assert_eq!(logger.total_error_count(), 11);
        assert_eq!(logger.pending_error_count("/a.log"), 10);
    }

    #[test]
    fn test_destinations_limited_independently() {
        let logger = RateLimitedLogger::new(Duration::from_secs(10));
        let error = io::Error::other("replica gone");

        assert!(logger.error("/a.log", "append failed", &error));
        assert!(!logger.error("/a.log", "append failed", &error));
        assert!(!logger.error("/a.log", "append failed", &error));

        // A storm on /a.log does not hide the first failure on /b.log
        assert!(logger.error("/b.log", "create failed", &error));
        assert!(!logger.error("/b.log", "create failed", &error));

        assert_eq!(logger.pending_error_count("/a.log"), 2);
        assert_eq!(logger.pending_error_count("/b.log"), 1);
        assert_eq!(logger.total_error_count(), 5);
    }

    #[test]
    fn test_suppressed_count_is_per_destination() {
        let logger = RateLimitedLogger::new(Duration::from_secs(10));
        let error = io::Error::other("boom");

        logger.error("/a.log", "append failed", &error);
        for _ in 0..3 {
            logger.error("/a.log", "append failed", &error);
        }

        assert_eq!(logger.tick("/b.log"), Some((0, 5)));
        assert_eq!(logger.tick("/b.log"), None);
    }

    #[test]
    fn test_logs_again_after_interval() {
        let logger = RateLimitedLogger::new(Duration::ZERO);
        let error = io::Error::other("boom");

        assert!(logger.error("/a.log", "append failed", &error));
        assert!(logger.error("/b.log", "append failed", &error));
        assert_eq!(logger.total_error_count(), 2);
    }

    #[test]
    fn test_reset() {
        let logger = RateLimitedLogger::new(Duration::from_secs(10));
        let error = io::Error::other("boom");

        logger.error("/a.log", "append failed", &error);
        logger.reset();
        assert_eq!(logger.total_error_count(), 0);
        assert_eq!(logger.pending_error_count("/a.log"), 0);

        // Reset clears the interval too
        assert!(logger.error("/a.log", "append failed", &error));
    }

    #[test]
    fn test_error_with_data_truncation() {
        let long_data = vec![b'x'; MAX_DATA_LOG_LENGTH + 100];
        let rendered = truncate_for_log(&long_data);
        assert!(rendered.starts_with(&"x".repeat(MAX_DATA_LOG_LENGTH)));
        assert!(rendered.ends_with(&format!("(truncated from {} bytes)", long_data.len())));

        let logger = RateLimitedLogger::new(Duration::from_secs(10));
        let error = io::Error::other("boom");
        assert!(logger.error_with_data("/a.log", "append failed", &error, &long_data));
    }

    #[test]
    fn test_truncation_keeps_multibyte_text_readable() {
        let mut data = "x".repeat(MAX_DATA_LOG_LENGTH - 1);
        data.push_str(&"é".repeat(10));

        let rendered = truncate_for_log(data.as_bytes());
        assert!(rendered.starts_with(&"x".repeat(MAX_DATA_LOG_LENGTH - 1)));
        assert!(!rendered.starts_with("0x"));
        assert!(rendered.ends_with(&format!("(truncated from {} bytes)", data.len())));
    }

    #[test]
    fn test_truncated_binary_stays_hex() {
        let data = vec![0xff; MAX_DATA_LOG_LENGTH + 10];
        let rendered = truncate_for_log(&data);
        assert!(rendered.starts_with("0xffff"));
        assert!(rendered.ends_with(&format!("(truncated from {} bytes)", data.len())));
    }

    #[test]
    fn test_short_data_is_escaped_not_truncated() {
        assert_eq!(truncate_for_log(b"a\nb"), "a\\nb");
    }
}
