//! Sink utilities
//!
//! - **payload**: single-line rendering of payloads for errors and logs
//! - **rate_limited_logger**: error logging that does not flood under retries

pub mod payload;
pub mod rate_limited_logger;

pub use payload::{escape_payload, render_payloads};
pub use rate_limited_logger::{DEFAULT_LOG_INTERVAL, MAX_DATA_LOG_LENGTH, RateLimitedLogger};
