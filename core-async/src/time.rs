//! Time-related operations.
//!
//! `timeout` bounds the consent flow; `sleep` drives retry backoff.

pub use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
pub use tokio::time::{error::Elapsed, sleep, timeout, Sleep, Timeout};
