//! # Host Bridge Traits
//!
//! Capabilities the drive service needs from its host, expressed as traits.
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - one request/response round-trip, with
//!   a retry layer on top driven by [`RetryPolicy`](http::RetryPolicy)
//! - [`Clock`](time::Clock) - time source for credential expiry decisions
//! - [`LoggerSink`](time::LoggerSink) - forward structured logs to a host logger
//!
//! ## Implementations
//!
//! | Host    | Crate            |
//! |---------|------------------|
//! | Desktop | `bridge-desktop` |
//! | Tests   | `mockall` mocks, in-memory fakes |
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). HTTP statuses
//! are not errors at this layer: a 404 is an `Ok(HttpResponse)` and the
//! caller decides what it means.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so a single implementation can be
//! shared behind an `Arc` across tasks.

pub mod error;
pub mod http;
pub mod time;

pub use error::BridgeError;

pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use time::{Clock, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
