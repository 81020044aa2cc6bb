//! Async facade for the drive service crates.
//!
//! Every other crate in the workspace reaches Tokio through this crate rather
//! than depending on it directly, so the executor is chosen in one place.
//!
//! # Modules
//!
//! - `fs`: async filesystem calls (token file, staging copies)
//! - `io`: async read/write extension traits
//! - `net`: TCP listener/stream for the loopback consent redirect
//! - `runtime`: `block_on` for synchronous callers
//! - `sync`: locks, channels and `CancellationToken`
//! - `task`: task spawning
//! - `time`: sleep, timeout, durations
//!
//! # Examples
//!
//! ```rust
//! use core_async::time::{timeout, Duration};
//!
//! # async fn example() {
//! let value = timeout(Duration::from_secs(1), async { 42 }).await;
//! assert_eq!(value.ok(), Some(42));
//! # }
//! ```

// Entry-point/test macros so downstream crates never need a direct Tokio
// dependency for `#[tokio::main]` / `#[tokio::test]`.
pub use core_async_macros::{main, test};

pub mod fs;
pub mod io;
pub mod net;
pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

pub use task::spawn;
pub use time::{sleep, Duration, Instant};

/// Wait on several futures, resolving with the first to complete.
pub use tokio::select;
