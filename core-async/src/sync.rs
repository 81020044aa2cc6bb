//! Synchronization primitives.
//!
//! Async-aware locks and channels from `tokio::sync`, plus the cancellation
//! token callers hand to the interactive consent flow.
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::{CancellationToken, Mutex};
//!
//! # async fn example() {
//! let guard = Mutex::new(0u32);
//! *guard.lock().await += 1;
//!
//! let token = CancellationToken::new();
//! token.cancel();
//! assert!(token.is_cancelled());
//! # }
//! ```

pub use tokio::sync::{mpsc, oneshot, Mutex, MutexGuard, Notify, OnceCell, RwLock};
pub use tokio_util::sync::CancellationToken;
