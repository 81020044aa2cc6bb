//! Runtime utilities that hide the underlying executor.

pub use tokio::runtime::{Builder, Handle, Runtime};

/// Runs the provided future to completion on a fresh current-thread runtime.
///
/// Used by the `#[core_async::main]` / `#[core_async::test]` expansions and by
/// callers that want the blocking, one-call-at-a-time usage model.
///
/// # Panics
///
/// Panics if the runtime cannot be constructed (for example when called from
/// inside another runtime's worker thread).
pub fn block_on<F>(future: F) -> F::Output
where
    F: std::future::Future,
{
    Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("core_async::runtime::block_on: failed to build Tokio runtime")
        .block_on(future)
}
