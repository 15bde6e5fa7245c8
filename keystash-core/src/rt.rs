//! Adapters for callers that cannot be async.

use once_cell::sync::Lazy;
use std::future::Future;
use tokio::runtime::{self, Handle, Runtime};
use tokio::task::JoinHandle;

static RUNTIME: Lazy<Option<Runtime>> = Lazy::new(|| {
    runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("keystash-rt")
        .build()
        .map_err(|err| tracing::error!(error = %err, "failed to build keystash runtime"))
        .ok()
});

/// Run a future to completion from synchronous code without nesting runtimes.
///
/// Inside a multi-threaded tokio runtime the current worker is handed off
/// while blocking; elsewhere the shared keystash runtime drives the future.
///
/// # Panics
///
/// When called from a current-thread runtime, or when no runtime can be built.
pub fn sync_await<F>(fut: F) -> F::Output
where
    F: Future,
{
    if let Ok(handle) = Handle::try_current() {
        return tokio::task::block_in_place(|| handle.block_on(fut));
    }
    match RUNTIME.as_ref() {
        Some(rt) => rt.block_on(fut),
        None => panic!("keystash runtime is unavailable"),
    }
}

/// Spawn `fut` and hand its output to `callback` once it completes.
///
/// Uses the ambient runtime when there is one, the shared keystash runtime
/// otherwise. Returns `None` only when neither is available.
pub fn with_callback<F, C>(fut: F, callback: C) -> Option<JoinHandle<()>>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
    C: FnOnce(F::Output) + Send + 'static,
{
    let task = async move { callback(fut.await) };
    if let Ok(handle) = Handle::try_current() {
        return Some(handle.spawn(task));
    }
    RUNTIME.as_ref().map(|rt| rt.spawn(task))
}
