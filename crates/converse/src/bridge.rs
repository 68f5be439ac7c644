//! Runs async work to completion behind a synchronous call.
//!
//! The host calls the handler synchronously and expects exactly one return value,
//! while the upstream stream is consumed one awaited event at a time. Each call to
//! [`run_to_completion`] gets its own worker thread and its own single-threaded
//! runtime; both are torn down before the call returns, whatever the outcome.
use std::future::Future;
use std::thread;
use tracing::error;

use crate::errors::{BridgeError, BridgeResult};

const WORKER_NAME: &str = "converse-invocation";

/// Drive the future produced by `task` to completion and return its output.
///
/// The future is built and polled on a scoped worker thread, so it does not need to
/// be `Send`, and the caller may itself be inside an async runtime. Timers and I/O
/// spawned by the future live on the worker's runtime and are dropped with it; none
/// of them is visible to another invocation. A panic in the worker becomes
/// [`BridgeError::Internal`].
pub fn run_to_completion<F, Fut, T>(task: F) -> BridgeResult<T>
where
    F: FnOnce() -> Fut + Send,
    Fut: Future<Output = BridgeResult<T>>,
    T: Send,
{
    thread::scope(|scope| {
        let worker = thread::Builder::new()
            .name(WORKER_NAME.to_string())
            .spawn_scoped(scope, move || {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .map_err(|e| BridgeError::Internal(format!("failed to start runtime: {}", e)))?;
                let result = runtime.block_on(task());
                drop(runtime);
                result
            })
            .map_err(|e| BridgeError::Internal(format!("failed to spawn worker: {}", e)))?;

        worker.join().unwrap_or_else(|_| {
            error!("Invocation worker panicked");
            Err(BridgeError::Internal("invocation worker panicked".to_string()))
        })
    })
}
