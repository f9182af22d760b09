//! Bounded worker pool shared by every concurrent per-candidate step.
//!
//! Results come back in completion order as `(input index, result)` pairs.
//! A panicking task becomes that task's error. Tasks not yet started when the
//! cancel token fires resolve to [`MinerError::Cancelled`]; running tasks are
//! left to finish.

use std::panic::{self, AssertUnwindSafe};

use crossbeam_channel::unbounded;
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::error::{MinerError, Result};

/// Run `task` over every item on at most `workers` threads.
///
/// Blocks until every item has a result. The returned vector has exactly one
/// entry per input index, ordered by completion.
pub fn map_concurrent<I, T, F>(
    items: &[I],
    workers: usize,
    cancel: &CancelToken,
    task: F,
) -> Result<Vec<(usize, Result<T>)>>
where
    I: Sync,
    T: Send,
    F: Fn(usize, &I) -> Result<T> + Sync,
{
    if items.is_empty() {
        return Ok(Vec::new());
    }
    let width = workers.clamp(1, items.len());
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(width)
        .thread_name(|i| format!("asset-miner-worker-{i}"))
        .build()
        .map_err(|e| MinerError::WorkerPool(format!("failed to build worker pool: {e}")))?;
    debug!(workers = width, tasks = items.len(), "Starting worker pool");

    let (sender, receiver) = unbounded();
    let task = &task;
    pool.scope(|scope| {
        for (index, item) in items.iter().enumerate() {
            let sender = sender.clone();
            scope.spawn(move |_| {
                let result = if cancel.is_cancelled() {
                    Err(MinerError::Cancelled)
                } else {
                    run_guarded(|| task(index, item))
                };
                // The receiver outlives the scope.
                let _ = sender.send((index, result));
            });
        }
    });
    drop(sender);

    let results: Vec<(usize, Result<T>)> = receiver.iter().collect();
    if results.len() != items.len() {
        return Err(MinerError::WorkerPool(format!(
            "expected {} results, collected {}",
            items.len(),
            results.len()
        )));
    }
    Ok(results)
}

fn run_guarded<T>(f: impl FnOnce() -> Result<T>) -> Result<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_to_string(&payload);
            warn!(panic = %message, "Worker task panicked");
            Err(MinerError::WorkerPool(format!("task panicked: {message}")))
        }
    }
}

fn panic_to_string(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
