//! Streaming batch API: emit results as worker processes finish them.
//!
//! ## Why stream?
//!
//! Large batches take hours. A stream lets callers show partial results,
//! drive their own progress display, or feed finished files to the next
//! step of a pipeline without waiting for the slowest document.
//!
//! Unlike the eager [`crate::convert::run_batch`], [`run_stream`] neither
//! writes the CSV summary nor computes a run status; results arrive in
//! completion order, tagged with their submission index (sort by
//! `index` if order matters). A configured progress callback still sees
//! `on_run_complete` once the stream is drained.

use crate::config::RunConfig;
use crate::error::BatchError;
use crate::pipeline::dispatch::{ParallelDispatcher, ResultStream};
use crate::pipeline::enumerate::JobEnumerator;
use crate::progress::ProgressCallback;
use futures::{future, stream, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::info;

/// A running batch.
pub struct BatchStream {
    /// Number of jobs; the stream yields exactly this many results.
    pub total: usize,
    pub results: ResultStream,
}

/// Enumerate `config.target` and start converting, streaming results.
///
/// # Returns
/// - `Ok(BatchStream)` — jobs are already running on worker processes
/// - `Err(BatchError)` — fatal error (target missing, worker command unresolvable)
///
/// # Example
/// ```rust,no_run
/// use docbatch::{run_stream, RunConfig};
/// use futures::StreamExt;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     if std::env::args().any(|a| a == "--worker") {
///         docbatch::run_worker()?;
///         return Ok(());
///     }
///     tokio::runtime::Runtime::new()?.block_on(print_progress())
/// }
///
/// async fn print_progress() -> Result<(), Box<dyn std::error::Error>> {
///     let config = RunConfig::builder("docs").build()?;
///     let mut batch = run_stream(&config).await?;
///     while let Some(done) = batch.results.next().await {
///         println!("[{}/{}] {} {}", done.index + 1, batch.total,
///             done.result.status, done.result.source_path.display());
///     }
///     Ok(())
/// }
/// ```
pub async fn run_stream(config: &RunConfig) -> Result<BatchStream, BatchError> {
    info!("Starting streaming batch: {}", config.target.display());

    let jobs = JobEnumerator::new(config).jobs()?;
    let total = jobs.len();
    let dispatcher = ParallelDispatcher::new(config)?;

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(total);
    }
    let results = dispatcher.stream(jobs);
    let results = match config.progress_callback.clone() {
        Some(cb) => report_completion(results, total, cb),
        None => results,
    };

    Ok(BatchStream { total, results })
}

/// Pass results through and fire `on_run_complete` after the last one.
fn report_completion(results: ResultStream, total: usize, cb: ProgressCallback) -> ResultStream {
    let succeeded = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&succeeded);
    let tail = stream::once(async move {
        cb.on_run_complete(total, succeeded.load(Ordering::Relaxed));
        None
    })
    .filter_map(future::ready);

    Box::pin(
        results
            .inspect(move |done| {
                if done.result.is_success() {
                    counter.fetch_add(1, Ordering::Relaxed);
                }
            })
            .chain(tail),
    )
}
