//! Progress-callback trait for per-file batch events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::RunConfigBuilder::progress_callback`] to receive events
//! as the dispatcher hands files to worker processes and collects results.
//!
//! # Example
//!
//! ```rust
//! use docbatch::{ConversionProgressCallback, ConversionResult, RunConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_file_complete(&self, _index: usize, total: usize, result: &ConversionResult) {
//!         let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{done}/{total}: {}", result.source_path.display());
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//!
//! let config = RunConfig::builder("docs")
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::ConversionResult;
use std::path::Path;
use std::sync::Arc;

/// Called by the dispatcher as the batch progresses.
///
/// Implementations must be `Send + Sync`: every worker lane runs as its own
/// tokio task, so `on_file_start` and `on_file_complete` may be called
/// concurrently. All methods default to no-ops.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once after enumeration, before any file is dispatched.
    fn on_run_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called when a file is handed to a worker process.
    ///
    /// # Arguments
    /// * `index`  — 0-based submission index
    /// * `total`  — number of files in the run
    /// * `source` — the file being converted
    fn on_file_start(&self, index: usize, total: usize, source: &Path) {
        let _ = (index, total, source);
    }

    /// Called when a file's result arrives, success or failure.
    fn on_file_complete(&self, index: usize, total: usize, result: &ConversionResult) {
        let _ = (index, total, result);
    }

    /// Called once after every file has a result.
    ///
    /// # Arguments
    /// * `total_files`   — files in the run
    /// * `success_count` — files converted without error
    fn on_run_complete(&self, total_files: usize, success_count: usize) {
        let _ = (total_files, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::RunConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
