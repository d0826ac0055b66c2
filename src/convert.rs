//! Eager (whole-run) batch entry points.
//!
//! ## Why eager vs. streaming?
//!
//! [`run_batch`] waits for every file, writes the CSV summary and returns a
//! [`RunSummary`] with the overall status. Use [`crate::stream::run_stream`]
//! when you want each result as soon as its worker finishes and will do your
//! own reporting.

use crate::config::RunConfig;
use crate::error::BatchError;
use crate::job::ConversionJob;
use crate::output::RunSummary;
use crate::pipeline::dispatch::ParallelDispatcher;
use crate::pipeline::enumerate::JobEnumerator;
use crate::pipeline::mirror::PathMirror;
use crate::pipeline::report::RunReporter;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

/// Convert every file under `config.target`.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(RunSummary)` once every file has a result, even if some or all of
/// them failed (check `summary.status`).
///
/// # Errors
/// Returns `Err(BatchError)` only for fatal errors:
/// - Target does not exist
/// - Worker command cannot be resolved
/// - Summary CSV cannot be written
pub async fn run_batch(config: &RunConfig) -> Result<RunSummary, BatchError> {
    let started = Instant::now();
    info!(
        "Starting batch conversion: {} → {} ({}, OCR {})",
        config.target.display(),
        config.output_root.display(),
        config.format,
        if config.ocr_enabled { "on" } else { "off" }
    );

    // ── Step 1: Enumerate ────────────────────────────────────────────────
    let jobs = JobEnumerator::new(config).jobs()?;
    let total = jobs.len();
    info!("Found {} file(s) to convert", total);
    warn_on_collisions(config, &jobs);

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(total);
    }

    // ── Step 2: Dispatch to worker processes ─────────────────────────────
    let completed = ParallelDispatcher::new(config)?.run(jobs).await;
    if completed.len() != total {
        return Err(BatchError::Internal(format!(
            "{} result(s) for {} job(s)",
            completed.len(),
            total
        )));
    }

    // ── Step 3: Report ───────────────────────────────────────────────────
    let summary = RunReporter::new(config).report(completed, started.elapsed())?;

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(total, summary.succeeded);
    }

    Ok(summary)
}

/// Synchronous wrapper around [`run_batch`].
///
/// Creates a temporary tokio runtime internally.
pub fn run_batch_sync(config: &RunConfig) -> Result<RunSummary, BatchError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| BatchError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(run_batch(config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Warn about jobs that would write the same output file.
///
/// `report.pdf` and `report.png` both become `report.<ext>`; writes are
/// atomic, so whichever finishes last wins.
fn warn_on_collisions(config: &RunConfig, jobs: &[ConversionJob]) {
    let mirror = PathMirror::new(&config.output_root);
    let mut seen: HashMap<PathBuf, &ConversionJob> = HashMap::new();
    for job in jobs {
        let Ok(out) = mirror.resolve(&job.input_root, &job.source_path, job.target_format) else {
            continue;
        };
        if let Some(first) = seen.insert(out.clone(), job) {
            warn!(
                "{} and {} both map to {}; the last one converted wins",
                first.source_path.display(),
                job.source_path.display(),
                out.display()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::RunStatus;

    #[tokio::test]
    async fn missing_target_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig::builder(dir.path().join("nope"))
            .output_root(dir.path().join("out"))
            .build()
            .unwrap();
        let err = run_batch(&config).await.unwrap_err();
        assert!(matches!(err, BatchError::NotFound { .. }), "got: {err:?}");
        assert!(!config.summary_path().exists());
    }

    #[tokio::test]
    async fn empty_directory_is_a_successful_empty_run() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("docs")).unwrap();
        let config = RunConfig::builder(dir.path().join("docs"))
            .output_root(dir.path().join("out"))
            .build()
            .unwrap();

        let summary = run_batch(&config).await.unwrap();
        assert_eq!(summary.total(), 0);
        assert_eq!(summary.status, RunStatus::Success);
        assert!(summary.summary_path.exists());
    }

    #[test]
    fn sync_wrapper_runs_without_a_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig::builder(dir.path())
            .output_root(dir.path().join("out"))
            .build()
            .unwrap();
        assert_eq!(run_batch_sync(&config).unwrap().total(), 0);
    }
}
