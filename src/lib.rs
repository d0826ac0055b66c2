//! # docbatch
//!
//! Batch-convert documents and images with docling and EasyOCR.
//!
//! ## Why this crate?
//!
//! The conversion frameworks are excellent at one file and awkward at ten
//! thousand: they load large models per process, hold GPU state that cannot
//! be shared, and occasionally crash on a malformed input. This crate owns
//! the batch around them. It runs every file in a pool of isolated worker
//! processes, mirrors the input tree into an output tree, and reports every
//! outcome in a CSV summary and an exit status.
//!
//! ## Pipeline Overview
//!
//! ```text
//! target (file or folder)
//!  │
//!  ├─ 1. Enumerate  ordered jobs, one per file
//!  ├─ 2. Dispatch   N worker processes, JSON lines over stdin/stdout
//!  │      └─ Worker  sniff → OCR (GPU, else CPU) → docling → atomic write
//!  └─ 3. Report     conversion_summary.csv + log lines + RunStatus
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docbatch::{run_batch_sync, run_worker, OutputFormat, RunConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Worker processes re-run this binary with `--worker`.
//!     if std::env::args().any(|a| a == "--worker") {
//!         run_worker()?;
//!         return Ok(());
//!     }
//!
//!     let config = RunConfig::builder("docs")
//!         .format(OutputFormat::Html)
//!         .ocr_enabled(true)
//!         .build()?;
//!     let summary = run_batch_sync(&config)?;
//!     eprintln!("{} ok, {} failed ({})", summary.succeeded, summary.failed, summary.status);
//!     std::process::exit(summary.status.exit_code().into());
//! }
//! ```
//!
//! Worker processes are started by re-executing the current binary with
//! `--worker`, so that branch must come first in `main`. Alternatively set
//! [`RunConfigBuilder::worker_command`] to a `docbatch --worker` invocation.
//! A worker process that starts a batch of its own is refused with
//! [`BatchError::InvalidConfig`].
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docbatch` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! docbatch = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod config;
pub mod convert;
pub mod error;
pub mod job;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::{Converter, OcrBackend, OcrEngine};
pub use config::{
    CollaboratorSettings, OutputFormat, ResultOrder, RunConfig, RunConfigBuilder, WorkerCommand,
};
pub use convert::{run_batch, run_batch_sync};
pub use error::{BatchError, FileError};
pub use job::ConversionJob;
pub use output::{
    Completed, ConversionResult, ConversionStatus, OcrSummary, RunStatus, RunSummary,
    FATAL_EXIT_CODE,
};
pub use pipeline::worker::serve_stdio as run_worker;
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{run_stream, BatchStream};
