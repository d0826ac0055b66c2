//! Error types for the docbatch library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`BatchError`] — **Fatal**: the run cannot start or cannot be reported
//!   (target missing, invalid configuration, summary file unwritable).
//!   Returned as `Err(BatchError)` from the top-level `run_*` functions.
//!
//! * [`FileError`] — **Non-fatal**: a single file failed (unsupported
//!   format, corrupt input, collaborator failure, unwritable output). It
//!   never leaves the worker boundary as an error; it is rendered into the
//!   `error_message` of a failed [`crate::output::ConversionResult`] so the
//!   rest of the batch keeps going.

use crate::backend::OcrBackend;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the docbatch library.
#[derive(Debug, Error)]
pub enum BatchError {
    /// The file or directory to convert does not exist.
    #[error("File or folder does not exist: '{path}'")]
    NotFound { path: PathBuf },

    /// Builder or prompt validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The CSV run summary could not be written.
    #[error("Failed to write run summary '{path}': {source}")]
    SummaryWrite {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Filesystem error outside of any single file's conversion.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single input file.
#[derive(Debug, Error)]
pub enum FileError {
    /// The extension is not one the conversion collaborator accepts.
    #[error("Unsupported format '{extension}' for '{path}'")]
    UnsupportedFormat { path: PathBuf, extension: String },

    /// The file claims a format but its contents do not match.
    #[error("Corrupt input '{path}': {detail}")]
    CorruptInput { path: PathBuf, detail: String },

    /// The conversion collaborator failed.
    #[error("{collaborator} failed on '{path}': {detail}")]
    Conversion {
        path: PathBuf,
        collaborator: String,
        detail: String,
    },

    /// An OCR backend could not run. GPU failures are recovered by the
    /// worker's CPU fallback; this only surfaces when the CPU backend fails too.
    #[error("OCR backend '{backend}' unavailable: {detail}")]
    OcrBackend { backend: OcrBackend, detail: String },

    /// Creating the output directory or writing the output file failed.
    #[error("Failed to write output '{path}': {source}")]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The source path does not live under its job's input root.
    #[error("'{path}' is not inside input root '{root}'")]
    OutsideInputRoot { path: PathBuf, root: PathBuf },

    /// The worker process handling this file died or broke protocol.
    #[error("Worker process failed: {detail}")]
    WorkerCrashed { detail: String },
}
