//! Result types produced by workers and aggregated by the reporter.

use crate::backend::OcrBackend;
use crate::job::ConversionJob;
use crate::pipeline::protocol::raw_path;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Exit code for fatal errors (missing target, bad configuration, unwritable summary).
pub const FATAL_EXIT_CODE: u8 = 1;

/// Outcome of one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionStatus {
    Success,
    Failure,
}

impl fmt::Display for ConversionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionStatus::Success => f.write_str("success"),
            ConversionStatus::Failure => f.write_str("failure"),
        }
    }
}

/// What the OCR collaborator did for an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrSummary {
    /// Backend that produced the text.
    pub backend: OcrBackend,
    /// Number of text lines detected.
    pub lines: usize,
}

/// Result of converting one [`ConversionJob`].
///
/// Exactly one is produced per job, by the worker on any outcome or by the
/// dispatcher when the worker process itself failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    #[serde(with = "raw_path")]
    pub source_path: PathBuf,
    /// Written file; `None` on failure.
    #[serde(default, with = "raw_path::option")]
    pub output_path: Option<PathBuf>,
    pub status: ConversionStatus,
    /// Cause of the failure; `None` on success.
    pub error_message: Option<String>,
    /// When the result was produced.
    pub timestamp: DateTime<Utc>,
    /// Present when the OCR collaborator ran.
    #[serde(default)]
    pub ocr: Option<OcrSummary>,
}

impl ConversionResult {
    pub fn success(job: &ConversionJob, output_path: PathBuf, ocr: Option<OcrSummary>) -> Self {
        Self {
            source_path: job.source_path.clone(),
            output_path: Some(output_path),
            status: ConversionStatus::Success,
            error_message: None,
            timestamp: Utc::now(),
            ocr,
        }
    }

    pub fn failure(job: &ConversionJob, message: impl Into<String>) -> Self {
        Self::failure_for(&job.source_path, message)
    }

    pub fn failure_for(source_path: &Path, message: impl Into<String>) -> Self {
        Self {
            source_path: source_path.to_path_buf(),
            output_path: None,
            status: ConversionStatus::Failure,
            error_message: Some(message.into()),
            timestamp: Utc::now(),
            ocr: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ConversionStatus::Success
    }
}

/// A result tagged with the submission index of its job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completed {
    pub index: usize,
    pub result: ConversionResult,
}

/// Overall outcome of a run, surfaced as the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every file converted (also the status of an empty run).
    Success,
    /// Some files converted, some failed.
    PartialFailure,
    /// Every file failed.
    TotalFailure,
}

impl RunStatus {
    pub fn from_counts(succeeded: usize, failed: usize) -> Self {
        match (succeeded, failed) {
            (_, 0) => RunStatus::Success,
            (0, _) => RunStatus::TotalFailure,
            _ => RunStatus::PartialFailure,
        }
    }

    /// Process exit code: 0 success, 2 partial failure, 3 total failure.
    pub fn exit_code(self) -> u8 {
        match self {
            RunStatus::Success => 0,
            RunStatus::PartialFailure => 2,
            RunStatus::TotalFailure => 3,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Success => f.write_str("success"),
            RunStatus::PartialFailure => f.write_str("partial failure"),
            RunStatus::TotalFailure => f.write_str("total failure"),
        }
    }
}

/// Everything a finished run reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// One entry per enumerated file, in the configured order.
    pub results: Vec<ConversionResult>,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed_ms: u64,
    pub status: RunStatus,
    /// Where the CSV table was written.
    #[serde(with = "raw_path")]
    pub summary_path: PathBuf,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.results.len()
    }
}
