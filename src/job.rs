//! The unit of work handed to a worker process.

use crate::config::OutputFormat;
use crate::pipeline::protocol::raw_path;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One file to convert.
///
/// Created by [`crate::pipeline::enumerate::JobEnumerator`], consumed once by
/// a [`crate::pipeline::worker::ConversionWorker`]. Every setting a worker
/// needs for this file travels with the job; nothing is read from globals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionJob {
    /// Absolute path of the file to convert.
    #[serde(with = "raw_path")]
    pub source_path: PathBuf,
    /// Absolute root the mirrored output path is computed relative to.
    #[serde(with = "raw_path")]
    pub input_root: PathBuf,
    /// Format to render.
    pub target_format: OutputFormat,
    /// Run OCR on eligible images.
    pub ocr_enabled: bool,
}
