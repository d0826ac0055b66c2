//! Seams to the external collaborators.
//!
//! docbatch never parses, renders or recognises anything itself. A worker
//! talks to two collaborators through the traits below:
//!
//! - [`Converter`] renders a source document into the target format
//!   ([`docling::DoclingCli`] drives the `docling` command-line tool).
//! - [`OcrEngine`] extracts text from a raster image on a chosen
//!   [`OcrBackend`] ([`easyocr::EasyOcr`] drives EasyOCR through Python).
//!
//! Both are synchronous: a worker process handles one file at a time and
//! blocks on its collaborators.

pub mod docling;
pub mod easyocr;

use crate::config::OutputFormat;
use crate::error::FileError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

pub use docling::DoclingCli;
pub use easyocr::EasyOcr;

/// Execution backend of the OCR collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrBackend {
    Gpu,
    Cpu,
}

impl fmt::Display for OcrBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OcrBackend::Gpu => f.write_str("gpu"),
            OcrBackend::Cpu => f.write_str("cpu"),
        }
    }
}

/// One request to the conversion collaborator.
#[derive(Debug, Clone, Copy)]
pub struct ConvertRequest<'a> {
    pub source: &'a Path,
    pub format: OutputFormat,
    /// Backend the collaborator should run its own OCR on; `None` disables OCR.
    pub ocr_backend: Option<OcrBackend>,
}

/// Renders documents into an [`OutputFormat`].
pub trait Converter: Send {
    /// Short name used in error messages and logs.
    fn name(&self) -> &'static str;

    /// Convert `request.source` and return the rendered bytes.
    fn convert(&self, request: &ConvertRequest<'_>) -> Result<Vec<u8>, FileError>;
}

/// Text recognised in an image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OcrText {
    pub lines: Vec<String>,
}

/// Extracts text from raster images.
///
/// Implementations report an unusable backend with
/// [`FileError::OcrBackend`]; any other error is a per-file failure that
/// switching backends would not fix.
pub trait OcrEngine: Send {
    fn name(&self) -> &'static str;

    fn recognize(&mut self, image: &Path, backend: OcrBackend) -> Result<OcrText, FileError>;
}
