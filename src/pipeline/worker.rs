//! The worker side: convert one job at a time, inside a worker process.
//!
//! ## Why a process-local OCR session?
//!
//! Probing for a GPU that is not there costs a failed OCR run per image.
//! Each worker process therefore owns exactly one [`OcrSession`], which
//! decides the backend on the first image it sees and remembers a
//! GPU → CPU demotion for every later image. Only that decision is per
//! process: the [`EasyOcr`] engine starts a fresh interpreter, and loads
//! its models, for each image.
//!
//! [`ConversionWorker::convert`] never fails: every outcome, panics
//! included, becomes exactly one [`ConversionResult`].

use crate::backend::{
    ConvertRequest, Converter, DoclingCli, EasyOcr, OcrBackend, OcrEngine, OcrText,
};
use crate::error::FileError;
use crate::job::ConversionJob;
use crate::output::{ConversionResult, OcrSummary};
use crate::pipeline::mirror::PathMirror;
use crate::pipeline::protocol::{self, JobEnvelope, ResultEnvelope, WorkerSettings};
use crate::pipeline::sniff;
use std::any::Any;
use std::io::{self, BufRead, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

// ── OCR session ──────────────────────────────────────────────────────────

/// Per-process OCR backend state.
pub struct OcrSession {
    engine: Box<dyn OcrEngine>,
    prefer_gpu: bool,
    demoted: bool,
}

impl OcrSession {
    pub fn new(engine: Box<dyn OcrEngine>, prefer_gpu: bool) -> Self {
        Self {
            engine,
            prefer_gpu,
            demoted: false,
        }
    }

    /// Backend the next image will be recognised on.
    pub fn backend(&self) -> OcrBackend {
        if self.prefer_gpu && !self.demoted {
            OcrBackend::Gpu
        } else {
            OcrBackend::Cpu
        }
    }

    /// Recognise `image`, demoting to CPU once if the GPU backend is unusable.
    pub fn recognize(&mut self, image: &Path) -> Result<(OcrText, OcrBackend), FileError> {
        let backend = self.backend();
        match self.engine.recognize(image, backend) {
            Ok(text) => Ok((text, backend)),
            Err(FileError::OcrBackend {
                backend: OcrBackend::Gpu,
                detail,
            }) => {
                warn!(
                    "{} GPU backend unavailable ({}); using CPU for the rest of this worker",
                    self.engine.name(),
                    detail
                );
                self.demoted = true;
                let text = self.engine.recognize(image, OcrBackend::Cpu)?;
                Ok((text, OcrBackend::Cpu))
            }
            Err(e) => Err(e),
        }
    }
}

// ── Worker ───────────────────────────────────────────────────────────────

pub struct ConversionWorker {
    mirror: PathMirror,
    converter: Box<dyn Converter>,
    ocr: OcrSession,
}

impl ConversionWorker {
    pub fn new(
        output_root: impl Into<PathBuf>,
        converter: Box<dyn Converter>,
        ocr: OcrSession,
    ) -> Self {
        Self {
            mirror: PathMirror::new(output_root),
            converter,
            ocr,
        }
    }

    /// Worker wired to the real collaborators.
    pub fn from_settings(settings: &WorkerSettings) -> Self {
        let c = &settings.collaborators;
        Self::new(
            settings.output_root.clone(),
            Box::new(DoclingCli::new(c.docling_program.clone())),
            OcrSession::new(
                Box::new(EasyOcr::new(c.python_program.clone(), c.ocr_languages.clone())),
                c.prefer_gpu,
            ),
        )
    }

    /// Convert `job`. Always returns exactly one result.
    pub fn convert(&mut self, job: &ConversionJob) -> ConversionResult {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.try_convert(job)));
        match outcome {
            Ok(Ok((output_path, ocr))) => {
                debug!("{} → {}", job.source_path.display(), output_path.display());
                ConversionResult::success(job, output_path, ocr)
            }
            Ok(Err(e)) => {
                debug!("{} failed: {}", job.source_path.display(), e);
                ConversionResult::failure(job, e.to_string())
            }
            Err(payload) => ConversionResult::failure(
                job,
                format!("worker panicked: {}", panic_message(payload.as_ref())),
            ),
        }
    }

    fn try_convert(
        &mut self,
        job: &ConversionJob,
    ) -> Result<(PathBuf, Option<OcrSummary>), FileError> {
        let source = job.source_path.as_path();

        // ── 1: sniff ─────────────────────────────────────────────────────
        sniff::sniff(source)?;

        // ── 2: output path ───────────────────────────────────────────────
        let output_path = self
            .mirror
            .resolve(&job.input_root, source, job.target_format)?;
        self.mirror.prepare(&output_path)?;

        // ── 3: OCR on eligible images ────────────────────────────────────
        let ocr = if job.ocr_enabled && sniff::is_ocr_eligible(source) {
            let (text, backend) = self.ocr.recognize(source)?;
            info!(
                "OCR ({backend}) found {} line(s) in {}",
                text.lines.len(),
                source.display()
            );
            Some(OcrSummary {
                backend,
                lines: text.lines.len(),
            })
        } else {
            None
        };

        // ── 4: convert ───────────────────────────────────────────────────
        let rendered = self.converter.convert(&ConvertRequest {
            source,
            format: job.target_format,
            ocr_backend: ocr.map(|o| o.backend),
        })?;

        // ── 5: write ─────────────────────────────────────────────────────
        self.mirror.write(&output_path, &rendered)?;
        Ok((output_path, ocr))
    }

    /// Answer every [`JobEnvelope`] on `reader` until EOF.
    ///
    /// Returns the number of jobs served.
    pub fn serve_jobs<R: BufRead, W: Write>(
        &mut self,
        reader: &mut R,
        writer: &mut W,
    ) -> io::Result<usize> {
        let mut served = 0;
        while let Some(JobEnvelope { index, job }) = protocol::read_message(reader)? {
            let result = self.convert(&job);
            protocol::write_message(writer, &ResultEnvelope { index, result })?;
            served += 1;
        }
        Ok(served)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run the worker protocol: read [`WorkerSettings`], then serve jobs.
pub fn serve<R: BufRead, W: Write>(reader: &mut R, writer: &mut W) -> io::Result<usize> {
    let settings: WorkerSettings = protocol::read_message(reader)?.ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "stdin closed before worker settings arrived",
        )
    })?;
    ConversionWorker::from_settings(&settings).serve_jobs(reader, writer)
}

/// [`serve`] on the process's stdin and stdout.
pub fn serve_stdio() -> io::Result<usize> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    serve(&mut stdin.lock(), &mut stdout.lock())
}
