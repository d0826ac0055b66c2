//! Configuration types for a batch conversion run.
//!
//! Everything a run needs is captured in one immutable [`RunConfig`], built
//! via [`RunConfigBuilder`]. The coordinator derives each
//! [`crate::job::ConversionJob`] and the worker handshake from it, so no
//! setting is ever read from ambient global state inside a worker process.

use crate::error::BatchError;
use crate::pipeline::protocol::raw_path;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// File name of the CSV run summary, written under the output root.
pub const SUMMARY_FILE_NAME: &str = "conversion_summary.csv";

/// Default output root, relative to the working directory.
pub const DEFAULT_OUTPUT_ROOT: &str = "output";

/// Configuration for a batch conversion run.
///
/// # Example
/// ```rust
/// use docbatch::{OutputFormat, RunConfig};
///
/// let config = RunConfig::builder("docs")
///     .format(OutputFormat::Html)
///     .ocr_enabled(true)
///     .workers(4)
///     .build()
///     .unwrap();
/// assert_eq!(config.summary_path(), std::path::Path::new("output/conversion_summary.csv"));
/// ```
#[derive(Clone)]
pub struct RunConfig {
    /// File or directory to convert.
    pub target: PathBuf,

    /// Output format for every file in the run. Default: Markdown.
    pub format: OutputFormat,

    /// Run the OCR collaborator on `.jpg`, `.jpeg` and `.png` inputs. Default: false.
    pub ocr_enabled: bool,

    /// Root of the mirrored output tree and of the summary CSV. Default: `output`.
    pub output_root: PathBuf,

    /// Number of worker processes. Default: available CPU parallelism.
    ///
    /// Each worker is a separate OS process holding its own OCR backend, so
    /// memory use grows linearly with this value when OCR is on.
    pub workers: usize,

    /// Skip files whose extension the converter does not support instead of
    /// recording them as failures. Default: false.
    pub only_supported: bool,

    /// Row order of the run summary. Default: completion order.
    pub result_order: ResultOrder,

    /// How the external collaborators are invoked inside each worker.
    pub collaborators: CollaboratorSettings,

    /// Command that starts one worker process. `None` re-executes the
    /// current binary with `--worker`.
    pub worker_command: Option<WorkerCommand>,

    /// Optional per-file progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunConfig")
            .field("target", &self.target)
            .field("format", &self.format)
            .field("ocr_enabled", &self.ocr_enabled)
            .field("output_root", &self.output_root)
            .field("workers", &self.workers)
            .field("only_supported", &self.only_supported)
            .field("result_order", &self.result_order)
            .field("collaborators", &self.collaborators)
            .field("worker_command", &self.worker_command)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl RunConfig {
    /// Create a new builder for converting `target`.
    pub fn builder(target: impl Into<PathBuf>) -> RunConfigBuilder {
        RunConfigBuilder {
            config: RunConfig {
                target: target.into(),
                format: OutputFormat::default(),
                ocr_enabled: false,
                output_root: PathBuf::from(DEFAULT_OUTPUT_ROOT),
                workers: default_workers(),
                only_supported: false,
                result_order: ResultOrder::default(),
                collaborators: CollaboratorSettings::default(),
                worker_command: None,
                progress_callback: None,
            },
        }
    }

    /// Path of the CSV run summary.
    pub fn summary_path(&self) -> PathBuf {
        self.output_root.join(SUMMARY_FILE_NAME)
    }
}

/// Available CPU parallelism, falling back to a single worker.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Builder for [`RunConfig`].
#[derive(Debug)]
pub struct RunConfigBuilder {
    config: RunConfig,
}

impl RunConfigBuilder {
    pub fn format(mut self, format: OutputFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn ocr_enabled(mut self, v: bool) -> Self {
        self.config.ocr_enabled = v;
        self
    }

    /// Try the GPU OCR backend first. Default: true.
    pub fn prefer_gpu(mut self, v: bool) -> Self {
        self.config.collaborators.prefer_gpu = v;
        self
    }

    pub fn output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.output_root = root.into();
        self
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.config.workers = n;
        self
    }

    pub fn only_supported(mut self, v: bool) -> Self {
        self.config.only_supported = v;
        self
    }

    pub fn result_order(mut self, order: ResultOrder) -> Self {
        self.config.result_order = order;
        self
    }

    pub fn docling_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.config.collaborators.docling_program = program.into();
        self
    }

    pub fn python_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.config.collaborators.python_program = program.into();
        self
    }

    pub fn ocr_languages<I, S>(mut self, langs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.collaborators.ocr_languages = langs.into_iter().map(Into::into).collect();
        self
    }

    pub fn worker_command(mut self, command: WorkerCommand) -> Self {
        self.config.worker_command = Some(command);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RunConfig, BatchError> {
        let c = &self.config;
        if c.target.as_os_str().is_empty() {
            return Err(BatchError::InvalidConfig(
                "A file or folder to convert is required".into(),
            ));
        }
        if c.workers == 0 {
            return Err(BatchError::InvalidConfig("Workers must be ≥ 1".into()));
        }
        if c.ocr_enabled && c.collaborators.ocr_languages.is_empty() {
            return Err(BatchError::InvalidConfig(
                "OCR needs at least one language".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums and settings ───────────────────────────────────────────────────

/// Target format of a conversion.
///
/// The variant name (lowercase) is also the directory under the output
/// root; [`OutputFormat::extension`] is the canonical file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// HTML document.
    Html,
    /// Lossless docling JSON serialisation.
    Json,
    /// Markdown. (default)
    #[default]
    Markdown,
    /// Plain text without Markdown markers.
    Text,
    /// DocTags markup.
    Doctags,
}

impl OutputFormat {
    /// All formats, in prompt-menu order.
    pub const ALL: [OutputFormat; 5] = [
        OutputFormat::Html,
        OutputFormat::Json,
        OutputFormat::Markdown,
        OutputFormat::Text,
        OutputFormat::Doctags,
    ];

    /// Directory name under the output root.
    pub fn dir_name(self) -> &'static str {
        match self {
            OutputFormat::Html => "html",
            OutputFormat::Json => "json",
            OutputFormat::Markdown => "markdown",
            OutputFormat::Text => "text",
            OutputFormat::Doctags => "doctags",
        }
    }

    /// Canonical extension (without the dot) of converted files.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Html => "html",
            OutputFormat::Json => "json",
            OutputFormat::Markdown => "md",
            OutputFormat::Text => "txt",
            OutputFormat::Doctags => "doctags",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for OutputFormat {
    type Err = BatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "html" => Ok(OutputFormat::Html),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "text" | "txt" => Ok(OutputFormat::Text),
            "doctags" => Ok(OutputFormat::Doctags),
            other => Err(BatchError::InvalidConfig(format!(
                "Unknown output format '{other}' (expected html, json, markdown, text or doctags)"
            ))),
        }
    }
}

/// Row order of the run summary.
///
/// Workers finish in whatever order the files allow, so completion order is
/// not input order. `Submission` sorts by enumeration index before reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultOrder {
    /// Rows appear as workers finish. (default)
    #[default]
    Completion,
    /// Rows appear in enumeration order.
    Submission,
}

/// How each worker invokes the external collaborators.
///
/// Sent to every worker process as the first protocol message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollaboratorSettings {
    /// The `docling` command-line tool. Default: `docling` from `PATH`.
    #[serde(with = "raw_path")]
    pub docling_program: PathBuf,
    /// Python interpreter with `easyocr` installed. Default: `python3`.
    #[serde(with = "raw_path")]
    pub python_program: PathBuf,
    /// EasyOCR language codes. Default: `["en"]`.
    pub ocr_languages: Vec<String>,
    /// Try the GPU backend before the CPU backend. Default: true.
    pub prefer_gpu: bool,
}

impl Default for CollaboratorSettings {
    fn default() -> Self {
        Self {
            docling_program: PathBuf::from("docling"),
            python_program: PathBuf::from("python3"),
            ocr_languages: vec!["en".to_string()],
            prefer_gpu: true,
        }
    }
}

/// Environment variable set on every spawned worker process.
///
/// A process that carries it and still tries to start a batch is a binary
/// that re-ran its own `main` instead of serving jobs; the dispatcher refuses
/// rather than spawning workers of its own.
pub const WORKER_ENV: &str = "DOCBATCH_WORKER_PROCESS";

/// Program and arguments that start one worker process.
///
/// The program must call [`crate::run_worker`] when given these arguments.
/// The default re-executes the running binary with `--worker`, which the
/// `docbatch` binary handles; a library caller's own binary must branch on
/// `--worker` before anything else, or set an explicit command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl WorkerCommand {
    pub fn new(program: impl AsRef<Path>, args: &[&str]) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Re-execute the running binary in worker mode.
    pub fn current_exe() -> Result<Self, BatchError> {
        let exe = std::env::current_exe()
            .map_err(|e| BatchError::Internal(format!("cannot locate current executable: {e}")))?;
        Ok(Self::new(exe, &["--worker"]))
    }
}
