//! CLI binary for docbatch.
//!
//! A thin shim over the library crate that maps CLI flags (or interactive
//! answers) to `RunConfig`, runs the batch and turns the outcome into an
//! exit code. The hidden `--worker` flag turns the same binary into a
//! worker process for the dispatcher.

use anyhow::{Context, Result};
use clap::Parser;
use docbatch::prompts::Prompter;
use docbatch::{
    run_batch, BatchError, ConversionProgressCallback, ConversionResult, OutputFormat,
    ProgressCallback, ResultOrder, RunConfig, RunStatus, FATAL_EXIT_CODE,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one ✓/✗ line per file.
/// Files complete out of order, so start times are keyed by job index.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Scanning");
        bar.set_message("Looking for files…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn elapsed_since_start(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&index)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

fn short_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_files: usize) {
        self.bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>4}/{len} files  \
                 ⏱ {elapsed_precise}  ETA {eta_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
        );
        self.bar.set_length(total_files as u64);
        self.bar.set_prefix("Converting");
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {total_files} file(s)…"))
        ));
    }

    fn on_file_start(&self, index: usize, _total: usize, source: &Path) {
        self.start_times
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(index, Instant::now());
        self.bar.set_message(short_name(source));
    }

    fn on_file_complete(&self, index: usize, total: usize, result: &ConversionResult) {
        let secs = self.elapsed_since_start(index);
        let name = short_name(&result.source_path);

        if result.is_success() {
            let ocr = result
                .ocr
                .map(|o| format!("  ocr:{} {} lines", o.backend, o.lines))
                .unwrap_or_default();
            self.bar.println(format!(
                "  {} [{:>4}/{:<4}] {}{}  {}",
                green("✓"),
                index + 1,
                total,
                name,
                dim(&ocr),
                dim(&format!("{secs:.1}s")),
            ));
        } else {
            let error = result.error_message.as_deref().unwrap_or("unknown error");
            let msg = if error.chars().count() > 100 {
                let cut: String = error.chars().take(99).collect();
                format!("{cut}\u{2026}")
            } else {
                error.to_string()
            };
            self.bar.println(format!(
                "  {} [{:>4}/{:<4}] {}  {}  {}",
                red("✗"),
                index + 1,
                total,
                name,
                red(&msg),
                dim(&format!("{secs:.1}s")),
            ));
        }
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total_files: usize, success_count: usize) {
        let failed = total_files.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} file(s) converted successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} file(s) converted  ({} failed)",
                if failed == total_files {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_files,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Ask for the folder, format and OCR interactively
  docbatch

  # Convert a folder to HTML with OCR on images
  docbatch docs -f html --ocr

  # Markdown, 4 worker processes, CPU-only OCR, custom output root
  docbatch scans -f md --ocr --cpu-only -j 4 -o converted

  # Only the file types docling supports; summary rows in input order
  docbatch archive --only-supported --input-order

  # Machine-readable run summary on stdout
  docbatch docs -f json --ocr=false --json > run.json

OUTPUT:
  <output-dir>/<format>/<path relative to TARGET>.<ext>
  <output-dir>/conversion_summary.csv   rewritten on every run
  <log-file>                            appended on every run

EXIT CODES:
  0  every file converted (or no files found)
  1  fatal error (missing target, invalid configuration, unwritable summary)
  2  some files failed
  3  every file failed

REQUIREMENTS:
  docling   on PATH (pip install docling), or --docling-bin
  easyocr   importable by python3 (pip install easyocr), or --python-bin
"#;

/// Batch-convert documents and images with docling and EasyOCR.
#[derive(Parser, Debug)]
#[command(
    name = "docbatch",
    version,
    about = "Batch-convert documents and images with docling and EasyOCR",
    long_about = "Convert a file or a whole folder of PDFs, images and office documents to HTML, \
JSON, Markdown, text or DocTags. Every file runs in one of a pool of isolated worker processes; \
outputs mirror the input tree and every outcome lands in a CSV summary.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// File or folder to convert. Prompted for when omitted on a terminal.
    #[arg(env = "DOCBATCH_TARGET")]
    target: Option<PathBuf>,

    /// Output format: html, json, markdown (md), text (txt), doctags.
    #[arg(short, long, env = "DOCBATCH_FORMAT", value_name = "FORMAT")]
    format: Option<OutputFormat>,

    /// Run OCR on .jpg/.jpeg/.png files (`--ocr` or `--ocr=false`).
    #[arg(
        long,
        env = "DOCBATCH_OCR",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        value_name = "BOOL"
    )]
    ocr: Option<bool>,

    /// Never try the GPU OCR backend.
    #[arg(long, env = "DOCBATCH_CPU_ONLY")]
    cpu_only: bool,

    /// Number of worker processes. Default: number of CPUs.
    #[arg(short = 'j', long, env = "DOCBATCH_WORKERS",
          value_parser = clap::value_parser!(u16).range(1..))]
    workers: Option<u16>,

    /// Root of the output tree and of conversion_summary.csv.
    #[arg(short, long, env = "DOCBATCH_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Append-only run log.
    #[arg(long, env = "DOCBATCH_LOG_FILE", default_value = "conversion.log")]
    log_file: PathBuf,

    /// Skip files docling does not support instead of recording failures.
    #[arg(long, env = "DOCBATCH_ONLY_SUPPORTED")]
    only_supported: bool,

    /// Write summary rows in input order instead of completion order.
    #[arg(long, env = "DOCBATCH_INPUT_ORDER")]
    input_order: bool,

    /// The docling executable.
    #[arg(long, env = "DOCBATCH_DOCLING_BIN", default_value = "docling")]
    docling_bin: PathBuf,

    /// Python interpreter with easyocr installed.
    #[arg(long, env = "DOCBATCH_PYTHON_BIN", default_value = "python3")]
    python_bin: PathBuf,

    /// EasyOCR language codes, comma-separated.
    #[arg(long, env = "DOCBATCH_OCR_LANG", value_delimiter = ',', default_value = "en")]
    ocr_lang: Vec<String>,

    /// Print the run summary as JSON on stdout.
    #[arg(long, env = "DOCBATCH_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "DOCBATCH_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCBATCH_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCBATCH_QUIET")]
    quiet: bool,

    /// Serve jobs on stdin/stdout (started by the dispatcher).
    #[arg(long, hide = true)]
    worker: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.worker {
        return worker_main();
    }

    match run(cli) {
        Ok(status) => ExitCode::from(status.exit_code()),
        Err(e) => {
            tracing::error!(target: FATAL_LOG_TARGET, "{:#}", e);
            eprintln!("{} {:#}", red("error:"), e);
            ExitCode::from(FATAL_EXIT_CODE)
        }
    }
}

/// Fatal errors go to the log file under this target; the console already
/// shows them as `error:` lines.
const FATAL_LOG_TARGET: &str = "docbatch::fatal";

/// Worker mode: protocol on stdout, logs on stderr only.
fn worker_main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    match docbatch::run_worker() {
        Ok(served) => {
            tracing::debug!("Worker served {} job(s)", served);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("Worker protocol error: {}", e);
            ExitCode::from(FATAL_EXIT_CODE)
        }
    }
}

fn run(cli: Cli) -> Result<RunStatus> {
    // ── Logging setup ────────────────────────────────────────────────────
    // Before prompting, so a rejected answer is recorded in the log file.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    init_logging(&cli, show_progress)?;

    let answers = resolve_answers(&cli)?;

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, answers, progress_cb)?;

    // ── Run ──────────────────────────────────────────────────────────────
    let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
    let summary = runtime
        .block_on(run_batch(&config))
        .context("Batch conversion failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?;
        println!("{json}");
    } else if !cli.quiet {
        if !show_progress {
            eprintln!(
                "Converted {}/{} file(s) in {:.1}s",
                summary.succeeded,
                summary.total(),
                summary.elapsed_ms as f64 / 1000.0
            );
            if summary.failed > 0 {
                eprintln!("  {} file(s) failed", summary.failed);
            }
        }
        if summary.total() == 0 {
            eprintln!("{} No supported input files were found.", cyan("⚠"));
        }
        eprintln!(
            "   {}",
            dim(&format!("summary → {}", summary.summary_path.display()))
        );
    }

    Ok(summary.status)
}

/// Target, format and OCR choice, from flags or prompts.
struct Answers {
    target: PathBuf,
    format: OutputFormat,
    ocr: bool,
}

/// Fill in missing answers by prompting, but only on a terminal.
///
/// Without a terminal a missing target is fatal; format defaults to
/// markdown and OCR to off.
fn resolve_answers(cli: &Cli) -> Result<Answers> {
    let missing = cli.target.is_none() || cli.format.is_none() || cli.ocr.is_none();
    if !missing || !io::stdin().is_terminal() {
        let target = cli.target.clone().ok_or_else(|| {
            BatchError::InvalidConfig(
                "No file or folder given (pass TARGET or run on a terminal)".into(),
            )
        })?;
        return Ok(Answers {
            target,
            format: cli.format.unwrap_or_default(),
            ocr: cli.ocr.unwrap_or(false),
        });
    }

    let stdin = io::stdin();
    let mut prompter = Prompter::new(stdin.lock(), io::stderr());
    prompter.welcome()?;
    let target = match &cli.target {
        Some(t) => t.clone(),
        None => prompter.target()?,
    };
    let format = match cli.format {
        Some(f) => f,
        None => prompter.format()?,
    };
    let ocr = match cli.ocr {
        Some(v) => v,
        None => prompter.ocr()?,
    };
    Ok(Answers {
        target,
        format,
        ocr,
    })
}

/// Console layer on stderr plus an append-only file layer.
///
/// The console shows errors only while the progress bar is active; the log
/// file always records INFO and above.
fn init_logging(cli: &Cli, show_progress: bool) -> Result<()> {
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter))
        .add_directive(
            format!("{FATAL_LOG_TARGET}=off")
                .parse()
                .context("Invalid log directive")?,
        );

    if let Some(parent) = cli.log_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&cli.log_file)
        .with_context(|| format!("Failed to open log file {}", cli.log_file.display()))?;

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_filter(console_filter),
        )
        .with(
            fmt::layer()
                .with_writer(Mutex::new(log_file))
                .with_ansi(false)
                .with_target(false)
                .with_filter(LevelFilter::INFO),
        )
        .try_init()
        .context("Failed to install logger")?;
    Ok(())
}

/// Map CLI args and answers to `RunConfig`.
fn build_config(
    cli: &Cli,
    answers: Answers,
    progress: Option<ProgressCallback>,
) -> Result<RunConfig> {
    let mut builder = RunConfig::builder(answers.target)
        .format(answers.format)
        .ocr_enabled(answers.ocr)
        .prefer_gpu(!cli.cpu_only)
        .output_root(&cli.output_dir)
        .only_supported(cli.only_supported)
        .result_order(if cli.input_order {
            ResultOrder::Submission
        } else {
            ResultOrder::Completion
        })
        .docling_program(&cli.docling_bin)
        .python_program(&cli.python_bin)
        .ocr_languages(
            cli.ocr_lang
                .iter()
                .map(|l| l.trim())
                .filter(|l| !l.is_empty())
                .map(str::to_string),
        );

    if let Some(n) = cli.workers {
        builder = builder.workers(n.into());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
