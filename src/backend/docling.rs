//! Conversion collaborator: the `docling` command-line tool.
//!
//! docling writes its output next to a name derived from the source, so each
//! call gets a private [`TempDir`] as `--output` and the rendered file is
//! read back from there. The directory is removed when the call returns,
//! whatever the outcome.

use super::{ConvertRequest, Converter, OcrBackend};
use crate::config::OutputFormat;
use crate::error::FileError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;
use tracing::debug;

/// Last Python exception line of a traceback, e.g. `ConversionError: ...`.
static RE_PY_EXCEPTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(?:[\w.]+\.)?(\w*(?:Error|Exception)): (.+)$").unwrap());

const STDERR_DETAIL_MAX: usize = 300;

/// Drives `docling <source> --to <fmt> --output <dir>`.
#[derive(Debug, Clone)]
pub struct DoclingCli {
    program: PathBuf,
}

impl DoclingCli {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn collaborator_error(&self, source: &Path, detail: impl Into<String>) -> FileError {
        FileError::Conversion {
            path: source.to_path_buf(),
            collaborator: "docling".to_string(),
            detail: detail.into(),
        }
    }
}

/// Value of docling's `--to` option.
pub fn docling_format(format: OutputFormat) -> &'static str {
    match format {
        OutputFormat::Html => "html",
        OutputFormat::Json => "json",
        OutputFormat::Markdown => "md",
        OutputFormat::Text => "text",
        OutputFormat::Doctags => "doctags",
    }
}

/// Command-line arguments for one conversion.
pub fn build_args(request: &ConvertRequest<'_>, output_dir: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        request.source.as_os_str().to_owned(),
        "--to".into(),
        docling_format(request.format).into(),
        "--output".into(),
        output_dir.as_os_str().to_owned(),
        "--image-export-mode".into(),
        "placeholder".into(),
    ];

    match request.ocr_backend {
        Some(backend) => {
            let device = match backend {
                OcrBackend::Gpu => "cuda",
                OcrBackend::Cpu => "cpu",
            };
            args.extend(
                ["--ocr", "--ocr-engine", "easyocr", "--device", device]
                    .into_iter()
                    .map(OsString::from),
            );
        }
        None => args.push("--no-ocr".into()),
    }

    args
}

impl Converter for DoclingCli {
    fn name(&self) -> &'static str {
        "docling"
    }

    fn convert(&self, request: &ConvertRequest<'_>) -> Result<Vec<u8>, FileError> {
        let out_dir = TempDir::new()
            .map_err(|e| self.collaborator_error(request.source, format!("tempdir: {e}")))?;

        let args = build_args(request, out_dir.path());
        debug!("Running {} {:?}", self.program.display(), args);

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                self.collaborator_error(
                    request.source,
                    format!("failed to run '{}': {e}", self.program.display()),
                )
            })?;

        if !output.status.success() {
            let detail = summarize_stderr(&output.stderr)
                .unwrap_or_else(|| format!("exited with {}", output.status));
            return Err(self.collaborator_error(request.source, detail));
        }

        let rendered = find_rendered(out_dir.path(), request.source, request.format)
            .ok_or_else(|| {
                self.collaborator_error(
                    request.source,
                    format!(
                        "no .{} file was produced",
                        request.format.extension()
                    ),
                )
            })?;

        std::fs::read(&rendered).map_err(|e| {
            self.collaborator_error(
                request.source,
                format!("cannot read '{}': {e}", rendered.display()),
            )
        })
    }
}

/// Locate the rendered file docling wrote into `dir`.
///
/// docling names it `<source stem>.<ext>`; if it chose another name, the
/// lexically first file with the right extension is taken.
pub fn find_rendered(dir: &Path, source: &Path, format: OutputFormat) -> Option<PathBuf> {
    let ext = format.extension();
    if let Some(stem) = source.file_stem() {
        let mut expected = PathBuf::from(stem);
        expected.as_mut_os_string().push(".");
        expected.as_mut_os_string().push(ext);
        let expected = dir.join(expected);
        if expected.is_file() {
            return Some(expected);
        }
    }

    let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == ext))
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}

/// Condense collaborator stderr into a one-line failure detail.
///
/// Prefers the final Python exception line; otherwise the last non-empty
/// line. Returns `None` for empty stderr.
pub fn summarize_stderr(stderr: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(stderr);
    let line = RE_PY_EXCEPTION
        .captures_iter(&text)
        .last()
        .map(|c| format!("{}: {}", &c[1], c[2].trim()))
        .or_else(|| {
            text.lines()
                .rev()
                .map(str::trim)
                .find(|l| !l.is_empty())
                .map(str::to_string)
        })?;

    Some(if line.chars().count() > STDERR_DETAIL_MAX {
        let cut: String = line.chars().take(STDERR_DETAIL_MAX - 1).collect();
        format!("{cut}\u{2026}")
    } else {
        line
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(source: &Path, ocr: Option<OcrBackend>) -> ConvertRequest<'_> {
        ConvertRequest {
            source,
            format: OutputFormat::Markdown,
            ocr_backend: ocr,
        }
    }

    #[test]
    fn args_without_ocr() {
        let args = build_args(&request(Path::new("/in/a.pdf"), None), Path::new("/tmp/x"));
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args[0], "/in/a.pdf");
        assert!(args.windows(2).any(|w| w == ["--to", "md"]));
        assert!(args.windows(2).any(|w| w == ["--output", "/tmp/x"]));
        assert_eq!(args.last().map(String::as_str), Some("--no-ocr"));
    }

    #[test]
    fn args_with_gpu_ocr_select_cuda_device() {
        let args = build_args(
            &request(Path::new("/in/b.png"), Some(OcrBackend::Gpu)),
            Path::new("/tmp/x"),
        );
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert!(args.contains(&"--ocr".to_string()));
        assert!(args.windows(2).any(|w| w == ["--device", "cuda"]));
        assert!(!args.contains(&"--no-ocr".to_string()));
    }

    #[test]
    fn docling_format_names() {
        assert_eq!(docling_format(OutputFormat::Text), "text");
        assert_eq!(docling_format(OutputFormat::Markdown), "md");
        assert_eq!(docling_format(OutputFormat::Doctags), "doctags");
    }

    #[test]
    fn find_rendered_prefers_source_stem() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("aaa.md"), "other").unwrap();
        std::fs::write(dir.path().join("report.md"), "mine").unwrap();
        let found = find_rendered(dir.path(), Path::new("/in/report.pdf"), OutputFormat::Markdown);
        assert_eq!(found, Some(dir.path().join("report.md")));
    }

    #[test]
    fn find_rendered_falls_back_to_extension_match() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("renamed.html"), "x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
        let found = find_rendered(dir.path(), Path::new("/in/report.pdf"), OutputFormat::Html);
        assert_eq!(found, Some(dir.path().join("renamed.html")));
        assert_eq!(
            find_rendered(dir.path(), Path::new("/in/report.pdf"), OutputFormat::Json),
            None
        );
    }

    #[test]
    fn summarize_stderr_picks_python_exception() {
        let stderr = b"Traceback (most recent call last):\n  File \"x.py\", line 1\n\
docling.exceptions.ConversionError: File format not allowed: a.xyz\n";
        assert_eq!(
            summarize_stderr(stderr).as_deref(),
            Some("ConversionError: File format not allowed: a.xyz")
        );
    }

    #[test]
    fn summarize_stderr_falls_back_to_last_line() {
        assert_eq!(
            summarize_stderr(b"loading models\nsomething broke\n\n").as_deref(),
            Some("something broke")
        );
        assert_eq!(summarize_stderr(b"  \n"), None);
    }

    #[test]
    fn missing_program_is_a_conversion_error() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.pdf");
        std::fs::write(&src, b"%PDF-1.4\n").unwrap();
        let cli = DoclingCli::new(dir.path().join("no-such-docling"));
        let err = cli.convert(&request(&src, None)).unwrap_err();
        assert!(matches!(err, FileError::Conversion { .. }), "got: {err:?}");
        assert!(err.to_string().contains("failed to run"), "got: {err}");
    }

    #[cfg(unix)]
    #[test]
    fn converts_through_a_docling_stand_in() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("docling");
        std::fs::write(
            &script,
            "#!/bin/sh\nsrc=\"$1\"; shift\nout=\"\"\n\
             while [ $# -gt 0 ]; do\n  case \"$1\" in\n    --output) out=\"$2\"; shift 2;;\n    *) shift;;\n  esac\ndone\n\
             base=$(basename \"$src\"); printf '# %s\\n' \"$base\" > \"$out/${base%.*}.md\"\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let src = dir.path().join("report.pdf");
        std::fs::write(&src, b"%PDF-1.4\n").unwrap();

        let bytes = DoclingCli::new(&script).convert(&request(&src, None)).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "# report.pdf\n");
    }
}
