//! OCR collaborator: EasyOCR, driven through a Python interpreter.
//!
//! The interpreter runs a short embedded script (`python -c`) that loads an
//! `easyocr.Reader` on the requested backend and prints one recognised line
//! per stdout line. The script checks `torch.cuda` itself before loading
//! models, so an unusable GPU is reported quickly with a dedicated exit code
//! instead of a long traceback.

use super::{OcrBackend, OcrEngine, OcrText};
use crate::error::FileError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// Exit code of the script when the GPU backend was requested but is unusable.
pub const EXIT_GPU_UNAVAILABLE: i32 = 3;
/// Exit code of the script when `easyocr` cannot be imported.
pub const EXIT_EASYOCR_MISSING: i32 = 4;

/// Arguments: `<image> <1|0 use gpu> <comma-separated languages>`.
pub const OCR_SCRIPT: &str = r#"
import sys
try:
    import easyocr
except Exception as exc:
    sys.stderr.write("easyocr import failed: %s\n" % exc)
    sys.exit(4)
image, gpu, langs = sys.argv[1], sys.argv[2] == "1", sys.argv[3].split(",")
if gpu:
    try:
        import torch
        usable = torch.cuda.is_available()
    except Exception:
        usable = False
    if not usable:
        sys.stderr.write("CUDA is not available\n")
        sys.exit(3)
reader = easyocr.Reader(langs, gpu=gpu, verbose=False)
for text in reader.readtext(image, detail=0):
    text = " ".join(str(text).split())
    if text:
        print(text)
"#;

/// stderr that means the GPU backend itself broke, not the image.
static RE_GPU_FAILURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(cuda|cudnn|nvidia|mps backend|torch not compiled with|no kernel image|out of memory)\b")
        .unwrap()
});

#[derive(Debug, Clone)]
pub struct EasyOcr {
    python: PathBuf,
    languages: Vec<String>,
}

impl EasyOcr {
    pub fn new<I, S>(python: impl Into<PathBuf>, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            python: python.into(),
            languages: languages.into_iter().map(Into::into).collect(),
        }
    }
}

impl OcrEngine for EasyOcr {
    fn name(&self) -> &'static str {
        "easyocr"
    }

    fn recognize(&mut self, image: &Path, backend: OcrBackend) -> Result<OcrText, FileError> {
        let gpu_flag = match backend {
            OcrBackend::Gpu => "1",
            OcrBackend::Cpu => "0",
        };
        debug!("easyocr on {} ({backend})", image.display());

        let output = Command::new(&self.python)
            .arg("-c")
            .arg(OCR_SCRIPT)
            .arg(image)
            .arg(gpu_flag)
            .arg(self.languages.join(","))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| FileError::OcrBackend {
                backend,
                detail: format!("failed to run '{}': {e}", self.python.display()),
            })?;

        if !output.status.success() {
            return Err(classify_failure(
                image,
                backend,
                output.status.code(),
                &output.stderr,
            ));
        }

        Ok(parse_lines(&output.stdout))
    }
}

/// Map a failed OCR invocation to a backend error or a per-image error.
///
/// Backend errors let the worker demote to CPU; per-image errors do not.
pub fn classify_failure(
    image: &Path,
    backend: OcrBackend,
    code: Option<i32>,
    stderr: &[u8],
) -> FileError {
    let detail = super::docling::summarize_stderr(stderr).unwrap_or_else(|| match code {
        Some(c) => format!("exit code {c}"),
        None => "terminated by signal".to_string(),
    });

    let backend_broken = match code {
        Some(EXIT_GPU_UNAVAILABLE) => backend == OcrBackend::Gpu,
        Some(EXIT_EASYOCR_MISSING) => true,
        _ => backend == OcrBackend::Gpu && RE_GPU_FAILURE.is_match(&String::from_utf8_lossy(stderr)),
    };

    if backend_broken {
        FileError::OcrBackend { backend, detail }
    } else {
        FileError::Conversion {
            path: image.to_path_buf(),
            collaborator: "easyocr".to_string(),
            detail,
        }
    }
}

fn parse_lines(stdout: &[u8]) -> OcrText {
    OcrText {
        lines: String::from_utf8_lossy(stdout)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect(),
    }
}
