//! Shared fixtures: a scratch tree plus shell stand-ins for docling and the
//! EasyOCR interpreter, so batches run through real worker processes without
//! either collaborator installed.

#![allow(dead_code)]

use docbatch::{RunConfig, RunConfigBuilder, WorkerCommand};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Writes `<stem>.<ext>` into `--output`; fails on names starting with `reject`.
const FAKE_DOCLING: &str = r#"#!/bin/sh
src="$1"; shift
to=md; out=.; ocr=off
while [ $# -gt 0 ]; do
  case "$1" in
    --to) to="$2"; shift 2 ;;
    --output) out="$2"; shift 2 ;;
    --device) ocr="$2"; shift 2 ;;
    *) shift ;;
  esac
done
base=$(basename "$src")
case "$base" in
  reject*) echo "docling.exceptions.ConversionError: cannot convert $base" >&2; exit 1 ;;
esac
case "$to" in
  text) ext=txt ;;
  *) ext="$to" ;;
esac
printf 'converted %s to %s ocr=%s\n' "$base" "$to" "$ocr" > "$out/${base%.*}.$ext"
"#;

/// `-c <script> <image> <gpu> <langs>`: no GPU, two lines of text on CPU.
const FAKE_PYTHON: &str = r#"#!/bin/sh
if [ "$4" = 1 ]; then
  echo "CUDA is not available" >&2
  exit 3
fi
echo "line one"
echo "line two"
"#;

/// Smallest input that passes the `%PDF` header check.
pub const MINIMAL_PDF: &[u8] = b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\n%%EOF\n";

pub struct Sandbox {
    pub dir: TempDir,
    pub docling: PathBuf,
    pub python: PathBuf,
}

fn install_script(path: &Path, body: &str) {
    std::fs::write(path, body).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

impl Sandbox {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        let docling = bin.join("docling");
        let python = bin.join("python3");
        install_script(&docling, FAKE_DOCLING);
        install_script(&python, FAKE_PYTHON);
        std::fs::create_dir_all(dir.path().join("docs")).unwrap();
        Self {
            dir,
            docling,
            python,
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn docs(&self) -> PathBuf {
        self.dir.path().join("docs")
    }

    pub fn output(&self) -> PathBuf {
        self.dir.path().join("output")
    }

    pub fn write(&self, rel: &str, bytes: &[u8]) -> PathBuf {
        let p = self.docs().join(rel);
        std::fs::create_dir_all(p.parent().unwrap()).unwrap();
        std::fs::write(&p, bytes).unwrap();
        p
    }

    pub fn write_pdf(&self, rel: &str) -> PathBuf {
        self.write(rel, MINIMAL_PDF)
    }

    pub fn write_png(&self, rel: &str) -> PathBuf {
        let p = self.docs().join(rel);
        std::fs::create_dir_all(p.parent().unwrap()).unwrap();
        image::RgbImage::new(4, 4).save(&p).unwrap();
        p
    }

    /// Library config that runs real `docbatch --worker` processes.
    pub fn config(&self, target: impl Into<PathBuf>) -> RunConfigBuilder {
        RunConfig::builder(target)
            .output_root(self.output())
            .workers(2)
            .docling_program(&self.docling)
            .python_program(&self.python)
            .worker_command(WorkerCommand::new(
                env!("CARGO_BIN_EXE_docbatch"),
                &["--worker"],
            ))
    }

    pub fn summary_rows(&self) -> Vec<csv::StringRecord> {
        let mut rdr = csv::Reader::from_path(self.output().join("conversion_summary.csv")).unwrap();
        rdr.records().map(|r| r.unwrap()).collect()
    }
}
