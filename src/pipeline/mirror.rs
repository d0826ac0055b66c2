//! Output-path mirroring: where a converted file lands.
//!
//! `output_root/<format dir>/<source path relative to input root>`, with the
//! extension replaced by the format's canonical one:
//!
//! ```text
//! input root  docs/
//! source      docs/reports/q1.pdf
//! format      html
//! output      output/html/reports/q1.html
//! ```
//!
//! The mapping is a pure function of its inputs; only [`PathMirror::prepare`]
//! and [`PathMirror::write`] touch the filesystem.

use crate::config::OutputFormat;
use crate::error::FileError;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[derive(Debug, Clone)]
pub struct PathMirror {
    output_root: PathBuf,
}

impl PathMirror {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Compute the output path for `source_path`.
    ///
    /// Fails with [`FileError::OutsideInputRoot`] when `source_path` is not
    /// strictly below `input_root`.
    pub fn resolve(
        &self,
        input_root: &Path,
        source_path: &Path,
        format: OutputFormat,
    ) -> Result<PathBuf, FileError> {
        let relative = source_path
            .strip_prefix(input_root)
            .ok()
            .filter(|r| !r.as_os_str().is_empty())
            .ok_or_else(|| FileError::OutsideInputRoot {
                path: source_path.to_path_buf(),
                root: input_root.to_path_buf(),
            })?;

        Ok(self
            .output_root
            .join(format.dir_name())
            .join(relative)
            .with_extension(format.extension()))
    }

    /// Create every missing ancestor directory of `output_path`. Idempotent.
    pub fn prepare(&self, output_path: &Path) -> Result<(), FileError> {
        match output_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
                .map_err(|e| FileError::OutputWrite {
                    path: output_path.to_path_buf(),
                    source: e,
                }),
            _ => Ok(()),
        }
    }

    /// Atomically replace `output_path` with `bytes`.
    ///
    /// The bytes go to a temp file in the same directory which is then
    /// renamed over the target, so readers never observe a partial file.
    pub fn write(&self, output_path: &Path, bytes: &[u8]) -> Result<(), FileError> {
        let write_err = |e: std::io::Error| FileError::OutputWrite {
            path: output_path.to_path_buf(),
            source: e,
        };
        let dir = output_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));

        let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(bytes).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(output_path).map_err(|e| write_err(e.error))?;
        Ok(())
    }
}
