//! Job enumeration: expand the run target into an ordered list of jobs.
//!
//! A file target yields one job whose input root is the file's parent. A
//! directory target yields one job per regular file beneath it, in `Path`
//! order (component-wise, byte-lexical), so two runs over the same tree
//! always dispatch in the same order.

use crate::config::{OutputFormat, RunConfig};
use crate::error::BatchError;
use crate::job::ConversionJob;
use crate::pipeline::sniff;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// List every file the target expands to, absolute and sorted.
///
/// Symlinks to files are included; symlinked directories are not descended.
/// Unreadable subdirectories are logged and skipped.
pub fn enumerate(target: &Path) -> Result<Vec<PathBuf>, BatchError> {
    walk(target, None)
}

fn absolute(path: &Path) -> Result<PathBuf, BatchError> {
    std::path::absolute(path).map_err(|e| BatchError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

fn walk(target: &Path, skip_under: Option<&Path>) -> Result<Vec<PathBuf>, BatchError> {
    let meta = fs::metadata(target).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => BatchError::NotFound {
            path: target.to_path_buf(),
        },
        _ => BatchError::Io {
            path: target.to_path_buf(),
            source: e,
        },
    })?;

    let root = absolute(target)?;
    if !meta.is_dir() {
        return Ok(vec![root]);
    }

    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(dir) = stack.pop() {
        if skip_under.is_some_and(|skip| dir.starts_with(skip)) {
            debug!("Skipping output tree {}", dir.display());
            continue;
        }
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot read directory {}: {}", dir.display(), e);
                continue;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Cannot read entry in {}: {}", dir.display(), e);
                    continue;
                }
            };
            let path = entry.path();
            let Ok(file_type) = entry.file_type() else {
                continue;
            };

            if file_type.is_dir() {
                stack.push(path);
            } else if file_type.is_file() {
                out.push(path);
            } else if file_type.is_symlink() {
                // Follow links to files only.
                if fs::metadata(&path).is_ok_and(|m| m.is_file()) {
                    out.push(path);
                }
            }
        }
    }

    if let Some(skip) = skip_under {
        out.retain(|p| !p.starts_with(skip));
    }
    out.sort();
    Ok(out)
}

/// Builds the [`ConversionJob`]s of a run from its [`RunConfig`].
#[derive(Debug, Clone)]
pub struct JobEnumerator {
    target: PathBuf,
    output_root: PathBuf,
    format: OutputFormat,
    ocr_enabled: bool,
    only_supported: bool,
}

impl JobEnumerator {
    pub fn new(config: &RunConfig) -> Self {
        Self {
            target: config.target.clone(),
            output_root: config.output_root.clone(),
            format: config.format,
            ocr_enabled: config.ocr_enabled,
            only_supported: config.only_supported,
        }
    }

    /// Expand the target into jobs, in dispatch order.
    ///
    /// Files under the output root are never enumerated, so an output tree
    /// placed inside the target is not converted again on the next run.
    pub fn jobs(&self) -> Result<Vec<ConversionJob>, BatchError> {
        let output_root = absolute(&self.output_root)?;
        let files = walk(&self.target, Some(&output_root))?;

        let target = absolute(&self.target)?;
        let input_root = if target.is_dir() {
            target
        } else {
            target
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| BatchError::InvalidConfig(format!(
                    "'{}' has no parent directory",
                    target.display()
                )))?
        };

        let jobs: Vec<ConversionJob> = files
            .into_iter()
            .filter(|p| {
                let keep = !self.only_supported || sniff::is_supported(p);
                if !keep {
                    debug!("Skipping unsupported {}", p.display());
                }
                keep
            })
            .map(|source_path| ConversionJob {
                source_path,
                input_root: input_root.clone(),
                target_format: self.format,
                ocr_enabled: self.ocr_enabled,
            })
            .collect();

        debug!("Enumerated {} job(s) under {}", jobs.len(), input_root.display());
        Ok(jobs)
    }
}
