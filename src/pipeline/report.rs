//! Run reporting: summary table, CSV file, log lines and overall status.
//!
//! The CSV lives at `output_root/conversion_summary.csv` and is rewritten
//! from scratch on every run, so it always describes the latest run only.
//! The append-only history is the log file, which the binary's tracing
//! subscriber writes.

use crate::config::{ResultOrder, RunConfig};
use crate::error::BatchError;
use crate::output::{Completed, ConversionResult, ConversionStatus, RunStatus, RunSummary};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Column names of the summary CSV.
pub const SUMMARY_HEADER: [&str; 5] = ["path", "status", "timestamp", "output_path", "error"];

#[derive(Serialize)]
struct SummaryRow<'a> {
    path: std::borrow::Cow<'a, str>,
    status: ConversionStatus,
    timestamp: String,
    output_path: std::borrow::Cow<'a, str>,
    error: &'a str,
}

impl<'a> From<&'a ConversionResult> for SummaryRow<'a> {
    fn from(r: &'a ConversionResult) -> Self {
        Self {
            path: r.source_path.to_string_lossy(),
            status: r.status,
            timestamp: r.timestamp.to_rfc3339(),
            output_path: r
                .output_path
                .as_deref()
                .map(Path::to_string_lossy)
                .unwrap_or_default(),
            error: r.error_message.as_deref().unwrap_or(""),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunReporter {
    summary_path: PathBuf,
    order: ResultOrder,
}

impl RunReporter {
    pub fn new(config: &RunConfig) -> Self {
        Self {
            summary_path: config.summary_path(),
            order: config.result_order,
        }
    }

    /// Order, log and persist the results of a finished run.
    ///
    /// Fails only when the summary file cannot be written.
    pub fn report(
        &self,
        mut completed: Vec<Completed>,
        elapsed: Duration,
    ) -> Result<RunSummary, BatchError> {
        if self.order == ResultOrder::Submission {
            completed.sort_by_key(|c| c.index);
        }
        let results: Vec<ConversionResult> = completed.into_iter().map(|c| c.result).collect();

        for r in &results {
            match (&r.output_path, &r.error_message) {
                (Some(out), _) if r.is_success() => {
                    info!("Converted {} → {}", r.source_path.display(), out.display())
                }
                (_, err) => warn!(
                    "Failed {}: {}",
                    r.source_path.display(),
                    err.as_deref().unwrap_or("unknown error")
                ),
            }
        }

        let succeeded = results.iter().filter(|r| r.is_success()).count();
        let failed = results.len() - succeeded;

        self.write_csv(&results)
            .map_err(|source| BatchError::SummaryWrite {
                path: self.summary_path.clone(),
                source,
            })?;

        if results.is_empty() {
            warn!("No supported input files were found.");
        }
        info!(
            "Conversion finished: {} succeeded, {} failed, {:.2}s total",
            succeeded,
            failed,
            elapsed.as_secs_f64()
        );
        info!("Summary written to {}", self.summary_path.display());

        Ok(RunSummary {
            results,
            succeeded,
            failed,
            elapsed_ms: elapsed.as_millis() as u64,
            status: RunStatus::from_counts(succeeded, failed),
            summary_path: self.summary_path.clone(),
        })
    }

    fn write_csv(&self, results: &[ConversionResult]) -> Result<(), csv::Error> {
        if let Some(parent) = self.summary_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&self.summary_path)?;
        wtr.write_record(SUMMARY_HEADER)?;
        for r in results {
            wtr.serialize(SummaryRow::from(r))?;
        }
        wtr.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;
    use crate::job::ConversionJob;

    fn job(name: &str) -> ConversionJob {
        ConversionJob {
            source_path: PathBuf::from("/in").join(name),
            input_root: PathBuf::from("/in"),
            target_format: OutputFormat::Html,
            ocr_enabled: false,
        }
    }

    fn reporter(dir: &Path, order: ResultOrder) -> RunReporter {
        let config = RunConfig::builder("/in")
            .output_root(dir.join("out"))
            .result_order(order)
            .build()
            .unwrap();
        RunReporter::new(&config)
    }

    fn completed() -> Vec<Completed> {
        vec![
            Completed {
                index: 2,
                result: ConversionResult::failure(&job("c.pdf"), "Corrupt input, \"bad\" header"),
            },
            Completed {
                index: 0,
                result: ConversionResult::success(&job("a.pdf"), PathBuf::from("/out/html/a.html"), None),
            },
            Completed {
                index: 1,
                result: ConversionResult::success(&job("b.png"), PathBuf::from("/out/html/b.html"), None),
            },
        ]
    }

    fn read_rows(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
        let mut rdr = csv::Reader::from_path(path).unwrap();
        let header = rdr.headers().unwrap().iter().map(str::to_string).collect();
        let rows = rdr
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect();
        (header, rows)
    }

    #[test]
    fn completion_order_is_kept_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let summary = reporter(dir.path(), ResultOrder::Completion)
            .report(completed(), Duration::from_millis(1500))
            .unwrap();

        assert_eq!(summary.total(), 3);
        assert_eq!((summary.succeeded, summary.failed), (2, 1));
        assert_eq!(summary.status, RunStatus::PartialFailure);
        assert_eq!(summary.elapsed_ms, 1500);
        assert!(summary.results[0].source_path.ends_with("c.pdf"));
    }

    #[test]
    fn submission_order_sorts_by_index() {
        let dir = tempfile::tempdir().unwrap();
        let summary = reporter(dir.path(), ResultOrder::Submission)
            .report(completed(), Duration::ZERO)
            .unwrap();
        let names: Vec<_> = summary
            .results
            .iter()
            .map(|r| r.source_path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.pdf", "b.png", "c.pdf"]);
    }

    #[test]
    fn csv_has_one_row_per_result() {
        let dir = tempfile::tempdir().unwrap();
        let summary = reporter(dir.path(), ResultOrder::Submission)
            .report(completed(), Duration::ZERO)
            .unwrap();

        let (header, rows) = read_rows(&summary.summary_path);
        assert_eq!(header, SUMMARY_HEADER);
        assert_eq!(rows.len(), 3);
        assert!(rows[0][0].ends_with("a.pdf"));
        assert_eq!(rows[0][1], "success");
        assert_eq!(rows[0][3], "/out/html/a.html");
        assert_eq!(rows[2][1], "failure");
        assert_eq!(rows[2][3], "");
        assert_eq!(rows[2][4], "Corrupt input, \"bad\" header");
        assert!(chrono::DateTime::parse_from_rfc3339(&rows[0][2]).is_ok());
    }

    #[test]
    fn rerun_overwrites_summary() {
        let dir = tempfile::tempdir().unwrap();
        let r = reporter(dir.path(), ResultOrder::Completion);
        r.report(completed(), Duration::ZERO).unwrap();
        let summary = r
            .report(completed().into_iter().take(1).collect(), Duration::ZERO)
            .unwrap();
        let (_, rows) = read_rows(&summary.summary_path);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn empty_run_is_success_with_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let summary = reporter(dir.path(), ResultOrder::Completion)
            .report(Vec::new(), Duration::ZERO)
            .unwrap();
        assert_eq!(summary.status, RunStatus::Success);
        let (header, rows) = read_rows(&summary.summary_path);
        assert_eq!(header.len(), 5);
        assert!(rows.is_empty());
    }

    #[test]
    fn unwritable_summary_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        // A file where the output directory should be.
        std::fs::write(dir.path().join("out"), b"in the way").unwrap();
        let err = reporter(dir.path(), ResultOrder::Completion)
            .report(completed(), Duration::ZERO)
            .unwrap_err();
        assert!(matches!(err, BatchError::SummaryWrite { .. }), "got: {err:?}");
    }
}
