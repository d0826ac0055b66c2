//! Parallel dispatch of jobs to a fixed pool of worker processes.
//!
//! ## Why processes and not threads?
//!
//! A worker *process* per lane gives each lane its own OCR backend decision
//! and its own failure domain: a worker that panics, aborts or hangs up
//! takes down only its lane's process, never the coordinator or the run.
//!
//! Workers are started with a clean exec of [`WorkerCommand`] (by default
//! the current binary with `--worker`), never by forking the coordinator.
//!
//! ## Data flow
//!
//! ```text
//!                 ┌─ lane 0 ── worker process ─┐
//! queue (FIFO) ──▶├─ lane 1 ── worker process ─┤──▶ mpsc ──▶ ResultStream
//!                 └─ lane N ── worker process ─┘
//! ```
//!
//! Each lane is an async task that pops the next job, writes it to its
//! worker's stdin and awaits the answer line. Results flow out in
//! completion order, tagged with their submission index.

use crate::config::{RunConfig, WorkerCommand, WORKER_ENV};
use crate::error::{BatchError, FileError};
use crate::job::ConversionJob;
use crate::output::{Completed, ConversionResult};
use crate::pipeline::protocol::{self, JobEnvelope, ResultEnvelope, WorkerSettings};
use crate::progress::ProgressCallback;
use futures::future::join_all;
use futures::StreamExt;
use std::collections::VecDeque;
use std::ffi::OsString;
use std::io;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::Stream;
use tracing::{debug, info, warn};

/// Results in completion order.
pub type ResultStream = Pin<Box<dyn Stream<Item = Completed> + Send>>;

type JobQueue = Arc<Mutex<VecDeque<(usize, ConversionJob)>>>;

/// Fans jobs out over `workers` worker processes.
#[derive(Clone)]
pub struct ParallelDispatcher {
    workers: usize,
    command: Arc<WorkerCommand>,
    settings_line: Arc<str>,
    progress: Option<ProgressCallback>,
}

impl ParallelDispatcher {
    /// Dispatcher for `config`, resolving the default worker command.
    pub fn new(config: &RunConfig) -> Result<Self, BatchError> {
        refuse_inside_worker(std::env::var_os(WORKER_ENV))?;
        let command = match &config.worker_command {
            Some(c) => c.clone(),
            None => WorkerCommand::current_exe()?,
        };
        let settings = WorkerSettings {
            output_root: config.output_root.clone(),
            collaborators: config.collaborators.clone(),
        };
        let settings_line = protocol::encode_line(&settings)
            .map_err(|e| BatchError::Internal(format!("cannot encode worker settings: {e}")))?;

        Ok(Self {
            workers: config.workers.max(1),
            command: Arc::new(command),
            settings_line: settings_line.into(),
            progress: config.progress_callback.clone(),
        })
    }

    /// Run every job and wait for all results (completion order).
    ///
    /// Returns exactly one [`Completed`] per job. Must be called inside a
    /// tokio runtime.
    pub async fn run(&self, jobs: Vec<ConversionJob>) -> Vec<Completed> {
        self.stream(jobs).collect().await
    }

    /// Start the run and yield results as workers finish them.
    ///
    /// The stream ends once every job has a result. Must be called inside a
    /// tokio runtime.
    pub fn stream(&self, jobs: Vec<ConversionJob>) -> ResultStream {
        let total = jobs.len();
        let (tx, rx) = mpsc::unbounded_channel();
        if total == 0 {
            return Box::pin(UnboundedReceiverStream::new(rx));
        }

        let lanes = self.workers.min(total);
        info!("Dispatching {} file(s) to {} worker process(es)", total, lanes);

        let queue: JobQueue = Arc::new(Mutex::new(jobs.into_iter().enumerate().collect()));
        let lane_futures: Vec<_> = (0..lanes)
            .map(|id| {
                Lane {
                    id,
                    total,
                    queue: Arc::clone(&queue),
                    dispatcher: self.clone(),
                    tx: tx.clone(),
                }
                .run()
            })
            .collect();
        drop(tx);

        tokio::spawn(async move {
            join_all(lane_futures).await;
            debug!("All worker lanes finished");
        });

        Box::pin(UnboundedReceiverStream::new(rx))
    }
}

/// A worker process must serve jobs, never dispatch its own.
fn refuse_inside_worker(marker: Option<OsString>) -> Result<(), BatchError> {
    match marker {
        Some(_) => Err(BatchError::InvalidConfig(format!(
            "this process was started as a worker ({WORKER_ENV} is set) but began a batch; \
             call docbatch::run_worker() when given --worker, or set RunConfigBuilder::worker_command"
        ))),
        None => Ok(()),
    }
}

// ── Lanes ────────────────────────────────────────────────────────────────

struct Lane {
    id: usize,
    total: usize,
    queue: JobQueue,
    dispatcher: ParallelDispatcher,
    tx: mpsc::UnboundedSender<Completed>,
}

impl Lane {
    fn next_job(&self) -> Option<(usize, ConversionJob)> {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    async fn run(self) {
        let progress = self.dispatcher.progress.clone();
        let mut process: Option<WorkerProcess> = None;

        while let Some((index, job)) = self.next_job() {
            info!(
                "Dispatching [{}/{}] {} to worker {}",
                index + 1,
                self.total,
                job.source_path.display(),
                self.id
            );
            if let Some(ref cb) = progress {
                cb.on_file_start(index, self.total, &job.source_path);
            }

            let result = self.convert_on(&mut process, index, &job).await;

            if let Some(ref cb) = progress {
                cb.on_file_complete(index, self.total, &result);
            }
            if self.tx.send(Completed { index, result }).is_err() {
                debug!("Result receiver dropped; lane {} stops", self.id);
                break;
            }
        }

        if let Some(p) = process {
            p.shutdown(self.id).await;
        }
    }

    /// Convert one job on this lane's worker, (re)starting it if needed.
    async fn convert_on(
        &self,
        process: &mut Option<WorkerProcess>,
        index: usize,
        job: &ConversionJob,
    ) -> ConversionResult {
        let crashed = |detail: String| {
            ConversionResult::failure(job, FileError::WorkerCrashed { detail }.to_string())
        };

        if process.is_none() {
            match WorkerProcess::spawn(
                &self.dispatcher.command,
                &self.dispatcher.settings_line,
            )
            .await
            {
                Ok(p) => *process = Some(p),
                Err(e) => {
                    warn!("Lane {}: cannot start worker: {}", self.id, e);
                    return crashed(format!(
                        "cannot start '{}': {e}",
                        self.dispatcher.command.program.display()
                    ));
                }
            }
        }
        let Some(worker) = process.as_mut() else {
            return crashed("no worker process".into());
        };

        // An unencodable job is this file's failure; the worker stays up.
        let line = match protocol::encode_line(&JobEnvelope {
            index,
            job: job.clone(),
        }) {
            Ok(line) => line,
            Err(e) => {
                warn!("Lane {}: cannot encode {}: {}", self.id, job.source_path.display(), e);
                return ConversionResult::failure(job, format!("cannot send job to worker: {e}"));
            }
        };

        match worker.submit(index, &line).await {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    "Lane {}: worker failed on {}: {}; replacing it",
                    self.id,
                    job.source_path.display(),
                    e
                );
                // kill_on_drop reaps the broken process.
                *process = None;
                crashed(e.to_string())
            }
        }
    }
}

// ── Worker process handle ────────────────────────────────────────────────

struct WorkerProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl WorkerProcess {
    async fn spawn(command: &WorkerCommand, settings_line: &str) -> io::Result<Self> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .env(WORKER_ENV, "1")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::other("worker stdin not captured"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("worker stdout not captured"))?;

        stdin.write_all(settings_line.as_bytes()).await?;
        stdin.flush().await?;
        debug!("Started worker pid {:?}", child.id());

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
        })
    }

    /// Send one encoded job line and await its result.
    async fn submit(&mut self, index: usize, line: &str) -> io::Result<ConversionResult> {
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;

        let Some(reply) = self.stdout.next_line().await? else {
            let detail = match self.child.try_wait() {
                Ok(Some(status)) => format!("worker exited ({status})"),
                _ => "worker closed its output".to_string(),
            };
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, detail));
        };

        let envelope: ResultEnvelope = serde_json::from_str(&reply).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unreadable worker reply: {e}"),
            )
        })?;
        if envelope.index != index {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "worker answered job {} while job {} was pending",
                    envelope.index, index
                ),
            ));
        }
        Ok(envelope.result)
    }

    /// Close stdin so the worker exits, then reap it.
    async fn shutdown(self, lane: usize) {
        let Self {
            mut child, stdin, ..
        } = self;
        drop(stdin);
        match child.wait().await {
            Ok(status) if status.success() => debug!("Lane {} worker exited", lane),
            Ok(status) => warn!("Lane {} worker exited with {}", lane, status),
            Err(e) => warn!("Lane {} worker could not be reaped: {}", lane, e),
        }
    }
}
