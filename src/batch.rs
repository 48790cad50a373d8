//! Batch runner: fans the resize work out over the worker pool and reports
//! progress back on the caller's thread.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::Sender;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{ResizeError, Result};
use crate::files::{OutputPlanner, DEFAULT_SUFFIX};
use crate::pool::WorkerPool;
use crate::processor::{is_supported_format, process_single_image, ProcessedFile, ResizeOptions};
use crate::report::{BatchReport, FailedFile};

/// Cooperative cancellation flag shared between the caller and the workers.
/// Files that have not started when the flag is raised are skipped.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Resized,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    pub completed: usize,
    pub total: usize,
    pub percent: f32,
    pub file_name: String,
    pub status: FileStatus,
}

#[derive(Debug, Clone)]
pub struct BatchJob {
    pub files: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub options: ResizeOptions,
    pub suffix: String,
    pub overwrite: bool,
    pub workers: usize,
}

impl BatchJob {
    pub fn new(files: Vec<PathBuf>, output_dir: impl Into<PathBuf>, options: ResizeOptions) -> Self {
        Self {
            files,
            output_dir: output_dir.into(),
            options,
            suffix: DEFAULT_SUFFIX.to_string(),
            overwrite: false,
            workers: num_cpus::get(),
        }
    }
}

struct Task {
    index: usize,
    input: PathBuf,
    output: PathBuf,
}

enum Outcome {
    Resized(ProcessedFile),
    Failed(String),
    Skipped,
}

struct Completed {
    index: usize,
    input: PathBuf,
    outcome: Outcome,
}

fn run_task(task: Task, options: &ResizeOptions, cancel: &CancelToken) -> Completed {
    let outcome = if cancel.is_cancelled() {
        Outcome::Skipped
    } else {
        match process_single_image(&task.input, &task.output, options) {
            Ok(result) => Outcome::Resized(result),
            Err(e) => Outcome::Failed(e.to_string()),
        }
    };

    Completed {
        index: task.index,
        input: task.input,
        outcome,
    }
}

/// Resizes every file of `job`. Each input produces exactly one progress
/// event, delivered in completion order. Per-file failures are recorded in
/// the report; only setup failures (bad options, output directory, worker
/// pool) return an error.
pub fn run_batch<F>(job: &BatchJob, cancel: &CancelToken, mut on_progress: F) -> Result<BatchReport>
where
    F: FnMut(&ProgressEvent),
{
    job.options.validate()?;
    let pool = WorkerPool::new(job.workers)?;

    if job.files.is_empty() {
        return Ok(BatchReport::empty());
    }

    fs::create_dir_all(&job.output_dir).map_err(|e| ResizeError::io(&job.output_dir, e))?;

    let mut collector = Collector::new(job.files.len());
    let mut planner = OutputPlanner::new(&job.output_dir, job.suffix.as_str(), job.overwrite);
    let mut tasks = Vec::with_capacity(job.files.len());

    for (index, input) in job.files.iter().enumerate() {
        if !is_supported_format(input) {
            let reason = ResizeError::UnsupportedFormat(input.clone()).to_string();
            collector.record(failed(index, input, reason), &mut on_progress);
            continue;
        }
        match planner.plan(input) {
            Ok(output) => tasks.push(Task {
                index,
                input: input.clone(),
                output,
            }),
            Err(e) => collector.record(failed(index, input, e.to_string()), &mut on_progress),
        }
    }

    info!(
        "Resizing {} of {} files to {}x{} ({}) with {} workers",
        tasks.len(),
        job.files.len(),
        job.options.width,
        job.options.height,
        job.options.mode,
        pool.workers()
    );

    let (tx, rx) = crossbeam_channel::unbounded::<Completed>();
    let options = &job.options;

    thread::scope(|scope| {
        scope.spawn(move || dispatch(&pool, tasks, options, cancel, tx));
        for done in rx {
            collector.record(done, &mut on_progress);
        }
    });

    let report = collector.finish();
    info!(
        "Batch complete: {}/{} resized, {} failed, {} skipped",
        report.processed, report.total, report.failed, report.skipped
    );
    Ok(report)
}

fn dispatch(
    pool: &WorkerPool,
    tasks: Vec<Task>,
    options: &ResizeOptions,
    cancel: &CancelToken,
    tx: Sender<Completed>,
) {
    pool.run(tasks, |task| {
        // The receiver lives until every sender is dropped.
        let _ = tx.send(run_task(task, options, cancel));
    });
}

fn failed(index: usize, input: &Path, reason: String) -> Completed {
    Completed {
        index,
        input: input.to_path_buf(),
        outcome: Outcome::Failed(reason),
    }
}

struct Collector {
    total: usize,
    completed: usize,
    outputs: Vec<(usize, ProcessedFile)>,
    failures: Vec<(usize, FailedFile)>,
    skipped: Vec<(usize, PathBuf)>,
}

impl Collector {
    fn new(total: usize) -> Self {
        Self {
            total,
            completed: 0,
            outputs: Vec::new(),
            failures: Vec::new(),
            skipped: Vec::new(),
        }
    }

    fn record<F>(&mut self, done: Completed, on_progress: &mut F)
    where
        F: FnMut(&ProgressEvent),
    {
        self.completed += 1;
        let file_name = done
            .input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| done.input.display().to_string());

        let status = match done.outcome {
            Outcome::Resized(result) => {
                debug!(
                    "{} -> {}",
                    done.input.display(),
                    result.output.display()
                );
                self.outputs.push((done.index, result));
                FileStatus::Resized
            }
            Outcome::Failed(reason) => {
                warn!("Failed to resize {}: {}", done.input.display(), reason);
                self.failures.push((
                    done.index,
                    FailedFile {
                        path: done.input,
                        reason,
                    },
                ));
                FileStatus::Failed
            }
            Outcome::Skipped => {
                debug!("Skipped {} (cancelled)", done.input.display());
                self.skipped.push((done.index, done.input));
                FileStatus::Skipped
            }
        };

        on_progress(&ProgressEvent {
            completed: self.completed,
            total: self.total,
            percent: self.completed as f32 / self.total as f32 * 100.0,
            file_name,
            status,
        });
    }

    fn finish(mut self) -> BatchReport {
        self.outputs.sort_by_key(|(i, _)| *i);
        self.failures.sort_by_key(|(i, _)| *i);
        self.skipped.sort_by_key(|(i, _)| *i);

        BatchReport::new(
            self.total,
            self.outputs.into_iter().map(|(_, o)| o).collect(),
            self.failures.into_iter().map(|(_, f)| f).collect(),
            self.skipped.into_iter().map(|(_, p)| p).collect(),
        )
    }
}
