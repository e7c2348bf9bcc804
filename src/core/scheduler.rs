//! # Execution Scheduler / 执行调度器
//!
//! Runs a fixed set of jobs with bounded parallelism and yields exactly one
//! completion per job, in completion order. Every job runs in its own task:
//! an error returned by the runner or a panic inside it becomes an
//! `InternalError` outcome for that job and never affects its siblings.
//!
//! 以有限的并行度运行一组固定的任务，并按完成顺序为每个任务产生恰好一个完成结果。
//! 每个任务都在自己的 tokio 任务中运行：运行器返回的错误或其中的 panic
//! 会成为该任务的 `InternalError` 结果，永远不会影响其他任务。

use futures::{stream, StreamExt};
use std::any::Any;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::task::AbortOnDropHandle;

use crate::core::models::{Job, JobOutcome, JobReport};

/// Executes a single job. Implementations hold the read-only run context.
/// 执行单个任务。实现者持有只读的运行上下文。
pub trait JobRunner: Send + Sync + 'static {
    fn run(&self, job: &Job) -> impl Future<Output = anyhow::Result<JobReport>> + Send;
}

/// Progress of the run after a completion.
/// 某个任务完成后的运行进度。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub finished: usize,
    pub total: usize,
    /// Estimated remaining time; `None` if an unfinished job has an unknown duration.
    /// 预计剩余时间；如果某个未完成任务的时长未知，则为 `None`。
    pub eta: Option<Duration>,
}

impl Progress {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.finished as f64 / self.total as f64 * 100.0
        }
    }
}

/// One finished job together with the progress at the time it finished.
#[derive(Debug, Clone)]
pub struct JobCompletion {
    pub outcome: JobOutcome,
    pub progress: Progress,
}

/// Tracks the reference durations of unfinished jobs.
/// 跟踪未完成任务的参考时长。
#[derive(Debug)]
pub struct ProgressTracker {
    remaining: BTreeMap<usize, Option<Duration>>,
    total: usize,
    effective_parallelism: usize,
}

impl ProgressTracker {
    pub fn new(durations: impl IntoIterator<Item = Option<Duration>>, effective_parallelism: usize) -> Self {
        let remaining: BTreeMap<usize, Option<Duration>> = durations.into_iter().enumerate().collect();
        Self {
            total: remaining.len(),
            remaining,
            effective_parallelism: effective_parallelism.max(1),
        }
    }

    /// Marks job `index` finished and returns the new progress.
    pub fn finish(&mut self, index: usize) -> Progress {
        self.remaining.remove(&index);
        Progress {
            finished: self.total - self.remaining.len(),
            total: self.total,
            eta: self.eta(),
        }
    }

    /// Sum of the remaining reference durations divided by the effective parallelism.
    /// 剩余参考时长之和除以有效并行度。
    pub fn eta(&self) -> Option<Duration> {
        let sum = self
            .remaining
            .values()
            .try_fold(Duration::ZERO, |acc, d| d.map(|d| acc + d))?;
        Some(sum / self.effective_parallelism as u32)
    }
}

/// Runs jobs on a fixed-size pool of concurrent tasks.
/// 在固定大小的并发任务池上运行任务。
pub struct Scheduler<R: JobRunner> {
    runner: Arc<R>,
    parallelism: usize,
}

impl<R: JobRunner> Scheduler<R> {
    /// Creates a scheduler running at most `parallelism` jobs at once (at least one).
    pub fn new(runner: R, parallelism: usize) -> Self {
        Self {
            runner: Arc::new(runner),
            parallelism: parallelism.max(1),
        }
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Parallelism used for the ETA: the pool size capped by the CPU count.
    pub fn effective_parallelism(&self) -> usize {
        self.parallelism.min(num_cpus::get()).max(1)
    }

    /// Starts all jobs and returns the stream of completions.
    ///
    /// The stream ends after the last job has been reported. Dropping the
    /// stream stops starting new jobs and aborts the running ones, which kills
    /// their child processes.
    ///
    /// 启动所有任务并返回完成结果流。流在最后一个任务报告后结束。
    /// 丢弃流会停止启动新任务并中止正在运行的任务，从而终止其子进程。
    pub fn start(self, jobs: Vec<Job>) -> ReceiverStream<JobCompletion> {
        let (tx, rx) = mpsc::channel(jobs.len().max(1));
        let mut tracker = ProgressTracker::new(
            jobs.iter().map(|job| job.reference_duration),
            self.effective_parallelism(),
        );
        let runner = self.runner;
        let parallelism = self.parallelism;

        tokio::spawn(async move {
            let mut completions = stream::iter(jobs.into_iter().enumerate().map(|(index, job)| {
                let runner = Arc::clone(&runner);
                async move { (index, run_isolated(runner, job).await) }
            }))
            .buffer_unordered(parallelism);

            loop {
                let next = tokio::select! {
                    next = completions.next() => next,
                    _ = tx.closed() => {
                        tracing::debug!("completion receiver dropped, aborting running jobs");
                        break;
                    }
                };
                let Some((index, outcome)) = next else {
                    break;
                };
                let progress = tracker.finish(index);
                if tx.send(JobCompletion { outcome, progress }).await.is_err() {
                    tracing::debug!("completion receiver dropped, no further jobs are started");
                    break;
                }
            }
        });

        ReceiverStream::new(rx)
    }

    /// Runs all jobs and collects the completions.
    pub async fn run_all(self, jobs: Vec<Job>) -> Vec<JobCompletion> {
        self.start(jobs).collect().await
    }
}

/// Runs one job in its own task so that a panic is confined to that job.
/// The task is aborted when this future is dropped.
async fn run_isolated<R: JobRunner>(runner: Arc<R>, job: Job) -> JobOutcome {
    let task_job = job.clone();
    let handle = AbortOnDropHandle::new(tokio::spawn(async move { runner.run(&task_job).await }));

    match handle.await {
        Ok(Ok(report)) => JobOutcome::from_report(job, report),
        Ok(Err(e)) => {
            let message = format!("{:?}", e.context(format!("Internal error in example {}", job.id)));
            tracing::error!(job = %job.id, error = %message, "job failed with an internal error");
            JobOutcome::internal_error(job, message)
        }
        Err(e) => {
            let message = if e.is_panic() {
                format!("panic: {}", panic_message(e.into_panic()))
            } else {
                format!("task cancelled: {}", e)
            };
            tracing::error!(job = %job.id, error = %message, "job task aborted");
            JobOutcome::internal_error(job, message)
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
