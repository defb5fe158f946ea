//! Worker pool for computing tasks.
//!
//! Workers hold no scheduling logic: each one pulls a task from a
//! [`TaskSource`], waits the task's expected duration, computes the single
//! operation and pushes the result back. When nothing is queued a worker
//! backs off for the poll interval and asks again.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::{TaskAssignment, TaskId};
use crate::error::{Error, Result};
use crate::orchestration::orchestrator::Orchestrator;
use crate::{alog, alog_debug, alog_trace, alog_warn};

/// Where workers pull tasks from and push results to.
#[async_trait]
pub trait TaskSource: Send + Sync + 'static {
    /// Next task to compute, or `None` when nothing is queued.
    async fn fetch_task(&self) -> Result<Option<TaskAssignment>>;

    /// Report the value computed for `id`.
    async fn submit_result(&self, id: TaskId, result: f64) -> Result<()>;
}

/// An orchestrator in the same process.
#[async_trait]
impl TaskSource for Orchestrator {
    async fn fetch_task(&self) -> Result<Option<TaskAssignment>> {
        match self.poll_task() {
            Ok(task) => Ok(Some(task.assignment())),
            Err(Error::NoTaskAvailable) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn submit_result(&self, id: TaskId, result: f64) -> Result<()> {
        self.complete_task(id, result).map(|_| ())
    }
}

/// Compute one assignment the way a worker does: wait, then apply the operator.
///
/// # Errors
/// Returns `Error::DivisionByZero` for a zero divisor.
pub async fn compute(task: &TaskAssignment) -> Result<f64> {
    tokio::time::sleep(Duration::from_millis(task.operation_time)).await;
    task.operation.apply(task.arg1, task.arg2)
}

/// A set of concurrently running workers sharing one task source.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl WorkerPool {
    /// Start `workers` workers that run until `cancel` fires.
    pub fn spawn<S: TaskSource>(
        source: Arc<S>,
        workers: usize,
        poll_interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        let workers = workers.max(1);
        alog!(
            "Starting {} worker(s), poll interval {:?}",
            workers,
            poll_interval
        );
        let handles = (0..workers)
            .map(|n| {
                let source = Arc::clone(&source);
                let cancel = cancel.clone();
                tokio::spawn(async move { run_worker(n, source, poll_interval, cancel).await })
            })
            .collect();
        Self { handles, cancel }
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Stop every worker and wait for them to exit.
    ///
    /// A worker in the middle of a fetch or computation finishes it first.
    pub async fn shutdown(self) -> Result<()> {
        self.cancel.cancel();
        self.join().await
    }

    /// Wait for every worker to exit without cancelling them.
    pub async fn join(self) -> Result<()> {
        for result in futures::future::join_all(self.handles).await {
            result.map_err(|e| Error::TaskJoin(e.to_string()))?;
        }
        Ok(())
    }
}

async fn run_worker<S: TaskSource>(
    n: usize,
    source: Arc<S>,
    poll_interval: Duration,
    cancel: CancellationToken,
) {
    alog_debug!("Worker {} started", n);
    while !cancel.is_cancelled() {
        // Never raced against `cancel`: a fetched task is already popped
        // on the orchestrator and must be computed and reported.
        let fetched = source.fetch_task().await;

        let task = match fetched {
            Ok(Some(task)) => task,
            Ok(None) => {
                alog_trace!("Worker {}: nothing to do", n);
                backoff(poll_interval, &cancel).await;
                continue;
            }
            Err(e) => {
                alog_warn!("Worker {}: fetch failed: {}", n, e);
                backoff(poll_interval, &cancel).await;
                continue;
            }
        };

        alog_debug!(
            "Worker {}: computing {} {} {} ({} ms)",
            n,
            task.arg1,
            task.operation,
            task.arg2,
            task.operation_time
        );
        let value = match compute(&task).await {
            Ok(value) => value,
            Err(e) => {
                // No failure path exists for tasks; the result is withheld.
                alog_warn!(
                    "Worker {}: task {} failed ({} {} {}): {}",
                    n,
                    task.id.short(),
                    task.arg1,
                    task.operation,
                    task.arg2,
                    e
                );
                continue;
            }
        };

        match source.submit_result(task.id, value).await {
            Ok(()) => alog_debug!("Worker {}: task {} = {}", n, task.id.short(), value),
            Err(e) => alog_warn!("Worker {}: result for {} rejected: {}", n, task.id.short(), e),
        }
    }
    alog_debug!("Worker {} stopped", n);
}

async fn backoff(interval: Duration, cancel: &CancellationToken) {
    tokio::select! {
        _ = cancel.cancelled() => {}
        _ = tokio::time::sleep(interval) => {}
    }
}
