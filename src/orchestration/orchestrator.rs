//! Orchestrator state manager.
//!
//! Owns every in-flight expression, the task directory and the dispatch
//! queue behind a single mutex. Each public operation takes the lock once,
//! does its work without blocking or awaiting, and releases it, so callers
//! on any number of threads observe operations one at a time.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::Config;
use crate::core::{
    parse, Expression, ExpressionId, ExpressionStatus, ExpressionView, Task, TaskId,
};
use crate::error::{Error, Result};
use crate::orchestration::queue::DispatchQueue;
use crate::orchestration::scheduler::Scheduler;
use crate::{alog, alog_debug, alog_trace, alog_warn};

/// Counts reported by [`Orchestrator::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OrchestratorStats {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub queued_tasks: usize,
    pub in_flight_tasks: usize,
}

#[derive(Debug, Default)]
struct OrchestratorState {
    expressions: BTreeMap<ExpressionId, Expression>,
    queue: DispatchQueue,
    last_expression_id: u64,
}

impl OrchestratorState {
    fn next_expression_id(&mut self) -> ExpressionId {
        self.last_expression_id += 1;
        ExpressionId(self.last_expression_id)
    }
}

/// The single owner of scheduling state.
#[derive(Debug)]
pub struct Orchestrator {
    state: Mutex<OrchestratorState>,
    scheduler: Scheduler,
    /// Lease on popped tasks; `None` keeps popped tasks in flight forever.
    task_lease: Option<Duration>,
}

impl Orchestrator {
    pub fn new(scheduler: Scheduler) -> Self {
        Self {
            state: Mutex::new(OrchestratorState::default()),
            scheduler,
            task_lease: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(Scheduler::new(config.timings)).with_task_lease(config.scheduler.task_lease())
    }

    pub fn with_task_lease(mut self, lease: Option<Duration>) -> Self {
        self.task_lease = lease;
        self
    }

    pub fn task_lease(&self) -> Option<Duration> {
        self.task_lease
    }

    fn lock(&self) -> Result<MutexGuard<'_, OrchestratorState>> {
        self.state.lock().map_err(|_| Error::StatePoisoned)
    }

    /// Parse `text`, register it as a pending expression and queue its ready tasks.
    ///
    /// # Errors
    /// Returns `Error::InvalidExpression` if the text does not parse; no
    /// expression is created in that case.
    pub fn submit(&self, text: &str) -> Result<ExpressionId> {
        let ast = match parse(text) {
            Ok(ast) => ast,
            Err(e) => {
                alog_debug!("Rejected expression {:?}: {}", text, e);
                return Err(e);
            }
        };

        let mut state = self.lock()?;
        let id = state.next_expression_id();
        let mut expression = Expression::new(id, text, ast);
        let tasks = self.scheduler.discover_ready(&mut expression);
        alog!(
            "Expression {} submitted: {} ({} ready task(s), status {})",
            id,
            expression.ast(),
            tasks.len(),
            expression.status()
        );

        state.expressions.insert(id, expression);
        for task in tasks {
            state.queue.enqueue(task);
        }
        Ok(id)
    }

    /// Hand the oldest queued task to a worker.
    ///
    /// # Errors
    /// Returns `Error::NoTaskAvailable` immediately when the queue is empty.
    pub fn poll_task(&self) -> Result<Task> {
        let mut state = self.lock()?;
        let task = match state.queue.pop_next(Instant::now()) {
            Ok(task) => task,
            Err(e) => {
                alog_trace!("Poll: no task available");
                return Err(e);
            }
        };
        if let Some(expression) = state.expressions.get_mut(&task.expression_id) {
            expression.mark_in_progress();
        }
        alog_debug!(
            "Dispatched task {} of expression {}",
            task,
            task.expression_id
        );
        Ok(task)
    }

    /// Apply a worker's result, queue newly ready tasks and complete the
    /// expression if its root is now resolved.
    ///
    /// Returns the expression's status after the result is applied.
    ///
    /// # Errors
    /// Returns `Error::TaskNotFound` for unknown ids and for ids whose
    /// result was already applied. Tree state is left untouched.
    pub fn complete_task(&self, id: TaskId, result: f64) -> Result<ExpressionStatus> {
        let mut state = self.lock()?;
        let state = &mut *state;

        let (expression_id, node) = match state.queue.lookup(&id) {
            Ok(task) => (task.expression_id, task.node),
            Err(e) => {
                alog_warn!("Result for unknown task {} rejected", id);
                return Err(e);
            }
        };
        let expression = state
            .expressions
            .get_mut(&expression_id)
            .ok_or(Error::ExpressionNotFound(expression_id))?;

        expression.ast_mut().resolve(node, result)?;
        state.queue.remove(&id)?;
        // A result may arrive for a task no worker polled
        expression.mark_in_progress();
        alog_debug!(
            "Task {} resolved to {} in expression {}",
            id.short(),
            result,
            expression_id
        );

        for task in self.scheduler.discover_ready(expression) {
            state.queue.enqueue(task);
        }
        if expression.sync_completion() {
            alog!(
                "Expression {} completed: {} = {}",
                expression_id,
                expression.text,
                result
            );
        }
        Ok(expression.status())
    }

    /// Status and result of one expression.
    ///
    /// # Errors
    /// Returns `Error::ExpressionNotFound` for unknown ids.
    pub fn get_expression(&self, id: ExpressionId) -> Result<ExpressionView> {
        let state = self.lock()?;
        state
            .expressions
            .get(&id)
            .map(Expression::view)
            .ok_or(Error::ExpressionNotFound(id))
    }

    /// Snapshot of every expression, ordered by id.
    pub fn list_expressions(&self) -> Result<Vec<ExpressionView>> {
        let state = self.lock()?;
        Ok(state.expressions.values().map(Expression::view).collect())
    }

    /// Put in-flight tasks whose lease has expired back on the queue.
    ///
    /// Returns the number of reclaimed tasks; always zero without a lease.
    pub fn reclaim_expired(&self) -> Result<usize> {
        self.reclaim_expired_at(Instant::now())
    }

    pub fn reclaim_expired_at(&self, now: Instant) -> Result<usize> {
        let Some(lease) = self.task_lease else {
            return Ok(0);
        };
        let mut state = self.lock()?;
        let reclaimed = state.queue.reclaim_expired(lease, now);
        for id in &reclaimed {
            alog_warn!("Task {} lease expired after {:?}, requeued", id.short(), lease);
        }
        Ok(reclaimed.len())
    }

    pub fn stats(&self) -> Result<OrchestratorStats> {
        let state = self.lock()?;
        let mut stats = OrchestratorStats {
            queued_tasks: state.queue.queued_count(),
            in_flight_tasks: state.queue.in_flight_count(),
            ..Default::default()
        };
        for expression in state.expressions.values() {
            match expression.status() {
                ExpressionStatus::Pending => stats.pending += 1,
                ExpressionStatus::InProgress => stats.in_progress += 1,
                ExpressionStatus::Completed => stats.completed += 1,
            }
        }
        Ok(stats)
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(Scheduler::default())
    }
}
