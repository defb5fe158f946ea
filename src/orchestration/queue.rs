//! Dispatch queue and task directory.
//!
//! Every live task is held in the directory, keyed by id, from creation
//! until its result is applied. The queue is a FIFO of ids waiting for a
//! worker. Removing a task from the directory makes any queue entry for it
//! stale; stale entries are skipped when popping.

use crate::core::{Task, TaskId};
use crate::error::{Error, Result};
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// Where a live task currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Waiting in the queue for a worker.
    Queued,
    /// Handed to a worker at `leased_at`.
    InFlight { leased_at: Instant },
}

#[derive(Debug)]
struct TaskEntry {
    task: Task,
    state: TaskState,
}

/// FIFO handout of pending tasks plus lookup of live tasks by id.
#[derive(Debug, Default)]
pub struct DispatchQueue {
    pending: VecDeque<TaskId>,
    directory: HashMap<TaskId, TaskEntry>,
}

impl DispatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new task to the back of the queue.
    pub fn enqueue(&mut self, task: Task) {
        let id = task.id;
        self.directory.insert(
            id,
            TaskEntry {
                task,
                state: TaskState::Queued,
            },
        );
        self.pending.push_back(id);
    }

    /// Remove and return the task at the head of the queue, marking it in flight.
    ///
    /// # Errors
    /// Returns `Error::NoTaskAvailable` when nothing is queued. Never blocks.
    pub fn pop_next(&mut self, now: Instant) -> Result<Task> {
        while let Some(id) = self.pending.pop_front() {
            let Some(entry) = self.directory.get_mut(&id) else {
                continue;
            };
            if entry.state != TaskState::Queued {
                continue;
            }
            entry.state = TaskState::InFlight { leased_at: now };
            return Ok(entry.task.clone());
        }
        Err(Error::NoTaskAvailable)
    }

    /// Find a live task without removing it.
    ///
    /// # Errors
    /// Returns `Error::TaskNotFound` for unknown or already removed ids.
    pub fn lookup(&self, id: &TaskId) -> Result<&Task> {
        self.directory
            .get(id)
            .map(|entry| &entry.task)
            .ok_or(Error::TaskNotFound(*id))
    }

    pub fn state(&self, id: &TaskId) -> Option<TaskState> {
        self.directory.get(id).map(|entry| entry.state)
    }

    /// Drop a task once its result has been applied.
    ///
    /// # Errors
    /// Returns `Error::TaskNotFound` for unknown or already removed ids.
    pub fn remove(&mut self, id: &TaskId) -> Result<Task> {
        self.directory
            .remove(id)
            .map(|entry| entry.task)
            .ok_or(Error::TaskNotFound(*id))
    }

    /// Return in-flight tasks leased at or before `now - lease` to the back of the queue.
    ///
    /// Reclaimed tasks keep their id, so a late result from the first
    /// worker is still accepted. Ids come back in lease order.
    pub fn reclaim_expired(&mut self, lease: Duration, now: Instant) -> Vec<TaskId> {
        let mut expired: Vec<(Instant, TaskId)> = self
            .directory
            .iter()
            .filter_map(|(id, entry)| match entry.state {
                TaskState::InFlight { leased_at }
                    if now.saturating_duration_since(leased_at) >= lease =>
                {
                    Some((leased_at, *id))
                }
                _ => None,
            })
            .collect();
        expired.sort_by_key(|(leased_at, _)| *leased_at);

        let mut reclaimed = Vec::with_capacity(expired.len());
        for (_, id) in expired {
            if let Some(entry) = self.directory.get_mut(&id) {
                entry.state = TaskState::Queued;
                self.pending.push_back(id);
                reclaimed.push(id);
            }
        }
        reclaimed
    }

    /// Ids waiting for a worker, in dispatch order.
    pub fn queued_ids(&self) -> Vec<TaskId> {
        self.pending
            .iter()
            .filter(|id| self.state(id) == Some(TaskState::Queued))
            .copied()
            .collect()
    }

    /// Tasks waiting for a worker.
    pub fn queued_count(&self) -> usize {
        self.directory
            .values()
            .filter(|entry| entry.state == TaskState::Queued)
            .count()
    }

    /// Tasks handed out and awaiting a result.
    pub fn in_flight_count(&self) -> usize {
        self.directory.len() - self.queued_count()
    }

    pub fn is_empty(&self) -> bool {
        self.directory.is_empty()
    }
}
