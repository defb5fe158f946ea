//! Orchestration layer for expression evaluation.
//!
//! This module provides the readiness scanner that turns operation nodes
//! into tasks, the dispatch queue that hands tasks out, the orchestrator
//! that owns all scheduling state, and the worker pool that computes tasks.

mod orchestrator;
mod queue;
mod scheduler;
mod worker;

pub use orchestrator::{Orchestrator, OrchestratorStats};
pub use queue::{DispatchQueue, TaskState};
pub use scheduler::Scheduler;
pub use worker::{compute, TaskSource, WorkerPool};
