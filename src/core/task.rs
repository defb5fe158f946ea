//! Task data model.
//!
//! A task is one binary operation handed to a worker. It is created the
//! moment both operands of an operation node are known and carries a copy
//! of those operands, so workers never see the tree.

use crate::core::expression::ExpressionId;
use crate::core::operator::Operator;
use chrono::{DateTime, Utc};
use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a task. Serialized as a bare UUID string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    /// Create a new unique task identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Return first 8 characters of the UUID for display.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// One unit of dispatchable work.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    /// Unique identifier for this task.
    pub id: TaskId,
    /// Expression whose tree this task belongs to.
    pub expression_id: ExpressionId,
    pub operator: Operator,
    /// Left operand, copied from the resolved left child.
    pub arg1: f64,
    /// Right operand, copied from the resolved right child.
    pub arg2: f64,
    /// Simulated cost for the worker; the scheduler never waits on it.
    pub operation_time_ms: u64,
    /// The tree node this task's result resolves.
    pub node: NodeIndex,
    /// When the task was created.
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(
        expression_id: ExpressionId,
        node: NodeIndex,
        operator: Operator,
        (arg1, arg2): (f64, f64),
        operation_time_ms: u64,
    ) -> Self {
        Self {
            id: TaskId::new(),
            expression_id,
            operator,
            arg1,
            arg2,
            operation_time_ms,
            node,
            created_at: Utc::now(),
        }
    }

    /// The worker-facing view of this task.
    pub fn assignment(&self) -> TaskAssignment {
        TaskAssignment {
            id: self.id,
            arg1: self.arg1,
            arg2: self.arg2,
            operation: self.operator,
            operation_time: self.operation_time_ms,
        }
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{} {} {}]",
            self.id.short(),
            self.arg1,
            self.operator,
            self.arg2
        )
    }
}

/// What a worker receives: operands, operator and expected duration in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskAssignment {
    pub id: TaskId,
    pub arg1: f64,
    pub arg2: f64,
    pub operation: Operator,
    pub operation_time: u64,
}

/// What a worker posts back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub id: TaskId,
    pub result: f64,
}
