//! Readiness scanning for operation trees.
//!
//! The scheduler walks an expression's tree and turns every operation whose
//! operands are both known into a task. A node yields at most one task over
//! its lifetime: the `task_in_flight` flag set here is never cleared, so a
//! scan can run after every state change without producing duplicates.

use crate::alog_debug;
use crate::config::OperationTimings;
use crate::core::{Expression, Task};

/// Generates tasks for ready operation nodes.
#[derive(Debug, Clone)]
pub struct Scheduler {
    /// Expected duration per operator, stamped onto each task.
    timings: OperationTimings,
}

impl Scheduler {
    pub fn new(timings: OperationTimings) -> Self {
        Self { timings }
    }

    pub fn timings(&self) -> &OperationTimings {
        &self.timings
    }

    /// Create tasks for every newly ready node of `expression`.
    ///
    /// Tasks come back in post-order, left subtree before right; callers
    /// enqueue them in that order. Calling this twice without resolving a
    /// node in between returns nothing the second time.
    pub fn discover_ready(&self, expression: &mut Expression) -> Vec<Task> {
        let expression_id = expression.id;
        let ast = expression.ast_mut();
        let mut tasks = Vec::new();

        for index in ast.ready_nodes() {
            let (Some(node), Some(operands)) = (ast.node(index), ast.operands(index)) else {
                continue;
            };
            if node.task_in_flight() {
                continue;
            }
            let Some(operator) = node.operator() else {
                continue;
            };
            if !ast.claim(index) {
                continue;
            }

            let task = Task::new(
                expression_id,
                index,
                operator,
                operands,
                self.timings.for_operator(operator),
            );
            alog_debug!(
                "Scheduler: expression {} node {} ready -> task {}",
                expression_id,
                index.index(),
                task
            );
            tasks.push(task);
        }

        tasks
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(OperationTimings::default())
    }
}
