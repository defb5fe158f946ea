//! Expression data model.

use crate::core::ast::Ast;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a submitted expression, handed out sequentially from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpressionId(pub u64);

impl std::fmt::Display for ExpressionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ExpressionId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Lifecycle of an expression. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExpressionStatus {
    /// Submitted, none of its tasks handed out yet
    #[default]
    Pending,
    /// At least one task has been handed to a worker
    InProgress,
    /// The root is resolved and the result is known
    Completed,
}

impl std::fmt::Display for ExpressionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExpressionStatus::Pending => write!(f, "pending"),
            ExpressionStatus::InProgress => write!(f, "in_progress"),
            ExpressionStatus::Completed => write!(f, "completed"),
        }
    }
}

/// One user submission and its operation tree.
#[derive(Debug)]
pub struct Expression {
    pub id: ExpressionId,
    /// Source text as submitted.
    pub text: String,
    status: ExpressionStatus,
    result: Option<f64>,
    ast: Ast,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Expression {
    /// Create a pending expression. A tree that is already resolved (a bare
    /// number) completes immediately.
    pub fn new(id: ExpressionId, text: &str, ast: Ast) -> Self {
        let mut expression = Self {
            id,
            text: text.to_string(),
            status: ExpressionStatus::Pending,
            result: None,
            ast,
            created_at: Utc::now(),
            completed_at: None,
        };
        expression.sync_completion();
        expression
    }

    pub fn status(&self) -> ExpressionStatus {
        self.status
    }

    pub fn result(&self) -> Option<f64> {
        self.result
    }

    pub fn ast(&self) -> &Ast {
        &self.ast
    }

    pub fn ast_mut(&mut self) -> &mut Ast {
        &mut self.ast
    }

    /// Record that one of this expression's tasks was handed to a worker.
    pub fn mark_in_progress(&mut self) {
        if self.status == ExpressionStatus::Pending {
            self.status = ExpressionStatus::InProgress;
        }
    }

    /// Complete the expression if its root has been resolved.
    ///
    /// Returns `true` if this call performed the transition.
    pub fn sync_completion(&mut self) -> bool {
        if self.status == ExpressionStatus::Completed {
            return false;
        }
        match self.ast.value() {
            Some(value) => {
                self.status = ExpressionStatus::Completed;
                self.result = Some(value);
                self.completed_at = Some(Utc::now());
                true
            }
            None => false,
        }
    }

    pub fn view(&self) -> ExpressionView {
        ExpressionView {
            id: self.id,
            expression: self.text.clone(),
            status: self.status,
            result: self.result,
        }
    }
}

/// Snapshot of an expression returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionView {
    pub id: ExpressionId,
    pub expression: String,
    pub status: ExpressionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<f64>,
}
