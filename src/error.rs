use thiserror::Error;

use crate::core::{ExpressionId, TaskId};

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid expression: {0}")]
    InvalidExpression(String),

    #[error("No task available")]
    NoTaskAvailable,

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Expression not found: {0}")]
    ExpressionNotFound(ExpressionId),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Orchestrator state lock poisoned")]
    StatePoisoned,

    #[error("Unexpected response from orchestrator: {0}")]
    UnexpectedResponse(String),

    #[error("No home directory")]
    NoHomeDir,

    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Task join error: {0}")]
    TaskJoin(String),
}

impl Error {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidExpression(reason.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
