//! HTTP handlers for the public expression API and the internal worker API.
//!
//! Handlers are thin: decode, call one orchestrator operation, encode.
//! Errors are returned as `{"error": "..."}` with a status derived from the
//! error kind.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::core::{ExpressionId, ExpressionView, TaskAssignment, TaskResult};
use crate::error::Error;
use crate::orchestration::{Orchestrator, OrchestratorStats};
use crate::{alog_debug, alog_error};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculateRequest {
    pub expression: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculateResponse {
    pub id: ExpressionId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpressionsResponse {
    pub expressions: Vec<ExpressionView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpressionResponse {
    pub expression: ExpressionView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResponse {
    pub task: TaskAssignment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Error returned by handlers.
#[derive(Debug)]
pub enum ApiError {
    /// The orchestrator rejected the operation.
    Core(Error),
    /// The request body could not be decoded.
    InvalidBody(String),
    /// A path parameter could not be decoded.
    InvalidPath(String),
    /// No route matches the request path.
    RouteNotFound,
    /// The route exists but not for this method.
    MethodNotAllowed,
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self::Core(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidBody(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::InvalidPath(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::InvalidBody(reason) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("Invalid body: {}", reason),
            ),
            ApiError::InvalidPath(reason) => (StatusCode::BAD_REQUEST, reason),
            ApiError::RouteNotFound => (StatusCode::NOT_FOUND, "Not Found".to_string()),
            ApiError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                "Method Not Allowed".to_string(),
            ),
            ApiError::Core(e) => {
                let status = match &e {
                    Error::InvalidExpression(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    Error::NoTaskAvailable
                    | Error::TaskNotFound(_)
                    | Error::ExpressionNotFound(_) => StatusCode::NOT_FOUND,
                    _ => {
                        alog_error!("Internal error while handling request: {}", e);
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, e.to_string())
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

/// `POST /api/v1/calculate`
pub async fn calculate(
    State(orchestrator): State<Arc<Orchestrator>>,
    payload: Result<Json<CalculateRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CalculateResponse>), ApiError> {
    let Json(request) = payload?;
    let id = orchestrator.submit(&request.expression)?;
    Ok((StatusCode::CREATED, Json(CalculateResponse { id })))
}

/// `GET /api/v1/expressions`
pub async fn list_expressions(
    State(orchestrator): State<Arc<Orchestrator>>,
) -> Result<Json<ExpressionsResponse>, ApiError> {
    let expressions = orchestrator.list_expressions()?;
    Ok(Json(ExpressionsResponse { expressions }))
}

/// `GET /api/v1/expressions/{id}`
pub async fn get_expression(
    State(orchestrator): State<Arc<Orchestrator>>,
    id: Result<Path<u64>, PathRejection>,
) -> Result<Json<ExpressionResponse>, ApiError> {
    let Path(id) = id?;
    let expression = orchestrator.get_expression(ExpressionId(id))?;
    Ok(Json(ExpressionResponse { expression }))
}

/// `GET /internal/task`
pub async fn get_task(
    State(orchestrator): State<Arc<Orchestrator>>,
) -> Result<Json<TaskResponse>, ApiError> {
    let task = orchestrator.poll_task()?;
    Ok(Json(TaskResponse {
        task: task.assignment(),
    }))
}

/// `POST /internal/task`
pub async fn post_task(
    State(orchestrator): State<Arc<Orchestrator>>,
    payload: Result<Json<TaskResult>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let Json(result) = payload?;
    let status = orchestrator.complete_task(result.id, result.result)?;
    alog_debug!(
        "Result for task {} accepted, expression now {}",
        result.id.short(),
        status
    );
    Ok(Json(StatusResponse {
        status: "result accepted".to_string(),
    }))
}

/// `GET /internal/stats`
pub async fn stats(
    State(orchestrator): State<Arc<Orchestrator>>,
) -> Result<Json<OrchestratorStats>, ApiError> {
    Ok(Json(orchestrator.stats()?))
}

/// Fallback for paths no route matches.
pub async fn not_found() -> ApiError {
    ApiError::RouteNotFound
}

/// Fallback for known paths hit with an unsupported method.
pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
