//! HTTP task source used by remote agents.

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::core::{TaskAssignment, TaskId, TaskResult};
use crate::error::{Error, Result};
use crate::orchestration::TaskSource;
use crate::server::api::TaskResponse;

/// Pulls tasks from and posts results to an orchestrator over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTaskSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTaskSource {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn task_url(&self) -> String {
        format!("{}/internal/task", self.base_url)
    }
}

#[async_trait]
impl TaskSource for HttpTaskSource {
    async fn fetch_task(&self) -> Result<Option<TaskAssignment>> {
        let response = self.client.get(self.task_url()).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body: TaskResponse = response.json().await?;
                Ok(Some(body.task))
            }
            status => Err(Error::UnexpectedResponse(format!(
                "GET /internal/task returned {}",
                status
            ))),
        }
    }

    async fn submit_result(&self, id: TaskId, result: f64) -> Result<()> {
        let response = self
            .client
            .post(self.task_url())
            .json(&TaskResult { id, result })
            .send()
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(Error::TaskNotFound(id)),
            status if status.is_success() => Ok(()),
            status => Err(Error::UnexpectedResponse(format!(
                "POST /internal/task returned {}",
                status
            ))),
        }
    }
}
