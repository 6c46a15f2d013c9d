//! Task Store abstraction used by the orchestrator.
//!
//! `LocalStore` talks to the SQLite database directly; `HttpStore` talks to a
//! running `daybook serve` over the REST boundary. Both are scoped to a single
//! owner.

use std::future::Future;
use std::time::Duration;

use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sqlx::SqlitePool;

use crate::dashboard::auth::OWNER_HEADER;
use crate::dashboard::models::{ApiError, ApiResponse, DeleteResponse};
use crate::db::models::{
    CleanSlateResponse, NewTask, StatsSnapshot, Task, TaskPatch, TaskUpdateResponse,
};
use crate::error::{PlannerError, Result};
use crate::stats::StatsManager;
use crate::tasks::TaskManager;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Owner-scoped task and stats persistence.
pub trait TaskStore: Send + Sync {
    fn owner_id(&self) -> &str;

    fn list_tasks(&self) -> impl Future<Output = Result<Vec<Task>>> + Send;

    fn create_task(&self, new: &NewTask) -> impl Future<Output = Result<Task>> + Send;

    fn update_task(
        &self,
        id: i64,
        patch: &TaskPatch,
    ) -> impl Future<Output = Result<TaskUpdateResponse>> + Send;

    /// Returns the ids removed (the task and its subtasks)
    fn delete_task(&self, id: i64) -> impl Future<Output = Result<Vec<i64>>> + Send;

    fn clean_slate(&self) -> impl Future<Output = Result<CleanSlateResponse>> + Send;

    fn get_stats(&self) -> impl Future<Output = Result<StatsSnapshot>> + Send;
}

// ── SQLite ──────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct LocalStore {
    pool: SqlitePool,
    owner_id: String,
}

impl LocalStore {
    pub fn new(pool: SqlitePool, owner_id: impl Into<String>) -> Self {
        Self {
            pool,
            owner_id: owner_id.into(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl TaskStore for LocalStore {
    fn owner_id(&self) -> &str {
        &self.owner_id
    }

    fn list_tasks(&self) -> impl Future<Output = Result<Vec<Task>>> + Send {
        async move { TaskManager::new(&self.pool).list_tasks(&self.owner_id).await }
    }

    fn create_task(&self, new: &NewTask) -> impl Future<Output = Result<Task>> + Send {
        async move { TaskManager::new(&self.pool).add_task(&self.owner_id, new).await }
    }

    fn update_task(
        &self,
        id: i64,
        patch: &TaskPatch,
    ) -> impl Future<Output = Result<TaskUpdateResponse>> + Send {
        async move {
            TaskManager::new(&self.pool)
                .update_task(&self.owner_id, id, patch)
                .await
        }
    }

    fn delete_task(&self, id: i64) -> impl Future<Output = Result<Vec<i64>>> + Send {
        async move { TaskManager::new(&self.pool).delete_task(&self.owner_id, id).await }
    }

    fn clean_slate(&self) -> impl Future<Output = Result<CleanSlateResponse>> + Send {
        async move { TaskManager::new(&self.pool).clean_slate(&self.owner_id).await }
    }

    fn get_stats(&self) -> impl Future<Output = Result<StatsSnapshot>> + Send {
        async move { StatsManager::new(&self.pool).get_snapshot(&self.owner_id).await }
    }
}

// ── REST ────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct HttpStore {
    client: reqwest::Client,
    base_url: String,
    owner_id: String,
}

impl HttpStore {
    pub fn new(base_url: impl Into<String>, owner_id: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            client,
            base_url,
            owner_id: owner_id.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned + Send>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.header(OWNER_HEADER, &self.owner_id).send().await?;
        let status = response.status();

        if status.is_success() {
            let body: ApiResponse<T> = response.json().await?;
            return Ok(body.data);
        }

        match response.json::<ApiError>().await {
            Ok(error) => Err(from_api_error(error)),
            Err(_) => Err(PlannerError::PersistenceFailure(format!(
                "Server responded with {}",
                status
            ))),
        }
    }
}

impl TaskStore for HttpStore {
    fn owner_id(&self) -> &str {
        &self.owner_id
    }

    fn list_tasks(&self) -> impl Future<Output = Result<Vec<Task>>> + Send {
        async move {
            let request = self
                .client
                .get(self.url("/tasks"))
                .query(&[("owner", self.owner_id.as_str())]);
            self.send(request).await
        }
    }

    fn create_task(&self, new: &NewTask) -> impl Future<Output = Result<Task>> + Send {
        async move {
            let request = self.client.post(self.url("/tasks")).json(new);
            self.send(request).await
        }
    }

    fn update_task(
        &self,
        id: i64,
        patch: &TaskPatch,
    ) -> impl Future<Output = Result<TaskUpdateResponse>> + Send {
        async move {
            let request = self
                .client
                .patch(self.url(&format!("/tasks/{}", id)))
                .json(patch);
            self.send(request).await
        }
    }

    fn delete_task(&self, id: i64) -> impl Future<Output = Result<Vec<i64>>> + Send {
        async move {
            let request = self.client.delete(self.url(&format!("/tasks/{}", id)));
            let response: DeleteResponse = self.send(request).await?;
            Ok(response.deleted)
        }
    }

    fn clean_slate(&self) -> impl Future<Output = Result<CleanSlateResponse>> + Send {
        async move {
            let request = self.client.post(self.url("/tasks/clean-slate"));
            self.send(request).await
        }
    }

    fn get_stats(&self) -> impl Future<Output = Result<StatsSnapshot>> + Send {
        async move {
            let request = self
                .client
                .get(self.url("/stats"))
                .query(&[("owner", self.owner_id.as_str())]);
            self.send(request).await
        }
    }
}

/// Rebuild a typed error from the REST error body
fn from_api_error(error: ApiError) -> PlannerError {
    let detail = |key: &str| -> Option<i64> {
        error
            .details
            .as_ref()
            .and_then(|d| d.get(key))
            .and_then(Value::as_i64)
    };

    match error.code.as_str() {
        "TASK_NOT_FOUND" => PlannerError::TaskNotFound(detail("task_id").unwrap_or_default()),
        "UNCOMPLETED_SUBTASKS" => PlannerError::UncompletedSubtasks {
            task_id: detail("task_id").unwrap_or_default(),
            incomplete: detail("incomplete_count").unwrap_or_default().max(0) as usize,
        },
        "INVALID_INPUT" => PlannerError::InvalidInput(error.message),
        "UNAUTHORIZED" => PlannerError::Unauthorized,
        _ => PlannerError::PersistenceFailure(format!("{}: {}", error.code, error.message)),
    }
}
