use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use super::auth::OwnerContext;
use super::models::*;
use super::server::AppState;
use crate::db::models::{NewTask, TaskPatch};
use crate::error::PlannerError;
use crate::stats::StatsManager;
use crate::tasks::TaskManager;

/// Error leaving a handler, rendered as `ApiError` JSON
#[derive(Debug)]
pub struct HandlerError(pub PlannerError);

impl From<PlannerError> for HandlerError {
    fn from(err: PlannerError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for HandlerError {
    fn from(rejection: JsonRejection) -> Self {
        Self(PlannerError::InvalidInput(rejection.body_text()))
    }
}

/// HTTP status for an error crossing the REST boundary
pub fn status_for(err: &PlannerError) -> StatusCode {
    match err {
        PlannerError::InvalidInput(_) | PlannerError::JsonError(_) => StatusCode::BAD_REQUEST,
        PlannerError::UncompletedSubtasks { .. } => StatusCode::CONFLICT,
        PlannerError::TaskNotFound(_) => StatusCode::NOT_FOUND,
        PlannerError::Unauthorized => StatusCode::UNAUTHORIZED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = status_for(&err);
        if status.is_server_error() {
            crate::log_error!(err, "request");
        }

        let details = match &err {
            PlannerError::UncompletedSubtasks {
                task_id,
                incomplete,
            } => Some(json!({ "task_id": task_id, "incomplete_count": incomplete })),
            PlannerError::TaskNotFound(id) => Some(json!({ "task_id": id })),
            _ => None,
        };

        (
            status,
            Json(ApiError {
                code: err.to_error_code().to_string(),
                message: err.to_string(),
                details,
            }),
        )
            .into_response()
    }
}

type HandlerResult<T> = Result<T, HandlerError>;

/// List the owner's tasks
pub async fn list_tasks(
    State(state): State<AppState>,
    owner: OwnerContext,
    Query(query): Query<OwnerQuery>,
) -> HandlerResult<impl IntoResponse> {
    owner.check_query(query.owner.as_deref())?;
    let tasks = TaskManager::new(&state.db_pool)
        .list_tasks(owner.as_str())
        .await?;
    Ok(Json(ApiResponse { data: tasks }))
}

/// Get a single task by ID
pub async fn get_task(
    State(state): State<AppState>,
    owner: OwnerContext,
    Path(id): Path<i64>,
) -> HandlerResult<impl IntoResponse> {
    let task = TaskManager::new(&state.db_pool)
        .get_task(owner.as_str(), id)
        .await?;
    Ok(Json(ApiResponse { data: task }))
}

/// Create a new task
pub async fn create_task(
    State(state): State<AppState>,
    owner: OwnerContext,
    payload: Result<Json<NewTask>, JsonRejection>,
) -> HandlerResult<impl IntoResponse> {
    let Json(new) = payload?;
    let task = TaskManager::new(&state.db_pool)
        .add_task(owner.as_str(), &new)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse { data: task })))
}

/// Update a task
///
/// When the update completes tasks, the response carries the new stats.
pub async fn update_task(
    State(state): State<AppState>,
    owner: OwnerContext,
    Path(id): Path<i64>,
    payload: Result<Json<TaskPatch>, JsonRejection>,
) -> HandlerResult<impl IntoResponse> {
    let Json(patch) = payload?;
    let response = TaskManager::new(&state.db_pool)
        .update_task(owner.as_str(), id, &patch)
        .await?;
    Ok(Json(ApiResponse { data: response }))
}

/// Delete a task and its subtasks
pub async fn delete_task(
    State(state): State<AppState>,
    owner: OwnerContext,
    Path(id): Path<i64>,
) -> HandlerResult<impl IntoResponse> {
    let deleted = TaskManager::new(&state.db_pool)
        .delete_task(owner.as_str(), id)
        .await?;
    Ok(Json(ApiResponse {
        data: DeleteResponse { deleted },
    }))
}

/// Move open "today" tasks back to the backlog
pub async fn clean_slate(
    State(state): State<AppState>,
    owner: OwnerContext,
) -> HandlerResult<impl IntoResponse> {
    let response = TaskManager::new(&state.db_pool)
        .clean_slate(owner.as_str())
        .await?;
    Ok(Json(ApiResponse { data: response }))
}

/// Get the owner's stats, zeros if nothing was completed yet
pub async fn get_stats(
    State(state): State<AppState>,
    owner: OwnerContext,
    Query(query): Query<OwnerQuery>,
) -> HandlerResult<impl IntoResponse> {
    owner.check_query(query.owner.as_deref())?;
    let stats = StatsManager::new(&state.db_pool)
        .get_snapshot(owner.as_str())
        .await?;
    Ok(Json(ApiResponse { data: stats }))
}
