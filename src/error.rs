use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(i64),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Task #{task_id} cannot be completed: {incomplete} subtask(s) still open")]
    UncompletedSubtasks { task_id: i64, incomplete: usize },

    #[error("Unauthorized: missing or mismatched owner context")]
    Unauthorized,

    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl PlannerError {
    pub fn to_error_code(&self) -> &'static str {
        match self {
            PlannerError::TaskNotFound(_) => "TASK_NOT_FOUND",
            PlannerError::DatabaseError(_) => "DATABASE_ERROR",
            PlannerError::InvalidInput(_) => "INVALID_INPUT",
            PlannerError::UncompletedSubtasks { .. } => "UNCOMPLETED_SUBTASKS",
            PlannerError::Unauthorized => "UNAUTHORIZED",
            PlannerError::HttpError(_) | PlannerError::PersistenceFailure(_) => {
                "PERSISTENCE_FAILURE"
            },
            _ => "INTERNAL_ERROR",
        }
    }

    pub fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.to_string(),
            code: self.to_error_code().to_string(),
        }
    }

    /// Errors the initiating action reports to the user as-is.
    ///
    /// Everything else is a persistence-class failure: the orchestrator rolls
    /// back and raises a warning instead.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            PlannerError::InvalidInput(_)
                | PlannerError::UncompletedSubtasks { .. }
                | PlannerError::TaskNotFound(_)
                | PlannerError::Unauthorized
        )
    }
}

pub type Result<T> = std::result::Result<T, PlannerError>;
