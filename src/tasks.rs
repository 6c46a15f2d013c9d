use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};

use crate::board::TaskBoard;
use crate::classifier::{bucket_of, BucketKey};
use crate::completion;
use crate::db::models::{
    CleanSlateResponse, NewTask, Task, TaskPatch, TaskUpdateResponse,
};
use crate::error::{PlannerError, Result};
use crate::log_task_operation;
use crate::sql_constants::{
    DELETE_SUBTASKS, DELETE_TASK, INSERT_TASK, MOVE_TO_BACKLOG, SELECT_OWNER_TASK,
    SELECT_OWNER_TASKS, UPDATE_TASK_ROW,
};
use crate::stats::record_completions;

/// Owner-scoped task store backed by SQLite.
///
/// Status changes run through the completion engine here as well, so the
/// store stays authoritative for the guard, the cascade and the stats.
pub struct TaskManager<'a> {
    pool: &'a SqlitePool,
}

impl<'a> TaskManager<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a transaction that holds the write lock from the start.
    ///
    /// Every write reads the board first; a deferred transaction would fail
    /// with SQLITE_BUSY when upgrading instead of waiting out the busy timeout.
    async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }

    /// All tasks of an owner, top-level first, in position order
    pub async fn list_tasks(&self, owner_id: &str) -> Result<Vec<Task>> {
        let mut conn = self.pool.acquire().await?;
        fetch_owner_tasks(&mut conn, owner_id).await
    }

    /// Get a task by ID; tasks of other owners are reported as not found
    pub async fn get_task(&self, owner_id: &str, id: i64) -> Result<Task> {
        let task = sqlx::query_as::<_, Task>(SELECT_OWNER_TASK)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(PlannerError::TaskNotFound(id))?;

        Ok(task)
    }

    /// Add a new task, appended to the end of its bucket
    pub async fn add_task(&self, owner_id: &str, new: &NewTask) -> Result<Task> {
        new.validate()?;
        let now = Utc::now();

        let mut tx = self.begin_write().await?;
        let board = load_board(&mut tx, owner_id).await?;

        let bucket = match new.parent_id {
            Some(parent_id) => {
                let parent = board
                    .get(parent_id)
                    .ok_or(PlannerError::TaskNotFound(parent_id))?;
                if parent.is_subtask() {
                    return Err(PlannerError::InvalidInput(format!(
                        "Task #{} is a subtask and cannot have subtasks of its own",
                        parent_id
                    )));
                }
                BucketKey::Subtasks { parent_id }
            },
            None => BucketKey::for_funnel(new.status_funnel.unwrap_or_default(), new.energy_level),
        };
        let position = board.next_position(bucket, None);

        let result = sqlx::query(INSERT_TASK)
            .bind(owner_id)
            .bind(new.title.trim())
            .bind(new.description.as_deref())
            .bind(new.parent_id)
            .bind(new.status_funnel.unwrap_or_default())
            .bind(new.energy_level)
            .bind(new.context_id.as_deref())
            .bind(position)
            .bind(new.due_date)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        let id = result.last_insert_rowid();
        log_task_operation!("create", id, bucket.to_string());
        self.get_task(owner_id, id).await
    }

    /// Update a task
    ///
    /// A status change is guarded and may cascade to the parent; every
    /// completing transition advances the owner's stats in the same
    /// transaction. A task that lands in a different bucket without an
    /// explicit position is appended to it, and the bucket it left is
    /// renumbered.
    pub async fn update_task(
        &self,
        owner_id: &str,
        id: i64,
        patch: &TaskPatch,
    ) -> Result<TaskUpdateResponse> {
        patch.validate()?;
        let now = Utc::now();

        let mut tx = self.begin_write().await?;
        let mut board = load_board(&mut tx, owner_id).await?;
        let original = board
            .get(id)
            .cloned()
            .ok_or(PlannerError::TaskNotFound(id))?;

        let transitions = match patch.status {
            Some(status) => completion::set_status(&board, id, status, now)?,
            None => Vec::new(),
        };
        let previous = board.buckets_of(
            std::iter::once(id).chain(transitions.iter().map(|t| t.task_id)),
        );
        completion::apply(&mut board, &transitions, now);

        let Some(task) = board.get_mut(id) else {
            return Err(PlannerError::TaskNotFound(id));
        };
        patch.apply_fields(task);
        task.updated_at = now;

        let old_bucket = bucket_of(&original);
        let new_bucket = bucket_of(task);
        if patch.position.is_none() && new_bucket != old_bucket && new_bucket != BucketKey::Archive
        {
            let position = board.next_position(new_bucket, Some(id));
            if let Some(task) = board.get_mut(id) {
                task.position = position;
            }
        }

        let shifted = board.close_gaps(&previous);

        let mut touched = vec![id];
        touched.extend(transitions.iter().map(|t| t.task_id).filter(|&t| t != id));
        touched.extend(shifted.iter().map(|a| a.id));
        for task_id in &touched {
            if let Some(task) = board.get(*task_id) {
                write_task(&mut tx, task).await?;
            }
        }

        let completions: Vec<DateTime<Utc>> = transitions
            .iter()
            .filter(|t| t.completes())
            .filter_map(|t| t.completed_at)
            .collect();
        let stats = record_completions(&mut tx, owner_id, &completions).await?;

        tx.commit().await?;

        for transition in &transitions {
            log_task_operation!(
                "status",
                transition.task_id,
                format!("{} -> {}", transition.from, transition.to)
            );
        }

        let cascaded = transitions
            .iter()
            .filter(|t| t.cascaded)
            .filter_map(|t| board.get(t.task_id).cloned())
            .collect();
        let task = board
            .get(id)
            .cloned()
            .ok_or(PlannerError::TaskNotFound(id))?;

        Ok(TaskUpdateResponse {
            task,
            cascaded,
            stats: stats.map(|s| s.snapshot()),
        })
    }

    /// Delete a task. Deleting a parent deletes its subtasks with it.
    ///
    /// Returns the ids removed, parent first.
    pub async fn delete_task(&self, owner_id: &str, id: i64) -> Result<Vec<i64>> {
        let mut tx = self.begin_write().await?;
        let mut board = load_board(&mut tx, owner_id).await?;
        if !board.contains(id) {
            return Err(PlannerError::TaskNotFound(id));
        }
        let removed: Vec<i64> = board.remove_with_subtasks(id).iter().map(|t| t.id).collect();

        sqlx::query(DELETE_SUBTASKS)
            .bind(id)
            .bind(owner_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(DELETE_TASK)
            .bind(id)
            .bind(owner_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        log_task_operation!("delete", id, format!("{} row(s)", removed.len()));
        Ok(removed)
    }

    /// Move every open top-level "today" task back to the end of the backlog.
    ///
    /// In-progress tasks stay and are renumbered within their column.
    pub async fn clean_slate(&self, owner_id: &str) -> Result<CleanSlateResponse> {
        let now = Utc::now();
        let mut tx = self.begin_write().await?;
        let mut board = load_board(&mut tx, owner_id).await?;
        let outcome = board.apply_clean_slate(now);

        for assignment in &outcome.moved {
            sqlx::query(MOVE_TO_BACKLOG)
                .bind(assignment.position)
                .bind(now)
                .bind(assignment.id)
                .bind(owner_id)
                .execute(&mut *tx)
                .await?;
        }
        for assignment in &outcome.shifted {
            if let Some(task) = board.get(assignment.id) {
                write_task(&mut tx, task).await?;
            }
        }
        tx.commit().await?;

        tracing::info!(
            owner = owner_id,
            moved = outcome.moved.len(),
            shifted = outcome.shifted.len(),
            "Clean slate"
        );
        Ok(CleanSlateResponse {
            moved_count: outcome.moved.len(),
        })
    }
}

async fn fetch_owner_tasks(conn: &mut SqliteConnection, owner_id: &str) -> Result<Vec<Task>> {
    let tasks = sqlx::query_as::<_, Task>(SELECT_OWNER_TASKS)
        .bind(owner_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(tasks)
}

async fn load_board(conn: &mut SqliteConnection, owner_id: &str) -> Result<TaskBoard> {
    Ok(TaskBoard::from_tasks(fetch_owner_tasks(conn, owner_id).await?))
}

async fn write_task(conn: &mut SqliteConnection, task: &Task) -> Result<()> {
    sqlx::query(UPDATE_TASK_ROW)
        .bind(&task.title)
        .bind(task.description.as_deref())
        .bind(task.status)
        .bind(task.status_funnel)
        .bind(task.energy_level)
        .bind(task.context_id.as_deref())
        .bind(task.position)
        .bind(task.due_date)
        .bind(task.completed_at)
        .bind(task.updated_at)
        .bind(task.id)
        .bind(&task.owner_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
