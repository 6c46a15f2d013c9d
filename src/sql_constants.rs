//! SQL query constants
//!
//! Every task query is scoped by `owner_id`; a task that exists but belongs
//! to someone else is indistinguishable from a missing one.

// ============================================================================
// Task Queries
// ============================================================================

/// Owner's tasks in stable order
pub const SELECT_OWNER_TASKS: &str = r#"
    SELECT id, owner_id, title, description, status, parent_id, status_funnel,
           energy_level, context_id, position, due_date, completed_at, created_at, updated_at
    FROM tasks
    WHERE owner_id = ?
    ORDER BY parent_id IS NOT NULL, position, id
"#;

pub const SELECT_OWNER_TASK: &str = r#"
    SELECT id, owner_id, title, description, status, parent_id, status_funnel,
           energy_level, context_id, position, due_date, completed_at, created_at, updated_at
    FROM tasks
    WHERE id = ? AND owner_id = ?
"#;

pub const INSERT_TASK: &str = r#"
    INSERT INTO tasks (owner_id, title, description, status, parent_id, status_funnel,
                       energy_level, context_id, position, due_date, completed_at,
                       created_at, updated_at)
    VALUES (?, ?, ?, 'todo', ?, ?, ?, ?, ?, ?, NULL, ?, ?)
"#;

/// Rewrite every mutable column of one task
pub const UPDATE_TASK_ROW: &str = r#"
    UPDATE tasks
    SET title = ?, description = ?, status = ?, status_funnel = ?, energy_level = ?,
        context_id = ?, position = ?, due_date = ?, completed_at = ?, updated_at = ?
    WHERE id = ? AND owner_id = ?
"#;

pub const DELETE_SUBTASKS: &str = "DELETE FROM tasks WHERE parent_id = ? AND owner_id = ?";

pub const DELETE_TASK: &str = "DELETE FROM tasks WHERE id = ? AND owner_id = ?";

pub const MOVE_TO_BACKLOG: &str = r#"
    UPDATE tasks
    SET status_funnel = 'backlog', position = ?, updated_at = ?
    WHERE id = ? AND owner_id = ?
"#;

// ============================================================================
// Stats Queries
// ============================================================================

pub const SELECT_STATS: &str = r#"
    SELECT owner_id, streak, xp, last_completed_date, updated_at
    FROM user_stats
    WHERE owner_id = ?
"#;

pub const UPSERT_STATS: &str = r#"
    INSERT INTO user_stats (owner_id, streak, xp, last_completed_date, updated_at)
    VALUES (?, ?, ?, ?, ?)
    ON CONFLICT(owner_id) DO UPDATE SET
        streak = excluded.streak,
        xp = excluded.xp,
        last_completed_date = excluded.last_completed_date,
        updated_at = excluded.updated_at
"#;
