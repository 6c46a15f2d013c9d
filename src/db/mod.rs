pub mod models;

use crate::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;

pub async fn create_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .busy_timeout(std::time::Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(pool)
        .await?;

    // Create tasks table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tasks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            status TEXT NOT NULL DEFAULT 'todo',
            parent_id INTEGER,
            status_funnel TEXT NOT NULL DEFAULT 'backlog',
            energy_level TEXT,
            context_id TEXT,
            position INTEGER NOT NULL DEFAULT 0,
            due_date DATETIME,
            completed_at DATETIME,
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL,
            FOREIGN KEY (parent_id) REFERENCES tasks(id) ON DELETE CASCADE,
            CHECK (status IN ('todo', 'in_progress', 'done')),
            CHECK (status_funnel IN ('backlog', 'weekly', 'today')),
            CHECK (energy_level IS NULL OR energy_level IN ('high_focus', 'low_energy')),
            CHECK (owner_id != ''),
            CHECK ((status = 'done') = (completed_at IS NOT NULL))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tasks_owner ON tasks(owner_id)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tasks_parent ON tasks(parent_id)")
        .execute(pool)
        .await?;

    // Create stats table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_stats (
            owner_id TEXT PRIMARY KEY,
            streak INTEGER NOT NULL DEFAULT 0,
            xp INTEGER NOT NULL DEFAULT 0,
            last_completed_date DATETIME,
            updated_at DATETIME NOT NULL,
            CHECK (streak >= 0),
            CHECK (xp >= 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
