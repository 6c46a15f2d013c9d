//! Shared helpers for integration tests

use assert_cmd::Command;
use daybook::db::{create_pool, run_migrations};
use sqlx::SqlitePool;
use std::path::PathBuf;
use tempfile::TempDir;

/// Path to the `daybook` binary
#[allow(deprecated)]
pub fn daybook_binary() -> PathBuf {
    std::env::var("CARGO_BIN_EXE_daybook")
        .map(PathBuf::from)
        .unwrap_or_else(|_| assert_cmd::cargo::cargo_bin("daybook"))
}

/// A `daybook` command isolated from the user's home and environment,
/// pointed at a database inside `dir`
#[allow(dead_code)]
pub fn daybook_command(dir: &TempDir, owner: &str) -> Command {
    let mut cmd = Command::new(daybook_binary());
    cmd.env("HOME", dir.path())
        .env_remove("DAYBOOK_API_URL")
        .env_remove("DAYBOOK_DB")
        .env_remove("DAYBOOK_OWNER")
        .env_remove("RUST_LOG")
        .arg("--db")
        .arg(dir.path().join("daybook.db"))
        .arg("--owner")
        .arg(owner);
    cmd
}

/// A migrated database in a temporary directory
#[allow(dead_code)]
pub async fn setup_pool() -> (TempDir, SqlitePool) {
    let temp_dir = TempDir::new().unwrap();
    let pool = create_pool(&temp_dir.path().join("daybook.db"))
        .await
        .unwrap();
    run_migrations(&pool).await.unwrap();
    (temp_dir, pool)
}
