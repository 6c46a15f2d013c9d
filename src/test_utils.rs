#[cfg(test)]
pub mod test_helpers {
    use crate::db::models::{EnergyLevel, StatusFunnel, Task, TaskStatus};
    use crate::db::{create_pool, run_migrations};
    use chrono::{DateTime, Utc};
    use sqlx::SqlitePool;
    use tempfile::TempDir;

    pub const OWNER: &str = "alice";

    pub struct TestContext {
        pub pool: SqlitePool,
        pub _temp_dir: TempDir,
    }

    impl TestContext {
        pub async fn new() -> Self {
            let temp_dir = TempDir::new().unwrap();
            let db_path = temp_dir.path().join("daybook.db");

            let pool = create_pool(&db_path).await.unwrap();
            run_migrations(&pool).await.unwrap();

            Self {
                pool,
                _temp_dir: temp_dir,
            }
        }

        pub fn pool(&self) -> &SqlitePool {
            &self.pool
        }
    }

    /// In-memory task fixture for the pure engines.
    pub fn task(id: i64, title: &str) -> Task {
        let now = Utc::now();
        Task {
            id,
            owner_id: OWNER.to_string(),
            title: title.to_string(),
            description: None,
            status: TaskStatus::Todo,
            parent_id: None,
            status_funnel: StatusFunnel::Backlog,
            energy_level: None,
            context_id: None,
            position: 0,
            due_date: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn in_funnel(mut t: Task, funnel: StatusFunnel, position: i64) -> Task {
        t.status_funnel = funnel;
        t.position = position;
        t
    }

    pub fn today(mut t: Task, energy: Option<EnergyLevel>, position: i64) -> Task {
        t.status_funnel = StatusFunnel::Today;
        t.energy_level = energy;
        t.position = position;
        t
    }

    pub fn subtask(mut t: Task, parent_id: i64, position: i64) -> Task {
        t.parent_id = Some(parent_id);
        t.position = position;
        t
    }

    pub fn done_at(mut t: Task, at: DateTime<Utc>) -> Task {
        t.status = TaskStatus::Done;
        t.completed_at = Some(at);
        t
    }

    pub fn done(t: Task) -> Task {
        done_at(t, Utc::now())
    }

    pub fn in_progress(mut t: Task) -> Task {
        t.status = TaskStatus::InProgress;
        t
    }
}
