use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use crate::db::models::{StatsSnapshot, UserStats};
use crate::error::Result;
use crate::gamification::advance_many;
use crate::sql_constants::{SELECT_STATS, UPSERT_STATS};

/// Per-owner streak/XP record, created on the first completion
pub struct StatsManager<'a> {
    pool: &'a SqlitePool,
}

impl<'a> StatsManager<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_stats(&self, owner_id: &str) -> Result<Option<UserStats>> {
        let mut conn = self.pool.acquire().await?;
        load_stats(&mut conn, owner_id).await
    }

    /// Stats for display, zeros when the owner has never completed anything
    pub async fn get_snapshot(&self, owner_id: &str) -> Result<StatsSnapshot> {
        Ok(self
            .get_stats(owner_id)
            .await?
            .map(|s| s.snapshot())
            .unwrap_or_else(|| StatsSnapshot::zero(owner_id)))
    }
}

pub(crate) async fn load_stats(
    conn: &mut SqliteConnection,
    owner_id: &str,
) -> Result<Option<UserStats>> {
    let stats = sqlx::query_as::<_, UserStats>(SELECT_STATS)
        .bind(owner_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(stats)
}

async fn save_stats(conn: &mut SqliteConnection, stats: &UserStats) -> Result<()> {
    sqlx::query(UPSERT_STATS)
        .bind(&stats.owner_id)
        .bind(stats.streak)
        .bind(stats.xp)
        .bind(stats.last_completed_date)
        .bind(stats.updated_at)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Advance and persist stats once per completion instant.
///
/// Returns `None` when there was nothing to record.
pub(crate) async fn record_completions(
    conn: &mut SqliteConnection,
    owner_id: &str,
    completions: &[DateTime<Utc>],
) -> Result<Option<UserStats>> {
    if completions.is_empty() {
        return Ok(None);
    }
    let prev = load_stats(conn, owner_id).await?;
    let next = advance_many(owner_id, prev.as_ref(), completions.iter().copied());
    if let Some(stats) = &next {
        save_stats(conn, stats).await?;
        tracing::debug!(
            owner = owner_id,
            streak = stats.streak,
            xp = stats.xp,
            "Stats advanced"
        );
    }
    Ok(next)
}
