//! Streak and XP progression

use chrono::{DateTime, Utc};

use crate::db::models::UserStats;
use crate::time_utils::{is_previous_day, is_same_day};

/// Flat award per completing transition
pub const XP_PER_COMPLETION: i64 = 10;

/// Stats after one completion at `completed_at`.
///
/// Missing stats start from zero. Completing on the day after the last
/// completion extends the streak, completing again on the same day keeps it,
/// anything else (including a last completion in the future) restarts at 1.
pub fn advance_stats(
    owner_id: &str,
    prev: Option<&UserStats>,
    completed_at: DateTime<Utc>,
) -> UserStats {
    let prev = prev.cloned().unwrap_or_else(|| UserStats::empty(owner_id));

    let streak = match prev.last_completed_date {
        None => 1,
        Some(last) if is_previous_day(last, completed_at) => prev.streak + 1,
        Some(last) if is_same_day(last, completed_at) => prev.streak,
        Some(_) => 1,
    };

    UserStats {
        owner_id: prev.owner_id,
        streak,
        xp: prev.xp + XP_PER_COMPLETION,
        last_completed_date: Some(completed_at),
        updated_at: completed_at,
    }
}

/// Fold several completions that happened in one action
pub fn advance_many(
    owner_id: &str,
    prev: Option<&UserStats>,
    completions: impl IntoIterator<Item = DateTime<Utc>>,
) -> Option<UserStats> {
    let mut current: Option<UserStats> = None;
    for completed_at in completions {
        let base = current.as_ref().or(prev);
        current = Some(advance_stats(owner_id, base, completed_at));
    }
    current
}
