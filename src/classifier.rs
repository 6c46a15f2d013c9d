//! Funnel/energy classification
//!
//! Maps a task to the single bucket it currently occupies and builds the
//! planning, execution and archive views from a set of tasks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::db::models::{EnergyLevel, StatusFunnel, Task};
use crate::error::PlannerError;
use crate::time_utils::{start_of_day, start_of_iso_week, start_of_month};

/// The ordered list context within which `position` is meaningful
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BucketKey {
    Backlog,
    Weekly,
    Today { energy: Option<EnergyLevel> },
    Subtasks { parent_id: i64 },
    Archive,
}

impl BucketKey {
    pub const HIGH_FOCUS: BucketKey = BucketKey::Today {
        energy: Some(EnergyLevel::HighFocus),
    };
    pub const LOW_ENERGY: BucketKey = BucketKey::Today {
        energy: Some(EnergyLevel::LowEnergy),
    };

    pub fn for_funnel(funnel: StatusFunnel, energy: Option<EnergyLevel>) -> Self {
        match funnel {
            StatusFunnel::Backlog => BucketKey::Backlog,
            StatusFunnel::Weekly => BucketKey::Weekly,
            StatusFunnel::Today => BucketKey::Today { energy },
        }
    }

    /// Whether a top-level task can be dragged into this bucket
    pub fn accepts_top_level(&self) -> bool {
        matches!(
            self,
            BucketKey::Backlog | BucketKey::Weekly | BucketKey::Today { .. }
        )
    }

    /// Rewrite the task's funnel/energy so it classifies into this bucket.
    pub fn reclassify(&self, task: &mut Task) -> Result<(), PlannerError> {
        if task.is_subtask() || !self.accepts_top_level() {
            return Err(PlannerError::InvalidInput(format!(
                "Task #{} cannot be moved into bucket '{}'",
                task.id, self
            )));
        }
        match *self {
            BucketKey::Backlog => task.status_funnel = StatusFunnel::Backlog,
            BucketKey::Weekly => task.status_funnel = StatusFunnel::Weekly,
            BucketKey::Today { energy } => {
                task.status_funnel = StatusFunnel::Today;
                task.energy_level = energy;
            },
            BucketKey::Subtasks { .. } | BucketKey::Archive => {},
        }
        Ok(())
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BucketKey::Backlog => f.write_str("backlog"),
            BucketKey::Weekly => f.write_str("weekly"),
            BucketKey::Today { energy: Some(e) } => write!(f, "today:{}", e),
            BucketKey::Today { energy: None } => f.write_str("today:none"),
            BucketKey::Subtasks { parent_id } => write!(f, "subtasks:{}", parent_id),
            BucketKey::Archive => f.write_str("archive"),
        }
    }
}

impl FromStr for BucketKey {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.split_once(':') {
            None => match s {
                "backlog" => Ok(BucketKey::Backlog),
                "weekly" => Ok(BucketKey::Weekly),
                "today" => Ok(BucketKey::Today { energy: None }),
                "archive" => Ok(BucketKey::Archive),
                other => Err(PlannerError::InvalidInput(format!(
                    "Invalid bucket: '{}'",
                    other
                ))),
            },
            Some(("today", energy)) => Ok(BucketKey::Today {
                energy: EnergyLevel::parse_optional(energy)?,
            }),
            Some(("subtasks", id)) => id
                .parse::<i64>()
                .map(|parent_id| BucketKey::Subtasks { parent_id })
                .map_err(|_| PlannerError::InvalidInput(format!("Invalid parent id: '{}'", id))),
            Some(_) => Err(PlannerError::InvalidInput(format!(
                "Invalid bucket: '{}'",
                s
            ))),
        }
    }
}

/// Classify a task into the bucket it currently occupies
pub fn bucket_of(task: &Task) -> BucketKey {
    if let Some(parent_id) = task.parent_id {
        return BucketKey::Subtasks { parent_id };
    }
    if task.is_done() {
        return BucketKey::Archive;
    }
    BucketKey::for_funnel(task.status_funnel, task.energy_level)
}

/// Energy column for the execution view.
///
/// Only open top-level "today" tasks with an assigned energy level appear;
/// unassigned ones stay visible in the planning view only.
pub fn execution_energy(task: &Task) -> Option<EnergyLevel> {
    match bucket_of(task) {
        BucketKey::Today { energy } => energy,
        _ => None,
    }
}

/// Completion-date filter for the archive view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveRange {
    Today,
    Week,
    Month,
    #[default]
    All,
}

impl FromStr for ArchiveRange {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "today" => Ok(Self::Today),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "all" => Ok(Self::All),
            other => Err(PlannerError::InvalidInput(format!(
                "Invalid archive range: '{}'. Use today, week, month or all",
                other
            ))),
        }
    }
}

impl ArchiveRange {
    fn start(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Today => Some(start_of_day(now)),
            Self::Week => Some(start_of_iso_week(now)),
            Self::Month => Some(start_of_month(now)),
            Self::All => None,
        }
    }
}

pub fn in_archive_range(task: &Task, range: ArchiveRange, now: DateTime<Utc>) -> bool {
    if bucket_of(task) != BucketKey::Archive {
        return false;
    }
    match (range.start(now), task.completed_at) {
        (None, _) => true,
        (Some(start), Some(completed_at)) => completed_at >= start,
        (Some(_), None) => false,
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct PlanningView {
    pub backlog: Vec<Task>,
    pub weekly: Vec<Task>,
    pub today: Vec<Task>,
}

#[derive(Debug, Default, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionView {
    pub high_focus: Vec<Task>,
    pub low_energy: Vec<Task>,
}

pub fn planning_view<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> PlanningView {
    let mut view = PlanningView::default();
    for task in tasks {
        match bucket_of(task) {
            BucketKey::Backlog => view.backlog.push(task.clone()),
            BucketKey::Weekly => view.weekly.push(task.clone()),
            BucketKey::Today { .. } => view.today.push(task.clone()),
            BucketKey::Subtasks { .. } | BucketKey::Archive => {},
        }
    }
    view.backlog.sort_by_key(|t| (t.position, t.id));
    view.weekly.sort_by_key(|t| (t.position, t.id));
    // energized columns first, unassigned last
    view.today
        .sort_by_key(|t| (t.energy_level.is_none(), t.energy_level, t.position, t.id));
    view
}

pub fn execution_view<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> ExecutionView {
    let mut view = ExecutionView::default();
    for task in tasks {
        match execution_energy(task) {
            Some(EnergyLevel::HighFocus) => view.high_focus.push(task.clone()),
            Some(EnergyLevel::LowEnergy) => view.low_energy.push(task.clone()),
            None => {},
        }
    }
    view.high_focus.sort_by_key(|t| (t.position, t.id));
    view.low_energy.sort_by_key(|t| (t.position, t.id));
    view
}

/// Completed top-level tasks in range, most recently completed first
pub fn archive_view<'a>(
    tasks: impl IntoIterator<Item = &'a Task>,
    range: ArchiveRange,
    now: DateTime<Utc>,
) -> Vec<Task> {
    let mut archived: Vec<Task> = tasks
        .into_iter()
        .filter(|t| in_archive_range(t, range, now))
        .cloned()
        .collect();
    archived.sort_by(|a, b| b.completed_at.cmp(&a.completed_at).then(a.id.cmp(&b.id)));
    archived
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_helpers::{done_at, in_funnel, subtask, task, today};
    use chrono::Duration;

    #[test]
    fn test_subtask_bucket_ignores_funnel() {
        let t = subtask(in_funnel(task(2, "child"), StatusFunnel::Today, 0), 1, 0);
        assert_eq!(bucket_of(&t), BucketKey::Subtasks { parent_id: 1 });

        // completed subtasks stay with their parent
        let t = done_at(t, Utc::now());
        assert_eq!(bucket_of(&t), BucketKey::Subtasks { parent_id: 1 });
    }

    #[test]
    fn test_energy_irrelevant_outside_today() {
        let mut t = in_funnel(task(1, "t"), StatusFunnel::Weekly, 0);
        t.energy_level = Some(EnergyLevel::HighFocus);
        assert_eq!(bucket_of(&t), BucketKey::Weekly);
        assert_eq!(execution_energy(&t), None);
    }

    #[test]
    fn test_completed_top_level_routes_to_archive() {
        let t = done_at(today(task(1, "t"), Some(EnergyLevel::HighFocus), 0), Utc::now());
        assert_eq!(bucket_of(&t), BucketKey::Archive);
        assert_eq!(execution_energy(&t), None);
    }

    #[test]
    fn test_today_without_energy_only_in_planning() {
        let t = today(task(1, "unsorted"), None, 0);
        let tasks = vec![t];

        let planning = planning_view(&tasks);
        let execution = execution_view(&tasks);

        assert_eq!(planning.today.len(), 1);
        assert!(execution.high_focus.is_empty());
        assert!(execution.low_energy.is_empty());
    }

    #[test]
    fn test_execution_view_splits_by_energy() {
        let tasks = vec![
            today(task(1, "deep work"), Some(EnergyLevel::HighFocus), 1),
            today(task(2, "inbox"), Some(EnergyLevel::LowEnergy), 0),
            today(task(3, "draft"), Some(EnergyLevel::HighFocus), 0),
        ];
        let view = execution_view(&tasks);
        let high: Vec<i64> = view.high_focus.iter().map(|t| t.id).collect();
        assert_eq!(high, vec![3, 1]);
        assert_eq!(view.low_energy[0].id, 2);
    }

    #[test]
    fn test_planning_today_orders_unassigned_last() {
        let tasks = vec![
            today(task(1, "a"), None, 0),
            today(task(2, "b"), Some(EnergyLevel::LowEnergy), 0),
            today(task(3, "c"), Some(EnergyLevel::HighFocus), 0),
        ];
        let ids: Vec<i64> = planning_view(&tasks).today.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn test_archive_ranges() {
        let now = DateTime::parse_from_rfc3339("2025-03-12T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let tasks = vec![
            done_at(task(1, "this morning"), now - Duration::hours(3)),
            done_at(task(2, "monday"), now - Duration::days(2)),
            done_at(task(3, "start of month"), now - Duration::days(10)),
            done_at(task(4, "last year"), now - Duration::days(400)),
            task(5, "open"),
        ];

        let ids = |range| -> Vec<i64> {
            archive_view(&tasks, range, now).iter().map(|t| t.id).collect()
        };
        assert_eq!(ids(ArchiveRange::Today), vec![1]);
        assert_eq!(ids(ArchiveRange::Week), vec![1, 2]);
        assert_eq!(ids(ArchiveRange::Month), vec![1, 2, 3]);
        assert_eq!(ids(ArchiveRange::All), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_bucket_key_text_form() {
        for key in [
            BucketKey::Backlog,
            BucketKey::Weekly,
            BucketKey::HIGH_FOCUS,
            BucketKey::LOW_ENERGY,
            BucketKey::Today { energy: None },
            BucketKey::Subtasks { parent_id: 42 },
            BucketKey::Archive,
        ] {
            assert_eq!(key.to_string().parse::<BucketKey>().unwrap(), key);
        }
        assert!("later".parse::<BucketKey>().is_err());
        assert!("subtasks:x".parse::<BucketKey>().is_err());
    }

    #[test]
    fn test_reclassify_rejects_subtasks_and_archive() {
        let mut child = subtask(task(2, "child"), 1, 0);
        assert!(BucketKey::Weekly.reclassify(&mut child).is_err());

        let mut t = task(1, "t");
        assert!(BucketKey::Archive.reclassify(&mut t).is_err());

        BucketKey::LOW_ENERGY.reclassify(&mut t).unwrap();
        assert_eq!(t.status_funnel, StatusFunnel::Today);
        assert_eq!(t.energy_level, Some(EnergyLevel::LowEnergy));
        assert_eq!(bucket_of(&t), BucketKey::LOW_ENERGY);
    }
}
