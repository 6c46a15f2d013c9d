//! Flat task arena keyed by id
//!
//! Subtask relations are derived by filtering on `parent_id`; no task holds
//! its children directly.

use std::collections::BTreeMap;

use crate::classifier::{bucket_of, BucketKey};
use crate::db::models::{StatusFunnel, Task, TaskStatus};
use chrono::{DateTime, Utc};

use crate::ordering::{densify, next_position, PositionAssignment};

/// Pending "today" tasks above which clean slate is offered
pub const CLEAN_SLATE_THRESHOLD: usize = 5;

#[derive(Debug, Clone, Default)]
pub struct TaskBoard {
    tasks: BTreeMap<i64, Task>,
}

impl TaskBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        Self {
            tasks: tasks.into_iter().map(|t| (t.id, t)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: i64) -> Option<&Task> {
        self.tasks.get(&id)
    }

    pub fn get_mut(&mut self, id: i64) -> Option<&mut Task> {
        self.tasks.get_mut(&id)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.tasks.contains_key(&id)
    }

    pub fn insert(&mut self, task: Task) -> Option<Task> {
        self.tasks.insert(task.id, task)
    }

    pub fn remove(&mut self, id: i64) -> Option<Task> {
        self.tasks.remove(&id)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    /// Subtasks of `parent_id` in position order
    pub fn children_of(&self, parent_id: i64) -> Vec<&Task> {
        let mut children: Vec<&Task> = self
            .tasks
            .values()
            .filter(|t| t.parent_id == Some(parent_id))
            .collect();
        children.sort_by_key(|t| (t.position, t.id));
        children
    }

    pub fn incomplete_children(&self, parent_id: i64) -> usize {
        self.tasks
            .values()
            .filter(|t| t.parent_id == Some(parent_id) && !t.is_done())
            .count()
    }

    pub fn has_children(&self, id: i64) -> bool {
        self.tasks.values().any(|t| t.parent_id == Some(id))
    }

    /// Members of a bucket in position order
    pub fn bucket(&self, key: BucketKey) -> Vec<&Task> {
        let mut members: Vec<&Task> = self
            .tasks
            .values()
            .filter(|t| bucket_of(t) == key)
            .collect();
        members.sort_by_key(|t| (t.position, t.id));
        members
    }

    pub fn bucket_ids(&self, key: BucketKey) -> Vec<i64> {
        self.bucket(key).into_iter().map(|t| t.id).collect()
    }

    /// Append position for `key`, ignoring `excluding` if it is already a member
    pub fn next_position(&self, key: BucketKey, excluding: Option<i64>) -> i64 {
        next_position(
            self.bucket(key)
                .into_iter()
                .filter(|t| Some(t.id) != excluding)
                .map(|t| t.position),
        )
    }

    pub fn apply_positions<'a>(
        &mut self,
        assignments: impl IntoIterator<Item = &'a PositionAssignment>,
    ) {
        for assignment in assignments {
            if let Some(task) = self.tasks.get_mut(&assignment.id) {
                task.position = assignment.position;
            }
        }
    }

    /// Current bucket of each of `ids` that is on the board
    pub fn buckets_of(&self, ids: impl IntoIterator<Item = i64>) -> Vec<(i64, BucketKey)> {
        ids.into_iter()
            .filter_map(|id| self.tasks.get(&id).map(|t| (id, bucket_of(t))))
            .collect()
    }

    /// Renumber `key` to 0..n in its current order, returning what moved
    pub fn densify_bucket(&mut self, key: BucketKey) -> Vec<PositionAssignment> {
        if key == BucketKey::Archive {
            return Vec::new();
        }
        let changed: Vec<PositionAssignment> = densify(&self.bucket_ids(key))
            .into_iter()
            .filter(|a| self.tasks.get(&a.id).is_some_and(|t| t.position != a.position))
            .collect();
        self.apply_positions(&changed);
        changed
    }

    /// Densify every bucket a task of `previous` has since left.
    ///
    /// `previous` pairs ids with the bucket they were in before a change.
    pub fn close_gaps(&mut self, previous: &[(i64, BucketKey)]) -> Vec<PositionAssignment> {
        let mut left: Vec<BucketKey> = Vec::new();
        for &(id, old) in previous {
            let moved = self.tasks.get(&id).map_or(true, |t| bucket_of(t) != old);
            if moved && !left.contains(&old) {
                left.push(old);
            }
        }
        let mut shifted = Vec::new();
        for key in left {
            shifted.extend(self.densify_bucket(key));
        }
        shifted
    }

    /// Remove a task together with its subtasks, returning everything removed
    pub fn remove_with_subtasks(&mut self, id: i64) -> Vec<Task> {
        let child_ids: Vec<i64> = self.children_of(id).iter().map(|t| t.id).collect();
        let mut removed: Vec<Task> = child_ids
            .into_iter()
            .filter_map(|child| self.tasks.remove(&child))
            .collect();
        if let Some(task) = self.tasks.remove(&id) {
            removed.insert(0, task);
        }
        removed
    }

    fn pending_today(&self) -> Vec<&Task> {
        let mut pending: Vec<&Task> = self
            .tasks
            .values()
            .filter(|t| {
                !t.is_subtask()
                    && t.status_funnel == StatusFunnel::Today
                    && t.status == TaskStatus::Todo
            })
            .collect();
        pending.sort_by_key(|t| (t.position, t.id));
        pending
    }

    pub fn pending_today_count(&self) -> usize {
        self.pending_today().len()
    }

    pub fn should_offer_clean_slate(&self) -> bool {
        self.pending_today_count() > CLEAN_SLATE_THRESHOLD
    }

    /// Tasks clean slate moves to backlog, with their appended backlog positions
    pub fn clean_slate_plan(&self) -> Vec<PositionAssignment> {
        let start = self.next_position(BucketKey::Backlog, None);
        self.pending_today()
            .into_iter()
            .enumerate()
            .map(|(offset, t)| PositionAssignment {
                id: t.id,
                position: start + offset as i64,
            })
            .collect()
    }

    /// Send the planned tasks to the backlog and close the gaps they leave in
    /// the execution columns
    pub fn apply_clean_slate(&mut self, now: DateTime<Utc>) -> CleanSlate {
        let moved = self.clean_slate_plan();
        let previous = self.buckets_of(moved.iter().map(|a| a.id));
        for assignment in &moved {
            if let Some(task) = self.tasks.get_mut(&assignment.id) {
                task.status_funnel = StatusFunnel::Backlog;
                task.position = assignment.position;
                task.updated_at = now;
            }
        }
        let shifted = self.close_gaps(&previous);
        CleanSlate { moved, shifted }
    }
}

/// Outcome of [`TaskBoard::apply_clean_slate`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanSlate {
    /// Tasks sent to the backlog, with their new positions
    pub moved: Vec<PositionAssignment>,
    /// Tasks left in "today" whose position closed a gap
    pub shifted: Vec<PositionAssignment>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::EnergyLevel;
    use crate::test_utils::test_helpers::{done, in_funnel, in_progress, subtask, task, today};

    #[test]
    fn test_children_are_derived_and_ordered() {
        let board = TaskBoard::from_tasks(vec![
            task(1, "parent"),
            subtask(task(2, "b"), 1, 1),
            subtask(task(3, "a"), 1, 0),
            task(4, "other"),
        ]);
        let ids: Vec<i64> = board.children_of(1).iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![3, 2]);
        assert!(board.has_children(1));
        assert!(!board.has_children(4));
        assert_eq!(board.incomplete_children(1), 2);
    }

    #[test]
    fn test_bucket_membership_and_next_position() {
        let board = TaskBoard::from_tasks(vec![
            in_funnel(task(1, "a"), StatusFunnel::Weekly, 3),
            in_funnel(task(2, "b"), StatusFunnel::Weekly, 1),
            today(task(3, "c"), Some(EnergyLevel::HighFocus), 0),
            done(in_funnel(task(4, "d"), StatusFunnel::Weekly, 7)),
        ]);
        assert_eq!(board.bucket_ids(BucketKey::Weekly), vec![2, 1]);
        assert_eq!(board.next_position(BucketKey::Weekly, None), 4);
        assert_eq!(board.next_position(BucketKey::Weekly, Some(1)), 2);
        assert_eq!(board.next_position(BucketKey::LOW_ENERGY, None), 0);
        assert_eq!(board.bucket_ids(BucketKey::Archive), vec![4]);
    }

    #[test]
    fn test_remove_with_subtasks() {
        let mut board = TaskBoard::from_tasks(vec![
            task(1, "parent"),
            subtask(task(2, "a"), 1, 0),
            subtask(task(3, "b"), 1, 1),
            task(4, "keep"),
        ]);
        let removed: Vec<i64> = board.remove_with_subtasks(1).iter().map(|t| t.id).collect();
        assert_eq!(removed, vec![1, 2, 3]);
        assert_eq!(board.len(), 1);
        assert!(board.contains(4));
    }

    #[test]
    fn test_clean_slate_plan_appends_to_backlog() {
        let board = TaskBoard::from_tasks(vec![
            in_funnel(task(1, "old"), StatusFunnel::Backlog, 0),
            today(task(2, "x"), Some(EnergyLevel::HighFocus), 1),
            today(task(3, "y"), None, 0),
            done(today(task(4, "finished"), None, 2)),
            in_funnel(task(5, "w"), StatusFunnel::Weekly, 0),
            subtask(today(task(6, "child"), None, 0), 2, 0),
        ]);
        let plan = board.clean_slate_plan();
        assert_eq!(
            plan,
            vec![
                PositionAssignment { id: 3, position: 1 },
                PositionAssignment { id: 2, position: 2 },
            ]
        );
    }

    #[test]
    fn test_clean_slate_densifies_what_stays_in_today() {
        let mut board = TaskBoard::from_tasks(vec![
            today(task(1, "a"), Some(EnergyLevel::HighFocus), 0),
            in_progress(today(task(2, "b"), Some(EnergyLevel::HighFocus), 1)),
            today(task(3, "c"), Some(EnergyLevel::HighFocus), 2),
            in_progress(today(task(4, "d"), Some(EnergyLevel::HighFocus), 3)),
            today(task(5, "e"), None, 0),
        ]);

        let outcome = board.apply_clean_slate(Utc::now());

        let moved: Vec<i64> = outcome.moved.iter().map(|a| a.id).collect();
        assert_eq!(moved, vec![1, 5, 3]);
        assert_eq!(board.bucket_ids(BucketKey::Backlog), vec![1, 5, 3]);
        assert_eq!(board.bucket_ids(BucketKey::HIGH_FOCUS), vec![2, 4]);
        assert_eq!(board.get(2).unwrap().position, 0);
        assert_eq!(board.get(4).unwrap().position, 1);
        assert_eq!(
            outcome.shifted,
            vec![
                PositionAssignment { id: 2, position: 0 },
                PositionAssignment { id: 4, position: 1 },
            ]
        );
    }

    #[test]
    fn test_close_gaps_only_touches_departed_buckets() {
        let mut board = TaskBoard::from_tasks(vec![
            in_funnel(task(1, "a"), StatusFunnel::Weekly, 0),
            in_funnel(task(2, "b"), StatusFunnel::Weekly, 1),
            in_funnel(task(3, "c"), StatusFunnel::Weekly, 2),
            in_funnel(task(4, "gap"), StatusFunnel::Backlog, 5),
        ]);
        let previous = board.buckets_of([1, 4]);
        board.insert(done(in_funnel(task(1, "a"), StatusFunnel::Weekly, 0)));

        let shifted = board.close_gaps(&previous);

        assert_eq!(
            shifted,
            vec![
                PositionAssignment { id: 2, position: 0 },
                PositionAssignment { id: 3, position: 1 },
            ]
        );
        assert_eq!(board.get(4).unwrap().position, 5);
        assert!(board.densify_bucket(BucketKey::Archive).is_empty());
    }

    #[test]
    fn test_clean_slate_threshold() {
        let tasks: Vec<Task> = (1..=5)
            .map(|id| today(task(id, "t"), None, id))
            .collect();
        let mut board = TaskBoard::from_tasks(tasks);
        assert!(!board.should_offer_clean_slate());

        board.insert(today(task(6, "one more"), None, 6));
        assert!(board.should_offer_clean_slate());
    }
}
