//! Completion engine
//!
//! Computes the status transitions a request causes without touching storage.
//! Completing a task with open subtasks is rejected; completing the last open
//! subtask completes its parent as well.

use chrono::{DateTime, Utc};

use crate::board::TaskBoard;
use crate::db::models::{Task, TaskStatus};
use crate::error::{PlannerError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub task_id: i64,
    pub from: TaskStatus,
    pub to: TaskStatus,
    pub completed_at: Option<DateTime<Utc>>,
    /// Set when the transition was triggered by a subtask completing
    pub cascaded: bool,
}

impl Transition {
    /// A transition into `done`; each one advances the owner's stats once.
    pub fn completes(&self) -> bool {
        self.to == TaskStatus::Done && self.from != TaskStatus::Done
    }
}

/// Manual checkbox toggle: `done` reopens to `todo`, anything else completes.
pub fn toggle(board: &TaskBoard, id: i64, now: DateTime<Utc>) -> Result<Vec<Transition>> {
    let task = board.get(id).ok_or(PlannerError::TaskNotFound(id))?;
    let target = if task.is_done() {
        TaskStatus::Todo
    } else {
        TaskStatus::Done
    };
    set_status(board, id, target, now)
}

/// Transitions caused by setting `id` to `target`, in application order.
pub fn set_status(
    board: &TaskBoard,
    id: i64,
    target: TaskStatus,
    now: DateTime<Utc>,
) -> Result<Vec<Transition>> {
    let task = board.get(id).ok_or(PlannerError::TaskNotFound(id))?;

    if task.status == target {
        return Ok(Vec::new());
    }

    if target != TaskStatus::Done {
        // reopening never reverts stats
        return Ok(vec![Transition {
            task_id: id,
            from: task.status,
            to: target,
            completed_at: None,
            cascaded: false,
        }]);
    }

    let incomplete = board.incomplete_children(id);
    if incomplete > 0 {
        return Err(PlannerError::UncompletedSubtasks {
            task_id: id,
            incomplete,
        });
    }

    let mut transitions = vec![Transition {
        task_id: id,
        from: task.status,
        to: TaskStatus::Done,
        completed_at: Some(now),
        cascaded: false,
    }];
    transitions.extend(cascade(board, task, now));
    Ok(transitions)
}

/// Parent completion triggered by `subtask` becoming done, if it was the last
/// open one.
fn cascade(board: &TaskBoard, subtask: &Task, now: DateTime<Utc>) -> Option<Transition> {
    let parent = board.get(subtask.parent_id?)?;
    if parent.is_done() {
        return None;
    }
    let siblings_done = board
        .children_of(parent.id)
        .into_iter()
        .filter(|sibling| sibling.id != subtask.id)
        .all(Task::is_done);
    siblings_done.then(|| Transition {
        task_id: parent.id,
        from: parent.status,
        to: TaskStatus::Done,
        completed_at: Some(now),
        cascaded: true,
    })
}

/// Write transitions into the board, returning the ids touched.
pub fn apply(board: &mut TaskBoard, transitions: &[Transition], now: DateTime<Utc>) -> Vec<i64> {
    let mut touched = Vec::with_capacity(transitions.len());
    for transition in transitions {
        if let Some(task) = board.get_mut(transition.task_id) {
            task.status = transition.to;
            task.completed_at = transition.completed_at;
            task.updated_at = now;
            touched.push(task.id);
        }
    }
    touched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_helpers::{done, subtask, task};

    fn family(statuses: &[bool]) -> TaskBoard {
        let mut tasks = vec![task(1, "parent")];
        for (i, is_done) in statuses.iter().enumerate() {
            let id = 10 + i as i64;
            let child = subtask(task(id, "child"), 1, i as i64);
            tasks.push(if *is_done { done(child) } else { child });
        }
        TaskBoard::from_tasks(tasks)
    }

    #[test]
    fn test_toggle_leaf_completes() {
        let board = TaskBoard::from_tasks(vec![task(1, "solo")]);
        let now = Utc::now();
        let transitions = toggle(&board, 1, now).unwrap();

        assert_eq!(transitions.len(), 1);
        assert!(transitions[0].completes());
        assert_eq!(transitions[0].completed_at, Some(now));
    }

    #[test]
    fn test_guard_rejects_parent_with_open_subtasks() {
        let board = family(&[true, false]);
        let result = toggle(&board, 1, Utc::now());

        match result {
            Err(PlannerError::UncompletedSubtasks {
                task_id,
                incomplete,
            }) => {
                assert_eq!(task_id, 1);
                assert_eq!(incomplete, 1);
            },
            other => panic!("expected guard rejection, got {:?}", other),
        }
        assert_eq!(board.get(1).unwrap().status, TaskStatus::Todo);
    }

    #[test]
    fn test_in_progress_completion_is_guarded_too() {
        let mut board = family(&[false]);
        board.get_mut(1).unwrap().status = TaskStatus::InProgress;
        assert!(set_status(&board, 1, TaskStatus::Done, Utc::now()).is_err());
    }

    #[test]
    fn test_last_subtask_cascades_to_parent() {
        let mut board = family(&[true, false]);
        let now = Utc::now();
        let transitions = toggle(&board, 11, now).unwrap();

        assert_eq!(transitions.len(), 2);
        assert_eq!(transitions[0].task_id, 11);
        assert!(!transitions[0].cascaded);
        assert_eq!(transitions[1].task_id, 1);
        assert!(transitions[1].cascaded);
        assert_eq!(transitions.iter().filter(|t| t.completes()).count(), 2);

        apply(&mut board, &transitions, now);
        let parent = board.get(1).unwrap();
        assert_eq!(parent.status, TaskStatus::Done);
        assert!(parent.completed_at.is_some());
    }

    #[test]
    fn test_no_cascade_while_siblings_open() {
        let board = family(&[false, false]);
        let transitions = toggle(&board, 10, Utc::now()).unwrap();
        assert_eq!(transitions.len(), 1);
    }

    #[test]
    fn test_no_cascade_when_parent_already_done() {
        let mut board = family(&[true, false]);
        let parent = board.get(1).cloned().unwrap();
        board.insert(done(parent));

        let transitions = toggle(&board, 11, Utc::now()).unwrap();
        assert_eq!(transitions.len(), 1);
    }

    #[test]
    fn test_reopen_is_unconditional_and_clears_timestamp() {
        let mut board = family(&[true]);
        let parent = board.get(1).cloned().unwrap();
        board.insert(done(parent));
        // reopen a subtask under a done parent; parent stays done
        let transitions = toggle(&board, 10, Utc::now()).unwrap();
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].to, TaskStatus::Todo);
        assert_eq!(transitions[0].completed_at, None);
        assert!(!transitions[0].completes());

        apply(&mut board, &transitions, Utc::now());
        assert_eq!(board.get(1).unwrap().status, TaskStatus::Done);
        assert!(board.get(10).unwrap().completed_at.is_none());
    }

    #[test]
    fn test_same_status_is_noop() {
        let board = TaskBoard::from_tasks(vec![task(1, "t")]);
        assert!(set_status(&board, 1, TaskStatus::Todo, Utc::now())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_in_progress_passthrough() {
        let board = TaskBoard::from_tasks(vec![task(1, "t")]);
        let transitions = set_status(&board, 1, TaskStatus::InProgress, Utc::now()).unwrap();
        assert_eq!(transitions[0].to, TaskStatus::InProgress);
        assert!(!transitions[0].completes());
    }

    #[test]
    fn test_unknown_task() {
        let board = TaskBoard::new();
        assert!(matches!(
            toggle(&board, 5, Utc::now()),
            Err(PlannerError::TaskNotFound(5))
        ));
    }
}
