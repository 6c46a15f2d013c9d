//! Planning/execution orchestrator
//!
//! Holds the owner's full task list in memory. Every intent is applied to the
//! local board first using the pure engines, then persisted through a
//! [`TaskStore`]. When persistence fails the local state is discarded and
//! re-fetched; if that re-fetch fails too the orchestrator is marked stale.

use chrono::{DateTime, Utc};
use futures_util::future::{join_all, try_join};
use tracing::{debug, warn};

use crate::board::TaskBoard;
use crate::classifier::{
    archive_view, bucket_of, execution_view, planning_view, ArchiveRange, BucketKey,
    ExecutionView, PlanningView,
};
use crate::completion::{self, Transition};
use crate::db::models::{
    EnergyLevel, NewTask, StatsSnapshot, StatusFunnel, Task, TaskPatch, TaskStatus,
    TaskUpdateResponse,
};
use crate::drag::{DragState, DropOutcome, DropTarget};
use crate::error::{PlannerError, Result};
use crate::gamification::advance_many;
use crate::log_task_operation;
use crate::ordering::{self, densify, move_across, PositionAssignment};
use crate::store::TaskStore;

/// What happened to an intent that passed local validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Applied,
    /// A task was created; `id` is the store-assigned id
    Created { id: i64 },
    /// Nothing to do (same status, drop outside any target, ...)
    Unchanged,
    /// Persistence failed and local state was re-fetched from the store
    RolledBack { warning: String },
}

pub struct Orchestrator<S: TaskStore> {
    store: S,
    board: TaskBoard,
    stats: StatsSnapshot,
    drag: DragState,
    stale: bool,
    last_temp_id: i64,
}

impl<S: TaskStore> Orchestrator<S> {
    pub fn new(store: S) -> Self {
        let stats = StatsSnapshot::zero(store.owner_id());
        Self {
            store,
            board: TaskBoard::new(),
            stats,
            drag: DragState::Idle,
            stale: false,
            last_temp_id: 0,
        }
    }

    /// Create an orchestrator and fetch the owner's tasks and stats
    pub async fn connect(store: S) -> Result<Self> {
        let mut orchestrator = Self::new(store);
        orchestrator.load().await?;
        Ok(orchestrator)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn board(&self) -> &TaskBoard {
        &self.board
    }

    pub fn task(&self, id: i64) -> Option<&Task> {
        self.board.get(id)
    }

    pub fn stats(&self) -> &StatsSnapshot {
        &self.stats
    }

    /// Set when a rollback could not re-fetch; local state may diverge
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn drag_state(&self) -> DragState {
        self.drag
    }

    // ── Loading ─────────────────────────────────────────────────────

    /// Replace local state with the store's
    pub async fn load(&mut self) -> Result<()> {
        let (tasks, stats) = try_join(self.store.list_tasks(), self.store.get_stats()).await?;
        debug!(count = tasks.len(), "Loaded tasks");
        self.board = TaskBoard::from_tasks(tasks);
        self.stats = stats;
        self.stale = false;
        Ok(())
    }

    /// Re-fetch, flagging local state stale if the store is unreachable
    pub async fn refresh(&mut self) -> Result<()> {
        let result = self.load().await;
        if result.is_err() {
            self.stale = true;
        }
        result
    }

    // ── Views ───────────────────────────────────────────────────────

    pub fn planning_view(&self) -> PlanningView {
        planning_view(self.board.tasks())
    }

    pub fn execution_view(&self) -> ExecutionView {
        execution_view(self.board.tasks())
    }

    pub fn archive_view(&self, range: ArchiveRange, now: DateTime<Utc>) -> Vec<Task> {
        archive_view(self.board.tasks(), range, now)
    }

    /// Subtasks of a task in position order
    pub fn subtasks(&self, parent_id: i64) -> Vec<Task> {
        self.board
            .children_of(parent_id)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn pending_today_count(&self) -> usize {
        self.board.pending_today_count()
    }

    pub fn should_offer_clean_slate(&self) -> bool {
        self.board.should_offer_clean_slate()
    }

    // ── Intents ─────────────────────────────────────────────────────

    /// Flip a task between done and todo.
    ///
    /// Completing a task with open subtasks is rejected before anything is
    /// sent to the store.
    pub async fn toggle_complete(&mut self, id: i64) -> Result<ActionOutcome> {
        let now = Utc::now();
        let transitions = completion::toggle(&self.board, id, now)?;
        let Some(target) = transitions.first().map(|t| t.to) else {
            return Ok(ActionOutcome::Unchanged);
        };

        let previous = self.board.buckets_of(transitions.iter().map(|t| t.task_id));
        completion::apply(&mut self.board, &transitions, now);
        self.board.close_gaps(&previous);
        self.advance_local_stats(&transitions);
        for transition in transitions.iter().filter(|t| t.cascaded) {
            log_task_operation!("cascade", transition.task_id);
        }

        match self.store.update_task(id, &TaskPatch::status(target)).await {
            Ok(response) => {
                self.absorb(response);
                Ok(ActionOutcome::Applied)
            },
            Err(e) => self.rollback(e).await,
        }
    }

    /// Move a top-level task to another funnel, appending it there
    pub async fn move_funnel(&mut self, id: i64, funnel: StatusFunnel) -> Result<ActionOutcome> {
        let task = self.board.get(id).ok_or(PlannerError::TaskNotFound(id))?;
        if task.is_subtask() {
            return Err(PlannerError::InvalidInput(format!(
                "Subtask #{} follows its parent and has no funnel of its own",
                id
            )));
        }
        if task.status_funnel == funnel {
            return Ok(ActionOutcome::Unchanged);
        }
        if task.is_done() {
            let patch = TaskPatch {
                status_funnel: Some(funnel),
                ..Default::default()
            };
            return self.edit_task(id, patch).await;
        }
        let target = BucketKey::for_funnel(funnel, task.energy_level);
        self.move_to_bucket(id, target, usize::MAX).await
    }

    /// Change a task's energy level.
    ///
    /// For an open "today" task this moves it between execution columns,
    /// appending it to the target column.
    pub async fn update_energy(
        &mut self,
        id: i64,
        energy: Option<EnergyLevel>,
    ) -> Result<ActionOutcome> {
        let task = self.board.get(id).ok_or(PlannerError::TaskNotFound(id))?;
        if task.is_subtask() {
            return Err(PlannerError::InvalidInput(format!(
                "Subtask #{} has no energy level of its own",
                id
            )));
        }
        if task.energy_level == energy {
            return Ok(ActionOutcome::Unchanged);
        }
        if task.is_done() || task.status_funnel != StatusFunnel::Today {
            let patch = TaskPatch {
                energy_level: Some(energy),
                ..Default::default()
            };
            return self.edit_task(id, patch).await;
        }
        self.move_to_bucket(id, BucketKey::Today { energy }, usize::MAX)
            .await
    }

    /// Move the element at `from` to `to` within a bucket.
    ///
    /// Only tasks whose position actually changed are persisted.
    pub async fn reorder_within(
        &mut self,
        bucket: BucketKey,
        from: usize,
        to: usize,
    ) -> Result<ActionOutcome> {
        if bucket == BucketKey::Archive {
            return Err(PlannerError::InvalidInput(
                "Archived tasks are ordered by completion date".to_string(),
            ));
        }
        let ids = self.board.bucket_ids(bucket);
        let assignments = ordering::reorder(&ids, from, to)?;
        let changed = self.changed_positions(&assignments);
        if changed.is_empty() {
            return Ok(ActionOutcome::Unchanged);
        }

        self.board.apply_positions(&changed);
        let patches = changed
            .iter()
            .map(|a| (a.id, TaskPatch::position(a.position)))
            .collect();
        self.persist_batch(patches).await
    }

    /// Put a task into `target` before `index` (clamped to the end).
    ///
    /// Crossing buckets reclassifies the task and re-densifies the bucket it
    /// left.
    pub async fn move_to_bucket(
        &mut self,
        id: i64,
        target: BucketKey,
        index: usize,
    ) -> Result<ActionOutcome> {
        let task = self.board.get(id).ok_or(PlannerError::TaskNotFound(id))?;
        let source = bucket_of(task);
        if source == BucketKey::Archive {
            return Err(PlannerError::InvalidInput(format!(
                "Task #{} is completed; reopen it before moving it",
                id
            )));
        }

        if source == target {
            let ids = self.board.bucket_ids(source);
            let from = ids.iter().position(|&other| other == id).unwrap_or_default();
            let to = index.min(ids.len().saturating_sub(1));
            return self.reorder_within(source, from, to).await;
        }

        let mut moved = task.clone();
        target.reclassify(&mut moved)?;
        let cross = move_across(
            &self.board.bucket_ids(source),
            &self.board.bucket_ids(target),
            id,
            index,
        )?;

        let new_position = cross
            .target
            .iter()
            .find(|a| a.id == id)
            .map(|a| a.position)
            .unwrap_or_default();
        let shifted: Vec<PositionAssignment> = cross
            .assignments()
            .filter(|a| a.id != id)
            .copied()
            .collect();
        let shifted = self.changed_positions(&shifted);

        moved.position = new_position;
        moved.updated_at = Utc::now();
        let patch = TaskPatch {
            status_funnel: Some(moved.status_funnel),
            energy_level: matches!(target, BucketKey::Today { .. }).then_some(moved.energy_level),
            position: Some(new_position),
            ..Default::default()
        };
        self.board.insert(moved);
        self.board.apply_positions(&shifted);
        log_task_operation!("move", id, format!("{} -> {}", source, target));

        let mut patches = vec![(id, patch)];
        patches.extend(
            shifted
                .iter()
                .map(|a| (a.id, TaskPatch::position(a.position))),
        );
        self.persist_batch(patches).await
    }

    /// Quick-add a task; it is shown under a temporary id until the store
    /// acknowledges it.
    pub async fn create_task(&mut self, new: NewTask) -> Result<ActionOutcome> {
        new.validate()?;
        let bucket = match new.parent_id {
            Some(parent_id) => {
                let parent = self
                    .board
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

        let now = Utc::now();
        self.last_temp_id -= 1;
        let temp_id = self.last_temp_id;
        self.board.insert(Task {
            id: temp_id,
            owner_id: self.store.owner_id().to_string(),
            title: new.title.trim().to_string(),
            description: new.description.clone(),
            status: TaskStatus::Todo,
            parent_id: new.parent_id,
            status_funnel: new.status_funnel.unwrap_or_default(),
            energy_level: new.energy_level,
            context_id: new.context_id.clone(),
            position: self.board.next_position(bucket, None),
            due_date: new.due_date,
            completed_at: None,
            created_at: now,
            updated_at: now,
        });

        match self.store.create_task(&new).await {
            Ok(created) => {
                self.board.remove(temp_id);
                let id = created.id;
                self.board.insert(created);
                Ok(ActionOutcome::Created { id })
            },
            Err(e) => self.rollback(e).await,
        }
    }

    pub async fn add_subtask(
        &mut self,
        parent_id: i64,
        title: impl Into<String>,
    ) -> Result<ActionOutcome> {
        self.create_task(NewTask::subtask(parent_id, title)).await
    }

    /// Apply an arbitrary field patch.
    ///
    /// A status change goes through the completion engine; a task that lands
    /// in a different bucket without an explicit position is appended there.
    pub async fn edit_task(&mut self, id: i64, patch: TaskPatch) -> Result<ActionOutcome> {
        patch.validate()?;
        if patch.is_empty() {
            return Ok(ActionOutcome::Unchanged);
        }
        let original = self
            .board
            .get(id)
            .cloned()
            .ok_or(PlannerError::TaskNotFound(id))?;

        let now = Utc::now();
        let transitions = match patch.status {
            Some(status) => completion::set_status(&self.board, id, status, now)?,
            None => Vec::new(),
        };
        let previous = self.board.buckets_of(
            std::iter::once(id).chain(transitions.iter().map(|t| t.task_id)),
        );
        completion::apply(&mut self.board, &transitions, now);
        self.advance_local_stats(&transitions);

        if let Some(task) = self.board.get_mut(id) {
            patch.apply_fields(task);
            task.updated_at = now;
        }
        let new_bucket = self.board.get(id).map(bucket_of);
        if let Some(new_bucket) = new_bucket {
            if patch.position.is_none()
                && new_bucket != bucket_of(&original)
                && new_bucket != BucketKey::Archive
            {
                let position = self.board.next_position(new_bucket, Some(id));
                if let Some(task) = self.board.get_mut(id) {
                    task.position = position;
                }
            }
        }
        self.board.close_gaps(&previous);

        match self.store.update_task(id, &patch).await {
            Ok(response) => {
                self.absorb(response);
                Ok(ActionOutcome::Applied)
            },
            Err(e) => self.rollback(e).await,
        }
    }

    /// Delete a task and its subtasks, closing the gap it leaves
    pub async fn delete_task(&mut self, id: i64) -> Result<ActionOutcome> {
        let task = self.board.get(id).ok_or(PlannerError::TaskNotFound(id))?;
        let source = bucket_of(task);

        let removed = self.board.remove_with_subtasks(id);
        let shifted = if source == BucketKey::Archive {
            Vec::new()
        } else {
            self.changed_positions(&densify(&self.board.bucket_ids(source)))
        };
        self.board.apply_positions(&shifted);
        log_task_operation!("delete", id, format!("{} task(s)", removed.len()));

        if let Err(e) = self.store.delete_task(id).await {
            return self.rollback(e).await;
        }
        if shifted.is_empty() {
            return Ok(ActionOutcome::Applied);
        }
        let patches = shifted
            .iter()
            .map(|a| (a.id, TaskPatch::position(a.position)))
            .collect();
        self.persist_batch(patches).await
    }

    /// Delete a subtask; refuses top-level tasks
    pub async fn delete_subtask(&mut self, id: i64) -> Result<ActionOutcome> {
        let task = self.board.get(id).ok_or(PlannerError::TaskNotFound(id))?;
        if !task.is_subtask() {
            return Err(PlannerError::InvalidInput(format!(
                "Task #{} is not a subtask",
                id
            )));
        }
        self.delete_task(id).await
    }

    /// Send every open top-level "today" task back to the backlog; whatever
    /// stays in an execution column is renumbered
    pub async fn clean_slate(&mut self) -> Result<ActionOutcome> {
        let moved = self.board.apply_clean_slate(Utc::now()).moved;
        if moved.is_empty() {
            return Ok(ActionOutcome::Unchanged);
        }

        match self.store.clean_slate().await {
            Ok(response) => {
                if response.moved_count != moved.len() {
                    debug!(
                        local = moved.len(),
                        store = response.moved_count,
                        "Clean slate counts differ, re-fetching"
                    );
                    self.refresh().await?;
                }
                Ok(ActionOutcome::Applied)
            },
            Err(e) => self.rollback(e).await,
        }
    }

    // ── Drag and drop ───────────────────────────────────────────────

    pub fn begin_drag(&mut self, id: i64) -> Result<()> {
        self.drag.begin(&self.board, id)
    }

    pub fn cancel_drag(&mut self) {
        self.drag.cancel();
    }

    /// Finish the active drag over `target` (`None` = outside any target)
    pub async fn end_drag(&mut self, target: Option<DropTarget>) -> Result<ActionOutcome> {
        match self.drag.finish(&self.board, target) {
            DropOutcome::Cancelled => Ok(ActionOutcome::Unchanged),
            DropOutcome::Dropped {
                item_id,
                source,
                target,
                index,
            } if source == target => {
                let ids = self.board.bucket_ids(source);
                let Some(from) = ids.iter().position(|&id| id == item_id) else {
                    return Ok(ActionOutcome::Unchanged);
                };
                let to = index.min(ids.len().saturating_sub(1));
                self.reorder_within(source, from, to).await
            },
            DropOutcome::Dropped {
                item_id,
                target,
                index,
                ..
            } => self.move_to_bucket(item_id, target, index).await,
        }
    }

    // ── Internals ───────────────────────────────────────────────────

    fn changed_positions(&self, assignments: &[PositionAssignment]) -> Vec<PositionAssignment> {
        assignments
            .iter()
            .filter(|a| {
                self.board
                    .get(a.id)
                    .is_some_and(|t| t.position != a.position)
            })
            .copied()
            .collect()
    }

    fn advance_local_stats(&mut self, transitions: &[Transition]) {
        let completions = transitions
            .iter()
            .filter(|t| t.completes())
            .filter_map(|t| t.completed_at);
        let prev = self.stats.to_user_stats();
        if let Some(next) = advance_many(self.store.owner_id(), Some(&prev), completions) {
            self.stats = next.snapshot();
        }
    }

    /// Take the store's version of everything an update touched
    fn absorb(&mut self, response: TaskUpdateResponse) {
        for task in response.cascaded {
            self.board.insert(task);
        }
        self.board.insert(response.task);
        if let Some(stats) = response.stats {
            self.stats = stats;
        }
    }

    /// Send a batch of updates concurrently and wait for all of them
    async fn persist_batch(&mut self, patches: Vec<(i64, TaskPatch)>) -> Result<ActionOutcome> {
        let results = join_all(
            patches
                .iter()
                .map(|(id, patch)| self.store.update_task(*id, patch)),
        )
        .await;

        let mut failure = None;
        for result in results {
            match result {
                Ok(response) => self.absorb(response),
                Err(e) => {
                    failure.get_or_insert(e);
                },
            }
        }
        match failure {
            None => Ok(ActionOutcome::Applied),
            Some(e) => self.rollback(e).await,
        }
    }

    async fn rollback(&mut self, error: PlannerError) -> Result<ActionOutcome> {
        warn!(error = %error, "Persistence failed, rolling back local state");
        if let Err(refetch) = self.refresh().await {
            warn!(error = %refetch, "Re-fetch failed, local state is stale");
        }
        if error.is_user_facing() {
            Err(error)
        } else {
            Ok(ActionOutcome::RolledBack {
                warning: error.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::CleanSlateResponse;
    use crate::store::LocalStore;
    use crate::test_utils::test_helpers::{TestContext, OWNER};
    use std::future::Future;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// LocalStore whose reads and writes can be made to fail
    struct FlakyStore {
        inner: LocalStore,
        fail_reads: AtomicBool,
        fail_writes: AtomicBool,
    }

    impl FlakyStore {
        fn new(inner: LocalStore) -> Self {
            Self {
                inner,
                fail_reads: AtomicBool::new(false),
                fail_writes: AtomicBool::new(false),
            }
        }

        fn check(flag: &AtomicBool) -> Result<()> {
            if flag.load(Ordering::SeqCst) {
                return Err(PlannerError::PersistenceFailure("store offline".to_string()));
            }
            Ok(())
        }
    }

    impl TaskStore for FlakyStore {
        fn owner_id(&self) -> &str {
            self.inner.owner_id()
        }

        fn list_tasks(&self) -> impl Future<Output = Result<Vec<Task>>> + Send {
            async move {
                Self::check(&self.fail_reads)?;
                self.inner.list_tasks().await
            }
        }

        fn create_task(&self, new: &NewTask) -> impl Future<Output = Result<Task>> + Send {
            async move {
                Self::check(&self.fail_writes)?;
                self.inner.create_task(new).await
            }
        }

        fn update_task(
            &self,
            id: i64,
            patch: &TaskPatch,
        ) -> impl Future<Output = Result<TaskUpdateResponse>> + Send {
            async move {
                Self::check(&self.fail_writes)?;
                self.inner.update_task(id, patch).await
            }
        }

        fn delete_task(&self, id: i64) -> impl Future<Output = Result<Vec<i64>>> + Send {
            async move {
                Self::check(&self.fail_writes)?;
                self.inner.delete_task(id).await
            }
        }

        fn clean_slate(&self) -> impl Future<Output = Result<CleanSlateResponse>> + Send {
            async move {
                Self::check(&self.fail_writes)?;
                self.inner.clean_slate().await
            }
        }

        fn get_stats(&self) -> impl Future<Output = Result<StatsSnapshot>> + Send {
            async move {
                Self::check(&self.fail_reads)?;
                self.inner.get_stats().await
            }
        }
    }

    async fn orchestrator(ctx: &TestContext) -> Orchestrator<LocalStore> {
        Orchestrator::connect(LocalStore::new(ctx.pool().clone(), OWNER))
            .await
            .unwrap()
    }

    async fn create(orch: &mut Orchestrator<impl TaskStore>, new: NewTask) -> i64 {
        match orch.create_task(new).await.unwrap() {
            ActionOutcome::Created { id } => id,
            other => panic!("expected creation, got {:?}", other),
        }
    }

    fn today(title: &str, energy: Option<EnergyLevel>) -> NewTask {
        NewTask {
            status_funnel: Some(StatusFunnel::Today),
            energy_level: energy,
            ..NewTask::titled(title)
        }
    }

    fn ids(tasks: &[Task]) -> Vec<i64> {
        tasks.iter().map(|t| t.id).collect()
    }

    fn positions(tasks: &[Task]) -> Vec<i64> {
        tasks.iter().map(|t| t.position).collect()
    }

    #[tokio::test]
    async fn test_created_task_replaces_temporary_id() {
        let ctx = TestContext::new().await;
        let mut orch = orchestrator(&ctx).await;

        let id = create(&mut orch, NewTask::titled("Buy milk")).await;

        assert!(id > 0);
        assert_eq!(orch.board().len(), 1);
        assert!(orch.board().tasks().all(|t| t.id > 0));
        assert_eq!(orch.task(id).unwrap().title, "Buy milk");
    }

    #[tokio::test]
    async fn test_guard_rejects_parent_with_open_subtask() {
        let ctx = TestContext::new().await;
        let mut orch = orchestrator(&ctx).await;
        let parent = create(&mut orch, NewTask::titled("parent")).await;
        let a = create(&mut orch, NewTask::subtask(parent, "a")).await;
        create(&mut orch, NewTask::subtask(parent, "b")).await;
        orch.toggle_complete(a).await.unwrap();

        let result = orch.toggle_complete(parent).await;

        assert!(matches!(
            result,
            Err(PlannerError::UncompletedSubtasks { incomplete: 1, .. })
        ));
        assert_eq!(orch.task(parent).unwrap().status, TaskStatus::Todo);
    }

    #[tokio::test]
    async fn test_cascade_awards_twice() {
        let ctx = TestContext::new().await;
        let mut orch = orchestrator(&ctx).await;
        let parent = create(&mut orch, NewTask::titled("parent")).await;
        let a = create(&mut orch, NewTask::subtask(parent, "a")).await;
        let b = create(&mut orch, NewTask::subtask(parent, "b")).await;

        orch.toggle_complete(a).await.unwrap();
        let xp_before = orch.stats().xp;
        assert_eq!(orch.task(parent).unwrap().status, TaskStatus::Todo);

        let outcome = orch.toggle_complete(b).await.unwrap();

        assert_eq!(outcome, ActionOutcome::Applied);
        let parent = orch.task(parent).unwrap();
        assert_eq!(parent.status, TaskStatus::Done);
        assert!(parent.completed_at.is_some());
        assert_eq!(orch.stats().xp, xp_before + 20);
        assert_eq!(orch.stats().streak, 1);
    }

    #[tokio::test]
    async fn test_uncomplete_keeps_stats() {
        let ctx = TestContext::new().await;
        let mut orch = orchestrator(&ctx).await;
        let id = create(&mut orch, NewTask::titled("t")).await;

        orch.toggle_complete(id).await.unwrap();
        orch.toggle_complete(id).await.unwrap();

        let task = orch.task(id).unwrap();
        assert_eq!(task.status, TaskStatus::Todo);
        assert!(task.completed_at.is_none());
        assert_eq!(orch.stats().xp, 10);
    }

    #[tokio::test]
    async fn test_reorder_persists_dense_positions() {
        let ctx = TestContext::new().await;
        let mut orch = orchestrator(&ctx).await;
        let a = create(&mut orch, today("a", Some(EnergyLevel::HighFocus))).await;
        let b = create(&mut orch, today("b", Some(EnergyLevel::HighFocus))).await;
        let c = create(&mut orch, today("c", Some(EnergyLevel::HighFocus))).await;

        orch.reorder_within(BucketKey::HIGH_FOCUS, 0, 2)
            .await
            .unwrap();
        assert_eq!(ids(&orch.execution_view().high_focus), vec![b, c, a]);

        // a fresh load sees the same order
        let reloaded = orchestrator(&ctx).await;
        let column = reloaded.execution_view().high_focus;
        assert_eq!(ids(&column), vec![b, c, a]);
        assert_eq!(positions(&column), vec![0, 1, 2]);

        // same-index reorder is a no-op
        assert_eq!(
            orch.reorder_within(BucketKey::HIGH_FOCUS, 1, 1)
                .await
                .unwrap(),
            ActionOutcome::Unchanged
        );
    }

    #[tokio::test]
    async fn test_reorder_of_a_long_bucket_commits_every_row() {
        let ctx = TestContext::new().await;
        let mut orch = orchestrator(&ctx).await;
        for i in 0..12 {
            create(&mut orch, NewTask::titled(format!("t{}", i))).await;
        }

        for _ in 0..4 {
            let outcome = orch
                .reorder_within(BucketKey::Backlog, 0, 11)
                .await
                .unwrap();
            assert_eq!(outcome, ActionOutcome::Applied);
        }

        let local = ids(&orch.planning_view().backlog);
        let reloaded = orchestrator(&ctx).await;
        let backlog = reloaded.planning_view().backlog;
        assert_eq!(ids(&backlog), local);
        assert_eq!(positions(&backlog), (0..12).collect::<Vec<i64>>());
    }

    #[tokio::test]
    async fn test_completing_closes_the_gap_it_leaves() {
        let ctx = TestContext::new().await;
        let mut orch = orchestrator(&ctx).await;
        let high = Some(EnergyLevel::HighFocus);
        let first = create(&mut orch, today("first", high)).await;
        let second = create(&mut orch, today("second", high)).await;
        let third = create(&mut orch, today("third", high)).await;

        orch.toggle_complete(first).await.unwrap();

        let column = orch.execution_view().high_focus;
        assert_eq!(ids(&column), vec![second, third]);
        assert_eq!(positions(&column), vec![0, 1]);
        let reloaded = orchestrator(&ctx).await;
        assert_eq!(positions(&reloaded.execution_view().high_focus), vec![0, 1]);

        // done through an edit behaves the same
        let patch = TaskPatch::status(TaskStatus::Done);
        orch.edit_task(second, patch).await.unwrap();
        assert_eq!(orch.task(third).unwrap().position, 0);
        let reloaded = orchestrator(&ctx).await;
        assert_eq!(reloaded.task(third).unwrap().position, 0);
    }

    #[tokio::test]
    async fn test_energy_change_moves_between_columns() {
        let ctx = TestContext::new().await;
        let mut orch = orchestrator(&ctx).await;
        let a = create(&mut orch, today("a", Some(EnergyLevel::HighFocus))).await;
        let b = create(&mut orch, today("b", Some(EnergyLevel::HighFocus))).await;
        let c = create(&mut orch, today("c", Some(EnergyLevel::LowEnergy))).await;

        orch.update_energy(a, Some(EnergyLevel::LowEnergy))
            .await
            .unwrap();

        let reloaded = orchestrator(&ctx).await;
        let view = reloaded.execution_view();
        assert_eq!(ids(&view.high_focus), vec![b]);
        assert_eq!(positions(&view.high_focus), vec![0]);
        assert_eq!(ids(&view.low_energy), vec![c, a]);
        assert_eq!(positions(&view.low_energy), vec![0, 1]);
    }

    #[tokio::test]
    async fn test_unassigned_energy_only_in_planning_view() {
        let ctx = TestContext::new().await;
        let mut orch = orchestrator(&ctx).await;
        let id = create(&mut orch, today("someday today", None)).await;

        assert_eq!(ids(&orch.planning_view().today), vec![id]);
        let view = orch.execution_view();
        assert!(view.high_focus.is_empty());
        assert!(view.low_energy.is_empty());
    }

    #[tokio::test]
    async fn test_move_funnel_appends_and_densifies_source() {
        let ctx = TestContext::new().await;
        let mut orch = orchestrator(&ctx).await;
        let a = create(&mut orch, NewTask::titled("a")).await;
        let b = create(&mut orch, NewTask::titled("b")).await;
        let w = create(
            &mut orch,
            NewTask {
                status_funnel: Some(StatusFunnel::Weekly),
                ..NewTask::titled("w")
            },
        )
        .await;

        orch.move_funnel(a, StatusFunnel::Weekly).await.unwrap();

        let reloaded = orchestrator(&ctx).await;
        let view = reloaded.planning_view();
        assert_eq!(ids(&view.backlog), vec![b]);
        assert_eq!(positions(&view.backlog), vec![0]);
        assert_eq!(ids(&view.weekly), vec![w, a]);
        assert_eq!(positions(&view.weekly), vec![0, 1]);
    }

    #[tokio::test]
    async fn test_drag_into_other_container_appends() {
        let ctx = TestContext::new().await;
        let mut orch = orchestrator(&ctx).await;
        let a = create(&mut orch, today("a", Some(EnergyLevel::HighFocus))).await;
        let b = create(&mut orch, NewTask::titled("b")).await;

        orch.begin_drag(a).unwrap();
        assert!(orch.drag_state().is_dragging());
        orch.end_drag(Some(DropTarget::Container(BucketKey::Backlog)))
            .await
            .unwrap();

        assert!(!orch.drag_state().is_dragging());
        assert_eq!(ids(&orch.planning_view().backlog), vec![b, a]);
        let stored = orchestrator(&ctx).await;
        assert_eq!(stored.task(a).unwrap().status_funnel, StatusFunnel::Backlog);
        assert_eq!(stored.task(a).unwrap().position, 1);
    }

    #[tokio::test]
    async fn test_drag_over_task_inserts_before_it() {
        let ctx = TestContext::new().await;
        let mut orch = orchestrator(&ctx).await;
        let a = create(&mut orch, today("a", Some(EnergyLevel::HighFocus))).await;
        let x = create(&mut orch, today("x", Some(EnergyLevel::LowEnergy))).await;
        let y = create(&mut orch, today("y", Some(EnergyLevel::LowEnergy))).await;

        orch.begin_drag(a).unwrap();
        orch.end_drag(Some(DropTarget::Task(y))).await.unwrap();

        let stored = orchestrator(&ctx).await;
        let view = stored.execution_view();
        assert!(view.high_focus.is_empty());
        assert_eq!(ids(&view.low_energy), vec![x, a, y]);
        assert_eq!(positions(&view.low_energy), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_drag_down_within_bucket_lands_before_target() {
        let ctx = TestContext::new().await;
        let mut orch = orchestrator(&ctx).await;
        let a = create(&mut orch, NewTask::titled("a")).await;
        let b = create(&mut orch, NewTask::titled("b")).await;
        let c = create(&mut orch, NewTask::titled("c")).await;

        orch.begin_drag(a).unwrap();
        orch.end_drag(Some(DropTarget::Task(c))).await.unwrap();

        assert_eq!(ids(&orch.planning_view().backlog), vec![b, a, c]);
        let stored = orchestrator(&ctx).await;
        let backlog = stored.planning_view().backlog;
        assert_eq!(ids(&backlog), vec![b, a, c]);
        assert_eq!(positions(&backlog), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_delete_parent_removes_subtasks_and_closes_gap() {
        let ctx = TestContext::new().await;
        let mut orch = orchestrator(&ctx).await;
        let first = create(&mut orch, NewTask::titled("first")).await;
        let parent = create(&mut orch, NewTask::titled("parent")).await;
        create(&mut orch, NewTask::subtask(parent, "a")).await;
        let last = create(&mut orch, NewTask::titled("last")).await;

        orch.delete_task(first).await.unwrap();
        orch.delete_task(parent).await.unwrap();

        let stored = orchestrator(&ctx).await;
        assert_eq!(stored.board().len(), 1);
        assert_eq!(stored.task(last).unwrap().position, 0);
    }

    #[tokio::test]
    async fn test_delete_subtask_refuses_top_level() {
        let ctx = TestContext::new().await;
        let mut orch = orchestrator(&ctx).await;
        let parent = create(&mut orch, NewTask::titled("parent")).await;
        let child = create(&mut orch, NewTask::subtask(parent, "child")).await;

        assert!(matches!(
            orch.delete_subtask(parent).await,
            Err(PlannerError::InvalidInput(_))
        ));
        orch.delete_subtask(child).await.unwrap();
        assert!(orch.subtasks(parent).is_empty());
    }

    #[tokio::test]
    async fn test_clean_slate_threshold_and_move() {
        let ctx = TestContext::new().await;
        let mut orch = orchestrator(&ctx).await;
        for i in 0..6 {
            create(&mut orch, today(&format!("task {}", i), None)).await;
        }
        let finished = create(&mut orch, today("finished", None)).await;
        orch.toggle_complete(finished).await.unwrap();
        assert!(orch.should_offer_clean_slate());

        orch.clean_slate().await.unwrap();

        assert_eq!(orch.pending_today_count(), 0);
        assert!(!orch.should_offer_clean_slate());
        let stored = orchestrator(&ctx).await;
        let backlog = stored.planning_view().backlog;
        assert_eq!(backlog.len(), 6);
        assert_eq!(positions(&backlog), (0..6).collect::<Vec<i64>>());
        assert_eq!(
            stored.task(finished).unwrap().status_funnel,
            StatusFunnel::Today
        );
    }

    #[tokio::test]
    async fn test_clean_slate_renumbers_tasks_in_progress() {
        let ctx = TestContext::new().await;
        let mut orch = orchestrator(&ctx).await;
        let low = Some(EnergyLevel::LowEnergy);
        create(&mut orch, today("a", low)).await;
        create(&mut orch, today("b", low)).await;
        let started = create(&mut orch, today("c", low)).await;
        let patch = TaskPatch::status(TaskStatus::InProgress);
        orch.edit_task(started, patch).await.unwrap();

        orch.clean_slate().await.unwrap();

        assert_eq!(orch.task(started).unwrap().position, 0);
        let reloaded = orchestrator(&ctx).await;
        let column = reloaded.execution_view().low_energy;
        assert_eq!(ids(&column), vec![started]);
        assert_eq!(positions(&column), vec![0]);
    }

    #[tokio::test]
    async fn test_persistence_failure_rolls_back() {
        let ctx = TestContext::new().await;
        let store = FlakyStore::new(LocalStore::new(ctx.pool().clone(), OWNER));
        let mut orch = Orchestrator::connect(store).await.unwrap();
        let id = create(&mut orch, NewTask::titled("t")).await;

        orch.store().fail_writes.store(true, Ordering::SeqCst);
        let outcome = orch.toggle_complete(id).await.unwrap();

        assert!(matches!(outcome, ActionOutcome::RolledBack { .. }));
        assert_eq!(orch.task(id).unwrap().status, TaskStatus::Todo);
        assert_eq!(orch.stats().xp, 0);
        assert!(!orch.is_stale());
    }

    #[tokio::test]
    async fn test_failed_refetch_marks_stale() {
        let ctx = TestContext::new().await;
        let store = FlakyStore::new(LocalStore::new(ctx.pool().clone(), OWNER));
        let mut orch = Orchestrator::connect(store).await.unwrap();
        let id = create(&mut orch, NewTask::titled("t")).await;

        orch.store().fail_writes.store(true, Ordering::SeqCst);
        orch.store().fail_reads.store(true, Ordering::SeqCst);
        let outcome = orch.toggle_complete(id).await.unwrap();

        assert!(matches!(outcome, ActionOutcome::RolledBack { .. }));
        assert!(orch.is_stale());

        orch.store().fail_reads.store(false, Ordering::SeqCst);
        orch.refresh().await.unwrap();
        assert!(!orch.is_stale());
    }

    #[tokio::test]
    async fn test_store_rejection_refetches_and_surfaces() {
        let ctx = TestContext::new().await;
        let mut mine = orchestrator(&ctx).await;
        let parent = create(&mut mine, NewTask::titled("parent")).await;

        // someone else removes the parent behind our back
        let mut other = orchestrator(&ctx).await;
        other.delete_task(parent).await.unwrap();

        let result = mine.add_subtask(parent, "orphan").await;

        assert!(matches!(result, Err(PlannerError::TaskNotFound(_))));
        assert!(mine.board().is_empty());
    }

    #[tokio::test]
    async fn test_validation_errors_never_reach_the_store() {
        let ctx = TestContext::new().await;
        let store = FlakyStore::new(LocalStore::new(ctx.pool().clone(), OWNER));
        let mut orch = Orchestrator::connect(store).await.unwrap();
        orch.store().fail_writes.store(true, Ordering::SeqCst);

        assert!(matches!(
            orch.create_task(NewTask::titled("")).await,
            Err(PlannerError::InvalidInput(_))
        ));
        assert!(matches!(
            orch.toggle_complete(42).await,
            Err(PlannerError::TaskNotFound(42))
        ));
        assert!(orch.board().is_empty());
    }
}
