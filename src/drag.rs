//! Drag-and-drop interaction
//!
//! `Idle -> Dragging { source, item_id } -> Dropped | Cancelled`, resolved
//! against the current board instead of any toolkit-held state.

use crate::board::TaskBoard;
use crate::classifier::{bucket_of, BucketKey};
use crate::error::{PlannerError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging { source: BucketKey, item_id: i64 },
}

/// What the pointer was over when the drag ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropTarget {
    /// Empty area of a bucket's container: append to the end
    Container(BucketKey),
    /// Another task: insert at that task's index
    Task(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropOutcome {
    Dropped {
        item_id: i64,
        source: BucketKey,
        target: BucketKey,
        index: usize,
    },
    Cancelled,
}

impl DragState {
    pub fn is_dragging(&self) -> bool {
        matches!(self, DragState::Dragging { .. })
    }

    pub fn begin(&mut self, board: &TaskBoard, item_id: i64) -> Result<()> {
        if let DragState::Dragging { item_id: active, .. } = self {
            return Err(PlannerError::InvalidInput(format!(
                "Task #{} is already being dragged",
                active
            )));
        }
        let task = board.get(item_id).ok_or(PlannerError::TaskNotFound(item_id))?;
        let source = bucket_of(task);
        if source == BucketKey::Archive {
            return Err(PlannerError::InvalidInput(format!(
                "Archived task #{} cannot be dragged",
                item_id
            )));
        }
        *self = DragState::Dragging { source, item_id };
        Ok(())
    }

    pub fn cancel(&mut self) -> DropOutcome {
        *self = DragState::Idle;
        DropOutcome::Cancelled
    }

    /// End the drag over `target` (or outside any target) and return to idle.
    pub fn finish(&mut self, board: &TaskBoard, target: Option<DropTarget>) -> DropOutcome {
        let state = std::mem::take(self);
        let DragState::Dragging { source, item_id } = state else {
            return DropOutcome::Cancelled;
        };
        let Some(target) = target else {
            return DropOutcome::Cancelled;
        };

        let (bucket, index) = match target {
            DropTarget::Container(bucket) => {
                let others = board
                    .bucket(bucket)
                    .into_iter()
                    .filter(|t| t.id != item_id)
                    .count();
                (bucket, others)
            },
            DropTarget::Task(over_id) => {
                let Some(over) = board.get(over_id) else {
                    return DropOutcome::Cancelled;
                };
                let bucket = bucket_of(over);
                // Index among the other members, so the item lands before `over`
                let index = board
                    .bucket_ids(bucket)
                    .into_iter()
                    .filter(|&id| id != item_id)
                    .position(|id| id == over_id);
                match index {
                    Some(index) => (bucket, index),
                    None => return DropOutcome::Cancelled,
                }
            },
        };

        if !accepts(source, bucket) {
            return DropOutcome::Cancelled;
        }

        DropOutcome::Dropped {
            item_id,
            source,
            target: bucket,
            index,
        }
    }
}

/// Subtasks only move within their parent; top-level tasks move between
/// planning buckets.
fn accepts(source: BucketKey, target: BucketKey) -> bool {
    match source {
        BucketKey::Subtasks { .. } => source == target,
        _ => target.accepts_top_level(),
    }
}
