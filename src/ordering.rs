//! Ordering engine
//!
//! Positions are dense 0-based indices within a bucket. Every operation here
//! returns assignments for the whole affected list, not only the moved
//! element, so gaps left by earlier cross-bucket moves are closed as well.

use serde::{Deserialize, Serialize};

use crate::error::{PlannerError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionAssignment {
    pub id: i64,
    pub position: i64,
}

/// Result of moving an element out of one bucket and into another
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrossMove {
    pub source: Vec<PositionAssignment>,
    pub target: Vec<PositionAssignment>,
}

impl CrossMove {
    pub fn assignments(&self) -> impl Iterator<Item = &PositionAssignment> {
        self.source.iter().chain(self.target.iter())
    }
}

/// Assign `position = index` to every id in list order
pub fn densify(ids: &[i64]) -> Vec<PositionAssignment> {
    ids.iter()
        .enumerate()
        .map(|(index, &id)| PositionAssignment {
            id,
            position: index as i64,
        })
        .collect()
}

/// Move the element at `from` to `to` and re-densify the list.
///
/// Re-sorting by the returned positions reproduces the reordered list.
pub fn reorder(ids: &[i64], from: usize, to: usize) -> Result<Vec<PositionAssignment>> {
    if from >= ids.len() || to >= ids.len() {
        return Err(PlannerError::InvalidInput(format!(
            "Reorder indices {} -> {} out of range for a bucket of {}",
            from,
            to,
            ids.len()
        )));
    }
    let mut reordered = ids.to_vec();
    let moved = reordered.remove(from);
    reordered.insert(to, moved);
    Ok(densify(&reordered))
}

/// Insert `id` before `index` (clamped to the end) and re-densify
pub fn insert_at(ids: &[i64], id: i64, index: usize) -> Vec<PositionAssignment> {
    let mut inserted: Vec<i64> = ids.iter().copied().filter(|&other| other != id).collect();
    let index = index.min(inserted.len());
    inserted.insert(index, id);
    densify(&inserted)
}

/// Take `id` out of `source` and insert it into `target` at `index`.
pub fn move_across(source: &[i64], target: &[i64], id: i64, index: usize) -> Result<CrossMove> {
    if !source.contains(&id) {
        return Err(PlannerError::InvalidInput(format!(
            "Task #{} is not a member of the source bucket",
            id
        )));
    }
    let remaining: Vec<i64> = source.iter().copied().filter(|&other| other != id).collect();
    Ok(CrossMove {
        source: densify(&remaining),
        target: insert_at(target, id, index),
    })
}

/// Position for appending to a bucket holding `positions`
pub fn next_position(positions: impl IntoIterator<Item = i64>) -> i64 {
    positions.into_iter().max().map_or(0, |max| max + 1)
}
