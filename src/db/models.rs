use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

use crate::error::PlannerError;

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 1000;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum StatusFunnel {
    #[default]
    Backlog,
    Weekly,
    Today,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum EnergyLevel {
    HighFocus,
    LowEnergy,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in_progress",
            Self::Done => "done",
        }
    }
}

impl StatusFunnel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Backlog => "backlog",
            Self::Weekly => "weekly",
            Self::Today => "today",
        }
    }
}

impl EnergyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HighFocus => "high_focus",
            Self::LowEnergy => "low_energy",
        }
    }

    /// Parse an energy argument where `none` clears the level.
    pub fn parse_optional(s: &str) -> Result<Option<Self>, PlannerError> {
        match s.trim() {
            "none" | "" => Ok(None),
            other => other.parse().map(Some),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for StatusFunnel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for EnergyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "todo" => Ok(Self::Todo),
            "in_progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            other => Err(PlannerError::InvalidInput(format!(
                "Invalid status: '{}'. Use todo, in_progress or done",
                other
            ))),
        }
    }
}

impl FromStr for StatusFunnel {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "backlog" => Ok(Self::Backlog),
            "weekly" => Ok(Self::Weekly),
            "today" => Ok(Self::Today),
            other => Err(PlannerError::InvalidInput(format!(
                "Invalid funnel: '{}'. Use backlog, weekly or today",
                other
            ))),
        }
    }
}

impl FromStr for EnergyLevel {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "high_focus" => Ok(Self::HighFocus),
            "low_energy" => Ok(Self::LowEnergy),
            other => Err(PlannerError::InvalidInput(format!(
                "Invalid energy level: '{}'. Use high_focus, low_energy or none",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: i64,
    pub owner_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i64>,
    pub status_funnel: StatusFunnel,
    #[serde(default)]
    pub energy_level: Option<EnergyLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    pub position: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn is_subtask(&self) -> bool {
        self.parent_id.is_some()
    }

    pub fn is_done(&self) -> bool {
        self.status == TaskStatus::Done
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub owner_id: String,
    pub streak: i64,
    pub xp: i64,
    pub last_completed_date: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl UserStats {
    /// The lazily-created starting record for an owner.
    pub fn empty(owner_id: &str) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            streak: 0,
            xp: 0,
            last_completed_date: None,
            updated_at: Utc::now(),
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            owner_id: self.owner_id.clone(),
            streak: self.streak,
            xp: self.xp,
            last_completed_date: self.last_completed_date,
        }
    }
}

/// Stats as exposed over the REST boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub owner_id: String,
    pub streak: i64,
    pub xp: i64,
    #[serde(default)]
    pub last_completed_date: Option<DateTime<Utc>>,
}

impl StatsSnapshot {
    pub fn zero(owner_id: &str) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            streak: 0,
            xp: 0,
            last_completed_date: None,
        }
    }

    pub fn to_user_stats(&self) -> UserStats {
        UserStats {
            owner_id: self.owner_id.clone(),
            streak: self.streak,
            xp: self.xp,
            last_completed_date: self.last_completed_date,
            updated_at: Utc::now(),
        }
    }
}

/// Create task request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy_level: Option<EnergyLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_funnel: Option<StatusFunnel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i64>,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn subtask(parent_id: i64, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            parent_id: Some(parent_id),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), PlannerError> {
        validate_title(&self.title)?;
        validate_description(self.description.as_deref())
    }
}

/// Update task request
///
/// Nullable fields are `Option<Option<T>>`: absent leaves the field alone,
/// `null` clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_funnel: Option<StatusFunnel>,
    #[serde(
        default,
        deserialize_with = "deserialize_nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub energy_level: Option<Option<EnergyLevel>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
    #[serde(
        default,
        deserialize_with = "deserialize_nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<Option<DateTime<Utc>>>,
    #[serde(
        default,
        deserialize_with = "deserialize_nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub context_id: Option<Option<String>>,
}

impl TaskPatch {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn position(position: i64) -> Self {
        Self {
            position: Some(position),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self) -> Result<(), PlannerError> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(description) = &self.description {
            validate_description(description.as_deref())?;
        }
        Ok(())
    }

    /// Apply the non-status fields to a task. Status goes through the
    /// completion engine instead.
    pub fn apply_fields(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.trim().to_string();
        }
        if let Some(description) = &self.description {
            task.description = description.clone();
        }
        if let Some(funnel) = self.status_funnel {
            task.status_funnel = funnel;
        }
        if let Some(energy) = self.energy_level {
            task.energy_level = energy;
        }
        if let Some(position) = self.position {
            task.position = position;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
        if let Some(context_id) = &self.context_id {
            task.context_id = context_id.clone();
        }
    }
}

fn deserialize_nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

pub fn validate_title(title: &str) -> Result<(), PlannerError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(PlannerError::InvalidInput(
            "Task title cannot be empty".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_TITLE_LEN {
        return Err(PlannerError::InvalidInput(format!(
            "Task title exceeds {} characters",
            MAX_TITLE_LEN
        )));
    }
    Ok(())
}

pub fn validate_description(description: Option<&str>) -> Result<(), PlannerError> {
    match description {
        Some(d) if d.chars().count() > MAX_DESCRIPTION_LEN => Err(PlannerError::InvalidInput(
            format!("Task description exceeds {} characters", MAX_DESCRIPTION_LEN),
        )),
        _ => Ok(()),
    }
}

/// Response for a task update - includes cascaded parents and stats when the
/// update completed something
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdateResponse {
    pub task: Task,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cascaded: Vec<Task>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<StatsSnapshot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanSlateResponse {
    pub moved_count: usize,
}
