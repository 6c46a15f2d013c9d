//! Utility functions for CLI handlers
//!
//! Date parsing, status badges and human-friendly task listings.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::db::models::{Task, TaskStatus};
use crate::error::{PlannerError, Result};

/// Parse `YYYY-MM-DD` (midnight UTC) or a full RFC 3339 timestamp
pub fn parse_due_date(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .ok_or_else(|| {
            PlannerError::InvalidInput(format!(
                "Invalid date: '{}'. Use YYYY-MM-DD or RFC 3339",
                raw
            ))
        })
}

/// Get a status badge icon for task status
pub fn status_badge(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Done => "✓",
        TaskStatus::InProgress => "→",
        TaskStatus::Todo => "○",
    }
}

/// One-line summary of a task
pub fn format_task_line(task: &Task) -> String {
    let mut line = format!("{} #{} {}", status_badge(task.status), task.id, task.title);
    if let Some(energy) = task.energy_level {
        line.push_str(&format!(" [{}]", energy));
    }
    if let Some(context) = &task.context_id {
        line.push_str(&format!(" @{}", context));
    }
    if let Some(due) = task.due_date {
        line.push_str(&format!(" (due {})", due.format("%Y-%m-%d")));
    }
    line
}

/// Print a titled list of tasks, each followed by its subtasks
pub fn print_section(title: &str, tasks: &[Task], subtasks_of: impl Fn(i64) -> Vec<Task>) {
    println!("\n{} ({})", title, tasks.len());
    if tasks.is_empty() {
        println!("  (empty)");
    }
    for task in tasks {
        println!("  {}", format_task_line(task));
        for child in subtasks_of(task.id) {
            println!("      {}", format_task_line(&child));
        }
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::EnergyLevel;
    use crate::test_utils::test_helpers::task;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_due_date_formats() {
        let date = parse_due_date("2026-03-14").unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2026, 3, 14));
        assert_eq!(date.hour(), 0);

        let stamp = parse_due_date("2026-03-14T09:30:00+02:00").unwrap();
        assert_eq!(stamp.hour(), 7);

        assert!(matches!(
            parse_due_date("next tuesday"),
            Err(PlannerError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_format_task_line() {
        let mut t = task(4, "Write report");
        t.energy_level = Some(EnergyLevel::HighFocus);
        assert_eq!(format_task_line(&t), "○ #4 Write report [high_focus]");

        t.status = TaskStatus::Done;
        assert!(format_task_line(&t).starts_with("✓"));
    }
}
