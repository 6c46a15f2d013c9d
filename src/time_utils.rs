//! Time utility functions
//!
//! Calendar arithmetic shared by the classifier (archive ranges) and the
//! gamification engine (streak days). All boundaries are UTC calendar days.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};

/// Midnight at the start of `at`'s calendar day
pub fn start_of_day(at: DateTime<Utc>) -> DateTime<Utc> {
    midnight(at.date_naive())
}

/// Midnight on the Monday of `at`'s ISO week
pub fn start_of_iso_week(at: DateTime<Utc>) -> DateTime<Utc> {
    let day = at.date_naive();
    let offset = day.weekday().num_days_from_monday() as i64;
    midnight(day - Duration::days(offset))
}

/// Midnight on the first day of `at`'s calendar month
pub fn start_of_month(at: DateTime<Utc>) -> DateTime<Utc> {
    let day = at.date_naive();
    // day 1 of an existing month is always valid
    let first = day.with_day(1).unwrap_or(day);
    midnight(first)
}

pub fn is_same_day(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.date_naive() == b.date_naive()
}

/// True when `earlier` falls on the calendar day immediately before `later`
pub fn is_previous_day(earlier: DateTime<Utc>, later: DateTime<Utc>) -> bool {
    later.date_naive().pred_opt() == Some(earlier.date_naive())
}

fn midnight(day: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day.and_time(chrono::NaiveTime::MIN))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_start_of_day() {
        assert_eq!(
            start_of_day(at("2025-03-12T17:45:00Z")),
            at("2025-03-12T00:00:00Z")
        );
    }

    #[test]
    fn test_start_of_iso_week_is_monday() {
        // 2025-03-12 is a Wednesday
        assert_eq!(
            start_of_iso_week(at("2025-03-12T10:00:00Z")),
            at("2025-03-10T00:00:00Z")
        );
        // Sunday belongs to the week that started the previous Monday
        assert_eq!(
            start_of_iso_week(at("2025-03-16T23:59:00Z")),
            at("2025-03-10T00:00:00Z")
        );
        // Monday is its own week start
        assert_eq!(
            start_of_iso_week(at("2025-03-10T00:00:01Z")),
            at("2025-03-10T00:00:00Z")
        );
    }

    #[test]
    fn test_start_of_month() {
        assert_eq!(
            start_of_month(at("2024-02-29T12:00:00Z")),
            at("2024-02-01T00:00:00Z")
        );
    }

    #[test]
    fn test_previous_day_crosses_month_boundary() {
        assert!(is_previous_day(
            at("2025-02-28T23:00:00Z"),
            at("2025-03-01T01:00:00Z")
        ));
        assert!(!is_previous_day(
            at("2025-02-27T23:00:00Z"),
            at("2025-03-01T01:00:00Z")
        ));
        assert!(!is_previous_day(
            at("2025-03-01T01:00:00Z"),
            at("2025-03-01T02:00:00Z")
        ));
    }

    #[test]
    fn test_same_day() {
        assert!(is_same_day(
            at("2025-03-01T00:00:00Z"),
            at("2025-03-01T23:59:59Z")
        ));
        assert!(!is_same_day(
            at("2025-03-01T23:59:59Z"),
            at("2025-03-02T00:00:00Z")
        ));
    }
}
