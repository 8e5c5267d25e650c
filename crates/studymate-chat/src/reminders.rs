//! Deadline reminders for incomplete tasks due soon.

use chrono::{Duration, NaiveDate};

use studymate_core::types::Task;

pub const DEFAULT_WINDOW_DAYS: i64 = 2;
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Incomplete tasks due in `[today, today + window_days]`. Tasks whose due
/// date is not `YYYY-MM-DD` are skipped.
pub fn urgent_tasks(tasks: &[Task], today: NaiveDate, window_days: i64) -> Vec<&Task> {
    let horizon = today + Duration::days(window_days.max(0));
    tasks
        .iter()
        .filter(|t| !t.completed)
        .filter(|t| match NaiveDate::parse_from_str(t.due_date.trim(), DATE_FORMAT) {
            Ok(due) => today <= due && due <= horizon,
            Err(e) => {
                tracing::warn!(task = %t.description, due = %t.due_date, error = %e, "skipping task with invalid due date");
                false
            }
        })
        .collect()
}

pub fn reminder_message(student: &str, tasks: &[Task], today: NaiveDate) -> String {
    let urgent = urgent_tasks(tasks, today, DEFAULT_WINDOW_DAYS);
    if urgent.is_empty() {
        return format!(
            "Hello {student}! You currently have no urgent tasks due in the next couple of days. Keep up the great work!"
        );
    }
    let mut out = format!("Hello {student}! Just a friendly reminder that some study tasks are coming up soon:\n\n");
    for t in urgent {
        out.push_str(&format!("- Don't forget to complete '{}' by {}.\n", t.description, t.due_date));
    }
    out.push_str("\nYou've got this!");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    #[test]
    fn window_is_inclusive_and_skips_completed() {
        let tasks = vec![
            Task::new(1, "today", "2025-03-10", false),
            Task::new(2, "edge", "2025-03-12", false),
            Task::new(3, "later", "2025-03-13", false),
            Task::new(4, "overdue", "2025-03-09", false),
            Task::new(5, "done", "2025-03-11", true),
            Task::new(6, "bad date", "next week", false),
        ];
        let urgent: Vec<&str> = urgent_tasks(&tasks, day("2025-03-10"), 2).iter().map(|t| t.description.as_str()).collect();
        assert_eq!(urgent, vec!["today", "edge"]);
    }

    #[test]
    fn messages() {
        let tasks = vec![Task::new(1, "Lab report", "2025-03-11", false)];
        let msg = reminder_message("Ada", &tasks, day("2025-03-10"));
        assert!(msg.starts_with("Hello Ada!"));
        assert!(msg.contains("'Lab report' by 2025-03-11"));

        let calm = reminder_message("Ada", &tasks, day("2025-04-01"));
        assert!(calm.contains("no urgent tasks"));
    }
}
