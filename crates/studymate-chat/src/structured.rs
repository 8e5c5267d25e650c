//! Deterministic replies for TASKS and SYLLABUS routes.

use studymate_core::types::{Subject, Task};

use crate::prompt::subject_lines;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskFilter {
    Pending,
    Completed,
    All,
}

impl TaskFilter {
    pub fn from_query(query: &str) -> Self {
        let q = query.to_lowercase();
        let asks_pending = ["pending", "due", "incomplete"].iter().any(|k| q.contains(k))
            || (q.contains("what are my tasks") && !q.contains("completed"));
        if asks_pending {
            TaskFilter::Pending
        } else if ["completed", "done", "finished"].iter().any(|k| q.contains(k)) {
            TaskFilter::Completed
        } else {
            TaskFilter::All
        }
    }
}

pub fn task_reply(query: &str, tasks: &[Task]) -> String {
    let mut out = String::new();
    match TaskFilter::from_query(query) {
        TaskFilter::Pending => {
            let pending: Vec<&Task> = tasks.iter().filter(|t| !t.completed).collect();
            if pending.is_empty() {
                return "Great news! You have no pending tasks. You're on top of things!".to_string();
            }
            out.push_str("Here are your pending tasks, ready to be crushed!\n");
            for t in pending {
                out.push_str(&format!("- {} (Due: {})\n", t.description, t.due_date));
            }
        }
        TaskFilter::Completed => {
            let completed: Vec<&Task> = tasks.iter().filter(|t| t.completed).collect();
            if completed.is_empty() {
                return "You haven't marked any tasks as completed yet. Time to get started!".to_string();
            }
            out.push_str("Fantastic job! Here are your completed tasks:\n");
            for t in completed {
                out.push_str(&format!("- {} (Due: {})\n", t.description, t.due_date));
            }
        }
        TaskFilter::All => {
            if tasks.is_empty() {
                return "You currently have no tasks added. Let's set some goals!".to_string();
            }
            out.push_str("Here's a look at all your tasks, both pending and completed:\n");
            for t in tasks {
                let status = if t.completed { "Completed!" } else { "Pending..." };
                out.push_str(&format!("- {} (Due: {}) - {status}\n", t.description, t.due_date));
            }
        }
    }
    out
}

pub fn syllabus_reply(subjects: &[Subject]) -> String {
    if subjects.is_empty() {
        return "It looks like your academic roadmap is empty for now. Time to add some exciting subjects!".to_string();
    }
    format!("Here's your academic roadmap and subjects! Let's conquer these together!\n{}", subject_lines(subjects))
}
