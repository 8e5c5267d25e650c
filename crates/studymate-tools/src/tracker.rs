//! Progress over a saved study plan and the quiz history.
//!
//! Plan tasks are bullets under "Day N" lines. Task ids are
//! `<day>.<task>`, both 1-based in plan order, so they stay stable as long
//! as the plan text does. Completions are kept by the store as
//! id -> `YYYY-MM-DD`.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Duration, NaiveDate, NaiveDateTime};

use studymate_core::types::QuizRecord;

use crate::quiz::HISTORY_DATE_FORMAT;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanTask {
    pub id: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanDay {
    pub title: String,
    pub tasks: Vec<PlanTask>,
}

fn is_day_line(line: &str) -> bool {
    line.contains("Day") && line.chars().any(|c| c.is_ascii_digit())
}

fn bullet_text(line: &str) -> Option<&str> {
    if line.starts_with("**") {
        return None;
    }
    let rest = line
        .strip_prefix('-')
        .or_else(|| line.strip_prefix('•'))
        .or_else(|| line.strip_prefix('*'))?;
    let rest = rest.trim();
    (!rest.is_empty()).then_some(rest)
}

fn flush(day: Option<PlanDay>, days: &mut Vec<PlanDay>) {
    if let Some(day) = day.filter(|d| !d.tasks.is_empty()) {
        days.push(day);
    }
}

/// Days in plan order. Days without tasks are dropped; headings that are not
/// day lines (weekly reviews, tips) and `---` rules end the current day.
pub fn parse_plan_tasks(plan: &str) -> Vec<PlanDay> {
    let mut days: Vec<PlanDay> = Vec::new();
    let mut current: Option<PlanDay> = None;
    for raw in plan.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let bullet = bullet_text(line);
        if bullet.is_none() && is_day_line(line) {
            flush(current.take(), &mut days);
            let title = line.trim_start_matches('#').trim().trim_matches('*').trim();
            current = Some(PlanDay { title: title.to_string(), tasks: Vec::new() });
        } else if line.starts_with('#') || line.starts_with("---") {
            flush(current.take(), &mut days);
        } else if let (Some(text), Some(day)) = (bullet, current.as_mut()) {
            let id = format!("{}.{}", days.len() + 1, day.tasks.len() + 1);
            day.tasks.push(PlanTask { id, description: text.to_string() });
        }
    }
    flush(current.take(), &mut days);
    days
}

pub fn find_task<'a>(days: &'a [PlanDay], id: &str) -> Option<&'a PlanTask> {
    days.iter().flat_map(|d| d.tasks.iter()).find(|t| t.id == id)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressStats {
    pub total: usize,
    pub completed: usize,
    pub remaining: usize,
    pub percentage: f64,
}

/// Completions for ids not in the plan are ignored.
pub fn overall_progress(days: &[PlanDay], completions: &BTreeMap<String, String>) -> ProgressStats {
    let total = days.iter().map(|d| d.tasks.len()).sum::<usize>();
    let completed = days
        .iter()
        .flat_map(|d| d.tasks.iter())
        .filter(|t| completions.contains_key(&t.id))
        .count();
    let percentage = if total == 0 { 0.0 } else { completed as f64 / total as f64 * 100.0 };
    ProgressStats { total, completed, remaining: total - completed, percentage }
}

/// Consecutive days with at least one completed task, ending today or
/// yesterday. Unparsable dates are skipped.
pub fn study_streak(completions: &BTreeMap<String, String>, today: NaiveDate) -> u32 {
    let dates: BTreeSet<NaiveDate> = completions
        .values()
        .filter_map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .collect();
    let mut day = if dates.contains(&today) { today } else { today - Duration::days(1) };
    let mut streak = 0;
    while dates.contains(&day) {
        streak += 1;
        day -= Duration::days(1);
    }
    streak
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuizSummary {
    pub taken: usize,
    pub average: f64,
    pub best: f64,
    pub latest: f64,
}

pub fn quiz_summary(history: &[QuizRecord]) -> Option<QuizSummary> {
    let latest = history.last()?.score_percentage;
    let scores = history.iter().map(|q| q.score_percentage);
    Some(QuizSummary {
        taken: history.len(),
        average: scores.clone().sum::<f64>() / history.len() as f64,
        best: scores.fold(f64::MIN, f64::max),
        latest,
    })
}

/// Quizzes taken in the seven days before `now`.
pub fn recent_quizzes(history: &[QuizRecord], now: NaiveDateTime) -> Vec<&QuizRecord> {
    let week_ago = now - Duration::days(7);
    history
        .iter()
        .filter(|q| {
            NaiveDateTime::parse_from_str(&q.date, HISTORY_DATE_FORMAT)
                .map(|taken| taken > week_ago)
                .unwrap_or(false)
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Achievement {
    pub name: &'static str,
    pub description: &'static str,
}

const fn badge(name: &'static str, description: &'static str) -> Achievement {
    Achievement { name, description }
}

/// At most one badge per category: plan progress, quiz average, quiz
/// count, streak.
pub fn achievements(stats: &ProgressStats, history: &[QuizRecord], streak: u32) -> Vec<Achievement> {
    let mut earned = Vec::new();
    let p = stats.percentage;
    if p >= 100.0 {
        earned.push(badge("Plan Completed", "Completed entire study plan"));
    } else if p >= 75.0 {
        earned.push(badge("Almost There", "Completed 75% of study plan"));
    } else if p >= 50.0 {
        earned.push(badge("Halfway Hero", "Completed 50% of study plan"));
    } else if p >= 25.0 {
        earned.push(badge("Getting Started", "Completed 25% of study plan"));
    }
    if let Some(quiz) = quiz_summary(history) {
        if quiz.average >= 90.0 {
            earned.push(badge("Quiz Master", "Average quiz score above 90%"));
        } else if quiz.average >= 80.0 {
            earned.push(badge("Smart Learner", "Average quiz score above 80%"));
        }
        if quiz.taken >= 10 {
            earned.push(badge("Quiz Enthusiast", "Completed 10+ quizzes"));
        } else if quiz.taken >= 5 {
            earned.push(badge("Quiz Explorer", "Completed 5+ quizzes"));
        }
    }
    if streak >= 30 {
        earned.push(badge("Consistent Learner", "30+ day study streak"));
    } else if streak >= 7 {
        earned.push(badge("Week Warrior", "7+ day study streak"));
    }
    earned
}

pub fn progress_report(stats: &ProgressStats, history: &[QuizRecord], streak: u32, now: NaiveDateTime) -> String {
    let mut out = format!(
        "STUDYMATE PROGRESS REPORT\nGenerated: {}\n\n\
         Study Plan Progress\n\
         • Total Tasks: {}\n• Completed Tasks: {}\n• Progress Percentage: {:.1}%\n• Remaining Tasks: {}\n\n\
         Quiz Performance Summary\n",
        now.format("%B %d, %Y"),
        stats.total,
        stats.completed,
        stats.percentage,
        stats.remaining
    );
    match quiz_summary(history) {
        Some(quiz) => {
            out.push_str(&format!(
                "• Total Quizzes Taken: {}\n• Average Score: {:.1}%\n• Best Score: {:.1}%\n• Latest Score: {:.1}%\n\nRecent Quiz History\n",
                quiz.taken, quiz.average, quiz.best, quiz.latest
            ));
            let skip = history.len().saturating_sub(5);
            for q in &history[skip..] {
                out.push_str(&format!("• {}: {:.1}% ({}) - {}\n", q.topic, q.score_percentage, q.grade, q.date));
            }
        }
        None => out.push_str("• No quiz data available yet\n"),
    }
    let recent = recent_quizzes(history, now);
    out.push_str(&format!("\nThis Week\n• Quizzes taken: {}\n", recent.len()));
    if !recent.is_empty() {
        let avg = recent.iter().map(|q| q.score_percentage).sum::<f64>() / recent.len() as f64;
        out.push_str(&format!("• Average score: {avg:.1}%\n"));
    }
    out.push_str(&format!("\nStudy Streak\n• Current Streak: {streak} days\n"));
    let earned = achievements(stats, history, streak);
    if !earned.is_empty() {
        out.push_str("\nAchievements\n");
        for a in earned {
            out.push_str(&format!("• {}: {}\n", a.name, a.description));
        }
    }
    out.trim_end().to_string()
}
