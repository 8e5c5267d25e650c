//! Day-by-day study plans.

use std::str::FromStr;

use chrono::{Duration, NaiveDate};

use crate::error::{Result, ToolError};
use crate::StudyTools;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlanDuration {
    OneWeek,
    TwoWeeks,
    #[default]
    OneMonth,
    ThreeMonths,
    SixMonths,
}

impl PlanDuration {
    pub fn days(self) -> i64 {
        match self {
            PlanDuration::OneWeek => 7,
            PlanDuration::TwoWeeks => 14,
            PlanDuration::OneMonth => 30,
            PlanDuration::ThreeMonths => 90,
            PlanDuration::SixMonths => 180,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PlanDuration::OneWeek => "1 Week",
            PlanDuration::TwoWeeks => "2 Weeks",
            PlanDuration::OneMonth => "1 Month",
            PlanDuration::ThreeMonths => "3 Months",
            PlanDuration::SixMonths => "6 Months",
        }
    }
}

impl FromStr for PlanDuration {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s.to_ascii_lowercase().chars().filter(|c| !c.is_whitespace()).collect();
        match key.as_str() {
            "1w" | "1week" => Ok(PlanDuration::OneWeek),
            "2w" | "2weeks" => Ok(PlanDuration::TwoWeeks),
            "1m" | "1month" => Ok(PlanDuration::OneMonth),
            "3m" | "3months" => Ok(PlanDuration::ThreeMonths),
            "6m" | "6months" => Ok(PlanDuration::SixMonths),
            _ => Err(format!("unknown plan duration '{}' (1w, 2w, 1m, 3m, 6m)", s.trim())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LearningStyle {
    Theory,
    HandsOn,
    #[default]
    Mixed,
}

impl LearningStyle {
    pub fn label(self) -> &'static str {
        match self {
            LearningStyle::Theory => "Theory-focused",
            LearningStyle::HandsOn => "Hands-on/Project-based",
            LearningStyle::Mixed => "Mixed approach",
        }
    }
}

impl FromStr for LearningStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "theory" | "theory-focused" => Ok(LearningStyle::Theory),
            "hands-on" | "handson" | "project" | "project-based" => Ok(LearningStyle::HandsOn),
            "mixed" => Ok(LearningStyle::Mixed),
            other => Err(format!("unknown learning style '{other}' (theory, hands-on, mixed)")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub topic: String,
    pub duration: PlanDuration,
    /// Free text such as "1-2 hours".
    pub daily_time: String,
    /// Free text such as "Beginner".
    pub level: String,
    pub style: LearningStyle,
}

pub fn plan_prompt(request: &PlanRequest) -> String {
    format!(
        "You are an expert educational planner and learning strategist. Create a comprehensive study plan \
         based on the following requirements:\n\n\
         Learning Goal: {}\n\
         Study Duration: {} ({} days)\n\
         Daily Available Time: {}\n\
         Current Level: {}\n\
         Learning Style: {}\n\n\
         Plan Requirements:\n\
         1. Create a day-by-day breakdown for the specified duration.\n\
         2. Each day has specific learning objectives and activities.\n\
         3. Gradually increase complexity based on the current level.\n\
         4. Align activities with the learning style.\n\
         5. Add weekly milestone checkpoints.\n\
         6. Keep the time allocation per activity realistic.\n\n\
         Format (Markdown):\n\
         - One header per day, e.g. \"### Day 1: Foundations\".\n\
         - Tasks as dash bullets with an estimated time, e.g. \"- Read Chapter 1 (1 hour)\".\n\
         - Weekly summary sections, e.g. \"#### Week 1 Summary & Review\".\n\n\
         Learning Style Guidelines:\n\
         - Theory-focused: reading, concept understanding, theoretical frameworks.\n\
         - Hands-on/Project-based: practical exercises, coding, building projects.\n\
         - Mixed approach: balance theory and practice equally.\n\n\
         Please generate a detailed, actionable study plan now:",
        request.topic.trim(),
        request.duration.label(),
        request.duration.days(),
        request.daily_time,
        request.level,
        request.style.label()
    )
}

/// Plan text with a metadata header and study tips appended.
pub fn format_plan(plan: &str, request: &PlanRequest, created: NaiveDate) -> String {
    let ends = created + Duration::days(request.duration.days() - 1);
    format!(
        "### Personalized Study Plan\n\n\
         **Learning Goal:** {}\n\
         **Plan Duration:** {} ({} to {})\n\
         **Daily Study Time:** {}\n\
         **Created:** {}\n\n\
         ---\n\n{}\n\n---\n\n\
         ### Study Tips:\n\
         - **Consistency is key:** stick to your daily schedule as much as possible.\n\
         - **Take breaks:** 25 minutes of study, then 5 minutes off.\n\
         - **Track progress:** mark tasks done with `studymate progress done <id>`.\n\
         - **Review regularly:** revisit previous topics to reinforce learning.",
        request.topic.trim(),
        request.duration.label(),
        created.format("%B %d, %Y"),
        ends.format("%B %d, %Y"),
        request.daily_time,
        created.format("%B %d, %Y"),
        plan.trim()
    )
}

impl StudyTools {
    /// Generates and formats a plan starting on `created`.
    pub async fn create_study_plan(&self, request: &PlanRequest, created: NaiveDate) -> Result<String> {
        if request.topic.trim().is_empty() {
            return Err(ToolError::InvalidInput("please enter a learning topic or goal".into()));
        }
        let plan = self.generate("study plan", plan_prompt(request), self.settings.plan).await?;
        Ok(format_plan(&plan, request, created))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> PlanRequest {
        PlanRequest {
            topic: "Linear algebra".into(),
            duration: PlanDuration::OneWeek,
            daily_time: "1-2 hours".into(),
            level: "Beginner".into(),
            style: LearningStyle::HandsOn,
        }
    }

    #[test]
    fn durations_parse_short_and_long_forms() {
        assert_eq!("2w".parse::<PlanDuration>(), Ok(PlanDuration::TwoWeeks));
        assert_eq!("3 Months".parse::<PlanDuration>(), Ok(PlanDuration::ThreeMonths));
        assert_eq!(PlanDuration::SixMonths.days(), 180);
        assert!("forever".parse::<PlanDuration>().is_err());
        assert_eq!("Hands-On".parse::<LearningStyle>(), Ok(LearningStyle::HandsOn));
    }

    #[test]
    fn prompt_names_every_requirement() {
        let prompt = plan_prompt(&request());
        assert!(prompt.contains("Learning Goal: Linear algebra"));
        assert!(prompt.contains("Study Duration: 1 Week (7 days)"));
        assert!(prompt.contains("Learning Style: Hands-on/Project-based"));
    }

    #[test]
    fn formatted_plan_spans_the_duration() {
        let created = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let out = format_plan("### Day 1: Vectors\n- Read (1 hour)\n", &request(), created);
        assert!(out.contains("**Plan Duration:** 1 Week (March 10, 2025 to March 16, 2025)"));
        assert!(out.contains("---\n\n### Day 1: Vectors\n- Read (1 hour)\n\n---"));
        assert!(out.contains("### Study Tips:"));
    }
}
