//! Quiz generation, reply parsing and scoring.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;

use studymate_core::types::QuizRecord;

use crate::error::{Result, ToolError};
use crate::{labelled, StudyTools};

pub const MAX_QUESTIONS: usize = 50;
pub const HISTORY_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Difficulty {
    Easy,
    #[default]
    Intermediate,
    Hard,
}

impl Difficulty {
    pub fn label(self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Intermediate => "Intermediate",
            Difficulty::Hard => "Hard",
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "intermediate" | "medium" => Ok(Difficulty::Intermediate),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty '{other}' (easy, intermediate, hard)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    FillInTheBlank,
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QuestionType::MultipleChoice => "Multiple Choice",
            QuestionType::TrueFalse => "True-False",
            QuestionType::FillInTheBlank => "Fill-in-the-Blank",
        })
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mc" | "multiple-choice" | "multiple choice" => Ok(QuestionType::MultipleChoice),
            "tf" | "true-false" | "true/false" => Ok(QuestionType::TrueFalse),
            "blank" | "fill-in-the-blank" | "fill" => Ok(QuestionType::FillInTheBlank),
            other => Err(format!("unknown question type '{other}' (mc, tf, blank)")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QuizRequest {
    pub topic: String,
    pub num_questions: usize,
    pub difficulty: Difficulty,
    pub question_types: Vec<QuestionType>,
}

impl QuizRequest {
    fn validate(&self) -> Result<()> {
        if self.topic.trim().is_empty() {
            return Err(ToolError::InvalidInput("quiz topic is empty".into()));
        }
        if !(1..=MAX_QUESTIONS).contains(&self.num_questions) {
            return Err(ToolError::InvalidInput(format!("number of questions must be between 1 and {MAX_QUESTIONS}")));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuizQuestion {
    pub question: String,
    /// Type label as the model wrote it.
    pub kind: String,
    /// Option lines as written, e.g. `A) Paris`.
    pub options: Vec<String>,
    pub correct_answer: String,
    pub explanation: String,
}

pub fn quiz_prompt(request: &QuizRequest) -> String {
    let types = if request.question_types.is_empty() {
        QuestionType::MultipleChoice.to_string()
    } else {
        request.question_types.iter().map(ToString::to_string).collect::<Vec<_>>().join(" and ")
    };
    let n = request.num_questions;
    let topic = request.topic.trim();
    let difficulty = request.difficulty.label();
    format!(
        "You are an expert quiz creator and educator. Generate a quiz with these specifications:\n\n\
         Topic: {topic}\n\
         Number of Questions: {n}\n\
         Difficulty Level: {difficulty}\n\
         Question Types: {types}\n\n\
         Requirements:\n\
         1. Create exactly {n} questions about {topic}.\n\
         2. Mix the question types as specified: {types}.\n\
         3. Match the {difficulty} difficulty level.\n\
         4. Multiple choice questions have 4 options (A, B, C, D).\n\
         5. True/false statements are clear and definitive.\n\
         6. Every question has a detailed explanation of the correct answer.\n\n\
         Difficulty guidelines:\n\
         - Easy: basic concepts, definitions, simple recall.\n\
         - Intermediate: application of concepts, analysis.\n\
         - Hard: synthesis, advanced application, critical thinking.\n\n\
         Response format (follow exactly):\n\
         Question [number]: [Question text]\n\
         Type: [Multiple Choice/True-False/Fill-in-the-Blank]\n\
         A) [Option A] (multiple choice only)\n\
         B) [Option B] (multiple choice only)\n\
         C) [Option C] (multiple choice only)\n\
         D) [Option D] (multiple choice only)\n\
         Correct Answer: [Letter, True/False, or the answer text]\n\
         Explanation: [Why this is correct]\n\
         ---\n\n\
         Generate the quiz now:"
    )
}

/// Questions in reply order. Lines after `Explanation:` continue the
/// explanation; lines between the question line and its first field continue
/// the question text. Questions without a correct answer cannot be scored
/// and are dropped.
pub fn parse_quiz(reply: &str) -> Vec<QuizQuestion> {
    let mut questions = Vec::new();
    let mut current: Option<QuizQuestion> = None;
    for raw in reply.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with("---") {
            continue;
        }
        if let Some(text) = question_line(line) {
            questions.extend(current.take());
            current = Some(QuizQuestion { question: text.to_string(), ..QuizQuestion::default() });
            continue;
        }
        let Some(q) = current.as_mut() else { continue };
        if let Some(kind) = labelled(line, "Type:") {
            q.kind = kind.to_string();
        } else if let Some(answer) = labelled(line, "Correct Answer:") {
            q.correct_answer = answer.to_string();
        } else if let Some(explanation) = labelled(line, "Explanation:") {
            q.explanation = explanation.to_string();
        } else if option_letter(line).is_some() {
            q.options.push(line.to_string());
        } else if !q.explanation.is_empty() {
            q.explanation.push(' ');
            q.explanation.push_str(line);
        } else if q.kind.is_empty() && q.options.is_empty() && q.correct_answer.is_empty() {
            q.question.push(' ');
            q.question.push_str(line);
        }
    }
    questions.extend(current);
    questions.retain(|q| {
        let keep = !q.correct_answer.is_empty();
        if !keep {
            tracing::debug!(question = %q.question, "dropping quiz question without an answer");
        }
        keep
    });
    questions
}

fn question_line(line: &str) -> Option<&str> {
    let rest = labelled(line, "Question")?;
    let text = match rest.split_once(':') {
        Some((_, text)) => text,
        None => rest,
    };
    Some(text.trim_matches(|c: char| c == '*' || c.is_whitespace()))
}

/// `A`..`D` for `"a"`, `"B) Paris"`, `"(c)"`, `"d."`.
fn option_letter(answer: &str) -> Option<char> {
    let s = answer.trim().trim_start_matches('(');
    let mut chars = s.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    if !('A'..='D').contains(&letter) {
        return None;
    }
    match chars.next() {
        None => Some(letter),
        Some(')' | '.' | ':') => Some(letter),
        Some(_) => None,
    }
}

/// Case-insensitive text match, or the same option letter on both sides.
pub fn answers_match(given: &str, correct: &str) -> bool {
    let given = given.trim();
    let correct = correct.trim();
    if given.is_empty() {
        return false;
    }
    if given.eq_ignore_ascii_case(correct) {
        return true;
    }
    matches!((option_letter(given), option_letter(correct)), (Some(a), Some(b)) if a == b)
}

pub fn grade(percentage: f64) -> &'static str {
    match percentage {
        p if p >= 90.0 => "A+",
        p if p >= 80.0 => "A",
        p if p >= 70.0 => "B",
        p if p >= 60.0 => "C",
        p if p >= 50.0 => "D",
        _ => "F",
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuestionResult {
    pub number: usize,
    pub question: String,
    pub given: String,
    pub correct_answer: String,
    pub is_correct: bool,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuizScore {
    pub total: usize,
    pub correct: usize,
    pub percentage: f64,
    pub grade: &'static str,
    pub results: Vec<QuestionResult>,
}

impl QuizScore {
    pub fn record(&self, topic: &str, taken: NaiveDateTime) -> QuizRecord {
        QuizRecord {
            topic: topic.to_string(),
            date: taken.format(HISTORY_DATE_FORMAT).to_string(),
            score_percentage: self.percentage,
            grade: self.grade.to_string(),
            total_questions: self.total,
            correct_answers: self.correct,
        }
    }
}

/// `answers[i]` answers question `i`; missing answers count as wrong.
pub fn score_quiz(questions: &[QuizQuestion], answers: &[String]) -> QuizScore {
    let results: Vec<QuestionResult> = questions
        .iter()
        .enumerate()
        .map(|(i, q)| {
            let given = answers.get(i).cloned().unwrap_or_default();
            QuestionResult {
                number: i + 1,
                question: q.question.clone(),
                is_correct: answers_match(&given, &q.correct_answer),
                given,
                correct_answer: q.correct_answer.clone(),
                explanation: q.explanation.clone(),
            }
        })
        .collect();
    let total = results.len();
    let correct = results.iter().filter(|r| r.is_correct).count();
    let percentage = if total == 0 { 0.0 } else { correct as f64 * 100.0 / total as f64 };
    QuizScore { total, correct, percentage, grade: grade(percentage), results }
}

pub fn format_results(topic: &str, score: &QuizScore, taken: NaiveDateTime) -> String {
    let mut out = format!(
        "Quiz Results\n\nTopic: {topic}\nDate: {}\nScore: {}/{} ({:.1}%)\nGrade: {}\n\n",
        taken.format("%B %d, %Y at %I:%M %p"),
        score.correct,
        score.total,
        score.percentage,
        score.grade
    );
    for r in &score.results {
        let mark = if r.is_correct { "✅" } else { "❌" };
        out.push_str(&format!(
            "Question {}: {}\n{mark} Your answer: {}\nCorrect answer: {}\nExplanation: {}\n\n",
            r.number, r.question, r.given, r.correct_answer, r.explanation
        ));
    }
    out.trim_end().to_string()
}

impl StudyTools {
    pub async fn create_quiz(&self, request: &QuizRequest) -> Result<Vec<QuizQuestion>> {
        request.validate()?;
        let reply = self.generate("quiz", quiz_prompt(request), self.settings.quiz).await?;
        let questions = parse_quiz(&reply);
        if questions.is_empty() {
            return Err(ToolError::Unparsable("quiz questions"));
        }
        if questions.len() * 2 < request.num_questions {
            tracing::warn!(parsed = questions.len(), requested = request.num_questions, "model returned fewer quiz questions than asked");
        }
        Ok(questions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPLY: &str = "Here is your quiz!\n\n\
        **Question 1:** What is the capital of France?\n\
        Type: Multiple Choice\n\
        A) Berlin\n\
        B) Paris\n\
        C) Rome\n\
        D) Madrid\n\
        Correct Answer: B\n\
        Explanation: Paris has been the capital\n\
        since the Middle Ages.\n\
        ---\n\
        Question 2: Entropy of an isolated system never decreases.\n\
        Type: True-False\n\
        Correct Answer: True\n\
        Explanation: Second law of thermodynamics.\n\
        ---\n\
        Question 3: A question the model never answered\n";

    #[test]
    fn parses_fields_and_multiline_explanations() {
        let questions = parse_quiz(REPLY);
        assert_eq!(questions.len(), 2, "unanswered question dropped");
        let first = &questions[0];
        assert_eq!(first.question, "What is the capital of France?");
        assert_eq!(first.kind, "Multiple Choice");
        assert_eq!(first.options, vec!["A) Berlin", "B) Paris", "C) Rome", "D) Madrid"]);
        assert_eq!(first.correct_answer, "B");
        assert_eq!(first.explanation, "Paris has been the capital since the Middle Ages.");
        assert_eq!(questions[1].correct_answer, "True");
        assert!(questions[1].options.is_empty());
    }

    #[test]
    fn question_text_can_wrap() {
        let questions = parse_quiz("Question 1: Which law\nrelates force and mass?\nCorrect Answer: Newton's second law\n");
        assert_eq!(questions[0].question, "Which law relates force and mass?");
    }

    #[test]
    fn answers_compare_by_text_or_option_letter() {
        assert!(answers_match(" true ", "True"));
        assert!(answers_match("b", "B) Paris"));
        assert!(answers_match("(B)", "b"));
        assert!(!answers_match("a", "B"));
        assert!(!answers_match("", ""));
        assert!(!answers_match("bonds", "B"));
    }

    #[test]
    fn grade_boundaries() {
        let grades: Vec<&str> = [95.0, 90.0, 80.0, 79.9, 60.0, 50.0, 49.9].into_iter().map(grade).collect();
        assert_eq!(grades, vec!["A+", "A+", "A", "B", "C", "D", "F"]);
    }

    #[test]
    fn scoring_counts_missing_answers_as_wrong() {
        let questions = parse_quiz(REPLY);
        let score = score_quiz(&questions, &["B".to_string()]);
        assert_eq!((score.total, score.correct), (2, 1));
        assert_eq!(score.percentage, 50.0);
        assert_eq!(score.grade, "D");
        assert!(!score.results[1].is_correct);

        let taken = NaiveDateTime::parse_from_str("2025-03-10 14:30:00", HISTORY_DATE_FORMAT).unwrap();
        let record = score.record("Mixed", taken);
        assert_eq!(record.date, "2025-03-10 14:30:00");
        assert_eq!(record.correct_answers, 1);

        let report = format_results("Mixed", &score, taken);
        assert!(report.contains("Score: 1/2 (50.0%)"));
        assert!(report.contains("March 10, 2025 at 02:30 PM"));
    }

    #[test]
    fn empty_quiz_scores_zero() {
        let score = score_quiz(&[], &[]);
        assert_eq!((score.total, score.percentage, score.grade), (0, 0.0, "F"));
    }

    #[test]
    fn prompt_names_every_requested_type() {
        let prompt = quiz_prompt(&QuizRequest {
            topic: "Optics".into(),
            num_questions: 4,
            difficulty: Difficulty::Hard,
            question_types: vec![QuestionType::MultipleChoice, QuestionType::TrueFalse],
        });
        assert!(prompt.contains("Question Types: Multiple Choice and True-False"));
        assert!(prompt.contains("Create exactly 4 questions about Optics."));
        assert!(prompt.contains("Difficulty Level: Hard"));
    }

    #[test]
    fn request_bounds() {
        let mut request = QuizRequest {
            topic: "Optics".into(),
            num_questions: 0,
            difficulty: Difficulty::Easy,
            question_types: vec![],
        };
        assert!(request.validate().is_err());
        request.num_questions = MAX_QUESTIONS;
        assert!(request.validate().is_ok());
        request.topic = "  ".into();
        assert!(matches!(request.validate(), Err(ToolError::InvalidInput(_))));
    }
}
