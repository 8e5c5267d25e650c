//! studymate-tools
//!
//! Study helpers on top of the generation backend: quizzes, flashcards,
//! document summaries and study plans, plus progress tracking over a saved
//! plan and the quiz history. Each helper is a prompt builder, one
//! streamed generation and a reply parser; the builders and parsers are plain
//! functions.

use std::sync::Arc;
use std::time::Instant;

use futures::TryStreamExt;
use studymate_chat::{GenerationBackend, GenerationRequest};
use studymate_core::config::{GenerationSettings, Sampling};

pub mod error;
pub mod flashcards;
pub mod planner;
pub mod quiz;
pub mod summary;
pub mod tracker;

pub use error::{Result, ToolError};
pub use flashcards::{CardDifficulty, Flashcard};
pub use planner::{LearningStyle, PlanDuration, PlanRequest};
pub use quiz::{Difficulty, QuestionType, QuizQuestion, QuizRequest, QuizScore};
pub use summary::{SummaryFocus, SummaryLength};
pub use tracker::{PlanDay, PlanTask, ProgressStats};

pub struct StudyTools {
    backend: Arc<dyn GenerationBackend>,
    settings: GenerationSettings,
}

impl StudyTools {
    pub fn new(backend: Arc<dyn GenerationBackend>, settings: GenerationSettings) -> Self {
        Self { backend, settings }
    }

    /// Collects a streamed reply. Long generations stay within the
    /// per-read timeout instead of one timeout for the whole reply.
    async fn generate(&self, what: &'static str, prompt: String, sampling: Sampling) -> Result<String> {
        let request = GenerationRequest::new(self.settings.model.clone(), prompt, sampling);
        let started = Instant::now();
        let reply: String = self.backend.stream(&request).await?.try_collect().await?;
        let reply = reply.trim();
        if reply.is_empty() {
            return Err(ToolError::EmptyReply(what));
        }
        tracing::debug!(tool = what, chars = reply.len(), ms = started.elapsed().as_millis() as u64, "generation finished");
        Ok(reply.to_string())
    }
}

/// Value after `label` on a reply line, tolerating markdown bold around the
/// label (`**TERM:** x`). Label matching ignores ASCII case.
pub(crate) fn labelled<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let line = line.trim().trim_start_matches('*').trim_start();
    let head = line.get(..label.len())?;
    if !head.eq_ignore_ascii_case(label) {
        return None;
    }
    Some(line[label.len()..].trim_matches(|c: char| c == '*' || c.is_whitespace()))
}

/// Rejects documents too short to work from.
pub(crate) fn require_words(text: &str, minimum: usize, what: &str) -> Result<()> {
    let words = text.split_whitespace().count();
    if words < minimum {
        return Err(ToolError::InvalidInput(format!(
            "document too short for {what}: {words} words, at least {minimum} needed"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labelled_accepts_plain_and_bold_labels() {
        assert_eq!(labelled("TERM: Entropy", "TERM:"), Some("Entropy"));
        assert_eq!(labelled("  **Term:** Entropy ", "TERM:"), Some("Entropy"));
        assert_eq!(labelled("DEFINITION: x", "TERM:"), None);
        assert_eq!(labelled("TE", "TERM:"), None);
        assert_eq!(labelled("é€TERM: x", "TERM:"), None);
    }

    #[test]
    fn short_documents_are_rejected() {
        assert!(require_words("one two three", 3, "a summary").is_ok());
        let err = require_words("one two", 3, "a summary").unwrap_err();
        assert!(err.to_string().contains("2 words, at least 3"));
    }
}
