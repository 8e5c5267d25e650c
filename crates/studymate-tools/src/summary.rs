//! Document summaries.

use std::str::FromStr;

use chrono::NaiveDateTime;

use crate::error::Result;
use crate::{require_words, StudyTools};

pub const MIN_WORDS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SummaryLength {
    Brief,
    #[default]
    Detailed,
    Comprehensive,
}

impl SummaryLength {
    pub fn label(self) -> &'static str {
        match self {
            SummaryLength::Brief => "Brief",
            SummaryLength::Detailed => "Detailed",
            SummaryLength::Comprehensive => "Comprehensive",
        }
    }

    fn bullet_range(self) -> &'static str {
        match self {
            SummaryLength::Brief => "3-5",
            SummaryLength::Detailed => "7-10",
            SummaryLength::Comprehensive => "10-15",
        }
    }
}

impl FromStr for SummaryLength {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "brief" => Ok(SummaryLength::Brief),
            "detailed" => Ok(SummaryLength::Detailed),
            "comprehensive" => Ok(SummaryLength::Comprehensive),
            other => Err(format!("unknown summary length '{other}' (brief, detailed, comprehensive)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SummaryFocus {
    #[default]
    GeneralOverview,
    MainArguments,
    KeyConcepts,
    ImportantFacts,
    Conclusions,
}

impl SummaryFocus {
    pub fn label(self) -> &'static str {
        match self {
            SummaryFocus::GeneralOverview => "General Overview",
            SummaryFocus::MainArguments => "Main Arguments",
            SummaryFocus::KeyConcepts => "Key Concepts",
            SummaryFocus::ImportantFacts => "Important Facts",
            SummaryFocus::Conclusions => "Conclusions",
        }
    }

    fn instruction(self) -> &'static str {
        match self {
            SummaryFocus::GeneralOverview => "Provide a comprehensive overview covering all main topics and ideas.",
            SummaryFocus::MainArguments => "Focus on the main arguments, claims and reasoning presented.",
            SummaryFocus::KeyConcepts => "Emphasize key concepts, definitions and important terminology.",
            SummaryFocus::ImportantFacts => "Highlight important facts, data, statistics and specific information.",
            SummaryFocus::Conclusions => "Focus on conclusions, results, outcomes and final thoughts.",
        }
    }
}

impl FromStr for SummaryFocus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['_', ' '], "-").as_str() {
            "general" | "general-overview" | "overview" => Ok(SummaryFocus::GeneralOverview),
            "arguments" | "main-arguments" => Ok(SummaryFocus::MainArguments),
            "concepts" | "key-concepts" => Ok(SummaryFocus::KeyConcepts),
            "facts" | "important-facts" => Ok(SummaryFocus::ImportantFacts),
            "conclusions" => Ok(SummaryFocus::Conclusions),
            other => Err(format!("unknown summary focus '{other}' (overview, arguments, concepts, facts, conclusions)")),
        }
    }
}

pub fn summary_prompt(text: &str, length: SummaryLength, focus: SummaryFocus) -> String {
    format!(
        "You are an expert at creating clear, concise summaries of academic and educational documents.\n\n\
         Summarize the following document in {} bullet points.\n\n\
         Focus: {}\n\n\
         Requirements:\n\
         - Start each bullet point with \"•\".\n\
         - Keep each point concise but informative (1-2 sentences).\n\
         - Use clear, academic language and put the most important information first.\n\
         - Do not repeat the same information.\n\n\
         Document Content:\n{}\n\n\
         Summary:",
        length.bullet_range(),
        focus.instruction(),
        text.trim()
    )
}

/// Summary with a header naming the source, for saving to a file.
pub fn format_summary(summary: &str, source: &str, length: SummaryLength, focus: SummaryFocus, generated: NaiveDateTime) -> String {
    format!(
        "STUDYMATE DOCUMENT SUMMARY\n==========================\n\n\
         Source Document: {source}\nSummary Length: {}\nFocus: {}\nGenerated: {}\n\n\
         SUMMARY:\n--------\n\n{}\n",
        length.label(),
        focus.label(),
        generated.format("%Y-%m-%d %H:%M:%S"),
        summary.trim()
    )
}

impl StudyTools {
    pub async fn summarize(&self, text: &str, length: SummaryLength, focus: SummaryFocus) -> Result<String> {
        require_words(text, MIN_WORDS, "a summary")?;
        self.generate("summary", summary_prompt(text, length, focus), self.settings.summary).await
    }
}
