//! Domain types shared by the retrieval, routing and chat crates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type FragmentId = String;

/// Provenance of an indexed fragment.
///
/// `Syllabus` fragments are terse "<subject>: <topic>" lines; `KnowledgeBase`
/// fragments are paragraphs of prose from the knowledge-base directory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Syllabus,
    KnowledgeBase,
}

/// One indexable unit of text.
///
/// - `id`: derived from source + offset, stable across rebuilds of the same state
/// - `text`: the payload that is embedded and later injected into prompts
/// - `source_kind`: where the text came from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Fragment {
    pub id: FragmentId,
    pub text: String,
    pub source_kind: SourceKind,
}

impl Fragment {
    pub fn new(id: impl Into<String>, text: impl Into<String>, source_kind: SourceKind) -> Self {
        Self { id: id.into(), text: text.into(), source_kind }
    }
}

/// A fragment returned by a nearest-neighbor query.
///
/// `distance` is cosine distance: lower is more relevant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Neighbor {
    pub fragment: Fragment,
    pub distance: f32,
}

/// Ordered nearest-neighbor results, closest first.
pub type RetrievalResult = Vec<Neighbor>;

/// Strategy chosen for answering a single chat query.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoutingDecision {
    Rag,
    WebSearch,
    Tasks,
    Syllabus,
    General,
}

impl RoutingDecision {
    pub const ALL: [RoutingDecision; 5] = [
        RoutingDecision::Rag,
        RoutingDecision::WebSearch,
        RoutingDecision::Tasks,
        RoutingDecision::Syllabus,
        RoutingDecision::General,
    ];

    pub fn label(self) -> &'static str {
        match self {
            RoutingDecision::Rag => "RAG",
            RoutingDecision::WebSearch => "WEB_SEARCH",
            RoutingDecision::Tasks => "TASKS",
            RoutingDecision::Syllabus => "SYLLABUS",
            RoutingDecision::General => "GENERAL",
        }
    }

    /// Structured routes are answered from store data without any model call.
    pub fn is_structured(self) -> bool {
        matches!(self, RoutingDecision::Tasks | RoutingDecision::Syllabus)
    }
}

impl fmt::Display for RoutingDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RoutingDecision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|d| d.label() == wanted)
            .ok_or_else(|| format!("unknown routing label '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message of a chat session. History is owned by the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// A subject of the study roadmap with its topics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subject {
    pub name: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
}

impl Subject {
    pub fn new(name: impl Into<String>, topics: &[&str]) -> Self {
        Self {
            name: name.into(),
            topics: topics.iter().map(|t| (*t).to_string()).collect(),
            due_date: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    #[serde(default)]
    pub id: u64,
    #[serde(alias = "task")]
    pub description: String,
    pub due_date: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_name: Option<String>,
}

impl Task {
    pub fn new(id: u64, description: impl Into<String>, due_date: impl Into<String>, completed: bool) -> Self {
        Self {
            id,
            description: description.into(),
            due_date: due_date.into(),
            completed,
            subject_name: None,
            topic_name: None,
        }
    }
}

/// One graded quiz attempt kept in the user's history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuizRecord {
    pub topic: String,
    /// `YYYY-MM-DD HH:MM:SS`
    pub date: String,
    pub score_percentage: f64,
    pub grade: String,
    pub total_questions: usize,
    pub correct_answers: usize,
}
