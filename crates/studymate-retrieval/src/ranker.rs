//! Lexical relevance filter and source priority over nearest-neighbor hits.

use studymate_core::types::{RetrievalResult, SourceKind};

/// Returned by [`rank`] when the index produced no neighbors at all.
/// Callers treat it as "no context", never as prompt material.
pub const NO_RELEVANT_CONTEXT: &str = "No relevant context found in the syllabus or knowledge base.";

const MAX_JOINED: usize = 2;

pub fn is_no_context(context: &str) -> bool {
    let trimmed = context.trim();
    trimmed.is_empty() || trimmed == NO_RELEVANT_CONTEXT
}

/// Lowercased whitespace-separated query words longer than two characters.
pub fn significant_words(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .filter(|w| w.chars().count() > 2)
        .map(str::to_string)
        .collect()
}

/// Reduce `results` to a single context string.
///
/// Candidates that mention a significant query word are split by provenance;
/// up to two knowledge-base texts win over up to two syllabus texts. When
/// nothing passes the filter the top raw hit is returned as is. Plain
/// substring containment, no stemming.
pub fn rank(query: &str, results: &RetrievalResult) -> String {
    let Some(top) = results.first() else {
        return NO_RELEVANT_CONTEXT.to_string();
    };

    let words = significant_words(query);
    let mut detailed: Vec<&str> = Vec::new();
    let mut syllabus: Vec<&str> = Vec::new();
    for neighbor in results {
        let text = neighbor.fragment.text.as_str();
        let lowered = text.to_lowercase();
        let relevant = words.is_empty() || words.iter().any(|w| lowered.contains(w.as_str()));
        if !relevant {
            continue;
        }
        match neighbor.fragment.source_kind {
            SourceKind::KnowledgeBase => detailed.push(text),
            SourceKind::Syllabus => syllabus.push(text),
        }
    }

    if !detailed.is_empty() {
        return join_first(&detailed);
    }
    if !syllabus.is_empty() {
        return join_first(&syllabus);
    }
    tracing::debug!("no candidate passed the word filter; using top neighbor");
    top.fragment.text.clone()
}

fn join_first(texts: &[&str]) -> String {
    texts.iter().take(MAX_JOINED).copied().collect::<Vec<_>>().join(" ")
}
