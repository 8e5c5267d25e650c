//! Intent routing: one classification call plus keyword overrides.

use std::sync::Arc;

use studymate_core::config::Sampling;
use studymate_core::types::{ConversationTurn, RoutingDecision};

use crate::backend::{GenerationBackend, GenerationRequest};
use crate::error::ChatError;
use crate::prompt::{classification_prompt, prompt_history, ROUTER_HISTORY_WINDOW};

const HINT_PREFIX: &str = "TOOL_HINT:";

pub struct IntentRouter {
    backend: Arc<dyn GenerationBackend>,
    model: String,
    sampling: Sampling,
    assistant: String,
}

impl IntentRouter {
    pub fn new(backend: Arc<dyn GenerationBackend>, model: impl Into<String>, sampling: Sampling) -> Self {
        Self { backend, model: model.into(), sampling, assistant: "StudyMate".to_string() }
    }

    pub fn with_assistant_name(mut self, name: impl Into<String>) -> Self {
        self.assistant = name.into();
        self
    }

    /// Classify `query`. Only an unreachable backend is an error; any other
    /// failure, and any reply that is not `TOOL_HINT: <LABEL>`, routes to
    /// GENERAL. Keyword overrides are applied last.
    pub async fn route(&self, query: &str, history: &[ConversationTurn]) -> Result<RoutingDecision, ChatError> {
        let clean = prompt_history(history, "");
        let start = clean.len().saturating_sub(ROUTER_HISTORY_WINDOW);
        let prompt = classification_prompt(&self.assistant, &clean[start..], query);
        let request = GenerationRequest::new(self.model.clone(), prompt, self.sampling);

        let suggested = match self.backend.complete(&request).await {
            Ok(reply) => parse_hint(&reply),
            Err(e) if e.is_unavailable() => return Err(e),
            Err(e) => {
                tracing::warn!(error = %e, "classification failed; routing to GENERAL");
                RoutingDecision::General
            }
        };
        let decision = apply_overrides(query, suggested);
        tracing::debug!(%suggested, %decision, "routed query");
        Ok(decision)
    }
}

/// Label from a `TOOL_HINT: <LABEL>` reply, GENERAL otherwise.
pub fn parse_hint(reply: &str) -> RoutingDecision {
    let Some(rest) = reply.trim().strip_prefix(HINT_PREFIX) else {
        tracing::debug!(reply, "classifier reply without hint prefix");
        return RoutingDecision::General;
    };
    rest.split_whitespace()
        .next()
        .map(|token| token.trim_matches(|c: char| !(c.is_ascii_alphanumeric() || c == '_')))
        .and_then(|label| label.parse().ok())
        .unwrap_or(RoutingDecision::General)
}

/// Keyword rules that always win over the classifier.
pub fn apply_overrides(query: &str, suggested: RoutingDecision) -> RoutingDecision {
    let lowered = query.to_lowercase();
    if lowered.contains("pomodoro") {
        return RoutingDecision::WebSearch;
    }
    if lowered.contains("why is it important") || (lowered.contains("explain") && suggested == RoutingDecision::Rag) {
        return RoutingDecision::WebSearch;
    }
    suggested
}
