//! Builds the final prompt for a routed query and streams the answer.

use std::sync::Arc;

use futures::{stream, StreamExt};

use studymate_core::config::GenerationSettings;
use studymate_core::traits::StudyStore;
use studymate_core::types::{ConversationTurn, RoutingDecision};
use studymate_retrieval::{is_no_context, Retriever};

use crate::backend::{single_chunk, GenerationBackend, GenerationRequest, TextStream};
use crate::error::ChatError;
use crate::prompt::{
    fallback_prompt, main_prompt, prompt_history, MainPromptParts, FALLBACK_FAILED_MESSAGE,
    GENERATION_FAILED_MESSAGE, UNAVAILABLE_MESSAGE,
};
use crate::search::WebSearch;
use crate::structured::{syllabus_reply, task_reply};

const KNOWLEDGE_PREFIX: &str = "Knowledge Base Information:";
const WEB_PREFIX: &str = "Web Search Information:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// Main template with a context block.
    Main,
    /// No external context was found.
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComposedPrompt {
    pub kind: PromptKind,
    pub text: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

pub struct AnswerComposer {
    backend: Arc<dyn GenerationBackend>,
    retriever: Retriever,
    web: Arc<dyn WebSearch>,
    store: Arc<dyn StudyStore>,
    generation: GenerationSettings,
    assistant: String,
}

impl AnswerComposer {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        retriever: Retriever,
        web: Arc<dyn WebSearch>,
        store: Arc<dyn StudyStore>,
        generation: GenerationSettings,
    ) -> Self {
        Self { backend, retriever, web, store, generation, assistant: "StudyMate".to_string() }
    }

    pub fn with_assistant_name(mut self, name: impl Into<String>) -> Self {
        self.assistant = name.into();
        self
    }

    /// Reply text for TASKS / SYLLABUS, built from store data only.
    pub fn structured_reply(&self, query: &str, routing: RoutingDecision) -> Option<String> {
        match routing {
            RoutingDecision::Tasks => Some(match self.store.get_tasks() {
                Ok(tasks) => task_reply(query, &tasks),
                Err(e) => {
                    tracing::warn!(error = %e, "could not load tasks");
                    "I couldn't load your tasks right now. Please try again in a moment.".to_string()
                }
            }),
            RoutingDecision::Syllabus => Some(match self.store.get_all_subjects() {
                Ok(subjects) => syllabus_reply(&subjects),
                Err(e) => {
                    tracing::warn!(error = %e, "could not load subjects");
                    "I couldn't load your roadmap right now. Please try again in a moment.".to_string()
                }
            }),
            _ => None,
        }
    }

    /// Knowledge context then web snippets, each only when usable. RAG reads
    /// the index, WEB_SEARCH the web, GENERAL both.
    pub async fn gather_context(&self, query: &str, routing: RoutingDecision) -> String {
        let (use_index, use_web) = match routing {
            RoutingDecision::Rag => (true, false),
            RoutingDecision::WebSearch => (false, true),
            RoutingDecision::General => (true, true),
            RoutingDecision::Tasks | RoutingDecision::Syllabus => (false, false),
        };
        let knowledge = async {
            if use_index { Some(self.retriever.relevant_context(query).await) } else { None }
        };
        let web = async {
            if use_web { Some(self.web.search(query).await) } else { None }
        };
        let (knowledge, web) = tokio::join!(knowledge, web);

        let mut combined = String::new();
        if let Some(context) = knowledge.filter(|c| !is_no_context(c)) {
            combined.push_str(&format!("{KNOWLEDGE_PREFIX} {context}\n\n"));
        }
        if let Some(snippets) = web {
            match snippets.usable() {
                Some(text) => combined.push_str(&format!("{WEB_PREFIX} {text}\n\n")),
                None => tracing::debug!(result = %snippets, "web search gave no usable snippets"),
            }
        }
        combined.trim().to_string()
    }

    pub async fn build_prompt(&self, query: &str, history: &[ConversationTurn], routing: RoutingDecision) -> ComposedPrompt {
        let context = self.gather_context(query, routing).await;
        let turns = prompt_history(history, query);

        if context.is_empty() {
            let sampling = self.generation.fallback;
            return ComposedPrompt {
                kind: PromptKind::Fallback,
                text: fallback_prompt(&self.assistant, &turns, query),
                temperature: sampling.temperature,
                max_tokens: sampling.max_tokens,
            };
        }

        let subjects = self.store.get_all_subjects().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "subjects unavailable for prompt");
            Vec::new()
        });
        let tasks = self.store.get_tasks().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "tasks unavailable for prompt");
            Vec::new()
        });
        let text = main_prompt(&MainPromptParts {
            assistant: &self.assistant,
            subjects: &subjects,
            tasks: &tasks,
            history: &turns,
            context: &context,
            query,
        });
        let sampling = self.generation.answer;
        ComposedPrompt { kind: PromptKind::Main, text, temperature: sampling.temperature, max_tokens: sampling.max_tokens }
    }

    /// Answer chunks for a routed query. Structured routes make no backend
    /// call. A backend failure yields one apology chunk and ends the stream.
    pub async fn compose_and_stream(&self, query: &str, history: &[ConversationTurn], routing: RoutingDecision) -> TextStream {
        if let Some(reply) = self.structured_reply(query, routing) {
            return single_chunk(reply);
        }
        let prompt = self.build_prompt(query, history, routing).await;
        tracing::debug!(kind = ?prompt.kind, %routing, "prompt composed");
        let request = GenerationRequest {
            model: self.generation.model.clone(),
            prompt: prompt.text,
            temperature: prompt.temperature,
            max_tokens: prompt.max_tokens,
        };
        match self.backend.stream(&request).await {
            Ok(chunks) => apologize_on_error(chunks, prompt.kind),
            Err(e) => {
                tracing::warn!(error = %e, "generation failed");
                single_chunk(apology(&e, prompt.kind))
            }
        }
    }
}

fn apology(error: &ChatError, kind: PromptKind) -> &'static str {
    if error.is_unavailable() {
        return UNAVAILABLE_MESSAGE;
    }
    match kind {
        PromptKind::Main => GENERATION_FAILED_MESSAGE,
        PromptKind::Fallback => FALLBACK_FAILED_MESSAGE,
    }
}

/// Pass chunks through until the first error, which becomes a final apology.
fn apologize_on_error(inner: TextStream, kind: PromptKind) -> TextStream {
    Box::pin(stream::unfold(Some(inner), move |state| async move {
        let Some(mut inner) = state else {
            return None;
        };
        match inner.next().await {
            Some(Ok(chunk)) => Some((Ok::<String, ChatError>(chunk), Some(inner))),
            Some(Err(e)) => {
                tracing::warn!(error = %e, "generation stream failed");
                Some((Ok(apology(&e, kind).to_string()), None))
            }
            None => None,
        }
    }))
}
