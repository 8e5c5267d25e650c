use std::sync::Arc;

use futures::StreamExt;

use studymate_core::config::Settings;
use studymate_core::traits::StudyStore;
use studymate_core::types::ConversationTurn;
use studymate_retrieval::Retriever;

use crate::backend::{single_chunk, GenerationBackend, TextStream};
use crate::composer::AnswerComposer;
use crate::prompt::{ROUTER_HISTORY_WINDOW, UNAVAILABLE_MESSAGE};
use crate::router::IntentRouter;
use crate::search::WebSearch;

/// One chat turn: route, then compose.
pub struct ChatService {
    router: IntentRouter,
    composer: AnswerComposer,
}

impl ChatService {
    pub fn new(router: IntentRouter, composer: AnswerComposer) -> Self {
        Self { router, composer }
    }

    pub fn from_settings(
        settings: &Settings,
        backend: Arc<dyn GenerationBackend>,
        retriever: Retriever,
        web: Arc<dyn WebSearch>,
        store: Arc<dyn StudyStore>,
    ) -> Self {
        let name = settings.assistant.name.clone();
        let router = IntentRouter::new(Arc::clone(&backend), settings.generation.model.clone(), settings.generation.router)
            .with_assistant_name(name.clone());
        let composer = AnswerComposer::new(backend, retriever, web, store, settings.generation.clone())
            .with_assistant_name(name);
        Self::new(router, composer)
    }

    pub fn composer(&self) -> &AnswerComposer { &self.composer }

    /// Stream the reply to `query`. An unreachable backend during routing
    /// produces a single "unavailable" chunk.
    pub async fn respond(&self, query: &str, history: &[ConversationTurn]) -> TextStream {
        let recent = &history[history.len().saturating_sub(ROUTER_HISTORY_WINDOW)..];
        match self.router.route(query, recent).await {
            Ok(routing) => {
                tracing::debug!(%routing, structured = routing.is_structured(), "answering");
                self.composer.compose_and_stream(query, history, routing).await
            }
            Err(e) => {
                tracing::warn!(error = %e, "generation backend unreachable");
                single_chunk(UNAVAILABLE_MESSAGE)
            }
        }
    }

    /// [`respond`](Self::respond) collected into one string.
    pub async fn respond_text(&self, query: &str, history: &[ConversationTurn]) -> String {
        let mut stream = self.respond(query, history).await;
        let mut out = String::new();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(text) => out.push_str(&text),
                Err(e) => tracing::warn!(error = %e, "dropping failed chunk"),
            }
        }
        out
    }
}
