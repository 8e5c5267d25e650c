//! studymate-chat
//!
//! Chat turn pipeline: intent routing, context gathering from the index and
//! the web, prompt composition and streamed generation.

pub mod backend;
pub mod composer;
pub mod error;
pub mod prompt;
pub mod reminders;
pub mod router;
pub mod search;
pub mod service;
pub mod structured;

pub use backend::{single_chunk, GenerationBackend, GenerationRequest, OllamaBackend, TextStream};
pub use composer::{AnswerComposer, ComposedPrompt, PromptKind};
pub use error::ChatError;
pub use router::{apply_overrides, parse_hint, IntentRouter};
pub use search::{build_web_search, DisabledSearch, GoogleSearch, WebSearch, WebSnippets};
pub use service::ChatService;
