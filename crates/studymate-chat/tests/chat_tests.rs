use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::{stream, StreamExt};
use tempfile::TempDir;

use studymate_chat::prompt::{FALLBACK_FAILED_MESSAGE, GENERATION_FAILED_MESSAGE, UNAVAILABLE_MESSAGE};
use studymate_chat::{
    AnswerComposer, ChatError, ChatService, GenerationBackend, GenerationRequest, IntentRouter, PromptKind, TextStream,
    WebSearch, WebSnippets,
};
use studymate_core::config::Settings;
use studymate_core::{ConversationTurn, DocumentStoreAdapter, MemoryStudyStore, RoutingDecision, Subject, Task};
use studymate_embed::HashEmbedder;
use studymate_retrieval::Retriever;
use studymate_vector::EmbeddingIndex;

#[derive(Clone)]
enum Reply {
    Text(&'static str),
    Unavailable,
    Broken,
}

impl Reply {
    fn error(&self) -> ChatError {
        match self {
            Reply::Unavailable => ChatError::BackendUnavailable("connection refused".into()),
            _ => ChatError::Status { status: 500, body: "boom".into() },
        }
    }
}

/// Backend that replays fixed replies and records every prompt it sees.
struct ScriptedBackend {
    hint: Reply,
    answer: Reply,
    fail_midstream: bool,
    complete_calls: AtomicUsize,
    stream_calls: AtomicUsize,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedBackend {
    fn new(hint: Reply, answer: Reply) -> Arc<Self> {
        Arc::new(Self {
            hint,
            answer,
            fail_midstream: false,
            complete_calls: AtomicUsize::new(0),
            stream_calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn failing_midstream(answer: &'static str) -> Arc<Self> {
        Arc::new(Self {
            hint: Reply::Text("TOOL_HINT: GENERAL"),
            answer: Reply::Text(answer),
            fail_midstream: true,
            complete_calls: AtomicUsize::new(0),
            stream_calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> (usize, usize) {
        (self.complete_calls.load(Ordering::SeqCst), self.stream_calls.load(Ordering::SeqCst))
    }

    fn last_request(&self) -> GenerationRequest {
        self.requests.lock().unwrap().last().cloned().expect("a recorded request")
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn complete(&self, request: &GenerationRequest) -> Result<String, ChatError> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        match &self.hint {
            Reply::Text(text) => Ok(text.to_string()),
            other => Err(other.error()),
        }
    }

    async fn stream(&self, request: &GenerationRequest) -> Result<TextStream, ChatError> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        let text = match &self.answer {
            Reply::Text(text) => *text,
            other => return Err(other.error()),
        };
        let mut items: Vec<Result<String, ChatError>> =
            text.split_inclusive(' ').map(|w| Ok(w.to_string())).collect();
        if self.fail_midstream {
            items.push(Err(ChatError::Remote("connection reset".into())));
            items.push(Ok("never seen".into()));
        }
        Ok(Box::pin(stream::iter(items)))
    }
}

struct RecordingSearch {
    result: WebSnippets,
    calls: AtomicUsize,
}

impl RecordingSearch {
    fn new(result: WebSnippets) -> Arc<Self> {
        Arc::new(Self { result, calls: AtomicUsize::new(0) })
    }

    fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
}

#[async_trait]
impl WebSearch for RecordingSearch {
    async fn search(&self, _query: &str) -> WebSnippets {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

fn retriever(store: &Arc<MemoryStudyStore>, kb_dir: &Path) -> Retriever {
    let adapter = DocumentStoreAdapter::new(store.clone(), kb_dir);
    Retriever::new(Arc::new(EmbeddingIndex::new(Arc::new(adapter), Arc::new(HashEmbedder::new(256)))))
}

fn physics_store() -> Arc<MemoryStudyStore> {
    Arc::new(MemoryStudyStore::new(
        vec![Subject::new("Physics", &["Thermodynamics"])],
        vec![
            Task::new(1, "Read chapter 3", "2025-03-01", false),
            Task::new(2, "Lab report", "2025-02-20", true),
            Task::new(3, "Problem set 4", "2025-03-05", false),
        ],
    ))
}

fn composer(
    backend: &Arc<ScriptedBackend>,
    search: &Arc<RecordingSearch>,
    store: &Arc<MemoryStudyStore>,
    kb_dir: &Path,
) -> AnswerComposer {
    AnswerComposer::new(
        backend.clone(),
        retriever(store, kb_dir),
        search.clone(),
        store.clone(),
        Settings::default().generation,
    )
}

fn service(
    backend: &Arc<ScriptedBackend>,
    search: &Arc<RecordingSearch>,
    store: &Arc<MemoryStudyStore>,
    kb_dir: &Path,
) -> ChatService {
    ChatService::from_settings(&Settings::default(), backend.clone(), retriever(store, kb_dir), search.clone(), store.clone())
}

async fn collect(stream: TextStream) -> Vec<String> {
    stream.map(|chunk| chunk.expect("chunks are never errors")).collect().await
}

#[tokio::test]
async fn syllabus_context_reaches_the_main_prompt() {
    let tmp = TempDir::new().unwrap();
    let store = physics_store();
    let backend = ScriptedBackend::new(Reply::Text("TOOL_HINT: RAG"), Reply::Text("Heat moves."));
    let search = RecordingSearch::new(WebSnippets::Found("unused".into()));
    let chat = service(&backend, &search, &store, &tmp.path().join("no-kb"));

    let answer = chat.respond_text("thermodynamics", &[]).await;
    assert_eq!(answer, "Heat moves.");

    let request = backend.last_request();
    assert!(request.prompt.contains("Knowledge Base Information: Physics: Thermodynamics"));
    assert!(!request.prompt.contains("Web Search Information:"), "RAG does not search the web");
    assert_eq!(search.calls(), 0);
    assert_eq!((request.temperature, request.max_tokens), (0.7, 1000));
}

#[tokio::test]
async fn empty_store_uses_fallback_prompt() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(MemoryStudyStore::default());
    let backend = ScriptedBackend::new(Reply::Text("TOOL_HINT: RAG"), Reply::Text("I'm not sure, could you rephrase?"));
    let search = RecordingSearch::new(WebSnippets::NotFound);
    let composer = composer(&backend, &search, &store, &tmp.path().join("missing"));

    let prompt = composer.build_prompt("what is a quasar", &[], RoutingDecision::Rag).await;
    assert_eq!(prompt.kind, PromptKind::Fallback);
    assert_eq!((prompt.temperature, prompt.max_tokens), (0.5, 200));
    assert!(prompt.text.contains("Current User Query: what is a quasar"));

    let chunks = collect(composer.compose_and_stream("what is a quasar", &[], RoutingDecision::Rag).await).await;
    assert_eq!(chunks.concat(), "I'm not sure, could you rephrase?");
    assert!(backend.last_request().prompt.contains("No specific information was found"));
}

#[tokio::test]
async fn pending_tasks_are_listed_without_backend_calls() {
    let tmp = TempDir::new().unwrap();
    let store = physics_store();
    let backend = ScriptedBackend::new(Reply::Broken, Reply::Broken);
    let search = RecordingSearch::new(WebSnippets::NotFound);
    let composer = composer(&backend, &search, &store, tmp.path());

    let chunks = collect(composer.compose_and_stream("what are my pending tasks", &[], RoutingDecision::Tasks).await).await;
    assert_eq!(chunks.len(), 1);
    let reply = &chunks[0];
    assert!(reply.contains("- Read chapter 3 (Due: 2025-03-01)"));
    assert!(reply.contains("- Problem set 4 (Due: 2025-03-05)"));
    assert!(!reply.contains("Lab report"));
    assert_eq!(backend.calls(), (0, 0));
    assert_eq!(search.calls(), 0);
}

#[test]
fn task_reply_reads_the_store_on_every_call() {
    let tmp = TempDir::new().unwrap();
    let store = physics_store();
    let backend = ScriptedBackend::new(Reply::Broken, Reply::Broken);
    let search = RecordingSearch::new(WebSnippets::NotFound);
    let composer = composer(&backend, &search, &store, tmp.path());

    store.set_tasks(vec![Task::new(7, "Revise entropy", "2025-03-09", false)]);
    let reply = composer.structured_reply("list my tasks", RoutingDecision::Tasks).expect("structured route");
    assert!(reply.contains("Revise entropy"));
    assert!(!reply.contains("Read chapter 3"));

    store.set_tasks(Vec::new());
    let empty = composer.structured_reply("list my tasks", RoutingDecision::Tasks).expect("structured route");
    assert!(!empty.contains("Revise entropy"));
    assert!(composer.structured_reply("hello", RoutingDecision::General).is_none());
}

#[tokio::test]
async fn task_route_through_service_only_classifies() {
    let tmp = TempDir::new().unwrap();
    let store = physics_store();
    let backend = ScriptedBackend::new(Reply::Text("TOOL_HINT: TASKS"), Reply::Broken);
    let search = RecordingSearch::new(WebSnippets::NotFound);
    let chat = service(&backend, &search, &store, tmp.path());

    let reply = chat.respond_text("show completed tasks", &[]).await;
    assert!(reply.contains("- Lab report (Due: 2025-02-20)"));
    assert!(!reply.contains("Read chapter 3"));
    assert_eq!(backend.calls(), (1, 0));
}

#[tokio::test]
async fn syllabus_route_lists_the_roadmap() {
    let tmp = TempDir::new().unwrap();
    let store = physics_store();
    let backend = ScriptedBackend::new(Reply::Text("TOOL_HINT: SYLLABUS"), Reply::Broken);
    let search = RecordingSearch::new(WebSnippets::NotFound);
    let chat = service(&backend, &search, &store, tmp.path());

    let reply = chat.respond_text("what's in my syllabus", &[]).await;
    assert!(reply.ends_with("- Physics: Thermodynamics"));
    assert_eq!(backend.calls(), (1, 0));
}

#[tokio::test]
async fn pomodoro_overrides_the_classifier() {
    let tmp = TempDir::new().unwrap();
    let store = physics_store();
    let backend = ScriptedBackend::new(Reply::Text("TOOL_HINT: SYLLABUS"), Reply::Text("Work 25 minutes."));
    let search = RecordingSearch::new(WebSnippets::Found("The Pomodoro Technique uses 25-minute intervals.".into()));
    let chat = service(&backend, &search, &store, tmp.path());

    let answer = chat.respond_text("How do I use pomodoro for thermodynamics revision?", &[]).await;
    assert_eq!(answer, "Work 25 minutes.");
    assert_eq!(search.calls(), 1);
    let prompt = backend.last_request().prompt;
    assert!(prompt.contains("Web Search Information: The Pomodoro Technique uses 25-minute intervals."));
    assert!(!prompt.contains("Knowledge Base Information:"));
}

#[tokio::test]
async fn importance_question_overrides_rag() {
    let backend = ScriptedBackend::new(Reply::Text("TOOL_HINT: RAG"), Reply::Broken);
    let router = IntentRouter::new(backend.clone(), "phi3:3.8b", Settings::default().generation.router);

    let decision = router.route("why is it important that mitochondria produce ATP", &[]).await.unwrap();
    assert_eq!(decision, RoutingDecision::WebSearch);
    let request = backend.last_request();
    assert_eq!((request.temperature, request.max_tokens), (0.1, 50));
}

#[tokio::test]
async fn router_sees_at_most_six_recent_turns() {
    let backend = ScriptedBackend::new(Reply::Text("TOOL_HINT: GENERAL"), Reply::Broken);
    let router = IntentRouter::new(backend.clone(), "phi3:3.8b", Settings::default().generation.router);
    let history: Vec<ConversationTurn> = (1..=10)
        .map(|i| if i % 2 == 1 { ConversationTurn::user(format!("turn {i}")) } else { ConversationTurn::assistant(format!("turn {i}")) })
        .collect();

    router.route("hello", &history).await.unwrap();
    let prompt = backend.last_request().prompt;
    assert!(!prompt.contains("turn 4\n"));
    assert!(prompt.contains("User: turn 5\n"));
    assert!(prompt.contains("StudyMate: turn 10\n"));
}

#[tokio::test]
async fn unreachable_backend_yields_single_unavailable_chunk() {
    let tmp = TempDir::new().unwrap();
    let store = physics_store();
    let backend = ScriptedBackend::new(Reply::Unavailable, Reply::Text("unused"));
    let search = RecordingSearch::new(WebSnippets::NotFound);
    let chat = service(&backend, &search, &store, tmp.path());

    let chunks = collect(chat.respond("thermodynamics", &[]).await).await;
    assert_eq!(chunks, vec![UNAVAILABLE_MESSAGE.to_string()]);
    assert_eq!(backend.calls(), (1, 0));
    assert_eq!(search.calls(), 0);
}

#[tokio::test]
async fn classifier_error_degrades_to_general() {
    let tmp = TempDir::new().unwrap();
    let store = physics_store();
    let backend = ScriptedBackend::new(Reply::Broken, Reply::Text("General answer."));
    let search = RecordingSearch::new(WebSnippets::Found("Thermodynamics is the study of heat.".into()));
    let chat = service(&backend, &search, &store, &tmp.path().join("no-kb"));

    let answer = chat.respond_text("thermodynamics", &[]).await;
    assert_eq!(answer, "General answer.");
    let prompt = backend.last_request().prompt;
    let knowledge = prompt.find("Knowledge Base Information:").expect("knowledge context");
    let web = prompt.find("Web Search Information:").expect("web context");
    assert!(knowledge < web, "knowledge context comes before web snippets");
}

#[tokio::test]
async fn failed_web_search_is_not_prompt_material() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(MemoryStudyStore::default());
    let backend = ScriptedBackend::new(Reply::Text("TOOL_HINT: WEB_SEARCH"), Reply::Text("ok"));
    let search = RecordingSearch::new(WebSnippets::Failed("dns error".into()));
    let composer = composer(&backend, &search, &store, tmp.path());

    let prompt = composer.build_prompt("latest news on fusion", &[], RoutingDecision::WebSearch).await;
    assert_eq!(prompt.kind, PromptKind::Fallback);
    assert!(!prompt.text.contains("Error fetching information"));
}

#[tokio::test]
async fn generation_failure_yields_one_apology() {
    let tmp = TempDir::new().unwrap();
    let store = physics_store();
    let backend = ScriptedBackend::new(Reply::Text("TOOL_HINT: RAG"), Reply::Broken);
    let search = RecordingSearch::new(WebSnippets::NotFound);
    let composer = composer(&backend, &search, &store, &tmp.path().join("no-kb"));

    let chunks = collect(composer.compose_and_stream("thermodynamics", &[], RoutingDecision::Rag).await).await;
    assert_eq!(chunks, vec![GENERATION_FAILED_MESSAGE.to_string()]);

    let chunks = collect(composer.compose_and_stream("unknown topic", &[], RoutingDecision::WebSearch).await).await;
    assert_eq!(chunks, vec![FALLBACK_FAILED_MESSAGE.to_string()]);
}

#[tokio::test]
async fn unreachable_during_generation_yields_unavailable_message() {
    let tmp = TempDir::new().unwrap();
    let store = physics_store();
    let backend = ScriptedBackend::new(Reply::Text("TOOL_HINT: RAG"), Reply::Unavailable);
    let search = RecordingSearch::new(WebSnippets::NotFound);
    let composer = composer(&backend, &search, &store, tmp.path());

    let chunks = collect(composer.compose_and_stream("thermodynamics", &[], RoutingDecision::Rag).await).await;
    assert_eq!(chunks, vec![UNAVAILABLE_MESSAGE.to_string()]);
}

#[tokio::test]
async fn midstream_failure_ends_with_apology() {
    let tmp = TempDir::new().unwrap();
    let store = physics_store();
    let backend = ScriptedBackend::failing_midstream("Heat flows downhill");
    let search = RecordingSearch::new(WebSnippets::Found("Heat flows from hot to cold.".into()));
    let composer = composer(&backend, &search, &store, tmp.path());

    let chunks = collect(composer.compose_and_stream("heat", &[], RoutingDecision::General).await).await;
    assert_eq!(chunks.len(), 4);
    assert_eq!(chunks[..3].concat(), "Heat flows downhill");
    assert_eq!(chunks[3], GENERATION_FAILED_MESSAGE);
}

#[tokio::test]
async fn repeated_query_is_not_duplicated_in_history() {
    let tmp = TempDir::new().unwrap();
    let store = physics_store();
    let backend = ScriptedBackend::new(Reply::Text("TOOL_HINT: RAG"), Reply::Text("ok"));
    let search = RecordingSearch::new(WebSnippets::NotFound);
    let composer = composer(&backend, &search, &store, tmp.path());
    let history = vec![
        ConversationTurn::user("hi"),
        ConversationTurn::assistant("Hello! What are we studying?"),
        ConversationTurn::user("thermodynamics"),
    ];

    let prompt = composer.build_prompt("thermodynamics", &history, RoutingDecision::Rag).await;
    assert_eq!(prompt.kind, PromptKind::Main);
    assert!(prompt.text.contains("User: hi\nStudyMate: Hello! What are we studying?\n"));
    assert_eq!(prompt.text.matches("User: thermodynamics").count(), 1);
    assert!(prompt.text.ends_with("User: thermodynamics\nStudyMate:"));
}
