use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;

use studymate_chat::{single_chunk, ChatError, GenerationBackend, GenerationRequest, TextStream};
use studymate_core::config::GenerationSettings;
use studymate_tools::{
    CardDifficulty, LearningStyle, PlanDuration, PlanRequest, QuestionType, QuizRequest, StudyTools, SummaryFocus,
    SummaryLength, ToolError,
};

enum Reply {
    Text(&'static str),
    Unavailable,
}

/// Backend that answers every request with one fixed reply.
struct CannedBackend {
    reply: Reply,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl CannedBackend {
    fn new(reply: Reply) -> Arc<Self> {
        Arc::new(Self { reply, requests: Mutex::new(Vec::new()) })
    }

    fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationBackend for CannedBackend {
    async fn complete(&self, request: &GenerationRequest) -> Result<String, ChatError> {
        self.requests.lock().unwrap().push(request.clone());
        match self.reply {
            Reply::Text(text) => Ok(text.to_string()),
            Reply::Unavailable => Err(ChatError::BackendUnavailable("connection refused".into())),
        }
    }

    async fn stream(&self, request: &GenerationRequest) -> Result<TextStream, ChatError> {
        let text = self.complete(request).await?;
        Ok(single_chunk(text))
    }
}

fn tools(backend: &Arc<CannedBackend>) -> StudyTools {
    StudyTools::new(backend.clone(), GenerationSettings::default())
}

fn document(words: usize) -> String {
    (0..words).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ")
}

fn quiz_request(n: usize) -> QuizRequest {
    QuizRequest {
        topic: "Photosynthesis".into(),
        num_questions: n,
        difficulty: Default::default(),
        question_types: vec![QuestionType::MultipleChoice, QuestionType::TrueFalse],
    }
}

const QUIZ_REPLY: &str = "Question 1: Where does photosynthesis happen?\n\
    Type: Multiple Choice\n\
    A) Mitochondria\nB) Chloroplast\nC) Nucleus\nD) Ribosome\n\
    Correct Answer: B\n\
    Explanation: Chloroplasts hold chlorophyll.\n\n\
    Question 2: Plants release oxygen.\n\
    Type: True-False\n\
    Correct Answer: True\n\
    Explanation: Oxygen is a by-product.\n";

#[tokio::test]
async fn quiz_uses_quiz_sampling_and_parses_questions() {
    let backend = CannedBackend::new(Reply::Text(QUIZ_REPLY));
    let questions = tools(&backend).create_quiz(&quiz_request(2)).await.unwrap();
    assert_eq!(questions.len(), 2);
    assert_eq!(questions[0].options.len(), 4);
    assert_eq!(questions[1].correct_answer, "True");

    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!((requests[0].temperature, requests[0].max_tokens), (0.7, 4000));
    assert!(requests[0].prompt.contains("Photosynthesis"));
}

#[tokio::test]
async fn invalid_quiz_request_never_reaches_backend() {
    let backend = CannedBackend::new(Reply::Text(QUIZ_REPLY));
    let err = tools(&backend).create_quiz(&quiz_request(0)).await.unwrap_err();
    assert!(matches!(err, ToolError::InvalidInput(_)));
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn reply_without_questions_is_unparsable() {
    let backend = CannedBackend::new(Reply::Text("I would rather talk about the weather."));
    let err = tools(&backend).create_quiz(&quiz_request(3)).await.unwrap_err();
    assert!(matches!(err, ToolError::Unparsable(_)));
}

#[tokio::test]
async fn blank_reply_is_reported_as_empty() {
    let backend = CannedBackend::new(Reply::Text("   \n "));
    let err = tools(&backend).summarize(&document(120), SummaryLength::Brief, SummaryFocus::KeyConcepts).await.unwrap_err();
    assert!(matches!(err, ToolError::EmptyReply("summary")));
}

#[tokio::test]
async fn unavailable_backend_is_distinguishable() {
    let backend = CannedBackend::new(Reply::Unavailable);
    let err = tools(&backend).create_quiz(&quiz_request(2)).await.unwrap_err();
    assert!(err.is_unavailable());
}

#[tokio::test]
async fn flashcards_need_a_long_enough_document() {
    let backend = CannedBackend::new(Reply::Text("FLASHCARD_1:\nTERM: a\nDEFINITION: b\n"));
    let err = tools(&backend).generate_flashcards(&document(40), 5, CardDifficulty::Basic).await.unwrap_err();
    assert!(matches!(err, ToolError::InvalidInput(_)));
    assert!(backend.requests().is_empty());

    let cards = tools(&backend).generate_flashcards(&document(200), 5, CardDifficulty::Basic).await.unwrap();
    assert_eq!(cards.len(), 1);
    assert_eq!((backend.requests()[0].temperature, backend.requests()[0].max_tokens), (0.7, 3000));
}

#[tokio::test]
async fn summary_uses_summary_sampling() {
    let backend = CannedBackend::new(Reply::Text("• Point one\n• Point two\n"));
    let summary = tools(&backend)
        .summarize(&document(150), SummaryLength::Detailed, SummaryFocus::GeneralOverview)
        .await
        .unwrap();
    assert_eq!(summary, "• Point one\n• Point two");
    let request = &backend.requests()[0];
    assert_eq!((request.temperature, request.max_tokens), (0.5, 2000));
    assert!(request.prompt.contains("7-10 bullet points"));
}

#[tokio::test]
async fn plan_is_formatted_and_tracked() {
    let backend = CannedBackend::new(Reply::Text("### Day 1: Basics\n- Read intro (1 hour)\n- Take notes\n"));
    let request = PlanRequest {
        topic: "Statistics".into(),
        duration: PlanDuration::TwoWeeks,
        daily_time: "1 hour".into(),
        level: "Beginner".into(),
        style: LearningStyle::Theory,
    };
    let created = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
    let plan = tools(&backend).create_study_plan(&request, created).await.unwrap();
    assert!(plan.contains("**Learning Goal:** Statistics"));
    assert!(plan.contains("March 23, 2025"));
    assert_eq!((backend.requests()[0].temperature, backend.requests()[0].max_tokens), (0.7, 4000));

    let days = studymate_tools::tracker::parse_plan_tasks(&plan);
    assert_eq!(days.len(), 1);
    assert_eq!(days[0].tasks.len(), 2);

    let blank = PlanRequest { topic: "  ".into(), ..request };
    assert!(matches!(
        tools(&backend).create_study_plan(&blank, created).await,
        Err(ToolError::InvalidInput(_))
    ));
}
