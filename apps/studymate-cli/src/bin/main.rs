use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, BufReader};

use studymate_chat::reminders::reminder_message;
use studymate_chat::{build_web_search, ChatService, OllamaBackend};
use studymate_core::config::{Config, Settings};
use studymate_core::{ConversationTurn, DocumentStoreAdapter, JsonStudyStore, StudyStore, Subject};
use studymate_embed::build_embedder;
use studymate_retrieval::{rank, Retriever};
use studymate_tools::flashcards::{format_deck, shuffle_flashcards};
use studymate_tools::quiz::{format_results, score_quiz};
use studymate_tools::summary::format_summary;
use studymate_tools::tracker::{find_task, overall_progress, parse_plan_tasks, progress_report, study_streak};
use studymate_tools::{
    CardDifficulty, Difficulty, LearningStyle, PlanDuration, PlanRequest, QuestionType, QuizRequest, StudyTools,
    SummaryFocus, SummaryLength, ToolError,
};
use studymate_vector::EmbeddingIndex;

#[derive(Parser)]
#[command(name = "studymate", about = "Study assistant over your syllabus, notes and tasks", version)]
struct Cli {
    /// Directory holding config.toml (default: current)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Whose study records to use (overrides store.user)
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive chat session
    Chat,

    /// Answer a single question
    Ask {
        query: String,
    },

    /// Rebuild the embedding index and report its size
    Index,

    /// Show raw nearest neighbors and the ranked context for a query
    Search {
        query: String,
        /// Number of neighbors (default: index.top_k)
        #[arg(short, long)]
        k: Option<usize>,
    },

    /// Tasks due in the next two days
    Remind,

    /// Manage tasks
    #[command(subcommand)]
    Task(TaskCommand),

    /// Manage the subject roadmap
    #[command(subcommand)]
    Subject(SubjectCommand),

    /// Generate a quiz on a topic and take it
    Quiz {
        topic: String,
        /// Number of questions
        #[arg(short = 'n', long, default_value_t = 5)]
        questions: usize,
        /// easy, intermediate or hard
        #[arg(long, default_value = "intermediate")]
        difficulty: Difficulty,
        /// Comma-separated: mc, tf, blank
        #[arg(long, value_delimiter = ',', default_value = "mc")]
        types: Vec<QuestionType>,
    },

    /// Flashcards from a plain-text document
    Flashcards {
        file: PathBuf,
        /// Number of cards
        #[arg(short = 'n', long, default_value_t = 10)]
        cards: usize,
        /// basic, intermediate or advanced
        #[arg(long, default_value = "intermediate")]
        difficulty: CardDifficulty,
        #[arg(long)]
        shuffle: bool,
        /// Also write the deck to this file
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Bullet-point summary of a plain-text document
    Summarize {
        file: PathBuf,
        /// brief, detailed or comprehensive
        #[arg(long, default_value = "detailed")]
        length: SummaryLength,
        /// overview, arguments, concepts, facts or conclusions
        #[arg(long, default_value = "overview")]
        focus: SummaryFocus,
        /// Also write the summary to this file
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Create a day-by-day study plan and make it the active plan
    Plan {
        topic: String,
        /// 1w, 2w, 1m, 3m or 6m
        #[arg(long, default_value = "1m")]
        duration: PlanDuration,
        #[arg(long, default_value = "1-2 hours")]
        daily_time: String,
        #[arg(long, default_value = "Beginner")]
        level: String,
        /// theory, hands-on or mixed
        #[arg(long, default_value = "mixed")]
        style: LearningStyle,
    },

    /// Track the active study plan and quiz results
    #[command(subcommand)]
    Progress(ProgressCommand),
}

#[derive(Subcommand)]
enum TaskCommand {
    /// Add a task
    Add {
        description: String,
        /// Due date, YYYY-MM-DD
        due: String,
    },
    /// Mark a task as completed
    Done { id: u64 },
    /// Delete a task
    Remove { id: u64 },
    /// List tasks
    List,
}

#[derive(Subcommand)]
enum SubjectCommand {
    /// Add a subject with comma-separated topics
    Add {
        name: String,
        #[arg(long, value_delimiter = ',')]
        topics: Vec<String>,
        /// Optional due date, YYYY-MM-DD
        #[arg(long)]
        due: Option<String>,
    },
    /// Remove a subject by name
    Remove { name: String },
    /// List subjects
    List,
}

#[derive(Subcommand)]
enum ProgressCommand {
    /// Progress report with quiz summary, streak and achievements
    Show,
    /// Plan tasks grouped by day
    Tasks,
    /// Mark a plan task (e.g. 1.2) as done today
    Done { id: String },
    /// Mark a plan task as not done
    Undo { id: String },
}

struct App {
    settings: Settings,
    store: Arc<JsonStudyStore>,
}

impl App {
    fn load(cli: &Cli) -> anyhow::Result<Self> {
        let dir = cli.config_dir.clone().unwrap_or_else(|| PathBuf::from("."));
        let config = Config::load_from(&dir).map_err(|e| {
            eprintln!("Error loading config: {}", e);
            e
        })?;
        let mut settings = config.settings()?;
        if let Some(user) = &cli.user {
            settings.store.user = user.clone();
        }
        let store = Arc::new(JsonStudyStore::for_user(&settings.store.data_dir, &settings.store.user));
        Ok(Self { settings, store })
    }

    fn index(&self) -> anyhow::Result<Arc<EmbeddingIndex>> {
        let embedder = build_embedder(&self.settings.embedding)?;
        let adapter = DocumentStoreAdapter::new(self.store.clone(), self.settings.knowledge.dir.clone())
            .with_syllabus_files(self.settings.knowledge.syllabus_files.clone());
        Ok(Arc::new(EmbeddingIndex::new(Arc::new(adapter), embedder).with_refresh(self.settings.index.refresh)))
    }

    fn chat_service(&self) -> anyhow::Result<ChatService> {
        let backend = Arc::new(OllamaBackend::from_settings(&self.settings.generation)?);
        let retriever = Retriever::new(self.index()?).with_top_k(self.settings.index.top_k);
        let web = build_web_search(&self.settings.web_search)?;
        Ok(ChatService::from_settings(&self.settings, backend, retriever, web, self.store.clone()))
    }

    fn study_tools(&self) -> anyhow::Result<StudyTools> {
        let backend = Arc::new(OllamaBackend::from_settings(&self.settings.generation)?);
        Ok(StudyTools::new(backend, self.settings.generation.clone()))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let app = App::load(&cli)?;

    match cli.command {
        Command::Chat => chat(&app).await,
        Command::Ask { query } => {
            let service = app.chat_service()?;
            print_stream(&service, &query, &[]).await?;
            Ok(())
        }
        Command::Index => index(&app).await,
        Command::Search { query, k } => search(&app, &query, k.unwrap_or(app.settings.index.top_k)).await,
        Command::Remind => {
            let tasks = app.store.get_tasks()?;
            let today = chrono::Local::now().date_naive();
            println!("{}", reminder_message(&app.settings.store.user, &tasks, today));
            Ok(())
        }
        Command::Task(cmd) => task(&app, cmd),
        Command::Subject(cmd) => subject(&app, cmd),
        Command::Quiz { topic, questions, difficulty, types } => {
            let request = QuizRequest { topic, num_questions: questions, difficulty, question_types: types };
            quiz(&app, request).await
        }
        Command::Flashcards { file, cards, difficulty, shuffle, out } => {
            flashcards(&app, &file, cards, difficulty, shuffle, out.as_deref()).await
        }
        Command::Summarize { file, length, focus, out } => summarize(&app, &file, length, focus, out.as_deref()).await,
        Command::Plan { topic, duration, daily_time, level, style } => {
            let request = PlanRequest { topic, duration, daily_time, level, style };
            plan(&app, &request).await
        }
        Command::Progress(cmd) => progress(&app, cmd),
    }
}

async fn chat(app: &App) -> anyhow::Result<()> {
    let service = app.chat_service()?;
    let name = &app.settings.assistant.name;
    println!("{name} is ready. Type 'exit' to leave.");

    let mut history: Vec<ConversationTurn> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\nYou: ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else { break };
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if matches!(query, "exit" | "quit") {
            break;
        }
        print!("{name}: ");
        let answer = print_stream(&service, query, &history).await?;
        history.push(ConversationTurn::user(query));
        history.push(ConversationTurn::assistant(answer));
    }
    Ok(())
}

/// Print chunks as they arrive and return the assembled answer.
async fn print_stream(service: &ChatService, query: &str, history: &[ConversationTurn]) -> anyhow::Result<String> {
    let mut stream = service.respond(query, history).await;
    let mut answer = String::new();
    let mut stdout = std::io::stdout();
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(text) => {
                write!(stdout, "{text}")?;
                stdout.flush()?;
                answer.push_str(&text);
            }
            Err(e) => tracing::warn!(error = %e, "dropping failed chunk"),
        }
    }
    writeln!(stdout)?;
    Ok(answer)
}

async fn index(app: &App) -> anyhow::Result<()> {
    println!("Knowledge directory: {}", app.settings.knowledge.dir.display());
    let index = app.index()?;
    let pb = spinner("embedding fragments")?;
    let count = index.rebuild().await.context("index rebuild failed")?;
    pb.finish_with_message(format!("indexed {count} fragments"));
    println!("✅ Index ready ({count} fragments, refresh policy {:?})", index.refresh_policy());
    Ok(())
}

fn spinner(message: &'static str) -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

/// Runs one generation behind a spinner.
async fn generating<T>(message: &'static str, work: impl Future<Output = studymate_tools::Result<T>>) -> anyhow::Result<T> {
    let pb = spinner(message)?;
    let result = work.await;
    pb.finish_and_clear();
    result.map_err(|e: ToolError| {
        if e.is_unavailable() {
            anyhow::anyhow!("{e}. Is Ollama running with the configured model?")
        } else {
            e.into()
        }
    })
}

async fn search(app: &App, query: &str, k: usize) -> anyhow::Result<()> {
    let index = app.index()?;
    let results = index.query(query, k).await?;
    println!("🔍 {} neighbors for: \"{}\"", results.len(), query);
    for (i, hit) in results.iter().enumerate() {
        println!("\n  {}. distance={:.4}  id={}  source={:?}", i + 1, hit.distance, hit.fragment.id, hit.fragment.source_kind);
        println!("     {}", hit.fragment.text);
    }
    println!("\n📝 Ranked context: {}", rank(query, &results));
    Ok(())
}

fn task(app: &App, cmd: TaskCommand) -> anyhow::Result<()> {
    match cmd {
        TaskCommand::Add { description, due } => {
            chrono::NaiveDate::parse_from_str(&due, "%Y-%m-%d").with_context(|| format!("invalid due date '{due}'"))?;
            let id = app.store.add_task(&description, &due)?;
            println!("Added task #{id}: {description} (Due: {due})");
        }
        TaskCommand::Done { id } => {
            app.store.complete_task(id)?;
            println!("Task #{id} marked as completed");
        }
        TaskCommand::Remove { id } => {
            app.store.delete_task(id)?;
            println!("Task #{id} removed");
        }
        TaskCommand::List => {
            let tasks = app.store.get_tasks()?;
            if tasks.is_empty() {
                println!("No tasks yet.");
            }
            for t in tasks {
                let mark = if t.completed { "x" } else { " " };
                println!("[{mark}] #{} {} (Due: {})", t.id, t.description, t.due_date);
            }
        }
    }
    Ok(())
}

fn subject(app: &App, cmd: SubjectCommand) -> anyhow::Result<()> {
    match cmd {
        SubjectCommand::Add { name, topics, due } => {
            let topics: Vec<String> = topics.into_iter().map(|t| t.trim().to_string()).filter(|t| !t.is_empty()).collect();
            let count = topics.len();
            app.store.add_subject(Subject { name: name.clone(), topics, due_date: due })?;
            println!("Added subject {name} with {count} topics");
        }
        SubjectCommand::List => {
            let subjects = app.store.get_all_subjects()?;
            if subjects.is_empty() {
                println!("The roadmap is empty.");
            }
            for s in subjects {
                let due = s.due_date.map(|d| format!(" (Due: {d})")).unwrap_or_default();
                println!("- {}{}: {}", s.name, due, s.topics.join(", "));
            }
        }
    }
    Ok(())
}

async fn quiz(app: &App, request: QuizRequest) -> anyhow::Result<()> {
    let tools = app.study_tools()?;
    let questions = generating("generating quiz", tools.create_quiz(&request)).await?;
    println!("📝 {} questions on {}. Answer with a letter, True/False or the missing word.", questions.len(), request.topic);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut answers = Vec::with_capacity(questions.len());
    for (i, q) in questions.iter().enumerate() {
        println!("\nQuestion {}: {}", i + 1, q.question);
        for option in &q.options {
            println!("  {option}");
        }
        print!("Your answer: ");
        std::io::stdout().flush()?;
        let answer = lines.next_line().await?.unwrap_or_default();
        answers.push(answer.trim().to_string());
    }

    let score = score_quiz(&questions, &answers);
    let taken = chrono::Local::now().naive_local();
    println!("\n{}", format_results(&request.topic, &score, taken));
    app.store.record_quiz(score.record(&request.topic, taken))?;
    Ok(())
}

async fn read_document(file: &Path) -> anyhow::Result<String> {
    tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("cannot read {}", file.display()))
}

fn source_name(file: &Path) -> String {
    file.file_name().map_or_else(|| file.display().to_string(), |n| n.to_string_lossy().into_owned())
}

fn save_output(out: Option<&Path>, text: &str) -> anyhow::Result<()> {
    if let Some(path) = out {
        std::fs::write(path, text).with_context(|| format!("cannot write {}", path.display()))?;
        println!("💾 Saved to {}", path.display());
    }
    Ok(())
}

async fn flashcards(
    app: &App,
    file: &Path,
    count: usize,
    difficulty: CardDifficulty,
    shuffle: bool,
    out: Option<&Path>,
) -> anyhow::Result<()> {
    let text = read_document(file).await?;
    let tools = app.study_tools()?;
    let mut cards = generating("generating flashcards", tools.generate_flashcards(&text, count, difficulty)).await?;
    if shuffle {
        shuffle_flashcards(&mut cards, &mut rand::thread_rng());
    }
    let deck = format_deck(&cards, &source_name(file), chrono::Local::now().naive_local());
    println!("{deck}");
    save_output(out, &deck)
}

async fn summarize(
    app: &App,
    file: &Path,
    length: SummaryLength,
    focus: SummaryFocus,
    out: Option<&Path>,
) -> anyhow::Result<()> {
    let text = read_document(file).await?;
    let tools = app.study_tools()?;
    let summary = generating("summarizing", tools.summarize(&text, length, focus)).await?;
    let formatted = format_summary(&summary, &source_name(file), length, focus, chrono::Local::now().naive_local());
    println!("{formatted}");
    save_output(out, &formatted)
}

async fn plan(app: &App, request: &PlanRequest) -> anyhow::Result<()> {
    let tools = app.study_tools()?;
    let created = chrono::Local::now().date_naive();
    let plan = generating("creating study plan", tools.create_study_plan(request, created)).await?;
    app.store.save_study_plan(&plan)?;
    println!("{plan}");
    let tasks: usize = parse_plan_tasks(&plan).iter().map(|d| d.tasks.len()).sum();
    println!("\n✅ Saved as the active plan ({tasks} trackable tasks). See `studymate progress tasks`.");
    Ok(())
}

fn progress(app: &App, cmd: ProgressCommand) -> anyhow::Result<()> {
    let plan = app.store.study_plan()?;
    let days = plan.as_deref().map(parse_plan_tasks).unwrap_or_default();
    let completions = app.store.plan_completions()?;
    match cmd {
        ProgressCommand::Show => {
            if plan.is_none() {
                println!("No active study plan. Create one with `studymate plan <topic>`.\n");
            }
            let now = chrono::Local::now().naive_local();
            let stats = overall_progress(&days, &completions);
            let streak = study_streak(&completions, now.date());
            println!("{}", progress_report(&stats, &app.store.quiz_history()?, streak, now));
        }
        ProgressCommand::Tasks => {
            if days.is_empty() {
                println!("No plan tasks found.");
            }
            for day in &days {
                let done = day.tasks.iter().filter(|t| completions.contains_key(&t.id)).count();
                println!("\n📅 {} ({done}/{})", day.title, day.tasks.len());
                for t in &day.tasks {
                    let mark = if completions.contains_key(&t.id) { "x" } else { " " };
                    println!("  [{mark}] {} {}", t.id, t.description);
                }
            }
        }
        ProgressCommand::Done { id } => {
            let task = find_task(&days, &id).with_context(|| format!("no plan task '{id}'"))?;
            let today = chrono::Local::now().date_naive().format("%Y-%m-%d").to_string();
            app.store.set_plan_task(&id, Some(today.as_str()))?;
            println!("Completed {id}: {}", task.description);
        }
        ProgressCommand::Undo { id } => {
            app.store.set_plan_task(&id, None)?;
            println!("Task {id} marked as not done");
        }
    }
    Ok(())
}
