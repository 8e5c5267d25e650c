//! Prompt templates and canned replies.

use studymate_core::types::{ConversationTurn, Role, RoutingDecision, Subject, Task};

/// Turns shown to the classifier.
pub const ROUTER_HISTORY_WINDOW: usize = 6;

pub const UNAVAILABLE_MESSAGE: &str =
    "Oops! I'm having a little trouble connecting to my brain (the generation server). Please make sure it is running and try again.";
pub const GENERATION_FAILED_MESSAGE: &str =
    "Oh dear! An error occurred while trying to generate a response. Please try again, I'm here to support you.";
pub const FALLBACK_FAILED_MESSAGE: &str =
    "Oh dear! An error occurred while trying to find an answer. Could you please rephrase or ask something else?";

/// Drop empty turns, and the final turn when it repeats the current query.
pub fn prompt_history<'a>(history: &'a [ConversationTurn], query: &str) -> Vec<&'a ConversationTurn> {
    let mut clean: Vec<&ConversationTurn> = history.iter().filter(|t| !t.content.trim().is_empty()).collect();
    if clean.last().is_some_and(|t| t.role == Role::User && t.content == query) {
        clean.pop();
    }
    clean
}

pub fn format_history(turns: &[&ConversationTurn], assistant: &str) -> String {
    let mut out = String::new();
    for turn in turns {
        let speaker = match turn.role {
            Role::User => "User",
            Role::Assistant => assistant,
        };
        out.push_str(&format!("{speaker}: {}\n", turn.content));
    }
    out
}

/// `- <name>: <topic>, <topic>` per subject.
pub fn subject_lines(subjects: &[Subject]) -> String {
    subjects
        .iter()
        .map(|s| format!("- {}: {}", s.name, s.topics.join(", ")))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn task_lines_with_status(tasks: &[Task]) -> String {
    tasks
        .iter()
        .map(|t| {
            let status = if t.completed { "Completed" } else { "Pending" };
            format!("- {} (Due: {}) - {status}", t.description, t.due_date)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn classification_prompt(assistant: &str, recent: &[&ConversationTurn], query: &str) -> String {
    let labels = [
        (RoutingDecision::Rag, "specific academic topics likely in the knowledge base like definitions, core concepts, or syllabus-related questions"),
        (RoutingDecision::WebSearch, "general knowledge, current events, \"why is it important\" questions, broader context, topics outside the syllabus, or study techniques like Pomodoro"),
        (RoutingDecision::Tasks, "current tasks or deadlines, e.g. \"what are my tasks\", \"show pending tasks\", \"list completed assignments\", \"my due dates\""),
        (RoutingDecision::Syllabus, "subjects or topics in the academic roadmap, e.g. \"what's in my syllabus\", \"list topics in math\""),
        (RoutingDecision::General, "greetings, general conversation, or when no specific tool applies"),
    ];
    let mut prompt = String::from(
        "Based on the CONVERSATION HISTORY and the CURRENT USER QUERY, determine the primary intent and the most appropriate data source.\n\
         Respond ONLY with one of the following lines and nothing else:\n",
    );
    for (label, trigger) in labels {
        prompt.push_str(&format!("TOOL_HINT: {label} (for {trigger})\n"));
    }
    prompt.push_str(&format!("\nConversation history (most recent last, up to {ROUTER_HISTORY_WINDOW} turns):\n"));
    prompt.push_str(&format_history(recent, assistant));
    prompt.push_str(&format!("Current User Query: {query}\nYour suggested tool hint:"));
    prompt
}

pub struct MainPromptParts<'a> {
    pub assistant: &'a str,
    pub subjects: &'a [Subject],
    pub tasks: &'a [Task],
    pub history: &'a [&'a ConversationTurn],
    pub context: &'a str,
    pub query: &'a str,
}

pub fn main_prompt(parts: &MainPromptParts<'_>) -> String {
    let assistant = parts.assistant;
    format!(
        "You are {assistant}, a friendly and highly knowledgeable academic assistant for students.\n\
         Give comprehensive, detailed and factually accurate answers across academic subjects and general knowledge.\n\
         Use a warm, encouraging tone; relevant emojis are welcome.\n\
         If a query continues an earlier topic, use the conversation history to understand it.\n\
         If your internal knowledge is insufficient, rely on the additional context below.\n\n\
         Available Subjects and their topics (for general reference):\n{subjects}\n\
         Current Tasks (for general reference, including completion status):\n{tasks}\n\n\
         --- Conversation History ---\n{history}\n\
         --- Additional Context ---\n{context}\n\n\
         User: {query}\n{assistant}:",
        subjects = subject_lines(parts.subjects),
        tasks = task_lines_with_status(parts.tasks),
        history = format_history(parts.history, assistant),
        context = parts.context.trim(),
        query = parts.query,
    )
}

pub fn fallback_prompt(assistant: &str, history: &[&ConversationTurn], query: &str) -> String {
    format!(
        "You are {assistant}, a friendly and helpful academic assistant.\n\
         No specific information was found in the knowledge base or on the web for this query.\n\
         Give a polite, helpful and concise answer based on your general knowledge and the conversation history.\n\
         If you need more clarity, ask the user to rephrase. Stay encouraging.\n\n\
         Conversation History:\n{history}\
         Current User Query: {query}\n{assistant}:",
        history = format_history(history, assistant),
    )
}
