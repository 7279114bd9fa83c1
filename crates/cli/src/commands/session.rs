//! Shared setup for commands that answer questions.

use docqa_core::{config::AppConfig, AppResult};
use docqa_llm::create_client_from_config;
use docqa_prompt::{PromptLibrary, Tone};
use docqa_rag::{
    record_best_effort, AnswerPipeline, ConversationStore, JsonlRetriever, MemoryWindow,
    PipelineAnswer, PipelineSettings, Role, SqliteConversationStore,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Build the answer pipeline with every collaborator initialized up front.
pub fn build_pipeline(config: &AppConfig, passages: Option<&Path>) -> AppResult<AnswerPipeline> {
    config.validate()?;

    let passages_path = passages
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.passages_path());
    let retriever = JsonlRetriever::load(&passages_path, config.retrieval.top_k)?;
    if retriever.is_empty() {
        tracing::warn!(path = ?passages_path, "Passage file contains no passages");
    }

    let client = create_client_from_config(config)?;
    let prompts = PromptLibrary::load(&config.workspace)?;

    Ok(AnswerPipeline::new(
        Arc::new(retriever),
        client,
        prompts,
        PipelineSettings::from_config(config),
    ))
}

/// Resolve a tone flag. Unknown names fall back to conversational.
pub fn parse_tone(name: &str) -> Tone {
    let tone = Tone::parse(name);
    if Tone::from_name(name).is_none() {
        tracing::warn!(
            requested = name,
            fallback = %tone,
            supported = %Tone::ALL.iter().map(|t| t.as_str()).collect::<Vec<_>>().join(", "),
            "Unknown tone"
        );
    }
    tone
}

/// Open the conversation store, or log and continue without one.
pub fn open_store(config: &AppConfig) -> Option<SqliteConversationStore> {
    let path: PathBuf = config.conversations_db_path();
    match SqliteConversationStore::open(&path) {
        Ok(store) => Some(store),
        Err(e) => {
            tracing::warn!(error = %e, "Conversation history disabled");
            None
        }
    }
}

/// Resolve the conversation to record into, creating one titled after the
/// question when none is given. A requested id that does not exist
/// resolves to `None`.
pub fn resolve_conversation(
    store: &dyn ConversationStore,
    requested: Option<i64>,
    first_question: &str,
) -> Option<i64> {
    if let Some(id) = requested {
        return match store.conversation_exists(id) {
            Ok(true) => Some(id),
            Ok(false) => {
                tracing::warn!(conversation_id = id, "Conversation not found, answer not recorded");
                None
            }
            Err(e) => {
                tracing::warn!(conversation_id = id, error = %e, "Failed to look up conversation");
                None
            }
        };
    }

    match store.create_conversation(&conversation_title(first_question)) {
        Ok(id) => Some(id),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to create conversation");
            None
        }
    }
}

/// Record both turns of an answered question.
pub fn record_answer(store: &dyn ConversationStore, conversation_id: i64, question: &str, answer: &PipelineAnswer) {
    let remembered = answer.remembered.as_deref();
    record_best_effort(
        store,
        conversation_id,
        Role::User,
        question,
        remembered.map(|_| question),
        &[],
    );
    record_best_effort(
        store,
        conversation_id,
        Role::Assistant,
        &answer.answer,
        remembered,
        &answer.citations(),
    );
}

/// Replay the remembered turns of a conversation into `memory`.
///
/// Turns memory never held, such as greetings, are skipped.
pub fn restore_memory(store: &dyn ConversationStore, conversation_id: i64, memory: &mut MemoryWindow) {
    match store.messages(conversation_id) {
        Ok(messages) => {
            for message in messages {
                let Some(content) = message.memory_content else {
                    continue;
                };
                let role = match message.role.as_str() {
                    "user" => Role::User,
                    _ => Role::Assistant,
                };
                memory.append(role, content);
            }
            memory.trim();
            tracing::debug!(conversation_id, stats = ?memory.stats(), "Restored conversation memory");
        }
        Err(e) => tracing::warn!(conversation_id, error = %e, "Failed to restore conversation"),
    }
}

fn conversation_title(question: &str) -> String {
    let title: String = question.trim().chars().take(60).collect();
    if title.is_empty() {
        "New conversation".to_string()
    } else {
        title
    }
}

/// JSON form of an answer.
pub fn answer_json(answer: &PipelineAnswer, conversation_id: Option<i64>) -> serde_json::Value {
    serde_json::json!({
        "answer": answer.answer,
        "tier": answer.tier,
        "followUpQuestions": answer.follow_up_questions,
        "citations": answer.citations(),
        "conversationId": conversation_id,
    })
}

/// Print an answer as markdown followed by its follow-up questions.
pub fn print_answer(answer: &PipelineAnswer) {
    println!("{}", answer.answer);

    if !answer.follow_up_questions.is_empty() {
        println!();
        println!("Follow-up questions:");
        for question in &answer.follow_up_questions {
            println!("  - {}", question);
        }
    }
}
