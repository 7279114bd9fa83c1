//! Ask command handler.
//!
//! Answers one question through the full pipeline.

use super::session;
use clap::Args;
use docqa_core::{config::AppConfig, AppError, AppResult};
use docqa_rag::MemoryWindow;
use std::path::PathBuf;

/// Ask a question about the standards
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: Option<String>,

    /// Read the question from a file
    #[arg(short, long, conflicts_with = "question")]
    pub file: Option<PathBuf>,

    /// Response tone (conversational, concise, detailed, professional, simple)
    #[arg(short, long, default_value = "conversational")]
    pub tone: String,

    /// JSON-lines passage file (default: .docqa/passages.jsonl)
    #[arg(long)]
    pub passages: Option<PathBuf>,

    /// Continue a stored conversation
    #[arg(long)]
    pub conversation: Option<i64>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let question = self.get_question()?;
        let tone = session::parse_tone(&self.tone);
        let pipeline = session::build_pipeline(config, self.passages.as_deref())?;

        let mut memory = MemoryWindow::from_settings(&config.memory)?;
        let store = session::open_store(config);
        if let (Some(store), Some(id)) = (store.as_ref(), self.conversation) {
            session::restore_memory(store, id, &mut memory);
        }

        let answer = pipeline.answer(&question, tone, &mut memory).await;

        let conversation_id = store.as_ref().and_then(|store| {
            let id = session::resolve_conversation(store, self.conversation, &question)?;
            session::record_answer(store, id, &question, &answer);
            Some(id)
        });

        if self.json {
            let output = session::answer_json(&answer, conversation_id);
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            session::print_answer(&answer);
            if let Some(id) = conversation_id {
                tracing::info!(conversation_id = id, "Answer recorded");
            }
        }

        Ok(())
    }

    /// The question from the argument or the file.
    fn get_question(&self) -> AppResult<String> {
        let question = match (&self.question, &self.file) {
            (Some(question), _) => question.clone(),
            (None, Some(path)) => std::fs::read_to_string(path)?,
            (None, None) => String::new(),
        };

        let question = question.trim().to_string();
        if question.is_empty() {
            return Err(AppError::Config("No question provided".to_string()));
        }
        Ok(question)
    }
}
