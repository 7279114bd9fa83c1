//! History command handler.
//!
//! Inspects and edits stored conversations.

use clap::{Args, Subcommand};
use docqa_core::{config::AppConfig, AppError, AppResult};
use docqa_rag::{ConversationStore, SqliteConversationStore};

/// Stored conversation history
#[derive(Args, Debug)]
pub struct HistoryCommand {
    #[command(subcommand)]
    pub action: HistoryAction,
}

#[derive(Subcommand, Debug)]
pub enum HistoryAction {
    /// List conversations, most recent first
    List {
        /// Maximum conversations to show
        #[arg(long, default_value = "20")]
        limit: usize,

        /// Conversations to skip
        #[arg(long, default_value = "0")]
        offset: usize,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the messages of a conversation
    Show {
        /// Conversation id
        id: i64,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a conversation
    Delete {
        /// Conversation id
        id: i64,
    },
    /// Rename a conversation
    Rename {
        /// Conversation id
        id: i64,

        /// New title
        title: String,
    },
}

impl HistoryCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing history command");

        let store = SqliteConversationStore::open(&config.conversations_db_path())?;
        println!("{}", self.run(&store)?);
        Ok(())
    }

    fn run(&self, store: &dyn ConversationStore) -> AppResult<String> {
        match &self.action {
            HistoryAction::List { limit, offset, json } => {
                let conversations = store.list_conversations(*limit, *offset)?;
                if *json {
                    return Ok(serde_json::to_string_pretty(&conversations)?);
                }
                if conversations.is_empty() {
                    return Ok("No conversations yet.".to_string());
                }
                Ok(conversations
                    .iter()
                    .map(|c| {
                        format!(
                            "{:>5}  {}  {:>3} messages  {}",
                            c.id,
                            c.updated_at.format("%Y-%m-%d %H:%M"),
                            c.message_count,
                            c.title
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
            HistoryAction::Show { id, json } => {
                let messages = store.messages(*id)?;
                if *json {
                    return Ok(serde_json::to_string_pretty(&messages)?);
                }
                if messages.is_empty() {
                    return Err(not_found(*id));
                }
                Ok(messages
                    .iter()
                    .map(|m| format!("[{}] {}:\n{}\n", m.timestamp.format("%Y-%m-%d %H:%M"), m.role, m.content))
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
            HistoryAction::Delete { id } => {
                if store.delete_conversation(*id)? {
                    Ok(format!("Deleted conversation {}", id))
                } else {
                    Err(not_found(*id))
                }
            }
            HistoryAction::Rename { id, title } => {
                if store.rename_conversation(*id, title)? {
                    Ok(format!("Renamed conversation {} to '{}'", id, title))
                } else {
                    Err(not_found(*id))
                }
            }
        }
    }
}

fn not_found(id: i64) -> AppError {
    AppError::Storage(format!("Conversation {} not found", id))
}
