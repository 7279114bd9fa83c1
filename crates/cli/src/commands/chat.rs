//! Chat command handler.
//!
//! Interactive loop over one conversation. Every question shares the
//! conversation's memory window; slash commands adjust it.

use super::session;
use clap::Args;
use docqa_core::{config::AppConfig, AppResult};
use docqa_rag::{ConversationKey, MemoryRegistry, MemoryWindow};
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Interactive question answering
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// Response tone (conversational, concise, detailed, professional, simple)
    #[arg(short, long, default_value = "conversational")]
    pub tone: String,

    /// JSON-lines passage file (default: .docqa/passages.jsonl)
    #[arg(long)]
    pub passages: Option<PathBuf>,

    /// Continue a stored conversation
    #[arg(long)]
    pub conversation: Option<i64>,
}

const HELP: &str = "Commands: /clear, /memory on|off, /window 2|5|10|20, /stats, /quit";

/// One line of chat input.
#[derive(Debug, PartialEq)]
enum ChatInput {
    Question(String),
    Clear,
    Memory(bool),
    Window(usize),
    Stats,
    Quit,
    Empty,
    Unknown(String),
}

impl ChatInput {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        if !line.starts_with('/') {
            return Self::Question(line.to_string());
        }

        let mut parts = line.split_whitespace();
        let command = parts.next().unwrap_or_default();
        let argument = parts.next();

        match (command, argument) {
            ("/clear", None) => Self::Clear,
            ("/memory", Some("on")) => Self::Memory(true),
            ("/memory", Some("off")) => Self::Memory(false),
            ("/window", Some(size)) => match size.parse() {
                Ok(size) => Self::Window(size),
                Err(_) => Self::Unknown(line.to_string()),
            },
            ("/stats", None) => Self::Stats,
            ("/quit" | "/exit", None) => Self::Quit,
            _ => Self::Unknown(line.to_string()),
        }
    }
}

impl ChatCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing chat command");

        let tone = session::parse_tone(&self.tone);
        let pipeline = session::build_pipeline(config, self.passages.as_deref())?;
        let store = session::open_store(config);

        let mut registry = MemoryRegistry::new(config.memory)?;
        let key = self
            .conversation
            .map(ConversationKey::from)
            .unwrap_or_else(|| ConversationKey::from("cli"));
        let memory = registry.get_or_create(&key)?;
        let mut memory = memory.lock().await;

        let mut conversation_id = None;
        if let (Some(store), Some(id)) = (store.as_ref(), self.conversation) {
            conversation_id = session::resolve_conversation(store, Some(id), "");
            if conversation_id.is_some() {
                session::restore_memory(store, id, &mut memory);
            }
        }

        eprintln!("Ask about the standards. {}", HELP);
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            eprint!("> ");
            std::io::stderr().flush().ok();

            let Some(line) = lines.next_line().await? else {
                break;
            };

            match ChatInput::parse(&line) {
                ChatInput::Empty => continue,
                ChatInput::Quit => break,
                ChatInput::Clear => {
                    memory.clear();
                    eprintln!("Memory cleared.");
                }
                ChatInput::Memory(enabled) => {
                    memory.set_enabled(enabled);
                    eprintln!("Memory {}.", if enabled { "enabled" } else { "disabled" });
                }
                ChatInput::Window(size) => match memory.set_window_size(size) {
                    Ok(()) => eprintln!("Memory window set to {} exchanges.", size),
                    Err(e) => eprintln!("{}", e),
                },
                ChatInput::Stats => print_stats(&memory)?,
                ChatInput::Unknown(input) => eprintln!("Unknown command '{}'. {}", input, HELP),
                ChatInput::Question(question) => {
                    let answer = pipeline.answer(&question, tone, &mut memory).await;
                    session::print_answer(&answer);
                    println!();

                    if let Some(store) = store.as_ref() {
                        conversation_id = session::resolve_conversation(store, conversation_id, &question);
                        if let Some(id) = conversation_id {
                            session::record_answer(store, id, &question, &answer);
                        }
                    }
                }
            }
        }

        tracing::info!(conversation_id = ?conversation_id, "Chat ended");
        Ok(())
    }
}

fn print_stats(memory: &MemoryWindow) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(&memory.stats())?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_questions() {
        assert_eq!(
            ChatInput::parse("  What is tawarruq?  "),
            ChatInput::Question("What is tawarruq?".to_string())
        );
        assert_eq!(ChatInput::parse("   "), ChatInput::Empty);
    }

    #[test]
    fn test_parse_slash_commands() {
        assert_eq!(ChatInput::parse("/clear"), ChatInput::Clear);
        assert_eq!(ChatInput::parse("/memory on"), ChatInput::Memory(true));
        assert_eq!(ChatInput::parse("/memory off"), ChatInput::Memory(false));
        assert_eq!(ChatInput::parse("/window 10"), ChatInput::Window(10));
        assert_eq!(ChatInput::parse("/stats"), ChatInput::Stats);
        assert_eq!(ChatInput::parse("/quit"), ChatInput::Quit);
        assert_eq!(ChatInput::parse("/exit"), ChatInput::Quit);
    }

    #[test]
    fn test_parse_unknown_commands() {
        assert!(matches!(ChatInput::parse("/window ten"), ChatInput::Unknown(_)));
        assert!(matches!(ChatInput::parse("/memory maybe"), ChatInput::Unknown(_)));
        assert!(matches!(ChatInput::parse("/help"), ChatInput::Unknown(_)));
    }
}
