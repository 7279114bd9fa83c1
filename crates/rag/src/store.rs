//! Durable conversation history.
//!
//! Persistence is best-effort from the answer path's point of view: hosts
//! record turns through [`record_best_effort`], which logs failures and
//! never interrupts answer generation.

use crate::memory::Role;
use crate::types::Citation;
use chrono::{DateTime, Utc};
use docqa_core::{AppError, AppResult};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Conversation listing entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: i64,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: i64,
}

/// A persisted message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: i64,
    pub conversation_id: i64,
    pub role: String,
    pub content: String,
    /// Text replayed into conversation memory; `None` for turns the
    /// memory never held
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_content: Option<String>,
    pub citations: Vec<Citation>,
    pub timestamp: DateTime<Utc>,
}

/// Storage for conversations and their messages.
pub trait ConversationStore: Send + Sync {
    /// Create a conversation and return its id.
    fn create_conversation(&self, title: &str) -> AppResult<i64>;

    /// Whether a conversation with this id exists.
    fn conversation_exists(&self, conversation_id: i64) -> AppResult<bool>;

    /// Append a message to an existing conversation.
    ///
    /// `content` is what the user saw; `memory_content` is what conversation
    /// memory held for the turn, if anything.
    fn append_message(
        &self,
        conversation_id: i64,
        role: Role,
        content: &str,
        memory_content: Option<&str>,
        citations: &[Citation],
    ) -> AppResult<()>;

    /// Messages of a conversation, oldest first.
    fn messages(&self, conversation_id: i64) -> AppResult<Vec<StoredMessage>>;

    /// Conversations, most recently updated first.
    fn list_conversations(&self, limit: usize, offset: usize) -> AppResult<Vec<ConversationSummary>>;

    /// Delete a conversation and its messages. Returns false if it did not exist.
    fn delete_conversation(&self, conversation_id: i64) -> AppResult<bool>;

    /// Rename a conversation. Returns false if it did not exist.
    fn rename_conversation(&self, conversation_id: i64, title: &str) -> AppResult<bool>;
}

/// Record a message, logging instead of failing.
pub fn record_best_effort(
    store: &dyn ConversationStore,
    conversation_id: i64,
    role: Role,
    content: &str,
    memory_content: Option<&str>,
    citations: &[Citation],
) {
    if let Err(e) = store.append_message(conversation_id, role, content, memory_content, citations) {
        tracing::warn!(
            conversation_id,
            role = %role,
            error = %e,
            "Failed to persist conversation message"
        );
    }
}

/// SQLite-backed conversation store.
pub struct SqliteConversationStore {
    conn: Mutex<Connection>,
}

impl SqliteConversationStore {
    /// Open (or create) the database at `db_path`.
    pub fn open(db_path: &Path) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Storage(format!("Failed to create database directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| AppError::Storage(format!("Failed to open conversation database: {}", e)))?;

        let store = Self::with_connection(conn)?;
        tracing::debug!("Opened conversation store at {:?}", db_path);
        Ok(store)
    }

    /// In-memory store.
    pub fn in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Storage(format!("Failed to open in-memory database: {}", e)))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> AppResult<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS conversations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                message_count INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id INTEGER NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                memory_content TEXT,
                citations TEXT NOT NULL DEFAULT '[]',
                timestamp TEXT NOT NULL,
                FOREIGN KEY (conversation_id) REFERENCES conversations(id)
            );

            CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id);
            "#,
        )
        .map_err(|e| AppError::Storage(format!("Failed to create tables: {}", e)))?;

        // Databases created before memory_content existed
        if conn.prepare("SELECT memory_content FROM messages LIMIT 0").is_err() {
            conn.execute("ALTER TABLE messages ADD COLUMN memory_content TEXT", [])
                .map_err(|e| AppError::Storage(format!("Failed to migrate messages table: {}", e)))?;
            tracing::info!("Added memory_content column to messages");
        }

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Storage("Conversation database lock poisoned".to_string()))
    }
}

fn exists(conn: &Connection, conversation_id: i64) -> AppResult<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT id FROM conversations WHERE id = ?1",
            params![conversation_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| AppError::Storage(format!("Failed to look up conversation: {}", e)))?;
    Ok(found.is_some())
}

impl ConversationStore for SqliteConversationStore {
    fn create_conversation(&self, title: &str) -> AppResult<i64> {
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO conversations (title, created_at, updated_at, message_count)
             VALUES (?1, ?2, ?2, 0)",
            params![title, now],
        )
        .map_err(|e| AppError::Storage(format!("Failed to create conversation: {}", e)))?;

        let id = conn.last_insert_rowid();
        tracing::debug!(conversation_id = id, "Created conversation");
        Ok(id)
    }

    fn conversation_exists(&self, conversation_id: i64) -> AppResult<bool> {
        let conn = self.lock()?;
        exists(&conn, conversation_id)
    }

    fn append_message(
        &self,
        conversation_id: i64,
        role: Role,
        content: &str,
        memory_content: Option<&str>,
        citations: &[Citation],
    ) -> AppResult<()> {
        let citations_json = serde_json::to_string(citations)
            .map_err(|e| AppError::Storage(format!("Failed to serialize citations: {}", e)))?;
        let now = Utc::now().to_rfc3339();

        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Storage(format!("Failed to start transaction: {}", e)))?;

        let updated = tx
            .execute(
                "UPDATE conversations SET message_count = message_count + 1, updated_at = ?1
                 WHERE id = ?2",
                params![now, conversation_id],
            )
            .map_err(|e| AppError::Storage(format!("Failed to update conversation: {}", e)))?;

        if updated == 0 {
            return Err(AppError::Storage(format!(
                "Conversation {} not found",
                conversation_id
            )));
        }

        tx.execute(
            "INSERT INTO messages (conversation_id, role, content, memory_content, citations, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![conversation_id, role.as_str(), content, memory_content, citations_json, now],
        )
        .map_err(|e| AppError::Storage(format!("Failed to insert message: {}", e)))?;

        tx.commit()
            .map_err(|e| AppError::Storage(format!("Failed to commit message: {}", e)))?;
        Ok(())
    }

    fn messages(&self, conversation_id: i64) -> AppResult<Vec<StoredMessage>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, conversation_id, role, content, memory_content, citations, timestamp
                 FROM messages WHERE conversation_id = ?1 ORDER BY id",
            )
            .map_err(|e| AppError::Storage(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![conversation_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })
            .map_err(|e| AppError::Storage(format!("Failed to query messages: {}", e)))?;

        let mut messages = Vec::new();
        for row in rows {
            let (id, conversation_id, role, content, memory_content, citations, timestamp) =
                row.map_err(|e| AppError::Storage(format!("Failed to read message: {}", e)))?;

            let citations: Vec<Citation> = serde_json::from_str(&citations).unwrap_or_else(|e| {
                tracing::warn!(message_id = id, error = %e, "Ignoring unreadable citations");
                Vec::new()
            });

            messages.push(StoredMessage {
                id,
                conversation_id,
                role,
                content,
                memory_content,
                citations,
                timestamp: parse_timestamp(&timestamp)?,
            });
        }

        Ok(messages)
    }

    fn list_conversations(&self, limit: usize, offset: usize) -> AppResult<Vec<ConversationSummary>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, title, created_at, updated_at, message_count
                 FROM conversations ORDER BY updated_at DESC, id DESC LIMIT ?1 OFFSET ?2",
            )
            .map_err(|e| AppError::Storage(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![limit as i64, offset as i64], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })
            .map_err(|e| AppError::Storage(format!("Failed to list conversations: {}", e)))?;

        let mut conversations = Vec::new();
        for row in rows {
            let (id, title, created_at, updated_at, message_count) =
                row.map_err(|e| AppError::Storage(format!("Failed to read conversation: {}", e)))?;
            conversations.push(ConversationSummary {
                id,
                title,
                created_at: parse_timestamp(&created_at)?,
                updated_at: parse_timestamp(&updated_at)?,
                message_count,
            });
        }

        Ok(conversations)
    }

    fn delete_conversation(&self, conversation_id: i64) -> AppResult<bool> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Storage(format!("Failed to start transaction: {}", e)))?;

        tx.execute(
            "DELETE FROM messages WHERE conversation_id = ?1",
            params![conversation_id],
        )
        .map_err(|e| AppError::Storage(format!("Failed to delete messages: {}", e)))?;

        let deleted = tx
            .execute(
                "DELETE FROM conversations WHERE id = ?1",
                params![conversation_id],
            )
            .map_err(|e| AppError::Storage(format!("Failed to delete conversation: {}", e)))?;

        tx.commit()
            .map_err(|e| AppError::Storage(format!("Failed to commit delete: {}", e)))?;
        Ok(deleted > 0)
    }

    fn rename_conversation(&self, conversation_id: i64, title: &str) -> AppResult<bool> {
        let conn = self.lock()?;
        if !exists(&conn, conversation_id)? {
            return Ok(false);
        }

        conn.execute(
            "UPDATE conversations SET title = ?1, updated_at = ?2 WHERE id = ?3",
            params![title, Utc::now().to_rfc3339(), conversation_id],
        )
        .map_err(|e| AppError::Storage(format!("Failed to rename conversation: {}", e)))?;
        Ok(true)
    }
}

fn parse_timestamp(value: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| AppError::Storage(format!("Invalid timestamp {:?}: {}", value, e)))
}
