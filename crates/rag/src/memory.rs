//! Bounded conversation memory.
//!
//! A [`MemoryWindow`] holds user/assistant turns and caps them at
//! `2 × window_size` messages, discarding the oldest first. Disabling
//! memory hides the history from prompts without erasing it.
//!
//! The window performs no locking. Hosts that serve several conversations
//! keep one window per conversation in a [`MemoryRegistry`].

use docqa_core::config::{MemorySettings, MEMORY_WINDOW_SIZES};
use docqa_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Number of question/answer pairs retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(try_from = "usize", into = "usize")]
pub enum WindowSize {
    Two,
    #[default]
    Five,
    Ten,
    Twenty,
}

impl WindowSize {
    pub fn pairs(self) -> usize {
        match self {
            Self::Two => 2,
            Self::Five => 5,
            Self::Ten => 10,
            Self::Twenty => 20,
        }
    }

    /// Maximum retained messages.
    pub fn max_messages(self) -> usize {
        self.pairs() * 2
    }
}

impl TryFrom<usize> for WindowSize {
    type Error = AppError;

    fn try_from(size: usize) -> AppResult<Self> {
        match size {
            2 => Ok(Self::Two),
            5 => Ok(Self::Five),
            10 => Ok(Self::Ten),
            20 => Ok(Self::Twenty),
            other => Err(AppError::Config(format!(
                "Memory window size must be one of {:?}, got {}",
                MEMORY_WINDOW_SIZES, other
            ))),
        }
    }
}

impl From<WindowSize> for usize {
    fn from(size: WindowSize) -> usize {
        size.pairs()
    }
}

impl fmt::Display for WindowSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pairs())
    }
}

/// Speaker of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

/// Snapshot of the memory state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub enabled: bool,
    pub window_size: usize,
    pub message_count: usize,
    pub pair_count: usize,
    pub at_capacity: bool,
}

/// Size-bounded conversation history.
#[derive(Debug, Clone)]
pub struct MemoryWindow {
    turns: Vec<Turn>,
    window: WindowSize,
    enabled: bool,
}

impl Default for MemoryWindow {
    fn default() -> Self {
        Self::new(WindowSize::default(), true)
    }
}

impl MemoryWindow {
    pub fn new(window: WindowSize, enabled: bool) -> Self {
        Self {
            turns: Vec::new(),
            window,
            enabled,
        }
    }

    /// Window built from configuration; rejects sizes outside {2, 5, 10, 20}.
    pub fn from_settings(settings: &MemorySettings) -> AppResult<Self> {
        Ok(Self::new(
            WindowSize::try_from(settings.window_size)?,
            settings.enabled,
        ))
    }

    /// Record a turn. Call [`trim`](Self::trim) to enforce the cap.
    pub fn append(&mut self, role: Role, content: impl Into<String>) {
        self.turns.push(Turn {
            role,
            content: content.into(),
        });
    }

    /// Keep only the most recent `2 × window_size` messages.
    pub fn trim(&mut self) {
        let max = self.window.max_messages();
        if self.turns.len() > max {
            let excess = self.turns.len() - max;
            self.turns.drain(..excess);
            tracing::debug!(dropped = excess, kept = max, "Trimmed conversation memory");
        }
    }

    /// Visible history; empty while memory is disabled.
    pub fn history(&self) -> &[Turn] {
        if !self.enabled {
            return &[];
        }
        let max = self.window.max_messages();
        let start = self.turns.len().saturating_sub(max);
        &self.turns[start..]
    }

    /// History formatted for a prompt, one `Role: content` line per turn.
    pub fn render_history(&self) -> String {
        self.history()
            .iter()
            .map(|turn| format!("{}: {}", turn.role.label(), turn.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Change the window size and trim to it.
    pub fn set_window_size(&mut self, size: usize) -> AppResult<()> {
        self.window = WindowSize::try_from(size)?;
        self.trim();
        Ok(())
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn window_size(&self) -> WindowSize {
        self.window
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn stats(&self) -> MemoryStats {
        let message_count = self.turns.len();
        MemoryStats {
            enabled: self.enabled,
            window_size: self.window.pairs(),
            message_count,
            pair_count: message_count / 2,
            at_capacity: message_count >= self.window.max_messages(),
        }
    }
}

/// Identifier of a conversation whose memory is kept separately.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationKey(pub String);

impl From<&str> for ConversationKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<i64> for ConversationKey {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A memory window shared between the tasks serving one conversation.
pub type SharedMemory = Arc<Mutex<MemoryWindow>>;

/// Conversation-scoped memory windows.
#[derive(Debug)]
pub struct MemoryRegistry {
    defaults: MemorySettings,
    sessions: HashMap<ConversationKey, SharedMemory>,
}

impl MemoryRegistry {
    /// Registry whose new windows follow `defaults`.
    pub fn new(defaults: MemorySettings) -> AppResult<Self> {
        defaults.validate()?;
        Ok(Self {
            defaults,
            sessions: HashMap::new(),
        })
    }

    /// Window for `key`, created on first use.
    pub fn get_or_create(&mut self, key: &ConversationKey) -> AppResult<SharedMemory> {
        if let Some(memory) = self.sessions.get(key) {
            return Ok(Arc::clone(memory));
        }

        let memory = Arc::new(Mutex::new(MemoryWindow::from_settings(&self.defaults)?));
        self.sessions.insert(key.clone(), Arc::clone(&memory));
        tracing::debug!(conversation = %key, "Created conversation memory");
        Ok(memory)
    }

    /// Drop the window for `key`.
    pub fn remove(&mut self, key: &ConversationKey) -> bool {
        self.sessions.remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(size: usize) -> MemoryWindow {
        MemoryWindow::new(WindowSize::try_from(size).unwrap(), true)
    }

    #[test]
    fn test_window_size_validation() {
        for size in MEMORY_WINDOW_SIZES {
            assert_eq!(WindowSize::try_from(size).unwrap().pairs(), size);
        }
        for size in [0, 1, 3, 4, 15, 100] {
            assert!(matches!(
                WindowSize::try_from(size),
                Err(AppError::Config(_))
            ));
        }
    }

    #[test]
    fn test_trim_keeps_most_recent() {
        let mut memory = window(2);
        for i in 0..7 {
            memory.append(Role::User, format!("q{}", i));
            memory.append(Role::Assistant, format!("a{}", i));
            memory.trim();
        }

        let contents: Vec<&str> = memory.history().iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["q5", "a5", "q6", "a6"]);
        assert!(memory.stats().at_capacity);
    }

    #[test]
    fn test_interleaved_appends_never_exceed_cap() {
        for size in MEMORY_WINDOW_SIZES {
            let mut memory = window(size);
            let mut all = Vec::new();
            for i in 0..(size * 5 + 3) {
                let content = format!("m{}", i);
                let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
                memory.append(role, content.clone());
                all.push(content);
                if i % 3 == 0 {
                    memory.trim();
                }
            }
            memory.trim();

            let history: Vec<&str> = memory.history().iter().map(|t| t.content.as_str()).collect();
            assert!(history.len() <= 2 * size);
            let expected: Vec<&str> = all[all.len() - history.len()..]
                .iter()
                .map(String::as_str)
                .collect();
            assert_eq!(history, expected);
        }
    }

    #[test]
    fn test_disable_hides_but_retains() {
        let mut memory = window(5);
        memory.append(Role::User, "What is riba?");
        memory.append(Role::Assistant, "Riba is usury.");

        memory.set_enabled(false);
        assert!(memory.history().is_empty());
        assert_eq!(memory.render_history(), "");
        assert_eq!(memory.stats().message_count, 2);

        memory.set_enabled(true);
        assert_eq!(
            memory.render_history(),
            "User: What is riba?\nAssistant: Riba is usury."
        );

        memory.clear();
        assert!(memory.history().is_empty());
    }

    #[test]
    fn test_set_window_size_trims_and_rejects() {
        let mut memory = window(10);
        for i in 0..20 {
            memory.append(Role::User, format!("m{}", i));
        }
        memory.set_window_size(2).unwrap();
        assert_eq!(memory.stats().message_count, 4);
        assert_eq!(memory.history()[0].content, "m16");

        assert!(memory.set_window_size(7).is_err());
        assert_eq!(memory.window_size(), WindowSize::Two);
    }

    #[test]
    fn test_stats() {
        let mut memory = window(5);
        memory.append(Role::User, "q");
        memory.append(Role::Assistant, "a");
        memory.append(Role::User, "q2");

        let stats = memory.stats();
        assert!(stats.enabled);
        assert_eq!(stats.window_size, 5);
        assert_eq!(stats.message_count, 3);
        assert_eq!(stats.pair_count, 1);
        assert!(!stats.at_capacity);
    }

    #[test]
    fn test_window_size_serde() {
        let size: WindowSize = serde_json::from_str("10").unwrap();
        assert_eq!(size, WindowSize::Ten);
        assert!(serde_json::from_str::<WindowSize>("3").is_err());
        assert_eq!(serde_json::to_string(&WindowSize::Twenty).unwrap(), "20");
    }

    #[tokio::test]
    async fn test_registry_isolates_conversations() {
        let mut registry = MemoryRegistry::new(MemorySettings::default()).unwrap();
        let a = registry.get_or_create(&ConversationKey::from("a")).unwrap();
        let b = registry.get_or_create(&"b".into()).unwrap();

        a.lock().await.append(Role::User, "only in a");
        assert_eq!(a.lock().await.stats().message_count, 1);
        assert_eq!(b.lock().await.stats().message_count, 0);

        let again = registry.get_or_create(&ConversationKey::from("a")).unwrap();
        assert!(Arc::ptr_eq(&a, &again));
        assert_eq!(registry.len(), 2);

        assert!(registry.remove(&ConversationKey::from("a")));
        assert!(!registry.remove(&ConversationKey::from("a")));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registry_rejects_invalid_defaults() {
        let settings = MemorySettings {
            enabled: true,
            window_size: 3,
        };
        assert!(MemoryRegistry::new(settings).is_err());
    }
}
