//! Error types for docqa.
//!
//! This module defines a unified error enum that covers every fallible
//! boundary in the workspace: configuration, I/O, model invocation,
//! retrieval, prompts, memory settings, and conversation storage.

use thiserror::Error;

/// Unified error type for docqa.
///
/// All fallible functions return `Result<T, AppError>`. Parse failures of
/// model output are *not* errors; they are handled by the reconstruction
/// path and never surface as `AppError`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors (including invalid memory window sizes)
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Model invocation errors (transport, quota, undecodable body)
    #[error("LLM error: {0}")]
    Llm(String),

    /// Passage retrieval errors
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Prompt construction errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Conversation memory errors
    #[error("Memory error: {0}")]
    Memory(String),

    /// Conversation store errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
