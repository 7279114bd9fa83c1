//! Retrieval-augmented answer pipeline.
//!
//! Turns retrieved passages and unreliable model output into a rendered
//! answer:
//! - [`dedupe`]: bounded, ordered, unique passages
//! - [`extract`]: tolerant JSON object extraction
//! - [`reconstruct`]: schema validation and partial reconstruction
//! - [`render`]: markdown rendering with domain-term emphasis
//! - [`memory`]: size-bounded conversation windows
//! - [`pipeline`]: the tiered orchestrator
//!
//! Retrieval and conversation storage sit behind the [`Retriever`] and
//! [`ConversationStore`] traits.

pub mod dedupe;
pub mod extract;
pub mod greeting;
pub mod memory;
pub mod pipeline;
pub mod reconstruct;
pub mod render;
pub mod retriever;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use memory::{ConversationKey, MemoryRegistry, MemoryStats, MemoryWindow, Role, WindowSize};
pub use pipeline::{AnswerPipeline, AnswerTier, PipelineAnswer, PipelineSettings};
pub use reconstruct::{parse_outcome, parse_to_answer, parse_with_fallback, OutcomeKind, ParseOutcome, TerminalReason};
pub use render::{render, DomainTerms};
pub use retriever::{JsonlRetriever, Retriever};
pub use store::{record_best_effort, ConversationStore, ConversationSummary, SqliteConversationStore, StoredMessage};
pub use types::{Citation, RetrievedPassage, StructuredAnswer};
