//! Prompt system for docqa.
//!
//! This crate provides:
//! - Tone profiles that select the system instructions
//! - Handlebars templates for the structured and simple answer prompts
//! - Workspace overrides of tone instructions loaded from YAML

pub mod builder;
pub mod loader;
pub mod tones;
pub mod types;

// Re-export main types
pub use builder::{build_simple_prompt, build_structured_prompt};
pub use loader::{list_prompts, PromptLibrary, DEFAULT_CORPUS};
pub use types::{BuiltPrompt, PromptDefinition, PromptKind, Tone};
