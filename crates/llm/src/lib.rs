//! Model client crate for docqa.
//!
//! This crate provides a provider-agnostic abstraction for invoking the
//! generative model that answers questions. Every provider implements the
//! `LlmClient` trait; the answer pipeline only ever sees that trait.
//!
//! # Providers
//! - **Ollama**: Local LLM runtime (default)
//! - **OpenAI-compatible**: OpenAI and Groq chat completions
//!
//! # Example
//! ```no_run
//! use docqa_llm::{create_client, LlmRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = create_client("ollama", None, None)?;
//! let request = LlmRequest::new("What is a murabaha?", "llama3.2");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod types;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::{create_client, create_client_from_config};
pub use providers::{OllamaClient, OpenAiCompatClient};
pub use types::ProviderType;
