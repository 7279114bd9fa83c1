//! Model client factory.
//!
//! Clients are built once, eagerly, when the service starts. Missing
//! secrets and unknown providers fail here with a typed error instead of
//! surfacing on the first question.

use crate::client::LlmClient;
use crate::providers::{OllamaClient, OpenAiCompatClient};
use crate::types::ProviderType;
use docqa_core::{AppConfig, AppError, AppResult};
use std::sync::Arc;

/// Create a model client for a provider.
///
/// # Arguments
/// * `provider` - Provider identifier ("ollama", "openai", "groq")
/// * `endpoint` - Optional custom endpoint URL
/// * `api_key` - API key (required by OpenAI and Groq)
///
/// # Errors
/// `AppError::Config` if the provider is unknown, a required key is
/// missing, or the HTTP client cannot be built.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
) -> AppResult<Arc<dyn LlmClient>> {
    let provider_type = ProviderType::parse(provider)
        .ok_or_else(|| AppError::Config(format!("Unknown provider: {}", provider)))?;

    let key = match (provider_type.requires_api_key(), api_key) {
        (true, None) => {
            return Err(AppError::Config(format!(
                "{} provider requires an API key",
                provider_type.as_str()
            )))
        }
        (_, key) => key.unwrap_or_default(),
    };

    let client: Arc<dyn LlmClient> = match provider_type {
        ProviderType::Ollama => Arc::new(OllamaClient::with_base_url(
            endpoint.unwrap_or(crate::providers::ollama::DEFAULT_OLLAMA_URL),
            None,
        )?),
        ProviderType::OpenAI => Arc::new(OpenAiCompatClient::openai(key, endpoint)?),
        ProviderType::Groq => Arc::new(OpenAiCompatClient::groq(key, endpoint)?),
    };

    tracing::info!(provider = client.provider_name(), "Model client initialized");
    Ok(client)
}

/// Create the model client described by the application configuration.
pub fn create_client_from_config(config: &AppConfig) -> AppResult<Arc<dyn LlmClient>> {
    let endpoint = config.resolve_endpoint(&config.provider);
    let api_key = config.resolve_api_key(&config.provider);

    create_client(&config.provider, endpoint.as_deref(), api_key.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_ollama_client() {
        let client = create_client("ollama", None, None).unwrap();
        assert_eq!(client.provider_name(), "ollama");
    }

    #[test]
    fn test_create_ollama_with_custom_endpoint() {
        assert!(create_client("ollama", Some("http://localhost:8080"), None).is_ok());
    }

    #[test]
    fn test_openai_requires_api_key() {
        match create_client("openai", None, None) {
            Err(AppError::Config(msg)) => assert!(msg.contains("requires an API key")),
            Err(other) => panic!("Unexpected error: {}", other),
            Ok(_) => panic!("Expected error for OpenAI without API key"),
        }
    }

    #[test]
    fn test_groq_with_key() {
        let client = create_client("groq", None, Some("gsk-test")).unwrap();
        assert_eq!(client.provider_name(), "groq");
    }

    #[test]
    fn test_unknown_provider() {
        match create_client("unknown", None, None) {
            Err(err) => assert!(err.to_string().contains("Unknown provider")),
            Ok(_) => panic!("Expected error for unknown provider"),
        }
    }

    #[test]
    fn test_create_client_from_default_config() {
        let config = AppConfig::default();
        let client = create_client_from_config(&config).unwrap();
        assert_eq!(client.provider_name(), "ollama");
    }
}
