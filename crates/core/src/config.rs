//! Configuration management for docqa.
//!
//! Configuration is layered, later layers winning:
//! - Built-in defaults
//! - Config file (`.docqa/config.yaml`, or `DOCQA_CONFIG`)
//! - Environment variables
//! - Command-line flags (`with_overrides`)
//!
//! The configuration is workspace-centric, with state stored in `.docqa/`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Memory window sizes accepted by the memory manager, in conversation pairs.
pub const MEMORY_WINDOW_SIZES: [usize; 4] = [2, 5, 10, 20];

/// Providers the model client factory knows how to build.
pub const KNOWN_PROVIDERS: [&str; 3] = ["ollama", "openai", "groq"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .docqa/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Active model provider ("ollama", "openai", "groq")
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Explicit API key (overrides provider key env vars)
    pub api_key: Option<String>,

    /// Explicit endpoint (overrides provider config)
    pub endpoint: Option<String>,

    /// Sampling temperature for answer generation
    pub temperature: f32,

    /// Maximum tokens the model may generate per answer
    pub max_tokens: u32,

    /// Log level override
    pub log_level: Option<String>,

    /// Emit logs as JSON
    pub log_json: bool,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Retrieval and context assembly limits
    pub retrieval: RetrievalSettings,

    /// Conversation memory window
    pub memory: MemorySettings,

    /// Answer rendering options
    pub rendering: RenderSettings,

    /// Conversation persistence
    pub storage: StorageSettings,

    /// Provider-specific configuration keyed by provider name
    pub providers: HashMap<String, ProviderConfig>,
}

/// Retrieval and context assembly limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalSettings {
    /// Passages requested from the retriever
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Passages concatenated into one prompt
    #[serde(default = "default_max_context_passages")]
    pub max_context_passages: usize,

    /// Characters kept from each passage in the prompt
    #[serde(default = "default_max_passage_chars")]
    pub max_passage_chars: usize,

    /// Passages kept after deduplication
    #[serde(default = "default_max_sources")]
    pub max_sources: usize,

    /// JSON-lines passage corpus used by the local retriever
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passages_file: Option<PathBuf>,
}

fn default_top_k() -> usize {
    10
}

fn default_max_context_passages() -> usize {
    4
}

fn default_max_passage_chars() -> usize {
    600
}

fn default_max_sources() -> usize {
    5
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            max_context_passages: default_max_context_passages(),
            max_passage_chars: default_max_passage_chars(),
            max_sources: default_max_sources(),
            passages_file: None,
        }
    }
}

/// Conversation memory window settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MemorySettings {
    /// Whether history is fed back into prompts
    #[serde(default = "default_memory_enabled")]
    pub enabled: bool,

    /// Number of question/answer pairs retained (2, 5, 10 or 20)
    #[serde(default = "default_window_size")]
    pub window_size: usize,
}

fn default_memory_enabled() -> bool {
    true
}

fn default_window_size() -> usize {
    5
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            enabled: default_memory_enabled(),
            window_size: default_window_size(),
        }
    }
}

impl MemorySettings {
    /// Reject window sizes outside the enumerated set.
    pub fn validate(&self) -> AppResult<()> {
        if MEMORY_WINDOW_SIZES.contains(&self.window_size) {
            Ok(())
        } else {
            Err(AppError::Config(format!(
                "Memory window size must be one of 2, 5, 10 or 20 (got {})",
                self.window_size
            )))
        }
    }
}

/// Answer rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RenderSettings {
    /// Terms emphasized in addition to the built-in vocabulary
    #[serde(default = "default_extra_terms")]
    pub extra_terms: Vec<String>,
}

fn default_extra_terms() -> Vec<String> {
    vec![
        "enforceability".to_string(),
        "guarantee".to_string(),
        "pledge".to_string(),
    ]
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            extra_terms: default_extra_terms(),
        }
    }
}

/// Conversation persistence settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StorageSettings {
    /// SQLite database for conversation history (default `.docqa/conversations.db`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversations_db: Option<PathBuf>,
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    /// OpenAI-compatible chat completions API (OpenAI, Groq)
    OpenAiCompatible {
        #[serde(rename = "apiKeyEnv")]
        api_key_env: String,
        model: String,
        endpoint: Option<String>,
    },
    /// Local Ollama runtime
    Ollama {
        endpoint: String,
        model: String,
        timeout: Option<u64>,
    },
}

impl ProviderConfig {
    /// Model configured for this provider.
    pub fn model(&self) -> &str {
        match self {
            Self::OpenAiCompatible { model, .. } => model,
            Self::Ollama { model, .. } => model,
        }
    }

    /// Endpoint configured for this provider, if any.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::OpenAiCompatible { endpoint, .. } => endpoint.as_deref(),
            Self::Ollama { endpoint, .. } => Some(endpoint),
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmSection>,
    workspace: Option<WorkspaceSection>,
    logging: Option<LoggingSection>,
    retrieval: Option<RetrievalSettings>,
    memory: Option<MemorySettings>,
    rendering: Option<RenderSettings>,
    storage: Option<StorageSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LlmSection {
    active_provider: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    #[serde(default)]
    providers: HashMap<String, ProviderConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceSection {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingSection {
    level: Option<String>,
    color: Option<bool>,
    json: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(), // Local-first default
            model: "llama3.2".to_string(),
            api_key: None,
            endpoint: None,
            temperature: 0.3,
            max_tokens: 2048,
            log_level: None,
            log_json: false,
            verbose: false,
            no_color: false,
            retrieval: RetrievalSettings::default(),
            memory: MemorySettings::default(),
            rendering: RenderSettings::default(),
            storage: StorageSettings::default(),
            providers: HashMap::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the YAML config file and the environment.
    ///
    /// Environment variables:
    /// - `DOCQA_WORKSPACE`: Override workspace path
    /// - `DOCQA_CONFIG`: Path to config file
    /// - `DOCQA_PROVIDER`: Model provider
    /// - `DOCQA_MODEL`: Model identifier
    /// - `DOCQA_API_KEY`: API key
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load() -> AppResult<Self> {
        Self::load_with(None, None)
    }

    /// Like [`load`](Self::load), but an explicit workspace or config file
    /// takes precedence over the environment when locating the YAML file.
    pub fn load_with(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("DOCQA_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("DOCQA_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if let Some(workspace) = workspace {
            config.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            config.config_file = Some(config_file);
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config.config_path();
        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("DOCQA_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("DOCQA_MODEL") {
            config.model = model;
        }

        if let Ok(key) = std::env::var("DOCQA_API_KEY") {
            config.api_key = Some(key);
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Path of the YAML config file this configuration reads and writes.
    pub fn config_path(&self) -> PathBuf {
        self.config_file
            .clone()
            .unwrap_or_else(|| self.docqa_dir().join("config.yaml"))
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(path) = config_file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(json) = logging.json {
                result.log_json = json;
            }
        }

        if let Some(llm) = config_file.llm {
            result.provider = llm.active_provider.clone();

            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                result.model = provider_config.model().to_string();
            }
            if let Some(temperature) = llm.temperature {
                result.temperature = temperature;
            }
            if let Some(max_tokens) = llm.max_tokens {
                result.max_tokens = max_tokens;
            }

            result.providers = llm.providers;
        }

        if let Some(retrieval) = config_file.retrieval {
            result.retrieval = retrieval;
        }
        if let Some(memory) = config_file.memory {
            result.memory = memory;
        }
        if let Some(rendering) = config_file.rendering {
            result.rendering = rendering;
        }
        if let Some(storage) = config_file.storage {
            result.storage = storage;
        }

        tracing::debug!("Merged config file {:?}", path);
        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the config file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
        log_json: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        if log_json {
            self.log_json = true;
        }

        self
    }

    /// Get the path to the .docqa directory.
    pub fn docqa_dir(&self) -> PathBuf {
        self.workspace.join(".docqa")
    }

    /// Ensure the .docqa directory exists.
    pub fn ensure_docqa_dir(&self) -> AppResult<()> {
        let docqa_dir = self.docqa_dir();
        if !docqa_dir.exists() {
            std::fs::create_dir_all(&docqa_dir).map_err(|e| {
                AppError::Config(format!("Failed to create .docqa directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Path of the JSON-lines passage corpus.
    pub fn passages_path(&self) -> PathBuf {
        self.retrieval
            .passages_file
            .clone()
            .unwrap_or_else(|| self.docqa_dir().join("passages.jsonl"))
    }

    /// Path of the conversation history database.
    pub fn conversations_db_path(&self) -> PathBuf {
        self.storage
            .conversations_db
            .clone()
            .unwrap_or_else(|| self.docqa_dir().join("conversations.db"))
    }

    /// Get the configuration of a provider, if one was declared.
    pub fn get_provider_config(&self, provider: &str) -> Option<&ProviderConfig> {
        self.providers.get(provider)
    }

    /// Resolve the endpoint for a provider: explicit override, then provider config.
    pub fn resolve_endpoint(&self, provider: &str) -> Option<String> {
        self.endpoint.clone().or_else(|| {
            self.get_provider_config(provider)
                .and_then(|pc| pc.endpoint().map(str::to_string))
        })
    }

    /// Resolve the API key for a provider.
    ///
    /// Order: `DOCQA_API_KEY`/explicit key, the provider's `apiKeyEnv`,
    /// then the conventional variable (`OPENAI_API_KEY`, `GROQ_API_KEY`).
    pub fn resolve_api_key(&self, provider: &str) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        if let Some(ProviderConfig::OpenAiCompatible { api_key_env, .. }) =
            self.get_provider_config(provider)
        {
            if let Ok(key) = std::env::var(api_key_env) {
                return Some(key);
            }
        }

        let conventional = match provider {
            "openai" => Some("OPENAI_API_KEY"),
            "groq" => Some("GROQ_API_KEY"),
            _ => None,
        };

        conventional.and_then(|var| std::env::var(var).ok())
    }

    /// Validate configuration before the pipeline is built.
    pub fn validate(&self) -> AppResult<()> {
        let provider = self.provider.as_str();

        if !KNOWN_PROVIDERS.contains(&provider) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if provider != "ollama" && self.resolve_api_key(provider).is_none() {
            return Err(AppError::Config(format!(
                "No API key found for provider '{}'",
                provider
            )));
        }

        self.memory.validate()?;

        let retrieval = &self.retrieval;
        if retrieval.top_k == 0
            || retrieval.max_context_passages == 0
            || retrieval.max_passage_chars == 0
            || retrieval.max_sources == 0
        {
            return Err(AppError::Config(
                "Retrieval limits must all be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Write the current memory settings into the YAML config file.
    ///
    /// Other sections of an existing file are preserved.
    pub fn save_memory_settings(&self) -> AppResult<PathBuf> {
        self.memory.validate()?;

        let path = self.config_path();
        let mut document = if path.exists() {
            let contents = std::fs::read_to_string(&path).map_err(|e| {
                AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
            })?;
            serde_yaml::from_str::<serde_yaml::Value>(&contents)?
        } else {
            serde_yaml::Value::Mapping(serde_yaml::Mapping::new())
        };

        let mapping = document.as_mapping_mut().ok_or_else(|| {
            AppError::Config(format!("Config file {:?} is not a YAML mapping", path))
        })?;
        mapping.insert(
            serde_yaml::Value::String("memory".to_string()),
            serde_yaml::to_value(self.memory)?,
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let yaml = serde_yaml::to_string(&document)?;
        std::fs::write(&path, yaml).map_err(|e| {
            AppError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })?;

        tracing::debug!("Saved memory settings to {:?}", path);
        Ok(path)
    }
}
