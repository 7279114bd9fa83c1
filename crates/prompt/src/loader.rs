//! Prompt library with workspace tone overrides.

use crate::builder::render_template;
use crate::tones;
use crate::types::{PromptDefinition, Tone};
use docqa_core::{AppError, AppResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Corpus name substituted for `{{corpus}}` when none is configured.
pub const DEFAULT_CORPUS: &str = "AAOIFI Sharia Standards";

/// Tone instructions available to the prompt builders.
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    corpus: String,
    overrides: HashMap<Tone, String>,
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self {
            corpus: DEFAULT_CORPUS.to_string(),
            overrides: HashMap::new(),
        }
    }
}

impl PromptLibrary {
    /// Library with only the built-in instructions.
    pub fn new(corpus: impl Into<String>) -> Self {
        Self {
            corpus: corpus.into(),
            overrides: HashMap::new(),
        }
    }

    /// Load the built-in instructions and overlay `.docqa/prompts/*.yml`.
    ///
    /// Files that fail to read, parse, name a known tone, or render are
    /// skipped with a warning. A missing directory is not an error.
    pub fn load(workspace_path: &Path) -> AppResult<Self> {
        let mut library = Self::default();

        for path in prompt_files(workspace_path)? {
            match load_definition(&path) {
                Ok(definition) => {
                    if let Err(e) = library.apply(definition) {
                        tracing::warn!("Skipping prompt override {:?}: {}", path, e);
                    }
                }
                Err(e) => tracing::warn!("Skipping prompt override {:?}: {}", path, e),
            }
        }

        tracing::debug!(overrides = library.overrides.len(), "Prompt library loaded");
        Ok(library)
    }

    /// Replace the corpus name.
    pub fn with_corpus(mut self, corpus: impl Into<String>) -> Self {
        self.corpus = corpus.into();
        self
    }

    /// Install an override after checking it renders.
    pub fn apply(&mut self, definition: PromptDefinition) -> AppResult<()> {
        let tone = Tone::from_name(&definition.tone).ok_or_else(|| {
            AppError::Prompt(format!("Unknown tone in prompt override: {}", definition.tone))
        })?;

        if definition.instructions.trim().is_empty() {
            return Err(AppError::Prompt(format!(
                "Prompt override for {} has empty instructions",
                tone
            )));
        }

        render_template(&definition.instructions, &self.variables())?;
        tracing::info!(tone = %tone, "Using workspace prompt override");
        self.overrides.insert(tone, definition.instructions);
        Ok(())
    }

    /// Corpus name.
    pub fn corpus(&self) -> &str {
        &self.corpus
    }

    /// Whether a tone has a workspace override.
    pub fn is_overridden(&self, tone: Tone) -> bool {
        self.overrides.contains_key(&tone)
    }

    /// Rendered system instructions for a tone.
    pub fn instructions(&self, tone: Tone) -> AppResult<String> {
        let template = self
            .overrides
            .get(&tone)
            .map(String::as_str)
            .unwrap_or_else(|| tones::system_instructions(tone));
        render_template(template, &self.variables())
    }

    fn variables(&self) -> HashMap<String, String> {
        HashMap::from([("corpus".to_string(), self.corpus.clone())])
    }
}

/// List the tone override files present in the workspace.
pub fn list_prompts(workspace_path: &Path) -> AppResult<Vec<String>> {
    let mut names: Vec<String> = prompt_files(workspace_path)?
        .iter()
        .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(String::from))
        .collect();
    names.sort();
    Ok(names)
}

fn prompt_files(workspace_path: &Path) -> AppResult<Vec<PathBuf>> {
    let prompts_dir = workspace_path.join(".docqa/prompts");

    if !prompts_dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(&prompts_dir)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yml") | Some("yaml")
        );
        if path.is_file() && is_yaml {
            files.push(path.to_path_buf());
        }
    }

    Ok(files)
}

fn load_definition(path: &Path) -> AppResult<PromptDefinition> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| AppError::Prompt(format!("Failed to read prompt file {:?}: {}", path, e)))?;

    serde_yaml::from_str(&contents)
        .map_err(|e| AppError::Prompt(format!("Failed to parse prompt YAML {:?}: {}", path, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_prompt(dir: &TempDir, name: &str, body: &str) {
        let prompts_dir = dir.path().join(".docqa/prompts");
        fs::create_dir_all(&prompts_dir).unwrap();
        fs::write(prompts_dir.join(name), body).unwrap();
    }

    #[test]
    fn test_builtin_instructions_render_corpus() {
        let library = PromptLibrary::default();
        let text = library.instructions(Tone::Concise).unwrap();
        assert!(text.contains(DEFAULT_CORPUS));
        assert!(!text.contains("{{corpus}}"));
    }

    #[test]
    fn test_load_without_prompts_dir() {
        let temp_dir = TempDir::new().unwrap();
        let library = PromptLibrary::load(temp_dir.path()).unwrap();
        assert!(!library.is_overridden(Tone::Conversational));
        assert!(list_prompts(temp_dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_load_applies_override() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(
            &temp_dir,
            "concise.yml",
            "tone: concise\ninstructions: \"Answer about {{corpus}} in one line.\"\n",
        );

        let library = PromptLibrary::load(temp_dir.path()).unwrap();
        assert!(library.is_overridden(Tone::Concise));
        assert_eq!(
            library.instructions(Tone::Concise).unwrap(),
            format!("Answer about {} in one line.", DEFAULT_CORPUS)
        );
        assert!(!library.is_overridden(Tone::Detailed));
    }

    #[test]
    fn test_load_skips_invalid_files() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(&temp_dir, "broken.yml", "tone: [unclosed");
        write_prompt(&temp_dir, "unknown.yml", "tone: sarcastic\ninstructions: hi\n");
        write_prompt(&temp_dir, "bad_template.yml", "tone: simple\ninstructions: \"{{#if}}\"\n");
        write_prompt(&temp_dir, "notes.txt", "ignored");

        let library = PromptLibrary::load(temp_dir.path()).unwrap();
        assert!(!library.is_overridden(Tone::Simple));

        let names = list_prompts(temp_dir.path()).unwrap();
        assert_eq!(names, vec!["bad_template", "broken", "unknown"]);
    }

    #[test]
    fn test_apply_rejects_empty_instructions() {
        let mut library = PromptLibrary::new("Test Corpus");
        let result = library.apply(PromptDefinition {
            tone: "detailed".to_string(),
            title: None,
            instructions: "   ".to_string(),
        });
        assert!(matches!(result, Err(AppError::Prompt(_))));
        assert_eq!(library.corpus(), "Test Corpus");
    }
}
