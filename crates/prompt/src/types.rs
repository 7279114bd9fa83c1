//! Prompt types for docqa.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Response tone profile.
///
/// Tone changes the wording of the system instructions only; it never
/// changes how an answer is generated or parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    /// Friendly and natural
    #[default]
    Conversational,
    /// Short, to-the-point answers
    Concise,
    /// Comprehensive explanations
    Detailed,
    /// Formal consultant style
    Professional,
    /// Plain-language explanations
    Simple,
}

impl Tone {
    /// Every tone, in display order.
    pub const ALL: [Tone; 5] = [
        Tone::Conversational,
        Tone::Concise,
        Tone::Detailed,
        Tone::Professional,
        Tone::Simple,
    ];

    /// Parse a tone, falling back to `Conversational` for unknown values.
    pub fn parse(s: &str) -> Self {
        Self::from_name(s).unwrap_or_default()
    }

    /// Parse a tone strictly.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "conversational" => Some(Self::Conversational),
            "concise" => Some(Self::Concise),
            "detailed" => Some(Self::Detailed),
            "professional" => Some(Self::Professional),
            "simple" => Some(Self::Simple),
            _ => None,
        }
    }

    /// Canonical tone name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conversational => "conversational",
            Self::Concise => "concise",
            Self::Detailed => "detailed",
            Self::Professional => "professional",
            Self::Simple => "simple",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tone override loaded from `.docqa/prompts/<name>.yml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Tone this definition replaces
    pub tone: String,

    /// Optional human-readable title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// System instructions (Handlebars; `{{corpus}}` is available)
    pub instructions: String,
}

/// Which generation tier a prompt was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptKind {
    /// Schema-aware prompt with conversation history
    Structured,
    /// Plain instructional prompt, no schema and no history
    Simple,
}

/// A fully built prompt ready for model execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPrompt {
    /// System message
    pub system: String,

    /// User message
    pub user: String,

    /// Tone the instructions were drawn from
    pub tone: Tone,

    /// Tier the prompt targets
    pub kind: PromptKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_tone_defaults_to_conversational() {
        assert_eq!(Tone::parse("sarcastic"), Tone::Conversational);
        assert_eq!(Tone::parse(""), Tone::Conversational);
        assert_eq!(Tone::parse(" Concise "), Tone::Concise);
        assert_eq!(Tone::from_name("sarcastic"), None);
    }

    #[test]
    fn test_tone_names_round_trip() {
        for tone in Tone::ALL {
            assert_eq!(Tone::from_name(tone.as_str()), Some(tone));
        }
    }

    #[test]
    fn test_prompt_definition_deserialization() {
        let yaml = r#"
tone: concise
title: Short answers
instructions: "Answer about {{corpus}} in two sentences."
"#;

        let def: PromptDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(def.tone, "concise");
        assert_eq!(def.title.as_deref(), Some("Short answers"));
        assert!(def.instructions.contains("{{corpus}}"));
    }
}
