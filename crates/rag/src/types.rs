//! Core data model for the answer pipeline.

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

/// Confidence given to a strictly valid answer that omits a score.
pub const DEFAULT_CONFIDENCE: f64 = 0.8;

/// Minimum `answer` length, in characters, for a strictly valid answer.
pub const MIN_ANSWER_CHARS: usize = 50;

/// Maximum number of follow-up questions in a valid answer.
pub const MAX_FOLLOW_UPS: usize = 4;

const SNIPPET_GRAPHEMES: usize = 200;

/// A passage returned by the retriever.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    /// Passage text
    pub text: String,

    /// Document name or path
    #[serde(default = "unknown_source")]
    pub source: String,

    /// Page number, if known
    #[serde(default)]
    pub page: Option<u32>,

    /// Stable chunk identifier supplied by the retrieval layer
    #[serde(default, alias = "id")]
    pub chunk_id: Option<String>,

    /// Relevance in [0, 1]
    #[serde(default)]
    pub relevance_score: f32,
}

fn unknown_source() -> String {
    "unknown".to_string()
}

impl RetrievedPassage {
    /// Create a passage without a chunk identifier or score.
    pub fn new(text: impl Into<String>, source: impl Into<String>, page: Option<u32>) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
            page,
            chunk_id: None,
            relevance_score: 0.0,
        }
    }

    /// Set the chunk identifier.
    pub fn with_chunk_id(mut self, chunk_id: impl Into<String>) -> Self {
        self.chunk_id = Some(chunk_id.into());
        self
    }

    /// Set the relevance score, clamped to [0, 1].
    pub fn with_score(mut self, score: f32) -> Self {
        self.relevance_score = score.clamp(0.0, 1.0);
        self
    }

    /// Page label used in prompts and citations ("unknown" when unset).
    pub fn page_label(&self) -> String {
        self.page
            .map(|p| p.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// A citation attached to an answer for display and persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub page: String,
    pub source: String,
    pub snippet: String,
    pub score: f32,
}

impl From<&RetrievedPassage> for Citation {
    fn from(passage: &RetrievedPassage) -> Self {
        let snippet: String = passage
            .text
            .graphemes(true)
            .take(SNIPPET_GRAPHEMES)
            .collect();

        Self {
            page: passage.page_label(),
            source: passage.source.clone(),
            snippet,
            score: passage.relevance_score,
        }
    }
}

/// The canonical structured answer requested from the model.
///
/// Every instance handed out by the parser is structurally valid. Map
/// fields keep the order in which the model emitted their keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredAnswer {
    #[serde(default)]
    pub executive_summary: Vec<String>,

    #[serde(default, with = "ordered_entries")]
    pub requirements_by_page: Vec<(String, Vec<String>)>,

    #[serde(default)]
    pub implementation_checklist: Vec<String>,

    #[serde(default)]
    pub pitfalls: Vec<String>,

    #[serde(default, with = "ordered_entries")]
    pub definitions: Vec<(String, String)>,

    pub answer: String,

    #[serde(default)]
    pub sources: Vec<String>,

    #[serde(default)]
    pub follow_up_questions: Vec<String>,

    #[serde(default = "default_confidence", deserialize_with = "confidence_or_default")]
    pub confidence_score: f64,
}

fn default_confidence() -> f64 {
    DEFAULT_CONFIDENCE
}

fn confidence_or_default<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(DEFAULT_CONFIDENCE))
}

impl StructuredAnswer {
    /// An answer with only the `answer` field set.
    pub fn from_text(answer: impl Into<String>, confidence_score: f64) -> Self {
        Self {
            executive_summary: Vec::new(),
            requirements_by_page: Vec::new(),
            implementation_checklist: Vec::new(),
            pitfalls: Vec::new(),
            definitions: Vec::new(),
            answer: answer.into(),
            sources: Vec::new(),
            follow_up_questions: Vec::new(),
            confidence_score,
        }
    }

    /// Checks shared by strict and reconstructed answers.
    ///
    /// `min_answer_chars` is 50 for strict validation and 1 for
    /// reconstructed answers.
    pub fn check(&self, min_answer_chars: usize) -> Result<(), String> {
        if self.answer.trim().is_empty() {
            return Err("answer must not be empty".to_string());
        }
        if self.answer.chars().count() < min_answer_chars {
            return Err(format!(
                "answer shorter than {} characters",
                min_answer_chars
            ));
        }
        if self.follow_up_questions.len() > MAX_FOLLOW_UPS {
            return Err(format!(
                "more than {} follow-up questions",
                MAX_FOLLOW_UPS
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence_score) {
            return Err(format!(
                "confidence_score {} outside [0, 1]",
                self.confidence_score
            ));
        }
        Ok(())
    }
}

/// Serde adapter that reads a JSON object into ordered key/value pairs.
mod ordered_entries {
    use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
    use serde::ser::{Serialize, SerializeMap, Serializer};
    use std::fmt;
    use std::marker::PhantomData;

    pub fn serialize<S, V>(entries: &[(String, V)], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        V: Serialize,
    {
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (key, value) in entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D, V>(deserializer: D) -> Result<Vec<(String, V)>, D::Error>
    where
        D: Deserializer<'de>,
        V: Deserialize<'de>,
    {
        struct EntriesVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for EntriesVisitor<V> {
            type Value = Vec<(String, V)>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, value)) = access.next_entry::<String, V>()? {
                    entries.push((key, value));
                }
                Ok(entries)
            }
        }

        deserializer.deserialize_map(EntriesVisitor(PhantomData))
    }
}
