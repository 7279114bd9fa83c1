//! Tiered answer pipeline.
//!
//! Every question runs down the same ladder:
//!
//! 1. greeting short-circuit (no retrieval, no model call)
//! 2. structured tier: schema-aware prompt, tolerant parse, full render
//! 3. simple tier: plain prompt over the same context, no history
//! 4. terminal tier: fixed apology
//!
//! [`AnswerPipeline::answer`] never fails; each failure drops one tier.

use crate::dedupe::dedupe;
use crate::greeting;
use crate::memory::{MemoryWindow, Role};
use crate::reconstruct::{parse_outcome, OutcomeKind};
use crate::render::{dedupe_page_citations, render, render_plain, DomainTerms};
use crate::retriever::Retriever;
use crate::types::{Citation, RetrievedPassage};
use docqa_core::{AppConfig, AppError, AppResult};
use docqa_llm::{LlmClient, LlmRequest};
use docqa_prompt::{build_simple_prompt, build_structured_prompt, BuiltPrompt, PromptLibrary, Tone};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use unicode_segmentation::UnicodeSegmentation;

const TERMINAL_ANSWER: &str = "I couldn't find specific information about that in the AAOIFI \
standards. Try narrowing the question or specify the standard/section.";

const TERMINAL_FOLLOW_UP: &str = "What specific aspect of AAOIFI standards are you interested in?";

const SIMPLE_FOLLOW_UPS: [&str; 2] = [
    "Could you provide more details on this topic?",
    "How does this relate to other AAOIFI standards?",
];

/// Passages whose page labels feed inline citations on the simple tier.
const SIMPLE_CITATION_PASSAGES: usize = 3;

/// Tier that produced an answer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tier", rename_all = "snake_case")]
pub enum AnswerTier {
    Greeting,
    Structured { kind: OutcomeKind, confidence: f64 },
    Simple,
    Terminal,
}

/// Final answer handed to the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineAnswer {
    /// Rendered markdown
    pub answer: String,
    pub passages: Vec<RetrievedPassage>,
    pub follow_up_questions: Vec<String>,
    pub tier: AnswerTier,
    /// Plain answer text appended to memory, if the answer was remembered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remembered: Option<String>,
}

impl PipelineAnswer {
    /// Citations for the returned passages.
    pub fn citations(&self) -> Vec<Citation> {
        self.passages.iter().map(Citation::from).collect()
    }

    fn terminal() -> Self {
        Self {
            answer: TERMINAL_ANSWER.to_string(),
            passages: Vec::new(),
            follow_up_questions: vec![TERMINAL_FOLLOW_UP.to_string()],
            tier: AnswerTier::Terminal,
            remembered: None,
        }
    }
}

/// Knobs of the pipeline, usually derived from [`AppConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Passages included in the prompt context
    pub max_context_passages: usize,
    /// Characters kept from each context passage
    pub max_passage_chars: usize,
    /// Passages kept after deduplication
    pub max_sources: usize,
    /// Terms emphasised on top of the base vocabulary
    pub extra_terms: Vec<String>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_context_passages: config.retrieval.max_context_passages,
            max_passage_chars: config.retrieval.max_passage_chars,
            max_sources: config.retrieval.max_sources,
            extra_terms: config.rendering.extra_terms.clone(),
        }
    }
}

/// Orchestrates retrieval, generation, parsing and rendering.
pub struct AnswerPipeline {
    retriever: Arc<dyn Retriever>,
    client: Arc<dyn LlmClient>,
    prompts: PromptLibrary,
    terms: DomainTerms,
    settings: PipelineSettings,
}

impl AnswerPipeline {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        client: Arc<dyn LlmClient>,
        prompts: PromptLibrary,
        settings: PipelineSettings,
    ) -> Self {
        let terms = DomainTerms::new(&settings.extra_terms);
        Self {
            retriever,
            client,
            prompts,
            terms,
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Answer a question. Completed answers are appended to `memory`,
    /// which is then trimmed.
    pub async fn answer(&self, question: &str, tone: Tone, memory: &mut MemoryWindow) -> PipelineAnswer {
        if greeting::is_greeting(question) {
            tracing::info!("Greeting detected, skipping retrieval");
            let (answer, follow_up_questions) = greeting::welcome();
            return PipelineAnswer {
                answer,
                passages: Vec::new(),
                follow_up_questions,
                tier: AnswerTier::Greeting,
                remembered: None,
            };
        }

        let passages = match self.retriever.retrieve(question).await {
            Ok(found) => {
                let total = found.len();
                let unique = dedupe(found, self.settings.max_sources);
                tracing::info!(retrieved = total, unique = unique.len(), "Retrieved passages");
                unique
            }
            Err(e) => {
                tracing::error!(error = %e, "Retrieval failed, returning terminal answer");
                return PipelineAnswer::terminal();
            }
        };

        let context = self.build_context(&passages);

        let (answer, follow_up_questions, tier, remembered) =
            match self.structured_tier(question, tone, &context, memory).await {
                Ok(result) => result,
                Err(structured_error) => {
                    tracing::warn!(error = %structured_error, "Structured tier failed, using simple fallback");
                    match self.simple_tier(question, tone, &context, &passages).await {
                        Ok(result) => result,
                        Err(simple_error) => {
                            tracing::error!(error = %simple_error, "Simple fallback failed, returning terminal answer");
                            return PipelineAnswer::terminal();
                        }
                    }
                }
            };

        memory.append(Role::User, question);
        memory.append(Role::Assistant, remembered.clone());
        memory.trim();

        PipelineAnswer {
            answer,
            passages,
            follow_up_questions,
            tier,
            remembered: Some(remembered),
        }
    }

    /// `[Page N]: text` blocks for the first passages, each truncated.
    fn build_context(&self, passages: &[RetrievedPassage]) -> String {
        passages
            .iter()
            .take(self.settings.max_context_passages)
            .map(|p| {
                let text: String = p
                    .text
                    .graphemes(true)
                    .take(self.settings.max_passage_chars)
                    .collect();
                format!("[Page {}]: {}", p.page_label(), text)
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    async fn structured_tier(
        &self,
        question: &str,
        tone: Tone,
        context: &str,
        memory: &MemoryWindow,
    ) -> AppResult<(String, Vec<String>, AnswerTier, String)> {
        let prompt =
            build_structured_prompt(&self.prompts, tone, question, context, &memory.render_history())?;
        let raw = self.generate(&prompt).await?;

        let outcome = parse_outcome(&raw);
        let kind = outcome.kind();
        let confidence = outcome.confidence();
        tracing::info!(outcome = %kind, confidence, "Parsed structured response");

        let parsed = outcome.into_answer();
        let rendered = render(&parsed, &self.terms);

        Ok((
            rendered,
            parsed.follow_up_questions,
            AnswerTier::Structured { kind, confidence },
            parsed.answer,
        ))
    }

    async fn simple_tier(
        &self,
        question: &str,
        tone: Tone,
        context: &str,
        passages: &[RetrievedPassage],
    ) -> AppResult<(String, Vec<String>, AnswerTier, String)> {
        tracing::info!("Using simple fallback without memory");

        let prompt = build_simple_prompt(&self.prompts, tone, question, context)?;
        let raw = self.generate(&prompt).await?;

        let text = dedupe_page_citations(raw.trim());
        if text.trim().is_empty() {
            return Err(AppError::Llm("Model returned an empty answer".to_string()));
        }

        let labels: Vec<String> = passages
            .iter()
            .take(SIMPLE_CITATION_PASSAGES)
            .map(RetrievedPassage::page_label)
            .collect();
        let rendered = render_plain(&text, &labels, &self.terms);

        Ok((
            rendered,
            SIMPLE_FOLLOW_UPS.iter().map(|s| s.to_string()).collect(),
            AnswerTier::Simple,
            text,
        ))
    }

    async fn generate(&self, prompt: &BuiltPrompt) -> AppResult<String> {
        let request = LlmRequest::new(prompt.user.clone(), self.settings.model.clone())
            .with_system(prompt.system.clone())
            .with_temperature(self.settings.temperature)
            .with_max_tokens(self.settings.max_tokens);

        let response = self.client.complete(&request).await?;
        tracing::debug!(
            provider = self.client.provider_name(),
            chars = response.content.len(),
            tokens = response.usage.total_tokens,
            "Model responded"
        );
        Ok(response.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_config() {
        let config = AppConfig::default();
        let settings = PipelineSettings::from_config(&config);
        assert_eq!(settings.max_context_passages, 4);
        assert_eq!(settings.max_passage_chars, 600);
        assert_eq!(settings.max_sources, 5);
        assert!(settings.extra_terms.contains(&"pledge".to_string()));
    }

    #[test]
    fn test_answer_tier_serialization() {
        let tier = AnswerTier::Structured {
            kind: OutcomeKind::Reconstructed,
            confidence: 0.6,
        };
        let json = serde_json::to_value(tier).unwrap();
        assert_eq!(json["tier"], "structured");
        assert_eq!(json["kind"], "reconstructed");
        assert_eq!(
            serde_json::to_value(AnswerTier::Terminal).unwrap()["tier"],
            "terminal"
        );
    }

    #[test]
    fn test_terminal_answer_shape() {
        let answer = PipelineAnswer::terminal();
        assert!(answer.passages.is_empty());
        assert_eq!(answer.follow_up_questions.len(), 1);
        assert!(answer.citations().is_empty());
    }
}
