//! Schema validation and partial reconstruction of structured answers.
//!
//! [`parse_to_answer`] is strict. [`parse_outcome`] is total: it always
//! produces a [`ParseOutcome`] that can be turned into a valid
//! [`StructuredAnswer`], recording how much of the model output survived.

use crate::extract::{extract, JsonObject};
use crate::types::{StructuredAnswer, MIN_ANSWER_CHARS};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Confidence given to prose salvaged verbatim as the answer.
pub const FREE_TEXT_CONFIDENCE: f64 = 0.6;

/// Confidence used when a reconstructed object carries no usable score.
pub const RECONSTRUCTED_DEFAULT_CONFIDENCE: f64 = 0.5;

const INCOMPLETE_ANSWER: &str = "I found relevant information in the standards, but the response \
structure was incomplete. Please try rephrasing your question for better results.";

const DEFAULT_SUMMARY: [&str; 3] = [
    "Information extracted from standards",
    "Partial response available",
    "See details below",
];
const DEFAULT_CHECKLIST: [&str; 3] = [
    "Review extracted information",
    "Verify with original standards",
    "Consult with Sharia expert",
];
const DEFAULT_PITFALLS: [&str; 2] = ["Response may be incomplete", "Verify critical details"];
const DEFAULT_FOLLOW_UPS: [&str; 2] = [
    "What specific details do you need?",
    "Which aspect should I clarify?",
];

/// Why parsing ended in a canned answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalReason {
    /// No object could be extracted and the text was not usable prose
    Unparseable,
    /// An object was extracted but could not be coerced into a valid answer
    ReconstructionInvalid,
}

impl TerminalReason {
    /// Confidence score carried by the canned answer.
    pub fn confidence(&self) -> f64 {
        match self {
            Self::Unparseable => 0.1,
            Self::ReconstructionInvalid => 0.0,
        }
    }

    /// The canned answer for this reason.
    pub fn answer(&self) -> StructuredAnswer {
        let (summary, checklist, pitfalls, answer, follow_ups): (
            &[&str],
            &[&str],
            &[&str],
            &str,
            &[&str],
        ) = match self {
            Self::Unparseable => (
                &[
                    "Unable to parse structured response",
                    "Please try rephrasing your question",
                    "The system encountered a formatting error",
                ],
                &[
                    "Review the question for clarity",
                    "Ensure the query relates to the indexed standards",
                    "Try a more specific question",
                ],
                &[
                    "Response parsing failed",
                    "Unable to extract structured information",
                ],
                "I encountered a formatting error while processing your question. Please try \
                 rephrasing your question or asking about a specific aspect of the standards.",
                &[
                    "Could you rephrase your question?",
                    "What specific aspect are you interested in?",
                ],
            ),
            Self::ReconstructionInvalid => (
                &[
                    "Response parsing failed",
                    "Partial data unavailable",
                    "Please try again",
                ],
                &[
                    "Retry the query",
                    "Simplify the question",
                    "Contact support",
                ],
                &["Data extraction failed", "System error occurred"],
                "I encountered an error while processing your question. The response data could \
                 not be properly formatted. Please try asking your question in a different way, \
                 or contact support if the issue persists.",
                &[
                    "Can you try a different question?",
                    "What information do you need?",
                ],
            ),
        };

        StructuredAnswer {
            executive_summary: to_strings(summary),
            requirements_by_page: Vec::new(),
            implementation_checklist: to_strings(checklist),
            pitfalls: to_strings(pitfalls),
            definitions: Vec::new(),
            answer: answer.to_string(),
            sources: Vec::new(),
            follow_up_questions: to_strings(follow_ups),
            confidence_score: self.confidence(),
        }
    }
}

/// Coarse classification of a parse result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Valid,
    Reconstructed,
    Terminal,
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Valid => "valid",
            Self::Reconstructed => "reconstructed",
            Self::Terminal => "terminal",
        })
    }
}

/// Result of parsing model output.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    /// Strict schema validation succeeded
    Valid(StructuredAnswer),
    /// Fields were salvaged; the answer carries the stated confidence
    Reconstructed(StructuredAnswer, f64),
    /// Nothing usable; a canned answer stands in
    Terminal(TerminalReason),
}

impl ParseOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Valid(_) => OutcomeKind::Valid,
            Self::Reconstructed(..) => OutcomeKind::Reconstructed,
            Self::Terminal(_) => OutcomeKind::Terminal,
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            Self::Valid(answer) => answer.confidence_score,
            Self::Reconstructed(_, confidence) => *confidence,
            Self::Terminal(reason) => reason.confidence(),
        }
    }

    /// Materialise the always-valid answer.
    pub fn into_answer(self) -> StructuredAnswer {
        match self {
            Self::Valid(answer) | Self::Reconstructed(answer, _) => answer,
            Self::Terminal(reason) => reason.answer(),
        }
    }
}

/// Strict parse: extraction must yield an object that validates fully.
pub fn parse_to_answer(text: &str) -> Option<StructuredAnswer> {
    let object = extract(text)?;
    validate_strict(object)
}

/// Total parse; never fails.
pub fn parse_with_fallback(text: &str) -> StructuredAnswer {
    parse_outcome(text).into_answer()
}

/// Classify model output into a [`ParseOutcome`].
pub fn parse_outcome(text: &str) -> ParseOutcome {
    let Some(object) = extract(text) else {
        return salvage_text(text);
    };

    if let Some(answer) = validate_strict(object.clone()) {
        return ParseOutcome::Valid(answer);
    }

    tracing::info!("Model output failed schema validation, reconstructing");
    let answer = reconstruct(&object);
    match answer.check(1) {
        Ok(()) => {
            let confidence = answer.confidence_score;
            ParseOutcome::Reconstructed(answer, confidence)
        }
        Err(reason) => {
            tracing::warn!(%reason, "Reconstructed answer is invalid");
            ParseOutcome::Terminal(TerminalReason::ReconstructionInvalid)
        }
    }
}

fn validate_strict(object: JsonObject) -> Option<StructuredAnswer> {
    let answer: StructuredAnswer = match serde_json::from_value(Value::Object(object)) {
        Ok(answer) => answer,
        Err(e) => {
            tracing::debug!(error = %e, "Extracted object does not match the answer schema");
            return None;
        }
    };

    match answer.check(MIN_ANSWER_CHARS) {
        Ok(()) => Some(answer),
        Err(reason) => {
            tracing::debug!(%reason, "Extracted answer failed validation");
            None
        }
    }
}

fn salvage_text(text: &str) -> ParseOutcome {
    let trimmed = text.trim();
    if trimmed.chars().count() > MIN_ANSWER_CHARS && !trimmed.starts_with('{') {
        tracing::warn!("No JSON in model output, using raw text as the answer");
        return ParseOutcome::Reconstructed(
            StructuredAnswer::from_text(trimmed, FREE_TEXT_CONFIDENCE),
            FREE_TEXT_CONFIDENCE,
        );
    }

    let preview: String = trimmed.chars().take(200).collect();
    tracing::error!(%preview, "Model output is neither JSON nor usable text");
    ParseOutcome::Terminal(TerminalReason::Unparseable)
}

/// Coerce every field of an extracted object into schema shape.
fn reconstruct(object: &JsonObject) -> StructuredAnswer {
    let answer = match object.get("answer").and_then(Value::as_str) {
        Some(text) if text.trim().chars().count() >= MIN_ANSWER_CHARS => text.to_string(),
        _ => synthesize_answer(object),
    };

    StructuredAnswer {
        executive_summary: coerce_list(object.get("executive_summary"), 3, &DEFAULT_SUMMARY),
        requirements_by_page: coerce_requirements(object.get("requirements_by_page")),
        implementation_checklist: coerce_list(
            object.get("implementation_checklist"),
            3,
            &DEFAULT_CHECKLIST,
        ),
        pitfalls: coerce_list(object.get("pitfalls"), 2, &DEFAULT_PITFALLS),
        definitions: coerce_definitions(object.get("definitions")),
        answer,
        sources: coerce_list(object.get("sources"), 0, &[]),
        follow_up_questions: coerce_list(object.get("follow_up_questions"), 2, &DEFAULT_FOLLOW_UPS),
        confidence_score: coerce_confidence(object.get("confidence_score")),
    }
}

/// Build a readable answer from summary, requirements and checklist.
fn synthesize_answer(object: &JsonObject) -> String {
    let mut parts = Vec::new();

    let summary = items(object.get("executive_summary"));
    if !summary.is_empty() {
        parts.push("**Key Points:**".to_string());
        parts.extend(summary.iter().map(|point| format!("- {}", point)));
    }

    if let Some(Value::Object(pages)) = object.get("requirements_by_page") {
        if !pages.is_empty() {
            parts.push("\n**Requirements:**".to_string());
            for (page, requirements) in pages.iter().filter(|(page, _)| !page.trim().is_empty()) {
                parts.extend(
                    items(Some(requirements))
                        .iter()
                        .map(|req| format!("- {} (Page {})", req, page)),
                );
            }
        }
    }

    let checklist = items(object.get("implementation_checklist"));
    if !checklist.is_empty() {
        parts.push("\n**Implementation Steps:**".to_string());
        parts.extend(
            checklist
                .iter()
                .enumerate()
                .map(|(i, step)| format!("{}. {}", i + 1, step)),
        );
    }

    if parts.is_empty() {
        INCOMPLETE_ANSWER.to_string()
    } else {
        parts.join("\n")
    }
}

/// Non-empty items of an array value, stringified. Non-arrays yield nothing.
fn items(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(values)) => values.iter().filter_map(stringify).collect(),
        _ => Vec::new(),
    }
}

/// Coerce to a list of strings, padding from `defaults` up to `min_items`.
///
/// A value that is not an array is replaced by the full default list.
fn coerce_list(value: Option<&Value>, min_items: usize, defaults: &[&str]) -> Vec<String> {
    if !matches!(value, Some(Value::Array(_))) {
        return to_strings(defaults);
    }

    let mut list = items(value);
    if list.len() < min_items {
        let pad_end = min_items.min(defaults.len());
        if list.len() < pad_end {
            list.extend(to_strings(&defaults[list.len()..pad_end]));
        }
    }
    list
}

fn coerce_requirements(value: Option<&Value>) -> Vec<(String, Vec<String>)> {
    let Some(Value::Object(pages)) = value else {
        return Vec::new();
    };

    pages
        .iter()
        .filter(|(page, _)| !page.trim().is_empty())
        .filter_map(|(page, reqs)| {
            let list = match reqs {
                Value::Array(_) => items(Some(reqs)),
                other => stringify(other).into_iter().collect(),
            };
            (!list.is_empty()).then(|| (page.clone(), list))
        })
        .collect()
}

fn coerce_definitions(value: Option<&Value>) -> Vec<(String, String)> {
    let Some(Value::Object(terms)) = value else {
        return Vec::new();
    };

    terms
        .iter()
        .filter(|(term, _)| !term.trim().is_empty())
        .filter_map(|(term, definition)| stringify(definition).map(|d| (term.clone(), d)))
        .collect()
}

fn coerce_confidence(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(RECONSTRUCTED_DEFAULT_CONFIDENCE),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .unwrap_or(RECONSTRUCTED_DEFAULT_CONFIDENCE),
        _ => RECONSTRUCTED_DEFAULT_CONFIDENCE,
    }
}

/// String form of a truthy value; `None` for null, false, zero and empties.
fn stringify(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::Array(a) if a.is_empty() => None,
        Value::Object(o) if o.is_empty() => None,
        other => Some(other.to_string()),
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
