//! Parse command handler.
//!
//! Runs saved model output through extraction, validation and rendering
//! without calling a model.

use clap::Args;
use docqa_core::{config::AppConfig, AppResult};
use docqa_rag::{parse_outcome, render, DomainTerms, ParseOutcome};
use std::io::Read;
use std::path::PathBuf;

/// Parse and render saved model output
#[derive(Args, Debug)]
pub struct ParseCommand {
    /// File holding the raw model output (default: stdin)
    pub file: Option<PathBuf>,

    /// Output the parsed answer as JSON
    #[arg(long)]
    pub json: bool,
}

impl ParseCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing parse command");

        let raw = match &self.file {
            Some(path) => std::fs::read_to_string(path)?,
            None => {
                let mut buffer = String::new();
                std::io::stdin().read_to_string(&mut buffer)?;
                buffer
            }
        };

        let terms = DomainTerms::new(&config.rendering.extra_terms);
        let (output, summary) = describe(&raw, &terms, self.json)?;

        eprintln!("{}", summary);
        println!("{}", output);
        Ok(())
    }
}

/// Rendered output and a one-line outcome summary for `raw`.
fn describe(raw: &str, terms: &DomainTerms, json: bool) -> AppResult<(String, String)> {
    let outcome: ParseOutcome = parse_outcome(raw);
    let kind = outcome.kind();
    let confidence = outcome.confidence();
    let summary = format!("Outcome: {} (confidence {:.2})", kind, confidence);

    let answer = outcome.into_answer();
    let output = if json {
        serde_json::to_string_pretty(&serde_json::json!({
            "outcome": kind,
            "confidence": confidence,
            "answer": answer,
        }))?
    } else {
        render(&answer, terms)
    };

    Ok((output, summary))
}
