//! Passage retrieval.
//!
//! The pipeline only depends on the [`Retriever`] trait. [`JsonlRetriever`]
//! is a local implementation over a JSON-lines passage file, ranked by
//! query term overlap.

use crate::types::RetrievedPassage;
use async_trait::async_trait;
use docqa_core::{AppError, AppResult};
use std::collections::HashSet;
use std::path::Path;
use unicode_segmentation::UnicodeSegmentation;

/// Source of ranked passages for a query.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Passages for `query`, most relevant first.
    async fn retrieve(&self, query: &str) -> AppResult<Vec<RetrievedPassage>>;
}

const STOP_WORDS: &[&str] = &[
    "a", "about", "an", "and", "are", "as", "at", "be", "by", "can", "do", "does", "for", "from",
    "how", "i", "in", "is", "it", "me", "of", "on", "or", "tell", "that", "the", "this", "to",
    "what", "when", "where", "which", "who", "why", "with", "you",
];

/// Retriever over passages loaded from a JSON-lines file.
///
/// Each non-blank line is an object with `text` and optional `source`,
/// `page` and `chunk_id` fields.
#[derive(Debug, Clone)]
pub struct JsonlRetriever {
    passages: Vec<IndexedPassage>,
    top_k: usize,
}

#[derive(Debug, Clone)]
struct IndexedPassage {
    passage: RetrievedPassage,
    terms: HashSet<String>,
    tokens: Vec<String>,
}

impl JsonlRetriever {
    /// Load passages from `path`.
    pub fn load(path: &Path, top_k: usize) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Retrieval(format!("Failed to read passages file {:?}: {}", path, e))
        })?;

        let mut passages = Vec::new();
        for (index, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let passage: RetrievedPassage = serde_json::from_str(line).map_err(|e| {
                AppError::Retrieval(format!(
                    "Invalid passage on line {} of {:?}: {}",
                    index + 1,
                    path,
                    e
                ))
            })?;
            passages.push(passage);
        }

        tracing::info!(count = passages.len(), path = ?path, "Loaded passages");
        Ok(Self::from_passages(passages, top_k))
    }

    /// Build a retriever over in-memory passages.
    pub fn from_passages(passages: Vec<RetrievedPassage>, top_k: usize) -> Self {
        let passages = passages
            .into_iter()
            .map(|passage| {
                let tokens = tokenize(&passage.text);
                IndexedPassage {
                    terms: tokens.iter().cloned().collect(),
                    tokens,
                    passage,
                }
            })
            .collect();

        Self { passages, top_k }
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    fn rank(&self, query: &str) -> Vec<RetrievedPassage> {
        let query_terms: HashSet<String> = tokenize(query).into_iter().collect();
        if query_terms.is_empty() || self.top_k == 0 {
            return Vec::new();
        }

        let mut scored: Vec<(f32, usize, usize)> = self
            .passages
            .iter()
            .enumerate()
            .filter_map(|(position, indexed)| {
                let matched = query_terms.intersection(&indexed.terms).count();
                if matched == 0 {
                    return None;
                }
                let occurrences = indexed
                    .tokens
                    .iter()
                    .filter(|t| query_terms.contains(*t))
                    .count();
                let score = matched as f32 / query_terms.len() as f32;
                Some((score, occurrences, position))
            })
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.1.cmp(&a.1))
                .then(a.2.cmp(&b.2))
        });

        scored
            .into_iter()
            .take(self.top_k)
            .map(|(score, _, position)| self.passages[position].passage.clone().with_score(score))
            .collect()
    }
}

#[async_trait]
impl Retriever for JsonlRetriever {
    async fn retrieve(&self, query: &str) -> AppResult<Vec<RetrievedPassage>> {
        let results = self.rank(query);
        tracing::debug!(query, results = results.len(), "Retrieved passages");
        Ok(results)
    }
}

/// Lowercased words with stop words and single characters removed.
fn tokenize(text: &str) -> Vec<String> {
    text.unicode_words()
        .map(str::to_lowercase)
        .filter(|w| w.chars().count() > 1 && !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn corpus() -> Vec<RetrievedPassage> {
        vec![
            RetrievedPassage::new("Murabaha requires the seller to own the asset.", "fas.pdf", Some(3)),
            RetrievedPassage::new("Riba is prohibited in all its forms.", "fas.pdf", Some(7)),
            RetrievedPassage::new(
                "In murabaha the cost and profit of the asset are disclosed; murabaha is common.",
                "fas.pdf",
                Some(4),
            ),
        ]
    }

    #[test]
    fn test_tokenize_drops_stop_words() {
        assert_eq!(
            tokenize("What is the Murabaha of a sale?"),
            vec!["murabaha", "sale"]
        );
    }

    #[tokio::test]
    async fn test_ranking_and_scores() {
        let retriever = JsonlRetriever::from_passages(corpus(), 10);
        let results = retriever.retrieve("murabaha asset profit").await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].page, Some(4));
        assert_eq!(results[0].relevance_score, 1.0);
        assert_eq!(results[1].page, Some(3));
        assert!(results[1].relevance_score > 0.0 && results[1].relevance_score < 1.0);
    }

    #[tokio::test]
    async fn test_top_k_and_no_match() {
        let retriever = JsonlRetriever::from_passages(corpus(), 1);
        assert_eq!(retriever.retrieve("murabaha").await.unwrap().len(), 1);
        assert!(retriever.retrieve("zakat").await.unwrap().is_empty());
        assert!(retriever.retrieve("what is the").await.unwrap().is_empty());
    }

    #[test]
    fn test_load_jsonl() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("passages.jsonl");
        fs::write(
            &path,
            "{\"text\":\"Riba is prohibited.\",\"source\":\"fas.pdf\",\"page\":7,\"chunk_id\":\"c7\"}\n\n{\"text\":\"No page here.\"}\n",
        )
        .unwrap();

        let retriever = JsonlRetriever::load(&path, 5).unwrap();
        assert_eq!(retriever.len(), 2);
    }

    #[test]
    fn test_load_reports_bad_line() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("passages.jsonl");
        fs::write(&path, "{\"text\":\"ok\"}\nnot json\n").unwrap();

        match JsonlRetriever::load(&path, 5) {
            Err(AppError::Retrieval(msg)) => assert!(msg.contains("line 2")),
            other => panic!("Expected retrieval error, got {:?}", other.map(|r| r.len())),
        }
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = JsonlRetriever::load(&temp_dir.path().join("missing.jsonl"), 5);
        assert!(matches!(result, Err(AppError::Retrieval(_))));
    }
}
