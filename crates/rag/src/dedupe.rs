//! Passage deduplication.
//!
//! Passages are keyed by `source::page::chunk`, where `chunk` is the
//! retriever's chunk identifier or, failing that, a hash of the page label
//! and a normalised content prefix. Input order is kept; the first passage
//! with a given signature wins.

use crate::types::RetrievedPassage;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Default cap on deduplicated passages.
pub const DEFAULT_MAX_SOURCES: usize = 5;

/// Characters of normalised content that feed the content hash.
const CONTENT_KEY_CHARS: usize = 256;

/// Collapse passages to at most `max_results` unique passages, in input order.
pub fn dedupe<I>(passages: I, max_results: usize) -> Vec<RetrievedPassage>
where
    I: IntoIterator<Item = RetrievedPassage>,
{
    let mut seen = HashSet::new();
    let mut unique = Vec::new();

    if max_results == 0 {
        return unique;
    }

    for passage in passages {
        if !seen.insert(signature(&passage)) {
            continue;
        }
        unique.push(passage);
        if unique.len() >= max_results {
            break;
        }
    }

    unique
}

/// Deduplication signature of a passage.
pub fn signature(passage: &RetrievedPassage) -> String {
    let page = passage.page_label();
    let chunk = match passage.chunk_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => content_hash(&page, &passage.text),
    };
    format!("{}::{}::{}", passage.source, page, chunk)
}

/// Whitespace-collapsed, lowercased prefix of the passage text.
fn content_key(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(CONTENT_KEY_CHARS)
        .collect::<String>()
        .to_lowercase()
}

fn content_hash(page: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(page.as_bytes());
    hasher.update([0u8]);
    hasher.update(content_key(text).as_bytes());
    hasher
        .finalize()
        .iter()
        .take(12)
        .map(|b| format!("{:02x}", b))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(text: &str, page: Option<u32>) -> RetrievedPassage {
        RetrievedPassage::new(text, "standards.pdf", page)
    }

    #[test]
    fn test_empty_input() {
        assert!(dedupe(Vec::new(), 5).is_empty());
    }

    #[test]
    fn test_whitespace_and_case_variants_collapse() {
        let passages = vec![
            passage("Riba is  prohibited\nin all forms.", Some(3)),
            passage("riba is prohibited in ALL forms.", Some(3)),
            passage("Riba is prohibited in all forms.", Some(4)),
        ];

        let unique = dedupe(passages, 5);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].text, "Riba is  prohibited\nin all forms.");
        assert_eq!(unique[1].page, Some(4));
    }

    #[test]
    fn test_chunk_id_takes_precedence() {
        let passages = vec![
            passage("first text", Some(1)).with_chunk_id("c1"),
            passage("different text", Some(1)).with_chunk_id("c1"),
            passage("first text", Some(1)).with_chunk_id("c2"),
        ];

        let unique = dedupe(passages, 5);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[1].chunk_id.as_deref(), Some("c2"));
    }

    #[test]
    fn test_blank_chunk_id_falls_back_to_content() {
        let a = passage("same", Some(2)).with_chunk_id("  ");
        let b = passage("same", Some(2));
        assert_eq!(signature(&a), signature(&b));
    }

    #[test]
    fn test_source_distinguishes_passages() {
        let a = passage("same", Some(2));
        let mut b = a.clone();
        b.source = "other.pdf".to_string();
        assert_eq!(dedupe(vec![a, b], 5).len(), 2);
    }

    #[test]
    fn test_cap_and_order() {
        let passages: Vec<_> = (0..10)
            .map(|i| passage(&format!("passage {}", i % 7), Some(i % 7)))
            .collect();

        let unique = dedupe(passages, 5);
        assert_eq!(unique.len(), 5);
        let pages: Vec<_> = unique.iter().filter_map(|p| p.page).collect();
        assert_eq!(pages, vec![0, 1, 2, 3, 4]);

        assert!(dedupe(vec![passage("x", None)], 0).is_empty());
    }

    #[test]
    fn test_output_signatures_unique_for_many_inputs() {
        for max in 1..8 {
            let passages: Vec<_> = (0..20)
                .map(|i| passage(&format!("text {}", i % 4), Some((i % 3) as u32)))
                .collect();
            let unique = dedupe(passages, max);
            assert!(unique.len() <= max);

            let signatures: HashSet<_> = unique.iter().map(signature).collect();
            assert_eq!(signatures.len(), unique.len());
        }
    }
}
