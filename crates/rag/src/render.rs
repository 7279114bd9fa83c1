//! Markdown rendering of answers.

use crate::types::StructuredAnswer;
use regex::Regex;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Domain vocabulary that is always emphasised.
pub const BASE_TERMS: &[&str] = &[
    "shariah",
    "shari'ah",
    "sharia",
    "fiqh",
    "fatwa",
    "aaoifi",
    "riba",
    "gharar",
    "maysir",
    "murabaha",
    "mudarabah",
    "musharakah",
    "ijarah",
    "tawarruq",
    "wakalah",
    "sukuk",
    "guarantee",
    "pledge",
    "contract",
    "resolution",
    "supervisory board",
    "shariah board",
    "sharia board",
    "enforceable",
    "prohibition",
    "monitoring",
    "reporting",
    "governance",
    "compliance",
    "islamic",
    "halal",
    "haram",
    "makruh",
    "mandub",
    "mubah",
    "qard",
    "salam",
    "istisna",
    "kafalah",
    "hawalah",
    "profit",
    "loss",
    "partnership",
    "transaction",
    "investment",
    "zakat",
    "sadaqah",
    "waqf",
    "qirad",
    "muzara'ah",
    "musaqah",
    "mudharib",
    "rab al-mal",
    "mudarib",
];

static PAGE_CITATION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\[Page\s+([\d.]+)\]").ok());

static SOURCES_SECTION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)\n\n\*\*Sources:\*\*.*$").ok());

/// Compiled emphasis vocabulary.
#[derive(Debug, Clone)]
pub struct DomainTerms {
    terms: Vec<String>,
    pattern: Option<Regex>,
}

impl Default for DomainTerms {
    fn default() -> Self {
        Self::new(std::iter::empty::<&str>())
    }
}

impl DomainTerms {
    /// Base vocabulary plus `extra` terms (case-insensitive).
    pub fn new<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut terms: Vec<String> = BASE_TERMS
            .iter()
            .map(|t| t.to_string())
            .chain(extra.into_iter().map(|t| t.as_ref().trim().to_lowercase()))
            .filter(|t| !t.is_empty() && seen.insert(t.clone()))
            .collect();

        // Longest first so multi-word terms win over their parts
        terms.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));

        let alternation = terms
            .iter()
            .map(|t| regex::escape(t))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = match Regex::new(&format!(r"(?i)\b(?:{})\b", alternation)) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to compile domain term pattern");
                None
            }
        };

        Self { terms, pattern }
    }

    /// Terms, longest first.
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Wrap whole-word term matches in `**`, leaving emphasised text alone.
    pub fn emphasize(&self, text: &str) -> String {
        let Some(pattern) = &self.pattern else {
            return text.to_string();
        };

        let mut out = String::with_capacity(text.len() + 16);
        let mut last = 0;

        for m in pattern.find_iter(text) {
            let before = &text[..m.start()];
            let inside_bold = before.matches("**").count() % 2 == 1;
            if inside_bold || before.ends_with("**") {
                continue;
            }
            out.push_str(&text[last..m.start()]);
            out.push_str("**");
            out.push_str(m.as_str());
            out.push_str("**");
            last = m.end();
        }

        out.push_str(&text[last..]);
        out
    }
}

/// Render a structured answer. Empty fields produce no section.
pub fn render(answer: &StructuredAnswer, terms: &DomainTerms) -> String {
    let mut lines: Vec<String> = Vec::new();

    if !answer.answer.is_empty() {
        lines.push(terms.emphasize(&answer.answer));
        lines.push(String::new());
    }

    if !answer.executive_summary.is_empty() {
        lines.push("### Key Points".to_string());
        for point in &answer.executive_summary {
            lines.push(format!("- {}", terms.emphasize(point)));
        }
        lines.push(String::new());
    }

    if !answer.requirements_by_page.is_empty() {
        lines.push("### Requirements".to_string());
        for (page, requirements) in pages_in_order(&answer.requirements_by_page) {
            for requirement in requirements {
                lines.push(format!(
                    "- {} *(Page {})*",
                    terms.emphasize(requirement),
                    page
                ));
            }
        }
        lines.push(String::new());
    }

    if !answer.implementation_checklist.is_empty() {
        lines.push("### Implementation Steps".to_string());
        for (i, step) in answer.implementation_checklist.iter().enumerate() {
            lines.push(format!("{}. {}", i + 1, terms.emphasize(step)));
        }
        lines.push(String::new());
    }

    if !answer.pitfalls.is_empty() {
        lines.push("### Important Considerations".to_string());
        for pitfall in &answer.pitfalls {
            lines.push(format!("- {}", terms.emphasize(pitfall)));
        }
        lines.push(String::new());
    }

    if !answer.definitions.is_empty() {
        lines.push("### Key Terms".to_string());
        for (term, definition) in &answer.definitions {
            lines.push(format!("**{}**: {}", term, terms.emphasize(definition)));
        }
        lines.push(String::new());
    }

    let pages = unique_in_order(answer.sources.iter().map(String::as_str));
    if !pages.is_empty() {
        let refs: Vec<String> = pages.iter().map(|p| format!("Page {}", p)).collect();
        lines.push(format!("*References: {}*", refs.join(", ")));
        lines.push(String::new());
    }

    if !answer.follow_up_questions.is_empty() {
        lines.push("---".to_string());
        lines.push("**Related questions you might ask:**".to_string());
        for question in &answer.follow_up_questions {
            lines.push(format!("- {}", question));
        }
    }

    lines.join("\n").trim_end().to_string()
}

/// Render unstructured model text, adding page citations to numbered items.
///
/// Each numbered line without a `[Page N]` citation receives the next
/// unused label from `page_labels`; once labels run out, lines are left
/// as they are. A trailing `**Sources:**` section is dropped.
pub fn render_plain(text: &str, page_labels: &[String], terms: &DomainTerms) -> String {
    let emphasized = terms.emphasize(text);
    let body = match SOURCES_SECTION.as_ref() {
        Some(re) => re.replace(&emphasized, "").into_owned(),
        None => emphasized,
    };

    let mut labels = unique_in_order(page_labels.iter().map(String::as_str)).into_iter();

    body.split('\n')
        .map(|line| {
            if !is_numbered_item(line) || has_page_citation(line) {
                return line.to_string();
            }
            match labels.next() {
                Some(page) => format!("{} [Page {}]", line, page),
                None => line.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Keep only the first `[Page X]` citation for each page.
pub fn dedupe_page_citations(text: &str) -> String {
    let Some(pattern) = PAGE_CITATION.as_ref() else {
        return text.to_string();
    };

    let mut seen = HashSet::new();
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for caps in pattern.captures_iter(text) {
        let (Some(whole), Some(page)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        out.push_str(&text[last..whole.start()]);
        if seen.insert(page.as_str().to_string()) {
            out.push_str(whole.as_str());
        }
        last = whole.end();
    }

    out.push_str(&text[last..]);
    out
}

/// Numeric labels first in numeric order, then the rest in encounter order.
fn pages_in_order(pages: &[(String, Vec<String>)]) -> Vec<&(String, Vec<String>)> {
    let mut ordered: Vec<_> = pages.iter().collect();
    ordered.sort_by(|(a, _), (b, _)| match (numeric_label(a), numeric_label(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    ordered
}

fn numeric_label(label: &str) -> Option<f64> {
    label.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

fn unique_in_order<'a>(items: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = HashSet::new();
    items.filter(|item| seen.insert(*item)).collect()
}

fn is_numbered_item(line: &str) -> bool {
    let trimmed = line.trim_start();
    let digits = trimmed.chars().take_while(char::is_ascii_digit).count();
    digits > 0 && trimmed[digits..].starts_with('.')
}

fn has_page_citation(line: &str) -> bool {
    PAGE_CITATION
        .as_ref()
        .map(|re| re.is_match(line))
        .unwrap_or(false)
}
