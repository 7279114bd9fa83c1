//! End-to-end behaviour of the answer pipeline across its tiers.

use super::doubles::{ScriptedClient, StaticRetriever};
use crate::memory::{MemoryWindow, Role, WindowSize};
use crate::pipeline::{AnswerPipeline, AnswerTier, PipelineSettings};
use crate::reconstruct::OutcomeKind;
use crate::types::RetrievedPassage;
use docqa_core::AppError;
use docqa_prompt::{PromptLibrary, Tone};
use std::sync::Arc;

const STRUCTURED_REPLY: &str = r#"Here is the answer:
```json
{
  "answer": "A murabaha sale requires the seller to own the asset before selling it on.",
  "executive_summary": ["Ownership comes first"],
  "requirements_by_page": {
    "12": ["Take possession"],
    "Annex": ["Disclose cost"],
    "3": ["Own the asset"]
  },
  "implementation_checklist": ["Buy the asset", "Sell it on"],
  "pitfalls": ["Selling before owning"],
  "definitions": {"Murabaha": "Cost-plus sale"},
  "follow_up_questions": ["How is the profit disclosed?"],
  "sources": ["3", "12"],
  "confidence_score": 0.9
}
```"#;

fn passages(pages: std::ops::RangeInclusive<u32>) -> Vec<RetrievedPassage> {
    pages
        .map(|page| {
            RetrievedPassage::new(
                format!("Passage text for page {} about ownership.", page),
                "fas-8.pdf",
                Some(page),
            )
        })
        .collect()
}

fn pipeline(
    retriever: Arc<StaticRetriever>,
    client: Arc<ScriptedClient>,
    settings: PipelineSettings,
) -> AnswerPipeline {
    AnswerPipeline::new(retriever, client, PromptLibrary::default(), settings)
}

#[tokio::test]
async fn test_greeting_skips_retrieval_and_model() {
    let retriever = Arc::new(StaticRetriever::new(passages(1..=3)));
    let client = Arc::new(ScriptedClient::replying(&[STRUCTURED_REPLY]));
    let pipeline = pipeline(retriever.clone(), client.clone(), PipelineSettings::default());
    let mut memory = MemoryWindow::default();

    let answer = pipeline.answer("hello", Tone::Conversational, &mut memory).await;

    assert_eq!(answer.tier, AnswerTier::Greeting);
    assert_eq!(answer.remembered, None);
    assert_eq!(answer.follow_up_questions.len(), 4);
    assert!(answer.passages.is_empty());
    assert_eq!(retriever.calls(), 0);
    assert_eq!(client.calls(), 0);
    assert!(memory.history().is_empty());
}

#[tokio::test]
async fn test_structured_tier_renders_and_remembers() {
    let retriever = Arc::new(StaticRetriever::new(passages(3..=4)));
    let client = Arc::new(ScriptedClient::replying(&[STRUCTURED_REPLY]));
    let pipeline = pipeline(retriever, client.clone(), PipelineSettings::default());
    let mut memory = MemoryWindow::default();

    let answer = pipeline
        .answer("What does murabaha require?", Tone::Professional, &mut memory)
        .await;

    assert_eq!(
        answer.tier,
        AnswerTier::Structured {
            kind: OutcomeKind::Valid,
            confidence: 0.9
        }
    );
    assert!(answer.answer.starts_with("A **murabaha** sale requires"));
    assert!(answer.answer.contains("### Implementation Steps\n1. Buy the asset\n2. Sell it on"));
    assert!(answer.answer.contains("*References: Page 3, Page 12*"));
    assert_eq!(answer.follow_up_questions, vec!["How is the profit disclosed?"]);
    assert_eq!(answer.citations().len(), 2);

    let page_3 = answer.answer.find("Own the asset *(Page 3)*").unwrap();
    let page_12 = answer.answer.find("Take possession *(Page 12)*").unwrap();
    let annex = answer.answer.find("Disclose cost *(Page Annex)*").unwrap();
    assert!(page_3 < page_12 && page_12 < annex);

    let history = memory.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[0].content, "What does murabaha require?");
    assert_eq!(
        history[1].content,
        "A murabaha sale requires the seller to own the asset before selling it on."
    );
    assert_eq!(answer.remembered.as_deref(), Some(history[1].content.as_str()));

    let request = &client.requests()[0];
    let system = request.system.as_deref().unwrap();
    assert!(system.contains("requirements_by_page"));
    assert!(request.prompt.contains("[Page 3]: Passage text for page 3"));
    assert!(request.prompt.contains("(no previous conversation)"));
}

#[tokio::test]
async fn test_unknown_tone_uses_conversational_instructions() {
    let retriever = Arc::new(StaticRetriever::new(passages(3..=4)));
    let client = Arc::new(ScriptedClient::replying(&[STRUCTURED_REPLY]));
    let pipeline = pipeline(retriever, client.clone(), PipelineSettings::default());
    let mut memory = MemoryWindow::default();

    let tone = Tone::parse("poetic");
    assert_eq!(tone, Tone::Conversational);
    pipeline.answer("What does murabaha require?", tone, &mut memory).await;

    let system = client.requests()[0].system.clone().unwrap();
    assert!(system.starts_with("You are a friendly, knowledgeable expert on"));
    assert!(!system.contains("senior consultant"));
}

#[tokio::test]
async fn test_context_is_deduplicated_capped_and_truncated() {
    let mut found = passages(1..=7);
    found.insert(1, found[0].clone());
    let retriever = Arc::new(StaticRetriever::new(found));
    let client = Arc::new(ScriptedClient::replying(&[STRUCTURED_REPLY]));
    let settings = PipelineSettings {
        max_passage_chars: 12,
        ..PipelineSettings::default()
    };
    let pipeline = pipeline(retriever, client.clone(), settings);
    let mut memory = MemoryWindow::default();

    let answer = pipeline
        .answer("Explain the rules on asset ownership please", Tone::Concise, &mut memory)
        .await;

    let pages: Vec<Option<u32>> = answer.passages.iter().map(|p| p.page).collect();
    assert_eq!(pages, vec![Some(1), Some(2), Some(3), Some(4), Some(5)]);

    let prompt = &client.requests()[0].prompt;
    assert!(prompt.contains("[Page 1]: Passage text\n\n[Page 2]: Passage text"));
    assert!(prompt.contains("[Page 4]: "));
    assert!(!prompt.contains("[Page 5]: "));
    assert!(!prompt.contains("about ownership"));
}

#[tokio::test]
async fn test_prose_reply_is_reconstructed() {
    let retriever = Arc::new(StaticRetriever::new(passages(1..=2)));
    let client = Arc::new(ScriptedClient::replying(&[
        "The seller must own and possess the asset before the sale is concluded with the buyer.",
    ]));
    let pipeline = pipeline(retriever, client, PipelineSettings::default());
    let mut memory = MemoryWindow::default();

    let answer = pipeline
        .answer("Who must own the asset?", Tone::Simple, &mut memory)
        .await;

    assert_eq!(
        answer.tier,
        AnswerTier::Structured {
            kind: OutcomeKind::Reconstructed,
            confidence: 0.6
        }
    );
    assert!(answer.answer.starts_with("The seller must own and possess"));
}

#[tokio::test]
async fn test_empty_reply_is_terminal_outcome() {
    let retriever = Arc::new(StaticRetriever::new(passages(1..=2)));
    let client = Arc::new(ScriptedClient::replying(&[""]));
    let pipeline = pipeline(retriever, client.clone(), PipelineSettings::default());
    let mut memory = MemoryWindow::default();

    let answer = pipeline
        .answer("What is required for ownership?", Tone::Detailed, &mut memory)
        .await;

    assert_eq!(
        answer.tier,
        AnswerTier::Structured {
            kind: OutcomeKind::Terminal,
            confidence: 0.1
        }
    );
    assert_eq!(client.calls(), 1);
}

#[tokio::test]
async fn test_model_failure_falls_back_to_simple_tier() {
    let retriever = Arc::new(StaticRetriever::new(passages(3..=5)));
    let client = Arc::new(ScriptedClient::new(vec![
        Err(AppError::Llm("rate limited".to_string())),
        Ok("Ownership rules:\n1. Own the asset first\n2. Disclose cost [Page 9] and again [Page 9]\n3. Sell it on\n\n**Sources:**\n- page 3".to_string()),
    ]));
    let pipeline = pipeline(retriever, client.clone(), PipelineSettings::default());
    let mut memory = MemoryWindow::default();
    memory.append(Role::User, "earlier question");
    memory.append(Role::Assistant, "earlier answer");

    let answer = pipeline
        .answer("What are the ownership rules?", Tone::Conversational, &mut memory)
        .await;

    assert_eq!(answer.tier, AnswerTier::Simple);
    assert_eq!(answer.follow_up_questions.len(), 2);
    assert_eq!(answer.passages.len(), 3);
    assert_eq!(
        answer.answer,
        "Ownership rules:\n1. Own the asset first [Page 3]\n2. Disclose cost [Page 9] and again \n3. Sell it on [Page 4]"
    );

    let requests = client.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].prompt.contains("User: earlier question"));
    assert!(!requests[1].prompt.contains("earlier question"));
    assert!(requests[1].prompt.ends_with("Answer the question based on the context above."));

    assert_eq!(memory.history().len(), 4);
    assert!(memory.history()[3].content.starts_with("Ownership rules:"));
}

#[tokio::test]
async fn test_both_tiers_failing_returns_terminal() {
    let retriever = Arc::new(StaticRetriever::new(passages(1..=3)));
    let client = Arc::new(ScriptedClient::failing());
    let pipeline = pipeline(retriever, client.clone(), PipelineSettings::default());
    let mut memory = MemoryWindow::default();

    let answer = pipeline
        .answer("What about sukuk issuance?", Tone::Conversational, &mut memory)
        .await;

    assert_eq!(answer.tier, AnswerTier::Terminal);
    assert!(answer.passages.is_empty());
    assert_eq!(answer.follow_up_questions.len(), 1);
    assert_eq!(client.calls(), 2);
    assert!(memory.history().is_empty());
}

#[tokio::test]
async fn test_blank_simple_reply_returns_terminal() {
    let retriever = Arc::new(StaticRetriever::new(passages(1..=3)));
    let client = Arc::new(ScriptedClient::new(vec![
        Err(AppError::Llm("timeout".to_string())),
        Ok("   \n".to_string()),
    ]));
    let pipeline = pipeline(retriever, client, PipelineSettings::default());
    let mut memory = MemoryWindow::default();

    let answer = pipeline
        .answer("Describe the pledge rules", Tone::Conversational, &mut memory)
        .await;

    assert_eq!(answer.tier, AnswerTier::Terminal);
}

#[tokio::test]
async fn test_retrieval_failure_returns_terminal() {
    let retriever = Arc::new(StaticRetriever::failing());
    let client = Arc::new(ScriptedClient::replying(&[STRUCTURED_REPLY]));
    let pipeline = pipeline(retriever.clone(), client.clone(), PipelineSettings::default());
    let mut memory = MemoryWindow::default();

    let answer = pipeline
        .answer("What does murabaha require?", Tone::Conversational, &mut memory)
        .await;

    assert_eq!(answer.tier, AnswerTier::Terminal);
    assert_eq!(retriever.calls(), 1);
    assert_eq!(client.calls(), 0);
}

#[tokio::test]
async fn test_memory_window_is_trimmed_across_questions() {
    let retriever = Arc::new(StaticRetriever::new(passages(1..=2)));
    let replies = [STRUCTURED_REPLY; 4];
    let client = Arc::new(ScriptedClient::replying(&replies));
    let pipeline = pipeline(retriever, client.clone(), PipelineSettings::default());
    let mut memory = MemoryWindow::new(WindowSize::Two, true);

    for i in 1..=4 {
        let question = format!("Question number {} on ownership", i);
        pipeline.answer(&question, Tone::Conversational, &mut memory).await;
    }

    let history = memory.history();
    assert_eq!(history.len(), 4);
    assert_eq!(history[0].content, "Question number 3 on ownership");

    let last_prompt = &client.requests()[3].prompt;
    assert!(last_prompt.contains("User: Question number 2 on ownership"));
    assert!(!last_prompt.contains("Question number 1 on ownership"));
}

#[tokio::test]
async fn test_disabled_memory_hides_history_from_prompt() {
    let retriever = Arc::new(StaticRetriever::new(passages(1..=2)));
    let client = Arc::new(ScriptedClient::replying(&[STRUCTURED_REPLY]));
    let pipeline = pipeline(retriever, client.clone(), PipelineSettings::default());
    let mut memory = MemoryWindow::default();
    memory.append(Role::User, "secret earlier question");
    memory.append(Role::Assistant, "secret earlier answer");
    memory.set_enabled(false);

    pipeline
        .answer("What does murabaha require?", Tone::Conversational, &mut memory)
        .await;

    let prompt = &client.requests()[0].prompt;
    assert!(prompt.contains("(no previous conversation)"));
    assert!(!prompt.contains("secret earlier"));
}
