//! Greeting detection and the canned welcome answer.

const GREETINGS: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "greetings",
    "good morning",
    "good afternoon",
    "good evening",
    "good day",
    "howdy",
    "hiya",
    "yo",
    "sup",
    "what's up",
    "whats up",
    "how are you",
    "how do you do",
    "salaam",
    "salam",
    "assalamu alaikum",
    "peace be upon you",
];

/// Inputs of at most this many words may match a greeting by containment.
const SHORT_INPUT_WORDS: usize = 4;

const WELCOME: &str = "Hello! 👋 Welcome to the AAOIFI Standards assistant.

I can help with questions about the AAOIFI Sharia Standards for Islamic financial institutions, including:

• Islamic banking principles
• Sharia compliance requirements
• Specific standards and guidelines
• Rules for financial contracts

Ask me anything about the standards. How can I help you today?";

const WELCOME_FOLLOW_UPS: [&str; 4] = [
    "What are the key principles of Islamic banking?",
    "Explain the requirements for Sharia compliance",
    "What are the different types of Islamic financial contracts?",
    "Tell me about Murabaha transactions",
];

/// Whether `question` is a greeting rather than a real question.
///
/// The input is lowercased and trimmed, and trailing `!?.,` are dropped.
/// It matches when it equals a greeting phrase, or when it has at most
/// four words and contains one as whole words. "which" does not contain
/// the greeting "hi".
pub fn is_greeting(question: &str) -> bool {
    let normalized = question.trim().to_lowercase();
    let normalized = normalized.trim_end_matches(['!', '?', '.', ',']);

    if GREETINGS.contains(&normalized) {
        return true;
    }

    let words: Vec<&str> = normalized
        .split(|c: char| c.is_whitespace() || matches!(c, '!' | '?' | '.' | ','))
        .filter(|w| !w.is_empty())
        .collect();

    words.len() <= SHORT_INPUT_WORDS
        && GREETINGS.iter().any(|g| contains_phrase(&words, g))
}

fn contains_phrase(words: &[&str], phrase: &str) -> bool {
    let phrase: Vec<&str> = phrase.split_whitespace().collect();
    words.windows(phrase.len()).any(|window| window == phrase.as_slice())
}

/// Welcome text and its follow-up questions.
pub fn welcome() -> (String, Vec<String>) {
    (
        WELCOME.to_string(),
        WELCOME_FOLLOW_UPS.iter().map(|s| s.to_string()).collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_greetings() {
        for input in ["hello", "Hello!", "  HI  ", "good morning.", "Assalamu Alaikum", "what's up?"] {
            assert!(is_greeting(input), "{:?} should be a greeting", input);
        }
    }

    #[test]
    fn test_short_inputs_containing_greetings() {
        assert!(is_greeting("hey there friend"));
        assert!(is_greeting("well hello there"));
        assert!(is_greeting("hi, good morning"));
        assert!(is_greeting("salaam, how are you"));
    }

    #[test]
    fn test_greeting_words_inside_other_words_do_not_match() {
        assert!(!is_greeting("Which standard covers ijarah?"));
        assert!(!is_greeting("What is hiba?"));
        assert!(!is_greeting("Define sukuk supervision"));
        assert!(!is_greeting("Sharia ethics overview"));
        assert!(!is_greeting("Explain the rules on asset ownership please"));
    }

    #[test]
    fn test_questions_are_not_greetings() {
        assert!(!is_greeting("What are the conditions of a murabaha sale?"));
        assert!(!is_greeting("Explain riba and gharar"));
        assert!(!is_greeting(""));
        assert!(!is_greeting("hello, can you explain the conditions for ijarah contracts"));
    }

    #[test]
    fn test_welcome_has_four_follow_ups() {
        let (text, follow_ups) = welcome();
        assert!(text.starts_with("Hello!"));
        assert_eq!(follow_ups.len(), 4);
        assert_eq!(follow_ups[3], "Tell me about Murabaha transactions");
    }
}
