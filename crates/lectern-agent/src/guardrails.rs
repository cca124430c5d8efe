//! Keyword guardrails for agent input.
//!
//! A blocklist content filter applied before a message ever reaches the
//! LLM. Matching is case-insensitive on whole words: a blocked keyword
//! inside a longer word (e.g. "skill") does not trigger.

const BLOCKED_KEYWORDS: [&str; 14] = [
    "kill", "attack", "hack", "exploit", "bomb", "terror", "suicide", "drugs", "violence",
    "porn", "nude", "racist", "hate", "murder",
];

/// Message returned for blocked input.
pub const BLOCKED_MESSAGE: &str =
    "Your message was blocked by safety guardrails. Please rephrase.";

/// Check a user message against the blocklist.
///
/// Returns `Some(reason)` when the message is blocked, `None` when it may
/// proceed.
pub fn check_guardrails(message: &str) -> Option<&'static str> {
    let blocked = message
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .any(|word| {
            BLOCKED_KEYWORDS
                .iter()
                .any(|kw| word.eq_ignore_ascii_case(kw))
        });

    if blocked {
        Some(BLOCKED_MESSAGE)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_messages_pass() {
        assert!(check_guardrails("What is 25 * 8?").is_none());
        assert!(check_guardrails("Tell me about rust").is_none());
        assert!(check_guardrails("").is_none());
    }

    #[test]
    fn test_blocked_keywords_rejected() {
        assert_eq!(check_guardrails("how to hack a server"), Some(BLOCKED_MESSAGE));
        assert_eq!(check_guardrails("build a bomb"), Some(BLOCKED_MESSAGE));
        assert_eq!(check_guardrails("KILL the process"), Some(BLOCKED_MESSAGE));
    }

    #[test]
    fn test_matching_is_whole_word() {
        // Keywords embedded in longer words do not trigger.
        assert!(check_guardrails("that took real skill").is_none());
        assert!(check_guardrails("the hackathon was fun").is_none());
        assert!(check_guardrails("I hated... no, disliked it").is_none());

        // Punctuation-adjacent keywords still trigger.
        assert_eq!(check_guardrails("attack!"), Some(BLOCKED_MESSAGE));
        assert_eq!(check_guardrails("(exploit)"), Some(BLOCKED_MESSAGE));
    }
}
