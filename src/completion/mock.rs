//! Deterministic offline replies used when the completion provider is
//! rate limited or fails in an unrecognised way.

/// Canonical phrases and their replies. The first phrase contained in the
/// normalised input wins, so order matters.
const CANNED_REPLIES: &[(&str, &str)] = &[
    ("hello", "Hello! How can I help you today?"),
    ("hi", "Hi there! What can I do for you?"),
    ("how are you", "I'm doing well, thank you for asking! How are you?"),
    ("what is your name", "I'm TSF Chat, your AI assistant. Nice to meet you!"),
    (
        "help",
        "I'm here to help! You can ask me questions about various topics, and I'll do my best to assist you.",
    ),
    (
        "what can you do",
        "I can help with answering questions, providing information, having conversations, and more. What would you like to know?",
    ),
    ("test", "This is a test response! The chat system is working correctly."),
    ("thanks", "You're welcome! Is there anything else I can help you with?"),
    ("bye", "Goodbye! Have a great day!"),
];

const CONTEXTUAL_EXCERPT_CHARS: usize = 50;
const DEFAULT_EXCERPT_CHARS: usize = 100;
const LONG_MESSAGE_WORDS: usize = 5;

fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub fn mock_response(user_message: &str) -> String {
    let normalized = user_message.trim().to_lowercase();

    if let Some((_, reply)) = CANNED_REPLIES
        .iter()
        .find(|(phrase, _)| normalized.contains(phrase))
    {
        return (*reply).to_string();
    }

    if user_message.split_whitespace().count() > LONG_MESSAGE_WORDS {
        return format!(
            "Thank you for your detailed message about '{}...'. Due to current API limitations, \
             I can only provide basic responses. Please try again tomorrow for a more comprehensive answer.",
            excerpt(user_message, CONTEXTUAL_EXCERPT_CHARS)
        );
    }

    format!(
        "I understand you're asking about '{}'. Due to current API limitations, I can only provide \
         basic responses right now. Please try again tomorrow for more detailed assistance, or contact \
         support for increased access.",
        excerpt(user_message, DEFAULT_EXCERPT_CHARS)
    )
}
