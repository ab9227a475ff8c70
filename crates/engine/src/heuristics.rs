//! Stateless text predicates gating the per-turn pipeline. All of them are
//! case-insensitive substring checks against fixed keyword sets.

use shared::models::{Role, Turn};

const GRATITUDE_KEYWORDS: &[&str] = &["gracias", "muchas gracias", "agradecido", "agradecida"];

const ADVICE_KEYWORDS: &[&str] = &[
    "consejos",
    "tips",
    "recomendación",
    "qué hago",
    "no sé",
    "ayúdame",
];

const CONNECTIVE_WORDS: &[&str] = &["y", "además", "también", "pero", "aunque", "luego"];

// How many trailing user turns participate in the topic-change check.
const TOPIC_WINDOW_USER_TURNS: usize = 3;

/// A gratitude turn short-circuits the whole pipeline with a canned reply.
pub fn is_thanks(text: &str) -> bool {
    contains_any_keyword(text, GRATITUDE_KEYWORDS)
}

/// Decides whether the reply gets reformatted as advice bullets.
pub fn wants_advice(text: &str) -> bool {
    contains_any_keyword(text, ADVICE_KEYWORDS)
}

/// True when the conversation has just started (fewer than 2 turns), or when
/// no connective word shows up in the last few user turns. Must be evaluated
/// on the pre-generation history, current user turn included.
pub fn is_topic_change(history: &[Turn]) -> bool {
    if history.len() < 2 {
        return true;
    }

    let user_texts = history
        .iter()
        .filter(|turn| turn.role == Role::User)
        .map(|turn| turn.text.to_lowercase())
        .collect::<Vec<_>>();
    let window_start = user_texts.len().saturating_sub(TOPIC_WINDOW_USER_TURNS);
    let joined = user_texts[window_start..].join(" ");

    !CONNECTIVE_WORDS
        .iter()
        .any(|connective| joined.contains(connective))
}

fn contains_any_keyword(text: &str, keywords: &[&str]) -> bool {
    let lowered = text.to_lowercase();
    keywords.iter().any(|keyword| lowered.contains(keyword))
}
