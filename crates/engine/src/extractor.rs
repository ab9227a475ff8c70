use std::sync::Arc;

use shared::llm::{LlmGateway, LlmGatewayRequest, prompts::emotion_word_prompt};
use tracing::warn;

// The classification reply is expected to be a single word.
const EMOTION_WORD_MAX_TOKENS: u32 = 16;

/// Labels one short utterance with a single emotion word via the
/// text-generation collaborator.
pub struct EmotionExtractor {
    gateway: Arc<dyn LlmGateway>,
}

impl EmotionExtractor {
    pub fn new(gateway: Arc<dyn LlmGateway>) -> Self {
        Self { gateway }
    }

    /// Returns the canonical emotion label for `utterance`, or `None` when
    /// the collaborator fails or returns nothing usable. A failed extraction
    /// never fails the surrounding turn.
    pub async fn extract(&self, utterance: &str) -> Option<String> {
        let request = LlmGatewayRequest::from_prompt(emotion_word_prompt(utterance))
            .with_max_output_tokens(EMOTION_WORD_MAX_TOKENS);

        match self.gateway.generate(request).await {
            Ok(response) => {
                let label = normalize_label(&response.text);
                if label.is_empty() { None } else { Some(label) }
            }
            Err(err) => {
                warn!("emotion classification request failed: {err}");
                None
            }
        }
    }
}

/// Canonical label form: trimmed, first letter uppercased, remainder
/// lowercased. Dedup against stored labels stays case-insensitive.
pub fn normalize_label(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => {
            let mut label: String = first.to_uppercase().collect();
            label.push_str(&chars.as_str().to_lowercase());
            label
        }
        None => String::new(),
    }
}
