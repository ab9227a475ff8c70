use std::sync::Arc;

use shared::llm::{LlmGateway, LlmGatewayError, LlmGatewayRequest, prompts::chat_prompt};
use shared::repos::EmotionLogStore;
use thiserror::Error;
use tracing::{debug, warn};

use crate::extractor::{EmotionExtractor, normalize_label};
use crate::heuristics::{is_thanks, is_topic_change, wants_advice};
use crate::sentinel;
use crate::session::Session;

pub const GRATITUDE_REPLY: &str = "¡De nada! 😊 Aquí estaré cuando me necesites.";
pub const APOLOGY_REPLY: &str = "¡Vaya! Algo no ha ido bien. ¿Podrías intentarlo de nuevo?";

const ADVICE_BULLET: &str = "🔹";
const ADVICE_MAX_LINES: usize = 3;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("utterance is empty after trimming")]
    EmptyUtterance,
    #[error("no active session for subject {0}")]
    SessionNotFound(String),
}

/// The two gating decisions of a turn. Both are made once, against the
/// pre-generation history and the raw utterance, and reused after the
/// generation call.
#[derive(Debug, Clone, Copy)]
struct TurnDecisions {
    topic_change: bool,
    wants_advice: bool,
}

/// Orchestrates a single conversational turn: history update, gating
/// decisions, generation, emotion annotation, advice formatting, and
/// persistence reconciliation.
pub struct ResponsePipeline {
    gateway: Arc<dyn LlmGateway>,
    store: Arc<dyn EmotionLogStore>,
    extractor: EmotionExtractor,
}

impl ResponsePipeline {
    pub fn new(gateway: Arc<dyn LlmGateway>, store: Arc<dyn EmotionLogStore>) -> Self {
        let extractor = EmotionExtractor::new(Arc::clone(&gateway));
        Self {
            gateway,
            store,
            extractor,
        }
    }

    /// Runs one turn against a session. The caller holds the session's lock
    /// for the whole call, so every mutation here is serialized per subject.
    pub async fn run_turn(
        &self,
        session: &mut Session,
        utterance: &str,
    ) -> Result<String, EngineError> {
        let utterance = utterance.trim();
        if utterance.is_empty() {
            return Err(EngineError::EmptyUtterance);
        }

        // Gratitude is answered with a canned reply and leaves the session
        // untouched: no history turn, no classification, no persistence.
        if is_thanks(utterance) {
            return Ok(GRATITUDE_REPLY.to_string());
        }

        session.append_user(utterance);
        let decisions = TurnDecisions {
            topic_change: is_topic_change(session.history()),
            wants_advice: wants_advice(utterance),
        };
        debug!(
            subject_id = %session.subject_id(),
            topic_change = decisions.topic_change,
            wants_advice = decisions.wants_advice,
            "turn decisions"
        );

        let reply = match self.generate_reply(session, utterance).await {
            Ok(text) => text,
            Err(err) => {
                warn!(subject_id = %session.subject_id(), "reply generation failed: {err}");
                return Ok(APOLOGY_REPLY.to_string());
            }
        };

        let (reply, label) = self
            .annotate_emotion(utterance, reply, decisions.topic_change)
            .await;

        let reply = if decisions.wants_advice {
            format_advice(&reply)
        } else {
            reply
        };

        if let Some(label) = label {
            self.persist_emotion(session, &label, utterance).await;
        }

        session.append_assistant(&reply);
        Ok(reply)
    }

    async fn generate_reply(
        &self,
        session: &Session,
        utterance: &str,
    ) -> Result<String, LlmGatewayError> {
        let prompt = chat_prompt(&session.context_window(), utterance);
        let response = self
            .gateway
            .generate(LlmGatewayRequest::from_prompt(prompt))
            .await?;
        Ok(response.text.trim().to_string())
    }

    /// On a topic change with no sentinel in the reply, classifies the
    /// original utterance and prepends the sentinel line. Otherwise the label
    /// is parsed out of the reply when the model emitted one itself.
    async fn annotate_emotion(
        &self,
        utterance: &str,
        reply: String,
        topic_change: bool,
    ) -> (String, Option<String>) {
        if topic_change && !sentinel::starts_with_sentinel(&reply) {
            match self.extractor.extract(utterance).await {
                Some(label) => {
                    let annotated = sentinel::annotate(&label, &reply);
                    (annotated, Some(label))
                }
                None => (reply, None),
            }
        } else {
            let label = sentinel::parse_label(&reply)
                .map(|raw| normalize_label(&raw))
                .filter(|label| !label.is_empty());
            (reply, label)
        }
    }

    /// Records the emotion in the session and reconciles the durable log:
    /// first newly seen emotion creates the document with the full snapshot,
    /// later ones append only the new pair. Storage failures are logged and
    /// swallowed; the reply still goes out.
    async fn persist_emotion(&self, session: &mut Session, label: &str, situation: &str) {
        if !session.record_emotion(label, situation) {
            return;
        }

        let outcome = if let Some(log_ref) = session.log_ref() {
            self.store.append_emotion_log(log_ref, label, situation).await
        } else {
            let created = self
                .store
                .create_emotion_log(session.subject_id(), session.emotions(), session.situations())
                .await;
            created.map(|log_ref| session.set_log_ref(log_ref))
        };

        if let Err(err) = outcome {
            warn!(subject_id = %session.subject_id(), "emotion log write failed: {err}");
        }
    }
}

/// Advice formatting is lossy: at most the first three non-empty lines
/// survive, each as a bullet. Replies that already carry a bullet are left
/// alone.
fn format_advice(reply: &str) -> String {
    if reply.contains(ADVICE_BULLET) {
        return reply.to_string();
    }

    reply
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(ADVICE_MAX_LINES)
        .map(|line| format!("{ADVICE_BULLET} {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}
