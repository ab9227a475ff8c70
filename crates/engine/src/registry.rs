use std::collections::HashMap;
use std::sync::Arc;

use shared::llm::LlmGateway;
use shared::repos::EmotionLogStore;
use tokio::sync::{Mutex, RwLock};
use tracing::info;

use crate::pipeline::{EngineError, ResponsePipeline};
use crate::session::Session;

/// Session registry keyed by subject. Each subject gets its own lock, held
/// for a full turn, so turns for one student serialize while independent
/// students proceed concurrently. The registry is a plain value owned by the
/// caller; collaborators are injected at construction.
pub struct ChatEngine {
    pipeline: ResponsePipeline,
    sessions: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
}

impl ChatEngine {
    pub fn new(gateway: Arc<dyn LlmGateway>, store: Arc<dyn EmotionLogStore>) -> Self {
        Self {
            pipeline: ResponsePipeline::new(gateway, store),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// The welcome event: wipes any prior session for the subject and
    /// returns the greeting, which is also the new session's first assistant
    /// turn.
    pub async fn start_session(&self, subject_id: &str) -> String {
        let greeting = greeting_for(subject_id);
        let session = Arc::new(Mutex::new(Session::start(subject_id, greeting.as_str())));

        let replaced = self
            .sessions
            .write()
            .await
            .insert(subject_id.to_string(), session);
        if replaced.is_some() {
            info!(subject_id, "session restarted");
        } else {
            info!(subject_id, "session started");
        }

        greeting
    }

    /// Runs one turn for the subject's active session. Rejected when no
    /// session has been started; the welcome event is the only way a session
    /// comes into being.
    pub async fn handle_turn(
        &self,
        subject_id: &str,
        utterance: &str,
    ) -> Result<String, EngineError> {
        let session = self
            .sessions
            .read()
            .await
            .get(subject_id)
            .cloned()
            .ok_or_else(|| EngineError::SessionNotFound(subject_id.to_string()))?;

        // Held through persistence: one turn per subject at a time.
        let mut session = session.lock().await;
        self.pipeline.run_turn(&mut session, utterance).await
    }
}

fn greeting_for(subject_id: &str) -> String {
    format!(
        "¡Hola {}! 👋 Soy Coprodelito, tu asistente emocional. ¿Cómo te sientes hoy?",
        display_name(subject_id)
    )
}

/// Derives a display name from the subject key: the part before `@`, dots as
/// spaces, each word capitalized.
fn display_name(subject_id: &str) -> String {
    let local_part = subject_id.split('@').next().unwrap_or(subject_id);
    local_part
        .split('.')
        .filter(|word| !word.is_empty())
        .map(capitalize_word)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => {
            let mut capitalized: String = first.to_uppercase().collect();
            capitalized.push_str(&chars.as_str().to_lowercase());
            capitalized
        }
        None => String::new(),
    }
}
