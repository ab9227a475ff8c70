use shared::models::Turn;
use uuid::Uuid;

/// How many trailing turns the generation prompt sees.
pub const CONTEXT_WINDOW_TURNS: usize = 5;

/// The full mutable state of one student's ongoing conversation. Created by
/// the welcome event, mutated once per turn, and replaced only by the next
/// welcome event. All mutation happens under the registry's per-subject lock.
#[derive(Debug)]
pub struct Session {
    subject_id: String,
    history: Vec<Turn>,
    emotions: Vec<String>,
    situations: Vec<String>,
    log_ref: Option<Uuid>,
    topic_seed: Option<String>,
}

impl Session {
    /// Fresh session for `subject_id` with the greeting as its first
    /// assistant turn.
    pub fn start(subject_id: impl Into<String>, greeting: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            history: vec![Turn::assistant(greeting)],
            emotions: Vec::new(),
            situations: Vec::new(),
            log_ref: None,
            topic_seed: None,
        }
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn emotions(&self) -> &[String] {
        &self.emotions
    }

    pub fn situations(&self) -> &[String] {
        &self.situations
    }

    pub fn log_ref(&self) -> Option<Uuid> {
        self.log_ref
    }

    pub fn topic_seed(&self) -> Option<&str> {
        self.topic_seed.as_deref()
    }

    /// Write-once: the durable handle never changes for the session's
    /// lifetime, so later calls are ignored.
    pub fn set_log_ref(&mut self, log_ref: Uuid) {
        if self.log_ref.is_none() {
            self.log_ref = Some(log_ref);
        }
    }

    /// Appends a user turn; the first one is captured as the topic seed.
    pub fn append_user(&mut self, text: &str) {
        if self.topic_seed.is_none() {
            self.topic_seed = Some(text.to_string());
        }
        self.history.push(Turn::user(text));
    }

    pub fn append_assistant(&mut self, text: &str) {
        self.history.push(Turn::assistant(text));
    }

    pub fn contains_emotion(&self, label: &str) -> bool {
        let lowered = label.to_lowercase();
        self.emotions
            .iter()
            .any(|known| known.to_lowercase() == lowered)
    }

    /// Records a newly seen emotion with the utterance that triggered it.
    /// No-op (returns false) for an empty or already-known label; otherwise
    /// both vectors grow together, keeping them parallel.
    pub fn record_emotion(&mut self, label: &str, situation: &str) -> bool {
        if label.trim().is_empty() || self.contains_emotion(label) {
            return false;
        }

        self.emotions.push(label.to_string());
        self.situations.push(situation.to_string());
        true
    }

    /// The last turns formatted as `role: text` lines for prompt
    /// construction, chronological order.
    pub fn context_window(&self) -> String {
        let window_start = self.history.len().saturating_sub(CONTEXT_WINDOW_TURNS);
        self.history[window_start..]
            .iter()
            .map(|turn| format!("{}: {}", turn.role.as_str(), turn.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
