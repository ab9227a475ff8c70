use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One conversational turn. Immutable once appended to a session's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// Durable emotion-log row for one student: distinct emotions encountered and
/// the utterances that first triggered them, in matching order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionLogRecord {
    pub id: Uuid,
    pub subject_id: String,
    pub emotions: Vec<String>,
    pub situations: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
}
