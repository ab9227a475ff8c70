use std::collections::VecDeque;
use std::sync::Mutex;

use shared::llm::{
    LlmGateway, LlmGatewayError, LlmGatewayFuture, LlmGatewayRequest, LlmGatewayResponse,
};
use shared::repos::{EmotionLogFuture, EmotionLogStore, StoreError};
use uuid::Uuid;

/// Gateway fake replaying a scripted sequence of replies.
pub(crate) struct ScriptedGateway {
    replies: Mutex<VecDeque<Result<String, LlmGatewayError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGateway {
    pub(crate) fn with_replies(replies: Vec<Result<String, LlmGatewayError>>) -> Self {
        Self {
            replies: Mutex::new(VecDeque::from(replies)),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompts lock").clone()
    }

    pub(crate) fn request_count(&self) -> usize {
        self.prompts.lock().expect("prompts lock").len()
    }
}

impl LlmGateway for ScriptedGateway {
    fn generate<'a>(&'a self, request: LlmGatewayRequest) -> LlmGatewayFuture<'a> {
        Box::pin(async move {
            self.prompts.lock().expect("prompts lock").push(request.prompt);
            let next = self
                .replies
                .lock()
                .expect("replies lock")
                .pop_front()
                .unwrap_or_else(|| {
                    Err(LlmGatewayError::ProviderFailure(
                        "script exhausted".to_string(),
                    ))
                });
            next.map(|text| LlmGatewayResponse {
                model: "scripted".to_string(),
                text,
                usage: None,
            })
        })
    }
}

#[derive(Debug, Clone)]
pub(crate) struct MemoryLog {
    pub(crate) subject_id: String,
    pub(crate) emotions: Vec<String>,
    pub(crate) situations: Vec<String>,
}

/// In-memory emotion-log store with the same set-union append semantics as
/// the Postgres implementation.
#[derive(Default)]
pub(crate) struct MemoryEmotionLogStore {
    logs: Mutex<Vec<(Uuid, MemoryLog)>>,
    appends: Mutex<Vec<(Uuid, String, String)>>,
    fail_writes: bool,
}

impl MemoryEmotionLogStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub(crate) fn logs(&self) -> Vec<(Uuid, MemoryLog)> {
        self.logs.lock().expect("logs lock").clone()
    }

    pub(crate) fn appends(&self) -> Vec<(Uuid, String, String)> {
        self.appends.lock().expect("appends lock").clone()
    }
}

impl EmotionLogStore for MemoryEmotionLogStore {
    fn create_emotion_log<'a>(
        &'a self,
        subject_id: &'a str,
        emotions: &'a [String],
        situations: &'a [String],
    ) -> EmotionLogFuture<'a, Uuid> {
        Box::pin(async move {
            if self.fail_writes {
                return Err(StoreError::InvalidData("scripted write failure".to_string()));
            }

            let id = Uuid::new_v4();
            self.logs.lock().expect("logs lock").push((
                id,
                MemoryLog {
                    subject_id: subject_id.to_string(),
                    emotions: emotions.to_vec(),
                    situations: situations.to_vec(),
                },
            ));
            Ok(id)
        })
    }

    fn append_emotion_log<'a>(
        &'a self,
        log_id: Uuid,
        emotion: &'a str,
        situation: &'a str,
    ) -> EmotionLogFuture<'a, ()> {
        Box::pin(async move {
            if self.fail_writes {
                return Err(StoreError::InvalidData("scripted write failure".to_string()));
            }

            let mut logs = self.logs.lock().expect("logs lock");
            let Some((_, log)) = logs.iter_mut().find(|(id, _)| *id == log_id) else {
                return Err(StoreError::MissingDocument(log_id));
            };
            if !log.emotions.iter().any(|known| known == emotion) {
                log.emotions.push(emotion.to_string());
                log.situations.push(situation.to_string());
            }

            self.appends.lock().expect("appends lock").push((
                log_id,
                emotion.to_string(),
                situation.to_string(),
            ));
            Ok(())
        })
    }
}
