use std::future::Future;
use std::pin::Pin;

use sqlx::Row;
use uuid::Uuid;

use crate::models::EmotionLogRecord;

use super::{Store, StoreError};

pub type EmotionLogFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Durable emotion-log collaborator. One full-snapshot create per subject
/// session; every later write is an append of a single emotion/situation
/// pair. Appends carry set-union semantics at the storage layer, so they are
/// idempotent against duplicates independently of the engine's own dedup.
pub trait EmotionLogStore: Send + Sync {
    fn create_emotion_log<'a>(
        &'a self,
        subject_id: &'a str,
        emotions: &'a [String],
        situations: &'a [String],
    ) -> EmotionLogFuture<'a, Uuid>;

    fn append_emotion_log<'a>(
        &'a self,
        log_id: Uuid,
        emotion: &'a str,
        situation: &'a str,
    ) -> EmotionLogFuture<'a, ()>;
}

impl Store {
    pub async fn create_emotion_log(
        &self,
        subject_id: &str,
        emotions: &[String],
        situations: &[String],
    ) -> Result<Uuid, StoreError> {
        if emotions.len() != situations.len() {
            return Err(StoreError::InvalidData(format!(
                "emotions/situations length mismatch: {} vs {}",
                emotions.len(),
                situations.len()
            )));
        }

        let row = sqlx::query(
            "INSERT INTO emotion_logs (subject_id, emotions, situations)
             VALUES ($1, $2, $3)
             RETURNING id",
        )
        .bind(subject_id)
        .bind(emotions)
        .bind(situations)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("id")?)
    }

    pub async fn append_emotion_log(
        &self,
        log_id: Uuid,
        emotion: &str,
        situation: &str,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE emotion_logs
             SET emotions = CASE
                   WHEN $2 = ANY(emotions) THEN emotions
                   ELSE array_append(emotions, $2)
                 END,
                 situations = CASE
                   WHEN $2 = ANY(emotions) THEN situations
                   ELSE array_append(situations, $3)
                 END,
                 last_update = now()
             WHERE id = $1",
        )
        .bind(log_id)
        .bind(emotion)
        .bind(situation)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::MissingDocument(log_id));
        }

        Ok(())
    }

    pub async fn get_emotion_log(
        &self,
        log_id: Uuid,
    ) -> Result<Option<EmotionLogRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT id, subject_id, emotions, situations, created_at, last_update
             FROM emotion_logs
             WHERE id = $1",
        )
        .bind(log_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(EmotionLogRecord {
                id: row.try_get("id")?,
                subject_id: row.try_get("subject_id")?,
                emotions: row.try_get("emotions")?,
                situations: row.try_get("situations")?,
                created_at: row.try_get("created_at")?,
                last_update: row.try_get("last_update")?,
            })
        })
        .transpose()
    }
}

impl EmotionLogStore for Store {
    fn create_emotion_log<'a>(
        &'a self,
        subject_id: &'a str,
        emotions: &'a [String],
        situations: &'a [String],
    ) -> EmotionLogFuture<'a, Uuid> {
        Box::pin(Store::create_emotion_log(self, subject_id, emotions, situations))
    }

    fn append_emotion_log<'a>(
        &'a self,
        log_id: Uuid,
        emotion: &'a str,
        situation: &'a str,
    ) -> EmotionLogFuture<'a, ()> {
        Box::pin(Store::append_emotion_log(self, log_id, emotion, situation))
    }
}
