use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex};

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use shared::config::{EngineConfig, load_dotenv};
use shared::llm::GeminiGatewayConfig;
use shared::repos::{EmotionLogFuture, EmotionLogStore, Store, StoreError};
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, OnceCell, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

static MIGRATIONS_APPLIED: OnceCell<()> = OnceCell::const_new();

pub fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                std::env::var("RUST_LOG").unwrap_or_else(|_| "engine=debug,shared=debug".to_string()),
            )
            .with_test_writer()
            .init();
    });
}

/// Engine config from the environment, or `None` when no database is
/// configured (database-backed tests are skipped in that case).
pub fn engine_config() -> Option<EngineConfig> {
    let _ = load_dotenv();
    EngineConfig::from_env().ok()
}

pub async fn connect_store(config: &EngineConfig) -> Store {
    apply_migrations_once(config).await;

    Store::connect(&config.database_url, config.database_max_connections)
        .await
        .expect("test store connection should succeed")
}

pub async fn reset_database(pool: &PgPool) {
    sqlx::query("TRUNCATE TABLE emotion_logs")
        .execute(pool)
        .await
        .expect("database reset should succeed");
}

async fn apply_migrations_once(config: &EngineConfig) {
    let database_url = config.database_url.clone();
    let migrations_dir = if config.migrations_dir.is_absolute() {
        config.migrations_dir.clone()
    } else {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../db/migrations")
    };

    MIGRATIONS_APPLIED
        .get_or_init(|| async move {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(2)
                .connect(&database_url)
                .await
                .expect("migration pool connection should succeed");

            let migrator = sqlx::migrate::Migrator::new(migrations_dir)
                .await
                .expect("migrations should load");
            migrator
                .run(&pool)
                .await
                .expect("migrations should apply successfully");
        })
        .await;
}

#[derive(Debug, Clone)]
pub struct MockReply {
    pub status: StatusCode,
    pub body: Value,
}

pub fn chat_reply(text: &str) -> MockReply {
    MockReply {
        status: StatusCode::OK,
        body: json!({
            "candidates": [
                {
                    "content": { "role": "model", "parts": [ { "text": text } ] },
                    "finishReason": "STOP"
                }
            ],
            "modelVersion": "gemini-mock"
        }),
    }
}

pub fn provider_error(status: StatusCode) -> MockReply {
    MockReply {
        status,
        body: json!({
            "error": {
                "code": status.as_u16(),
                "message": "provider rejected the request",
                "status": "UNAVAILABLE"
            }
        }),
    }
}

#[derive(Debug, Clone)]
pub struct GeminiMock {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    pub seen_prompts: Arc<Mutex<Vec<String>>>,
}

impl GeminiMock {
    fn with_replies(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::from(replies))),
            seen_prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub async fn prompt_count(&self) -> usize {
        self.seen_prompts.lock().await.len()
    }
}

pub struct GeminiMockServer {
    pub state: GeminiMock,
    pub config: GeminiGatewayConfig,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl GeminiMockServer {
    pub async fn shutdown(self) {
        self.shutdown_tx.send(()).ok();
        self.task.await.expect("mock server task should join");
    }
}

pub async fn spawn_gemini_mock(replies: Vec<MockReply>) -> GeminiMockServer {
    let state = GeminiMock::with_replies(replies);
    let app = Router::new()
        .route("/v1beta/models/{model_call}", post(generate_handler))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("mock server should bind");
    let addr = listener.local_addr().expect("mock server addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown_rx.await.ok();
            })
            .await
            .expect("mock server should run");
    });

    let config = GeminiGatewayConfig {
        generate_url: format!("http://{addr}/v1beta/models/gemini-mock:generateContent"),
        api_key: "integration-test-key".to_string(),
        timeout_ms: 2_000,
        max_retries: 1,
        retry_base_backoff_ms: 0,
    };

    GeminiMockServer {
        state,
        config,
        shutdown_tx,
        task,
    }
}

async fn generate_handler(
    State(state): State<GeminiMock>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if let Some(prompt) = body["contents"][0]["parts"][0]["text"].as_str() {
        state.seen_prompts.lock().await.push(prompt.to_string());
    }

    let reply = state
        .replies
        .lock()
        .await
        .pop_front()
        .unwrap_or_else(|| provider_error(StatusCode::INTERNAL_SERVER_ERROR));
    (reply.status, Json(reply.body))
}

#[derive(Debug, Clone)]
pub struct RecordedLog {
    pub subject_id: String,
    pub emotions: Vec<String>,
    pub situations: Vec<String>,
}

/// In-memory stand-in for the Postgres store, with the same set-union append
/// semantics, so full-turn flows run without a database.
#[derive(Default)]
pub struct InMemoryEmotionLogStore {
    logs: StdMutex<Vec<(Uuid, RecordedLog)>>,
    appends: StdMutex<Vec<(Uuid, String, String)>>,
}

impl InMemoryEmotionLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn logs(&self) -> Vec<(Uuid, RecordedLog)> {
        self.logs.lock().expect("logs lock").clone()
    }

    pub fn appends(&self) -> Vec<(Uuid, String, String)> {
        self.appends.lock().expect("appends lock").clone()
    }
}

impl EmotionLogStore for InMemoryEmotionLogStore {
    fn create_emotion_log<'a>(
        &'a self,
        subject_id: &'a str,
        emotions: &'a [String],
        situations: &'a [String],
    ) -> EmotionLogFuture<'a, Uuid> {
        Box::pin(async move {
            let id = Uuid::new_v4();
            self.logs.lock().expect("logs lock").push((
                id,
                RecordedLog {
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
