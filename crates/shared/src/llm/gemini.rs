use std::env;
use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tokio::time::sleep;
use tracing::warn;

use super::gateway::{
    LlmGateway, LlmGatewayError, LlmGatewayFuture, LlmGatewayRequest, LlmGatewayResponse,
    LlmTokenUsage,
};

const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_TIMEOUT_MS: u64 = 15_000;
const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_RETRY_BASE_BACKOFF_MS: u64 = 250;

#[derive(Debug, Clone)]
pub struct GeminiGatewayConfig {
    pub generate_url: String,
    pub api_key: String,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_base_backoff_ms: u64,
}

impl GeminiGatewayConfig {
    pub fn from_env() -> Result<Self, GeminiConfigError> {
        let api_key = require_non_empty_env("GEMINI_API_KEY")?;
        let base_url = optional_trimmed_env("GEMINI_API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(GeminiConfigError::InvalidConfiguration(
                "GEMINI_API_BASE_URL must start with http:// or https://".to_string(),
            ));
        }
        let model =
            optional_trimmed_env("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

        Ok(Self {
            generate_url: format!(
                "{}/v1beta/models/{model}:generateContent",
                base_url.trim_end_matches('/')
            ),
            api_key,
            timeout_ms: parse_u64_env("GEMINI_TIMEOUT_MS", DEFAULT_TIMEOUT_MS)?,
            max_retries: parse_u32_env("GEMINI_MAX_RETRIES", DEFAULT_MAX_RETRIES)?,
            retry_base_backoff_ms: parse_u64_env(
                "GEMINI_RETRY_BASE_BACKOFF_MS",
                DEFAULT_RETRY_BASE_BACKOFF_MS,
            )?,
        })
    }
}

#[derive(Debug, Error)]
pub enum GeminiConfigError {
    #[error("missing required env var {0}")]
    MissingVar(String),
    #[error("invalid integer in env var {key}: {value}")]
    ParseInt { key: String, value: String },
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("failed to build Gemini http client: {0}")]
    HttpClient(String),
}

#[derive(Clone)]
pub struct GeminiGateway {
    client: reqwest::Client,
    config: GeminiGatewayConfig,
}

impl GeminiGateway {
    pub fn new(config: GeminiGatewayConfig) -> Result<Self, GeminiConfigError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|err| GeminiConfigError::HttpClient(err.to_string()))?;

        Ok(Self { client, config })
    }

    async fn generate_with_retries(
        &self,
        request: &LlmGatewayRequest,
    ) -> Result<LlmGatewayResponse, LlmGatewayError> {
        let mut attempt = 0_u32;

        loop {
            match self.send_once(request).await {
                Ok(response) => return Ok(response),
                Err(err) => {
                    if err.retryable && attempt < self.config.max_retries {
                        let backoff_multiplier = 2_u64.saturating_pow(attempt);
                        let backoff_ms = self
                            .config
                            .retry_base_backoff_ms
                            .saturating_mul(backoff_multiplier);
                        warn!(attempt, "gemini request failed: {}; retrying in {backoff_ms}ms", err.error);
                        sleep(Duration::from_millis(backoff_ms)).await;
                        attempt = attempt.saturating_add(1);
                        continue;
                    }

                    return Err(err.error);
                }
            }
        }
    }

    async fn send_once(
        &self,
        request: &LlmGatewayRequest,
    ) -> Result<LlmGatewayResponse, SendAttemptError> {
        let mut generation_config = json!({});
        if let Value::Object(entries) = &mut generation_config {
            if let Some(max_output_tokens) = request.max_output_tokens {
                entries.insert("maxOutputTokens".to_string(), json!(max_output_tokens));
            }
            if let Some(temperature) = request.temperature {
                entries.insert("temperature".to_string(), json!(temperature));
            }
        }

        let request_body = json!({
            "contents": [
                {
                    "role": "user",
                    "parts": [ { "text": request.prompt } ]
                }
            ],
            "generationConfig": generation_config,
        });

        let response = self
            .client
            .post(&self.config.generate_url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    SendAttemptError::retryable(LlmGatewayError::Timeout)
                } else {
                    SendAttemptError::retryable(LlmGatewayError::ProviderFailure(
                        "request_unavailable".to_string(),
                    ))
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|_| {
            SendAttemptError::non_retryable(LlmGatewayError::InvalidProviderPayload(
                "response_body_read_failed".to_string(),
            ))
        })?;

        if !status.is_success() {
            let provider_status = parse_provider_error_status(&body);
            return Err(SendAttemptError {
                error: LlmGatewayError::ProviderFailure(format!(
                    "status={} code={provider_status}",
                    status.as_u16()
                )),
                retryable: is_retryable_status(status),
            });
        }

        let parsed: GeminiGenerateResponse = serde_json::from_str(&body).map_err(|_| {
            SendAttemptError::non_retryable(LlmGatewayError::InvalidProviderPayload(
                "response_json_parse_failed".to_string(),
            ))
        })?;

        let text = parsed
            .candidates
            .as_deref()
            .unwrap_or_default()
            .first()
            .ok_or_else(|| {
                SendAttemptError::non_retryable(LlmGatewayError::InvalidProviderPayload(
                    "missing_candidate".to_string(),
                ))
            })?
            .candidate_text();

        if text.trim().is_empty() {
            return Err(SendAttemptError::non_retryable(
                LlmGatewayError::InvalidProviderPayload("empty_candidate_text".to_string()),
            ));
        }

        Ok(LlmGatewayResponse {
            model: parsed
                .model_version
                .unwrap_or_else(|| self.config.generate_url.clone()),
            text,
            usage: parsed.usage_metadata.map(|usage| LlmTokenUsage {
                prompt_tokens: clamp_u64_to_u32(usage.prompt_token_count.unwrap_or(0)),
                completion_tokens: clamp_u64_to_u32(usage.candidates_token_count.unwrap_or(0)),
                total_tokens: clamp_u64_to_u32(usage.total_token_count.unwrap_or(0)),
            }),
        })
    }
}

impl LlmGateway for GeminiGateway {
    fn generate<'a>(&'a self, request: LlmGatewayRequest) -> LlmGatewayFuture<'a> {
        Box::pin(async move { self.generate_with_retries(&request).await })
    }
}

#[derive(Debug)]
struct SendAttemptError {
    error: LlmGatewayError,
    retryable: bool,
}

impl SendAttemptError {
    fn retryable(error: LlmGatewayError) -> Self {
        Self {
            error,
            retryable: true,
        }
    }

    fn non_retryable(error: LlmGatewayError) -> Self {
        Self {
            error,
            retryable: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeminiGenerateResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<GeminiUsageMetadata>,
    #[serde(rename = "modelVersion")]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

impl GeminiCandidate {
    fn candidate_text(&self) -> String {
        self.content
            .as_ref()
            .and_then(|content| content.parts.as_deref())
            .unwrap_or_default()
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
    }
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    parts: Option<Vec<GeminiPart>>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiUsageMetadata {
    #[serde(rename = "promptTokenCount")]
    prompt_token_count: Option<u64>,
    #[serde(rename = "candidatesTokenCount")]
    candidates_token_count: Option<u64>,
    #[serde(rename = "totalTokenCount")]
    total_token_count: Option<u64>,
}

fn require_non_empty_env(key: &str) -> Result<String, GeminiConfigError> {
    let value = env::var(key).map_err(|_| GeminiConfigError::MissingVar(key.to_string()))?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(GeminiConfigError::MissingVar(key.to_string()));
    }
    Ok(trimmed.to_string())
}

fn parse_u64_env(key: &str, default: u64) -> Result<u64, GeminiConfigError> {
    match optional_trimmed_env(key) {
        Some(value) => value
            .parse::<u64>()
            .map_err(|_| GeminiConfigError::ParseInt {
                key: key.to_string(),
                value,
            }),
        None => Ok(default),
    }
}

fn parse_u32_env(key: &str, default: u32) -> Result<u32, GeminiConfigError> {
    match optional_trimmed_env(key) {
        Some(value) => value
            .parse::<u32>()
            .map_err(|_| GeminiConfigError::ParseInt {
                key: key.to_string(),
                value,
            }),
        None => Ok(default),
    }
}

fn optional_trimmed_env(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

fn parse_provider_error_status(body: &str) -> String {
    #[derive(Deserialize)]
    struct ProviderErrorEnvelope {
        error: Option<ProviderErrorDetails>,
    }

    #[derive(Deserialize)]
    struct ProviderErrorDetails {
        status: Option<String>,
        code: Option<Value>,
    }

    let Some(details) = serde_json::from_str::<ProviderErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error)
    else {
        return "unknown".to_string();
    };

    if let Some(status) = details.status {
        return status;
    }

    match details.code {
        Some(Value::String(code)) => code,
        Some(Value::Number(code)) => code.to_string(),
        _ => "unknown".to_string(),
    }
}

fn clamp_u64_to_u32(value: u64) -> u32 {
    value.min(u32::MAX as u64) as u32
}
