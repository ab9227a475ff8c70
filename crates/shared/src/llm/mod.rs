pub mod gateway;
pub mod gemini;
pub mod prompts;

pub use gateway::{
    LlmGateway, LlmGatewayError, LlmGatewayFuture, LlmGatewayRequest, LlmGatewayResponse,
    LlmTokenUsage,
};
pub use gemini::{GeminiConfigError, GeminiGateway, GeminiGatewayConfig};
pub use prompts::{chat_prompt, emotion_word_prompt};
