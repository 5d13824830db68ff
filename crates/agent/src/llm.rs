use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// One structured-output call: the model must answer `user_prompt` with a JSON document
/// matching `schema`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LlmRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub schema: serde_json::Value,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("api error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("provider configuration error: {0}")]
    Configuration(String),
}

impl LlmError {
    /// Transport timeouts raised by the HTTP client itself.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Network(error) if error.is_timeout())
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Returns the raw text of the model's reply.
    async fn complete(&self, request: &LlmRequest) -> Result<String, LlmError>;
}
