//! HTTP-backed [`LlmClient`] implementations.
//!
//! Both providers ask for schema-constrained JSON and return the message content verbatim;
//! validation against the extraction contract happens in the extraction invoker.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};

use chatorder_core::config::{LlmConfig, LlmProvider};

use crate::llm::{LlmClient, LlmError, LlmRequest};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const SCHEMA_NAME: &str = "extracted_order";

pub struct OpenAiClient {
    api_key: SecretString,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(
        api_key: SecretString,
        base_url: Option<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            api_key,
            base_url: base_url
                .unwrap_or_else(|| OPENAI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: model.into(),
            client,
        })
    }
}

pub(crate) fn openai_request_body(model: &str, request: &LlmRequest) -> Value {
    json!({
        "model": model,
        "messages": [
            {"role": "system", "content": request.system_prompt},
            {"role": "user", "content": request.user_prompt}
        ],
        "temperature": 0.0,
        "response_format": {
            "type": "json_schema",
            "json_schema": {"name": SCHEMA_NAME, "schema": request.schema}
        }
    })
}

pub(crate) fn parse_openai_response(body: &str) -> Result<String, LlmError> {
    #[derive(Deserialize)]
    struct Message {
        content: Option<String>,
    }
    #[derive(Deserialize)]
    struct Choice {
        message: Message,
    }
    #[derive(Deserialize)]
    struct ApiResponse {
        choices: Vec<Choice>,
    }

    let response: ApiResponse = serde_json::from_str(body)?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| LlmError::InvalidResponse("openai returned no message content".to_string()))
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: &LlmRequest) -> Result<String, LlmError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&openai_request_body(&self.model, request))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(LlmError::Api { status: status.as_u16(), message: body });
        }

        tracing::debug!(
            event_name = "llm.openai.completed",
            model = %self.model,
            response_bytes = body.len(),
            "openai completion received"
        );
        parse_openai_response(&body)
    }
}

pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            client,
        })
    }
}

pub(crate) fn ollama_request_body(model: &str, request: &LlmRequest) -> Value {
    json!({
        "model": model,
        "messages": [
            {"role": "system", "content": request.system_prompt},
            {"role": "user", "content": request.user_prompt}
        ],
        "stream": false,
        "format": request.schema,
        "options": {"temperature": 0.0}
    })
}

pub(crate) fn parse_ollama_response(body: &str) -> Result<String, LlmError> {
    #[derive(Deserialize)]
    struct Message {
        content: String,
    }
    #[derive(Deserialize)]
    struct ApiResponse {
        message: Option<Message>,
    }

    let response: ApiResponse = serde_json::from_str(body)?;
    response
        .message
        .map(|message| message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| LlmError::InvalidResponse("ollama returned an empty message".to_string()))
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn complete(&self, request: &LlmRequest) -> Result<String, LlmError> {
        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&ollama_request_body(&self.model, request))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(LlmError::Api { status: status.as_u16(), message: body });
        }

        tracing::debug!(
            event_name = "llm.ollama.completed",
            model = %self.model,
            response_bytes = body.len(),
            "ollama completion received"
        );
        parse_ollama_response(&body)
    }
}

pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    let timeout = Duration::from_secs(config.timeout_secs);
    match config.provider {
        LlmProvider::OpenAi => {
            let api_key = config.api_key.clone().ok_or_else(|| {
                LlmError::Configuration("openai provider requires llm.api_key".to_string())
            })?;
            let client =
                OpenAiClient::new(api_key, config.base_url.clone(), config.model.clone(), timeout)?;
            Ok(Arc::new(client))
        }
        LlmProvider::Ollama => {
            let base_url = config.base_url.clone().ok_or_else(|| {
                LlmError::Configuration("ollama provider requires llm.base_url".to_string())
            })?;
            Ok(Arc::new(OllamaClient::new(base_url, config.model.clone(), timeout)?))
        }
    }
}
