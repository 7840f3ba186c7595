//! Text-completion boundary and an OpenAI-compatible chat client.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion request failed: {0}")]
    Request(String),
    #[error("completion request returned status {0}")]
    Status(u16),
    #[error("malformed completion response: {0}")]
    Response(String),
}

/// Prompt in, free text out. The text is untrusted.
#[async_trait]
pub trait TextCompletion: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;
}

const SYSTEM_ROLE_PROMPT: &str = "You are an expert system administrator. \
Answer with the JSON structure requested and nothing else.";

#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl ChatClient {
    pub fn new(
        endpoint: &str,
        model: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CompletionError::Request(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TextCompletion for ChatClient {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let payload = build_request(&self.model, prompt);
        let mut request = self.client.post(&self.endpoint).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        debug!("Requesting completion from {}", self.endpoint);
        let resp = request
            .send()
            .await
            .map_err(|e| CompletionError::Request(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(CompletionError::Status(resp.status().as_u16()));
        }

        let value: Value = resp
            .json()
            .await
            .map_err(|e| CompletionError::Response(e.to_string()))?;
        extract_message(&value)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    stream: bool,
    messages: [MessagePayload<'a>; 2],
}

#[derive(Serialize)]
struct MessagePayload<'a> {
    role: &'a str,
    content: &'a str,
}

fn build_request<'a>(model: &'a str, prompt: &'a str) -> ChatRequest<'a> {
    ChatRequest {
        model,
        temperature: 0.2,
        stream: false,
        messages: [
            MessagePayload {
                role: "system",
                content: SYSTEM_ROLE_PROMPT,
            },
            MessagePayload {
                role: "user",
                content: prompt,
            },
        ],
    }
}

fn extract_message(value: &Value) -> Result<String, CompletionError> {
    let first = value
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .ok_or_else(|| CompletionError::Response("missing choices".to_string()))?;
    let content = first
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .ok_or_else(|| CompletionError::Response("missing message content".to_string()))?;
    Ok(content.trim().to_string())
}
