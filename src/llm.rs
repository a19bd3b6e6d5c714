//! Chat-completions client for the local llama-server.
//!
//! Talks the OpenAI-compatible `/v1/chat/completions` wire format. Each
//! call is a single independent request — the curator threads context
//! between calls itself; there is no conversation state here and no
//! automatic retry (retry policy belongs to the cycle scheduler).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{GalleryError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Client for one chat-completions endpoint.
pub struct LlmClient {
    url: String,
    model: String,
    temperature: f32,
    timeout: Duration,
    http: reqwest::Client,
}

impl LlmClient {
    /// Build a client with a bounded per-request timeout.
    pub fn new(url: String, timeout: Duration) -> Self {
        Self {
            url,
            // llama-server serves whatever model it was started with.
            model: "default".to_string(),
            temperature: 0.8,
            timeout,
            http: reqwest::Client::new(),
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// Single-turn completion: system prompt + one user message, returns
    /// the first choice's text trimmed of surrounding whitespace.
    pub async fn complete(&self, system: &str, user: &str, max_tokens: u32) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            max_tokens,
            temperature: self.temperature,
        };

        let resp = self
            .http
            .post(&self.url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| GalleryError::TextGeneration(format!("request to {}: {e}", self.url)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let head: String = body.chars().take(200).collect();
            return Err(GalleryError::TextGeneration(format!(
                "endpoint returned {status}: {head}"
            )));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| GalleryError::TextGeneration(format!("bad response body: {e}")))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GalleryError::TextGeneration("response had no choices".into()))?;

        Ok(choice.message.content.trim().to_string())
    }
}
