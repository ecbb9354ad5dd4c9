//! Ollama chat API client.
//!
//! All model calls go through the non-streaming `/api/chat` endpoint.
//! The client is wrapped in the [`TextModel`] trait so the pipeline can
//! be exercised in tests without a live backend.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// One completion request to the model backend.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    /// System prompt setting the model's role.
    pub system: String,
    /// The user prompt.
    pub prompt: String,
    /// Base64-encoded JPEG payloads for multimodal calls. Empty for
    /// text-only calls.
    pub images: Vec<String>,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            images: Vec::new(),
        }
    }

    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }
}

/// A text-producing model backend.
///
/// The only hard contract: each call returns a textual response.
#[async_trait]
pub trait TextModel: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}

/// Connection settings for the Ollama backend.
#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub ollama_url: String,
    pub model_name: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            ollama_url: "http://localhost:11434".to_string(),
            model_name: "llama3:8b".to_string(),
            temperature: 0.2,
            timeout_seconds: 300,
        }
    }
}

/// Message in the chat request.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<Vec<String>>,
}

/// Ollama chat API request.
#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Ollama chat API response.
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ResponseMessage,
    #[allow(dead_code)] // Response field, used for future stream handling
    done: bool,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[allow(dead_code)] // Response field
    role: String,
    content: String,
}

/// Client for the Ollama chat endpoint.
pub struct OllamaClient {
    settings: ModelSettings,
    http_client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(settings: ModelSettings) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            settings,
            http_client,
        })
    }
}

#[async_trait]
impl TextModel for OllamaClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let url = format!("{}/api/chat", self.settings.ollama_url);

        let user_message = ChatMessage {
            role: "user".to_string(),
            content: request.prompt,
            images: if request.images.is_empty() {
                None
            } else {
                Some(request.images)
            },
        };

        let chat_request = OllamaChatRequest {
            model: self.settings.model_name.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: request.system,
                    images: None,
                },
                user_message,
            ],
            stream: false,
            options: OllamaOptions {
                temperature: self.settings.temperature,
            },
        };

        debug!("Sending chat request to {}", url);

        let response = self
            .http_client
            .post(&url)
            .json(&chat_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    anyhow::anyhow!(
                        "Request timed out after {}s",
                        self.settings.timeout_seconds
                    )
                } else if e.is_connect() {
                    anyhow::anyhow!(
                        "Cannot connect to Ollama at {}. Is Ollama running?",
                        self.settings.ollama_url
                    )
                } else {
                    anyhow::anyhow!("Failed to send request: {}", e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Ollama API error {}: {}", status, body));
        }

        let chat_response: OllamaChatResponse = response
            .json()
            .await
            .context("Failed to parse Ollama response")?;

        Ok(chat_response.message.content)
    }
}
