//! Ollama client for insight text generation.
//!
//! The model is treated as an opaque text generator: a prompt goes in and a
//! non-empty string comes out, or a failure with a readable message.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Failures from the insight generator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InsightError {
    #[error("Cannot connect to Ollama at {0}. Is Ollama running?")]
    Connection(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Ollama API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse Ollama response: {0}")]
    ResponseParsing(String),

    #[error("Model returned an empty response")]
    EmptyResponse,

    #[error("HTTP client error: {0}")]
    Client(String),
}

/// Anything that can turn a prompt into free text.
pub trait InsightGenerator {
    /// Generate text for `prompt`. A successful result is never empty.
    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String, InsightError>> + Send;
}

/// Configuration for the Ollama client.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub ollama_url: String,
    pub model_name: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            ollama_url: "http://localhost:11434".to_string(),
            model_name: "llama3.2:latest".to_string(),
            temperature: 0.7,
            timeout_seconds: 120,
        }
    }
}

impl From<&crate::config::ModelConfig> for OllamaConfig {
    fn from(config: &crate::config::ModelConfig) -> Self {
        Self {
            ollama_url: config.ollama_url.clone(),
            model_name: config.name.clone(),
            temperature: config.temperature,
            timeout_seconds: config.timeout_seconds,
        }
    }
}

/// Message in the chat request.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
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
    message: ChatMessage,
}

/// Insight generator backed by an Ollama instance.
pub struct OllamaClient {
    config: OllamaConfig,
    http_client: reqwest::Client,
}

impl OllamaClient {
    /// Create a new client.
    pub fn new(config: OllamaConfig) -> Result<Self, InsightError> {
        info!(
            "Initializing Ollama client with model {} at {}",
            config.model_name, config.ollama_url
        );

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| InsightError::Client(e.to_string()))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// The model name being used.
    pub fn model(&self) -> &str {
        &self.config.model_name
    }

    async fn send_prompt(&self, prompt: &str) -> Result<String, InsightError> {
        let url = format!("{}/api/chat", self.config.ollama_url.trim_end_matches('/'));

        let request = OllamaChatRequest {
            model: self.config.model_name.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            stream: false,
            options: OllamaOptions {
                temperature: self.config.temperature,
            },
        };

        debug!("Sending prompt ({} chars) to {}", prompt.len(), url);

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    InsightError::Timeout(self.config.timeout_seconds)
                } else if e.is_connect() {
                    InsightError::Connection(self.config.ollama_url.clone())
                } else {
                    InsightError::Client(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(InsightError::Api { status, body });
        }

        let chat_response: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| InsightError::ResponseParsing(e.to_string()))?;

        non_empty(chat_response.message.content)
    }
}

impl InsightGenerator for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String, InsightError> {
        self.send_prompt(prompt).await
    }
}

/// Reject blank model output.
fn non_empty(content: String) -> Result<String, InsightError> {
    if content.trim().is_empty() {
        Err(InsightError::EmptyResponse)
    } else {
        Ok(content)
    }
}

/// System prompt for all insight requests
const SYSTEM_PROMPT: &str = r#"You are a clinical nutrition assistant.
You receive HEIFA (Healthy Eating Index for Australian Adults) statistics.
Answer in plain text only, without markdown, headings, or preamble."#;
