use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// One reply from the reasoning capability.
#[derive(Debug, Clone)]
pub struct ReasoningReply {
    content: String,
}

impl ReasoningReply {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }

    pub fn text(&self) -> &str {
        &self.content
    }
}

#[derive(Debug, Error)]
pub enum ReasoningError {
    #[error("reasoning transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("reasoning API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("reasoning reply was empty")]
    EmptyReply,

    #[error("streaming is not supported by this backend")]
    StreamUnsupported,
}

/// Boundary to the external reasoning capability. `invoke` is the primary
/// transport; `stream` is an optional fallback whose chunks are
/// concatenated in arrival order.
#[async_trait]
pub trait ReasoningBackend: Send + Sync {
    async fn invoke(&self, prompt: &str) -> Result<ReasoningReply, ReasoningError>;

    async fn stream(&self, prompt: &str) -> Result<Vec<ReasoningReply>, ReasoningError> {
        let _ = prompt;
        Err(ReasoningError::StreamUnsupported)
    }
}

/// Run a prompt through `invoke`, falling back to the stream transport
/// when the primary call fails.
pub async fn complete(
    backend: &dyn ReasoningBackend,
    prompt: &str,
) -> Result<String, ReasoningError> {
    match backend.invoke(prompt).await {
        Ok(reply) => Ok(reply.text().to_string()),
        Err(err) => {
            debug!("invoke failed ({}), trying stream transport", err);
            let chunks = backend.stream(prompt).await?;
            let joined: String = chunks.iter().map(|c| c.text()).collect();
            if joined.is_empty() {
                Err(ReasoningError::EmptyReply)
            } else {
                Ok(joined)
            }
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Provider {
    Ollama,
    OpenAi,
}

#[derive(Debug, Clone)]
pub struct ReasoningConfig {
    pub provider: Provider,
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Ollama,
            api_key: None,
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.2:3b".to_string(),
            timeout_secs: 30,
        }
    }
}

impl ReasoningConfig {
    /// Create config from environment variables
    pub fn from_env() -> Result<Self> {
        let provider = std::env::var("REASONING_PROVIDER")
            .unwrap_or_else(|_| "ollama".to_string())
            .to_lowercase();

        let provider = match provider.as_str() {
            "openai" => Provider::OpenAi,
            _ => Provider::Ollama,
        };

        let base_url = match provider {
            Provider::Ollama => {
                std::env::var("OLLAMA_URL").unwrap_or_else(|_| "http://localhost:11434".to_string())
            }
            Provider::OpenAi => std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com".to_string()),
        };

        let model = match provider {
            Provider::Ollama => {
                std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama3.2:3b".to_string())
            }
            Provider::OpenAi => {
                std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string())
            }
        };

        let api_key = if provider == Provider::OpenAi {
            Some(
                std::env::var("OPENAI_API_KEY")
                    .context("OPENAI_API_KEY required for OpenAI provider")?,
            )
        } else {
            None
        };

        let timeout_secs = std::env::var("REASONING_TIMEOUT_SECS")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(30);

        Ok(Self {
            provider,
            api_key,
            base_url,
            model,
            timeout_secs,
        })
    }
}

/// Build a backend if reasoning is switched on; None disables tier 1.
pub fn backend_from_env() -> Option<Arc<dyn ReasoningBackend>> {
    let enabled = std::env::var("USE_REASONING")
        .unwrap_or_else(|_| "false".to_string())
        .to_lowercase();

    if enabled != "true" && enabled != "1" {
        return None;
    }

    match ReasoningConfig::from_env() {
        Ok(config) => {
            let backend: Arc<dyn ReasoningBackend> = match config.provider {
                Provider::Ollama => Arc::new(OllamaBackend::new(config)),
                Provider::OpenAi => Arc::new(OpenAiBackend::new(config)),
            };
            Some(backend)
        }
        Err(e) => {
            warn!("Failed to initialize reasoning backend: {}", e);
            None
        }
    }
}

// ============================================================================
// Ollama Adapter
// ============================================================================

pub struct OllamaBackend {
    config: ReasoningConfig,
    client: Client,
}

impl OllamaBackend {
    pub fn new(config: ReasoningConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap();

        Self { config, client }
    }
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

#[async_trait]
impl ReasoningBackend for OllamaBackend {
    async fn invoke(&self, prompt: &str) -> Result<ReasoningReply, ReasoningError> {
        let url = format!("{}/api/generate", self.config.base_url);

        let request_body = json!({
            "model": self.config.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": 0.3,
            }
        });

        debug!("Calling Ollama at {}", url);

        let response = self.client.post(&url).json(&request_body).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ReasoningError::Api { status, body });
        }

        let parsed: OllamaResponse = response.json().await?;
        Ok(ReasoningReply::new(parsed.response))
    }

    /// Fallback transport: request the chunked form and reassemble it.
    /// Ollama streams one JSON object per line, each with a `response`
    /// fragment.
    async fn stream(&self, prompt: &str) -> Result<Vec<ReasoningReply>, ReasoningError> {
        let url = format!("{}/api/generate", self.config.base_url);

        let request_body = json!({
            "model": self.config.model,
            "prompt": prompt,
            "stream": true,
        });

        debug!("Calling Ollama (stream) at {}", url);

        let response = self.client.post(&url).json(&request_body).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ReasoningError::Api { status, body });
        }

        let body = response.text().await?;
        let chunks = body
            .lines()
            .filter_map(|line| serde_json::from_str::<OllamaResponse>(line).ok())
            .map(|chunk| ReasoningReply::new(chunk.response))
            .collect::<Vec<_>>();

        if chunks.is_empty() {
            return Err(ReasoningError::EmptyReply);
        }
        Ok(chunks)
    }
}

// ============================================================================
// OpenAI Adapter
// ============================================================================

pub struct OpenAiBackend {
    config: ReasoningConfig,
    client: Client,
}

impl OpenAiBackend {
    pub fn new(config: ReasoningConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap();

        Self { config, client }
    }
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: String,
}

#[async_trait]
impl ReasoningBackend for OpenAiBackend {
    async fn invoke(&self, prompt: &str) -> Result<ReasoningReply, ReasoningError> {
        let url = format!("{}/v1/chat/completions", self.config.base_url);

        let request_body = json!({
            "model": self.config.model,
            "messages": [
                {
                    "role": "system",
                    "content": "You are a project-memory assistant. Reply with valid JSON only."
                },
                {
                    "role": "user",
                    "content": prompt
                }
            ],
            "temperature": 0.3,
        });

        debug!("Calling OpenAI at {}", url);

        let mut request = self.client.post(&url).json(&request_body);
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ReasoningError::Api { status, body });
        }

        let parsed: OpenAiResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| ReasoningReply::new(choice.message.content))
            .ok_or(ReasoningError::EmptyReply)
    }
}
