use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config;

use super::{AssistantClient, AssistantError, ChatRole, ChatTurn, Completion, UnconfiguredAssistant};

/// Fixed generation parameters. Moderate creativity, bounded output;
/// callers cannot override these per call.
const TEMPERATURE: f32 = 0.3;
const MAX_OUTPUT_TOKENS: u32 = 1024;

const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Ollama HTTP client for local model inference.
pub struct OllamaClient {
    base_url: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OllamaClient {
    /// Create a new OllamaClient pointing at an Ollama instance.
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        }
    }

    /// Client configured from the environment, falling back to the local
    /// default instance.
    pub fn from_env() -> Self {
        let base_url = std::env::var(config::OLLAMA_URL_ENV)
            .unwrap_or_else(|_| config::DEFAULT_OLLAMA_URL.to_string());
        Self::new(&base_url, DEFAULT_TIMEOUT_SECS)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// One chat completion round. `images` (base64) attach to the final turn
    /// for vision models.
    pub(crate) fn chat(
        &self,
        model: &str,
        system: Option<&str>,
        turns: &[ChatTurn],
        images: Option<&[String]>,
    ) -> Result<ChatExchange, AssistantError> {
        let url = format!("{}/api/chat", self.base_url);

        let mut messages = Vec::with_capacity(turns.len() + 1);
        if let Some(system) = system {
            messages.push(WireMessage {
                role: "system",
                content: system,
                images: None,
            });
        }
        for (i, turn) in turns.iter().enumerate() {
            let is_last = i + 1 == turns.len();
            messages.push(WireMessage {
                role: match turn.role {
                    ChatRole::User => "user",
                    ChatRole::Assistant => "assistant",
                },
                content: &turn.content,
                images: if is_last { images } else { None },
            });
        }

        let body = ChatRequest {
            model,
            messages,
            stream: false,
            options: ChatOptions {
                temperature: TEMPERATURE,
                num_predict: MAX_OUTPUT_TOKENS,
            },
        };

        let response = self.client.post(&url).json(&body).send().map_err(|e| {
            if e.is_connect() {
                AssistantError::Connection(self.base_url.clone())
            } else if e.is_timeout() {
                AssistantError::Http(format!("Request timed out after {}s", self.timeout_secs))
            } else {
                AssistantError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(AssistantError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| AssistantError::ResponseParsing(e.to_string()))?;

        let tokens_used = match (parsed.prompt_eval_count, parsed.eval_count) {
            (None, None) => None,
            (p, e) => Some(p.unwrap_or(0) + e.unwrap_or(0)),
        };

        Ok(ChatExchange {
            text: parsed.message.content,
            model: parsed.model,
            tokens_used,
        })
    }

    /// Models the Ollama instance currently serves.
    pub fn list_models(&self) -> Result<Vec<String>, AssistantError> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self.client.get(&url).send().map_err(|e| {
            if e.is_connect() {
                AssistantError::Connection(self.base_url.clone())
            } else {
                AssistantError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(AssistantError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TagsResponse = response
            .json()
            .map_err(|e| AssistantError::ResponseParsing(e.to_string()))?;

        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }

    pub fn is_model_available(&self, model: &str) -> Result<bool, AssistantError> {
        let models = self.list_models()?;
        Ok(models.iter().any(|m| m.starts_with(model)))
    }
}

/// Raw outcome of one chat round.
pub(crate) struct ChatExchange {
    pub text: String,
    pub model: String,
    pub tokens_used: Option<u32>,
}

/// Production assistant backed by a configured Ollama chat model.
pub struct OllamaAssistant {
    client: OllamaClient,
    model: String,
}

impl OllamaAssistant {
    pub fn new(client: OllamaClient, model: String) -> Self {
        Self { client, model }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Construct only if the model is actually served by the Ollama instance.
    pub fn with_verified_model(client: OllamaClient, model: String) -> Option<Self> {
        match client.is_model_available(&model) {
            Ok(true) => {
                tracing::info!(model = %model, "Assistant model confirmed");
                Some(Self::new(client, model))
            }
            Ok(false) => {
                tracing::warn!(model = %model, "Assistant model not available on Ollama");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Cannot reach Ollama to verify assistant model");
                None
            }
        }
    }
}

impl AssistantClient for OllamaAssistant {
    fn complete(&self, system_prompt: &str, turns: &[ChatTurn]) -> Result<Completion, AssistantError> {
        let exchange = self.client.chat(&self.model, Some(system_prompt), turns, None)?;
        Ok(Completion {
            text: exchange.text,
            tokens_used: exchange.tokens_used,
            model_id: exchange.model,
        })
    }
}

/// Build the process-wide assistant from the environment. Returns the
/// fail-fast `UnconfiguredAssistant` when no model is configured; callers
/// receive it as an explicitly passed dependency, never a global.
pub fn assistant_from_env() -> Arc<dyn AssistantClient> {
    match std::env::var(config::ASSISTANT_MODEL_ENV) {
        Ok(model) if !model.trim().is_empty() => {
            tracing::info!(model = %model, "Using Ollama assistant");
            Arc::new(OllamaAssistant::new(OllamaClient::from_env(), model))
        }
        _ => {
            tracing::warn!(
                "{} not set; AI features disabled",
                config::ASSISTANT_MODEL_ENV
            );
            Arc::new(UnconfiguredAssistant)
        }
    }
}

// ── Wire types ──────────────────────────────────────────────

/// Request body for Ollama /api/chat
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<&'a [String]>,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: u32,
}

/// Response body from Ollama /api/chat
#[derive(Deserialize)]
struct ChatResponse {
    model: String,
    message: ResponseMessage,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Response body from Ollama /api/tags
#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<TaggedModel>,
}

#[derive(Deserialize)]
struct TaggedModel {
    name: String,
}
