//! AI assistant adapter: wraps chat completion behind one narrow trait.
//!
//! `OllamaAssistant` is the production implementation. A missing model
//! configuration yields `UnconfiguredAssistant`, which fails fast with
//! `AssistantError::Unavailable` so callers can report "feature not
//! configured" instead of a generic runtime failure.

pub mod ollama;

pub use ollama::*;

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssistantError {
    /// No model/credential configured. Distinct from runtime call failures.
    #[error("AI assistant is not configured: {0}")]
    Unavailable(String),

    #[error("Cannot reach Ollama at {0}")]
    Connection(String),

    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("Ollama returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse model response: {0}")]
    ResponseParsing(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One prior or current conversation turn, oldest first in a sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// A completed assistant call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    pub tokens_used: Option<u32>,
    pub model_id: String,
}

/// Chat completion boundary. Generation parameters (temperature, output cap)
/// are fixed configuration of the implementation, never caller-supplied.
pub trait AssistantClient: Send + Sync {
    fn complete(&self, system_prompt: &str, turns: &[ChatTurn]) -> Result<Completion, AssistantError>;
}

/// Stand-in used when no assistant model is configured. Every call fails
/// fast with `Unavailable`.
pub struct UnconfiguredAssistant;

impl AssistantClient for UnconfiguredAssistant {
    fn complete(&self, _system_prompt: &str, _turns: &[ChatTurn]) -> Result<Completion, AssistantError> {
        Err(AssistantError::Unavailable(format!(
            "no assistant model configured; set {}",
            crate::config::ASSISTANT_MODEL_ENV
        )))
    }
}

/// Recorded call made against a `MockAssistant`.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub system_prompt: String,
    pub turns: Vec<ChatTurn>,
}

/// Mock assistant for tests: returns a configurable response and records
/// every call for prompt assertions.
pub struct MockAssistant {
    response: String,
    fail_with: Option<String>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockAssistant {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            fail_with: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A mock whose calls always fail with a runtime (non-configuration) error.
    pub fn failing(message: &str) -> Self {
        Self {
            response: String::new(),
            fail_with: Some(message.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn last_call(&self) -> Option<RecordedCall> {
        self.calls().pop()
    }
}

impl AssistantClient for MockAssistant {
    fn complete(&self, system_prompt: &str, turns: &[ChatTurn]) -> Result<Completion, AssistantError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                system_prompt: system_prompt.to_string(),
                turns: turns.to_vec(),
            });
        }
        if let Some(message) = &self.fail_with {
            return Err(AssistantError::Http(message.clone()));
        }
        Ok(Completion {
            text: self.response.clone(),
            tokens_used: Some(42),
            model_id: "mock-model".into(),
        })
    }
}
