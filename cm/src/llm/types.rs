//! Completion request/response types
//!
//! Shaped after the OpenAI chat completions API, which the ASI1 backend
//! speaks. Handlers send a single user message per call.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// A completion request - everything needed for one generation call
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// User messages (handlers send exactly one)
    pub messages: Vec<Message>,

    /// Sampling temperature, fixed per handler
    pub temperature: f32,

    /// Max tokens for the response (capped by config)
    pub max_tokens: u32,
}

impl CompletionRequest {
    /// Build a request carrying one user prompt
    pub fn prompt(text: impl Into<String>, temperature: f32, max_tokens: u32) -> Self {
        debug!(%temperature, %max_tokens, "CompletionRequest::prompt: called");
        Self {
            messages: vec![Message::user(text)],
            temperature,
            max_tokens,
        }
    }
}

/// A user message, sent with the `user` role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub content: String,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self { content: text.into() }
    }
}

/// Response from a completion request
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Text content (if any)
    pub content: Option<String>,

    /// Why the model stopped
    pub stop_reason: StopReason,

    /// Token usage, when the backend reports it
    pub usage: TokenUsage,
}

impl CompletionResponse {
    /// A plain text response, mostly for tests and mocks
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage::default(),
        }
    }
}

/// Why the model stopped generating
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    ContentFilter,
}

impl StopReason {
    /// Parse from an OpenAI-style `finish_reason`
    pub fn from_openai(s: Option<&str>) -> Self {
        debug!(?s, "StopReason::from_openai: called");
        match s {
            Some("length") => StopReason::MaxTokens,
            Some("content_filter") => StopReason::ContentFilter,
            _ => StopReason::EndTurn,
        }
    }
}

/// Token usage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}
