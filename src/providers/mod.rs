/*!
 * Provider implementations for the upstream model API.
 *
 * This module contains the client abstraction the dispatch layer talks to:
 * - `deepseek`: DeepSeek chat-completions client (OpenAI-compatible wire format)
 * - `mock`: scripted provider for tests
 */

use async_trait::async_trait;
use std::fmt::Debug;

use crate::errors::ProviderError;

/// A chat message in a completion request
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    /// Role of the message sender (system, user, assistant)
    pub role: String,

    /// Content of the message
    pub content: String,
}

impl ChatMessage {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

/// Request payload handed to a provider
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Model identifier
    pub model: String,

    /// Conversation messages (system prompt first)
    pub messages: Vec<ChatMessage>,

    /// Sampling temperature
    pub temperature: f32,

    /// Maximum tokens to generate
    pub max_tokens: u32,
}

/// Response payload from a provider
#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// The generated text
    pub text: String,

    /// Prompt token count, when the service reports it
    pub prompt_tokens: Option<u64>,

    /// Completion token count, when the service reports it
    pub completion_tokens: Option<u64>,
}

/// Common trait for all model providers.
///
/// The trait is object-safe so the dispatch layer can hold any provider
/// behind `Arc<dyn Provider>`; retry, backoff, and circuit breaking live in
/// the dispatcher, not in individual clients.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// Complete a chat request, returning the structured response or a
    /// kind-tagged error. A response that does not match the expected wire
    /// shape must be reported as `ProviderError::MalformedResponse`.
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError>;

    /// Test the connection to the provider
    async fn test_connection(&self) -> Result<(), ProviderError>;
}

pub mod deepseek;
pub mod mock;
