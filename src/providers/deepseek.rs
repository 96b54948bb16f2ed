use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::errors::ProviderError;
use crate::providers::{ChatMessage, ChatRequest, ChatResponse, Provider};

/// DeepSeek client speaking the OpenAI-compatible chat-completions protocol
#[derive(Debug)]
pub struct DeepSeek {
    /// HTTP client for API requests
    client: Client,
    /// API key for bearer authentication
    api_key: String,
    /// API endpoint URL
    endpoint: String,
    /// Request timeout, also used for the error kind on expiry
    timeout: Duration,
}

/// Wire request body
#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

/// Wire message format
#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Wire response body
#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
}

#[derive(Debug, Deserialize)]
struct WireResponseMessage {
    content: String,
}

/// Token usage information
#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

/// Error body shape returned by the service
#[derive(Debug, Deserialize)]
struct WireError {
    error: Option<WireErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct WireErrorDetail {
    message: String,
    #[serde(rename = "type")]
    kind: Option<String>,
}

impl DeepSeek {
    /// Create a new DeepSeek client
    pub fn new(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        timeout_secs: u64,
    ) -> Self {
        let timeout = Duration::from_secs(timeout_secs);
        Self {
            client: Client::builder().timeout(timeout).build().unwrap_or_default(),
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            timeout,
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint.trim_end_matches('/'))
    }

    /// Map an HTTP error status and body to a kind-tagged provider error
    fn map_status_error(status: StatusCode, body: &str) -> ProviderError {
        let message = serde_json::from_str::<WireError>(body)
            .ok()
            .and_then(|e| e.error)
            .map(|d| match d.kind {
                Some(kind) => format!("{}: {}", kind, d.message),
                None => d.message,
            })
            .unwrap_or_else(|| body.chars().take(200).collect());

        match status.as_u16() {
            401 | 403 => ProviderError::AuthFailure(message),
            402 => ProviderError::QuotaExhausted(message),
            429 => {
                // DeepSeek reports both rate limiting and exhausted balance as 429
                if message.contains("Insufficient") || message.contains("quota") {
                    ProviderError::QuotaExhausted(message)
                } else {
                    ProviderError::RateLimited(message)
                }
            }
            400 | 404 | 422 => ProviderError::MalformedRequest(message),
            code if status.is_server_error() => {
                ProviderError::ServerError { status_code: code, message }
            }
            code => ProviderError::ServerError { status_code: code, message },
        }
    }

    fn map_transport_error(&self, error: reqwest::Error) -> ProviderError {
        if error.is_timeout() {
            ProviderError::Timeout(self.timeout)
        } else {
            ProviderError::Connection(error.to_string())
        }
    }
}

#[async_trait]
impl Provider for DeepSeek {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let body = WireRequest {
            model: &request.model,
            messages: request
                .messages
                .iter()
                .map(|m| WireMessage { role: &m.role, content: &m.content })
                .collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .client
            .post(self.completions_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        if !status.is_success() {
            let err = Self::map_status_error(status, &text);
            error!("DeepSeek API error ({}): {}", status, err);
            return Err(err);
        }

        let wire: WireResponse = serde_json::from_str(&text).map_err(|e| {
            ProviderError::MalformedResponse(format!("unparseable response body: {}", e))
        })?;

        let choice = wire
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::MalformedResponse("empty choices array".to_string()))?;

        debug!(
            "DeepSeek completion received ({} prompt / {} completion tokens)",
            wire.usage.as_ref().map(|u| u.prompt_tokens).unwrap_or(0),
            wire.usage.as_ref().map(|u| u.completion_tokens).unwrap_or(0)
        );

        Ok(ChatResponse {
            text: choice.message.content,
            prompt_tokens: wire.usage.as_ref().map(|u| u.prompt_tokens),
            completion_tokens: wire.usage.as_ref().map(|u| u.completion_tokens),
        })
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        let request = ChatRequest {
            model: "deepseek-chat".to_string(),
            messages: vec![ChatMessage::user("Hello")],
            temperature: 0.0,
            max_tokens: 10,
        };
        self.complete(request).await?;
        Ok(())
    }
}
