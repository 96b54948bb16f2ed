/*!
 * Mock provider implementations for testing.
 *
 * This module provides mock providers that simulate different behaviors:
 * - `MockProvider::working()` - Always succeeds, echoing entries through a transform
 * - `MockProvider::fail_then_succeed(n)` - Transient failures before succeeding
 * - `MockProvider::failing(..)` - Always fails with a chosen error kind
 * - `MockProvider::succeed_then_fail(..)` - Succeeds a fixed number of times, then fails
 * - `MockProvider::malformed()` - Succeeds with a response missing the markers
 */

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::ProviderError;
use crate::providers::{ChatRequest, ChatResponse, Provider};

/// Failure kind produced by a failing mock
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockFailure {
    /// HTTP 500-class failure (transient)
    ServerError,
    /// Rate limit signal (transient)
    RateLimited,
    /// Auth rejection (fatal)
    AuthFailure,
    /// Request timeout (transient)
    Timeout,
}

impl MockFailure {
    fn to_error(self) -> ProviderError {
        match self {
            Self::ServerError => ProviderError::ServerError {
                status_code: 503,
                message: "simulated server failure".to_string(),
            },
            Self::RateLimited => ProviderError::RateLimited("simulated rate limit".to_string()),
            Self::AuthFailure => ProviderError::AuthFailure("simulated bad key".to_string()),
            Self::Timeout => ProviderError::Timeout(Duration::from_secs(1)),
        }
    }
}

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with a marker-shaped translation
    Working,
    /// First `failures` calls fail transiently, the rest succeed
    FailThenSucceed { failures: usize },
    /// Always fails with the given kind
    Failing(MockFailure),
    /// First `successes` calls succeed, the rest fail with the given kind
    SucceedThenFail { successes: usize, failure: MockFailure },
    /// Succeeds but the response lacks the expected markers
    Malformed,
    /// Succeeds after a delay (for cancellation testing)
    Slow { delay_ms: u64 },
}

/// Mock provider for exercising the dispatch pipeline without a network
#[derive(Debug)]
pub struct MockProvider {
    /// Behavior mode
    behavior: MockBehavior,
    /// Total completed calls, shared across clones
    call_count: Arc<AtomicUsize>,
    /// Per-entry text transform applied by successful responses
    transform: Option<fn(&str) -> String>,
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self { behavior, call_count: Arc::new(AtomicUsize::new(0)), transform: None }
    }

    /// Create a working mock provider that echoes entries unchanged
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Create a mock that fails transiently `failures` times, then succeeds
    pub fn fail_then_succeed(failures: usize) -> Self {
        Self::new(MockBehavior::FailThenSucceed { failures })
    }

    /// Create a mock that always fails with the given kind
    pub fn failing(failure: MockFailure) -> Self {
        Self::new(MockBehavior::Failing(failure))
    }

    /// Create a mock that succeeds `successes` times, then fails with the
    /// given kind
    pub fn succeed_then_fail(successes: usize, failure: MockFailure) -> Self {
        Self::new(MockBehavior::SucceedThenFail { successes, failure })
    }

    /// Create a mock that returns marker-free responses
    pub fn malformed() -> Self {
        Self::new(MockBehavior::Malformed)
    }

    /// Create a mock that succeeds after a delay
    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Set a per-entry transform applied to successful responses
    pub fn with_transform(mut self, transform: fn(&str) -> String) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Number of `complete` calls observed so far
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Extract the entry texts between markers from the user prompt
    fn extract_entries(prompt: &str) -> Vec<String> {
        let mut entries = Vec::new();
        let mut idx = 0;
        loop {
            let start_marker = format!("<<ENTRY_{}>>", idx);
            let Some(start) = prompt.find(&start_marker) else { break };
            let body_start = start + start_marker.len();

            let next_marker = format!("<<ENTRY_{}>>", idx + 1);
            let end = prompt[body_start..]
                .find(&next_marker)
                .or_else(|| prompt[body_start..].find("<<END>>"))
                .map(|pos| body_start + pos)
                .unwrap_or(prompt.len());

            entries.push(prompt[body_start..end].trim().to_string());
            idx += 1;
        }
        entries
    }

    fn render_response(&self, request: &ChatRequest) -> String {
        let prompt = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or("");

        let mut response = String::new();
        for (i, entry) in Self::extract_entries(prompt).iter().enumerate() {
            let translated = match self.transform {
                Some(transform) => transform(entry),
                None => entry.clone(),
            };
            response.push_str(&format!("<<ENTRY_{}>>\n{}\n", i, translated));
        }
        response.push_str("<<END>>");
        response
    }
}

impl Clone for MockProvider {
    fn clone(&self) -> Self {
        Self {
            behavior: self.behavior,
            call_count: Arc::clone(&self.call_count),
            transform: self.transform,
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let count = self.call_count.fetch_add(1, Ordering::SeqCst);

        match self.behavior {
            MockBehavior::Working => Ok(ChatResponse {
                text: self.render_response(&request),
                prompt_tokens: Some(10),
                completion_tokens: Some(10),
            }),

            MockBehavior::FailThenSucceed { failures } => {
                if count < failures {
                    Err(MockFailure::ServerError.to_error())
                } else {
                    Ok(ChatResponse {
                        text: self.render_response(&request),
                        prompt_tokens: Some(10),
                        completion_tokens: Some(10),
                    })
                }
            }

            MockBehavior::Failing(failure) => Err(failure.to_error()),

            MockBehavior::SucceedThenFail { successes, failure } => {
                if count < successes {
                    Ok(ChatResponse {
                        text: self.render_response(&request),
                        prompt_tokens: Some(10),
                        completion_tokens: Some(10),
                    })
                } else {
                    Err(failure.to_error())
                }
            }

            MockBehavior::Malformed => Ok(ChatResponse {
                text: "Sure! Here are your translations without any markers.".to_string(),
                prompt_tokens: Some(10),
                completion_tokens: Some(10),
            }),

            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Ok(ChatResponse {
                    text: self.render_response(&request),
                    prompt_tokens: Some(10),
                    completion_tokens: Some(10),
                })
            }
        }
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        match self.behavior {
            MockBehavior::Failing(failure) => Err(failure.to_error()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ChatMessage;

    fn request_with_entries(entries: &[&str]) -> ChatRequest {
        let mut prompt = String::new();
        for (i, entry) in entries.iter().enumerate() {
            prompt.push_str(&format!("<<ENTRY_{}>>\n{}\n", i, entry));
        }
        prompt.push_str("<<END>>");

        ChatRequest {
            model: "mock".to_string(),
            messages: vec![ChatMessage::user(prompt)],
            temperature: 0.0,
            max_tokens: 256,
        }
    }

    #[tokio::test]
    async fn test_workingProvider_shouldEchoEntriesWithMarkers() {
        let provider = MockProvider::working();
        let response =
            provider.complete(request_with_entries(&["Hello.", "Goodbye."])).await.unwrap();

        assert!(response.text.contains("<<ENTRY_0>>\nHello."));
        assert!(response.text.contains("<<ENTRY_1>>\nGoodbye."));
        assert!(response.text.ends_with("<<END>>"));
    }

    #[tokio::test]
    async fn test_transform_shouldApplyPerEntry() {
        let provider =
            MockProvider::working().with_transform(|text| text.replace("John", "约翰"));
        let response =
            provider.complete(request_with_entries(&["John waves.", "Hi."])).await.unwrap();

        assert!(response.text.contains("约翰 waves."));
        assert!(response.text.contains("<<ENTRY_1>>\nHi."));
    }

    #[tokio::test]
    async fn test_failThenSucceed_shouldRecoverAfterConfiguredFailures() {
        let provider = MockProvider::fail_then_succeed(2);
        let request = request_with_entries(&["Hi."]);

        assert!(provider.complete(request.clone()).await.is_err());
        assert!(provider.complete(request.clone()).await.is_err());
        assert!(provider.complete(request).await.is_ok());
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_succeedThenFail_shouldFailAfterConfiguredSuccesses() {
        let provider = MockProvider::succeed_then_fail(1, MockFailure::AuthFailure);
        let request = request_with_entries(&["Hi."]);

        assert!(provider.complete(request.clone()).await.is_ok());
        let err = provider.complete(request).await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_clonedProvider_shouldShareCallCount() {
        let provider = MockProvider::working();
        let cloned = provider.clone();

        provider.complete(request_with_entries(&["Hi."])).await.unwrap();
        cloned.complete(request_with_entries(&["Hi."])).await.unwrap();

        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_failingProvider_shouldReturnChosenKind() {
        let provider = MockProvider::failing(MockFailure::AuthFailure);
        let err = provider.complete(request_with_entries(&["Hi."])).await.unwrap_err();
        assert!(err.is_fatal());
    }
}
