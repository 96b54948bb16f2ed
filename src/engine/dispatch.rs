/*!
 * Provider dispatch with admission control and retry.
 *
 * Every upstream call passes through a semaphore bounding concurrency and
 * the shared circuit breaker. Transient failures are retried with
 * exponentially growing, jittered backoff up to the configured attempt
 * limit; fatal failures and malformed responses are returned immediately.
 */

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use rand::Rng;
use tokio::sync::Semaphore;

use crate::app_config::EngineConfig;
use crate::engine::breaker::CircuitBreaker;
use crate::errors::{EngineError, ProviderError};
use crate::providers::{ChatRequest, ChatResponse, Provider};

/// Per-dispatch retry bookkeeping: attempt count and backoff schedule.
#[derive(Debug)]
pub struct RetryState {
    attempt: u32,
    max_attempts: u32,
    backoff_base_ms: u64,
    backoff_max_ms: u64,
}

impl RetryState {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            attempt: 0,
            max_attempts: config.max_attempts.max(1),
            backoff_base_ms: config.backoff_base_ms,
            backoff_max_ms: config.backoff_max_ms,
        }
    }

    /// Attempts made so far (1-based after the first `begin_attempt`)
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Count the attempt about to be made.
    fn begin_attempt(&mut self) {
        self.attempt += 1;
    }

    /// After a transient failure: the jittered delay before the next
    /// attempt, or `None` when the attempt budget is spent.
    fn next_delay(&self) -> Option<Duration> {
        if self.attempt >= self.max_attempts {
            return None;
        }
        let exp = self
            .backoff_base_ms
            .checked_shl(self.attempt.saturating_sub(1))
            .unwrap_or(u64::MAX)
            .min(self.backoff_max_ms);
        let jitter = if exp > 0 { rand::rng().random_range(0..=exp / 4) } else { 0 };
        Some(Duration::from_millis(exp + jitter))
    }
}

/// Bounded, breaker-guarded gateway to the provider
pub struct Dispatcher {
    provider: Arc<dyn Provider>,
    breaker: Arc<CircuitBreaker>,
    semaphore: Arc<Semaphore>,
    max_attempts: u32,
    backoff_base_ms: u64,
    backoff_max_ms: u64,
    dispatches: AtomicU64,
    retries: AtomicU64,
}

impl Dispatcher {
    pub fn new(provider: Arc<dyn Provider>, config: &EngineConfig) -> Self {
        Self {
            provider,
            breaker: Arc::new(CircuitBreaker::from_config(config)),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_requests)),
            max_attempts: config.max_attempts.max(1),
            backoff_base_ms: config.backoff_base_ms,
            backoff_max_ms: config.backoff_max_ms,
            dispatches: AtomicU64::new(0),
            retries: AtomicU64::new(0),
        }
    }

    /// Total provider calls made so far
    pub fn dispatch_count(&self) -> u64 {
        self.dispatches.load(Ordering::Relaxed)
    }

    /// Total retry attempts (calls beyond the first per request)
    pub fn retry_count(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    /// The shared breaker, for callers that want to inspect its state
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Send one chat request through admission control and the retry loop.
    pub async fn dispatch(&self, request: ChatRequest) -> Result<ChatResponse, EngineError> {
        // Holding the permit across the whole retry loop keeps a struggling
        // request from multiplying upstream pressure.
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| EngineError::Cancelled)?;

        let mut retry = RetryState {
            attempt: 0,
            max_attempts: self.max_attempts,
            backoff_base_ms: self.backoff_base_ms,
            backoff_max_ms: self.backoff_max_ms,
        };

        loop {
            retry.begin_attempt();
            self.breaker.preflight()?;
            self.dispatches.fetch_add(1, Ordering::Relaxed);

            match self.provider.complete(request.clone()).await {
                Ok(response) => {
                    self.breaker.record_success();
                    return Ok(response);
                }
                Err(error) if error.is_fatal() => {
                    self.breaker.record_failure();
                    warn!("Fatal provider error on attempt {}: {}", retry.attempt(), error);
                    return Err(EngineError::Fatal(error));
                }
                Err(error) if !error.is_transient() => {
                    // Malformed request/response: retrying the identical
                    // request cannot change the outcome.
                    self.breaker.record_failure();
                    return Err(EngineError::RetriesExhausted {
                        attempts: retry.attempt(),
                        source: error,
                    });
                }
                Err(error) => {
                    self.breaker.record_failure();
                    let Some(delay) = retry.next_delay() else {
                        warn!("Giving up after {} attempts: {}", retry.attempt(), error);
                        return Err(EngineError::RetriesExhausted {
                            attempts: retry.attempt(),
                            source: error,
                        });
                    };

                    debug!(
                        "Transient provider error on attempt {} ({}), retrying in {:?}",
                        retry.attempt(),
                        error,
                        delay
                    );
                    self.retries.fetch_add(1, Ordering::Relaxed);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mock::{MockFailure, MockProvider};
    use crate::providers::ChatMessage;

    fn request() -> ChatRequest {
        ChatRequest {
            model: "mock".to_string(),
            messages: vec![ChatMessage::user("<<ENTRY_0>>\nHi.\n<<END>>")],
            temperature: 0.0,
            max_tokens: 256,
        }
    }

    fn fast_config() -> EngineConfig {
        EngineConfig {
            max_attempts: 4,
            backoff_base_ms: 1,
            backoff_max_ms: 4,
            breaker_failure_threshold: 100,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_dispatch_workingProvider_shouldSucceedFirstTry() {
        let provider = MockProvider::working();
        let dispatcher = Dispatcher::new(Arc::new(provider.clone()), &fast_config());

        assert!(dispatcher.dispatch(request()).await.is_ok());
        assert_eq!(dispatcher.dispatch_count(), 1);
        assert_eq!(dispatcher.retry_count(), 0);
    }

    #[tokio::test]
    async fn test_dispatch_transientFailures_shouldRetryUntilSuccess() {
        let provider = MockProvider::fail_then_succeed(2);
        let dispatcher = Dispatcher::new(Arc::new(provider.clone()), &fast_config());

        assert!(dispatcher.dispatch(request()).await.is_ok());
        assert_eq!(provider.call_count(), 3);
        assert_eq!(dispatcher.retry_count(), 2);
    }

    #[tokio::test]
    async fn test_dispatch_persistentTransientFailure_shouldExhaustRetries() {
        let provider = MockProvider::failing(MockFailure::ServerError);
        let dispatcher = Dispatcher::new(Arc::new(provider.clone()), &fast_config());

        let err = dispatcher.dispatch(request()).await.unwrap_err();
        match err {
            EngineError::RetriesExhausted { attempts, .. } => assert_eq!(attempts, 4),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(provider.call_count(), 4);
    }

    #[tokio::test]
    async fn test_dispatch_fatalError_shouldNotRetry() {
        let provider = MockProvider::failing(MockFailure::AuthFailure);
        let dispatcher = Dispatcher::new(Arc::new(provider.clone()), &fast_config());

        let err = dispatcher.dispatch(request()).await.unwrap_err();
        assert!(matches!(err, EngineError::Fatal(_)));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_breakerTripped_shouldRejectWithoutCalling() {
        let config = EngineConfig {
            max_attempts: 1,
            backoff_base_ms: 1,
            backoff_max_ms: 1,
            breaker_failure_threshold: 2,
            breaker_cooldown_ms: 60_000,
            ..Default::default()
        };
        let provider = MockProvider::failing(MockFailure::ServerError);
        let dispatcher = Dispatcher::new(Arc::new(provider.clone()), &config);

        assert!(dispatcher.dispatch(request()).await.is_err());
        assert!(dispatcher.dispatch(request()).await.is_err());

        let err = dispatcher.dispatch(request()).await.unwrap_err();
        assert!(matches!(err, EngineError::CircuitOpen { .. }));
        assert_eq!(provider.call_count(), 2);
    }

    #[test]
    fn test_retryState_backoff_shouldGrowAndCapAtMax() {
        let config = EngineConfig {
            max_attempts: 12,
            backoff_base_ms: 100,
            backoff_max_ms: 400,
            ..Default::default()
        };
        let mut retry = RetryState::new(&config);

        retry.begin_attempt();
        let first = retry.next_delay().unwrap().as_millis() as u64;
        retry.begin_attempt();
        let second = retry.next_delay().unwrap().as_millis() as u64;
        for _ in 0..8 {
            retry.begin_attempt();
        }
        let far = retry.next_delay().unwrap().as_millis() as u64;

        assert!((100..=125).contains(&first));
        assert!((200..=250).contains(&second));
        assert!((400..=500).contains(&far));
    }

    #[test]
    fn test_retryState_exhaustedBudget_shouldYieldNoDelay() {
        let config = EngineConfig { max_attempts: 2, ..Default::default() };
        let mut retry = RetryState::new(&config);

        retry.begin_attempt();
        assert!(retry.next_delay().is_some());
        retry.begin_attempt();
        assert!(retry.next_delay().is_none());
    }
}
