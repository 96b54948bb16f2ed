/*!
 * Error types for the cineglot engine.
 *
 * This module contains custom error types for different parts of the engine,
 * using the thiserror crate for ergonomic error definitions. The taxonomy
 * mirrors how failures are handled: transient provider errors are retried,
 * fatal provider errors abort the job, cache errors degrade to misses, and
 * job-level errors are surfaced to the caller as usage errors.
 */

use std::time::Duration;

use thiserror::Error;

/// Errors returned by model provider APIs.
///
/// Every upstream failure is mapped to exactly one of these kinds; anything
/// that does not fit the expected response shape becomes `MalformedResponse`.
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// Request could not be sent or the connection dropped mid-flight
    #[error("Connection error: {0}")]
    Connection(String),

    /// The request exceeded the configured timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The service signalled rate limiting (HTTP 429)
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// The service rejected our credentials (HTTP 401/403)
    #[error("Authentication failed: {0}")]
    AuthFailure(String),

    /// The service reported quota exhaustion
    #[error("Quota exhausted: {0}")]
    QuotaExhausted(String),

    /// The service rejected the request as malformed (HTTP 400/422)
    #[error("Request rejected as malformed: {0}")]
    MalformedRequest(String),

    /// The response did not have the expected shape
    #[error("Malformed response from provider: {0}")]
    MalformedResponse(String),

    /// A server-side error (HTTP 5xx)
    #[error("Server error ({status_code}): {message}")]
    ServerError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the service
        message: String,
    },
}

impl ProviderError {
    /// Whether this error is worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Timeout(_) | Self::RateLimited(_) | Self::ServerError { .. }
        )
    }

    /// Whether this error makes further requests pointless for the whole job.
    ///
    /// A malformed response is non-retryable for its request but does not
    /// condemn the job; auth and quota failures do.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::AuthFailure(_) | Self::QuotaExhausted(_))
    }
}

/// Errors that can occur in the cache tiers.
///
/// Tier failures are logged and degrade to misses inside the cache manager;
/// this type only crosses module boundaries for genuinely broken state.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The disk tier could not be opened or queried
    #[error("Disk cache error: {0}")]
    Disk(String),

    /// The remote tier returned an unusable response
    #[error("Remote cache error: {0}")]
    Remote(String),

    /// A cache payload could not be serialized or deserialized
    #[error("Cache payload serialization error: {0}")]
    Serialization(String),
}

/// Errors surfaced by the translation engine itself.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A batch was built from an empty entry set
    #[error("Malformed batch: {0}")]
    MalformedBatch(String),

    /// Output assembly was requested before every entry reached a terminal status
    #[error("Incomplete job: {unresolved} entries are still pending or in flight")]
    IncompleteJob {
        /// Number of entries not yet terminal
        unresolved: usize,
    },

    /// The circuit breaker is open and rejecting dispatches
    #[error("Circuit breaker open, retry after {cooldown:?}")]
    CircuitOpen {
        /// Remaining cooldown before a probe is allowed
        cooldown: Duration,
    },

    /// A fatal provider error that aborts the whole job
    #[error("Fatal provider error: {0}")]
    Fatal(ProviderError),

    /// A non-fatal provider error that exhausted its retries
    #[error("Provider error after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// Number of attempts made
        attempts: u32,
        /// The last error observed
        source: ProviderError,
    },

    /// The job was cancelled by its owner
    #[error("Job cancelled")]
    Cancelled,

    /// Error from a cache tier
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

impl From<ProviderError> for EngineError {
    fn from(error: ProviderError) -> Self {
        if error.is_fatal() {
            Self::Fatal(error)
        } else {
            Self::RetriesExhausted { attempts: 1, source: error }
        }
    }
}
