/*!
 * Shared remote cache tier.
 *
 * Talks to a plain HTTP key-value service: GET and PUT on
 * `{base}/cache/{fingerprint}` with JSON payloads. The tier is strictly
 * best-effort; any transport or protocol failure is logged and degrades to
 * a miss so the remote service can disappear without failing a job.
 */

use std::time::Duration;

use log::{debug, warn};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::TranslationPayload;

const REMOTE_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Wire shape stored by the remote service
#[derive(Debug, Serialize, Deserialize)]
struct WireEntry {
    payload: TranslationPayload,
    ttl_secs: u64,
}

/// Best-effort shared tier reached over HTTP
#[derive(Debug, Clone)]
pub struct RemoteCache {
    client: Client,
    base_url: String,
}

impl RemoteCache {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(REMOTE_REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn entry_url(&self, fingerprint: &str) -> String {
        format!("{}/cache/{}", self.base_url, fingerprint)
    }

    /// Look up a fingerprint. Any failure is a miss.
    pub async fn get(&self, fingerprint: &str) -> Option<TranslationPayload> {
        let response = match self.client.get(self.entry_url(fingerprint)).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Remote cache unreachable, treating as miss: {}", e);
                return None;
            }
        };

        match response.status() {
            StatusCode::OK => match response.json::<WireEntry>().await {
                Ok(entry) => Some(entry.payload),
                Err(e) => {
                    warn!("Remote cache returned unparseable entry for {}: {}", fingerprint, e);
                    None
                }
            },
            StatusCode::NOT_FOUND => None,
            status => {
                warn!("Remote cache get for {} returned {}, treating as miss", fingerprint, status);
                None
            }
        }
    }

    /// Store a payload. Failures are logged and swallowed.
    pub async fn put(&self, fingerprint: &str, payload: &TranslationPayload, ttl: Duration) {
        let entry = WireEntry { payload: payload.clone(), ttl_secs: ttl.as_secs() };

        match self.client.put(self.entry_url(fingerprint)).json(&entry).send().await {
            Ok(response) if response.status().is_success() => {
                debug!("Remote cache stored {}", fingerprint);
            }
            Ok(response) => {
                warn!("Remote cache put for {} returned {}", fingerprint, response.status());
            }
            Err(e) => {
                warn!("Remote cache put for {} failed: {}", fingerprint, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entryUrl_shouldNormalizeTrailingSlash() {
        let a = RemoteCache::new("http://cache.internal:9200");
        let b = RemoteCache::new("http://cache.internal:9200/");

        assert_eq!(a.entry_url("abc123"), "http://cache.internal:9200/cache/abc123");
        assert_eq!(a.entry_url("abc123"), b.entry_url("abc123"));
    }

    #[tokio::test]
    async fn test_get_unreachableService_shouldDegradeToMiss() {
        let cache = RemoteCache::new("http://127.0.0.1:1");
        assert!(cache.get("fp").await.is_none());
    }

    #[tokio::test]
    async fn test_put_unreachableService_shouldNotPanic() {
        let cache = RemoteCache::new("http://127.0.0.1:1");
        let payload = TranslationPayload { translations: vec!["text".to_string()] };
        cache.put("fp", &payload, Duration::from_secs(60)).await;
    }
}
