/*!
 * In-process cache tier.
 *
 * A bounded map keyed by fingerprint. Eviction is FIFO on insertion order
 * once the capacity is reached; expiry is checked lazily at lookup time.
 * Entries are immutable: re-inserting an identical payload is a no-op and a
 * differing payload is logged as corruption while the old entry is kept.
 */

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use log::warn;
use parking_lot::Mutex;

use super::TranslationPayload;

struct StoredEntry {
    payload: TranslationPayload,
    inserted_at: Instant,
    ttl: Duration,
}

impl StoredEntry {
    fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() > self.ttl
    }
}

struct Inner {
    entries: HashMap<String, StoredEntry>,
    insertion_order: VecDeque<String>,
}

/// Fast in-process tier
pub struct MemoryCache {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl MemoryCache {
    /// Create a tier bounded to `capacity` entries. Zero capacity makes
    /// every put a no-op.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                insertion_order: VecDeque::new(),
            }),
            capacity,
        }
    }

    /// Look up a fingerprint, removing it if expired.
    pub fn get(&self, fingerprint: &str) -> Option<TranslationPayload> {
        let mut inner = self.inner.lock();

        let expired = match inner.entries.get(fingerprint) {
            Some(entry) if entry.is_expired() => true,
            Some(entry) => return Some(entry.payload.clone()),
            None => return None,
        };

        if expired {
            inner.entries.remove(fingerprint);
            inner.insertion_order.retain(|k| k != fingerprint);
        }
        None
    }

    /// Insert a payload, evicting the oldest entry when at capacity.
    pub fn put(&self, fingerprint: &str, payload: &TranslationPayload, ttl: Duration) {
        if self.capacity == 0 {
            return;
        }

        let mut inner = self.inner.lock();

        if let Some(existing) = inner.entries.get(fingerprint) {
            if existing.payload != *payload {
                // Fingerprints are content-deterministic, so this should
                // never happen; keep the old entry and flag it.
                warn!(
                    "Cache corruption: fingerprint {} rewritten with differing payload, keeping original",
                    fingerprint
                );
            }
            return;
        }

        while inner.entries.len() >= self.capacity {
            match inner.insertion_order.pop_front() {
                Some(oldest) => {
                    inner.entries.remove(&oldest);
                }
                None => break,
            }
        }

        inner.entries.insert(
            fingerprint.to_string(),
            StoredEntry { payload: payload.clone(), inserted_at: Instant::now(), ttl },
        );
        inner.insertion_order.push_back(fingerprint.to_string());
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether the tier holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(text: &str) -> TranslationPayload {
        TranslationPayload { translations: vec![text.to_string()] }
    }

    #[test]
    fn test_putThenGet_shouldReturnPayload() {
        let cache = MemoryCache::new(4);
        cache.put("fp", &payload("hello"), Duration::from_secs(60));

        assert_eq!(cache.get("fp").unwrap().translations, vec!["hello"]);
    }

    #[test]
    fn test_capacityEviction_shouldDropOldestFirst() {
        let cache = MemoryCache::new(2);
        cache.put("fp-1", &payload("one"), Duration::from_secs(60));
        cache.put("fp-2", &payload("two"), Duration::from_secs(60));
        cache.put("fp-3", &payload("three"), Duration::from_secs(60));

        assert!(cache.get("fp-1").is_none());
        assert!(cache.get("fp-2").is_some());
        assert!(cache.get("fp-3").is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_expiredEntry_shouldBeRemovedOnGet() {
        let cache = MemoryCache::new(4);
        cache.put("fp", &payload("stale"), Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));

        assert!(cache.get("fp").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_idempotentPut_identicalPayload_shouldKeepSingleEntry() {
        let cache = MemoryCache::new(4);
        cache.put("fp", &payload("same"), Duration::from_secs(60));
        cache.put("fp", &payload("same"), Duration::from_secs(60));

        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_conflictingPut_shouldKeepOriginalPayload() {
        let cache = MemoryCache::new(4);
        cache.put("fp", &payload("original"), Duration::from_secs(60));
        cache.put("fp", &payload("imposter"), Duration::from_secs(60));

        assert_eq!(cache.get("fp").unwrap().translations, vec!["original"]);
    }

    #[test]
    fn test_zeroCapacity_shouldIgnorePuts() {
        let cache = MemoryCache::new(0);
        cache.put("fp", &payload("text"), Duration::from_secs(60));
        assert!(cache.get("fp").is_none());
    }
}
