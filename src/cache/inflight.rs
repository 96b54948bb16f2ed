/*!
 * In-flight request deduplication.
 *
 * At most one upstream dispatch may be live per fingerprint. The first
 * caller to claim a fingerprint becomes its owner and is responsible for
 * resolving it; every later caller joins the owner's outcome through a
 * watch channel instead of dispatching again. Dropping an unresolved guard
 * releases the claim and wakes joiners with a cancellation error, so a
 * panicking owner cannot strand them.
 */

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;
use tokio::sync::watch;

use super::TranslationPayload;
use crate::errors::EngineError;

/// Outcome delivered to joiners of an in-flight dispatch. Errors are shared
/// behind an `Arc` because the same outcome fans out to every waiter.
pub type InFlightResult = Result<TranslationPayload, Arc<EngineError>>;

type OutcomeReceiver = watch::Receiver<Option<InFlightResult>>;

/// Result of claiming a fingerprint
pub enum InFlightClaim {
    /// This caller won the claim and must resolve the guard
    Owner(InFlightGuard),
    /// Another dispatch owns the fingerprint; await its outcome here
    Joined(OutcomeReceiver),
}

/// Map of fingerprints currently being dispatched
#[derive(Clone, Default)]
pub struct InFlightMap {
    inner: Arc<Mutex<HashMap<String, OutcomeReceiver>>>,
}

impl InFlightMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claim a fingerprint, or join the existing claim.
    pub fn claim(&self, fingerprint: &str) -> InFlightClaim {
        let mut inner = self.inner.lock();

        if let Some(rx) = inner.get(fingerprint) {
            debug!("Joining in-flight dispatch for {}", fingerprint);
            return InFlightClaim::Joined(rx.clone());
        }

        let (tx, rx) = watch::channel(None);
        inner.insert(fingerprint.to_string(), rx);

        InFlightClaim::Owner(InFlightGuard {
            fingerprint: fingerprint.to_string(),
            map: Arc::clone(&self.inner),
            tx: Some(tx),
        })
    }

    /// Number of fingerprints currently claimed
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether no dispatch is currently in flight
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Ownership of one in-flight fingerprint. The owner must call `resolve`
/// with the dispatch outcome; dropping without resolving releases the claim
/// and reports cancellation to joiners.
pub struct InFlightGuard {
    fingerprint: String,
    map: Arc<Mutex<HashMap<String, OutcomeReceiver>>>,
    tx: Option<watch::Sender<Option<InFlightResult>>>,
}

impl InFlightGuard {
    /// The claimed fingerprint
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Publish the outcome to joiners and release the claim.
    pub fn resolve(mut self, result: InFlightResult) {
        self.map.lock().remove(&self.fingerprint);
        if let Some(tx) = self.tx.take() {
            // send only fails when no joiner is listening, which is fine
            let _ = tx.send(Some(result));
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            self.map.lock().remove(&self.fingerprint);
            let _ = tx.send(Some(Err(Arc::new(EngineError::Cancelled))));
        }
    }
}

/// Await the outcome published by the owning dispatch.
pub async fn wait_for_outcome(mut rx: OutcomeReceiver) -> InFlightResult {
    loop {
        if let Some(result) = rx.borrow_and_update().clone() {
            return result;
        }
        if rx.changed().await.is_err() {
            // Sender dropped without publishing, treat as cancellation
            return Err(Arc::new(EngineError::Cancelled));
        }
    }
}
