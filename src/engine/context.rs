/*!
 * Bounded rolling context window.
 *
 * The window holds the most recent original/translated pairs in resolution
 * order and hands out immutable snapshots for request construction. Only the
 * orchestrator's finalization loop appends, so snapshots taken for two
 * different batches always reflect a well-defined prefix of the job.
 */

use std::collections::VecDeque;

use serde::Serialize;

/// One resolved dialogue line carried as context for later requests
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextPair {
    /// Original text
    pub original: String,
    /// Resolved translation
    pub translated: String,
}

/// Immutable view of the window at a point in time.
///
/// The snapshot participates in request fingerprints, so two requests built
/// against different snapshots (or different emphasis notes) never collide
/// in the cache.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContextSnapshot {
    /// Recent pairs, oldest first
    pub pairs: Vec<ContextPair>,

    /// Extra instruction carried by consistency re-translations
    pub note: Option<String>,
}

impl ContextSnapshot {
    /// Whether the snapshot carries nothing useful for the prompt
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty() && self.note.is_none()
    }

    /// Derive a snapshot carrying an emphasis note for a re-translation.
    pub fn with_note(&self, note: impl Into<String>) -> Self {
        Self { pairs: self.pairs.clone(), note: Some(note.into()) }
    }
}

/// Rolling window of the last N resolved pairs
#[derive(Debug)]
pub struct ContextWindowManager {
    pairs: VecDeque<ContextPair>,
    capacity: usize,
}

impl ContextWindowManager {
    /// Create a window bounded to `capacity` pairs. Zero capacity yields
    /// permanently empty snapshots.
    pub fn new(capacity: usize) -> Self {
        Self { pairs: VecDeque::with_capacity(capacity), capacity }
    }

    /// Append a resolved pair, evicting the oldest when full.
    pub fn append(&mut self, original: impl Into<String>, translated: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        while self.pairs.len() >= self.capacity {
            self.pairs.pop_front();
        }
        self.pairs.push_back(ContextPair {
            original: original.into(),
            translated: translated.into(),
        });
    }

    /// Take an immutable snapshot of the current window.
    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot { pairs: self.pairs.iter().cloned().collect(), note: None }
    }

    /// Number of pairs currently held
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether no pair has been appended yet
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
