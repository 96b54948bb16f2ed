/*!
 * Batch construction, prompt formatting, and request fingerprints.
 *
 * Entries are grouped greedily under a character budget, preserving order.
 * Each batch is rendered into a marker-delimited prompt the response parser
 * can split back apart, and identified by a fingerprint hashed over every
 * input that can change the translation: the entry texts and indices, the
 * context snapshot (including any emphasis note), the profile version, and
 * the target language.
 */

use log::trace;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::app_config::{EngineConfig, ProviderConfig};
use crate::engine::context::ContextSnapshot;
use crate::errors::{EngineError, ProviderError};
use crate::movie_profile::MovieProfile;
use crate::providers::{ChatMessage, ChatRequest};

/// Closing marker ending the entry list in both prompt and response
pub const END_MARKER: &str = "<<END>>";

/// Opening marker for entry `i`
pub fn entry_marker(i: usize) -> String {
    format!("<<ENTRY_{}>>", i)
}

/// One subtitle entry as carried through a batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchEntry {
    /// Index into the sequencer
    pub index: usize,
    /// Original text to translate
    pub text: String,
}

/// Everything hashed into a request fingerprint
#[derive(Serialize)]
struct FingerprintMaterial<'a> {
    entries: &'a [BatchEntry],
    context: &'a ContextSnapshot,
    profile_version: u64,
    target_language: &'a str,
}

/// Builds batches, prompts, and fingerprints for one job
pub struct RequestBuilder {
    profile: Arc<MovieProfile>,
    target_language: String,
    char_budget: usize,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl RequestBuilder {
    pub fn new(
        profile: Arc<MovieProfile>,
        target_language: impl Into<String>,
        engine: &EngineConfig,
        provider: &ProviderConfig,
    ) -> Self {
        Self {
            profile,
            target_language: target_language.into(),
            char_budget: engine.batch_char_budget,
            model: provider.model.clone(),
            temperature: provider.temperature,
            max_tokens: provider.max_tokens,
        }
    }

    /// Group entries greedily under the character budget, in order.
    ///
    /// An entry longer than the whole budget still forms its own batch so
    /// oversized lines cannot stall the job.
    pub fn chunk(&self, entries: &[BatchEntry]) -> Result<Vec<Vec<BatchEntry>>, EngineError> {
        if entries.is_empty() {
            return Err(EngineError::MalformedBatch("no entries to batch".to_string()));
        }

        let mut batches = Vec::new();
        let mut current: Vec<BatchEntry> = Vec::new();
        let mut current_chars = 0usize;

        for entry in entries {
            let entry_chars = entry.text.chars().count();
            if !current.is_empty() && current_chars + entry_chars > self.char_budget {
                batches.push(std::mem::take(&mut current));
                current_chars = 0;
            }
            current_chars += entry_chars;
            current.push(entry.clone());
        }
        if !current.is_empty() {
            batches.push(current);
        }

        trace!("Planned {} batches from {} entries", batches.len(), entries.len());
        Ok(batches)
    }

    /// Deterministic content hash identifying this exact request.
    pub fn fingerprint(
        &self,
        entries: &[BatchEntry],
        context: &ContextSnapshot,
    ) -> Result<String, EngineError> {
        if entries.is_empty() {
            return Err(EngineError::MalformedBatch("cannot fingerprint an empty batch".to_string()));
        }

        let material = FingerprintMaterial {
            entries,
            context,
            profile_version: self.profile.version,
            target_language: &self.target_language,
        };
        let canonical = serde_json::to_vec(&material)
            .map_err(|e| EngineError::MalformedBatch(format!("unserializable batch: {}", e)))?;

        let mut hasher = Sha256::new();
        hasher.update(&canonical);
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Render a batch into a chat request for the provider.
    pub fn build_request(
        &self,
        entries: &[BatchEntry],
        context: &ContextSnapshot,
    ) -> Result<ChatRequest, EngineError> {
        if entries.is_empty() {
            return Err(EngineError::MalformedBatch("cannot build an empty request".to_string()));
        }

        let mut system = format!(
            "You are a subtitle translator. Translate each numbered dialogue entry into {}.\n\
             Respond with the same <<ENTRY_i>> markers, one per entry, ending with {}. \
             Do not add commentary.\n\n{}",
            self.target_language,
            END_MARKER,
            self.profile.style_guide(),
        );

        if !context.pairs.is_empty() {
            system.push_str("\n\nRecent dialogue for continuity:");
            for pair in &context.pairs {
                system.push_str(&format!("\n{} => {}", pair.original, pair.translated));
            }
        }

        if let Some(note) = &context.note {
            system.push_str(&format!("\n\nIMPORTANT: {}", note));
        }

        let mut user = String::new();
        for (i, entry) in entries.iter().enumerate() {
            user.push_str(&format!("{}\n{}\n", entry_marker(i), entry.text));
        }
        user.push_str(END_MARKER);

        Ok(ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        })
    }

    /// Split a marker-delimited response back into per-entry translations.
    ///
    /// The response must carry exactly `expected` entries; anything else is a
    /// malformed response, which the dispatch layer treats as non-retryable.
    pub fn parse_response(text: &str, expected: usize) -> Result<Vec<String>, ProviderError> {
        let mut translations = Vec::with_capacity(expected);

        for i in 0..expected {
            let start_marker = entry_marker(i);
            let start = text.find(&start_marker).ok_or_else(|| {
                ProviderError::MalformedResponse(format!("missing marker {}", start_marker))
            })?;
            let body_start = start + start_marker.len();

            let end = text[body_start..]
                .find(&entry_marker(i + 1))
                .or_else(|| text[body_start..].find(END_MARKER))
                .map(|pos| body_start + pos)
                .ok_or_else(|| {
                    ProviderError::MalformedResponse(format!(
                        "unterminated entry {} (no following marker or {})",
                        i, END_MARKER
                    ))
                })?;

            let body = text[body_start..end].trim();
            if body.is_empty() {
                return Err(ProviderError::MalformedResponse(format!("empty entry {}", i)));
            }
            translations.push(body.to_string());
        }

        if text.contains(&entry_marker(expected)) {
            return Err(ProviderError::MalformedResponse(format!(
                "response carries more than the expected {} entries",
                expected
            )));
        }

        Ok(translations)
    }
}
