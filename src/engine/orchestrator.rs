/*!
 * Job orchestration.
 *
 * The engine drives a sequencer through the full pipeline: batches are
 * planned once, dispatched with bounded lookahead, and finalized strictly
 * in submission order so context appends stay linearized. Each batch first
 * consults the cache, then the in-flight map, and only then the dispatcher;
 * resolved batches pass roster validation with a bounded number of
 * emphasised re-translations before violating entries fall back to their
 * original text.
 */

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use futures::future::BoxFuture;
use futures::stream::{FuturesOrdered, StreamExt};
use futures::FutureExt;
use log::{debug, info, warn};
use tokio::sync::watch;

use crate::app_config::Config;
use crate::cache::{
    inflight::wait_for_outcome, CacheManager, CacheStats, InFlightClaim, TranslationPayload,
};
use crate::engine::assembler::OutputAssembler;
use crate::engine::context::{ContextSnapshot, ContextWindowManager};
use crate::engine::dispatch::Dispatcher;
use crate::engine::request::{BatchEntry, RequestBuilder};
use crate::engine::validator::{ConsistencyValidator, Violation};
use crate::errors::EngineError;
use crate::movie_profile::MovieProfile;
use crate::providers::Provider;
use crate::subtitle_processor::{EntryStatus, FailureReason, SubtitleSequencer};

/// Outcome counters for one completed job
#[derive(Debug, Clone)]
pub struct JobReport {
    /// Total entries in the job
    pub total_entries: usize,
    /// Entries carrying a validated translation
    pub translated: usize,
    /// Entries that fell back to their original text
    pub fallbacks: usize,
    /// Cache tier counters
    pub cache: CacheStats,
    /// Provider calls made
    pub dispatches: u64,
    /// Retry attempts beyond the first call per request
    pub retries: u64,
}

type BatchOutcome = (Vec<BatchEntry>, ContextSnapshot, Result<Vec<String>, Arc<EngineError>>);

/// Drives one translation job end to end
pub struct TranslationEngine {
    config: Config,
    cache: Arc<CacheManager>,
    dispatcher: Dispatcher,
    builder: RequestBuilder,
    validator: ConsistencyValidator,
    cancel: Arc<watch::Sender<bool>>,
    // Held for the engine's lifetime so a cancel signal sent while no
    // dispatch is subscribed is still stored in the channel.
    cancel_rx: watch::Receiver<bool>,
}

impl TranslationEngine {
    /// Build an engine, constructing the cache tiers from configuration.
    pub fn new(
        config: Config,
        provider: Arc<dyn Provider>,
        profile: Arc<MovieProfile>,
    ) -> Result<Self, EngineError> {
        let cache = Arc::new(CacheManager::from_config(&config.cache)?);
        Ok(Self::with_cache(config, provider, profile, cache))
    }

    /// Build an engine around an existing cache manager.
    pub fn with_cache(
        config: Config,
        provider: Arc<dyn Provider>,
        profile: Arc<MovieProfile>,
        cache: Arc<CacheManager>,
    ) -> Self {
        let dispatcher = Dispatcher::new(provider, &config.engine);
        let builder = RequestBuilder::new(
            Arc::clone(&profile),
            config.target_language.clone(),
            &config.engine,
            &config.provider,
        );
        let validator = ConsistencyValidator::new(profile);
        let (cancel, cancel_rx) = watch::channel(false);

        Self { config, cache, dispatcher, builder, validator, cancel: Arc::new(cancel), cancel_rx }
    }

    /// Handle that cancels the running job when sent `true`.
    pub fn cancel_handle(&self) -> Arc<watch::Sender<bool>> {
        Arc::clone(&self.cancel)
    }

    /// The cache manager shared by this engine
    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// Translate every entry in the sequencer in place.
    pub async fn run(&self, sequencer: &mut SubtitleSequencer) -> Result<JobReport, EngineError> {
        let all_entries: Vec<BatchEntry> = sequencer
            .entries()
            .iter()
            .map(|e| BatchEntry { index: e.index, text: e.text.clone() })
            .collect();

        let batches = self.builder.chunk(&all_entries)?;
        info!(
            "Translating {} entries in {} batches (lookahead {})",
            all_entries.len(),
            batches.len(),
            self.config.engine.max_concurrent_requests
        );

        let mut context = ContextWindowManager::new(self.config.engine.context_window_size);
        let mut pending = batches.into_iter();
        let mut in_flight: FuturesOrdered<BoxFuture<'_, BatchOutcome>> = FuturesOrdered::new();

        loop {
            if *self.cancel_rx.borrow() {
                warn!("Job cancelled, abandoning remaining batches");
                return Err(EngineError::Cancelled);
            }

            // Fill the lookahead. Each batch snapshots the context as it
            // stands at submission time.
            while in_flight.len() < self.config.engine.max_concurrent_requests {
                let Some(batch) = pending.next() else { break };
                for entry in &batch {
                    if let Some(e) = sequencer.entry_mut(entry.index) {
                        e.status = EntryStatus::InFlight;
                    }
                }
                let snapshot = context.snapshot();
                in_flight.push_back(self.resolve_batch(batch, snapshot).boxed());
            }

            let Some((batch, snapshot, outcome)) = in_flight.next().await else { break };
            self.finalize(sequencer, &mut context, batch, snapshot, outcome).await?;
        }

        let summary = OutputAssembler::summarize(sequencer);
        Ok(JobReport {
            total_entries: sequencer.len(),
            translated: summary.translated,
            fallbacks: summary.fallbacks,
            cache: self.cache.stats(),
            dispatches: self.dispatcher.dispatch_count(),
            retries: self.dispatcher.retry_count(),
        })
    }

    /// Translate an SRT file and write the result.
    pub async fn run_file<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input: P,
        output: Q,
    ) -> anyhow::Result<JobReport> {
        let mut sequencer = SubtitleSequencer::from_srt_file(input)?;
        let report = self.run(&mut sequencer).await.context("Translation job failed")?;
        OutputAssembler::write_to_file(&sequencer, output)?;
        Ok(report)
    }

    /// Resolve one batch: cache, then in-flight join, then dispatch.
    async fn resolve_batch(
        &self,
        batch: Vec<BatchEntry>,
        snapshot: ContextSnapshot,
    ) -> BatchOutcome {
        let result = self.resolve_translations(&batch, &snapshot).await;
        (batch, snapshot, result)
    }

    async fn resolve_translations(
        &self,
        batch: &[BatchEntry],
        snapshot: &ContextSnapshot,
    ) -> Result<Vec<String>, Arc<EngineError>> {
        let fingerprint = self.builder.fingerprint(batch, snapshot).map_err(Arc::new)?;

        if let Some(entry) = self.cache.get(&fingerprint).await {
            if entry.payload.translations.len() == batch.len() {
                debug!("Cache hit ({:?}) for batch of {}", entry.tier, batch.len());
                return Ok(entry.payload.translations);
            }
            warn!(
                "Cached payload for {} has {} entries, expected {}; re-dispatching",
                fingerprint,
                entry.payload.translations.len(),
                batch.len()
            );
        }

        match self.cache.claim(&fingerprint) {
            InFlightClaim::Joined(rx) => {
                debug!("Joining in-flight dispatch for batch of {}", batch.len());
                wait_for_outcome(rx).await.map(|payload| payload.translations)
            }
            InFlightClaim::Owner(guard) => match self.dispatch_batch(batch, snapshot).await {
                Ok(payload) => {
                    self.cache.put(&fingerprint, &payload).await;
                    guard.resolve(Ok(payload.clone()));
                    Ok(payload.translations)
                }
                Err(error) => {
                    let shared = Arc::new(error);
                    guard.resolve(Err(Arc::clone(&shared)));
                    Err(shared)
                }
            },
        }
    }

    /// One upstream round trip for a batch, racing cancellation.
    async fn dispatch_batch(
        &self,
        batch: &[BatchEntry],
        snapshot: &ContextSnapshot,
    ) -> Result<TranslationPayload, EngineError> {
        let mut cancel_rx = self.cancel.subscribe();
        if *cancel_rx.borrow() {
            return Err(EngineError::Cancelled);
        }

        let request = self.builder.build_request(batch, snapshot)?;
        let response = tokio::select! {
            result = self.dispatcher.dispatch(request) => result?,
            _ = cancel_rx.changed() => return Err(EngineError::Cancelled),
        };

        let translations = RequestBuilder::parse_response(&response.text, batch.len())
            .map_err(EngineError::from)?;
        Ok(TranslationPayload { translations })
    }

    /// Apply one resolved batch in submission order: roster validation with
    /// bounded re-translation, status transitions, and context appends.
    async fn finalize(
        &self,
        sequencer: &mut SubtitleSequencer,
        context: &mut ContextWindowManager,
        batch: Vec<BatchEntry>,
        snapshot: ContextSnapshot,
        outcome: Result<Vec<String>, Arc<EngineError>>,
    ) -> Result<(), EngineError> {
        let mut translations = match outcome {
            Ok(translations) => translations,
            Err(error) => return self.fail_batch(sequencer, &batch, &error),
        };

        let mut violations = self.validator.validate(&batch, &translations);
        Self::flag_roster_violations(sequencer, &violations);
        let mut attempt = 0;
        while !violations.is_empty() && attempt < self.config.engine.max_consistency_retries {
            attempt += 1;
            info!(
                "Roster violations in batch ({}), re-translating (attempt {}/{})",
                violations.len(),
                attempt,
                self.config.engine.max_consistency_retries
            );

            // The attempt number keeps each retry's fingerprint distinct, so
            // a violating result already in the cache cannot satisfy it.
            let note = format!(
                "{} (correction pass {})",
                ConsistencyValidator::emphasis_note(&violations),
                attempt
            );
            match self.resolve_translations(&batch, &snapshot.with_note(note)).await {
                Ok(retried) => {
                    translations = retried;
                    violations = self.validator.validate(&batch, &translations);
                    Self::flag_roster_violations(sequencer, &violations);
                }
                Err(error) => match error.as_ref() {
                    // A fatal error or cancellation aborts the whole job
                    // even when it surfaces during a correction pass.
                    EngineError::Fatal(_) | EngineError::Cancelled => {
                        return self.fail_batch(sequencer, &batch, &error);
                    }
                    other => {
                        warn!("Consistency re-translation failed: {}", other);
                        break;
                    }
                },
            }
        }

        for (i, batch_entry) in batch.iter().enumerate() {
            let violating = violations.iter().any(|v| v.entry_index == batch_entry.index);
            let Some(entry) = sequencer.entry_mut(batch_entry.index) else { continue };

            if violating {
                warn!(
                    "Entry {} still violates the roster after {} correction passes, using original text",
                    batch_entry.index, attempt
                );
                entry.translated_text = None;
                entry.status = EntryStatus::Fallback;
            } else {
                entry.translated_text = Some(translations[i].clone());
                entry.status = EntryStatus::Translated;
                entry.failure_reason = None;
                context.append(&batch_entry.text, &translations[i]);
            }
        }
        Ok(())
    }

    /// Mark every entry named by a roster violation as failed, pending
    /// correction or fallback.
    fn flag_roster_violations(sequencer: &mut SubtitleSequencer, violations: &[Violation]) {
        for violation in violations {
            if let Some(entry) = sequencer.entry_mut(violation.entry_index) {
                entry.status = EntryStatus::Failed;
                entry.failure_reason = Some(FailureReason::RosterInconsistency);
            }
        }
    }

    /// Handle a failed batch: fatal errors and cancellation abort the job,
    /// everything else falls back to original text.
    fn fail_batch(
        &self,
        sequencer: &mut SubtitleSequencer,
        batch: &[BatchEntry],
        error: &EngineError,
    ) -> Result<(), EngineError> {
        for batch_entry in batch {
            if let Some(entry) = sequencer.entry_mut(batch_entry.index) {
                entry.status = EntryStatus::Failed;
                // Entries already flagged for a roster violation keep that
                // reason when their correction dispatch fails.
                entry.failure_reason.get_or_insert(FailureReason::DispatchFailed);
            }
        }

        match error {
            EngineError::Fatal(provider_error) => {
                warn!("Aborting job on fatal provider error: {}", provider_error);
                Err(EngineError::Fatal(provider_error.clone()))
            }
            EngineError::Cancelled => Err(EngineError::Cancelled),
            other => {
                warn!("Batch of {} failed ({}), falling back to original text", batch.len(), other);
                for batch_entry in batch {
                    if let Some(entry) = sequencer.entry_mut(batch_entry.index) {
                        entry.translated_text = None;
                        entry.status = EntryStatus::Fallback;
                    }
                }
                Ok(())
            }
        }
    }
}
