/*!
 * End-to-end pipeline tests running a sequencer through the full engine
 * with mock providers.
 */

use cineglot::engine::TranslationEngine;
use cineglot::errors::EngineError;
use cineglot::providers::mock::{MockFailure, MockProvider};
use cineglot::subtitle_processor::{EntryStatus, FailureReason, SubtitleEntry, SubtitleSequencer};

use crate::common;

fn sequencer(texts: &[&str]) -> SubtitleSequencer {
    let entries = texts
        .iter()
        .enumerate()
        .map(|(i, t)| {
            SubtitleEntry::new(i, (i as u64) * 2000, (i as u64) * 2000 + 1500, t.to_string())
        })
        .collect();
    SubtitleSequencer::from_entries(entries)
}

#[tokio::test]
async fn test_fullJob_multipleBatches_shouldPreserveEntryOrder() {
    // 40-char budget forces several batches out of these lines
    let provider = MockProvider::working().with_transform(|t| format!("[zh] {}", t));
    let engine = common::build_engine(provider, common::test_config(), common::test_cache());

    let texts = [
        "First line of dialogue here.",
        "Second line follows on.",
        "Third line keeps going.",
        "Fourth line of the scene.",
        "Fifth and final line.",
    ];
    let mut seq = sequencer(&texts);
    let report = engine.run(&mut seq).await.unwrap();

    assert_eq!(report.translated, texts.len());
    assert_eq!(report.fallbacks, 0);
    for (i, original) in texts.iter().enumerate() {
        let entry = seq.entry(i).unwrap();
        assert_eq!(entry.index, i);
        assert_eq!(entry.status, EntryStatus::Translated);
        assert_eq!(entry.output_text(), format!("[zh] {}", original));
    }
}

#[tokio::test]
async fn test_rerunSameJob_shouldDispatchNothing() {
    let provider = MockProvider::working();
    let cache = common::test_cache();
    let engine = common::build_engine(provider.clone(), common::test_config(), cache);

    let mut first = sequencer(&["Hello there.", "Goodbye now."]);
    engine.run(&mut first).await.unwrap();
    let calls_after_first = provider.call_count();
    assert!(calls_after_first > 0);

    let mut second = sequencer(&["Hello there.", "Goodbye now."]);
    let report = engine.run(&mut second).await.unwrap();

    assert_eq!(provider.call_count(), calls_after_first);
    assert!(report.cache.memory_hits > 0);
    assert_eq!(second.entry(0).unwrap().status, EntryStatus::Translated);
}

#[tokio::test]
async fn test_concurrentIdenticalJobs_shouldDispatchOnce() {
    // Two engines share one cache; the slow provider keeps the first
    // dispatch in flight long enough for the second job to join it.
    let provider = MockProvider::slow(100);
    let cache = common::test_cache();
    let engine_a =
        common::build_engine(provider.clone(), common::test_config(), std::sync::Arc::clone(&cache));
    let engine_b = common::build_engine(provider.clone(), common::test_config(), cache);

    let run_a = async {
        let mut seq = sequencer(&["Hello there."]);
        engine_a.run(&mut seq).await.map(|r| r.translated)
    };
    let run_b = async {
        let mut seq = sequencer(&["Hello there."]);
        engine_b.run(&mut seq).await.map(|r| r.translated)
    };

    let (a, b) = tokio::join!(run_a, run_b);
    assert_eq!(a.unwrap(), 1);
    assert_eq!(b.unwrap(), 1);
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn test_transientFailures_shouldRetryAndComplete() {
    let provider = MockProvider::fail_then_succeed(2);
    let engine = common::build_engine(provider.clone(), common::test_config(), common::test_cache());

    let mut seq = sequencer(&["Hello there."]);
    let report = engine.run(&mut seq).await.unwrap();

    assert_eq!(report.translated, 1);
    assert_eq!(report.retries, 2);
    assert_eq!(provider.call_count(), 3);
}

#[tokio::test]
async fn test_rosterViolation_shouldRetryOnceThenFallBack() {
    // The identity mock never renders John as 约翰, so the single
    // correction pass cannot fix it and the entry falls back.
    let provider = MockProvider::working();
    let engine = common::build_engine(provider.clone(), common::test_config(), common::test_cache());

    let mut seq = sequencer(&["John waves goodbye."]);
    let report = engine.run(&mut seq).await.unwrap();

    assert_eq!(report.fallbacks, 1);
    assert_eq!(seq.entry(0).unwrap().status, EntryStatus::Fallback);
    assert_eq!(seq.entry(0).unwrap().output_text(), "John waves goodbye.");
    assert_eq!(seq.entry(0).unwrap().failure_reason, Some(FailureReason::RosterInconsistency));
    assert_eq!(provider.call_count(), 2);
}

#[tokio::test]
async fn test_rosterSatisfied_shouldTranslateWithoutRetry() {
    let provider = MockProvider::working().with_transform(|t| t.replace("John", "约翰"));
    let engine = common::build_engine(provider.clone(), common::test_config(), common::test_cache());

    let mut seq = sequencer(&["John waves goodbye."]);
    let report = engine.run(&mut seq).await.unwrap();

    assert_eq!(report.translated, 1);
    assert_eq!(seq.entry(0).unwrap().output_text(), "约翰 waves goodbye.");
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn test_breakerTripped_shouldRejectLaterBatchesWithoutDispatch() {
    let mut config = common::test_config();
    config.engine.max_concurrent_requests = 1;
    config.engine.batch_char_budget = 1; // one entry per batch
    config.engine.max_attempts = 1;
    config.engine.breaker_failure_threshold = 2;
    config.engine.breaker_cooldown_ms = 60_000;

    let provider = MockProvider::failing(MockFailure::ServerError);
    let engine = common::build_engine(provider.clone(), config, common::test_cache());

    let mut seq = sequencer(&["One.", "Two.", "Three.", "Four."]);
    let report = engine.run(&mut seq).await.unwrap();

    // Two dispatches trip the breaker; the remaining batches are rejected
    // at preflight and fall back without touching the provider.
    assert_eq!(provider.call_count(), 2);
    assert_eq!(report.fallbacks, 4);
    for entry in seq.entries() {
        assert_eq!(entry.status, EntryStatus::Fallback);
    }
}

#[tokio::test]
async fn test_fatalProviderError_shouldAbortJob() {
    let provider = MockProvider::failing(MockFailure::AuthFailure);
    let engine = common::build_engine(provider.clone(), common::test_config(), common::test_cache());

    let mut seq = sequencer(&["Hello there."]);
    let err = engine.run(&mut seq).await.unwrap_err();

    assert!(matches!(err, EngineError::Fatal(_)));
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn test_runFile_shouldWriteTranslatedSrt() {
    let dir = common::create_temp_dir().unwrap();
    let input = common::create_test_subtitle(dir.path(), "movie.srt").unwrap();
    let output = dir.path().join("movie.zh.srt");

    let provider = MockProvider::working().with_transform(|t| t.replace("John", "约翰"));
    let engine = common::build_engine(provider, common::test_config(), common::test_cache());

    let report = engine.run_file(&input, &output).await.unwrap();
    assert_eq!(report.translated, 3);
    assert_eq!(report.fallbacks, 0);

    let written = SubtitleSequencer::from_srt_file(&output).unwrap();
    assert_eq!(written.len(), 3);
    assert_eq!(written.entry(0).unwrap().start_time_ms, 1000);
    assert!(written.entry(2).unwrap().text.contains("约翰"));
}

#[tokio::test]
async fn test_cancelledJob_shouldReturnCancelled() {
    let provider = MockProvider::slow(5_000);
    let engine = common::build_engine(provider, common::test_config(), common::test_cache());
    let cancel = engine.cancel_handle();

    let mut seq = sequencer(&["Hello there."]);
    let run = engine.run(&mut seq);
    tokio::pin!(run);

    tokio::select! {
        _ = tokio::time::sleep(std::time::Duration::from_millis(20)) => {
            cancel.send(true).unwrap();
        }
        _ = &mut run => panic!("job finished before cancellation"),
    }

    let err = run.await.unwrap_err();
    assert!(matches!(err, EngineError::Cancelled));
}

#[tokio::test]
async fn test_engineFromConfig_shouldBuildWithDisabledTiers() {
    // Exercises the config path: disk disabled via cache.enabled=false
    let mut config = common::test_config();
    config.cache.enabled = false;

    let engine = TranslationEngine::new(
        config,
        std::sync::Arc::new(MockProvider::working()),
        common::test_profile(),
    )
    .unwrap();

    let mut seq = sequencer(&["Hello there."]);
    let report = engine.run(&mut seq).await.unwrap();
    assert_eq!(report.translated, 1);
    assert_eq!(report.cache.memory_hits, 0);
}
