/*!
 * Cache tiering tests exercising the manager against a real on-disk store.
 */

use std::time::Duration;

use cineglot::app_config::CacheConfig;
use cineglot::cache::{CacheManager, CacheTier, InFlightClaim, TranslationPayload};

use crate::common;

fn payload(texts: &[&str]) -> TranslationPayload {
    TranslationPayload { translations: texts.iter().map(|t| t.to_string()).collect() }
}

fn disk_config(dir: &std::path::Path) -> CacheConfig {
    CacheConfig {
        enabled: true,
        memory_capacity: 16,
        memory_ttl_secs: 300,
        remote_endpoint: String::new(),
        disk_path: Some(dir.join("cache.db")),
        disk_ttl_secs: 300,
    }
}

#[tokio::test]
async fn test_putThenGet_shouldServeFromMemoryTier() {
    let dir = common::create_temp_dir().unwrap();
    let manager = CacheManager::from_config(&disk_config(dir.path())).unwrap();

    manager.put("fp-1", &payload(&["你好"])).await;

    let entry = manager.get("fp-1").await.unwrap();
    assert_eq!(entry.tier, CacheTier::Memory);
    assert_eq!(entry.payload.translations, vec!["你好"]);
}

#[tokio::test]
async fn test_coldRestart_shouldServeFromDiskAndPromote() {
    let dir = common::create_temp_dir().unwrap();
    let config = disk_config(dir.path());

    {
        let manager = CacheManager::from_config(&config).unwrap();
        manager.put("fp-1", &payload(&["persisted"])).await;
    }

    // A fresh manager has a cold memory tier but the same database file
    let manager = CacheManager::from_config(&config).unwrap();

    let first = manager.get("fp-1").await.unwrap();
    assert_eq!(first.tier, CacheTier::Disk);

    let second = manager.get("fp-1").await.unwrap();
    assert_eq!(second.tier, CacheTier::Memory);

    let stats = manager.stats();
    assert_eq!(stats.disk_hits, 1);
    assert_eq!(stats.memory_hits, 1);
}

#[tokio::test]
async fn test_conflictingPut_shouldKeepFirstPayloadEverywhere() {
    let dir = common::create_temp_dir().unwrap();
    let config = disk_config(dir.path());
    let manager = CacheManager::from_config(&config).unwrap();

    manager.put("fp-1", &payload(&["original"])).await;
    manager.put("fp-1", &payload(&["imposter"])).await;

    assert_eq!(manager.get("fp-1").await.unwrap().payload.translations, vec!["original"]);

    // The disk tier kept the original too
    let cold = CacheManager::from_config(&config).unwrap();
    assert_eq!(cold.get("fp-1").await.unwrap().payload.translations, vec!["original"]);
}

#[tokio::test]
async fn test_claim_whileOwned_shouldJoinAndShareOutcome() {
    let manager = CacheManager::memory_only(16, Duration::from_secs(60));

    let InFlightClaim::Owner(guard) = manager.claim("fp-1") else {
        panic!("first claim should own");
    };
    let InFlightClaim::Joined(rx) = manager.claim("fp-1") else {
        panic!("second claim should join");
    };

    let waiter = tokio::spawn(cineglot::cache::inflight::wait_for_outcome(rx));
    guard.resolve(Ok(payload(&["shared"])));

    let outcome = waiter.await.unwrap().unwrap();
    assert_eq!(outcome.translations, vec!["shared"]);

    // Claim is released once resolved
    assert!(matches!(manager.claim("fp-1"), InFlightClaim::Owner(_)));
}

#[tokio::test]
async fn test_disabledCache_shouldMissAndIgnorePuts() {
    let manager = CacheManager::disabled();
    manager.put("fp-1", &payload(&["text"])).await;

    assert!(manager.get("fp-1").await.is_none());
    assert_eq!(manager.stats().misses, 0);
}
