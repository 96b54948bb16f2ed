/*!
 * Common test utilities for the cineglot test suite
 */

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tempfile::TempDir;

use cineglot::app_config::Config;
use cineglot::cache::CacheManager;
use cineglot::engine::TranslationEngine;
use cineglot::movie_profile::{CharacterStyle, MovieProfile};
use cineglot::providers::mock::MockProvider;

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Creates a sample subtitle file for testing
pub fn create_test_subtitle(dir: &Path, filename: &str) -> Result<PathBuf> {
    let content = r#"1
00:00:01,000 --> 00:00:04,000
This is a test subtitle.

2
00:00:05,000 --> 00:00:09,000
It contains multiple entries.

3
00:00:10,000 --> 00:00:14,000
John looks at the camera.
"#;
    create_test_file(dir, filename, content)
}

/// A profile whose roster maps John to its target rendering
pub fn test_profile() -> Arc<MovieProfile> {
    Arc::new(
        MovieProfile::new("Test Picture")
            .with_tone("dry, understated")
            .with_character("John", CharacterStyle::rendering("约翰")),
    )
}

/// Engine config tuned for fast tests: tiny backoff, small batches
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.engine.max_concurrent_requests = 2;
    config.engine.batch_char_budget = 40;
    config.engine.max_attempts = 3;
    config.engine.backoff_base_ms = 1;
    config.engine.backoff_max_ms = 4;
    config.engine.breaker_cooldown_ms = 50;
    config.engine.max_consistency_retries = 1;
    config
}

/// A memory-only cache manager shared between engines under test
pub fn test_cache() -> Arc<CacheManager> {
    Arc::new(CacheManager::memory_only(256, Duration::from_secs(300)))
}

/// Builds an engine around a mock provider and a shared cache
pub fn build_engine(
    provider: MockProvider,
    config: Config,
    cache: Arc<CacheManager>,
) -> TranslationEngine {
    TranslationEngine::with_cache(config, Arc::new(provider), test_profile(), cache)
}
