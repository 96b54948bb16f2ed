use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration module
/// This module handles the engine configuration including loading,
/// validating and saving configuration settings.
/// Represents the full configuration for a translation job
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Source language code (ISO)
    pub source_language: String,

    /// Target language code (ISO)
    pub target_language: String,

    /// Model provider config
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Engine tuning (batching, concurrency, retries, breaker)
    #[serde(default)]
    pub engine: EngineConfig,

    /// Cache tier config
    #[serde(default)]
    pub cache: CacheConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Model provider configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    /// Model name
    #[serde(default = "default_model")]
    pub model: String,

    /// API key (already resolved by the caller; never stored encrypted here)
    #[serde(default = "String::new")]
    pub api_key: String,

    /// Service endpoint URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens per completion
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key: String::new(),
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Engine tuning configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EngineConfig {
    /// Maximum number of concurrent upstream requests
    #[serde(default = "default_concurrent_requests")]
    pub max_concurrent_requests: usize,

    /// Character budget per request batch
    #[serde(default = "default_batch_char_budget")]
    pub batch_char_budget: usize,

    /// Number of recently translated pairs kept in the context window
    #[serde(default = "default_context_window_size")]
    pub context_window_size: usize,

    /// Maximum attempts per request (first try included)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base backoff time in milliseconds, doubled on each retry
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Upper bound on a single backoff delay in milliseconds
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// Consecutive failures before the circuit breaker opens
    #[serde(default = "default_breaker_threshold")]
    pub breaker_failure_threshold: u32,

    /// Breaker cooldown before a half-open probe, in milliseconds
    #[serde(default = "default_breaker_cooldown_ms")]
    pub breaker_cooldown_ms: u64,

    /// Maximum re-translation attempts for roster inconsistencies
    #[serde(default = "default_consistency_retries")]
    pub max_consistency_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: default_concurrent_requests(),
            batch_char_budget: default_batch_char_budget(),
            context_window_size: default_context_window_size(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            breaker_failure_threshold: default_breaker_threshold(),
            breaker_cooldown_ms: default_breaker_cooldown_ms(),
            max_consistency_retries: default_consistency_retries(),
        }
    }
}

/// Cache tier configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CacheConfig {
    /// Whether caching is enabled at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum number of entries held by the in-process tier
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,

    /// TTL for in-process entries, in seconds
    #[serde(default = "default_memory_ttl_secs")]
    pub memory_ttl_secs: u64,

    /// Remote shared store endpoint; empty disables the remote tier
    #[serde(default = "String::new")]
    pub remote_endpoint: String,

    /// Path to the on-disk store; None uses the platform data directory
    #[serde(default)]
    pub disk_path: Option<PathBuf>,

    /// TTL for on-disk entries, in seconds
    #[serde(default = "default_disk_ttl_secs")]
    pub disk_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            memory_capacity: default_memory_capacity(),
            memory_ttl_secs: default_memory_ttl_secs(),
            remote_endpoint: String::new(),
            disk_path: None,
            disk_ttl_secs: default_disk_ttl_secs(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Convert to a log crate level filter
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_model() -> String {
    "deepseek-chat".to_string()
}

fn default_endpoint() -> String {
    "https://api.deepseek.com/v1".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_concurrent_requests() -> usize {
    4
}

fn default_batch_char_budget() -> usize {
    1500
}

fn default_context_window_size() -> usize {
    10
}

fn default_max_attempts() -> u32 {
    4 // First attempt plus 3 retries
}

fn default_backoff_base_ms() -> u64 {
    1000 // Doubled on each retry
}

fn default_backoff_max_ms() -> u64 {
    30_000
}

fn default_breaker_threshold() -> u32 {
    5
}

fn default_breaker_cooldown_ms() -> u64 {
    15_000
}

fn default_consistency_retries() -> u32 {
    2
}

fn default_true() -> bool {
    true
}

fn default_memory_capacity() -> usize {
    4096
}

fn default_memory_ttl_secs() -> u64 {
    3600
}

fn default_disk_ttl_secs() -> u64 {
    86400 * 7
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.validate()?;
        Ok(config)
    }

    /// Write configuration to a JSON file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;
        Ok(())
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if self.source_language.trim().is_empty() {
            return Err(anyhow!("Source language must not be empty"));
        }
        if self.target_language.trim().is_empty() {
            return Err(anyhow!("Target language must not be empty"));
        }
        url::Url::parse(&self.provider.endpoint)
            .with_context(|| format!("Invalid provider endpoint: {}", self.provider.endpoint))?;
        if !self.cache.remote_endpoint.trim().is_empty() {
            url::Url::parse(&self.cache.remote_endpoint).with_context(|| {
                format!("Invalid remote cache endpoint: {}", self.cache.remote_endpoint)
            })?;
        }
        if self.engine.max_concurrent_requests == 0 {
            return Err(anyhow!("max_concurrent_requests must be at least 1"));
        }
        if self.engine.batch_char_budget == 0 {
            return Err(anyhow!("batch_char_budget must be at least 1"));
        }
        if self.engine.max_attempts == 0 {
            return Err(anyhow!("max_attempts must be at least 1"));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: "en".to_string(),
            target_language: "zh".to_string(),
            provider: ProviderConfig::default(),
            engine: EngineConfig::default(),
            cache: CacheConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaultConfig_shouldPassValidation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_emptyTargetLanguage_shouldFail() {
        let config = Config { target_language: "  ".to_string(), ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_invalidEndpoint_shouldFail() {
        let mut config = Config::default();
        config.provider.endpoint = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zeroConcurrency_shouldFail() {
        let mut config = Config::default();
        config.engine.max_concurrent_requests = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fromJson_partialConfig_shouldFillDefaults() {
        let json = r#"{"source_language": "en", "target_language": "zh"}"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.provider.model, "deepseek-chat");
        assert_eq!(config.engine.breaker_failure_threshold, 5);
        assert_eq!(config.engine.context_window_size, 10);
        assert!(config.cache.enabled);
        assert!(config.cache.remote_endpoint.is_empty());
    }

    #[test]
    fn test_configRoundTrip_shouldPreserveValues() {
        let mut config = Config::default();
        config.engine.batch_char_budget = 999;
        config.cache.memory_capacity = 7;

        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.engine.batch_char_budget, 999);
        assert_eq!(parsed.cache.memory_capacity, 7);
    }
}
