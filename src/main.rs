// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use log::{info, warn};

use cineglot::app_config::{Config, LogLevel};
use cineglot::engine::TranslationEngine;
use cineglot::movie_profile::MovieProfile;
use cineglot::providers::deepseek::DeepSeek;
use cineglot::providers::Provider;

/// CLI wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => LogLevel::Error,
            CliLogLevel::Warn => LogLevel::Warn,
            CliLogLevel::Info => LogLevel::Info,
            CliLogLevel::Debug => LogLevel::Debug,
            CliLogLevel::Trace => LogLevel::Trace,
        }
    }
}

/// cineglot - context-aware subtitle translation
///
/// Translates SRT subtitle files with a movie profile steering character
/// name renderings, tone, and dialogue continuity.
#[derive(Parser, Debug)]
#[command(name = "cineglot")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "AI-powered subtitle translation with character consistency")]
#[command(long_about = "cineglot translates SRT subtitle files through an AI provider while a
movie profile keeps character names and tone consistent across the film.

EXAMPLES:
    cineglot movie.srt --profile movie-profile.json
    cineglot movie.srt --profile p.json -o movie.zh.srt -t zh
    cineglot movie.srt --profile p.json --config conf.json --log-level debug
    cineglot --test-connection --config conf.json

CONFIGURATION:
    Configuration is stored in conf.json by default. If the config file does
    not exist, a default one is created. The provider API key is read from
    the CINEGLOT_API_KEY environment variable when not set in the config.")]
struct CommandLineOptions {
    /// Input SRT file to translate
    #[arg(value_name = "INPUT_PATH", required_unless_present = "test_connection")]
    input_path: Option<PathBuf>,

    /// Movie profile JSON produced by the analyzer
    #[arg(short, long, required_unless_present = "test_connection")]
    profile: Option<PathBuf>,

    /// Output path; defaults to the input path with the target language inserted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Source language code (e.g. 'en')
    #[arg(short, long)]
    source_language: Option<String>,

    /// Target language code (e.g. 'zh')
    #[arg(short, long)]
    target_language: Option<String>,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Provider API key, overriding config and environment
    #[arg(long, env = "CINEGLOT_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,

    /// Verify provider connectivity and exit
    #[arg(long)]
    test_connection: bool,
}

/// Load the config file, creating a default one when missing, and apply
/// command-line overrides.
fn load_config(options: &CommandLineOptions) -> Result<Config> {
    let config_path = Path::new(&options.config_path);
    let mut config = if config_path.exists() {
        Config::from_file(config_path)?
    } else {
        warn!("Config file not found at '{}', creating default config.", options.config_path);
        let config = Config::default();
        config.to_file(config_path)?;
        config
    };

    if let Some(source) = &options.source_language {
        config.source_language = source.clone();
    }
    if let Some(target) = &options.target_language {
        config.target_language = target.clone();
    }
    if let Some(api_key) = &options.api_key {
        config.provider.api_key = api_key.clone();
    }
    if let Some(log_level) = &options.log_level {
        config.log_level = log_level.clone().into();
    }

    config.validate().context("Configuration validation failed")?;
    Ok(config)
}

/// Default output path: `movie.srt` with target `zh` becomes `movie.zh.srt`.
fn default_output_path(input: &Path, target_language: &str) -> PathBuf {
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("output");
    let extension = input.extension().and_then(|s| s.to_str()).unwrap_or("srt");
    input.with_file_name(format!("{}.{}.{}", stem, target_language, extension))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CommandLineOptions::parse();

    // Initialize logging before touching the config so load warnings are
    // visible; the config can only tighten the level afterwards.
    let initial_level = cli
        .log_level
        .clone()
        .map(|l| LogLevel::from(l).to_level_filter())
        .unwrap_or(log::LevelFilter::Info);
    env_logger::Builder::new()
        .filter_level(initial_level)
        .format_timestamp_millis()
        .init();

    let config = load_config(&cli)?;
    if cli.log_level.is_none() {
        log::set_max_level(config.log_level.to_level_filter());
    }

    if config.provider.api_key.trim().is_empty() {
        return Err(anyhow!(
            "No API key configured; set provider.api_key in '{}' or CINEGLOT_API_KEY",
            cli.config_path
        ));
    }

    let provider: Arc<dyn Provider> = Arc::new(DeepSeek::new(
        config.provider.api_key.clone(),
        config.provider.endpoint.clone(),
        config.provider.timeout_secs,
    ));

    if cli.test_connection {
        provider.test_connection().await.context("Provider connection test failed")?;
        info!("Provider connection OK ({})", config.provider.endpoint);
        return Ok(());
    }

    // clap enforces these when --test-connection is absent
    let input_path = cli
        .input_path
        .ok_or_else(|| anyhow!("INPUT_PATH is required"))?;
    let profile_path = cli.profile.ok_or_else(|| anyhow!("--profile is required"))?;

    let profile = MovieProfile::from_file(&profile_path)?;
    info!(
        "Loaded profile '{}' v{} with {} roster entries",
        profile.title,
        profile.version,
        profile.roster.len()
    );

    let output_path = cli
        .output
        .unwrap_or_else(|| default_output_path(&input_path, &config.target_language));

    let target_language = config.target_language.clone();
    let engine = TranslationEngine::new(config, provider, profile)?;
    let report = engine.run_file(&input_path, &output_path).await?;

    info!(
        "Done: {}/{} entries translated to {} ({} fallbacks, {} provider calls, {} retries, {} cache hits)",
        report.translated,
        report.total_entries,
        target_language,
        report.fallbacks,
        report.dispatches,
        report.retries,
        report.cache.memory_hits + report.cache.remote_hits + report.cache.disk_hits
    );
    Ok(())
}
