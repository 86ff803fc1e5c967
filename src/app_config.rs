use anyhow::{anyhow, Context, Result};
use log::{info, LevelFilter};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::language_utils::{is_auto, validate_language_code};
use crate::reflow::ReflowOptions;
use crate::translation::RetryPolicy;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Source language code (ISO), or `auto`
    #[serde(default = "default_source_language")]
    pub source_language: String,

    /// Target language code (ISO)
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Segment reflow config
    #[serde(default)]
    pub reflow: ReflowConfig,

    /// Translation config
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Review flagging config
    #[serde(default)]
    pub quality: QualityConfig,

    /// Resume config
    #[serde(default)]
    pub resume: ResumeConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Whether batch runs draw a progress bar
    #[serde(default = "default_true")]
    pub show_progress: bool,
}

/// Segment reflow settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ReflowConfig {
    // @field: Merge/split pass toggle
    #[serde(default = "default_true")]
    pub enabled: bool,

    // @field: Seconds; shorter segments are merged
    #[serde(default = "default_min_segment_duration")]
    pub min_segment_duration: f64,

    // @field: Seconds; longer segments are split
    #[serde(default = "default_max_segment_duration")]
    pub max_segment_duration: f64,

    // @field: Caption width limit
    #[serde(default = "default_max_chars_per_caption")]
    pub max_chars_per_caption: usize,
}

impl Default for ReflowConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_segment_duration: default_min_segment_duration(),
            max_segment_duration: default_max_segment_duration(),
            max_chars_per_caption: default_max_chars_per_caption(),
        }
    }
}

/// Translation provider type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    // @provider: Ollama
    #[default]
    Ollama,
    // @provider: In-process mock, for dry runs
    Mock,
}

impl std::fmt::Display for TranslationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ollama => write!(f, "ollama"),
            Self::Mock => write!(f, "mock"),
        }
    }
}

impl std::str::FromStr for TranslationProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "mock" => Ok(Self::Mock),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// How long the translation cache lives
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheScope {
    /// A fresh cache per unit of work
    Unit,
    /// One cache shared by every unit in a batch
    #[default]
    Batch,
}

/// Translation settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TranslationConfig {
    #[serde(default)]
    pub provider: TranslationProvider,

    // @field: Service URL
    #[serde(default = "default_ollama_endpoint")]
    pub endpoint: String,

    // @field: Model name
    #[serde(default = "default_ollama_model")]
    pub model: String,

    // @field: Prompt template with {source} and {target} placeholders
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    // @field: Timeout seconds per provider call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    // @field: Concurrent provider calls
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    // @field: Provider calls per text
    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,

    // @field: Base backoff, doubled per attempt
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,

    // @field: Backoff ceiling
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    // @field: Service-unavailable failures tolerated per text
    #[serde(default = "default_service_unavailable_cap")]
    pub service_unavailable_cap: u32,

    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    #[serde(default)]
    pub cache_scope: CacheScope,
}

impl TranslationConfig {
    /// Retry policy built from these settings
    pub fn retry_policy(&self) -> RetryPolicy {
        let policy = RetryPolicy::new(
            self.max_retry_attempts,
            Duration::from_millis(self.base_backoff_ms),
            Duration::from_millis(self.max_backoff_ms),
        )
        .with_service_unavailable_cap(self.service_unavailable_cap);

        if self.timeout_secs > 0 {
            policy.with_call_timeout(Duration::from_secs(self.timeout_secs))
        } else {
            policy
        }
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: TranslationProvider::default(),
            endpoint: default_ollama_endpoint(),
            model: default_ollama_model(),
            system_prompt: default_system_prompt(),
            timeout_secs: default_timeout_secs(),
            worker_count: default_worker_count(),
            max_retry_attempts: default_max_retry_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            service_unavailable_cap: default_service_unavailable_cap(),
            cache_enabled: true,
            cache_scope: CacheScope::default(),
        }
    }
}

/// Review flagging settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct QualityConfig {
    /// Segments with confidence below this are flagged
    #[serde(default = "default_low_confidence_threshold")]
    pub low_confidence_threshold: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            low_confidence_threshold: default_low_confidence_threshold(),
        }
    }
}

/// Where resume markers are kept
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MarkerStoreKind {
    /// One JSON file per unit in `marker_dir`
    #[default]
    File,
    /// Rows in a SQLite database
    Sqlite,
}

/// Resume settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ResumeConfig {
    #[serde(default = "default_true")]
    pub resume_enabled: bool,

    #[serde(default)]
    pub store: MarkerStoreKind,

    // @field: Directory for file markers
    #[serde(default = "default_marker_dir")]
    pub marker_dir: PathBuf,

    // @field: SQLite path; the user data directory when unset
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

impl Default for ResumeConfig {
    fn default() -> Self {
        Self {
            resume_enabled: true,
            store: MarkerStoreKind::default(),
            marker_dir: default_marker_dir(),
            database_path: None,
        }
    }
}

/// Log level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

fn default_source_language() -> String {
    "auto".to_string()
}

fn default_target_language() -> String {
    "fa".to_string()
}

fn default_true() -> bool {
    true
}

fn default_min_segment_duration() -> f64 {
    0.8
}

fn default_max_segment_duration() -> f64 {
    7.0
}

fn default_max_chars_per_caption() -> usize {
    42
}

fn default_ollama_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.2:3b".to_string()
}

fn default_system_prompt() -> String {
    "You are a professional subtitle translator. Translate the user's text from {source} to {target}. Reply with the translation only, keep it concise enough for a caption, and preserve the original meaning and tone.".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_worker_count() -> usize {
    4
}

fn default_max_retry_attempts() -> u32 {
    3
}

fn default_base_backoff_ms() -> u64 {
    1000
}

fn default_max_backoff_ms() -> u64 {
    16_000
}

fn default_service_unavailable_cap() -> u32 {
    2
}

fn default_low_confidence_threshold() -> f64 {
    0.5
}

fn default_marker_dir() -> PathBuf {
    PathBuf::from(".subflow/markers")
}

impl Config {
    /// Load a config file, writing the defaults there first when it is missing
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = if path.exists() {
            let file = File::open(path).context(format!("Failed to open config file: {:?}", path))?;
            let reader = BufReader::new(file);
            serde_json::from_reader(reader).context(format!("Failed to parse config file: {:?}", path))?
        } else {
            info!("Config file {:?} not found, writing defaults", path);
            let config = Config::default();
            config.save(path)?;
            config
        };

        config.validate().context("Configuration validation failed")?;
        Ok(config)
    }

    /// Write this config as pretty-printed JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).context(format!("Failed to create config directory: {:?}", parent))?;
            }
        }

        let config_json = serde_json::to_string_pretty(self).context("Failed to serialize config to JSON")?;
        std::fs::write(path, config_json).context(format!("Failed to write config file: {:?}", path))?;
        Ok(())
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if !is_auto(&self.source_language) {
            validate_language_code(&self.source_language).context("Invalid source language")?;
        }
        validate_language_code(&self.target_language).context("Invalid target language")?;

        let reflow = &self.reflow;
        if !(reflow.min_segment_duration.is_finite() && reflow.min_segment_duration >= 0.0) {
            return Err(anyhow!("min_segment_duration must be a non-negative number"));
        }
        if !(reflow.max_segment_duration.is_finite() && reflow.max_segment_duration > 0.0) {
            return Err(anyhow!("max_segment_duration must be a positive number"));
        }
        if reflow.min_segment_duration > reflow.max_segment_duration {
            return Err(anyhow!(
                "min_segment_duration ({}) exceeds max_segment_duration ({})",
                reflow.min_segment_duration,
                reflow.max_segment_duration
            ));
        }
        if reflow.max_chars_per_caption == 0 {
            return Err(anyhow!("max_chars_per_caption must be at least 1"));
        }

        let translation = &self.translation;
        if translation.worker_count == 0 {
            return Err(anyhow!("worker_count must be at least 1"));
        }
        if translation.max_retry_attempts == 0 {
            return Err(anyhow!("max_retry_attempts must be at least 1"));
        }
        if translation.service_unavailable_cap == 0 {
            return Err(anyhow!("service_unavailable_cap must be at least 1"));
        }
        if translation.base_backoff_ms > translation.max_backoff_ms {
            return Err(anyhow!("base_backoff_ms exceeds max_backoff_ms"));
        }
        if translation.provider == TranslationProvider::Ollama && translation.endpoint.trim().is_empty() {
            return Err(anyhow!("Translation endpoint is required for the Ollama provider"));
        }

        let threshold = self.quality.low_confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(anyhow!("low_confidence_threshold must be within [0, 1], got {}", threshold));
        }

        Ok(())
    }

    /// Reflow bounds from this config
    pub fn reflow_options(&self) -> ReflowOptions {
        ReflowOptions::new(
            self.reflow.min_segment_duration,
            self.reflow.max_segment_duration,
            self.reflow.max_chars_per_caption,
        )
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: default_source_language(),
            target_language: default_target_language(),
            reflow: ReflowConfig::default(),
            translation: TranslationConfig::default(),
            quality: QualityConfig::default(),
            resume: ResumeConfig::default(),
            log_level: LogLevel::default(),
            show_progress: true,
        }
    }
}
