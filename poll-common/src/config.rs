//! Configuration management for poll services.
//!
//! All poll services share one configuration file at `~/.pollwatch/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (POLL_* prefix)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `POLL_LOG_LEVEL` → observability.log_level
//! - `POLL_LOG_FORMAT` → observability.log_format
//! - `POLL_BASE_URL` → crawler.base_url
//! - `POLL_CACHE_PATH` → cache.path
//! - `POLL_CACHE_MAX_AGE` → cache.max_age_secs (accepts "7d", "12h", ...)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::util::parse_duration_secs;

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".pollwatch"),
        |dirs| dirs.home_dir().join(".pollwatch"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Crawler Configuration
// ============================================================================

/// CSS selectors describing the layout of a poll source page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Selector of the poll table
    #[serde(default = "default_table_selector")]
    pub table: String,

    /// Class carried by header cells that name a party
    #[serde(default = "default_party_header_class")]
    pub party_header_class: String,

    /// Class carried by the date cell of a body row
    #[serde(default = "default_date_cell_class")]
    pub date_cell_class: String,

    /// Selector of the "more sources" navigation anchors
    #[serde(default = "default_more_sources_selector")]
    pub more_sources: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            table: default_table_selector(),
            party_header_class: default_party_header_class(),
            date_cell_class: default_date_cell_class(),
            more_sources: default_more_sources_selector(),
        }
    }
}

fn default_table_selector() -> String {
    "table.wilko".into()
}

fn default_party_header_class() -> String {
    "part".into()
}

fn default_date_cell_class() -> String {
    "s".into()
}

fn default_more_sources_selector() -> String {
    "p.navi a".into()
}

/// Poll crawler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// Base URL every poll page lives under. Pollster labels are page paths
    /// relative to this URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Seed pages, relative to `base_url` (absolute URLs are used as-is)
    #[serde(default = "default_seeds")]
    pub seeds: Vec<String>,

    /// Timeout for a single page fetch, in seconds
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Retries for transient fetch failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial retry delay in milliseconds; doubles on each attempt
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Page layout selectors
    #[serde(default)]
    pub selectors: SelectorConfig,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            seeds: default_seeds(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            user_agent: default_user_agent(),
            selectors: SelectorConfig::default(),
        }
    }
}

impl CrawlerConfig {
    /// Parse the base URL.
    pub fn base(&self) -> Result<Url> {
        Url::parse(&self.base_url)
            .with_context(|| format!("Invalid crawler base URL {}", self.base_url))
    }

    /// Resolve every seed against the base URL.
    pub fn seed_urls(&self) -> Result<Vec<Url>> {
        let base = self.base()?;
        self.seeds
            .iter()
            .map(|seed| {
                base.join(seed)
                    .with_context(|| format!("Invalid seed URL {seed}"))
            })
            .collect()
    }

    /// Timeout applied to each page fetch.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Delay before the first retry.
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

fn default_base_url() -> String {
    "https://www.wahlrecht.de/umfragen/".into()
}

fn default_seeds() -> Vec<String> {
    [
        "allensbach.htm",
        "emnid.htm",
        "forsa.htm",
        "politbarometer.htm",
        "gms.htm",
        "dimap.htm",
        "insa.htm",
        "yougov.htm",
        "landtage/index.htm",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_user_agent() -> String {
    format!("pollwatch/{}", env!("CARGO_PKG_VERSION"))
}

// ============================================================================
// Cache Configuration
// ============================================================================

/// On-disk poll cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache file path. Defaults to `~/.pollwatch/polls.cache`.
    #[serde(default)]
    pub path: Option<String>,

    /// Maximum cache age in seconds before it is treated as stale
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_age_secs: default_max_age_secs(),
        }
    }
}

impl CacheConfig {
    /// Resolved cache file path.
    pub fn path(&self) -> PathBuf {
        self.path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| config_dir().join("polls.cache"))
    }

    /// Maximum cache age.
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }
}

fn default_max_age_secs() -> u64 {
    7 * 24 * 3600
}

// ============================================================================
// Observability Configuration
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets to quiet down to `warn`.
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            excluded_targets: Vec::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration shared by all poll services.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(level) = lookup("POLL_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("POLL_LOG_FORMAT") {
            self.observability.log_format = format;
        }
        if let Some(base) = lookup("POLL_BASE_URL") {
            self.crawler.base_url = base;
        }
        if let Some(path) = lookup("POLL_CACHE_PATH") {
            self.cache.path = Some(path);
        }
        if let Some(age) = lookup("POLL_CACHE_MAX_AGE") {
            match parse_duration_secs(&age) {
                Ok(secs) => self.cache.max_age_secs = secs,
                Err(e) => tracing::warn!(value = %age, error = %e, "Ignoring POLL_CACHE_MAX_AGE"),
            }
        }
    }

    /// Write the configuration as pretty JSON.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }
}
