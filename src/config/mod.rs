use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::errors::{AppError, AppResult};

pub mod defaults;
pub mod duration_serde;

use defaults::*;
use duration_serde::duration;

/// Environment variable prefix, nested keys use `__` (e.g. `SCENE_FINDER_CACHE__TTL=30m`)
pub const ENV_PREFIX: &str = "SCENE_FINDER_";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

/// Recognition service endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout", with = "duration")]
    pub request_timeout: Duration,
    #[serde(default = "default_connect_timeout", with = "duration")]
    pub connect_timeout: Duration,
    /// Ask the service to inline AniList metadata (`anilistInfo` flag)
    #[serde(default = "default_anilist_info")]
    pub anilist_info: bool,
    /// Ask the service to crop letterbox borders (`cutBorders` flag)
    #[serde(default = "default_cut_borders")]
    pub cut_borders: bool,
}

/// In-process result cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl", with = "duration")]
    pub ttl: Duration,
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,
    /// Period of the background expiry/capacity sweep
    #[serde(default = "default_cache_sweep_interval", with = "duration")]
    pub sweep_interval: Duration,
}

/// Retry and backoff configuration for search attempts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Multiplied by `2^attempt` between attempts
    #[serde(default = "default_base_delay", with = "duration")]
    pub base_delay: Duration,
    /// Upper bound (exclusive) of the random jitter added to each delay
    #[serde(default = "default_max_jitter", with = "duration")]
    pub max_jitter: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    #[serde(default = "default_quality_threshold")]
    pub quality_threshold: f64,
    #[serde(default = "default_supported_mime_types")]
    pub supported_mime_types: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_history_max_entries")]
    pub max_entries: usize,
    /// JSON file backing the history; in-memory only when unset
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS)
}

fn default_anilist_info() -> bool {
    DEFAULT_ANILIST_INFO
}

fn default_cut_borders() -> bool {
    DEFAULT_CUT_BORDERS
}

fn default_cache_ttl() -> Duration {
    Duration::from_secs(DEFAULT_CACHE_TTL_SECS)
}

fn default_cache_max_entries() -> usize {
    DEFAULT_CACHE_MAX_ENTRIES
}

fn default_cache_sweep_interval() -> Duration {
    Duration::from_secs(DEFAULT_CACHE_SWEEP_INTERVAL_SECS)
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_base_delay() -> Duration {
    Duration::from_millis(DEFAULT_BASE_DELAY_MS)
}

fn default_max_jitter() -> Duration {
    Duration::from_millis(DEFAULT_MAX_JITTER_MS)
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

fn default_quality_threshold() -> f64 {
    DEFAULT_QUALITY_THRESHOLD
}

fn default_supported_mime_types() -> Vec<String> {
    DEFAULT_SUPPORTED_MIME_TYPES
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_history_max_entries() -> usize {
    DEFAULT_HISTORY_MAX_ENTRIES
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
            anilist_info: default_anilist_info(),
            cut_borders: default_cut_borders(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: default_cache_ttl(),
            max_entries: default_cache_max_entries(),
            sweep_interval: default_cache_sweep_interval(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay: default_base_delay(),
            max_jitter: default_max_jitter(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            quality_threshold: default_quality_threshold(),
            supported_mime_types: default_supported_mime_types(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_entries: default_history_max_entries(),
            path: None,
        }
    }
}

impl RetryConfig {
    /// No waiting between attempts, for tests and tooling
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_jitter: Duration::ZERO,
        }
    }
}

impl Config {
    /// Defaults, then the TOML file if it exists, then `SCENE_FINDER_*` env vars
    pub fn load_from_file<P: AsRef<Path>>(config_file: P) -> AppResult<Self> {
        let path = config_file.as_ref();
        if path.exists() {
            info!("Loading configuration from {}", path.display());
        } else {
            debug!(
                "Config file {} not found, using defaults and environment",
                path.display()
            );
        }

        let config: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| AppError::configuration(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot operate with
    pub fn validate(&self) -> AppResult<()> {
        url::Url::parse(&self.service.base_url).map_err(|e| {
            AppError::configuration(format!(
                "service.base_url '{}' is not a valid URL: {e}",
                self.service.base_url
            ))
        })?;

        if self.retry.max_attempts == 0 {
            return Err(AppError::configuration("retry.max_attempts must be at least 1"));
        }
        if self.cache.max_entries == 0 {
            return Err(AppError::configuration("cache.max_entries must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.validation.quality_threshold) {
            return Err(AppError::configuration(format!(
                "validation.quality_threshold must be within [0, 1], got {}",
                self.validation.quality_threshold
            )));
        }
        if self.cache.sweep_interval.is_zero() {
            return Err(AppError::configuration("cache.sweep_interval must be non-zero"));
        }

        Ok(())
    }
}
