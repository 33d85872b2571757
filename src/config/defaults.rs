/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Recognition service defaults
pub const DEFAULT_BASE_URL: &str = "https://api.trace.moe";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_ANILIST_INFO: bool = false;
pub const DEFAULT_CUT_BORDERS: bool = false;

// Result cache defaults
pub const DEFAULT_CACHE_TTL_SECS: u64 = 60 * 60;
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 100;
pub const DEFAULT_CACHE_SWEEP_INTERVAL_SECS: u64 = 5 * 60;

// Retry defaults
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;
pub const DEFAULT_MAX_JITTER_MS: u64 = 1000;

// Validation defaults
pub const DEFAULT_MAX_FILE_SIZE: u64 = 25 * 1024 * 1024; // 25MB
pub const DEFAULT_QUALITY_THRESHOLD: f64 = 0.8;
pub const DEFAULT_SUPPORTED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/bmp",
    "image/avif",
];

// History defaults
pub const DEFAULT_HISTORY_MAX_ENTRIES: usize = 20;

// Ranking defaults
pub const MIN_RANKED_SIMILARITY: f64 = 0.1;
pub const MAX_RANKED_RESULTS: usize = 10;
