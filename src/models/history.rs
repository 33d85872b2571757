use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::image_source::CacheKey;

/// One completed search as remembered by the history port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Absent when the source could not be fingerprinted
    pub key: Option<CacheKey>,
    /// File name or URL of the searched image
    pub source_label: String,
    pub top_similarity: Option<f64>,
    pub top_title: Option<String>,
    pub result_count: usize,
    pub searched_at: DateTime<Utc>,
}
