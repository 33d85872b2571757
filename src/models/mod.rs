//! Data model shared by the search pipeline

pub mod history;
pub mod image_source;
pub mod ranked_result;
pub mod search_match;

pub use history::HistoryEntry;
pub use image_source::{CacheKey, FileSource, ImageSource, UrlSource};
pub use ranked_result::RankedResult;
pub use search_match::{AnilistInfo, AnilistRef, AnilistTitle, Episode, RawMatch, SearchResponse};
