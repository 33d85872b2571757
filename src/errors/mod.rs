//! Centralized error handling for scene-finder
//!
//! # Error Categories
//!
//! - **Search Errors**: validation rejection, cancellation, network, service
//!   and malformed-response failures surfaced by the pipeline
//! - **Fingerprint Errors**: content hashing failures (degrade to uncacheable)
//! - **Transport Errors**: a single HTTP call failing before a response arrives
//! - **History Errors**: persistence failures of the history port
//!
//! # Usage
//!
//! ```rust
//! use scene_finder::errors::{SearchError, SearchResult};
//!
//! fn example_function() -> SearchResult<u32> {
//!     Err(SearchError::Cancelled { attempts: 1 })
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for search pipeline Results
pub type SearchResult<T> = Result<T, SearchError>;

/// Convenience type alias for history port Results
pub type HistoryResult<T> = Result<T, HistoryError>;
