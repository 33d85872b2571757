//! Search pipeline services
//!
//! Each component takes only what it needs and returns plain results:
//!
//! - [`ImageValidator`]: hard format/size gate plus best-effort quality checks
//! - [`Fingerprinter`]: cache keys from content digests or URLs
//! - [`ResultCache`]: TTL and capacity bounded result store
//! - [`SearchOrchestrator`]: network protocol with retry, cancellation and
//!   supersession
//! - [`SearchService`]: the pipeline tying the above together with ranking
//!   and history
//!
//! # Usage
//!
//! ```rust,no_run
//! use scene_finder::config::Config;
//! use scene_finder::models::ImageSource;
//! use scene_finder::services::SearchService;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let service = SearchService::from_config(&Config::default())?;
//! let source = ImageSource::from_url("https://example.com/frame.jpg")?;
//! let outcome = service.search(&source, &CancellationToken::new()).await?;
//! println!("{} ranked result(s)", outcome.ranked.len());
//! # Ok(())
//! # }
//! ```

pub mod cache_maintenance;
pub mod fingerprint;
pub mod history;
pub mod image_validator;
pub mod result_cache;
pub mod search_orchestrator;
pub mod search_service;

pub use cache_maintenance::CacheMaintenanceService;
pub use fingerprint::{Fingerprinter, KeyDerivation};
pub use history::{HistoryStore, JsonFileHistoryStore, MemoryHistoryStore};
pub use image_validator::{ImageValidator, ValidationOutcome};
pub use result_cache::{CacheEntry, CacheStats, MaintenanceStats, ResultCache};
pub use search_orchestrator::{OrchestratedSearch, SearchOrchestrator, SearchSession};
pub use search_service::{SearchOutcome, SearchService};
