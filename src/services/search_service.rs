//! End-to-end search pipeline
//!
//! A search claims the orchestrator's slot before validating, so a newer
//! search always supersedes an older one that is still being validated.
//! Validation is resolved here: a rejected image never reaches the network.
//! Accepted images are searched (with cache and retry handled by
//! [`SearchOrchestrator`]), ranked for display and recorded in history.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::errors::{AppResult, HistoryResult, SearchError, SearchResult};
use crate::metrics::{MetricsCollector, MetricsSnapshot};
use crate::models::{CacheKey, HistoryEntry, ImageSource, RankedResult, RawMatch};
use crate::services::cache_maintenance::CacheMaintenanceService;
use crate::services::history::{HistoryStore, JsonFileHistoryStore, MemoryHistoryStore};
use crate::services::image_validator::ImageValidator;
use crate::services::result_cache::ResultCache;
use crate::services::search_orchestrator::SearchOrchestrator;
use crate::utils::http_client::{ReqwestSearchTransport, SearchTransport};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchOutcome {
    pub key: Option<CacheKey>,
    pub matches: Vec<RawMatch>,
    pub ranked: Vec<RankedResult>,
    pub from_cache: bool,
    pub attempts: u32,
    pub response_time_ms: Option<u64>,
    /// Validation warnings for the caller to display
    pub warnings: Vec<String>,
}

pub struct SearchService {
    validator: ImageValidator,
    orchestrator: SearchOrchestrator,
    cache: Arc<ResultCache>,
    metrics: Arc<MetricsCollector>,
    history: Arc<dyn HistoryStore>,
    history_max_entries: usize,
    sweep_interval: Duration,
}

impl SearchService {
    pub fn new(
        config: &Config,
        transport: Arc<dyn SearchTransport>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        let cache = Arc::new(ResultCache::new(config.cache.ttl, config.cache.max_entries));
        let metrics = Arc::new(MetricsCollector::new());
        let orchestrator = SearchOrchestrator::new(
            transport,
            cache.clone(),
            metrics.clone(),
            config.retry.clone(),
        );

        Self {
            validator: ImageValidator::new(config.validation.clone()),
            orchestrator,
            cache,
            metrics,
            history,
            history_max_entries: config.history.max_entries,
            sweep_interval: config.cache.sweep_interval,
        }
    }

    /// Service wired with the HTTP transport and the configured history store
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let transport = Arc::new(ReqwestSearchTransport::new(&config.service)?);
        let history: Arc<dyn HistoryStore> = match &config.history.path {
            Some(path) => Arc::new(JsonFileHistoryStore::new(path.clone())),
            None => Arc::new(MemoryHistoryStore::new()),
        };
        Ok(Self::new(config, transport, history))
    }

    pub async fn search(
        &self,
        source: &ImageSource,
        cancel: &CancellationToken,
    ) -> SearchResult<SearchOutcome> {
        let session = self.orchestrator.begin_session(cancel);

        let validation = tokio::select! {
            biased;
            _ = session.token().cancelled() => None,
            outcome = self.validator.validate(source) => Some(outcome),
        };

        // A session cancelled during validation resolves as `Cancelled` below
        let warnings = match validation {
            Some(outcome) if !outcome.accepted => {
                self.orchestrator.end_session(&session);
                let reason = outcome
                    .rejection
                    .unwrap_or_else(|| "image rejected".to_string());
                info!("Not searching {}: {}", source.label(), reason);
                return Err(SearchError::rejected(reason));
            }
            Some(outcome) => outcome.warnings,
            None => Vec::new(),
        };
        for warning in &warnings {
            warn!("{}: {}", source.label(), warning);
        }

        let found = self.orchestrator.search_in_session(source, &session).await?;
        let ranked = RankedResult::rank(&found.matches);

        info!(
            "Search for {} returned {} match(es), {} ranked{}",
            source.label(),
            found.matches.len(),
            ranked.len(),
            if found.from_cache { " (cached)" } else { "" }
        );

        if !ranked.is_empty() {
            self.remember(source, found.key.clone(), found.matches.len(), &ranked)
                .await;
        }

        Ok(SearchOutcome {
            key: found.key,
            matches: found.matches,
            ranked,
            from_cache: found.from_cache,
            attempts: found.attempts,
            response_time_ms: found.response_time_ms,
            warnings,
        })
    }

    /// History failures are logged and never fail the search
    async fn remember(
        &self,
        source: &ImageSource,
        key: Option<CacheKey>,
        result_count: usize,
        ranked: &[RankedResult],
    ) {
        let top = ranked.first();
        let entry = HistoryEntry {
            key,
            source_label: source.label().to_string(),
            top_similarity: top.map(|r| r.raw.similarity),
            top_title: top.and_then(|r| r.title.clone()),
            result_count,
            searched_at: Utc::now(),
        };

        if let Err(e) = self.history.record(entry, self.history_max_entries).await {
            warn!("Failed to record search history: {}", e);
        }
    }

    /// Cancel the search in flight, if any
    pub fn cancel_current(&self) -> bool {
        self.orchestrator.cancel_current()
    }

    /// Start the periodic cache sweep, stopped by `shutdown`
    pub fn start_cache_maintenance(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        CacheMaintenanceService::new(self.cache.clone(), self.sweep_interval).start(shutdown)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub async fn history(&self) -> HistoryResult<Vec<HistoryEntry>> {
        self.history.load().await
    }
}
