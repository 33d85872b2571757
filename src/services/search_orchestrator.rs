//! Network search protocol with caching, retry and supersession
//!
//! One orchestrator owns one search slot. Starting a search cancels the
//! session that currently holds the slot, so at most one session is ever
//! issuing requests. Each session gets a child of the caller's token, which
//! lets either the caller or a newer search end it.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::RetryConfig;
use crate::errors::{SearchError, SearchResult, TransportError};
use crate::metrics::MetricsCollector;
use crate::models::{CacheKey, ImageSource, RawMatch, SearchResponse};
use crate::services::fingerprint::{Fingerprinter, KeyDerivation};
use crate::services::result_cache::ResultCache;
use crate::utils::backoff::retry_delay;
use crate::utils::http_client::{SearchRequest, SearchTransport, TransportResponse};

/// Result of one orchestrated search
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratedSearch {
    /// Absent when the source could not be fingerprinted
    pub key: Option<CacheKey>,
    pub matches: Vec<RawMatch>,
    pub from_cache: bool,
    /// Network attempts made, `0` for a cache hit
    pub attempts: u32,
    /// Duration of the successful attempt, or the cached one for a hit
    pub response_time_ms: Option<u64>,
}

/// Claim on the orchestrator's single search slot
///
/// Holding a session does not keep it alive: a newer [`SearchOrchestrator::begin_session`]
/// cancels its token.
#[derive(Debug, Clone)]
pub struct SearchSession {
    id: u64,
    token: CancellationToken,
}

impl SearchSession {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

pub struct SearchOrchestrator {
    transport: Arc<dyn SearchTransport>,
    cache: Arc<ResultCache>,
    metrics: Arc<MetricsCollector>,
    retry: RetryConfig,
    keys: Arc<dyn KeyDerivation>,
    current_session: Mutex<Option<SearchSession>>,
    next_session_id: AtomicU64,
}

impl SearchOrchestrator {
    pub fn new(
        transport: Arc<dyn SearchTransport>,
        cache: Arc<ResultCache>,
        metrics: Arc<MetricsCollector>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            transport,
            cache,
            metrics,
            retry,
            keys: Arc::new(Fingerprinter),
            current_session: Mutex::new(None),
            next_session_id: AtomicU64::new(1),
        }
    }

    /// Replace the cache key derivation
    pub fn with_key_derivation(mut self, keys: Arc<dyn KeyDerivation>) -> Self {
        self.keys = keys;
        self
    }

    /// Search for `source`, superseding any search already in flight
    ///
    /// Resolves with `Cancelled` as soon as `cancel` (or a newer search)
    /// cancels the session, regardless of attempts remaining.
    pub async fn search(
        &self,
        source: &ImageSource,
        cancel: &CancellationToken,
    ) -> SearchResult<OrchestratedSearch> {
        let session = self.begin_session(cancel);
        self.search_in_session(source, &session).await
    }

    /// Run the search on a session claimed earlier with [`Self::begin_session`]
    ///
    /// Work done between claiming and calling this (such as validation) is
    /// covered by the session: if it was superseded meanwhile, no request is
    /// issued. The session is released when the search resolves.
    pub async fn search_in_session(
        &self,
        source: &ImageSource,
        session: &SearchSession,
    ) -> SearchResult<OrchestratedSearch> {
        let result = self.run_session(source, &session.token).await;
        self.end_session(session);

        match &result {
            Ok(found) => debug!(
                "Search for {} finished: {} match(es), attempts={}, from_cache={}",
                source.label(),
                found.matches.len(),
                found.attempts,
                found.from_cache
            ),
            Err(SearchError::Cancelled { attempts }) => {
                self.metrics.record_cancellation();
                info!(
                    "Search for {} cancelled after {} attempt(s)",
                    source.label(),
                    attempts
                );
            }
            Err(e) => {
                self.metrics.record_error();
                error!("Search for {} failed: {}", source.label(), e);
            }
        }

        result
    }

    /// Cancel the active session, if any
    pub fn cancel_current(&self) -> bool {
        match self.lock_session().take() {
            Some(session) => {
                debug!("Cancelling search session {}", session.id);
                session.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Claim the search slot, cancelling the session that held it
    ///
    /// The new session's token is a child of `cancel`.
    pub fn begin_session(&self, cancel: &CancellationToken) -> SearchSession {
        let session = SearchSession {
            id: self.next_session_id.fetch_add(1, Ordering::Relaxed),
            token: cancel.child_token(),
        };

        let previous = self.lock_session().replace(session.clone());
        if let Some(previous) = previous {
            debug!("Search session {} superseded by {}", previous.id, session.id);
            previous.token.cancel();
        }

        session
    }

    /// Release the slot if `session` still holds it
    pub fn end_session(&self, session: &SearchSession) {
        let mut current = self.lock_session();
        if current.as_ref().is_some_and(|active| active.id == session.id) {
            *current = None;
        }
    }

    fn lock_session(&self) -> std::sync::MutexGuard<'_, Option<SearchSession>> {
        self.current_session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn run_session(
        &self,
        source: &ImageSource,
        token: &CancellationToken,
    ) -> SearchResult<OrchestratedSearch> {
        if token.is_cancelled() {
            return Err(SearchError::Cancelled { attempts: 0 });
        }

        let key = match self.keys.derive_key(source).await {
            Ok(key) => Some(key),
            Err(e) => {
                warn!("{}; searching {} without caching", e, source.label());
                None
            }
        };

        if let Some(key) = &key {
            if let Some(entry) = self.cache.get(key).await {
                self.metrics.record_cache_hit();
                info!(
                    "Cache hit for {} ({} match(es), cached at {})",
                    key,
                    entry.results.len(),
                    entry.cached_at.format("%H:%M:%S")
                );
                return Ok(OrchestratedSearch {
                    key: Some(entry.key),
                    matches: entry.results,
                    from_cache: true,
                    attempts: 0,
                    response_time_ms: Some(entry.last_response_time_ms),
                });
            }
            self.metrics.record_cache_miss();
            info!("Cache miss for {}", key);
        }

        let (matches, attempts, response_time_ms) = self.execute_with_retry(source, token).await?;

        if let Some(key) = &key {
            self.cache
                .put(key.clone(), matches.clone(), response_time_ms)
                .await;
        }

        Ok(OrchestratedSearch {
            key,
            matches,
            from_cache: false,
            attempts,
            response_time_ms: Some(response_time_ms),
        })
    }

    /// Attempts are strictly sequential; cancellation is checked before each
    /// one and raced against both the request and the backoff sleep.
    async fn execute_with_retry(
        &self,
        source: &ImageSource,
        token: &CancellationToken,
    ) -> SearchResult<(Vec<RawMatch>, u32, u64)> {
        let request = SearchRequest::from_source(source);
        let max_attempts = self.retry.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            if token.is_cancelled() {
                return Err(SearchError::Cancelled {
                    attempts: attempt - 1,
                });
            }

            debug!(
                "Search attempt {}/{} for {}",
                attempt,
                max_attempts,
                source.label()
            );
            let started = Instant::now();

            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => Err(SearchError::Cancelled { attempts: attempt }),
                response = self.transport.search(&request) => interpret_response(response, attempt),
            };

            let err = match outcome {
                Ok(matches) => {
                    let response_time_ms =
                        u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                    self.metrics.record_success(response_time_ms);
                    if attempt > 1 {
                        debug!(
                            "Search succeeded on attempt {}/{}",
                            attempt, max_attempts
                        );
                    }
                    return Ok((matches, attempt, response_time_ms));
                }
                Err(err) => err,
            };

            if !err.is_retryable() {
                debug!("Search failed with non-retryable error: {}", err);
                return Err(err);
            }

            if attempt == max_attempts {
                warn!("Search failed after {} attempts: {}", max_attempts, err);
                return Err(err);
            }

            let delay = retry_delay(&self.retry, attempt);
            warn!(
                "Search attempt {}/{} failed, retrying in {:?}: {}",
                attempt, max_attempts, delay, err
            );

            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    return Err(SearchError::Cancelled { attempts: attempt });
                }
                _ = sleep(delay) => {}
            }
        }

        // The loop always returns on its final attempt
        Err(SearchError::Cancelled {
            attempts: max_attempts,
        })
    }
}

/// Classify one transport outcome
///
/// Non-2xx responses are failures whatever the body says: `Service` when the
/// body carries a service error, `Network` otherwise. On 2xx, a service error
/// is still `Service`, and anything not matching the response contract is
/// `MalformedResponse`.
pub fn interpret_response(
    response: Result<TransportResponse, TransportError>,
    attempt: u32,
) -> SearchResult<Vec<RawMatch>> {
    let response = response.map_err(|e| SearchError::Network {
        attempts: attempt,
        status: None,
        message: e.to_string(),
    })?;
    let status = Some(response.status);
    let parsed = serde_json::from_slice::<SearchResponse>(&response.body);

    if !response.is_success() {
        let service_error = parsed
            .ok()
            .and_then(|body| body.service_error().map(str::to_string));
        return Err(match service_error {
            Some(message) => SearchError::Service {
                attempts: attempt,
                status,
                message,
            },
            None => SearchError::Network {
                attempts: attempt,
                status,
                message: format!("HTTP {}", response.status),
            },
        });
    }

    let body = parsed.map_err(|e| SearchError::MalformedResponse {
        attempts: attempt,
        status,
        message: e.to_string(),
    })?;

    if let Some(message) = body.service_error() {
        return Err(SearchError::Service {
            attempts: attempt,
            status,
            message: message.to_string(),
        });
    }

    body.result.ok_or_else(|| SearchError::MalformedResponse {
        attempts: attempt,
        status,
        message: "response has neither `result` nor `error`".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FingerprintError;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    struct BrokenHasher;

    #[async_trait]
    impl KeyDerivation for BrokenHasher {
        async fn derive_key(&self, _source: &ImageSource) -> Result<CacheKey, FingerprintError> {
            Err(FingerprintError::hashing_unavailable("blocking pool shut down"))
        }
    }

    #[derive(Default)]
    struct CountingTransport {
        calls: AtomicU32,
    }

    #[async_trait]
    impl SearchTransport for CountingTransport {
        async fn search(
            &self,
            _request: &SearchRequest,
        ) -> Result<TransportResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(TransportResponse {
                status: 200,
                body: Bytes::from_static(br#"{"error":"","result":[{"similarity":0.93}]}"#),
            })
        }
    }

    fn orchestrator(transport: Arc<CountingTransport>) -> SearchOrchestrator {
        SearchOrchestrator::new(
            transport,
            Arc::new(ResultCache::new(Duration::from_secs(1800), 100)),
            Arc::new(MetricsCollector::new()),
            RetryConfig::immediate(3),
        )
    }

    fn response(status: u16, body: &str) -> Result<TransportResponse, TransportError> {
        Ok(TransportResponse {
            status,
            body: Bytes::from(body.to_string()),
        })
    }

    #[tokio::test]
    async fn test_unhashable_source_is_searched_without_cache() {
        let transport = Arc::new(CountingTransport::default());
        let orchestrator =
            orchestrator(transport.clone()).with_key_derivation(Arc::new(BrokenHasher));
        let source = ImageSource::from_file_bytes(vec![7u8; 64], "image/png", "frame.png");
        let cancel = CancellationToken::new();

        let found = orchestrator.search(&source, &cancel).await.unwrap();
        assert_eq!(found.key, None);
        assert_eq!(found.matches.len(), 1);
        assert!(!found.from_cache);
        assert_eq!(found.attempts, 1);
        assert!(orchestrator.cache.is_empty().await);

        let metrics = orchestrator.metrics.snapshot();
        assert_eq!(metrics.cache_hits, 0);
        assert_eq!(metrics.cache_misses, 0);
        assert_eq!(metrics.successes, 1);

        // Nothing was cached, so the repeat goes back to the network
        let again = orchestrator.search(&source, &cancel).await.unwrap();
        assert!(!again.from_cache);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
        assert_eq!(orchestrator.metrics.snapshot().cache_misses, 0);
    }

    #[tokio::test]
    async fn test_superseded_session_issues_no_request() {
        let transport = Arc::new(CountingTransport::default());
        let orchestrator = orchestrator(transport.clone());
        let source = ImageSource::from_url("https://example.com/a.jpg").unwrap();
        let cancel = CancellationToken::new();

        let older = orchestrator.begin_session(&cancel);
        let newer = orchestrator.begin_session(&cancel);
        assert!(older.token().is_cancelled());
        assert!(!cancel.is_cancelled());

        let err = orchestrator.search_in_session(&source, &older).await.unwrap_err();
        assert_eq!(err, SearchError::Cancelled { attempts: 0 });
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);

        // Releasing the older session leaves the newer one in the slot
        assert!(orchestrator.search_in_session(&source, &newer).await.is_ok());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert!(!orchestrator.cancel_current());
        assert_eq!(orchestrator.metrics.snapshot().cancellations, 1);
    }

    #[test]
    fn test_interpret_success_with_blank_error() {
        let matches = interpret_response(
            response(200, r#"{"error":"","result":[{"similarity":0.9}]}"#),
            1,
        )
        .unwrap();
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn test_interpret_service_error_body() {
        let err = interpret_response(response(200, r#"{"error":"Search queue is full"}"#), 2)
            .unwrap_err();
        assert!(matches!(err, SearchError::Service { attempts: 2, .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_interpret_non_2xx_ignores_result_body() {
        let err =
            interpret_response(response(503, r#"{"result":[{"similarity":0.9}]}"#), 1).unwrap_err();
        assert_eq!(
            err,
            SearchError::Network {
                attempts: 1,
                status: Some(503),
                message: "HTTP 503".to_string()
            }
        );

        let err = interpret_response(response(429, r#"{"error":"Too many requests"}"#), 1)
            .unwrap_err();
        assert!(matches!(err, SearchError::Service { status: Some(429), .. }));
    }

    #[test]
    fn test_interpret_malformed_bodies() {
        for body in ["not json", r#"{"result":"nope"}"#, r#"{}"#, r#"{"result":[{"episode":1}]}"#] {
            let err = interpret_response(response(200, body), 1).unwrap_err();
            assert!(
                matches!(err, SearchError::MalformedResponse { .. }),
                "body {body} gave {err:?}"
            );
            assert!(!err.is_retryable());
        }
    }

    #[test]
    fn test_interpret_transport_failure() {
        let err = interpret_response(Err(TransportError::request("connection refused")), 3)
            .unwrap_err();
        assert_eq!(err.status(), None);
        assert_eq!(err.attempts(), 3);
        assert!(err.is_retryable());
    }
}
