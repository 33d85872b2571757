//! HTTP transport to the recognition service
//!
//! The orchestrator talks to the service through [`SearchTransport`] so that
//! tests can script responses; [`ReqwestSearchTransport`] is the real client.
//! A transport only moves bytes: status and body interpretation happens in
//! the orchestrator.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, header::ACCEPT, multipart};
use tracing::debug;
use url::Url;

use crate::config::ServiceConfig;
use crate::errors::{AppError, AppResult, TransportError};
use crate::models::ImageSource;

/// Outbound query, built once per session and reused by every attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchRequest {
    /// `GET <base>/search?url=<encoded URL>`
    ByUrl { url: String },
    /// `POST <base>/search` with multipart field `image`
    ByFile {
        bytes: Bytes,
        mime_type: String,
        file_name: String,
    },
}

impl SearchRequest {
    pub fn from_source(source: &ImageSource) -> Self {
        match source {
            ImageSource::Url(url) => Self::ByUrl {
                url: url.url.clone(),
            },
            ImageSource::File(file) => Self::ByFile {
                // Bytes clones are reference-counted
                bytes: file.bytes.clone(),
                mime_type: file.mime_type.clone(),
                file_name: file.file_name.clone(),
            },
        }
    }
}

/// Raw HTTP outcome of one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Bytes,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One request/response exchange with the recognition service
///
/// Implementations must be abortable by drop: the orchestrator races the
/// returned future against the session's cancellation token.
#[async_trait]
pub trait SearchTransport: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<TransportResponse, TransportError>;
}

/// `reqwest`-backed transport
pub struct ReqwestSearchTransport {
    client: Client,
    endpoint: Url,
}

impl ReqwestSearchTransport {
    pub fn new(config: &ServiceConfig) -> AppResult<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: Self::search_endpoint(config)?,
        })
    }

    /// `<base>/search`, plus the optional valueless service flags
    pub fn search_endpoint(config: &ServiceConfig) -> AppResult<Url> {
        let raw = format!("{}/search", config.base_url.trim_end_matches('/'));
        let mut endpoint = Url::parse(&raw).map_err(|e| {
            AppError::configuration(format!("Invalid search endpoint '{raw}': {e}"))
        })?;

        if config.anilist_info || config.cut_borders {
            let mut query = endpoint.query_pairs_mut();
            if config.anilist_info {
                query.append_key_only("anilistInfo");
            }
            if config.cut_borders {
                query.append_key_only("cutBorders");
            }
        }

        Ok(endpoint)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl SearchTransport for ReqwestSearchTransport {
    async fn search(&self, request: &SearchRequest) -> Result<TransportResponse, TransportError> {
        let builder = match request {
            SearchRequest::ByUrl { url } => {
                debug!("Searching by URL via {}", self.endpoint);
                self.client
                    .get(self.endpoint.clone())
                    .query(&[("url", url.as_str())])
            }
            SearchRequest::ByFile {
                bytes,
                mime_type,
                file_name,
            } => {
                debug!(
                    "Uploading {} ({} bytes) to {}",
                    file_name,
                    bytes.len(),
                    self.endpoint
                );
                let part = multipart::Part::stream_with_length(bytes.clone(), bytes.len() as u64)
                    .file_name(file_name.clone())
                    .mime_str(mime_type)
                    .map_err(|e| TransportError::InvalidRequest {
                        message: format!("Invalid MIME type '{mime_type}': {e}"),
                    })?;
                self.client
                    .post(self.endpoint.clone())
                    .multipart(multipart::Form::new().part("image", part))
            }
        };

        let response = builder
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| TransportError::request(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::request(format!("Failed to read response body: {e}")))?;

        debug!("Search endpoint answered {} with {} bytes", status, body.len());
        Ok(TransportResponse { status, body })
    }
}
