//! Search inputs and the cache key derived from them

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::errors::{AppError, AppResult};

/// Image bytes supplied by the user (file pick, drag-drop or paste)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSource {
    pub bytes: Bytes,
    pub mime_type: String,
    pub size_bytes: u64,
    pub file_name: String,
}

/// Remote image referenced by an absolute http(s) URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlSource {
    pub url: String,
}

/// Exactly one input per search
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    File(FileSource),
    Url(UrlSource),
}

impl ImageSource {
    /// Build a file source; `size_bytes` is taken from the buffer length
    pub fn from_file_bytes(
        bytes: impl Into<Bytes>,
        mime_type: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        let bytes = bytes.into();
        Self::File(FileSource {
            size_bytes: bytes.len() as u64,
            bytes,
            mime_type: mime_type.into(),
            file_name: file_name.into(),
        })
    }

    /// Build a URL source, accepting only absolute http/https URLs
    pub fn from_url(url: &str) -> AppResult<Self> {
        let trimmed = url.trim();
        let parsed = url::Url::parse(trimmed)
            .map_err(|e| AppError::invalid_input(format!("Invalid URL '{trimmed}': {e}")))?;

        match parsed.scheme() {
            "http" | "https" => Ok(Self::Url(UrlSource {
                url: trimmed.to_string(),
            })),
            other => Err(AppError::invalid_input(format!(
                "Unsupported URL scheme '{other}', expected http or https"
            ))),
        }
    }

    /// Read a file from disk, guessing the MIME type from its content
    pub async fn from_path(path: &Path) -> AppResult<Self> {
        let bytes = tokio::fs::read(path).await?;
        let mime_type = image::guess_format(&bytes)
            .map(|format| format.to_mime_type().to_string())
            .unwrap_or_else(|_| "application/octet-stream".to_string());
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self::from_file_bytes(bytes, mime_type, file_name))
    }

    /// Short human label for logs and history
    pub fn label(&self) -> &str {
        match self {
            Self::File(file) => &file.file_name,
            Self::Url(url) => &url.url,
        }
    }
}

/// Opaque cache index derived from an image source
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
