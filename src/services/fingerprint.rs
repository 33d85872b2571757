//! Cache key derivation for image sources
//!
//! File keys are `file:<sha256 hex>:<size>`, so identical bytes collide
//! regardless of file name. URL keys are `url:<url>` with no normalization
//! beyond trimming: `http://x.com/a.png` and `http://x.com/a.png?` are
//! distinct keys.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::errors::FingerprintError;
use crate::models::{CacheKey, ImageSource};

/// Key derivation as used by the orchestrator
#[async_trait]
pub trait KeyDerivation: Send + Sync {
    async fn derive_key(&self, source: &ImageSource) -> Result<CacheKey, FingerprintError>;
}

pub struct Fingerprinter;

#[async_trait]
impl KeyDerivation for Fingerprinter {
    async fn derive_key(&self, source: &ImageSource) -> Result<CacheKey, FingerprintError> {
        Self::compute_key(source).await
    }
}

impl Fingerprinter {
    /// Derive the cache key for a source
    ///
    /// Hashing runs on the blocking pool; if that task cannot complete the
    /// source is uncacheable and `HashingUnavailable` is returned.
    pub async fn compute_key(source: &ImageSource) -> Result<CacheKey, FingerprintError> {
        match source {
            ImageSource::Url(url) => Ok(Self::url_key(&url.url)),
            ImageSource::File(file) => {
                let bytes = file.bytes.clone();
                let size_bytes = file.size_bytes;

                let digest = tokio::task::spawn_blocking(move || Self::sha256_hex(&bytes))
                    .await
                    .map_err(|e| FingerprintError::hashing_unavailable(e.to_string()))?;

                let key = CacheKey::new(format!("file:{digest}:{size_bytes}"));
                debug!("Fingerprinted {} as {}", file.file_name, key);
                Ok(key)
            }
        }
    }

    /// Key for a URL source
    pub fn url_key(url: &str) -> CacheKey {
        CacheKey::new(format!("url:{}", url.trim()))
    }

    /// Key for raw file content, computed inline
    pub fn file_key(bytes: &[u8], size_bytes: u64) -> CacheKey {
        CacheKey::new(format!("file:{}:{}", Self::sha256_hex(bytes), size_bytes))
    }

    fn sha256_hex(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hex::encode(hasher.finalize())
    }
}
