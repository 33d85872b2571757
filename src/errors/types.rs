//! Error type definitions for scene-finder
//!
//! The hierarchy mirrors the search pipeline: fingerprinting, transport,
//! search orchestration and history persistence each get their own enum, and
//! `AppError` wraps them for the binary and configuration layers.

use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Search pipeline failures surfaced to the caller
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    /// History persistence errors
    #[error("History error: {0}")]
    History(#[from] HistoryError),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Input could not be turned into an image source
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// File system errors while reading input images
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures surfaced by the search pipeline
///
/// Every variant that can follow a network attempt carries the number of
/// attempts made and, when one was received, the last HTTP status, so callers
/// can build a user-facing message without inspecting logs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    /// Format or size limits rejected the input; never retried
    #[error("Image rejected: {reason}")]
    ValidationRejected { reason: String },

    /// The session was cancelled by the caller or superseded by a newer search
    #[error("Search cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },

    /// Transport failure or a non-2xx status without a service error body
    #[error("Network error after {attempts} attempt(s) (status: {status:?}): {message}")]
    Network {
        attempts: u32,
        status: Option<u16>,
        message: String,
    },

    /// The recognition service reported an error
    #[error("Service error after {attempts} attempt(s) (status: {status:?}): {message}")]
    Service {
        attempts: u32,
        status: Option<u16>,
        message: String,
    },

    /// The response body did not match the expected JSON contract
    #[error("Malformed response on attempt {attempts} (status: {status:?}): {message}")]
    MalformedResponse {
        attempts: u32,
        status: Option<u16>,
        message: String,
    },
}

/// Errors from cache key derivation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FingerprintError {
    /// The content digest could not be computed
    #[error("Content hashing unavailable: {message}")]
    HashingUnavailable { message: String },
}

/// Errors raised by a single transport call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection, timeout or body read failure
    #[error("Request failed: {message}")]
    Request { message: String },

    /// The request could not be constructed
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },
}

/// History persistence errors
#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("History I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("History serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

impl SearchError {
    /// Create a validation rejection
    pub fn rejected<S: Into<String>>(reason: S) -> Self {
        Self::ValidationRejected {
            reason: reason.into(),
        }
    }

    /// Whether another attempt may be made after this failure
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Service { .. })
    }

    /// Number of network attempts made before this failure
    pub fn attempts(&self) -> u32 {
        match self {
            Self::ValidationRejected { .. } => 0,
            Self::Cancelled { attempts }
            | Self::Network { attempts, .. }
            | Self::Service { attempts, .. }
            | Self::MalformedResponse { attempts, .. } => *attempts,
        }
    }

    /// Last HTTP status seen, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Network { status, .. }
            | Self::Service { status, .. }
            | Self::MalformedResponse { status, .. } => *status,
            _ => None,
        }
    }
}

impl FingerprintError {
    pub fn hashing_unavailable<S: Into<String>>(message: S) -> Self {
        Self::HashingUnavailable {
            message: message.into(),
        }
    }
}

impl TransportError {
    pub fn request<S: Into<String>>(message: S) -> Self {
        Self::Request {
            message: message.into(),
        }
    }
}
