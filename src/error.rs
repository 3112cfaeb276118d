//! Error types for czds-dl
//!
//! This module provides error handling for the crate, including:
//! - Domain-specific error types (Auth, Fetch, Decompress, etc.)
//! - Classification of token-expiry failures that earn the single
//!   automatic re-authentication retry

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for czds-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for czds-dl
///
/// Fatal variants (`Auth`, `Config`, and `Io` during setup) abort the run;
/// everything else is captured per-task and aggregated into the run summary.
#[derive(Debug, Error)]
pub enum Error {
    /// Authentication against the token endpoint failed.
    ///
    /// Fatal for the whole run: bad credentials will not become valid on
    /// retry, so no automatic retry is attempted.
    #[error("authentication failed: {message}")]
    Auth {
        /// Human-readable description of the failure (HTTP status, missing
        /// token field, transport error)
        message: String,
    },

    /// Per-call transport or HTTP failure
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Decompression of a downloaded zone file failed
    #[error("decompression failed for {path}: {reason}")]
    Decompress {
        /// The compressed file that could not be decompressed
        path: PathBuf,
        /// The reason decompression failed
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
    },

    /// Cooperative stop signal observed before or during the operation
    #[error("cancelled")]
    Cancelled,
}

/// Transport and HTTP failures for a single authenticated request
#[derive(Debug, Error)]
pub enum FetchError {
    /// Endpoint returned a non-success HTTP status
    #[error("{url} returned HTTP {status}: {body}")]
    Status {
        /// The URL that was requested
        url: String,
        /// The HTTP status code returned
        status: u16,
        /// A snippet of the response body, for diagnostics
        body: String,
    },

    /// Response body ended before the advertised length was received
    #[error("{url} truncated: expected {expected} bytes, received {received}")]
    Truncated {
        /// The URL that was requested
        url: String,
        /// Bytes advertised by the Content-Length header
        expected: u64,
        /// Bytes actually received
        received: u64,
    },

    /// Response carried no usable filename and the URL has no basename
    #[error("{url} provided no filename to save under")]
    MissingFilename {
        /// The URL that was requested
        url: String,
    },
}

impl Error {
    /// Returns true if this failure means the bearer token has expired or
    /// been invalidated server-side.
    ///
    /// This is the only failure class that earns an automatic retry: the
    /// task goes back to pending exactly once after a token refresh.
    pub fn is_auth_expired(&self) -> bool {
        match self {
            Error::Fetch(FetchError::Status { status, .. }) => {
                matches!(status, 401 | 403)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn status_error(status: u16) -> Error {
        Error::Fetch(FetchError::Status {
            url: "https://czds-api.example.org/zone/xyz.zone".to_string(),
            status,
            body: String::new(),
        })
    }

    #[test]
    fn unauthorized_and_forbidden_are_auth_expiry() {
        assert!(status_error(401).is_auth_expired());
        assert!(status_error(403).is_auth_expired());
    }

    #[test]
    fn other_statuses_are_not_auth_expiry() {
        assert!(!status_error(404).is_auth_expired());
        assert!(!status_error(500).is_auth_expired());
        assert!(!status_error(429).is_auth_expired());
    }

    #[test]
    fn non_fetch_errors_are_not_auth_expiry() {
        assert!(
            !Error::Auth {
                message: "bad credentials".to_string()
            }
            .is_auth_expired()
        );
        assert!(!Error::Cancelled.is_auth_expired());
        assert!(
            !Error::Decompress {
                path: PathBuf::from("zone.txt.gz"),
                reason: "corrupt gzip header".to_string(),
            }
            .is_auth_expired()
        );
    }
}
