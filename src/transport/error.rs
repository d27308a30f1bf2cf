//! Error types for the transport layer.
//!
//! Transport errors are network-level only. HTTP status codes are not errors
//! here: the login flow classifies responses by their redirect target and
//! body, so non-2xx responses are returned to the caller as exchanges.

use thiserror::Error;

/// Errors that can occur while performing an exchange.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// The connection attempt timed out.
    #[error("timeout requesting {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The HTTP client could not be constructed with the requested settings.
    #[error("HTTP client construction failed: {reason}")]
    ClientBuild {
        /// Why construction failed.
        reason: String,
    },
}

impl TransportError {
    /// Creates a network or timeout error from a reqwest error.
    pub fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { url: url.into() }
        } else {
            Self::Network {
                url: url.into(),
                source,
            }
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a client construction error.
    pub fn client_build(reason: impl Into<String>) -> Self {
        Self::ClientBuild {
            reason: reason.into(),
        }
    }
}

// No `From<reqwest::Error>`: every variant needs the request URL for context.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_invalid_url_display() {
        let error = TransportError::invalid_url("not-a-url");
        let msg = error.to_string();
        assert!(msg.contains("invalid URL"), "Expected 'invalid URL' in: {msg}");
        assert!(msg.contains("not-a-url"), "Expected URL in: {msg}");
    }

    #[test]
    fn test_transport_error_timeout_display() {
        let error = TransportError::Timeout {
            url: "https://service.example/".to_string(),
        };
        assert!(error.to_string().contains("timeout"));
        assert!(error.to_string().contains("https://service.example/"));
    }

    #[test]
    fn test_transport_error_client_build_display() {
        let error = TransportError::client_build("bad proxy");
        assert_eq!(error.to_string(), "HTTP client construction failed: bad proxy");
    }
}
