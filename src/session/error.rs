//! Errors reported by session-bound requests and feature operations.

use thiserror::Error;

use crate::transport::TransportError;

/// Service code signalling that the server invalidated the session.
pub const NOT_LOGGED_IN_CODE: i64 = 1_357_001;

/// Errors from a single feature operation. None of them invalidate the
/// session except [`ApiError::NotLoggedIn`], which also clears its
/// logged-in flag.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The arguments were rejected before any exchange.
    #[error("{operation}: {reason}")]
    Validation {
        operation: &'static str,
        reason: String,
    },

    /// The server no longer considers this session logged in.
    #[error("not logged in")]
    NotLoggedIn,

    /// The response body was not the expected structured payload.
    #[error("malformed response from {url} (status {status}): {reason}")]
    MalformedResponse {
        url: String,
        status: u16,
        reason: String,
    },

    /// The service answered with an error payload.
    #[error("{operation} rejected by service: {detail}")]
    Rejected {
        operation: &'static str,
        detail: String,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ApiError {
    pub(crate) fn validation(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            operation,
            reason: reason.into(),
        }
    }

    pub(crate) fn rejected(operation: &'static str, detail: impl Into<String>) -> Self {
        Self::Rejected {
            operation,
            detail: detail.into(),
        }
    }
}
