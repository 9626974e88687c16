//! # Design
//!
//! - Keep error messages constant; carry the operation and HTTP status as fields.
//! - Classify statuses once so callers never compare raw codes.
//! - Preserve transport and decode sources without interpolating them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Statuses treated as transient and retried at the call site.
const RETRYABLE_STATUSES: &[u16] = &[429, 500, 502, 504, 509];
/// Statuses that indicate an expired or dead direct-download reference.
const BROKEN_LINK_STATUSES: &[u16] = &[404, 503];

/// Result alias for remote operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Structured body produced by the error handler for non-2xx responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiProblem {
    /// Human-readable message reported by the service (or the raw body).
    pub message: String,
    /// HTTP status code of the failed response.
    pub status: u16,
}

/// Errors raised while talking to the remote service.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The HTTP request could not be sent or its body could not be read.
    #[error("remote request failed")]
    Transport {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying HTTP client error.
        source: reqwest::Error,
    },
    /// The service answered with a non-2xx status.
    #[error("remote returned an error status")]
    Status {
        /// Operation identifier.
        operation: &'static str,
        /// Parsed problem payload.
        problem: ApiProblem,
    },
    /// The response body did not match the expected shape.
    #[error("remote response could not be decoded")]
    Decode {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
    /// The caller cancelled the operation before it completed.
    #[error("remote operation cancelled")]
    Cancelled {
        /// Operation identifier.
        operation: &'static str,
    },
    /// A configured or returned URL could not be parsed.
    #[error("invalid remote url")]
    InvalidUrl {
        /// Offending value.
        value: String,
        /// Underlying parse error.
        source: url::ParseError,
    },
    /// A header value could not be built from caller input.
    #[error("invalid request header")]
    InvalidHeader {
        /// Header name.
        name: &'static str,
    },
}

impl RemoteError {
    /// Build a status error from a problem payload.
    #[must_use]
    pub const fn status_error(operation: &'static str, problem: ApiProblem) -> Self {
        Self::Status { operation, problem }
    }

    /// HTTP status of the failure, when the service produced one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { problem, .. } => Some(problem.status),
            Self::Transport { source, .. } => source.status().map(|status| status.as_u16()),
            _ => None,
        }
    }

    /// Whether the failure is transient and worth retrying after a backoff.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.status()
            .is_some_and(|status| RETRYABLE_STATUSES.contains(&status))
    }

    /// Whether the failure means the direct-download reference is dead.
    #[must_use]
    pub fn is_broken_link(&self) -> bool {
        self.status()
            .is_some_and(|status| BROKEN_LINK_STATUSES.contains(&status))
    }

    /// Whether the remote object does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Whether the caller cancelled the operation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Operation identifier attached to the error.
    #[must_use]
    pub const fn operation(&self) -> Option<&'static str> {
        match self {
            Self::Transport { operation, .. }
            | Self::Status { operation, .. }
            | Self::Decode { operation, .. }
            | Self::Cancelled { operation } => Some(operation),
            Self::InvalidUrl { .. } | Self::InvalidHeader { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> RemoteError {
        RemoteError::status_error(
            "test",
            ApiProblem {
                message: "boom".into(),
                status: code,
            },
        )
    }

    #[test]
    fn classifies_statuses() {
        for code in [429, 500, 502, 504, 509] {
            assert!(status(code).is_retryable(), "{code} should retry");
            assert!(!status(code).is_broken_link());
        }
        assert!(status(503).is_broken_link());
        assert!(status(404).is_broken_link());
        assert!(status(404).is_not_found());
        assert!(!status(403).is_retryable());
        assert!(!status(403).is_broken_link());
    }

    #[test]
    fn cancelled_has_no_status() {
        let err = RemoteError::Cancelled { operation: "op" };
        assert!(err.is_cancelled());
        assert_eq!(err.status(), None);
        assert_eq!(err.operation(), Some("op"));
        assert!(!err.is_retryable());
    }
}
