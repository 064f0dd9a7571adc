//! Transport error taxonomy
//!
//! Lifecycle code branches on a handful of kinds, never on raw status codes.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Deleted remotely
    NotFound,
    /// Authorization gap, often transient while permissions propagate
    Forbidden,
    RateLimited,
    PreconditionFailed,
    Conflict,
    Other,
}

impl ErrorKind {
    /// Map an HTTP status code
    pub fn from_status(status: u16) -> Self {
        match status {
            404 => ErrorKind::NotFound,
            403 => ErrorKind::Forbidden,
            409 => ErrorKind::Conflict,
            412 => ErrorKind::PreconditionFailed,
            429 => ErrorKind::RateLimited,
            _ => ErrorKind::Other,
        }
    }

    /// Map the `type` field of a Scaleway error body
    pub fn from_error_type(kind: &str) -> Option<Self> {
        match kind {
            "not_found" => Some(ErrorKind::NotFound),
            "permissions_denied" | "denied_authentication" => Some(ErrorKind::Forbidden),
            "precondition_failed" => Some(ErrorKind::PreconditionFailed),
            "conflict" | "transient_state" => Some(ErrorKind::Conflict),
            "quotas_exceeded" | "too_many_requests" => Some(ErrorKind::RateLimited),
            _ => None,
        }
    }

    /// Whether a waiter keeps polling through this kind
    pub fn is_retryable_while_waiting(&self) -> bool {
        matches!(self, ErrorKind::RateLimited | ErrorKind::Forbidden)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::RateLimited => "rate limited",
            ErrorKind::PreconditionFailed => "precondition failed",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Other => "error",
        };
        f.write_str(s)
    }
}

/// Errors that can be reduced to an [`ErrorKind`]
pub trait Classify {
    fn kind(&self) -> ErrorKind;

    fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    fn is_forbidden(&self) -> bool {
        self.kind() == ErrorKind::Forbidden
    }
}
