//! Core error types

use thiserror::Error;

/// Errors raised by the identifier codec, value conversions and the waiter
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("malformed id {id:?}: expected {expected}")]
    MalformedId { id: String, expected: &'static str },

    #[error("unknown scope {0:?}: not a known zone or region")]
    UnknownScope(String),

    #[error("invalid uuid {0:?}")]
    InvalidUuid(String),

    #[error("invalid duration {0:?}")]
    InvalidDuration(String),

    #[error("invalid RFC 3339 time {0:?}")]
    InvalidTime(String),

    #[error("invalid IP address {0:?}")]
    InvalidIp(String),

    #[error("invalid CIDR {0:?}")]
    InvalidCidr(String),

    #[error("unexpected value type at {path}: expected {expected}")]
    TypeMismatch { path: String, expected: &'static str },

    #[error("state upgrade failed: {0}")]
    StateUpgrade(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, CoreError>;
