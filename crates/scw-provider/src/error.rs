//! Provider error types

use scw_api::ApiError;
use scw_config::ConfigError;
use scw_core::waiter::WaitError;
use scw_core::{AttributePath, Classify, CoreError, Diagnostic, ErrorKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("timeout while waiting for {what} (last status: {last_status})")]
    Timeout { what: String, last_status: String },

    #[error("cancelled while waiting for {0}")]
    Cancelled(String),

    /// Failure located on one attribute
    #[error("{message}")]
    Attribute {
        path: AttributePath,
        kind: ErrorKind,
        message: String,
    },

    /// Attachments that settled in a failed status, as `member (status)`
    #[error("attachment failed: {}", .failed.join(", "))]
    AttachFailed { failed: Vec<String> },

    #[error("unknown {category} type: {name}")]
    UnknownType { category: &'static str, name: String },

    #[error("provider is not configured")]
    NotConfigured,

    #[error("invalid state: {0}")]
    InvalidState(String),
}

pub type Result<T> = std::result::Result<T, ProviderError>;

impl ProviderError {
    /// Attach `path` to any error, keeping its kind
    pub fn at(path: impl Into<AttributePath>, err: impl Into<ProviderError>) -> Self {
        let err = err.into();
        match err {
            ProviderError::Attribute { .. } => err,
            other => ProviderError::Attribute {
                path: path.into(),
                kind: other.kind(),
                message: other.to_string(),
            },
        }
    }

    /// Validation-style error on `path`
    pub fn invalid(path: impl Into<AttributePath>, message: impl Into<String>) -> Self {
        ProviderError::Attribute {
            path: path.into(),
            kind: ErrorKind::Other,
            message: message.into(),
        }
    }

    pub fn path(&self) -> Option<&AttributePath> {
        match self {
            ProviderError::Attribute { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Error diagnostic with a summary per lifecycle phase
    pub fn to_diagnostic(&self, summary: &str) -> Diagnostic {
        let diag = Diagnostic::error(summary).with_detail(self.to_string());
        match self.path() {
            Some(path) => diag.with_path(path.clone()),
            None => diag,
        }
    }
}

impl Classify for ProviderError {
    fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::Api(e) => e.kind(),
            ProviderError::Attribute { kind, .. } => *kind,
            _ => ErrorKind::Other,
        }
    }
}

impl From<WaitError<ApiError>> for ProviderError {
    fn from(err: WaitError<ApiError>) -> Self {
        match err {
            WaitError::Timeout { what, last_status } => {
                ProviderError::Timeout { what, last_status }
            }
            WaitError::Cancelled(what) => ProviderError::Cancelled(what),
            WaitError::Failed(e) => ProviderError::Api(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_keeps_kind() {
        let err = ProviderError::at("user_ids", ApiError::not_found("group", "g1"));
        assert!(err.is_not_found());
        assert_eq!(err.path().map(ToString::to_string).as_deref(), Some("user_ids"));
    }

    #[test]
    fn test_diagnostic_carries_path() {
        let diag = ProviderError::invalid("rule", "bad rule").to_diagnostic("Error creating policy");
        assert!(diag.is_error());
        assert_eq!(diag.detail, "bad rule");
        assert_eq!(diag.path, Some(AttributePath::attr("rule")));
    }

    #[test]
    fn test_wait_timeout_converts() {
        let err: ProviderError = WaitError::<ApiError>::Timeout {
            what: "lb".into(),
            last_status: "pending".into(),
        }
        .into();
        assert!(err.to_string().contains("pending"));
    }
}
