//! Scaleway API error types

use scw_core::{Classify, CoreError, ErrorKind};
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Non-2xx reply, with the decoded Scaleway error body when present
    #[error("{message} (HTTP {status}{})", request_line(.method, .path))]
    Http {
        method: String,
        path: String,
        status: u16,
        error_type: Option<String>,
        message: String,
        resource: Option<String>,
    },

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to decode response of {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid client configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Context(#[from] CoreError),
}

pub type Result<T> = std::result::Result<T, ApiError>;

fn request_line(method: &str, path: &str) -> String {
    if method.is_empty() {
        String::new()
    } else {
        format!(", {method} {path}")
    }
}

impl ApiError {
    pub fn not_found(resource: &str, id: &str) -> Self {
        Self::status(404, Some("not_found"), format!("{resource} {id} not found"))
            .with_resource(resource)
    }

    /// An HTTP error with a synthetic request line
    pub fn status(status: u16, error_type: Option<&str>, message: impl Into<String>) -> Self {
        ApiError::Http {
            method: String::new(),
            path: String::new(),
            status,
            error_type: error_type.map(str::to_string),
            message: message.into(),
            resource: None,
        }
    }

    fn with_resource(mut self, name: &str) -> Self {
        if let ApiError::Http { resource, .. } = &mut self {
            *resource = Some(name.to_string());
        }
        self
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl Classify for ApiError {
    fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Http {
                status, error_type, ..
            } => match ErrorKind::from_status(*status) {
                ErrorKind::Other => error_type
                    .as_deref()
                    .and_then(ErrorKind::from_error_type)
                    .unwrap_or(ErrorKind::Other),
                kind => kind,
            },
            _ => ErrorKind::Other,
        }
    }
}

/// Error body returned by every Scaleway API
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: Option<String>,
    pub resource: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        assert!(ApiError::not_found("lb", "x").is_not_found());
        assert_eq!(ApiError::status(403, None, "").kind(), ErrorKind::Forbidden);
        assert_eq!(ApiError::status(429, None, "").kind(), ErrorKind::RateLimited);
        assert_eq!(ApiError::status(412, None, "").kind(), ErrorKind::PreconditionFailed);
        assert_eq!(ApiError::status(409, None, "").kind(), ErrorKind::Conflict);
        assert_eq!(ApiError::status(500, None, "").kind(), ErrorKind::Other);
    }

    #[test]
    fn test_classify_wrapped_type() {
        let err = ApiError::status(400, Some("permissions_denied"), "denied");
        assert!(err.is_forbidden());
        let err = ApiError::status(400, Some("invalid_arguments"), "bad");
        assert_eq!(err.kind(), ErrorKind::Other);
    }

    #[test]
    fn test_context_errors_are_other() {
        let err = ApiError::from(CoreError::Cancelled);
        assert_eq!(err.kind(), ErrorKind::Other);
    }
}
