//! Error types for the CRM adapter

use std::time::Duration;

use thiserror::Error;

use crate::types::ApiError;

/// Result type alias for CRM operations
pub type Result<T> = std::result::Result<T, CrmError>;

#[derive(Error, Debug)]
pub enum CrmError {
    /// Token exchange rejected (bad consumer key/secret, disabled flow)
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Transport-level failure: DNS, connect, TLS, timeout
    #[error("Network request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The tenant answered with an error payload
    #[error("{}", describe_errors(*status, errors))]
    Api {
        status: u16,
        errors: Vec<ApiError>,
        retry_after: Option<Duration>,
    },

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CrmError {
    pub fn api(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            errors: vec![ApiError::new(code, message)],
            retry_after: None,
        }
    }

    /// Transient failures that a later attempt may get past.
    pub fn is_retryable(&self) -> bool {
        match self {
            CrmError::Http(err) => err.is_timeout() || err.is_connect(),
            CrmError::Api { status, .. } => matches!(status, 408 | 429 | 500 | 502 | 503 | 504),
            _ => false,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            CrmError::Api { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// First error code reported by the tenant, e.g. `DUPLICATE_VALUE`.
    pub fn error_code(&self) -> Option<&str> {
        match self {
            CrmError::Api { errors, .. } => errors.first().map(|e| e.error_code.as_str()),
            _ => None,
        }
    }
}

fn describe_errors(status: u16, errors: &[ApiError]) -> String {
    if errors.is_empty() {
        return format!("CRM request failed with status {status}");
    }
    errors
        .iter()
        .map(|e| {
            if e.error_code.is_empty() {
                e.message.clone()
            } else {
                format!("{}: {}", e.error_code, e.message)
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = CrmError::api(400, "DUPLICATE_VALUE", "duplicate value found: CCN__c");
        assert_eq!(err.to_string(), "DUPLICATE_VALUE: duplicate value found: CCN__c");
        assert_eq!(err.error_code(), Some("DUPLICATE_VALUE"));
    }

    #[test]
    fn test_api_error_without_details() {
        let err = CrmError::Api {
            status: 503,
            errors: vec![],
            retry_after: None,
        };
        assert_eq!(err.to_string(), "CRM request failed with status 503");
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(CrmError::api(429, "REQUEST_LIMIT_EXCEEDED", "slow down").is_retryable());
        assert!(CrmError::api(503, "SERVER_UNAVAILABLE", "try later").is_retryable());
        assert!(!CrmError::api(400, "INVALID_FIELD", "No such column").is_retryable());
        assert!(!CrmError::Auth("invalid_client".to_string()).is_retryable());
    }
}
