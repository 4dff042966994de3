//! Error types for the ingest pipelines

use nhsync_common::SyncError;
use nhsync_crm::CrmError;
use thiserror::Error;

use crate::cac::CacError;

/// Result type alias for ingest operations
pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("CRM error: {0}")]
    Crm(#[from] CrmError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The upstream dataset could not be downloaded
    #[error("Failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// Header row missing or lacking a column the pipeline depends on
    #[error("Unreadable CSV header: {0}")]
    Header(String),

    #[error("Officer lookup failed: {0}")]
    Cac(#[from] CacError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestError {
    pub fn fetch(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Fetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Errors that abort the run before any record is sent.
    pub fn is_fatal(&self) -> bool {
        match self {
            IngestError::Sync(err) => err.is_fatal(),
            IngestError::Crm(CrmError::Auth(_) | CrmError::Config(_)) => true,
            IngestError::Crm(_) | IngestError::Cac(_) => false,
            // Malformed rows are rejected one by one; only a failing reader surfaces here
            IngestError::Csv(err) => err.is_io_error(),
            IngestError::Fetch { .. }
            | IngestError::Header(_)
            | IngestError::Io(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(IngestError::Header("missing State".to_string()).is_fatal());
        assert!(IngestError::from(SyncError::config("bad metadata")).is_fatal());
        assert!(!IngestError::from(SyncError::UnknownFieldType {
            value: "foo".to_string()
        })
        .is_fatal());
        assert!(!IngestError::from(CrmError::api(503, "SERVER_UNAVAILABLE", "down")).is_fatal());
        assert!(IngestError::from(CrmError::Auth("invalid_client".to_string())).is_fatal());
    }

    #[test]
    fn test_fetch_message() {
        let err = IngestError::fetch("https://data.cms.gov/x.csv", "status 404");
        assert_eq!(err.to_string(), "Failed to fetch https://data.cms.gov/x.csv: status 404");
    }
}
