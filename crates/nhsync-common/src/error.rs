//! Error types for nhsync

use thiserror::Error;

/// Result type alias for nhsync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Main error type for nhsync
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Missing credentials, malformed metadata document, bad CLI values.
    /// Always fatal.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid identifier: {0:?} does not reduce to a legal API name")]
    InvalidIdentifier(String),

    #[error("Unknown field type")]
    UnknownFieldType { value: String },

    #[error("Invalid descriptor for {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("Payload refers to fields not present on {object}: {}", fields.join(", "))]
    SchemaMismatch { object: String, fields: Vec<String> },
}

impl SyncError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Configuration errors abort a run; everything else is reported per unit.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Io(_) | Self::Serialization(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_field_type_message() {
        let err = SyncError::UnknownFieldType {
            value: "foo".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown field type");
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_schema_mismatch_lists_fields() {
        let err = SyncError::SchemaMismatch {
            object: "Account".to_string(),
            fields: vec!["Foo__c".to_string(), "Bar__c".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Payload refers to fields not present on Account: Foo__c, Bar__c"
        );
    }

    #[test]
    fn test_config_is_fatal() {
        assert!(SyncError::config("CONSUMER_KEY is not set").is_fatal());
        assert!(!SyncError::validation("X__c", "scale > precision").is_fatal());
    }
}
