//! Capability interface over a CRM tenant

use async_trait::async_trait;
use nhsync_common::types::{AccountRecord, FieldDescriptor};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::query::RecordQuery;

/// One field as reported by describe
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldInfo {
    pub name: String,
    pub label: String,
    pub field_type: String,
    pub custom: bool,
}

/// Field catalog of one object
#[derive(Debug, Clone, Default, Serialize)]
pub struct ObjectDescription {
    pub name: String,
    pub fields: Vec<FieldInfo>,
}

impl ObjectDescription {
    pub fn has_field(&self, api_name: &str) -> bool {
        self.fields.iter().any(|f| f.name.eq_ignore_ascii_case(api_name))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

/// A record matched by a query
#[derive(Debug, Clone, PartialEq)]
pub struct RecordRef {
    pub id: String,
    pub fields: Map<String, Value>,
}

/// Operations the pipelines need from the tenant.
///
/// Implementations must be safe to share across tasks; the pipelines hold them
/// as `&dyn CrmClient`.
#[async_trait]
pub trait CrmClient: Send + Sync {
    /// Field catalog of `object`, standard and custom.
    async fn describe(&self, object: &str) -> Result<ObjectDescription>;

    async fn query(&self, query: &RecordQuery) -> Result<Vec<RecordRef>>;

    /// Create one record and return its id.
    async fn create_record(&self, object: &str, record: &AccountRecord) -> Result<String>;

    /// Create one custom field through the metadata plane and return its id.
    async fn create_field(&self, descriptor: &FieldDescriptor) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str) -> FieldInfo {
        FieldInfo {
            name: name.to_string(),
            label: name.to_string(),
            field_type: "string".to_string(),
            custom: name.ends_with("__c"),
        }
    }

    #[test]
    fn test_has_field_ignores_case() {
        let description = ObjectDescription {
            name: "Account".to_string(),
            fields: vec![field("Name"), field("CCN__c")],
        };
        assert!(description.has_field("ccn__c"));
        assert!(description.has_field("Name"));
        assert!(!description.has_field("County__c"));
        assert_eq!(description.field_names().collect::<Vec<_>>(), vec!["Name", "CCN__c"]);
    }
}
