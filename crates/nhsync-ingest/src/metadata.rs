//! Column metadata document
//!
//! ```json
//! {
//!   "columns": { "fields": { "Overall Rating": "num", "Chain Name": "text" } },
//!   "overrides": { "Overall Rating": { "precision": 3, "scale": 1 } }
//! }
//! ```
//!
//! Column order is the document order. Semantic type strings are kept verbatim
//! here; an unknown type becomes a per-field failure during classification, while
//! a structurally broken document is a configuration error.

use std::path::Path;

use nhsync_common::types::SemanticType;
use nhsync_common::{Result, SyncError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// One upstream column and its declared type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpstreamColumn {
    pub source_name: String,
    /// Type string exactly as written in the document
    pub declared_type: String,
    pub overrides: Option<FieldOverrides>,
}

impl UpstreamColumn {
    pub fn new(source_name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            declared_type: declared_type.into(),
            overrides: None,
        }
    }

    pub fn semantic_type(&self) -> Result<SemanticType> {
        self.declared_type.parse()
    }
}

/// Optional per-column attributes applied on top of the type defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldOverrides {
    pub label: Option<String>,
    pub description: Option<String>,
    pub required: Option<bool>,
    pub length: Option<u16>,
    pub unique: Option<bool>,
    pub external_id: Option<bool>,
    pub precision: Option<u8>,
    pub scale: Option<u8>,
    pub default_value: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetadataDocument {
    pub columns: Vec<UpstreamColumn>,
}

impl MetadataDocument {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            SyncError::config(format!("cannot read metadata document {}: {e}", path.display()))
        })?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let doc: Value = serde_json::from_str(raw)
            .map_err(|e| SyncError::config(format!("malformed metadata JSON: {e}")))?;

        let fields = doc
            .get("columns")
            .and_then(|c| c.get("fields"))
            .and_then(Value::as_object)
            .ok_or_else(|| SyncError::config("metadata document has no columns.fields object"))?;

        let mut columns = Vec::with_capacity(fields.len());
        for (source_name, declared) in fields {
            let declared_type = declared.as_str().ok_or_else(|| {
                SyncError::config(format!(
                    "semantic type for '{source_name}' must be a string, got {declared}"
                ))
            })?;
            columns.push(UpstreamColumn::new(source_name.clone(), declared_type));
        }

        if let Some(overrides) = doc.get("overrides") {
            let overrides = overrides
                .as_object()
                .ok_or_else(|| SyncError::config("metadata overrides must be an object"))?;
            for (source_name, value) in overrides {
                let parsed: FieldOverrides = serde_json::from_value(value.clone()).map_err(|e| {
                    SyncError::config(format!("invalid overrides for '{source_name}': {e}"))
                })?;
                match columns.iter_mut().find(|c| &c.source_name == source_name) {
                    Some(column) => column.overrides = Some(parsed),
                    None => warn!(column = %source_name, "Overrides given for a column not listed in fields"),
                }
            }
        }

        Ok(Self { columns })
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_preserves_document_order() {
        let doc = MetadataDocument::parse(
            r#"{"columns": {"fields": {
                "Zeta Column": "text",
                "Alpha Column": "num",
                "Middle": "checkbox"
            }}}"#,
        )
        .unwrap();
        let names: Vec<_> = doc.columns.iter().map(|c| c.source_name.as_str()).collect();
        assert_eq!(names, vec!["Zeta Column", "Alpha Column", "Middle"]);
        assert_eq!(doc.columns[1].semantic_type().unwrap(), SemanticType::Number);
    }

    #[test]
    fn test_unknown_type_is_kept_for_classification() {
        let doc = MetadataDocument::parse(r#"{"columns": {"fields": {"Weird": "foo"}}}"#).unwrap();
        assert_eq!(doc.columns[0].declared_type, "foo");
        assert!(matches!(
            doc.columns[0].semantic_type(),
            Err(SyncError::UnknownFieldType { .. })
        ));
    }

    #[test]
    fn test_non_string_type_is_config_error() {
        let err = MetadataDocument::parse(r#"{"columns": {"fields": {"Beds": 3}}}"#).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_malformed_documents() {
        assert!(MetadataDocument::parse("{not json").unwrap_err().is_fatal());
        assert!(MetadataDocument::parse(r#"{"columns": []}"#).unwrap_err().is_fatal());
        assert!(MetadataDocument::parse(
            r#"{"columns": {"fields": {"A": "text"}}, "overrides": {"A": {"lenght": 10}}}"#
        )
        .unwrap_err()
        .is_fatal());
    }

    #[test]
    fn test_overrides_attach_to_columns() {
        let doc = MetadataDocument::parse(
            r#"{"columns": {"fields": {"Overall Rating": "num"}},
                "overrides": {"Overall Rating": {"precision": 3, "scale": 1, "label": "Overall Rating"},
                              "Not Listed": {"length": 5}}}"#,
        )
        .unwrap();
        let overrides = doc.columns[0].overrides.as_ref().unwrap();
        assert_eq!(overrides.precision, Some(3));
        assert_eq!(overrides.scale, Some(1));
        assert_eq!(overrides.label.as_deref(), Some("Overall Rating"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"columns": {{"fields": {{"Chain Name": "text"}}}}}}"#).unwrap();
        let doc = MetadataDocument::load(file.path()).unwrap();
        assert_eq!(doc.len(), 1);

        let missing = MetadataDocument::load(Path::new("/nonexistent/metadata.json"));
        assert!(missing.unwrap_err().is_fatal());
    }
}
