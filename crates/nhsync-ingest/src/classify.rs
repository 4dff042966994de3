//! Column classification
//!
//! Every column in the metadata document either maps onto a built-in Account
//! field (never provisioned, always projected) or becomes a custom
//! [`FieldDescriptor`]. Columns that cannot be classified keep their error so the
//! provisioner can report them as per-field failures.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use nhsync_common::types::{FieldDescriptor, FieldKind, SemanticType, ACCOUNT_OBJECT};
use nhsync_common::{Result, SyncError};
use serde::Serialize;

use crate::metadata::{FieldOverrides, MetadataDocument, UpstreamColumn};
use crate::normalize;

/// Upstream columns stored in built-in Account fields.
pub const RESERVED_FIELDS: &[(&str, &str)] = &[
    ("Provider Name", "Name"),
    ("Provider Address", "BillingStreet"),
    ("City/Town", "BillingCity"),
    ("State", "BillingState"),
    ("ZIP Code", "BillingPostalCode"),
    ("Telephone Number", "Phone"),
    ("Provider Type", "Type"),
    ("Ownership Type", "Industry"),
];

/// Column carrying the two-letter jurisdiction code.
pub const STATE_COLUMN: &str = "State";

pub fn reserved_field(column: &str) -> Option<&'static str> {
    let column = column.trim();
    RESERVED_FIELDS
        .iter()
        .find(|(source, _)| *source == column)
        .map(|(_, builtin)| *builtin)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classification {
    Reserved { builtin: &'static str },
    Custom { descriptor: FieldDescriptor },
}

/// Classification result for one column of the metadata document
#[derive(Debug)]
pub struct PlannedColumn {
    pub source_name: String,
    /// Derived API name, absent when the column name reduces to nothing or
    /// the name belongs to another column
    pub api_name: Option<String>,
    pub result: Result<Classification>,
}

impl PlannedColumn {
    /// Name used when reporting this column: its API name when one exists.
    pub fn display_name(&self) -> &str {
        self.api_name.as_deref().unwrap_or(&self.source_name)
    }

    pub fn descriptor(&self) -> Option<&FieldDescriptor> {
        match &self.result {
            Ok(Classification::Custom { descriptor }) => Some(descriptor),
            _ => None,
        }
    }

    pub fn is_reserved(&self) -> bool {
        matches!(self.result, Ok(Classification::Reserved { .. }))
    }
}

/// Classify every column, preserving document order.
///
/// Each API name belongs to one column. Built-in and designated names go to
/// their own columns wherever those appear; any other name goes to the first
/// column deriving it. Every other column deriving a taken name fails validation.
pub fn plan(document: &MetadataDocument) -> Vec<PlannedColumn> {
    let mut owners: HashMap<String, String> = HashMap::new();
    for column in &document.columns {
        let fixed = reserved_field(&column.source_name)
            .or_else(|| normalize::designated_name(&column.source_name));
        if let Some(name) = fixed {
            owners
                .entry(name.to_string())
                .or_insert_with(|| column.source_name.clone());
        }
    }

    document
        .columns
        .iter()
        .map(|column| {
            let planned = classify_column(column);
            let Some(name) = planned.api_name.clone() else {
                return planned;
            };
            match owners.entry(name.clone()) {
                Entry::Occupied(owner) if *owner.get() != column.source_name => PlannedColumn {
                    source_name: column.source_name.clone(),
                    api_name: None,
                    result: Err(SyncError::validation(
                        &name,
                        format!("duplicate API name, already used by '{}'", owner.get()),
                    )),
                },
                Entry::Occupied(_) => planned,
                Entry::Vacant(slot) => {
                    slot.insert(column.source_name.clone());
                    planned
                },
            }
        })
        .collect()
}

fn classify_column(column: &UpstreamColumn) -> PlannedColumn {
    if let Some(builtin) = reserved_field(&column.source_name) {
        return PlannedColumn {
            source_name: column.source_name.clone(),
            api_name: Some(builtin.to_string()),
            result: Ok(Classification::Reserved { builtin }),
        };
    }

    let api_name = normalize::api_name_for(&column.source_name);
    let result = match &api_name {
        Ok(name) => {
            describe_column(column, name).map(|descriptor| Classification::Custom { descriptor })
        },
        Err(_) => Err(SyncError::InvalidIdentifier(column.source_name.clone())),
    };

    PlannedColumn {
        source_name: column.source_name.clone(),
        api_name: api_name.ok(),
        result,
    }
}

/// Build the descriptor for a custom column under an already derived API name.
pub fn describe_column(column: &UpstreamColumn, api_name: &str) -> Result<FieldDescriptor> {
    if let Some(builtin) = reserved_field(&column.source_name) {
        return Err(SyncError::validation(
            api_name,
            format!("'{}' maps to the built-in field {builtin}", column.source_name),
        ));
    }

    let semantic_type = column.semantic_type()?;

    let mut descriptor = FieldDescriptor::new(
        ACCOUNT_OBJECT,
        api_name,
        FieldKind::default_for(semantic_type),
    )
    .with_description(column.source_name.clone());

    if let Some(overrides) = &column.overrides {
        apply_overrides(&mut descriptor, overrides)?;
    }

    apply_designated(&mut descriptor);

    Ok(descriptor)
}

/// Attributes fixed for the designated columns regardless of defaults or overrides.
fn apply_designated(descriptor: &mut FieldDescriptor) {
    match descriptor.api_name.as_str() {
        "CCN__c" => {
            descriptor.kind = FieldKind::Text {
                length: 50,
                unique: true,
                external_id: true,
            };
            descriptor.label = "CMS Certification Number".to_string();
        },
        "County__c" => {
            if descriptor.kind.semantic_type() != SemanticType::Text {
                descriptor.kind = FieldKind::default_for(SemanticType::Text);
            }
            descriptor.label = "County".to_string();
        },
        _ => {},
    }
}

fn apply_overrides(descriptor: &mut FieldDescriptor, overrides: &FieldOverrides) -> Result<()> {
    if let Some(label) = &overrides.label {
        descriptor.label = label.clone();
    }
    if let Some(description) = &overrides.description {
        descriptor.description = Some(description.clone());
    }
    if let Some(required) = overrides.required {
        descriptor.required = required;
    }

    let api_name = descriptor.api_name.clone();
    let mismatch = |attribute: &str, kind: SemanticType| {
        SyncError::validation(
            &api_name,
            format!("override '{attribute}' does not apply to {kind} fields"),
        )
    };

    match &mut descriptor.kind {
        FieldKind::Text {
            length,
            unique,
            external_id,
        } => {
            if overrides.precision.is_some() || overrides.scale.is_some() {
                return Err(mismatch("precision/scale", SemanticType::Text));
            }
            if overrides.default_value.is_some() {
                return Err(mismatch("default_value", SemanticType::Text));
            }
            *length = overrides.length.unwrap_or(*length);
            *unique = overrides.unique.unwrap_or(*unique);
            *external_id = overrides.external_id.unwrap_or(*external_id);
        },
        FieldKind::Number { precision, scale } => {
            if overrides.length.is_some() || overrides.unique.is_some() || overrides.external_id.is_some() {
                return Err(mismatch("length/unique/external_id", SemanticType::Number));
            }
            if overrides.default_value.is_some() {
                return Err(mismatch("default_value", SemanticType::Number));
            }
            *precision = overrides.precision.unwrap_or(*precision);
            *scale = overrides.scale.unwrap_or(*scale);
        },
        FieldKind::Checkbox { default_value } => {
            if overrides.length.is_some() || overrides.precision.is_some() || overrides.scale.is_some() {
                return Err(mismatch("length/precision/scale", SemanticType::Checkbox));
            }
            *default_value = overrides.default_value.unwrap_or(*default_value);
        },
        FieldKind::Date => {
            if overrides.length.is_some()
                || overrides.precision.is_some()
                || overrides.scale.is_some()
                || overrides.default_value.is_some()
            {
                return Err(mismatch("type attributes", SemanticType::Date));
            }
        },
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn document(raw: &str) -> MetadataDocument {
        MetadataDocument::parse(raw).unwrap()
    }

    #[test]
    fn test_checkbox_defaults() {
        let planned = plan(&document(
            r#"{"columns": {"fields": {"Provider Changed Ownership in Last 12 Months": "checkbox"}}}"#,
        ));
        let descriptor = planned[0].descriptor().unwrap();
        assert_eq!(descriptor.api_name, "Provider_Changed_O_I_L_12_M__c");
        assert_eq!(descriptor.kind, FieldKind::Checkbox { default_value: false });
        assert_eq!(descriptor.label, "Provider_Changed_O_I_L_12_M");
        assert_eq!(
            descriptor.description.as_deref(),
            Some("Provider Changed Ownership in Last 12 Months")
        );
    }

    #[test]
    fn test_business_key_descriptor() {
        let planned = plan(&document(
            r#"{"columns": {"fields": {"CMS Certification Number (CCN)": "text"}}}"#,
        ));
        let descriptor = planned[0].descriptor().unwrap();
        assert_eq!(descriptor.api_name, "CCN__c");
        assert_eq!(
            descriptor.kind,
            FieldKind::Text {
                length: 50,
                unique: true,
                external_id: true
            }
        );
    }

    #[test]
    fn test_county_is_text() {
        let planned = plan(&document(r#"{"columns": {"fields": {"County/Parish": "text"}}}"#));
        let descriptor = planned[0].descriptor().unwrap();
        assert_eq!(descriptor.api_name, "County__c");
        assert_eq!(descriptor.kind, FieldKind::text(255));
    }

    #[test]
    fn test_reserved_columns_are_not_custom() {
        let planned = plan(&document(
            r#"{"columns": {"fields": {"Provider Name": "text", "ZIP Code": "text"}}}"#,
        ));
        assert!(planned.iter().all(PlannedColumn::is_reserved));
        assert_eq!(planned[1].api_name.as_deref(), Some("BillingPostalCode"));
        assert!(planned[0].descriptor().is_none());
    }

    #[test]
    fn test_unknown_type_keeps_api_name() {
        let planned = plan(&document(
            r#"{"columns": {"fields": {"Weird Column": "foo", "Chain Name": "text"}}}"#,
        ));
        assert_eq!(planned[0].display_name(), "Weird_Column__c");
        let err = planned[0].result.as_ref().unwrap_err();
        assert_eq!(err.to_string(), "Unknown field type");
        assert!(planned[1].descriptor().is_some());
    }

    #[test]
    fn test_unnameable_column() {
        let planned = plan(&document(r#"{"columns": {"fields": {"()": "text"}}}"#));
        assert_eq!(planned[0].display_name(), "()");
        assert!(matches!(planned[0].result, Err(SyncError::InvalidIdentifier(_))));
    }

    #[test]
    fn test_overrides_apply_on_defaults() {
        let planned = plan(&document(
            r#"{"columns": {"fields": {"Overall Rating": "num", "Chain ID": "text"}},
                "overrides": {
                    "Overall Rating": {"precision": 3, "scale": 1, "label": "Overall Rating"},
                    "Chain ID": {"length": 50, "required": true}
                }}"#,
        ));
        let rating = planned[0].descriptor().unwrap();
        assert_eq!(rating.kind, FieldKind::number(3, 1));
        assert_eq!(rating.label, "Overall Rating");

        let chain = planned[1].descriptor().unwrap();
        assert_eq!(chain.kind, FieldKind::text(50));
        assert!(chain.required);
    }

    #[test]
    fn test_mismatched_override_fails_the_column() {
        let planned = plan(&document(
            r#"{"columns": {"fields": {"Overall Rating": "num"}},
                "overrides": {"Overall Rating": {"length": 10}}}"#,
        ));
        assert!(matches!(planned[0].result, Err(SyncError::Validation { .. })));
    }

    #[test]
    fn test_colliding_names_fail_later_columns() {
        let planned = plan(&document(
            r#"{"columns": {"fields": {
                "Chain Name": "text",
                "Chain-Name": "num",
                "County": "text",
                "County/Parish": "text"
            }}}"#,
        ));

        assert_eq!(planned[0].descriptor().unwrap().api_name, "Chain_Name__c");
        assert_eq!(planned[1].display_name(), "Chain-Name");
        let err = planned[1].result.as_ref().unwrap_err();
        assert!(err.to_string().contains("already used by 'Chain Name'"));

        // The designated column keeps its name even when it comes later
        assert_eq!(planned[2].display_name(), "County");
        assert!(planned[2].result.as_ref().unwrap_err().to_string().contains("'County/Parish'"));
        assert_eq!(planned[3].descriptor().unwrap().api_name, "County__c");
    }
}
