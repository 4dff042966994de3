//! Wire types for the Salesforce REST and Tooling APIs

use nhsync_common::types::{FieldDescriptor, FieldKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One entry of an error array returned by the tenant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    #[serde(default)]
    pub error_code: String,

    #[serde(default)]
    pub message: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: code.into(),
            message: message.into(),
            fields: Vec::new(),
        }
    }
}

/// OAuth endpoint error shape: `{"error": "...", "error_description": "..."}`
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthErrorBody {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub instance_url: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub issued_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DescribeResponse {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<DescribeField>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DescribeField {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type", default)]
    pub field_type: String,
    #[serde(default)]
    pub custom: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    #[serde(default)]
    pub total_size: u64,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub records: Vec<Map<String, Value>>,
}

/// Result of a create on either API
#[derive(Debug, Clone, Deserialize)]
pub struct SaveResult {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<ApiError>,
}

/// Body of `POST /tooling/sobjects/CustomField`
#[derive(Debug, Clone, Serialize)]
pub struct CustomFieldRequest {
    #[serde(rename = "FullName")]
    pub full_name: String,
    #[serde(rename = "Metadata")]
    pub metadata: CustomFieldMetadata,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomFieldMetadata {
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

impl From<&FieldDescriptor> for CustomFieldRequest {
    fn from(descriptor: &FieldDescriptor) -> Self {
        let mut metadata = CustomFieldMetadata {
            label: descriptor.label.clone(),
            field_type: descriptor.kind.crm_type_name(),
            required: Some(descriptor.required),
            description: descriptor.description.clone(),
            length: None,
            unique: None,
            external_id: None,
            precision: None,
            scale: None,
            default_value: None,
        };

        match descriptor.kind {
            FieldKind::Text {
                length,
                unique,
                external_id,
            } => {
                metadata.length = Some(length);
                metadata.unique = Some(unique);
                metadata.external_id = Some(external_id);
            },
            FieldKind::Number { precision, scale } => {
                metadata.precision = Some(precision);
                metadata.scale = Some(scale);
            },
            FieldKind::Checkbox { default_value } => {
                // Checkboxes always have a value; the API refuses `required` on them.
                metadata.required = None;
                metadata.default_value = Some(default_value.to_string());
            },
            FieldKind::Date => {},
        }

        Self {
            full_name: descriptor.full_name(),
            metadata,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_field_payload() {
        let descriptor = FieldDescriptor::new(
            "Account",
            "CCN__c",
            FieldKind::Text {
                length: 50,
                unique: true,
                external_id: true,
            },
        )
        .with_label("CMS Certification Number");

        let body = serde_json::to_value(CustomFieldRequest::from(&descriptor)).unwrap();
        assert_eq!(
            body,
            json!({
                "FullName": "Account.CCN__c",
                "Metadata": {
                    "label": "CMS Certification Number",
                    "type": "Text",
                    "required": false,
                    "length": 50,
                    "unique": true,
                    "externalId": true
                }
            })
        );
    }

    #[test]
    fn test_number_field_payload() {
        let descriptor = FieldDescriptor::new("Account", "Overall_Rating__c", FieldKind::number(3, 1))
            .with_description("Overall Rating");
        let body = serde_json::to_value(CustomFieldRequest::from(&descriptor)).unwrap();
        assert_eq!(body["Metadata"]["type"], "Number");
        assert_eq!(body["Metadata"]["precision"], 3);
        assert_eq!(body["Metadata"]["scale"], 1);
        assert_eq!(body["Metadata"]["description"], "Overall Rating");
        assert!(body["Metadata"].get("length").is_none());
    }

    #[test]
    fn test_checkbox_field_payload_drops_required() {
        let descriptor = FieldDescriptor::new("Account", "CCRC__c", FieldKind::checkbox(false));
        let body = serde_json::to_value(CustomFieldRequest::from(&descriptor)).unwrap();
        assert_eq!(body["Metadata"]["type"], "Checkbox");
        assert_eq!(body["Metadata"]["defaultValue"], "false");
        assert!(body["Metadata"].get("required").is_none());
    }

    #[test]
    fn test_api_error_deserializes_salesforce_shape() {
        let errors: Vec<ApiError> = serde_json::from_value(json!([
            {"message": "No such column 'Foo__c'", "errorCode": "INVALID_FIELD", "fields": ["Foo__c"]}
        ]))
        .unwrap();
        assert_eq!(errors[0].error_code, "INVALID_FIELD");
        assert_eq!(errors[0].fields, vec!["Foo__c".to_string()]);
    }
}
