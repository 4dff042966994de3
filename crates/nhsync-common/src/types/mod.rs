//! Common types used across nhsync
//!
//! The CRM schema is described by [`FieldDescriptor`], a common header plus a
//! [`FieldKind`] variant carrying the type-specific attributes. Records sent to the
//! data plane are [`AccountRecord`]s keyed by API name.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, SyncError};

// ============================================================================
// Schema Constants
// ============================================================================

/// Object that receives the mirrored facilities.
pub const ACCOUNT_OBJECT: &str = "Account";

/// Suffix the CRM appends to every custom field API name.
pub const CUSTOM_FIELD_SUFFIX: &str = "__c";

/// API name of the facility certification number, the idempotency key.
pub const BUSINESS_KEY_FIELD: &str = "CCN__c";

pub const MAX_TEXT_LENGTH: u16 = 255;
pub const MAX_NUMBER_PRECISION: u8 = 18;

/// Semantic type of an upstream column as declared in the metadata document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    Text,
    Number,
    Checkbox,
    Date,
}

impl std::str::FromStr for SemanticType {
    type Err = SyncError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(SemanticType::Text),
            "num" | "number" => Ok(SemanticType::Number),
            "checkbox" => Ok(SemanticType::Checkbox),
            "date" => Ok(SemanticType::Date),
            _ => Err(SyncError::UnknownFieldType {
                value: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for SemanticType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SemanticType::Text => write!(f, "text"),
            SemanticType::Number => write!(f, "number"),
            SemanticType::Checkbox => write!(f, "checkbox"),
            SemanticType::Date => write!(f, "date"),
        }
    }
}

/// Type-specific attributes of a custom field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldKind {
    Text {
        length: u16,
        unique: bool,
        external_id: bool,
    },
    Number {
        /// Total significant digits
        precision: u8,
        /// Digits to the right of the decimal point
        scale: u8,
    },
    Checkbox {
        default_value: bool,
    },
    Date,
}

impl FieldKind {
    pub fn text(length: u16) -> Self {
        FieldKind::Text {
            length,
            unique: false,
            external_id: false,
        }
    }

    pub fn number(precision: u8, scale: u8) -> Self {
        FieldKind::Number { precision, scale }
    }

    pub fn checkbox(default_value: bool) -> Self {
        FieldKind::Checkbox { default_value }
    }

    /// Defaults applied when the metadata document gives no attributes.
    pub fn default_for(semantic_type: SemanticType) -> Self {
        match semantic_type {
            SemanticType::Text => FieldKind::text(MAX_TEXT_LENGTH),
            SemanticType::Number => FieldKind::number(MAX_NUMBER_PRECISION, 10),
            SemanticType::Checkbox => FieldKind::checkbox(false),
            SemanticType::Date => FieldKind::Date,
        }
    }

    pub fn semantic_type(&self) -> SemanticType {
        match self {
            FieldKind::Text { .. } => SemanticType::Text,
            FieldKind::Number { .. } => SemanticType::Number,
            FieldKind::Checkbox { .. } => SemanticType::Checkbox,
            FieldKind::Date => SemanticType::Date,
        }
    }

    /// Name of the type on the metadata plane.
    pub fn crm_type_name(&self) -> &'static str {
        match self {
            FieldKind::Text { .. } => "Text",
            FieldKind::Number { .. } => "Number",
            FieldKind::Checkbox { .. } => "Checkbox",
            FieldKind::Date => "Date",
        }
    }
}

/// Everything needed to provision one custom field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Owning object, e.g. `Account`
    pub object: String,

    /// API name including the `__c` suffix
    pub api_name: String,

    pub label: String,

    #[serde(default)]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(flatten)]
    pub kind: FieldKind,
}

impl FieldDescriptor {
    /// Build a descriptor whose label is the API name without its suffix.
    pub fn new(object: impl Into<String>, api_name: impl Into<String>, kind: FieldKind) -> Self {
        let api_name = api_name.into();
        let label = api_name
            .strip_suffix(CUSTOM_FIELD_SUFFIX)
            .unwrap_or(&api_name)
            .to_string();
        Self {
            object: object.into(),
            api_name,
            label,
            required: false,
            description: None,
            kind,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// `Account.CCN__c` as used by the metadata plane.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.object, self.api_name)
    }

    /// Check the type-specific constraints before anything is sent to the CRM.
    pub fn validate(&self) -> Result<()> {
        if !self.api_name.ends_with(CUSTOM_FIELD_SUFFIX) {
            return Err(SyncError::validation(
                &self.api_name,
                format!("custom field API names must end with {CUSTOM_FIELD_SUFFIX}"),
            ));
        }
        if self.label.trim().is_empty() {
            return Err(SyncError::validation(&self.api_name, "label must not be empty"));
        }

        match self.kind {
            FieldKind::Text { length, .. } => {
                if !(1..=MAX_TEXT_LENGTH).contains(&length) {
                    return Err(SyncError::validation(
                        &self.api_name,
                        format!("text length {length} is outside 1..={MAX_TEXT_LENGTH}"),
                    ));
                }
            },
            FieldKind::Number { precision, scale } => {
                if !(1..=MAX_NUMBER_PRECISION).contains(&precision) {
                    return Err(SyncError::validation(
                        &self.api_name,
                        format!("precision {precision} is outside 1..={MAX_NUMBER_PRECISION}"),
                    ));
                }
                if scale > precision {
                    return Err(SyncError::validation(
                        &self.api_name,
                        format!("scale {scale} exceeds precision {precision}"),
                    ));
                }
                if precision - scale < 1 {
                    return Err(SyncError::validation(
                        &self.api_name,
                        format!(
                            "precision {precision} with scale {scale} leaves no integer digits"
                        ),
                    ));
                }
            },
            FieldKind::Checkbox { .. } | FieldKind::Date => {},
        }

        Ok(())
    }
}

// ============================================================================
// Data Plane Types
// ============================================================================

/// Projected Account payload: API name -> scalar value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountRecord {
    fields: Map<String, Value>,
}

impl AccountRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, api_name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(api_name.into(), value.into());
    }

    pub fn get(&self, api_name: &str) -> Option<&Value> {
        self.fields.get(api_name)
    }

    /// Trimmed certification number, if present and non-empty.
    pub fn business_key(&self) -> Option<String> {
        self.fields
            .get(BUSINESS_KEY_FIELD)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(ToOwned::to_owned)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<Map<String, Value>> for AccountRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}
