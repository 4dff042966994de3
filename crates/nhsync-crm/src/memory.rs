//! Process-local CRM tenant
//!
//! Backs `--dry-run` and the pipeline tests. Behaves like a fresh developer org:
//! `Account` carries its standard fields, custom fields appear in describe once
//! created, unique fields reject duplicates, and payloads naming unknown fields
//! are refused. Every call is logged as a [`CrmCall`].

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use nhsync_common::types::{AccountRecord, FieldDescriptor, FieldKind, ACCOUNT_OBJECT};
use serde_json::Value;

use crate::client::{CrmClient, FieldInfo, ObjectDescription, RecordRef};
use crate::error::{CrmError, Result};
use crate::query::RecordQuery;
use crate::types::ApiError;

const ACCOUNT_STANDARD_FIELDS: &[(&str, &str, &str)] = &[
    ("Id", "Account ID", "id"),
    ("Name", "Account Name", "string"),
    ("Type", "Account Type", "picklist"),
    ("Industry", "Industry", "picklist"),
    ("BillingStreet", "Billing Street", "textarea"),
    ("BillingCity", "Billing City", "string"),
    ("BillingState", "Billing State/Province", "string"),
    ("BillingPostalCode", "Billing Zip/Postal Code", "string"),
    ("Phone", "Account Phone", "phone"),
    ("Website", "Website", "url"),
    ("Description", "Account Description", "textarea"),
    ("OwnerId", "Owner ID", "reference"),
    ("CreatedDate", "Created Date", "datetime"),
];

/// One recorded interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrmCall {
    Describe { object: String },
    Query { soql: String },
    CreateRecord { object: String, business_key: Option<String> },
    CreateField { full_name: String },
}

#[derive(Debug)]
struct ObjectState {
    fields: Vec<FieldInfo>,
    /// API names whose values must be unique
    unique: Vec<String>,
    records: Vec<(String, AccountRecord)>,
}

impl ObjectState {
    fn new(fields: Vec<FieldInfo>) -> Self {
        Self {
            fields,
            unique: Vec::new(),
            records: Vec::new(),
        }
    }

    fn has_field(&self, api_name: &str) -> bool {
        self.fields.iter().any(|f| f.name.eq_ignore_ascii_case(api_name))
    }
}

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<String, ObjectState>,
    custom_fields: Vec<FieldDescriptor>,
    calls: Vec<CrmCall>,
    failing_describes: u32,
    rejected_fields: HashMap<String, ApiError>,
    next_id: u64,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}{:0>15}", prefix, self.next_id)
    }

    fn object(&self, name: &str) -> Result<&ObjectState> {
        self.objects.get(name).ok_or_else(|| not_found(name))
    }

    fn object_mut(&mut self, name: &str) -> Result<&mut ObjectState> {
        self.objects.get_mut(name).ok_or_else(|| not_found(name))
    }
}

#[derive(Debug)]
pub struct InMemoryCrm {
    state: Mutex<State>,
}

impl Default for InMemoryCrm {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCrm {
    /// A tenant with a bare `Account` object.
    pub fn new() -> Self {
        let account_fields = ACCOUNT_STANDARD_FIELDS
            .iter()
            .map(|(name, label, field_type)| FieldInfo {
                name: name.to_string(),
                label: label.to_string(),
                field_type: field_type.to_string(),
                custom: false,
            })
            .collect();

        let mut state = State::default();
        state
            .objects
            .insert(ACCOUNT_OBJECT.to_string(), ObjectState::new(account_fields));

        Self {
            state: Mutex::new(state),
        }
    }

    /// Start with `descriptors` already provisioned. Not logged as calls.
    pub fn with_fields(self, descriptors: impl IntoIterator<Item = FieldDescriptor>) -> Self {
        {
            let mut state = self.lock();
            for descriptor in descriptors {
                install_field(&mut state, descriptor);
            }
        }
        self
    }

    /// The next `count` describe calls fail with a 503.
    pub fn fail_next_describes(&self, count: u32) {
        self.lock().failing_describes = count;
    }

    /// Creating `api_name` fails with the given tenant error.
    pub fn reject_field(&self, api_name: &str, code: &str, message: &str) {
        self.lock()
            .rejected_fields
            .insert(api_name.to_string(), ApiError::new(code, message));
    }

    pub fn calls(&self) -> Vec<CrmCall> {
        self.lock().calls.clone()
    }

    pub fn records(&self) -> Vec<AccountRecord> {
        self.lock()
            .objects
            .get(ACCOUNT_OBJECT)
            .map(|o| o.records.iter().map(|(_, r)| r.clone()).collect())
            .unwrap_or_default()
    }

    pub fn custom_fields(&self) -> Vec<FieldDescriptor> {
        self.lock().custom_fields.clone()
    }

    pub fn count_calls(&self, predicate: impl Fn(&CrmCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|c| predicate(c)).count()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn install_field(state: &mut State, descriptor: FieldDescriptor) {
    let Some(object) = state.objects.get_mut(&descriptor.object) else {
        return;
    };
    if object.has_field(&descriptor.api_name) {
        return;
    }
    object.fields.push(FieldInfo {
        name: descriptor.api_name.clone(),
        label: descriptor.label.clone(),
        field_type: descriptor.kind.crm_type_name().to_ascii_lowercase(),
        custom: true,
    });
    if let FieldKind::Text { unique: true, .. } = descriptor.kind {
        object.unique.push(descriptor.api_name.clone());
    }
    state.custom_fields.push(descriptor);
}

fn not_found(object: &str) -> CrmError {
    CrmError::api(404, "NOT_FOUND", format!("The requested resource does not exist: {object}"))
}

fn invalid_fields(object: &str, fields: &[String]) -> CrmError {
    CrmError::Api {
        status: 400,
        errors: vec![ApiError {
            error_code: "INVALID_FIELD".to_string(),
            message: format!("No such column '{}' on sobject of type {}", fields.join(", "), object),
            fields: fields.to_vec(),
        }],
        retry_after: None,
    }
}

fn value_matches(value: Option<&Value>, expected: &str) -> bool {
    match value {
        Some(Value::String(s)) => s.trim() == expected,
        Some(Value::Null) | None => false,
        Some(other) => other.to_string() == expected,
    }
}

#[async_trait]
impl CrmClient for InMemoryCrm {
    async fn describe(&self, object: &str) -> Result<ObjectDescription> {
        let mut state = self.lock();
        state.calls.push(CrmCall::Describe {
            object: object.to_string(),
        });

        if state.failing_describes > 0 {
            state.failing_describes -= 1;
            return Err(CrmError::api(503, "SERVER_UNAVAILABLE", "describe unavailable"));
        }

        let found = state.object(object)?;
        Ok(ObjectDescription {
            name: object.to_string(),
            fields: found.fields.clone(),
        })
    }

    async fn query(&self, query: &RecordQuery) -> Result<Vec<RecordRef>> {
        let mut state = self.lock();
        state.calls.push(CrmCall::Query {
            soql: query.to_soql(),
        });

        let object = state.object(&query.object)?;
        let unknown: Vec<String> = std::iter::once(&query.field)
            .chain(query.select.iter())
            .filter(|f| !object.has_field(f))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(invalid_fields(&query.object, &unknown));
        }

        let limit = query.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        Ok(object
            .records
            .iter()
            .filter(|(id, record)| {
                if query.field.eq_ignore_ascii_case("Id") {
                    id == &query.value
                } else {
                    value_matches(record.get(&query.field), &query.value)
                }
            })
            .take(limit)
            .map(|(id, record)| {
                let mut fields = serde_json::Map::new();
                fields.insert("Id".to_string(), Value::String(id.clone()));
                for name in &query.select {
                    fields.insert(name.clone(), record.get(name).cloned().unwrap_or(Value::Null));
                }
                RecordRef {
                    id: id.clone(),
                    fields,
                }
            })
            .collect())
    }

    async fn create_record(&self, object: &str, record: &AccountRecord) -> Result<String> {
        let mut state = self.lock();
        state.calls.push(CrmCall::CreateRecord {
            object: object.to_string(),
            business_key: record.business_key(),
        });

        let target = state.object(object)?;
        let unknown: Vec<String> = record
            .field_names()
            .filter(|name| !target.has_field(name))
            .map(ToOwned::to_owned)
            .collect();
        if !unknown.is_empty() {
            return Err(invalid_fields(object, &unknown));
        }

        for unique in &target.unique {
            let Some(value) = record.get(unique).and_then(Value::as_str).map(str::trim) else {
                continue;
            };
            if target
                .records
                .iter()
                .any(|(_, existing)| value_matches(existing.get(unique), value))
            {
                return Err(CrmError::Api {
                    status: 400,
                    errors: vec![ApiError {
                        error_code: "DUPLICATE_VALUE".to_string(),
                        message: format!("duplicate value found: {unique} duplicates value on record with id: {value}"),
                        fields: vec![unique.clone()],
                    }],
                    retry_after: None,
                });
            }
        }

        let id = state.next_id("001");
        state
            .object_mut(object)?
            .records
            .push((id.clone(), record.clone()));
        Ok(id)
    }

    async fn create_field(&self, descriptor: &FieldDescriptor) -> Result<String> {
        let mut state = self.lock();
        state.calls.push(CrmCall::CreateField {
            full_name: descriptor.full_name(),
        });

        if let Some(error) = state.rejected_fields.get(&descriptor.api_name) {
            return Err(CrmError::Api {
                status: 400,
                errors: vec![error.clone()],
                retry_after: None,
            });
        }

        let target = state.object(&descriptor.object)?;
        if target.has_field(&descriptor.api_name) {
            return Err(CrmError::api(
                400,
                "DUPLICATE_DEVELOPER_NAME",
                format!("There is already a field named {}", descriptor.api_name),
            ));
        }

        let id = state.next_id("00N");
        install_field(&mut state, descriptor.clone());
        Ok(id)
    }
}
