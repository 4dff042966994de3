//! Idempotent Account creation keyed by certification number

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use nhsync_common::pacing::Sleeper;
use nhsync_common::types::{AccountRecord, ACCOUNT_OBJECT, BUSINESS_KEY_FIELD};
use nhsync_common::SyncError;
use nhsync_crm::{CrmClient, ObjectDescription, RecordQuery};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::loader::RejectedRow;

/// What happened to one payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordOutcome {
    Created { key: String, id: String },
    Duplicate { key: String, existing_id: String },
    Error { key: String, error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordError {
    pub key: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadSummary {
    /// Ids of Accounts created by this run
    pub created: Vec<String>,
    /// Ids of Accounts that already carried the business key
    pub duplicates: Vec<String>,
    pub errors: Vec<RecordError>,
    /// Rows dropped before any CRM call
    pub rejected: Vec<RejectedRow>,
}

impl LoadSummary {
    pub fn record(&mut self, outcome: RecordOutcome) {
        match outcome {
            RecordOutcome::Created { id, .. } => self.created.push(id),
            RecordOutcome::Duplicate { existing_id, .. } => self.duplicates.push(existing_id),
            RecordOutcome::Error { key, error } => self.errors.push(RecordError { key, error }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

pub struct Upserter<'a> {
    crm: &'a dyn CrmClient,
    sleeper: &'a dyn Sleeper,
    delay: Duration,
    progress: bool,
}

impl<'a> Upserter<'a> {
    pub fn new(crm: &'a dyn CrmClient, sleeper: &'a dyn Sleeper, delay: Duration) -> Self {
        Self {
            crm,
            sleeper,
            delay,
            progress: false,
        }
    }

    /// Show a progress bar on stderr while records are sent.
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Upsert every payload in order, pausing between records.
    #[instrument(skip_all, fields(records = records.len()))]
    pub async fn run(&self, records: &[AccountRecord]) -> LoadSummary {
        let catalog = match self.crm.describe(ACCOUNT_OBJECT).await {
            Ok(description) => Some(description),
            Err(err) => {
                warn!(error = %err, "Account describe failed, payload fields will not be pre-checked");
                None
            },
        };

        let bar = self.progress_bar(records.len() as u64);
        let mut summary = LoadSummary::default();

        for (index, record) in records.iter().enumerate() {
            if index > 0 {
                self.sleeper.sleep(self.delay).await;
            }
            let outcome = self.upsert(record, catalog.as_ref()).await;
            summary.record(outcome);
            bar.inc(1);
        }
        bar.finish_and_clear();

        info!(
            created = summary.created.len(),
            duplicates = summary.duplicates.len(),
            errors = summary.errors.len(),
            "Upsert finished"
        );
        summary
    }

    /// Create `record` unless an Account with its business key exists.
    pub async fn upsert(&self, record: &AccountRecord, catalog: Option<&ObjectDescription>) -> RecordOutcome {
        let Some(key) = record.business_key() else {
            return RecordOutcome::Error {
                key: String::new(),
                error: format!("missing {BUSINESS_KEY_FIELD}"),
            };
        };

        if let Some(catalog) = catalog {
            let unknown: Vec<String> = record
                .field_names()
                .filter(|name| !catalog.has_field(name))
                .map(ToOwned::to_owned)
                .collect();
            if !unknown.is_empty() {
                let err = SyncError::SchemaMismatch {
                    object: ACCOUNT_OBJECT.to_string(),
                    fields: unknown,
                };
                warn!(key = %key, error = %err, "Payload does not match Account schema");
                return RecordOutcome::Error {
                    key,
                    error: err.to_string(),
                };
            }
        }

        let query = RecordQuery::by_field(ACCOUNT_OBJECT, BUSINESS_KEY_FIELD, key.clone()).limit(1);
        match self.crm.query(&query).await {
            Ok(found) => {
                if let Some(existing) = found.into_iter().next() {
                    debug!(key = %key, id = %existing.id, "Account already exists");
                    return RecordOutcome::Duplicate {
                        key,
                        existing_id: existing.id,
                    };
                }
            },
            Err(err) => {
                warn!(key = %key, error = %err, "Lookup by certification number failed");
                return RecordOutcome::Error {
                    key,
                    error: err.to_string(),
                };
            },
        }

        match self.crm.create_record(ACCOUNT_OBJECT, record).await {
            Ok(id) => {
                info!(key = %key, id = %id, "Created Account");
                RecordOutcome::Created { key, id }
            },
            Err(err) => {
                warn!(key = %key, error = %err, "Failed to create Account");
                RecordOutcome::Error {
                    key,
                    error: err.to_string(),
                }
            },
        }
    }

    fn progress_bar(&self, total: u64) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        bar
    }
}
