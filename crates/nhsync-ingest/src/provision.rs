//! Schema provisioning
//!
//! Each custom column moves through
//! `Pending -> Checking -> (Exists -> Skipped) | (Absent -> Creating) -> Created | Failed`.
//! Columns are handled one at a time in document order. A failure on one column
//! never stops the others, and columns created before an interruption are
//! detected as existing on the next run.

use std::time::Duration;

use nhsync_common::pacing::Sleeper;
use nhsync_common::types::FieldDescriptor;
use nhsync_crm::CrmClient;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::classify::PlannedColumn;

/// Final state of one column
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FieldOutcome {
    Created { api_name: String, id: String },
    Skipped { api_name: String },
    Failed { field: String, error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedField {
    pub field: String,
    pub error: String,
}

/// Disjoint created / skipped / failed sets covering every custom column
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionSummary {
    pub created: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<FailedField>,
}

impl ProvisionSummary {
    pub fn record(&mut self, outcome: FieldOutcome) {
        match outcome {
            FieldOutcome::Created { api_name, .. } => self.created.push(api_name),
            FieldOutcome::Skipped { api_name } => self.skipped.push(api_name),
            FieldOutcome::Failed { field, error } => self.failed.push(FailedField { field, error }),
        }
    }

    pub fn total(&self) -> usize {
        self.created.len() + self.skipped.len() + self.failed.len()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug)]
enum FieldState<'a> {
    Pending(&'a FieldDescriptor),
    Checking(&'a FieldDescriptor),
    Exists(&'a FieldDescriptor),
    Absent(&'a FieldDescriptor),
    Creating(&'a FieldDescriptor),
    Done(FieldOutcome),
}

pub struct Provisioner<'a> {
    crm: &'a dyn CrmClient,
    sleeper: &'a dyn Sleeper,
    delay: Duration,
}

impl<'a> Provisioner<'a> {
    pub fn new(crm: &'a dyn CrmClient, sleeper: &'a dyn Sleeper, delay: Duration) -> Self {
        Self { crm, sleeper, delay }
    }

    /// Provision every custom column of `plan`. Reserved columns are ignored.
    #[instrument(skip_all, fields(columns = plan.len()))]
    pub async fn run(&self, plan: &[PlannedColumn]) -> ProvisionSummary {
        let mut summary = ProvisionSummary::default();
        let mut attempted_create = false;

        let candidates: Vec<&PlannedColumn> = plan.iter().filter(|c| !c.is_reserved()).collect();
        let total = candidates.len();

        for (index, column) in candidates.into_iter().enumerate() {
            debug!(column = %column.source_name, "[{}/{}] provisioning", index + 1, total);

            let outcome = match &column.result {
                Ok(_) => match column.descriptor() {
                    Some(descriptor) => self.provision(descriptor, &mut attempted_create).await,
                    None => continue,
                },
                Err(err) => {
                    warn!(column = %column.source_name, error = %err, "Column cannot be provisioned");
                    FieldOutcome::Failed {
                        field: column.display_name().to_string(),
                        error: err.to_string(),
                    }
                },
            };

            summary.record(outcome);
        }

        info!(
            created = summary.created.len(),
            skipped = summary.skipped.len(),
            failed = summary.failed.len(),
            "Provisioning finished"
        );
        summary
    }

    /// Drive one descriptor through the state machine.
    pub async fn provision(
        &self,
        descriptor: &FieldDescriptor,
        attempted_create: &mut bool,
    ) -> FieldOutcome {
        let mut state = FieldState::Pending(descriptor);

        loop {
            state = match state {
                FieldState::Pending(d) => FieldState::Checking(d),
                FieldState::Checking(d) => {
                    if self.exists(d).await {
                        FieldState::Exists(d)
                    } else {
                        FieldState::Absent(d)
                    }
                },
                FieldState::Exists(d) => {
                    info!(field = %d.api_name, "Field already exists, skipping");
                    FieldState::Done(FieldOutcome::Skipped {
                        api_name: d.api_name.clone(),
                    })
                },
                FieldState::Absent(d) => match d.validate() {
                    Ok(()) => FieldState::Creating(d),
                    Err(err) => {
                        warn!(field = %d.api_name, error = %err, "Invalid field descriptor");
                        FieldState::Done(FieldOutcome::Failed {
                            field: d.api_name.clone(),
                            error: err.to_string(),
                        })
                    },
                },
                FieldState::Creating(d) => {
                    if *attempted_create {
                        self.sleeper.sleep(self.delay).await;
                    }
                    *attempted_create = true;

                    match self.crm.create_field(d).await {
                        Ok(id) => {
                            info!(field = %d.api_name, id = %id, "Created field");
                            FieldState::Done(FieldOutcome::Created {
                                api_name: d.api_name.clone(),
                                id,
                            })
                        },
                        Err(err) => {
                            warn!(field = %d.api_name, error = %err, "Failed to create field");
                            FieldState::Done(FieldOutcome::Failed {
                                field: d.api_name.clone(),
                                error: err.to_string(),
                            })
                        },
                    }
                },
                FieldState::Done(outcome) => return outcome,
            };
        }
    }

    /// Membership test against describe; a failed describe counts as absent.
    async fn exists(&self, descriptor: &FieldDescriptor) -> bool {
        match self.crm.describe(&descriptor.object).await {
            Ok(description) => description.has_field(&descriptor.api_name),
            Err(err) => {
                warn!(
                    object = %descriptor.object,
                    error = %err,
                    "Could not check whether field exists, assuming absent"
                );
                false
            },
        }
    }
}
