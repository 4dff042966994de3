//! Run orchestration
//!
//! Provisioning and loading both work against `&dyn CrmClient`, so the same
//! code drives the live tenant and the in-memory tenant used by `--dry-run`.

use std::path::Path;
use std::time::Duration;

use nhsync_common::pacing::{RecordingSleeper, Sleeper, TokioSleeper};
use nhsync_common::types::FieldDescriptor;
use nhsync_crm::{CrmClient, InMemoryCrm, SalesforceClient};
use tracing::{error, info, instrument};

use crate::classify::{self, PlannedColumn};
use crate::config::Config;
use crate::error::Result;
use crate::loader::{fetch_csv, project_csv, CsvSource, LoadOptions, Projector};
use crate::metadata::MetadataDocument;
use crate::provision::{ProvisionSummary, Provisioner};
use crate::report::RunSummary;
use crate::upsert::{LoadSummary, Upserter};

/// CRM client and sleeper for one run
pub struct Target {
    crm: Box<dyn CrmClient>,
    sleeper: Box<dyn Sleeper>,
    dry_run: bool,
}

impl Target {
    /// Authenticate against the configured tenant.
    pub async fn connect(config: &Config) -> Result<Self> {
        let client = SalesforceClient::connect(config.crm_config()?).await?;
        info!(instance = %client.instance_url().await, "Connected to CRM tenant");
        Ok(Self {
            crm: Box::new(client),
            sleeper: Box::new(TokioSleeper),
            dry_run: false,
        })
    }

    /// In-memory tenant that already carries `fields`. Delays are recorded, not slept.
    pub fn dry_run(fields: impl IntoIterator<Item = FieldDescriptor>) -> Self {
        Self {
            crm: Box::new(InMemoryCrm::new().with_fields(fields)),
            sleeper: Box::new(RecordingSleeper::new()),
            dry_run: true,
        }
    }

    pub fn crm(&self) -> &dyn CrmClient {
        self.crm.as_ref()
    }

    pub fn sleeper(&self) -> &dyn Sleeper {
        self.sleeper.as_ref()
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}

/// Read the metadata document and classify every column.
pub fn load_plan(path: &Path) -> Result<Vec<PlannedColumn>> {
    let document = MetadataDocument::load(path)?;
    let plan = classify::plan(&document);
    info!(
        path = %path.display(),
        columns = plan.len(),
        custom = plan.iter().filter(|c| !c.is_reserved()).count(),
        "Loaded metadata document"
    );
    Ok(plan)
}

/// Descriptors of every custom column that classified cleanly.
pub fn planned_descriptors(plan: &[PlannedColumn]) -> Vec<FieldDescriptor> {
    plan.iter().filter_map(PlannedColumn::descriptor).cloned().collect()
}

pub async fn provision(
    crm: &dyn CrmClient,
    sleeper: &dyn Sleeper,
    plan: &[PlannedColumn],
    delay: Duration,
) -> ProvisionSummary {
    Provisioner::new(crm, sleeper, delay).run(plan).await
}

/// Everything `load` needs besides the CRM and the plan
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub source: CsvSource,
    pub options: LoadOptions,
    pub delay: Duration,
    pub timeout: Duration,
    pub progress: bool,
}

/// Fetch the CSV, project it through the plan and upsert the result.
#[instrument(skip_all, fields(source = %request.source))]
pub async fn load(
    crm: &dyn CrmClient,
    sleeper: &dyn Sleeper,
    plan: &[PlannedColumn],
    request: &LoadRequest,
) -> Result<LoadSummary> {
    let body = fetch_csv(&request.source, request.timeout, request.progress).await?;
    let projector = Projector::from_plan(plan);
    let batch = project_csv(body.as_slice(), &projector, &request.options)?;

    let mut summary = Upserter::new(crm, sleeper, request.delay)
        .with_progress(request.progress)
        .run(&batch.records)
        .await;
    summary.rejected = batch.rejected;
    Ok(summary)
}

/// Provision, then load. Load runs even when some fields failed; affected
/// records fail the schema pre-check individually. A load that cannot start
/// (fetch or header failure) is recorded as `aborted` next to the provisioning
/// outcome.
pub async fn sync(
    crm: &dyn CrmClient,
    sleeper: &dyn Sleeper,
    plan: &[PlannedColumn],
    field_delay: Duration,
    request: &LoadRequest,
) -> Result<RunSummary> {
    let provision = provision(crm, sleeper, plan, field_delay).await;
    match load(crm, sleeper, plan, request).await {
        Ok(load) => Ok(RunSummary {
            provision: Some(provision),
            load: Some(load),
            aborted: None,
        }),
        Err(err) => {
            error!(error = %err, created = provision.created.len(), "Load aborted after provisioning");
            Ok(RunSummary {
                provision: Some(provision),
                load: None,
                aborted: Some(err.to_string()),
            })
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_dry_run_target_seeds_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"columns": {{"fields": {{"Provider Name": "text", "Chain Name": "text", "Odd": "foo"}}}}}}"#
        )
        .unwrap();

        let plan = load_plan(file.path()).unwrap();
        let descriptors = planned_descriptors(&plan);
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].api_name, "Chain_Name__c");

        let target = Target::dry_run(descriptors);
        assert!(target.is_dry_run());
    }

    #[test]
    fn test_missing_metadata_is_fatal() {
        let err = load_plan(Path::new("/nonexistent/metadata.json")).unwrap_err();
        assert!(err.is_fatal());
    }
}
