//! Human and JSON run summaries

use std::path::Path;

use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};
use nhsync_common::types::FieldKind;
use serde::{Deserialize, Serialize};

use crate::classify::{Classification, PlannedColumn};
use crate::error::Result;
use crate::provision::ProvisionSummary;
use crate::upsert::LoadSummary;

/// Everything a run produced; either half may be absent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provision: Option<ProvisionSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load: Option<LoadSummary>,
    /// Fatal error that stopped the run after provisioning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
}

impl RunSummary {
    /// 0 when no field failed, no record errored and nothing aborted the run.
    pub fn exit_code(&self) -> i32 {
        if self.aborted.is_some() {
            return 1;
        }
        let provision_ok = self.provision.as_ref().map_or(true, ProvisionSummary::is_success);
        let load_ok = self.load.as_ref().map_or(true, LoadSummary::is_success);
        if provision_ok && load_ok {
            0
        } else {
            1
        }
    }
}

pub fn write_summary_json(path: &Path, summary: &RunSummary) -> Result<()> {
    let json = serde_json::to_string_pretty(summary).map_err(nhsync_common::SyncError::from)?;
    std::fs::write(path, json)?;
    Ok(())
}

fn counts_table(rows: &[(&str, usize)]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec!["Outcome", "Count"]);
    for (label, count) in rows {
        table.add_row(vec![label.to_string(), count.to_string()]);
    }
    table
}

pub fn render_provision_summary(summary: &ProvisionSummary) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", "Field Creation Summary".cyan().bold()));
    out.push_str(&format!(
        "{}\n",
        counts_table(&[
            ("Created", summary.created.len()),
            ("Already existed (skipped)", summary.skipped.len()),
            ("Failed", summary.failed.len()),
        ])
    ));

    if !summary.created.is_empty() {
        out.push_str("\nCreated fields:\n");
        for field in &summary.created {
            out.push_str(&format!("  {} {}\n", "✓".green(), field));
        }
    }
    if !summary.skipped.is_empty() {
        out.push_str("\nSkipped (already exist):\n");
        for field in &summary.skipped {
            out.push_str(&format!("  {} {}\n", "⊗".yellow(), field));
        }
    }
    if !summary.failed.is_empty() {
        out.push_str("\nFailed fields:\n");
        for failed in &summary.failed {
            out.push_str(&format!("  {} {}: {}\n", "✗".red(), failed.field, failed.error));
        }
    }
    out
}

pub fn render_load_summary(summary: &LoadSummary) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", "Account Load Summary".cyan().bold()));
    out.push_str(&format!(
        "{}\n",
        counts_table(&[
            ("Created", summary.created.len()),
            ("Duplicates", summary.duplicates.len()),
            ("Errors", summary.errors.len()),
            ("Rejected rows", summary.rejected.len()),
        ])
    ));

    if !summary.errors.is_empty() {
        out.push_str("\nErrors:\n");
        for err in &summary.errors {
            out.push_str(&format!("  {} {}: {}\n", "✗".red(), err.key, err.error));
        }
    }
    if !summary.rejected.is_empty() {
        out.push_str("\nRejected rows:\n");
        for row in &summary.rejected {
            out.push_str(&format!("  {} line {}: {}\n", "⊗".yellow(), row.row, row.reason));
        }
    }
    out
}

/// Descriptor plan as a table, one row per metadata column.
pub fn render_plan(plan: &[PlannedColumn]) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec!["Source column", "API name", "Type", "Attributes"]);

    for column in plan {
        let (api_name, kind, attributes) = match &column.result {
            Ok(Classification::Reserved { builtin }) => {
                (builtin.to_string(), "built-in".to_string(), String::new())
            },
            Ok(Classification::Custom { descriptor }) => (
                descriptor.api_name.clone(),
                descriptor.kind.semantic_type().to_string(),
                describe_kind(&descriptor.kind),
            ),
            Err(err) => (
                column.display_name().to_string(),
                "error".to_string(),
                err.to_string(),
            ),
        };
        table.add_row(vec![column.source_name.clone(), api_name, kind, attributes]);
    }

    table.to_string()
}

fn describe_kind(kind: &FieldKind) -> String {
    match kind {
        FieldKind::Text {
            length,
            unique,
            external_id,
        } => {
            let mut parts = vec![format!("length={length}")];
            if *unique {
                parts.push("unique".to_string());
            }
            if *external_id {
                parts.push("external id".to_string());
            }
            parts.join(", ")
        },
        FieldKind::Number { precision, scale } => format!("precision={precision}, scale={scale}"),
        FieldKind::Checkbox { default_value } => format!("default={default_value}"),
        FieldKind::Date => String::new(),
    }
}
