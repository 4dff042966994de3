//! Upstream CSV loading and projection onto Account payloads
//!
//! Rows outside the jurisdiction set are dropped silently. Surviving rows are
//! renamed through the reserved map and the classified columns; cells are
//! converted to their semantic type and omitted when empty or unconvertible.
//! Rows without a usable certification number are rejected with a reason.

use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use indicatif::{ProgressBar, ProgressStyle};
use nhsync_common::types::{AccountRecord, SemanticType, BUSINESS_KEY_FIELD};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use tracing::{debug, info, instrument, warn};

use crate::classify::{Classification, PlannedColumn, RESERVED_FIELDS, STATE_COLUMN};
use crate::error::{IngestError, Result};

/// Longest accepted certification number.
pub const MAX_BUSINESS_KEY_LENGTH: usize = 50;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CsvSource {
    Url(String),
    Path(PathBuf),
}

impl std::fmt::Display for CsvSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CsvSource::Url(url) => write!(f, "{url}"),
            CsvSource::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Download (or read) the whole CSV body.
#[instrument(skip_all, fields(source = %source))]
pub async fn fetch_csv(source: &CsvSource, timeout: Duration, progress: bool) -> Result<Vec<u8>> {
    match source {
        CsvSource::Path(path) => Ok(tokio::fs::read(path).await?),
        CsvSource::Url(url) => {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| IngestError::fetch(url, e))?;
            let mut response = client
                .get(url)
                .send()
                .await
                .map_err(|e| IngestError::fetch(url, e))?;

            if !response.status().is_success() {
                return Err(IngestError::fetch(url, format!("status {}", response.status())));
            }

            let bar = if progress {
                download_progress(response.content_length())
            } else {
                ProgressBar::hidden()
            };

            let mut body = Vec::new();
            while let Some(chunk) = response.chunk().await.map_err(|e| IngestError::fetch(url, e))? {
                body.extend_from_slice(&chunk);
                bar.set_position(body.len() as u64);
            }
            bar.finish_and_clear();

            info!(bytes = body.len(), "Downloaded provider dataset");
            Ok(body)
        },
    }
}

fn download_progress(total: Option<u64>) -> ProgressBar {
    let bar = match total {
        Some(total) => ProgressBar::new(total),
        None => ProgressBar::new_spinner(),
    };
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})")
    {
        bar.set_style(style.progress_chars("#>-"));
    }
    bar
}

/// Where one CSV column lands on the Account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub source_name: String,
    pub api_name: String,
    pub semantic_type: SemanticType,
}

/// Column mappings derived from the classification plan
#[derive(Debug, Clone)]
pub struct Projector {
    mappings: Vec<ColumnMapping>,
}

impl Projector {
    /// Reserved columns are always mapped; custom columns only when classified.
    pub fn from_plan(plan: &[PlannedColumn]) -> Self {
        let mut mappings: Vec<ColumnMapping> = RESERVED_FIELDS
            .iter()
            .map(|(source, builtin)| ColumnMapping {
                source_name: source.to_string(),
                api_name: builtin.to_string(),
                semantic_type: SemanticType::Text,
            })
            .collect();

        for column in plan {
            if let Ok(Classification::Custom { descriptor }) = &column.result {
                mappings.push(ColumnMapping {
                    source_name: column.source_name.clone(),
                    api_name: descriptor.api_name.clone(),
                    semantic_type: descriptor.kind.semantic_type(),
                });
            }
        }

        Self { mappings }
    }

    pub fn mappings(&self) -> &[ColumnMapping] {
        &self.mappings
    }

    fn business_key_source(&self) -> Option<&str> {
        self.mappings
            .iter()
            .find(|m| m.api_name == BUSINESS_KEY_FIELD)
            .map(|m| m.source_name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedRow {
    /// 1-based line in the CSV, header included
    pub row: u64,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct LoadBatch {
    pub records: Vec<AccountRecord>,
    pub rejected: Vec<RejectedRow>,
    /// Rows outside the jurisdiction set
    pub filtered_out: usize,
    pub rows_read: usize,
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Upper-cased state codes
    pub states: Vec<String>,
    /// Stop after this many accepted rows
    pub limit: Option<usize>,
}

/// Filter and project CSV rows into Account payloads.
pub fn project_csv<R: Read>(reader: R, projector: &Projector, options: &LoadOptions) -> Result<LoadBatch> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = csv
        .headers()
        .map_err(|e| IngestError::Header(e.to_string()))?
        .clone();
    let index_of = |name: &str| headers.iter().position(|h| h.trim() == name);

    let state_index = index_of(STATE_COLUMN)
        .ok_or_else(|| IngestError::Header(format!("missing '{STATE_COLUMN}' column")))?;
    let key_source = projector
        .business_key_source()
        .ok_or_else(|| IngestError::Header(format!("no column maps to {BUSINESS_KEY_FIELD}")))?;
    if index_of(key_source).is_none() {
        return Err(IngestError::Header(format!("missing '{key_source}' column")));
    }

    let columns: Vec<(usize, &ColumnMapping)> = projector
        .mappings()
        .iter()
        .filter_map(|m| match index_of(&m.source_name) {
            Some(index) => Some((index, m)),
            None => {
                debug!(column = %m.source_name, "Column absent from CSV header");
                None
            },
        })
        .collect();

    let mut batch = LoadBatch::default();

    for row in csv.records() {
        batch.rows_read += 1;
        let row = match row {
            Ok(row) => row,
            Err(err) if err.is_io_error() => return Err(err.into()),
            Err(err) => {
                let line = err.position().map(|p| p.line()).unwrap_or(batch.rows_read as u64 + 1);
                warn!(row = line, error = %err, "Undecodable row");
                batch.rejected.push(RejectedRow {
                    row: line,
                    reason: format!("undecodable row: {err}"),
                });
                continue;
            },
        };
        let line = row.position().map(|p| p.line()).unwrap_or(batch.rows_read as u64 + 1);

        let state = row.get(state_index).unwrap_or("").trim().to_ascii_uppercase();
        if !options.states.contains(&state) {
            batch.filtered_out += 1;
            continue;
        }

        let mut record = AccountRecord::new();
        for (index, mapping) in &columns {
            let Some(cell) = row.get(*index).map(str::trim).filter(|c| !c.is_empty()) else {
                continue;
            };
            match convert_cell(cell, mapping.semantic_type) {
                Some(value) => record.insert(mapping.api_name.clone(), value),
                None => warn!(
                    row = line,
                    column = %mapping.source_name,
                    value = %cell,
                    expected = %mapping.semantic_type,
                    "Cell cannot be converted, omitting"
                ),
            }
        }

        if let Err(reason) = check_business_key(&record) {
            warn!(row = line, reason = %reason, "Rejecting row");
            batch.rejected.push(RejectedRow { row: line, reason });
            continue;
        }

        batch.records.push(record);
        if options.limit.is_some_and(|limit| batch.records.len() >= limit) {
            break;
        }
    }

    info!(
        rows = batch.rows_read,
        accepted = batch.records.len(),
        rejected = batch.rejected.len(),
        filtered_out = batch.filtered_out,
        "Projected provider rows"
    );

    Ok(batch)
}

/// A usable key is non-empty, alphanumeric and at most 50 characters.
fn check_business_key(record: &AccountRecord) -> std::result::Result<(), String> {
    let Some(key) = record.business_key() else {
        return Err(format!("missing {BUSINESS_KEY_FIELD}"));
    };
    if key.len() > MAX_BUSINESS_KEY_LENGTH {
        return Err(format!(
            "{BUSINESS_KEY_FIELD} '{key}' is longer than {MAX_BUSINESS_KEY_LENGTH} characters"
        ));
    }
    if !key.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(format!("{BUSINESS_KEY_FIELD} '{key}' is not alphanumeric"));
    }
    Ok(())
}

/// Convert one non-empty cell to its JSON representation.
pub fn convert_cell(cell: &str, semantic_type: SemanticType) -> Option<Value> {
    match semantic_type {
        SemanticType::Text => Some(Value::String(cell.to_string())),
        SemanticType::Number => parse_number(cell).map(Value::Number),
        SemanticType::Checkbox => parse_checkbox(cell).map(Value::Bool),
        SemanticType::Date => parse_date(cell).map(Value::String),
    }
}

fn parse_number(cell: &str) -> Option<Number> {
    let cleaned = cell.replace(',', "");
    if let Ok(integer) = cleaned.parse::<i64>() {
        return Some(Number::from(integer));
    }
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(Number::from_f64)
}

fn parse_checkbox(cell: &str) -> Option<bool> {
    match cell.to_ascii_lowercase().as_str() {
        "y" | "yes" | "true" | "1" => Some(true),
        "n" | "no" | "false" | "0" => Some(false),
        _ => None,
    }
}

fn parse_date(cell: &str) -> Option<String> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(cell, format).ok())
        .map(|date| date.format("%Y-%m-%d").to_string())
}
