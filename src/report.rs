//! Report projection: the serializable view of a completed run.
//!
//! [`ReportData`] is everything a renderer needs; the scanner itself only
//! ships the JSON writer below.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::models::FieldReport;
use crate::record::ChangeAction;
use crate::scan::{ChangeScan, ScanStatus};

/// Serializable projection of one [`ChangeScan`]: every record field plus
/// the derived counts and status.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeScanJson {
    pub id: String,
    pub name: String,
    pub action: ChangeAction,
    pub created_by: String,
    pub created_on: String,
    pub updated_by: String,
    pub updated_on: String,
    pub kind: String,
    pub target_name: String,
    pub update_set: String,
    pub payload: Option<String>,
    pub target_table: Option<String>,
    pub target_id: Option<String>,
    pub warning_count: u32,
    pub error_count: u32,
    pub has_warning: bool,
    pub has_error: bool,
    pub status: ScanStatus,
    pub updates: u32,
    /// `[field, report]` pairs in lint order.
    pub reports: Vec<(String, FieldReport)>,
}

impl From<&ChangeScan> for ChangeScanJson {
    fn from(scan: &ChangeScan) -> Self {
        let record = scan.record();
        ChangeScanJson {
            id: record.id.clone(),
            name: record.name.clone(),
            action: record.action,
            created_by: record.created_by.clone(),
            created_on: record.created_on.clone(),
            updated_by: record.updated_by.clone(),
            updated_on: record.updated_on.clone(),
            kind: record.kind.clone(),
            target_name: record.target_name.clone(),
            update_set: record.update_set.clone(),
            payload: record.payload.clone(),
            target_table: record.target_table.clone(),
            target_id: record.target_id.clone(),
            warning_count: scan.warning_count(),
            error_count: scan.error_count(),
            has_warning: scan.has_warning(),
            has_error: scan.has_error(),
            status: scan.status(),
            updates: scan.update_count(),
            reports: scan
                .reports()
                .iter()
                .map(|(field, report)| (field.clone(), report.clone()))
                .collect(),
        }
    }
}

/// Everything a renderer needs for one run.
#[derive(Debug, Clone, Serialize)]
pub struct ReportData {
    /// Instance the changes were fetched from.
    pub domain: String,
    pub query: String,
    pub title: String,
    /// Time-of-run stamp; the only field two otherwise identical runs
    /// differ in.
    pub generated_at: String,
    /// `[name, scan]` entries in first-seen order.
    pub changes: Vec<(String, ChangeScanJson)>,
    /// Renderer-owned passthrough (logos, stylesheet names, ...).
    pub resources: serde_json::Value,
}

/// Serialize a report as pretty JSON to `output`, or stdout when `None`.
pub fn write_json(report: &ReportData, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(path, &json)
                .with_context(|| format!("writing {}", path.display()))?;
            eprintln!(
                "Wrote report for {} changes to {}",
                report.changes.len(),
                path.display()
            );
        }
        None => println!("{}", json),
    }
    Ok(())
}
