//! Core data types shared across the scan pipeline.
//!
//! These are the wire-shaped change rows received from the instance and the
//! lint report structures that end up attached to scans.

use serde::{Deserialize, Serialize};

/// One raw `sys_update_xml` row as returned by the instance, before any
/// validation or classification. Field names match the wire exactly.
#[derive(Debug, Clone, Deserialize)]
pub struct RawChange {
    #[serde(default)]
    pub sys_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub sys_created_by: String,
    #[serde(default)]
    pub sys_created_on: String,
    #[serde(default)]
    pub sys_updated_by: String,
    #[serde(default)]
    pub sys_updated_on: String,
    /// Human label of the change category (wire name `type`).
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub target_name: String,
    #[serde(default)]
    pub update_set: String,
    #[serde(default)]
    pub payload: Option<String>,
}

/// Severity of a single lint message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// One message produced by the lint capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintMessage {
    /// Line number within the linted field text (1-based).
    pub line: usize,
    /// Column number (1-based).
    pub column: usize,
    pub severity: Severity,
    pub rule_id: String,
    pub message: String,
}

/// Aggregated lint result for one extracted field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldReport {
    pub warning_count: u32,
    pub error_count: u32,
    #[serde(default)]
    pub messages: Vec<LintMessage>,
}
