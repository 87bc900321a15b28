//! Per-name aggregation and the status state machine.

use indexmap::IndexMap;
use serde::Serialize;

use crate::models::FieldReport;
use crate::record::{ChangeAction, ChangeRecord};

/// Derived classification of a [`ChangeScan`]. Never stored; computed on
/// read from the record's action, the pipeline command, and lint reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanStatus {
    Deleted,
    Ignored,
    Manual,
    Skipped,
    Scan,
    Error,
    Warning,
    Ok,
}

impl ScanStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ScanStatus::Deleted => "DELETED",
            ScanStatus::Ignored => "IGNORED",
            ScanStatus::Manual => "MANUAL",
            ScanStatus::Skipped => "SKIPPED",
            ScanStatus::Scan => "SCAN",
            ScanStatus::Error => "ERROR",
            ScanStatus::Warning => "WARNING",
            ScanStatus::Ok => "OK",
        }
    }
}

/// Structural exclusion set by the pipeline before linting; not a lint
/// outcome. A scan holds at most one command, last write wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanCommand {
    Ignored,
    Skipped,
    Manual,
}

impl ScanCommand {
    fn status(self) -> ScanStatus {
        match self {
            ScanCommand::Ignored => ScanStatus::Ignored,
            ScanCommand::Skipped => ScanStatus::Skipped,
            ScanCommand::Manual => ScanStatus::Manual,
        }
    }
}

/// Aggregation of every raw record sharing one `name` within a run: the
/// first-seen record, a repetition count, per-field lint reports in lint
/// order, and an optional command override.
#[derive(Debug, Clone)]
pub struct ChangeScan {
    record: ChangeRecord,
    update_count: u32,
    command: Option<ScanCommand>,
    reports: IndexMap<String, FieldReport>,
}

impl ChangeScan {
    pub fn new(record: ChangeRecord) -> Self {
        Self {
            record,
            update_count: 1,
            command: None,
            reports: IndexMap::new(),
        }
    }

    pub fn record(&self) -> &ChangeRecord {
        &self.record
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }

    /// Number of raw records collapsed into this scan.
    pub fn update_count(&self) -> u32 {
        self.update_count
    }

    pub fn command(&self) -> Option<ScanCommand> {
        self.command
    }

    /// Lint reports keyed by field, in the order fields were linted.
    pub fn reports(&self) -> &IndexMap<String, FieldReport> {
        &self.reports
    }

    /// Count another raw record collapsed into this scan. The duplicate's
    /// field values are discarded; the first-seen record wins.
    pub fn increment_update_count(&mut self) {
        self.update_count += 1;
    }

    pub fn set_command(&mut self, command: ScanCommand) {
        self.command = Some(command);
    }

    /// Upsert the lint report for one field, preserving first-lint order.
    pub fn set_report(&mut self, field: impl Into<String>, report: FieldReport) {
        self.reports.insert(field.into(), report);
    }

    pub fn warning_count(&self) -> u32 {
        self.reports.values().map(|r| r.warning_count).sum()
    }

    pub fn error_count(&self) -> u32 {
        self.reports.values().map(|r| r.error_count).sum()
    }

    pub fn has_warning(&self) -> bool {
        self.reports.values().any(|r| r.warning_count > 0)
    }

    pub fn has_error(&self) -> bool {
        self.reports.values().any(|r| r.error_count > 0)
    }

    /// Evaluate the status, first match wins:
    ///
    /// 1. a DELETE is `Deleted`; no other signal overrides it;
    /// 2. a command is authoritative only while no reports exist;
    /// 3. any error-bearing report → `Error`;
    /// 4. any warning-bearing report → `Warning`;
    /// 5. any report at all → `Ok`;
    /// 6. otherwise `Scan`: eligible, not yet processed.
    pub fn status(&self) -> ScanStatus {
        if self.record.action == ChangeAction::Delete {
            return ScanStatus::Deleted;
        }
        if let Some(command) = self.command {
            if self.reports.is_empty() {
                return command.status();
            }
        }
        if self.has_error() {
            return ScanStatus::Error;
        }
        if self.has_warning() {
            return ScanStatus::Warning;
        }
        if !self.reports.is_empty() {
            return ScanStatus::Ok;
        }
        ScanStatus::Scan
    }
}
