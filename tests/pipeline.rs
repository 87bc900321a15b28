//! End-to-end pipeline tests against in-memory collaborators.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;

use snscan::config::TablePolicy;
use snscan::fingerprint;
use snscan::linter::Linter;
use snscan::loader::ChangeLoader;
use snscan::models::{FieldReport, RawChange};
use snscan::pipeline::ScanPipeline;
use snscan::scan::ScanStatus;

// ── Stub collaborators ─────────────────────────────────────────

struct StaticLoader {
    records: Vec<RawChange>,
}

#[async_trait]
impl ChangeLoader for StaticLoader {
    fn instance(&self) -> &str {
        "https://dev00001.service-now.com"
    }

    async fn fetch_changes(&self, _query: &str) -> Result<Vec<RawChange>> {
        Ok(self.records.clone())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

struct FailingLoader;

#[async_trait]
impl ChangeLoader for FailingLoader {
    fn instance(&self) -> &str {
        "https://dev00001.service-now.com"
    }

    async fn fetch_changes(&self, _query: &str) -> Result<Vec<RawChange>> {
        bail!("connection refused")
    }

    async fn ping(&self) -> Result<()> {
        bail!("connection refused")
    }
}

/// Counts invocations and hands back a fixed report (or nothing).
struct RecordingLinter {
    calls: AtomicUsize,
    report: Option<FieldReport>,
}

impl RecordingLinter {
    fn clean() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            report: Some(FieldReport::default()),
        }
    }

    fn with_report(report: FieldReport) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            report: Some(report),
        }
    }

    fn silent() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            report: None,
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Linter for RecordingLinter {
    async fn lint(&self, _source: &str) -> Result<Vec<FieldReport>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.report.clone().into_iter().collect())
    }
}

// ── Fixtures ───────────────────────────────────────────────────

fn raw(name: &str, action: &str, payload: Option<&str>) -> RawChange {
    RawChange {
        sys_id: format!("id-{}", name),
        name: name.to_string(),
        action: action.to_string(),
        sys_created_by: "admin".into(),
        sys_created_on: "2024-03-01 10:00:00".into(),
        sys_updated_by: "admin".into(),
        sys_updated_on: "2024-03-01 10:05:00".into(),
        kind: "Script Include".into(),
        target_name: name.to_string(),
        update_set: "us1".into(),
        payload: payload.map(|p| p.to_string()),
    }
}

fn include_payload(script: &str) -> String {
    format!(
        "<record_update><sys_script_include><script>{}</script></sys_script_include></record_update>",
        script
    )
}

fn tables(entries: &[(&str, &[&str])]) -> HashMap<String, TablePolicy> {
    entries
        .iter()
        .map(|(table, fields)| {
            (
                table.to_string(),
                TablePolicy {
                    fields: fields.iter().map(|f| f.to_string()).collect(),
                    defaults: HashMap::new(),
                },
            )
        })
        .collect()
}

fn pipeline(
    records: Vec<RawChange>,
    linter: Arc<dyn Linter>,
    tables: HashMap<String, TablePolicy>,
) -> ScanPipeline {
    ScanPipeline::new(Arc::new(StaticLoader { records }), linter, tables)
}

// ── Scenarios ──────────────────────────────────────────────────

#[tokio::test]
async fn clean_script_ends_ok_with_a_report() {
    let linter = Arc::new(RecordingLinter::clean());
    let mut p = pipeline(
        vec![raw("X", "INSERT_OR_UPDATE", Some(&include_payload("foo();")))],
        linter.clone(),
        tables(&[("sys_script_include", &["script"])]),
    );
    p.process("update_set.name=Release 7").await.unwrap();

    let scan = p.scan("X").unwrap();
    assert_eq!(scan.status(), ScanStatus::Ok);
    assert!(scan.reports().contains_key("script"));
    assert_eq!(linter.calls(), 1);
}

#[tokio::test]
async fn unconfigured_table_is_ignored_without_linting() {
    let linter = Arc::new(RecordingLinter::clean());
    let mut p = pipeline(
        vec![raw("X", "INSERT_OR_UPDATE", Some(&include_payload("foo();")))],
        linter.clone(),
        tables(&[]),
    );
    p.process("q").await.unwrap();

    let scan = p.scan("X").unwrap();
    assert_eq!(scan.status(), ScanStatus::Ignored);
    assert!(scan.reports().is_empty());
    assert_eq!(linter.calls(), 0);
}

#[tokio::test]
async fn table_without_fields_is_manual() {
    let linter = Arc::new(RecordingLinter::clean());
    let mut p = pipeline(
        vec![raw("X", "INSERT_OR_UPDATE", Some(&include_payload("foo();")))],
        linter.clone(),
        tables(&[("sys_script_include", &[])]),
    );
    p.process("q").await.unwrap();

    assert_eq!(p.scan("X").unwrap().status(), ScanStatus::Manual);
    assert_eq!(linter.calls(), 0);
}

#[tokio::test]
async fn empty_field_text_is_skipped_without_linting() {
    let linter = Arc::new(RecordingLinter::clean());
    let mut p = pipeline(
        vec![raw("X", "INSERT_OR_UPDATE", Some(&include_payload("")))],
        linter.clone(),
        tables(&[("sys_script_include", &["script"])]),
    );
    p.process("q").await.unwrap();

    assert_eq!(p.scan("X").unwrap().status(), ScanStatus::Skipped);
    assert_eq!(linter.calls(), 0);
}

#[tokio::test]
async fn missing_field_is_skipped() {
    let linter = Arc::new(RecordingLinter::clean());
    let mut p = pipeline(
        vec![raw(
            "X",
            "INSERT_OR_UPDATE",
            Some("<u><sys_script_include><name>n</name></sys_script_include></u>"),
        )],
        linter.clone(),
        tables(&[("sys_script_include", &["script"])]),
    );
    p.process("q").await.unwrap();

    assert_eq!(p.scan("X").unwrap().status(), ScanStatus::Skipped);
    assert_eq!(linter.calls(), 0);
}

#[tokio::test]
async fn default_value_is_skip_equivalent() {
    let shipped = "var Helper = Class.create();";
    let mut policies = tables(&[("sys_script_include", &["script"])]);
    policies
        .get_mut("sys_script_include")
        .unwrap()
        .defaults
        .insert("script".into(), fingerprint::hash(shipped));

    let linter = Arc::new(RecordingLinter::clean());
    // Whitespace differences must not defeat the default match.
    let mut p = pipeline(
        vec![raw(
            "X",
            "INSERT_OR_UPDATE",
            Some(&include_payload("  var Helper =   Class.create();\n")),
        )],
        linter.clone(),
        policies,
    );
    p.process("q").await.unwrap();

    assert_eq!(p.scan("X").unwrap().status(), ScanStatus::Skipped);
    assert_eq!(linter.calls(), 0);
}

#[tokio::test]
async fn duplicate_names_collapse_into_one_scan() {
    let linter = Arc::new(RecordingLinter::clean());
    let mut first = raw("X", "INSERT_OR_UPDATE", Some(&include_payload("a();")));
    first.sys_id = "first".into();
    let mut second = raw("X", "INSERT_OR_UPDATE", Some(&include_payload("b();")));
    second.sys_id = "second".into();

    let mut p = pipeline(
        vec![first, second],
        linter.clone(),
        tables(&[("sys_script_include", &["script"])]),
    );
    p.process("q").await.unwrap();

    assert_eq!(p.scans().count(), 1);
    let scan = p.scan("X").unwrap();
    assert_eq!(scan.update_count(), 2);
    // The first-seen record's values win.
    assert_eq!(scan.record().id, "first");
    assert_eq!(linter.calls(), 1);
}

#[tokio::test]
async fn delete_is_deleted_and_never_linted() {
    let linter = Arc::new(RecordingLinter::clean());
    let mut p = pipeline(
        vec![raw("X", "DELETE", None)],
        linter.clone(),
        tables(&[("sys_script_include", &["script"])]),
    );
    p.process("q").await.unwrap();

    assert_eq!(p.scan("X").unwrap().status(), ScanStatus::Deleted);
    assert_eq!(linter.calls(), 0);
}

#[tokio::test]
async fn findings_drive_warning_and_error_status() {
    let warn = FieldReport {
        warning_count: 2,
        error_count: 0,
        messages: Vec::new(),
    };
    let linter = Arc::new(RecordingLinter::with_report(warn));
    let mut p = pipeline(
        vec![raw("X", "INSERT_OR_UPDATE", Some(&include_payload("gs.log('x');")))],
        linter,
        tables(&[("sys_script_include", &["script"])]),
    );
    p.process("q").await.unwrap();
    let scan = p.scan("X").unwrap();
    assert_eq!(scan.status(), ScanStatus::Warning);
    assert_eq!(scan.warning_count(), 2);

    let err = FieldReport {
        warning_count: 0,
        error_count: 1,
        messages: Vec::new(),
    };
    let linter = Arc::new(RecordingLinter::with_report(err));
    let mut p = pipeline(
        vec![raw("X", "INSERT_OR_UPDATE", Some(&include_payload("eval(x);")))],
        linter,
        tables(&[("sys_script_include", &["script"])]),
    );
    p.process("q").await.unwrap();
    assert_eq!(p.scan("X").unwrap().status(), ScanStatus::Error);
}

#[tokio::test]
async fn silent_linter_leaves_scan_pending() {
    // A capability may return no results at all; nothing gets attached.
    let linter = Arc::new(RecordingLinter::silent());
    let mut p = pipeline(
        vec![raw("X", "INSERT_OR_UPDATE", Some(&include_payload("foo();")))],
        linter.clone(),
        tables(&[("sys_script_include", &["script"])]),
    );
    p.process("q").await.unwrap();
    assert_eq!(p.scan("X").unwrap().status(), ScanStatus::Scan);
    assert_eq!(linter.calls(), 1);
}

#[tokio::test]
async fn one_empty_field_does_not_mask_findings_in_another() {
    let warn = FieldReport {
        warning_count: 1,
        error_count: 0,
        messages: Vec::new(),
    };
    let linter = Arc::new(RecordingLinter::with_report(warn));
    let payload = "<u><sys_ui_policy>\
        <script_true></script_true>\
        <script_false>setWorkflow(false);</script_false>\
        </sys_ui_policy></u>";
    let mut p = pipeline(
        vec![raw("X", "INSERT_OR_UPDATE", Some(payload))],
        linter.clone(),
        tables(&[("sys_ui_policy", &["script_true", "script_false"])]),
    );
    p.process("q").await.unwrap();

    let scan = p.scan("X").unwrap();
    // The skip command from the empty field is superseded by the report.
    assert_eq!(scan.status(), ScanStatus::Warning);
    assert_eq!(scan.reports().len(), 1);
    assert!(scan.reports().contains_key("script_false"));
    assert_eq!(linter.calls(), 1);
}

#[tokio::test]
async fn failed_fetch_leaves_an_empty_retryable_pipeline() {
    let mut p = ScanPipeline::new(
        Arc::new(FailingLoader),
        Arc::new(RecordingLinter::clean()),
        tables(&[]),
    );
    assert!(p.fetch("q").await.is_err());
    assert_eq!(p.scans().count(), 0);
    // The pipeline stays usable; a lint over nothing is a no-op.
    p.lint().await.unwrap();
}

#[tokio::test]
async fn fetch_replaces_the_previous_generation() {
    let linter = Arc::new(RecordingLinter::clean());
    let mut p = pipeline(
        vec![raw("X", "INSERT_OR_UPDATE", Some(&include_payload("a();")))],
        linter,
        tables(&[("sys_script_include", &["script"])]),
    );
    p.process("q").await.unwrap();
    assert!(p.scan("X").unwrap().reports().contains_key("script"));

    // Re-fetching drops every prior scan and its reports.
    p.fetch("q").await.unwrap();
    let scan = p.scan("X").unwrap();
    assert!(scan.reports().is_empty());
    assert_eq!(scan.status(), ScanStatus::Scan);
}

#[tokio::test]
async fn processing_twice_yields_an_identical_report() {
    let records = vec![
        raw("X", "INSERT_OR_UPDATE", Some(&include_payload("foo();"))),
        raw("Y", "DELETE", None),
        raw("X", "INSERT_OR_UPDATE", Some(&include_payload("bar();"))),
    ];
    let linter = Arc::new(RecordingLinter::clean());
    let mut p = pipeline(
        records,
        linter,
        tables(&[("sys_script_include", &["script"])]),
    );

    p.process("q").await.unwrap();
    let mut first = serde_json::to_value(p.to_report()).unwrap();

    p.process("q").await.unwrap();
    let mut second = serde_json::to_value(p.to_report()).unwrap();

    // Only the time-of-run stamp may differ.
    first.as_object_mut().unwrap().remove("generated_at");
    second.as_object_mut().unwrap().remove("generated_at");
    assert_eq!(first, second);
}

#[tokio::test]
async fn malformed_payload_fails_the_fetch_atomically() {
    let mut p = pipeline(
        vec![
            raw("X", "INSERT_OR_UPDATE", Some(&include_payload("ok();"))),
            raw("Y", "INSERT_OR_UPDATE", Some("<u><t><a>x</b></t></u>")),
        ],
        Arc::new(RecordingLinter::clean()),
        tables(&[("sys_script_include", &["script"])]),
    );
    assert!(p.process("q").await.is_err());
    assert_eq!(p.scans().count(), 0);
}

#[tokio::test]
async fn lint_time_malformed_payload_rejects_but_keeps_sibling_reports() {
    // The second payload's target parses (extraction stops at the sys_id),
    // but its script field runs into a mismatched end tag during lint.
    let broken = "<u><sys_script_include><sys_id>bb</sys_id>\
        <script>var x;</wrong></sys_script_include></u>";
    let linter = Arc::new(RecordingLinter::clean());
    let mut p = pipeline(
        vec![
            raw("A", "INSERT_OR_UPDATE", Some(&include_payload("ok();"))),
            raw("B", "INSERT_OR_UPDATE", Some(broken)),
        ],
        linter.clone(),
        tables(&[("sys_script_include", &["script"])]),
    );

    p.fetch("q").await.unwrap();
    let err = p.lint().await.unwrap_err();
    assert!(err.to_string().contains("B"), "unexpected error: {err:#}");

    // The sibling linted before the failure keeps its report.
    assert_eq!(p.scan("A").unwrap().status(), ScanStatus::Ok);
    assert_eq!(p.scan("B").unwrap().status(), ScanStatus::Scan);
    assert_eq!(linter.calls(), 1);
}

#[tokio::test]
async fn report_carries_run_metadata_and_ordered_changes() {
    let linter = Arc::new(RecordingLinter::clean());
    let mut p = pipeline(
        vec![
            raw("B", "INSERT_OR_UPDATE", Some(&include_payload("b();"))),
            raw("A", "DELETE", None),
        ],
        linter,
        tables(&[("sys_script_include", &["script"])]),
    )
    .with_title("Release 7 scan")
    .with_resources(serde_json::json!({ "logo": "acme.png" }));

    p.process("update_set.name=Release 7").await.unwrap();
    let report = p.to_report();

    assert_eq!(report.domain, "https://dev00001.service-now.com");
    assert_eq!(report.query, "update_set.name=Release 7");
    assert_eq!(report.title, "Release 7 scan");
    assert_eq!(report.resources["logo"], "acme.png");

    // First-seen order, not alphabetical.
    let names: Vec<&str> = report.changes.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, ["B", "A"]);
    assert_eq!(report.changes[0].1.status, ScanStatus::Ok);
    assert_eq!(report.changes[1].1.status, ScanStatus::Deleted);
    assert_eq!(report.changes[1].1.updates, 1);
}
