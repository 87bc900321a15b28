//! Scan pipeline orchestration.
//!
//! Coordinates the full run: loader fetch → record construction and
//! per-name deduplication → per-table classification → field extraction,
//! default fingerprint matching, lint → report projection.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use indexmap::map::Entry;
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::config::TablePolicy;
use crate::fingerprint;
use crate::linter::Linter;
use crate::loader::ChangeLoader;
use crate::payload::{self, PayloadError};
use crate::record::ChangeRecord;
use crate::report::{ChangeScanJson, ReportData};
use crate::scan::{ChangeScan, ScanCommand, ScanStatus};

/// One scanning run over one query's result set.
///
/// Holds exactly one generation of scans at a time, keyed by record name;
/// each `fetch` replaces the whole set. All operations take `&mut self`,
/// so a second operation cannot be issued while one is in flight.
pub struct ScanPipeline {
    loader: Arc<dyn ChangeLoader>,
    linter: Arc<dyn Linter>,
    tables: HashMap<String, TablePolicy>,
    title: String,
    resources: serde_json::Value,
    query: Option<String>,
    scans: IndexMap<String, ChangeScan>,
}

impl ScanPipeline {
    pub fn new(
        loader: Arc<dyn ChangeLoader>,
        linter: Arc<dyn Linter>,
        tables: HashMap<String, TablePolicy>,
    ) -> Self {
        Self {
            loader,
            linter,
            tables,
            title: "Update set scan".to_string(),
            resources: serde_json::Value::Null,
            query: None,
            scans: IndexMap::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Renderer passthrough carried into the report verbatim.
    pub fn with_resources(mut self, resources: serde_json::Value) -> Self {
        self.resources = resources;
        self
    }

    /// Scans held from the last fetch, in first-seen order.
    pub fn scans(&self) -> impl Iterator<Item = &ChangeScan> {
        self.scans.values()
    }

    pub fn scan(&self, name: &str) -> Option<&ChangeScan> {
        self.scans.get(name)
    }

    /// Replace the held scan set with the result of one loader query.
    ///
    /// Records sharing a name collapse into one scan: the first-seen record
    /// keeps its field values, later duplicates only bump the update count.
    /// On failure the pipeline is left empty and retry-safe, never
    /// half-populated.
    pub async fn fetch(&mut self, query: &str) -> Result<()> {
        self.scans.clear();
        self.query = Some(query.to_string());

        let records = self
            .loader
            .fetch_changes(query)
            .await
            .context("fetching change records")?;
        debug!(count = records.len(), "building scans");

        let mut scans: IndexMap<String, ChangeScan> = IndexMap::with_capacity(records.len());
        for raw in records {
            let record = ChangeRecord::from_raw(raw)?;
            match scans.entry(record.name.clone()) {
                Entry::Occupied(mut entry) => entry.get_mut().increment_update_count(),
                Entry::Vacant(entry) => {
                    entry.insert(ChangeScan::new(record));
                }
            }
        }

        self.scans = scans;
        Ok(())
    }

    /// Classify and lint every scan still in the `Scan` state.
    ///
    /// Per scan: an unconfigured target table is `Ignored`, a configured
    /// table without fields is `Manual`. Per configured field: absent or
    /// empty text marks the scan `Skipped`, text matching the table's
    /// default fingerprint is skip-equivalent, and anything else is linted
    /// with the first result attached as the field's report. Fields are
    /// independent; one field's outcome never blocks its siblings.
    ///
    /// A payload that turns out to be ill-formed XML is record-fatal: the
    /// scan's siblings keep whatever reports they earned, and the call
    /// rejects once the pass is over.
    pub async fn lint(&mut self) -> Result<()> {
        let linter = Arc::clone(&self.linter);
        let tables = &self.tables;
        let mut malformed: Option<(String, PayloadError)> = None;

        for (name, scan) in self.scans.iter_mut() {
            if scan.status() != ScanStatus::Scan {
                continue;
            }

            let table = match scan.record().target_table.clone() {
                Some(table) => table,
                None => {
                    scan.set_command(ScanCommand::Ignored);
                    continue;
                }
            };
            let policy = match tables.get(&table) {
                Some(policy) => policy,
                None => {
                    scan.set_command(ScanCommand::Ignored);
                    continue;
                }
            };
            if policy.fields.is_empty() {
                scan.set_command(ScanCommand::Manual);
                continue;
            }

            let xml = scan.record().payload.clone().unwrap_or_default();
            for field in &policy.fields {
                let text = match payload::extract_field(&table, field, &xml) {
                    Ok(text) => text,
                    Err(source) => {
                        warn!(change = %name, "ill-formed payload, abandoning record");
                        if malformed.is_none() {
                            malformed = Some((name.clone(), source));
                        }
                        break;
                    }
                };

                match text {
                    None => scan.set_command(ScanCommand::Skipped),
                    Some(text) if text.is_empty() => scan.set_command(ScanCommand::Skipped),
                    Some(text) => {
                        if let Some(default) = policy.defaults.get(field) {
                            if fingerprint::matches(&text, default) {
                                scan.set_command(ScanCommand::Skipped);
                                continue;
                            }
                        }
                        let results = linter
                            .lint(&text)
                            .await
                            .with_context(|| format!("linting field `{}` of `{}`", field, name))?;
                        if let Some(report) = results.into_iter().next() {
                            scan.set_report(field.clone(), report);
                        }
                    }
                }
            }
        }

        if let Some((name, source)) = malformed {
            return Err(anyhow::Error::new(source)
                .context(format!("payload of change `{}` is not well-formed XML", name)));
        }
        Ok(())
    }

    /// `fetch` then `lint`, sequential, no interleaving.
    pub async fn process(&mut self, query: &str) -> Result<()> {
        self.fetch(query).await?;
        self.lint().await
    }

    /// Pure projection of current state; does not mutate.
    pub fn to_report(&self) -> ReportData {
        ReportData {
            domain: self.loader.instance().to_string(),
            query: self.query.clone().unwrap_or_default(),
            title: self.title.clone(),
            generated_at: Utc::now().to_rfc3339(),
            changes: self
                .scans
                .iter()
                .map(|(name, scan)| (name.clone(), ChangeScanJson::from(scan)))
                .collect(),
            resources: self.resources.clone(),
        }
    }
}
