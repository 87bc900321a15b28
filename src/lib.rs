//! # snscan
//!
//! Code-quality scanner for ServiceNow update sets.
//!
//! snscan fetches change records (update-set XML payloads) from a
//! ServiceNow instance, extracts the embedded script fields, runs a
//! static-analysis linter over them, aggregates results per changed
//! record, and renders a JSON report.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────────────────┐   ┌───────────┐
//! │ ChangeLoader │──▶│       ScanPipeline        │──▶│ ReportData │
//! │  (Table API) │   │ dedup → classify → lint   │   │   (JSON)  │
//! └──────────────┘   └────────────┬──────────────┘   └───────────┘
//!                                 │
//!                   ┌─────────────┴─────────────┐
//!                   ▼                           ▼
//!             ┌──────────┐               ┌────────────┐
//!             │ payload  │               │   Linter   │
//!             │ extract  │               │ (patterns) │
//!             └──────────┘               └────────────┘
//! ```
//!
//! Every change record collapses into one [`scan::ChangeScan`] per logical
//! name; its status is derived from the record action, the pipeline's
//! classification commands, and the attached lint reports.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML profile and per-table lint policies |
//! | [`models`] | Wire and lint-report data types |
//! | [`record`] | Immutable change-record entity |
//! | [`scan`] | Per-name aggregation and the status state machine |
//! | [`payload`] | Structural extraction from update XML |
//! | [`fingerprint`] | Normalized digests for default-value detection |
//! | [`loader`] | Change-loader capability and the Table API client |
//! | [`linter`] | Lint capability and the built-in pattern rules |
//! | [`pipeline`] | Fetch → dedup → lint orchestration |
//! | [`report`] | Report projection and JSON writer |

pub mod config;
pub mod fingerprint;
pub mod linter;
pub mod loader;
pub mod models;
pub mod payload;
pub mod pipeline;
pub mod record;
pub mod report;
pub mod scan;
