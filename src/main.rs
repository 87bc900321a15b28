//! # snscan CLI
//!
//! Command-line front end for the update-set scanner.
//!
//! ## Usage
//!
//! ```bash
//! snscan --config ./snscan.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `snscan scan "<query>"` | Fetch, lint, and report matching changes |
//! | `snscan ping` | Verify instance connectivity and credentials |
//! | `snscan fingerprint <file>` | Print a default-value fingerprint |
//!
//! ## Examples
//!
//! ```bash
//! # Scan one update set and print the JSON report
//! SNSCAN_PASSWORD=... snscan scan "update_set.name=Release 7"
//!
//! # Write the report to a file instead
//! SNSCAN_PASSWORD=... snscan scan "update_set=03a9..." --output report.json
//!
//! # Fingerprint a shipped default for [tables.*.defaults]
//! snscan fingerprint defaults/script_include.js
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use snscan::config;
use snscan::fingerprint;
use snscan::linter::PatternLinter;
use snscan::loader::{ChangeLoader, HttpLoader};
use snscan::pipeline::ScanPipeline;
use snscan::report;
use snscan::scan::ScanStatus;

/// Environment variable the instance password is read from.
const PASSWORD_VAR: &str = "SNSCAN_PASSWORD";

/// snscan — code-quality scanner for ServiceNow update sets.
///
/// All commands accept a `--config` flag pointing to a TOML profile with
/// the instance coordinates and per-table lint policies.
#[derive(Parser)]
#[command(
    name = "snscan",
    about = "Code-quality scanner for ServiceNow update sets",
    version,
    long_about = "snscan fetches change records from a ServiceNow instance, extracts the \
    embedded script fields, lints them, and renders a per-change JSON report with a status \
    derived from the change action, table policy, and lint results."
)]
struct Cli {
    /// Path to the profile (TOML).
    #[arg(long, global = true, default_value = "./snscan.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, lint, and report the changes matching an encoded query.
    ///
    /// The query is passed to the instance unchanged, e.g.
    /// `update_set.name=Release 7` or `update_set=03a9c1...`.
    Scan {
        /// Encoded query for the change table.
        query: String,

        /// Write the JSON report here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Override the report title from the profile.
        #[arg(long)]
        title: Option<String>,
    },

    /// Verify instance connectivity and credentials.
    Ping,

    /// Print the fingerprint of a file's contents.
    ///
    /// Paste the output into a `[tables.*.defaults]` entry so unedited
    /// shipped values are skipped instead of linted.
    Fingerprint {
        /// File holding the default field value.
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Fingerprinting is offline; it needs no profile or credentials.
    if let Commands::Fingerprint { file } = &cli.command {
        let content = std::fs::read_to_string(file)
            .with_context(|| format!("reading {}", file.display()))?;
        println!("{}", fingerprint::hash(&content));
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;
    let password =
        std::env::var(PASSWORD_VAR).with_context(|| format!("{} is not set", PASSWORD_VAR))?;
    let loader = Arc::new(HttpLoader::new(&cfg.instance, password)?);

    match cli.command {
        Commands::Scan {
            query,
            output,
            title,
        } => {
            let linter = Arc::new(PatternLinter::built_in());
            let mut pipeline = ScanPipeline::new(loader, linter, cfg.table_policies())
                .with_title(title.unwrap_or_else(|| cfg.report.title.clone()))
                .with_resources(cfg.report.resources.clone());

            pipeline.process(&query).await?;

            let data = pipeline.to_report();
            report::write_json(&data, output.as_deref())?;
            print_summary(&pipeline);
        }
        Commands::Ping => {
            loader.ping().await?;
            println!("{} ok", loader.instance());
        }
        Commands::Fingerprint { .. } => unreachable!(),
    }

    Ok(())
}

fn print_summary(pipeline: &ScanPipeline) {
    let mut errors = 0u32;
    let mut warnings = 0u32;
    let mut clean = 0u32;
    let mut excluded = 0u32;
    let mut pending = 0u32;
    let mut total = 0u32;

    for scan in pipeline.scans() {
        total += 1;
        match scan.status() {
            ScanStatus::Error => errors += 1,
            ScanStatus::Warning => warnings += 1,
            ScanStatus::Ok => clean += 1,
            ScanStatus::Deleted
            | ScanStatus::Ignored
            | ScanStatus::Skipped
            | ScanStatus::Manual => excluded += 1,
            ScanStatus::Scan => pending += 1,
        }
    }

    eprintln!("scan complete");
    eprintln!("  changes: {}", total);
    eprintln!(
        "  errors: {}   warnings: {}   clean: {}   excluded: {}",
        errors, warnings, clean, excluded
    );
    if pending > 0 {
        eprintln!("  not processed: {}", pending);
    }
}
