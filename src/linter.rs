//! The lint capability and the built-in pattern linter.
//!
//! The pipeline only depends on the [`Linter`] trait. [`PatternLinter`]
//! supplies a small set of regex rules for the server-side JavaScript that
//! update sets carry; it always produces exactly one report per linted
//! text, with zero counts when the text is clean.

use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{FieldReport, LintMessage, Severity};

/// Capability that runs static analysis over one extracted field's text.
///
/// An empty vector means "nothing to report"; when results are present the
/// pipeline attaches the first one.
#[async_trait]
pub trait Linter: Send + Sync {
    async fn lint(&self, source: &str) -> Result<Vec<FieldReport>>;
}

struct Rule {
    id: &'static str,
    severity: Severity,
    pattern: &'static str,
    message: &'static str,
}

const RULES: &[Rule] = &[
    Rule {
        id: "sn.no-eval",
        severity: Severity::Error,
        pattern: r"\beval\s*\(",
        message: "eval() executes arbitrary code; build the logic explicitly instead.",
    },
    Rule {
        id: "sn.no-current-update",
        severity: Severity::Error,
        pattern: r"\bcurrent\.update\s*\(",
        message: "current.update() in a business rule recurses; let the engine save the record.",
    },
    Rule {
        id: "sn.no-hardcoded-sys-id",
        severity: Severity::Warning,
        pattern: r#"['"][0-9a-f]{32}['"]"#,
        message: "Hardcoded sys_id; look the record up by a stable key instead.",
    },
    Rule {
        id: "sn.no-debug-logging",
        severity: Severity::Warning,
        pattern: r"\bgs\.(log|print)\s*\(",
        message: "Remove gs.log/gs.print debugging before promoting the update set.",
    },
    Rule {
        id: "sn.no-setworkflow-false",
        severity: Severity::Warning,
        pattern: r"\bsetWorkflow\s*\(\s*false\s*\)",
        message: "setWorkflow(false) skips business rules and auditing.",
    },
];

static COMPILED: Lazy<Vec<Regex>> = Lazy::new(|| {
    RULES
        .iter()
        .map(|rule| Regex::new(rule.pattern).expect("built-in rule pattern compiles"))
        .collect()
});

/// Built-in [`Linter`] backed by the rule table above.
pub struct PatternLinter;

impl PatternLinter {
    pub fn built_in() -> Self {
        PatternLinter
    }
}

#[async_trait]
impl Linter for PatternLinter {
    async fn lint(&self, source: &str) -> Result<Vec<FieldReport>> {
        let mut messages = Vec::new();
        for (index, line) in source.lines().enumerate() {
            for (rule, regex) in RULES.iter().zip(COMPILED.iter()) {
                for found in regex.find_iter(line) {
                    messages.push(LintMessage {
                        line: index + 1,
                        column: found.start() + 1,
                        severity: rule.severity,
                        rule_id: rule.id.to_string(),
                        message: rule.message.to_string(),
                    });
                }
            }
        }

        let warning_count = messages
            .iter()
            .filter(|m| m.severity == Severity::Warning)
            .count() as u32;
        let error_count = messages
            .iter()
            .filter(|m| m.severity == Severity::Error)
            .count() as u32;

        Ok(vec![FieldReport {
            warning_count,
            error_count,
            messages,
        }])
    }
}
