//! Profile configuration: instance coordinates and per-table lint policies.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub instance: InstanceConfig,
    #[serde(default)]
    pub report: ReportConfig,
    /// Table policies from the profile; overlaid on the built-in set by
    /// [`Config::table_policies`].
    #[serde(default)]
    pub tables: HashMap<String, TablePolicy>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InstanceConfig {
    pub url: String,
    pub username: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportConfig {
    #[serde(default = "default_title")]
    pub title: String,
    /// Renderer passthrough; the scanner never interprets this.
    #[serde(default)]
    pub resources: serde_json::Value,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            resources: serde_json::Value::Null,
        }
    }
}

fn default_title() -> String {
    "Update set scan".to_string()
}

/// Lint policy for one target table: which fields carry scripts, and the
/// fingerprints of shipped defaults that should not be linted.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct TablePolicy {
    #[serde(default)]
    pub fields: Vec<String>,
    /// Field name → fingerprint of the unedited default value.
    #[serde(default)]
    pub defaults: HashMap<String, String>,
}

/// Policies for the standard script-bearing tables. A profile's
/// `[tables.X]` entry replaces the built-in entry for `X` wholesale.
pub fn built_in_tables() -> HashMap<String, TablePolicy> {
    fn policy(fields: &[&str]) -> TablePolicy {
        TablePolicy {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            defaults: HashMap::new(),
        }
    }

    HashMap::from([
        ("sys_script".to_string(), policy(&["script"])),
        ("sys_script_include".to_string(), policy(&["script"])),
        ("sys_script_client".to_string(), policy(&["script"])),
        ("sys_script_fix".to_string(), policy(&["script"])),
        ("sys_ui_action".to_string(), policy(&["script"])),
        ("sys_ui_script".to_string(), policy(&["script"])),
        ("sys_ws_operation".to_string(), policy(&["operation_script"])),
        ("sysevent_script_action".to_string(), policy(&["script"])),
        (
            "sys_ui_policy".to_string(),
            policy(&["script_true", "script_false"]),
        ),
    ])
}

impl Config {
    /// Effective table policies: the built-in set overlaid with the
    /// profile's entries.
    pub fn table_policies(&self) -> HashMap<String, TablePolicy> {
        let mut tables = built_in_tables();
        for (name, policy) in &self.tables {
            tables.insert(name.clone(), policy.clone());
        }
        tables
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    let url = config.instance.url.trim();
    if url.is_empty() {
        bail!("instance.url must not be empty");
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        bail!("instance.url must be an http(s) URL, got '{}'", url);
    }
    if config.instance.username.trim().is_empty() {
        bail!("instance.username must not be empty");
    }
    if config.instance.timeout_secs == 0 {
        bail!("instance.timeout_secs must be > 0");
    }

    for (table, policy) in &config.tables {
        let mut seen = HashSet::new();
        for field in &policy.fields {
            if !seen.insert(field.as_str()) {
                bail!("tables.{} lists field '{}' more than once", table, field);
            }
        }
        for field in policy.defaults.keys() {
            if !policy.fields.iter().any(|f| f == field) {
                bail!(
                    "tables.{} has a default for '{}' which is not a configured field",
                    table,
                    field
                );
            }
        }
    }

    Ok(())
}
