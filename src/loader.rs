//! The change-loader capability: how raw records reach the pipeline.
//!
//! The pipeline only depends on the [`ChangeLoader`] trait; [`HttpLoader`]
//! is the production implementation over the ServiceNow REST Table API.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::InstanceConfig;
use crate::models::RawChange;

/// Table API path for update-set change entries.
pub const CHANGE_TABLE_PATH: &str = "/api/now/table/sys_update_xml";

/// Fields requested from the instance, in wire naming.
pub const CHANGE_FIELDS: &str = "sys_id,name,action,sys_created_by,sys_created_on,\
sys_updated_by,sys_updated_on,type,target_name,update_set,payload";

/// Cheap authenticated endpoint used for connectivity checks.
const PING_PATH: &str = "/api/now/table/sys_properties";

/// Capability that fetches change records for an encoded query.
#[async_trait]
pub trait ChangeLoader: Send + Sync {
    /// Identity of the backing instance, used as report metadata.
    fn instance(&self) -> &str;

    /// Fetch all change records matching the query. Transport and decode
    /// failures are errors; an empty result set is not.
    async fn fetch_changes(&self, query: &str) -> Result<Vec<RawChange>>;

    /// Verify connectivity and credentials without fetching changes.
    async fn ping(&self) -> Result<()>;
}

/// JSON envelope the Table API wraps results in.
#[derive(Debug, Deserialize)]
struct TableResponse {
    #[serde(default)]
    result: Vec<RawChange>,
}

/// [`ChangeLoader`] over the ServiceNow REST Table API with basic auth.
pub struct HttpLoader {
    base: String,
    username: String,
    password: String,
    client: reqwest::Client,
}

impl HttpLoader {
    pub fn new(config: &InstanceConfig, password: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            base: config.url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: password.into(),
            client,
        })
    }

    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .query(query)
            .basic_auth(&self.username, Some(&self.password))
            .header("Accept", "application/json")
            .send()
            .await
            .with_context(|| format!("requesting {}", url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("instance returned {}: {}", status, body);
        }
        Ok(response)
    }
}

#[async_trait]
impl ChangeLoader for HttpLoader {
    fn instance(&self) -> &str {
        &self.base
    }

    async fn fetch_changes(&self, query: &str) -> Result<Vec<RawChange>> {
        let url = format!("{}{}", self.base, CHANGE_TABLE_PATH);
        let response = self
            .get(
                &url,
                &[("sysparm_query", query), ("sysparm_fields", CHANGE_FIELDS)],
            )
            .await?;

        let envelope: TableResponse = response
            .json()
            .await
            .context("decoding change records from instance response")?;
        debug!(count = envelope.result.len(), query, "fetched change records");
        Ok(envelope.result)
    }

    async fn ping(&self) -> Result<()> {
        let url = format!("{}{}", self.base, PING_PATH);
        self.get(&url, &[("sysparm_limit", "1")]).await?;
        Ok(())
    }
}
