//! The immutable change-record entity.

use serde::Serialize;
use thiserror::Error;

use crate::models::RawChange;
use crate::payload::{self, PayloadError};

/// What a change entry does to its target record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChangeAction {
    #[serde(rename = "INSERT_OR_UPDATE")]
    InsertOrUpdate,
    #[serde(rename = "DELETE")]
    Delete,
}

impl ChangeAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INSERT_OR_UPDATE" => Some(ChangeAction::InsertOrUpdate),
            "DELETE" => Some(ChangeAction::Delete),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChangeAction::InsertOrUpdate => "INSERT_OR_UPDATE",
            ChangeAction::Delete => "DELETE",
        }
    }
}

/// Construction-time validation failure: the raw row cannot be turned into
/// a usable record.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("change record is missing required field `{0}`")]
    MissingField(&'static str),
    #[error("change {id} has unrecognized action `{action}`")]
    UnknownAction { id: String, action: String },
    #[error("change {id}: {source}")]
    MalformedPayload {
        id: String,
        #[source]
        source: PayloadError,
    },
}

/// One fetched change entry, immutable once constructed.
///
/// `target_table`/`target_id` are derived from the payload at construction
/// time; a payload that does not expose them yields `None`, never an error.
/// The payload is present iff the action is `InsertOrUpdate`; a payload
/// carried by a DELETE is dropped.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeRecord {
    pub id: String,
    /// Logical grouping key: repeated edits to the same artifact within the
    /// queried scope share a name.
    pub name: String,
    pub action: ChangeAction,
    pub created_by: String,
    pub created_on: String,
    pub updated_by: String,
    pub updated_on: String,
    /// Human label of the change category.
    pub kind: String,
    /// Display name of the affected artifact.
    pub target_name: String,
    /// Identifier of the parent batch.
    pub update_set: String,
    pub payload: Option<String>,
    pub target_table: Option<String>,
    pub target_id: Option<String>,
}

impl ChangeRecord {
    /// Validate and classify one raw row, failing fast on missing identity
    /// fields or an unrecognized action.
    pub fn from_raw(raw: RawChange) -> Result<Self, RecordError> {
        if raw.sys_id.trim().is_empty() {
            return Err(RecordError::MissingField("sys_id"));
        }
        if raw.name.trim().is_empty() {
            return Err(RecordError::MissingField("name"));
        }
        if raw.action.trim().is_empty() {
            return Err(RecordError::MissingField("action"));
        }
        let action =
            ChangeAction::parse(&raw.action).ok_or_else(|| RecordError::UnknownAction {
                id: raw.sys_id.clone(),
                action: raw.action.clone(),
            })?;

        let payload = match action {
            ChangeAction::InsertOrUpdate => raw.payload.filter(|p| !p.trim().is_empty()),
            ChangeAction::Delete => None,
        };

        let target = match &payload {
            Some(xml) => payload::extract_target(xml)
                .map_err(|source| RecordError::MalformedPayload {
                    id: raw.sys_id.clone(),
                    source,
                })?,
            None => Default::default(),
        };

        Ok(ChangeRecord {
            id: raw.sys_id,
            name: raw.name,
            action,
            created_by: raw.sys_created_by,
            created_on: raw.sys_created_on,
            updated_by: raw.sys_updated_by,
            updated_on: raw.sys_updated_on,
            kind: raw.kind,
            target_name: raw.target_name,
            update_set: raw.update_set,
            payload,
            target_table: target.table,
            target_id: target.sys_id,
        })
    }
}
