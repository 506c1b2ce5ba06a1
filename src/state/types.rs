//! Persisted workspace state.
//!
//! Resource values are kept as raw JSON together with the schema version
//! they were written at, so they can be upgraded when the provider's schema
//! moves on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::BTreeMap;

use crate::diag::Diagnostics;
use crate::path::Path;
use crate::private::PrivateState;
use crate::value::json::to_json;
use crate::value::Value;

/// Current version of the state format.
pub const STATE_VERSION: &str = "1";

/// Most recent history entries kept.
const MAX_HISTORY: usize = 50;

/// The complete workspace state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkspaceState {
    /// State format version.
    pub version: String,
    /// Workspace name.
    pub workspace: String,
    /// Incremented on every write.
    pub serial: u64,
    /// Hash of the last applied configuration.
    #[serde(default)]
    pub config_hash: String,
    /// Managed resources by `type.name` address.
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceState>,
    /// When the state was last updated.
    pub last_updated: DateTime<Utc>,
    /// Recent operations.
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

/// State of a single managed resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceState {
    /// Resource type.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Resource name.
    pub name: String,
    /// Schema version the value was written at.
    pub schema_version: i64,
    /// The state object.
    pub value: Json,
    /// Private state blob, decoded as JSON.
    #[serde(default, skip_serializing_if = "Json::is_null")]
    pub private: Json,
    /// Hash of the configuration block last applied.
    #[serde(default)]
    pub config_hash: String,
    /// When the resource was first recorded.
    pub created_at: DateTime<Utc>,
    /// When the resource was last written.
    pub updated_at: DateTime<Utc>,
}

/// A single entry in the operation history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEntry {
    /// When the operation finished.
    pub timestamp: DateTime<Utc>,
    /// Type of operation.
    pub operation: Operation,
    /// State serial after the operation.
    pub serial: u64,
    /// Addresses affected.
    pub resources: Vec<String>,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Optional error message.
    #[serde(default)]
    pub error: Option<String>,
}

/// Types of state-changing operations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Plan applied.
    Apply,
    /// State refreshed from remote objects.
    Refresh,
    /// Everything destroyed.
    Destroy,
    /// Existing object adopted.
    Import,
    /// Resource forgotten without destroying it.
    Remove,
}

impl WorkspaceState {
    /// Creates a new empty state.
    #[must_use]
    pub fn new(workspace: &str) -> Self {
        Self {
            version: STATE_VERSION.to_string(),
            workspace: workspace.to_string(),
            serial: 0,
            config_hash: String::new(),
            resources: BTreeMap::new(),
            last_updated: Utc::now(),
            history: Vec::new(),
        }
    }

    /// Gets a resource by address.
    #[must_use]
    pub fn get(&self, address: &str) -> Option<&ResourceState> {
        self.resources.get(address)
    }

    /// Adds or replaces a resource, keeping its creation time.
    pub fn set(&mut self, mut resource: ResourceState) {
        let address = resource.address();
        if let Some(existing) = self.resources.get(&address) {
            resource.created_at = existing.created_at;
        }
        self.resources.insert(address, resource);
        self.last_updated = Utc::now();
    }

    /// Removes a resource by address.
    pub fn remove(&mut self, address: &str) -> Option<ResourceState> {
        let result = self.resources.remove(address);
        if result.is_some() {
            self.last_updated = Utc::now();
        }
        result
    }

    /// Returns all addresses.
    #[must_use]
    pub fn addresses(&self) -> Vec<&str> {
        self.resources.keys().map(String::as_str).collect()
    }

    /// Bumps the serial and records a history entry.
    pub fn record(&mut self, operation: Operation, resources: Vec<String>, error: Option<String>) {
        self.serial += 1;
        if self.history.len() >= MAX_HISTORY {
            self.history.remove(0);
        }
        self.history.push(HistoryEntry {
            timestamp: Utc::now(),
            operation,
            serial: self.serial,
            resources,
            success: error.is_none(),
            error,
        });
        self.last_updated = Utc::now();
    }
}

impl ResourceState {
    /// Creates a resource state entry.
    #[must_use]
    pub fn new(type_name: &str, name: &str, schema_version: i64, value: Json) -> Self {
        let now = Utc::now();
        Self {
            type_name: type_name.to_string(),
            name: name.to_string(),
            schema_version,
            value,
            private: Json::Null,
            config_hash: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Builds an entry from a decoded state value.
    ///
    /// # Errors
    ///
    /// Returns diagnostics if the value holds unknowns or the private state
    /// cannot be encoded.
    pub fn from_value(
        type_name: &str,
        name: &str,
        schema_version: i64,
        value: &Value,
        private: &PrivateState,
    ) -> Result<Self, Diagnostics> {
        let json = to_json(value, &Path::empty())?;
        let mut resource = Self::new(type_name, name, schema_version, json);
        resource.set_private(private)?;
        Ok(resource)
    }

    /// The `type.name` address.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}.{}", self.type_name, self.name)
    }

    /// Decodes the private state blob.
    ///
    /// # Errors
    ///
    /// Returns diagnostics if the stored blob is malformed.
    pub fn private_state(&self) -> Result<PrivateState, Diagnostics> {
        if self.private.is_null() {
            return Ok(PrivateState::default());
        }
        PrivateState::from_bytes(self.private.to_string().as_bytes())
    }

    /// Stores a private state blob.
    ///
    /// # Errors
    ///
    /// Returns diagnostics if the blob cannot be encoded.
    pub fn set_private(&mut self, private: &PrivateState) -> Result<(), Diagnostics> {
        let bytes = private.to_bytes()?;
        self.private = if bytes.is_empty() {
            Json::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Json::Null)
        };
        Ok(())
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let op = match self {
            Self::Apply => "apply",
            Self::Refresh => "refresh",
            Self::Destroy => "destroy",
            Self::Import => "import",
            Self::Remove => "remove",
        };
        write!(f, "{op}")
    }
}
