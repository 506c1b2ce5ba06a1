//! Workspace configuration types.
//!
//! These structs map to `reconcile.yaml`. Resource and provider bodies are
//! kept as raw JSON; they are decoded against the provider's schemas later.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

/// The root of `reconcile.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkspaceConfig {
    /// Workspace name.
    pub workspace: String,
    /// Where state is kept.
    #[serde(default)]
    pub state: StateConfig,
    /// Provider configuration body.
    #[serde(default)]
    pub provider: Map<String, Json>,
    /// Managed resources.
    #[serde(default)]
    pub resources: Vec<ResourceConfig>,
    /// Data sources.
    #[serde(default)]
    pub data: Vec<ResourceConfig>,
}

/// State location.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateConfig {
    /// State file path, relative to the workspace file.
    #[serde(default)]
    pub path: Option<String>,
}

/// One resource or data source block.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceConfig {
    /// Type name, e.g. `local_file`.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Name, unique per type.
    pub name: String,
    /// Configuration body.
    #[serde(default)]
    pub config: Map<String, Json>,
}

impl ResourceConfig {
    /// The `type.name` address.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}.{}", self.type_name, self.name)
    }

    /// The configuration body as a JSON object.
    #[must_use]
    pub fn body(&self) -> Json {
        Json::Object(self.config.clone())
    }
}

impl WorkspaceConfig {
    /// Looks up a resource by address.
    #[must_use]
    pub fn resource(&self, address: &str) -> Option<&ResourceConfig> {
        self.resources.iter().find(|r| r.address() == address)
    }

    /// The provider configuration body as a JSON object.
    #[must_use]
    pub fn provider_body(&self) -> Json {
        Json::Object(self.provider.clone())
    }
}

/// Splits a `type.name` address.
#[must_use]
pub fn split_address(address: &str) -> Option<(&str, &str)> {
    let (type_name, name) = address.split_once('.')?;
    if type_name.is_empty() || name.is_empty() || name.contains('.') {
        return None;
    }
    Some((type_name, name))
}
