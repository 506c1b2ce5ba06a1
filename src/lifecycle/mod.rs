//! Resource and data source lifecycle.
//!
//! Providers implement [`Resource`] (and optionally the capability traits)
//! per resource type. The engine drives the calls through [`orchestrator`],
//! which seeds responses, checks results and post-processes new state.

pub mod import;
pub mod orchestrator;
#[cfg(test)]
pub(crate) mod testing;
pub mod upgrade;
pub mod write_only;

use async_trait::async_trait;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::diag::Diagnostics;
use crate::path::Path;
use crate::private::ProviderData;
use crate::schema::Schema;
use crate::value::{Type, Value};

pub use upgrade::StateUpgrader;

/// Opaque data produced by provider configuration and handed to every
/// resource and data source.
pub type ProviderHandle = Arc<dyn Any + Send + Sync>;

/// Input to [`Resource::create`].
#[derive(Debug, Clone)]
pub struct CreateRequest {
    /// Configuration.
    pub config: Value,
    /// Planned state.
    pub planned_state: Value,
    /// Private state produced during planning.
    pub private: ProviderData,
}

/// Input to [`Resource::read`].
#[derive(Debug, Clone)]
pub struct ReadRequest {
    /// Current state.
    pub state: Value,
    /// Private state.
    pub private: ProviderData,
}

/// Input to [`Resource::update`].
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    /// Configuration.
    pub config: Value,
    /// Planned state.
    pub planned_state: Value,
    /// Prior state.
    pub prior_state: Value,
    /// Private state produced during planning.
    pub private: ProviderData,
}

/// Input to [`Resource::delete`].
#[derive(Debug, Clone)]
pub struct DeleteRequest {
    /// Prior state.
    pub prior_state: Value,
    /// Private state.
    pub private: ProviderData,
}

/// Output of create, read and update.
///
/// Create is seeded with null state, read with the current state and update
/// with the planned state.
#[derive(Debug, Clone)]
pub struct StateResponse {
    /// New state. Null after read means the remote object is gone.
    pub state: Value,
    /// Private state.
    pub private: ProviderData,
    /// Problems found.
    pub diagnostics: Diagnostics,
}

/// Output of delete.
#[derive(Debug, Clone, Default)]
pub struct DeleteResponse {
    /// Problems found.
    pub diagnostics: Diagnostics,
}

/// A managed resource type.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Resource type name, e.g. `local_file`.
    fn type_name(&self) -> String;

    /// Resource schema.
    fn schema(&self) -> Schema;

    /// Creates the remote object.
    async fn create(&self, req: CreateRequest, resp: &mut StateResponse);

    /// Refreshes state from the remote object.
    async fn read(&self, req: ReadRequest, resp: &mut StateResponse);

    /// Updates the remote object in place.
    async fn update(&self, req: UpdateRequest, resp: &mut StateResponse);

    /// Deletes the remote object.
    async fn delete(&self, req: DeleteRequest, resp: &mut DeleteResponse);

    /// Receives provider-level configuration.
    fn as_configure(&mut self) -> Option<&mut dyn Configure> {
        None
    }

    /// Extra configuration checks beyond the schema.
    fn as_validate_config(&self) -> Option<&dyn ValidateConfig> {
        None
    }

    /// Whole-resource plan adjustments after schema-based modification.
    fn as_modify_plan(&self) -> Option<&dyn ModifyPlan> {
        None
    }

    /// Migrations from older schema versions.
    fn as_upgrade_state(&self) -> Option<&dyn UpgradeState> {
        None
    }

    /// Adoption of existing remote objects.
    fn as_import_state(&self) -> Option<&dyn ImportState> {
        None
    }
}

/// A data source type.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Data source type name.
    fn type_name(&self) -> String;

    /// Data source schema.
    fn schema(&self) -> Schema;

    /// Reads the data. The response is seeded with the configuration.
    async fn read(&self, config: Value, resp: &mut StateResponse);

    /// Receives provider-level configuration.
    fn as_configure(&mut self) -> Option<&mut dyn Configure> {
        None
    }
}

/// Provider configuration hook.
pub trait Configure {
    /// Stores whatever the resource needs from `provider_data`.
    fn configure(&mut self, provider_data: Option<&ProviderHandle>, diags: &mut Diagnostics);
}

/// Resource-level configuration validation.
pub trait ValidateConfig: Send + Sync {
    /// Appends problems with `config` to `diags`.
    fn validate_config(&self, config: &Value, diags: &mut Diagnostics);
}

/// Input to [`ModifyPlan::modify_plan`].
#[derive(Debug, Clone, Copy)]
pub struct ResourcePlanRequest<'a> {
    /// Configuration. Null on destroy.
    pub config: &'a Value,
    /// Prior state. Null on create.
    pub prior_state: &'a Value,
    /// Plan after schema-based modification.
    pub planned_state: &'a Value,
}

/// Output of [`ModifyPlan::modify_plan`].
#[derive(Debug, Clone)]
pub struct ResourcePlanResponse {
    /// Planned state, seeded with the request plan.
    pub planned_state: Value,
    /// Extra paths forcing replacement.
    pub requires_replace: Vec<Path>,
    /// Private state, seeded with the current private state.
    pub private: ProviderData,
    /// Problems found.
    pub diagnostics: Diagnostics,
}

/// Resource-level plan modification.
pub trait ModifyPlan: Send + Sync {
    /// Adjusts the whole planned state.
    fn modify_plan(&self, req: &ResourcePlanRequest<'_>, resp: &mut ResourcePlanResponse);
}

/// State migrations, keyed by the version they upgrade from.
pub trait UpgradeState: Send + Sync {
    /// One upgrader per prior version.
    fn state_upgraders(&self) -> BTreeMap<i64, StateUpgrader>;
}

/// Output of [`ImportState::import_state`].
#[derive(Debug, Clone)]
pub struct ImportResponse {
    /// Imported state. Seeded with an object whose attributes are all null.
    pub state: Value,
    /// Private state.
    pub private: ProviderData,
    /// Problems found.
    pub diagnostics: Diagnostics,
}

/// Import of an existing remote object by identifier.
#[async_trait]
pub trait ImportState: Send + Sync {
    /// Fills in enough state for a subsequent read to succeed.
    async fn import_state(&self, id: &str, resp: &mut ImportResponse);
}

/// Calls the configure hook, if the resource has one.
pub fn configure_resource(
    resource: &mut dyn Resource,
    provider_data: Option<&ProviderHandle>,
) -> Diagnostics {
    let mut diags = Diagnostics::new();
    if let Some(configurable) = resource.as_configure() {
        configurable.configure(provider_data, &mut diags);
    }
    diags
}

/// Calls the configure hook, if the data source has one.
pub fn configure_data_source(
    data_source: &mut dyn DataSource,
    provider_data: Option<&ProviderHandle>,
) -> Diagnostics {
    let mut diags = Diagnostics::new();
    if let Some(configurable) = data_source.as_configure() {
        configurable.configure(provider_data, &mut diags);
    }
    diags
}

/// An object of the schema's type whose attributes are all null.
#[must_use]
pub fn empty_object(schema: &Schema) -> Value {
    let ty = schema.value_type();
    let Some(types) = ty.attribute_types() else {
        return Value::null(ty);
    };
    let attrs = types
        .iter()
        .map(|(name, attr_ty): (&String, &Type)| (name.clone(), Value::null(attr_ty.clone())))
        .collect();
    Value::object(types, attrs).unwrap_or_else(|_| Value::null(ty))
}
