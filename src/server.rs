//! Provider server.
//!
//! [`ProviderServer`] owns one provider and exposes the calls a client makes
//! against it. Type tables and schemas are built lazily and cached; each call
//! instantiates a fresh resource and hands it the configured provider data.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{json, Value as Json};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::cache::MemoCache;
use crate::diag::{Diagnostic, DiagnosticClass, Diagnostics};
use crate::lifecycle::import::import_resource;
use crate::lifecycle::orchestrator::{self, ApplyRequest, LifecycleResponse};
use crate::lifecycle::upgrade::upgrade_state;
use crate::lifecycle::{
    configure_data_source, configure_resource, DataSource, ProviderHandle, ReadRequest, Resource,
    ResourcePlanRequest, ResourcePlanResponse,
};
use crate::path::{normalize_paths, Path};
use crate::plan::{enforce_destroy, modify_plan, PlanRequest};
use crate::private::PrivateState;
use crate::schema::check::check_schema;
use crate::schema::Schema;
use crate::validate::{validate_config, ClientCapabilities};
use crate::value::Value;

/// Builds a fresh resource instance.
pub type ResourceFactory = Arc<dyn Fn() -> Box<dyn Resource> + Send + Sync>;

/// Builds a fresh data source instance.
pub type DataSourceFactory = Arc<dyn Fn() -> Box<dyn DataSource> + Send + Sync>;

/// Engine-owned private key recording the schema version state was upgraded from.
pub const UPGRADED_FROM_KEY: &str = ".upgraded_from";

/// A provider: its own configuration schema plus the types it serves.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider name, used as the type name prefix.
    fn type_name(&self) -> String;

    /// Schema of the provider configuration.
    fn schema(&self) -> Schema;

    /// Configures the provider. The returned handle is passed to every
    /// resource and data source.
    async fn configure(&self, config: &Value, diags: &mut Diagnostics) -> Option<ProviderHandle>;

    /// Resource factories.
    fn resources(&self) -> Vec<ResourceFactory>;

    /// Data source factories.
    fn data_sources(&self) -> Vec<DataSourceFactory>;
}

/// Output of [`ProviderServer::get_provider_schema`].
#[derive(Debug, Clone, Default)]
pub struct ProviderSchemaResponse {
    /// Provider configuration schema.
    pub provider: Option<Arc<Schema>>,
    /// Resource schemas by type name.
    pub resource_schemas: BTreeMap<String, Arc<Schema>>,
    /// Data source schemas by type name.
    pub data_source_schemas: BTreeMap<String, Arc<Schema>>,
    /// Problems found.
    pub diagnostics: Diagnostics,
}

/// Input to [`ProviderServer::plan_resource_change`].
#[derive(Debug, Clone)]
pub struct PlanResourceChangeRequest {
    /// Resource type.
    pub type_name: String,
    /// Configuration. Null on destroy.
    pub config: Value,
    /// Prior state. Null on create.
    pub prior_state: Value,
    /// Proposed new state. Null on destroy.
    pub proposed_new_state: Value,
    /// Private state stored with the prior state.
    pub prior_private: PrivateState,
}

/// Output of [`ProviderServer::plan_resource_change`].
#[derive(Debug, Clone)]
pub struct PlanResourceChangeResponse {
    /// Planned state.
    pub planned_state: Value,
    /// Paths forcing replacement, deduplicated and sorted.
    pub requires_replace: Vec<Path>,
    /// Private state to hand to apply.
    pub planned_private: PrivateState,
    /// Problems found.
    pub diagnostics: Diagnostics,
}

/// Input to [`ProviderServer::apply_resource_change`].
#[derive(Debug, Clone)]
pub struct ApplyResourceChangeRequest {
    /// Resource type.
    pub type_name: String,
    /// Configuration. Null on destroy.
    pub config: Value,
    /// Prior state. Null on create.
    pub prior_state: Value,
    /// Planned state. Null on destroy.
    pub planned_state: Value,
    /// Private state from planning.
    pub planned_private: PrivateState,
}

/// Output of [`ProviderServer::upgrade_resource_state`].
#[derive(Debug, Clone)]
pub struct UpgradeResourceStateResponse {
    /// State decoded against the current schema.
    pub upgraded_state: Value,
    /// Private state, with the upgrade recorded in the engine namespace.
    pub private: PrivateState,
    /// Problems found.
    pub diagnostics: Diagnostics,
}

/// Serves one provider.
pub struct ProviderServer {
    provider: Arc<dyn Provider>,
    capabilities: ClientCapabilities,
    provider_schema: MemoCache<(), Schema>,
    resource_types: MemoCache<(), BTreeMap<String, ResourceFactory>>,
    data_source_types: MemoCache<(), BTreeMap<String, DataSourceFactory>>,
    resource_schemas: MemoCache<String, Schema>,
    data_source_schemas: MemoCache<String, Schema>,
    provider_data: RwLock<Option<ProviderHandle>>,
}

impl std::fmt::Debug for ProviderServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderServer")
            .field("provider", &self.provider.type_name())
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

fn type_not_found(kind: &str, type_name: &str) -> Diagnostics {
    Diagnostic::error(
        DiagnosticClass::Provider,
        format!("{kind} Type Not Found"),
        format!("No {} type named {type_name:?} was found in the provider.", kind.to_lowercase()),
    )
    .into()
}

fn build_table<T>(
    kind: &str,
    entries: Vec<(String, T)>,
) -> (Option<BTreeMap<String, T>>, Diagnostics) {
    let mut table = BTreeMap::new();
    let mut diags = Diagnostics::new();
    for (name, entry) in entries {
        if name.is_empty() {
            diags.push(Diagnostic::error(
                DiagnosticClass::SchemaDefinition,
                format!("{kind} Type Name Missing"),
                format!("A {} was defined without a type name.", kind.to_lowercase()),
            ));
            continue;
        }
        if table.insert(name.clone(), entry).is_some() {
            diags.push(Diagnostic::error(
                DiagnosticClass::SchemaDefinition,
                format!("Duplicate {kind} Type Defined"),
                format!("The {name} {} type name was returned for multiple {}s.", kind.to_lowercase(), kind.to_lowercase()),
            ));
        }
    }
    if diags.has_error() {
        (None, diags)
    } else {
        (Some(table), diags)
    }
}

fn checked_schema(schema: Schema) -> (Option<Schema>, Diagnostics) {
    let diags = check_schema(&schema);
    if diags.has_error() {
        (None, diags)
    } else {
        (Some(schema), diags)
    }
}

impl ProviderServer {
    /// Serves `provider` to a client with full capabilities.
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self::with_capabilities(provider, ClientCapabilities::all())
    }

    /// Serves `provider` to a client with the given capabilities.
    pub fn with_capabilities(provider: Arc<dyn Provider>, capabilities: ClientCapabilities) -> Self {
        Self {
            provider,
            capabilities,
            provider_schema: MemoCache::new(),
            resource_types: MemoCache::new(),
            data_source_types: MemoCache::new(),
            resource_schemas: MemoCache::new(),
            data_source_schemas: MemoCache::new(),
            provider_data: RwLock::new(None),
        }
    }

    /// Name of the served provider.
    pub fn provider_name(&self) -> String {
        self.provider.type_name()
    }

    fn resource_table(&self) -> Result<Arc<BTreeMap<String, ResourceFactory>>, Diagnostics> {
        let (table, diags) = self.resource_types.get_or_init(&(), || {
            let entries = self
                .provider
                .resources()
                .into_iter()
                .map(|factory| (factory().type_name(), factory))
                .collect();
            build_table("Resource", entries)
        });
        table.ok_or(diags)
    }

    fn data_source_table(&self) -> Result<Arc<BTreeMap<String, DataSourceFactory>>, Diagnostics> {
        let (table, diags) = self.data_source_types.get_or_init(&(), || {
            let entries = self
                .provider
                .data_sources()
                .into_iter()
                .map(|factory| (factory().type_name(), factory))
                .collect();
            build_table("Data Source", entries)
        });
        table.ok_or(diags)
    }

    /// Resource type names served.
    ///
    /// # Errors
    ///
    /// Returns the cached diagnostics if the type table could not be built.
    pub fn resource_types(&self) -> Result<Vec<String>, Diagnostics> {
        Ok(self.resource_table()?.keys().cloned().collect())
    }

    /// Data source type names served.
    ///
    /// # Errors
    ///
    /// Returns the cached diagnostics if the type table could not be built.
    pub fn data_source_types(&self) -> Result<Vec<String>, Diagnostics> {
        Ok(self.data_source_table()?.keys().cloned().collect())
    }

    /// The provider configuration schema.
    ///
    /// # Errors
    ///
    /// Returns diagnostics if the schema fails its self-check.
    pub fn provider_schema(&self) -> Result<Arc<Schema>, Diagnostics> {
        let (schema, diags) = self
            .provider_schema
            .get_or_init(&(), || checked_schema(self.provider.schema()));
        schema.ok_or(diags)
    }

    /// Schema of resource type `type_name`, built and checked on first use.
    ///
    /// # Errors
    ///
    /// Returns diagnostics if the type is unknown or its schema is invalid.
    pub fn resource_schema(&self, type_name: &str) -> Result<Arc<Schema>, Diagnostics> {
        let table = self.resource_table()?;
        let factory = table
            .get(type_name)
            .ok_or_else(|| type_not_found("Resource", type_name))?;
        let (schema, diags) = self
            .resource_schemas
            .get_or_init(&type_name.to_string(), || checked_schema(factory().schema()));
        schema.ok_or(diags)
    }

    /// Schema of data source type `type_name`.
    ///
    /// # Errors
    ///
    /// Returns diagnostics if the type is unknown or its schema is invalid.
    pub fn data_source_schema(&self, type_name: &str) -> Result<Arc<Schema>, Diagnostics> {
        let table = self.data_source_table()?;
        let factory = table
            .get(type_name)
            .ok_or_else(|| type_not_found("Data Source", type_name))?;
        let (schema, diags) = self
            .data_source_schemas
            .get_or_init(&type_name.to_string(), || checked_schema(factory().schema()));
        schema.ok_or(diags)
    }

    fn new_resource(&self, type_name: &str) -> Result<(Box<dyn Resource>, Arc<Schema>), Diagnostics> {
        let schema = self.resource_schema(type_name)?;
        let table = self.resource_table()?;
        let factory = table
            .get(type_name)
            .ok_or_else(|| type_not_found("Resource", type_name))?;
        let mut resource = factory();
        let provider_data = self.provider_data.read().clone();
        let diags = configure_resource(resource.as_mut(), provider_data.as_ref());
        if diags.has_error() {
            return Err(diags);
        }
        Ok((resource, schema))
    }

    fn new_data_source(
        &self,
        type_name: &str,
    ) -> Result<(Box<dyn DataSource>, Arc<Schema>), Diagnostics> {
        let schema = self.data_source_schema(type_name)?;
        let table = self.data_source_table()?;
        let factory = table
            .get(type_name)
            .ok_or_else(|| type_not_found("Data Source", type_name))?;
        let mut data_source = factory();
        let provider_data = self.provider_data.read().clone();
        let diags = configure_data_source(data_source.as_mut(), provider_data.as_ref());
        if diags.has_error() {
            return Err(diags);
        }
        Ok((data_source, schema))
    }

    /// Every schema the provider serves.
    pub fn get_provider_schema(&self) -> ProviderSchemaResponse {
        let mut resp = ProviderSchemaResponse::default();
        match self.provider_schema() {
            Ok(schema) => resp.provider = Some(schema),
            Err(d) => resp.diagnostics.append(d),
        }

        match self.resource_types() {
            Ok(types) => {
                for type_name in types {
                    match self.resource_schema(&type_name) {
                        Ok(schema) => {
                            resp.resource_schemas.insert(type_name, schema);
                        }
                        Err(d) => resp.diagnostics.append(d),
                    }
                }
            }
            Err(d) => resp.diagnostics.append(d),
        }

        match self.data_source_types() {
            Ok(types) => {
                for type_name in types {
                    match self.data_source_schema(&type_name) {
                        Ok(schema) => {
                            resp.data_source_schemas.insert(type_name, schema);
                        }
                        Err(d) => resp.diagnostics.append(d),
                    }
                }
            }
            Err(d) => resp.diagnostics.append(d),
        }
        resp
    }

    /// Validates and applies the provider configuration.
    pub async fn configure_provider(&self, config: &Value) -> Diagnostics {
        let schema = match self.provider_schema() {
            Ok(schema) => schema,
            Err(d) => return d,
        };
        let mut diags = validate_config(&schema, config, self.capabilities);
        if diags.has_error() {
            return diags;
        }

        info!(provider = %self.provider.type_name(), "Configuring provider");
        let data = self.provider.configure(config, &mut diags).await;
        if !diags.has_error() {
            *self.provider_data.write() = data;
        }
        diags
    }

    /// Validates a resource configuration.
    pub fn validate_resource_config(&self, type_name: &str, config: &Value) -> Diagnostics {
        let (resource, schema) = match self.new_resource(type_name) {
            Ok(pair) => pair,
            Err(d) => return d,
        };
        let mut diags = validate_config(&schema, config, self.capabilities);
        if let Some(validator) = resource.as_validate_config() {
            debug!(resource_type = type_name, "Calling provider defined ValidateConfig");
            validator.validate_config(config, &mut diags);
        }
        diags
    }

    /// Validates a data source configuration.
    pub fn validate_data_source_config(&self, type_name: &str, config: &Value) -> Diagnostics {
        match self.data_source_schema(type_name) {
            Ok(schema) => validate_config(&schema, config, self.capabilities),
            Err(d) => d,
        }
    }

    /// Plans a change: schema-driven modification, then resource-level
    /// modification, then the destroy check.
    pub fn plan_resource_change(&self, req: PlanResourceChangeRequest) -> PlanResourceChangeResponse {
        let mut resp = PlanResourceChangeResponse {
            planned_state: req.proposed_new_state.clone(),
            requires_replace: Vec::new(),
            planned_private: req.prior_private.clone(),
            diagnostics: Diagnostics::new(),
        };

        let (resource, schema) = match self.new_resource(&req.type_name) {
            Ok(pair) => pair,
            Err(d) => {
                resp.diagnostics = d;
                return resp;
            }
        };

        if req.prior_state.is_null() && req.proposed_new_state.is_null() {
            return resp;
        }

        let mut plan_req = PlanRequest {
            schema: &schema,
            config: &req.config,
            prior_state: &req.prior_state,
            proposed_new_state: &req.proposed_new_state,
            private: &req.prior_private.provider,
            mark_computed_unknown: false,
        };
        // A resource whose proposed state equals its prior state keeps its
        // computed values, so an unchanged resource plans as a no-op.
        plan_req.mark_computed_unknown = plan_req.proposes_changes();
        let planned = modify_plan(plan_req);
        resp.diagnostics.append(planned.diagnostics);
        resp.planned_state = planned.planned_state;
        resp.requires_replace = planned.requires_replace;
        resp.planned_private = req.prior_private.clone().with_provider(planned.private);
        if resp.diagnostics.has_error() {
            return resp;
        }

        if let Some(modifier) = resource.as_modify_plan() {
            let mut modified = ResourcePlanResponse {
                planned_state: resp.planned_state.clone(),
                requires_replace: Vec::new(),
                private: resp.planned_private.provider.clone(),
                diagnostics: Diagnostics::new(),
            };
            debug!(resource_type = %req.type_name, "Calling provider defined Resource ModifyPlan");
            modifier.modify_plan(
                &ResourcePlanRequest {
                    config: &req.config,
                    prior_state: &req.prior_state,
                    planned_state: &resp.planned_state,
                },
                &mut modified,
            );
            debug!(resource_type = %req.type_name, "Called provider defined Resource ModifyPlan");

            resp.diagnostics.append(modified.diagnostics);
            if !modified.planned_state.is_null() && modified.planned_state.ty() != &schema.value_type() {
                resp.diagnostics.push(Diagnostic::error(
                    DiagnosticClass::PlanConsistency,
                    "Invalid Planned State",
                    format!(
                        "The resource returned a planned state of type {}, which does not match \
                         the schema type {}.",
                        modified.planned_state.ty(),
                        schema.value_type()
                    ),
                ));
                return resp;
            }
            resp.planned_state = modified.planned_state;
            resp.requires_replace.extend(modified.requires_replace);
            resp.planned_private = resp.planned_private.with_provider(modified.private);
        }

        resp.planned_state = enforce_destroy(
            &req.proposed_new_state,
            resp.planned_state,
            &mut resp.diagnostics,
        );
        resp.requires_replace = normalize_paths(resp.requires_replace);
        resp
    }

    /// Applies a planned change.
    pub async fn apply_resource_change(&self, req: ApplyResourceChangeRequest) -> LifecycleResponse {
        let (resource, schema) = match self.new_resource(&req.type_name) {
            Ok(pair) => pair,
            Err(d) => {
                return LifecycleResponse {
                    new_state: req.prior_state,
                    private: req.planned_private,
                    diagnostics: d,
                };
            }
        };
        orchestrator::apply(
            resource.as_ref(),
            &schema,
            ApplyRequest {
                config: req.config,
                prior_state: req.prior_state,
                planned_state: req.planned_state,
                planned_private: req.planned_private,
            },
        )
        .await
    }

    /// Refreshes state. Null new state means the remote object is gone.
    pub async fn read_resource(
        &self,
        type_name: &str,
        current_state: Value,
        private: PrivateState,
    ) -> LifecycleResponse {
        let (resource, schema) = match self.new_resource(type_name) {
            Ok(pair) => pair,
            Err(d) => {
                return LifecycleResponse {
                    new_state: current_state,
                    private,
                    diagnostics: d,
                };
            }
        };
        let resp = orchestrator::read(
            resource.as_ref(),
            &schema,
            ReadRequest {
                state: current_state,
                private: private.provider.clone(),
            },
        )
        .await;
        let private = if resp.state.is_null() {
            PrivateState::default()
        } else {
            private.with_provider(resp.private)
        };
        LifecycleResponse {
            new_state: resp.state,
            private,
            diagnostics: resp.diagnostics,
        }
    }

    /// Imports an existing object by identifier. The result needs a read.
    pub async fn import_resource_state(&self, type_name: &str, id: &str) -> LifecycleResponse {
        let (resource, schema) = match self.new_resource(type_name) {
            Ok(pair) => pair,
            Err(d) => {
                return LifecycleResponse {
                    new_state: Value::null(crate::value::Type::Dynamic),
                    private: PrivateState::default(),
                    diagnostics: d,
                };
            }
        };
        let outcome = import_resource(resource.as_ref(), &schema, id).await;
        LifecycleResponse {
            new_state: outcome.state,
            private: PrivateState::default().with_provider(outcome.private),
            diagnostics: outcome.diagnostics,
        }
    }

    /// Upgrades raw persisted state written at `version`.
    pub fn upgrade_resource_state(
        &self,
        type_name: &str,
        version: i64,
        raw: Json,
        private: PrivateState,
    ) -> UpgradeResourceStateResponse {
        let (resource, schema) = match self.new_resource(type_name) {
            Ok(pair) => pair,
            Err(d) => {
                return UpgradeResourceStateResponse {
                    upgraded_state: Value::null(crate::value::Type::Dynamic),
                    private,
                    diagnostics: d,
                };
            }
        };
        let outcome = upgrade_state(resource.as_ref(), &schema, version, raw);
        let mut private = private;
        if let Some(from) = outcome.upgraded_from {
            info!(resource_type = type_name, from, to = schema.schema_version(), "Upgraded resource state");
            private.set_engine_key(UPGRADED_FROM_KEY, json!(from));
        }
        UpgradeResourceStateResponse {
            upgraded_state: outcome.state,
            private,
            diagnostics: outcome.diagnostics,
        }
    }

    /// Reads a data source after validating its configuration.
    pub async fn read_data_source(&self, type_name: &str, config: Value) -> LifecycleResponse {
        let (data_source, schema) = match self.new_data_source(type_name) {
            Ok(pair) => pair,
            Err(d) => {
                return LifecycleResponse {
                    new_state: Value::null(config.ty().clone()),
                    private: PrivateState::default(),
                    diagnostics: d,
                };
            }
        };
        let mut diags = validate_config(&schema, &config, self.capabilities);
        if diags.has_error() {
            return LifecycleResponse {
                new_state: schema.null_value(),
                private: PrivateState::default(),
                diagnostics: diags,
            };
        }
        let resp = orchestrator::read_data_source(data_source.as_ref(), &schema, config).await;
        diags.append(resp.diagnostics);
        LifecycleResponse {
            new_state: resp.state,
            private: PrivateState::default(),
            diagnostics: diags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::testing::{widget_value, Widget};
    use crate::plan::proposed::proposed_new_state;
    use serde_json::json;

    struct TestProvider {
        widget: Widget,
        duplicate: bool,
    }

    #[async_trait]
    impl Provider for TestProvider {
        fn type_name(&self) -> String {
            "test".to_string()
        }

        fn schema(&self) -> Schema {
            Schema::new()
        }

        async fn configure(&self, _config: &Value, _diags: &mut Diagnostics) -> Option<ProviderHandle> {
            Some(Arc::new("configured".to_string()))
        }

        fn resources(&self) -> Vec<ResourceFactory> {
            let widget = self.widget.clone();
            let mut factories: Vec<ResourceFactory> =
                vec![Arc::new(move || Box::new(widget.clone()) as Box<dyn Resource>)];
            if self.duplicate {
                factories.push(Arc::new(|| Box::new(Widget::default()) as Box<dyn Resource>));
            }
            factories
        }

        fn data_sources(&self) -> Vec<DataSourceFactory> {
            Vec::new()
        }
    }

    fn server() -> (ProviderServer, Widget) {
        let widget = Widget::default();
        let provider = TestProvider {
            widget: widget.clone(),
            duplicate: false,
        };
        (ProviderServer::new(Arc::new(provider)), widget)
    }

    fn plan(server: &ProviderServer, prior: &Value, config: &Value) -> PlanResourceChangeResponse {
        let schema = server.resource_schema("test_widget").expect("schema");
        let (proposed, diags) = proposed_new_state(&schema, config, prior);
        assert!(!diags.has_error());
        server.plan_resource_change(PlanResourceChangeRequest {
            type_name: "test_widget".to_string(),
            config: config.clone(),
            prior_state: prior.clone(),
            proposed_new_state: proposed,
            prior_private: PrivateState::default(),
        })
    }

    #[tokio::test]
    async fn test_plan_apply_read_cycle() {
        let (server, widget) = server();
        let schema = server.resource_schema("test_widget").expect("schema");
        assert!(server.configure_provider(&Value::null(Schema::new().value_type())).await.is_empty());

        let config = widget_value(json!({"name": "w", "size": "2.50", "secret": "pw"}));
        assert!(server.validate_resource_config("test_widget", &config).is_empty());

        let planned = plan(&server, &schema.null_value(), &config);
        assert!(!planned.diagnostics.has_error(), "{}", planned.diagnostics);
        assert!(planned.planned_state.attribute("id").is_some_and(Value::is_unknown));

        let applied = server
            .apply_resource_change(ApplyResourceChangeRequest {
                type_name: "test_widget".to_string(),
                config: config.clone(),
                prior_state: schema.null_value(),
                planned_state: planned.planned_state,
                planned_private: planned.planned_private,
            })
            .await;
        assert!(!applied.diagnostics.has_error(), "{}", applied.diagnostics);
        assert_eq!(applied.new_state.attribute("size"), Some(&Value::string("2.50")));
        assert_eq!(widget.stored_secret("w").as_deref(), Some("pw"));

        let read = server
            .read_resource("test_widget", applied.new_state.clone(), applied.private)
            .await;
        assert_eq!(read.new_state, applied.new_state);

        let replan = plan(&server, &read.new_state, &config);
        assert_eq!(replan.planned_state, read.new_state.with_attribute("secret", Value::string("pw")).expect("attr"));
        assert!(replan.requires_replace.is_empty());
    }

    #[tokio::test]
    async fn test_rename_requires_replace() {
        let (server, _) = server();
        let prior = widget_value(json!({"id": "a", "name": "a"}));
        let config = widget_value(json!({"name": "b"}));
        let planned = plan(&server, &prior, &config);
        assert_eq!(planned.requires_replace, vec![Path::root("name")]);
        assert_eq!(planned.planned_state.attribute("id"), Some(&Value::string("a")));
    }

    #[test]
    fn test_destroy_plan_stays_null() {
        let (server, _) = server();
        let schema = server.resource_schema("test_widget").expect("schema");
        let prior = widget_value(json!({"id": "a", "name": "a"}));
        let resp = server.plan_resource_change(PlanResourceChangeRequest {
            type_name: "test_widget".to_string(),
            config: schema.null_value(),
            prior_state: prior,
            proposed_new_state: schema.null_value(),
            prior_private: PrivateState::default(),
        });
        assert!(resp.planned_state.is_null());
        assert!(resp.diagnostics.is_empty());
    }

    #[test]
    fn test_duplicate_type_names_are_sticky() {
        let provider = TestProvider {
            widget: Widget::default(),
            duplicate: true,
        };
        let server = ProviderServer::new(Arc::new(provider));
        for _ in 0..2 {
            let err = server.resource_schema("test_widget").expect_err("duplicate");
            assert_eq!(
                err.iter().next().map(|d| d.summary.as_str()),
                Some("Duplicate Resource Type Defined")
            );
        }
        let schemas = server.get_provider_schema();
        assert!(schemas.diagnostics.has_error());
        assert!(schemas.resource_schemas.is_empty());
    }

    #[test]
    fn test_unknown_type() {
        let (server, _) = server();
        let diags = server.validate_resource_config("test_gadget", &Value::null(crate::value::Type::Dynamic));
        assert_eq!(
            diags.iter().next().map(|d| d.summary.as_str()),
            Some("Resource Type Not Found")
        );
    }

    #[test]
    fn test_upgrade_records_engine_key() {
        let (server, _) = server();
        let resp = server.upgrade_resource_state(
            "test_widget",
            0,
            json!({"id": "w", "title": "w"}),
            PrivateState::default(),
        );
        assert!(!resp.diagnostics.has_error());
        assert_eq!(resp.private.engine_key(UPGRADED_FROM_KEY), Some(b"0".as_slice()));
        assert_eq!(resp.upgraded_state.attribute("name"), Some(&Value::string("w")));
    }

    #[tokio::test]
    async fn test_import_through_server() {
        let (server, widget) = server();
        widget.insert_remote("w-9", "nine");
        let imported = server.import_resource_state("test_widget", "w-9").await;
        assert!(!imported.diagnostics.has_error());
        let read = server
            .read_resource("test_widget", imported.new_state, imported.private)
            .await;
        assert_eq!(read.new_state.attribute("name"), Some(&Value::string("nine")));
    }
}
