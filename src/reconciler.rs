//! Workspace reconciler.
//!
//! Drives the provider server on behalf of one workspace: it decodes
//! configuration and persisted state against the provider's schemas, builds
//! plans, applies them and keeps the state store current.

use serde::Serialize;
use serde_json::Value as Json;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::config::{split_address, ConfigHasher, ConfigValidator, ResourceConfig, WorkspaceConfig};
use crate::diag::{Diagnostic, DiagnosticClass, Diagnostics};
use crate::error::{check, EngineError, PlanError, Result, StateError};
use crate::path::Path;
use crate::plan::proposed::proposed_new_state;
use crate::planner::{Action, DiffEngine, ExecutionResult, PlanExecutor, ResourceChange, WorkspacePlan};
use crate::private::PrivateState;
use crate::server::{PlanResourceChangeRequest, ProviderServer};
use crate::state::{LockInfo, Operation, ResourceState, StateStore, WorkspaceState};
use crate::value::json::from_json;
use crate::value::Value;

/// What a plan is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanMode {
    /// Converge on the configuration.
    Normal,
    /// Destroy everything in state.
    Destroy,
}

/// Reconciler for one workspace.
pub struct Reconciler<'a, S: StateStore + ?Sized> {
    /// Configuration.
    config: &'a WorkspaceConfig,
    /// State store.
    state_store: &'a S,
    /// Provider server.
    server: &'a ProviderServer,
    /// Configuration hasher.
    hasher: ConfigHasher,
    /// Diff engine.
    diff_engine: DiffEngine,
    /// Refresh prior state before planning.
    refresh: bool,
}

/// A data source read.
#[derive(Debug, Clone)]
pub struct DataResult {
    /// `type.name` address.
    pub address: String,
    /// State returned by the data source.
    pub value: Value,
}

/// Result of a refresh.
#[derive(Debug, Default, Serialize)]
pub struct RefreshResult {
    /// Addresses whose state changed.
    pub updated: Vec<String>,
    /// Addresses whose remote object is gone.
    pub removed: Vec<String>,
    /// Addresses unchanged.
    pub unchanged: usize,
    /// Problems found.
    pub diagnostics: Diagnostics,
}

/// Result of a reconciliation run.
#[derive(Debug, Default, Serialize)]
pub struct ReconciliationResult {
    /// Whether reconciliation succeeded.
    pub success: bool,
    /// Number of resources created.
    pub created: usize,
    /// Number of resources updated in place.
    pub updated: usize,
    /// Number of resources replaced.
    pub replaced: usize,
    /// Number of resources deleted.
    pub deleted: usize,
    /// Number of resources unchanged.
    pub unchanged: usize,
    /// Errors encountered.
    pub errors: Vec<String>,
}

impl<'a, S: StateStore + ?Sized> Reconciler<'a, S> {
    /// Creates a new reconciler.
    #[must_use]
    pub const fn new(config: &'a WorkspaceConfig, state_store: &'a S, server: &'a ProviderServer) -> Self {
        Self {
            config,
            state_store,
            server,
            hasher: ConfigHasher::new(),
            diff_engine: DiffEngine::new(),
            refresh: true,
        }
    }

    /// Sets whether prior state is refreshed before planning.
    #[must_use]
    pub const fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    /// Checks the workspace file against the provider's types and schemas.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<Diagnostics> {
        let resource_types = self.server.resource_types()?;
        let data_source_types = self.server.data_source_types()?;
        let shape = ConfigValidator::new()
            .with_resource_types(resource_types)
            .with_data_source_types(data_source_types)
            .validate(self.config)?;

        let mut diags = Diagnostics::new();
        for warning in shape.warnings {
            diags.push(Diagnostic::warning(DiagnosticClass::Configuration, "Configuration Warning", warning));
        }

        let provider_schema = self.server.provider_schema()?;
        if let Err(d) = from_json(&provider_schema.value_type(), &self.config.provider_body(), &Path::empty()) {
            diags.append(d);
        }

        for resource in &self.config.resources {
            match self.resource_config(resource) {
                Ok(config) => diags.append(self.server.validate_resource_config(&resource.type_name, &config)),
                Err(d) => diags.append(d),
            }
        }
        for data in &self.config.data {
            match self.data_config(data) {
                Ok(config) => diags.append(self.server.validate_data_source_config(&data.type_name, &config)),
                Err(d) => diags.append(d),
            }
        }

        check(diags)
    }

    /// Configures the provider from the workspace's provider block.
    ///
    /// # Errors
    ///
    /// Returns an error if the block does not decode or configuration fails.
    pub async fn configure(&self) -> Result<Diagnostics> {
        let schema = self.server.provider_schema()?;
        let config = from_json(&schema.value_type(), &self.config.provider_body(), &Path::empty())?;
        info!(provider = %self.server.provider_name(), "Configuring provider");
        check(self.server.configure_provider(&config).await)
    }

    /// Acquires the state lock for `operation`.
    ///
    /// # Errors
    ///
    /// Returns an error if the state is locked by someone else.
    pub async fn lock(&self, operation: &str) -> Result<LockInfo> {
        self.state_store.lock(operation).await
    }

    /// Releases a lock taken with [`Reconciler::lock`].
    ///
    /// # Errors
    ///
    /// Returns an error if the lock file cannot be removed.
    pub async fn unlock(&self, lock: &LockInfo) -> Result<()> {
        self.state_store.unlock(&lock.lock_id).await
    }

    /// Loads state, or starts an empty one.
    ///
    /// # Errors
    ///
    /// Returns an error if stored state is unreadable or belongs to another
    /// workspace.
    pub async fn load_state(&self) -> Result<WorkspaceState> {
        match self.state_store.load().await? {
            Some(state) if state.workspace != self.config.workspace => {
                Err(EngineError::State(StateError::corrupted(format!(
                    "state belongs to workspace '{}', not '{}'",
                    state.workspace, self.config.workspace
                ))))
            }
            Some(state) => Ok(state),
            None => {
                debug!("No state found, starting empty");
                Ok(WorkspaceState::new(&self.config.workspace))
            }
        }
    }

    /// Decodes a configured resource body.
    fn resource_config(&self, resource: &ResourceConfig) -> std::result::Result<Value, Diagnostics> {
        let schema = self.server.resource_schema(&resource.type_name)?;
        from_json(&schema.value_type(), &resource.body(), &Path::empty())
    }

    /// Decodes a configured data source body.
    fn data_config(&self, data: &ResourceConfig) -> std::result::Result<Value, Diagnostics> {
        let schema = self.server.data_source_schema(&data.type_name)?;
        from_json(&schema.value_type(), &data.body(), &Path::empty())
    }

    /// Decodes a stored resource, upgrading it to the current schema.
    fn decode_state(&self, stored: &ResourceState) -> std::result::Result<(Value, PrivateState), Diagnostics> {
        let private = stored.private_state()?;
        let resp = self.server.upgrade_resource_state(
            &stored.type_name,
            stored.schema_version,
            stored.value.clone(),
            private,
        );
        if resp.diagnostics.has_error() {
            return Err(resp.diagnostics);
        }
        Ok((resp.upgraded_state, resp.private))
    }

    /// Refreshes one decoded prior state. Null means the object is gone.
    async fn refresh_one(
        &self,
        type_name: &str,
        prior: Value,
        private: PrivateState,
        diags: &mut Diagnostics,
    ) -> (Value, PrivateState) {
        let resp = self.server.read_resource(type_name, prior.clone(), private.clone()).await;
        let failed = resp.diagnostics.has_error();
        diags.append(resp.diagnostics);
        if failed {
            return (prior, private);
        }
        (resp.new_state, resp.private)
    }

    /// Reads every configured data source.
    ///
    /// # Errors
    ///
    /// Returns an error if any read fails.
    pub async fn read_data(&self) -> Result<(Vec<DataResult>, Diagnostics)> {
        let mut results = Vec::new();
        let mut diags = Diagnostics::new();
        for data in &self.config.data {
            let config = match self.data_config(data) {
                Ok(config) => config,
                Err(d) => {
                    diags.append(d);
                    continue;
                }
            };
            let resp = self.server.read_data_source(&data.type_name, config).await;
            diags.append(resp.diagnostics);
            results.push(DataResult {
                address: data.address(),
                value: resp.new_state,
            });
        }
        Ok((results, check(diags)?))
    }

    /// Builds a plan against `state`.
    ///
    /// # Errors
    ///
    /// Returns an error if any resource fails to plan.
    pub async fn plan(&self, state: &WorkspaceState, mode: PlanMode) -> Result<WorkspacePlan> {
        info!(workspace = %self.config.workspace, ?mode, "Planning");
        let mut diags = Diagnostics::new();
        let mut changes = Vec::new();
        let mut configured = BTreeSet::new();

        if mode == PlanMode::Normal {
            for resource in &self.config.resources {
                let address = resource.address();
                configured.insert(address.clone());
                let mut local = Diagnostics::new();
                if let Some(change) = self.plan_resource(resource, state.get(&address), &mut local).await {
                    changes.push(change);
                }
                diags.append(local);
            }
        }

        for (address, stored) in &state.resources {
            if configured.contains(address) {
                continue;
            }
            if let Some(change) = self.plan_delete(address, stored, &mut diags).await {
                changes.push(change);
            }
        }

        let diags = check(diags)?;
        let plan = WorkspacePlan::new(&self.hasher.hash_config(self.config), changes, diags);
        info!(
            "Plan: {} to add, {} to change, {} to replace, {} to destroy",
            plan.count(Action::Create),
            plan.count(Action::Update),
            plan.count(Action::Replace),
            plan.count(Action::Delete)
        );
        Ok(plan)
    }

    async fn plan_resource(
        &self,
        resource: &ResourceConfig,
        stored: Option<&ResourceState>,
        diags: &mut Diagnostics,
    ) -> Option<ResourceChange> {
        let schema = match self.server.resource_schema(&resource.type_name) {
            Ok(schema) => schema,
            Err(d) => {
                diags.append(d);
                return None;
            }
        };
        let config = match self.resource_config(resource) {
            Ok(config) => config,
            Err(d) => {
                diags.append(d);
                return None;
            }
        };

        let validation = self.server.validate_resource_config(&resource.type_name, &config);
        let invalid = validation.has_error();
        diags.append(validation);
        if invalid {
            return None;
        }

        let (mut prior, mut prior_private) = match stored.map(|s| self.decode_state(s)) {
            Some(Ok(decoded)) => decoded,
            Some(Err(d)) => {
                diags.append(d);
                return None;
            }
            None => (schema.null_value(), PrivateState::default()),
        };
        if self.refresh && !prior.is_null() {
            (prior, prior_private) = self
                .refresh_one(&resource.type_name, prior, prior_private, diags)
                .await;
            if prior.is_null() {
                warn!(address = %resource.address(), "Object has been deleted outside of management");
                prior = schema.null_value();
            }
        }

        let (planned, planned_private, requires_replace) =
            self.plan_change(&resource.type_name, &config, &prior, &prior_private, diags)?;
        let action = Action::classify(&prior, &planned, &requires_replace);
        let details = self
            .diff_engine
            .attribute_changes(&schema, &prior, &planned, &requires_replace);

        // Replacement applies as a create, so it needs a plan from scratch.
        let (planned, planned_private) = if action == Action::Replace {
            let (fresh, fresh_private, _) = self.plan_change(
                &resource.type_name,
                &config,
                &schema.null_value(),
                &PrivateState::default(),
                diags,
            )?;
            (fresh, fresh_private)
        } else {
            (planned, planned_private)
        };

        Some(ResourceChange {
            address: resource.address(),
            type_name: resource.type_name.clone(),
            name: resource.name.clone(),
            action,
            config,
            prior_state: prior,
            prior_private,
            planned_state: planned,
            planned_private,
            requires_replace,
            details,
            config_hash: self.hasher.hash_resource(resource),
        })
    }

    fn plan_change(
        &self,
        type_name: &str,
        config: &Value,
        prior: &Value,
        prior_private: &PrivateState,
        diags: &mut Diagnostics,
    ) -> Option<(Value, PrivateState, Vec<Path>)> {
        let schema = self.server.resource_schema(type_name).ok()?;
        let (proposed, proposed_diags) = proposed_new_state(&schema, config, prior);
        let failed = proposed_diags.has_error();
        diags.append(proposed_diags);
        if failed {
            return None;
        }

        let resp = self.server.plan_resource_change(PlanResourceChangeRequest {
            type_name: type_name.to_string(),
            config: config.clone(),
            prior_state: prior.clone(),
            proposed_new_state: proposed,
            prior_private: prior_private.clone(),
        });
        let failed = resp.diagnostics.has_error();
        diags.append(resp.diagnostics);
        if failed {
            return None;
        }
        Some((resp.planned_state, resp.planned_private, resp.requires_replace))
    }

    async fn plan_delete(&self, address: &str, stored: &ResourceState, diags: &mut Diagnostics) -> Option<ResourceChange> {
        let (mut prior, mut prior_private) = match self.decode_state(stored) {
            Ok(decoded) => decoded,
            Err(d) => {
                diags.append(d);
                return None;
            }
        };
        if self.refresh {
            (prior, prior_private) = self
                .refresh_one(&stored.type_name, prior, prior_private, diags)
                .await;
        }

        let schema = self.server.resource_schema(&stored.type_name).ok()?;
        let null = schema.null_value();
        let action = if prior.is_null() { Action::NoOp } else { Action::Delete };
        let details = self.diff_engine.attribute_changes(&schema, &prior, &null, &[]);

        Some(ResourceChange {
            address: address.to_string(),
            type_name: stored.type_name.clone(),
            name: stored.name.clone(),
            action,
            config: null.clone(),
            prior_state: if prior.is_null() { null.clone() } else { prior },
            prior_private,
            planned_state: null,
            planned_private: PrivateState::default(),
            requires_replace: Vec::new(),
            details,
            config_hash: stored.config_hash.clone(),
        })
    }

    /// Applies `plan` and saves the resulting state.
    ///
    /// # Errors
    ///
    /// Returns an error if state cannot be saved.
    pub async fn apply(&self, plan: &WorkspacePlan, state: &mut WorkspaceState) -> Result<ExecutionResult> {
        let base_serial = state.serial;
        // Unchanged resources still pick up refreshed state.
        for change in plan.changes.iter().filter(|c| c.action == Action::NoOp) {
            if change.prior_state.is_null() {
                state.remove(&change.address);
                continue;
            }
            if let Some(stored) = state.get(&change.address).cloned() {
                match self.stored_resource(&change.type_name, &change.name, &change.prior_state, &change.prior_private) {
                    Ok(mut resource) => {
                        resource.config_hash = stored.config_hash;
                        if resource.value != stored.value || resource.schema_version != stored.schema_version {
                            state.set(resource);
                        }
                    }
                    Err(d) => warn!(address = %change.address, "Cannot record refreshed state: {d}"),
                }
            }
        }

        let result = PlanExecutor::new(self.server).execute(plan, state).await?;
        self.state_store.save(state, base_serial).await?;
        Ok(result)
    }

    fn stored_resource(
        &self,
        type_name: &str,
        name: &str,
        value: &Value,
        private: &PrivateState,
    ) -> std::result::Result<ResourceState, Diagnostics> {
        let schema = self.server.resource_schema(type_name)?;
        ResourceState::from_value(type_name, name, schema.schema_version(), value, private)
    }

    /// Refreshes every resource in state from its remote object and saves.
    ///
    /// # Errors
    ///
    /// Returns an error if state cannot be saved.
    pub async fn refresh(&self, state: &mut WorkspaceState) -> Result<RefreshResult> {
        let base_serial = state.serial;
        let mut result = RefreshResult::default();
        let stored: Vec<ResourceState> = state.resources.values().cloned().collect();

        for resource in stored {
            let address = resource.address();
            let (prior, private) = match self.decode_state(&resource) {
                Ok(decoded) => decoded,
                Err(d) => {
                    result.diagnostics.append(d);
                    continue;
                }
            };
            let mut local = Diagnostics::new();
            let (new_state, new_private) = self.refresh_one(&resource.type_name, prior, private, &mut local).await;
            let failed = local.has_error();
            result.diagnostics.append(local);
            if failed {
                continue;
            }

            if new_state.is_null() {
                info!(%address, "Remote object is gone, removing from state");
                state.remove(&address);
                result.removed.push(address);
                continue;
            }
            match self.stored_resource(&resource.type_name, &resource.name, &new_state, &new_private) {
                Ok(mut refreshed) => {
                    refreshed.config_hash.clone_from(&resource.config_hash);
                    if refreshed.value == resource.value && refreshed.private == resource.private {
                        result.unchanged += 1;
                    } else {
                        state.set(refreshed);
                        result.updated.push(address);
                    }
                }
                Err(d) => result.diagnostics.append(d),
            }
        }

        let touched = result.updated.iter().chain(&result.removed).cloned().collect();
        let error = result
            .diagnostics
            .has_error()
            .then(|| format!("{} errors during refresh", result.diagnostics.error_count()));
        state.record(Operation::Refresh, touched, error);
        self.state_store.save(state, base_serial).await?;
        Ok(result)
    }

    /// Adopts an existing remote object under a configured address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is not configured, is already
    /// managed, or the provider cannot import the object.
    pub async fn import(&self, state: &mut WorkspaceState, address: &str, id: &str) -> Result<Diagnostics> {
        let base_serial = state.serial;
        let Some((type_name, name)) = split_address(address) else {
            return Err(EngineError::Plan(PlanError::InvalidAddress {
                address: address.to_string(),
            }));
        };
        let Some(resource) = self.config.resource(address) else {
            return Err(EngineError::Plan(PlanError::NotConfigured {
                address: address.to_string(),
            }));
        };
        if state.get(address).is_some() {
            return Err(EngineError::Plan(PlanError::AlreadyManaged {
                address: address.to_string(),
            }));
        }

        info!(%address, id, "Importing");
        let mut diags = Diagnostics::new();
        let imported = self.server.import_resource_state(type_name, id).await;
        diags.append(imported.diagnostics.clone());
        check(imported.diagnostics)?;

        let read = self.server.read_resource(type_name, imported.new_state, imported.private).await;
        diags.append(read.diagnostics.clone());
        check(read.diagnostics)?;
        if read.new_state.is_null() {
            diags.push(Diagnostic::error(
                DiagnosticClass::LifecycleState,
                "Cannot Import Non-Existent Remote Object",
                format!("The object with identifier {id:?} does not exist."),
            ));
            return Err(EngineError::Diagnostics(diags));
        }

        let mut stored = self.stored_resource(type_name, name, &read.new_state, &read.private)?;
        stored.config_hash = self.hasher.hash_resource(resource);
        state.set(stored);
        state.record(Operation::Import, vec![address.to_string()], None);
        self.state_store.save(state, base_serial).await?;
        Ok(diags)
    }

    /// Forgets a resource without destroying it.
    ///
    /// # Errors
    ///
    /// Returns an error if nothing is stored at `address`.
    pub async fn remove(&self, state: &mut WorkspaceState, address: &str) -> Result<ResourceState> {
        let base_serial = state.serial;
        let removed = state.remove(address).ok_or_else(|| {
            EngineError::State(StateError::UnknownAddress {
                address: address.to_string(),
            })
        })?;
        state.record(Operation::Remove, vec![address.to_string()], None);
        self.state_store.save(state, base_serial).await?;
        Ok(removed)
    }

    /// Decoded state value at `address`, upgraded to the current schema.
    ///
    /// # Errors
    ///
    /// Returns an error if nothing is stored or the value does not decode.
    pub fn state_value(&self, state: &WorkspaceState, address: &str) -> Result<Value> {
        let stored = state.get(address).ok_or_else(|| {
            EngineError::State(StateError::UnknownAddress {
                address: address.to_string(),
            })
        })?;
        Ok(self.decode_state(stored)?.0)
    }

    /// Plans and applies under the state lock.
    ///
    /// # Errors
    ///
    /// Returns an error if locking, planning or saving fails.
    pub async fn reconcile(&self, mode: PlanMode) -> Result<ReconciliationResult> {
        let lock = self.lock(if mode == PlanMode::Destroy { "destroy" } else { "apply" }).await?;
        let outcome = self.reconcile_locked(mode).await;
        if let Err(e) = self.unlock(&lock).await {
            warn!("Failed to release state lock: {e}");
        }
        outcome
    }

    async fn reconcile_locked(&self, mode: PlanMode) -> Result<ReconciliationResult> {
        let mut state = self.load_state().await?;
        let plan = self.plan(&state, mode).await?;

        let mut result = ReconciliationResult {
            created: plan.count(Action::Create),
            updated: plan.count(Action::Update),
            replaced: plan.count(Action::Replace),
            deleted: plan.count(Action::Delete),
            unchanged: plan.count(Action::NoOp),
            ..ReconciliationResult::default()
        };

        let execution = self.apply(&plan, &mut state).await?;
        result.success = execution.success;
        result.errors = execution
            .diagnostics()
            .errors()
            .map(ToString::to_string)
            .collect();
        if mode == PlanMode::Destroy && execution.success && state.resources.is_empty() {
            let base_serial = state.serial;
            state.record(Operation::Destroy, Vec::new(), None);
            self.state_store.save(&state, base_serial).await?;
        }
        Ok(result)
    }
}

/// Renders a decoded state value as JSON for display.
///
/// # Errors
///
/// Returns a diagnostic if the value holds unknowns.
pub fn display_json(value: &Value) -> std::result::Result<Json, Diagnostic> {
    crate::value::json::to_json(value, &Path::empty())
}
