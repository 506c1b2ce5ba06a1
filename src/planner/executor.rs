//! Plan executor.
//!
//! Applies each actionable change through the provider server and records
//! the result in workspace state. Replacements delete first, then create.
//! Objects returned alongside errors are still recorded, so partially
//! created remote objects stay tracked.

use tracing::{error, info, warn};

use crate::diag::Diagnostics;
use crate::error::Result;
use crate::private::PrivateState;
use crate::server::{ApplyResourceChangeRequest, ProviderServer};
use crate::state::{Operation, ResourceState, WorkspaceState};
use crate::value::Value;

use super::plan::{Action, ResourceChange, WorkspacePlan};

/// Executor for workspace plans.
pub struct PlanExecutor<'a> {
    /// Provider server.
    server: &'a ProviderServer,
    /// Whether to continue on errors.
    continue_on_error: bool,
}

/// Result of executing a single change.
#[derive(Debug)]
pub struct ActionResult {
    /// Resource address.
    pub address: String,
    /// Action that was executed.
    pub action: Action,
    /// Whether the action succeeded.
    pub success: bool,
    /// Diagnostics reported by the provider.
    pub diagnostics: Diagnostics,
}

/// Result of executing the entire plan.
#[derive(Debug, Default)]
pub struct ExecutionResult {
    /// Individual action results.
    pub results: Vec<ActionResult>,
    /// Number of successful actions.
    pub successful: usize,
    /// Number of failed actions.
    pub failed: usize,
    /// Number of actions not attempted after a failure.
    pub skipped: usize,
    /// Whether the entire plan succeeded.
    pub success: bool,
}

impl ExecutionResult {
    /// All diagnostics, in execution order.
    #[must_use]
    pub fn diagnostics(&self) -> Diagnostics {
        let mut diags = Diagnostics::new();
        for result in &self.results {
            diags.append(result.diagnostics.clone());
        }
        diags
    }
}

impl<'a> PlanExecutor<'a> {
    /// Creates a new plan executor.
    #[must_use]
    pub const fn new(server: &'a ProviderServer) -> Self {
        Self {
            server,
            continue_on_error: false,
        }
    }

    /// Sets whether to continue on errors.
    #[must_use]
    pub const fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    /// Executes a workspace plan against `state`.
    ///
    /// # Errors
    ///
    /// Returns an error only for failures outside the provider; provider
    /// errors are reported in the result.
    pub async fn execute(&self, plan: &WorkspacePlan, state: &mut WorkspaceState) -> Result<ExecutionResult> {
        let actionable: Vec<&ResourceChange> = plan.actionable().collect();
        info!("Executing plan with {} changes", actionable.len());

        let mut result = ExecutionResult {
            success: true,
            ..ExecutionResult::default()
        };

        for (idx, change) in actionable.iter().enumerate() {
            info!(address = %change.address, action = %change.action, "Applying change");
            let outcome = self.execute_change(change, state).await;

            if outcome.success {
                result.successful += 1;
            } else {
                error!(address = %change.address, "Change failed: {}", outcome.diagnostics);
                result.failed += 1;
                result.success = false;
            }
            let stop = !outcome.success && !self.continue_on_error;
            result.results.push(outcome);

            if stop {
                result.skipped = actionable.len() - idx - 1;
                if result.skipped > 0 {
                    warn!("Skipping {} remaining changes after failure", result.skipped);
                }
                break;
            }
        }

        let addresses = actionable.iter().map(|c| c.address.clone()).collect();
        let failure = (!result.success).then(|| format!("{} changes failed", result.failed));
        state.record(Operation::Apply, addresses, failure);
        if result.success {
            state.config_hash.clone_from(&plan.config_hash);
        }

        Ok(result)
    }

    /// Executes a single change.
    async fn execute_change(&self, change: &ResourceChange, state: &mut WorkspaceState) -> ActionResult {
        let mut diagnostics = Diagnostics::new();

        let success = match change.action {
            Action::NoOp => true,
            Action::Delete => self.delete(change, state, &mut diagnostics).await,
            Action::Create | Action::Update => {
                self.create_or_update(change, change.prior_state.clone(), state, &mut diagnostics)
                    .await
            }
            Action::Replace => {
                self.delete(change, state, &mut diagnostics).await
                    && self
                        .create_or_update(
                            change,
                            Value::null(change.prior_state.ty().clone()),
                            state,
                            &mut diagnostics,
                        )
                        .await
            }
        };

        ActionResult {
            address: change.address.clone(),
            action: change.action,
            success,
            diagnostics,
        }
    }

    /// Destroys the prior object.
    async fn delete(&self, change: &ResourceChange, state: &mut WorkspaceState, diags: &mut Diagnostics) -> bool {
        let null = Value::null(change.prior_state.ty().clone());
        let resp = self
            .server
            .apply_resource_change(ApplyResourceChangeRequest {
                type_name: change.type_name.clone(),
                config: null.clone(),
                prior_state: change.prior_state.clone(),
                planned_state: null,
                planned_private: change.prior_private.clone(),
            })
            .await;
        let failed = resp.diagnostics.has_error();
        diags.append(resp.diagnostics);

        if failed {
            return false;
        }
        state.remove(&change.address);
        info!(address = %change.address, "Destroyed");
        true
    }

    /// Creates or updates the object, starting from `prior`.
    async fn create_or_update(
        &self,
        change: &ResourceChange,
        prior: Value,
        state: &mut WorkspaceState,
        diags: &mut Diagnostics,
    ) -> bool {
        let resp = self
            .server
            .apply_resource_change(ApplyResourceChangeRequest {
                type_name: change.type_name.clone(),
                config: change.config.clone(),
                prior_state: prior,
                planned_state: change.planned_state.clone(),
                planned_private: change.planned_private.clone(),
            })
            .await;
        let failed = resp.diagnostics.has_error();
        diags.append(resp.diagnostics);

        if !resp.new_state.is_null() {
            match self.record(change, &resp.new_state, &resp.private) {
                Ok(resource) => state.set(resource),
                Err(d) => {
                    diags.append(d);
                    return false;
                }
            }
        } else if !failed {
            state.remove(&change.address);
        }

        if !failed {
            info!(address = %change.address, "Applied");
        }
        !failed
    }

    fn record(&self, change: &ResourceChange, value: &Value, private: &PrivateState) -> std::result::Result<ResourceState, Diagnostics> {
        let schema = self.server.resource_schema(&change.type_name)?;
        let mut resource =
            ResourceState::from_value(&change.type_name, &change.name, schema.schema_version(), value, private)?;
        resource.config_hash.clone_from(&change.config_hash);
        Ok(resource)
    }
}
