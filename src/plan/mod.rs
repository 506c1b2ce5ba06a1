//! Schema-wide plan modification.
//!
//! For every attribute and block, in order: substitute the default, promote
//! unset computed attributes to unknown, then run the node's modifier chain.
//! Modified children are written back into their containers, so the planned
//! value that comes out has exactly the type that went in.

pub mod proposed;

use tracing::{debug, trace};

use crate::diag::{Diagnostic, DiagnosticClass, Diagnostics};
use crate::path::{normalize_paths, Path};
use crate::private::ProviderData;
use crate::schema::defaults::{DefaultRequest, DefaultResponse};
use crate::schema::planmodifier::{PlanModifier, PlanModifyRequest, PlanModifyResponse};
use crate::schema::{Attribute, NestedObject, Node, Schema};
use crate::value::{Type, Value};
use crate::walker::{project, walk_schema, ChildStep, Lanes, SetMatch, WalkOp};

use std::sync::Arc;

/// Input to [`modify_plan`].
#[derive(Debug, Clone, Copy)]
pub struct PlanRequest<'a> {
    /// Resource schema.
    pub schema: &'a Schema,
    /// Configuration. Null on destroy.
    pub config: &'a Value,
    /// Prior state. Null on create.
    pub prior_state: &'a Value,
    /// Proposed new state. Null on destroy.
    pub proposed_new_state: &'a Value,
    /// Provider-owned private state from the prior state.
    pub private: &'a ProviderData,
    /// Promote unset computed attributes to unknown.
    pub mark_computed_unknown: bool,
}

impl PlanRequest<'_> {
    /// Whether the proposed state differs from prior state at all.
    #[must_use]
    pub fn proposes_changes(&self) -> bool {
        self.prior_state.is_null() || self.prior_state != self.proposed_new_state
    }
}

/// Output of [`modify_plan`].
#[derive(Debug, Clone)]
pub struct PlanResponse {
    /// The planned state.
    pub planned_state: Value,
    /// Paths whose change forces replacement, deduplicated and sorted.
    pub requires_replace: Vec<Path>,
    /// Provider-owned private state after modification.
    pub private: ProviderData,
    /// Problems found.
    pub diagnostics: Diagnostics,
}

/// Config, prior state and plan for one node. The plan is primary.
#[derive(Debug, Clone)]
pub struct PlanLanes {
    /// Configured value.
    pub config: Value,
    /// Prior state value.
    pub state: Value,
    /// Planned value.
    pub plan: Value,
}

impl Lanes for PlanLanes {
    fn primary(&self) -> &Value {
        &self.plan
    }

    fn set_primary(&mut self, value: Value) {
        self.plan = value;
    }

    fn into_primary(self) -> Value {
        self.plan
    }

    // Set elements are found in config by position, because the proposed plan
    // is built from config in order. Prior state is matched by value: an element
    // whose computed fields are still unknown will not match and sees null state.
    fn child(&self, step: &ChildStep<'_>, ty: &Type, path: &Path) -> Result<Self, Diagnostic> {
        Ok(Self {
            config: project(&self.config, step, SetMatch::Position, ty, path)?,
            state: project(&self.state, step, SetMatch::Value, ty, path)?,
            plan: project(&self.plan, step, SetMatch::Position, ty, path)?,
        })
    }
}

/// Runs defaults, computed promotion and plan modifiers across the schema.
#[must_use]
pub fn modify_plan(req: PlanRequest<'_>) -> PlanResponse {
    let mut resp = PlanResponse {
        planned_state: req.proposed_new_state.clone(),
        requires_replace: Vec::new(),
        private: req.private.clone(),
        diagnostics: Diagnostics::new(),
    };

    if req.proposed_new_state.is_null() {
        debug!("Planned state is null, skipping plan modification for destroy");
        return resp;
    }

    let mut op = PlanOp {
        config: req.config,
        state: req.prior_state,
        plan: req.proposed_new_state,
        mark_computed_unknown: req.mark_computed_unknown,
        private: req.private.clone(),
        requires_replace: Vec::new(),
    };
    let mut lanes = PlanLanes {
        config: req.config.clone(),
        state: req.prior_state.clone(),
        plan: req.proposed_new_state.clone(),
    };

    walk_schema(&mut op, req.schema, &mut lanes, &mut resp.diagnostics);

    resp.planned_state = lanes.plan;
    resp.private = op.private;
    resp.requires_replace = normalize_paths(op.requires_replace);
    resp
}

/// Checks the destroy invariant: a null proposed plan must stay null.
///
/// Returns the value to use as the planned state.
pub fn enforce_destroy(proposed: &Value, planned: Value, diags: &mut Diagnostics) -> Value {
    if proposed.is_null() && !planned.is_null() {
        diags.push(Diagnostic::error(
            DiagnosticClass::PlanConsistency,
            "Unexpected Planned Resource State on Destroy",
            "The resource planned a non-null state while being destroyed. The planned state \
             has been reset to null.",
        ));
        return Value::null(proposed.ty().clone());
    }
    planned
}

struct PlanOp<'a> {
    config: &'a Value,
    state: &'a Value,
    plan: &'a Value,
    mark_computed_unknown: bool,
    private: ProviderData,
    requires_replace: Vec<Path>,
}

impl PlanOp<'_> {
    fn check_kinds(ty: &Type, path: &Path, lanes: &PlanLanes, diags: &mut Diagnostics) -> bool {
        let kind = ty.kind();
        for value in [&lanes.config, &lanes.state, &lanes.plan] {
            if let Err(d) = value.expect_kind(kind, path) {
                diags.push(d);
                return false;
            }
        }
        true
    }

    fn apply_default(
        attr: &Attribute,
        path: &Path,
        lanes: &mut PlanLanes,
        diags: &mut Diagnostics,
    ) -> bool {
        let Some(default) = attr.default_source() else {
            return false;
        };
        if !lanes.config.is_null() {
            return false;
        }

        let mut resp = DefaultResponse {
            value: Value::null(attr.ty().base()),
            diagnostics: Diagnostics::new(),
        };
        default.default_value(&DefaultRequest { path }, &mut resp);
        let failed = resp.diagnostics.has_error();
        diags.append(resp.diagnostics);
        if failed || resp.value.is_null() {
            return false;
        }

        match attr.ty().value_from_base(resp.value, path) {
            Ok(value) => {
                trace!(path = %path, "Applied attribute default");
                lanes.plan = value;
                true
            }
            Err(d) => {
                diags.append(d);
                false
            }
        }
    }

    fn run_modifiers(
        &mut self,
        modifiers: &[Arc<dyn PlanModifier>],
        ty: &Type,
        path: &Path,
        lanes: &mut PlanLanes,
        diags: &mut Diagnostics,
    ) {
        if modifiers.is_empty() {
            return;
        }

        let config_value = lanes.config.to_base();
        let state_value = lanes.state.to_base();

        for modifier in modifiers {
            let plan_value = lanes.plan.to_base();
            let mut resp = PlanModifyResponse {
                plan_value: plan_value.clone(),
                requires_replace: false,
                private: self.private.clone(),
                diagnostics: Diagnostics::new(),
            };

            trace!(path = %path, description = %modifier.description(), "Calling provider defined plan modifier");
            modifier.modify_plan(
                &PlanModifyRequest {
                    path,
                    config_value: &config_value,
                    state_value: &state_value,
                    plan_value: &plan_value,
                    config: self.config,
                    state: self.state,
                    plan: self.plan,
                    private: &self.private,
                },
                &mut resp,
            );
            trace!(path = %path, description = %modifier.description(), "Called provider defined plan modifier");

            let failed = resp.diagnostics.has_error();
            diags.append(resp.diagnostics);
            self.private = resp.private;
            if resp.requires_replace {
                self.requires_replace.push(path.clone());
            }
            if failed {
                return;
            }

            match ty.value_from_base(resp.plan_value, path) {
                Ok(value) => lanes.plan = value,
                Err(d) => {
                    diags.append(d);
                    return;
                }
            }
        }
    }
}

impl WalkOp for PlanOp<'_> {
    type Lanes = PlanLanes;

    fn visit_node(
        &mut self,
        node: Node<'_>,
        path: &Path,
        lanes: &mut PlanLanes,
        diags: &mut Diagnostics,
    ) {
        if !Self::check_kinds(node.ty(), path, lanes, diags) {
            return;
        }

        if let Node::Attribute(attr) = node {
            let mut local = Diagnostics::new();
            let defaulted = Self::apply_default(attr, path, lanes, &mut local);
            let failed = local.has_error();
            diags.append(local);
            if failed {
                return;
            }

            if attr.is_computed()
                && !defaulted
                && self.mark_computed_unknown
                && lanes.config.is_null()
                && lanes.plan == lanes.state
                && !lanes.plan.is_unknown()
            {
                trace!(path = %path, "Marking computed attribute as unknown");
                lanes.plan = Value::unknown(attr.ty().clone());
            }
        }

        self.run_modifiers(node.plan_modifiers(), node.ty(), path, lanes, diags);
    }

    fn visit_object(
        &mut self,
        object: &NestedObject,
        path: &Path,
        lanes: &mut PlanLanes,
        diags: &mut Diagnostics,
    ) {
        let ty = object.object_type();
        self.run_modifiers(object.plan_modifiers(), &ty, path, lanes, diags);
    }

    fn rebuilds(&self) -> bool {
        true
    }
}
