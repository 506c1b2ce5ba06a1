//! Plan modifiers attached to attributes, blocks and nested objects.
//!
//! Modifiers on one node run left to right. Each sees the plan value left by
//! the previous one.

use std::fmt;

use crate::diag::Diagnostics;
use crate::path::Path;
use crate::private::ProviderData;
use crate::value::Value;

/// Input to a [`PlanModifier`].
#[derive(Debug, Clone, Copy)]
pub struct PlanModifyRequest<'a> {
    /// Location of the value being planned.
    pub path: &'a Path,
    /// Configured value, in base form.
    pub config_value: &'a Value,
    /// Prior state value, in base form.
    pub state_value: &'a Value,
    /// Current plan value, in base form.
    pub plan_value: &'a Value,
    /// Whole resource configuration.
    pub config: &'a Value,
    /// Whole prior state. Null on create.
    pub state: &'a Value,
    /// Whole proposed plan. Null on destroy.
    pub plan: &'a Value,
    /// Provider-owned private state.
    pub private: &'a ProviderData,
}

impl PlanModifyRequest<'_> {
    /// Returns true if the resource is being created.
    #[must_use]
    pub const fn is_create(&self) -> bool {
        self.state.is_null()
    }

    /// Returns true if the resource is being destroyed.
    #[must_use]
    pub const fn is_destroy(&self) -> bool {
        self.plan.is_null()
    }
}

/// Output of a [`PlanModifier`].
#[derive(Debug)]
pub struct PlanModifyResponse {
    /// New plan value, in base form. Seeded with the request plan value.
    pub plan_value: Value,
    /// Set to request replacement of the resource.
    pub requires_replace: bool,
    /// Provider-owned private state. Seeded with the request private state.
    pub private: ProviderData,
    /// Problems found.
    pub diagnostics: Diagnostics,
}

/// Adjusts one planned value.
pub trait PlanModifier: Send + Sync + fmt::Debug {
    /// Human-readable description used in logs and schema output.
    fn description(&self) -> String;

    /// Runs the modifier.
    fn modify_plan(&self, req: &PlanModifyRequest<'_>, resp: &mut PlanModifyResponse);
}

/// Copies the prior state value into the plan while the plan is unknown.
#[derive(Debug, Clone, Copy, Default)]
pub struct UseStateForUnknown;

/// Keeps a computed value stable across updates.
#[must_use]
pub const fn use_state_for_unknown() -> UseStateForUnknown {
    UseStateForUnknown
}

impl PlanModifier for UseStateForUnknown {
    fn description(&self) -> String {
        "Once set, the value of this attribute in state will not change.".to_string()
    }

    fn modify_plan(&self, req: &PlanModifyRequest<'_>, resp: &mut PlanModifyResponse) {
        if req.is_create() || req.state_value.is_null() {
            return;
        }
        if !req.plan_value.is_unknown() || req.config_value.is_unknown() {
            return;
        }
        resp.plan_value = req.state_value.clone();
    }
}

/// Condition callback for [`RequiresReplaceIf`].
pub type ReplaceCondition = dyn Fn(&PlanModifyRequest<'_>) -> bool + Send + Sync;

/// Requests replacement when the planned value differs from state and the
/// condition holds.
pub struct RequiresReplaceIf {
    condition: Box<ReplaceCondition>,
    description: String,
}

/// Requests replacement whenever the value changes.
#[must_use]
pub fn requires_replace() -> RequiresReplaceIf {
    RequiresReplaceIf {
        condition: Box::new(|_| true),
        description: "If the value of this attribute changes, the resource will be replaced."
            .to_string(),
    }
}

/// Requests replacement when the value changes and is set in configuration.
#[must_use]
pub fn requires_replace_if_configured() -> RequiresReplaceIf {
    RequiresReplaceIf {
        condition: Box::new(|req| !req.config_value.is_null()),
        description: "If the value of this attribute is configured and changes, the resource \
                      will be replaced."
            .to_string(),
    }
}

/// Requests replacement when the value changes and `condition` holds.
pub fn requires_replace_if<F>(description: impl Into<String>, condition: F) -> RequiresReplaceIf
where
    F: Fn(&PlanModifyRequest<'_>) -> bool + Send + Sync + 'static,
{
    RequiresReplaceIf {
        condition: Box::new(condition),
        description: description.into(),
    }
}

impl fmt::Debug for RequiresReplaceIf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequiresReplaceIf")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl PlanModifier for RequiresReplaceIf {
    fn description(&self) -> String {
        self.description.clone()
    }

    fn modify_plan(&self, req: &PlanModifyRequest<'_>, resp: &mut PlanModifyResponse) {
        if req.is_create() || req.is_destroy() {
            return;
        }
        if req.plan_value == req.state_value {
            return;
        }
        if (self.condition)(req) {
            resp.requires_replace = true;
        }
    }
}

/// Plan modifier backed by a closure.
pub struct FnPlanModifier<F> {
    description: String,
    modify: F,
}

/// Wraps `modify` as a plan modifier.
pub fn plan_modifier_fn<F>(description: impl Into<String>, modify: F) -> FnPlanModifier<F>
where
    F: Fn(&PlanModifyRequest<'_>, &mut PlanModifyResponse) + Send + Sync,
{
    FnPlanModifier {
        description: description.into(),
        modify,
    }
}

impl<F> fmt::Debug for FnPlanModifier<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnPlanModifier")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl<F> PlanModifier for FnPlanModifier<F>
where
    F: Fn(&PlanModifyRequest<'_>, &mut PlanModifyResponse) + Send + Sync,
{
    fn description(&self) -> String {
        self.description.clone()
    }

    fn modify_plan(&self, req: &PlanModifyRequest<'_>, resp: &mut PlanModifyResponse) {
        (self.modify)(req, resp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Type;

    struct Lanes {
        config: Value,
        state: Value,
        plan: Value,
        state_root: Value,
        plan_root: Value,
    }

    fn run(modifier: &dyn PlanModifier, lanes: &Lanes) -> PlanModifyResponse {
        let path = Path::root("attr");
        let private = ProviderData::new();
        let mut resp = PlanModifyResponse {
            plan_value: lanes.plan.clone(),
            requires_replace: false,
            private: private.clone(),
            diagnostics: Diagnostics::new(),
        };
        modifier.modify_plan(
            &PlanModifyRequest {
                path: &path,
                config_value: &lanes.config,
                state_value: &lanes.state,
                plan_value: &lanes.plan,
                config: &lanes.plan_root,
                state: &lanes.state_root,
                plan: &lanes.plan_root,
                private: &private,
            },
            &mut resp,
        );
        resp
    }

    fn root() -> Value {
        Value::object_from([("attr", Value::string("x"))]).expect("object")
    }

    #[test]
    fn test_use_state_for_unknown() {
        let lanes = Lanes {
            config: Value::null(Type::String),
            state: Value::string("id-1"),
            plan: Value::unknown(Type::String),
            state_root: root(),
            plan_root: root(),
        };
        let resp = run(&use_state_for_unknown(), &lanes);
        assert_eq!(resp.plan_value, Value::string("id-1"));

        let create = Lanes {
            state_root: Value::null(root().ty().clone()),
            state: Value::null(Type::String),
            ..lanes
        };
        let resp = run(&use_state_for_unknown(), &create);
        assert!(resp.plan_value.is_unknown());
    }

    #[test]
    fn test_requires_replace() {
        let changed = Lanes {
            config: Value::string("b"),
            state: Value::string("a"),
            plan: Value::string("b"),
            state_root: root(),
            plan_root: root(),
        };
        assert!(run(&requires_replace(), &changed).requires_replace);

        let same = Lanes {
            state: Value::string("b"),
            ..changed
        };
        assert!(!run(&requires_replace(), &same).requires_replace);
    }

    #[test]
    fn test_requires_replace_if_configured() {
        let unset = Lanes {
            config: Value::null(Type::String),
            state: Value::string("a"),
            plan: Value::unknown(Type::String),
            state_root: root(),
            plan_root: root(),
        };
        assert!(!run(&requires_replace_if_configured(), &unset).requires_replace);
        assert!(run(&requires_replace(), &unset).requires_replace);
    }
}
