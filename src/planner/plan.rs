//! Workspace plan types.
//!
//! A [`WorkspacePlan`] holds one [`ResourceChange`] per address the
//! workspace knows about: configured resources and resources only present in
//! state. Each change carries everything apply needs, so execution does not
//! plan again.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::diag::Diagnostics;
use crate::path::Path;
use crate::private::PrivateState;
use crate::value::Value;

use super::diff::AttributeChange;

/// A complete workspace plan.
#[derive(Debug)]
pub struct WorkspacePlan {
    /// When the plan was created.
    pub created_at: DateTime<Utc>,
    /// Configuration hash this plan is based on.
    pub config_hash: String,
    /// Planned changes, in execution order.
    pub changes: Vec<ResourceChange>,
    /// Warnings and errors collected while planning.
    pub diagnostics: Diagnostics,
}

/// The planned change for one resource.
#[derive(Debug, Clone)]
pub struct ResourceChange {
    /// `type.name` address.
    pub address: String,
    /// Resource type.
    pub type_name: String,
    /// Resource name.
    pub name: String,
    /// What apply will do.
    pub action: Action,
    /// Configuration. Null for deletes.
    pub config: Value,
    /// State before the change. Null for creates.
    pub prior_state: Value,
    /// Private state stored with the prior state.
    pub prior_private: PrivateState,
    /// Planned state. Null for deletes.
    pub planned_state: Value,
    /// Private state to hand to apply.
    pub planned_private: PrivateState,
    /// Paths forcing replacement.
    pub requires_replace: Vec<Path>,
    /// Attribute-level differences.
    pub details: Vec<AttributeChange>,
    /// Hash of the configuration block.
    pub config_hash: String,
}

/// Types of actions in a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Delete a resource no longer configured.
    Delete,
    /// Delete then create.
    Replace,
    /// Create a new resource.
    Create,
    /// Update in place.
    Update,
    /// Nothing to do.
    NoOp,
}

impl Action {
    /// Classifies a planned change.
    #[must_use]
    pub fn classify(prior: &Value, planned: &Value, requires_replace: &[Path]) -> Self {
        match (prior.is_null(), planned.is_null()) {
            (true, true) => Self::NoOp,
            (true, false) => Self::Create,
            (false, true) => Self::Delete,
            (false, false) if prior == planned => Self::NoOp,
            (false, false) if !requires_replace.is_empty() => Self::Replace,
            (false, false) => Self::Update,
        }
    }

    /// Symbol used when rendering plans.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Create => "+",
            Self::Update => "~",
            Self::Replace => "-/+",
            Self::Delete => "-",
            Self::NoOp => " ",
        }
    }
}

impl WorkspacePlan {
    /// Creates a plan, sorting changes into execution order: deletes first,
    /// then replacements, creates and updates; by address within each group.
    #[must_use]
    pub fn new(config_hash: &str, mut changes: Vec<ResourceChange>, diagnostics: Diagnostics) -> Self {
        changes.sort_by(|a, b| a.action.cmp(&b.action).then_with(|| a.address.cmp(&b.address)));
        Self {
            created_at: Utc::now(),
            config_hash: config_hash.to_string(),
            changes,
            diagnostics,
        }
    }

    /// Returns true if the plan changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.iter().all(|c| c.action == Action::NoOp)
    }

    /// Changes that do something.
    pub fn actionable(&self) -> impl Iterator<Item = &ResourceChange> {
        self.changes.iter().filter(|c| c.action != Action::NoOp)
    }

    /// Number of changes with `action`.
    #[must_use]
    pub fn count(&self, action: Action) -> usize {
        self.changes.iter().filter(|c| c.action == action).count()
    }

    /// Finds a change by address.
    #[must_use]
    pub fn change(&self, address: &str) -> Option<&ResourceChange> {
        self.changes.iter().find(|c| c.address == address)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Replace => "replace",
            Self::Delete => "delete",
            Self::NoOp => "no-op",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for ResourceChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.action.symbol(), self.address)
    }
}

impl std::fmt::Display for WorkspacePlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "No changes. Infrastructure matches the configuration.");
        }

        writeln!(
            f,
            "Plan: {} to add, {} to change, {} to replace, {} to destroy.",
            self.count(Action::Create),
            self.count(Action::Update),
            self.count(Action::Replace),
            self.count(Action::Delete)
        )?;
        for change in self.actionable() {
            writeln!(f, "  {change}")?;
            for detail in &change.details {
                writeln!(f, "      {detail}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Type;

    fn change(address: &str, action: Action) -> ResourceChange {
        let (type_name, name) = address.split_once('.').expect("address");
        ResourceChange {
            address: address.to_string(),
            type_name: type_name.to_string(),
            name: name.to_string(),
            action,
            config: Value::null(Type::Dynamic),
            prior_state: Value::null(Type::Dynamic),
            prior_private: PrivateState::default(),
            planned_state: Value::null(Type::Dynamic),
            planned_private: PrivateState::default(),
            requires_replace: vec![],
            details: vec![],
            config_hash: String::new(),
        }
    }

    #[test]
    fn test_classify() {
        let null = Value::null(Type::String);
        let a = Value::string("a");
        let b = Value::string("b");
        assert_eq!(Action::classify(&null, &a, &[]), Action::Create);
        assert_eq!(Action::classify(&a, &null, &[]), Action::Delete);
        assert_eq!(Action::classify(&a, &a, &[Path::root("x")]), Action::NoOp);
        assert_eq!(Action::classify(&a, &b, &[]), Action::Update);
        assert_eq!(Action::classify(&a, &b, &[Path::root("x")]), Action::Replace);
        assert_eq!(Action::classify(&null, &null, &[]), Action::NoOp);
    }

    #[test]
    fn test_execution_order() {
        let plan = WorkspacePlan::new(
            "h",
            vec![
                change("t.b", Action::Create),
                change("t.c", Action::Update),
                change("t.a", Action::Create),
                change("t.z", Action::Delete),
                change("t.y", Action::NoOp),
            ],
            Diagnostics::new(),
        );
        let order: Vec<&str> = plan.changes.iter().map(|c| c.address.as_str()).collect();
        assert_eq!(order, vec!["t.z", "t.a", "t.b", "t.c", "t.y"]);
        assert_eq!(plan.count(Action::Create), 2);
        assert!(!plan.is_empty());
        assert_eq!(plan.actionable().count(), 4);
    }

    #[test]
    fn test_empty_plan_display() {
        let plan = WorkspacePlan::new("h", vec![change("t.a", Action::NoOp)], Diagnostics::new());
        assert!(plan.is_empty());
        assert!(plan.to_string().starts_with("No changes"));
    }
}
