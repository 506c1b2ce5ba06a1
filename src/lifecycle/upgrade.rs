//! Schema version upgrades of persisted state.
//!
//! Persisted state is raw JSON tagged with the schema version that wrote it.
//! Upgraders run one version at a time until the current version is reached;
//! only then is the JSON decoded against the current schema.

use serde_json::Value as Json;
use std::fmt;
use tracing::debug;

use crate::diag::{Diagnostic, DiagnosticClass, Diagnostics};
use crate::path::Path;
use crate::schema::Schema;
use crate::value::json::from_json;
use crate::value::Value;

use super::write_only::nullify_write_only;
use super::Resource;

type UpgradeFn = dyn Fn(Json) -> Result<Json, Diagnostics> + Send + Sync;

/// Migrates raw state from one schema version to the next.
pub struct StateUpgrader {
    upgrade: Box<UpgradeFn>,
}

impl StateUpgrader {
    /// Wraps a migration function.
    pub fn new<F>(upgrade: F) -> Self
    where
        F: Fn(Json) -> Result<Json, Diagnostics> + Send + Sync + 'static,
    {
        Self {
            upgrade: Box::new(upgrade),
        }
    }

    /// Runs the migration.
    ///
    /// # Errors
    ///
    /// Returns the migration's diagnostics.
    pub fn upgrade(&self, raw: Json) -> Result<Json, Diagnostics> {
        (self.upgrade)(raw)
    }
}

impl fmt::Debug for StateUpgrader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateUpgrader").finish_non_exhaustive()
    }
}

/// Result of [`upgrade_state`].
#[derive(Debug, Clone)]
pub struct UpgradeOutcome {
    /// State decoded against the current schema.
    pub state: Value,
    /// The version upgraded from, if any upgrader ran.
    pub upgraded_from: Option<i64>,
    /// Problems found.
    pub diagnostics: Diagnostics,
}

/// Upgrades `raw` state written at `version` to the schema's current version.
pub fn upgrade_state(
    resource: &dyn Resource,
    schema: &Schema,
    version: i64,
    raw: Json,
) -> UpgradeOutcome {
    let current = schema.schema_version();
    let mut outcome = UpgradeOutcome {
        state: schema.null_value(),
        upgraded_from: None,
        diagnostics: Diagnostics::new(),
    };

    if version > current {
        outcome.diagnostics.push(Diagnostic::error(
            DiagnosticClass::LifecycleState,
            "Unsupported Resource State Version",
            format!(
                "The resource state was written by schema version {version}, which is newer \
                 than the current schema version {current}. Upgrade the provider."
            ),
        ));
        return outcome;
    }

    let mut raw = raw;
    if version < current {
        let upgraders = resource
            .as_upgrade_state()
            .map(super::UpgradeState::state_upgraders)
            .unwrap_or_default();

        for from in version..current {
            let Some(upgrader) = upgraders.get(&from) else {
                outcome.diagnostics.push(Diagnostic::error(
                    DiagnosticClass::LifecycleState,
                    "Unable to Upgrade Resource State",
                    format!(
                        "This resource has no state upgrader for version {from}, but state at \
                         version {version} must be upgraded to version {current}."
                    ),
                ));
                return outcome;
            };

            debug!(resource_type = %resource.type_name(), from, to = from + 1, "Upgrading resource state");
            match upgrader.upgrade(raw) {
                Ok(upgraded) => raw = upgraded,
                Err(d) => {
                    outcome.diagnostics.append(d);
                    return outcome;
                }
            }
        }
        outcome.upgraded_from = Some(version);
    }

    match from_json(&schema.value_type(), &raw, &Path::empty()) {
        Ok(state) => {
            let (state, diags) = nullify_write_only(schema, &state);
            outcome.diagnostics.append(diags);
            outcome.state = state;
        }
        Err(d) => outcome.diagnostics.append(d),
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::testing::Widget;
    use serde_json::json;

    #[test]
    fn test_upgrades_from_older_version() {
        let widget = Widget::default();
        let schema = widget.schema();
        let outcome = upgrade_state(
            &widget,
            &schema,
            0,
            json!({"id": "w", "title": "w", "secret": "leaked"}),
        );

        assert!(!outcome.diagnostics.has_error(), "{}", outcome.diagnostics);
        assert_eq!(outcome.upgraded_from, Some(0));
        assert_eq!(outcome.state.attribute("name"), Some(&Value::string("w")));
        assert!(outcome.state.attribute("secret").is_some_and(Value::is_null));
    }

    #[test]
    fn test_current_version_decodes_without_upgrade() {
        let widget = Widget::default();
        let schema = widget.schema();
        let outcome = upgrade_state(&widget, &schema, 1, json!({"id": "w", "name": "w"}));
        assert!(outcome.diagnostics.is_empty());
        assert_eq!(outcome.upgraded_from, None);
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let widget = Widget::default();
        let schema = widget.schema();
        let outcome = upgrade_state(&widget, &schema, 7, json!({}));
        assert!(outcome.state.is_null());
        assert_eq!(
            outcome.diagnostics.iter().next().map(|d| d.summary.as_str()),
            Some("Unsupported Resource State Version")
        );
    }

    #[test]
    fn test_missing_upgrader_is_an_error() {
        let widget = Widget::default();
        let schema = widget.schema().version(3);
        let outcome = upgrade_state(&widget, &schema, 0, json!({"title": "w"}));
        assert_eq!(
            outcome.diagnostics.iter().next().map(|d| d.summary.as_str()),
            Some("Unable to Upgrade Resource State")
        );
    }
}
