//! Drives create, read, update and delete.
//!
//! Every call follows the same shape: seed the response, call the provider,
//! check the result, then post-process the new state (semantic equality
//! against the reference value, write-only nullification).

use tracing::{debug, warn};

use crate::diag::{Diagnostic, DiagnosticClass, Diagnostics};
use crate::path::Path;
use crate::private::{PrivateState, ProviderData};
use crate::schema::Schema;
use crate::semantic::{apply_semantic_equality, SemanticScope};
use crate::value::Value;

use super::write_only::nullify_write_only;
use super::{
    CreateRequest, DataSource, DeleteRequest, DeleteResponse, ReadRequest, Resource,
    StateResponse, UpdateRequest,
};

/// Input to [`apply`].
#[derive(Debug, Clone)]
pub struct ApplyRequest {
    /// Configuration. Null on destroy.
    pub config: Value,
    /// Prior state. Null on create.
    pub prior_state: Value,
    /// Planned state. Null on destroy.
    pub planned_state: Value,
    /// Private state produced during planning.
    pub planned_private: PrivateState,
}

/// Output of [`apply`] and [`read`].
#[derive(Debug, Clone)]
pub struct LifecycleResponse {
    /// New state.
    pub new_state: Value,
    /// New private state.
    pub private: PrivateState,
    /// Problems found.
    pub diagnostics: Diagnostics,
}

/// Which provider call an apply turns into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyKind {
    /// Prior state is null.
    Create,
    /// Both are known.
    Update,
    /// Planned state is null.
    Delete,
}

impl ApplyKind {
    /// Picks the call for a prior/planned pair. `None` when both are null.
    #[must_use]
    pub const fn for_states(prior: &Value, planned: &Value) -> Option<Self> {
        match (prior.is_null(), planned.is_null()) {
            (true, true) => None,
            (true, false) => Some(Self::Create),
            (false, true) => Some(Self::Delete),
            (false, false) => Some(Self::Update),
        }
    }
}

fn first_unknown(value: &Value, path: &Path) -> Option<Path> {
    if value.is_unknown() {
        return Some(path.clone());
    }
    if let Some(inner) = value.dynamic_inner() {
        return first_unknown(inner, path);
    }
    let is_object = value.ty().attribute_types().is_some();
    if let Some(entries) = value.entries() {
        return entries.iter().find_map(|(key, child)| {
            let child_path = if is_object {
                path.at_name(key.clone())
            } else {
                path.at_map_key(key.clone())
            };
            first_unknown(child, &child_path)
        });
    }
    if let Some(elements) = value.elements() {
        return elements
            .iter()
            .enumerate()
            .find_map(|(i, child)| first_unknown(child, &path.at_list_index(i)));
    }
    None
}

/// Checks that state returned by the provider has the schema type and no
/// unknown values. Returns false if the type is wrong.
fn check_state(schema: &Schema, state: &Value, diags: &mut Diagnostics) -> bool {
    if state.ty() != &schema.value_type() {
        diags.push(Diagnostic::error(
            DiagnosticClass::LifecycleState,
            "Invalid Resource State",
            format!(
                "The provider returned state of type {}, which does not match the schema type {}.",
                state.ty(),
                schema.value_type()
            ),
        ));
        return false;
    }

    if let Some(path) = first_unknown(state, &Path::empty()) {
        diags.push(
            Diagnostic::error(
                DiagnosticClass::LifecycleState,
                "Provider returned invalid result object after apply",
                format!(
                    "After the apply operation, the provider still indicated an unknown value \
                     for {path}. All values must be known after apply."
                ),
            )
            .at(&path),
        );
    }
    true
}

/// Returns `state` with write-only attributes nulled. Null passes through.
fn erase_write_only(schema: &Schema, state: Value, diags: &mut Diagnostics) -> Value {
    if state.is_null() {
        return state;
    }
    let (state, write_only_diags) = nullify_write_only(schema, &state);
    diags.append(write_only_diags);
    state
}

/// Checks and post-processes state returned by the provider.
///
/// A state of the wrong type is discarded in favor of `fallback`, so nothing
/// the provider returned reaches the caller without write-only erasure.
fn finish_state(
    schema: &Schema,
    reference: &Value,
    fallback: Value,
    state: Value,
    diags: &mut Diagnostics,
) -> Value {
    if state.is_null() {
        return state;
    }
    if !check_state(schema, &state, diags) {
        warn!("Discarding provider state of the wrong type");
        return erase_write_only(schema, fallback, diags);
    }

    let (state, semantic_diags) =
        apply_semantic_equality(schema, reference, &state, SemanticScope::default());
    diags.append(semantic_diags);

    erase_write_only(schema, state, diags)
}

/// Creates the resource. The response is seeded with null state.
pub async fn create(resource: &dyn Resource, schema: &Schema, req: CreateRequest) -> StateResponse {
    let planned = req.planned_state.clone();
    let mut resp = StateResponse {
        state: schema.null_value(),
        private: req.private.clone(),
        diagnostics: Diagnostics::new(),
    };

    debug!(resource_type = %resource.type_name(), "Calling provider defined Resource Create");
    resource.create(req, &mut resp).await;
    debug!(resource_type = %resource.type_name(), "Called provider defined Resource Create");

    if !resp.diagnostics.has_error() && resp.state.is_null() {
        resp.diagnostics.push(Diagnostic::error(
            DiagnosticClass::LifecycleState,
            "Missing Resource State After Create",
            "The provider unexpectedly returned no resource state after having no errors in \
             the resource creation.",
        ));
    }

    resp.state = finish_state(
        schema,
        &planned,
        schema.null_value(),
        resp.state,
        &mut resp.diagnostics,
    );
    resp
}

/// Refreshes the resource. The response is seeded with the current state.
pub async fn read(resource: &dyn Resource, schema: &Schema, req: ReadRequest) -> StateResponse {
    let current = req.state.clone();
    let mut resp = StateResponse {
        state: req.state.clone(),
        private: req.private.clone(),
        diagnostics: Diagnostics::new(),
    };

    debug!(resource_type = %resource.type_name(), "Calling provider defined Resource Read");
    resource.read(req, &mut resp).await;
    debug!(resource_type = %resource.type_name(), "Called provider defined Resource Read");

    if resp.state.is_null() {
        debug!(resource_type = %resource.type_name(), "Resource no longer exists, removing from state");
        return resp;
    }

    resp.state = finish_state(
        schema,
        &current,
        current.clone(),
        resp.state,
        &mut resp.diagnostics,
    );
    resp
}

/// Updates the resource. The response is seeded with the planned state.
pub async fn update(resource: &dyn Resource, schema: &Schema, req: UpdateRequest) -> StateResponse {
    let planned = req.planned_state.clone();
    let prior = req.prior_state.clone();
    let mut resp = StateResponse {
        state: req.planned_state.clone(),
        private: req.private.clone(),
        diagnostics: Diagnostics::new(),
    };

    debug!(resource_type = %resource.type_name(), "Calling provider defined Resource Update");
    resource.update(req, &mut resp).await;
    debug!(resource_type = %resource.type_name(), "Called provider defined Resource Update");

    if !resp.diagnostics.has_error() && resp.state.is_null() {
        resp.diagnostics.push(Diagnostic::error(
            DiagnosticClass::LifecycleState,
            "Missing Resource State After Update",
            "The provider unexpectedly returned no resource state after having no errors in \
             the resource update.",
        ));
    }

    resp.state = finish_state(schema, &planned, prior, resp.state, &mut resp.diagnostics);
    resp
}

/// Deletes the resource. On error the prior state is kept.
pub async fn delete(resource: &dyn Resource, schema: &Schema, req: DeleteRequest) -> StateResponse {
    let prior = req.prior_state.clone();
    let private = req.private.clone();
    let mut resp = DeleteResponse::default();

    debug!(resource_type = %resource.type_name(), "Calling provider defined Resource Delete");
    resource.delete(req, &mut resp).await;
    debug!(resource_type = %resource.type_name(), "Called provider defined Resource Delete");

    let state = if resp.diagnostics.has_error() {
        warn!(resource_type = %resource.type_name(), "Delete failed, keeping prior state");
        prior
    } else {
        schema.null_value()
    };

    StateResponse {
        state,
        private,
        diagnostics: resp.diagnostics,
    }
}

/// Reads a data source. The response is seeded with the configuration.
pub async fn read_data_source(
    data_source: &dyn DataSource,
    schema: &Schema,
    config: Value,
) -> StateResponse {
    let mut resp = StateResponse {
        state: config.clone(),
        private: ProviderData::new(),
        diagnostics: Diagnostics::new(),
    };

    debug!(data_source_type = %data_source.type_name(), "Calling provider defined DataSource Read");
    data_source.read(config, &mut resp).await;
    debug!(data_source_type = %data_source.type_name(), "Called provider defined DataSource Read");

    if resp.state.is_null() {
        if resp.diagnostics.has_error() {
            return resp;
        }
        resp.diagnostics.push(Diagnostic::error(
            DiagnosticClass::LifecycleState,
            "Missing Data Source State",
            "The provider unexpectedly returned no data source state after having no errors \
             in the read.",
        ));
        return resp;
    }
    let state = std::mem::replace(&mut resp.state, schema.null_value());
    if check_state(schema, &state, &mut resp.diagnostics) {
        resp.state = erase_write_only(schema, state, &mut resp.diagnostics);
    }
    resp
}

/// Applies a planned change, dispatching to create, update or delete.
pub async fn apply(resource: &dyn Resource, schema: &Schema, req: ApplyRequest) -> LifecycleResponse {
    let engine_private = req.planned_private.clone();
    let provider_private = req.planned_private.provider.clone();

    let resp = match ApplyKind::for_states(&req.prior_state, &req.planned_state) {
        None => StateResponse {
            state: schema.null_value(),
            private: provider_private,
            diagnostics: Diagnostics::new(),
        },
        Some(ApplyKind::Create) => {
            create(
                resource,
                schema,
                CreateRequest {
                    config: req.config,
                    planned_state: req.planned_state,
                    private: provider_private,
                },
            )
            .await
        }
        Some(ApplyKind::Update) => {
            update(
                resource,
                schema,
                UpdateRequest {
                    config: req.config,
                    planned_state: req.planned_state,
                    prior_state: req.prior_state,
                    private: provider_private,
                },
            )
            .await
        }
        Some(ApplyKind::Delete) => {
            delete(
                resource,
                schema,
                DeleteRequest {
                    prior_state: req.prior_state,
                    private: provider_private,
                },
            )
            .await
        }
    };

    let private = if resp.state.is_null() {
        PrivateState::default()
    } else {
        engine_private.with_provider(resp.private)
    };

    LifecycleResponse {
        new_state: resp.state,
        private,
        diagnostics: resp.diagnostics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::testing::{widget_value, Widget, WidgetBehavior};
    use serde_json::json;

    #[tokio::test]
    async fn test_create_and_read() {
        let widget = Widget::default();
        let schema = widget.schema();
        let config = widget_value(json!({"name": "w", "size": "1.0", "secret": "s"}));
        let planned = crate::plan::modify_plan(crate::plan::PlanRequest {
            schema: &schema,
            config: &config,
            prior_state: &schema.null_value(),
            proposed_new_state: &config,
            private: &ProviderData::new(),
            mark_computed_unknown: true,
        })
        .planned_state;

        let resp = apply(
            &widget,
            &schema,
            ApplyRequest {
                config,
                prior_state: schema.null_value(),
                planned_state: planned,
                planned_private: PrivateState::default(),
            },
        )
        .await;

        assert!(!resp.diagnostics.has_error(), "{}", resp.diagnostics);
        let state = resp.new_state;
        assert_eq!(state.attribute("id"), Some(&Value::string("w")));
        assert!(state.attribute("secret").is_some_and(Value::is_null));
        assert_eq!(widget.stored_secret("w").as_deref(), Some("s"));

        // The remote side normalizes "1.0" to "1"; semantic equality keeps "1.0".
        let refreshed = read(
            &widget,
            &schema,
            ReadRequest {
                state: state.clone(),
                private: ProviderData::new(),
            },
        )
        .await;
        assert!(!refreshed.diagnostics.has_error());
        assert_eq!(refreshed.state, state);
    }

    #[tokio::test]
    async fn test_missing_state_after_create() {
        let widget = Widget::with_behavior(WidgetBehavior {
            forget_state: true,
            ..WidgetBehavior::default()
        });
        let schema = widget.schema();
        let config = widget_value(json!({"name": "w"}));
        let resp = create(
            &widget,
            &schema,
            CreateRequest {
                config: config.clone(),
                planned_state: config,
                private: ProviderData::new(),
            },
        )
        .await;

        assert_eq!(resp.diagnostics.error_count(), 1);
        let diag = resp.diagnostics.iter().next().expect("diagnostic");
        assert_eq!(diag.class, DiagnosticClass::LifecycleState);
        assert_eq!(diag.summary, "Missing Resource State After Create");
    }

    #[tokio::test]
    async fn test_unknown_after_apply_is_rejected() {
        let widget = Widget::with_behavior(WidgetBehavior {
            leave_unknown: true,
            ..WidgetBehavior::default()
        });
        let schema = widget.schema();
        let config = widget_value(json!({"name": "w"}));
        let planned = config
            .with_attribute("id", Value::unknown(crate::value::Type::String))
            .expect("attribute exists");
        let resp = create(
            &widget,
            &schema,
            CreateRequest {
                config,
                planned_state: planned,
                private: ProviderData::new(),
            },
        )
        .await;
        assert!(resp.diagnostics.has_error());
        assert_eq!(
            resp.diagnostics.iter().next().and_then(|d| d.path.clone()),
            Some(Path::root("id"))
        );
    }

    #[tokio::test]
    async fn test_read_of_missing_object_returns_null() {
        let widget = Widget::default();
        let schema = widget.schema();
        let state = widget_value(json!({"id": "gone", "name": "gone"}));
        let resp = read(
            &widget,
            &schema,
            ReadRequest {
                state,
                private: ProviderData::new(),
            },
        )
        .await;
        assert!(resp.state.is_null());
        assert!(!resp.diagnostics.has_error());
    }

    #[tokio::test]
    async fn test_delete_dispatch_and_failure_keeps_state() {
        let widget = Widget::with_behavior(WidgetBehavior {
            fail_delete: true,
            ..WidgetBehavior::default()
        });
        let schema = widget.schema();
        let prior = widget_value(json!({"id": "w", "name": "w"}));

        let mut private = PrivateState::default();
        private.set_engine_key("marker", json!(true));
        let resp = apply(
            &widget,
            &schema,
            ApplyRequest {
                config: schema.null_value(),
                prior_state: prior.clone(),
                planned_state: schema.null_value(),
                planned_private: private.clone(),
            },
        )
        .await;
        assert!(resp.diagnostics.has_error());
        assert_eq!(resp.new_state, prior);
        assert_eq!(resp.private, private);

        let ok = Widget::default();
        let resp = apply(
            &ok,
            &schema,
            ApplyRequest {
                config: schema.null_value(),
                prior_state: prior,
                planned_state: schema.null_value(),
                planned_private: private,
            },
        )
        .await;
        assert!(resp.new_state.is_null());
        assert_eq!(resp.private, PrivateState::default());
    }

    #[tokio::test]
    async fn test_mistyped_create_state_never_carries_write_only_values() {
        let widget = Widget::with_behavior(WidgetBehavior {
            extra_attribute: true,
            ..WidgetBehavior::default()
        });
        let schema = widget.schema();
        let config = widget_value(json!({"name": "w", "secret": "hunter2"}));
        let resp = create(
            &widget,
            &schema,
            CreateRequest {
                config: config.clone(),
                planned_state: config,
                private: ProviderData::new(),
            },
        )
        .await;

        assert_eq!(resp.diagnostics.error_count(), 1);
        assert_eq!(
            resp.diagnostics.iter().next().map(|d| d.summary.as_str()),
            Some("Invalid Resource State")
        );
        assert!(resp.state.is_null());
        assert_eq!(resp.state.ty(), &schema.value_type());
    }

    #[tokio::test]
    async fn test_update_erases_write_only_values() {
        let widget = Widget::with_behavior(WidgetBehavior {
            echo_secret: true,
            ..WidgetBehavior::default()
        });
        let schema = widget.schema();
        let prior = widget_value(json!({"id": "w", "name": "w", "size": "1"}));
        widget.insert_remote("w", "w");
        let config = widget_value(json!({"name": "w", "size": "2", "secret": "rotated"}));
        let planned = widget_value(json!({"id": "w", "name": "w", "size": "2", "secret": "rotated"}));

        let resp = apply(
            &widget,
            &schema,
            ApplyRequest {
                config,
                prior_state: prior,
                planned_state: planned,
                planned_private: PrivateState::default(),
            },
        )
        .await;

        assert!(!resp.diagnostics.has_error(), "{}", resp.diagnostics);
        assert_eq!(widget.stored_secret("w").as_deref(), Some("rotated"));
        assert_eq!(resp.new_state.attribute("size").and_then(Value::as_str), Some("2"));
        assert!(resp.new_state.attribute("secret").is_some_and(Value::is_null));
    }

    /// Data source that fails its read but still hands back the configuration.
    struct FailingLookup;

    #[async_trait::async_trait]
    impl DataSource for FailingLookup {
        fn type_name(&self) -> String {
            "test_lookup".to_string()
        }

        fn schema(&self) -> Schema {
            Schema::new()
                .attribute("key", crate::schema::Attribute::string().required())
                .attribute(
                    "token",
                    crate::schema::Attribute::string().optional().write_only(),
                )
        }

        async fn read(&self, _config: Value, resp: &mut StateResponse) {
            resp.diagnostics.push(Diagnostic::error(
                DiagnosticClass::RemoteOperation,
                "Lookup Failed",
                "The lookup service is unavailable.",
            ));
        }
    }

    #[tokio::test]
    async fn test_failed_data_source_read_erases_write_only_values() {
        let schema = FailingLookup.schema();
        let config = crate::value::json::from_json(
            &schema.value_type(),
            &json!({"key": "k", "token": "t-1"}),
            &Path::empty(),
        )
        .expect("valid");

        let resp = read_data_source(&FailingLookup, &schema, config).await;
        assert_eq!(resp.diagnostics.error_count(), 1);
        assert_eq!(resp.state.attribute("key").and_then(Value::as_str), Some("k"));
        assert!(resp.state.attribute("token").is_some_and(Value::is_null));
    }

    #[test]
    fn test_apply_kind() {
        let known = Value::string("x");
        let null = Value::null(crate::value::Type::String);
        assert_eq!(ApplyKind::for_states(&null, &known), Some(ApplyKind::Create));
        assert_eq!(ApplyKind::for_states(&known, &null), Some(ApplyKind::Delete));
        assert_eq!(ApplyKind::for_states(&known, &known), Some(ApplyKind::Update));
        assert_eq!(ApplyKind::for_states(&null, &null), None);
    }
}
