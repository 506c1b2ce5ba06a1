//! In-memory resource used by lifecycle and server tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value as Json};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::import::import_passthrough_id;
use super::{
    CreateRequest, DeleteRequest, DeleteResponse, ImportResponse, ImportState, ReadRequest,
    Resource, StateResponse, StateUpgrader, UpdateRequest, UpgradeState,
};
use crate::diag::{Diagnostic, DiagnosticClass, Diagnostics};
use crate::path::Path;
use crate::schema::planmodifier::{requires_replace, use_state_for_unknown};
use crate::schema::{Attribute, Schema};
use crate::value::json::from_json;
use crate::value::{CustomType, Number, Type, Value};

/// Decimal strings compared by numeric value.
#[derive(Debug)]
pub struct DecimalString;

impl CustomType for DecimalString {
    fn name(&self) -> &str {
        "decimal_string"
    }

    fn base_type(&self) -> Type {
        Type::String
    }

    fn semantic_equal(&self, prior: &Value, proposed: &Value) -> Result<bool, Diagnostics> {
        let parse = |v: &Value| v.as_str().and_then(|s| s.parse::<Number>().ok());
        Ok(parse(prior).is_some() && parse(prior) == parse(proposed))
    }
}

/// Knobs for misbehaving on purpose.
#[derive(Debug, Clone, Copy, Default)]
pub struct WidgetBehavior {
    /// Create returns no state.
    pub forget_state: bool,
    /// Create echoes the plan, unknowns included.
    pub leave_unknown: bool,
    /// Delete fails.
    pub fail_delete: bool,
    /// Create and update report the stored secret back in state.
    pub echo_secret: bool,
    /// Create returns an object carrying an attribute the schema lacks.
    pub extra_attribute: bool,
}

#[derive(Debug, Clone)]
struct Stored {
    name: String,
    size: Option<String>,
    secret: Option<String>,
}

/// A resource whose remote side is a map in memory.
///
/// The remote side normalizes `size` ("1.0" becomes "1"), which the
/// `decimal_string` type treats as semantically equal.
#[derive(Debug, Default, Clone)]
pub struct Widget {
    behavior: WidgetBehavior,
    store: Arc<Mutex<BTreeMap<String, Stored>>>,
}

impl Widget {
    pub fn with_behavior(behavior: WidgetBehavior) -> Self {
        Self {
            behavior,
            ..Self::default()
        }
    }

    pub fn stored_secret(&self, id: &str) -> Option<String> {
        self.store.lock().get(id).and_then(|s| s.secret.clone())
    }

    pub fn insert_remote(&self, id: &str, name: &str) {
        self.store.lock().insert(
            id.to_string(),
            Stored {
                name: name.to_string(),
                size: None,
                secret: None,
            },
        );
    }

    fn remember(&self, state: &Value) -> Option<String> {
        let id = state
            .attribute("id")
            .and_then(Value::as_str)
            .or_else(|| state.attribute("name").and_then(Value::as_str))?
            .to_string();
        let text = |name: &str| state.attribute(name).and_then(Value::as_str).map(str::to_string);
        let size = text("size").map(|s| s.parse::<Number>().map_or(s, |n| n.to_string()));
        self.store.lock().insert(
            id.clone(),
            Stored {
                name: text("name").unwrap_or_default(),
                size,
                secret: text("secret"),
            },
        );
        Some(id)
    }

    fn state_for(&self, id: &str) -> Option<Value> {
        let stored = self.store.lock().get(id).cloned()?;
        Some(widget_value(json!({
            "id": id,
            "name": stored.name,
            "size": stored.size,
        })))
    }

    fn applied_state(&self, id: &str) -> Option<Value> {
        let state = self.state_for(id)?;
        if !self.behavior.echo_secret {
            return Some(state);
        }
        let secret = self.store.lock().get(id).and_then(|s| s.secret.clone())?;
        state.with_attribute("secret", Value::string(secret)).ok()
    }
}

/// Decodes widget state from JSON.
pub fn widget_value(json: Json) -> Value {
    from_json(&Widget::default().schema().value_type(), &json, &Path::empty())
        .expect("widget json matches schema")
}

#[async_trait]
impl Resource for Widget {
    fn type_name(&self) -> String {
        "test_widget".to_string()
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .version(1)
            .attribute(
                "id",
                Attribute::string()
                    .computed()
                    .plan_modifier(use_state_for_unknown()),
            )
            .attribute(
                "name",
                Attribute::string().required().plan_modifier(requires_replace()),
            )
            .attribute("size", Attribute::custom(Arc::new(DecimalString)).optional())
            .attribute("secret", Attribute::string().optional().write_only())
    }

    async fn create(&self, req: CreateRequest, resp: &mut StateResponse) {
        if self.behavior.forget_state {
            return;
        }
        if self.behavior.leave_unknown {
            resp.state = req.planned_state;
            return;
        }
        if self.behavior.extra_attribute {
            let secret = req.planned_state.attribute("secret").cloned();
            resp.state = Value::object_from([
                ("id", Value::string("w")),
                ("name", Value::string("w")),
                ("secret", secret.unwrap_or_else(|| Value::null(Type::String))),
                ("extra", Value::bool(true)),
            ])
            .expect("object");
            return;
        }
        let Some(id) = self.remember(&req.planned_state) else {
            resp.diagnostics.push(Diagnostic::error(
                DiagnosticClass::RemoteOperation,
                "Create Failed",
                "Widget has no name.",
            ));
            return;
        };
        if let Some(state) = self.applied_state(&id) {
            resp.state = state;
        }
    }

    async fn read(&self, req: ReadRequest, resp: &mut StateResponse) {
        let id = req.state.attribute("id").and_then(Value::as_str).unwrap_or_default();
        match self.state_for(id) {
            Some(state) => resp.state = state,
            None => resp.state = Value::null(req.state.ty().clone()),
        }
    }

    async fn update(&self, req: UpdateRequest, resp: &mut StateResponse) {
        if let Some(id) = self.remember(&req.planned_state)
            && let Some(state) = self.applied_state(&id)
        {
            resp.state = state;
        }
    }

    async fn delete(&self, req: DeleteRequest, resp: &mut DeleteResponse) {
        if self.behavior.fail_delete {
            resp.diagnostics.push(Diagnostic::error(
                DiagnosticClass::RemoteOperation,
                "Delete Failed",
                "The widget is busy.",
            ));
            return;
        }
        if let Some(id) = req.prior_state.attribute("id").and_then(Value::as_str) {
            self.store.lock().remove(id);
        }
    }

    fn as_upgrade_state(&self) -> Option<&dyn UpgradeState> {
        Some(self)
    }

    fn as_import_state(&self) -> Option<&dyn ImportState> {
        Some(self)
    }
}

impl UpgradeState for Widget {
    fn state_upgraders(&self) -> BTreeMap<i64, StateUpgrader> {
        let mut upgraders = BTreeMap::new();
        // Version 0 called the name "title".
        upgraders.insert(
            0,
            StateUpgrader::new(|mut raw: Json| {
                if let Some(obj) = raw.as_object_mut()
                    && let Some(title) = obj.remove("title")
                {
                    obj.insert("name".to_string(), title);
                }
                Ok(raw)
            }),
        );
        upgraders
    }
}

#[async_trait]
impl ImportState for Widget {
    async fn import_state(&self, id: &str, resp: &mut ImportResponse) {
        import_passthrough_id("id", id, resp);
    }
}
