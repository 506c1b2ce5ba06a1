//! Attribute-level differences between prior and planned state.
//!
//! The diff walks the resource schema with the planned state as the primary
//! lane. Single nested objects are descended into; every other node is
//! compared as a whole. Sensitive attributes never reveal their values.

use tracing::debug;

use crate::diag::Diagnostics;
use crate::path::Path;
use crate::schema::{NestingMode, Node, Schema};
use crate::value::json::to_json;
use crate::value::{Type, Value};
use crate::walker::{project, walk_schema, ChildStep, Lanes, SetMatch, WalkOp};

/// Shown in place of a sensitive value.
pub const SENSITIVE_PLACEHOLDER: &str = "(sensitive value)";

/// Shown in place of an unknown value.
pub const UNKNOWN_PLACEHOLDER: &str = "(known after apply)";

/// Engine for computing attribute diffs.
#[derive(Debug, Default)]
pub struct DiffEngine;

/// One changed attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeChange {
    /// Attribute path.
    pub path: Path,
    /// Rendered prior value; `None` if absent.
    pub before: Option<String>,
    /// Rendered planned value; `None` if absent.
    pub after: Option<String>,
    /// Values are masked.
    pub sensitive: bool,
    /// Changing this attribute replaces the resource.
    pub forces_replacement: bool,
}

/// Prior and planned values at the same position.
struct DiffLanes {
    planned: Value,
    prior: Value,
}

impl Lanes for DiffLanes {
    fn primary(&self) -> &Value {
        &self.planned
    }

    fn set_primary(&mut self, value: Value) {
        self.planned = value;
    }

    fn into_primary(self) -> Value {
        self.planned
    }

    fn child(&self, step: &ChildStep<'_>, ty: &Type, path: &Path) -> Result<Self, crate::diag::Diagnostic> {
        Ok(Self {
            planned: project(&self.planned, step, SetMatch::Position, ty, path)?,
            prior: project(&self.prior, step, SetMatch::Value, ty, path)?,
        })
    }
}

struct DiffOp<'a> {
    requires_replace: &'a [Path],
    changes: Vec<AttributeChange>,
}

fn descends(node: Node<'_>, lanes: &DiffLanes) -> bool {
    matches!(node.nested(), Some((NestingMode::Single, _)))
        && lanes.planned.is_known()
        && (lanes.prior.is_known() || lanes.prior.is_null())
        && !node.is_sensitive()
}

impl WalkOp for DiffOp<'_> {
    type Lanes = DiffLanes;

    fn visit_node(&mut self, node: Node<'_>, path: &Path, lanes: &mut DiffLanes, _diags: &mut Diagnostics) {
        if descends(node, lanes) || lanes.planned == lanes.prior {
            return;
        }
        let sensitive = node.is_sensitive();
        self.changes.push(AttributeChange {
            path: path.clone(),
            before: present(&lanes.prior, sensitive),
            after: present(&lanes.planned, sensitive),
            sensitive,
            forces_replacement: self
                .requires_replace
                .iter()
                .any(|p| path.starts_with(p)),
        });
    }

    fn descend(&self, node: Node<'_>, lanes: &DiffLanes) -> bool {
        descends(node, lanes)
    }
}

fn present(value: &Value, sensitive: bool) -> Option<String> {
    if value.is_null() {
        return None;
    }
    Some(if sensitive {
        SENSITIVE_PLACEHOLDER.to_string()
    } else {
        render(value)
    })
}

/// Renders a value for display. Unknowns render as a placeholder.
#[must_use]
pub fn render(value: &Value) -> String {
    if value.is_unknown() || value.contains_unknown() {
        return UNKNOWN_PLACEHOLDER.to_string();
    }
    to_json(value, &Path::empty()).map_or_else(|_| UNKNOWN_PLACEHOLDER.to_string(), |json| json.to_string())
}

impl DiffEngine {
    /// Creates a new diff engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Lists the attributes that differ between `prior` and `planned`.
    #[must_use]
    pub fn attribute_changes(
        &self,
        schema: &Schema,
        prior: &Value,
        planned: &Value,
        requires_replace: &[Path],
    ) -> Vec<AttributeChange> {
        let mut op = DiffOp {
            requires_replace,
            changes: Vec::new(),
        };
        let mut lanes = DiffLanes {
            planned: if planned.is_null() { schema.null_value() } else { planned.clone() },
            prior: if prior.is_null() { schema.null_value() } else { prior.clone() },
        };
        let mut diags = Diagnostics::new();
        walk_schema(&mut op, schema, &mut lanes, &mut diags);
        if diags.has_error() {
            debug!("Diff walk reported problems: {diags}");
        }
        op.changes
    }
}

impl std::fmt::Display for AttributeChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let before = self.before.as_deref().unwrap_or("null");
        let after = self.after.as_deref().unwrap_or("null");
        write!(f, "{}: {before} -> {after}", self.path)?;
        if self.forces_replacement {
            write!(f, " (forces replacement)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::planmodifier::requires_replace;
    use crate::schema::{Attribute, Block, NestedObject};
    use crate::value::json::from_json;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::new()
            .attribute("id", Attribute::string().computed())
            .attribute("name", Attribute::string().required().plan_modifier(requires_replace()))
            .attribute("token", Attribute::string().optional().sensitive())
            .block(
                "limits",
                Block::single(
                    NestedObject::new()
                        .attribute("cpu", Attribute::number().optional())
                        .attribute("memory", Attribute::number().optional()),
                ),
            )
    }

    fn value(schema: &Schema, json: serde_json::Value) -> Value {
        from_json(&schema.value_type(), &json, &Path::empty()).expect("valid value")
    }

    #[test]
    fn test_no_changes() {
        let schema = schema();
        let v = value(&schema, json!({"id": "1", "name": "a", "token": null, "limits": null}));
        assert!(DiffEngine::new().attribute_changes(&schema, &v, &v, &[]).is_empty());
    }

    #[test]
    fn test_nested_and_replacement() {
        let schema = schema();
        let prior = value(
            &schema,
            json!({"id": "1", "name": "a", "token": "s1", "limits": {"cpu": 1, "memory": 2}}),
        );
        let planned = value(
            &schema,
            json!({"id": "1", "name": "b", "token": "s2", "limits": {"cpu": 2, "memory": 2}}),
        );
        let changes = DiffEngine::new().attribute_changes(
            &schema,
            &prior,
            &planned,
            &[Path::root("name")],
        );

        let rendered: Vec<String> = changes.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec![
                r#"name: "a" -> "b" (forces replacement)"#.to_string(),
                "token: (sensitive value) -> (sensitive value)".to_string(),
                "limits.cpu: 1 -> 2".to_string(),
            ]
        );
    }

    #[test]
    fn test_create_renders_unknown() {
        let schema = schema();
        let planned = value(&schema, json!({"id": null, "name": "a", "token": null, "limits": null}))
            .with_attribute("id", Value::unknown(Type::String))
            .expect("same type");
        let changes = DiffEngine::new().attribute_changes(&schema, &Value::null(schema.value_type()), &planned, &[]);

        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].after.as_deref(), Some(UNKNOWN_PLACEHOLDER));
        assert_eq!(changes[0].before, None);
        assert_eq!(changes[1].after.as_deref(), Some("\"a\""));
    }
}
