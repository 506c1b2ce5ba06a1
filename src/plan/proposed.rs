//! Proposed new state: configuration with unset computed attributes filled in
//! from prior state.
//!
//! This is the value plan modification starts from.

use crate::diag::{Diagnostic, Diagnostics};
use crate::path::Path;
use crate::schema::{NestedObject, NestingMode, Node, Schema};
use crate::value::{Type, Value};
use crate::walker::{project, walk_schema, ChildStep, Lanes, SetMatch, WalkOp};

/// Computes the proposed new state of a resource.
///
/// A null configuration (destroy) proposes null.
#[must_use]
pub fn proposed_new_state(schema: &Schema, config: &Value, prior: &Value) -> (Value, Diagnostics) {
    let mut diags = Diagnostics::new();
    if config.is_null() {
        return (schema.null_value(), diags);
    }

    let mut lanes = ProposedLanes {
        config: config.clone(),
        prior: prior.clone(),
        aligned_prior: None,
    };
    walk_schema(&mut ProposedOp, schema, &mut lanes, &mut diags);
    (lanes.config, diags)
}

struct ProposedLanes {
    config: Value,
    prior: Value,
    // Prior set elements reordered to line up with config elements.
    aligned_prior: Option<Vec<Value>>,
}

impl Lanes for ProposedLanes {
    fn primary(&self) -> &Value {
        &self.config
    }

    fn set_primary(&mut self, value: Value) {
        self.config = value;
    }

    fn into_primary(self) -> Value {
        self.config
    }

    fn child(&self, step: &ChildStep<'_>, ty: &Type, path: &Path) -> Result<Self, Diagnostic> {
        let prior = match (step, &self.aligned_prior) {
            (ChildStep::SetElement { index, .. }, Some(aligned)) => aligned
                .get(*index)
                .cloned()
                .unwrap_or_else(|| Value::null(ty.clone())),
            _ => project(&self.prior, step, SetMatch::Position, ty, path)?,
        };
        Ok(Self {
            config: project(&self.config, step, SetMatch::Position, ty, path)?,
            prior,
            aligned_prior: None,
        })
    }
}

struct ProposedOp;

/// Returns true if `prior` can be the prior instance of the configured set
/// element `config`: every configured attribute agrees.
fn same_instance(object: &NestedObject, config: &Value, prior: &Value) -> bool {
    object.attributes().iter().all(|(name, attr)| {
        let configured = config.attribute(name);
        match configured {
            Some(value) if value.is_null() && attr.is_computed() => true,
            Some(value) if value.is_unknown() => true,
            Some(value) => prior.attribute(name) == Some(value),
            None => true,
        }
    }) && object
        .blocks()
        .keys()
        .all(|name| config.attribute(name) == prior.attribute(name))
}

fn align_set(object: &NestedObject, config: &Value, prior: &Value) -> Option<Vec<Value>> {
    let config_elements = config.elements()?;
    let mut remaining: Vec<Value> = prior.elements()?.to_vec();
    let element_type = object.object_type();

    Some(
        config_elements
            .iter()
            .map(|element| {
                remaining
                    .iter()
                    .position(|candidate| same_instance(object, element, candidate))
                    .map_or_else(|| Value::null(element_type.clone()), |i| remaining.remove(i))
            })
            .collect(),
    )
}

impl WalkOp for ProposedOp {
    type Lanes = ProposedLanes;

    fn visit_node(
        &mut self,
        node: Node<'_>,
        _path: &Path,
        lanes: &mut ProposedLanes,
        _diags: &mut Diagnostics,
    ) {
        if let Node::Attribute(attr) = node
            && attr.is_computed()
            && lanes.config.is_null()
        {
            lanes.config = lanes.prior.clone();
            return;
        }

        if let Some((NestingMode::Set, object)) = node.nested()
            && lanes.config.is_known()
            && lanes.prior.is_known()
        {
            lanes.aligned_prior = align_set(object, &lanes.config, &lanes.prior);
        }
    }

    fn rebuilds(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, Block};
    use crate::value::json::from_json;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::new()
            .attribute("id", Attribute::string().computed())
            .attribute("name", Attribute::string().required())
            .attribute("mode", Attribute::string().optional().computed())
            .block(
                "member",
                Block::set(
                    NestedObject::new()
                        .attribute("name", Attribute::string().required())
                        .attribute("uid", Attribute::string().computed()),
                ),
            )
    }

    fn value(json: serde_json::Value) -> Value {
        from_json(&schema().value_type(), &json, &Path::empty()).expect("valid")
    }

    #[test]
    fn test_computed_values_come_from_prior() {
        let prior = value(json!({
            "id": "i-1", "name": "old", "mode": "0600",
            "member": [{"name": "a", "uid": "u-a"}, {"name": "b", "uid": "u-b"}]
        }));
        let config = value(json!({"name": "new", "member": [{"name": "b"}, {"name": "c"}]}));

        let (proposed, diags) = proposed_new_state(&schema(), &config, &prior);
        assert!(diags.is_empty(), "{diags}");
        assert_eq!(proposed.attribute("id"), Some(&Value::string("i-1")));
        assert_eq!(proposed.attribute("name"), Some(&Value::string("new")));
        assert_eq!(proposed.attribute("mode"), Some(&Value::string("0600")));

        let expected = value(json!({
            "member": [{"name": "b", "uid": "u-b"}, {"name": "c", "uid": null}]
        }));
        assert_eq!(proposed.attribute("member"), expected.attribute("member"));
    }

    #[test]
    fn test_destroy_proposes_null() {
        let prior = value(json!({"id": "i-1", "name": "x"}));
        let (proposed, _) = proposed_new_state(&schema(), &schema().null_value(), &prior);
        assert!(proposed.is_null());
    }

    #[test]
    fn test_create_uses_config() {
        let config = value(json!({"name": "x"}));
        let (proposed, _) = proposed_new_state(&schema(), &config, &schema().null_value());
        assert_eq!(proposed, config);
    }
}
