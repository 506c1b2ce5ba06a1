//! Write-only attributes are accepted in configuration and plans but never
//! persisted: every state that leaves the engine has them nulled.

use crate::diag::Diagnostics;
use crate::path::Path;
use crate::schema::{Node, Schema};
use crate::value::Value;
use crate::walker::{walk_schema, SingleLane, WalkOp};

struct NullifyOp;

impl WalkOp for NullifyOp {
    type Lanes = SingleLane;

    fn visit_node(
        &mut self,
        node: Node<'_>,
        _path: &Path,
        lanes: &mut SingleLane,
        _diags: &mut Diagnostics,
    ) {
        if node.is_write_only() && !lanes.0.is_null() {
            lanes.0 = Value::null(node.ty().clone());
        }
    }

    fn rebuilds(&self) -> bool {
        true
    }
}

/// Returns `state` with every write-only attribute set to null.
#[must_use]
pub fn nullify_write_only(schema: &Schema, state: &Value) -> (Value, Diagnostics) {
    let mut diags = Diagnostics::new();
    if !state.is_known() {
        return (state.clone(), diags);
    }
    let mut lanes = SingleLane(state.clone());
    walk_schema(&mut NullifyOp, schema, &mut lanes, &mut diags);
    (lanes.0, diags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, Block, NestedObject};
    use crate::value::json::from_json;
    use serde_json::json;

    #[test]
    fn test_write_only_values_are_erased() {
        let schema = Schema::new()
            .attribute("name", Attribute::string().required())
            .attribute("password", Attribute::string().optional().write_only())
            .block(
                "user",
                Block::list(
                    NestedObject::new()
                        .attribute("login", Attribute::string().required())
                        .attribute("token", Attribute::string().optional().write_only()),
                ),
            );
        let state = from_json(
            &schema.value_type(),
            &json!({
                "name": "db",
                "password": "hunter2",
                "user": [{"login": "a", "token": "t-a"}, {"login": "b"}]
            }),
            &Path::empty(),
        )
        .expect("valid");

        let (erased, diags) = nullify_write_only(&schema, &state);
        assert!(diags.is_empty());
        assert!(erased.attribute("password").is_some_and(Value::is_null));
        assert!(erased
            .at_path(&Path::root("user").at_list_index(0).at_name("token"))
            .is_some_and(Value::is_null));
        assert_eq!(erased.attribute("name"), Some(&Value::string("db")));
        assert_eq!(
            erased.at_path(&Path::root("user").at_list_index(1).at_name("login")),
            Some(&Value::string("b"))
        );
    }
}
