//! Semantic equality.
//!
//! After Read, Create and Update, values of custom types that differ only in
//! representation (e.g. `"1.0"` and `"1"`) are replaced with the prior value,
//! so the provider does not report a spurious diff.

use tracing::trace;

use crate::diag::{Diagnostic, Diagnostics};
use crate::path::Path;
use crate::schema::{NestedObject, Node, Schema};
use crate::value::{Type, Value};
use crate::walker::{project, walk_schema, ChildStep, Lanes, SetMatch, WalkOp};

/// Where semantic equality is checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SemanticScope {
    /// Top-level attributes and blocks only.
    #[default]
    TopLevel,
    /// Every attribute, nested ones included.
    Nested,
}

/// Replaces values of `new` that are semantically equal to `prior` with the
/// prior value.
///
/// Idempotent: applying the result again changes nothing.
#[must_use]
pub fn apply_semantic_equality(
    schema: &Schema,
    prior: &Value,
    new: &Value,
    scope: SemanticScope,
) -> (Value, Diagnostics) {
    let mut diags = Diagnostics::new();
    if !prior.is_known() || !new.is_known() || prior == new {
        return (new.clone(), diags);
    }

    let mut lanes = SemanticLanes {
        prior: prior.clone(),
        new: new.clone(),
    };
    let mut op = SemanticOp { scope };
    walk_schema(&mut op, schema, &mut lanes, &mut diags);
    (lanes.new, diags)
}

struct SemanticLanes {
    prior: Value,
    new: Value,
}

impl Lanes for SemanticLanes {
    fn primary(&self) -> &Value {
        &self.new
    }

    fn set_primary(&mut self, value: Value) {
        self.new = value;
    }

    fn into_primary(self) -> Value {
        self.new
    }

    fn child(&self, step: &ChildStep<'_>, ty: &Type, path: &Path) -> Result<Self, Diagnostic> {
        Ok(Self {
            prior: project(&self.prior, step, SetMatch::Position, ty, path)?,
            new: project(&self.new, step, SetMatch::Position, ty, path)?,
        })
    }
}

struct SemanticOp {
    scope: SemanticScope,
}

fn substitute(ty: &Type, path: &Path, lanes: &mut SemanticLanes, diags: &mut Diagnostics) {
    let Some(custom) = ty.as_custom() else {
        return;
    };
    if !lanes.prior.is_known() || !lanes.new.is_known() || lanes.prior == lanes.new {
        return;
    }

    match custom.semantic_equal(&lanes.prior.to_base(), &lanes.new.to_base()) {
        Ok(true) => {
            trace!(path = %path, custom_type = custom.name(), "Keeping prior value, values are semantically equal");
            lanes.new = lanes.prior.clone();
        }
        Ok(false) => {}
        Err(d) => diags.append(d),
    }
}

impl WalkOp for SemanticOp {
    type Lanes = SemanticLanes;

    fn visit_node(
        &mut self,
        node: Node<'_>,
        path: &Path,
        lanes: &mut SemanticLanes,
        diags: &mut Diagnostics,
    ) {
        substitute(node.ty(), path, lanes, diags);
    }

    fn visit_object(
        &mut self,
        object: &NestedObject,
        path: &Path,
        lanes: &mut SemanticLanes,
        diags: &mut Diagnostics,
    ) {
        if self.scope == SemanticScope::Nested {
            substitute(&object.object_type(), path, lanes, diags);
        }
    }

    fn descend(&self, _node: Node<'_>, _lanes: &SemanticLanes) -> bool {
        self.scope == SemanticScope::Nested
    }

    fn rebuilds(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, NestingMode};
    use crate::value::json::from_json;
    use crate::value::{CustomType, Number};
    use serde_json::json;
    use std::sync::Arc;

    /// Numbers written as strings, compared numerically.
    #[derive(Debug)]
    struct NumericString;

    impl CustomType for NumericString {
        fn name(&self) -> &str {
            "numeric_string"
        }

        fn base_type(&self) -> Type {
            Type::String
        }

        fn semantic_equal(&self, prior: &Value, proposed: &Value) -> Result<bool, Diagnostics> {
            let parse = |v: &Value| v.as_str().and_then(|s| s.parse::<Number>().ok());
            Ok(parse(prior).is_some() && parse(prior) == parse(proposed))
        }
    }

    fn schema() -> Schema {
        let numeric: Arc<dyn CustomType> = Arc::new(NumericString);
        Schema::new()
            .attribute("size", Attribute::custom(Arc::clone(&numeric)).optional())
            .attribute("plain", Attribute::string().optional())
            .attribute(
                "items",
                Attribute::nested(
                    NestingMode::List,
                    crate::schema::NestedObject::new()
                        .attribute("weight", Attribute::custom(numeric).optional()),
                )
                .optional(),
            )
    }

    fn value(json: serde_json::Value) -> Value {
        from_json(&schema().value_type(), &json, &Path::empty()).expect("valid")
    }

    #[test]
    fn test_semantically_equal_values_keep_prior() {
        let prior = value(json!({"size": "1.0", "plain": "a"}));
        let new = value(json!({"size": "1", "plain": "b"}));
        let (result, diags) = apply_semantic_equality(&schema(), &prior, &new, SemanticScope::TopLevel);

        assert!(diags.is_empty());
        assert_eq!(result.attribute("size"), prior.attribute("size"));
        assert_eq!(result.attribute("plain"), Some(&Value::string("b")));
    }

    #[test]
    fn test_idempotent() {
        let prior = value(json!({"size": "2.50"}));
        let new = value(json!({"size": "2.5"}));
        let (once, _) = apply_semantic_equality(&schema(), &prior, &new, SemanticScope::TopLevel);
        let (twice, _) = apply_semantic_equality(&schema(), &prior, &once, SemanticScope::TopLevel);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_value_compared_with_itself_is_returned_unchanged() {
        let samples = [
            value(json!({"size": "1.0", "plain": "a", "items": [{"weight": "2"}]})),
            value(json!({"size": null, "plain": null, "items": null})),
            schema().null_value(),
        ];
        for scope in [SemanticScope::TopLevel, SemanticScope::Nested] {
            for v in &samples {
                let (result, diags) = apply_semantic_equality(&schema(), v, v, scope);
                assert!(diags.is_empty(), "{diags}");
                assert_eq!(&result, v);
            }
        }
    }

    #[test]
    fn test_nested_only_when_enabled() {
        let prior = value(json!({"items": [{"weight": "3.0"}]}));
        let new = value(json!({"items": [{"weight": "3"}]}));

        let (top, _) = apply_semantic_equality(&schema(), &prior, &new, SemanticScope::TopLevel);
        assert_eq!(top, new);

        let (nested, _) = apply_semantic_equality(&schema(), &prior, &new, SemanticScope::Nested);
        assert_eq!(nested, prior);
    }

    #[test]
    fn test_different_values_are_kept() {
        let prior = value(json!({"size": "1"}));
        let new = value(json!({"size": "2"}));
        let (result, _) = apply_semantic_equality(&schema(), &prior, &new, SemanticScope::TopLevel);
        assert_eq!(result, new);
    }
}
