//! Schema-directed traversal shared by validation, plan modification,
//! semantic equality and write-only nullification.
//!
//! A walk carries a bundle of parallel values ("lanes", e.g. config, state and
//! plan) down the schema. One lane is primary: it decides whether to descend
//! and, for operations that rebuild, receives the modified children.
//!
//! Descent rules:
//! - an error raised at a node stops descent below that node only;
//! - null and unknown primaries are never descended into;
//! - list elements are matched across lanes by index, map entries by key;
//! - set elements are matched per lane (see [`Lanes::child`]).

use crate::diag::{Diagnostic, Diagnostics};
use crate::path::Path;
use crate::schema::{NestedObject, NestingMode, Node, Schema};
use crate::value::{Children, Kind, Type, Value};

/// How a child is reached from its parent.
#[derive(Debug, Clone, Copy)]
pub enum ChildStep<'a> {
    /// Object attribute or block.
    Attribute(&'a str),
    /// List element.
    ListIndex(usize),
    /// Set element at `index` of the primary lane, whose value is `element`.
    SetElement {
        /// Position in the primary lane.
        index: usize,
        /// Element value in the primary lane.
        element: &'a Value,
    },
    /// Map entry.
    MapKey(&'a str),
}

/// How one lane locates a set element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetMatch {
    /// Same position as in the primary lane.
    Position,
    /// Element equal to the primary lane's element.
    Value,
}

/// Projects `value` (one lane) onto a child.
///
/// Null and unknown parents yield null and unknown children of `ty`. Missing
/// elements yield null.
///
/// # Errors
///
/// Returns "Invalid Value Type" if `value` is not the container kind the
/// step expects.
pub fn project(
    value: &Value,
    step: &ChildStep<'_>,
    set_match: SetMatch,
    ty: &Type,
    path: &Path,
) -> Result<Value, Diagnostic> {
    if value.is_null() {
        return Ok(Value::null(ty.clone()));
    }
    if value.is_unknown() {
        return Ok(Value::unknown(ty.clone()));
    }

    let parent_path = path.parent().unwrap_or_default();
    let found = match step {
        ChildStep::Attribute(name) => value
            .expect_kind(Kind::Object, &parent_path)?
            .attribute(name)
            .cloned(),
        ChildStep::ListIndex(index) => value
            .expect_kind(Kind::List, &parent_path)?
            .elements()
            .and_then(|e| e.get(*index))
            .cloned(),
        ChildStep::SetElement { index, element } => {
            let elements = value
                .expect_kind(Kind::Set, &parent_path)?
                .elements()
                .unwrap_or_default();
            match set_match {
                SetMatch::Position => elements.get(*index).cloned(),
                SetMatch::Value => elements.iter().find(|e| e == element).cloned(),
            }
        }
        ChildStep::MapKey(key) => value
            .expect_kind(Kind::Map, &parent_path)?
            .entries()
            .and_then(|e| e.get(*key))
            .cloned(),
    };

    Ok(found.unwrap_or_else(|| Value::null(ty.clone())))
}

/// The values carried through a walk.
pub trait Lanes: Sized {
    /// The value that drives descent and receives rebuilt children.
    fn primary(&self) -> &Value;

    /// Replaces the primary value.
    fn set_primary(&mut self, value: Value);

    /// Consumes the bundle, returning the primary value.
    fn into_primary(self) -> Value;

    /// Projects every lane onto a child.
    ///
    /// # Errors
    ///
    /// Returns a diagnostic if a lane has the wrong container kind.
    fn child(&self, step: &ChildStep<'_>, ty: &Type, path: &Path) -> Result<Self, Diagnostic>;
}

/// A single-lane bundle.
#[derive(Debug, Clone)]
pub struct SingleLane(pub Value);

impl Lanes for SingleLane {
    fn primary(&self) -> &Value {
        &self.0
    }

    fn set_primary(&mut self, value: Value) {
        self.0 = value;
    }

    fn into_primary(self) -> Value {
        self.0
    }

    fn child(&self, step: &ChildStep<'_>, ty: &Type, path: &Path) -> Result<Self, Diagnostic> {
        project(&self.0, step, SetMatch::Position, ty, path).map(Self)
    }
}

/// The per-node logic of a walk.
pub trait WalkOp {
    /// Lane bundle type.
    type Lanes: Lanes;

    /// Runs at every attribute and block, before descending into it.
    fn visit_node(
        &mut self,
        node: Node<'_>,
        path: &Path,
        lanes: &mut Self::Lanes,
        diags: &mut Diagnostics,
    );

    /// Runs at every nested object instance, before its children.
    fn visit_object(
        &mut self,
        _object: &NestedObject,
        _path: &Path,
        _lanes: &mut Self::Lanes,
        _diags: &mut Diagnostics,
    ) {
    }

    /// Whether to descend below `node`. Only asked for known primaries.
    fn descend(&self, _node: Node<'_>, _lanes: &Self::Lanes) -> bool {
        true
    }

    /// Whether children are written back into their containers.
    fn rebuilds(&self) -> bool {
        false
    }
}

/// Walks a whole resource value.
pub fn walk_schema<O: WalkOp>(
    op: &mut O,
    schema: &Schema,
    lanes: &mut O::Lanes,
    diags: &mut Diagnostics,
) {
    walk_object(op, schema.root(), &Path::empty(), lanes, diags);
}

/// Walks one nested object instance.
pub fn walk_object<O: WalkOp>(
    op: &mut O,
    object: &NestedObject,
    path: &Path,
    lanes: &mut O::Lanes,
    diags: &mut Diagnostics,
) {
    let mut local = Diagnostics::new();
    op.visit_object(object, path, lanes, &mut local);
    let failed = local.has_error();
    diags.append(local);
    if failed || !lanes.primary().is_known() {
        return;
    }

    let mut children = match lanes.primary().expect_kind(Kind::Object, path) {
        Ok(value) => value.entries().cloned().unwrap_or_default(),
        Err(d) => {
            diags.push(d);
            return;
        }
    };

    let nodes = object
        .attributes()
        .iter()
        .map(|(name, attr)| (name, Node::Attribute(attr)))
        .chain(
            object
                .blocks()
                .iter()
                .map(|(name, block)| (name, Node::Block(block))),
        );

    for (name, node) in nodes {
        let child_path = path.at_name(name.clone());
        let mut child = match lanes.child(&ChildStep::Attribute(name), node.ty(), &child_path) {
            Ok(child) => child,
            Err(d) => {
                diags.push(d);
                continue;
            }
        };
        walk_node(op, node, &child_path, &mut child, diags);
        children.insert(name.clone(), child.into_primary());
    }

    if op.rebuilds() {
        match lanes.primary().rebuild(Children::Entries(children), path) {
            Ok(rebuilt) => lanes.set_primary(rebuilt),
            Err(d) => diags.append(d),
        }
    }
}

/// Walks one attribute or block.
pub fn walk_node<O: WalkOp>(
    op: &mut O,
    node: Node<'_>,
    path: &Path,
    lanes: &mut O::Lanes,
    diags: &mut Diagnostics,
) {
    let mut local = Diagnostics::new();
    op.visit_node(node, path, lanes, &mut local);
    let failed = local.has_error();
    diags.append(local);
    if failed {
        return;
    }

    let Some((mode, object)) = node.nested() else {
        return;
    };
    if !lanes.primary().is_known() || !op.descend(node, lanes) {
        return;
    }

    walk_nested(op, mode, object, path, lanes, diags);
}

fn walk_nested<O: WalkOp>(
    op: &mut O,
    mode: NestingMode,
    object: &NestedObject,
    path: &Path,
    lanes: &mut O::Lanes,
    diags: &mut Diagnostics,
) {
    let element_type = object.object_type();

    match mode {
        NestingMode::Single => walk_object(op, object, path, lanes, diags),
        NestingMode::List | NestingMode::Set => {
            let is_set = mode == NestingMode::Set;
            let kind = if is_set { Kind::Set } else { Kind::List };
            let elements = match lanes.primary().expect_kind(kind, path) {
                Ok(value) => value.elements().map(<[Value]>::to_vec).unwrap_or_default(),
                Err(d) => {
                    diags.push(d);
                    return;
                }
            };

            let mut rebuilt = Vec::with_capacity(elements.len());
            for (index, element) in elements.iter().enumerate() {
                let (step, child_path) = if is_set {
                    (
                        ChildStep::SetElement { index, element },
                        path.at_set_value(element.clone()),
                    )
                } else {
                    (ChildStep::ListIndex(index), path.at_list_index(index))
                };

                match lanes.child(&step, &element_type, &child_path) {
                    Ok(mut child) => {
                        walk_object(op, object, &child_path, &mut child, diags);
                        rebuilt.push(child.into_primary());
                    }
                    Err(d) => {
                        diags.push(d);
                        rebuilt.push(element.clone());
                    }
                }
            }

            if op.rebuilds() {
                match lanes.primary().rebuild(Children::Elements(rebuilt), path) {
                    Ok(value) => lanes.set_primary(value),
                    Err(d) => diags.append(d),
                }
            }
        }
        NestingMode::Map => {
            let entries = match lanes.primary().expect_kind(Kind::Map, path) {
                Ok(value) => value.entries().cloned().unwrap_or_default(),
                Err(d) => {
                    diags.push(d);
                    return;
                }
            };

            let mut rebuilt = entries.clone();
            for key in entries.keys() {
                let child_path = path.at_map_key(key.clone());
                match lanes.child(&ChildStep::MapKey(key), &element_type, &child_path) {
                    Ok(mut child) => {
                        walk_object(op, object, &child_path, &mut child, diags);
                        rebuilt.insert(key.clone(), child.into_primary());
                    }
                    Err(d) => diags.push(d),
                }
            }

            if op.rebuilds() {
                match lanes.primary().rebuild(Children::Entries(rebuilt), path) {
                    Ok(value) => lanes.set_primary(value),
                    Err(d) => diags.append(d),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::DiagnosticClass;
    use crate::schema::{Attribute, Block};
    use crate::value::json::from_json;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::new()
            .attribute("name", Attribute::string().required())
            .block(
                "rule",
                Block::list(
                    NestedObject::new()
                        .attribute("port", Attribute::number().required())
                        .attribute("label", Attribute::string().optional()),
                ),
            )
    }

    /// Records visited paths and uppercases every known string.
    #[derive(Default)]
    struct Recorder {
        visited: Vec<String>,
        fail_at: Option<String>,
    }

    impl WalkOp for Recorder {
        type Lanes = SingleLane;

        fn visit_node(
            &mut self,
            _node: Node<'_>,
            path: &Path,
            lanes: &mut SingleLane,
            diags: &mut Diagnostics,
        ) {
            let rendered = path.to_string();
            if self.fail_at.as_deref() == Some(rendered.as_str()) {
                diags.push(Diagnostic::error(DiagnosticClass::Provider, "stop", "").at(path));
            }
            if let Some(s) = lanes.0.as_str() {
                lanes.0 = Value::string(s.to_uppercase());
            }
            self.visited.push(rendered);
        }

        fn rebuilds(&self) -> bool {
            true
        }
    }

    fn config() -> Value {
        from_json(
            &schema().value_type(),
            &json!({
                "name": "web",
                "rule": [{"port": 80, "label": "http"}, {"port": 443}]
            }),
            &Path::empty(),
        )
        .expect("valid config")
    }

    #[test]
    fn test_visits_every_node_and_rebuilds() {
        let mut op = Recorder::default();
        let mut lanes = SingleLane(config());
        let mut diags = Diagnostics::new();
        walk_schema(&mut op, &schema(), &mut lanes, &mut diags);

        assert!(diags.is_empty());
        assert_eq!(
            op.visited,
            vec![
                "name",
                "rule",
                "rule[0].label",
                "rule[0].port",
                "rule[1].label",
                "rule[1].port",
            ]
        );
        let value = lanes.into_primary();
        assert_eq!(value.attribute("name"), Some(&Value::string("WEB")));
        assert_eq!(
            value.at_path(&Path::root("rule").at_list_index(0).at_name("label")),
            Some(&Value::string("HTTP"))
        );
    }

    #[test]
    fn test_error_stops_only_its_subtree() {
        let mut op = Recorder {
            fail_at: Some("rule".to_string()),
            ..Recorder::default()
        };
        let mut lanes = SingleLane(config());
        let mut diags = Diagnostics::new();
        walk_schema(&mut op, &schema(), &mut lanes, &mut diags);

        assert_eq!(diags.error_count(), 1);
        assert_eq!(op.visited, vec!["name", "rule"]);
        assert_eq!(
            lanes.into_primary().attribute("name"),
            Some(&Value::string("WEB"))
        );
    }

    #[test]
    fn test_null_and_unknown_are_not_descended() {
        let ty = schema().value_type();
        let mut attrs = config().entries().cloned().expect("object");
        attrs.insert(
            "rule".to_string(),
            Value::unknown(schema().get_block("rule").expect("block").ty().clone()),
        );
        let value = Value::object(ty.attribute_types().expect("object type"), attrs)
            .expect("valid object");

        let mut op = Recorder::default();
        let mut lanes = SingleLane(value);
        walk_schema(&mut op, &schema(), &mut lanes, &mut Diagnostics::new());
        assert_eq!(op.visited, vec!["name", "rule"]);
    }

    #[test]
    fn test_project_set_by_value_and_position() {
        let elem = Value::string("b");
        let set = Value::set(Type::String, vec![Value::string("a"), elem.clone()])
            .expect("valid set");
        let other = Value::set(Type::String, vec![Value::string("b"), Value::string("c")])
            .expect("valid set");
        let step = ChildStep::SetElement {
            index: 1,
            element: &elem,
        };
        let path = Path::root("s").at_set_value(elem.clone());

        assert_eq!(
            project(&set, &step, SetMatch::Value, &Type::String, &path).expect("projects"),
            elem
        );
        assert_eq!(
            project(&other, &step, SetMatch::Position, &Type::String, &path).expect("projects"),
            Value::string("c")
        );
        assert!(
            project(&Value::null(Type::set(Type::String)), &step, SetMatch::Value, &Type::String, &path)
                .expect("projects")
                .is_null()
        );
    }
}
