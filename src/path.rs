//! Addressing of locations inside a schema-typed value.

use serde::{Serialize, Serializer};
use std::fmt;

use crate::value::Value;

/// One step of a [`Path`].
#[derive(Debug, Clone, PartialEq)]
pub enum PathStep {
    /// An attribute or block name.
    Name(String),
    /// A position inside a list.
    ListIndex(usize),
    /// A set element, addressed by its own value.
    SetValue(Value),
    /// A key inside a map.
    MapKey(String),
}

/// A location inside a value, e.g. `rule[1].priority`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path {
    steps: Vec<PathStep>,
}

impl Path {
    /// The empty path, addressing the root object.
    #[must_use]
    pub const fn empty() -> Self {
        Self { steps: Vec::new() }
    }

    /// A path with a single top-level attribute step.
    #[must_use]
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            steps: vec![PathStep::Name(name.into())],
        }
    }

    fn with(&self, step: PathStep) -> Self {
        let mut steps = Vec::with_capacity(self.steps.len() + 1);
        steps.extend(self.steps.iter().cloned());
        steps.push(step);
        Self { steps }
    }

    /// Appends an attribute or block name.
    #[must_use]
    pub fn at_name(&self, name: impl Into<String>) -> Self {
        self.with(PathStep::Name(name.into()))
    }

    /// Appends a list index.
    #[must_use]
    pub fn at_list_index(&self, index: usize) -> Self {
        self.with(PathStep::ListIndex(index))
    }

    /// Appends a set element.
    #[must_use]
    pub fn at_set_value(&self, value: Value) -> Self {
        self.with(PathStep::SetValue(value))
    }

    /// Appends a map key.
    #[must_use]
    pub fn at_map_key(&self, key: impl Into<String>) -> Self {
        self.with(PathStep::MapKey(key.into()))
    }

    /// The steps of this path.
    #[must_use]
    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    /// The last step, if any.
    #[must_use]
    pub fn last_step(&self) -> Option<&PathStep> {
        self.steps.last()
    }

    /// The path without its last step.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.steps.split_last()?;
        Some(Self {
            steps: rest.to_vec(),
        })
    }

    /// Returns true for the root path.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns true if `self` equals `prefix` or lies below it.
    #[must_use]
    pub fn starts_with(&self, prefix: &Self) -> bool {
        self.steps.len() >= prefix.steps.len()
            && self.steps.iter().zip(&prefix.steps).all(|(a, b)| a == b)
    }

    /// Parses the dotted form accepted on the command line, e.g.
    /// `rule[1].labels["env"]`. Set steps cannot be expressed this way.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        let mut steps = Vec::new();
        let mut rest = input;

        while !rest.is_empty() {
            if let Some(stripped) = rest.strip_prefix('[') {
                let end = stripped.find(']')?;
                let inner = &stripped[..end];
                if let Some(key) = inner.strip_prefix('"').and_then(|k| k.strip_suffix('"')) {
                    steps.push(PathStep::MapKey(key.to_string()));
                } else {
                    steps.push(PathStep::ListIndex(inner.parse().ok()?));
                }
                rest = &stripped[end + 1..];
            } else {
                let rest_trimmed = if steps.is_empty() {
                    rest
                } else {
                    rest.strip_prefix('.')?
                };
                let end = rest_trimmed
                    .find(['.', '['])
                    .unwrap_or(rest_trimmed.len());
                let name = &rest_trimmed[..end];
                if name.is_empty() {
                    return None;
                }
                steps.push(PathStep::Name(name.to_string()));
                rest = &rest_trimmed[end..];
            }
        }

        Some(Self { steps })
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            match step {
                PathStep::Name(name) if i == 0 => write!(f, "{name}")?,
                PathStep::Name(name) => write!(f, ".{name}")?,
                PathStep::ListIndex(index) => write!(f, "[{index}]")?,
                PathStep::SetValue(value) => write!(f, "[Value({value})]")?,
                PathStep::MapKey(key) => write!(f, "[{key:?}]")?,
            }
        }
        Ok(())
    }
}

impl Serialize for Path {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Deduplicates `paths` and orders them by their rendered form.
///
/// Requires-replace paths are reported in this order so that plans are
/// byte-for-byte reproducible.
#[must_use]
pub fn normalize_paths(paths: Vec<Path>) -> Vec<Path> {
    let mut keyed: Vec<(String, Path)> = paths.into_iter().map(|p| (p.to_string(), p)).collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    keyed.dedup_by(|a, b| a.0 == b.0);
    keyed.into_iter().map(|(_, p)| p).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let path = Path::root("rule").at_list_index(1).at_name("priority");
        assert_eq!(path.to_string(), "rule[1].priority");

        let path = Path::root("labels").at_map_key("env");
        assert_eq!(path.to_string(), "labels[\"env\"]");

        let path = Path::root("tag").at_set_value(Value::string("a"));
        assert_eq!(path.to_string(), "tag[Value(\"a\")]");
    }

    #[test]
    fn test_parse() {
        let path = Path::parse("rule[1].labels[\"env\"]").expect("parses");
        assert_eq!(
            path,
            Path::root("rule")
                .at_list_index(1)
                .at_name("labels")
                .at_map_key("env")
        );
        assert!(Path::parse("rule..x").is_none());
        assert!(Path::parse("rule[x]").is_none());
    }

    #[test]
    fn test_parent_and_prefix() {
        let path = Path::root("a").at_name("b");
        assert_eq!(path.parent(), Some(Path::root("a")));
        assert!(path.starts_with(&Path::root("a")));
        assert!(!Path::root("a").starts_with(&path));
        assert_eq!(Path::empty().parent(), None);
    }

    #[test]
    fn test_normalize_paths() {
        let paths = vec![
            Path::root("b"),
            Path::root("a").at_list_index(1),
            Path::root("b"),
            Path::root("a").at_list_index(0),
        ];
        let normalized = normalize_paths(paths);
        let rendered: Vec<String> = normalized.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["a[0]", "a[1]", "b"]);
    }
}
