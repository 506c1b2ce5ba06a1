//! Schema-typed values.
//!
//! Every [`Value`] carries its [`Type`] and is in exactly one of three states:
//! null, unknown (to be determined at apply time) or known. Container
//! constructors check element types, so a value can never disagree with its
//! own type descriptor.

pub mod json;
mod number;
mod types;

pub use number::{Number, ParseNumberError};
pub use types::{CustomType, Kind, Type};

use std::collections::BTreeMap;
use std::fmt;

use crate::diag::{Diagnostic, DiagnosticClass, Diagnostics};
use crate::path::{Path, PathStep};

/// Null, unknown or known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueState {
    /// Explicitly absent.
    Null,
    /// Determined at apply time.
    Unknown,
    /// Carries a payload.
    Known,
}

/// Payload of a known value.
#[derive(Debug, Clone)]
pub enum Known {
    /// Boolean payload.
    Bool(bool),
    /// Number payload.
    Number(Number),
    /// String payload.
    String(String),
    /// List elements in order.
    List(Vec<Value>),
    /// Set elements, pairwise distinct.
    Set(Vec<Value>),
    /// Map entries.
    Map(BTreeMap<String, Value>),
    /// Object attributes.
    Object(BTreeMap<String, Value>),
    /// Value of a dynamic type.
    Dynamic(Box<Value>),
}

#[derive(Debug, Clone)]
enum Data {
    Null,
    Unknown,
    Known(Known),
}

/// A typed value.
#[derive(Debug, Clone)]
pub struct Value {
    ty: Type,
    data: Data,
}

/// Children handed to [`Value::rebuild`].
#[derive(Debug, Clone)]
pub enum Children {
    /// List or set elements.
    Elements(Vec<Value>),
    /// Map entries or object attributes.
    Entries(BTreeMap<String, Value>),
}

fn conversion_error(detail: String) -> Diagnostic {
    Diagnostic::error(DiagnosticClass::PlanConsistency, "Value Conversion Error", detail)
}

impl Value {
    /// Null value of `ty`.
    #[must_use]
    pub const fn null(ty: Type) -> Self {
        Self { ty, data: Data::Null }
    }

    /// Unknown value of `ty`.
    #[must_use]
    pub const fn unknown(ty: Type) -> Self {
        Self {
            ty,
            data: Data::Unknown,
        }
    }

    /// Known boolean.
    #[must_use]
    pub const fn bool(value: bool) -> Self {
        Self {
            ty: Type::Bool,
            data: Data::Known(Known::Bool(value)),
        }
    }

    /// Known number.
    #[must_use]
    pub fn number(value: impl Into<Number>) -> Self {
        Self {
            ty: Type::Number,
            data: Data::Known(Known::Number(value.into())),
        }
    }

    /// Known string.
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            ty: Type::String,
            data: Data::Known(Known::String(value.into())),
        }
    }

    /// Wraps `inner` into a known dynamic value.
    #[must_use]
    pub fn dynamic(inner: Self) -> Self {
        if inner.ty == Type::Dynamic {
            return inner;
        }
        Self {
            ty: Type::Dynamic,
            data: Data::Known(Known::Dynamic(Box::new(inner))),
        }
    }

    fn conform(element_type: &Type, value: Self) -> Result<Self, Diagnostic> {
        if &value.ty == element_type {
            return Ok(value);
        }
        if *element_type == Type::Dynamic {
            return Ok(Self::dynamic(value));
        }
        Err(conversion_error(format!(
            "Expected element of type {element_type}, got {}.",
            value.ty
        )))
    }

    /// Known list.
    ///
    /// # Errors
    ///
    /// Returns a diagnostic if an element is not of `element_type`.
    pub fn list(element_type: Type, elements: Vec<Self>) -> Result<Self, Diagnostic> {
        let elements = elements
            .into_iter()
            .map(|e| Self::conform(&element_type, e))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            ty: Type::list(element_type),
            data: Data::Known(Known::List(elements)),
        })
    }

    /// Known set. Duplicate elements are dropped, keeping the first.
    ///
    /// # Errors
    ///
    /// Returns a diagnostic if an element is not of `element_type`.
    pub fn set(element_type: Type, elements: Vec<Self>) -> Result<Self, Diagnostic> {
        let mut distinct: Vec<Self> = Vec::with_capacity(elements.len());
        for element in elements {
            let element = Self::conform(&element_type, element)?;
            if !distinct.contains(&element) {
                distinct.push(element);
            }
        }
        Ok(Self {
            ty: Type::set(element_type),
            data: Data::Known(Known::Set(distinct)),
        })
    }

    /// Known map.
    ///
    /// # Errors
    ///
    /// Returns a diagnostic if an entry is not of `element_type`.
    pub fn map(element_type: Type, entries: BTreeMap<String, Self>) -> Result<Self, Diagnostic> {
        let entries = entries
            .into_iter()
            .map(|(k, v)| Self::conform(&element_type, v).map(|v| (k, v)))
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        Ok(Self {
            ty: Type::map(element_type),
            data: Data::Known(Known::Map(entries)),
        })
    }

    /// Known object.
    ///
    /// # Errors
    ///
    /// Returns a diagnostic if the attribute names differ from
    /// `attribute_types` or an attribute has the wrong type.
    pub fn object(
        attribute_types: BTreeMap<String, Type>,
        attributes: BTreeMap<String, Self>,
    ) -> Result<Self, Diagnostic> {
        if let Some(extra) = attributes.keys().find(|k| !attribute_types.contains_key(*k)) {
            return Err(conversion_error(format!(
                "Object has unexpected attribute {extra:?}."
            )));
        }

        let mut checked = BTreeMap::new();
        let mut attributes = attributes;
        for (name, ty) in &attribute_types {
            let value = attributes.remove(name).ok_or_else(|| {
                conversion_error(format!("Object is missing attribute {name:?}."))
            })?;
            let value = Self::conform(ty, value)
                .map_err(|d| conversion_error(format!("Attribute {name:?}: {}", d.detail)))?;
            checked.insert(name.clone(), value);
        }

        Ok(Self {
            ty: Type::Object(attribute_types),
            data: Data::Known(Known::Object(checked)),
        })
    }

    /// Rebuilds a container of this value's type from possibly modified
    /// children, converting back through any custom wrapper.
    ///
    /// # Errors
    ///
    /// Returns diagnostics if the children do not fit the container type.
    pub fn rebuild(&self, children: Children, path: &Path) -> Result<Self, Diagnostics> {
        let base = match (self.ty.base(), children) {
            (Type::List(elem), Children::Elements(elems)) => Self::list(*elem, elems),
            (Type::Set(elem), Children::Elements(elems)) => Self::set(*elem, elems),
            (Type::Map(elem), Children::Entries(entries)) => Self::map(*elem, entries),
            (Type::Object(attrs), Children::Entries(entries)) => Self::object(attrs, entries),
            (ty, _) => Err(conversion_error(format!(
                "Cannot rebuild a value of type {ty} from the given children."
            ))),
        }
        .map_err(|d| Diagnostics::from(d.at(path)))?;

        self.ty.value_from_base(base, path)
    }

    /// Returns a copy of this known object with attribute `name` replaced.
    ///
    /// # Errors
    ///
    /// Returns a diagnostic if this is not a known object, the attribute does
    /// not exist, or `value` has the wrong type.
    pub fn with_attribute(&self, name: &str, value: Self) -> Result<Self, Diagnostic> {
        let Data::Known(Known::Object(attrs)) = &self.data else {
            return Err(conversion_error(format!(
                "Cannot set attribute {name:?} on a value that is not a known object."
            )));
        };
        if !attrs.contains_key(name) {
            return Err(conversion_error(format!("Object has no attribute {name:?}.")));
        }

        let mut attrs = attrs.clone();
        attrs.insert(name.to_string(), value);
        let types = self.ty.attribute_types().unwrap_or_default();
        Ok(Self::object(types, attrs)?.with_type(self.ty.clone()))
    }

    pub(crate) fn with_type(self, ty: Type) -> Self {
        Self { ty, data: self.data }
    }

    /// The value with any custom wrapper removed.
    #[must_use]
    pub fn to_base(&self) -> Self {
        Self {
            ty: self.ty.base(),
            data: self.data.clone(),
        }
    }

    /// The type.
    #[must_use]
    pub const fn ty(&self) -> &Type {
        &self.ty
    }

    /// The kind.
    #[must_use]
    pub fn kind(&self) -> Kind {
        self.ty.kind()
    }

    /// The state.
    #[must_use]
    pub const fn state(&self) -> ValueState {
        match self.data {
            Data::Null => ValueState::Null,
            Data::Unknown => ValueState::Unknown,
            Data::Known(_) => ValueState::Known,
        }
    }

    /// Returns true for null.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self.data, Data::Null)
    }

    /// Returns true for unknown.
    #[must_use]
    pub const fn is_unknown(&self) -> bool {
        matches!(self.data, Data::Unknown)
    }

    /// Returns true for known.
    #[must_use]
    pub const fn is_known(&self) -> bool {
        matches!(self.data, Data::Known(_))
    }

    /// Null, or a dynamic value wrapping null.
    #[must_use]
    pub fn is_underlying_null(&self) -> bool {
        match &self.data {
            Data::Null => true,
            Data::Known(Known::Dynamic(inner)) => inner.is_underlying_null(),
            _ => false,
        }
    }

    /// Unknown, or a dynamic value wrapping unknown.
    #[must_use]
    pub fn is_underlying_unknown(&self) -> bool {
        match &self.data {
            Data::Unknown => true,
            Data::Known(Known::Dynamic(inner)) => inner.is_underlying_unknown(),
            _ => false,
        }
    }

    /// Returns true if this value or anything nested in it is unknown.
    #[must_use]
    pub fn contains_unknown(&self) -> bool {
        match &self.data {
            Data::Null => false,
            Data::Unknown => true,
            Data::Known(known) => match known {
                Known::Bool(_) | Known::Number(_) | Known::String(_) => false,
                Known::List(elems) | Known::Set(elems) => elems.iter().any(Self::contains_unknown),
                Known::Map(entries) | Known::Object(entries) => {
                    entries.values().any(Self::contains_unknown)
                }
                Known::Dynamic(inner) => inner.contains_unknown(),
            },
        }
    }

    /// The payload of a known value.
    #[must_use]
    pub const fn known(&self) -> Option<&Known> {
        match &self.data {
            Data::Known(known) => Some(known),
            _ => None,
        }
    }

    /// Boolean payload.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match &self.data {
            Data::Known(Known::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Number payload.
    #[must_use]
    pub const fn as_number(&self) -> Option<&Number> {
        match &self.data {
            Data::Known(Known::Number(n)) => Some(n),
            _ => None,
        }
    }

    /// String payload.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match &self.data {
            Data::Known(Known::String(s)) => Some(s),
            _ => None,
        }
    }

    /// List or set elements.
    #[must_use]
    pub fn elements(&self) -> Option<&[Self]> {
        match &self.data {
            Data::Known(Known::List(elems) | Known::Set(elems)) => Some(elems),
            _ => None,
        }
    }

    /// Map entries or object attributes.
    #[must_use]
    pub const fn entries(&self) -> Option<&BTreeMap<String, Self>> {
        match &self.data {
            Data::Known(Known::Map(entries) | Known::Object(entries)) => Some(entries),
            _ => None,
        }
    }

    /// A single object attribute.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Self> {
        match &self.data {
            Data::Known(Known::Object(attrs)) => attrs.get(name),
            _ => None,
        }
    }

    /// The wrapped value of a known dynamic.
    #[must_use]
    pub fn dynamic_inner(&self) -> Option<&Self> {
        match &self.data {
            Data::Known(Known::Dynamic(inner)) => Some(inner),
            _ => None,
        }
    }

    /// The value at `path` below this one, if present.
    #[must_use]
    pub fn at_path(&self, path: &Path) -> Option<&Self> {
        let mut current = self;
        for step in path.steps() {
            let inner = current.dynamic_inner().unwrap_or(current);
            current = match step {
                PathStep::Name(name) => inner.attribute(name)?,
                PathStep::ListIndex(index) => inner.elements()?.get(*index)?,
                PathStep::MapKey(key) => inner.entries()?.get(key)?,
                PathStep::SetValue(value) => inner.elements()?.iter().find(|e| *e == value)?,
            };
        }
        Some(current)
    }

    /// Checks the value is of `kind`, returning the "Invalid Value Type"
    /// diagnostic at `path` otherwise.
    ///
    /// # Errors
    ///
    /// Returns a diagnostic on kind mismatch.
    pub fn expect_kind(&self, kind: Kind, path: &Path) -> Result<&Self, Diagnostic> {
        if self.kind() == kind {
            Ok(self)
        } else {
            Err(Diagnostic::invalid_value_type(path, kind, &self.ty))
        }
    }

    /// Builds an object value from `(name, value)` pairs, inferring the type.
    ///
    /// # Errors
    ///
    /// Never fails for well-formed input; returns the constructor diagnostic
    /// otherwise.
    pub fn object_from<I, K>(attributes: I) -> Result<Self, Diagnostic>
    where
        I: IntoIterator<Item = (K, Self)>,
        K: Into<String>,
    {
        let attributes: BTreeMap<String, Self> =
            attributes.into_iter().map(|(k, v)| (k.into(), v)).collect();
        let types = attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.ty.clone()))
            .collect();
        Self::object(types, attributes)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        if self.ty != other.ty {
            return false;
        }
        match (&self.data, &other.data) {
            (Data::Null, Data::Null) | (Data::Unknown, Data::Unknown) => true,
            (Data::Known(a), Data::Known(b)) => match (a, b) {
                (Known::Bool(a), Known::Bool(b)) => a == b,
                (Known::Number(a), Known::Number(b)) => a == b,
                (Known::String(a), Known::String(b)) => a == b,
                (Known::List(a), Known::List(b)) => a == b,
                (Known::Set(a), Known::Set(b)) => {
                    a.len() == b.len() && a.iter().all(|e| b.contains(e))
                }
                (Known::Map(a), Known::Map(b)) | (Known::Object(a), Known::Object(b)) => a == b,
                (Known::Dynamic(a), Known::Dynamic(b)) => a == b,
                _ => false,
            },
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data {
            Data::Null => f.write_str("null"),
            Data::Unknown => f.write_str("(known after apply)"),
            Data::Known(known) => match known {
                Known::Bool(b) => write!(f, "{b}"),
                Known::Number(n) => write!(f, "{n}"),
                Known::String(s) => write!(f, "{s:?}"),
                Known::List(elems) | Known::Set(elems) => {
                    f.write_str("[")?;
                    for (i, e) in elems.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{e}")?;
                    }
                    f.write_str("]")
                }
                Known::Map(entries) | Known::Object(entries) => {
                    f.write_str("{")?;
                    for (i, (k, v)) in entries.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{k:?}: {v}")?;
                    }
                    f.write_str("}")
                }
                Known::Dynamic(inner) => write!(f, "{inner}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Debug)]
    struct Trimmed;

    impl CustomType for Trimmed {
        fn name(&self) -> &str {
            "trimmed"
        }

        fn base_type(&self) -> Type {
            Type::String
        }
    }

    #[test]
    fn test_unknown_equality() {
        assert_eq!(Value::unknown(Type::String), Value::unknown(Type::String));
        assert_ne!(Value::unknown(Type::String), Value::string("x"));
        assert_ne!(Value::unknown(Type::String), Value::unknown(Type::Bool));
        assert_ne!(Value::null(Type::String), Value::unknown(Type::String));
    }

    #[test]
    fn test_set_dedup_and_unordered_equality() {
        let a = Value::set(
            Type::String,
            vec![Value::string("x"), Value::string("y"), Value::string("x")],
        )
        .expect("valid set");
        let b = Value::set(Type::String, vec![Value::string("y"), Value::string("x")])
            .expect("valid set");
        assert_eq!(a.elements().map(<[Value]>::len), Some(2));
        assert_eq!(a, b);
    }

    #[test]
    fn test_constructor_rejects_wrong_element() {
        let err = Value::list(Type::String, vec![Value::bool(true)]).expect_err("mismatch");
        assert_eq!(err.class, DiagnosticClass::PlanConsistency);

        let err = Value::object(
            BTreeMap::from([("a".to_string(), Type::String)]),
            BTreeMap::new(),
        )
        .expect_err("missing attribute");
        assert!(err.detail.contains("missing attribute"));
    }

    #[test]
    fn test_round_trip_law_for_custom_types() {
        let ty = Type::Custom(Arc::new(Trimmed));
        let value = ty
            .value_from_base(Value::string("abc"), &Path::empty())
            .expect("wraps");
        let again = ty
            .value_from_base(value.to_base(), &Path::empty())
            .expect("round trips");
        assert_eq!(value, again);

        let null = Value::null(ty.clone());
        assert_eq!(
            ty.value_from_base(null.to_base(), &Path::empty())
                .expect("null round trips"),
            null
        );
    }

    /// Custom type over an arbitrary structural type.
    #[derive(Debug)]
    struct Wrapped(Type);

    impl CustomType for Wrapped {
        fn name(&self) -> &str {
            "wrapped"
        }

        fn base_type(&self) -> Type {
            self.0.clone()
        }
    }

    fn every_kind() -> Vec<Value> {
        vec![
            Value::bool(true),
            Value::number(42),
            Value::string("abc"),
            Value::list(Type::String, vec![Value::string("a"), Value::string("b")])
                .expect("valid list"),
            Value::set(Type::Number, vec![Value::number(1), Value::number(2)])
                .expect("valid set"),
            Value::map(Type::Bool, BTreeMap::from([("k".to_string(), Value::bool(false))]))
                .expect("valid map"),
            Value::object_from([("a", Value::string("x")), ("b", Value::number(1))])
                .expect("valid object"),
            Value::dynamic(Value::string("inside")),
        ]
    }

    #[test]
    fn test_round_trip_law_for_every_kind_and_state() {
        for known in every_kind() {
            let ty = known.ty().clone();
            let custom = Type::Custom(Arc::new(Wrapped(ty.clone())));

            for value in [known.clone(), Value::null(ty.clone()), Value::unknown(ty.clone())] {
                let again = ty
                    .value_from_base(value.to_base(), &Path::empty())
                    .expect("structural round trip");
                assert_eq!(again, value, "{ty}");

                let wrapped = custom
                    .value_from_base(value.clone(), &Path::empty())
                    .expect("wraps");
                assert_eq!(wrapped.state(), value.state());
                let again = custom
                    .value_from_base(wrapped.to_base(), &Path::empty())
                    .expect("custom round trip");
                assert_eq!(again, wrapped, "custom over {ty}");
            }
        }
    }

    #[test]
    fn test_rebuild_keeps_container_type() {
        let original = Value::list(Type::Number, vec![Value::number(1), Value::number(2)])
            .expect("valid list");
        let rebuilt = original
            .rebuild(
                Children::Elements(vec![Value::number(3)]),
                &Path::root("numbers"),
            )
            .expect("rebuilds");
        assert_eq!(rebuilt.ty(), original.ty());
        assert_eq!(rebuilt.elements().map(<[Value]>::len), Some(1));

        let err = original
            .rebuild(Children::Elements(vec![Value::string("no")]), &Path::root("numbers"))
            .expect_err("element type lost");
        assert!(err.has_error());
    }

    #[test]
    fn test_dynamic_underlying_state() {
        let null = Value::dynamic(Value::null(Type::String));
        assert!(null.is_known());
        assert!(null.is_underlying_null());

        let unknown = Value::dynamic(Value::unknown(Type::Number));
        assert!(unknown.is_underlying_unknown());
        assert!(unknown.contains_unknown());
    }

    #[test]
    fn test_expect_kind() {
        let path = Path::root("name");
        assert!(Value::string("x").expect_kind(Kind::String, &path).is_ok());
        let err = Value::string("x")
            .expect_kind(Kind::Number, &path)
            .expect_err("not a number");
        assert_eq!(err.summary, "Invalid Value Type");
        assert_eq!(err.path, Some(path));
    }
}
