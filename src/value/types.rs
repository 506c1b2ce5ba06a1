//! Type descriptors for [`Value`](super::Value).

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::diag::{Diagnostic, DiagnosticClass, Diagnostics};
use crate::path::Path;

use super::Value;

/// The kind of a value, ignoring element types and custom wrappers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Boolean.
    Bool,
    /// Arbitrary-precision number.
    Number,
    /// UTF-8 string.
    String,
    /// Ordered sequence.
    List,
    /// Unordered collection of distinct elements.
    Set,
    /// String-keyed map.
    Map,
    /// Fixed set of named attributes.
    Object,
    /// Value whose type is only known at runtime.
    Dynamic,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::Number => "number",
            Self::String => "string",
            Self::List => "list",
            Self::Set => "set",
            Self::Map => "map",
            Self::Object => "object",
            Self::Dynamic => "dynamic",
        };
        f.write_str(name)
    }
}

/// A provider-defined type layered over a base type.
///
/// A custom type never changes the shape of a value: converting to the base
/// type and back must yield an equal value. Providers hook in extra checks
/// with [`CustomType::check_base`] and opt in to semantic equality with
/// [`CustomType::semantic_equal`].
pub trait CustomType: Send + Sync + fmt::Debug {
    /// Stable name used in messages and for type equality.
    fn name(&self) -> &str;

    /// The structural type this custom type wraps.
    fn base_type(&self) -> Type;

    /// Extra checks applied when a base value is wrapped into this type.
    fn check_base(&self, _base: &Value, _path: &Path) -> Diagnostics {
        Diagnostics::new()
    }

    /// Returns true if `prior` and `proposed` (both in base form, both known)
    /// mean the same thing although they differ structurally.
    ///
    /// # Errors
    ///
    /// Returns diagnostics if the comparison itself fails.
    fn semantic_equal(&self, _prior: &Value, _proposed: &Value) -> Result<bool, Diagnostics> {
        Ok(false)
    }
}

/// A value type.
#[derive(Clone)]
pub enum Type {
    /// Boolean.
    Bool,
    /// Number.
    Number,
    /// String.
    String,
    /// List of the element type.
    List(Box<Type>),
    /// Set of the element type.
    Set(Box<Type>),
    /// Map from string keys to the element type.
    Map(Box<Type>),
    /// Object with fixed attribute types.
    Object(BTreeMap<String, Type>),
    /// Dynamic.
    Dynamic,
    /// Provider-defined wrapper.
    Custom(Arc<dyn CustomType>),
}

impl Type {
    /// Shorthand for a list type.
    #[must_use]
    pub fn list(element: Self) -> Self {
        Self::List(Box::new(element))
    }

    /// Shorthand for a set type.
    #[must_use]
    pub fn set(element: Self) -> Self {
        Self::Set(Box::new(element))
    }

    /// Shorthand for a map type.
    #[must_use]
    pub fn map(element: Self) -> Self {
        Self::Map(Box::new(element))
    }

    /// Shorthand for an object type.
    #[must_use]
    pub fn object<I, K>(attributes: I) -> Self
    where
        I: IntoIterator<Item = (K, Self)>,
        K: Into<String>,
    {
        Self::Object(attributes.into_iter().map(|(k, t)| (k.into(), t)).collect())
    }

    /// The kind of the type, seen through custom wrappers.
    #[must_use]
    pub fn kind(&self) -> Kind {
        match self {
            Self::Bool => Kind::Bool,
            Self::Number => Kind::Number,
            Self::String => Kind::String,
            Self::List(_) => Kind::List,
            Self::Set(_) => Kind::Set,
            Self::Map(_) => Kind::Map,
            Self::Object(_) => Kind::Object,
            Self::Dynamic => Kind::Dynamic,
            Self::Custom(custom) => custom.base_type().kind(),
        }
    }

    /// The structural type with every top-level custom wrapper removed.
    #[must_use]
    pub fn base(&self) -> Self {
        match self {
            Self::Custom(custom) => custom.base_type().base(),
            other => other.clone(),
        }
    }

    /// The custom wrapper, if this is a custom type.
    #[must_use]
    pub fn as_custom(&self) -> Option<&Arc<dyn CustomType>> {
        match self {
            Self::Custom(custom) => Some(custom),
            _ => None,
        }
    }

    /// The element type of a list, set or map.
    #[must_use]
    pub fn element_type(&self) -> Option<Self> {
        match self.base() {
            Self::List(elem) | Self::Set(elem) | Self::Map(elem) => Some(*elem),
            _ => None,
        }
    }

    /// The attribute types of an object.
    #[must_use]
    pub fn attribute_types(&self) -> Option<BTreeMap<String, Self>> {
        match self.base() {
            Self::Object(attrs) => Some(attrs),
            _ => None,
        }
    }

    /// Wraps a base-typed value into this type.
    ///
    /// For structural types this checks the value's type and returns it
    /// unchanged. For custom types it additionally runs
    /// [`CustomType::check_base`].
    ///
    /// # Errors
    ///
    /// Returns diagnostics if `base` is not of this type's base type or the
    /// custom type rejects it.
    pub fn value_from_base(&self, base: Value, path: &Path) -> Result<Value, Diagnostics> {
        let expected = self.base();
        if base.ty() != &expected && base.ty() != self {
            return Err(Diagnostic::error(
                DiagnosticClass::PlanConsistency,
                "Value Conversion Error",
                format!(
                    "An unexpected error was encountered converting a value at {path}. \
                     Expected type {expected}, got {}.",
                    base.ty()
                ),
            )
            .at(path)
            .into());
        }

        if let Self::Custom(custom) = self {
            let diags = custom.check_base(&base, path);
            if diags.has_error() {
                return Err(diags);
            }
        }

        Ok(base.with_type(self.clone()))
    }

    /// Returns true if values of `self` may be stored where `other` is expected.
    #[must_use]
    pub fn conforms_to(&self, other: &Self) -> bool {
        self == other || matches!(other, Self::Dynamic)
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool, Self::Bool)
            | (Self::Number, Self::Number)
            | (Self::String, Self::String)
            | (Self::Dynamic, Self::Dynamic) => true,
            (Self::List(a), Self::List(b))
            | (Self::Set(a), Self::Set(b))
            | (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a == b,
            (Self::Custom(a), Self::Custom(b)) => {
                a.name() == b.name() && a.base_type() == b.base_type()
            }
            _ => false,
        }
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => f.write_str("bool"),
            Self::Number => f.write_str("number"),
            Self::String => f.write_str("string"),
            Self::Dynamic => f.write_str("dynamic"),
            Self::List(elem) => write!(f, "list({elem})"),
            Self::Set(elem) => write!(f, "set({elem})"),
            Self::Map(elem) => write!(f, "map({elem})"),
            Self::Object(attrs) => {
                f.write_str("object({")?;
                for (i, (name, ty)) in attrs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}={ty}")?;
                }
                f.write_str("})")
            }
            Self::Custom(custom) => write!(f, "{}", custom.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Lowercase;

    impl CustomType for Lowercase {
        fn name(&self) -> &str {
            "lowercase"
        }

        fn base_type(&self) -> Type {
            Type::String
        }
    }

    #[test]
    fn test_kind_sees_through_custom() {
        let ty = Type::Custom(Arc::new(Lowercase));
        assert_eq!(ty.kind(), Kind::String);
        assert_eq!(ty.base(), Type::String);
        assert_ne!(ty, Type::String);
    }

    #[test]
    fn test_display() {
        let ty = Type::object([("a", Type::list(Type::String)), ("b", Type::Number)]);
        assert_eq!(ty.to_string(), "object({a=list(string), b=number})");
    }

    #[test]
    fn test_value_from_base_rejects_wrong_type() {
        let ty = Type::Custom(Arc::new(Lowercase));
        let err = ty
            .value_from_base(Value::bool(true), &Path::root("x"))
            .expect_err("bool is not a string");
        assert!(err.has_error());

        let wrapped = ty
            .value_from_base(Value::string("abc"), &Path::root("x"))
            .expect("string wraps");
        assert_eq!(wrapped.ty(), &ty);
    }
}
