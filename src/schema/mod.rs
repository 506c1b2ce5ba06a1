//! Schema model.
//!
//! A [`Schema`] is a versioned tree of [`Attribute`]s and [`Block`]s. Schemas
//! are built once per resource type and shared read-only afterwards.

mod attribute;
mod block;
pub mod check;
pub mod defaults;
pub mod planmodifier;
pub mod validator;

pub use attribute::Attribute;
pub use block::{Block, NestedObject};

use std::fmt;
use std::sync::Arc;

use crate::value::{Type, Value};

use planmodifier::PlanModifier;
use validator::Validator;

/// How a nested object is wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NestingMode {
    /// A single object.
    Single,
    /// An ordered list of objects.
    List,
    /// An unordered set of objects.
    Set,
    /// A string-keyed map of objects.
    Map,
}

impl NestingMode {
    /// Wraps `object` in this mode's container type.
    #[must_use]
    pub fn wrap(self, object: Type) -> Type {
        match self {
            Self::Single => object,
            Self::List => Type::list(object),
            Self::Set => Type::set(object),
            Self::Map => Type::map(object),
        }
    }
}

impl fmt::Display for NestingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Single => "single",
            Self::List => "list",
            Self::Set => "set",
            Self::Map => "map",
        };
        f.write_str(name)
    }
}

/// A resource, data source or provider schema.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    version: i64,
    description: String,
    deprecation_message: Option<String>,
    root: NestedObject,
}

impl Schema {
    /// Empty schema at version 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the version.
    #[must_use]
    pub const fn version(mut self, version: i64) -> Self {
        self.version = version;
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Marks the whole resource type deprecated.
    #[must_use]
    pub fn deprecated(mut self, message: impl Into<String>) -> Self {
        self.deprecation_message = Some(message.into());
        self
    }

    /// Adds a top-level attribute.
    #[must_use]
    pub fn attribute(mut self, name: impl Into<String>, attribute: Attribute) -> Self {
        self.root = self.root.attribute(name, attribute);
        self
    }

    /// Adds a top-level block.
    #[must_use]
    pub fn block(mut self, name: impl Into<String>, block: Block) -> Self {
        self.root = self.root.block(name, block);
        self
    }

    /// Schema version.
    #[must_use]
    pub const fn schema_version(&self) -> i64 {
        self.version
    }

    /// Description.
    #[must_use]
    pub fn description_text(&self) -> &str {
        &self.description
    }

    /// Deprecation message.
    #[must_use]
    pub fn deprecation_message(&self) -> Option<&str> {
        self.deprecation_message.as_deref()
    }

    /// Top-level attributes and blocks as one object.
    #[must_use]
    pub const fn root(&self) -> &NestedObject {
        &self.root
    }

    /// Top-level attribute by name.
    #[must_use]
    pub fn get_attribute(&self, name: &str) -> Option<&Attribute> {
        self.root.attributes().get(name)
    }

    /// Top-level block by name.
    #[must_use]
    pub fn get_block(&self, name: &str) -> Option<&Block> {
        self.root.blocks().get(name)
    }

    /// Type of a whole resource value.
    #[must_use]
    pub fn value_type(&self) -> Type {
        self.root.structural_type()
    }

    /// Null resource value.
    #[must_use]
    pub fn null_value(&self) -> Value {
        Value::null(self.value_type())
    }
}

/// An attribute or block seen uniformly while walking a schema.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    /// An attribute.
    Attribute(&'a Attribute),
    /// A block.
    Block(&'a Block),
}

impl<'a> Node<'a> {
    /// Declared type.
    #[must_use]
    pub const fn ty(self) -> &'a Type {
        match self {
            Self::Attribute(a) => a.ty(),
            Self::Block(b) => b.ty(),
        }
    }

    /// Nesting mode and nested object, if the node nests.
    #[must_use]
    pub fn nested(self) -> Option<(NestingMode, &'a NestedObject)> {
        match self {
            Self::Attribute(a) => a.nested_object(),
            Self::Block(b) => Some((b.mode(), b.object())),
        }
    }

    /// Validators.
    #[must_use]
    pub fn validators(self) -> &'a [Arc<dyn Validator>] {
        match self {
            Self::Attribute(a) => a.validators(),
            Self::Block(b) => b.validators(),
        }
    }

    /// Plan modifiers.
    #[must_use]
    pub fn plan_modifiers(self) -> &'a [Arc<dyn PlanModifier>] {
        match self {
            Self::Attribute(a) => a.plan_modifiers(),
            Self::Block(b) => b.plan_modifiers(),
        }
    }

    /// Deprecation message.
    #[must_use]
    pub fn deprecation_message(self) -> Option<&'a str> {
        match self {
            Self::Attribute(a) => a.deprecation_message(),
            Self::Block(b) => b.deprecation_message(),
        }
    }

    /// Returns true for write-only attributes.
    #[must_use]
    pub const fn is_write_only(self) -> bool {
        match self {
            Self::Attribute(a) => a.is_write_only(),
            Self::Block(_) => false,
        }
    }

    /// Returns true for sensitive attributes.
    #[must_use]
    pub const fn is_sensitive(self) -> bool {
        match self {
            Self::Attribute(a) => a.is_sensitive(),
            Self::Block(_) => false,
        }
    }
}
