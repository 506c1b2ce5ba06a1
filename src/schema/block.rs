//! Blocks and nested objects.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::value::{CustomType, Type};

use super::attribute::Attribute;
use super::planmodifier::PlanModifier;
use super::validator::Validator;
use super::NestingMode;

/// The shape shared by nested attributes, blocks and the schema root: a set
/// of attributes and blocks plus object-level validators and modifiers.
#[derive(Debug, Clone, Default)]
pub struct NestedObject {
    attributes: BTreeMap<String, Attribute>,
    blocks: BTreeMap<String, Block>,
    validators: Vec<Arc<dyn Validator>>,
    plan_modifiers: Vec<Arc<dyn PlanModifier>>,
    custom_type: Option<Arc<dyn CustomType>>,
}

impl NestedObject {
    /// Empty object.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an attribute.
    #[must_use]
    pub fn attribute(mut self, name: impl Into<String>, attribute: Attribute) -> Self {
        self.attributes.insert(name.into(), attribute);
        self
    }

    /// Adds a block.
    #[must_use]
    pub fn block(mut self, name: impl Into<String>, block: Block) -> Self {
        self.blocks.insert(name.into(), block);
        self
    }

    /// Appends an object-level validator.
    #[must_use]
    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    /// Appends an object-level plan modifier.
    #[must_use]
    pub fn plan_modifier(mut self, modifier: impl PlanModifier + 'static) -> Self {
        self.plan_modifiers.push(Arc::new(modifier));
        self
    }

    /// Wraps the object type in a custom type.
    #[must_use]
    pub fn custom_type(mut self, custom: Arc<dyn CustomType>) -> Self {
        self.custom_type = Some(custom);
        self
    }

    /// Attributes by name.
    #[must_use]
    pub const fn attributes(&self) -> &BTreeMap<String, Attribute> {
        &self.attributes
    }

    /// Blocks by name.
    #[must_use]
    pub const fn blocks(&self) -> &BTreeMap<String, Block> {
        &self.blocks
    }

    /// Object-level validators.
    #[must_use]
    pub fn validators(&self) -> &[Arc<dyn Validator>] {
        &self.validators
    }

    /// Object-level plan modifiers.
    #[must_use]
    pub fn plan_modifiers(&self) -> &[Arc<dyn PlanModifier>] {
        &self.plan_modifiers
    }

    /// Custom type of the object, if any.
    #[must_use]
    pub const fn custom(&self) -> Option<&Arc<dyn CustomType>> {
        self.custom_type.as_ref()
    }

    /// Structural object type, without the custom wrapper.
    #[must_use]
    pub fn structural_type(&self) -> Type {
        let attrs = self
            .attributes
            .iter()
            .map(|(name, attr)| (name.clone(), attr.ty().clone()));
        let blocks = self
            .blocks
            .iter()
            .map(|(name, block)| (name.clone(), block.ty().clone()));
        Type::Object(attrs.chain(blocks).collect())
    }

    /// Object type, including the custom wrapper.
    #[must_use]
    pub fn object_type(&self) -> Type {
        match &self.custom_type {
            Some(custom) => Type::Custom(Arc::clone(custom)),
            None => self.structural_type(),
        }
    }
}

/// A block: a nested object whose presence is expressed by configuration
/// structure rather than by an attribute value. Blocks are never computed.
#[derive(Debug, Clone)]
pub struct Block {
    mode: NestingMode,
    object: NestedObject,
    ty: Type,
    description: String,
    deprecation_message: Option<String>,
    validators: Vec<Arc<dyn Validator>>,
    plan_modifiers: Vec<Arc<dyn PlanModifier>>,
}

impl Block {
    /// Block of `object` in `mode`.
    #[must_use]
    pub fn new(mode: NestingMode, object: NestedObject) -> Self {
        let ty = mode.wrap(object.object_type());
        Self {
            mode,
            object,
            ty,
            description: String::new(),
            deprecation_message: None,
            validators: Vec::new(),
            plan_modifiers: Vec::new(),
        }
    }

    /// Single-nested block.
    #[must_use]
    pub fn single(object: NestedObject) -> Self {
        Self::new(NestingMode::Single, object)
    }

    /// List-nested block.
    #[must_use]
    pub fn list(object: NestedObject) -> Self {
        Self::new(NestingMode::List, object)
    }

    /// Set-nested block.
    #[must_use]
    pub fn set(object: NestedObject) -> Self {
        Self::new(NestingMode::Set, object)
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Marks the block deprecated.
    #[must_use]
    pub fn deprecated(mut self, message: impl Into<String>) -> Self {
        self.deprecation_message = Some(message.into());
        self
    }

    /// Replaces the container type with a custom type.
    #[must_use]
    pub fn custom_type(mut self, custom: Arc<dyn CustomType>) -> Self {
        self.ty = Type::Custom(custom);
        self
    }

    /// Appends a validator on the whole block value.
    #[must_use]
    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    /// Appends a plan modifier on the whole block value.
    #[must_use]
    pub fn plan_modifier(mut self, modifier: impl PlanModifier + 'static) -> Self {
        self.plan_modifiers.push(Arc::new(modifier));
        self
    }

    /// Nesting mode.
    #[must_use]
    pub const fn mode(&self) -> NestingMode {
        self.mode
    }

    /// Nested object.
    #[must_use]
    pub const fn object(&self) -> &NestedObject {
        &self.object
    }

    /// Block value type.
    #[must_use]
    pub const fn ty(&self) -> &Type {
        &self.ty
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

    /// Validators.
    #[must_use]
    pub fn validators(&self) -> &[Arc<dyn Validator>] {
        &self.validators
    }

    /// Plan modifiers.
    #[must_use]
    pub fn plan_modifiers(&self) -> &[Arc<dyn PlanModifier>] {
        &self.plan_modifiers
    }
}
