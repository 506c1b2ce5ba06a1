//! Attribute definitions.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::value::{CustomType, Type};

use super::defaults::DefaultValue;
use super::planmodifier::PlanModifier;
use super::validator::Validator;
use super::{NestedObject, NestingMode};

/// A schema attribute: either a leaf of a given type, or a nested attribute
/// wrapping a [`NestedObject`] in a [`NestingMode`].
///
/// Exactly one of required, optional or computed must be set, except that
/// optional and computed may be combined.
#[derive(Debug, Clone)]
pub struct Attribute {
    ty: Type,
    nested: Option<(NestingMode, NestedObject)>,
    required: bool,
    optional: bool,
    computed: bool,
    sensitive: bool,
    write_only: bool,
    description: String,
    deprecation_message: Option<String>,
    validators: Vec<Arc<dyn Validator>>,
    plan_modifiers: Vec<Arc<dyn PlanModifier>>,
    default: Option<Arc<dyn DefaultValue>>,
}

impl Attribute {
    /// Leaf attribute of `ty`.
    #[must_use]
    pub fn new(ty: Type) -> Self {
        Self {
            ty,
            nested: None,
            required: false,
            optional: false,
            computed: false,
            sensitive: false,
            write_only: false,
            description: String::new(),
            deprecation_message: None,
            validators: Vec::new(),
            plan_modifiers: Vec::new(),
            default: None,
        }
    }

    /// Boolean attribute.
    #[must_use]
    pub fn bool() -> Self {
        Self::new(Type::Bool)
    }

    /// Number attribute.
    #[must_use]
    pub fn number() -> Self {
        Self::new(Type::Number)
    }

    /// String attribute.
    #[must_use]
    pub fn string() -> Self {
        Self::new(Type::String)
    }

    /// Dynamic attribute.
    #[must_use]
    pub fn dynamic() -> Self {
        Self::new(Type::Dynamic)
    }

    /// List attribute of `element`.
    #[must_use]
    pub fn list(element: Type) -> Self {
        Self::new(Type::list(element))
    }

    /// Set attribute of `element`.
    #[must_use]
    pub fn set(element: Type) -> Self {
        Self::new(Type::set(element))
    }

    /// Map attribute of `element`.
    #[must_use]
    pub fn map(element: Type) -> Self {
        Self::new(Type::map(element))
    }

    /// Object attribute with fixed attribute types.
    #[must_use]
    pub fn object(attribute_types: BTreeMap<String, Type>) -> Self {
        Self::new(Type::Object(attribute_types))
    }

    /// Attribute of a provider-defined type.
    #[must_use]
    pub fn custom(custom: Arc<dyn CustomType>) -> Self {
        Self::new(Type::Custom(custom))
    }

    /// Nested attribute.
    #[must_use]
    pub fn nested(mode: NestingMode, object: NestedObject) -> Self {
        let ty = mode.wrap(object.object_type());
        let mut attr = Self::new(ty);
        attr.nested = Some((mode, object));
        attr
    }

    /// Marks the attribute required.
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Marks the attribute optional.
    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Marks the attribute computed.
    #[must_use]
    pub const fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    /// Masks the value in plan output.
    #[must_use]
    pub const fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// The value is accepted in configuration but never persisted.
    #[must_use]
    pub const fn write_only(mut self) -> Self {
        self.write_only = true;
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Marks the attribute deprecated.
    #[must_use]
    pub fn deprecated(mut self, message: impl Into<String>) -> Self {
        self.deprecation_message = Some(message.into());
        self
    }

    /// Replaces the type with a custom type. For nested attributes the
    /// custom type must wrap the container type.
    #[must_use]
    pub fn custom_type(mut self, custom: Arc<dyn CustomType>) -> Self {
        self.ty = Type::Custom(custom);
        self
    }

    /// Appends a validator.
    #[must_use]
    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    /// Appends a plan modifier.
    #[must_use]
    pub fn plan_modifier(mut self, modifier: impl PlanModifier + 'static) -> Self {
        self.plan_modifiers.push(Arc::new(modifier));
        self
    }

    /// Sets the default.
    #[must_use]
    pub fn default_value(mut self, default: impl DefaultValue + 'static) -> Self {
        self.default = Some(Arc::new(default));
        self
    }

    /// The attribute type, including any custom wrapper.
    #[must_use]
    pub const fn ty(&self) -> &Type {
        &self.ty
    }

    /// Nesting mode and object for nested attributes.
    #[must_use]
    pub fn nested_object(&self) -> Option<(NestingMode, &NestedObject)> {
        self.nested.as_ref().map(|(mode, object)| (*mode, object))
    }

    /// Required flag.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.required
    }

    /// Optional flag.
    #[must_use]
    pub const fn is_optional(&self) -> bool {
        self.optional
    }

    /// Computed flag.
    #[must_use]
    pub const fn is_computed(&self) -> bool {
        self.computed
    }

    /// Sensitive flag.
    #[must_use]
    pub const fn is_sensitive(&self) -> bool {
        self.sensitive
    }

    /// Write-only flag.
    #[must_use]
    pub const fn is_write_only(&self) -> bool {
        self.write_only
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

    /// Validators in declaration order.
    #[must_use]
    pub fn validators(&self) -> &[Arc<dyn Validator>] {
        &self.validators
    }

    /// Plan modifiers in declaration order.
    #[must_use]
    pub fn plan_modifiers(&self) -> &[Arc<dyn PlanModifier>] {
        &self.plan_modifiers
    }

    /// Source of the default value.
    #[must_use]
    pub fn default_source(&self) -> Option<&Arc<dyn DefaultValue>> {
        self.default.as_ref()
    }
}
