//! Configuration validation.

use tracing::trace;

use crate::diag::{Diagnostic, DiagnosticClass, Diagnostics};
use crate::path::Path;
use crate::schema::check::attribute_definition_errors;
use crate::schema::validator::{ValidateRequest, ValidateResponse, Validator};
use crate::schema::{Attribute, Block, NestedObject, Node, Schema};
use crate::value::Value;
use crate::walker::{walk_schema, SingleLane, WalkOp};

use std::sync::Arc;

/// What the calling client supports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientCapabilities {
    /// The client can send write-only attribute values.
    pub write_only_attributes_allowed: bool,
}

impl ClientCapabilities {
    /// A client supporting every optional feature.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            write_only_attributes_allowed: true,
        }
    }
}

/// Validates `config` against `schema`, collecting every problem.
#[must_use]
pub fn validate_config(
    schema: &Schema,
    config: &Value,
    capabilities: ClientCapabilities,
) -> Diagnostics {
    let mut diags = Diagnostics::new();

    if let Some(message) = schema.deprecation_message()
        && !config.is_null()
    {
        diags.push(Diagnostic::warning(
            DiagnosticClass::Configuration,
            "Deprecated Resource",
            message,
        ));
    }

    let mut op = ValidateOp {
        config,
        capabilities,
    };
    walk_schema(&mut op, schema, &mut SingleLane(config.clone()), &mut diags);
    diags
}

struct ValidateOp<'a> {
    config: &'a Value,
    capabilities: ClientCapabilities,
}

impl ValidateOp<'_> {
    fn run_validators(
        &self,
        validators: &[Arc<dyn Validator>],
        path: &Path,
        value: &Value,
        diags: &mut Diagnostics,
    ) {
        if value.is_underlying_unknown() {
            return;
        }
        let base = value.to_base();
        for validator in validators {
            trace!(path = %path, description = %validator.description(), "Calling provider defined validator");
            let mut resp = ValidateResponse::default();
            validator.validate(
                &ValidateRequest {
                    path,
                    config_value: &base,
                    config: self.config,
                },
                &mut resp,
            );
            trace!(path = %path, description = %validator.description(), "Called provider defined validator");
            diags.append(resp.diagnostics);
        }
    }

    fn visit_attribute(&self, attr: &Attribute, path: &Path, config: &Value, diags: &mut Diagnostics) {
        let definition = attribute_definition_errors(attr, path);
        if definition.has_error() {
            diags.append(definition);
            return;
        }

        if attr.is_computed() && !attr.is_optional() && !config.is_underlying_null() {
            diags.push(Diagnostic::invalid_configuration(
                path,
                "Invalid Configuration for Read-Only Attribute",
                format!(
                    "Cannot set value for {path} as the provider has marked it as read-only. \
                     Remove the configuration line setting the value.\n\nRefer to the provider \
                     documentation or contact the provider developers for additional \
                     information about configurable and read-only attributes that are supported."
                ),
            ));
            return;
        }

        if attr.is_required() && config.is_underlying_null() {
            diags.push(Diagnostic::invalid_configuration(
                path,
                "Missing Configuration for Required Attribute",
                format!(
                    "Must set a configuration value for the {path} attribute as the provider \
                     has marked it as required.\n\nRefer to the provider documentation or \
                     contact the provider developers for additional information about \
                     configurable attributes that are required."
                ),
            ));
            return;
        }

        if attr.is_write_only()
            && !self.capabilities.write_only_attributes_allowed
            && !config.is_underlying_null()
        {
            diags.push(Diagnostic::invalid_configuration(
                path,
                "WriteOnly Attribute Not Allowed",
                format!(
                    "The resource contains a non-null value for write-only attribute {path}, \
                     but the client does not support write-only attributes."
                ),
            ));
            return;
        }

        if let Err(d) = config.expect_kind(attr.ty().kind(), path) {
            diags.push(d);
            return;
        }

        self.run_validators(attr.validators(), path, config, diags);

        if let Some(message) = attr.deprecation_message()
            && config.is_known()
            && !config.is_underlying_null()
            && !config.is_underlying_unknown()
        {
            diags.push(
                Diagnostic::warning(DiagnosticClass::Configuration, "Attribute Deprecated", message)
                    .at(path),
            );
        }
    }

    fn visit_block(&self, block: &Block, path: &Path, config: &Value, diags: &mut Diagnostics) {
        if let Err(d) = config.expect_kind(block.ty().kind(), path) {
            diags.push(d);
            return;
        }

        self.run_validators(block.validators(), path, config, diags);

        let present = config.is_known()
            && config
                .elements()
                .map_or(true, |elements| !elements.is_empty());
        if let Some(message) = block.deprecation_message()
            && present
        {
            diags.push(
                Diagnostic::warning(DiagnosticClass::Configuration, "Block Deprecated", message)
                    .at(path),
            );
        }
    }
}

impl WalkOp for ValidateOp<'_> {
    type Lanes = SingleLane;

    fn visit_node(
        &mut self,
        node: Node<'_>,
        path: &Path,
        lanes: &mut SingleLane,
        diags: &mut Diagnostics,
    ) {
        match node {
            Node::Attribute(attr) => self.visit_attribute(attr, path, &lanes.0, diags),
            Node::Block(block) => self.visit_block(block, path, &lanes.0, diags),
        }
    }

    fn visit_object(
        &mut self,
        object: &NestedObject,
        path: &Path,
        lanes: &mut SingleLane,
        diags: &mut Diagnostics,
    ) {
        if lanes.0.is_known() {
            self.run_validators(object.validators(), path, &lanes.0, diags);
        }
    }
}
