//! Structural checks on schema definitions.
//!
//! These catch authoring mistakes once, when a schema is first built, instead
//! of on every request that happens to touch the broken attribute.

use crate::diag::{Diagnostic, DiagnosticClass, Diagnostics};
use crate::path::Path;

use super::{Attribute, Block, NestedObject, NestingMode, Schema};

/// Returns true if `name` is a valid attribute or block name.
#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_lowercase() || first == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

fn definition_error(path: &Path, summary: &str, detail: String) -> Diagnostic {
    Diagnostic::error(DiagnosticClass::SchemaDefinition, summary, detail).at(path)
}

/// Cardinality problems of a single attribute, shared with configuration
/// validation so both report identical messages.
pub(crate) fn attribute_definition_errors(attr: &Attribute, path: &Path) -> Diagnostics {
    let mut diags = Diagnostics::new();

    if !attr.is_required() && !attr.is_optional() && !attr.is_computed() {
        diags.push(definition_error(
            path,
            "Invalid Attribute Definition",
            format!(
                "Attribute missing Required, Optional, or Computed definition. \
                 This is always a problem with the provider and should be reported \
                 to the provider developer.\n\nPath: {path}"
            ),
        ));
    }

    if attr.is_required() && (attr.is_optional() || attr.is_computed()) {
        diags.push(definition_error(
            path,
            "Invalid Attribute Definition",
            format!("Attribute {path} is Required and cannot also be Optional or Computed."),
        ));
    }

    if attr.is_write_only() && attr.is_computed() {
        diags.push(definition_error(
            path,
            "Invalid Schema Implementation",
            format!("Attribute {path} is WriteOnly and cannot be Computed."),
        ));
    }

    diags
}

/// Checks every attribute and block of `schema`.
#[must_use]
pub fn check_schema(schema: &Schema) -> Diagnostics {
    let mut diags = Diagnostics::new();
    check_object(schema.root(), &Path::empty(), &mut diags);
    diags
}

fn check_object(object: &NestedObject, path: &Path, diags: &mut Diagnostics) {
    for name in object.attributes().keys() {
        if object.blocks().contains_key(name) {
            diags.push(definition_error(
                &path.at_name(name.clone()),
                "Invalid Schema Implementation",
                format!("{name:?} is declared both as an attribute and as a block."),
            ));
        }
    }

    for (name, attr) in object.attributes() {
        let attr_path = path.at_name(name.clone());
        check_name(name, &attr_path, diags);
        check_attribute(attr, &attr_path, diags);
    }

    for (name, block) in object.blocks() {
        let block_path = path.at_name(name.clone());
        check_name(name, &block_path, diags);
        check_block(block, &block_path, diags);
    }
}

fn check_name(name: &str, path: &Path, diags: &mut Diagnostics) {
    if !is_valid_name(name) {
        diags.push(definition_error(
            path,
            "Invalid Schema Implementation",
            format!(
                "Name {name:?} must contain only lowercase alphanumeric characters or \
                 underscores, and must not start with a digit."
            ),
        ));
    }
}

fn check_attribute(attr: &Attribute, path: &Path, diags: &mut Diagnostics) {
    diags.append(attribute_definition_errors(attr, path));

    if attr.default_source().is_some() && !attr.is_computed() {
        diags.push(definition_error(
            path,
            "Schema Using Attribute Default For Non-Computed Attribute",
            format!(
                "Attribute {path} must be computed when using default. This is an issue \
                 with the provider and should be reported to the provider developers."
            ),
        ));
    }

    if let Some((mode, object)) = attr.nested_object() {
        let structural = mode.wrap(object.object_type());
        if attr.ty().base() != structural {
            diags.push(definition_error(
                path,
                "Invalid Schema Implementation",
                format!(
                    "Custom type {} of attribute {path} wraps {}, expected {structural}.",
                    attr.ty(),
                    attr.ty().base()
                ),
            ));
        }
        check_nested_custom(object, path, diags);
        check_object(object, path, diags);
    }
}

fn check_block(block: &Block, path: &Path, diags: &mut Diagnostics) {
    if block.mode() == NestingMode::Map {
        diags.push(definition_error(
            path,
            "Invalid Schema Implementation",
            format!("Block {path} uses map nesting, which blocks do not support."),
        ));
    }

    let structural = block.mode().wrap(block.object().object_type());
    if block.ty().base() != structural {
        diags.push(definition_error(
            path,
            "Invalid Schema Implementation",
            format!("Custom type {} of block {path} wraps the wrong structure.", block.ty()),
        ));
    }

    check_nested_custom(block.object(), path, diags);
    check_object(block.object(), path, diags);
}

fn check_nested_custom(object: &NestedObject, path: &Path, diags: &mut Diagnostics) {
    if let Some(custom) = object.custom()
        && custom.base_type() != object.structural_type()
    {
        diags.push(definition_error(
            path,
            "Invalid Schema Implementation",
            format!(
                "Custom object type {} at {path} does not wrap the nested object's structure.",
                custom.name()
            ),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::defaults::static_value;
    use crate::value::Value;

    #[test]
    fn test_valid_names() {
        assert!(is_valid_name("file_permission"));
        assert!(is_valid_name("_x1"));
        assert!(!is_valid_name("1x"));
        assert!(!is_valid_name("Name"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("a-b"));
    }

    #[test]
    fn test_missing_cardinality() {
        let schema = Schema::new().attribute("name", Attribute::string());
        let diags = check_schema(&schema);
        assert_eq!(diags.error_count(), 1);
        let diag = diags.iter().next().expect("one diagnostic");
        assert_eq!(diag.summary, "Invalid Attribute Definition");
        assert_eq!(diag.path, Some(Path::root("name")));
    }

    #[test]
    fn test_conflicting_flags() {
        let schema = Schema::new()
            .attribute("a", Attribute::string().required().computed())
            .attribute("b", Attribute::string().optional().computed().write_only())
            .attribute(
                "c",
                Attribute::string()
                    .optional()
                    .default_value(static_value(Value::string("x"))),
            );
        assert_eq!(check_schema(&schema).error_count(), 3);
    }

    #[test]
    fn test_nested_paths() {
        let schema = Schema::new().block(
            "rule",
            Block::list(NestedObject::new().attribute("Port", Attribute::number().required())),
        );
        let diags = check_schema(&schema);
        assert_eq!(diags.error_count(), 1);
        assert_eq!(
            diags.iter().next().and_then(|d| d.path.clone()),
            Some(Path::root("rule").at_name("Port"))
        );
    }

    #[test]
    fn test_optional_computed_is_allowed() {
        let schema = Schema::new().attribute("a", Attribute::string().optional().computed());
        assert!(check_schema(&schema).is_empty());
    }
}
