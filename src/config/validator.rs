//! Workspace configuration validation.
//!
//! Checks the shape of `reconcile.yaml` before anything is sent to the
//! provider. Attribute-level validation happens later, against the schema.

use crate::error::{ConfigError, EngineError, Result};
use crate::schema::check::is_valid_name;
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

use super::spec::{ResourceConfig, WorkspaceConfig};

/// Validator for workspace configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator {
    /// Resource types the provider serves. Empty skips the check.
    resource_types: BTreeSet<String>,
    /// Data source types the provider serves. Empty skips the check.
    data_source_types: BTreeSet<String>,
}

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a validator that does not check type names.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts resource blocks to the given types.
    #[must_use]
    pub fn with_resource_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resource_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Restricts data blocks to the given types.
    #[must_use]
    pub fn with_data_source_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.data_source_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Validates a workspace configuration.
    ///
    /// # Errors
    ///
    /// Returns the first error found.
    pub fn validate(&self, config: &WorkspaceConfig) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        if config.workspace.trim().is_empty() {
            result.errors.push(ValidationError {
                field: String::from("workspace"),
                message: String::from("Workspace name cannot be empty"),
            });
        }

        if config.resources.is_empty() && config.data.is_empty() {
            result
                .warnings
                .push(String::from("No resources or data sources defined in configuration"));
        }

        Self::validate_blocks("resources", "resource", &config.resources, &self.resource_types, &mut result)?;
        Self::validate_blocks("data", "data source", &config.data, &self.data_source_types, &mut result)?;

        if result.errors.is_empty() {
            debug!("Configuration validation passed");
            Ok(result)
        } else {
            let first_error = &result.errors[0];
            Err(EngineError::Config(ConfigError::ValidationError {
                message: first_error.message.clone(),
                field: Some(first_error.field.clone()),
            }))
        }
    }

    /// Validates one list of blocks.
    ///
    /// Duplicate addresses and unknown types are hard errors; they are
    /// reported immediately with their own variants.
    fn validate_blocks(
        section: &str,
        kind: &str,
        blocks: &[ResourceConfig],
        known: &BTreeSet<String>,
        result: &mut ValidationResult,
    ) -> Result<()> {
        let mut seen = HashSet::new();

        for (i, block) in blocks.iter().enumerate() {
            let prefix = format!("{section}[{i}]");

            if !is_valid_name(&block.name) {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.name"),
                    message: format!(
                        "Name '{}' is invalid. Must be lowercase letters, digits and underscores.",
                        block.name
                    ),
                });
            }

            if !is_valid_name(&block.type_name) {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.type"),
                    message: format!("Type name '{}' is invalid.", block.type_name),
                });
            } else if !known.is_empty() && !known.contains(&block.type_name) {
                return Err(EngineError::Config(ConfigError::UnknownType {
                    kind: kind.to_string(),
                    type_name: block.type_name.clone(),
                }));
            }

            let address = block.address();
            if !seen.insert(address.clone()) {
                return Err(EngineError::Config(ConfigError::DuplicateAddress {
                    kind: kind.to_string(),
                    address,
                }));
            }
        }

        Ok(())
    }
}
