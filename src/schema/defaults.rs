//! Default values for computed attributes left unset in configuration.

use std::fmt;

use crate::diag::Diagnostics;
use crate::path::Path;
use crate::value::Value;

/// Input to a [`DefaultValue`].
#[derive(Debug, Clone, Copy)]
pub struct DefaultRequest<'a> {
    /// Location of the attribute.
    pub path: &'a Path,
}

/// Output of a [`DefaultValue`].
#[derive(Debug)]
pub struct DefaultResponse {
    /// The default, in base form. Seeded with null.
    pub value: Value,
    /// Problems found.
    pub diagnostics: Diagnostics,
}

/// Supplies the planned value of an attribute missing from configuration.
pub trait DefaultValue: Send + Sync + fmt::Debug {
    /// Human-readable description.
    fn description(&self) -> String;

    /// Produces the default.
    fn default_value(&self, req: &DefaultRequest<'_>, resp: &mut DefaultResponse);
}

/// A fixed default.
#[derive(Debug, Clone)]
pub struct StaticDefault {
    value: Value,
}

/// Defaults to `value`.
#[must_use]
pub const fn static_value(value: Value) -> StaticDefault {
    StaticDefault { value }
}

impl DefaultValue for StaticDefault {
    fn description(&self) -> String {
        format!("value defaults to {}", self.value)
    }

    fn default_value(&self, _req: &DefaultRequest<'_>, resp: &mut DefaultResponse) {
        resp.value = self.value.clone();
    }
}
