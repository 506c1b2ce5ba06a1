//! Import of existing remote objects.

use tracing::debug;

use crate::diag::{Diagnostic, DiagnosticClass, Diagnostics};
use crate::private::ProviderData;
use crate::schema::Schema;
use crate::value::Value;

use super::{empty_object, ImportResponse, Resource};

/// Result of [`import_resource`].
#[derive(Debug, Clone)]
pub struct ImportOutcome {
    /// Imported state, to be refreshed by a read.
    pub state: Value,
    /// Private state.
    pub private: ProviderData,
    /// Problems found.
    pub diagnostics: Diagnostics,
}

/// Sets the top-level attribute `attribute` to the import identifier.
///
/// Covers the common case where the identifier is all a read needs.
pub fn import_passthrough_id(attribute: &str, id: &str, resp: &mut ImportResponse) {
    match resp.state.with_attribute(attribute, Value::string(id)) {
        Ok(state) => resp.state = state,
        Err(d) => resp.diagnostics.push(d),
    }
}

/// Runs the resource's import hook for `id`.
pub async fn import_resource(resource: &dyn Resource, schema: &Schema, id: &str) -> ImportOutcome {
    let Some(importer) = resource.as_import_state() else {
        return ImportOutcome {
            state: schema.null_value(),
            private: ProviderData::new(),
            diagnostics: Diagnostic::error(
                DiagnosticClass::Provider,
                "Resource Import Not Implemented",
                format!(
                    "This resource type ({}) does not support import. Please contact the \
                     provider developer for additional information.",
                    resource.type_name()
                ),
            )
            .into(),
        };
    };

    let empty = empty_object(schema);
    let mut resp = ImportResponse {
        state: empty.clone(),
        private: ProviderData::new(),
        diagnostics: Diagnostics::new(),
    };

    debug!(resource_type = %resource.type_name(), id, "Calling provider defined ImportState");
    importer.import_state(id, &mut resp).await;
    debug!(resource_type = %resource.type_name(), "Called provider defined ImportState");

    if !resp.diagnostics.has_error() && (resp.state.is_null() || resp.state == empty) {
        resp.diagnostics.push(Diagnostic::error(
            DiagnosticClass::LifecycleState,
            "Missing Resource Import State",
            "An unexpected error was encountered when importing the resource. The import \
             returned no state to refresh.",
        ));
    }

    ImportOutcome {
        state: resp.state,
        private: resp.private,
        diagnostics: resp.diagnostics,
    }
}
