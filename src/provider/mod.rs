//! The builtin `local` provider.
//!
//! Manages files below a base directory. It is small enough to follow end to
//! end and exercises defaults, computed values, write-only content, semantic
//! equality, state upgrades and import.

pub mod encoding;
pub mod file_info;
pub mod local_file;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::diag::{Diagnostic, DiagnosticClass, Diagnostics};
use crate::lifecycle::{DataSource, ProviderHandle, Resource};
use crate::path::Path;
use crate::schema::{Attribute, Schema};
use crate::server::{DataSourceFactory, Provider, ResourceFactory};
use crate::value::Value;

pub use file_info::LocalFileInfo;
pub use local_file::LocalFile;

/// Provider name and type name prefix.
pub const PROVIDER_NAME: &str = "local";

/// Data shared with resources after configuration.
#[derive(Debug, Clone)]
pub struct LocalProviderData {
    /// Directory relative paths are resolved against.
    pub base_dir: PathBuf,
}

impl LocalProviderData {
    /// Resolves `path` against the base directory.
    #[must_use]
    pub fn resolve(&self, path: &str) -> PathBuf {
        let candidate = FsPath::new(path);
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.base_dir.join(candidate)
        }
    }
}

impl Default for LocalProviderData {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
        }
    }
}

/// Extracts [`LocalProviderData`] from a provider handle.
#[must_use]
pub fn provider_data(handle: Option<&ProviderHandle>) -> Option<Arc<LocalProviderData>> {
    handle.and_then(|h| Arc::clone(h).downcast::<LocalProviderData>().ok())
}

/// Hex SHA-256 of `bytes`.
#[must_use]
pub fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Sets attribute `name` of an object from a base value, wrapping it in the
/// attribute's custom type if it has one.
///
/// # Errors
///
/// Returns diagnostics if the attribute does not exist or rejects the value.
pub fn set_attribute(object: &Value, name: &str, base: Value) -> Result<Value, Diagnostics> {
    let ty = object
        .ty()
        .attribute_types()
        .and_then(|types| types.get(name).cloned())
        .unwrap_or_else(|| base.ty().clone());
    let value = ty.value_from_base(base, &Path::root(name))?;
    object.with_attribute(name, value).map_err(Diagnostics::from)
}

/// Error raised by a failed filesystem call.
#[must_use]
pub fn io_error(summary: &str, path: &FsPath, err: &std::io::Error) -> Diagnostic {
    Diagnostic::error(
        DiagnosticClass::RemoteOperation,
        summary,
        format!("{}: {err}", path.display()),
    )
}

/// The `local` provider.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalProvider;

impl LocalProvider {
    /// Creates the provider.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Provider for LocalProvider {
    fn type_name(&self) -> String {
        PROVIDER_NAME.to_string()
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .description("Manages files on the local filesystem.")
            .attribute(
                "base_dir",
                Attribute::string()
                    .optional()
                    .description("Directory relative file paths are resolved against."),
            )
    }

    async fn configure(&self, config: &Value, diags: &mut Diagnostics) -> Option<ProviderHandle> {
        let base_dir = config
            .attribute("base_dir")
            .and_then(Value::as_str)
            .map_or_else(|| PathBuf::from("."), PathBuf::from);

        match tokio::fs::metadata(&base_dir).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                diags.push(Diagnostic::invalid_configuration(
                    &Path::root("base_dir"),
                    "Invalid Base Directory",
                    format!("{} is not a directory.", base_dir.display()),
                ));
                return None;
            }
            Err(e) => {
                diags.push(
                    Diagnostic::invalid_configuration(
                        &Path::root("base_dir"),
                        "Invalid Base Directory",
                        format!("{}: {e}", base_dir.display()),
                    ),
                );
                return None;
            }
        }

        info!("Local provider rooted at {}", base_dir.display());
        Some(Arc::new(LocalProviderData { base_dir }))
    }

    fn resources(&self) -> Vec<ResourceFactory> {
        debug!("Registering local resources");
        vec![Arc::new(|| Box::new(LocalFile::default()) as Box<dyn Resource>)]
    }

    fn data_sources(&self) -> Vec<DataSourceFactory> {
        vec![Arc::new(|| Box::new(LocalFileInfo::default()) as Box<dyn DataSource>)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::ProviderServer;
    use crate::value::json::from_json;
    use serde_json::json;

    #[test]
    fn test_checksum() {
        assert_eq!(
            checksum(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_resolve() {
        let data = LocalProviderData {
            base_dir: PathBuf::from("/srv"),
        };
        assert_eq!(data.resolve("a/b.txt"), PathBuf::from("/srv/a/b.txt"));
        assert_eq!(data.resolve("/etc/hosts"), PathBuf::from("/etc/hosts"));
    }

    #[test]
    fn test_all_schemas_pass_self_check() {
        let server = ProviderServer::new(Arc::new(LocalProvider::new()));
        let schemas = server.get_provider_schema();
        assert!(!schemas.diagnostics.has_error(), "{}", schemas.diagnostics);
        assert!(schemas.resource_schemas.contains_key("local_file"));
        assert!(schemas.data_source_schemas.contains_key("local_file_info"));
    }

    #[tokio::test]
    async fn test_configure_rejects_missing_dir() {
        let server = ProviderServer::new(Arc::new(LocalProvider::new()));
        let schema = LocalProvider.schema();
        let config = from_json(
            &schema.value_type(),
            &json!({"base_dir": "/definitely/not/here"}),
            &Path::empty(),
        )
        .expect("config");
        let diags = server.configure_provider(&config).await;
        assert!(diags.has_error());
    }
}
