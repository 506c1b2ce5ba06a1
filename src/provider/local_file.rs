//! `local_file` resource.

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path as FsPath;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::encoding::{ContentEncoding, EncodingType};
use super::{checksum, io_error, provider_data, set_attribute, LocalProviderData, PROVIDER_NAME};
use crate::diag::{Diagnostic, DiagnosticClass, Diagnostics};
use crate::lifecycle::import::import_passthrough_id;
use crate::lifecycle::{
    Configure, CreateRequest, DeleteRequest, DeleteResponse, ImportResponse, ImportState,
    ModifyPlan, ProviderHandle, ReadRequest, Resource, ResourcePlanRequest, ResourcePlanResponse,
    StateResponse, StateUpgrader, UpdateRequest, UpgradeState, ValidateConfig,
};
use crate::path::Path;
use crate::schema::defaults::static_value;
use crate::schema::planmodifier::{requires_replace, use_state_for_unknown};
use crate::schema::validator::{conflicts_with, size_between, string_length_at_least, string_matches};
use crate::schema::{Attribute, Block, NestedObject, Schema};
use crate::value::Value;

/// Permission used when none is configured.
pub const DEFAULT_FILE_PERMISSION: &str = "0644";

/// A file with managed content.
#[derive(Debug, Default, Clone)]
pub struct LocalFile {
    data: Option<Arc<LocalProviderData>>,
}

fn text<'a>(object: &'a Value, name: &str) -> Option<&'a str> {
    object.attribute(name).and_then(Value::as_str)
}

#[cfg(unix)]
async fn file_mode(path: &FsPath) -> Option<String> {
    use std::os::unix::fs::PermissionsExt;
    let meta = tokio::fs::metadata(path).await.ok()?;
    Some(format!("{:04o}", meta.permissions().mode() & 0o777))
}

#[cfg(not(unix))]
async fn file_mode(_path: &FsPath) -> Option<String> {
    None
}

#[cfg(unix)]
async fn set_file_mode(path: &FsPath, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await
}

#[cfg(not(unix))]
async fn set_file_mode(_path: &FsPath, _mode: u32) -> std::io::Result<()> {
    Ok(())
}

impl LocalFile {
    fn data(&self) -> Arc<LocalProviderData> {
        self.data.clone().unwrap_or_default()
    }

    /// Writes the planned content and returns the resulting state.
    async fn write(&self, planned: &Value) -> Result<Value, Diagnostics> {
        let path = text(planned, "path").ok_or_else(|| {
            Diagnostics::from(Diagnostic::error(
                DiagnosticClass::Provider,
                "Missing File Path",
                "The planned state has no path.",
            ))
        })?;
        let encoding = EncodingType::parse(planned.attribute("encoding")).unwrap_or(ContentEncoding::Utf8);
        let content = text(planned, "content")
            .or_else(|| text(planned, "content_wo"))
            .unwrap_or_default();
        let bytes = encoding.decode(content).map_err(|e| {
            Diagnostics::from(Diagnostic::invalid_configuration(
                &Path::root("content"),
                "Invalid File Content",
                format!("Content is not valid {encoding}: {e}"),
            ))
        })?;

        let full = self.data().resolve(path);
        if let Some(parent) = full.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Diagnostics::from(io_error("Unable to Create Directory", parent, &e)))?;
        }
        tokio::fs::write(&full, &bytes)
            .await
            .map_err(|e| Diagnostics::from(io_error("Unable to Write File", &full, &e)))?;

        let permission = text(planned, "file_permission").unwrap_or(DEFAULT_FILE_PERMISSION);
        let mode = u32::from_str_radix(permission, 8).map_err(|e| {
            Diagnostics::from(Diagnostic::invalid_configuration(
                &Path::root("file_permission"),
                "Invalid File Permission",
                format!("{permission:?} is not an octal mode: {e}"),
            ))
        })?;
        set_file_mode(&full, mode)
            .await
            .map_err(|e| Diagnostics::from(io_error("Unable to Set File Permission", &full, &e)))?;

        info!("Wrote {} ({} bytes)", full.display(), bytes.len());

        let state = set_attribute(planned, "id", Value::string(path))?;
        set_attribute(&state, "checksum", Value::string(checksum(&bytes)))
    }
}

#[async_trait]
impl Resource for LocalFile {
    fn type_name(&self) -> String {
        format!("{PROVIDER_NAME}_file")
    }

    fn schema(&self) -> Schema {
        let mut file_permission = Attribute::string()
            .optional()
            .computed()
            .description("Octal permission bits, e.g. \"0644\".")
            .default_value(static_value(Value::string(DEFAULT_FILE_PERMISSION)))
            .plan_modifier(requires_replace());
        if let Ok(mode) = Regex::new(r"^0[0-7]{3}$") {
            file_permission = file_permission
                .validator(string_matches(mode, "must be a four digit octal mode such as \"0644\""));
        }

        Schema::new()
            .version(1)
            .description("A file on the local filesystem with managed content.")
            .attribute(
                "id",
                Attribute::string()
                    .computed()
                    .description("The file path.")
                    .plan_modifier(use_state_for_unknown()),
            )
            .attribute(
                "path",
                Attribute::string()
                    .required()
                    .description("Path of the file, relative to the provider base directory.")
                    .validator(string_length_at_least(1))
                    .plan_modifier(requires_replace()),
            )
            .attribute(
                "content",
                Attribute::string()
                    .optional()
                    .description("Content of the file.")
                    .validator(conflicts_with([Path::root("content_wo")])),
            )
            .attribute(
                "content_wo",
                Attribute::string()
                    .optional()
                    .sensitive()
                    .write_only()
                    .description("Content of the file. Never stored in state."),
            )
            .attribute("file_permission", file_permission)
            .attribute(
                "encoding",
                Attribute::custom(EncodingType::shared())
                    .optional()
                    .computed()
                    .description("How content maps to bytes: \"utf-8\" or \"hex\".")
                    .default_value(static_value(Value::string(ContentEncoding::Utf8.as_str()))),
            )
            .attribute(
                "checksum",
                Attribute::string()
                    .computed()
                    .description("Hex SHA-256 of the file bytes."),
            )
            .block(
                "metadata",
                Block::set(
                    NestedObject::new()
                        .attribute("key", Attribute::string().required().validator(string_length_at_least(1)))
                        .attribute("value", Attribute::string().optional()),
                )
                .description("Free-form labels kept in state only.")
                .validator(size_between(0, 32)),
            )
    }

    async fn create(&self, req: CreateRequest, resp: &mut StateResponse) {
        match self.write(&req.planned_state).await {
            Ok(state) => resp.state = state,
            Err(d) => resp.diagnostics.append(d),
        }
    }

    async fn read(&self, req: ReadRequest, resp: &mut StateResponse) {
        let Some(path) = text(&req.state, "path")
            .or_else(|| text(&req.state, "id"))
            .map(str::to_string)
        else {
            resp.diagnostics.push(Diagnostic::error(
                DiagnosticClass::Provider,
                "Missing File Path",
                "The state has neither a path nor an id.",
            ));
            return;
        };

        let full = self.data().resolve(&path);
        let bytes = match tokio::fs::read(&full).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("{} no longer exists", full.display());
                resp.state = Value::null(req.state.ty().clone());
                return;
            }
            Err(e) => {
                resp.diagnostics.push(io_error("Unable to Read File", &full, &e));
                return;
            }
        };

        let encoding = EncodingType::parse(req.state.attribute("encoding")).unwrap_or(ContentEncoding::Utf8);
        let imported = req.state.attribute("checksum").is_none_or(Value::is_null);
        let tracks_content = req.state.attribute("content").is_some_and(|v| !v.is_null());

        let mut updates = vec![
            ("id", Value::string(path.as_str())),
            ("path", Value::string(path.as_str())),
            ("checksum", Value::string(checksum(&bytes))),
        ];
        if imported {
            updates.push(("encoding", Value::string(encoding.as_str())));
        }
        if (tracks_content || imported)
            && let Some(content) = encoding.encode(&bytes)
        {
            updates.push(("content", Value::string(content)));
        }
        if let Some(mode) = file_mode(&full).await {
            updates.push(("file_permission", Value::string(mode)));
        } else if imported {
            updates.push(("file_permission", Value::string(DEFAULT_FILE_PERMISSION)));
        }

        let mut state = req.state.clone();
        for (name, base) in updates {
            match set_attribute(&state, name, base) {
                Ok(updated) => state = updated,
                Err(d) => {
                    resp.diagnostics.append(d);
                    return;
                }
            }
        }
        resp.state = state;
    }

    async fn update(&self, req: UpdateRequest, resp: &mut StateResponse) {
        match self.write(&req.planned_state).await {
            Ok(state) => resp.state = state,
            Err(d) => resp.diagnostics.append(d),
        }
    }

    async fn delete(&self, req: DeleteRequest, resp: &mut DeleteResponse) {
        let Some(path) = text(&req.prior_state, "path") else {
            return;
        };
        let full = self.data().resolve(path);
        match tokio::fs::remove_file(&full).await {
            Ok(()) => info!("Removed {}", full.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("{} already removed", full.display());
            }
            Err(e) => resp.diagnostics.push(io_error("Unable to Remove File", &full, &e)),
        }
    }

    fn as_configure(&mut self) -> Option<&mut dyn Configure> {
        Some(self)
    }

    fn as_validate_config(&self) -> Option<&dyn ValidateConfig> {
        Some(self)
    }

    fn as_modify_plan(&self) -> Option<&dyn ModifyPlan> {
        Some(self)
    }

    fn as_upgrade_state(&self) -> Option<&dyn UpgradeState> {
        Some(self)
    }

    fn as_import_state(&self) -> Option<&dyn ImportState> {
        Some(self)
    }
}

impl Configure for LocalFile {
    fn configure(&mut self, provider: Option<&ProviderHandle>, _diags: &mut Diagnostics) {
        self.data = provider_data(provider);
    }
}

impl ValidateConfig for LocalFile {
    fn validate_config(&self, config: &Value, diags: &mut Diagnostics) {
        let content = config.attribute("content");
        let content_wo = config.attribute("content_wo");
        if content.is_none_or(Value::is_null) && content_wo.is_none_or(Value::is_null) {
            diags.push(Diagnostic::invalid_configuration(
                &Path::root("content"),
                "Missing File Content",
                "One of content or content_wo must be set.",
            ));
            return;
        }

        if let Some(ContentEncoding::Hex) = config
            .attribute("encoding")
            .filter(|v| v.is_known())
            .and_then(|v| EncodingType::parse(Some(v)))
            && let Some(hex_text) = content.and_then(Value::as_str)
            && let Err(e) = ContentEncoding::Hex.decode(hex_text)
        {
            diags.push(Diagnostic::invalid_configuration(
                &Path::root("content"),
                "Invalid File Content",
                format!("Content is not valid hex: {e}"),
            ));
        }
    }
}

impl ModifyPlan for LocalFile {
    fn modify_plan(&self, req: &ResourcePlanRequest<'_>, resp: &mut ResourcePlanResponse) {
        let planned = req.planned_state;
        if planned.is_null() || !planned.attribute("checksum").is_some_and(Value::is_unknown) {
            return;
        }
        let Some(content) = text(planned, "content") else {
            return;
        };
        let Some(encoding) = planned
            .attribute("encoding")
            .filter(|v| v.is_known())
            .and_then(|v| EncodingType::parse(Some(v)))
        else {
            return;
        };
        let Ok(bytes) = encoding.decode(content) else {
            return;
        };
        match set_attribute(planned, "checksum", Value::string(checksum(&bytes))) {
            Ok(state) => resp.planned_state = state,
            Err(d) => resp.diagnostics.append(d),
        }
    }
}

impl UpgradeState for LocalFile {
    fn state_upgraders(&self) -> BTreeMap<i64, StateUpgrader> {
        let mut upgraders = BTreeMap::new();
        // Version 0 stored the permission as "mode", sometimes as a decimal number.
        upgraders.insert(
            0,
            StateUpgrader::new(|mut raw: Json| {
                if let Some(obj) = raw.as_object_mut()
                    && let Some(mode) = obj.remove("mode")
                {
                    let permission = match mode {
                        Json::Number(n) => n.as_u64().map(|m| Json::String(format!("{m:04o}"))),
                        Json::String(s) => Some(Json::String(s)),
                        _ => None,
                    };
                    obj.insert(
                        "file_permission".to_string(),
                        permission.unwrap_or(Json::Null),
                    );
                }
                Ok(raw)
            }),
        );
        upgraders
    }
}

#[async_trait]
impl ImportState for LocalFile {
    async fn import_state(&self, id: &str, resp: &mut ImportResponse) {
        import_passthrough_id("id", id, resp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::proposed::proposed_new_state;
    use crate::private::PrivateState;
    use crate::provider::LocalProvider;
    use crate::server::{ApplyResourceChangeRequest, PlanResourceChangeRequest, Provider, ProviderServer};
    use crate::value::json::from_json;
    use serde_json::json;
    use tempfile::TempDir;

    const TYPE: &str = "local_file";

    async fn server(dir: &TempDir) -> ProviderServer {
        let server = ProviderServer::new(Arc::new(LocalProvider::new()));
        let config = from_json(
            &LocalProvider.schema().value_type(),
            &json!({"base_dir": dir.path().to_string_lossy()}),
            &Path::empty(),
        )
        .expect("provider config");
        let diags = server.configure_provider(&config).await;
        assert!(diags.is_empty(), "{diags}");
        server
    }

    fn config(json: Json) -> Value {
        from_json(&LocalFile::default().schema().value_type(), &json, &Path::empty()).expect("config")
    }

    async fn converge(server: &ProviderServer, prior: &Value, config: &Value) -> (Value, Vec<Path>) {
        let schema = server.resource_schema(TYPE).expect("schema");
        let (proposed, diags) = proposed_new_state(&schema, config, prior);
        assert!(!diags.has_error(), "{diags}");
        let plan = server.plan_resource_change(PlanResourceChangeRequest {
            type_name: TYPE.to_string(),
            config: config.clone(),
            prior_state: prior.clone(),
            proposed_new_state: proposed,
            prior_private: PrivateState::default(),
        });
        assert!(!plan.diagnostics.has_error(), "{}", plan.diagnostics);
        let applied = server
            .apply_resource_change(ApplyResourceChangeRequest {
                type_name: TYPE.to_string(),
                config: config.clone(),
                prior_state: prior.clone(),
                planned_state: plan.planned_state,
                planned_private: plan.planned_private,
            })
            .await;
        assert!(!applied.diagnostics.has_error(), "{}", applied.diagnostics);
        (applied.new_state, plan.requires_replace)
    }

    #[tokio::test]
    async fn test_create_writes_file_with_defaults() {
        let dir = TempDir::new().expect("tempdir");
        let server = server(&dir).await;
        let schema = server.resource_schema(TYPE).expect("schema");

        let (state, _) = converge(
            &server,
            &schema.null_value(),
            &config(json!({"path": "conf/app.txt", "content": "hello"})),
        )
        .await;

        let written = std::fs::read_to_string(dir.path().join("conf/app.txt")).expect("file");
        assert_eq!(written, "hello");
        assert_eq!(text(&state, "id"), Some("conf/app.txt"));
        assert_eq!(text(&state, "file_permission"), Some(DEFAULT_FILE_PERMISSION));
        assert_eq!(text(&state, "encoding"), Some("utf-8"));
        assert_eq!(text(&state, "checksum"), Some(checksum(b"hello").as_str()));
    }

    #[tokio::test]
    async fn test_checksum_is_known_at_plan_time() {
        let dir = TempDir::new().expect("tempdir");
        let server = server(&dir).await;
        let schema = server.resource_schema(TYPE).expect("schema");
        let cfg = config(json!({"path": "a.txt", "content": "abc"}));
        let (proposed, _) = proposed_new_state(&schema, &cfg, &schema.null_value());

        let plan = server.plan_resource_change(PlanResourceChangeRequest {
            type_name: TYPE.to_string(),
            config: cfg,
            prior_state: schema.null_value(),
            proposed_new_state: proposed,
            prior_private: PrivateState::default(),
        });
        assert_eq!(text(&plan.planned_state, "checksum"), Some(checksum(b"abc").as_str()));
        assert!(plan.planned_state.attribute("id").is_some_and(Value::is_unknown));
    }

    #[tokio::test]
    async fn test_write_only_content_is_not_stored() {
        let dir = TempDir::new().expect("tempdir");
        let server = server(&dir).await;
        let schema = server.resource_schema(TYPE).expect("schema");

        let (state, _) = converge(
            &server,
            &schema.null_value(),
            &config(json!({"path": "secret.txt", "content_wo": "s3cr3t"})),
        )
        .await;

        assert_eq!(
            std::fs::read_to_string(dir.path().join("secret.txt")).expect("file"),
            "s3cr3t"
        );
        assert!(state.attribute("content_wo").is_some_and(Value::is_null));
        assert!(state.attribute("content").is_some_and(Value::is_null));
    }

    #[tokio::test]
    async fn test_update_and_replace() {
        let dir = TempDir::new().expect("tempdir");
        let server = server(&dir).await;
        let schema = server.resource_schema(TYPE).expect("schema");
        let (state, _) = converge(
            &server,
            &schema.null_value(),
            &config(json!({"path": "a.txt", "content": "one"})),
        )
        .await;

        let (state, replace) = converge(&server, &state, &config(json!({"path": "a.txt", "content": "two"}))).await;
        assert!(replace.is_empty());
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).expect("file"), "two");
        assert_eq!(text(&state, "checksum"), Some(checksum(b"two").as_str()));

        let (proposed, _) = proposed_new_state(
            &schema,
            &config(json!({"path": "b.txt", "content": "two", "file_permission": "0600"})),
            &state,
        );
        let plan = server.plan_resource_change(PlanResourceChangeRequest {
            type_name: TYPE.to_string(),
            config: config(json!({"path": "b.txt", "content": "two", "file_permission": "0600"})),
            prior_state: state,
            proposed_new_state: proposed,
            prior_private: PrivateState::default(),
        });
        assert_eq!(
            plan.requires_replace,
            vec![Path::root("file_permission"), Path::root("path")]
        );
    }

    #[tokio::test]
    async fn test_read_detects_drift_and_removal() {
        let dir = TempDir::new().expect("tempdir");
        let server = server(&dir).await;
        let schema = server.resource_schema(TYPE).expect("schema");
        let (state, _) = converge(
            &server,
            &schema.null_value(),
            &config(json!({"path": "d.txt", "content": "v1"})),
        )
        .await;

        std::fs::write(dir.path().join("d.txt"), "edited").expect("edit");
        let read = server.read_resource(TYPE, state.clone(), PrivateState::default()).await;
        assert_eq!(text(&read.new_state, "content"), Some("edited"));
        assert_eq!(text(&read.new_state, "checksum"), Some(checksum(b"edited").as_str()));

        std::fs::remove_file(dir.path().join("d.txt")).expect("remove");
        let read = server.read_resource(TYPE, state, PrivateState::default()).await;
        assert!(read.new_state.is_null());
        assert!(!read.diagnostics.has_error());
    }

    #[tokio::test]
    async fn test_import_existing_file() {
        let dir = TempDir::new().expect("tempdir");
        std::fs::write(dir.path().join("found.txt"), "existing").expect("seed");
        let server = server(&dir).await;

        let imported = server.import_resource_state(TYPE, "found.txt").await;
        assert!(!imported.diagnostics.has_error(), "{}", imported.diagnostics);
        let read = server
            .read_resource(TYPE, imported.new_state, imported.private)
            .await;
        assert!(!read.diagnostics.has_error(), "{}", read.diagnostics);
        assert_eq!(text(&read.new_state, "path"), Some("found.txt"));
        assert_eq!(text(&read.new_state, "content"), Some("existing"));
        assert_eq!(text(&read.new_state, "encoding"), Some("utf-8"));
    }

    #[tokio::test]
    async fn test_destroy_removes_file() {
        let dir = TempDir::new().expect("tempdir");
        let server = server(&dir).await;
        let schema = server.resource_schema(TYPE).expect("schema");
        let (state, _) = converge(
            &server,
            &schema.null_value(),
            &config(json!({"path": "gone.txt", "content": "x"})),
        )
        .await;
        let (state, _) = converge(&server, &state, &schema.null_value()).await;
        assert!(state.is_null());
        assert!(!dir.path().join("gone.txt").exists());
    }

    #[test]
    fn test_upgrade_from_version_zero() {
        let server = ProviderServer::new(Arc::new(LocalProvider::new()));
        let resp = server.upgrade_resource_state(
            TYPE,
            0,
            json!({"id": "a", "path": "a", "content": "x", "mode": 420}),
            PrivateState::default(),
        );
        assert!(!resp.diagnostics.has_error(), "{}", resp.diagnostics);
        assert_eq!(text(&resp.upgraded_state, "file_permission"), Some("0644"));
    }

    #[test]
    fn test_validation() {
        let server = ProviderServer::new(Arc::new(LocalProvider::new()));
        let summaries = |json: Json| -> Vec<String> {
            server
                .validate_resource_config(TYPE, &config(json))
                .errors()
                .map(|d| d.summary.clone())
                .collect()
        };

        assert_eq!(summaries(json!({"path": "a"})), vec!["Missing File Content"]);
        assert_eq!(
            summaries(json!({"path": "a", "content": "x", "content_wo": "y"})),
            vec!["Invalid Attribute Combination"]
        );
        assert_eq!(
            summaries(json!({"path": "a", "content": "x", "file_permission": "777"})).len(),
            1
        );
        assert_eq!(
            summaries(json!({"path": "a", "content": "zz", "encoding": "hex"})),
            vec!["Invalid File Content"]
        );
        assert!(summaries(json!({"path": "a", "content": "00ff", "encoding": "HEX"})).is_empty());
    }
}
