//! `local_file_info` data source.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::sync::Arc;

use super::{checksum, io_error, provider_data, set_attribute, LocalProviderData, PROVIDER_NAME};
use crate::diag::Diagnostics;
use crate::lifecycle::{Configure, DataSource, ProviderHandle, StateResponse};
use crate::schema::{Attribute, Schema};
use crate::value::Value;

/// Facts about a file that may or may not exist.
#[derive(Debug, Default, Clone)]
pub struct LocalFileInfo {
    data: Option<Arc<LocalProviderData>>,
}

#[async_trait]
impl DataSource for LocalFileInfo {
    fn type_name(&self) -> String {
        format!("{PROVIDER_NAME}_file_info")
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .description("Reads metadata of a local file.")
            .attribute("path", Attribute::string().required())
            .attribute("exists", Attribute::bool().computed())
            .attribute("size", Attribute::number().computed())
            .attribute("checksum", Attribute::string().computed())
            .attribute("modified_at", Attribute::string().computed())
    }

    async fn read(&self, config: Value, resp: &mut StateResponse) {
        let Some(path) = config.attribute("path").and_then(Value::as_str) else {
            return;
        };
        let full = self.data.clone().unwrap_or_default().resolve(path);

        let mut facts = vec![("exists", Value::bool(false))];
        match tokio::fs::read(&full).await {
            Ok(bytes) => {
                facts = vec![
                    ("exists", Value::bool(true)),
                    ("size", Value::number(bytes.len() as u64)),
                    ("checksum", Value::string(checksum(&bytes))),
                ];
                if let Ok(modified) = tokio::fs::metadata(&full).await.and_then(|m| m.modified()) {
                    let modified: DateTime<Utc> = modified.into();
                    facts.push(("modified_at", Value::string(modified.to_rfc3339())));
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                resp.diagnostics.push(io_error("Unable to Read File", &full, &e));
                return;
            }
        }

        let mut state = config;
        for (name, base) in facts {
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

    fn as_configure(&mut self) -> Option<&mut dyn Configure> {
        Some(self)
    }
}

impl Configure for LocalFileInfo {
    fn configure(&mut self, provider: Option<&ProviderHandle>, _diags: &mut Diagnostics) {
        self.data = provider_data(provider);
    }
}
