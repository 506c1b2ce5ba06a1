//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use serde_json::{json, Value as Json};
use std::fmt::Write;
use std::sync::Arc;
use tabled::{Table, Tabled};

use crate::diag::{Diagnostics, Severity};
use crate::planner::{Action, ExecutionResult, WorkspacePlan, SENSITIVE_PLACEHOLDER};
use crate::reconciler::{RefreshResult, ReconciliationResult};
use crate::schema::{NestedObject, NestingMode, Schema};
use crate::state::WorkspaceState;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Plan change row for table display.
#[derive(Tabled)]
struct PlanChangeRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Resource")]
    address: String,
    #[tabled(rename = "Replaced by")]
    replace_paths: String,
}

/// Resource row for state listings.
#[derive(Tabled)]
struct ResourceRow {
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Schema")]
    schema_version: i64,
    #[tabled(rename = "Config hash")]
    config_hash: String,
    #[tabled(rename = "Updated")]
    updated: String,
}

/// Attribute row for schema display.
#[derive(Tabled)]
struct AttributeRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    ty: String,
    #[tabled(rename = "Flags")]
    flags: String,
    #[tabled(rename = "Description")]
    description: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a workspace plan for display.
    #[must_use]
    pub fn format_plan(&self, plan: &WorkspacePlan, detailed: bool) -> String {
        match self.format {
            OutputFormat::Json => pretty(&plan_json(plan)),
            OutputFormat::Text => Self::format_plan_text(plan, detailed),
        }
    }

    fn format_plan_text(plan: &WorkspacePlan, detailed: bool) -> String {
        let mut output = Self::format_diagnostics_text(&plan.diagnostics);

        if plan.is_empty() {
            let _ = writeln!(
                output,
                "{} No changes. Infrastructure matches the configuration.",
                "✓".green()
            );
            return output;
        }

        let _ = writeln!(output, "\nExecution plan (config {})\n", short(&plan.config_hash));

        let rows: Vec<PlanChangeRow> = plan
            .actionable()
            .enumerate()
            .map(|(i, c)| PlanChangeRow {
                index: i + 1,
                action: Self::format_action(c.action),
                address: c.address.clone(),
                replace_paths: c
                    .requires_replace
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
            })
            .collect();
        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        if detailed {
            for change in plan.actionable() {
                let _ = writeln!(output, "\n  {} {}", change.action.symbol(), change.address.bold());
                for detail in &change.details {
                    let line = detail.to_string();
                    let line = if detail.forces_replacement { line.red().to_string() } else { line };
                    let _ = writeln!(output, "      {line}");
                }
            }
        }

        let _ = writeln!(
            output,
            "\nPlan: {} to add, {} to change, {} to replace, {} to destroy.",
            plan.count(Action::Create).to_string().green(),
            plan.count(Action::Update).to_string().yellow(),
            plan.count(Action::Replace).to_string().yellow(),
            plan.count(Action::Delete).to_string().red()
        );
        output
    }

    /// Formats diagnostics.
    #[must_use]
    pub fn format_diagnostics(&self, diags: &Diagnostics) -> String {
        match self.format {
            OutputFormat::Json => pretty(&json!({ "diagnostics": diags })),
            OutputFormat::Text => Self::format_diagnostics_text(diags),
        }
    }

    fn format_diagnostics_text(diags: &Diagnostics) -> String {
        let mut output = String::new();
        for diag in diags {
            let marker = match diag.severity {
                Severity::Error => "✗".red(),
                Severity::Warning => "⚠".yellow(),
            };
            let _ = writeln!(output, "{marker} {diag}");
        }
        output
    }

    /// Formats the outcome of applying a plan.
    #[must_use]
    pub fn format_execution(&self, result: &ExecutionResult) -> String {
        match self.format {
            OutputFormat::Json => pretty(&json!({
                "success": result.success,
                "successful": result.successful,
                "failed": result.failed,
                "skipped": result.skipped,
                "results": result.results.iter().map(|r| json!({
                    "address": r.address,
                    "action": r.action,
                    "success": r.success,
                    "diagnostics": r.diagnostics,
                })).collect::<Vec<_>>(),
            })),
            OutputFormat::Text => {
                let mut output = Self::format_diagnostics_text(&result.diagnostics());
                let status = if result.success {
                    format!("{} Apply complete", "✓".green())
                } else {
                    format!("{} Apply failed", "✗".red())
                };
                let _ = writeln!(
                    output,
                    "{status}: {} succeeded, {} failed, {} skipped.",
                    result.successful, result.failed, result.skipped
                );
                output
            }
        }
    }

    /// Formats a reconciliation result.
    #[must_use]
    pub fn format_reconciliation(&self, result: &ReconciliationResult) -> String {
        match self.format {
            OutputFormat::Json => pretty(result),
            OutputFormat::Text => {
                let status = if result.success {
                    format!("{} Reconciliation successful", "✓".green())
                } else {
                    format!("{} Reconciliation failed", "✗".red())
                };

                let mut output = format!("{status}\n\n");
                let _ = writeln!(output, "   Created: {}", result.created);
                let _ = writeln!(output, "   Updated: {}", result.updated);
                let _ = writeln!(output, "   Replaced: {}", result.replaced);
                let _ = writeln!(output, "   Deleted: {}", result.deleted);
                let _ = writeln!(output, "   Unchanged: {}", result.unchanged);

                if !result.errors.is_empty() {
                    let _ = write!(output, "\n{} Errors:\n", "⚠".yellow());
                    for error in &result.errors {
                        let _ = writeln!(output, "   - {error}");
                    }
                }
                output
            }
        }
    }

    /// Formats a refresh result.
    #[must_use]
    pub fn format_refresh(&self, result: &RefreshResult) -> String {
        match self.format {
            OutputFormat::Json => pretty(result),
            OutputFormat::Text => {
                let mut output = Self::format_diagnostics_text(&result.diagnostics);
                for address in &result.updated {
                    let _ = writeln!(output, "   {} {address} drifted, state updated", "~".yellow());
                }
                for address in &result.removed {
                    let _ = writeln!(output, "   {} {address} no longer exists, removed from state", "-".red());
                }
                let _ = writeln!(
                    output,
                    "Refresh complete: {} updated, {} removed, {} unchanged.",
                    result.updated.len(),
                    result.removed.len(),
                    result.unchanged
                );
                output
            }
        }
    }

    /// Formats the workspace state summary.
    #[must_use]
    pub fn format_state(&self, state: &WorkspaceState) -> String {
        match self.format {
            OutputFormat::Json => pretty(state),
            OutputFormat::Text => {
                let mut output = String::new();

                let _ = write!(output, "\nState: {}\n\n", state.workspace.bold());
                let _ = writeln!(output, "   Version: {}", state.version);
                let _ = writeln!(output, "   Serial: {}", state.serial);
                let _ = writeln!(output, "   Config hash: {}", short(&state.config_hash));
                let _ = writeln!(output, "   Last updated: {}", state.last_updated);
                let _ = writeln!(output, "   Resources: {}", state.resources.len());

                if !state.history.is_empty() {
                    let _ = writeln!(output, "\n   Recent history ({}):", state.history.len());
                    for entry in state.history.iter().rev().take(5) {
                        let status = if entry.success { "✓".green() } else { "✗".red() };
                        let _ = writeln!(
                            output,
                            "     {status} #{} {} - {} ({})",
                            entry.serial,
                            entry.timestamp.format("%Y-%m-%d %H:%M"),
                            entry.operation,
                            entry.resources.join(", ")
                        );
                    }
                }
                output
            }
        }
    }

    /// Formats the list of managed resources.
    #[must_use]
    pub fn format_state_list(&self, state: &WorkspaceState) -> String {
        match self.format {
            OutputFormat::Json => pretty(&state.addresses()),
            OutputFormat::Text => {
                if state.resources.is_empty() {
                    return "No resources in state.\n".to_string();
                }
                let rows: Vec<ResourceRow> = state
                    .resources
                    .values()
                    .map(|r| ResourceRow {
                        address: r.address(),
                        schema_version: r.schema_version,
                        config_hash: short(&r.config_hash).to_string(),
                        updated: r.updated_at.format("%Y-%m-%d %H:%M").to_string(),
                    })
                    .collect();
                let mut output = Table::new(rows).to_string();
                output.push('\n');
                output
            }
        }
    }

    /// Formats one resource value, masking sensitive attributes.
    #[must_use]
    pub fn format_resource(&self, address: &str, schema: &Schema, value: &Json) -> String {
        let masked = mask_sensitive(schema.root(), value);
        match self.format {
            OutputFormat::Json => pretty(&json!({ "address": address, "values": masked })),
            OutputFormat::Text => {
                let mut output = format!("# {address}\n");
                if let Json::Object(map) = &masked {
                    for (name, v) in map {
                        if v.is_null() {
                            continue;
                        }
                        let _ = writeln!(output, "   {name} = {v}");
                    }
                }
                output
            }
        }
    }

    /// Formats data source results.
    #[must_use]
    pub fn format_data(&self, results: &[(String, Arc<Schema>, Json)]) -> String {
        match self.format {
            OutputFormat::Json => {
                let map: serde_json::Map<String, Json> = results
                    .iter()
                    .map(|(address, schema, value)| (address.clone(), mask_sensitive(schema.root(), value)))
                    .collect();
                pretty(&map)
            }
            OutputFormat::Text => results
                .iter()
                .map(|(address, schema, value)| self.format_resource(address, schema, value))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Formats the list of types a provider offers.
    #[must_use]
    pub fn format_types(&self, provider: &str, resources: &[String], data_sources: &[String]) -> String {
        match self.format {
            OutputFormat::Json => pretty(&json!({
                "provider": provider,
                "resources": resources,
                "data_sources": data_sources,
            })),
            OutputFormat::Text => {
                let mut output = format!("Provider: {}\n", provider.bold());
                let _ = writeln!(output, "\nResources:");
                for name in resources {
                    let _ = writeln!(output, "   {name}");
                }
                let _ = writeln!(output, "\nData sources:");
                for name in data_sources {
                    let _ = writeln!(output, "   {name}");
                }
                output
            }
        }
    }

    /// Formats one schema.
    #[must_use]
    pub fn format_schema(&self, type_name: &str, schema: &Schema) -> String {
        match self.format {
            OutputFormat::Json => pretty(&schema_json(schema.root())),
            OutputFormat::Text => {
                let mut output = format!("{} (schema version {})\n", type_name.bold(), schema.schema_version());
                if !schema.description_text().is_empty() {
                    let _ = writeln!(output, "{}", schema.description_text());
                }
                if let Some(message) = schema.deprecation_message() {
                    let _ = writeln!(output, "{} Deprecated: {message}", "⚠".yellow());
                }
                output.push('\n');
                output.push_str(&Table::new(attribute_rows(schema.root(), "")).to_string());
                output.push('\n');
                output
            }
        }
    }

    /// Formats an action with color.
    fn format_action(action: Action) -> String {
        match action {
            Action::Create => "+create".green().to_string(),
            Action::Update => "~update".yellow().to_string(),
            Action::Replace => "-/+replace".yellow().to_string(),
            Action::Delete => "-delete".red().to_string(),
            Action::NoOp => "no-op".dimmed().to_string(),
        }
    }

    /// Formats a success message.
    #[must_use]
    pub fn success(&self, message: &str) -> String {
        self.message("success", &format!("{} {message}", "✓".green()), message)
    }

    /// Formats an error message.
    #[must_use]
    pub fn error(&self, message: &str) -> String {
        self.message("error", &format!("{} {message}", "✗".red()), message)
    }

    /// Formats a warning message.
    #[must_use]
    pub fn warning(&self, message: &str) -> String {
        self.message("warning", &format!("{} {message}", "⚠".yellow()), message)
    }

    fn message(&self, status: &str, text: &str, message: &str) -> String {
        match self.format {
            OutputFormat::Json => pretty(&json!({ "status": status, "message": message })),
            OutputFormat::Text => text.to_string(),
        }
    }
}

fn pretty<T: serde::Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

fn short(hash: &str) -> &str {
    &hash[..8.min(hash.len())]
}

/// Replaces sensitive attribute values with a placeholder, descending into
/// nested objects of every nesting mode.
fn mask_sensitive(object: &NestedObject, value: &Json) -> Json {
    let Json::Object(map) = value else {
        return value.clone();
    };
    let mut masked = serde_json::Map::new();
    for (name, v) in map {
        let nested = if let Some(attr) = object.attributes().get(name) {
            if attr.is_sensitive() && !v.is_null() {
                masked.insert(name.clone(), Json::String(SENSITIVE_PLACEHOLDER.to_string()));
                continue;
            }
            attr.nested_object()
        } else {
            object.blocks().get(name).map(|b| (b.mode(), b.object()))
        };
        let v = match nested {
            Some((mode, nested)) => mask_nested(mode, nested, v),
            None => v.clone(),
        };
        masked.insert(name.clone(), v);
    }
    Json::Object(masked)
}

fn mask_nested(mode: NestingMode, object: &NestedObject, value: &Json) -> Json {
    match (mode, value) {
        (NestingMode::Single, _) => mask_sensitive(object, value),
        (NestingMode::List | NestingMode::Set, Json::Array(items)) => {
            Json::Array(items.iter().map(|i| mask_sensitive(object, i)).collect())
        }
        (NestingMode::Map, Json::Object(map)) => Json::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), mask_sensitive(object, v)))
                .collect(),
        ),
        _ => value.clone(),
    }
}

fn attribute_rows(object: &NestedObject, prefix: &str) -> Vec<AttributeRow> {
    let mut rows = Vec::new();
    for (name, attr) in object.attributes() {
        let mut flags = Vec::new();
        if attr.is_required() {
            flags.push("required");
        }
        if attr.is_optional() {
            flags.push("optional");
        }
        if attr.is_computed() {
            flags.push("computed");
        }
        if attr.is_sensitive() {
            flags.push("sensitive");
        }
        if attr.is_write_only() {
            flags.push("write-only");
        }
        if attr.deprecation_message().is_some() {
            flags.push("deprecated");
        }
        let full = format!("{prefix}{name}");
        rows.push(AttributeRow {
            name: full.clone(),
            ty: attr.ty().to_string(),
            flags: flags.join(", "),
            description: attr.description_text().to_string(),
        });
        if let Some((_, nested)) = attr.nested_object() {
            rows.extend(attribute_rows(nested, &format!("{full}.")));
        }
    }
    for (name, block) in object.blocks() {
        let full = format!("{prefix}{name}");
        rows.push(AttributeRow {
            name: full.clone(),
            ty: format!("block ({})", block.mode()),
            flags: String::new(),
            description: block.description_text().to_string(),
        });
        rows.extend(attribute_rows(block.object(), &format!("{full}.")));
    }
    rows
}

fn schema_json(object: &NestedObject) -> Json {
    let attributes: serde_json::Map<String, Json> = object
        .attributes()
        .iter()
        .map(|(name, attr)| {
            let mut entry = json!({
                "type": attr.ty().to_string(),
                "required": attr.is_required(),
                "optional": attr.is_optional(),
                "computed": attr.is_computed(),
                "sensitive": attr.is_sensitive(),
                "write_only": attr.is_write_only(),
                "description": attr.description_text(),
            });
            if let Some((mode, nested)) = attr.nested_object() {
                entry["nesting"] = json!(mode.to_string());
                entry["nested"] = schema_json(nested);
            }
            (name.clone(), entry)
        })
        .collect();
    let blocks: serde_json::Map<String, Json> = object
        .blocks()
        .iter()
        .map(|(name, block)| {
            (
                name.clone(),
                json!({
                    "nesting": block.mode().to_string(),
                    "description": block.description_text(),
                    "nested": schema_json(block.object()),
                }),
            )
        })
        .collect();
    json!({ "attributes": attributes, "blocks": blocks })
}

fn plan_json(plan: &WorkspacePlan) -> Json {
    json!({
        "config_hash": plan.config_hash,
        "created_at": plan.created_at,
        "diagnostics": plan.diagnostics,
        "summary": {
            "create": plan.count(Action::Create),
            "update": plan.count(Action::Update),
            "replace": plan.count(Action::Replace),
            "delete": plan.count(Action::Delete),
            "no_op": plan.count(Action::NoOp),
        },
        "changes": plan.actionable().map(|c| json!({
            "address": c.address,
            "action": c.action,
            "requires_replace": c.requires_replace,
            "attributes": c.details.iter().map(|d| json!({
                "path": d.path,
                "before": d.before,
                "after": d.after,
                "sensitive": d.sensitive,
                "forces_replacement": d.forces_replacement,
            })).collect::<Vec<_>>(),
        })).collect::<Vec<_>>(),
    })
}
