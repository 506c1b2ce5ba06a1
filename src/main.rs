//! Reconcile CLI entrypoint.
//!
//! This is the main entrypoint for the reconcile command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use reconcile_engine::cli::{Cli, Commands, OutputFormatter, StateCommands};
use reconcile_engine::config::{ConfigParser, WorkspaceConfig, find_config_file};
use reconcile_engine::error::{EngineError, Result};
use reconcile_engine::provider::LocalProvider;
use reconcile_engine::reconciler::{PlanMode, Reconciler, display_json};
use reconcile_engine::server::ProviderServer;
use reconcile_engine::state::{LocalStateStore, StateStore};

use clap::Parser;
use serde_json::Value as Json;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter.
const LOG_ENV: &str = "RECONCILE_LOG";

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_json);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool, json: bool) {
    let directive = log_directive(verbose, std::env::var(LOG_ENV).ok());
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// `--verbose` wins over the environment filter.
fn log_directive(verbose: bool, from_env: Option<String>) -> String {
    if verbose {
        return "debug".to_string();
    }
    from_env
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| "info".to_string())
}

/// Main async entry point. Returns whether the command succeeded.
async fn run(cli: Cli) -> Result<bool> {
    let formatter = OutputFormatter::new(cli.output);
    let config = cli.config.as_ref();

    match cli.command {
        Commands::Init { path, force } => cmd_init(&path, force, &formatter),
        Commands::Validate => cmd_validate(config, &formatter),
        Commands::Plan {
            detailed,
            no_refresh,
            destroy,
        } => cmd_plan(config, detailed, !no_refresh, destroy, &formatter).await,
        Commands::Apply { yes, no_refresh } => cmd_apply(config, yes, !no_refresh, &formatter).await,
        Commands::Refresh => cmd_refresh(config, &formatter).await,
        Commands::Destroy { yes } => cmd_destroy(config, yes, &formatter).await,
        Commands::Import { address, id } => cmd_import(config, &address, &id, &formatter).await,
        Commands::Data => cmd_data(config, &formatter).await,
        Commands::Schema { type_name } => cmd_schema(type_name.as_deref(), &formatter),
        Commands::State { command } => cmd_state(config, command, &formatter).await,
    }
}

/// Initialize a new workspace.
fn cmd_init(path: &Path, force: bool, formatter: &OutputFormatter) -> Result<bool> {
    info!("Initializing new workspace in: {}", path.display());

    let config_path = path.join("reconcile.yaml");
    let gitignore_path = path.join(".gitignore");

    if !force && config_path.exists() {
        eprintln!("Configuration file already exists: {}", config_path.display());
        eprintln!("Use --force to overwrite.");
        return Ok(false);
    }

    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }

    let name = path
        .canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "default".to_string());
    std::fs::write(&config_path, workspace_template(&name))?;
    eprintln!("Created: {}", config_path.display());

    if gitignore_path.exists() {
        let existing = std::fs::read_to_string(&gitignore_path)?;
        if !existing.lines().any(|l| l.trim() == ".reconcile/") {
            let mut file = std::fs::OpenOptions::new().append(true).open(&gitignore_path)?;
            writeln!(file, "\n# Reconcile state\n.reconcile/\n.env")?;
            eprintln!("Updated: {}", gitignore_path.display());
        }
    } else {
        std::fs::write(&gitignore_path, ".reconcile/\n.env\n")?;
        eprintln!("Created: {}", gitignore_path.display());
    }

    println!("{}", formatter.success("Workspace initialized."));
    eprintln!("Next steps:");
    eprintln!("  1. Edit reconcile.yaml to describe your resources");
    eprintln!("  2. Run 'reconcile validate' to check the configuration");
    eprintln!("  3. Run 'reconcile plan' to see what will change");
    eprintln!("  4. Run 'reconcile apply' to make it so");
    Ok(true)
}

fn workspace_template(name: &str) -> String {
    format!(
        r#"# Workspace managed by reconcile.
workspace: {name}

provider:
  base_dir: "."

resources:
  - type: local_file
    name: hello
    config:
      path: out/hello.txt
      content: "Hello, world!\n"
      file_permission: "0644"

data:
  - type: local_file_info
    name: readme
    config:
      path: reconcile.yaml
"#
    )
}

/// Validate configuration.
fn cmd_validate(config_path: Option<&PathBuf>, formatter: &OutputFormatter) -> Result<bool> {
    let workspace = Workspace::load(config_path)?;
    let reconciler = workspace.reconciler();
    let diags = reconciler.validate()?;
    print!("{}", formatter.format_diagnostics(&diags));

    eprintln!("Configuration is valid.");
    eprintln!("  Workspace: {}", workspace.config.workspace);
    eprintln!("  Resources: {}", workspace.config.resources.len());
    eprintln!("  Data sources: {}", workspace.config.data.len());
    Ok(true)
}

/// Show the plan.
async fn cmd_plan(
    config_path: Option<&PathBuf>,
    detailed: bool,
    refresh: bool,
    destroy: bool,
    formatter: &OutputFormatter,
) -> Result<bool> {
    let workspace = Workspace::load(config_path)?;
    let reconciler = workspace.reconciler().with_refresh(refresh);
    prepare(&reconciler, formatter).await?;

    let state = reconciler.load_state().await?;
    let mode = if destroy { PlanMode::Destroy } else { PlanMode::Normal };
    let plan = reconciler.plan(&state, mode).await?;
    print!("{}", formatter.format_plan(&plan, detailed));
    Ok(true)
}

/// Plan and apply.
async fn cmd_apply(
    config_path: Option<&PathBuf>,
    auto_approve: bool,
    refresh: bool,
    formatter: &OutputFormatter,
) -> Result<bool> {
    let workspace = Workspace::load(config_path)?;
    let reconciler = workspace.reconciler().with_refresh(refresh);
    prepare(&reconciler, formatter).await?;

    let lock = reconciler.lock("apply").await?;
    let outcome = apply_locked(&reconciler, PlanMode::Normal, auto_approve, formatter).await;
    if let Err(e) = reconciler.unlock(&lock).await {
        warn!("Failed to release state lock: {e}");
    }
    outcome
}

/// Destroy everything in state.
async fn cmd_destroy(config_path: Option<&PathBuf>, auto_approve: bool, formatter: &OutputFormatter) -> Result<bool> {
    let workspace = Workspace::load(config_path)?;
    let reconciler = workspace.reconciler();
    prepare(&reconciler, formatter).await?;

    let lock = reconciler.lock("destroy").await?;
    let outcome = apply_locked(&reconciler, PlanMode::Destroy, auto_approve, formatter).await;
    if let Err(e) = reconciler.unlock(&lock).await {
        warn!("Failed to release state lock: {e}");
    }
    outcome
}

async fn apply_locked(
    reconciler: &Reconciler<'_, LocalStateStore>,
    mode: PlanMode,
    auto_approve: bool,
    formatter: &OutputFormatter,
) -> Result<bool> {
    let mut state = reconciler.load_state().await?;
    let plan = reconciler.plan(&state, mode).await?;
    print!("{}", formatter.format_plan(&plan, true));

    if plan.is_empty() {
        // Persist refreshed values even when nothing changes.
        reconciler.apply(&plan, &mut state).await?;
        return Ok(true);
    }

    if !auto_approve {
        let prompt = match mode {
            PlanMode::Normal => "Do you want to apply this plan? [y/N]: ",
            PlanMode::Destroy => "This destroys every resource above. Type 'destroy' to confirm: ",
        };
        let answer = prompt_line(prompt)?;
        let confirmed = match mode {
            PlanMode::Normal => answer.eq_ignore_ascii_case("y"),
            PlanMode::Destroy => answer == "destroy",
        };
        if !confirmed {
            eprintln!("Cancelled.");
            return Ok(false);
        }
    }

    let result = reconciler.apply(&plan, &mut state).await?;
    print!("{}", formatter.format_execution(&result));
    Ok(result.success)
}

/// Refresh state.
async fn cmd_refresh(config_path: Option<&PathBuf>, formatter: &OutputFormatter) -> Result<bool> {
    let workspace = Workspace::load(config_path)?;
    let reconciler = workspace.reconciler();
    prepare(&reconciler, formatter).await?;

    let lock = reconciler.lock("refresh").await?;
    let outcome = async {
        let mut state = reconciler.load_state().await?;
        reconciler.refresh(&mut state).await
    }
    .await;
    if let Err(e) = reconciler.unlock(&lock).await {
        warn!("Failed to release state lock: {e}");
    }

    let result = outcome?;
    print!("{}", formatter.format_refresh(&result));
    Ok(!result.diagnostics.has_error())
}

/// Import an existing object.
async fn cmd_import(
    config_path: Option<&PathBuf>,
    address: &str,
    id: &str,
    formatter: &OutputFormatter,
) -> Result<bool> {
    let workspace = Workspace::load(config_path)?;
    let reconciler = workspace.reconciler();
    prepare(&reconciler, formatter).await?;

    let lock = reconciler.lock("import").await?;
    let outcome = async {
        let mut state = reconciler.load_state().await?;
        reconciler.import(&mut state, address, id).await
    }
    .await;
    if let Err(e) = reconciler.unlock(&lock).await {
        warn!("Failed to release state lock: {e}");
    }

    let diags = outcome?;
    print!("{}", formatter.format_diagnostics(&diags));
    println!("{}", formatter.success(&format!("Imported {address}.")));
    Ok(true)
}

/// Read data sources.
async fn cmd_data(config_path: Option<&PathBuf>, formatter: &OutputFormatter) -> Result<bool> {
    let workspace = Workspace::load(config_path)?;
    let reconciler = workspace.reconciler();
    prepare(&reconciler, formatter).await?;

    let (results, diags) = reconciler.read_data().await?;
    print!("{}", formatter.format_diagnostics(&diags));

    let mut rendered = Vec::new();
    for result in results {
        let type_name = result.address.split_once('.').map_or("", |(t, _)| t);
        let schema = workspace.server.data_source_schema(type_name)?;
        let value = display_json(&result.value).map_err(|d| EngineError::internal(d.to_string()))?;
        rendered.push((result.address, schema, value));
    }
    println!("{}", formatter.format_data(&rendered));
    Ok(true)
}

/// Show provider schemas.
fn cmd_schema(type_name: Option<&str>, formatter: &OutputFormatter) -> Result<bool> {
    let server = provider_server();
    let resources = server.resource_types()?;
    let data_sources = server.data_source_types()?;

    let Some(type_name) = type_name else {
        print!("{}", formatter.format_types(&server.provider_name(), &resources, &data_sources));
        return Ok(true);
    };

    let mut found = false;
    if resources.iter().any(|t| t == type_name) {
        print!("{}", formatter.format_schema(type_name, &*server.resource_schema(type_name)?));
        found = true;
    }
    if data_sources.iter().any(|t| t == type_name) {
        print!("{}", formatter.format_schema(type_name, &*server.data_source_schema(type_name)?));
        found = true;
    }
    if !found {
        println!("{}", formatter.error(&format!("Unknown type: {type_name}")));
    }
    Ok(found)
}

/// State management commands.
async fn cmd_state(config_path: Option<&PathBuf>, command: StateCommands, formatter: &OutputFormatter) -> Result<bool> {
    let workspace = Workspace::load(config_path)?;
    let reconciler = workspace.reconciler();

    match command {
        StateCommands::Show => {
            if workspace.store.exists().await? {
                let state = reconciler.load_state().await?;
                print!("{}", formatter.format_state(&state));
                if let Some(lock) = workspace.store.current_lock().await? {
                    eprintln!(
                        "Locked by {} for {} since {} (lock {})",
                        lock.holder, lock.operation, lock.acquired_at, lock.lock_id
                    );
                }
            } else {
                eprintln!("No state found.");
            }
        }
        StateCommands::List => {
            let state = reconciler.load_state().await?;
            print!("{}", formatter.format_state_list(&state));
        }
        StateCommands::Get { address } => {
            let state = reconciler.load_state().await?;
            let value = reconciler.state_value(&state, &address)?;
            let type_name = address.split_once('.').map_or("", |(t, _)| t);
            let schema = workspace.server.resource_schema(type_name)?;
            let json = display_json(&value).map_err(|d| EngineError::internal(d.to_string()))?;
            print!("{}", formatter.format_resource(&address, &schema, &json));
        }
        StateCommands::Rm { address } => {
            let lock = reconciler.lock("state rm").await?;
            let outcome = async {
                let mut state = reconciler.load_state().await?;
                reconciler.remove(&mut state, &address).await
            }
            .await;
            if let Err(e) = reconciler.unlock(&lock).await {
                warn!("Failed to release state lock: {e}");
            }
            outcome?;
            println!("{}", formatter.success(&format!("Removed {address} from state.")));
        }
        StateCommands::Unlock { lock_id } => {
            workspace.store.unlock(&lock_id).await?;
            println!("{}", formatter.success("State unlocked."));
        }
    }
    Ok(true)
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Everything a command needs to talk to one workspace.
struct Workspace {
    config: WorkspaceConfig,
    store: LocalStateStore,
    server: ProviderServer,
}

impl Workspace {
    /// Loads the workspace file, `.env` and state location.
    fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let config_file = resolve_config_path(config_path)?;
        debug!("Loading configuration from: {}", config_file.display());

        let base = config_file.parent().unwrap_or_else(|| Path::new("."));
        let parser = ConfigParser::new().with_base_path(base);
        parser.load_dotenv()?;

        let mut config = parser.load_with_env(&config_file)?;
        anchor_base_dir(&mut config, base);

        let state_path = ConfigParser::state_path(&config, &config_file);
        debug!("Using state file: {}", state_path.display());

        Ok(Self {
            config,
            store: LocalStateStore::with_state_path(state_path),
            server: provider_server(),
        })
    }

    fn reconciler(&self) -> Reconciler<'_, LocalStateStore> {
        Reconciler::new(&self.config, &self.store, &self.server)
    }
}

/// Validates the configuration and configures the provider.
async fn prepare(reconciler: &Reconciler<'_, LocalStateStore>, formatter: &OutputFormatter) -> Result<()> {
    let mut diags = reconciler.validate()?;
    diags.append(reconciler.configure().await?);
    if !diags.is_empty() {
        eprint!("{}", formatter.format_diagnostics(&diags));
    }
    Ok(())
}

fn provider_server() -> ProviderServer {
    ProviderServer::new(Arc::new(LocalProvider::new()))
}

/// Resolves a relative provider `base_dir` against the workspace directory.
fn anchor_base_dir(config: &mut WorkspaceConfig, workspace_dir: &Path) {
    let current = config.provider.get("base_dir").and_then(Json::as_str).unwrap_or(".");
    if Path::new(current).is_absolute() {
        return;
    }
    let anchored = workspace_dir.join(current);
    config
        .provider
        .insert("base_dir".to_string(), Json::String(anchored.to_string_lossy().into_owned()));
}

/// Resolves the configuration file path.
fn resolve_config_path(config_path: Option<&PathBuf>) -> Result<PathBuf> {
    config_path.map_or_else(|| find_config_file("."), |path| Ok(path.clone()))
}

fn prompt_line(prompt: &str) -> Result<String> {
    eprint!("{prompt}");
    std::io::stderr().flush()?;
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_overrides_log_env() {
        assert_eq!(log_directive(true, Some("warn".to_string())), "debug");
        assert_eq!(log_directive(false, Some("warn".to_string())), "warn");
        assert_eq!(log_directive(false, None), "info");
        assert_eq!(log_directive(false, Some("  ".to_string())), "info");
    }
}
