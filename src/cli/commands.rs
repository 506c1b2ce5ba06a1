//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Reconcile - declarative resource reconciliation.
#[derive(Parser, Debug)]
#[command(name = "reconcile")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the workspace file.
    #[arg(short, long, global = true, env = "RECONCILE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new workspace.
    Init {
        /// Directory to initialize (defaults to current directory).
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Force overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },

    /// Validate the workspace configuration against the provider schemas.
    Validate,

    /// Show what apply would change.
    Plan {
        /// Show attribute-level differences.
        #[arg(short, long)]
        detailed: bool,

        /// Skip refreshing state from remote objects.
        #[arg(long)]
        no_refresh: bool,

        /// Plan destroying every managed resource.
        #[arg(long)]
        destroy: bool,
    },

    /// Plan and apply changes.
    Apply {
        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,

        /// Skip refreshing state from remote objects.
        #[arg(long)]
        no_refresh: bool,
    },

    /// Update state from remote objects without changing them.
    Refresh,

    /// Destroy every managed resource.
    Destroy {
        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },

    /// Adopt an existing remote object.
    Import {
        /// Configured `type.name` address.
        address: String,

        /// Provider-specific identifier of the object.
        id: String,
    },

    /// Read configured data sources.
    Data,

    /// Show provider schemas.
    Schema {
        /// Resource or data source type (lists all types if omitted).
        type_name: Option<String>,
    },

    /// Inspect and edit state.
    State {
        /// State subcommand.
        #[command(subcommand)]
        command: StateCommands,
    },
}

/// State management subcommands.
#[derive(Subcommand, Debug)]
pub enum StateCommands {
    /// Show state summary and history.
    Show,

    /// List managed resources.
    List,

    /// Show one resource's state.
    Get {
        /// `type.name` address.
        address: String,
    },

    /// Forget a resource without destroying it.
    Rm {
        /// `type.name` address.
        address: String,
    },

    /// Release a lock left by an interrupted run.
    Unlock {
        /// Lock ID to release.
        lock_id: String,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
