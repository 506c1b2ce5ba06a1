//! CLI module for the reconcile tool.
//!
//! This module provides the command-line interface for planning and
//! applying workspace configurations through the builtin provider.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat, StateCommands};
pub use output::OutputFormatter;
