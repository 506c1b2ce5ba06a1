// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![warn(missing_docs)]                // Public items should be documented
#![warn(dead_code)]                   // Unused code is flagged
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![warn(unused_imports)]              // Unused imports are flagged
#![warn(unused_variables)]            // Unused variables are flagged
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Reconcile Engine
//!
//! A schema-driven reconciliation engine for declarative resource providers.
//!
//! ## Overview
//!
//! Providers describe their resources with a [`schema::Schema`] and implement
//! CRUD through [`lifecycle::Resource`]. The engine does everything between
//! the user's configuration and those calls:
//!
//! - Decode configuration into typed [`value::Value`]s that may be null or unknown
//! - Validate configuration against the schema and custom validators
//! - Plan changes: defaults, computed values, plan modifiers, replacement
//! - Check that providers honor the plan and keep private state separate
//! - Upgrade stored state across schema versions
//!
//! ## Architecture
//!
//! 1. **Workspace**: `reconcile.yaml` lists resources and data sources
//! 2. **Provider server**: [`server::ProviderServer`] validates, plans and applies
//! 3. **Reconciler**: compares state with configuration and drives the server
//!
//! ## Modules
//!
//! - [`value`], [`path`], [`diag`]: the value model, attribute paths and diagnostics
//! - [`schema`], [`walker`]: schema definitions and the schema-guided walker
//! - [`validate`], [`plan`], [`semantic`], [`private`]: the planning pipeline
//! - [`lifecycle`], [`cache`], [`server`]: resource lifecycle and the provider server
//! - [`provider`]: the builtin `local` provider
//! - [`config`], [`state`], [`planner`], [`reconciler`]: workspace handling
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! workspace: demo
//!
//! provider:
//!   base_dir: ./out
//!
//! resources:
//!   - type: local_file
//!     name: greeting
//!     config:
//!       path: hello.txt
//!       content: "Hello!"
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cache;
pub mod cli;
pub mod config;
pub mod diag;
pub mod error;
pub mod lifecycle;
pub mod path;
pub mod plan;
pub mod planner;
pub mod private;
pub mod provider;
pub mod reconciler;
pub mod schema;
pub mod semantic;
pub mod server;
pub mod state;
pub mod validate;
pub mod value;
pub mod walker;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigHasher, ConfigParser, ConfigValidator, WorkspaceConfig};
pub use diag::{Diagnostic, DiagnosticClass, Diagnostics, Severity};
pub use error::{EngineError, Result};
pub use path::Path;
pub use planner::{DiffEngine, PlanExecutor, WorkspacePlan};
pub use private::PrivateState;
pub use provider::LocalProvider;
pub use reconciler::{PlanMode, ReconciliationResult, Reconciler};
pub use schema::{Attribute, Block, NestedObject, Schema};
pub use server::{Provider, ProviderServer};
pub use state::{LocalStateStore, StateStore, WorkspaceState};
pub use value::{Type, Value};
