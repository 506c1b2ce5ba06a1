//! Workspace planning.
//!
//! This module turns per-resource plan responses into a workspace plan,
//! renders attribute-level differences and executes the plan against the
//! provider server.

mod diff;
mod plan;
mod executor;

pub use diff::{AttributeChange, DiffEngine, SENSITIVE_PLACEHOLDER, UNKNOWN_PLACEHOLDER, render};
pub use plan::{Action, ResourceChange, WorkspacePlan};
pub use executor::{ActionResult, ExecutionResult, PlanExecutor};
