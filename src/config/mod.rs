//! Workspace configuration.
//!
//! This module handles everything about `reconcile.yaml`:
//! - Parsing and deserializing the workspace file
//! - Shape validation of resource and data blocks
//! - Computing configuration hashes for change detection

mod spec;
mod parser;
mod validator;
mod hash;

pub use spec::{ResourceConfig, StateConfig, WorkspaceConfig, split_address};
pub use parser::{
    ConfigParser, DEFAULT_CONFIG_FILES, DEFAULT_STATE_DIR, DEFAULT_STATE_FILE, ENV_STATE_PATH,
    ENV_WORKSPACE, find_config_file,
};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
pub use hash::ConfigHasher;
