//! Error types for the workspace layers.
//!
//! The engine core reports problems as [`Diagnostics`]. Everything around it
//! (configuration loading, the state store, the CLI) uses this hierarchy, and
//! diagnostics with errors are lifted into [`EngineError::Diagnostics`] at the
//! boundary.

use std::path::PathBuf;
use thiserror::Error;

use crate::diag::Diagnostics;

/// The main error type.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// State management errors.
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Planning errors.
    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    /// Diagnostics returned by the engine.
    #[error("{count} error(s) reported:\n{diags}", count = .0.error_count(), diags = .0)]
    Diagnostics(Diagnostics),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Duplicate resource definition.
    #[error("Duplicate {kind} address: {address}")]
    DuplicateAddress {
        /// "resource" or "data source".
        kind: String,
        /// The duplicated `type.name` address.
        address: String,
    },

    /// The provider does not serve this type.
    #[error("Unknown {kind} type: {type_name}")]
    UnknownType {
        /// "resource" or "data source".
        kind: String,
        /// The type name.
        type_name: String,
    },
}

/// State management errors.
#[derive(Debug, Error)]
pub enum StateError {
    /// State is corrupted.
    #[error("State is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// State could not be written.
    #[error("Failed to write state: {message}")]
    WriteFailed {
        /// Description of the failure.
        message: String,
    },

    /// State lock acquisition failed.
    #[error("Failed to acquire state lock: {message}")]
    LockFailed {
        /// Description of the lock failure.
        message: String,
    },

    /// State lock is held by another process.
    #[error("State is locked by another process (lock holder: {holder}, since: {since})")]
    LockedByOther {
        /// Identifier of the lock holder.
        holder: String,
        /// When the lock was acquired.
        since: String,
    },

    /// Serialization error.
    #[error("State serialization error: {message}")]
    SerializationError {
        /// Description of the serialization error.
        message: String,
    },

    /// State version mismatch.
    #[error("State version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Expected state version.
        expected: String,
        /// Found state version.
        found: String,
    },

    /// The stored state moved on since the caller loaded it.
    #[error("State changed since it was loaded: expected serial {base}, found {stored}")]
    StaleState {
        /// Serial the caller loaded.
        base: u64,
        /// Serial currently stored.
        stored: u64,
    },

    /// No resource at this address.
    #[error("No resource in state at address {address}")]
    UnknownAddress {
        /// The `type.name` address.
        address: String,
    },
}

/// Planning errors.
#[derive(Debug, Error)]
pub enum PlanError {
    /// The address is not `type.name`.
    #[error("Invalid resource address: {address}")]
    InvalidAddress {
        /// The offending address.
        address: String,
    },

    /// The resource is already managed.
    #[error("Resource {address} is already managed")]
    AlreadyManaged {
        /// The address.
        address: String,
    },

    /// The resource is not in configuration.
    #[error("Resource {address} is not in configuration")]
    NotConfigured {
        /// The address.
        address: String,
    },
}

/// Result type alias for workspace operations.
pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::State(StateError::LockedByOther { .. } | StateError::LockFailed { .. }))
    }
}

impl From<Diagnostics> for EngineError {
    fn from(diags: Diagnostics) -> Self {
        Self::Diagnostics(diags)
    }
}

/// Converts diagnostics into a result: `Err` if any is an error.
///
/// # Errors
///
/// Returns [`EngineError::Diagnostics`] when `diags` holds an error.
pub fn check(diags: Diagnostics) -> Result<Diagnostics> {
    if diags.has_error() {
        Err(EngineError::Diagnostics(diags))
    } else {
        Ok(diags)
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a validation error without a specific field.
    #[must_use]
    pub fn validation_general(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: None,
        }
    }
}

impl StateError {
    /// Creates a corruption error with the given message.
    #[must_use]
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }

    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    /// Creates a write error with the given message.
    #[must_use]
    pub fn write_failed(message: impl Into<String>) -> Self {
        Self::WriteFailed {
            message: message.into(),
        }
    }
}
