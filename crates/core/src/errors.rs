//! Error types and handling
//!
//! The error taxonomy is structured with one enum per domain (gateway,
//! validation, configuration, cache) wrapped in the top-level [`BerthError`]
//! for unified handling at the binary boundary.
//!
//! Note that the execution gateway never returns these as `Err` on its own;
//! it reports outcomes through [`crate::gateway::OperationResult`], which can
//! be converted into a [`GatewayError`] with `into_result()` when a caller
//! prefers `?`.

use crate::model::ResourceKind;
use thiserror::Error;

/// Failures produced while invoking the external binary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The configured binary could not be found or started
    #[error("Container CLI not available: {message}")]
    BinaryNotFound { message: String },

    /// Execution exceeded the configured bound
    #[error("Command timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },

    /// The process ran and failed
    #[error("{message} (exit code {code})")]
    NonZeroExit { code: i32, message: String },

    /// Process output exceeded the configured ceiling
    #[error("{message}")]
    OutputTooLarge { message: String },

    /// JSON decode failure on an otherwise successful process
    #[error("{message}")]
    OutputParse { message: String },
}

/// Caller-supplied names that would be rejected by the engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{what} name cannot be empty")]
    Empty { what: &'static str },

    #[error("{what} name '{name}' must start with an alphanumeric character")]
    InvalidStart { what: &'static str, name: String },

    #[error("{what} name '{name}' contains invalid character '{ch}'. Only alphanumerics, '_', '.' and '-' are allowed")]
    InvalidCharacter {
        what: &'static str,
        name: String,
        ch: char,
    },
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Settings file parsing error
    #[error("Failed to parse settings file: {message}")]
    Parsing { message: String },

    /// Settings validation error
    #[error("Settings validation error: {message}")]
    Validation { message: String },

    /// Settings file I/O error
    #[error("Failed to read settings file")]
    Io(#[from] std::io::Error),

    /// Settings file not found
    #[error("Settings file not found: {path}")]
    NotFound { path: String },
}

/// Resource cache errors surfaced to explicit refresh callers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Refreshing {kind} list failed: {message}")]
    RefreshFailed { kind: ResourceKind, message: String },

    #[error("The {kind} cache has been disposed")]
    Disposed { kind: ResourceKind },
}

/// Main error enum wrapping all domain-specific errors
#[derive(Error, Debug)]
pub enum BerthError {
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

/// Convenience type alias for Results with BerthError
pub type Result<T> = std::result::Result<T, BerthError>;
