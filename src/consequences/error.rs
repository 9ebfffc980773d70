//! Error types for the consequence engine
//!
//! This module defines the errors that can occur while looking up, building,
//! executing or reverting consequences.

use thiserror::Error;

/// Failures reported by a collaborator (block store, cache, session, ...)
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backing store rejected or failed the operation
    #[error("Storage failure: {0}")]
    Storage(String),

    /// The backing store cannot be reached
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Result type for collaborator calls
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors that can occur while executing consequences
#[derive(Debug, Error)]
pub enum ConsequenceError {
    /// A disabling consequence was executed before its disable check ran
    #[error("Consequence {0} was executed without its disable check")]
    NotPrechecked(&'static str),

    /// A throttle was configured with a group type we cannot identify
    #[error("Invalid throttle group: {0}")]
    InvalidThrottleGroup(String),

    /// Filter metadata could not be resolved
    #[error("Filter not found: {0}")]
    FilterNotFound(String),

    /// Global filters were requested but no central store is configured
    #[error("Central filter store is not available")]
    CentralStoreUnavailable,

    /// Revert was requested for an action that cannot be undone
    #[error("Action {0} is not reversible")]
    NotReversible(String),

    /// A collaborator failed
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Generic error
    #[error("Consequence error: {0}")]
    Other(String),
}

/// Convert a string into a `ConsequenceError`
impl From<String> for ConsequenceError {
    fn from(message: String) -> Self {
        Self::Other(message)
    }
}

/// Result type for consequence operations
pub type ConsequenceResult<T> = Result<T, ConsequenceError>;

/// Errors raised while registering custom actions
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Custom action names must not be empty
    #[error("Custom action name must not be empty")]
    EmptyName,

    /// Custom action names are restricted to `[a-z0-9_-]`
    #[error("Invalid custom action name: {0}")]
    InvalidName(String),

    /// Built-in actions cannot be overridden
    #[error("Custom action {0} shadows a built-in action")]
    BuiltinName(String),

    /// The same custom action was registered twice
    #[error("Custom action {0} is already registered")]
    Duplicate(String),
}

/// Errors raised while loading or saving the engine configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
