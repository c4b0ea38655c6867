//! Error types and handling for hostlens core

use std::time::Duration;
use thiserror::Error;

/// Result type alias for hostlens operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for hostlens core
#[derive(Error, Debug)]
pub enum Error {
    /// Condition and compilation errors
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    /// Remote execution errors
    #[error("Execution error: {0}")]
    Exec(#[from] ExecError),

    /// Record decoding errors
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with message
    #[error("{0}")]
    Generic(String),
}

/// Errors raised before any remote cost is incurred
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Unsupported condition for {flavor}: {message}")]
    UnsupportedCondition { flavor: String, message: String },

    #[error("Not found: {key}")]
    NotFound { key: String },
}

/// Errors raised by the execution channel
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("Command timed out after {}ms: {command}", elapsed.as_millis())]
    Timeout {
        command: String,
        elapsed: Duration,
        partial_output: String,
    },

    #[error("Transport failure running '{command}': {message}")]
    TransportFailure { command: String, message: String },
}

/// A single record could not be decoded
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Malformed record '{line}': {reason}")]
    Malformed { line: String, reason: String },

    #[error("Truncated record: {reason}")]
    Truncated { reason: String },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load settings: {0}")]
    Load(#[from] config::ConfigError),
}

impl Error {
    /// Build an invalid-argument error
    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        SearchError::InvalidArgument {
            message: message.into(),
        }
        .into()
    }

    /// Build an unsupported-condition error for a flavor
    pub fn unsupported<F: Into<String>, S: Into<String>>(flavor: F, message: S) -> Self {
        SearchError::UnsupportedCondition {
            flavor: flavor.into(),
            message: message.into(),
        }
        .into()
    }

    /// Build a transport failure for a command
    pub fn transport<C: Into<String>, S: ToString>(command: C, cause: S) -> Self {
        ExecError::TransportFailure {
            command: command.into(),
            message: cause.to_string(),
        }
        .into()
    }

    /// Whether this error is an execution timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Exec(ExecError::Timeout { .. }))
    }

    /// Whether this error rejects a condition the flavor cannot express
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            Error::Search(SearchError::UnsupportedCondition { .. })
        )
    }

    /// Whether this error is a failed exact-key lookup
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Search(SearchError::NotFound { .. }))
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(ConfigError::Load(err))
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Generic(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Generic(msg.to_string())
    }
}
