//! Error types for db-runner.
//!
//! Defines the main error enum used throughout the crate.

use thiserror::Error;

/// Main error type for query runner operations.
#[derive(Error, Debug)]
pub enum RunnerError {
    /// The requested connection profile does not exist in the settings store.
    #[error("Configuration not found: {0}")]
    ConfigNotFound(String),

    /// The settings store is malformed or a profile is incomplete.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Driver-level connection failures (host unreachable, auth failed, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// An operation needed an open connection and there was none.
    #[error("Not connected: call connect() before running queries")]
    NotConnected,

    /// Prepare, bind or execute failures (syntax errors, constraint violations, etc.)
    #[error("SQL error: {}", describe_sql_error(.message, .code.as_deref()))]
    SqlExecution {
        /// Driver message, or the binding problem found before execution.
        message: String,
        /// SQLSTATE or driver-specific error code, when the driver reports one.
        code: Option<String>,
    },
}

fn describe_sql_error(message: &str, code: Option<&str>) -> String {
    match code {
        Some(code) => format!("[{code}] {message}"),
        None => message.to_string(),
    }
}

impl RunnerError {
    /// Creates a profile-not-found error for the given profile name.
    pub fn config_not_found(msg: impl Into<String>) -> Self {
        Self::ConfigNotFound(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates an SQL execution error without a driver code.
    pub fn sql(msg: impl Into<String>) -> Self {
        Self::SqlExecution {
            message: msg.into(),
            code: None,
        }
    }

    /// Creates an SQL execution error carrying the driver's error code.
    pub fn sql_with_code(msg: impl Into<String>, code: impl Into<String>) -> Self {
        Self::SqlExecution {
            message: msg.into(),
            code: Some(code.into()),
        }
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::ConfigNotFound(_) => "Configuration Not Found",
            Self::Config(_) => "Configuration Error",
            Self::Connection(_) => "Connection Error",
            Self::NotConnected => "Not Connected",
            Self::SqlExecution { .. } => "SQL Execution Error",
        }
    }

    /// Returns the driver error code for SQL execution errors.
    pub fn sql_code(&self) -> Option<&str> {
        match self {
            Self::SqlExecution { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

/// Result type alias using RunnerError.
pub type Result<T> = std::result::Result<T, RunnerError>;
