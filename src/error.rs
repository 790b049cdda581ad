//! Error types for merit
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad input, unknown task or user)
//! - 3: Blocked by policy (not authenticated, role mismatch, illegal transition)
//! - 4: Operation failed (storage error, IO)

use std::path::PathBuf;
use thiserror::Error;

use crate::task::TaskStatus;

/// Exit codes for the merit CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const POLICY_BLOCKED: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for merit operations
#[derive(Error, Debug)]
pub enum Error {
    // Authentication (exit code 3)
    #[error("No caller identity: pass --as <username> or set MERIT_USER")]
    Unauthenticated,

    #[error("Unknown caller: {0}")]
    UnknownCaller(String),

    // Authorization (exit code 3)
    #[error("Admin role required to {0}")]
    AdminRequired(&'static str),

    // Validation (exit code 2)
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Username already taken: {0}")]
    DuplicateUsername(String),

    // Not found (exit code 2)
    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    // Lifecycle violations (exit code 3)
    #[error("Task {task_id} cannot be {action} while {status}")]
    InvalidState {
        task_id: String,
        status: TaskStatus,
        action: &'static str,
    },

    // Operation failures (exit code 4)
    #[error("Storage error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            // User errors
            Error::Validation(_)
            | Error::InvalidConfig(_)
            | Error::DuplicateUsername(_)
            | Error::UserNotFound(_)
            | Error::TaskNotFound(_) => exit_codes::USER_ERROR,

            // Policy blocks
            Error::Unauthenticated
            | Error::UnknownCaller(_)
            | Error::AdminRequired(_)
            | Error::InvalidState { .. } => exit_codes::POLICY_BLOCKED,

            // Operation failures
            Error::Sqlite(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::LockFailed(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Stable kind label used in JSON envelopes
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Unauthenticated | Error::UnknownCaller(_) => "authentication",
            Error::AdminRequired(_) => "authorization",
            Error::Validation(_) | Error::InvalidConfig(_) | Error::DuplicateUsername(_) => {
                "validation"
            }
            Error::UserNotFound(_) | Error::TaskNotFound(_) => "not_found",
            Error::InvalidState { .. } => "invalid_state",
            _ => "operation_failed",
        }
    }
}

/// Result type alias for merit operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub code: i32,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            error: err.to_string(),
            code: err.exit_code(),
            kind: err.kind(),
            details: None,
        }
    }
}
