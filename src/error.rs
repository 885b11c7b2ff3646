//! Error types for group-menu

use rusqlite::ErrorCode;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T, E = MenuError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum MenuError {
    #[error("Permission denied: {actor_id} cannot administer the menu of group {group_id}")]
    PermissionDenied { actor_id: String, group_id: String },

    #[error("Only one view reference can be set (got: {})", fields.join(", "))]
    InvalidReference { fields: Vec<String> },

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("System node {0} cannot be deleted")]
    SystemNodeProtected(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Scope not found: {0}")]
    ScopeNotFound(String),

    #[error("Cycle detected: {0}")]
    CycleDetected(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Group {0} already has a menu")]
    AlreadyBootstrapped(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MenuError {
    /// Classify a SQLite failure. Busy and locked databases are write
    /// contention and become `Conflict` so the service can retry them.
    pub fn db(context: &str, err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
                MenuError::Conflict(format!("{}: {}", context, err))
            }
            _ => MenuError::Database(format!("{}: {}", context, err)),
        }
    }

    /// Whether the service may retry the failed call
    pub fn is_retryable(&self) -> bool {
        matches!(self, MenuError::Conflict(_))
    }
}
