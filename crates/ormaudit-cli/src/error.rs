//! CLI errors.

use ormaudit_core::{AuditError, SecurityError};
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced to the operator.
#[derive(Debug, Error)]
pub enum CliError {
    /// Core mapping layer error.
    #[error(transparent)]
    Core(#[from] ormaudit_core::Error),

    /// Permission or authentication error.
    #[error(transparent)]
    Security(#[from] SecurityError),

    /// Audit trail error.
    #[error(transparent)]
    Audit(#[from] AuditError),

    /// Opening or preparing the database failed.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Reading an input file failed.
    #[error("cannot read {}: {source}", path.display())]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// No user with that username.
    #[error("unknown user `{0}`")]
    UnknownUser(String),

    /// No role with that name.
    #[error("unknown role `{0}`")]
    UnknownRole(String),

    /// The entity has no permission record.
    #[error("no permission record for `{0}`")]
    NotGranted(String),
}

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;
