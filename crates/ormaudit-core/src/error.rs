//! Core error types.

use crate::audit::AuditError;
use crate::security::SecurityError;
use thiserror::Error;

/// Core errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Database error outside the audit trail.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Permission or authentication failure.
    #[error(transparent)]
    Security(#[from] SecurityError),

    /// Writing the audit trail failed; the unit of work is rolled back.
    #[error(transparent)]
    Audit(#[from] AuditError),

    /// Entity type was never registered.
    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    /// Field does not exist on the entity.
    #[error("unknown field `{field}` on entity `{entity}`")]
    UnknownField {
        /// Entity type name.
        entity: String,
        /// Field name.
        field: String,
    },

    /// Relation does not exist on the entity.
    #[error("unknown relation `{relation}` on entity `{entity}`")]
    UnknownRelation {
        /// Entity type name.
        entity: String,
        /// Relation name.
        relation: String,
    },

    /// Invalid entity definition or registration conflict.
    #[error("registry error: {0}")]
    Registry(String),

    /// Operation requires a record that has been inserted.
    #[error("record of `{0}` has not been persisted")]
    NotPersisted(String),

    /// Record does not exist.
    #[error("record not found: {entity} #{id}")]
    NotFound {
        /// Entity type name.
        entity: String,
        /// Primary key.
        id: i64,
    },

    /// The unit of work was rolled back after a failure.
    #[error("session aborted after a failed write; start a new session")]
    SessionAborted,

    /// Value does not fit the column or stored data is malformed.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl Error {
    /// Check if this error is a permission denial.
    pub fn is_permission_denied(&self) -> bool {
        matches!(
            self,
            Error::Security(SecurityError::PermissionDenied { .. })
        )
    }

    /// Check if this error came from the audit trail.
    pub fn is_audit_failure(&self) -> bool {
        matches!(self, Error::Audit(_))
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;
