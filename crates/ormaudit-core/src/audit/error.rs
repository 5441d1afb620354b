//! Audit trail errors.

use super::store::Operation;
use thiserror::Error;

/// Audit trail errors.
///
/// A write failure is fatal to the unit of work that triggered it: the
/// session rolls back so no audited change exists without its log entry.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Inserting the operation row failed.
    #[error("audit write failed for {operation} of {entity} #{record_id}: {source}")]
    OperationWrite {
        /// Storage name of the entity.
        entity: String,
        /// Audited operation.
        operation: Operation,
        /// Primary key of the affected row.
        record_id: i64,
        /// Underlying database error.
        #[source]
        source: rusqlite::Error,
    },

    /// Inserting a field row failed.
    #[error("audit write failed for field `{field}` of operation {operation_id}: {source}")]
    FieldWrite {
        /// Parent operation id.
        operation_id: i64,
        /// Field name.
        field: String,
        /// Underlying database error.
        #[source]
        source: rusqlite::Error,
    },

    /// Schema creation or trail query failed.
    #[error("audit storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// A stored row could not be decoded.
    #[error("corrupt audit row: {0}")]
    Corrupt(String),
}

impl AuditError {
    /// Check if this error came from writing the trail.
    pub fn is_write_failure(&self) -> bool {
        matches!(
            self,
            AuditError::OperationWrite { .. } | AuditError::FieldWrite { .. }
        )
    }
}

/// Result type for audit operations.
pub type AuditResult<T> = Result<T, AuditError>;
