//! Audit log tables.
//!
//! `audit_operation` holds one row per intercepted write, `audit_field` one row
//! per changed field. Both are append-only and written on the caller's
//! connection, so they commit or roll back with the data they describe.

use super::changeset::FieldChange;
use super::error::{AuditError, AuditResult};
use crate::security::Verb;
use crate::value::format_timestamp;
use chrono::Utc;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS audit_operation (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    entity      TEXT NOT NULL,
    operation   TEXT NOT NULL CHECK (operation IN ('create', 'update', 'delete')),
    occurred_at TEXT NOT NULL,
    record_id   INTEGER NOT NULL,
    actor_id    INTEGER
);
CREATE INDEX IF NOT EXISTS idx_audit_operation_record
    ON audit_operation (entity, record_id);

CREATE TABLE IF NOT EXISTS audit_field (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    operation_id INTEGER NOT NULL REFERENCES audit_operation (id) ON DELETE CASCADE,
    field        TEXT NOT NULL,
    old_value    TEXT,
    new_value    TEXT
);
CREATE INDEX IF NOT EXISTS idx_audit_field_operation
    ON audit_field (operation_id);
";

/// Mutating operations recorded in the trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Row inserted.
    Create,
    /// Row updated.
    Update,
    /// Row deleted.
    Delete,
}

impl Operation {
    /// Lower-case name, as stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }

    /// Permission verb guarding this operation.
    pub fn verb(&self) -> Verb {
        match self {
            Operation::Create => Verb::Create,
            Operation::Update => Verb::Update,
            Operation::Delete => Verb::Delete,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Operation::Create),
            "update" => Ok(Operation::Update),
            "delete" => Ok(Operation::Delete),
            other => Err(AuditError::Corrupt(format!("unknown operation `{}`", other))),
        }
    }
}

/// Writer for the audit tables.
pub struct AuditStore;

impl AuditStore {
    /// Create the audit tables if they do not exist.
    pub fn init_schema(conn: &Connection) -> AuditResult<()> {
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Insert one operation row and return its id.
    ///
    /// The id is visible on `conn` immediately, before the surrounding
    /// transaction commits.
    pub fn record_operation(
        conn: &Connection,
        entity: &str,
        operation: Operation,
        record_id: i64,
        actor_id: Option<i64>,
    ) -> AuditResult<i64> {
        let occurred_at = format_timestamp(&Utc::now());

        conn.execute(
            "INSERT INTO audit_operation (entity, operation, occurred_at, record_id, actor_id) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![entity, operation.as_str(), occurred_at, record_id, actor_id],
        )
        .map_err(|source| AuditError::OperationWrite {
            entity: entity.to_string(),
            operation,
            record_id,
            source,
        })?;

        let operation_id = conn.last_insert_rowid();
        tracing::debug!(
            entity,
            operation = %operation,
            record_id,
            operation_id,
            "audit operation recorded"
        );
        Ok(operation_id)
    }

    /// Insert one field row under `operation_id`.
    pub fn record_field_change(
        conn: &Connection,
        operation_id: i64,
        change: &FieldChange,
    ) -> AuditResult<()> {
        conn.execute(
            "INSERT INTO audit_field (operation_id, field, old_value, new_value) \
             VALUES (?1, ?2, ?3, ?4)",
            params![
                operation_id,
                change.field,
                change.old_value,
                change.new_value
            ],
        )
        .map_err(|source| AuditError::FieldWrite {
            operation_id,
            field: change.field.clone(),
            source,
        })?;

        tracing::trace!(operation_id, field = %change.field, "audit field recorded");
        Ok(())
    }
}
