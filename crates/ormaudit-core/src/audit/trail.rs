//! Reading the audit trail back.

use super::error::{AuditError, AuditResult};
use super::store::Operation;
use crate::value::parse_timestamp;
use chrono::{DateTime, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, Row};
use serde::Serialize;

/// One row of `audit_operation`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditOperation {
    /// Operation id.
    pub id: i64,
    /// Storage name of the entity.
    pub entity: String,
    /// Operation kind.
    pub operation: Operation,
    /// When the write was intercepted.
    pub occurred_at: DateTime<Utc>,
    /// Primary key of the affected row.
    pub record_id: i64,
    /// Acting user, if the session had one.
    pub actor_id: Option<i64>,
}

impl AuditOperation {
    fn from_row(
        row: &Row<'_>,
    ) -> rusqlite::Result<(i64, String, String, String, i64, Option<i64>)> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
        ))
    }

    fn decode(raw: (i64, String, String, String, i64, Option<i64>)) -> AuditResult<Self> {
        let (id, entity, operation, occurred_at, record_id, actor_id) = raw;
        let occurred_at =
            parse_timestamp(&occurred_at).map_err(|e| AuditError::Corrupt(e.to_string()))?;
        Ok(Self {
            id,
            entity,
            operation: operation.parse()?,
            occurred_at,
            record_id,
            actor_id,
        })
    }
}

/// One row of `audit_field`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditField {
    /// Field row id.
    pub id: i64,
    /// Parent operation id.
    pub operation_id: i64,
    /// Field name.
    pub field: String,
    /// Rendered value before the write.
    pub old_value: Option<String>,
    /// Rendered value after the write.
    pub new_value: Option<String>,
}

impl AuditField {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            operation_id: row.get(1)?,
            field: row.get(2)?,
            old_value: row.get(3)?,
            new_value: row.get(4)?,
        })
    }
}

/// An operation together with its field rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    /// The operation row.
    #[serde(flatten)]
    pub operation: AuditOperation,
    /// Field rows, in insertion order.
    pub fields: Vec<AuditField>,
}

/// Filter for trail queries.
#[derive(Debug, Clone, Default)]
pub struct TrailFilter {
    /// Only this entity (storage name).
    pub entity: Option<String>,
    /// Only this record id.
    pub record_id: Option<i64>,
    /// Only this operation kind.
    pub operation: Option<Operation>,
    /// Maximum number of operations.
    pub limit: Option<usize>,
}

impl TrailFilter {
    /// Match everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to an entity.
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    /// Restrict to a record id.
    pub fn with_record_id(mut self, record_id: i64) -> Self {
        self.record_id = Some(record_id);
        self
    }

    /// Restrict to an operation kind.
    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operation = Some(operation);
        self
    }

    /// Limit the number of operations returned.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Read access to the audit tables.
pub struct AuditTrail;

impl AuditTrail {
    /// Operations matching `filter`, newest first.
    pub fn operations(conn: &Connection, filter: &TrailFilter) -> AuditResult<Vec<AuditOperation>> {
        let mut sql = String::from(
            "SELECT id, entity, operation, occurred_at, record_id, actor_id FROM audit_operation",
        );
        let mut clauses = Vec::new();
        let mut args: Vec<SqlValue> = Vec::new();

        if let Some(entity) = &filter.entity {
            args.push(SqlValue::Text(entity.clone()));
            clauses.push(format!("entity = ?{}", args.len()));
        }
        if let Some(record_id) = filter.record_id {
            args.push(SqlValue::Integer(record_id));
            clauses.push(format!("record_id = ?{}", args.len()));
        }
        if let Some(operation) = filter.operation {
            args.push(SqlValue::Text(operation.as_str().to_string()));
            clauses.push(format!("operation = ?{}", args.len()));
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY id DESC");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let mut stmt = conn.prepare(&sql)?;
        let raw = stmt
            .query_map(params_from_iter(args), AuditOperation::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        raw.into_iter().map(AuditOperation::decode).collect()
    }

    /// Field rows of one operation, in insertion order.
    pub fn fields(conn: &Connection, operation_id: i64) -> AuditResult<Vec<AuditField>> {
        let mut stmt = conn.prepare(
            "SELECT id, operation_id, field, old_value, new_value \
             FROM audit_field WHERE operation_id = ?1 ORDER BY id",
        )?;
        let fields = stmt
            .query_map(params![operation_id], AuditField::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(fields)
    }

    /// Operations matching `filter` with their field rows, newest first.
    pub fn entries(conn: &Connection, filter: &TrailFilter) -> AuditResult<Vec<AuditEntry>> {
        Self::operations(conn, filter)?
            .into_iter()
            .map(|operation| {
                let fields = Self::fields(conn, operation.id)?;
                Ok(AuditEntry { operation, fields })
            })
            .collect()
    }

    /// Full history of one record, oldest first.
    pub fn history(
        conn: &Connection,
        entity: &str,
        record_id: i64,
    ) -> AuditResult<Vec<AuditEntry>> {
        let filter = TrailFilter::new()
            .with_entity(entity)
            .with_record_id(record_id);
        let mut entries = Self::entries(conn, &filter)?;
        entries.reverse();
        Ok(entries)
    }
}
