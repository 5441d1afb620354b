//! Query builder and result rows.

use crate::catalog::{quote_identifier, EntityDef, FieldDef, IDENTITY_FIELD};
use crate::error::{Error, Result};
use crate::record::EntityRecord;
use crate::value::Value;
use rusqlite::{params_from_iter, Connection, ToSql};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A read over one root entity, optionally including related entities.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    entity: String,
    filters: Vec<(String, Value)>,
    includes: Vec<String>,
    limit: Option<usize>,
}

impl Query {
    /// Query all rows of an entity type.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            filters: Vec::new(),
            includes: Vec::new(),
            limit: None,
        }
    }

    /// Keep rows where `field` equals `value`. A null value matches `IS NULL`.
    pub fn filter_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    /// Load a relation for every returned row.
    pub fn include(mut self, relation: impl Into<String>) -> Self {
        self.includes.push(relation.into());
        self
    }

    /// Return at most `limit` rows.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Root entity type name.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Equality filters.
    pub fn filters(&self) -> &[(String, Value)] {
        &self.filters
    }

    /// Included relation names.
    pub fn includes(&self) -> &[String] {
        &self.includes
    }

    /// Row limit.
    pub fn row_limit(&self) -> Option<usize> {
        self.limit
    }
}

/// A root record with its included relations.
#[derive(Debug, Clone)]
pub struct QueryRow {
    /// The root record.
    pub record: EntityRecord,
    /// Related records by relation name.
    pub related: BTreeMap<String, Vec<EntityRecord>>,
}

impl QueryRow {
    /// Related records for a relation, empty if it was not included.
    pub fn related(&self, relation: &str) -> &[EntityRecord] {
        self.related.get(relation).map(Vec::as_slice).unwrap_or(&[])
    }
}

fn select_columns(entity: &EntityDef, alias: &str) -> String {
    std::iter::once(IDENTITY_FIELD)
        .chain(entity.column_names())
        .map(|c| format!("{}.{}", alias, quote_identifier(c)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Compile a root select: `(sql, params)`.
pub(crate) fn compile_select<'q>(
    entity: &EntityDef,
    query: &'q Query,
) -> Result<(String, Vec<&'q Value>)> {
    let mut sql = format!(
        "SELECT {} FROM {} AS t",
        select_columns(entity, "t"),
        quote_identifier(entity.storage_name())
    );

    let mut clauses = Vec::new();
    let mut args = Vec::new();
    for (field, value) in &query.filters {
        if field != IDENTITY_FIELD {
            let def = entity.get_field(field).ok_or_else(|| Error::UnknownField {
                entity: entity.type_name.clone(),
                field: field.clone(),
            })?;
            if !value.conforms_to(&def.field_type) {
                return Err(Error::InvalidData(format!(
                    "filter on {}.{} with {:?}",
                    entity.type_name, field, value
                )));
            }
        }

        if value.is_null() {
            clauses.push(format!("t.{} IS NULL", quote_identifier(field)));
        } else {
            args.push(value);
            clauses.push(format!("t.{} = ?{}", quote_identifier(field), args.len()));
        }
    }

    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(&format!(" ORDER BY t.{}", quote_identifier(IDENTITY_FIELD)));
    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    Ok((sql, args))
}

/// Compile the select for one many-to-many relation of an owner row.
pub(crate) fn compile_related(
    target: &EntityDef,
    association_table: &str,
    from_column: &str,
    to_column: &str,
) -> String {
    format!(
        "SELECT {cols} FROM {target} AS t JOIN {assoc} AS a ON a.{to} = t.{id} \
         WHERE a.{from} = ?1 ORDER BY t.{id}",
        cols = select_columns(target, "t"),
        target = quote_identifier(target.storage_name()),
        assoc = quote_identifier(association_table),
        to = quote_identifier(to_column),
        from = quote_identifier(from_column),
        id = quote_identifier(IDENTITY_FIELD),
    )
}

/// Run a select whose columns are `id` followed by every field of `entity`.
pub(crate) fn fetch_records<P: ToSql>(
    conn: &Connection,
    entity: &Arc<EntityDef>,
    sql: &str,
    params: impl IntoIterator<Item = P>,
) -> Result<Vec<EntityRecord>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params_from_iter(params))?;

    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let id: i64 = row.get(0)?;
        let mut values = BTreeMap::new();
        for (i, field) in entity.fields.iter().enumerate() {
            values.insert(field.name.clone(), decode(row, i + 1, field)?);
        }
        records.push(EntityRecord::loaded(entity.clone(), id, values));
    }
    Ok(records)
}

fn decode(row: &rusqlite::Row<'_>, index: usize, field: &FieldDef) -> Result<Value> {
    Value::from_column(row.get_ref(index)?, &field.field_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ScalarType;

    fn demo() -> EntityDef {
        EntityDef::new("DemoModel")
            .with_field(FieldDef::optional_scalar("name", ScalarType::Text))
            .with_field(FieldDef::optional_scalar("age", ScalarType::Integer))
    }

    #[test]
    fn test_compile_plain_select() {
        let query = Query::new("DemoModel");
        let (sql, args) = compile_select(&demo(), &query).unwrap();
        assert_eq!(
            sql,
            "SELECT t.\"id\", t.\"name\", t.\"age\" FROM \"demo_model\" AS t ORDER BY t.\"id\""
        );
        assert!(args.is_empty());
    }

    #[test]
    fn test_compile_filters_and_limit() {
        let query = Query::new("DemoModel")
            .filter_eq("name", "guido")
            .filter_eq("age", Value::Null)
            .filter_eq("id", 3i64)
            .limit(1);
        let (sql, args) = compile_select(&demo(), &query).unwrap();
        assert!(sql.ends_with(
            "WHERE t.\"name\" = ?1 AND t.\"age\" IS NULL AND t.\"id\" = ?2 \
             ORDER BY t.\"id\" LIMIT 1"
        ));
        assert_eq!(args, vec![&Value::from("guido"), &Value::from(3i64)]);
    }

    #[test]
    fn test_compile_rejects_unknown_field() {
        let query = Query::new("DemoModel").filter_eq("email", "x");
        let err = compile_select(&demo(), &query).unwrap_err();
        assert!(matches!(err, Error::UnknownField { .. }));
    }

    #[test]
    fn test_compile_rejects_mismatched_filter() {
        let query = Query::new("DemoModel").filter_eq("age", "old");
        assert!(matches!(
            compile_select(&demo(), &query),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    fn test_compile_related() {
        let role = EntityDef::new("Role")
            .with_field(FieldDef::optional_scalar("name", ScalarType::Text));
        let sql = compile_related(&role, "user_role_rel", "user_id", "role_id");
        assert_eq!(
            sql,
            "SELECT t.\"id\", t.\"name\" FROM \"role\" AS t JOIN \"user_role_rel\" AS a \
             ON a.\"role_id\" = t.\"id\" WHERE a.\"user_id\" = ?1 ORDER BY t.\"id\""
        );
    }

    #[test]
    fn test_query_row_related_defaults_empty() {
        let row = QueryRow {
            record: EntityRecord::new(Arc::new(demo())),
            related: BTreeMap::new(),
        };
        assert!(row.related("roles").is_empty());
    }
}
