//! Unit of work over one SQLite transaction.

use super::query::{compile_related, compile_select, fetch_records, Query, QueryRow};
use crate::audit::Operation;
use crate::catalog::{quote_identifier, EntityDef, RelationDef, Registry, IDENTITY_FIELD};
use crate::error::{Error, Result};
use crate::lifecycle::{LifecycleHooks, QueryDescriptor, WriteContext};
use crate::record::EntityRecord;
use crate::value::Value;
use rusqlite::{params, params_from_iter, Connection, Transaction};
use std::collections::BTreeMap;
use std::sync::Arc;

/// One unit of work.
///
/// Every write, every hook and every audit row goes through the same
/// transaction. If a hook fails after a row write the whole transaction is
/// rolled back and the session refuses further work with
/// [`Error::SessionAborted`]. Dropping a session without committing rolls it
/// back.
pub struct Session<'c> {
    tx: Option<Transaction<'c>>,
    hooks: Arc<dyn LifecycleHooks>,
    registry: Arc<Registry>,
    actor: Option<i64>,
}

impl<'c> Session<'c> {
    pub(crate) fn new(
        tx: Transaction<'c>,
        hooks: Arc<dyn LifecycleHooks>,
        registry: Arc<Registry>,
    ) -> Self {
        Self {
            tx: Some(tx),
            hooks,
            registry,
            actor: None,
        }
    }

    /// Bind the acting user recorded in the audit trail.
    pub fn with_actor(mut self, actor: i64) -> Self {
        self.actor = Some(actor);
        self
    }

    /// Set or clear the acting user.
    pub fn set_actor(&mut self, actor: Option<i64>) {
        self.actor = actor;
    }

    /// Acting user, if any.
    pub fn actor(&self) -> Option<i64> {
        self.actor
    }

    /// Check if the unit of work was rolled back after a failure.
    pub fn is_aborted(&self) -> bool {
        self.tx.is_none()
    }

    /// The connection of the open transaction.
    pub fn connection(&self) -> Result<&Connection> {
        let tx = self.active()?;
        Ok(&**tx)
    }

    fn active(&self) -> Result<&Transaction<'c>> {
        self.tx.as_ref().ok_or(Error::SessionAborted)
    }

    fn abort(&mut self, err: Error) -> Error {
        if let Some(tx) = self.tx.take() {
            if let Err(rollback) = tx.rollback() {
                tracing::error!(error = %rollback, "rollback after failed write failed");
            }
        }
        tracing::warn!(error = %err, "unit of work aborted and rolled back");
        err
    }

    /// Insert a new record and assign its id.
    pub fn insert(&mut self, record: &mut EntityRecord) -> Result<()> {
        if record.is_persisted() {
            return Err(Error::InvalidData(format!("{} is already persisted", record)));
        }

        let result = {
            let tx = self.active()?;
            let entity = record.entity().clone();
            self.hooks.before_write(tx, &entity, Operation::Create)?;

            record.apply_defaults();
            let sql = if entity.fields.is_empty() {
                format!("INSERT INTO {} DEFAULT VALUES", quote_identifier(entity.storage_name()))
            } else {
                let columns: Vec<String> = entity.column_names().map(quote_identifier).collect();
                let placeholders: Vec<String> =
                    (1..=columns.len()).map(|i| format!("?{}", i)).collect();
                format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    quote_identifier(entity.storage_name()),
                    columns.join(", "),
                    placeholders.join(", ")
                )
            };
            tx.execute(&sql, params_from_iter(record.column_values()))?;

            let id = tx.last_insert_rowid();
            record.set_id(Some(id));
            tracing::debug!(entity = %entity.storage_name(), record_id = id, "row inserted");

            self.hooks.after_insert(&WriteContext::new(tx, self.actor), record)
        };

        if let Err(err) = result {
            record.set_id(None);
            return Err(self.abort(err));
        }
        record.mark_clean();
        Ok(())
    }

    /// Write every column of a persisted record.
    ///
    /// The row is written even when nothing changed.
    pub fn update(&mut self, record: &mut EntityRecord) -> Result<()> {
        let id = persisted_id(record)?;

        let result = {
            let tx = self.active()?;
            let entity = record.entity().clone();
            self.hooks.before_write(tx, &entity, Operation::Update)?;

            let assignments: Vec<String> = if entity.fields.is_empty() {
                vec![format!("{0} = {0}", quote_identifier(IDENTITY_FIELD))]
            } else {
                entity
                    .column_names()
                    .enumerate()
                    .map(|(i, c)| format!("{} = ?{}", quote_identifier(c), i + 1))
                    .collect()
            };
            let mut args = record.column_values();
            args.push(Value::Integer(id));
            let sql = format!(
                "UPDATE {} SET {} WHERE {} = ?{}",
                quote_identifier(entity.storage_name()),
                assignments.join(", "),
                quote_identifier(IDENTITY_FIELD),
                args.len()
            );

            if tx.execute(&sql, params_from_iter(args))? == 0 {
                return Err(Error::NotFound {
                    entity: entity.type_name.clone(),
                    id,
                });
            }
            tracing::debug!(entity = %entity.storage_name(), record_id = id, "row updated");

            self.hooks.after_update(&WriteContext::new(tx, self.actor), record)
        };

        if let Err(err) = result {
            return Err(self.abort(err));
        }
        record.mark_clean();
        Ok(())
    }

    /// Delete a persisted record. Its id is cleared on success.
    pub fn delete(&mut self, record: &mut EntityRecord) -> Result<()> {
        let id = persisted_id(record)?;

        let result = {
            let tx = self.active()?;
            let entity = record.entity().clone();
            self.hooks.before_write(tx, &entity, Operation::Delete)?;

            let sql = format!(
                "DELETE FROM {} WHERE {} = ?1",
                quote_identifier(entity.storage_name()),
                quote_identifier(IDENTITY_FIELD)
            );
            if tx.execute(&sql, params![id])? == 0 {
                return Err(Error::NotFound {
                    entity: entity.type_name.clone(),
                    id,
                });
            }
            tracing::debug!(entity = %entity.storage_name(), record_id = id, "row deleted");

            self.hooks.after_delete(&WriteContext::new(tx, self.actor), record)
        };

        if let Err(err) = result {
            return Err(self.abort(err));
        }
        record.set_id(None);
        Ok(())
    }

    /// Run a query. Permissions are checked before any SQL executes.
    pub fn query(&self, query: &Query) -> Result<Vec<QueryRow>> {
        let tx = self.active()?;
        let root = self.registry.get(query.entity())?;

        let mut included = Vec::with_capacity(query.includes().len());
        for name in query.includes() {
            let relation = relation_of(&root, name)?;
            let target = self.registry.get(&relation.to_entity)?;
            included.push((relation, target));
        }

        let descriptor = QueryDescriptor::new(
            std::iter::once(root.clone()).chain(included.iter().map(|(_, t)| t.clone())),
        );
        self.hooks.before_query(tx, &descriptor)?;

        let (sql, args) = compile_select(&root, query)?;
        let records = fetch_records(tx, &root, &sql, args)?;

        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let mut related = BTreeMap::new();
            if let Some(id) = record.id() {
                for (relation, target) in &included {
                    let sql = compile_related(
                        target,
                        &relation.association_table,
                        &relation.from_column,
                        &relation.to_column,
                    );
                    related.insert(relation.name.clone(), fetch_records(tx, target, &sql, [id])?);
                }
            }
            rows.push(QueryRow { record, related });
        }
        Ok(rows)
    }

    /// Get a record by id.
    pub fn get(&self, entity: &str, id: i64) -> Result<Option<EntityRecord>> {
        let query = Query::new(entity).filter_eq(IDENTITY_FIELD, id);
        Ok(self.query(&query)?.into_iter().next().map(|row| row.record))
    }

    /// All records of an entity, by id.
    pub fn all(&self, entity: &str) -> Result<Vec<EntityRecord>> {
        let query = Query::new(entity);
        Ok(self.query(&query)?.into_iter().map(|row| row.record).collect())
    }

    /// Records linked to `record` through `relation`.
    pub fn related(&self, record: &EntityRecord, relation: &str) -> Result<Vec<EntityRecord>> {
        let tx = self.active()?;
        let id = persisted_id(record)?;
        let relation = relation_of(record.entity(), relation)?;
        let target = self.registry.get(&relation.to_entity)?;

        self.hooks
            .before_query(tx, &QueryDescriptor::new([target.clone()]))?;

        let sql = compile_related(
            &target,
            &relation.association_table,
            &relation.from_column,
            &relation.to_column,
        );
        fetch_records(tx, &target, &sql, [id])
    }

    /// Link two persisted records through a many-to-many relation.
    ///
    /// Linking an already linked pair is a no-op.
    pub fn link(
        &mut self,
        record: &EntityRecord,
        relation: &str,
        other: &EntityRecord,
    ) -> Result<()> {
        let tx = self.active()?;
        let (relation, from, to) = association(record, relation, other)?;
        self.hooks
            .before_write(tx, record.entity(), Operation::Update)?;

        tx.execute(
            &format!(
                "INSERT OR IGNORE INTO {} ({}, {}) VALUES (?1, ?2)",
                quote_identifier(&relation.association_table),
                quote_identifier(&relation.from_column),
                quote_identifier(&relation.to_column)
            ),
            params![from, to],
        )?;
        tracing::debug!(relation = %relation.name, from, to, "records linked");
        Ok(())
    }

    /// Remove a many-to-many link. Returns whether the link existed.
    pub fn unlink(
        &mut self,
        record: &EntityRecord,
        relation: &str,
        other: &EntityRecord,
    ) -> Result<bool> {
        let tx = self.active()?;
        let (relation, from, to) = association(record, relation, other)?;
        self.hooks
            .before_write(tx, record.entity(), Operation::Update)?;

        let removed = tx.execute(
            &format!(
                "DELETE FROM {} WHERE {} = ?1 AND {} = ?2",
                quote_identifier(&relation.association_table),
                quote_identifier(&relation.from_column),
                quote_identifier(&relation.to_column)
            ),
            params![from, to],
        )?;
        Ok(removed > 0)
    }

    /// Commit the unit of work.
    pub fn commit(mut self) -> Result<()> {
        let tx = self.tx.take().ok_or(Error::SessionAborted)?;
        tx.commit()?;
        tracing::debug!("unit of work committed");
        Ok(())
    }

    /// Roll back the unit of work. A no-op on an aborted session.
    pub fn rollback(mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.rollback()?;
            tracing::debug!("unit of work rolled back");
        }
        Ok(())
    }
}

fn persisted_id(record: &EntityRecord) -> Result<i64> {
    record
        .id()
        .ok_or_else(|| Error::NotPersisted(record.entity().type_name.clone()))
}

fn relation_of(entity: &EntityDef, name: &str) -> Result<RelationDef> {
    entity
        .get_relation(name)
        .cloned()
        .ok_or_else(|| Error::UnknownRelation {
            entity: entity.type_name.clone(),
            relation: name.to_string(),
        })
}

fn association(
    record: &EntityRecord,
    relation: &str,
    other: &EntityRecord,
) -> Result<(RelationDef, i64, i64)> {
    let relation = relation_of(record.entity(), relation)?;
    if other.entity().type_name != relation.to_entity {
        return Err(Error::InvalidData(format!(
            "relation `{}` links {}, got {}",
            relation.name,
            relation.to_entity,
            other.entity().type_name
        )));
    }
    let from = persisted_id(record)?;
    let to = persisted_id(other)?;
    Ok((relation, from, to))
}
