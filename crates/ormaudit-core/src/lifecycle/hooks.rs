//! Hook points the mapping layer calls around reads and writes.

use crate::audit::Operation;
use crate::catalog::EntityDef;
use crate::error::Result;
use crate::record::EntityRecord;
use rusqlite::Connection;
use std::sync::Arc;

/// The entity types a query is about to touch.
///
/// Built by the mapping layer at query-compile time, before any SQL runs.
/// Targets are unique by storage name, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct QueryDescriptor {
    targets: Vec<Arc<EntityDef>>,
}

impl QueryDescriptor {
    /// Build a descriptor from the query's entities.
    pub fn new(entities: impl IntoIterator<Item = Arc<EntityDef>>) -> Self {
        let mut targets: Vec<Arc<EntityDef>> = Vec::new();
        for entity in entities {
            if !targets
                .iter()
                .any(|t| t.storage_name() == entity.storage_name())
            {
                targets.push(entity);
            }
        }
        Self { targets }
    }

    /// Target entities.
    pub fn targets(&self) -> &[Arc<EntityDef>] {
        &self.targets
    }

    /// Storage names of the targets.
    pub fn storage_names(&self) -> impl Iterator<Item = &str> {
        self.targets.iter().map(|t| t.storage_name())
    }
}

/// State shared with the after-write hooks.
#[derive(Clone, Copy)]
pub struct WriteContext<'a> {
    /// Connection holding the open unit of work.
    pub conn: &'a Connection,
    /// Acting user bound to the session.
    pub actor: Option<i64>,
}

impl<'a> WriteContext<'a> {
    /// Create a write context.
    pub fn new(conn: &'a Connection, actor: Option<i64>) -> Self {
        Self { conn, actor }
    }
}

/// Lifecycle hooks invoked synchronously by a `Session`.
///
/// Every hook runs on the session's transaction. An error from any hook
/// aborts the unit of work.
pub trait LifecycleHooks: Send + Sync {
    /// Called before a query's SQL is executed.
    fn before_query(&self, conn: &Connection, query: &QueryDescriptor) -> Result<()>;

    /// Called before a row write is issued.
    fn before_write(
        &self,
        _conn: &Connection,
        _entity: &EntityDef,
        _operation: Operation,
    ) -> Result<()> {
        Ok(())
    }

    /// Called after a row was inserted. The record carries its new id.
    fn after_insert(&self, ctx: &WriteContext<'_>, record: &EntityRecord) -> Result<()>;

    /// Called after a row was updated, before the record's snapshot is
    /// refreshed.
    fn after_update(&self, ctx: &WriteContext<'_>, record: &EntityRecord) -> Result<()>;

    /// Called after a row was deleted. The record still carries its id.
    fn after_delete(&self, ctx: &WriteContext<'_>, record: &EntityRecord) -> Result<()>;
}

/// Hooks that allow everything and record nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl LifecycleHooks for NoHooks {
    fn before_query(&self, _conn: &Connection, _query: &QueryDescriptor) -> Result<()> {
        Ok(())
    }

    fn after_insert(&self, _ctx: &WriteContext<'_>, _record: &EntityRecord) -> Result<()> {
        Ok(())
    }

    fn after_update(&self, _ctx: &WriteContext<'_>, _record: &EntityRecord) -> Result<()> {
        Ok(())
    }

    fn after_delete(&self, _ctx: &WriteContext<'_>, _record: &EntityRecord) -> Result<()> {
        Ok(())
    }
}
