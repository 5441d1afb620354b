//! Entity registry.

use super::entity::{EntityDef, Model};
use crate::error::{Error, Result};
use parking_lot::RwLock;
use rusqlite::Connection;
use std::collections::HashMap;
use std::sync::Arc;

/// Tables owned by the permission store and the audit log.
pub const ENGINE_TABLES: &[&str] = &["permission", "audit_operation", "audit_field"];

/// Storage names no registered entity may take.
pub const RESERVED_STORAGE_NAMES: &[&str] =
    &["permission", "audit_operation", "audit_field", "user_role_rel"];

#[derive(Default)]
struct Inner {
    /// Definitions keyed by type name.
    by_type: HashMap<String, Arc<EntityDef>>,
    /// Storage name -> type name.
    by_storage: HashMap<String, String>,
}

/// The set of entity types known to the mapping layer.
///
/// Types are registered explicitly, in any order, as they are declared.
/// Share it through an `Arc`; every component that needs entity metadata is
/// handed the same instance.
#[derive(Default)]
pub struct Registry {
    inner: RwLock<Inner>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity definition.
    ///
    /// Registering an identical definition twice returns the existing one.
    /// A different definition under the same type name, or a second type
    /// mapping to the same storage name, is rejected. So is a type whose
    /// table or association table is one of the engine's own tables.
    pub fn register(&self, def: EntityDef) -> Result<Arc<EntityDef>> {
        def.validate()?;

        if RESERVED_STORAGE_NAMES.contains(&def.storage_name()) {
            return Err(Error::Registry(format!(
                "storage name `{}` of `{}` is reserved",
                def.storage_name(),
                def.type_name
            )));
        }
        if let Some(relation) = def
            .relations
            .iter()
            .find(|r| ENGINE_TABLES.contains(&r.association_table.as_str()))
        {
            return Err(Error::Registry(format!(
                "relation `{}` of `{}` uses a reserved association table",
                relation.name, def.type_name
            )));
        }

        let mut inner = self.inner.write();

        if let Some(existing) = inner.by_type.get(&def.type_name) {
            if **existing == def {
                return Ok(Arc::clone(existing));
            }
            return Err(Error::Registry(format!(
                "entity `{}` is already registered with a different definition",
                def.type_name
            )));
        }

        if let Some(owner) = inner.by_storage.get(def.storage_name()) {
            return Err(Error::Registry(format!(
                "storage name `{}` of `{}` is already used by `{}`",
                def.storage_name(),
                def.type_name,
                owner
            )));
        }

        tracing::debug!(
            entity = %def.type_name,
            storage_name = %def.storage_name(),
            fields = def.fields.len(),
            "registered entity"
        );

        let def = Arc::new(def);
        inner
            .by_storage
            .insert(def.storage_name().to_string(), def.type_name.clone());
        inner
            .by_type
            .insert(def.type_name.clone(), Arc::clone(&def));
        Ok(def)
    }

    /// Register a type declared in Rust code.
    pub fn register_model<M: Model>(&self) -> Result<Arc<EntityDef>> {
        self.register(M::entity_def())
    }

    /// Get an entity definition by type name.
    pub fn get(&self, type_name: &str) -> Result<Arc<EntityDef>> {
        self.inner
            .read()
            .by_type
            .get(type_name)
            .cloned()
            .ok_or_else(|| Error::UnknownEntity(type_name.to_string()))
    }

    /// Get the definition registered for a model type.
    pub fn descriptor_of<M: Model>(&self) -> Result<Arc<EntityDef>> {
        self.get(M::TYPE_NAME)
    }

    /// Get an entity definition by storage name.
    pub fn by_storage_name(&self, storage_name: &str) -> Result<Arc<EntityDef>> {
        let inner = self.inner.read();
        inner
            .by_storage
            .get(storage_name)
            .and_then(|type_name| inner.by_type.get(type_name))
            .cloned()
            .ok_or_else(|| Error::UnknownEntity(storage_name.to_string()))
    }

    /// Check whether a storage name belongs to a registered entity.
    pub fn contains_storage_name(&self, storage_name: &str) -> bool {
        self.inner.read().by_storage.contains_key(storage_name)
    }

    /// Snapshot of all registered definitions, sorted by type name.
    pub fn entities(&self) -> Vec<Arc<EntityDef>> {
        let mut entities: Vec<_> = self.inner.read().by_type.values().cloned().collect();
        entities.sort_by(|a, b| a.type_name.cmp(&b.type_name));
        entities
    }

    /// Number of registered entities.
    pub fn len(&self) -> usize {
        self.inner.read().by_type.len()
    }

    /// Check if no entity is registered.
    pub fn is_empty(&self) -> bool {
        self.inner.read().by_type.is_empty()
    }

    /// Create tables for every registered entity and its association tables.
    ///
    /// Existing tables are left untouched.
    pub fn create_tables(&self, conn: &Connection) -> Result<()> {
        for entity in self.entities() {
            conn.execute(&entity.create_table_sql(), [])?;
            for relation in &entity.relations {
                conn.execute(&entity.association_table_sql(relation), [])?;
            }
        }
        tracing::info!(entities = self.len(), "entity tables ready");
        Ok(())
    }
}
