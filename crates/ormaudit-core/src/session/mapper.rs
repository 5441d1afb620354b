//! Mapping layer entry point.

use super::unit::Session;
use crate::audit::AuditStore;
use crate::catalog::{Model, Registry};
use crate::config::MapperConfig;
use crate::error::Result;
use crate::lifecycle::{Interceptor, LifecycleHooks};
use crate::record::EntityRecord;
use crate::security::PermissionStore;
use rusqlite::Connection;
use std::sync::Arc;

/// Registry, hooks and configuration shared by every session.
///
/// `Send + Sync`; share it through an `Arc` and open one [`Session`] per
/// connection and unit of work.
pub struct Mapper {
    registry: Arc<Registry>,
    hooks: Arc<dyn LifecycleHooks>,
    permissions: PermissionStore,
    config: MapperConfig,
}

impl Mapper {
    /// Create a mapper with the default configuration and the audit interceptor.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self::with_config(registry, MapperConfig::default())
    }

    /// Create a mapper with a custom configuration.
    pub fn with_config(registry: Arc<Registry>, config: MapperConfig) -> Self {
        let hooks: Arc<dyn LifecycleHooks> = Arc::new(Interceptor::with_config(
            registry.clone(),
            config.interceptor.clone(),
        ));
        Self {
            permissions: PermissionStore::new(registry.clone()),
            registry,
            hooks,
            config,
        }
    }

    /// Replace the lifecycle hooks.
    pub fn with_hooks(mut self, hooks: Arc<dyn LifecycleHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// The entity registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Permission store over the same registry.
    pub fn permissions(&self) -> &PermissionStore {
        &self.permissions
    }

    /// Active configuration.
    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Create permission, audit and entity tables. Idempotent.
    pub fn init_schema(&self, conn: &Connection) -> Result<()> {
        PermissionStore::init_schema(conn)?;
        AuditStore::init_schema(conn)?;
        self.registry.create_tables(conn)?;
        tracing::info!(entities = self.registry.len(), "schema initialized");
        Ok(())
    }

    /// Apply connection-level settings.
    ///
    /// Must run outside a transaction; `PRAGMA foreign_keys` is ignored
    /// inside one.
    pub fn prepare_connection(&self, conn: &Connection) -> Result<()> {
        conn.pragma_update(None, "foreign_keys", self.config.foreign_keys)?;
        if let Some(timeout) = self.config.busy_timeout {
            conn.busy_timeout(timeout)?;
        }
        Ok(())
    }

    /// Begin a unit of work on `conn`.
    pub fn session<'c>(&self, conn: &'c mut Connection) -> Result<Session<'c>> {
        self.prepare_connection(conn)?;
        let tx = conn.transaction()?;
        Ok(Session::new(tx, self.hooks.clone(), self.registry.clone()))
    }

    /// New, unsaved record of a registered entity type.
    pub fn new_record(&self, entity: &str) -> Result<EntityRecord> {
        Ok(EntityRecord::new(self.registry.get(entity)?))
    }

    /// New, unsaved record of a registered model.
    pub fn new_model<M: Model>(&self) -> Result<EntityRecord> {
        Ok(EntityRecord::new(self.registry.descriptor_of::<M>()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{EntityDef, FieldDef, ScalarType};
    use crate::error::Error;
    use crate::lifecycle::NoHooks;

    fn mapper() -> Mapper {
        let registry = Arc::new(Registry::new());
        registry
            .register(
                EntityDef::new("DemoModel")
                    .with_field(FieldDef::optional_scalar("name", ScalarType::Text)),
            )
            .unwrap();
        Mapper::new(registry)
    }

    fn table_exists(conn: &Connection, name: &str) -> bool {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get::<_, i64>(0),
        )
        .unwrap()
            == 1
    }

    #[test]
    fn test_mapper_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Mapper>();
    }

    #[test]
    fn test_init_schema_creates_tables() {
        let mapper = mapper();
        let conn = Connection::open_in_memory().unwrap();
        mapper.init_schema(&conn).unwrap();
        mapper.init_schema(&conn).unwrap();

        for table in ["permission", "audit_operation", "audit_field", "demo_model"] {
            assert!(table_exists(&conn, table), "missing table {}", table);
        }
    }

    #[test]
    fn test_session_enables_foreign_keys() {
        let mapper = mapper();
        let mut conn = Connection::open_in_memory().unwrap();
        mapper.init_schema(&conn).unwrap();

        let session = mapper.session(&mut conn).unwrap();
        let enabled: bool = session
            .connection()
            .unwrap()
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert!(enabled);
    }

    #[test]
    fn test_new_record_unknown_entity() {
        let err = mapper().new_record("Ghost").unwrap_err();
        assert!(matches!(err, Error::UnknownEntity(_)));
    }

    #[test]
    fn test_with_hooks_skips_checks() {
        let mapper = mapper().with_hooks(Arc::new(NoHooks));
        let mut conn = Connection::open_in_memory().unwrap();
        mapper.init_schema(&conn).unwrap();

        let session = mapper.session(&mut conn).unwrap();
        assert!(session.all("DemoModel").unwrap().is_empty());
    }
}
