//! Permission and audit interceptor.

use super::hooks::{LifecycleHooks, QueryDescriptor, WriteContext};
use crate::audit::{AuditStore, ChangeSet, FieldChange, Operation};
use crate::catalog::{EntityDef, Registry};
use crate::config::InterceptorConfig;
use crate::error::{Error, Result};
use crate::record::EntityRecord;
use crate::security::{PermissionStore, Verb};
use rusqlite::Connection;
use std::sync::Arc;

/// Enforces read permissions on queries and writes the audit trail for
/// inserts, updates and deletes.
///
/// Holds no per-invocation state; every hook works only on the connection
/// and record it is handed.
pub struct Interceptor {
    permissions: PermissionStore,
    config: InterceptorConfig,
}

impl Interceptor {
    /// Create an interceptor with the default configuration.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self::with_config(registry, InterceptorConfig::default())
    }

    /// Create an interceptor with a custom configuration.
    pub fn with_config(registry: Arc<Registry>, config: InterceptorConfig) -> Self {
        Self {
            permissions: PermissionStore::new(registry),
            config,
        }
    }

    /// Permission store used for checks.
    pub fn permissions(&self) -> &PermissionStore {
        &self.permissions
    }

    /// Active configuration.
    pub fn config(&self) -> &InterceptorConfig {
        &self.config
    }

    /// Fail unless `verb` is allowed on the entity stored as `entity`.
    pub fn check_permission(&self, conn: &Connection, entity: &str, verb: Verb) -> Result<()> {
        self.permissions.check(conn, entity, verb)?;
        Ok(())
    }

    /// Write one operation row and return its id.
    pub fn log_operation(
        &self,
        conn: &Connection,
        entity: &str,
        operation: Operation,
        record_id: i64,
        actor_id: Option<i64>,
    ) -> Result<i64> {
        Ok(AuditStore::record_operation(
            conn, entity, operation, record_id, actor_id,
        )?)
    }

    /// Write one field row under `operation_id`.
    pub fn log_field_change(
        &self,
        conn: &Connection,
        operation_id: i64,
        field: &str,
        old_value: Option<&str>,
        new_value: Option<&str>,
    ) -> Result<()> {
        let change = FieldChange::new(
            field,
            old_value.map(str::to_string),
            new_value.map(str::to_string),
        );
        AuditStore::record_field_change(conn, operation_id, &change)?;
        Ok(())
    }

    fn audit(
        &self,
        ctx: &WriteContext<'_>,
        record: &EntityRecord,
        operation: Operation,
        changes: ChangeSet,
    ) -> Result<()> {
        let entity = record.entity().storage_name();
        if !self.config.is_audited(entity) {
            return Ok(());
        }

        let record_id = record
            .id()
            .ok_or_else(|| Error::NotPersisted(record.entity().type_name.clone()))?;

        let operation_id =
            AuditStore::record_operation(ctx.conn, entity, operation, record_id, ctx.actor)?;
        for change in &changes {
            AuditStore::record_field_change(ctx.conn, operation_id, change)?;
        }

        tracing::debug!(
            entity,
            operation = %operation,
            record_id,
            operation_id,
            fields = changes.len(),
            "write audited"
        );
        Ok(())
    }
}

impl LifecycleHooks for Interceptor {
    fn before_query(&self, conn: &Connection, query: &QueryDescriptor) -> Result<()> {
        if !self.config.enforce_read_permissions {
            return Ok(());
        }
        for entity in query.storage_names() {
            self.check_permission(conn, entity, Verb::Read)?;
        }
        Ok(())
    }

    fn before_write(
        &self,
        conn: &Connection,
        entity: &EntityDef,
        operation: Operation,
    ) -> Result<()> {
        if !self.config.enforce_write_permissions {
            return Ok(());
        }
        self.check_permission(conn, entity.storage_name(), operation.verb())
    }

    fn after_insert(&self, ctx: &WriteContext<'_>, record: &EntityRecord) -> Result<()> {
        self.audit(ctx, record, Operation::Create, ChangeSet::for_create(record))
    }

    fn after_update(&self, ctx: &WriteContext<'_>, record: &EntityRecord) -> Result<()> {
        self.audit(ctx, record, Operation::Update, ChangeSet::for_update(record))
    }

    fn after_delete(&self, ctx: &WriteContext<'_>, record: &EntityRecord) -> Result<()> {
        self.audit(ctx, record, Operation::Delete, ChangeSet::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FieldDef, ScalarType};
    use crate::security::PermissionRecord;
    use std::collections::BTreeMap;

    struct Fixture {
        registry: Arc<Registry>,
        conn: Connection,
        demo: Arc<EntityDef>,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(Registry::new());
        let demo = registry
            .register(
                EntityDef::new("DemoModel")
                    .with_field(FieldDef::optional_scalar("name", ScalarType::Text)),
            )
            .unwrap();
        let conn = Connection::open_in_memory().unwrap();
        PermissionStore::init_schema(&conn).unwrap();
        AuditStore::init_schema(&conn).unwrap();
        Fixture {
            registry,
            conn,
            demo,
        }
    }

    fn count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_before_query_fails_closed() {
        let f = fixture();
        let interceptor = Interceptor::new(f.registry.clone());
        let query = QueryDescriptor::new([f.demo.clone()]);

        let err = interceptor.before_query(&f.conn, &query).unwrap_err();
        assert!(err.is_permission_denied());

        interceptor
            .permissions()
            .grant(&f.conn, &PermissionRecord::new("demo_model").allow(Verb::Read))
            .unwrap();
        interceptor.before_query(&f.conn, &query).unwrap();
    }

    #[test]
    fn test_read_enforcement_can_be_disabled() {
        let f = fixture();
        let interceptor = Interceptor::with_config(
            f.registry.clone(),
            InterceptorConfig::new().without_read_enforcement(),
        );
        let query = QueryDescriptor::new([f.demo.clone()]);
        interceptor.before_query(&f.conn, &query).unwrap();
    }

    #[test]
    fn test_before_write_checks_verb_when_enforced() {
        let f = fixture();
        let lenient = Interceptor::new(f.registry.clone());
        lenient.before_write(&f.conn, &f.demo, Operation::Create).unwrap();

        let strict = Interceptor::with_config(
            f.registry.clone(),
            InterceptorConfig::new().with_write_enforcement(),
        );
        strict
            .permissions()
            .grant(&f.conn, &PermissionRecord::new("demo_model").allow(Verb::Create))
            .unwrap();
        strict.before_write(&f.conn, &f.demo, Operation::Create).unwrap();
        let err = strict
            .before_write(&f.conn, &f.demo, Operation::Delete)
            .unwrap_err();
        assert!(err.is_permission_denied());
    }

    #[test]
    fn test_after_delete_writes_operation_only() {
        let f = fixture();
        let interceptor = Interceptor::new(f.registry.clone());
        let mut values = BTreeMap::new();
        values.insert("name".to_string(), "guido".into());
        let record = EntityRecord::loaded(f.demo.clone(), 5, values);

        interceptor
            .after_delete(&WriteContext::new(&f.conn, None), &record)
            .unwrap();
        assert_eq!(count(&f.conn, "audit_operation"), 1);
        assert_eq!(count(&f.conn, "audit_field"), 0);
    }

    #[test]
    fn test_unsaved_record_is_rejected() {
        let f = fixture();
        let interceptor = Interceptor::new(f.registry.clone());
        let record = EntityRecord::new(f.demo.clone());

        let err = interceptor
            .after_insert(&WriteContext::new(&f.conn, None), &record)
            .unwrap_err();
        assert!(matches!(err, Error::NotPersisted(_)));
    }

    #[test]
    fn test_log_field_change() {
        let f = fixture();
        let interceptor = Interceptor::new(f.registry.clone());
        let op = interceptor
            .log_operation(&f.conn, "demo_model", Operation::Update, 1, Some(2))
            .unwrap();
        interceptor
            .log_field_change(&f.conn, op, "name", Some("guido"), None)
            .unwrap();

        let (old, new): (Option<String>, Option<String>) = f
            .conn
            .query_row(
                "SELECT old_value, new_value FROM audit_field WHERE operation_id = ?1",
                [op],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(old.as_deref(), Some("guido"));
        assert_eq!(new, None);
    }
}
