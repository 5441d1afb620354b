//! Per-entity permission table.
//!
//! One row per protected entity, one boolean per verb. Lookup is by exact
//! storage name and fails closed: an entity without a row allows nothing.

use super::error::{SecurityError, SecurityResult};
use crate::catalog::Registry;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS permission (
    entity      TEXT PRIMARY KEY,
    read_perm   INTEGER NOT NULL DEFAULT 0,
    create_perm INTEGER NOT NULL DEFAULT 0,
    update_perm INTEGER NOT NULL DEFAULT 0,
    delete_perm INTEGER NOT NULL DEFAULT 0
);
";

/// The four permission and audit axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    /// Read (query) access.
    Read,
    /// Insert access.
    Create,
    /// Update access.
    Update,
    /// Delete access.
    Delete,
}

impl Verb {
    /// All verbs.
    pub const ALL: [Verb; 4] = [Verb::Read, Verb::Create, Verb::Update, Verb::Delete];

    /// Lower-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Read => "read",
            Verb::Create => "create",
            Verb::Update => "update",
            Verb::Delete => "delete",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = SecurityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Verb::Read),
            "create" => Ok(Verb::Create),
            "update" => Ok(Verb::Update),
            "delete" => Ok(Verb::Delete),
            other => Err(SecurityError::InvalidVerb(other.to_string())),
        }
    }
}

/// Permission flags for one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRecord {
    /// Storage name of the protected entity.
    pub entity: String,
    /// Read allowed.
    #[serde(default)]
    pub read: bool,
    /// Create allowed.
    #[serde(default)]
    pub create: bool,
    /// Update allowed.
    #[serde(default)]
    pub update: bool,
    /// Delete allowed.
    #[serde(default)]
    pub delete: bool,
}

impl PermissionRecord {
    /// A record that allows nothing.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            read: false,
            create: false,
            update: false,
            delete: false,
        }
    }

    /// A record that allows every verb.
    pub fn allow_all(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            read: true,
            create: true,
            update: true,
            delete: true,
        }
    }

    /// Allow a verb.
    pub fn allow(mut self, verb: Verb) -> Self {
        self.set(verb, true);
        self
    }

    /// Set the flag for a verb.
    pub fn set(&mut self, verb: Verb, allowed: bool) {
        match verb {
            Verb::Read => self.read = allowed,
            Verb::Create => self.create = allowed,
            Verb::Update => self.update = allowed,
            Verb::Delete => self.delete = allowed,
        }
    }

    /// Check the flag for a verb.
    pub fn allows(&self, verb: Verb) -> bool {
        match verb {
            Verb::Read => self.read,
            Verb::Create => self.create,
            Verb::Update => self.update,
            Verb::Delete => self.delete,
        }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            entity: row.get(0)?,
            read: row.get(1)?,
            create: row.get(2)?,
            update: row.get(3)?,
            delete: row.get(4)?,
        })
    }
}

/// Permission store backed by the `permission` table.
///
/// Every operation runs on the connection handed in by the caller, so checks
/// and grants take part in the caller's transaction.
pub struct PermissionStore {
    registry: Arc<Registry>,
}

impl PermissionStore {
    /// Create a store that validates grant targets against `registry`.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Create the `permission` table if it does not exist.
    pub fn init_schema(conn: &Connection) -> SecurityResult<()> {
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Check whether `verb` is allowed on the entity stored as `entity`.
    pub fn check(&self, conn: &Connection, entity: &str, verb: Verb) -> SecurityResult<()> {
        let allowed = self
            .get(conn, entity)?
            .map(|record| record.allows(verb))
            .unwrap_or(false);

        if allowed {
            tracing::debug!(entity, verb = %verb, "permission granted");
            Ok(())
        } else {
            tracing::warn!(entity, verb = %verb, "permission denied");
            Err(SecurityError::PermissionDenied {
                entity: entity.to_string(),
                verb,
            })
        }
    }

    /// Get the permission record for an entity.
    pub fn get(&self, conn: &Connection, entity: &str) -> SecurityResult<Option<PermissionRecord>> {
        let record = conn
            .query_row(
                "SELECT entity, read_perm, create_perm, update_perm, delete_perm \
                 FROM permission WHERE entity = ?1",
                params![entity],
                PermissionRecord::from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// List all permission records, ordered by entity.
    pub fn list(&self, conn: &Connection) -> SecurityResult<Vec<PermissionRecord>> {
        let mut stmt = conn.prepare(
            "SELECT entity, read_perm, create_perm, update_perm, delete_perm \
             FROM permission ORDER BY entity",
        )?;
        let records = stmt
            .query_map([], PermissionRecord::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Insert or replace the permission record for an entity.
    ///
    /// The target must be the storage name of a registered entity.
    pub fn grant(&self, conn: &Connection, record: &PermissionRecord) -> SecurityResult<()> {
        if !self.registry.contains_storage_name(&record.entity) {
            return Err(SecurityError::UnknownEntity(record.entity.clone()));
        }

        conn.execute(
            "INSERT INTO permission (entity, read_perm, create_perm, update_perm, delete_perm) \
             VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT(entity) DO UPDATE SET \
                read_perm = excluded.read_perm, \
                create_perm = excluded.create_perm, \
                update_perm = excluded.update_perm, \
                delete_perm = excluded.delete_perm",
            params![
                record.entity,
                record.read,
                record.create,
                record.update,
                record.delete
            ],
        )?;

        tracing::info!(
            entity = %record.entity,
            read = record.read,
            create = record.create,
            update = record.update,
            delete = record.delete,
            "permission granted"
        );
        Ok(())
    }

    /// Remove the permission record for an entity.
    ///
    /// Returns whether a record existed.
    pub fn revoke(&self, conn: &Connection, entity: &str) -> SecurityResult<bool> {
        let removed = conn.execute("DELETE FROM permission WHERE entity = ?1", params![entity])?;
        if removed > 0 {
            tracing::info!(entity, "permission revoked");
        }
        Ok(removed > 0)
    }

    /// Grant every record of a JSON array of permission records.
    ///
    /// Returns the number of records applied. Nothing is applied if any
    /// record names an unregistered entity.
    pub fn import_json(&self, conn: &Connection, json: &str) -> SecurityResult<usize> {
        let records = parse_permission_set(json)?;

        if let Some(unknown) = records
            .iter()
            .find(|r| !self.registry.contains_storage_name(&r.entity))
        {
            return Err(SecurityError::UnknownEntity(unknown.entity.clone()));
        }

        for record in &records {
            self.grant(conn, record)?;
        }
        Ok(records.len())
    }
}

/// Parse a JSON array of permission records.
pub fn parse_permission_set(json: &str) -> SecurityResult<Vec<PermissionRecord>> {
    serde_json::from_str(json).map_err(|e| SecurityError::InvalidPermissionSet(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{EntityDef, FieldDef, ScalarType};

    fn test_store() -> (PermissionStore, Connection) {
        let registry = Arc::new(Registry::new());
        registry
            .register(
                EntityDef::new("DemoModel")
                    .with_field(FieldDef::optional_scalar("name", ScalarType::Text)),
            )
            .unwrap();
        registry.register(EntityDef::new("Role")).unwrap();

        let conn = Connection::open_in_memory().unwrap();
        PermissionStore::init_schema(&conn).unwrap();
        (PermissionStore::new(registry), conn)
    }

    #[test]
    fn test_missing_record_fails_closed() {
        let (store, conn) = test_store();

        for verb in Verb::ALL {
            let err = store.check(&conn, "demo_model", verb).unwrap_err();
            assert!(matches!(
                err,
                SecurityError::PermissionDenied { ref entity, verb: v }
                    if entity == "demo_model" && v == verb
            ));
        }
    }

    #[test]
    fn test_read_allowed_create_denied() {
        let (store, conn) = test_store();
        store
            .grant(&conn, &PermissionRecord::new("demo_model").allow(Verb::Read))
            .unwrap();

        assert!(store.check(&conn, "demo_model", Verb::Read).is_ok());
        assert!(store.check(&conn, "demo_model", Verb::Create).is_err());
    }

    #[test]
    fn test_lookup_is_exact_match() {
        let (store, conn) = test_store();
        store
            .grant(&conn, &PermissionRecord::allow_all("demo_model"))
            .unwrap();

        assert!(store.check(&conn, "DemoModel", Verb::Read).is_err());
        assert!(store.check(&conn, "demo_model ", Verb::Read).is_err());
    }

    #[test]
    fn test_grant_rejects_unregistered_entity() {
        let (store, conn) = test_store();
        let err = store
            .grant(&conn, &PermissionRecord::allow_all("ghost"))
            .unwrap_err();
        assert!(matches!(err, SecurityError::UnknownEntity(name) if name == "ghost"));
        assert!(store.list(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_grant_replaces_existing() {
        let (store, conn) = test_store();
        store
            .grant(&conn, &PermissionRecord::allow_all("role"))
            .unwrap();
        store
            .grant(&conn, &PermissionRecord::new("role").allow(Verb::Read))
            .unwrap();

        let record = store.get(&conn, "role").unwrap().unwrap();
        assert!(record.read);
        assert!(!record.create);
        assert!(!record.update);
        assert!(!record.delete);
        assert_eq!(store.list(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_revoke() {
        let (store, conn) = test_store();
        store
            .grant(&conn, &PermissionRecord::allow_all("role"))
            .unwrap();

        assert!(store.revoke(&conn, "role").unwrap());
        assert!(!store.revoke(&conn, "role").unwrap());
        assert!(store.check(&conn, "role", Verb::Read).is_err());
    }

    #[test]
    fn test_import_json() {
        let (store, conn) = test_store();
        let json = r#"[
            {"entity": "demo_model", "read": true, "create": true},
            {"entity": "role", "read": true}
        ]"#;

        assert_eq!(store.import_json(&conn, json).unwrap(), 2);

        let demo = store.get(&conn, "demo_model").unwrap().unwrap();
        assert!(demo.read && demo.create && !demo.update && !demo.delete);
        assert!(store.check(&conn, "role", Verb::Delete).is_err());
    }

    #[test]
    fn test_import_json_all_or_nothing() {
        let (store, conn) = test_store();
        let json = r#"[
            {"entity": "demo_model", "read": true},
            {"entity": "ghost", "read": true}
        ]"#;

        assert!(matches!(
            store.import_json(&conn, json),
            Err(SecurityError::UnknownEntity(_))
        ));
        assert!(store.list(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_import_json_malformed() {
        let (store, conn) = test_store();
        assert!(matches!(
            store.import_json(&conn, "{not json"),
            Err(SecurityError::InvalidPermissionSet(_))
        ));
    }

    #[test]
    fn test_verb_parse() {
        assert_eq!("read".parse::<Verb>().unwrap(), Verb::Read);
        assert_eq!("delete".parse::<Verb>().unwrap(), Verb::Delete);
        assert!("write".parse::<Verb>().is_err());
        assert_eq!(Verb::Update.to_string(), "update");
    }
}
