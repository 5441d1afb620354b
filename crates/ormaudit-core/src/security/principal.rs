//! Built-in principals: users, roles and password authentication.

use super::error::{SecurityError, SecurityResult};
use crate::catalog::{FieldDef, FieldType, Model, RelationDef, Registry, ScalarType};
use crate::error::Result;
use crate::record::EntityRecord;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

/// Association table linking users and roles.
pub const USER_ROLE_TABLE: &str = "user_role_rel";

const PASSWORD_CONTEXT: &str = "ormaudit 2026-01 user password v1";

/// Application user.
pub struct User;

impl Model for User {
    const TYPE_NAME: &'static str = "User";

    fn fields() -> Vec<FieldDef> {
        vec![
            FieldDef::optional_scalar("name", ScalarType::Text),
            FieldDef::new("username", FieldType::scalar(ScalarType::Text)),
            FieldDef::new("password", FieldType::scalar(ScalarType::Text)),
            FieldDef::new("active", FieldType::scalar(ScalarType::Bool)).with_default(true),
        ]
    }

    fn relations() -> Vec<RelationDef> {
        vec![RelationDef::many_to_many(
            "roles",
            Role::TYPE_NAME,
            USER_ROLE_TABLE,
            "user_id",
            "role_id",
        )]
    }
}

/// Named group of users.
pub struct Role;

impl Model for Role {
    const TYPE_NAME: &'static str = "Role";

    fn fields() -> Vec<FieldDef> {
        vec![FieldDef::new("name", FieldType::scalar(ScalarType::Text))]
    }

    fn relations() -> Vec<RelationDef> {
        vec![RelationDef::many_to_many(
            "users",
            User::TYPE_NAME,
            USER_ROLE_TABLE,
            "role_id",
            "user_id",
        )]
    }
}

/// Register the principal entities.
pub fn register_principals(registry: &Registry) -> Result<()> {
    registry.register_model::<User>()?;
    registry.register_model::<Role>()?;
    Ok(())
}

fn password_digest(username: &str, password: &str) -> [u8; 32] {
    let mut material = Vec::with_capacity(username.len() + password.len() + 1);
    material.extend_from_slice(username.as_bytes());
    material.push(0);
    material.extend_from_slice(password.as_bytes());
    blake3::derive_key(PASSWORD_CONTEXT, &material)
}

/// Digest stored in `user.password`.
///
/// The username is mixed in so equal passwords produce different digests.
pub fn hash_password(username: &str, password: &str) -> String {
    hex::encode(password_digest(username, password))
}

fn verify_password(username: &str, password: &str, stored: &str) -> bool {
    let computed = blake3::Hash::from(password_digest(username, password));
    match blake3::Hash::from_hex(stored) {
        // blake3::Hash equality is constant time.
        Ok(stored) => computed == stored,
        Err(_) => false,
    }
}

/// New, unsaved user record with a hashed password.
pub fn new_user(registry: &Registry, username: &str, password: &str) -> Result<EntityRecord> {
    let entity = registry.descriptor_of::<User>()?;
    EntityRecord::new(entity)
        .with("username", username)?
        .with("password", hash_password(username, password))
}

/// New, unsaved role record.
pub fn new_role(registry: &Registry, name: &str) -> Result<EntityRecord> {
    let entity = registry.descriptor_of::<Role>()?;
    EntityRecord::new(entity).with("name", name)
}

/// An authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    /// User id, recorded as `actor_id` in the audit trail.
    pub id: i64,
    /// Display name.
    pub name: Option<String>,
    /// Login name.
    pub username: String,
}

/// Outcome of a login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authentication {
    /// No user with that username.
    UnknownUser,
    /// Password did not match.
    BadCredentials,
    /// User exists but is deactivated.
    Inactive,
    /// Credentials accepted.
    Authenticated(Principal),
}

impl Authentication {
    /// Check if the attempt succeeded.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Authentication::Authenticated(_))
    }

    /// The principal, or `AuthenticationFailed`.
    pub fn into_principal(self) -> SecurityResult<Principal> {
        match self {
            Authentication::Authenticated(principal) => Ok(principal),
            Authentication::UnknownUser => {
                Err(SecurityError::AuthenticationFailed("unknown user".into()))
            }
            Authentication::BadCredentials => {
                Err(SecurityError::AuthenticationFailed("bad credentials".into()))
            }
            Authentication::Inactive => {
                Err(SecurityError::AuthenticationFailed("user is inactive".into()))
            }
        }
    }
}

/// Check a username and password against the `user` table.
pub fn authenticate(
    conn: &Connection,
    username: &str,
    password: &str,
) -> SecurityResult<Authentication> {
    let row: Option<(i64, Option<String>, String, bool)> = conn
        .query_row(
            "SELECT id, name, password, active FROM \"user\" \
             WHERE username = ?1 ORDER BY id LIMIT 1",
            params![username],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .optional()?;

    let Some((id, name, stored, active)) = row else {
        tracing::warn!(username, "login failed: unknown user");
        return Ok(Authentication::UnknownUser);
    };

    if !verify_password(username, password, &stored) {
        tracing::warn!(username, user_id = id, "login failed: bad credentials");
        return Ok(Authentication::BadCredentials);
    }
    if !active {
        tracing::warn!(username, user_id = id, "login failed: inactive user");
        return Ok(Authentication::Inactive);
    }

    tracing::info!(username, user_id = id, "login succeeded");
    Ok(Authentication::Authenticated(Principal {
        id,
        name,
        username: username.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_conn() -> (Registry, Connection) {
        let registry = Registry::new();
        register_principals(&registry).unwrap();
        let conn = Connection::open_in_memory().unwrap();
        registry.create_tables(&conn).unwrap();
        (registry, conn)
    }

    fn insert_user(conn: &Connection, username: &str, password: &str, active: bool) -> i64 {
        conn.execute(
            "INSERT INTO \"user\" (username, password, active) VALUES (?1, ?2, ?3)",
            params![username, hash_password(username, password), active],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    #[test]
    fn test_principal_storage_names() {
        let (registry, _conn) = test_conn();
        assert!(registry.contains_storage_name("user"));
        assert!(registry.contains_storage_name("role"));
        let user = registry.descriptor_of::<User>().unwrap();
        assert_eq!(user.get_relation("roles").unwrap().association_table, USER_ROLE_TABLE);
    }

    #[test]
    fn test_hash_password() {
        let digest = hash_password("guido", "spam");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, hash_password("guido", "spam"));
        assert_ne!(digest, hash_password("tim", "spam"));
        assert!(verify_password("guido", "spam", &digest));
        assert!(!verify_password("guido", "eggs", &digest));
        assert!(!verify_password("guido", "spam", "not hex"));
    }

    #[test]
    fn test_authenticate_outcomes() {
        let (_registry, conn) = test_conn();
        let id = insert_user(&conn, "guido", "spam", true);
        insert_user(&conn, "tim", "eggs", false);

        assert_eq!(authenticate(&conn, "nobody", "x").unwrap(), Authentication::UnknownUser);
        assert_eq!(authenticate(&conn, "guido", "eggs").unwrap(), Authentication::BadCredentials);
        assert_eq!(authenticate(&conn, "tim", "eggs").unwrap(), Authentication::Inactive);

        let principal = authenticate(&conn, "guido", "spam").unwrap().into_principal().unwrap();
        assert_eq!(principal.id, id);
        assert_eq!(principal.username, "guido");
    }

    #[test]
    fn test_into_principal_failure() {
        let err = Authentication::BadCredentials.into_principal().unwrap_err();
        assert!(matches!(err, SecurityError::AuthenticationFailed(_)));
    }

    #[test]
    fn test_new_user_hashes_password() {
        let (registry, _conn) = test_conn();
        let user = new_user(&registry, "guido", "spam").unwrap();
        assert_eq!(user.get_str("username"), Some("guido"));
        assert_eq!(user.get_str("password"), Some(hash_password("guido", "spam").as_str()));

        let role = new_role(&registry, "admin").unwrap();
        assert_eq!(role.get_str("name"), Some("admin"));
    }
}
