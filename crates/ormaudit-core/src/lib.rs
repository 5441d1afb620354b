//! ormaudit core: permissions and audit trail for a relational mapping layer.
//!
//! Queries are checked against per-entity permission records before they
//! run, and every insert, update and delete is recorded field by field in
//! the same transaction as the data it describes.

pub mod audit;
pub mod catalog;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod record;
pub mod security;
pub mod session;
pub mod value;

pub use audit::{
    AuditEntry, AuditError, AuditField, AuditOperation, AuditStore, AuditTrail, ChangeSet,
    FieldChange, Operation, TrailFilter,
};
pub use catalog::{
    resolve_storage_name, EntityDef, FieldDef, FieldType, Model, RelationDef, Registry,
    ScalarType,
};
pub use config::{InterceptorConfig, MapperConfig};
pub use error::{Error, Result};
pub use lifecycle::{Interceptor, LifecycleHooks, NoHooks, QueryDescriptor, WriteContext};
pub use record::EntityRecord;
pub use security::{
    authenticate, Authentication, PermissionRecord, PermissionStore, Principal, Role,
    SecurityError, SecurityResult, User, Verb,
};
pub use session::{Mapper, Query, QueryRow, Session};
pub use value::Value;
