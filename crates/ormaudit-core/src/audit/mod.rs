//! Audit trail: append-only operation and field-change log.

mod changeset;
mod error;
mod store;
mod trail;

pub use changeset::{ChangeSet, FieldChange};
pub use error::{AuditError, AuditResult};
pub use store::{AuditStore, Operation};
pub use trail::{AuditEntry, AuditField, AuditOperation, AuditTrail, TrailFilter};
