//! Entity catalog.
//!
//! The catalog holds entity definitions (columns, identity, relations) and
//! the naming convention that maps type names to storage names.

mod entity;
mod field;
mod naming;
mod registry;
mod relation;
mod types;

pub use entity::{EntityDef, Model, IDENTITY_FIELD};
pub use field::FieldDef;
pub use naming::resolve_storage_name;
pub(crate) use naming::quote_identifier;
pub use registry::{Registry, ENGINE_TABLES, RESERVED_STORAGE_NAMES};
pub use relation::RelationDef;
pub use types::{FieldType, ScalarType};
