//! Access control.
//!
//! Per-entity permission records and the built-in user and role principals.
//! Permission checks match storage names exactly and fail closed.

pub mod error;
pub mod permission;
pub mod principal;

pub use error::{SecurityError, SecurityResult};
pub use permission::{parse_permission_set, PermissionRecord, PermissionStore, Verb};
pub use principal::{
    authenticate, hash_password, new_role, new_user, register_principals, Authentication,
    Principal, Role, User, USER_ROLE_TABLE,
};
