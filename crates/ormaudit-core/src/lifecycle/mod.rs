//! Lifecycle interception.
//!
//! A `Session` calls [`LifecycleHooks`] before queries and around writes.
//! [`Interceptor`] is the implementation that checks permissions and writes
//! the audit trail on the session's transaction.

mod hooks;
mod interceptor;

pub use hooks::{LifecycleHooks, NoHooks, QueryDescriptor, WriteContext};
pub use interceptor::Interceptor;
