//! Mapping layer: mapper, sessions and queries.
//!
//! A thin unit-of-work layer over SQLite that calls the lifecycle hooks at
//! the points the interceptor needs.

mod mapper;
mod query;
mod unit;

pub use mapper::Mapper;
pub use query::{Query, QueryRow};
pub use unit::Session;
