//! Repository implementations for database access.
//!
//! Each repository wraps a `&mut PgConnection` (a pooled connection or an open
//! transaction) and exposes strongly-typed queries for one table.
//!
//! - [`Users`]: user lookups, plus the user's resource contract implementation
//! - [`Tenants`]: the tenant-hierarchy authorization check

pub mod tenants;
pub mod users;

pub use tenants::Tenants;
pub use users::Users;
