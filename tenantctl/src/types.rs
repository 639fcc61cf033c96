//! Common type definitions shared across the resource engine.
//!
//! # ID Types
//!
//! Storage assigns integer surrogate keys, wrapped in aliases so signatures say
//! which table they point into:
//!
//! - [`UserId`]: `tm_user.id`
//! - [`TenantId`]: `tenant.id`
//! - [`RoleId`]: `role.id`
//!
//! # Operations
//!
//! [`Operation`] names the four mutations and reads the dispatch layer performs.
//! It shows up in authorization errors and log fields.

use std::fmt;

// Type aliases for IDs
pub type UserId = i32;
pub type TenantId = i32;
pub type RoleId = i32;

/// Operations that can be performed on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Create => write!(f, "create"),
            Operation::Read => write!(f, "read"),
            Operation::Update => write!(f, "update"),
            Operation::Delete => write!(f, "delete"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_display_is_lowercase_verb() {
        assert_eq!(Operation::Create.to_string(), "create");
        assert_eq!(Operation::Delete.to_string(), "delete");
    }
}
