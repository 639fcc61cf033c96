//! Translation of storage-level unique violations into conflict errors.
//!
//! Each resource registers the named unique constraints guarding its columns
//! together with the wire field they protect. A violation of a registered
//! constraint becomes a field-attributed [`Error::Conflict`]; an unknown
//! constraint still becomes a conflict, just without a field.

use crate::db::errors::DbError;
use crate::errors::Error;

#[derive(Debug, Clone, Copy)]
pub struct ConflictTranslator {
    resource: &'static str,
    constraints: &'static [(&'static str, &'static str)],
}

impl ConflictTranslator {
    pub const fn new(resource: &'static str, constraints: &'static [(&'static str, &'static str)]) -> Self {
        Self { resource, constraints }
    }

    pub fn resource(&self) -> &'static str {
        self.resource
    }

    /// The wire field protected by `constraint`, if registered.
    pub fn field_for(&self, constraint: &str) -> Option<&'static str> {
        self.constraints
            .iter()
            .find(|(name, _)| *name == constraint)
            .map(|(_, field)| *field)
    }

    /// Map a storage error to an API error. Unique violations always become
    /// conflicts; everything else is a system error.
    pub fn translate(&self, err: DbError) -> Error {
        match err {
            DbError::UniqueViolation {
                constraint,
                conflicting_value,
                ..
            } => {
                let field = constraint.as_deref().and_then(|c| self.field_for(c));
                let message = match (field, conflicting_value) {
                    (Some(field), Some(value)) => format!("a {} with {field} '{value}' already exists", self.resource),
                    (Some(field), None) => format!("a {} with {field} already exists", self.resource),
                    (None, _) => format!("a {} with conflicting values already exists", self.resource),
                };
                Error::Conflict {
                    field: field.map(str::to_string),
                    message,
                }
            }
            // Everything that is not a unique violation is opaque to callers
            other => Error::Database(DbError::Other(anyhow::Error::new(other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    const USERS: ConflictTranslator = ConflictTranslator::new(
        "user",
        &[("tm_user_username_key", "username"), ("tm_user_email_key", "email")],
    );

    fn unique(constraint: Option<&str>, value: Option<&str>) -> DbError {
        DbError::UniqueViolation {
            constraint: constraint.map(str::to_string),
            table: Some("tm_user".to_string()),
            message: "duplicate key value violates unique constraint".to_string(),
            conflicting_value: value.map(str::to_string),
        }
    }

    #[test]
    fn test_known_constraint_is_field_attributed() {
        match USERS.translate(unique(Some("tm_user_username_key"), Some("buckaroo"))) {
            Error::Conflict { field, message } => {
                assert_eq!(field.as_deref(), Some("username"));
                assert_eq!(message, "a user with username 'buckaroo' already exists");
            }
            other => panic!("expected conflict, got {other:?}"),
        }

        match USERS.translate(unique(Some("tm_user_email_key"), None)) {
            Error::Conflict { field, message } => {
                assert_eq!(field.as_deref(), Some("email"));
                assert_eq!(message, "a user with email already exists");
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_constraint_is_still_a_conflict() {
        let err = USERS.translate(unique(Some("tm_user_token_key"), Some("abc")));
        assert_eq!(err.kind(), ErrorKind::Conflict);
        match err {
            Error::Conflict { field, .. } => assert!(field.is_none()),
            other => panic!("expected conflict, got {other:?}"),
        }

        let err = USERS.translate(unique(None, None));
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_other_errors_are_system_errors() {
        let fk = DbError::ForeignKeyViolation {
            constraint: Some("tm_user_role_fkey".to_string()),
            table: Some("tm_user".to_string()),
            message: "insert or update violates foreign key constraint".to_string(),
        };
        assert_eq!(USERS.translate(fk).kind(), ErrorKind::System);
        assert_eq!(USERS.translate(DbError::NotFound).kind(), ErrorKind::System);
    }
}
