//! Field-level validation of candidate records.
//!
//! A resource describes each of its fields as a [`FieldRules`]: the field's
//! wire name, its (optional) value, and the rules that apply to it. Running
//! the rules with [`validate_fields`] collects every failure: all fields are
//! checked, and every rule of a present value runs even after an earlier one
//! failed. Rules that need storage (uniqueness, foreign-key existence) go
//! through a [`ValidationStore`] so validation never needs a transaction.
//!
//! Validation is advisory under concurrency: a uniqueness check can pass for
//! two writers at once. Storage constraints settle that race later.

pub mod deny_list;

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use sqlx::PgPool;

use crate::db::errors::DbError;
use crate::errors::Result;

pub use deny_list::{DenyListSource, FileDenyList, StaticDenyList};

/// Passwords shorter than this are always rejected.
pub const MIN_PASSWORD_LENGTH: usize = 8;

pub const BLANK: &str = "cannot be blank";
pub const INVALID_EMAIL: &str = "must be a valid email address";
pub const ALREADY_IN_USE: &str = "already in use";
pub const DOES_NOT_EXIST: &str = "does not exist";
pub const PASSWORD_TOO_COMMON: &str = "password is too common";

/// A single rule failure, attributed to a wire field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' {}", self.field, self.message)
    }
}

/// Read-only storage lookups needed by validation rules.
///
/// `table` and `column` are always compile-time constants supplied by a
/// resource, never caller input.
#[async_trait::async_trait]
pub trait ValidationStore: Send + Sync {
    /// Ids of every row (active or not) in `table` whose `column` equals `value`.
    async fn ids_with_value(&self, table: &'static str, column: &'static str, value: &str) -> Result<Vec<i32>>;

    /// Whether a row with `column = id` exists in `table`.
    async fn exists(&self, table: &'static str, column: &'static str, id: i32) -> Result<bool>;
}

#[async_trait::async_trait]
impl ValidationStore for PgPool {
    #[tracing::instrument(skip(self, value), err)]
    async fn ids_with_value(&self, table: &'static str, column: &'static str, value: &str) -> Result<Vec<i32>> {
        let sql = format!("SELECT id FROM {table} WHERE {column} = $1");
        let ids = sqlx::query_scalar::<_, i32>(&sql)
            .bind(value)
            .fetch_all(self)
            .await
            .map_err(DbError::from)?;
        Ok(ids)
    }

    #[tracing::instrument(skip(self), err)]
    async fn exists(&self, table: &'static str, column: &'static str, id: i32) -> Result<bool> {
        let sql = format!("SELECT EXISTS (SELECT 1 FROM {table} WHERE {column} = $1)");
        let found = sqlx::query_scalar::<_, bool>(&sql)
            .bind(id)
            .fetch_one(self)
            .await
            .map_err(DbError::from)?;
        Ok(found)
    }
}

/// A field value as seen by the rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value<'a> {
    Text(&'a str),
    Int(i32),
}

impl Value<'_> {
    fn is_blank(&self) -> bool {
        matches!(self, Value::Text(s) if s.is_empty())
    }

    fn as_text(&self) -> String {
        match self {
            Value::Text(s) => s.to_string(),
            Value::Int(i) => i.to_string(),
        }
    }
}

/// Rules applied to a present value.
#[derive(Debug, Clone)]
pub enum Rule<'a> {
    /// RFC-shaped email address.
    Email,
    /// No other row may hold this value. `own_id` excludes the record being updated.
    UniqueIn {
        table: &'static str,
        column: &'static str,
        own_id: Option<i32>,
    },
    /// The value must reference an existing row.
    ExistsIn { table: &'static str, column: &'static str },
    /// Minimum length, not one of `disallowed` (e.g. the username), not deny-listed.
    GoodPassword {
        disallowed: Vec<&'a str>,
        deny_list: &'a [String],
    },
}

/// Rules for one field.
#[derive(Debug, Clone)]
pub struct FieldRules<'a> {
    field: &'static str,
    value: Option<Value<'a>>,
    required: bool,
    rules: Vec<Rule<'a>>,
}

impl<'a> FieldRules<'a> {
    pub fn text(field: &'static str, value: Option<&'a str>) -> Self {
        Self {
            field,
            value: value.map(Value::Text),
            required: false,
            rules: Vec::new(),
        }
    }

    pub fn int(field: &'static str, value: Option<i32>) -> Self {
        Self {
            field,
            value: value.map(Value::Int),
            required: false,
            rules: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn rule(mut self, rule: Rule<'a>) -> Self {
        self.rules.push(rule);
        self
    }
}

fn email_regex() -> Option<&'static Regex> {
    static EMAIL_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL_REGEX
        .get_or_init(|| {
            Regex::new(r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$")
                .ok()
        })
        .as_ref()
}

pub fn is_email(value: &str) -> bool {
    value.len() <= 254 && email_regex().is_some_and(|re| re.is_match(value))
}

/// A password is good when it is long enough, differs from every `disallowed`
/// value and is not deny-listed.
pub fn is_good_password(candidate: &str, disallowed: &[&str], deny_list: &[String]) -> bool {
    if candidate.chars().count() < MIN_PASSWORD_LENGTH {
        return false;
    }
    if disallowed.contains(&candidate) {
        return false;
    }
    !deny_list.iter().any(|bad| bad == candidate)
}

async fn apply_rule(store: &dyn ValidationStore, value: Value<'_>, rule: &Rule<'_>) -> Result<Option<&'static str>> {
    let failure = match rule {
        Rule::Email => match value {
            Value::Text(s) if is_email(s) => None,
            _ => Some(INVALID_EMAIL),
        },
        Rule::UniqueIn { table, column, own_id } => {
            let ids = store.ids_with_value(*table, *column, &value.as_text()).await?;
            let taken = ids.iter().any(|id| Some(*id) != *own_id);
            taken.then_some(ALREADY_IN_USE)
        }
        Rule::ExistsIn { table, column } => match value {
            Value::Int(id) if store.exists(*table, *column, id).await? => None,
            _ => Some(DOES_NOT_EXIST),
        },
        Rule::GoodPassword { disallowed, deny_list } => {
            (!is_good_password(&value.as_text(), disallowed, deny_list)).then_some(PASSWORD_TOO_COMMON)
        }
    };
    Ok(failure)
}

/// Run every field's rules and collect all failures, in field order.
///
/// Only storage failures abort validation; rule failures never do.
pub async fn validate_fields(store: &dyn ValidationStore, fields: &[FieldRules<'_>]) -> Result<Vec<FieldError>> {
    let mut errors = Vec::new();

    for field in fields {
        let value = match field.value {
            Some(value) if !value.is_blank() => value,
            _ => {
                if field.required {
                    errors.push(FieldError::new(field.field, BLANK));
                }
                continue;
            }
        };

        for rule in &field.rules {
            if let Some(message) = apply_rule(store, value, rule).await? {
                errors.push(FieldError::new(field.field, message));
            }
        }
    }

    Ok(errors)
}
