//! Dynamic WHERE / ORDER BY construction from caller-supplied filters.
//!
//! Callers hand over the raw query-string parameters. Only keys present in a
//! resource's fixed whitelist are honored; everything else is ignored. Values
//! are always bound as parameters, never spliced into SQL, and columns with a
//! [`Checker`] are parsed up front so a malformed value is rejected before a
//! query runs.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};

use crate::validation::FieldError;

/// Parameter key that selects the sort column.
pub const ORDER_BY_PARAM: &str = "orderby";

/// Type check applied to a filter value before it is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checker {
    Int,
    Bool,
    Timestamp,
}

/// Where a filter key lands in SQL.
#[derive(Debug, Clone, Copy)]
pub struct WhereColumn {
    pub column: &'static str,
    pub checker: Option<Checker>,
}

impl WhereColumn {
    pub const fn text(column: &'static str) -> Self {
        Self { column, checker: None }
    }

    pub const fn checked(column: &'static str, checker: Checker) -> Self {
        Self {
            column,
            checker: Some(checker),
        }
    }
}

/// A filter value after its checker ran.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Int(i32),
    Bool(bool),
    Timestamp(DateTime<Utc>),
}

/// The typed outcome of [`build_filter`]: equality predicates plus an optional sort column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub predicates: Vec<(&'static str, FilterValue)>,
    pub order_by: Option<&'static str>,
}

impl Filter {
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Append ` AND col = $n` for every predicate. The builder must already
    /// contain a WHERE clause (e.g. `WHERE 1=1`).
    pub fn push_where<'q>(&self, query: &mut QueryBuilder<'q, Postgres>) {
        for (column, value) in &self.predicates {
            query.push(" AND ");
            query.push(*column);
            query.push(" = ");
            match value {
                FilterValue::Text(v) => query.push_bind(v.clone()),
                FilterValue::Int(v) => query.push_bind(*v),
                FilterValue::Bool(v) => query.push_bind(*v),
                FilterValue::Timestamp(v) => query.push_bind(*v),
            };
        }
    }

    pub fn push_order_by<'q>(&self, query: &mut QueryBuilder<'q, Postgres>) {
        if let Some(column) = self.order_by {
            query.push(" ORDER BY ");
            query.push(column);
        }
    }
}

fn check(key: &str, raw: &str, checker: Option<Checker>) -> Result<FilterValue, FieldError> {
    match checker {
        None => Ok(FilterValue::Text(raw.to_string())),
        Some(Checker::Int) => raw
            .parse::<i32>()
            .map(FilterValue::Int)
            .map_err(|_| FieldError::new(key, "must be an integer")),
        Some(Checker::Bool) => raw
            .parse::<bool>()
            .map(FilterValue::Bool)
            .map_err(|_| FieldError::new(key, "must be a boolean")),
        Some(Checker::Timestamp) => DateTime::parse_from_rfc3339(raw)
            .map(|ts| FilterValue::Timestamp(ts.with_timezone(&Utc)))
            .map_err(|_| FieldError::new(key, "must be an RFC 3339 timestamp")),
    }
}

/// Translate caller parameters into a [`Filter`] against `columns`.
///
/// Predicates follow the whitelist order so generated SQL is stable. All
/// malformed values are reported together.
pub fn build_filter(
    params: &HashMap<String, String>,
    columns: &[(&'static str, WhereColumn)],
) -> Result<Filter, Vec<FieldError>> {
    let mut filter = Filter::default();
    let mut errors = Vec::new();

    for (key, info) in columns {
        let Some(raw) = params.get(*key) else { continue };
        match check(key, raw, info.checker) {
            Ok(value) => filter.predicates.push((info.column, value)),
            Err(e) => errors.push(e),
        }
    }

    if let Some(sort_key) = params.get(ORDER_BY_PARAM) {
        filter.order_by = columns
            .iter()
            .find(|(key, _)| *key == sort_key.as_str())
            .map(|(_, info)| info.column);
    }

    if errors.is_empty() { Ok(filter) } else { Err(errors) }
}
