//! Transactional execution of a single data-modifying statement.
//!
//! [`execute`] wraps one [`Statement`] in its own transaction: begin, run,
//! check that exactly one row was touched, commit. Any failure rolls the
//! transaction back before the error is returned; if the future is dropped
//! mid-flight the `sqlx::Transaction` guard rolls back instead.

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::{debug, error, instrument};

use crate::db::conflict::ConflictTranslator;
use crate::db::errors::DbError;
use crate::errors::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Create,
    Update,
    Delete,
}

/// What a statement reports back: the rows it returned, or just how many it touched.
#[derive(Debug)]
pub enum StatementOutcome<T> {
    Returned(Vec<T>),
    Affected(u64),
}

impl<T> StatementOutcome<T> {
    fn row_count(&self) -> u64 {
        match self {
            StatementOutcome::Returned(rows) => rows.len() as u64,
            StatementOutcome::Affected(n) => *n,
        }
    }

    fn into_row(self) -> Option<T> {
        match self {
            StatementOutcome::Returned(mut rows) => rows.pop(),
            StatementOutcome::Affected(_) => None,
        }
    }
}

/// One data-modifying SQL statement.
#[async_trait]
pub trait Statement: Send + Sync {
    type Output: Send;

    fn kind(&self) -> StatementKind;

    async fn execute(&self, conn: &mut PgConnection) -> std::result::Result<StatementOutcome<Self::Output>, sqlx::Error>;
}

async fn rollback(tx: Transaction<'_, Postgres>) {
    if let Err(e) = tx.rollback().await {
        error!(error = %e, "Failed to roll back transaction");
    }
}

fn row_count_error(resource: &str, kind: StatementKind, count: u64) -> Error {
    match (kind, count) {
        (StatementKind::Create, 0) => Error::Other(anyhow::anyhow!("no {resource} was inserted")),
        (StatementKind::Update | StatementKind::Delete, 0) => Error::NotFound {
            message: format!("no {resource} found with this id"),
        },
        (_, n) => Error::Other(anyhow::anyhow!("expected one {resource} row to change, {n} did")),
    }
}

/// Run `statement` in its own transaction and require that it touches exactly one row.
///
/// Returns the single returned row, or `None` for statements that only report
/// an affected count. Unique violations become conflicts through `translator`;
/// every other storage failure is a system error.
#[instrument(skip(pool, translator, statement), fields(resource = translator.resource(), kind = ?statement.kind()), err)]
pub async fn execute<S: Statement>(pool: &PgPool, translator: &ConflictTranslator, statement: &S) -> Result<Option<S::Output>> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| Error::Other(anyhow::Error::new(e).context("begin transaction")))?;

    let outcome = match statement.execute(&mut *tx).await {
        Ok(outcome) => outcome,
        Err(e) => {
            rollback(tx).await;
            return Err(translator.translate(DbError::from(e)));
        }
    };

    let count = outcome.row_count();
    if count != 1 {
        rollback(tx).await;
        return Err(row_count_error(translator.resource(), statement.kind(), count));
    }

    tx.commit()
        .await
        .map_err(|e| Error::Other(anyhow::Error::new(e).context("commit transaction")))?;
    debug!("Mutation committed");

    Ok(outcome.into_row())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use sqlx::PgPool;

    const TENANTS: ConflictTranslator = ConflictTranslator::new("tenant", &[("tenant_name_key", "name")]);

    struct InsertTenant(&'static str);

    #[async_trait]
    impl Statement for InsertTenant {
        type Output = i32;

        fn kind(&self) -> StatementKind {
            StatementKind::Create
        }

        async fn execute(&self, conn: &mut PgConnection) -> std::result::Result<StatementOutcome<i32>, sqlx::Error> {
            let ids = sqlx::query_scalar("INSERT INTO tenant (name, active, parent_id) VALUES ($1, true, 1) RETURNING id")
                .bind(self.0)
                .fetch_all(conn)
                .await?;
            Ok(StatementOutcome::Returned(ids))
        }
    }

    struct RenameTenant {
        id: i32,
        name: &'static str,
    }

    #[async_trait]
    impl Statement for RenameTenant {
        type Output = ();

        fn kind(&self) -> StatementKind {
            StatementKind::Update
        }

        async fn execute(&self, conn: &mut PgConnection) -> std::result::Result<StatementOutcome<()>, sqlx::Error> {
            let result = sqlx::query("UPDATE tenant SET name = $1 WHERE id = $2")
                .bind(self.name)
                .bind(self.id)
                .execute(conn)
                .await?;
            Ok(StatementOutcome::Affected(result.rows_affected()))
        }
    }

    /// Touches every tenant, which is never what a single-record mutation should do.
    struct DeactivateAllTenants;

    #[async_trait]
    impl Statement for DeactivateAllTenants {
        type Output = ();

        fn kind(&self) -> StatementKind {
            StatementKind::Delete
        }

        async fn execute(&self, conn: &mut PgConnection) -> std::result::Result<StatementOutcome<()>, sqlx::Error> {
            let result = sqlx::query("UPDATE tenant SET active = false").execute(conn).await?;
            Ok(StatementOutcome::Affected(result.rows_affected()))
        }
    }

    async fn tenant_count(pool: &PgPool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM tenant").fetch_one(pool).await.unwrap()
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_returns_generated_id(pool: PgPool) {
        let id = execute(&pool, &TENANTS, &InsertTenant("yoyodyne")).await.unwrap();
        assert!(id.is_some_and(|id| id > 1));
        assert_eq!(tenant_count(&pool).await, 2);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_unique_violation_is_conflict_and_rolled_back(pool: PgPool) {
        execute(&pool, &TENANTS, &InsertTenant("yoyodyne")).await.unwrap();

        let err = execute(&pool, &TENANTS, &InsertTenant("yoyodyne")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        match err {
            Error::Conflict { field, message } => {
                assert_eq!(field.as_deref(), Some("name"));
                assert_eq!(message, "a tenant with name 'yoyodyne' already exists");
            }
            other => panic!("expected conflict, got {other:?}"),
        }
        assert_eq!(tenant_count(&pool).await, 2);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_of_unknown_id_is_missing(pool: PgPool) {
        let err = execute(&pool, &TENANTS, &RenameTenant { id: 9999, name: "nowhere" })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Missing);
        assert_eq!(err.user_message(), "no tenant found with this id");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_affected_count_statement_commits(pool: PgPool) {
        let row = execute(&pool, &TENANTS, &RenameTenant { id: 1, name: "origin" }).await.unwrap();
        assert!(row.is_none());

        let name: String = sqlx::query_scalar("SELECT name FROM tenant WHERE id = 1")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(name, "origin");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_multi_row_change_is_rolled_back(pool: PgPool) {
        execute(&pool, &TENANTS, &InsertTenant("yoyodyne")).await.unwrap();

        let err = execute(&pool, &TENANTS, &DeactivateAllTenants).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::System);

        let active: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tenant WHERE active")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(active, 2);
    }

    #[test]
    fn test_zero_rows_on_create_is_system() {
        let err = row_count_error("user", StatementKind::Create, 0);
        assert_eq!(err.kind(), ErrorKind::System);
        assert_eq!(err.to_string(), "no user was inserted");

        let err = row_count_error("user", StatementKind::Delete, 0);
        assert_eq!(err.kind(), ErrorKind::Missing);
        assert_eq!(err.to_string(), "no user found with this id");
    }
}
