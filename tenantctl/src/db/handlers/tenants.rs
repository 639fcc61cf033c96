//! Database repository for tenants.

use crate::api::models::users::CurrentUser;
use crate::db::errors::Result;
use crate::types::TenantId;
use sqlx::PgConnection;
use tracing::instrument;

pub struct Tenants<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Tenants<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// True iff `resource_tenant` is active and lies in the subtree rooted at
    /// the user's own tenant (inclusive). A user without a tenant sees nothing.
    #[instrument(skip(self, user), fields(user = %user.username), err)]
    pub async fn is_resource_authorized(&mut self, resource_tenant: TenantId, user: &CurrentUser) -> Result<bool> {
        let Some(user_tenant) = user.tenant_id else {
            return Ok(false);
        };

        let authorized = sqlx::query_scalar(
            r#"
            WITH RECURSIVE subtree AS (
                SELECT id, active FROM tenant WHERE id = $1
                UNION ALL
                SELECT t.id, t.active FROM tenant t JOIN subtree s ON t.parent_id = s.id
            )
            SELECT EXISTS (SELECT 1 FROM subtree WHERE id = $2 AND active)
            "#,
        )
        .bind(user_tenant)
        .bind(resource_tenant)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(authorized)
    }
}
