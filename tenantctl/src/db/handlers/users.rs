//! Database repository for users, and the user's implementation of the resource contract.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::postgres::PgArguments;
use sqlx::query::QueryAs;
use sqlx::{PgConnection, Postgres, QueryBuilder};
use tracing::{info, instrument};

use crate::api::models::users::{CurrentUser, User};
use crate::db::conflict::ConflictTranslator;
use crate::db::errors::{DbError, Result};
use crate::db::models::users::{UserDBResponse, UserWriteDBRequest};
use crate::db::mutation::{self, Statement, StatementKind, StatementOutcome};
use crate::db::query::{Checker, Filter, WhereColumn, build_filter};
use crate::errors::Error;
use crate::resource::{Creator, Deleter, Identifiable, Reader, ResourceContext, TenantScoped, Updater, Validatable};
use crate::types::{TenantId, UserId};
use crate::validation::{FieldError, FieldRules, Rule, ValidationStore, validate_fields};

/// Filter keys callers may use when reading users.
pub const USER_COLUMNS: &[(&str, WhereColumn)] = &[
    ("active", WhereColumn::checked("u.active", Checker::Bool)),
    ("company", WhereColumn::text("u.company")),
    ("email", WhereColumn::text("u.email")),
    ("fullName", WhereColumn::text("u.full_name")),
    ("gid", WhereColumn::checked("u.gid", Checker::Int)),
    ("id", WhereColumn::checked("u.id", Checker::Int)),
    ("lastUpdated", WhereColumn::checked("u.last_updated", Checker::Timestamp)),
    ("newUser", WhereColumn::checked("u.new_user", Checker::Bool)),
    ("publicSSHKey", WhereColumn::text("u.public_ssh_key")),
    ("role", WhereColumn::checked("u.role", Checker::Int)),
    ("rolename", WhereColumn::text("r.name")),
    ("uid", WhereColumn::checked("u.uid", Checker::Int)),
    ("username", WhereColumn::text("u.username")),
];

pub const USER_CONFLICTS: ConflictTranslator = ConflictTranslator::new(
    "user",
    &[("tm_user_username_key", "username"), ("tm_user_email_key", "email")],
);

const USER_FIELDS: &str = "
    u.id, u.username, u.email, u.active, u.address_line1, u.address_line2, u.city,
    u.company, u.country, u.full_name, u.gid, u.local_passwd, u.new_user,
    u.phone_number, u.postal_code, u.public_ssh_key, u.registration_sent, u.role,
    r.name AS rolename, u.state_or_province, u.tenant_id, u.token, u.uid, u.last_updated";

fn select_users() -> String {
    format!("SELECT {USER_FIELDS} FROM tm_user u JOIN role r ON u.role = r.id")
}

/// Wrap an INSERT or UPDATE so it yields the written row exactly as a read would.
fn returning_user(write: &str) -> String {
    format!("WITH u AS ({write} RETURNING *) SELECT {USER_FIELDS} FROM u JOIN role r ON u.role = r.id")
}

pub struct Users<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Users<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_id(&mut self, id: UserId) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, UserDBResponse>(&format!("{} WHERE u.id = $1", select_users()))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(user)
    }

    /// Users matching `filter` whose tenant is active and inside the subtree of `tenant_id`.
    #[instrument(skip(self, filter), err)]
    pub async fn list_visible(&mut self, filter: &Filter, tenant_id: TenantId) -> Result<Vec<UserDBResponse>> {
        let mut query = QueryBuilder::<Postgres>::new(
            "WITH RECURSIVE visible AS (
    SELECT id, active FROM tenant WHERE id = ",
        );
        query.push_bind(tenant_id);
        query.push(
            "
    UNION ALL
    SELECT t.id, t.active FROM tenant t JOIN visible v ON t.parent_id = v.id
) ",
        );
        query.push(select_users());
        query.push(" WHERE u.tenant_id IN (SELECT id FROM visible WHERE active)");
        filter.push_where(&mut query);
        filter.push_order_by(&mut query);

        let users = query.build_query_as::<UserDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(users)
    }

    /// The active user with this username, as a caller identity.
    #[instrument(skip(self), err)]
    pub async fn find_current_user(&mut self, username: &str) -> Result<Option<CurrentUser>> {
        let row: Option<(UserId, String, Option<TenantId>, i32)> =
            sqlx::query_as("SELECT id, username, tenant_id, role FROM tm_user WHERE username = $1 AND active")
                .bind(username)
                .fetch_optional(&mut *self.db)
                .await?;

        Ok(row.map(|(id, username, tenant_id, role)| CurrentUser {
            id,
            username,
            tenant_id,
            role,
        }))
    }
}

type WriteQuery<'q> = QueryAs<'q, Postgres, UserDBResponse, PgArguments>;

/// Bind every settable column in insert/update order ($1..$21).
fn bind_columns<'q>(query: WriteQuery<'q>, r: &'q UserWriteDBRequest) -> WriteQuery<'q> {
    query
        .bind(r.active)
        .bind(&r.address_line1)
        .bind(&r.address_line2)
        .bind(&r.city)
        .bind(&r.company)
        .bind(&r.country)
        .bind(&r.email)
        .bind(&r.full_name)
        .bind(r.gid)
        .bind(&r.local_passwd)
        .bind(r.new_user)
        .bind(&r.phone_number)
        .bind(&r.postal_code)
        .bind(&r.public_ssh_key)
        .bind(r.registration_sent)
        .bind(r.role)
        .bind(&r.state_or_province)
        .bind(r.tenant_id)
        .bind(&r.token)
        .bind(r.uid)
        .bind(&r.username)
}

struct InsertUser {
    request: UserWriteDBRequest,
}

#[async_trait]
impl Statement for InsertUser {
    type Output = UserDBResponse;

    fn kind(&self) -> StatementKind {
        StatementKind::Create
    }

    async fn execute(&self, conn: &mut PgConnection) -> std::result::Result<StatementOutcome<UserDBResponse>, sqlx::Error> {
        let sql = returning_user(
            "INSERT INTO tm_user (
                active, address_line1, address_line2, city, company, country, email,
                full_name, gid, local_passwd, new_user, phone_number, postal_code,
                public_ssh_key, registration_sent, role, state_or_province, tenant_id,
                token, uid, username
            ) VALUES (
                COALESCE($1, true), $2, $3, $4, $5, $6, $7,
                $8, $9, $10, COALESCE($11, false), $12, $13,
                $14, $15, $16, $17, $18,
                $19, $20, $21
            )",
        );
        let rows = bind_columns(sqlx::query_as(&sql), &self.request).fetch_all(conn).await?;
        Ok(StatementOutcome::Returned(rows))
    }
}

/// Full-row replace. A missing credential keeps the stored hash.
struct UpdateUser {
    id: UserId,
    request: UserWriteDBRequest,
}

#[async_trait]
impl Statement for UpdateUser {
    type Output = UserDBResponse;

    fn kind(&self) -> StatementKind {
        StatementKind::Update
    }

    async fn execute(&self, conn: &mut PgConnection) -> std::result::Result<StatementOutcome<UserDBResponse>, sqlx::Error> {
        let sql = returning_user(
            "UPDATE tm_user SET
                active = COALESCE($1, active),
                address_line1 = $2,
                address_line2 = $3,
                city = $4,
                company = $5,
                country = $6,
                email = $7,
                full_name = $8,
                gid = $9,
                local_passwd = COALESCE($10, local_passwd),
                new_user = COALESCE($11, new_user),
                phone_number = $12,
                postal_code = $13,
                public_ssh_key = $14,
                registration_sent = $15,
                role = $16,
                state_or_province = $17,
                tenant_id = $18,
                token = $19,
                uid = $20,
                username = $21
            WHERE id = $22",
        );
        let rows = bind_columns(sqlx::query_as(&sql), &self.request)
            .bind(self.id)
            .fetch_all(conn)
            .await?;
        Ok(StatementOutcome::Returned(rows))
    }
}

/// Soft delete. The trigger refreshes last_updated but nothing is returned.
struct DeactivateUser {
    id: UserId,
}

#[async_trait]
impl Statement for DeactivateUser {
    type Output = ();

    fn kind(&self) -> StatementKind {
        StatementKind::Delete
    }

    async fn execute(&self, conn: &mut PgConnection) -> std::result::Result<StatementOutcome<()>, sqlx::Error> {
        let result = sqlx::query("UPDATE tm_user SET active = false WHERE id = $1")
            .bind(self.id)
            .execute(conn)
            .await?;
        Ok(StatementOutcome::Affected(result.rows_affected()))
    }
}

impl User {
    /// Run the user's field rules against `store`, using `deny_list` for the password check.
    pub async fn validate_with(&self, store: &dyn ValidationStore, deny_list: &[String]) -> crate::errors::Result<Vec<FieldError>> {
        let disallowed: Vec<&str> = [self.username.as_deref(), self.email.as_deref()]
            .into_iter()
            .flatten()
            .collect();

        let fields = [
            FieldRules::text("email", self.email.as_deref())
                .required()
                .rule(Rule::Email)
                .rule(Rule::UniqueIn {
                    table: "tm_user",
                    column: "email",
                    own_id: self.id,
                }),
            FieldRules::text("fullName", self.full_name.as_deref()).required(),
            FieldRules::text("localPasswd", self.local_passwd.as_deref())
                .required()
                .rule(Rule::GoodPassword { disallowed, deny_list }),
            FieldRules::int("role", self.role).required().rule(Rule::ExistsIn {
                table: "role",
                column: "id",
            }),
            FieldRules::text("username", self.username.as_deref())
                .required()
                .rule(Rule::UniqueIn {
                    table: "tm_user",
                    column: "username",
                    own_id: self.id,
                }),
            FieldRules::int("tenantId", self.tenant_id).required().rule(Rule::ExistsIn {
                table: "tenant",
                column: "id",
            }),
        ];

        validate_fields(store, &fields).await
    }

    async fn hashed_password(&self, ctx: &ResourceContext) -> crate::errors::Result<Option<String>> {
        let Some(password) = self.local_passwd.clone() else {
            return Ok(None);
        };

        // Hash on a blocking thread to avoid stalling the async runtime
        let hasher = ctx.hasher.clone();
        let hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| Error::Internal {
                operation: format!("spawn credential hashing task: {e}"),
            })??;
        Ok(Some(hash))
    }

    /// Replace every field with the row storage wrote, defaults and role name included.
    fn apply_stored(&mut self, stored: Option<UserDBResponse>) -> crate::errors::Result<()> {
        let stored = stored.ok_or_else(|| Error::Internal {
            operation: "read written user row".to_string(),
        })?;
        *self = User::from(stored);
        Ok(())
    }
}

impl Identifiable for User {
    type Id = UserId;

    const TYPE_NAME: &'static str = "user";

    fn identity(&self) -> Option<UserId> {
        self.id
    }

    fn set_identity(&mut self, id: UserId) {
        self.id = Some(id);
    }

    fn clear_generated(&mut self) {
        self.id = None;
        self.last_updated = None;
        self.rolename = None;
    }

    fn audit_label(&self) -> String {
        match &self.username {
            Some(username) => username.clone(),
            None => self.id.unwrap_or(0).to_string(),
        }
    }
}

#[async_trait]
impl Validatable for User {
    async fn validate(&self, ctx: &ResourceContext) -> crate::errors::Result<Vec<FieldError>> {
        let deny_list = ctx.deny_list.disallowed().await;
        self.validate_with(&ctx.db, &deny_list).await
    }
}

#[async_trait]
impl TenantScoped for User {
    fn tenant_of(&self) -> Option<TenantId> {
        self.tenant_id
    }
}

#[async_trait]
impl Creator for User {
    #[instrument(skip(self, ctx), fields(user = %self.audit_label()), err)]
    async fn create(&mut self, ctx: &ResourceContext) -> crate::errors::Result<()> {
        let password_hash = self.hashed_password(ctx).await?;
        let statement = InsertUser {
            request: UserWriteDBRequest::new(self, password_hash),
        };

        let stored = mutation::execute(&ctx.db, &USER_CONFLICTS, &statement).await?;
        self.apply_stored(stored)?;
        info!(id = ?self.id, "Created user");
        Ok(())
    }
}

#[async_trait]
impl Reader for User {
    #[instrument(skip(ctx, params, user), fields(user = %user.username), err)]
    async fn read(
        ctx: &ResourceContext,
        params: &HashMap<String, String>,
        user: &CurrentUser,
    ) -> crate::errors::Result<Vec<Self>> {
        let filter = build_filter(params, USER_COLUMNS).map_err(|errors| Error::Validation { errors })?;

        let Some(tenant_id) = user.tenant_id else {
            return Ok(Vec::new());
        };

        let mut conn = ctx.db.acquire().await.map_err(DbError::from)?;
        let rows = Users::new(&mut conn).list_visible(&filter, tenant_id).await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn load(ctx: &ResourceContext, id: UserId) -> crate::errors::Result<Option<Self>> {
        let mut conn = ctx.db.acquire().await.map_err(DbError::from)?;
        let row = Users::new(&mut conn).get_by_id(id).await?;
        Ok(row.map(User::from))
    }
}

#[async_trait]
impl Updater for User {
    #[instrument(skip(self, ctx), fields(user = %self.audit_label()), err)]
    async fn update(&mut self, ctx: &ResourceContext) -> crate::errors::Result<()> {
        let id = self.id.ok_or_else(Self::not_found)?;
        let password_hash = self.hashed_password(ctx).await?;
        let statement = UpdateUser {
            id,
            request: UserWriteDBRequest::new(self, password_hash),
        };

        let stored = mutation::execute(&ctx.db, &USER_CONFLICTS, &statement).await?;
        self.apply_stored(stored)?;
        info!(id, "Updated user");
        Ok(())
    }
}

#[async_trait]
impl Deleter for User {
    #[instrument(skip(self, ctx), fields(user = %self.audit_label()), err)]
    async fn delete(&self, ctx: &ResourceContext) -> crate::errors::Result<()> {
        let id = self.id.ok_or_else(Self::not_found)?;
        mutation::execute(&ctx.db, &USER_CONFLICTS, &DeactivateUser { id }).await?;
        info!(id, "Deactivated user");
        Ok(())
    }
}
