//! Test utilities for integration testing.

use std::sync::Arc;

use axum_test::TestServer;
use sqlx::PgPool;

use crate::api::models::users::{CurrentUser, User};
use crate::auth::password::{Argon2Hasher, Argon2Params};
use crate::config::{Config, PoolSettings};
use crate::db::handlers::Users;
use crate::resource::ResourceContext;
use crate::types::TenantId;
use crate::validation::StaticDenyList;
use crate::{AppState, Application};

/// Cheap argon2 parameters so hashing does not dominate test time.
pub const FAST_ARGON2: Argon2Params = Argon2Params {
    memory_kib: 1024,
    iterations: 1,
    parallelism: 1,
};

pub fn create_test_config() -> Config {
    let mut config = Config::default();
    config.database.pool = PoolSettings {
        max_connections: 2,
        min_connections: 0,
        ..Default::default()
    };
    config.credentials.argon2 = FAST_ARGON2;
    config
}

pub fn create_test_context(pool: PgPool) -> ResourceContext {
    ResourceContext {
        db: pool,
        hasher: Arc::new(Argon2Hasher::new(FAST_ARGON2)),
        deny_list: Arc::new(StaticDenyList::default()),
    }
}

pub fn create_test_state(pool: PgPool) -> AppState {
    let ctx = create_test_context(pool);
    AppState::builder()
        .db(ctx.db)
        .config(create_test_config())
        .hasher(ctx.hasher)
        .deny_list(ctx.deny_list)
        .build()
}

pub async fn create_test_app(pool: PgPool) -> TestServer {
    seed_roles(&pool).await;
    Application::new_with_pool(create_test_config(), Some(pool))
        .await
        .expect("Failed to create application")
        .into_test_server()
}

/// Insert the fixed role set. Safe to call more than once.
pub async fn seed_roles(pool: &PgPool) {
    sqlx::query(
        "INSERT INTO role (id, name, description, priv_level) VALUES
            (0, 'admin', 'Full access', 30),
            (1, 'operations', 'Day to day operations', 20),
            (2, 'read-only', 'Read-only access', 10)
        ON CONFLICT DO NOTHING",
    )
    .execute(pool)
    .await
    .expect("Failed to seed roles");
}

pub async fn create_test_tenant(pool: &PgPool, name: &str, parent_id: Option<TenantId>) -> TenantId {
    sqlx::query_scalar("INSERT INTO tenant (name, active, parent_id) VALUES ($1, true, $2) RETURNING id")
        .bind(name)
        .bind(parent_id)
        .fetch_one(pool)
        .await
        .expect("Failed to create test tenant")
}

/// An active admin-role user in `tenant`, inserted directly so no validation or hashing runs.
pub async fn create_test_user(pool: &PgPool, username: &str, tenant: Option<TenantId>) -> CurrentUser {
    seed_roles(pool).await;
    sqlx::query("INSERT INTO tm_user (username, email, full_name, role, tenant_id) VALUES ($1, $2, $3, 0, $4)")
        .bind(username)
        .bind(format!("{username}@example.com"))
        .bind("Test User")
        .bind(tenant)
        .execute(pool)
        .await
        .expect("Failed to create test user");

    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Users::new(&mut conn)
        .find_current_user(username)
        .await
        .expect("Failed to look up test user")
        .expect("Test user was not created")
}

/// The header pair that identifies `user` to the API.
pub fn auth_header(user: &CurrentUser) -> (&'static str, &str) {
    ("x-tenantctl-user", user.username.as_str())
}

pub fn buckaroo() -> User {
    User {
        username: Some("buckaroo".to_string()),
        email: Some("buckaroo@yoyodyne.bz".to_string()),
        full_name: Some("Buckaroo Bonzai".to_string()),
        local_passwd: Some("letmein".to_string()),
        role: Some(0),
        tenant_id: Some(1),
        ..Default::default()
    }
}
