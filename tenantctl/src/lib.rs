//! # tenantctl: multi-tenant administrative API
//!
//! `tenantctl` exposes tenant-scoped user administration over HTTP. Every
//! write goes through the same pipeline:
//!
//! ```text
//! request ──► CurrentUser (trusted header) ──► validate ──► authorize ──► one-statement transaction
//!                                                 │              │                  │
//!                                          field errors (400)  403        conflict (409) / missing (404)
//! ```
//!
//! Reads are filtered through a fixed whitelist of query keys and limited to
//! the caller's tenant subtree.
//!
//! ## Modules
//!
//! - [`resource`]: the contract a CRUD resource implements
//! - [`api`]: HTTP handlers, wire models and the generic dispatcher
//! - [`db`]: repositories, the mutation engine and filter construction
//! - [`validation`]: field rules and the password deny-list
//! - [`auth`]: caller identity and credential hashing
//! - [`config`]: figment-based configuration
//! - [`telemetry`]: tracing and optional OTLP export
//!
//! ## Running
//!
//! ```bash
//! DATABASE_URL=postgres://localhost/tenantctl tenantctl -f config.yaml
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod openapi;
pub mod resource;
pub mod telemetry;
#[cfg(test)]
pub mod test_utils;
pub mod types;
pub mod validation;

use std::sync::Arc;

use axum::{
    Json, Router,
    routing::get,
};
use bon::Builder;
use sqlx::{PgPool, postgres::PgPoolOptions};
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, debug, info};
use utoipa::OpenApi;

use crate::api::handlers::users;
use crate::auth::password::{Argon2Hasher, CredentialHasher};
use crate::openapi::ApiDoc;
use crate::resource::ResourceContext;
use crate::validation::{DenyListSource, deny_list};

pub use config::Config;

/// Application state shared across all request handlers.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .db(pool)
///     .config(config)
///     .hasher(Arc::new(Argon2Hasher::default()))
///     .deny_list(deny_list)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub hasher: Arc<dyn CredentialHasher>,
    pub deny_list: Arc<dyn DenyListSource>,
}

impl AppState {
    /// The collaborators a resource operation needs.
    pub fn resource_context(&self) -> ResourceContext {
        ResourceContext {
            db: self.db.clone(),
            hasher: self.hasher.clone(),
            deny_list: self.deny_list.clone(),
        }
    }
}

/// Get the tenantctl database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/{id}",
            get(users::get_user).put(users::update_user).delete(users::delete_user),
        )
        .route("/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .with_state(state);

    Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .nest("/api/v1", api_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

async fn setup_database(config: &Config) -> anyhow::Result<PgPool> {
    let settings = &config.database.pool;
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(settings.acquire_timeout())
        .idle_timeout(settings.idle_timeout())
        .max_lifetime(settings.max_lifetime())
        .connect(&config.database.url)
        .await?;

    migrator().run(&pool).await?;
    Ok(pool)
}

/// 1. **Create**: [`Application::new`] connects, runs migrations and loads the deny-list
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and starts handling requests
/// 3. **Shutdown**: When the shutdown signal is received, closes the pool and flushes telemetry
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        Self::new_with_pool(config, None).await
    }

    /// Like [`Application::new`], reusing `pool` when given. Migrations run either way.
    pub async fn new_with_pool(config: Config, pool: Option<PgPool>) -> anyhow::Result<Self> {
        debug!("Starting tenantctl with configuration: {:#?}", config);

        let pool = match pool {
            Some(pool) => {
                migrator().run(&pool).await?;
                pool
            }
            None => setup_database(&config).await?,
        };

        let deny_list = deny_list::from_config(&config.deny_list).await;
        let state = AppState::builder()
            .db(pool.clone())
            .config(config.clone())
            .hasher(Arc::new(Argon2Hasher::new(config.credentials.argon2)))
            .deny_list(deny_list)
            .build();

        Ok(Self {
            router: build_router(state),
            config,
            pool,
        })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("tenantctl listening on http://{}", bind_addr);

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use crate::test_utils::create_test_app;
    use serde_json::Value;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_healthz(pool: PgPool) {
        let app = create_test_app(pool).await;
        let response = app.get("/healthz").await;
        response.assert_status_ok();
        response.assert_text("OK");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_openapi_document_is_served(pool: PgPool) {
        let app = create_test_app(pool).await;
        let response = app.get("/api/v1/openapi.json").await;
        response.assert_status_ok();

        let doc: Value = response.json();
        assert!(doc["paths"]["/users"]["get"].is_object());
        assert!(doc["paths"]["/users/{id}"]["delete"].is_object());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_unknown_route_is_not_found(pool: PgPool) {
        let app = create_test_app(pool).await;
        app.get("/api/v1/tenants").await.assert_status_not_found();
    }
}
