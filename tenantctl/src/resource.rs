//! The contract every CRUD resource implements.
//!
//! A resource type is a wire record (all fields optional) that knows its own
//! identity, how to validate itself, which tenant owns it and how to apply
//! each mutation. The generic dispatcher in [`crate::api::handlers::crud`]
//! only ever talks to these traits.
//!
//! ```ignore
//! let errors = user.validate(&ctx).await?;
//! if errors.is_empty() && user.is_authorized(&current_user, &mut conn).await? {
//!     user.create(&ctx).await?;
//! }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};

use crate::api::models::users::CurrentUser;
use crate::auth::password::CredentialHasher;
use crate::db::handlers::Tenants;
use crate::errors::{Error, Result};
use crate::types::TenantId;
use crate::validation::{DenyListSource, FieldError};

/// Collaborators shared by every resource operation.
#[derive(Debug, Clone)]
pub struct ResourceContext {
    pub db: PgPool,
    pub hasher: Arc<dyn CredentialHasher>,
    pub deny_list: Arc<dyn DenyListSource>,
}

pub trait Identifiable {
    type Id: Copy + fmt::Display + Send + Sync;

    /// Constant tag used in messages, e.g. `"user"`.
    const TYPE_NAME: &'static str;

    /// `None` until storage assigns one.
    fn identity(&self) -> Option<Self::Id>;

    /// Address the record by `id`, e.g. the id from a request path before an update.
    fn set_identity(&mut self, id: Self::Id);

    /// Forget the identity and every storage-generated field a caller may have sent.
    fn clear_generated(&mut self);

    /// Human-readable label for logs.
    fn audit_label(&self) -> String;

    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    /// The error for an id that matches no stored record.
    fn not_found() -> Error
    where
        Self: Sized,
    {
        Error::NotFound {
            message: format!("no {} found with this id", Self::TYPE_NAME),
        }
    }
}

#[async_trait]
pub trait Validatable {
    /// Every rule failure, in field order. Empty means valid.
    async fn validate(&self, ctx: &ResourceContext) -> Result<Vec<FieldError>>;
}

#[async_trait]
pub trait TenantScoped: Sync {
    fn tenant_of(&self) -> Option<TenantId>;

    /// Whether `user` may act on this record. A record without a tenant is
    /// never authorized.
    async fn is_authorized(&self, user: &CurrentUser, conn: &mut PgConnection) -> Result<bool> {
        let Some(tenant_id) = self.tenant_of() else {
            return Ok(false);
        };
        Ok(Tenants::new(conn).is_resource_authorized(tenant_id, user).await?)
    }
}

#[async_trait]
pub trait Creator: Identifiable {
    /// Insert the record. On success `self` is replaced by the stored row.
    async fn create(&mut self, ctx: &ResourceContext) -> Result<()>;
}

#[async_trait]
pub trait Reader: Identifiable + Sized {
    /// Records visible to `user` that match the whitelisted `params`.
    async fn read(ctx: &ResourceContext, params: &HashMap<String, String>, user: &CurrentUser) -> Result<Vec<Self>>;

    /// The stored record with this id, regardless of tenant.
    async fn load(ctx: &ResourceContext, id: Self::Id) -> Result<Option<Self>>;
}

#[async_trait]
pub trait Updater: Identifiable {
    /// Replace every settable column. On success `self` is replaced by the stored row.
    async fn update(&mut self, ctx: &ResourceContext) -> Result<()>;
}

#[async_trait]
pub trait Deleter: Identifiable {
    async fn delete(&self, ctx: &ResourceContext) -> Result<()>;
}
