//! One call path per CRUD operation, generic over the resource contract.
//!
//! Each route handler extracts its inputs and hands them to one of these
//! functions. The order is fixed: validate, authorize, then mutate.

use std::collections::HashMap;

use tracing::{debug, instrument};

use crate::api::models::users::CurrentUser;
use crate::db::errors::DbError;
use crate::errors::{Error, Result};
use crate::resource::{Creator, Deleter, Identifiable, Reader, ResourceContext, TenantScoped, Updater, Validatable};
use crate::types::Operation;

async fn validate<T: Validatable>(ctx: &ResourceContext, resource: &T) -> Result<()> {
    let errors = resource.validate(ctx).await?;
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation { errors })
    }
}

async fn authorize<T>(ctx: &ResourceContext, user: &CurrentUser, resource: &T, action: Operation) -> Result<()>
where
    T: TenantScoped + Identifiable,
{
    let mut conn = ctx.db.acquire().await.map_err(DbError::from)?;
    if resource.is_authorized(user, &mut conn).await? {
        Ok(())
    } else {
        debug!(resource = %resource.audit_label(), %action, "Tenant check failed");
        Err(Error::Forbidden {
            action,
            resource: T::TYPE_NAME.to_string(),
        })
    }
}

#[instrument(skip_all, fields(user = %user.username), err)]
pub async fn create_resource<T>(ctx: &ResourceContext, user: &CurrentUser, mut resource: T) -> Result<T>
where
    T: Validatable + TenantScoped + Creator + Send,
{
    // A new record has no identity, so uniqueness is checked against every row
    resource.clear_generated();
    validate(ctx, &resource).await?;
    authorize(ctx, user, &resource, Operation::Create).await?;
    resource.create(ctx).await?;
    Ok(resource)
}

#[instrument(skip_all, fields(user = %user.username), err)]
pub async fn read_resources<T: Reader>(ctx: &ResourceContext, user: &CurrentUser, params: &HashMap<String, String>) -> Result<Vec<T>> {
    T::read(ctx, params, user).await
}

/// Full-row replace. The caller must be allowed to act on both the stored
/// record's tenant and the tenant it is moving to.
#[instrument(skip_all, fields(user = %user.username), err)]
pub async fn update_resource<T>(ctx: &ResourceContext, user: &CurrentUser, mut resource: T) -> Result<T>
where
    T: Validatable + TenantScoped + Reader + Updater + Send,
{
    validate(ctx, &resource).await?;

    let id = resource.identity().ok_or_else(T::not_found)?;
    let stored = T::load(ctx, id).await?.ok_or_else(T::not_found)?;
    authorize(ctx, user, &stored, Operation::Update).await?;
    authorize(ctx, user, &resource, Operation::Update).await?;

    resource.update(ctx).await?;
    Ok(resource)
}

/// Soft delete by id. Returns the record as it was loaded before deletion.
#[instrument(skip_all, fields(user = %user.username, %id), err)]
pub async fn delete_resource<T>(ctx: &ResourceContext, user: &CurrentUser, id: T::Id) -> Result<T>
where
    T: TenantScoped + Reader + Deleter + Send,
{
    let stored = T::load(ctx, id).await?.ok_or_else(T::not_found)?;
    authorize(ctx, user, &stored, Operation::Delete).await?;
    stored.delete(ctx).await?;
    Ok(stored)
}
