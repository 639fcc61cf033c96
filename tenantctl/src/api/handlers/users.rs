use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::AppState;
use crate::api::handlers::crud;
use crate::api::models::users::{Alert, AlertsResponse, CurrentUser, ListResponse, User};
use crate::errors::Result;
use crate::resource::Identifiable;
use crate::types::UserId;

#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    summary = "List users",
    description = "Users in the caller's tenant subtree. Unknown query keys are ignored.",
    responses(
        (status = 200, description = "Matching users", body = ListResponse<User>),
        (status = 400, description = "A filter value has the wrong type"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("username" = Option<String>, Query, description = "Exact username"),
        ("email" = Option<String>, Query, description = "Exact email"),
        ("id" = Option<i32>, Query, description = "User ID"),
        ("role" = Option<i32>, Query, description = "Role id"),
        ("rolename" = Option<String>, Query, description = "Role name"),
        ("active" = Option<bool>, Query, description = "Active flag"),
        ("lastUpdated" = Option<String>, Query, description = "RFC 3339 timestamp"),
        ("orderby" = Option<String>, Query, description = "Any filter key to sort by"),
    ),
    security(("X-Tenantctl-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ListResponse<User>>> {
    let users = crud::read_resources::<User>(&state.resource_context(), &current_user, &params).await?;
    Ok(Json(ListResponse { response: users }))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    summary = "Get user",
    description = "Same envelope as the list; empty when the id is unknown or outside the caller's tenants.",
    responses(
        (status = 200, description = "Zero or one user", body = ListResponse<User>),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    params(("id" = i32, Path, description = "User ID")),
    security(("X-Tenantctl-User" = []))
)]
#[tracing::instrument(skip_all, fields(id = %id))]
pub async fn get_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<UserId>,
    Query(mut params): Query<HashMap<String, String>>,
) -> Result<Json<ListResponse<User>>> {
    params.insert("id".to_string(), id.to_string());
    let users = crud::read_resources::<User>(&state.resource_context(), &current_user, &params).await?;
    Ok(Json(ListResponse { response: users }))
}

#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    summary = "Create user",
    request_body = User,
    responses(
        (status = 201, description = "User created", body = AlertsResponse<User>),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Tenant not visible to the caller"),
        (status = 409, description = "Username or email already exists"),
        (status = 500, description = "Internal server error")
    ),
    security(("X-Tenantctl-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(user): Json<User>,
) -> Result<(StatusCode, Json<AlertsResponse<User>>)> {
    let user = crud::create_resource(&state.resource_context(), &current_user, user).await?;
    let alert = Alert::success(format!("{} was created.", user.type_name()));
    Ok((StatusCode::CREATED, Json(AlertsResponse::new(alert, Some(user)))))
}

#[utoipa::path(
    put,
    path = "/users/{id}",
    tag = "users",
    summary = "Replace user",
    description = "Every settable field is rewritten, so the body must carry the complete record including `localPasswd`.",
    request_body = User,
    responses(
        (status = 200, description = "User updated", body = AlertsResponse<User>),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Tenant not visible to the caller"),
        (status = 404, description = "User not found"),
        (status = 409, description = "Username or email already exists"),
        (status = 500, description = "Internal server error")
    ),
    params(("id" = i32, Path, description = "User ID")),
    security(("X-Tenantctl-User" = []))
)]
#[tracing::instrument(skip_all, fields(id = %id))]
pub async fn update_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<UserId>,
    Json(mut user): Json<User>,
) -> Result<Json<AlertsResponse<User>>> {
    // The path wins over any id in the body
    user.clear_generated();
    user.set_identity(id);
    let user = crud::update_resource(&state.resource_context(), &current_user, user).await?;
    let alert = Alert::success(format!("{} was updated.", user.type_name()));
    Ok(Json(AlertsResponse::new(alert, Some(user))))
}

#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "users",
    summary = "Deactivate user",
    responses(
        (status = 200, description = "User deactivated", body = AlertsResponse<User>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Tenant not visible to the caller"),
        (status = 404, description = "User not found"),
        (status = 500, description = "Internal server error")
    ),
    params(("id" = i32, Path, description = "User ID")),
    security(("X-Tenantctl-User" = []))
)]
#[tracing::instrument(skip_all, fields(id = %id))]
pub async fn delete_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<UserId>,
) -> Result<Json<AlertsResponse<User>>> {
    let user = crud::delete_resource::<User>(&state.resource_context(), &current_user, id).await?;
    let alert = Alert::success(format!("{} was deleted.", user.type_name()));
    Ok(Json(AlertsResponse::new(alert, None)))
}
